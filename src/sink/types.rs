//! Outbound payloads for the collection service and the local store

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::serial::protocol::{Event, Probe};

/// Envelope shared by the persisted copy and the delivered copy of an event.
///
/// The timestamp is fixed when the payload is built, so both sinks see the
/// same instant.
#[derive(Debug, Clone, Serialize)]
pub struct Payload {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub body: Body,
    #[serde(skip)]
    pub captured_at: DateTime<Utc>,
}

/// Kind-specific part of the payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Body {
    Loaded(Vec<StatusFlag>),
    Unloaded(Vec<StatusFlag>),
    Blower(Vec<StatusFlag>),
    Pump(Vec<StatusFlag>),
    #[serde(untagged)]
    Reading {
        sensor: [SensorPair; 3],
        o2: f64,
        fill: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorPair {
    pub temp: f64,
    pub hum: f64,
}

impl From<Probe> for SensorPair {
    fn from(p: Probe) -> Self {
        Self {
            temp: p.temp,
            hum: p.hum,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusFlag {
    #[serde(rename = "Status")]
    pub status: bool,
}

impl Body {
    /// Body for an event that has a sink, `None` for delay updates and
    /// unrecognized lines.
    pub fn from_event(event: &Event) -> Option<Self> {
        let flag = || vec![StatusFlag { status: true }];
        match event {
            Event::Reading { probes, o2, fill } => Some(Body::Reading {
                sensor: probes.map(SensorPair::from),
                o2: *o2,
                fill: *fill,
            }),
            Event::Loaded => Some(Body::Loaded(flag())),
            Event::Unloaded => Some(Body::Unloaded(flag())),
            Event::BlowerActivated => Some(Body::Blower(flag())),
            Event::PumpActivated => Some(Body::Pump(flag())),
            Event::DelayUpdate { .. } | Event::Unrecognized { .. } => None,
        }
    }
}

impl Payload {
    pub fn new(device_id: &str, body: Body, captured_at: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.to_string(),
            timestamp: iso_timestamp(captured_at),
            body,
            captured_at,
        }
    }
}

/// `2025-07-08T14:03:09.512034Z`
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `20250708_140309`, used in file names
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 8, 14, 3, 9).unwrap()
    }

    #[test]
    fn test_reading_payload_schema() {
        let event = Event::parse("Data:20,55,21,54,19,56,18,75");
        let body = Body::from_event(&event).unwrap();
        let payload = Payload::new("pi_zero_999", body, at());

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "deviceId": "pi_zero_999",
                "timestamp": "2025-07-08T14:03:09.000000Z",
                "sensor": [
                    {"temp": 20.0, "hum": 55.0},
                    {"temp": 21.0, "hum": 54.0},
                    {"temp": 19.0, "hum": 56.0}
                ],
                "o2": 18.0,
                "fill": 75.0
            })
        );
    }

    #[test]
    fn test_status_payload_keys() {
        let cases = [
            ("Loaded", "loaded"),
            ("Unloaded", "unloaded"),
            ("Blower:", "blower"),
            ("Pump:", "pump"),
        ];
        for (line, key) in cases {
            let body = Body::from_event(&Event::parse(line)).unwrap();
            let value = serde_json::to_value(Payload::new("dev", body, at())).unwrap();
            assert_eq!(value[key], json!([{"Status": true}]), "line {}", line);
            assert_eq!(value.as_object().unwrap().len(), 3);
        }
    }

    #[test]
    fn test_status_is_always_true() {
        for (line, key) in [("Pump:0", "pump"), ("Loaded false", "loaded"), ("Blower:off", "blower")] {
            let body = Body::from_event(&Event::parse(line)).unwrap();
            let value = serde_json::to_value(Payload::new("dev", body, at())).unwrap();
            assert_eq!(value[key], json!([{"Status": true}]), "line {}", line);
        }
    }

    #[test]
    fn test_no_body_for_control_lines() {
        assert!(Body::from_event(&Event::parse("Delay:4")).is_none());
        assert!(Body::from_event(&Event::parse("garbage")).is_none());
    }

    #[test]
    fn test_file_timestamp() {
        assert_eq!(file_timestamp(at()), "20250708_140309");
    }
}
