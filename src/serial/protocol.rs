//! Controller line protocol
//!
//! The controller speaks newline-delimited ASCII. Each line starts with a
//! prefix naming the event, optionally followed by a body:
//!
//! ```text
//! Data:t0,h0,t1,h1,t2,h2,o2,fill   sensor reading, exactly 8 numbers
//! Loaded                           door event, material added
//! Unloaded                         door event, material removed
//! Delay:<seconds>                  new capture debounce delay
//! Blower:                          blower cycle started
//! Pump:                            pump cycle started
//! ```
//!
//! Sensor 0 is the top probe of the drum.

use std::fmt;
use std::time::Duration;

/// Number of numeric fields carried by a `Data:` line.
pub const READING_FIELDS: usize = 8;

/// Prefixes in match priority. First match wins, so a shorter prefix must
/// never precede a longer one it is a leading substring of.
pub const PREFIXES: [(&str, Prefix); 6] = [
    ("Data:", Prefix::Data),
    ("Loaded", Prefix::Loaded),
    ("Unloaded", Prefix::Unloaded),
    ("Delay:", Prefix::Delay),
    ("Blower:", Prefix::Blower),
    ("Pump:", Prefix::Pump),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Data,
    Loaded,
    Unloaded,
    Delay,
    Blower,
    Pump,
}

/// One temperature/humidity probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    pub temp: f64,
    pub hum: f64,
}

/// Parsed controller event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Reading {
        probes: [Probe; 3],
        o2: f64,
        fill: f64,
    },
    Loaded,
    Unloaded,
    DelayUpdate {
        delay: Duration,
    },
    BlowerActivated,
    PumpActivated,
    Unrecognized {
        raw: String,
    },
}

impl Event {
    /// Classify a raw controller line.
    ///
    /// Never fails: anything that does not parse cleanly under its prefix is
    /// returned as [`Event::Unrecognized`] carrying the trimmed line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        let Some((prefix, body)) = PREFIXES
            .iter()
            .find_map(|(text, prefix)| line.strip_prefix(*text).map(|body| (*prefix, body)))
        else {
            return Event::unrecognized(line);
        };

        let parsed = match prefix {
            Prefix::Data => parse_reading(body),
            // Status events carry no data; anything after the prefix is ignored
            Prefix::Loaded => Some(Event::Loaded),
            Prefix::Unloaded => Some(Event::Unloaded),
            Prefix::Delay => parse_delay(body).map(|delay| Event::DelayUpdate { delay }),
            Prefix::Blower => Some(Event::BlowerActivated),
            Prefix::Pump => Some(Event::PumpActivated),
        };

        parsed.unwrap_or_else(|| Event::unrecognized(line))
    }

    fn unrecognized(line: &str) -> Self {
        Event::Unrecognized {
            raw: line.to_string(),
        }
    }

    /// Door events arm the capture timer.
    pub fn is_trigger(&self) -> bool {
        matches!(self, Event::Loaded | Event::Unloaded)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Reading { probes, o2, fill } => {
                write!(f, "Reading")?;
                for (i, p) in probes.iter().enumerate() {
                    write!(f, " S{}={:.1}C/{:.1}%", i, p.temp, p.hum)?;
                }
                write!(f, " O2={} Fill={}", o2, fill)
            }
            Event::Loaded => write!(f, "Loaded"),
            Event::Unloaded => write!(f, "Unloaded"),
            Event::DelayUpdate { delay } => write!(f, "DelayUpdate {:?}", delay),
            Event::BlowerActivated => write!(f, "Blower"),
            Event::PumpActivated => write!(f, "Pump"),
            Event::Unrecognized { raw } => write!(f, "Unrecognized {:?}", raw),
        }
    }
}

fn parse_number(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_reading(body: &str) -> Option<Event> {
    let values = body
        .split(',')
        .map(parse_number)
        .collect::<Option<Vec<f64>>>()?;

    let [t0, h0, t1, h1, t2, h2, o2, fill]: [f64; READING_FIELDS] = values.try_into().ok()?;

    Some(Event::Reading {
        probes: [
            Probe { temp: t0, hum: h0 },
            Probe { temp: t1, hum: h1 },
            Probe { temp: t2, hum: h2 },
        ],
        o2,
        fill,
    })
}

fn parse_delay(body: &str) -> Option<Duration> {
    parse_number(body).and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reading_field_order() {
        let event = Event::parse("Data:1,2,3,4,5,6,7,8");
        assert_eq!(
            event,
            Event::Reading {
                probes: [
                    Probe { temp: 1.0, hum: 2.0 },
                    Probe { temp: 3.0, hum: 4.0 },
                    Probe { temp: 5.0, hum: 6.0 },
                ],
                o2: 7.0,
                fill: 8.0,
            }
        );
    }

    #[test]
    fn test_parse_reading_with_decimals_and_whitespace() {
        let event = Event::parse("  Data:20.5, 55.25,21,54,19,56,18.75,75\r\n");
        match event {
            Event::Reading { probes, o2, fill } => {
                assert_eq!(probes[0], Probe { temp: 20.5, hum: 55.25 });
                assert_eq!(o2, 18.75);
                assert_eq!(fill, 75.0);
            }
            other => panic!("expected Reading, got {:?}", other),
        }
    }

    #[test]
    fn test_reading_never_partially_accepted() {
        for line in [
            "Data:1,2,x,4,5,6,7,8",
            "Data:1,2,3",
            "Data:1,2,3,4,5,6,7,8,9",
            "Data:",
            "Data:1,2,3,4,5,6,7,",
            "Data:1,2,3,4,5,6,7,NaN",
            "Data:1,2,3,4,5,6,7,inf",
        ] {
            assert_eq!(
                Event::parse(line),
                Event::Unrecognized {
                    raw: line.to_string()
                },
                "line {:?} should not parse",
                line
            );
        }
    }

    #[test]
    fn test_door_prefixes_are_exclusive() {
        assert_eq!(Event::parse("Loaded"), Event::Loaded);
        assert_eq!(Event::parse("Unloaded"), Event::Unloaded);
        assert!(matches!(Event::parse("Load"), Event::Unrecognized { .. }));
        assert!(matches!(Event::parse("loaded"), Event::Unrecognized { .. }));
    }

    #[test]
    fn test_status_body_is_ignored() {
        assert_eq!(Event::parse("Blower:"), Event::BlowerActivated);
        assert_eq!(Event::parse("Blower:1"), Event::BlowerActivated);
        assert_eq!(Event::parse("Pump:OFF"), Event::PumpActivated);
        assert_eq!(Event::parse("Pump:0"), Event::PumpActivated);
        assert_eq!(Event::parse("Loaded false"), Event::Loaded);
    }

    #[test]
    fn test_parse_delay() {
        assert_eq!(
            Event::parse("Delay:2.5"),
            Event::DelayUpdate {
                delay: Duration::from_millis(2500)
            }
        );
        assert_eq!(
            Event::parse("Delay: 0"),
            Event::DelayUpdate {
                delay: Duration::ZERO
            }
        );
        assert!(matches!(Event::parse("Delay:-1"), Event::Unrecognized { .. }));
        assert!(matches!(Event::parse("Delay:soon"), Event::Unrecognized { .. }));
    }

    #[test]
    fn test_unknown_lines() {
        assert_eq!(
            Event::parse("Hello from Giga"),
            Event::Unrecognized {
                raw: "Hello from Giga".to_string()
            }
        );
        assert!(matches!(Event::parse("Blower"), Event::Unrecognized { .. }));
    }

    #[test]
    fn test_prefix_table_has_no_shadowing() {
        for (i, (earlier, _)) in PREFIXES.iter().enumerate() {
            for (later, _) in &PREFIXES[i + 1..] {
                assert!(
                    !later.starts_with(earlier),
                    "{:?} shadows {:?}",
                    earlier,
                    later
                );
            }
        }
    }

    #[test]
    fn test_only_door_events_trigger() {
        assert!(Event::parse("Loaded").is_trigger());
        assert!(Event::parse("Unloaded").is_trigger());
        assert!(!Event::parse("Pump:").is_trigger());
        assert!(!Event::parse("Delay:3").is_trigger());
    }
}
