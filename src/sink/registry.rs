//! Event kind → storage directory + remote endpoint

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::serial::protocol::Event;

/// Event kinds, one per [`Event`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Reading,
    Loaded,
    Unloaded,
    DelayUpdate,
    BlowerActivated,
    PumpActivated,
    Unrecognized,
}

#[cfg(test)]
impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Reading,
        EventKind::Loaded,
        EventKind::Unloaded,
        EventKind::DelayUpdate,
        EventKind::BlowerActivated,
        EventKind::PumpActivated,
        EventKind::Unrecognized,
    ];
}

impl From<&Event> for EventKind {
    fn from(event: &Event) -> Self {
        match event {
            Event::Reading { .. } => EventKind::Reading,
            Event::Loaded => EventKind::Loaded,
            Event::Unloaded => EventKind::Unloaded,
            Event::DelayUpdate { .. } => EventKind::DelayUpdate,
            Event::BlowerActivated => EventKind::BlowerActivated,
            Event::PumpActivated => EventKind::PumpActivated,
            Event::Unrecognized { .. } => EventKind::Unrecognized,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Static route for one persisted/delivered kind.
struct Route {
    kind: EventKind,
    dir: &'static str,
    endpoint: &'static str,
    label: &'static str,
}

/// The only kinds that reach a sink. Directory names and labels are read by
/// downstream tooling and must stay stable.
const ROUTES: [Route; 5] = [
    Route {
        kind: EventKind::Reading,
        dir: "readings",
        endpoint: "readings",
        label: "Readings",
    },
    Route {
        kind: EventKind::Loaded,
        dir: "loaded",
        endpoint: "loaded",
        label: "Loaded",
    },
    Route {
        kind: EventKind::Unloaded,
        dir: "unloaded",
        endpoint: "unloaded",
        label: "Unloaded",
    },
    Route {
        kind: EventKind::BlowerActivated,
        dir: "blowers",
        endpoint: "blowers",
        label: "Blowers",
    },
    Route {
        kind: EventKind::PumpActivated,
        dir: "pump",
        endpoint: "pump",
        label: "Pump",
    },
];

/// Directory and endpoint route for captured pictures.
pub const PICTURES: &str = "pictures";

/// Where one kind of event is stored and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkDescriptor {
    pub kind: EventKind,
    /// Directory the JSON documents are written to
    pub dir: PathBuf,
    /// Full URL of the collection endpoint
    pub url: String,
    /// Label used in file names (`..._{label}_data_.json`)
    pub label: &'static str,
}

/// Immutable kind → sink table, built once at startup.
#[derive(Debug)]
pub struct SinkRegistry {
    sinks: HashMap<EventKind, SinkDescriptor>,
    pictures_dir: PathBuf,
    pictures_url: String,
}

impl SinkRegistry {
    pub fn new(storage_root: &Path, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');

        let sinks = ROUTES
            .iter()
            .map(|route| {
                let descriptor = SinkDescriptor {
                    kind: route.kind,
                    dir: storage_root.join(route.dir),
                    url: format!("{}/{}", base_url, route.endpoint),
                    label: route.label,
                };
                (route.kind, descriptor)
            })
            .collect();

        Self {
            sinks,
            pictures_dir: storage_root.join(PICTURES),
            pictures_url: format!("{}/{}", base_url, PICTURES),
        }
    }

    pub fn lookup(&self, kind: EventKind) -> Option<&SinkDescriptor> {
        self.sinks.get(&kind)
    }

    pub fn pictures_dir(&self) -> &Path {
        &self.pictures_dir
    }

    pub fn pictures_url(&self) -> &str {
        &self.pictures_url
    }

    /// Create every sink directory (and the pictures directory).
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        let dirs = self
            .sinks
            .values()
            .map(|d| d.dir.as_path())
            .chain(std::iter::once(self.pictures_dir.as_path()));

        for dir in dirs {
            std::fs::create_dir_all(dir)?;
            debug!("Ensured directory {}", dir.display());
        }
        Ok(())
    }
}
