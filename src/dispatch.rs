//! Controller event dispatcher
//!
//! Pulls lines from the controller, classifies them, and fans each eligible
//! event out to the persistence and delivery sinks. Door events also (re)arm
//! the capture timer.
//!
//! The read loop never waits on a sink: both sink calls run on their own
//! tasks and are only reaped once finished. The only await in the loop that
//! can block is the next line.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::capture::CaptureCollaborator;
use crate::debounce::DebounceTimer;
use crate::error::BridgeError;
use crate::serial::protocol::Event;
use crate::serial::LineSource;
use crate::sink::registry::{EventKind, SinkRegistry};
use crate::sink::types::{Body, Payload};
use crate::sink::{DeliverySink, PersistenceSink};

pub struct Dispatcher {
    device_id: String,
    registry: Arc<SinkRegistry>,
    persistence: Arc<dyn PersistenceSink>,
    delivery: Arc<dyn DeliverySink>,
    capture: Arc<dyn CaptureCollaborator>,
    timer: DebounceTimer,
    delay: Duration,
    in_flight: JoinSet<()>,
}

impl Dispatcher {
    pub fn new(
        device_id: impl Into<String>,
        registry: Arc<SinkRegistry>,
        persistence: Arc<dyn PersistenceSink>,
        delivery: Arc<dyn DeliverySink>,
        capture: Arc<dyn CaptureCollaborator>,
        initial_delay: Duration,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            registry,
            persistence,
            delivery,
            capture,
            timer: DebounceTimer::new(),
            delay: initial_delay,
            in_flight: JoinSet::new(),
        }
    }

    /// Delay the next door event will arm the capture timer with.
    #[cfg(test)]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run until the line source closes or faults.
    ///
    /// In-flight sink calls are drained before returning. A pending capture is
    /// left armed; call [`Dispatcher::shutdown`] to drop it.
    pub async fn run<S: LineSource + ?Sized>(&mut self, source: &mut S) -> Result<(), BridgeError> {
        info!("Dispatcher running (capture delay {:?})", self.delay);

        let result = loop {
            match source.next_line().await {
                Ok(Some(line)) => self.handle_line(&line).await,
                Ok(None) => {
                    info!("Controller link closed");
                    break Ok(());
                }
                Err(e) => {
                    error!("Controller link failed: {}", e);
                    break Err(e);
                }
            }
            self.reap();
        };

        self.drain().await;
        if self.timer.is_armed().await {
            info!("Capture still pending");
        }
        result
    }

    /// Classify and route one line.
    pub async fn handle_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        debug!("Received: {}", line);

        let event = Event::parse(line);
        let captured_at = Utc::now();

        match &event {
            Event::Unrecognized { raw } => {
                warn!("Unrecognized controller line: {:?}", raw);
                return;
            }
            Event::DelayUpdate { delay } => {
                self.delay = *delay;
                info!("Camera delay changed to {:?}", delay);
                return;
            }
            _ => info!("{}", event),
        }

        self.route(&event, captured_at);

        if event.is_trigger() {
            let capture = Arc::clone(&self.capture);
            self.timer
                .arm(self.delay, async move {
                    capture.capture_persist_and_deliver().await;
                })
                .await;
        }
    }

    /// Spawn persistence and delivery for an event, if it has a sink.
    fn route(&mut self, event: &Event, captured_at: chrono::DateTime<Utc>) {
        let kind = EventKind::from(event);
        let (Some(descriptor), Some(body)) = (self.registry.lookup(kind), Body::from_event(event))
        else {
            return;
        };

        let descriptor = Arc::new(descriptor.clone());
        let payload = Arc::new(Payload::new(&self.device_id, body, captured_at));

        let persistence = Arc::clone(&self.persistence);
        let (d, p) = (Arc::clone(&descriptor), Arc::clone(&payload));
        self.in_flight.spawn(async move {
            if let Err(e) = persistence.persist(&d, &p).await {
                error!("Error saving {} payload: {}", d.kind, e);
            }
        });

        let delivery = Arc::clone(&self.delivery);
        self.in_flight.spawn(async move {
            match delivery.deliver(&descriptor, &payload).await {
                Ok(status) => info!("Server response for {}: {}", descriptor.kind, status),
                Err(e) => error!("Request for {} failed: {}", descriptor.kind, e),
            }
        });
    }

    /// Collect finished sink tasks without waiting.
    fn reap(&mut self) {
        while let Some(done) = self.in_flight.try_join_next() {
            if let Err(e) = done {
                error!("Sink task panicked: {}", e);
            }
        }
    }

    /// Wait for every in-flight sink call.
    pub async fn drain(&mut self) {
        if !self.in_flight.is_empty() {
            debug!("Draining {} sink task(s)", self.in_flight.len());
        }
        while let Some(done) = self.in_flight.join_next().await {
            if let Err(e) = done {
                error!("Sink task panicked: {}", e);
            }
        }
    }

    /// Drain sinks and drop any pending capture.
    pub async fn shutdown(&mut self) {
        self.drain().await;
        self.timer.cancel().await;
    }
}
