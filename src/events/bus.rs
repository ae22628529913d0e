use std::{error::Error as StdError, sync::Arc, time::Instant};

use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::Event;

/// Failure reported by a listener.
pub type ListenerError = Box<dyn StdError + Send + Sync>;

/// A subscriber to every published event.
pub trait Listener: Send + Sync {
    /// Stable name used in logs and publish errors.
    fn name(&self) -> &'static str;

    fn on_event(&self, event: &Event) -> Result<(), ListenerError>;
}

#[derive(Debug, Error)]
#[error("listener `{listener}` failed handling {event} after {delivered} listener(s) succeeded")]
pub struct PublishError {
    pub listener: &'static str,
    pub event: Event,
    pub delivered: usize,
    #[source]
    pub source: ListenerError,
}

/// Ordered, synchronous fan-out to registered listeners.
///
/// Registration takes `&mut self`, so once the bus is shared behind an `Arc`
/// the listener list is fixed.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Arc<dyn Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn Listener>) {
        debug!(
            target = "verso::events",
            listener = listener.name(),
            position = self.listeners.len(),
            "Listener subscribed"
        );
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn listener_names(&self) -> Vec<&'static str> {
        self.listeners.iter().map(|listener| listener.name()).collect()
    }

    /// Deliver `event` to every listener, stopping at the first failure.
    pub fn publish(&self, event: &Event) -> Result<(), PublishError> {
        let started_at = Instant::now();

        for (delivered, listener) in self.listeners.iter().enumerate() {
            if let Err(source) = listener.on_event(event) {
                counter!("verso_bus_publish_total", "result" => "error").increment(1);
                warn!(
                    target = "verso::events",
                    op = "publish",
                    result = "listener_failed",
                    event_kind = event.kind(),
                    listener = listener.name(),
                    delivered,
                    skipped = self.listeners.len() - delivered - 1,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %source,
                    "Event delivery aborted"
                );
                return Err(PublishError {
                    listener: listener.name(),
                    event: event.clone(),
                    delivered,
                    source,
                });
            }
        }

        counter!("verso_bus_publish_total", "result" => "ok").increment(1);
        info!(
            target = "verso::events",
            op = "publish",
            result = "ok",
            event = %event,
            listeners = self.listeners.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Event delivered"
        );
        Ok(())
    }
}
