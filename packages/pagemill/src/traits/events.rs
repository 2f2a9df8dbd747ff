//! Pluggable event sink for domain events.
//!
//! The pipeline publishes `DomainEvent`s after each successful write.
//! Publishing is fire-and-forget: sinks must not block, and pipeline
//! correctness never depends on a subscriber being present.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::types::DomainEvent;

/// Receives domain events published by the pipeline.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block.
    fn publish(&self, event: DomainEvent);
}

/// Sink that drops every event. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: DomainEvent) {}
}

/// Sink backed by a tokio broadcast channel.
///
/// Subscribers receive every event published while they are attached;
/// send errors (no active receivers) are ignored.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastSink {
    /// Create a sink with the default buffer (256 events).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a sink with the given buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Attach a new subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: DomainEvent) {
        trace!(?event, "publishing domain event");
        let _ = self.tx.send(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn publish(&self, event: DomainEvent) {
        (**self).publish(event);
    }
}
