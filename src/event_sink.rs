//! Best-effort publication of domain events.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publishing never fails the caller; sinks log their own delivery problems.
    async fn publish(&self, event: &DomainEvent);
}

/// Publishes each event as JSON on its `gallery.*` subject.
pub struct NatsEventSink { client: async_nats::Client }

impl NatsEventSink {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventSink for NatsEventSink {
    async fn publish(&self, event: &DomainEvent) {
        let subject = event.subject();
        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => { warn!(subject = %subject, error = %e, "Failed to encode event"); return; }
        };
        if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
            warn!(subject = %subject, error = %e, "Failed to publish event");
        }
    }
}

/// Used when no message bus is configured.
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn publish(&self, event: &DomainEvent) { debug!(subject = %event.subject(), "Event bus disabled, dropping event"); }
}

/// Keeps every published event in memory.
#[derive(Clone, Default)]
pub struct RecordingEventSink { events: Arc<Mutex<Vec<DomainEvent>>> }

impl RecordingEventSink {
    pub fn new() -> Self { Self::default() }
    pub async fn events(&self) -> Vec<DomainEvent> { self.events.lock().await.clone() }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, event: &DomainEvent) { self.events.lock().await.push(event.clone()); }
}
