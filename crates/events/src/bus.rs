//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`CampaignEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` across the executor, the
//! persistence service, and any additional observers.

use chrono::{DateTime, Utc};
use herald_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// CampaignEvent
// ---------------------------------------------------------------------------

/// A campaign- or target-level transition that occurred in the engine.
///
/// Constructed via [`CampaignEvent::new`] and enriched with the builder
/// methods [`with_target`](CampaignEvent::with_target) and
/// [`with_payload`](CampaignEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignEvent {
    /// Dot-separated event name from [`crate::event_type`].
    pub event_type: String,

    /// The campaign the event belongs to.
    pub campaign_id: DbId,

    /// The target the event belongs to, when target-scoped.
    pub target_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl CampaignEvent {
    /// Create a new campaign-scoped event.
    pub fn new(event_type: impl Into<String>, campaign_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            campaign_id,
            target_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Scope the event to a single target.
    pub fn with_target(mut self, target_id: DbId) -> Self {
        self.target_id = Some(target_id);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`CampaignEvent`].
pub struct EventBus {
    sender: broadcast::Sender<CampaignEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    /// The persistence layer (when subscribed) ensures database capture.
    pub fn publish(&self, event: CampaignEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<CampaignEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
