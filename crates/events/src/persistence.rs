//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! broadcast channel and writes every received [`CampaignEvent`] to the
//! `campaign_events` table. It runs as a long-lived background task and
//! shuts down gracefully when the bus sender is dropped.

use tokio::sync::broadcast;

use herald_core::types::DbId;
use herald_db::repositories::EventRepo;
use herald_db::DbPool;

use crate::bus::CampaignEvent;

/// Background service that persists campaign events to the database.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop.
    ///
    /// Subscribes to the event bus via the provided `receiver` and persists
    /// every event it receives. The loop exits when the channel is closed
    /// (i.e. the [`EventBus`](crate::bus::EventBus) is dropped).
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<CampaignEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            campaign_id = event.campaign_id,
                            "Failed to persist campaign event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    /// Write a single event to the `campaign_events` table.
    async fn persist(pool: &DbPool, event: &CampaignEvent) -> Result<DbId, sqlx::Error> {
        EventRepo::insert(
            pool,
            event.campaign_id,
            event.target_id,
            &event.event_type,
            &event.payload,
        )
        .await
    }
}
