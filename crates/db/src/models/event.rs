//! Durable campaign event log models.

use herald_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `campaign_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CampaignEventRow {
    pub id: DbId,
    pub campaign_id: DbId,
    pub target_id: Option<DbId>,
    /// Dot-separated event name, e.g. `"target.sent"`.
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
