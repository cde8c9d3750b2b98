//! Target entity model — one (campaign, recipient) delivery unit.

use herald_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `targets` table.
///
/// `language` and `formal_address` are snapshots taken at resolution time;
/// later directory changes do not alter an already-planned render.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Target {
    pub id: DbId,
    pub campaign_id: DbId,
    pub recipient_id: DbId,
    pub language: String,
    pub formal_address: bool,
    pub planned_send_at: Option<Timestamp>,
    pub rendered_text: Option<String>,
    pub status_id: StatusId,
    /// Failure cause; set only on `failed`.
    pub error: Option<String>,
    /// Skip cause; set only on `skipped`. See `herald_core::state::skip_reason`.
    pub skip_reason: Option<String>,
    pub sent_at: Option<Timestamp>,
    pub last_activity_triggered_at: Option<Timestamp>,
    pub activity_send_count: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Joined row handed to the delivery scheduler: target identity plus the
/// recipient's current timezone and active-hours window.
#[derive(Debug, Clone, FromRow)]
pub struct ScheduleRow {
    pub target_id: DbId,
    pub timezone: String,
    pub active_hours_start: i16,
    pub active_hours_end: i16,
}

/// Per-status target tally for the delivery report.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status_id: StatusId,
    pub count: i64,
}
