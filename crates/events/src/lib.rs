//! Herald event bus and durable campaign event log.
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`CampaignEvent`] — the canonical event envelope for campaign and
//!   target transitions.
//! - [`EventPersistence`] — background service that durably writes every
//!   event to the `campaign_events` table.
//!
//! The executor publishes one event per terminal target transition, so the
//! bus doubles as the terminal-transition stream for any observer that
//! wants to aggregate outcomes without polling.

pub mod bus;
pub mod persistence;

pub use bus::{CampaignEvent, EventBus};
pub use persistence::EventPersistence;

/// Well-known event names stored in `campaign_events.event_type`.
pub mod event_type {
    /// Campaign entered preview (bulk render finished).
    pub const CAMPAIGN_PREVIEW: &str = "campaign.preview";
    /// Campaign was scheduled and planning completed.
    pub const CAMPAIGN_SCHEDULED: &str = "campaign.scheduled";
    /// Campaign delivery started.
    pub const CAMPAIGN_STARTED: &str = "campaign.started";
    /// Every target reached a terminal status.
    pub const CAMPAIGN_DONE: &str = "campaign.done";
    /// Operator cancelled the campaign.
    pub const CAMPAIGN_CANCELLED: &str = "campaign.cancelled";
    /// A target was delivered.
    pub const TARGET_SENT: &str = "target.sent";
    /// A target failed permanently.
    pub const TARGET_FAILED: &str = "target.failed";
    /// A target was skipped (deadline, eligibility, cancellation).
    pub const TARGET_SKIPPED: &str = "target.skipped";
}
