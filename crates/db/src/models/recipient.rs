//! Recipient directory models.
//!
//! The engine only reads recipients; rows are maintained by the surrounding
//! bot/admin plumbing. The write helpers in the repository exist for that
//! plumbing and for integration tests.

use herald_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `recipients` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Recipient {
    pub id: DbId,
    /// Delivery address understood by the outbound gateway.
    pub address: String,
    pub language: String,
    pub formal_address: bool,
    /// IANA timezone name.
    pub timezone: String,
    pub active_hours_start: i16,
    pub active_hours_end: i16,
    pub notifications_enabled: bool,
    pub onboarding_completed: bool,
    pub notification_interval_hours: Option<i32>,
    pub last_active_at: Option<Timestamp>,
    pub is_blocked: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The attribute set the resolver snapshots per eligible recipient.
#[derive(Debug, Clone, FromRow)]
pub struct RecipientSnapshot {
    pub id: DbId,
    pub address: String,
    pub language: String,
    pub formal_address: bool,
    pub timezone: String,
    pub active_hours_start: i16,
    pub active_hours_end: i16,
    pub notifications_enabled: bool,
    pub onboarding_completed: bool,
    pub last_active_at: Option<Timestamp>,
    pub is_blocked: bool,
}

/// Live eligibility re-check performed immediately before a send.
#[derive(Debug, Clone, FromRow)]
pub struct SendableState {
    pub address: String,
    pub is_blocked: bool,
    pub notifications_enabled: bool,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_timezone() -> String {
    herald_core::filter::DEFAULT_TIMEZONE.to_string()
}

fn default_active_start() -> i16 {
    8
}

fn default_active_end() -> i16 {
    21
}

fn default_notifications_enabled() -> bool {
    true
}

/// DTO for creating a recipient.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecipient {
    pub address: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub formal_address: bool,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_active_start")]
    pub active_hours_start: i16,
    #[serde(default = "default_active_end")]
    pub active_hours_end: i16,
    #[serde(default = "default_notifications_enabled")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default)]
    pub notification_interval_hours: Option<i32>,
}

impl CreateRecipient {
    /// Convenience constructor with directory defaults.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            language: default_language(),
            formal_address: false,
            timezone: default_timezone(),
            active_hours_start: default_active_start(),
            active_hours_end: default_active_end(),
            notifications_enabled: true,
            onboarding_completed: false,
            notification_interval_hours: None,
        }
    }
}
