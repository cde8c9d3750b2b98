//! Campaign entity model and DTOs.

use herald_core::types::{DbId, Timestamp};
use herald_core::{AudienceFilter, CoreError, Tone};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `campaigns` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Campaign {
    pub id: DbId,
    pub draft_text: String,
    pub topic: Option<String>,
    /// Tone name; parse with [`Campaign::tone`].
    pub tone: String,
    /// Audience filter JSON; parse with [`Campaign::audience_filter`].
    pub filter: serde_json::Value,
    pub test_mode: bool,
    pub within_hours: i32,
    pub not_after: Option<Timestamp>,
    pub status_id: StatusId,
    pub total_targets: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub scheduled_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Campaign {
    /// Parse the stored tone name.
    pub fn tone(&self) -> Result<Tone, CoreError> {
        Tone::parse(&self.tone)
    }

    /// Deserialize the stored audience filter.
    pub fn audience_filter(&self) -> Result<AudienceFilter, CoreError> {
        serde_json::from_value(self.filter.clone())
            .map_err(|e| CoreError::Validation(format!("Malformed audience filter: {e}")))
    }
}

fn default_within_hours() -> i32 {
    24
}

/// DTO for creating a new campaign (saved in `draft` status).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaign {
    pub draft_text: String,
    #[serde(default)]
    pub topic: Option<String>,
    pub tone: Tone,
    #[serde(default)]
    pub filter: AudienceFilter,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_within_hours")]
    pub within_hours: i32,
    #[serde(default)]
    pub not_after: Option<Timestamp>,
}

/// DTO for updating a draft campaign. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCampaign {
    pub draft_text: Option<String>,
    pub topic: Option<String>,
    pub tone: Option<Tone>,
    pub filter: Option<AudienceFilter>,
    pub test_mode: Option<bool>,
    pub within_hours: Option<i32>,
    pub not_after: Option<Timestamp>,
}

/// Query parameters for campaign listing.
#[derive(Debug, Default, Deserialize)]
pub struct CampaignListQuery {
    /// Filter by status ID.
    pub status_id: Option<StatusId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
