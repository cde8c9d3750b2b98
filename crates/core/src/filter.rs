//! Strongly-typed audience filter.
//!
//! A campaign's audience is the conjunction of the optional criteria below,
//! evaluated once against the recipient directory at resolution time.
//! The struct is validated when the campaign is saved and defensively
//! re-validated before resolution, so the resolver never re-parses a loose
//! filter document.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;

/// Timezone assumed for recipients that never picked one; the
/// `default_timezone_only` toggle restricts a campaign to exactly these.
pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";

/// Audience predicate for a campaign.
///
/// `None` means "any" for the optional criteria. `exclude_blocked` defaults
/// to `true` and is applied on every resolution.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct AudienceFilter {
    /// Only recipients in [`DEFAULT_TIMEZONE`].
    #[serde(default)]
    pub default_timezone_only: bool,

    /// Match the recipient's formal-address preference exactly.
    #[serde(default)]
    pub formal_address: Option<bool>,

    /// Allow-list of ISO 639-1 language codes.
    #[serde(default)]
    #[validate(custom(function = validate_language_codes))]
    pub languages: Option<Vec<String>>,

    /// Require completed onboarding.
    #[serde(default)]
    pub require_onboarding_completed: bool,

    /// Require notifications to be enabled.
    #[serde(default)]
    pub require_notifications_enabled: bool,

    /// Match the recipient's notification interval preference exactly.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub notification_interval_hours: Option<i32>,

    /// Only recipients inactive for at least this many days.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub min_inactive_days: Option<i32>,

    /// Exclude blocked recipients. Always applied unless explicitly disabled.
    #[serde(default = "default_exclude_blocked")]
    pub exclude_blocked: bool,
}

fn default_exclude_blocked() -> bool {
    true
}

impl Default for AudienceFilter {
    fn default() -> Self {
        Self {
            default_timezone_only: false,
            formal_address: None,
            languages: None,
            require_onboarding_completed: false,
            require_notifications_enabled: false,
            notification_interval_hours: None,
            min_inactive_days: None,
            exclude_blocked: true,
        }
    }
}

impl AudienceFilter {
    /// Validate the filter, mapping constraint violations to [`CoreError`].
    pub fn validate_filter(&self) -> Result<(), CoreError> {
        Validate::validate(self).map_err(|e| CoreError::Validation(e.to_string()))
    }
}

/// A language code must be exactly two lowercase ASCII letters.
fn validate_language_codes(languages: &Vec<String>) -> Result<(), ValidationError> {
    for code in languages {
        let well_formed =
            code.len() == 2 && code.chars().all(|c| c.is_ascii_lowercase() && c.is_ascii_alphabetic());
        if !well_formed {
            let mut err = ValidationError::new("language_code");
            err.message = Some(format!("Invalid language code '{code}'").into());
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_valid() {
        assert!(AudienceFilter::default().validate_filter().is_ok());
    }

    #[test]
    fn default_filter_excludes_blocked() {
        assert!(AudienceFilter::default().exclude_blocked);
    }

    #[test]
    fn empty_json_deserializes_with_exclude_blocked_on() {
        let filter: AudienceFilter = serde_json::from_str("{}").unwrap();
        assert!(filter.exclude_blocked);
        assert!(filter.languages.is_none());
    }

    #[test]
    fn valid_language_codes_accepted() {
        let filter = AudienceFilter {
            languages: Some(vec!["de".into(), "en".into()]),
            ..Default::default()
        };
        assert!(filter.validate_filter().is_ok());
    }

    #[test]
    fn uppercase_language_code_rejected() {
        let filter = AudienceFilter {
            languages: Some(vec!["DE".into()]),
            ..Default::default()
        };
        assert!(filter.validate_filter().is_err());
    }

    #[test]
    fn three_letter_language_code_rejected() {
        let filter = AudienceFilter {
            languages: Some(vec!["deu".into()]),
            ..Default::default()
        };
        assert!(filter.validate_filter().is_err());
    }

    #[test]
    fn negative_inactive_days_rejected() {
        let filter = AudienceFilter {
            min_inactive_days: Some(-1),
            ..Default::default()
        };
        assert!(filter.validate_filter().is_err());
    }

    #[test]
    fn negative_notification_interval_rejected() {
        let filter = AudienceFilter {
            notification_interval_hours: Some(-6),
            ..Default::default()
        };
        assert!(filter.validate_filter().is_err());
    }

    #[test]
    fn filter_round_trips_through_json() {
        let filter = AudienceFilter {
            default_timezone_only: true,
            formal_address: Some(true),
            languages: Some(vec!["de".into()]),
            min_inactive_days: Some(14),
            ..Default::default()
        };
        let json = serde_json::to_value(&filter).unwrap();
        let back: AudienceFilter = serde_json::from_value(json).unwrap();
        assert_eq!(back, filter);
    }
}
