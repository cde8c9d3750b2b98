//! Campaign and target state machines.
//!
//! Status IDs match the 1-based seed order of the `campaign_statuses` and
//! `target_statuses` lookup tables. The IDs are intentionally duplicated
//! from the `db` crate's enums because `core` must have zero internal deps.

/// Campaign lifecycle transitions.
///
/// draft -> preview -> scheduled -> sending -> {done, cancelled}; every
/// non-terminal state may also move straight to cancelled.
pub mod campaign {
    /// Returns the set of valid target status IDs reachable from `from_status`.
    ///
    /// Terminal states (Done=5, Cancelled=6) return an empty slice because no
    /// further transitions are allowed.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            // Draft -> Preview, Cancelled
            1 => &[2, 6],
            // Preview -> Scheduled, Cancelled
            2 => &[3, 6],
            // Scheduled -> Sending, Cancelled
            3 => &[4, 6],
            // Sending -> Done, Cancelled
            4 => &[5, 6],
            // Terminal states: Done, Cancelled
            5 | 6 => &[],
            // Unknown status: no transitions allowed
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!(
                "campaign {} ({from}) -> {} ({to})",
                status_name(from),
                status_name(to)
            ))
        }
    }

    /// Human-readable name for a status ID (for error messages).
    pub fn status_name(id: i16) -> &'static str {
        match id {
            1 => "Draft",
            2 => "Preview",
            3 => "Scheduled",
            4 => "Sending",
            5 => "Done",
            6 => "Cancelled",
            _ => "Unknown",
        }
    }

    /// Whether the status is terminal (no further campaign or target mutation).
    pub fn is_terminal(id: i16) -> bool {
        matches!(id, 5 | 6)
    }
}

/// Target lifecycle transitions.
///
/// pending -> rendered -> sending -> {sent, failed, skipped}; pending and
/// rendered targets can be skipped directly (cancellation, deadline,
/// eligibility loss). Sending is the transient in-flight claim state.
pub mod target {
    /// Returns the set of valid status IDs reachable from `from_status`.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            // Pending -> Rendered, Skipped
            1 => &[2, 6],
            // Rendered -> Sending, Skipped
            2 => &[3, 6],
            // Sending -> Sent, Failed, Skipped
            3 => &[4, 5, 6],
            // Terminal states: Sent, Failed, Skipped
            4 | 5 | 6 => &[],
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Human-readable name for a status ID.
    pub fn status_name(id: i16) -> &'static str {
        match id {
            1 => "Pending",
            2 => "Rendered",
            3 => "Sending",
            4 => "Sent",
            5 => "Failed",
            6 => "Skipped",
            _ => "Unknown",
        }
    }

    /// Whether the status is terminal.
    pub fn is_terminal(id: i16) -> bool {
        matches!(id, 4 | 5 | 6)
    }
}

/// Why a target ended in the skipped status. Stored in `targets.skip_reason`.
pub mod skip_reason {
    /// The delivery window or `not_after` cutoff elapsed before the send.
    pub const DEADLINE_EXCEEDED: &str = "deadline_exceeded";
    /// The recipient was blocked between targeting and send.
    pub const RECIPIENT_BLOCKED: &str = "recipient_blocked";
    /// The recipient disabled notifications between targeting and send.
    pub const NOTIFICATIONS_DISABLED: &str = "notifications_disabled";
    /// The campaign was cancelled while the target was still open.
    pub const CAMPAIGN_CANCELLED: &str = "campaign_cancelled";
    /// No template exists for the target's language, even after fallback.
    pub const UNSUPPORTED_LANGUAGE: &str = "unsupported_language";
}
