//! Outbound message channels.
//!
//! [`OutboundChannel`] is the seam between the delivery executor and
//! whatever actually carries the message: the bundled implementations are
//! an HTTP messaging gateway ([`http::HttpGateway`]) and SMTP
//! ([`smtp::SmtpChannel`]). A channel reports the outcome of exactly one
//! attempt; retry policy belongs to the executor.

pub mod http;
pub mod smtp;

use async_trait::async_trait;
use uuid::Uuid;

pub use http::{GatewayConfig, HttpGateway};
pub use smtp::{SmtpChannel, SmtpConfig};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Outcome classification for a single delivery attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
    /// The gateway asked us to slow down. Transient.
    #[error("Rate limited by the outbound gateway")]
    RateLimited,

    /// The attempt timed out or the gateway had a temporary fault. Transient.
    #[error("Outbound send timed out: {0}")]
    Timeout(String),

    /// The recipient does not exist or can no longer be reached. Permanent.
    #[error("Recipient unreachable: {0}")]
    RecipientUnreachable(String),

    /// The gateway refused the message content. Permanent.
    #[error("Content rejected: {0}")]
    ContentRejected(String),
}

impl SendError {
    /// Whether the executor should retry this attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, SendError::RateLimited | SendError::Timeout(_))
    }
}

// ---------------------------------------------------------------------------
// OutboundChannel
// ---------------------------------------------------------------------------

/// A capability that delivers rendered text to one recipient address.
///
/// `recipient` is the directory's delivery address (chat id, phone number,
/// or email, depending on the implementation). `idempotency_key` is unique
/// per target so gateways that deduplicate can suppress double sends across
/// retries.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        text: &str,
        idempotency_key: Uuid,
    ) -> Result<(), SendError>;
}
