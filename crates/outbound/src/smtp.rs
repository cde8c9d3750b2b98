//! SMTP channel.
//!
//! [`SmtpChannel`] wraps the `lettre` async SMTP transport for deployments
//! where the recipient directory stores email addresses. Configuration is
//! loaded from environment variables; if `SMTP_HOST` is not set,
//! [`SmtpConfig::from_env`] returns `None` and no channel should be
//! constructed.

use uuid::Uuid;

use crate::{OutboundChannel, SendError};

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@herald.local";

/// Subject line for broadcast emails.
const SUBJECT: &str = "[Herald] Update";

// ---------------------------------------------------------------------------
// SmtpConfig
// ---------------------------------------------------------------------------

/// Configuration for the SMTP channel.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl SmtpConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable        | Required | Default                 |
    /// |-----------------|----------|-------------------------|
    /// | `SMTP_HOST`     | yes      | —                       |
    /// | `SMTP_PORT`     | no       | `587`                   |
    /// | `SMTP_FROM`     | no       | `noreply@herald.local`  |
    /// | `SMTP_USER`     | no       | —                       |
    /// | `SMTP_PASSWORD` | no       | —                       |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// SmtpChannel
// ---------------------------------------------------------------------------

/// Delivers rendered text as a plain-text email.
pub struct SmtpChannel {
    config: SmtpConfig,
}

impl SmtpChannel {
    /// Create a new SMTP channel with the given configuration.
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl OutboundChannel for SmtpChannel {
    async fn send(
        &self,
        recipient: &str,
        text: &str,
        idempotency_key: Uuid,
    ) -> Result<(), SendError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let from = self
            .config
            .from_address
            .parse()
            .map_err(|e| SendError::ContentRejected(format!("bad from address: {e}")))?;
        let to = recipient
            .parse()
            .map_err(|e| SendError::RecipientUnreachable(format!("bad address: {e}")))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .message_id(Some(format!("<{idempotency_key}@herald.local>")))
            .body(text.to_string())
            .map_err(|e| SendError::ContentRejected(format!("message build failed: {e}")))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| SendError::Timeout(format!("SMTP relay setup failed: {e}")))?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer
            .send(email)
            .await
            .map_err(|e| SendError::Timeout(format!("SMTP transport error: {e}")))?;

        tracing::info!(recipient, "Broadcast email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
