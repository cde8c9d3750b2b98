//! HTTP messaging-gateway channel.
//!
//! [`HttpGateway`] POSTs a JSON envelope to the surrounding system's
//! message-send endpoint and classifies the response status into
//! [`SendError`]. One call is one attempt; the executor owns backoff.

use std::time::Duration;

use uuid::Uuid;

use crate::{OutboundChannel, SendError};

/// Default HTTP request timeout for a single delivery attempt.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Configuration for the HTTP gateway channel.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Message-send endpoint URL.
    pub url: String,
    /// Optional bearer token.
    pub auth_token: Option<String>,
    /// Request timeout (defaults to 10 s).
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `GATEWAY_URL` is not set, signalling that the HTTP
    /// gateway is not configured.
    ///
    /// | Variable               | Required | Default |
    /// |------------------------|----------|---------|
    /// | `GATEWAY_URL`          | yes      | —       |
    /// | `GATEWAY_TOKEN`        | no       | —       |
    /// | `GATEWAY_TIMEOUT_SECS` | no       | `10`    |
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("GATEWAY_URL").ok()?;
        let timeout_secs = std::env::var("GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Some(Self {
            url,
            auth_token: std::env::var("GATEWAY_TOKEN").ok(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// ---------------------------------------------------------------------------
// HttpGateway
// ---------------------------------------------------------------------------

/// Delivers rendered text through an HTTP messaging gateway.
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    /// Create a new gateway channel with a pre-configured HTTP client.
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, config }
    }
}

/// Map a non-success HTTP status to the delivery error taxonomy.
///
/// 429 is the gateway's rate limit; 404/410 mean the recipient is gone;
/// other 4xx are content-level rejections; 5xx and 408 are treated as
/// transient timeouts.
fn classify_status(status: u16) -> SendError {
    match status {
        429 => SendError::RateLimited,
        404 | 410 => SendError::RecipientUnreachable(format!("gateway returned HTTP {status}")),
        408 => SendError::Timeout(format!("gateway returned HTTP {status}")),
        400..=499 => SendError::ContentRejected(format!("gateway returned HTTP {status}")),
        _ => SendError::Timeout(format!("gateway returned HTTP {status}")),
    }
}

#[async_trait::async_trait]
impl OutboundChannel for HttpGateway {
    async fn send(
        &self,
        recipient: &str,
        text: &str,
        idempotency_key: Uuid,
    ) -> Result<(), SendError> {
        let payload = serde_json::json!({
            "recipient": recipient,
            "text": text,
        });

        let mut request = self
            .client
            .post(&self.config.url)
            .header("Idempotency-Key", idempotency_key.to_string())
            .json(&payload);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SendError::Timeout("request timed out".to_string())
            } else {
                SendError::Timeout(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let err = classify_status(status.as_u16());
        tracing::warn!(recipient, status = status.as_u16(), error = %err, "Gateway send failed");
        Err(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_status_is_transient() {
        let err = classify_status(429);
        assert!(matches!(err, SendError::RateLimited));
        assert!(err.is_transient());
    }

    #[test]
    fn gone_recipient_is_permanent() {
        for status in [404, 410] {
            let err = classify_status(status);
            assert!(matches!(err, SendError::RecipientUnreachable(_)), "{status}");
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn client_errors_are_content_rejections() {
        assert!(matches!(classify_status(400), SendError::ContentRejected(_)));
        assert!(matches!(classify_status(422), SendError::ContentRejected(_)));
    }

    #[test]
    fn server_errors_are_transient() {
        for status in [408, 500, 502, 503] {
            assert!(classify_status(status).is_transient(), "{status}");
        }
    }

    #[test]
    fn from_env_returns_none_without_gateway_url() {
        std::env::remove_var("GATEWAY_URL");
        assert!(GatewayConfig::from_env().is_none());
    }
}
