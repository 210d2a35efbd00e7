//! Webhook gateway
//!
//! Sends a transcript to the user-configured webhook and turns the answer
//! into an [`AssistantReply`]. One attempt per turn; retrying is left to the
//! user. Every transport or decoding failure is classified into a
//! [`GatewayError`] before it leaves this module.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::GatewayError;

/// Longest slice of an error body kept in messages
const BODY_SNIPPET_LEN: usize = 200;

/// Cap on the TCP/TLS connect phase
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transcript sent by the connectivity test
const PING_TRANSCRIPT: &str = "ping";

/// Reply produced by a successful webhook round-trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    /// Text to display and optionally speak
    pub text: String,
    /// `false` when the assistant asked to end the conversation
    pub should_continue_listening: bool,
}

/// One turn's worth of input for the gateway
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    /// Webhook URL (non-empty)
    pub webhook_url: &'a str,
    /// Bearer token, if configured
    pub auth_token: Option<&'a SecretString>,
    /// What the user said (non-empty)
    pub transcript: &'a str,
    /// Session the turn belongs to
    pub session_id: &'a str,
}

/// Acknowledgement from a connectivity test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// HTTP status returned by the webhook
    pub status: u16,
    /// Round-trip time
    pub latency: Duration,
}

/// Sends transcripts to the assistant backend
#[async_trait]
pub trait AssistantGateway: Send + Sync {
    /// Perform one request/response round-trip
    async fn dispatch(&self, request: TurnRequest<'_>) -> Result<AssistantReply, GatewayError>;
}

/// Request body posted to the webhook
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookRequest<'a> {
    transcript: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    test: bool,
}

/// Response body expected from the webhook
#[derive(Debug, Deserialize)]
struct WebhookResponse {
    text: String,
    #[serde(rename = "continue", default)]
    continue_listening: Option<bool>,
}

/// HTTP implementation of [`AssistantGateway`]
#[derive(Debug, Clone)]
pub struct WebhookGateway {
    client: Client,
    timeout: Duration,
}

impl WebhookGateway {
    /// Create a gateway whose requests time out after `timeout`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(CONNECT_TIMEOUT))
            .user_agent(concat!("openclaw-assistant/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, timeout })
    }

    /// Check the webhook accepts requests with this token
    ///
    /// Posts a ping transcript flagged as a test; any 2xx counts as success.
    /// Persisting the verified flag is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns a classified error if the webhook is unreachable or refuses
    pub async fn test_connection(
        &self,
        webhook_url: &str,
        auth_token: Option<&SecretString>,
    ) -> Result<Ack, GatewayError> {
        let body = WebhookRequest {
            transcript: PING_TRANSCRIPT,
            auth_token: auth_token.map(ExposeSecret::expose_secret),
            session_id: None,
            test: true,
        };

        tracing::debug!(url = webhook_url, "testing webhook connection");
        let started = Instant::now();
        let response = self.post(webhook_url, auth_token, &body).await?;
        let status = response.status();
        check_status(status, response).await?;

        let ack = Ack {
            status: status.as_u16(),
            latency: started.elapsed(),
        };
        tracing::info!(status = ack.status, latency = ?ack.latency, "webhook connection ok");
        Ok(ack)
    }

    async fn post(
        &self,
        webhook_url: &str,
        auth_token: Option<&SecretString>,
        body: &WebhookRequest<'_>,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut req = self.client.post(webhook_url).json(body);

        if let Some(token) = auth_token {
            req = req.bearer_auth(token.expose_secret());
        }

        req.send().await.map_err(|e| self.classify_transport(&e))
    }

    fn classify_transport(&self, e: &reqwest::Error) -> GatewayError {
        let err = if e.is_timeout() {
            GatewayError::Network(format!("request timed out after {:?}", self.timeout))
        } else if e.is_builder() {
            GatewayError::Network(format!("invalid webhook request: {e}"))
        } else {
            GatewayError::Network(e.to_string())
        };
        tracing::warn!(error = %err, "webhook request failed");
        err
    }
}

#[async_trait]
impl AssistantGateway for WebhookGateway {
    async fn dispatch(&self, request: TurnRequest<'_>) -> Result<AssistantReply, GatewayError> {
        let body = WebhookRequest {
            transcript: request.transcript,
            auth_token: request.auth_token.map(ExposeSecret::expose_secret),
            session_id: Some(request.session_id),
            test: false,
        };

        tracing::debug!(
            url = request.webhook_url,
            session_id = request.session_id,
            chars = request.transcript.len(),
            "dispatching transcript"
        );

        let response = self
            .post(request.webhook_url, request.auth_token, &body)
            .await?;
        let status = response.status();
        let response = check_status(status, response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Network(format!("failed to read reply: {e}")))?;
        let reply = parse_reply(&bytes)?;

        tracing::info!(
            status = %status,
            reply_len = reply.text.len(),
            continue_listening = reply.should_continue_listening,
            "webhook replied"
        );
        Ok(reply)
    }
}

/// Map a non-success status to a gateway error, passing success through
async fn check_status(
    status: StatusCode,
    response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let snippet = snippet(&body);
    tracing::warn!(status = %status, body = %snippet, "webhook returned error status");

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::Authentication(format!("webhook rejected credentials ({status})"))
        }
        _ if snippet.is_empty() => GatewayError::Server(status.to_string()),
        _ => GatewayError::Server(format!("{status}: {snippet}")),
    })
}

/// Decode a webhook reply body
fn parse_reply(body: &[u8]) -> Result<AssistantReply, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(GatewayError::Malformed("empty response body".to_string()));
    }

    let parsed: WebhookResponse = serde_json::from_slice(body)
        .map_err(|e| GatewayError::Malformed(e.to_string()))?;

    Ok(AssistantReply {
        text: parsed.text.trim().to_string(),
        should_continue_listening: parsed.continue_listening.unwrap_or(true),
    })
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_SNIPPET_LEN) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
