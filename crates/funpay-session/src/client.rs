use std::time::Instant;

use async_trait::async_trait;
use funpay_protocol::{EncodedPayload, ProtocolError};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates supported `SessionError` values.
pub enum SessionError {
    #[error("missing golden key")]
    MissingGoldenKey,
    #[error("session is not authorized")]
    Unauthorized,
    #[error("marketplace rate limited the request")]
    RateLimited,
    #[error("request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("message to chat {chat_id} was not delivered: {reason}")]
    MessageNotDelivered { chat_id: i64, reason: String },
    #[error("session has no csrf token; fetch the landing page first")]
    MissingCsrfToken,
}

impl SessionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(error) if error.is_timeout())
    }
}

#[async_trait]
/// Trait contract for `SessionClient` behavior.
pub trait SessionClient: Send + Sync {
    /// One round trip to the shared long-poll endpoint.
    async fn poll(&self, payload: &EncodedPayload) -> Result<Value, SessionError>;

    /// Raw HTML of the sales listing.
    async fn fetch_orders_page(&self) -> Result<String, SessionError>;

    /// When the marketplace last answered 429 to any call made through this client.
    fn last_rate_limited_at(&self) -> Option<Instant>;
}
