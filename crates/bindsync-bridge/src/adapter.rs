use async_trait::async_trait;
use thiserror::Error;

use bindsync_types::message::Platform;

/// Typed send failures so the cause stays diagnosable per call site. The
/// relay core logs these and moves on: a failed dispatch leaves the
/// record persisted with that platform's native id unset, and is never
/// retried.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter not connected")]
    NotConnected,

    #[error("platform rejected send ({status}): {body}")]
    Platform { status: u16, body: String },

    #[error("malformed platform response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Outbound half of a platform integration. Implementations own the
/// platform SDK/HTTP details; the core only needs "send this text,
/// optionally anchored to native id X, and give me the new native id".
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether the platform connection is currently up (health reporting).
    fn is_connected(&self) -> bool;

    async fn send(&self, text: &str, reply_to: Option<i64>) -> Result<i64, AdapterError>;
}

/// An inbound platform event, as delivered by an adapter's event loop.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// The platform's own id for this message.
    pub native_id: i64,
    pub username: String,
    pub text: String,
    /// Native id of the message this one replies to, when the platform
    /// reported one.
    pub reply_to_native: Option<i64>,
}
