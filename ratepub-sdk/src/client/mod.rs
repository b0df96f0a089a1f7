//! WebSocket relay client.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types and signing do not pull in a WebSocket stack.

mod relay;

pub use relay::{DEFAULT_RESPONSE_TIMEOUT, RelayClient};

use crate::objects::RelayMessageError;
use tokio_tungstenite::tungstenite;

/// Errors produced by the relay client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// TCP/TLS connect or WebSocket handshake failure.
    #[error("connect error: {0}")]
    Connect(#[source] tungstenite::Error),

    /// Failure while writing or reading a frame.
    #[error("websocket error: {0}")]
    WebSocket(#[source] tungstenite::Error),

    /// The event could not be framed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The relay sent a frame that could not be parsed.
    #[error("malformed relay message: {0}")]
    Malformed(#[from] RelayMessageError),

    /// The relay answered `["OK", id, false, reason]`.
    #[error("relay rejected event: {0}")]
    Rejected(String),

    /// No connection or no `OK` within the response timeout.
    #[error("relay did not answer within {0:?}")]
    Timeout(std::time::Duration),

    /// The relay closed the connection before acknowledging.
    #[error("connection closed before acknowledgement")]
    ConnectionClosed,

    /// [`RelayClient::close`] has already been called.
    #[error("relay client is closed")]
    Closed,
}
