//! Publisher.
//!
//! The Publisher is responsible for:
//! - Signing an unsigned event through an [`EventSigner`]
//! - Sending the signed event through the shared [`RelayTransport`]
//! - Bounding the send by the publish timeout
//!
//! The send runs as its own task and reports into a `oneshot` slot; the
//! publisher waits on that slot and a timer, whichever settles first. When
//! the timer wins the late result is discarded. The transport bounds its own
//! wait as well, so an abandoned send releases the connection soon after.
//! There are no retries here: the next scheduled tick is the retry.

use async_trait::async_trait;
use ratepub_sdk::client::{ClientError, RelayClient};
use ratepub_sdk::objects::{SignedEvent, UnsignedEvent};
use ratepub_sdk::signature::{Keys, SignatureError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Errors from the signing or send layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The event could not be signed
    #[error("signing error: {0}")]
    Signing(#[from] SignatureError),

    /// Relay connection or protocol failure
    #[error("relay error: {0}")]
    Relay(#[from] ClientError),

    /// The send task ended without reporting a result
    #[error("publish task ended without a result")]
    TaskFailed,
}

/// Errors that can occur during a publish attempt.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The relay did not acknowledge in time
    #[error("relay did not acknowledge within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Attaches identity fields to events.
pub trait EventSigner: Send + Sync {
    fn sign(&self, event: UnsignedEvent) -> Result<SignedEvent, SignatureError>;

    fn public_key_hex(&self) -> String;
}

impl EventSigner for Keys {
    fn sign(&self, event: UnsignedEvent) -> Result<SignedEvent, SignatureError> {
        Keys::sign(self, event)
    }

    fn public_key_hex(&self) -> String {
        Keys::public_key_hex(self)
    }
}

/// Delivers signed events to the relay.
///
/// A single transport is shared by every feed for the life of the process
/// and closed once on shutdown.
#[async_trait]
pub trait RelayTransport: Send + Sync + 'static {
    /// Send the event and wait for the relay's acknowledgement.
    async fn send(&self, event: &SignedEvent) -> Result<(), TransportError>;

    /// Release the connection. Returns `true` only the first time.
    async fn close(&self) -> bool;

    fn relay_url(&self) -> &str;
}

#[async_trait]
impl RelayTransport for RelayClient {
    async fn send(&self, event: &SignedEvent) -> Result<(), TransportError> {
        self.publish(event).await.map_err(TransportError::from)
    }

    async fn close(&self) -> bool {
        RelayClient::close(self).await
    }

    fn relay_url(&self) -> &str {
        self.url().as_str()
    }
}

/// Signs and sends events under a timeout.
pub struct Publisher {
    signer: Box<dyn EventSigner>,
    transport: Arc<dyn RelayTransport>,
    timeout: Duration,
}

impl Publisher {
    /// Create a new Publisher.
    ///
    /// # Arguments
    ///
    /// * `signer` - Holder of the signing key
    /// * `transport` - Shared relay connection
    /// * `timeout` - How long to wait for the relay's acknowledgement
    pub fn new(
        signer: Box<dyn EventSigner>,
        transport: Arc<dyn RelayTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            signer,
            transport,
            timeout,
        }
    }

    pub fn relay_url(&self) -> &str {
        self.transport.relay_url()
    }

    pub fn public_key_hex(&self) -> String {
        self.signer.public_key_hex()
    }

    /// Sign `event` and send it, failing with [`PublishError::Timeout`] if
    /// the relay has not acknowledged within the timeout.
    pub async fn publish(&self, event: UnsignedEvent) -> Result<SignedEvent, PublishError> {
        let d = event.replaceable_tag().unwrap_or_default().to_string();
        let signed = self.signer.sign(event).map_err(TransportError::from)?;

        info!(
            event_id = %signed.id,
            d = %d,
            pubkey = %signed.pubkey,
            relay = %self.transport.relay_url(),
            "Publishing event"
        );

        let (result_tx, result_rx) = oneshot::channel();
        let transport = Arc::clone(&self.transport);
        let outgoing = signed.clone();
        tokio::spawn(async move {
            let result = transport.send(&outgoing).await;
            if result_tx.send(result).is_err() {
                debug!(event_id = %outgoing.id, "Discarding late relay result");
            }
        });

        tokio::select! {
            settled = result_rx => match settled {
                Ok(Ok(())) => Ok(signed),
                Ok(Err(e)) => Err(PublishError::Transport(e)),
                Err(_) => Err(PublishError::Transport(TransportError::TaskFailed)),
            },
            _ = tokio::time::sleep(self.timeout) => Err(PublishError::Timeout(self.timeout)),
        }
    }

    /// Release the relay connection. Safe to call more than once.
    pub async fn close(&self) -> bool {
        self.transport.close().await
    }
}
