//! Event signing (NIP-01 ids, BIP-340 Schnorr signatures).
//!
//! The signing key is a raw 32-byte secp256k1 secret key given as hex.
//! The event id is `sha256([0, pubkey, created_at, kind, tags, content])`
//! and the signature is a Schnorr signature over that id.

use crate::objects::event::{SignedEvent, UnsignedEvent};
use secp256k1::{Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey, schnorr};

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid hex encoding")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("invalid secret key")]
    InvalidSecretKey,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event id does not match its content")]
    IdMismatch,
    #[error("invalid public key or signature encoding")]
    InvalidEncoding,
    #[error("invalid signature")]
    SignatureMismatch,
}

impl From<secp256k1::Error> for SignatureError {
    fn from(_: secp256k1::Error) -> Self {
        Self::InvalidEncoding
    }
}

/// A signing keypair.
///
/// The secret key never leaves this struct; `Debug` only shows the public
/// key.
pub struct Keys {
    secp: Secp256k1<secp256k1::All>,
    keypair: Keypair,
    public_key: XOnlyPublicKey,
}

impl std::fmt::Debug for Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl Keys {
    /// Parse a hex secret key, with or without a `0x` prefix.
    pub fn from_hex(secret_hex: &str) -> Result<Self, SignatureError> {
        let trimmed = secret_hex.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(trimmed)?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(bytes).map_err(|_| SignatureError::InvalidSecretKey)?;
        let keypair = Keypair::from_secret_key(&secp, &secret);
        let (public_key, _parity) = keypair.x_only_public_key();
        Ok(Self {
            secp,
            keypair,
            public_key,
        })
    }

    /// Hex x-only public key, as it appears in the event `pubkey` field.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Compute the event id and attach a signature.
    pub fn sign(&self, event: UnsignedEvent) -> Result<SignedEvent, SignatureError> {
        let pubkey = self.public_key_hex();
        let id = event.compute_id(&pubkey)?;
        let signature = self
            .secp
            .sign_schnorr(&Message::from_digest(id), &self.keypair);
        Ok(SignedEvent {
            id: hex::encode(id),
            pubkey,
            created_at: event.created_at,
            kind: event.kind,
            tags: event.tags,
            content: event.content,
            sig: signature.to_string(),
        })
    }
}

/// Check that a signed event's id matches its content and that the
/// signature is valid for its `pubkey`.
pub fn verify_event(event: &SignedEvent) -> Result<(), SignatureError> {
    let id = event.unsigned().compute_id(&event.pubkey)?;
    if hex::encode(id) != event.id {
        return Err(SignatureError::IdMismatch);
    }
    let public_key = XOnlyPublicKey::from_slice(&hex::decode(&event.pubkey)?)?;
    let signature = schnorr::Signature::from_slice(&hex::decode(&event.sig)?)?;
    let secp = Secp256k1::verification_only();
    secp.verify_schnorr(&signature, &Message::from_digest(id), &public_key)
        .map_err(|_| SignatureError::SignatureMismatch)
}
