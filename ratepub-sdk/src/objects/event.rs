//! NIP-01 event objects.
//!
//! An [`UnsignedEvent`] carries everything the publisher decides on (kind,
//! timestamp, tags, content). Signing turns it into a [`SignedEvent`] with
//! the identity fields attached; see [`crate::signature`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Parameterized replaceable event kind shared by every rate feed.
///
/// Relays keep only the newest event per `(pubkey, kind, d-tag)`.
pub const EVENT_KIND: u16 = 30078;

/// A single event tag, e.g. `["d", "app-currency-rates"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(Vec<String>);

impl Tag {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }

    /// Tag name (first field), e.g. `d`, `t`, `L`, `l`.
    pub fn name(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Tag value (second field).
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }
}

/// Event before signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedEvent {
    pub kind: u16,
    pub created_at: i64,
    pub tags: Vec<Tag>,
    pub content: String,
}

impl UnsignedEvent {
    /// Canonical NIP-01 serialization used for the event id:
    /// `[0, pubkey, created_at, kind, tags, content]`.
    pub fn canonical_json(&self, pubkey_hex: &str) -> Result<String, serde_json::Error> {
        serde_json::to_string(&(
            0u8,
            pubkey_hex,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        ))
    }

    /// SHA-256 of [`canonical_json`](Self::canonical_json).
    pub fn compute_id(&self, pubkey_hex: &str) -> Result<[u8; 32], serde_json::Error> {
        let json = self.canonical_json(pubkey_hex)?;
        Ok(Sha256::digest(json.as_bytes()).into())
    }

    /// The value of the first `d` tag, if any.
    pub fn replaceable_tag(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name() == Some("d"))
            .and_then(Tag::value)
    }
}

/// Event with identity fields attached, ready to be sent to a relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u16,
    pub tags: Vec<Tag>,
    pub content: String,
    pub sig: String,
}

impl SignedEvent {
    /// Strip the identity fields again.
    pub fn unsigned(&self) -> UnsignedEvent {
        UnsignedEvent {
            kind: self.kind,
            created_at: self.created_at,
            tags: self.tags.clone(),
            content: self.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UnsignedEvent {
        UnsignedEvent {
            kind: EVENT_KIND,
            created_at: 1_700_000_000,
            tags: vec![
                Tag::new(["d", "app-bitcoin-rates"]),
                Tag::new(["l", "BTC", "currency"]),
            ],
            content: "{\"a\":1}".to_string(),
        }
    }

    #[test]
    fn test_canonical_json_layout() {
        let json = sample().canonical_json("ab").unwrap();
        assert_eq!(
            json,
            r#"[0,"ab",1700000000,30078,[["d","app-bitcoin-rates"],["l","BTC","currency"]],"{\"a\":1}"]"#
        );
    }

    #[test]
    fn test_id_changes_with_content() {
        let a = sample();
        let mut b = sample();
        b.content = "{\"a\":2}".to_string();
        assert_ne!(a.compute_id("ab").unwrap(), b.compute_id("ab").unwrap());
        assert_eq!(a.compute_id("ab").unwrap(), sample().compute_id("ab").unwrap());
    }

    #[test]
    fn test_replaceable_tag_lookup() {
        assert_eq!(sample().replaceable_tag(), Some("app-bitcoin-rates"));
        let mut e = sample();
        e.tags.clear();
        assert_eq!(e.replaceable_tag(), None);
    }
}
