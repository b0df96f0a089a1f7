//! Replaceable rate events.
//!
//! Feeds are published as NIP-01 parameterized replaceable events (kind
//! [`EVENT_KIND`]). Each feed owns exactly one `d` tag value, so every
//! publish supersedes the previous one at the relay instead of appending.

pub mod builder;

pub use builder::{BuildError, build_event, format_updated_at};
pub use ratepub_sdk::objects::{EVENT_KIND, SignedEvent, Tag, UnsignedEvent};
