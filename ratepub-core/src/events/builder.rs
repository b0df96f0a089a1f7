use crate::entities::{CURRENCY_NAMESPACE, CurrencyCode, FeedSpec, RateSnapshot};
use ratepub_sdk::objects::{EVENT_KIND, RateContent, Tag, UnsignedEvent};
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// `2024-05-01T14:00:00.000Z`
const UPDATED_AT_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// Errors that can occur while turning a snapshot into an event.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("feed {feed}: snapshot is priced in {actual}, expected {expected}")]
    BaseMismatch {
        feed: String,
        expected: CurrencyCode,
        actual: CurrencyCode,
    },

    #[error("feed {feed}: snapshot has no rate for {code}")]
    MissingRate { feed: String, code: CurrencyCode },

    #[error("feed {feed}: api url has no host")]
    MissingHost { feed: String },

    #[error("timestamp formatting error: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error("content serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Format a build time the way consumers expect `updatedAt`.
pub fn format_updated_at(at: OffsetDateTime) -> Result<String, time::error::Format> {
    at.to_offset(UtcOffset::UTC).format(UPDATED_AT_FORMAT)
}

/// Build the unsigned replaceable event for one feed.
///
/// Pure: the same feed, snapshot and `built_at` always give byte-identical
/// output. `built_at` (not the fetch time) becomes both `created_at` and
/// the content's `updatedAt`.
///
/// Tag order is fixed: `d`, then one `t` per topic, then `L currency`,
/// then one `l` for the base currency followed by one per quote currency.
pub fn build_event(
    feed: &FeedSpec,
    snapshot: &RateSnapshot,
    built_at: OffsetDateTime,
) -> Result<UnsignedEvent, BuildError> {
    if snapshot.base_currency != feed.base_currency {
        return Err(BuildError::BaseMismatch {
            feed: feed.name.clone(),
            expected: feed.base_currency.clone(),
            actual: snapshot.base_currency.clone(),
        });
    }
    if let Some(code) = feed
        .quote_currencies
        .iter()
        .find(|code| snapshot.rate(code.as_str()).is_none())
    {
        return Err(BuildError::MissingRate {
            feed: feed.name.clone(),
            code: code.clone(),
        });
    }
    let source = feed.source_host().ok_or_else(|| BuildError::MissingHost {
        feed: feed.name.clone(),
    })?;

    let content = RateContent {
        base_currency: feed.base_currency.clone(),
        rates: snapshot.rates.clone(),
        updated_at: format_updated_at(built_at)?,
        source: source.to_string(),
    };

    let mut tags = Vec::with_capacity(3 + feed.topics.len() + feed.quote_currencies.len());
    tags.push(Tag::new(["d", feed.replaceable_tag.as_str()]));
    tags.extend(feed.topics.iter().map(|topic| Tag::new(["t", topic.as_str()])));
    tags.push(Tag::new(["L", CURRENCY_NAMESPACE]));
    tags.extend(
        feed.classification_labels()
            .map(|(namespace, code)| Tag::new(["l", code, namespace])),
    );

    Ok(UnsignedEvent {
        kind: EVENT_KIND,
        created_at: built_at.unix_timestamp(),
        tags,
        content: serde_json::to_string(&content)?,
    })
}
