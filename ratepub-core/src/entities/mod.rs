//! Feed descriptions and fetched rate data.

mod rate_snapshot;

pub use rate_snapshot::RateSnapshot;

use compact_str::CompactString;
use thiserror::Error;
use url::Url;

/// ISO-4217 style currency code (`USD`, `EUR`, `BTC`, ...).
pub type CurrencyCode = CompactString;

/// Label namespace used for the `L`/`l` classification tags.
pub const CURRENCY_NAMESPACE: &str = "currency";

const MINUTE_MS: i64 = 60_000;

/// Errors raised while validating a [`FeedSpec`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedSpecError {
    #[error("feed name must not be empty")]
    EmptyName,

    #[error("cadence must be at least one minute")]
    ZeroCadence,

    #[error("feed {feed}: replaceable tag must not be empty")]
    EmptyReplaceableTag { feed: String },

    #[error("feed {feed}: at least one quote currency is required")]
    NoQuoteCurrencies { feed: String },

    #[error("feed {feed}: quote currency {code} is listed twice")]
    DuplicateQuoteCurrency { feed: String, code: CurrencyCode },

    #[error("feed {feed}: api url {url} has no host")]
    MissingHost { feed: String, url: Url },
}

/// How often a feed runs. Always a whole, positive number of minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cadence {
    minutes: u32,
}

impl Cadence {
    pub fn from_minutes(minutes: u32) -> Result<Self, FeedSpecError> {
        if minutes == 0 {
            return Err(FeedSpecError::ZeroCadence);
        }
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn as_millis(&self) -> i64 {
        i64::from(self.minutes) * MINUTE_MS
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.minutes % 60 == 0 {
            write!(f, "{}h", self.minutes / 60)
        } else {
            write!(f, "{}m", self.minutes)
        }
    }
}

/// Everything needed to fetch, describe and publish one feed.
///
/// Built once at startup and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSpec {
    /// Short identifier used in logs and on the command line (`fiat`).
    pub name: String,
    pub base_currency: CurrencyCode,
    /// Quote currencies in declaration order. Tag order follows it.
    pub quote_currencies: Vec<CurrencyCode>,
    pub api_url: Url,
    pub cadence: Cadence,
    /// Value of the `d` tag; the relay replaces older events carrying it.
    pub replaceable_tag: String,
    /// Values of the `t` tags, in declaration order.
    pub topics: Vec<String>,
}

impl FeedSpec {
    pub fn validate(&self) -> Result<(), FeedSpecError> {
        if self.name.trim().is_empty() {
            return Err(FeedSpecError::EmptyName);
        }
        let feed = || self.name.clone();
        if self.replaceable_tag.trim().is_empty() {
            return Err(FeedSpecError::EmptyReplaceableTag { feed: feed() });
        }
        if self.quote_currencies.is_empty() {
            return Err(FeedSpecError::NoQuoteCurrencies { feed: feed() });
        }
        for (i, code) in self.quote_currencies.iter().enumerate() {
            if self.quote_currencies[..i].contains(code) {
                return Err(FeedSpecError::DuplicateQuoteCurrency {
                    feed: feed(),
                    code: code.clone(),
                });
            }
        }
        if self.source_host().is_none() {
            return Err(FeedSpecError::MissingHost {
                feed: feed(),
                url: self.api_url.clone(),
            });
        }
        Ok(())
    }

    /// Host name of the upstream API, published as the `source` field.
    pub fn source_host(&self) -> Option<&str> {
        self.api_url.host_str().filter(|h| !h.is_empty())
    }

    /// `(namespace, code)` labels: base currency first, then quote
    /// currencies in declaration order.
    pub fn classification_labels(&self) -> impl Iterator<Item = (&'static str, &str)> {
        std::iter::once(self.base_currency.as_str())
            .chain(self.quote_currencies.iter().map(CurrencyCode::as_str))
            .map(|code| (CURRENCY_NAMESPACE, code))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_cadence_units() {
        let c = Cadence::from_minutes(15).unwrap();
        assert_eq!(c.as_millis(), 900_000);
        assert_eq!(c.to_string(), "15m");
        assert_eq!(Cadence::from_minutes(60).unwrap().to_string(), "1h");
        assert_eq!(Cadence::from_minutes(0), Err(FeedSpecError::ZeroCadence));
    }

    #[test]
    fn test_default_feeds_are_valid() {
        fiat_feed().validate().unwrap();
        bitcoin_feed().validate().unwrap();
    }

    #[test]
    fn test_duplicate_quote_currency_rejected() {
        let mut feed = fiat_feed();
        feed.quote_currencies.push("EUR".into());
        assert_eq!(
            feed.validate(),
            Err(FeedSpecError::DuplicateQuoteCurrency {
                feed: "fiat".into(),
                code: "EUR".into()
            })
        );
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut feed = bitcoin_feed();
        feed.replaceable_tag = " ".into();
        assert!(matches!(
            feed.validate(),
            Err(FeedSpecError::EmptyReplaceableTag { .. })
        ));

        let mut feed = bitcoin_feed();
        feed.quote_currencies.clear();
        assert!(matches!(
            feed.validate(),
            Err(FeedSpecError::NoQuoteCurrencies { .. })
        ));

        let mut feed = bitcoin_feed();
        feed.api_url = Url::parse("data:text/plain,hello").unwrap();
        assert!(matches!(
            feed.validate(),
            Err(FeedSpecError::MissingHost { .. })
        ));
    }

    #[test]
    fn test_classification_labels_order() {
        let labels: Vec<_> = fiat_feed().classification_labels().map(|(_, c)| c.to_string()).collect();
        assert_eq!(labels, ["USD", "EUR", "CAD", "GBP", "JPY", "CNY", "MXN"]);
    }
}
