use super::{FetchError, RateSource, check_status};
use crate::entities::{CurrencyCode, FeedSpec, RateSnapshot};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use time::OffsetDateTime;
use tracing::{debug, warn};

/// BTC prices from a blockchain.info-style ticker.
///
/// `GET {api_url}` answers one entry per fiat currency:
/// `{"USD":{"15m":67010.1,"last":67012.5,"buy":...,"sell":...,"symbol":"$"},...}`.
/// Only the `last` price of the feed's quote currencies is kept.
pub struct BlockchainTickerSource {
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    last: Decimal,
}

impl BlockchainTickerSource {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

fn parse_response(
    feed: &FeedSpec,
    body: &[u8],
    fetched_at: OffsetDateTime,
) -> Result<RateSnapshot, FetchError> {
    let ticker: HashMap<CurrencyCode, TickerEntry> =
        serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut rates = BTreeMap::new();
    for code in &feed.quote_currencies {
        match ticker.get(code) {
            Some(entry) => {
                rates.insert(code.clone(), entry.last);
            }
            None => warn!(feed = %feed.name, currency = %code, "Ticker has no entry for quote currency"),
        }
    }

    // The ticker is always priced in BTC.
    Ok(RateSnapshot::new(feed.base_currency.clone(), rates, fetched_at))
}

#[async_trait]
impl RateSource for BlockchainTickerSource {
    async fn fetch(&self, feed: &FeedSpec) -> Result<RateSnapshot, FetchError> {
        debug!(feed = %feed.name, url = %feed.api_url, "Fetching ticker");

        let response = self.http_client.get(feed.api_url.clone()).send().await?;
        let body = check_status(response).await?.bytes().await?;
        parse_response(feed, &body, OffsetDateTime::now_utc())
    }

    fn name(&self) -> &'static str {
        "blockchain-ticker"
    }
}
