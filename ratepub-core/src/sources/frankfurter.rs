use super::{FetchError, RateSource, check_status};
use crate::entities::{CurrencyCode, FeedSpec, RateSnapshot};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::debug;

/// Fiat rates from a Frankfurter-compatible API.
///
/// `GET {api_url}?from=USD&to=EUR,CAD,...` answers
/// `{"amount":1.0,"base":"USD","date":"2024-05-01","rates":{"EUR":0.93,...}}`.
pub struct FrankfurterSource {
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FrankfurterResponse {
    base: CurrencyCode,
    #[serde(default)]
    date: Option<String>,
    rates: BTreeMap<CurrencyCode, Decimal>,
}

impl FrankfurterSource {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

fn parse_response(body: &[u8], fetched_at: OffsetDateTime) -> Result<RateSnapshot, FetchError> {
    let response: FrankfurterResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    debug!(base = %response.base, date = ?response.date, count = response.rates.len(), "Parsed Frankfurter response");
    Ok(RateSnapshot::new(response.base, response.rates, fetched_at))
}

#[async_trait]
impl RateSource for FrankfurterSource {
    async fn fetch(&self, feed: &FeedSpec) -> Result<RateSnapshot, FetchError> {
        let to = feed
            .quote_currencies
            .iter()
            .map(CurrencyCode::as_str)
            .collect::<Vec<_>>()
            .join(",");

        debug!(feed = %feed.name, url = %feed.api_url, from = %feed.base_currency, %to, "Fetching rates");

        let response = self
            .http_client
            .get(feed.api_url.clone())
            .query(&[("from", feed.base_currency.as_str()), ("to", to.as_str())])
            .send()
            .await?;
        let body = check_status(response).await?.bytes().await?;
        parse_response(&body, OffsetDateTime::now_utc())
    }

    fn name(&self) -> &'static str {
        "frankfurter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use time::macros::datetime;

    #[test]
    fn test_parse_frankfurter_body() {
        let body = br#"{"amount":1.0,"base":"USD","date":"2024-05-01","rates":{"CAD":1.3711,"CNY":7.2374,"EUR":0.93545,"GBP":0.79963,"JPY":157.52,"MXN":17.0425}}"#;
        let at = datetime!(2024-05-01 14:00:01 UTC);
        let snapshot = parse_response(body, at).unwrap();
        assert_eq!(snapshot.base_currency, "USD");
        assert_eq!(snapshot.fetched_at, at);
        assert_eq!(snapshot.rates.len(), 6);
        assert_eq!(snapshot.rate("EUR"), Some(Decimal::from_str("0.93545").unwrap()));
        assert_eq!(snapshot.rate("JPY"), Some(Decimal::from_str("157.52").unwrap()));
    }

    #[test]
    fn test_published_rates_are_keyed_by_code_order() {
        let body = br#"{"amount":1.0,"base":"USD","date":"2024-05-01","rates":{"MXN":17.0425,"EUR":0.93545,"JPY":157.52,"CAD":1.3711,"GBP":0.79963,"CNY":7.2374}}"#;
        let snapshot = parse_response(body, OffsetDateTime::UNIX_EPOCH).unwrap();
        let event = crate::events::build_event(
            &crate::entities::fixtures::fiat_feed(),
            &snapshot,
            datetime!(2024-05-01 14:00 UTC),
        )
        .unwrap();
        assert!(event.content.contains(
            r#""rates":{"CAD":1.3711,"CNY":7.2374,"EUR":0.93545,"GBP":0.79963,"JPY":157.52,"MXN":17.0425}"#
        ));
    }

    #[test]
    fn test_parse_rejects_missing_rates() {
        let body = br#"{"message":"not found"}"#;
        let err = parse_response(body, OffsetDateTime::UNIX_EPOCH).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_response(b"<html>502</html>", OffsetDateTime::UNIX_EPOCH).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
