use super::CurrencyCode;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Rates fetched from one upstream call.
///
/// Created fresh per fetch and dropped once the event built from it has
/// been published (or the attempt failed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSnapshot {
    pub base_currency: CurrencyCode,
    /// Units of each quote currency per one unit of the base currency.
    pub rates: BTreeMap<CurrencyCode, Decimal>,
    pub fetched_at: OffsetDateTime,
}

impl RateSnapshot {
    pub fn new(
        base_currency: impl Into<CurrencyCode>,
        rates: BTreeMap<CurrencyCode, Decimal>,
        fetched_at: OffsetDateTime,
    ) -> Self {
        Self {
            base_currency: base_currency.into(),
            rates,
            fetched_at,
        }
    }

    pub fn rate(&self, code: &str) -> Option<Decimal> {
        self.rates.get(code).copied()
    }
}
