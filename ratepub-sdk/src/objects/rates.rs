use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSON content of a published rate event.
///
/// Field order is part of the wire format: consumers and the event id both
/// see `baseCurrency`, `rates`, `updatedAt`, `source` in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateContent {
    pub base_currency: CompactString,
    pub rates: BTreeMap<CompactString, Decimal>,
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub updated_at: String,
    /// Host name of the upstream API.
    pub source: String,
}
