use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Where a price quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteSource {
    Manual,
    Injected,
}

/// A price quote for `pair` on `chain_id`. The latest row per
/// `(chain_id, pair)` is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleQuote {
    pub chain_id: String,
    pub pair: String,
    pub price: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub as_of: OffsetDateTime,
    pub source: QuoteSource,
}
