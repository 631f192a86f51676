use crate::asset::FullyQualifiedAsset;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An inbound on-chain transfer observed into an escrow account.
///
/// Uniquely identified by `(dealId, side, txid, asset)`. `amount` and
/// `asset` are immutable once recorded; `confirms` only ever
/// increases (see P7, the watcher's dedup contract).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub txid: String,
    pub asset: FullyQualifiedAsset,
    pub amount: Decimal,
    pub confirms: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub block_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub first_seen_at: OffsetDateTime,
}

impl Deposit {
    /// Primary key component shared with the side/dealId stored
    /// alongside it in the `deposits` table.
    pub fn identity(&self) -> (&str, &FullyQualifiedAsset) {
        (&self.txid, &self.asset)
    }
}
