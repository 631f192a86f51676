use crate::oracle::OracleQuote;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a side's commission is computed and denominated.
///
/// The `PERCENT_BPS` / `NATIVE`-currency mixing question spec.md §9
/// flags as open is resolved here: `PERCENT_BPS` commission is always
/// denominated in the side's send asset (see DESIGN.md §"Open
/// Questions").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CommissionReq {
    /// A fixed USD amount, converted to the chain's native asset at
    /// the moment the deal enters COLLECTION and frozen from then on.
    FixedUsdNative {
        usd_fixed: Decimal,
        /// Frozen when entering COLLECTION; `None` beforehand.
        native_fixed: Option<Decimal>,
        oracle_quote: Option<OracleQuote>,
        covered_by_surplus: bool,
    },
    /// A percentage of the send amount, in basis points, denominated
    /// in the send asset.
    PercentBps { percent_bps: u32, covered_by_surplus: bool },
}

impl CommissionReq {
    pub fn covered_by_surplus(&self) -> bool {
        match self {
            Self::FixedUsdNative { covered_by_surplus, .. } => *covered_by_surplus,
            Self::PercentBps { covered_by_surplus, .. } => *covered_by_surplus,
        }
    }

    /// `true` once any USD-native freeze has happened (always true for
    /// `PercentBps`, which needs no freeze).
    pub fn is_frozen(&self) -> bool {
        match self {
            Self::FixedUsdNative { native_fixed, .. } => native_fixed.is_some(),
            Self::PercentBps { .. } => true,
        }
    }

    /// Freezes a `FixedUsdNative` requirement against a pinned quote.
    /// No-op for `PercentBps`.
    pub fn freeze(&mut self, quote: OracleQuote, native_amount: Decimal) {
        if let Self::FixedUsdNative { native_fixed, oracle_quote, .. } = self {
            *native_fixed = Some(native_amount);
            *oracle_quote = Some(quote);
        }
    }
}

/// The commission requirement for both sides of a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionPlan {
    pub side_a: CommissionReq,
    pub side_b: CommissionReq,
}
