//! The Commission Calculator (C5). Pure, deterministic, no I/O: every
//! function here takes the values it needs and returns a value, never
//! touching the store or a chain plugin (spec.md §4.3).
//!
//! The `PERCENT_BPS`/currency-mixing question spec.md §9 leaves open
//! is resolved by [`commission_asset_for`]: `PERCENT_BPS` commission
//! is always denominated in the side's send asset. See DESIGN.md.

#![warn(rust_2018_idioms)]

use otc_primitives::{AssetSpec, Collection, CommissionReq, FullyQualifiedAsset};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{HashMap, HashSet};

/// What one side owes in total: its nominal send amount, plus the
/// commission amount and the asset that commission is denominated in
/// (which may or may not coincide with the send asset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obligation {
    pub send_asset: FullyQualifiedAsset,
    pub send_amount: Decimal,
    pub commission_asset: FullyQualifiedAsset,
    pub commission_amount: Decimal,
    /// When `true`, commission is skimmed opportunistically from
    /// whatever surplus the side sends beyond `send_amount` rather
    /// than being a hard funding requirement (see
    /// [`collectible_commission`]).
    pub commission_covered_by_surplus: bool,
}

impl Obligation {
    /// Total balance of `asset` required for this side to count as
    /// funded. Commission only counts toward this when it isn't
    /// `covered_by_surplus` — otherwise funding needs only the send
    /// amount, and commission is collected later from whatever
    /// surplus actually shows up.
    pub fn required_for_funding(&self, asset: &FullyQualifiedAsset) -> Decimal {
        let mut required = Decimal::ZERO;
        if *asset == self.send_asset {
            required += self.send_amount;
        }
        if *asset == self.commission_asset && !self.commission_covered_by_surplus {
            required += self.commission_amount;
        }
        required
    }

    /// Every asset this side owes something in.
    pub fn owed_assets(&self) -> Vec<FullyQualifiedAsset> {
        if self.send_asset == self.commission_asset {
            vec![self.send_asset.clone()]
        } else {
            vec![self.send_asset.clone(), self.commission_asset.clone()]
        }
    }
}

/// Required commission for a `PERCENT_BPS` requirement, rounded up
/// (never rounded down in the broker's favor against the party) at
/// `decimals` precision.
fn ceil_bps(send_amount: Decimal, percent_bps: u32, decimals: u32) -> Decimal {
    let bps = Decimal::from(percent_bps);
    let ten_thousand = Decimal::from(10_000u32);
    (send_amount * bps / ten_thousand).round_dp_with_strategy(decimals, RoundingStrategy::ToPositiveInfinity)
}

/// Computes the required commission amount for a side. For
/// `FIXED_USD_NATIVE`, the requirement must already be frozen (see
/// spec.md §4.4's COLLECTION-entry side effect) — calling this before
/// freezing is a programming error in the caller, not a runtime
/// condition, so it returns `None`.
pub fn required_commission(req: &CommissionReq, send_amount: Decimal, decimals: u32) -> Option<Decimal> {
    match req {
        CommissionReq::PercentBps { percent_bps, .. } => Some(ceil_bps(send_amount, *percent_bps, decimals)),
        CommissionReq::FixedUsdNative { native_fixed, .. } => *native_fixed,
    }
}

/// The asset a side's commission is denominated in.
pub fn commission_asset_for(req: &CommissionReq, side: &AssetSpec, native_asset_code: &str) -> FullyQualifiedAsset {
    match req {
        CommissionReq::PercentBps { .. } => side.qualified_asset(),
        CommissionReq::FixedUsdNative { .. } => {
            FullyQualifiedAsset { asset_code: native_asset_code.to_string(), chain_id: side.chain_id.clone() }
        }
    }
}

/// Builds the full [`Obligation`] for a side. `decimals` is the send
/// asset's display precision (from the asset registry), used only for
/// `PERCENT_BPS` rounding.
pub fn obligation_for(
    side: &AssetSpec,
    req: &CommissionReq,
    native_asset_code: &str,
    decimals: u32,
) -> Option<Obligation> {
    let commission_amount = required_commission(req, side.amount, decimals)?;
    let commission_asset = commission_asset_for(req, side, native_asset_code);
    Some(Obligation {
        send_asset: side.qualified_asset(),
        send_amount: side.amount,
        commission_asset,
        commission_amount,
        commission_covered_by_surplus: req.covered_by_surplus(),
    })
}

/// A side is fully funded when, for every asset it owes, collected
/// amount meets or exceeds what's required (spec.md §4.3).
pub fn is_fully_funded(obligation: &Obligation, collection: &Collection) -> bool {
    obligation
        .owed_assets()
        .iter()
        .all(|asset| collection.collected(asset) >= obligation.required_for_funding(asset))
}

/// The commission actually collectible from a side's deposits. A
/// `covered_by_surplus` commission is never a hard requirement: it's
/// skimmed from whatever the side sent beyond its send amount, capped
/// at both the nominal commission and what's actually available.
/// Otherwise the full nominal commission is owed outright.
pub fn collectible_commission(obligation: &Obligation, collection: &Collection) -> Decimal {
    if !obligation.commission_covered_by_surplus {
        return obligation.commission_amount;
    }
    let collected = collection.collected(&obligation.commission_asset);
    let reserved_for_send =
        if obligation.commission_asset == obligation.send_asset { obligation.send_amount } else { Decimal::ZERO };
    let available = (collected - reserved_for_send).max(Decimal::ZERO);
    obligation.commission_amount.min(available)
}

/// Computes the per-asset surplus remaining on a side once its send
/// obligation and collectible commission are reserved — i.e. what
/// `SURPLUS_REFUND` should return. Assets with zero or negative
/// surplus are omitted (spec.md §4.4.1 rule 3: "computed after (1) and
/// (2) are reserved").
pub fn surplus_after_reservation(
    obligation: &Obligation,
    collection: &Collection,
) -> HashMap<FullyQualifiedAsset, Decimal> {
    let commission_collectible = collectible_commission(obligation, collection);
    let mut assets: HashSet<FullyQualifiedAsset> = collection.collected_by_asset.keys().cloned().collect();
    assets.extend(obligation.owed_assets());

    let mut out = HashMap::new();
    for asset in assets {
        let collected = collection.collected(&asset);
        let mut required = Decimal::ZERO;
        if asset == obligation.send_asset {
            required += obligation.send_amount;
        }
        if asset == obligation.commission_asset {
            required += commission_collectible;
        }
        let surplus = collected - required;
        if surplus > Decimal::ZERO {
            out.insert(asset, surplus);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use otc_primitives::Deposit;
    use proptest::prelude::*;
    use time::OffsetDateTime;

    fn usdc_eth() -> FullyQualifiedAsset {
        "USDC@ETH".parse().unwrap()
    }

    fn side() -> AssetSpec {
        AssetSpec { chain_id: "ETH".into(), asset_code: "USDC".into(), amount: Decimal::new(100, 0) }
    }

    fn deposit(amount: Decimal) -> Deposit {
        Deposit {
            txid: "t1".into(),
            asset: usdc_eth(),
            amount,
            confirms: 1,
            block_time: None,
            first_seen_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn percent_bps_rounds_up() {
        let req = CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true };
        // 100 * 30 / 10000 = 0.3 exactly, no rounding needed.
        let commission = required_commission(&req, Decimal::new(100, 0), 8).unwrap();
        assert_eq!(commission, Decimal::new(3, 1));

        // 333 * 1 / 10000 = 0.0333, ceil at 2 decimals -> 0.04
        let commission2 = required_commission(&req, Decimal::new(333, 0), 2).unwrap();
        assert_eq!(commission2, Decimal::new(4, 2));
    }

    #[test]
    fn fully_funded_requires_every_owed_asset_when_not_covered_by_surplus() {
        let req = CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: false };
        let obligation = obligation_for(&side(), &req, "ETH", 6).unwrap();

        let mut collection = Collection::default();
        collection.observe(deposit(Decimal::new(100, 0)));
        assert!(!is_fully_funded(&obligation, &collection), "commission not yet covered");

        collection.observe(Deposit { txid: "t2".into(), ..deposit(Decimal::new(3, 1)) });
        assert!(is_fully_funded(&obligation, &collection));
    }

    #[test]
    fn covered_by_surplus_does_not_require_commission_upfront() {
        let req = CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true };
        let obligation = obligation_for(&side(), &req, "ETH", 6).unwrap();

        let mut collection = Collection::default();
        collection.observe(deposit(Decimal::new(100, 0)));
        assert!(is_fully_funded(&obligation, &collection), "send amount alone should be enough");
        assert_eq!(collectible_commission(&obligation, &collection), Decimal::ZERO, "nothing to skim yet");
    }

    #[test]
    fn surplus_is_whatever_remains_after_send_and_commission() {
        let req = CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true };
        let obligation = obligation_for(&side(), &req, "ETH", 6).unwrap();

        let mut collection = Collection::default();
        collection.observe(deposit(Decimal::new(105, 0)));

        let surplus = surplus_after_reservation(&obligation, &collection);
        // 105 - 100 - 0.3 = 4.7
        assert_eq!(surplus.get(&usdc_eth()).copied().unwrap(), Decimal::new(47, 1));
    }

    #[test]
    fn fixed_usd_native_without_freeze_has_no_required_amount() {
        let req = CommissionReq::FixedUsdNative {
            usd_fixed: Decimal::new(5, 0),
            native_fixed: None,
            oracle_quote: None,
            covered_by_surplus: false,
        };
        assert!(required_commission(&req, Decimal::new(100, 0), 8).is_none());
    }

    proptest! {
        #[test]
        fn percent_bps_commission_never_rounds_down(amount in 1i64..1_000_000, bps in 1u32..10_000) {
            let send = Decimal::new(amount, 2);
            let commission = ceil_bps(send, bps, 6);
            let exact = send * Decimal::from(bps) / Decimal::from(10_000u32);
            prop_assert!(commission >= exact);
        }
    }
}
