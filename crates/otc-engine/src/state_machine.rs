//! The Deal State Machine (C6): guard predicates and enqueue-item
//! builders for spec.md §4.4. Transitions that need a chain plugin
//! (escrow generation, USD/native quoting) live on [`crate::Engine`];
//! everything here is pure given the values it's handed.

use otc_commission::{self, Obligation};
use otc_primitives::{
    AssetSpec, ClosedState, Collection, CollectionState, CommissionPlan, DealId, EscrowAccount, Party,
    PartyDetails, PerSide, Purpose, QueueItem, QueueItemId, RevertedState, WaitingState,
};
use otc_registry::AssetRegistry;
use std::collections::HashMap;

/// Computes the funding obligation for one side, falling back to 8
/// decimals and the side's own asset code if the registry doesn't
/// know the chain (keeps the engine usable against an incomplete
/// registry in tests rather than refusing to progress).
pub fn obligation_for_side(
    side: &AssetSpec,
    commission: &otc_primitives::CommissionReq,
    registry: &AssetRegistry,
) -> Obligation {
    let decimals = registry.decimals_of(&side.chain_id, &side.asset_code).unwrap_or(8) as u32;
    let native = registry.native_asset_of(&side.chain_id).unwrap_or(side.asset_code.as_str());
    otc_commission::obligation_for(side, commission, native, decimals)
        .expect("commission must be frozen before funding is evaluated")
}

/// Both sides fully funded per spec.md §4.3.
pub fn both_fully_funded(
    side_a: &AssetSpec,
    side_b: &AssetSpec,
    plan: &CommissionPlan,
    collection: &PerSide<Collection>,
    registry: &AssetRegistry,
) -> bool {
    let obligation_a = obligation_for_side(side_a, &plan.side_a, registry);
    let obligation_b = obligation_for_side(side_b, &plan.side_b, registry);
    otc_commission::is_fully_funded(&obligation_a, collection.get(Party::A))
        && otc_commission::is_fully_funded(&obligation_b, collection.get(Party::B))
}

/// Builds the queue items for one side entering WAITING (spec.md
/// §4.4.1): SWAP_PAYOUT, OP_COMMISSION (when nonzero), and
/// zero-or-more SURPLUS_REFUND items, one per asset with residual
/// balance.
#[allow(clippy::too_many_arguments)]
pub fn enqueue_items_for_side(
    deal_id: DealId,
    side: Party,
    side_spec: &AssetSpec,
    commission: &otc_primitives::CommissionReq,
    escrow: &PerSide<EscrowAccount>,
    party_details: &PerSide<PartyDetails>,
    collection: &Collection,
    registry: &AssetRegistry,
    operator_address: &str,
) -> Vec<QueueItem> {
    let counterparty = side.other();
    let from = escrow.get(side).clone();
    let obligation = obligation_for_side(side_spec, commission, registry);

    let mut items = vec![QueueItem::new(
        deal_id,
        Purpose::SwapPayout,
        from.clone(),
        party_details.get(counterparty).recipient_address.clone(),
        obligation.send_asset.clone(),
        obligation.send_amount,
    )];

    let commission_amount = otc_commission::collectible_commission(&obligation, collection);
    if !commission_amount.is_zero() {
        items.push(QueueItem::new(
            deal_id,
            Purpose::OpCommission,
            from.clone(),
            operator_address.to_string(),
            obligation.commission_asset.clone(),
            commission_amount,
        ));
    }

    let surplus = otc_commission::surplus_after_reservation(&obligation, collection);
    let mut surplus: Vec<_> = surplus.into_iter().collect();
    surplus.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
    for (asset, amount) in surplus {
        items.push(QueueItem::new(
            deal_id,
            Purpose::SurplusRefund,
            from.clone(),
            party_details.get(side).payback_address.clone(),
            asset,
            amount,
        ));
    }

    items
}

/// Builds the WAITING stage from a funded COLLECTION stage, and the
/// matching queue items for both sides.
pub fn enter_waiting(
    deal_id: DealId,
    collection_state: &CollectionState,
    plan: &CommissionPlan,
    side_a: &AssetSpec,
    side_b: &AssetSpec,
    registry: &AssetRegistry,
    operator_addresses: &HashMap<String, String>,
) -> (WaitingState, Vec<QueueItem>) {
    let mut items = Vec::new();
    for (side, spec, commission) in [(Party::A, side_a, &plan.side_a), (Party::B, side_b, &plan.side_b)] {
        let operator = operator_addresses.get(&spec.chain_id).cloned().unwrap_or_default();
        items.extend(enqueue_items_for_side(
            deal_id,
            side,
            spec,
            commission,
            &collection_state.escrow,
            &collection_state.party_details,
            collection_state.collection.get(side),
            registry,
            &operator,
        ));
    }

    let state = WaitingState {
        party_details: collection_state.party_details.clone(),
        escrow: collection_state.escrow.clone(),
        collection: collection_state.collection.clone(),
        queue_item_ids: items.iter().map(|i| i.id).collect(),
    };
    (state, items)
}

/// Builds the `TIMEOUT_REFUND` items for one side's still-held
/// balances (spec.md §4.4.2). `balances` are the current on-chain
/// balances per asset, as reported by `get_balance` — not the
/// `collectedByAsset` running total, to catch late-arriving deposits.
pub fn refund_items_for_side(
    deal_id: DealId,
    escrow: &EscrowAccount,
    payback_address: &str,
    balances: &[(otc_primitives::FullyQualifiedAsset, rust_decimal::Decimal)],
) -> Vec<QueueItem> {
    balances
        .iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(asset, amount)| {
            QueueItem::new(deal_id, Purpose::TimeoutRefund, escrow.clone(), payback_address.to_string(), asset.clone(), *amount)
        })
        .collect()
}

/// Every asset this side has ever had a nonzero deposit in — the set
/// `TIMEOUT_REFUND` must check `getBalance` for (spec.md §4.4.2).
pub fn assets_with_activity(collection: &Collection) -> Vec<otc_primitives::FullyQualifiedAsset> {
    collection.collected_by_asset.keys().cloned().collect()
}

pub fn reverted_from_collection(state: &CollectionState, refund_item_ids: Vec<QueueItemId>) -> RevertedState {
    RevertedState {
        party_details: state.party_details.map(|d| Some(d.clone())),
        collection: state.collection.clone(),
        refund_item_ids,
    }
}

pub fn reverted_from_waiting(state: &WaitingState, refund_item_ids: Vec<QueueItemId>) -> RevertedState {
    RevertedState {
        party_details: state.party_details.map(|d| Some(d.clone())),
        collection: state.collection.clone(),
        refund_item_ids,
    }
}

pub fn closed_from_waiting(state: &WaitingState) -> ClosedState {
    ClosedState {
        party_details: state.party_details.clone(),
        collection: state.collection.clone(),
        queue_item_ids: state.queue_item_ids.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otc_primitives::{CommissionReq, Deposit};
    use rust_decimal::Decimal;
    use time::OffsetDateTime;

    fn registry() -> AssetRegistry {
        let mut r = AssetRegistry::new();
        r.register(otc_registry::AssetInfo { chain_id: "ETH".into(), asset_code: "USDC".into(), decimals: 6, is_native: false });
        r.register(otc_registry::AssetInfo { chain_id: "ETH".into(), asset_code: "ETH".into(), decimals: 18, is_native: true });
        r
    }

    fn deposit(asset: &str, amount: Decimal) -> Deposit {
        Deposit {
            txid: "t1".into(),
            asset: asset.parse().unwrap(),
            amount,
            confirms: 1,
            block_time: None,
            first_seen_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn surplus_produces_its_own_queue_item() {
        let deal_id = DealId::new();
        let side = AssetSpec { chain_id: "ETH".into(), asset_code: "USDC".into(), amount: Decimal::new(100, 0) };
        let commission = CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true };
        let escrow = PerSide::new(
            EscrowAccount { address: "escrow-a".into(), key_ref: "k".into() },
            EscrowAccount { address: "escrow-b".into(), key_ref: "k".into() },
        );
        let details = PerSide::new(
            PartyDetails {
                payback_address: "payback-a".into(),
                recipient_address: "recipient-a".into(),
                email: None,
                filled_at: OffsetDateTime::now_utc(),
                locked: true,
            },
            PartyDetails {
                payback_address: "payback-b".into(),
                recipient_address: "recipient-b".into(),
                email: None,
                filled_at: OffsetDateTime::now_utc(),
                locked: true,
            },
        );
        let mut collection = Collection::default();
        collection.observe(deposit("USDC@ETH", Decimal::new(105, 0)));

        let registry = registry();
        let items = enqueue_items_for_side(
            deal_id,
            Party::A,
            &side,
            &commission,
            &escrow,
            &details,
            &collection,
            &registry,
            "operator-eth",
        );

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].purpose, Purpose::SwapPayout);
        assert_eq!(items[0].to, "recipient-b");
        assert_eq!(items[0].amount, Decimal::new(100, 0));
        assert_eq!(items[1].purpose, Purpose::OpCommission);
        assert_eq!(items[1].to, "operator-eth");
        assert_eq!(items[1].amount, Decimal::new(3, 1));
        assert_eq!(items[2].purpose, Purpose::SurplusRefund);
        assert_eq!(items[2].to, "payback-a");
        assert_eq!(items[2].amount, Decimal::new(47, 1));
    }

    #[test]
    fn both_fully_funded_requires_commission_coverage_on_each_side() {
        let registry = registry();
        let side_a = AssetSpec { chain_id: "ETH".into(), asset_code: "USDC".into(), amount: Decimal::new(100, 0) };
        let side_b = AssetSpec { chain_id: "ETH".into(), asset_code: "USDC".into(), amount: Decimal::new(50, 0) };
        let plan = CommissionPlan {
            side_a: CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true },
            side_b: CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true },
        };
        let mut collection_a = Collection::default();
        collection_a.observe(deposit("USDC@ETH", Decimal::new(100, 0)));
        let collection_b = Collection::default();
        let collection = PerSide::new(collection_a, collection_b);

        assert!(!both_fully_funded(&side_a, &side_b, &plan, &collection, &registry));
    }
}
