//! The Engine Tick Loop (C8): one pass over the four ordered steps in
//! spec.md §4.6 — load deals, reconcile deposits, advance the state
//! machine, advance the transaction queue.

use crate::engine::Engine;
use crate::state_machine;
use otc_primitives::{
    AssetSpec, Collection, DealId, EscrowAccount, FullyQualifiedAsset, OtcError, Party, Purpose, QueueItem,
    QueueStatus, Stage,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;
use tracing::warn;

impl Engine {
    /// Runs one tick: watcher reconciliation, state machine advance
    /// per deal, then one queue step per non-terminal item.
    pub async fn tick(&self) -> Result<(), OtcError> {
        for watcher in self.watchers.values() {
            if let Err(err) = watcher.poll_once().await {
                warn!(%err, "watcher reconciliation failed");
            }
        }

        let deal_ids = self.list_active_deal_ids().await?;
        for deal_id in deal_ids {
            if let Err(err) = self.advance_deal(deal_id).await {
                warn!(%deal_id, %err, "state machine advance failed for deal");
            }
        }

        self.advance_queue().await;
        Ok(())
    }

    async fn advance_deal(&self, deal_id: DealId) -> Result<(), OtcError> {
        let _lease = self.leases.acquire(deal_id).await;
        let Some(mut deal) = self.load_deal(deal_id).await? else { return Ok(()) };
        if deal.stage.is_terminal() {
            return Ok(());
        }

        let changed = match &deal.stage {
            Stage::Collection(_) => self.advance_collection(&mut deal).await?,
            Stage::Waiting(_) => self.advance_waiting(&mut deal).await?,
            _ => false,
        };

        if changed {
            self.save_deal(deal).await?;
        }
        Ok(())
    }

    async fn advance_collection(&self, deal: &mut otc_primitives::Deal) -> Result<bool, OtcError> {
        let Stage::Collection(state) = deal.stage.clone() else { return Ok(false) };

        let funded = state_machine::both_fully_funded(
            &deal.side_a,
            &deal.side_b,
            &deal.commission_plan,
            &state.collection,
            &self.registry,
        );

        if funded {
            let (waiting, items) = state_machine::enter_waiting(
                deal.id,
                &state,
                &deal.commission_plan,
                &deal.side_a,
                &deal.side_b,
                &self.registry,
                &self.config.operator_addresses,
            );
            for item in &items {
                self.put_queue_item(item).await?;
            }
            deal.stage = Stage::Waiting(waiting);
            deal.push_event("both sides fully funded, entered WAITING");
            return Ok(true);
        }

        if OffsetDateTime::now_utc() >= state.expires_at {
            let mut refund_ids = Vec::new();
            for party in [Party::A, Party::B] {
                refund_ids.extend(
                    self.enqueue_refunds_for_side(
                        deal.id,
                        deal.side(party),
                        state.escrow.get(party),
                        &state.party_details.get(party).payback_address,
                        state.collection.get(party),
                    )
                    .await?,
                );
            }
            deal.stage = Stage::Reverted(state_machine::reverted_from_collection(&state, refund_ids));
            deal.push_event("timed out without full funding, entered REVERTED");
            return Ok(true);
        }

        Ok(false)
    }

    async fn advance_waiting(&self, deal: &mut otc_primitives::Deal) -> Result<bool, OtcError> {
        let Stage::Waiting(state) = deal.stage.clone() else { return Ok(false) };
        let items = self.list_queue_items_for_deal(deal.id).await?;

        if !items.is_empty() && items.iter().all(|i| i.status == QueueStatus::Completed) {
            deal.stage = Stage::Closed(state_machine::closed_from_waiting(&state));
            deal.push_event("all payouts completed, entered CLOSED");
            return Ok(true);
        }

        if items.iter().any(|i| i.status == QueueStatus::Failed) {
            let mut refund_ids = Vec::new();
            for party in [Party::A, Party::B] {
                refund_ids.extend(
                    self.enqueue_refunds_for_side(
                        deal.id,
                        deal.side(party),
                        state.escrow.get(party),
                        &state.party_details.get(party).payback_address,
                        state.collection.get(party),
                    )
                    .await?,
                );
            }
            deal.stage = Stage::Reverted(state_machine::reverted_from_waiting(&state, refund_ids));
            deal.push_event("a payout failed terminally, entered REVERTED");
            return Ok(true);
        }

        Ok(false)
    }

    /// Enqueues `TIMEOUT_REFUND` for one side's current on-chain
    /// balances (spec.md §4.4.2: queried via `getBalance`, not the
    /// running `collectedByAsset` total).
    async fn enqueue_refunds_for_side(
        &self,
        deal_id: DealId,
        side: &AssetSpec,
        escrow: &EscrowAccount,
        payback_address: &str,
        collection: &Collection,
    ) -> Result<Vec<otc_primitives::QueueItemId>, OtcError> {
        let balances = self.current_balances(side, escrow, collection).await?;
        let items = state_machine::refund_items_for_side(deal_id, escrow, payback_address, &balances);
        let mut ids = Vec::with_capacity(items.len());
        for item in &items {
            self.put_queue_item(item).await?;
            ids.push(item.id);
        }
        Ok(ids)
    }

    async fn current_balances(
        &self,
        side: &AssetSpec,
        escrow: &EscrowAccount,
        collection: &Collection,
    ) -> Result<Vec<(FullyQualifiedAsset, Decimal)>, OtcError> {
        let plugin = self.plugin_for(&side.chain_id)?.clone();
        let mut assets = state_machine::assets_with_activity(collection);
        let side_asset = side.qualified_asset();
        if !assets.contains(&side_asset) {
            assets.push(side_asset);
        }

        let mut balances = Vec::with_capacity(assets.len());
        for asset in assets {
            let amount = plugin.get_balance(&escrow.address, &asset.asset_code).await.map_err(OtcError::Plugin)?;
            balances.push((asset, amount));
        }
        Ok(balances)
    }

    /// Advances one step for every non-terminal [`QueueItem`],
    /// grouped and run concurrently per chain (spec.md §4.6 step 4).
    async fn advance_queue(&self) {
        let items = match self.list_active_queue_items().await {
            Ok(items) => items,
            Err(err) => {
                warn!(%err, "failed to list active queue items");
                return;
            }
        };

        let mut by_chain: HashMap<String, Vec<QueueItem>> = HashMap::new();
        for item in items {
            by_chain.entry(item.asset.chain_id.clone()).or_default().push(item);
        }

        futures::future::join_all(by_chain.into_iter().map(|(chain_id, items)| self.advance_chain(chain_id, items)))
            .await;
    }

    async fn advance_chain(&self, chain_id: String, items: Vec<QueueItem>) {
        let plugin = match self.plugin_for(&chain_id) {
            Ok(plugin) => plugin.clone(),
            Err(_) => {
                warn!(chain_id, "no chain plugin registered, skipping queue items");
                return;
            }
        };

        // P8: a side's SURPLUS_REFUND must not reach SUBMITTED before
        // that side's SWAP_PAYOUT and OP_COMMISSION are COMPLETED. A
        // FAILED payout still counts as outstanding here, so this must
        // look past `items` (active-only) at every status for the
        // deal, not just the non-terminal ones.
        let deal_ids: HashSet<DealId> = items.iter().map(|i| i.deal_id).collect();
        let mut primary_outstanding: HashSet<String> = HashSet::new();
        for deal_id in deal_ids {
            let all_items = match self.list_queue_items_for_deal(deal_id).await {
                Ok(items) => items,
                Err(err) => {
                    warn!(%deal_id, %err, "failed to list queue items for deal, skipping P8 check");
                    continue;
                }
            };
            for item in &all_items {
                if matches!(item.purpose, Purpose::SwapPayout | Purpose::OpCommission) && item.status != QueueStatus::Completed {
                    primary_outstanding.insert(item.from.address.clone());
                }
            }
        }

        let max_attempts = self.config.max_attempts_per_item;
        let store = self.store.clone();

        futures::future::join_all(items.into_iter().map(|mut item| {
            let plugin = plugin.clone();
            let store = store.clone();
            let held = item.purpose == Purpose::SurplusRefund && primary_outstanding.contains(&item.from.address);
            async move {
                if held || item.status.is_terminal() {
                    return;
                }
                if crate::queue::step(&mut item, plugin.as_ref(), max_attempts).await {
                    match tokio::task::spawn_blocking(move || store.put_queue_item(&item)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => warn!(%err, "failed to persist queue item after step"),
                        Err(err) => warn!(%err, "queue persistence task panicked"),
                    }
                }
            }
        }))
        .await;
    }
}
