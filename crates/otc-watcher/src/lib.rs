//! The Deposit Watcher (C4): one polling task per chain, scanning
//! every active deal's escrow address on that chain and folding newly
//! observed deposits back into the store.

#![warn(rust_2018_idioms)]

use metrics::Counter;
use otc_chain_api::ChainPlugin;
use otc_primitives::{Deal, Deposit, Party, Stage, StoreError};
use otc_store::Store;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct WatcherMetrics {
    deposits_observed: Counter,
    scan_errors: Counter,
}

impl WatcherMetrics {
    fn new(chain_id: &str) -> Self {
        Self {
            deposits_observed: metrics::counter!(
                "otc_watcher_deposits_observed_total",
                "chain" => chain_id.to_string()
            ),
            scan_errors: metrics::counter!(
                "otc_watcher_scan_errors_total",
                "chain" => chain_id.to_string()
            ),
        }
    }
}

/// Polls a single chain's [`ChainPlugin`] on behalf of every active
/// deal with an escrow on that chain.
pub struct Watcher {
    plugin: Arc<dyn ChainPlugin>,
    store: Arc<dyn Store>,
    metrics: WatcherMetrics,
}

impl Watcher {
    pub fn new(plugin: Arc<dyn ChainPlugin>, store: Arc<dyn Store>) -> Self {
        let metrics = WatcherMetrics::new(plugin.chain_id());
        Self { plugin, store, metrics }
    }

    /// Scans every active deal with an escrow on this chain once.
    /// Exposed directly so tests (and the binary's health checks) can
    /// drive a single pass without waiting on the interval.
    pub async fn poll_once(&self) -> Result<(), StoreError> {
        let deal_ids = self.list_active_deal_ids().await?;
        for deal_id in deal_ids {
            let Some(mut deal) = self.get_deal(deal_id).await? else { continue };
            for party in [Party::A, Party::B] {
                if deal.side(party).chain_id != self.plugin.chain_id() {
                    continue;
                }
                if let Err(err) = self.poll_side(&mut deal, party).await {
                    self.metrics.scan_errors.increment(1);
                    warn!(
                        chain = self.plugin.chain_id(),
                        deal_id = %deal_id,
                        side = ?party,
                        error = %err,
                        "transient scan error, cursor not advanced"
                    );
                }
            }
        }
        Ok(())
    }

    /// Scans the deposits for one side of a deal. Escrows are scanned
    /// from CREATED onward: `fillPartyDetails` generates each side's
    /// escrow independently of the counterparty, so funds can arrive
    /// before COLLECTION starts, and `cancelDeal` must see them.
    async fn poll_side(&self, deal: &mut Deal, party: Party) -> Result<(), otc_primitives::PluginError> {
        let address = match &deal.stage {
            Stage::Created(state) => match state.escrow.get(party) {
                Some(escrow) => escrow.address.clone(),
                None => return Ok(()),
            },
            Stage::Collection(state) => state.escrow.get(party).address.clone(),
            _ => return Ok(()),
        };

        let cursor = self.get_watcher_cursor(&address).await.unwrap_or(None);
        let result = self.plugin.scan_deposits(&address, cursor.as_deref()).await?;

        let mut observed_new = false;
        for scanned in result.deposits {
            let deposit = Deposit {
                txid: scanned.txid,
                asset: scanned.asset,
                amount: scanned.amount,
                confirms: scanned.confirms,
                block_time: None,
                first_seen_at: time::OffsetDateTime::now_utc(),
            };
            let is_new = self.record_deposit(deal.id, party, deposit.clone()).await.unwrap_or(true);
            let changed = match &mut deal.stage {
                Stage::Created(state) => state.collection.get_mut(party).observe(deposit.clone()),
                Stage::Collection(state) => state.collection.get_mut(party).observe(deposit.clone()),
                _ => continue,
            };
            if is_new && changed {
                observed_new = true;
                deal.push_event(format!(
                    "deposit {} of {} observed for side {party:?}",
                    deposit.txid, deposit.asset
                ));
                info!(deal_id = %deal.id, side = ?party, txid = %deposit.txid, "deposit observed");
                self.metrics.deposits_observed.increment(1);
            }
        }

        if observed_new {
            let _ = self.put_deal(deal.clone()).await;
        }
        debug!(chain = self.plugin.chain_id(), address, next_cursor = %result.next_cursor, "scan complete");
        let _ = self.put_watcher_cursor(address, result.next_cursor).await;
        Ok(())
    }

    // Thin `spawn_blocking` wrappers around the synchronous [`Store`]
    // trait, the same boundary `otc-engine` uses.

    async fn list_active_deal_ids(&self) -> Result<Vec<otc_primitives::DealId>, StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.list_active_deal_ids())
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn get_deal(&self, id: otc_primitives::DealId) -> Result<Option<Deal>, StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.get_deal(id))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn put_deal(&self, deal: Deal) -> Result<(), StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.put_deal(&deal))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn record_deposit(&self, deal_id: otc_primitives::DealId, party: Party, deposit: Deposit) -> Result<bool, StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.record_deposit(deal_id, party, &deposit))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn get_watcher_cursor(&self, address: &str) -> Result<Option<String>, StoreError> {
        let store = self.store.clone();
        let chain_id = self.plugin.chain_id().to_string();
        let address = address.to_string();
        tokio::task::spawn_blocking(move || store.get_watcher_cursor(&chain_id, &address))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    async fn put_watcher_cursor(&self, address: String, cursor: String) -> Result<(), StoreError> {
        let store = self.store.clone();
        let chain_id = self.plugin.chain_id().to_string();
        tokio::task::spawn_blocking(move || store.put_watcher_cursor(&chain_id, &address, &cursor))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otc_chain_api::memory::MemoryChainPlugin;
    use otc_primitives::{
        AssetSpec, Collection, CollectionState, CommissionPlan, CommissionReq, CreatedState, DealId, EscrowAccount,
        FullyQualifiedAsset, PartyDetails, PerSide,
    };
    use otc_store::RocksStore;
    use rust_decimal::Decimal;
    use tempfile::TempDir;
    use time::OffsetDateTime;

    fn party_details() -> PartyDetails {
        PartyDetails {
            payback_address: "payback".into(),
            recipient_address: "recipient".into(),
            email: None,
            filled_at: OffsetDateTime::now_utc(),
            locked: true,
        }
    }

    fn deal_with_escrow(chain_id: &str, address: &str) -> Deal {
        Deal {
            id: DealId::new(),
            timeout_seconds: 3600,
            side_a: AssetSpec { chain_id: chain_id.into(), asset_code: "USDC".into(), amount: Decimal::new(10, 0) },
            side_b: AssetSpec { chain_id: "OTHER".into(), asset_code: "ETH".into(), amount: Decimal::new(1, 0) },
            commission_plan: CommissionPlan {
                side_a: CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true },
                side_b: CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true },
            },
            events: vec![],
            stage: Stage::Collection(CollectionState {
                party_details: PerSide::new(party_details(), party_details()),
                escrow: PerSide::new(
                    EscrowAccount { address: address.to_string(), key_ref: "key-a".into() },
                    EscrowAccount { address: "other-side".into(), key_ref: "key-b".into() },
                ),
                expires_at: OffsetDateTime::now_utc(),
                collection: PerSide::new(Collection::default(), Collection::default()),
            }),
        }
    }

    #[tokio::test]
    async fn observes_a_new_deposit_and_advances_the_cursor() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(RocksStore::open(&dir.path().join("db")).unwrap());
        let plugin = Arc::new(MemoryChainPlugin::new("ETH", 1));
        let asset: FullyQualifiedAsset = "USDC@ETH".parse().unwrap();

        let deal = deal_with_escrow("ETH", "escrow-a");
        store.put_deal(&deal).unwrap();

        plugin.credit_deposit("escrow-a", asset.clone(), Decimal::new(5, 0), 1);

        let watcher = Watcher::new(plugin.clone(), store.clone());
        watcher.poll_once().await.unwrap();

        let updated = store.get_deal(deal.id).unwrap().unwrap();
        let Stage::Collection(state) = &updated.stage else { panic!("expected collection stage") };
        assert_eq!(state.collection.get(Party::A).collected(&asset), Decimal::new(5, 0));
        assert_eq!(store.list_deposits(deal.id, Party::A).unwrap().len(), 1);
        assert!(store.get_watcher_cursor("ETH", "escrow-a").unwrap().is_some());

        // Second pass over the same deposit should not double count.
        watcher.poll_once().await.unwrap();
        let again = store.get_deal(deal.id).unwrap().unwrap();
        let Stage::Collection(state) = &again.stage else { panic!("expected collection stage") };
        assert_eq!(state.collection.get(Party::A).collected(&asset), Decimal::new(5, 0));
    }

    #[tokio::test]
    async fn ignores_escrow_addresses_on_other_chains() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(RocksStore::open(&dir.path().join("db")).unwrap());
        let plugin = Arc::new(MemoryChainPlugin::new("POLYGON", 1));

        let deal = deal_with_escrow("ETH", "escrow-a");
        store.put_deal(&deal).unwrap();

        let watcher = Watcher::new(plugin, store.clone());
        watcher.poll_once().await.unwrap();

        assert!(store.get_watcher_cursor("POLYGON", "escrow-a").unwrap().is_none());
    }

    #[tokio::test]
    async fn observes_deposits_on_a_created_stage_escrow() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(RocksStore::open(&dir.path().join("db")).unwrap());
        let plugin = Arc::new(MemoryChainPlugin::new("ETH", 1));
        let asset: FullyQualifiedAsset = "USDC@ETH".parse().unwrap();

        let deal = Deal {
            id: DealId::new(),
            timeout_seconds: 3600,
            side_a: AssetSpec { chain_id: "ETH".into(), asset_code: "USDC".into(), amount: Decimal::new(10, 0) },
            side_b: AssetSpec { chain_id: "OTHER".into(), asset_code: "ETH".into(), amount: Decimal::new(1, 0) },
            commission_plan: CommissionPlan {
                side_a: CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true },
                side_b: CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true },
            },
            events: vec![],
            stage: Stage::Created(CreatedState {
                party_details: PerSide::new(Some(party_details()), None),
                escrow: PerSide::new(
                    Some(EscrowAccount { address: "escrow-a".into(), key_ref: "key-a".into() }),
                    None,
                ),
                collection: PerSide::new(Collection::default(), Collection::default()),
            }),
        };
        store.put_deal(&deal).unwrap();

        plugin.credit_deposit("escrow-a", asset.clone(), Decimal::new(5, 0), 1);

        let watcher = Watcher::new(plugin, store.clone());
        watcher.poll_once().await.unwrap();

        let updated = store.get_deal(deal.id).unwrap().unwrap();
        let Stage::Created(state) = &updated.stage else { panic!("expected created stage") };
        assert_eq!(state.collection.get(Party::A).collected(&asset), Decimal::new(5, 0));
        assert_eq!(store.list_deposits(deal.id, Party::A).unwrap().len(), 1);
    }
}
