use crate::leases::Leases;
use otc_chain_api::ChainPlugin;
use otc_registry::AssetRegistry;
use otc_store::Store;
use otc_watcher::Watcher;
use std::collections::HashMap;
use std::sync::Arc;

/// Options the engine needs beyond what it reads from the store —
/// spec.md §6.3's `MAX_ATTEMPTS_PER_ITEM` and per-chain
/// `OPERATOR_ADDRESS`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_attempts_per_item: u32,
    pub operator_addresses: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_attempts_per_item: 10, operator_addresses: HashMap::new() }
    }
}

/// Owns the deal lifecycle: creation, party-detail submission,
/// cancellation, and the periodic tick that drives the state machine
/// (C6) and transaction queue (C7) forward. One instance per running
/// broker.
pub struct Engine {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) registry: Arc<AssetRegistry>,
    pub(crate) plugins: HashMap<String, Arc<dyn ChainPlugin>>,
    pub(crate) watchers: HashMap<String, Arc<Watcher>>,
    pub(crate) leases: Leases,
    pub(crate) config: EngineConfig,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<AssetRegistry>,
        plugins: HashMap<String, Arc<dyn ChainPlugin>>,
        watchers: HashMap<String, Arc<Watcher>>,
        config: EngineConfig,
    ) -> Self {
        Self { store, registry, plugins, watchers, leases: Leases::new(), config }
    }

    pub(crate) fn plugin_for(&self, chain_id: &str) -> Result<&Arc<dyn ChainPlugin>, otc_primitives::OtcError> {
        self.plugins
            .get(chain_id)
            .ok_or_else(|| otc_primitives::OtcError::Invariant(format!("no chain plugin registered for {chain_id}")))
    }

    // Thin `spawn_blocking` wrappers around the synchronous [`Store`].

    pub(crate) async fn load_deal(&self, id: otc_primitives::DealId) -> Result<Option<otc_primitives::Deal>, otc_primitives::StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.get_deal(id))
            .await
            .map_err(|e| otc_primitives::StoreError::Backend(e.to_string()))?
    }

    pub(crate) async fn save_deal(&self, deal: otc_primitives::Deal) -> Result<(), otc_primitives::StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.put_deal(&deal))
            .await
            .map_err(|e| otc_primitives::StoreError::Backend(e.to_string()))?
    }

    pub(crate) async fn list_active_deal_ids(&self) -> Result<Vec<otc_primitives::DealId>, otc_primitives::StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.list_active_deal_ids())
            .await
            .map_err(|e| otc_primitives::StoreError::Backend(e.to_string()))?
    }

    pub(crate) async fn put_queue_item(&self, item: &otc_primitives::QueueItem) -> Result<(), otc_primitives::StoreError> {
        let store = self.store.clone();
        let item = item.clone();
        tokio::task::spawn_blocking(move || store.put_queue_item(&item))
            .await
            .map_err(|e| otc_primitives::StoreError::Backend(e.to_string()))?
    }

    pub(crate) async fn list_queue_items_for_deal(
        &self,
        deal_id: otc_primitives::DealId,
    ) -> Result<Vec<otc_primitives::QueueItem>, otc_primitives::StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.list_queue_items_for_deal(deal_id))
            .await
            .map_err(|e| otc_primitives::StoreError::Backend(e.to_string()))?
    }

    pub(crate) async fn list_active_queue_items(&self) -> Result<Vec<otc_primitives::QueueItem>, otc_primitives::StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.list_active_queue_items())
            .await
            .map_err(|e| otc_primitives::StoreError::Backend(e.to_string()))?
    }
}

/// A read-only snapshot of engine-wide state, used by the binary's
/// health surface and by tests.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct EngineSnapshot {
    pub deals_by_stage: HashMap<String, u64>,
    pub queue_items_by_status: HashMap<String, u64>,
}

impl Engine {
    /// Counts deals per stage and queue items per status across the
    /// whole store. Blocking; intended for infrequent health checks,
    /// not the hot path.
    pub async fn snapshot(&self) -> Result<EngineSnapshot, otc_primitives::StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            let mut snapshot = EngineSnapshot::default();
            for id in store.list_active_deal_ids()? {
                if let Some(deal) = store.get_deal(id)? {
                    *snapshot.deals_by_stage.entry(deal.stage.name().to_string()).or_insert(0) += 1;
                }
            }
            for item in store.list_active_queue_items()? {
                *snapshot.queue_items_by_status.entry(format!("{:?}", item.status)).or_insert(0) += 1;
            }
            Ok(snapshot)
        })
        .await
        .map_err(|e| otc_primitives::StoreError::Backend(e.to_string()))?
    }
}
