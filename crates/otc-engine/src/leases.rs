use otc_primitives::DealId;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-deal lease table: every mutation of a deal's record is
/// serialized behind the `tokio::sync::Mutex` keyed by its id, so an
/// overlapping tick can never race the same deal (spec.md §4.6's
/// "tick must be re-entrant-safe" requirement). Deliberately a plain
/// `HashMap` behind a sync mutex rather than a concurrent map crate —
/// lease acquisition is cheap and uncontended across distinct deals.
#[derive(Default)]
pub struct Leases {
    table: SyncMutex<HashMap<DealId, Arc<AsyncMutex<()>>>>,
}

impl Leases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lease for `deal_id`, blocking other holders of the
    /// same id until the guard is dropped.
    pub async fn acquire(&self, deal_id: DealId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock();
            table.entry(deal_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serializes_access_to_the_same_deal() {
        let leases = Leases::new();
        let deal_id = DealId::new();
        let _first = leases.acquire(deal_id).await;
        let second = tokio::time::timeout(std::time::Duration::from_millis(20), leases.acquire(deal_id)).await;
        assert!(second.is_err(), "second acquire should block while the first guard is held");
    }

    #[tokio::test]
    async fn distinct_deals_do_not_contend() {
        let leases = Leases::new();
        let _first = leases.acquire(DealId::new()).await;
        let second = tokio::time::timeout(std::time::Duration::from_millis(20), leases.acquire(DealId::new())).await;
        assert!(second.is_ok());
    }
}
