use crate::errors::RocksStoreError;
use crate::metrics::StoreMetrics;
use crate::tables;
use crate::traits::Store;
use crate::version::VersionManager;
use otc_primitives::{
    Deal, DealId, Deposit, OracleQuote, Party, QueueItem, QueueItemId, StoreError, Token, TokenSecret,
};
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// RocksDB-backed implementation of [`Store`], one column family per
/// table, following the teacher's (`reth-db-rocks`) table-per-column-
/// family design.
#[derive(Debug)]
pub struct RocksStore {
    db: Arc<DB>,
    metrics: StoreMetrics,
}

impl RocksStore {
    /// Opens (or creates) a store at `path`.
    ///
    /// If a database already exists at `path`, every table in
    /// [`tables::REQUIRED_ON_EXISTING_DB`] must already be present —
    /// a database that predates the tokens table is refused rather
    /// than silently treated as "no tokens configured" (spec.md §9).
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_inner(path).map_err(Into::into)
    }

    fn open_inner(path: &Path) -> Result<Self, RocksStoreError> {
        if path.exists() {
            let existing = DB::list_cf(&Options::default(), path)?;
            for required in tables::REQUIRED_ON_EXISTING_DB {
                if !existing.iter().any(|cf| cf == required) {
                    return Err(RocksStoreError::RequiredTableMissing((*required).to_string()));
                }
            }
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> =
            tables::ALL.iter().map(|name| ColumnFamilyDescriptor::new(*name, Options::default())).collect();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        let version_manager = VersionManager::open(&db)?;
        if version_manager.needs_migration() {
            version_manager.migrate(&db)?;
        }

        Ok(Self { db: Arc::new(db), metrics: StoreMetrics::new() })
    }

    fn cf(&self, name: &str) -> Result<Arc<rocksdb::BoundColumnFamily<'_>>, RocksStoreError> {
        self.db.cf_handle(name).ok_or_else(|| RocksStoreError::ColumnFamily(name.to_string()))
    }

    fn put_json<T: serde::Serialize>(&self, table: &str, key: &[u8], value: &T) -> Result<(), RocksStoreError> {
        let started = Instant::now();
        let cf = self.cf(table)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(&cf, key, bytes)?;
        self.metrics.record_write(started.elapsed());
        Ok(())
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, table: &str, key: &[u8]) -> Result<Option<T>, RocksStoreError> {
        let cf = self.cf(table)?;
        match self.db.get_cf(&cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_all<T: serde::de::DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, RocksStoreError> {
        let cf = self.cf(table)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    fn deposit_key(deal_id: DealId, side: Party, deposit: &Deposit) -> Vec<u8> {
        format!("{deal_id}:{side:?}:{}:{}", deposit.txid, deposit.asset).into_bytes()
    }

    fn deposit_prefix(deal_id: DealId, side: Party) -> Vec<u8> {
        format!("{deal_id}:{side:?}:").into_bytes()
    }

    fn party_details_key(deal_id: DealId, side: Party) -> Vec<u8> {
        format!("{deal_id}:{side:?}").into_bytes()
    }

    fn oracle_key(chain_id: &str, pair: &str) -> Vec<u8> {
        format!("{chain_id}:{pair}").into_bytes()
    }

    fn cursor_key(chain_id: &str, address: &str) -> Vec<u8> {
        format!("{chain_id}:{address}").into_bytes()
    }
}

impl Store for RocksStore {
    fn put_deal(&self, deal: &Deal) -> Result<(), StoreError> {
        self.put_json(tables::DEALS, deal.id.to_string().as_bytes(), deal)?;
        self.metrics.deals_written.increment(1);

        // Mirror party details into their own table for schema
        // fidelity with spec.md §6.2 even though the deal document
        // already carries the authoritative copy.
        let details = deal.stage.party_details();
        for (side, maybe_details) in [(Party::A, &details.a), (Party::B, &details.b)] {
            if let Some(details) = maybe_details {
                self.put_json(tables::PARTY_DETAILS, &Self::party_details_key(deal.id, side), details)?;
            }
        }
        Ok(())
    }

    fn get_deal(&self, id: DealId) -> Result<Option<Deal>, StoreError> {
        Ok(self.get_json(tables::DEALS, id.to_string().as_bytes())?)
    }

    fn list_active_deal_ids(&self) -> Result<Vec<DealId>, StoreError> {
        let deals: Vec<Deal> = self.scan_all(tables::DEALS)?;
        Ok(deals.into_iter().filter(|d| !d.stage.is_terminal()).map(|d| d.id).collect())
    }

    fn put_token(&self, token: &Token) -> Result<(), StoreError> {
        Ok(self.put_json(tables::TOKENS, token.token.as_str().as_bytes(), token)?)
    }

    fn get_token(&self, token: &TokenSecret) -> Result<Option<Token>, StoreError> {
        Ok(self.get_json(tables::TOKENS, token.as_str().as_bytes())?)
    }

    fn mark_token_used(&self, token: &TokenSecret) -> Result<(), StoreError> {
        let mut record: Token = self
            .get_json(tables::TOKENS, token.as_str().as_bytes())?
            .ok_or(StoreError::NotFound)?;
        record.used_at = Some(time::OffsetDateTime::now_utc());
        Ok(self.put_json(tables::TOKENS, token.as_str().as_bytes(), &record)?)
    }

    fn record_deposit(&self, deal_id: DealId, side: Party, deposit: &Deposit) -> Result<bool, StoreError> {
        let key = Self::deposit_key(deal_id, side, deposit);
        let is_new = self.get_json::<Deposit>(tables::DEPOSITS, &key)?.is_none();
        self.put_json(tables::DEPOSITS, &key, deposit)?;
        self.metrics.deposits_recorded.increment(1);
        Ok(is_new)
    }

    fn list_deposits(&self, deal_id: DealId, side: Party) -> Result<Vec<Deposit>, StoreError> {
        let prefix = Self::deposit_prefix(deal_id, side);
        let cf = self.cf(tables::DEPOSITS)?;
        let mut out = Vec::new();
        for item in
            self.db.iterator_cf(&cf, rocksdb::IteratorMode::From(&prefix, rocksdb::Direction::Forward))
        {
            let (key, value) = item.map_err(RocksStoreError::from)?;
            if !key.starts_with(&prefix[..]) {
                break;
            }
            out.push(serde_json::from_slice(&value).map_err(RocksStoreError::from)?);
        }
        Ok(out)
    }

    fn put_queue_item(&self, item: &QueueItem) -> Result<(), StoreError> {
        self.put_json(tables::QUEUE, item.id.to_string().as_bytes(), item)?;
        self.metrics.queue_items_written.increment(1);
        Ok(())
    }

    fn get_queue_item(&self, id: QueueItemId) -> Result<Option<QueueItem>, StoreError> {
        Ok(self.get_json(tables::QUEUE, id.to_string().as_bytes())?)
    }

    fn list_queue_items_for_deal(&self, deal_id: DealId) -> Result<Vec<QueueItem>, StoreError> {
        let items: Vec<QueueItem> = self.scan_all(tables::QUEUE)?;
        Ok(items.into_iter().filter(|i| i.deal_id == deal_id).collect())
    }

    fn list_active_queue_items(&self) -> Result<Vec<QueueItem>, StoreError> {
        let items: Vec<QueueItem> = self.scan_all(tables::QUEUE)?;
        Ok(items.into_iter().filter(|i| !i.status.is_terminal()).collect())
    }

    fn put_oracle_quote(&self, quote: &OracleQuote) -> Result<(), StoreError> {
        Ok(self.put_json(tables::ORACLE_QUOTES, &Self::oracle_key(&quote.chain_id, &quote.pair), quote)?)
    }

    fn latest_oracle_quote(&self, chain_id: &str, pair: &str) -> Result<Option<OracleQuote>, StoreError> {
        Ok(self.get_json(tables::ORACLE_QUOTES, &Self::oracle_key(chain_id, pair))?)
    }

    fn get_watcher_cursor(&self, chain_id: &str, address: &str) -> Result<Option<String>, StoreError> {
        let cf = self.cf(tables::WATCHER_CURSORS)?;
        let value = self.db.get_cf(&cf, Self::cursor_key(chain_id, address)).map_err(RocksStoreError::from)?;
        Ok(value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn put_watcher_cursor(&self, chain_id: &str, address: &str, cursor: &str) -> Result<(), StoreError> {
        let cf = self.cf(tables::WATCHER_CURSORS)?;
        self.db
            .put_cf(&cf, Self::cursor_key(chain_id, address), cursor.as_bytes())
            .map_err(RocksStoreError::from)?;
        Ok(())
    }
}
