use otc_primitives::{Deal, DealId, Deposit, OracleQuote, Party, QueueItem, QueueItemId, StoreError, Token, TokenSecret};

/// The Persistent Store (C3). The single source of truth; any
/// in-memory state the engine keeps is a cache over this.
///
/// Methods are synchronous/blocking, matching the underlying RocksDB
/// implementation — callers on an async runtime are expected to run
/// them through a blocking-safe boundary (see `otc-engine`, which
/// wraps every call in `tokio::task::spawn_blocking`).
pub trait Store: Send + Sync {
    fn put_deal(&self, deal: &Deal) -> Result<(), StoreError>;
    fn get_deal(&self, id: DealId) -> Result<Option<Deal>, StoreError>;
    /// Every deal whose stage is not CLOSED/REVERTED.
    fn list_active_deal_ids(&self) -> Result<Vec<DealId>, StoreError>;

    fn put_token(&self, token: &Token) -> Result<(), StoreError>;
    fn get_token(&self, token: &TokenSecret) -> Result<Option<Token>, StoreError>;
    /// Marks a token used. Idempotent key for the caller: the engine
    /// only calls this after verifying the token is unused, inside
    /// the same deal-scoped lock that writes `partyDetails.locked`.
    fn mark_token_used(&self, token: &TokenSecret) -> Result<(), StoreError>;

    /// Upserts a deposit by its `(dealId, side, txid, asset)` key.
    /// Returns `true` if this was a new row, `false` if an existing
    /// one was updated in place (confirms/block_time only).
    fn record_deposit(&self, deal_id: DealId, side: Party, deposit: &Deposit) -> Result<bool, StoreError>;
    fn list_deposits(&self, deal_id: DealId, side: Party) -> Result<Vec<Deposit>, StoreError>;

    fn put_queue_item(&self, item: &QueueItem) -> Result<(), StoreError>;
    fn get_queue_item(&self, id: QueueItemId) -> Result<Option<QueueItem>, StoreError>;
    fn list_queue_items_for_deal(&self, deal_id: DealId) -> Result<Vec<QueueItem>, StoreError>;
    fn list_active_queue_items(&self) -> Result<Vec<QueueItem>, StoreError>;

    fn put_oracle_quote(&self, quote: &OracleQuote) -> Result<(), StoreError>;
    fn latest_oracle_quote(&self, chain_id: &str, pair: &str) -> Result<Option<OracleQuote>, StoreError>;

    fn get_watcher_cursor(&self, chain_id: &str, address: &str) -> Result<Option<String>, StoreError>;
    fn put_watcher_cursor(&self, chain_id: &str, address: &str, cursor: &str) -> Result<(), StoreError>;
}
