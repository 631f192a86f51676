//! The Chain Plugin Interface (C1): the abstract contract each chain
//! adapter must satisfy. Only the interface is in scope here — concrete
//! adapters are external collaborators per spec.md §1. This crate also
//! ships [`memory::MemoryChainPlugin`], a deterministic fake used by
//! the rest of the workspace's own test suites.

#![warn(rust_2018_idioms)]

pub mod memory;

use async_trait::async_trait;
use otc_primitives::{EscrowAccount, FullyQualifiedAsset, OracleQuote, PluginError, TxStatus};
use rust_decimal::Decimal;

/// A deposit as reported by [`ChainPlugin::scan_deposits`], before it
/// is folded into a deal's collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDeposit {
    pub txid: String,
    pub asset: FullyQualifiedAsset,
    pub amount: Decimal,
    pub confirms: u64,
}

/// The result of one `scan_deposits` call: new/updated deposits plus
/// the cursor to resume from next time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub deposits: Vec<ScannedDeposit>,
    pub next_cursor: String,
}

/// The result of pinning a native-asset quote for a fixed-USD
/// commission.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeQuote {
    pub native_amount: Decimal,
    pub quote: OracleQuote,
}

/// Current status of a previously submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxStatusReport {
    pub status: TxStatus,
    pub confirms: u64,
    pub required_confirms: u64,
}

/// The per-chain adapter contract (spec.md §4.1).
///
/// All methods are expected to be safe under concurrent invocation
/// across different addresses. `scan_deposits` must eventually
/// observe any deposit with finality (bounded staleness); `submit`
/// must be externally idempotent with respect to the caller-supplied
/// `client_nonce`.
#[async_trait]
pub trait ChainPlugin: Send + Sync {
    /// Which `chainId` this adapter serves.
    fn chain_id(&self) -> &str;

    async fn validate_address(&self, address: &str) -> Result<bool, PluginError>;

    /// Materializes a fresh custody account. `key_ref` must survive
    /// process restarts.
    async fn generate_escrow_account(
        &self,
        asset_code: &str,
    ) -> Result<EscrowAccount, PluginError>;

    /// Pins a price for a fixed-USD commission.
    async fn quote_native_for_usd(&self, usd_amount: Decimal) -> Result<NativeQuote, PluginError>;

    /// Deposits credited to `address` since `since_cursor`. Must be
    /// idempotent: repeated calls with the same cursor yield the same
    /// prefix of results.
    async fn scan_deposits(
        &self,
        address: &str,
        since_cursor: Option<&str>,
    ) -> Result<ScanResult, PluginError>;

    /// Broadcasts a transfer, deduplicated by `client_nonce`.
    async fn submit(
        &self,
        from: &EscrowAccount,
        to: &str,
        asset: &FullyQualifiedAsset,
        amount: Decimal,
        client_nonce: &str,
    ) -> Result<String, PluginError>;

    /// Resolves a previously submitted transfer by its client nonce,
    /// used after a crash between `submit` succeeding and the queue
    /// persisting the resulting txid.
    async fn resolve_by_nonce(&self, client_nonce: &str) -> Result<Option<String>, PluginError>;

    async fn get_tx_status(&self, txid: &str) -> Result<TxStatusReport, PluginError>;

    async fn get_balance(
        &self,
        address: &str,
        asset_code: &str,
    ) -> Result<Decimal, PluginError>;
}
