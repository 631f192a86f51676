//! A deterministic, in-memory [`ChainPlugin`] used by the rest of the
//! workspace's test suites. Not a production adapter — spec.md §1
//! places real chain-plugin implementations out of scope.

use crate::{ChainPlugin, NativeQuote, ScanResult, ScannedDeposit, TxStatusReport};
use async_trait::async_trait;
use otc_primitives::{EscrowAccount, FullyQualifiedAsset, OracleQuote, PluginError, QuoteSource, TxStatus};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
struct SubmittedRecord {
    txid: String,
    status: TxStatus,
    confirms: u64,
    required_confirms: u64,
}

#[derive(Default)]
struct State {
    next_account: u64,
    escrow_addresses: HashMap<String, String>,
    balances: HashMap<(String, String), Decimal>,
    deposits_by_address: HashMap<String, Vec<ScannedDeposit>>,
    submitted_by_nonce: HashMap<String, SubmittedRecord>,
    next_txid: u64,
    native_price_usd: Decimal,
}

/// Deterministic fake chain adapter: escrow accounts are sequentially
/// numbered addresses, submits always succeed immediately with a
/// synthetic txid, and confirmations only advance when a test calls
/// [`MemoryChainPlugin::confirm`].
pub struct MemoryChainPlugin {
    chain_id: String,
    required_confirms: u64,
    state: Mutex<State>,
}

impl MemoryChainPlugin {
    pub fn new(chain_id: impl Into<String>, required_confirms: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            required_confirms,
            state: Mutex::new(State { native_price_usd: Decimal::new(2000, 0), ..Default::default() }),
        }
    }

    /// Sets the native/USD price used by `quote_native_for_usd`.
    pub fn set_native_price_usd(&self, price: Decimal) {
        self.state.lock().native_price_usd = price;
    }

    /// Simulates an inbound deposit credited to `address`.
    pub fn credit_deposit(
        &self,
        address: &str,
        asset: FullyQualifiedAsset,
        amount: Decimal,
        confirms: u64,
    ) -> String {
        let mut state = self.state.lock();
        state.next_txid += 1;
        let txid = format!("deposit-{}", state.next_txid);
        state
            .deposits_by_address
            .entry(address.to_string())
            .or_default()
            .push(ScannedDeposit { txid: txid.clone(), asset: asset.clone(), amount, confirms });
        *state.balances.entry((address.to_string(), asset.asset_code)).or_insert(Decimal::ZERO) +=
            amount;
        txid
    }

    /// Advances confirmations for every submitted tx to `confirms`.
    pub fn confirm_all(&self, confirms: u64) {
        let mut state = self.state.lock();
        for record in state.submitted_by_nonce.values_mut() {
            record.confirms = confirms.max(record.confirms);
            if record.confirms >= record.required_confirms {
                record.status = TxStatus::Confirmed;
            }
        }
    }

    /// Marks every submitted tx dropped, to exercise the queue's
    /// resubmit path.
    pub fn drop_all(&self) {
        let mut state = self.state.lock();
        for record in state.submitted_by_nonce.values_mut() {
            record.status = TxStatus::Dropped;
        }
    }
}

#[async_trait]
impl ChainPlugin for MemoryChainPlugin {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    async fn validate_address(&self, address: &str) -> Result<bool, PluginError> {
        Ok(!address.is_empty())
    }

    async fn generate_escrow_account(
        &self,
        asset_code: &str,
    ) -> Result<EscrowAccount, PluginError> {
        let mut state = self.state.lock();
        state.next_account += 1;
        let address = format!("{}-escrow-{}-{}", self.chain_id, asset_code, state.next_account);
        let key_ref = format!("key-{}", state.next_account);
        state.escrow_addresses.insert(address.clone(), key_ref.clone());
        Ok(EscrowAccount { address, key_ref })
    }

    async fn quote_native_for_usd(&self, usd_amount: Decimal) -> Result<NativeQuote, PluginError> {
        let state = self.state.lock();
        let price = state.native_price_usd;
        if price.is_zero() {
            return Err(PluginError::Transient("no price available".into()));
        }
        let native_amount = (usd_amount / price).round_dp(8);
        Ok(NativeQuote {
            native_amount,
            quote: OracleQuote {
                chain_id: self.chain_id.clone(),
                pair: format!("{}/USD", self.chain_id),
                price,
                as_of: OffsetDateTime::now_utc(),
                source: QuoteSource::Injected,
            },
        })
    }

    async fn scan_deposits(
        &self,
        address: &str,
        since_cursor: Option<&str>,
    ) -> Result<ScanResult, PluginError> {
        let state = self.state.lock();
        let all = state.deposits_by_address.get(address).cloned().unwrap_or_default();
        let offset: usize = since_cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let deposits = all.get(offset..).map(|s| s.to_vec()).unwrap_or_default();
        Ok(ScanResult { deposits, next_cursor: all.len().to_string() })
    }

    async fn submit(
        &self,
        _from: &EscrowAccount,
        _to: &str,
        _asset: &FullyQualifiedAsset,
        _amount: Decimal,
        client_nonce: &str,
    ) -> Result<String, PluginError> {
        let mut state = self.state.lock();
        if let Some(existing) = state.submitted_by_nonce.get(client_nonce) {
            return Ok(existing.txid.clone());
        }
        state.next_txid += 1;
        let txid = format!("tx-{}", state.next_txid);
        let required_confirms = self.required_confirms;
        state.submitted_by_nonce.insert(
            client_nonce.to_string(),
            SubmittedRecord { txid: txid.clone(), status: TxStatus::Pending, confirms: 0, required_confirms },
        );
        Ok(txid)
    }

    async fn resolve_by_nonce(&self, client_nonce: &str) -> Result<Option<String>, PluginError> {
        Ok(self.state.lock().submitted_by_nonce.get(client_nonce).map(|r| r.txid.clone()))
    }

    async fn get_tx_status(&self, txid: &str) -> Result<TxStatusReport, PluginError> {
        let state = self.state.lock();
        state
            .submitted_by_nonce
            .values()
            .find(|r| r.txid == txid)
            .map(|r| TxStatusReport {
                status: r.status,
                confirms: r.confirms,
                required_confirms: r.required_confirms,
            })
            .ok_or_else(|| PluginError::Terminal(format!("unknown txid {txid}")))
    }

    async fn get_balance(&self, address: &str, asset_code: &str) -> Result<Decimal, PluginError> {
        let state = self.state.lock();
        Ok(state.balances.get(&(address.to_string(), asset_code.to_string())).copied().unwrap_or(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_is_idempotent_by_nonce() {
        let plugin = MemoryChainPlugin::new("ETH", 2);
        let escrow = plugin.generate_escrow_account("USDC").await.unwrap();
        let asset: FullyQualifiedAsset = "USDC@ETH".parse().unwrap();
        let txid1 =
            plugin.submit(&escrow, "recipient", &asset, Decimal::new(10, 0), "nonce-1").await.unwrap();
        let txid2 =
            plugin.submit(&escrow, "recipient", &asset, Decimal::new(10, 0), "nonce-1").await.unwrap();
        assert_eq!(txid1, txid2);
    }

    #[tokio::test]
    async fn scan_deposits_is_cursor_stable() {
        let plugin = MemoryChainPlugin::new("ETH", 1);
        let asset: FullyQualifiedAsset = "USDC@ETH".parse().unwrap();
        plugin.credit_deposit("addr", asset.clone(), Decimal::new(5, 0), 1);
        let first = plugin.scan_deposits("addr", None).await.unwrap();
        assert_eq!(first.deposits.len(), 1);
        let second = plugin.scan_deposits("addr", Some(&first.next_cursor)).await.unwrap();
        assert!(second.deposits.is_empty());
    }
}
