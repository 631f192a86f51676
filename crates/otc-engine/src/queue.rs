//! The Transaction Queue (C7): advances one [`QueueItem`] per call
//! through PENDING → SUBMITTED → COMPLETED/FAILED (spec.md §4.5).

use backon::{BackoffBuilder, ExponentialBuilder};
use otc_chain_api::ChainPlugin;
use otc_primitives::{PluginError, QueueItem, QueueStatus, SubmittedTx, TxStatus};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{info, warn};

/// Base/cap for the exponential resubmit backoff (spec.md §4.5: "base
/// 2s, cap 5 min").
fn backoff_delay(attempts: u32) -> Duration {
    let mut schedule = ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(2))
        .with_max_delay(Duration::from_secs(300))
        .without_max_times()
        .build();
    schedule.nth(attempts as usize).unwrap_or(Duration::from_secs(300))
}

fn due_for_attempt(item: &QueueItem, now: OffsetDateTime) -> bool {
    if item.attempts == 0 {
        return true;
    }
    let elapsed = now - item.updated_at;
    elapsed >= time::Duration::try_from(backoff_delay(item.attempts)).unwrap_or(time::Duration::ZERO)
}

/// Advances `item` by exactly one step, mutating it in place. Returns
/// `true` if the item changed and must be persisted.
pub async fn step(item: &mut QueueItem, plugin: &dyn ChainPlugin, max_attempts: u32) -> bool {
    let now = OffsetDateTime::now_utc();
    match item.status {
        QueueStatus::Pending => step_pending(item, plugin, max_attempts, now).await,
        QueueStatus::Submitted => step_submitted(item, plugin, max_attempts, now).await,
        QueueStatus::Completed | QueueStatus::Failed => false,
    }
}

async fn step_pending(item: &mut QueueItem, plugin: &dyn ChainPlugin, max_attempts: u32, now: OffsetDateTime) -> bool {
    if !due_for_attempt(item, now) {
        return false;
    }

    // Pre-submit reservation (spec.md §4.5): mark SUBMITTED with the
    // deterministic nonce before the call, so a crash between submit
    // succeeding and this write being persisted can be resolved by
    // asking the plugin for the nonce on restart.
    item.status = QueueStatus::Submitted;
    item.submitted_tx = Some(SubmittedTx::pending(0));
    item.updated_at = now;

    match plugin.submit(&item.from, &item.to, &item.asset, item.amount, &item.client_nonce).await {
        Ok(txid) => {
            item.submitted_tx = Some(SubmittedTx { txid: Some(txid), ..SubmittedTx::pending(0) });
            info!(item_id = %item.id, deal_id = %item.deal_id, purpose = ?item.purpose, "submitted");
        }
        Err(PluginError::Transient(msg)) => {
            item.status = QueueStatus::Pending;
            item.submitted_tx = None;
            item.attempts += 1;
            item.last_error = Some(msg);
            if item.attempts >= max_attempts {
                item.status = QueueStatus::Failed;
                warn!(item_id = %item.id, deal_id = %item.deal_id, "submit failed terminally after max attempts");
            }
        }
        Err(PluginError::Terminal(msg) | PluginError::InvalidAddress(msg)) => {
            item.status = QueueStatus::Failed;
            item.last_error = Some(msg);
            warn!(item_id = %item.id, deal_id = %item.deal_id, "submit rejected terminally");
        }
    }
    item.updated_at = OffsetDateTime::now_utc();
    true
}

async fn step_submitted(item: &mut QueueItem, plugin: &dyn ChainPlugin, max_attempts: u32, now: OffsetDateTime) -> bool {
    let Some(submitted) = item.submitted_tx.clone() else { return false };

    let txid = match submitted.txid {
        Some(txid) => txid,
        None => match plugin.resolve_by_nonce(&item.client_nonce).await {
            Ok(Some(txid)) => txid,
            Ok(None) => return false,
            Err(err) => {
                warn!(item_id = %item.id, error = %err, "could not resolve submitted tx by nonce");
                return false;
            }
        },
    };

    let report = match plugin.get_tx_status(&txid).await {
        Ok(report) => report,
        Err(err) => {
            warn!(item_id = %item.id, error = %err, "transient status check error");
            return false;
        }
    };

    let mut changed = SubmittedTx {
        txid: Some(txid),
        status: report.status,
        confirms: report.confirms.max(submitted.confirms),
        required_confirms: report.required_confirms,
    };

    match report.status {
        TxStatus::Confirmed if changed.confirms >= changed.required_confirms => {
            item.status = QueueStatus::Completed;
            info!(item_id = %item.id, deal_id = %item.deal_id, purpose = ?item.purpose, "completed");
        }
        TxStatus::Dropped | TxStatus::Failed => {
            item.attempts += 1;
            if item.attempts >= max_attempts {
                item.status = QueueStatus::Failed;
                warn!(item_id = %item.id, deal_id = %item.deal_id, "resubmit budget exhausted, failing item");
            } else {
                item.status = QueueStatus::Pending;
                changed = SubmittedTx::pending(changed.required_confirms);
            }
        }
        _ => {}
    }

    item.submitted_tx = Some(changed);
    item.updated_at = now;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use otc_chain_api::memory::MemoryChainPlugin;
    use otc_primitives::{EscrowAccount, Purpose};
    use rust_decimal::Decimal;

    fn item(asset: &str) -> QueueItem {
        QueueItem::new(
            otc_primitives::DealId::new(),
            Purpose::SwapPayout,
            EscrowAccount { address: "escrow".into(), key_ref: "k".into() },
            "recipient".into(),
            asset.parse().unwrap(),
            Decimal::new(10, 0),
        )
    }

    #[tokio::test]
    async fn pending_item_submits_then_completes_on_confirmation() {
        let plugin = MemoryChainPlugin::new("ETH", 1);
        let mut item = item("USDC@ETH");

        assert!(step(&mut item, &plugin, 10).await);
        assert_eq!(item.status, QueueStatus::Submitted);
        assert!(item.submitted_tx.as_ref().unwrap().txid.is_some());

        plugin.confirm_all(1);
        assert!(step(&mut item, &plugin, 10).await);
        assert_eq!(item.status, QueueStatus::Completed);
    }

    #[tokio::test]
    async fn dropped_tx_goes_back_to_pending_for_resubmit() {
        let plugin = MemoryChainPlugin::new("ETH", 1);
        let mut item = item("USDC@ETH");
        step(&mut item, &plugin, 10).await;

        plugin.drop_all();
        step(&mut item, &plugin, 10).await;
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.attempts, 1);
    }

    #[tokio::test]
    async fn completed_items_are_a_no_op() {
        let plugin = MemoryChainPlugin::new("ETH", 1);
        let mut item = item("USDC@ETH");
        item.status = QueueStatus::Completed;
        assert!(!step(&mut item, &plugin, 10).await);
    }
}
