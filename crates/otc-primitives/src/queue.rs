use crate::asset::FullyQualifiedAsset;
use crate::ids::{DealId, QueueItemId};
use crate::party::EscrowAccount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Why an outbound transfer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    SwapPayout,
    OpCommission,
    TimeoutRefund,
    SurplusRefund,
}

/// Queue item lifecycle status. COMPLETED and FAILED are terminal
/// (P4, P8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    Pending,
    Submitted,
    Completed,
    Failed,
}

impl QueueStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// On-chain status of a submitted transaction, as reported by
/// `getTxStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Dropped,
    Failed,
}

/// The submitted transaction backing a [`QueueItem`], once one
/// exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedTx {
    pub txid: Option<String>,
    pub status: TxStatus,
    pub confirms: u64,
    pub required_confirms: u64,
}

impl SubmittedTx {
    pub fn pending(required_confirms: u64) -> Self {
        Self { txid: None, status: TxStatus::Pending, confirms: 0, required_confirms }
    }
}

/// A single outbound transfer intent, durable across restarts.
///
/// Invariants: COMPLETED and FAILED are terminal; each
/// `(dealId, purpose, asset, to)` tuple is enqueued at most once per
/// deal (enforced by the engine before insertion, see `otc-engine`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub deal_id: DealId,
    pub purpose: Purpose,
    pub from: EscrowAccount,
    pub to: String,
    pub asset: FullyQualifiedAsset,
    pub amount: Decimal,
    pub status: QueueStatus,
    pub submitted_tx: Option<SubmittedTx>,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Deterministic nonce derived from `(deal_id, purpose, asset, to)`,
    /// reserved before `submit` is ever called so a crash between
    /// submission and persistence can be resolved by the plugin on
    /// restart (spec.md §4.5's pre-submit reservation rule).
    pub client_nonce: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl QueueItem {
    pub fn new(
        deal_id: DealId,
        purpose: Purpose,
        from: EscrowAccount,
        to: String,
        asset: FullyQualifiedAsset,
        amount: Decimal,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        let client_nonce = deterministic_nonce(&deal_id, purpose, &asset, &to);
        Self {
            id: QueueItemId::new(),
            deal_id,
            purpose,
            from,
            to,
            asset,
            amount,
            status: QueueStatus::Pending,
            submitted_tx: None,
            attempts: 0,
            last_error: None,
            client_nonce,
            created_at: now,
            updated_at: now,
        }
    }

    /// `(dealId, purpose, asset, to)` — the at-most-once-per-deal key.
    pub fn dedup_key(&self) -> (DealId, Purpose, FullyQualifiedAsset, String) {
        (self.deal_id, self.purpose, self.asset.clone(), self.to.clone())
    }
}

/// Derives a stable nonce from the item's identity so that re-deriving
/// it after a crash-restart yields the same value `submit` was first
/// called with.
fn deterministic_nonce(
    deal_id: &DealId,
    purpose: Purpose,
    asset: &FullyQualifiedAsset,
    to: &str,
) -> String {
    use uuid::Uuid;
    let namespace = Uuid::NAMESPACE_OID;
    let name = format!("{deal_id}:{purpose:?}:{asset}:{to}");
    Uuid::new_v5(&namespace, name.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escrow() -> EscrowAccount {
        EscrowAccount { address: "addr".into(), key_ref: "key".into() }
    }

    #[test]
    fn nonce_is_deterministic_for_same_identity() {
        let deal_id = DealId::new();
        let asset: FullyQualifiedAsset = "USDC@ETH".parse().unwrap();
        let a = QueueItem::new(
            deal_id,
            Purpose::SwapPayout,
            escrow(),
            "recipient".into(),
            asset.clone(),
            Decimal::new(100, 0),
        );
        let b = QueueItem::new(
            deal_id,
            Purpose::SwapPayout,
            escrow(),
            "recipient".into(),
            asset,
            Decimal::new(100, 0),
        );
        assert_eq!(a.client_nonce, b.client_nonce);
        assert_ne!(a.id, b.id);
    }
}
