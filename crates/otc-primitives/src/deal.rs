use crate::asset::{AssetSpec, FullyQualifiedAsset};
use crate::commission::CommissionPlan;
use crate::deposit::Deposit;
use crate::ids::{DealId, QueueItemId};
use crate::party::{EscrowAccount, PartyDetails, PerSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

/// An append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub message: String,
}

impl Event {
    pub fn now(message: impl Into<String>) -> Self {
        Self { timestamp: OffsetDateTime::now_utc(), message: message.into() }
    }
}

/// One side's observed deposits and running per-asset totals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Collection {
    pub deposits: Vec<Deposit>,
    pub collected_by_asset: HashMap<FullyQualifiedAsset, Decimal>,
}

impl Collection {
    /// Records a freshly observed deposit, or updates confirms/block
    /// time if it was already seen (P7: never double-counts a txid).
    pub fn observe(&mut self, deposit: Deposit) -> bool {
        if let Some(existing) =
            self.deposits.iter_mut().find(|d| d.identity() == deposit.identity())
        {
            existing.confirms = existing.confirms.max(deposit.confirms);
            existing.block_time = deposit.block_time.or(existing.block_time);
            return false;
        }
        *self.collected_by_asset.entry(deposit.asset.clone()).or_insert(Decimal::ZERO) +=
            deposit.amount;
        self.deposits.push(deposit);
        true
    }

    pub fn collected(&self, asset: &FullyQualifiedAsset) -> Decimal {
        self.collected_by_asset.get(asset).copied().unwrap_or(Decimal::ZERO)
    }
}

/// CREATED: escrow and party details may or may not exist yet.
///
/// `collection` tracks deposits to whichever escrows already exist —
/// `fillPartyDetails` generates a side's escrow independently of the
/// counterparty, so funds can land here before COLLECTION begins, and
/// `cancelDeal` must see them (spec.md §5: cancellation is rejected
/// once any deposit has been observed on either side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedState {
    pub party_details: PerSide<Option<PartyDetails>>,
    pub escrow: PerSide<Option<EscrowAccount>>,
    pub collection: PerSide<Collection>,
}

/// COLLECTION: both parties are locked in, the clock is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionState {
    pub party_details: PerSide<PartyDetails>,
    pub escrow: PerSide<EscrowAccount>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub collection: PerSide<Collection>,
}

/// WAITING: both sides funded, payout/commission/surplus items are
/// enqueued and being worked by the transaction queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingState {
    pub party_details: PerSide<PartyDetails>,
    pub escrow: PerSide<EscrowAccount>,
    pub collection: PerSide<Collection>,
    pub queue_item_ids: Vec<QueueItemId>,
}

/// CLOSED: terminal, successful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedState {
    pub party_details: PerSide<PartyDetails>,
    pub collection: PerSide<Collection>,
    pub queue_item_ids: Vec<QueueItemId>,
}

/// REVERTED: terminal, either cancelled pre-deposit or timed out /
/// failed, with refunds enqueued for whatever was collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertedState {
    pub party_details: PerSide<Option<PartyDetails>>,
    pub collection: PerSide<Collection>,
    pub refund_item_ids: Vec<QueueItemId>,
}

/// The deal's stage, modeled as a sum type over its stage-dependent
/// fields rather than one flat record with a scattering of optionals
/// (spec.md §9's redesign note).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage")]
pub enum Stage {
    Created(CreatedState),
    Collection(CollectionState),
    Waiting(WaitingState),
    Closed(ClosedState),
    Reverted(RevertedState),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created(_) => "CREATED",
            Self::Collection(_) => "COLLECTION",
            Self::Waiting(_) => "WAITING",
            Self::Closed(_) => "CLOSED",
            Self::Reverted(_) => "REVERTED",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed(_) | Self::Reverted(_))
    }

    pub fn party_details(&self) -> PerSide<Option<PartyDetails>> {
        match self {
            Self::Created(s) => s.party_details.clone(),
            Self::Collection(s) => s.party_details.map(|d| Some(d.clone())),
            Self::Waiting(s) => s.party_details.map(|d| Some(d.clone())),
            Self::Closed(s) => s.party_details.map(|d| Some(d.clone())),
            Self::Reverted(s) => s.party_details.clone(),
        }
    }

    pub fn collection(&self) -> Option<&PerSide<Collection>> {
        match self {
            Self::Created(s) => Some(&s.collection),
            Self::Collection(s) => Some(&s.collection),
            Self::Waiting(s) => Some(&s.collection),
            Self::Closed(s) => Some(&s.collection),
            Self::Reverted(s) => Some(&s.collection),
        }
    }
}

/// The root aggregate: a single over-the-counter swap deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub timeout_seconds: u64,
    pub side_a: AssetSpec,
    pub side_b: AssetSpec,
    pub commission_plan: CommissionPlan,
    pub events: Vec<Event>,
    pub stage: Stage,
}

impl Deal {
    pub fn side(&self, party: crate::party::Party) -> &AssetSpec {
        match party {
            crate::party::Party::A => &self.side_a,
            crate::party::Party::B => &self.side_b,
        }
    }

    pub fn push_event(&mut self, message: impl Into<String>) {
        self.events.push(Event::now(message));
    }
}
