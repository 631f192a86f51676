//! Shared domain types for the OTC atomic-swap broker: the deal
//! aggregate, its stage-indexed sum type, deposits, the outbound
//! transaction queue's item type, commission requirements, oracle
//! quotes, and the crate-wide error type.

#![warn(rust_2018_idioms)]

pub mod asset;
pub mod commission;
pub mod deal;
pub mod deposit;
pub mod error;
pub mod ids;
pub mod oracle;
pub mod party;
pub mod queue;

pub use asset::{AssetSpec, FullyQualifiedAsset};
pub use commission::{CommissionPlan, CommissionReq};
pub use deal::{
    ClosedState, Collection, CreatedState, Deal, CollectionState, Event, RevertedState, Stage,
    WaitingState,
};
pub use deposit::Deposit;
pub use error::{OtcError, PluginError, StoreError};
pub use ids::{DealId, QueueItemId, TokenSecret};
pub use oracle::{OracleQuote, QuoteSource};
pub use party::{EscrowAccount, Party, PartyDetails, PerSide, Token};
pub use queue::{Purpose, QueueItem, QueueStatus, SubmittedTx, TxStatus};
