use crate::ids::{DealId, TokenSecret};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One of the two counterparties to a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    A,
    B,
}

impl Party {
    /// The other side of the deal.
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// A value held independently for each side of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerSide<T> {
    pub a: T,
    pub b: T,
}

impl<T> PerSide<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    pub fn get(&self, side: Party) -> &T {
        match side {
            Party::A => &self.a,
            Party::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, side: Party) -> &mut T {
        match side {
            Party::A => &mut self.a,
            Party::B => &mut self.b,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerSide<U> {
        PerSide { a: f(&self.a), b: f(&self.b) }
    }

    pub fn as_ref(&self) -> PerSide<&T> {
        PerSide { a: &self.a, b: &self.b }
    }
}

/// Contact and settlement addresses a party submits once, via
/// `fillPartyDetails`.
///
/// Invariant: once `locked` is true, `payback_address` and
/// `recipient_address` never change again (see P1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDetails {
    pub payback_address: String,
    pub recipient_address: String,
    pub email: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub filled_at: OffsetDateTime,
    pub locked: bool,
}

/// A single-use authorization secret for `(dealId, party)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token: TokenSecret,
    pub deal_id: DealId,
    pub party: Party,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub used_at: Option<OffsetDateTime>,
}

impl Token {
    pub fn new(deal_id: DealId, party: Party) -> (Self, TokenSecret) {
        let secret = TokenSecret::generate();
        (
            Self { token: secret.clone(), deal_id, party, created_at: OffsetDateTime::now_utc(), used_at: None },
            secret,
        )
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// A broker-custodied escrow account for one side of one deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowAccount {
    pub address: String,
    /// Opaque handle the chain plugin uses to sign; the engine never
    /// sees the underlying private key material.
    pub key_ref: String,
}
