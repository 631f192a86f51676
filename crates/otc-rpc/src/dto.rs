//! Wire types for §6.1. Deliberately camelCase and string-ish (decimal
//! amounts, RFC3339 timestamps, UUID strings) independent of the
//! snake_case domain types in `otc-primitives` — the RPC contract and
//! the storage schema are allowed to diverge.

use otc_primitives::{AssetSpec, Party};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn party_to_str(party: Party) -> &'static str {
    match party {
        Party::A => "A",
        Party::B => "B",
    }
}

fn party_from_str(s: &str) -> Result<Party, String> {
    match s {
        "A" => Ok(Party::A),
        "B" => Ok(Party::B),
        other => Err(format!("unknown party {other}, expected \"A\" or \"B\"")),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSpecDto {
    pub chain_id: String,
    pub asset_code: String,
    pub amount: Decimal,
}

impl From<AssetSpecDto> for AssetSpec {
    fn from(dto: AssetSpecDto) -> Self {
        AssetSpec { chain_id: dto.chain_id, asset_code: dto.asset_code, amount: dto.amount }
    }
}

impl From<&AssetSpec> for AssetSpecDto {
    fn from(spec: &AssetSpec) -> Self {
        AssetSpecDto { chain_id: spec.chain_id.clone(), asset_code: spec.asset_code.clone(), amount: spec.amount }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealParams {
    pub side_a: AssetSpecDto,
    pub side_b: AssetSpecDto,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub commission: Option<CommissionPlanDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionReqDto {
    #[serde(rename = "type")]
    pub kind: String, // "PERCENT_BPS" | "FIXED_USD_NATIVE"
    pub percent_bps: Option<u32>,
    pub usd_fixed: Option<Decimal>,
    pub covered_by_surplus: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionPlanDto {
    pub side_a: CommissionReqDto,
    pub side_b: CommissionReqDto,
}

impl From<CommissionReqDto> for otc_primitives::CommissionReq {
    fn from(dto: CommissionReqDto) -> Self {
        match dto.kind.as_str() {
            "FIXED_USD_NATIVE" => otc_primitives::CommissionReq::FixedUsdNative {
                usd_fixed: dto.usd_fixed.unwrap_or_default(),
                native_fixed: None,
                oracle_quote: None,
                covered_by_surplus: dto.covered_by_surplus,
            },
            _ => otc_primitives::CommissionReq::PercentBps {
                percent_bps: dto.percent_bps.unwrap_or_default(),
                covered_by_surplus: dto.covered_by_surplus,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealResult {
    pub deal_id: String,
    pub link_a: String,
    pub link_b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillPartyDetailsParams {
    pub deal_id: String,
    pub party: String,
    pub payback_address: String,
    pub recipient_address: String,
    #[serde(default)]
    pub email: Option<String>,
    pub token: String,
}

impl FillPartyDetailsParams {
    pub(crate) fn party(&self) -> Result<Party, String> {
        party_from_str(&self.party)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusParams {
    pub deal_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyDetailsDto {
    pub payback_address: String,
    pub recipient_address: String,
    pub email: Option<String>,
    pub locked: bool,
}

impl From<&otc_primitives::PartyDetails> for PartyDetailsDto {
    fn from(d: &otc_primitives::PartyDetails) -> Self {
        Self {
            payback_address: d.payback_address.clone(),
            recipient_address: d.recipient_address.clone(),
            email: d.email.clone(),
            locked: d.locked,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowDto {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDto {
    pub collected_by_asset: std::collections::HashMap<String, Decimal>,
    pub deposit_count: usize,
}

impl From<&otc_primitives::Collection> for CollectionDto {
    fn from(c: &otc_primitives::Collection) -> Self {
        Self {
            collected_by_asset: c.collected_by_asset.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            deposit_count: c.deposits.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: time::OffsetDateTime,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemDto {
    pub id: String,
    pub purpose: String,
    pub to: String,
    pub asset: String,
    pub amount: Decimal,
    pub status: String,
    pub txid: Option<String>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// One thing a side still needs to send to its escrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositInstructionDto {
    pub escrow_address: String,
    pub chain_id: String,
    pub asset_code: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionsDto {
    pub side_a: Vec<DepositInstructionDto>,
    pub side_b: Vec<DepositInstructionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub stage: String,
    pub timeout_seconds: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<time::OffsetDateTime>,
    pub instructions: InstructionsDto,
    pub party_details_a: Option<PartyDetailsDto>,
    pub party_details_b: Option<PartyDetailsDto>,
    pub escrow_a: Option<EscrowDto>,
    pub escrow_b: Option<EscrowDto>,
    pub collection_a: Option<CollectionDto>,
    pub collection_b: Option<CollectionDto>,
    pub events: Vec<EventDto>,
    pub transactions: Vec<QueueItemDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelDealParams {
    pub deal_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPriceParams {
    pub chain_id: String,
    pub pair: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPriceResult {
    pub ok: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub as_of: time::OffsetDateTime,
}

pub(crate) fn party_label(party: Party) -> &'static str {
    party_to_str(party)
}
