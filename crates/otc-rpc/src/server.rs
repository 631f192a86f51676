use crate::dto::*;
use crate::error::{bad_params, to_rpc_error};
use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::proc_macros::rpc;
use otc_engine::{Engine, FillPartyDetails};
use otc_primitives::{DealId, TokenSecret};
use std::sync::Arc;

/// RPC-layer configuration: just what's needed to turn a pair of
/// tokens into shareable links (spec.md §6.3's `BASE_URL`).
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub base_url: String,
}

#[rpc(server)]
pub trait OtcRpcApi {
    #[method(name = "otc.createDeal")]
    async fn create_deal(&self, params: CreateDealParams) -> RpcResult<CreateDealResult>;

    #[method(name = "otc.fillPartyDetails")]
    async fn fill_party_details(&self, params: FillPartyDetailsParams) -> RpcResult<OkResponse>;

    #[method(name = "otc.status")]
    async fn status(&self, params: StatusParams) -> RpcResult<StatusResult>;

    #[method(name = "otc.cancelDeal")]
    async fn cancel_deal(&self, params: CancelDealParams) -> RpcResult<OkResponse>;

    #[method(name = "admin.setPrice")]
    async fn set_price(&self, params: SetPriceParams) -> RpcResult<SetPriceResult>;
}

/// The in-process dispatcher; `bin/otc-broker` hands this to whatever
/// HTTP/WS transport it binds.
pub struct RpcServerImpl {
    engine: Arc<Engine>,
    config: RpcConfig,
}

impl RpcServerImpl {
    pub fn new(engine: Arc<Engine>, config: RpcConfig) -> Self {
        Self { engine, config }
    }

    fn link_for(&self, deal_id: DealId, party: &str, token: &TokenSecret) -> String {
        format!("{}/deal/{}?party={}&token={}", self.config.base_url.trim_end_matches('/'), deal_id, party, token)
    }
}

#[async_trait]
impl OtcRpcApiServer for RpcServerImpl {
    async fn create_deal(&self, params: CreateDealParams) -> RpcResult<CreateDealResult> {
        let plan = params.commission.map(|c| otc_primitives::CommissionPlan {
            side_a: c.side_a.into(),
            side_b: c.side_b.into(),
        });
        let plan = plan.unwrap_or(otc_primitives::CommissionPlan {
            side_a: otc_primitives::CommissionReq::PercentBps { percent_bps: 0, covered_by_surplus: true },
            side_b: otc_primitives::CommissionReq::PercentBps { percent_bps: 0, covered_by_surplus: true },
        });

        let (deal_id, token_a, token_b) = self
            .engine
            .create_deal(params.side_a.into(), params.side_b.into(), params.timeout_seconds, plan)
            .await
            .map_err(to_rpc_error)?;

        Ok(CreateDealResult {
            deal_id: deal_id.to_string(),
            link_a: self.link_for(deal_id, "A", &token_a),
            link_b: self.link_for(deal_id, "B", &token_b),
        })
    }

    async fn fill_party_details(&self, params: FillPartyDetailsParams) -> RpcResult<OkResponse> {
        let party = params.party().map_err(bad_params)?;
        let deal_id: DealId = params.deal_id.parse().map_err(|e| bad_params(format!("bad dealId: {e}")))?;
        let token = TokenSecret::from(params.token.clone());

        self.engine
            .fill_party_details(
                deal_id,
                party,
                FillPartyDetails {
                    payback_address: params.payback_address,
                    recipient_address: params.recipient_address,
                    email: params.email,
                },
                &token,
            )
            .await
            .map_err(to_rpc_error)?;

        Ok(OkResponse::ok())
    }

    async fn status(&self, params: StatusParams) -> RpcResult<StatusResult> {
        let deal_id: DealId = params.deal_id.parse().map_err(|e| bad_params(format!("bad dealId: {e}")))?;
        let deal = self
            .engine
            .get_deal(deal_id)
            .await
            .map_err(to_rpc_error)?
            .ok_or_else(|| bad_params(format!("deal not found: {deal_id}")))?;

        let items = self.engine.queue_items_for_deal(deal_id).await.map_err(to_rpc_error)?;
        let transactions = items
            .iter()
            .map(|item| QueueItemDto {
                id: item.id.to_string(),
                purpose: format!("{:?}", item.purpose),
                to: item.to.clone(),
                asset: item.asset.to_string(),
                amount: item.amount,
                status: format!("{:?}", item.status),
                txid: item.submitted_tx.as_ref().and_then(|t| t.txid.clone()),
                attempts: item.attempts,
                last_error: item.last_error.clone(),
            })
            .collect();

        let outstanding = self.engine.outstanding_deposits(deal_id).await.map_err(to_rpc_error)?;

        let party_details = deal.stage.party_details();
        let (escrow_a, escrow_b, collection_a, collection_b, expires_at) = match &deal.stage {
            otc_primitives::Stage::Created(s) => {
                (s.escrow.a.as_ref().map(|e| EscrowDto { address: e.address.clone() }), s.escrow.b.as_ref().map(|e| EscrowDto { address: e.address.clone() }), None, None, None)
            }
            otc_primitives::Stage::Collection(s) => (
                Some(EscrowDto { address: s.escrow.a.address.clone() }),
                Some(EscrowDto { address: s.escrow.b.address.clone() }),
                Some(CollectionDto::from(s.collection.get(otc_primitives::Party::A))),
                Some(CollectionDto::from(s.collection.get(otc_primitives::Party::B))),
                Some(s.expires_at),
            ),
            otc_primitives::Stage::Waiting(s) => (
                Some(EscrowDto { address: s.escrow.a.address.clone() }),
                Some(EscrowDto { address: s.escrow.b.address.clone() }),
                Some(CollectionDto::from(s.collection.get(otc_primitives::Party::A))),
                Some(CollectionDto::from(s.collection.get(otc_primitives::Party::B))),
                None,
            ),
            otc_primitives::Stage::Closed(s) => (
                None,
                None,
                Some(CollectionDto::from(s.collection.get(otc_primitives::Party::A))),
                Some(CollectionDto::from(s.collection.get(otc_primitives::Party::B))),
                None,
            ),
            otc_primitives::Stage::Reverted(s) => (
                None,
                None,
                Some(CollectionDto::from(s.collection.get(otc_primitives::Party::A))),
                Some(CollectionDto::from(s.collection.get(otc_primitives::Party::B))),
                None,
            ),
        };

        let instructions_for = |side: &[(otc_primitives::FullyQualifiedAsset, rust_decimal::Decimal)],
                                 escrow: Option<&EscrowDto>| -> Vec<DepositInstructionDto> {
            let Some(escrow) = escrow else { return vec![] };
            side.iter()
                .map(|(asset, amount)| DepositInstructionDto {
                    escrow_address: escrow.address.clone(),
                    chain_id: asset.chain_id.clone(),
                    asset_code: asset.asset_code.clone(),
                    amount: *amount,
                })
                .collect()
        };
        let instructions = InstructionsDto {
            side_a: instructions_for(&outstanding.a, escrow_a.as_ref()),
            side_b: instructions_for(&outstanding.b, escrow_b.as_ref()),
        };

        Ok(StatusResult {
            stage: deal.stage.name().to_string(),
            timeout_seconds: deal.timeout_seconds,
            expires_at,
            instructions,
            party_details_a: party_details.a.as_ref().map(PartyDetailsDto::from),
            party_details_b: party_details.b.as_ref().map(PartyDetailsDto::from),
            escrow_a,
            escrow_b,
            collection_a,
            collection_b,
            events: deal.events.iter().map(|e| EventDto { timestamp: e.timestamp, message: e.message.clone() }).collect(),
            transactions,
        })
    }

    async fn cancel_deal(&self, params: CancelDealParams) -> RpcResult<OkResponse> {
        let deal_id: DealId = params.deal_id.parse().map_err(|e| bad_params(format!("bad dealId: {e}")))?;
        let token = TokenSecret::from(params.token.clone());

        self.engine.cancel_deal(deal_id, &token).await.map_err(to_rpc_error)?;
        Ok(OkResponse::ok())
    }

    async fn set_price(&self, params: SetPriceParams) -> RpcResult<SetPriceResult> {
        let quote = self
            .engine
            .set_price(params.chain_id, params.pair, params.price)
            .await
            .map_err(to_rpc_error)?;
        Ok(SetPriceResult { ok: true, as_of: quote.as_of })
    }
}
