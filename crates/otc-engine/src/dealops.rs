//! `createDeal` / `fillPartyDetails` / `cancelDeal` — the three
//! mutations the RPC surface drives directly, outside the tick loop.

use crate::engine::Engine;
use otc_primitives::{
    AssetSpec, Collection, CollectionState, CommissionPlan, CommissionReq, CreatedState, Deal, DealId, OtcError,
    Party, PartyDetails, PerSide, RevertedState, Stage, Token, TokenSecret,
};
use time::OffsetDateTime;

/// Caller-supplied fields for `otc.fillPartyDetails`.
pub struct FillPartyDetails {
    pub payback_address: String,
    pub recipient_address: String,
    pub email: Option<String>,
}

impl Engine {
    /// Creates a new deal in CREATED and mints one single-use token
    /// per side.
    pub async fn create_deal(
        &self,
        side_a: AssetSpec,
        side_b: AssetSpec,
        timeout_seconds: u64,
        commission_plan: CommissionPlan,
    ) -> Result<(DealId, TokenSecret, TokenSecret), OtcError> {
        if timeout_seconds < 300 {
            return Err(OtcError::Validation("timeoutSeconds must be >= 300".into()));
        }
        if !self.registry.is_known_asset(&side_a.qualified_asset()) {
            return Err(OtcError::Validation(format!("unknown asset {}", side_a.qualified_asset())));
        }
        if !self.registry.is_known_asset(&side_b.qualified_asset()) {
            return Err(OtcError::Validation(format!("unknown asset {}", side_b.qualified_asset())));
        }

        let deal = Deal {
            id: DealId::new(),
            timeout_seconds,
            side_a,
            side_b,
            commission_plan,
            events: vec![],
            stage: Stage::Created(CreatedState {
                party_details: PerSide::new(None, None),
                escrow: PerSide::new(None, None),
                collection: PerSide::new(Collection::default(), Collection::default()),
            }),
        };

        let (token_a, secret_a) = Token::new(deal.id, Party::A);
        let (token_b, secret_b) = Token::new(deal.id, Party::B);
        let deal_id = deal.id;

        self.save_deal(deal).await?;
        self.put_token(&token_a).await?;
        self.put_token(&token_b).await?;

        Ok((deal_id, secret_a, secret_b))
    }

    /// Authorizes and records one side's contact/settlement details.
    /// Generates that side's escrow account on first fill. When both
    /// sides end up locked, transitions CREATED → COLLECTION in the
    /// same call (spec.md §4.4), freezing any `FIXED_USD_NATIVE`
    /// commission against a fresh oracle quote.
    pub async fn fill_party_details(
        &self,
        deal_id: DealId,
        party: Party,
        details: FillPartyDetails,
        token: &TokenSecret,
    ) -> Result<(), OtcError> {
        let _lease = self.leases.acquire(deal_id).await;

        let token_record = self.get_token(token).await?.ok_or_else(|| OtcError::Authorization("unknown token".into()))?;
        if token_record.deal_id != deal_id || token_record.party != party {
            return Err(OtcError::Authorization("token does not authorize this deal/side".into()));
        }
        if token_record.is_used() {
            return Err(OtcError::Authorization("token already used".into()));
        }

        let mut deal = self.load_deal(deal_id).await?.ok_or_else(|| OtcError::DealNotFound(deal_id.to_string()))?;
        let Stage::Created(state) = &mut deal.stage else {
            return Err(OtcError::Precondition("party details can only be filled while CREATED".into()));
        };
        if state.party_details.get(party).is_some() {
            return Err(OtcError::Precondition("party details already locked for this side".into()));
        }

        let side_spec = deal.side(party).clone();
        let plugin = self.plugin_for(&side_spec.chain_id)?.clone();
        if !plugin.validate_address(&details.payback_address).await.map_err(OtcError::Plugin)? {
            return Err(OtcError::Validation("invalid payback address".into()));
        }
        if !plugin.validate_address(&details.recipient_address).await.map_err(OtcError::Plugin)? {
            return Err(OtcError::Validation("invalid recipient address".into()));
        }
        let escrow = plugin.generate_escrow_account(&side_spec.asset_code).await.map_err(OtcError::Plugin)?;

        let Stage::Created(state) = &mut deal.stage else { unreachable!() };
        *state.party_details.get_mut(party) = Some(PartyDetails {
            payback_address: details.payback_address,
            recipient_address: details.recipient_address,
            email: details.email,
            filled_at: OffsetDateTime::now_utc(),
            locked: true,
        });
        *state.escrow.get_mut(party) = Some(escrow);
        deal.push_event(format!("party details filled for side {party:?}"));

        self.mark_token_used(token).await?;
        self.maybe_enter_collection(&mut deal).await?;
        self.save_deal(deal).await?;
        Ok(())
    }

    async fn maybe_enter_collection(&self, deal: &mut Deal) -> Result<(), OtcError> {
        let (details_a, details_b, escrow_a, escrow_b, collection) = match &deal.stage {
            Stage::Created(state) => {
                match (state.party_details.a.clone(), state.party_details.b.clone(), state.escrow.a.clone(), state.escrow.b.clone()) {
                    (Some(da), Some(db), Some(ea), Some(eb)) => (da, db, ea, eb, state.collection.clone()),
                    _ => return Ok(()),
                }
            }
            _ => return Ok(()),
        };

        self.freeze_commission_if_needed(deal, Party::A).await?;
        self.freeze_commission_if_needed(deal, Party::B).await?;

        deal.stage = Stage::Collection(CollectionState {
            party_details: PerSide::new(details_a, details_b),
            escrow: PerSide::new(escrow_a, escrow_b),
            expires_at: OffsetDateTime::now_utc() + time::Duration::seconds(deal.timeout_seconds as i64),
            collection,
        });
        deal.push_event("entered COLLECTION");
        Ok(())
    }

    async fn freeze_commission_if_needed(&self, deal: &mut Deal, party: Party) -> Result<(), OtcError> {
        let usd_fixed = match commission_for(&deal.commission_plan, party) {
            CommissionReq::FixedUsdNative { native_fixed: None, usd_fixed, .. } => *usd_fixed,
            _ => return Ok(()),
        };
        let chain_id = deal.side(party).chain_id.clone();
        let plugin = self.plugin_for(&chain_id)?.clone();
        let quote = plugin.quote_native_for_usd(usd_fixed).await.map_err(OtcError::Plugin)?;
        commission_for_mut(&mut deal.commission_plan, party).freeze(quote.quote, quote.native_amount);
        Ok(())
    }

    /// `cancelDeal`: only legal from CREATED with no deposits observed
    /// on either side (spec.md §5). The token alone identifies the
    /// calling side. Needs no outbound transfers.
    pub async fn cancel_deal(&self, deal_id: DealId, token: &TokenSecret) -> Result<(), OtcError> {
        let _lease = self.leases.acquire(deal_id).await;

        let token_record = self.get_token(token).await?.ok_or_else(|| OtcError::Authorization("unknown token".into()))?;
        if token_record.deal_id != deal_id {
            return Err(OtcError::Authorization("token does not authorize this deal".into()));
        }
        let party = token_record.party;

        let mut deal = self.load_deal(deal_id).await?.ok_or_else(|| OtcError::DealNotFound(deal_id.to_string()))?;
        let Stage::Created(state) = &deal.stage else {
            return Err(OtcError::Precondition("cannot cancel deal, assets have already been locked".into()));
        };
        if !state.collection.a.deposits.is_empty() || !state.collection.b.deposits.is_empty() {
            return Err(OtcError::Precondition("cannot cancel deal, a deposit has already been observed".into()));
        }
        let party_details = state.party_details.clone();
        let collection = state.collection.clone();

        deal.stage = Stage::Reverted(RevertedState { party_details, collection, refund_item_ids: vec![] });
        deal.push_event(format!("cancelled by side {party:?}"));
        self.save_deal(deal).await?;
        Ok(())
    }

    async fn get_token(&self, token: &TokenSecret) -> Result<Option<Token>, OtcError> {
        let store = self.store.clone();
        let token = token.clone();
        let result = tokio::task::spawn_blocking(move || store.get_token(&token))
            .await
            .map_err(|e| OtcError::Invariant(e.to_string()))?;
        Ok(result?)
    }

    async fn put_token(&self, token: &Token) -> Result<(), OtcError> {
        let store = self.store.clone();
        let token = token.clone();
        let result = tokio::task::spawn_blocking(move || store.put_token(&token))
            .await
            .map_err(|e| OtcError::Invariant(e.to_string()))?;
        Ok(result?)
    }

    async fn mark_token_used(&self, token: &TokenSecret) -> Result<(), OtcError> {
        let store = self.store.clone();
        let token = token.clone();
        let result = tokio::task::spawn_blocking(move || store.mark_token_used(&token))
            .await
            .map_err(|e| OtcError::Invariant(e.to_string()))?;
        Ok(result?)
    }
}

fn commission_for(plan: &CommissionPlan, party: Party) -> &CommissionReq {
    match party {
        Party::A => &plan.side_a,
        Party::B => &plan.side_b,
    }
}

fn commission_for_mut(plan: &mut CommissionPlan, party: Party) -> &mut CommissionReq {
    match party {
        Party::A => &mut plan.side_a,
        Party::B => &mut plan.side_b,
    }
}
