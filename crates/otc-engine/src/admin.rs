//! `admin.setPrice` and the read-only accessors `otc-rpc` needs to
//! assemble `otc.status` responses.

use crate::engine::Engine;
use otc_primitives::{Deal, DealId, FullyQualifiedAsset, OracleQuote, OtcError, Party, PerSide, QueueItem, QuoteSource};
use rust_decimal::Decimal;
use time::OffsetDateTime;

impl Engine {
    /// Injects a manually-set price quote, used by `FIXED_USD_NATIVE`
    /// commission freezing the next time a deal enters COLLECTION.
    pub async fn set_price(&self, chain_id: String, pair: String, price: Decimal) -> Result<OracleQuote, OtcError> {
        let quote = OracleQuote { chain_id, pair, price, as_of: OffsetDateTime::now_utc(), source: QuoteSource::Manual };
        let store = self.store.clone();
        let to_store = quote.clone();
        let result = tokio::task::spawn_blocking(move || store.put_oracle_quote(&to_store))
            .await
            .map_err(|e| OtcError::Invariant(e.to_string()))?;
        result?;
        Ok(quote)
    }

    /// Read-only deal lookup for `otc.status`.
    pub async fn get_deal(&self, deal_id: DealId) -> Result<Option<Deal>, OtcError> {
        Ok(self.load_deal(deal_id).await?)
    }

    /// Queue items belonging to one deal, for `otc.status`'s
    /// `transactions` field.
    pub async fn queue_items_for_deal(&self, deal_id: DealId) -> Result<Vec<QueueItem>, OtcError> {
        Ok(self.list_queue_items_for_deal(deal_id).await?)
    }

    /// Per-side, per-asset amounts still owed for `otc.status`'s
    /// `instructions` field: what's required to fund that side minus
    /// what's already been collected. Before a `FIXED_USD_NATIVE`
    /// commission is frozen, only the send amount is known.
    pub async fn outstanding_deposits(
        &self,
        deal_id: DealId,
    ) -> Result<PerSide<Vec<(FullyQualifiedAsset, Decimal)>>, OtcError> {
        let deal = self.load_deal(deal_id).await?.ok_or_else(|| OtcError::DealNotFound(deal_id.to_string()))?;
        let Some(collection) = deal.stage.collection() else {
            return Ok(PerSide::new(vec![], vec![]));
        };

        let side = |party: Party| -> Vec<(FullyQualifiedAsset, Decimal)> {
            let side_spec = deal.side(party);
            let commission = match party {
                Party::A => &deal.commission_plan.side_a,
                Party::B => &deal.commission_plan.side_b,
            };
            let col = collection.get(party);

            if !commission.is_frozen() {
                let send_asset = side_spec.qualified_asset();
                let remaining = side_spec.amount - col.collected(&send_asset);
                return if remaining > Decimal::ZERO { vec![(send_asset, remaining)] } else { vec![] };
            }

            let obligation = crate::state_machine::obligation_for_side(side_spec, commission, &self.registry);
            obligation
                .owed_assets()
                .into_iter()
                .filter_map(|asset| {
                    let remaining = obligation.required_for_funding(&asset) - col.collected(&asset);
                    (remaining > Decimal::ZERO).then_some((asset, remaining))
                })
                .collect()
        };

        Ok(PerSide::new(side(Party::A), side(Party::B)))
    }
}
