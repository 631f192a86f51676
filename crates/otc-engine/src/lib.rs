//! Owns the Deal State Machine (C6), the Transaction Queue (C7), and
//! the Engine Tick Loop (C8): the mutable heart of the broker, built
//! on top of the Persistent Store (C3) and the per-chain plugins (C1).

#![warn(rust_2018_idioms)]

mod admin;
mod dealops;
mod engine;
mod leases;
mod queue;
mod state_machine;
mod tick;

pub use dealops::FillPartyDetails;
pub use engine::{Engine, EngineConfig, EngineSnapshot};

#[cfg(test)]
mod tests {
    use super::*;
    use otc_chain_api::memory::MemoryChainPlugin;
    use otc_primitives::{AssetSpec, CommissionPlan, CommissionReq, OtcError, Party, Stage};
    use otc_registry::{AssetInfo, AssetRegistry};
    use otc_store::RocksStore;
    use otc_watcher::Watcher;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn registry() -> Arc<AssetRegistry> {
        let mut r = AssetRegistry::new();
        r.register(AssetInfo { chain_id: "ETH".into(), asset_code: "USDC".into(), decimals: 6, is_native: false });
        r.register(AssetInfo { chain_id: "ETH".into(), asset_code: "ETH".into(), decimals: 18, is_native: true });
        r.register(AssetInfo { chain_id: "POLYGON".into(), asset_code: "MATIC".into(), decimals: 18, is_native: true });
        Arc::new(r)
    }

    fn test_engine(dir: &tempfile::TempDir) -> (Engine, Arc<MemoryChainPlugin>, Arc<MemoryChainPlugin>) {
        let store: Arc<dyn otc_store::Store> = Arc::new(RocksStore::open(dir.path()).unwrap());
        let eth = Arc::new(MemoryChainPlugin::new("ETH", 1));
        let polygon = Arc::new(MemoryChainPlugin::new("POLYGON", 1));

        let mut plugins: HashMap<String, Arc<dyn otc_chain_api::ChainPlugin>> = HashMap::new();
        plugins.insert("ETH".into(), eth.clone());
        plugins.insert("POLYGON".into(), polygon.clone());

        let mut watchers = HashMap::new();
        watchers.insert("ETH".into(), Arc::new(Watcher::new(eth.clone(), store.clone())));
        watchers.insert("POLYGON".into(), Arc::new(Watcher::new(polygon.clone(), store.clone())));

        let mut operator_addresses = HashMap::new();
        operator_addresses.insert("ETH".into(), "operator-eth".to_string());
        operator_addresses.insert("POLYGON".into(), "operator-polygon".to_string());

        let engine = Engine::new(
            store,
            registry(),
            plugins,
            watchers,
            EngineConfig { max_attempts_per_item: 10, operator_addresses },
        );
        (engine, eth, polygon)
    }

    fn commission(percent_bps: u32) -> CommissionReq {
        CommissionReq::PercentBps { percent_bps, covered_by_surplus: true }
    }

    #[tokio::test]
    async fn happy_path_closes_with_no_surplus() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, eth, polygon) = test_engine(&dir);

        let side_a = AssetSpec { chain_id: "ETH".into(), asset_code: "USDC".into(), amount: Decimal::new(100, 0) };
        let side_b = AssetSpec { chain_id: "POLYGON".into(), asset_code: "MATIC".into(), amount: Decimal::new(200, 0) };
        let plan = CommissionPlan { side_a: commission(0), side_b: commission(0) };

        let (deal_id, token_a, token_b) = engine.create_deal(side_a, side_b, 3600, plan).await.unwrap();

        engine
            .fill_party_details(
                deal_id,
                Party::A,
                FillPartyDetails {
                    payback_address: "payback-a".into(),
                    recipient_address: "recipient-a".into(),
                    email: None,
                },
                &token_a,
            )
            .await
            .unwrap();
        engine
            .fill_party_details(
                deal_id,
                Party::B,
                FillPartyDetails {
                    payback_address: "payback-b".into(),
                    recipient_address: "recipient-b".into(),
                    email: None,
                },
                &token_b,
            )
            .await
            .unwrap();

        let deal = engine.load_deal(deal_id).await.unwrap().unwrap();
        let Stage::Collection(state) = &deal.stage else { panic!("expected COLLECTION") };
        let escrow_a = state.escrow.a.address.clone();
        let escrow_b = state.escrow.b.address.clone();

        eth.credit_deposit(&escrow_a, "USDC@ETH".parse().unwrap(), Decimal::new(100, 0), 1);
        polygon.credit_deposit(&escrow_b, "MATIC@POLYGON".parse().unwrap(), Decimal::new(200, 0), 1);

        for _ in 0..6 {
            engine.tick().await.unwrap();
            eth.confirm_all(1);
            polygon.confirm_all(1);
        }

        let deal = engine.load_deal(deal_id).await.unwrap().unwrap();
        assert!(matches!(deal.stage, Stage::Closed(_)), "expected CLOSED, got {:?}", deal.stage.name());
    }

    #[tokio::test]
    async fn cancel_before_deposits_reverts_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _eth, _polygon) = test_engine(&dir);

        let side_a = AssetSpec { chain_id: "ETH".into(), asset_code: "USDC".into(), amount: Decimal::new(100, 0) };
        let side_b = AssetSpec { chain_id: "POLYGON".into(), asset_code: "MATIC".into(), amount: Decimal::new(200, 0) };
        let plan = CommissionPlan { side_a: commission(0), side_b: commission(0) };
        let (deal_id, token_a, _token_b) = engine.create_deal(side_a, side_b, 3600, plan).await.unwrap();

        engine.cancel_deal(deal_id, &token_a).await.unwrap();

        let deal = engine.load_deal(deal_id).await.unwrap().unwrap();
        assert!(matches!(deal.stage, Stage::Reverted(_)));
    }

    #[tokio::test]
    async fn cancel_after_a_deposit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, eth, _polygon) = test_engine(&dir);

        let side_a = AssetSpec { chain_id: "ETH".into(), asset_code: "USDC".into(), amount: Decimal::new(100, 0) };
        let side_b = AssetSpec { chain_id: "POLYGON".into(), asset_code: "MATIC".into(), amount: Decimal::new(200, 0) };
        let plan = CommissionPlan { side_a: commission(0), side_b: commission(0) };
        let (deal_id, token_a, _token_b) = engine.create_deal(side_a, side_b, 3600, plan).await.unwrap();

        engine
            .fill_party_details(
                deal_id,
                Party::A,
                FillPartyDetails {
                    payback_address: "payback-a".into(),
                    recipient_address: "recipient-a".into(),
                    email: None,
                },
                &token_a,
            )
            .await
            .unwrap();

        let deal = engine.load_deal(deal_id).await.unwrap().unwrap();
        let Stage::Created(state) = &deal.stage else { panic!("expected CREATED") };
        let escrow_a = state.escrow.a.as_ref().unwrap().address.clone();
        eth.credit_deposit(&escrow_a, "USDC@ETH".parse().unwrap(), Decimal::new(10, 0), 1);

        engine.tick().await.unwrap();

        let err = engine.cancel_deal(deal_id, &token_a).await.unwrap_err();
        assert!(matches!(err, OtcError::Precondition(_)));

        let deal = engine.load_deal(deal_id).await.unwrap().unwrap();
        assert!(matches!(deal.stage, Stage::Created(_)));
    }

    #[tokio::test]
    async fn reusing_a_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _eth, _polygon) = test_engine(&dir);

        let side_a = AssetSpec { chain_id: "ETH".into(), asset_code: "USDC".into(), amount: Decimal::new(100, 0) };
        let side_b = AssetSpec { chain_id: "POLYGON".into(), asset_code: "MATIC".into(), amount: Decimal::new(200, 0) };
        let plan = CommissionPlan { side_a: commission(0), side_b: commission(0) };
        let (deal_id, token_a, _token_b) = engine.create_deal(side_a, side_b, 3600, plan).await.unwrap();

        let details = || FillPartyDetails {
            payback_address: "payback-a".into(),
            recipient_address: "recipient-a".into(),
            email: None,
        };
        engine.fill_party_details(deal_id, Party::A, details(), &token_a).await.unwrap();
        let second = engine.fill_party_details(deal_id, Party::A, details(), &token_a).await;
        assert!(matches!(second, Err(OtcError::Authorization(_))));
    }
}
