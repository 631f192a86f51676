//! The Persistent Store (C3): durable records for deals, deposits,
//! queue items, tokens, and oracle quotes, backed by RocksDB in the
//! same table-per-column-family style as the teacher's
//! `reth-db-rocks` crate.

#![warn(rust_2018_idioms)]

mod errors;
mod metrics;
mod rocks;
mod tables;
mod traits;
mod version;

pub use errors::RocksStoreError;
pub use rocks::RocksStore;
pub use traits::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use otc_primitives::{
        AssetSpec, ClosedState, Collection, CollectionState, CommissionPlan, CommissionReq, CreatedState,
        Deal, DealId, Deposit, EscrowAccount, FullyQualifiedAsset, Party, PartyDetails, PerSide, Purpose,
        QueueItem, QueueStatus, Stage, Token,
    };
    use rust_decimal::Decimal;
    use tempfile::TempDir;
    use time::OffsetDateTime;

    fn party_details() -> PartyDetails {
        PartyDetails {
            payback_address: "payback".into(),
            recipient_address: "recipient".into(),
            email: None,
            filled_at: OffsetDateTime::now_utc(),
            locked: true,
        }
    }

    fn escrow(tag: &str) -> EscrowAccount {
        EscrowAccount { address: format!("addr-{tag}"), key_ref: format!("key-{tag}") }
    }

    fn sample_deal() -> Deal {
        Deal {
            id: DealId::new(),
            timeout_seconds: 3600,
            side_a: AssetSpec { chain_id: "ETH".into(), asset_code: "USDC".into(), amount: Decimal::new(100, 0) },
            side_b: AssetSpec { chain_id: "POLYGON".into(), asset_code: "MATIC".into(), amount: Decimal::new(200, 0) },
            commission_plan: CommissionPlan {
                side_a: CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true },
                side_b: CommissionReq::PercentBps { percent_bps: 30, covered_by_surplus: true },
            },
            events: vec![],
            stage: Stage::Collection(CollectionState {
                party_details: PerSide::new(party_details(), party_details()),
                escrow: PerSide::new(escrow("a"), escrow("b")),
                expires_at: OffsetDateTime::now_utc(),
                collection: PerSide::new(Collection::default(), Collection::default()),
            }),
        }
    }

    #[test]
    fn round_trips_a_deal() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(&dir.path().join("db")).unwrap();
        let deal = sample_deal();
        store.put_deal(&deal).unwrap();
        let loaded = store.get_deal(deal.id).unwrap().unwrap();
        assert_eq!(loaded, deal);
        assert_eq!(store.list_active_deal_ids().unwrap(), vec![deal.id]);
    }

    #[test]
    fn closed_deals_are_not_active() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(&dir.path().join("db")).unwrap();
        let mut deal = sample_deal();
        deal.stage = Stage::Closed(ClosedState {
            party_details: PerSide::new(party_details(), party_details()),
            collection: PerSide::new(Collection::default(), Collection::default()),
            queue_item_ids: vec![],
        });
        store.put_deal(&deal).unwrap();
        assert!(store.list_active_deal_ids().unwrap().is_empty());
    }

    #[test]
    fn tokens_are_single_use() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(&dir.path().join("db")).unwrap();
        let deal_id = DealId::new();
        let (token, secret) = Token::new(deal_id, Party::A);
        store.put_token(&token).unwrap();
        assert!(!store.get_token(&secret).unwrap().unwrap().is_used());
        store.mark_token_used(&secret).unwrap();
        assert!(store.get_token(&secret).unwrap().unwrap().is_used());
    }

    #[test]
    fn deposits_are_scoped_by_deal_and_side() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(&dir.path().join("db")).unwrap();
        let deal_id = DealId::new();
        let asset: FullyQualifiedAsset = "USDC@ETH".parse().unwrap();
        let deposit = Deposit {
            txid: "t1".into(),
            asset,
            amount: Decimal::new(10, 0),
            confirms: 1,
            block_time: None,
            first_seen_at: OffsetDateTime::now_utc(),
        };
        assert!(store.record_deposit(deal_id, Party::A, &deposit).unwrap());
        assert!(!store.record_deposit(deal_id, Party::A, &deposit).unwrap());
        assert_eq!(store.list_deposits(deal_id, Party::A).unwrap().len(), 1);
        assert!(store.list_deposits(deal_id, Party::B).unwrap().is_empty());
    }

    #[test]
    fn queue_items_filter_by_status_and_deal() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(&dir.path().join("db")).unwrap();
        let deal_id = DealId::new();
        let asset: FullyQualifiedAsset = "USDC@ETH".parse().unwrap();
        let mut item =
            QueueItem::new(deal_id, Purpose::SwapPayout, escrow("a"), "to".into(), asset, Decimal::new(1, 0));
        store.put_queue_item(&item).unwrap();
        assert_eq!(store.list_active_queue_items().unwrap().len(), 1);
        assert_eq!(store.list_queue_items_for_deal(deal_id).unwrap().len(), 1);

        item.status = QueueStatus::Completed;
        store.put_queue_item(&item).unwrap();
        assert!(store.list_active_queue_items().unwrap().is_empty());
    }

    #[test]
    fn refuses_to_open_existing_db_missing_tokens_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        {
            // Create a bare rocksdb database with no column families,
            // simulating a pre-tokens-table database.
            let opts = rocksdb::Options::default();
            let mut create_opts = opts;
            create_opts.create_if_missing(true);
            let _db = rocksdb::DB::open(&create_opts, &path).unwrap();
        }
        let err = RocksStore::open(&path).unwrap_err();
        assert!(matches!(err, otc_primitives::StoreError::MissingTable(_)));
    }

    // Keep the unused "created" stage variant grounded in the sum-type
    // design even though this suite doesn't exercise CREATED directly.
    #[allow(dead_code)]
    fn _created_state_compiles() -> Stage {
        Stage::Created(CreatedState {
            party_details: PerSide::new(None, None),
            escrow: PerSide::new(None, None),
        })
    }
}
