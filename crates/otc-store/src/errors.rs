use otc_primitives::StoreError;
use thiserror::Error;

/// RocksDB-specific errors, mapped onto the crate-wide [`StoreError`]
/// at the `otc-store` boundary.
#[derive(Error, Debug)]
pub enum RocksStoreError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("column family missing: {0}")]
    ColumnFamily(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("required table missing at open: {0}")]
    RequiredTableMissing(String),
}

impl From<RocksStoreError> for StoreError {
    fn from(error: RocksStoreError) -> Self {
        match error {
            RocksStoreError::RocksDb(e) => Self::Backend(e.to_string()),
            RocksStoreError::ColumnFamily(msg) => Self::Backend(msg),
            RocksStoreError::Codec(e) => Self::Codec(e.to_string()),
            RocksStoreError::RequiredTableMissing(table) => Self::MissingTable(table),
        }
    }
}
