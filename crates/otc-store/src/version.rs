use crate::errors::RocksStoreError;
use rocksdb::DB;
use std::sync::atomic::{AtomicU32, Ordering};

/// Current on-disk schema version for the store.
pub const CURRENT_VERSION: u32 = 1;
const VERSION_KEY: &[u8] = b"schema_version";
pub const META_CF: &str = "meta";

/// Tracks and migrates the store's on-disk schema version. Schema
/// version 1 is the only version so far; this exists so a future
/// column-family layout change has somewhere to hook a migration,
/// the same role `db-rocks::version::VersionManager` plays upstream.
#[derive(Debug)]
pub struct VersionManager {
    version: AtomicU32,
}

impl VersionManager {
    pub fn open(db: &DB) -> Result<Self, RocksStoreError> {
        let cf = db
            .cf_handle(META_CF)
            .ok_or_else(|| RocksStoreError::ColumnFamily(META_CF.to_string()))?;
        let version = match db.get_cf(&cf, VERSION_KEY)? {
            Some(bytes) => u32::from_be_bytes(
                bytes.as_slice().try_into().map_err(|_| {
                    RocksStoreError::ColumnFamily("malformed schema_version".to_string())
                })?,
            ),
            None => {
                db.put_cf(&cf, VERSION_KEY, CURRENT_VERSION.to_be_bytes())?;
                CURRENT_VERSION
            }
        };
        Ok(Self { version: AtomicU32::new(version) })
    }

    pub fn current_version(&self) -> u32 {
        self.version.load(Ordering::Relaxed)
    }

    pub fn needs_migration(&self) -> bool {
        self.current_version() < CURRENT_VERSION
    }

    /// Runs pending migrations. A no-op today since there has only
    /// ever been one schema version.
    pub fn migrate(&self, db: &DB) -> Result<(), RocksStoreError> {
        if !self.needs_migration() {
            return Ok(());
        }
        let cf = db
            .cf_handle(META_CF)
            .ok_or_else(|| RocksStoreError::ColumnFamily(META_CF.to_string()))?;
        db.put_cf(&cf, VERSION_KEY, CURRENT_VERSION.to_be_bytes())?;
        self.version.store(CURRENT_VERSION, Ordering::Relaxed);
        Ok(())
    }
}
