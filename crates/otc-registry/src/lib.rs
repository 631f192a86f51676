//! The Asset Registry (C2): a read-only catalog of chains and assets.
//! Treated throughout the engine as a lookup, never a mutation target
//! (spec.md §1 names the registry itself as an external collaborator
//! specified only at its interface — this in-process implementation
//! is the minimal stand-in the engine depends on).

#![warn(rust_2018_idioms)]

use otc_primitives::FullyQualifiedAsset;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Static metadata about one asset on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub chain_id: String,
    pub asset_code: String,
    pub decimals: u8,
    /// `true` if this is the chain's native gas asset (relevant to
    /// `FIXED_USD_NATIVE` commissions).
    pub is_native: bool,
}

/// Read-only catalog of known `(chainId, assetCode)` pairs.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: HashMap<(String, String), AssetInfo>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, info: AssetInfo) {
        self.assets.insert((info.chain_id.clone(), info.asset_code.clone()), info);
    }

    pub fn is_known(&self, chain_id: &str, asset_code: &str) -> bool {
        self.assets.contains_key(&(chain_id.to_string(), asset_code.to_string()))
    }

    pub fn is_known_asset(&self, asset: &FullyQualifiedAsset) -> bool {
        self.is_known(&asset.chain_id, &asset.asset_code)
    }

    pub fn info(&self, chain_id: &str, asset_code: &str) -> Option<&AssetInfo> {
        self.assets.get(&(chain_id.to_string(), asset_code.to_string()))
    }

    /// The chain's native gas asset code, used to resolve
    /// `FIXED_USD_NATIVE` commission denomination.
    pub fn native_asset_of(&self, chain_id: &str) -> Option<&str> {
        self.assets
            .values()
            .find(|a| a.chain_id == chain_id && a.is_native)
            .map(|a| a.asset_code.as_str())
    }

    pub fn decimals_of(&self, chain_id: &str, asset_code: &str) -> Option<u8> {
        self.info(chain_id, asset_code).map(|a| a.decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AssetRegistry {
        let mut r = AssetRegistry::new();
        r.register(AssetInfo { chain_id: "ETH".into(), asset_code: "ETH".into(), decimals: 18, is_native: true });
        r.register(AssetInfo { chain_id: "ETH".into(), asset_code: "USDC".into(), decimals: 6, is_native: false });
        r
    }

    #[test]
    fn looks_up_known_assets() {
        let r = registry();
        assert!(r.is_known("ETH", "USDC"));
        assert!(!r.is_known("ETH", "DAI"));
        assert_eq!(r.native_asset_of("ETH"), Some("ETH"));
        assert_eq!(r.decimals_of("ETH", "USDC"), Some(6));
    }
}
