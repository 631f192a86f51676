use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One side's nominal send amount: `amount` of `asset_code` on
/// `chain_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub chain_id: String,
    pub asset_code: String,
    pub amount: Decimal,
}

impl AssetSpec {
    pub fn qualified_asset(&self) -> FullyQualifiedAsset {
        FullyQualifiedAsset { asset_code: self.asset_code.clone(), chain_id: self.chain_id.clone() }
    }
}

/// `SYMBOL@chainId`, as used to key collected-amount maps and
/// deposits. Parsing/formatting lives here so every component agrees
/// on the wire format; the asset registry is the place that decides
/// whether a given code is *known*.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FullyQualifiedAsset {
    pub asset_code: String,
    pub chain_id: String,
}

impl fmt::Display for FullyQualifiedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.asset_code, self.chain_id)
    }
}

impl std::str::FromStr for FullyQualifiedAsset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (asset_code, chain_id) =
            s.split_once('@').ok_or_else(|| format!("malformed asset code: {s}"))?;
        if asset_code.is_empty() || chain_id.is_empty() {
            return Err(format!("malformed asset code: {s}"));
        }
        Ok(Self { asset_code: asset_code.to_string(), chain_id: chain_id.to_string() })
    }
}

impl TryFrom<String> for FullyQualifiedAsset {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FullyQualifiedAsset> for String {
    fn from(a: FullyQualifiedAsset) -> Self {
        a.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display() {
        let asset: FullyQualifiedAsset = "USDC@ETH".parse().unwrap();
        assert_eq!(asset.asset_code, "USDC");
        assert_eq!(asset.chain_id, "ETH");
        assert_eq!(asset.to_string(), "USDC@ETH");
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!("USDC".parse::<FullyQualifiedAsset>().is_err());
        assert!("@ETH".parse::<FullyQualifiedAsset>().is_err());
        assert!("USDC@".parse::<FullyQualifiedAsset>().is_err());
    }
}
