//! Asset metadata.

use serde::{Deserialize, Serialize};

/// Asset classification. Only `Crypto` allows fractional share quantities by
/// default (see `Self::allows_fractional`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    Crypto,
    Bond,
    Fx,
    Commodity,
    MultiAsset,
}

impl AssetClass {
    /// Whether instruments of this class are sized in fractional units by
    /// default. Equities, bonds, FX lots, and commodity contracts round down
    /// to whole units; crypto does not.
    pub fn allows_fractional(self) -> bool {
        matches!(self, AssetClass::Crypto)
    }
}

/// Metadata describing a tradable symbol within a panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub display_name: Option<String>,
    pub benchmark: Option<String>,
    /// Overrides `asset_class.allows_fractional()` when set explicitly.
    pub allows_fractional: Option<bool>,
}

impl AssetMetadata {
    pub fn new(symbol: impl Into<String>, asset_class: AssetClass) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class,
            display_name: None,
            benchmark: None,
            allows_fractional: None,
        }
    }

    pub fn allows_fractional(&self) -> bool {
        self.allows_fractional
            .unwrap_or_else(|| self.asset_class.allows_fractional())
    }
}
