//! Asset classification and fallback market constants.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Broad asset category used by the data cache and the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// Pegged to the reference currency; always valued at exactly 1.0.
    Stablecoin,
    /// Chain-native asset (gas token).
    Native,
    /// Any other ERC-20 style token.
    Token,
}

/// Static metadata for one tradeable asset, including the constants the data
/// cache falls back to when no historical series is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    pub symbol: String,
    pub class: AssetClass,
    /// Price used when no series could be fetched.
    pub fallback_price: Decimal,
    /// Supply APY (percent) used when no rate series could be fetched.
    pub fallback_supply_apy: Decimal,
    /// Borrow APY (percent) used when no rate series could be fetched.
    pub fallback_borrow_apy: Decimal,
}

/// Registry of known assets keyed by symbol.
///
/// Unknown symbols are treated as generic tokens with a unit fallback price,
/// so a strategy referencing an unlisted asset degrades to constants instead
/// of failing.
#[derive(Debug, Clone)]
pub struct AssetCatalog {
    assets: HashMap<String, AssetInfo>,
}

impl AssetCatalog {
    /// Build a catalog from explicit entries.
    pub fn new(entries: Vec<AssetInfo>) -> Self {
        let assets = entries
            .into_iter()
            .map(|info| (info.symbol.clone(), info))
            .collect();
        Self { assets }
    }

    /// Look up a known asset.
    pub fn get(&self, symbol: &str) -> Option<&AssetInfo> {
        self.assets.get(symbol)
    }

    /// Whether the symbol belongs to the stablecoin class.
    pub fn is_stable(&self, symbol: &str) -> bool {
        self.assets
            .get(symbol)
            .map(|info| info.class == AssetClass::Stablecoin)
            .unwrap_or(false)
    }

    /// Fallback price for a symbol (1.0 for unknown assets).
    pub fn fallback_price(&self, symbol: &str) -> Decimal {
        self.assets
            .get(symbol)
            .map(|info| info.fallback_price)
            .unwrap_or(Decimal::ONE)
    }

    /// Fallback (supply, borrow) APY pair in percent.
    pub fn fallback_rates(&self, symbol: &str) -> (Decimal, Decimal) {
        self.assets
            .get(symbol)
            .map(|info| (info.fallback_supply_apy, info.fallback_borrow_apy))
            .unwrap_or((Decimal::new(2, 0), Decimal::new(4, 0)))
    }
}

impl Default for AssetCatalog {
    fn default() -> Self {
        Self::new(vec![
            AssetInfo {
                symbol: "USDC".to_string(),
                class: AssetClass::Stablecoin,
                fallback_price: Decimal::ONE,
                fallback_supply_apy: Decimal::new(3, 0),
                fallback_borrow_apy: Decimal::new(5, 0),
            },
            AssetInfo {
                symbol: "DAI".to_string(),
                class: AssetClass::Stablecoin,
                fallback_price: Decimal::ONE,
                fallback_supply_apy: Decimal::new(3, 0),
                fallback_borrow_apy: Decimal::new(5, 0),
            },
            AssetInfo {
                symbol: "ETH".to_string(),
                class: AssetClass::Native,
                fallback_price: Decimal::new(2000, 0),
                fallback_supply_apy: Decimal::new(15, 1), // 1.5%
                fallback_borrow_apy: Decimal::new(3, 0),
            },
            AssetInfo {
                symbol: "WBTC".to_string(),
                class: AssetClass::Token,
                fallback_price: Decimal::new(40000, 0),
                fallback_supply_apy: Decimal::new(5, 1), // 0.5%
                fallback_borrow_apy: Decimal::new(2, 0),
            },
            AssetInfo {
                symbol: "ARB".to_string(),
                class: AssetClass::Token,
                fallback_price: Decimal::new(12, 1), // 1.2
                fallback_supply_apy: Decimal::new(1, 0),
                fallback_borrow_apy: Decimal::new(6, 0),
            },
        ])
    }
}
