//! Strategy definitions: typed operations, saved strategies, fork provenance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One declarative step of a strategy.
///
/// A closed tagged enum: every kind carries exactly the fields it needs, and
/// the execution engine matches it exhaustively. Amounts are denominated in
/// the operation's own input asset; notionals are in the reference currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyOperation {
    /// Exchange `amount_in` of `token_in` for `token_out` on a DEX.
    Swap {
        token_in: String,
        token_out: String,
        amount_in: Decimal,
        /// Slippage tolerance in percent (e.g. 0.5 for 0.5%).
        slippage_tolerance_pct: Decimal,
        /// Pool fee tier in basis points (e.g. 30 for 0.3%).
        fee_tier_bps: u32,
    },
    /// Deposit `amount` of `asset` into the lending market.
    Supply { asset: String, amount: Decimal },
    /// Borrow `amount` of `asset` against supplied collateral.
    Borrow { asset: String, amount: Decimal },
    /// Open a two-sided liquidity position worth `notional` reference units.
    CreateLpPosition {
        token_a: String,
        token_b: String,
        notional: Decimal,
        fee_tier_bps: u32,
    },
}

impl StrategyOperation {
    /// The operation's kind tag.
    pub fn kind(&self) -> OperationKind {
        match self {
            StrategyOperation::Swap { .. } => OperationKind::Swap,
            StrategyOperation::Supply { .. } => OperationKind::Supply,
            StrategyOperation::Borrow { .. } => OperationKind::Borrow,
            StrategyOperation::CreateLpPosition { .. } => OperationKind::CreateLpPosition,
        }
    }

    /// All asset symbols this operation touches.
    pub fn referenced_assets(&self) -> Vec<&str> {
        match self {
            StrategyOperation::Swap {
                token_in,
                token_out,
                ..
            } => vec![token_in, token_out],
            StrategyOperation::Supply { asset, .. } => vec![asset],
            StrategyOperation::Borrow { asset, .. } => vec![asset],
            StrategyOperation::CreateLpPosition {
                token_a, token_b, ..
            } => vec![token_a, token_b],
        }
    }
}

/// Operation kind tag, used for trade records and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Swap,
    Supply,
    Borrow,
    CreateLpPosition,
}

impl OperationKind {
    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Swap => "Swap",
            OperationKind::Supply => "Supply",
            OperationKind::Borrow => "Borrow",
            OperationKind::CreateLpPosition => "Create LP Position",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A user-authored strategy definition. The engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedStrategy {
    pub id: Uuid,
    pub name: String,
    pub operations: Vec<StrategyOperation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedStrategy {
    /// Create a new strategy with a fresh id.
    pub fn new(name: impl Into<String>, operations: Vec<StrategyOperation>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            operations,
            created_at: now,
            updated_at: now,
        }
    }

    /// Deduplicated list of every asset the strategy references.
    pub fn referenced_assets(&self) -> Vec<String> {
        let mut assets: Vec<String> = Vec::new();
        for op in &self.operations {
            for asset in op.referenced_assets() {
                if !assets.iter().any(|a| a == asset) {
                    assets.push(asset.to_string());
                }
            }
        }
        assets
    }
}

/// Fork provenance metadata for one strategy.
///
/// `fork_of` is `None` for an original strategy. `fork_count` counts only
/// direct children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkRecord {
    pub strategy_id: Uuid,
    pub fork_of: Option<Uuid>,
    pub fork_count: u32,
}

impl ForkRecord {
    /// Record for an original (non-forked) strategy.
    pub fn original(strategy_id: Uuid) -> Self {
        Self {
            strategy_id,
            fork_of: None,
            fork_count: 0,
        }
    }

    /// Record for a freshly created fork.
    pub fn forked_from(strategy_id: Uuid, source: Uuid) -> Self {
        Self {
            strategy_id,
            fork_of: Some(source),
            fork_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_serde_tagging() {
        let op = StrategyOperation::Swap {
            token_in: "USDC".to_string(),
            token_out: "ETH".to_string(),
            amount_in: Decimal::new(1000, 0),
            slippage_tolerance_pct: Decimal::new(5, 1),
            fee_tier_bps: 30,
        };

        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["kind"], "swap");
        assert_eq!(json["token_in"], "USDC");

        let back: StrategyOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_referenced_assets_deduplicated() {
        let strategy = SavedStrategy::new(
            "eth loop",
            vec![
                StrategyOperation::Swap {
                    token_in: "USDC".to_string(),
                    token_out: "ETH".to_string(),
                    amount_in: Decimal::new(500, 0),
                    slippage_tolerance_pct: Decimal::new(5, 1),
                    fee_tier_bps: 30,
                },
                StrategyOperation::Supply {
                    asset: "ETH".to_string(),
                    amount: Decimal::new(1, 1),
                },
            ],
        );

        assert_eq!(strategy.referenced_assets(), vec!["USDC", "ETH"]);
    }

    #[test]
    fn test_fork_record_constructors() {
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();

        let original = ForkRecord::original(parent);
        assert!(original.fork_of.is_none());
        assert_eq!(original.fork_count, 0);

        let fork = ForkRecord::forked_from(child, parent);
        assert_eq!(fork.fork_of, Some(parent));
        assert_eq!(fork.fork_count, 0);
    }
}
