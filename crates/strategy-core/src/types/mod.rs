//! Domain types shared across the backtesting workspace.

pub mod asset;
pub mod operation;
pub mod portfolio;
pub mod trade;

pub use asset::{AssetCatalog, AssetClass, AssetInfo};
pub use operation::{ForkRecord, OperationKind, SavedStrategy, StrategyOperation};
pub use portfolio::{LendingKind, LendingPosition, LpPosition, Portfolio};
pub use trade::{BacktestMetrics, BacktestResult, EquityPoint, SimulationWindow, Trade};
