//! Backtester
//!
//! Historical simulation framework for DeFi strategy backtests.
//!
//! # Features
//!
//! - **Execution Engine**: Tick-by-tick strategy replay with slippage, gas,
//!   and protocol-fee models
//! - **Metrics**: Total return, max drawdown, annualized Sharpe, win rate,
//!   and impermanent loss
//! - **Scheduler**: Staged pipeline with progress events and cooperative
//!   cancellation
//!
//! # Example
//!
//! ```ignore
//! use backtester::{BacktestConfig, EngineConfig, SimulationScheduler};
//!
//! let scheduler = SimulationScheduler::new(cache, EngineConfig::default());
//! let mut handle = scheduler.start(BacktestConfig {
//!     strategy,
//!     window,
//!     initial_capital: dec!(10_000),
//!     tick_interval: Duration::days(1),
//! })?;
//!
//! while let Some(event) = handle.next_event().await {
//!     println!("{event:?}");
//! }
//! ```

pub mod engine;
pub mod metrics;
pub mod scheduler;

pub use engine::{EngineConfig, ExecutionEngine, RunParams, SimulationOutput, SimulationRun};
pub use scheduler::{
    BacktestConfig, CancelToken, SchedulerState, SimulationEvent, SimulationHandle,
    SimulationScheduler, Stage,
};
