//! Leaderboard
//!
//! Ranks saved strategies by the risk-adjusted performance of their best
//! backtest, and tracks fork lineage between strategies.

pub mod forks;
pub mod ranker;

pub use forks::{fork_strategy, fork_tree, ForkNode};
pub use ranker::{build_leaderboard, rank, Medal, RankedEntry};
