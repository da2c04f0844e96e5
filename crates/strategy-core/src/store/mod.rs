//! Persistence layer for strategies, backtest results, and fork records.

pub mod memory;
pub mod postgres;

use crate::types::{BacktestResult, ForkRecord, SavedStrategy};
use crate::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Key-addressed storage for strategy definitions, their backtest results,
/// and fork provenance. No transactional guarantees are assumed.
#[async_trait]
pub trait StrategyStore: Send + Sync {
    async fn get_strategy(&self, id: Uuid) -> Result<Option<SavedStrategy>>;
    async fn put_strategy(&self, strategy: &SavedStrategy) -> Result<()>;
    async fn list_strategies(&self) -> Result<Vec<SavedStrategy>>;

    /// All recorded results for one strategy, in insertion order.
    async fn list_results(&self, strategy_id: Uuid) -> Result<Vec<BacktestResult>>;
    async fn put_result(&self, result: &BacktestResult) -> Result<()>;

    async fn get_fork_record(&self, strategy_id: Uuid) -> Result<Option<ForkRecord>>;
    async fn put_fork_record(&self, record: &ForkRecord) -> Result<()>;
    async fn list_fork_records(&self) -> Result<Vec<ForkRecord>>;
}
