//! In-memory store for tests and single-process runs.

use crate::store::StrategyStore;
use crate::types::{BacktestResult, ForkRecord, SavedStrategy};
use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// DashMap-backed store with the same contract as the database-backed one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    strategies: DashMap<Uuid, SavedStrategy>,
    results: DashMap<Uuid, Vec<BacktestResult>>,
    forks: DashMap<Uuid, ForkRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StrategyStore for MemoryStore {
    async fn get_strategy(&self, id: Uuid) -> Result<Option<SavedStrategy>> {
        Ok(self.strategies.get(&id).map(|entry| entry.clone()))
    }

    async fn put_strategy(&self, strategy: &SavedStrategy) -> Result<()> {
        self.strategies.insert(strategy.id, strategy.clone());
        Ok(())
    }

    async fn list_strategies(&self) -> Result<Vec<SavedStrategy>> {
        let mut strategies: Vec<SavedStrategy> = self
            .strategies
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        strategies.sort_by_key(|s| s.created_at);
        Ok(strategies)
    }

    async fn list_results(&self, strategy_id: Uuid) -> Result<Vec<BacktestResult>> {
        Ok(self
            .results
            .get(&strategy_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn put_result(&self, result: &BacktestResult) -> Result<()> {
        self.results
            .entry(result.strategy_id)
            .or_default()
            .push(result.clone());
        Ok(())
    }

    async fn get_fork_record(&self, strategy_id: Uuid) -> Result<Option<ForkRecord>> {
        Ok(self.forks.get(&strategy_id).map(|entry| entry.clone()))
    }

    async fn put_fork_record(&self, record: &ForkRecord) -> Result<()> {
        self.forks.insert(record.strategy_id, record.clone());
        Ok(())
    }

    async fn list_fork_records(&self) -> Result<Vec<ForkRecord>> {
        Ok(self.forks.iter().map(|entry| entry.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrategyOperation;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_strategy_roundtrip() {
        let store = MemoryStore::new();
        let strategy = SavedStrategy::new(
            "supply only",
            vec![StrategyOperation::Supply {
                asset: "USDC".to_string(),
                amount: Decimal::new(100, 0),
            }],
        );

        store.put_strategy(&strategy).await.unwrap();
        let loaded = store.get_strategy(strategy.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "supply only");
        assert_eq!(loaded.operations.len(), 1);

        assert!(store.get_strategy(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fork_record_roundtrip() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let record = ForkRecord::original(id);

        store.put_fork_record(&record).await.unwrap();
        assert_eq!(
            store.get_fork_record(id).await.unwrap(),
            Some(record.clone())
        );
        assert_eq!(store.list_fork_records().await.unwrap().len(), 1);

        // Re-putting the same key overwrites rather than duplicating.
        let mut bumped = record;
        bumped.fork_count = 1;
        store.put_fork_record(&bumped).await.unwrap();
        assert_eq!(store.list_fork_records().await.unwrap().len(), 1);
        assert_eq!(
            store.get_fork_record(id).await.unwrap().unwrap().fork_count,
            1
        );
    }
}
