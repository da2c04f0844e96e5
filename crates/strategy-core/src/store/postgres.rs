//! PostgreSQL-backed store.
//!
//! Strategy operations and result payloads are stored as JSONB so schema
//! churn in the simulation types does not require migrations.

use crate::config::DatabaseConfig;
use crate::store::StrategyStore;
use crate::types::{BacktestResult, ForkRecord, SavedStrategy, StrategyOperation};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    Ok(pool)
}

/// PostgreSQL store for strategies, results, and fork records.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StrategyStore for PgStore {
    async fn get_strategy(&self, id: Uuid) -> Result<Option<SavedStrategy>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, operations, created_at, updated_at
            FROM strategies
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(strategy_from_row).transpose()
    }

    async fn put_strategy(&self, strategy: &SavedStrategy) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO strategies (id, name, operations, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                operations = EXCLUDED.operations,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(strategy.id)
        .bind(&strategy.name)
        .bind(serde_json::to_value(&strategy.operations)?)
        .bind(strategy.created_at)
        .bind(strategy.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_strategies(&self) -> Result<Vec<SavedStrategy>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, operations, created_at, updated_at
            FROM strategies
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let strategies = rows
            .into_iter()
            .map(strategy_from_row)
            .collect::<Result<Vec<_>>>()?;
        debug!(count = strategies.len(), "Loaded strategies");
        Ok(strategies)
    }

    async fn list_results(&self, strategy_id: Uuid) -> Result<Vec<BacktestResult>> {
        let rows = sqlx::query(
            r#"
            SELECT payload
            FROM backtest_results
            WHERE strategy_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(strategy_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let payload: serde_json::Value = row.get("payload");
                Ok(serde_json::from_value(payload)?)
            })
            .collect()
    }

    async fn put_result(&self, result: &BacktestResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO backtest_results (strategy_id, payload, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(result.strategy_id)
        .bind(serde_json::to_value(result)?)
        .bind(result.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_fork_record(&self, strategy_id: Uuid) -> Result<Option<ForkRecord>> {
        let row = sqlx::query(
            r#"
            SELECT strategy_id, fork_of, fork_count
            FROM fork_records
            WHERE strategy_id = $1
            "#,
        )
        .bind(strategy_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ForkRecord {
            strategy_id: row.get("strategy_id"),
            fork_of: row.get("fork_of"),
            fork_count: row.get::<i32, _>("fork_count") as u32,
        }))
    }

    async fn put_fork_record(&self, record: &ForkRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fork_records (strategy_id, fork_of, fork_count)
            VALUES ($1, $2, $3)
            ON CONFLICT (strategy_id) DO UPDATE SET
                fork_of = EXCLUDED.fork_of,
                fork_count = EXCLUDED.fork_count
            "#,
        )
        .bind(record.strategy_id)
        .bind(record.fork_of)
        .bind(record.fork_count as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_fork_records(&self) -> Result<Vec<ForkRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT strategy_id, fork_of, fork_count
            FROM fork_records
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ForkRecord {
                strategy_id: row.get("strategy_id"),
                fork_of: row.get("fork_of"),
                fork_count: row.get::<i32, _>("fork_count") as u32,
            })
            .collect())
    }
}

fn strategy_from_row(row: sqlx::postgres::PgRow) -> Result<SavedStrategy> {
    let operations: serde_json::Value = row.get("operations");
    let operations: Vec<StrategyOperation> = serde_json::from_value(operations)?;
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    Ok(SavedStrategy {
        id: row.get("id"),
        name: row.get("name"),
        operations,
        created_at,
        updated_at,
    })
}
