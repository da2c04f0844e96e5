//! Sharpe-ratio ranking over saved strategies.
//!
//! Each strategy is scored by its best backtest (highest Sharpe). Strategies
//! without results stay off the board. Ties keep their input order, so
//! re-ranking the same inputs is idempotent.

use rust_decimal::Decimal;
use serde::Serialize;
use strategy_core::store::StrategyStore;
use strategy_core::types::{BacktestMetrics, ForkRecord, SavedStrategy};
use strategy_core::Result;
use tracing::debug;
use uuid::Uuid;

/// Podium medals for the top three ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

impl Medal {
    /// Medal for a 1-based rank, if any.
    pub fn for_rank(rank: usize) -> Option<Medal> {
        match rank {
            1 => Some(Medal::Gold),
            2 => Some(Medal::Silver),
            3 => Some(Medal::Bronze),
            _ => None,
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    pub strategy_id: Uuid,
    pub name: String,
    /// 1-based position on the board.
    pub rank: usize,
    pub medal: Option<Medal>,
    pub sharpe_ratio: f64,
    pub total_return: Decimal,
    pub total_return_pct: f64,
    /// Direct (non-transitive) forks of this strategy.
    pub fork_count: u32,
    pub forked_from: Option<Uuid>,
}

/// Candidate row before ranking: a strategy, the metrics of its best run,
/// and its fork record (absent for never-forked originals).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub strategy: SavedStrategy,
    pub best_metrics: BacktestMetrics,
    pub fork_record: Option<ForkRecord>,
}

/// Rank candidates by Sharpe, descending. The sort is stable, so equal
/// Sharpe values keep their input order; medals go to ranks 1-3.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<RankedEntry> {
    candidates.sort_by(|a, b| {
        b.best_metrics
            .sharpe_ratio
            .partial_cmp(&a.best_metrics.sharpe_ratio)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| {
            let rank = i + 1;
            RankedEntry {
                strategy_id: candidate.strategy.id,
                name: candidate.strategy.name,
                rank,
                medal: Medal::for_rank(rank),
                sharpe_ratio: candidate.best_metrics.sharpe_ratio,
                total_return: candidate.best_metrics.total_return,
                total_return_pct: candidate.best_metrics.total_return_pct,
                fork_count: candidate
                    .fork_record
                    .as_ref()
                    .map(|r| r.fork_count)
                    .unwrap_or(0),
                forked_from: candidate.fork_record.and_then(|r| r.fork_of),
            }
        })
        .collect()
}

/// Assemble the full board from the store: every strategy with at least one
/// result, scored by its best run.
pub async fn build_leaderboard(store: &dyn StrategyStore) -> Result<Vec<RankedEntry>> {
    let mut candidates = Vec::new();

    for strategy in store.list_strategies().await? {
        let results = store.list_results(strategy.id).await?;
        let best = results.into_iter().max_by(|a, b| {
            a.metrics
                .sharpe_ratio
                .partial_cmp(&b.metrics.sharpe_ratio)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let Some(best) = best else {
            debug!(strategy = %strategy.name, "No backtest results; skipping");
            continue;
        };

        let fork_record = store.get_fork_record(strategy.id).await?;
        candidates.push(Candidate {
            strategy,
            best_metrics: best.metrics,
            fork_record,
        });
    }

    Ok(rank(candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use strategy_core::store::MemoryStore;
    use strategy_core::types::{BacktestResult, Portfolio, SimulationWindow};

    fn candidate(name: &str, sharpe: f64) -> Candidate {
        Candidate {
            strategy: SavedStrategy::new(name, vec![]),
            best_metrics: BacktestMetrics {
                sharpe_ratio: sharpe,
                ..Default::default()
            },
            fork_record: None,
        }
    }

    fn result_with_sharpe(strategy_id: Uuid, sharpe: f64) -> BacktestResult {
        let now = Utc::now();
        BacktestResult {
            strategy_id,
            window: SimulationWindow::new(now, now + Duration::days(30)),
            initial_capital: Decimal::new(10_000, 0),
            trades: vec![],
            equity_curve: vec![],
            metrics: BacktestMetrics {
                sharpe_ratio: sharpe,
                ..Default::default()
            },
            final_portfolio: Portfolio::default(),
            completed_at: now,
        }
    }

    #[test]
    fn test_rank_orders_by_sharpe_descending() {
        let entries = rank(vec![
            candidate("low", 0.4),
            candidate("high", 2.1),
            candidate("mid", 1.3),
        ]);

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[2].rank, 3);
    }

    #[test]
    fn test_medals_cover_exactly_top_three() {
        let entries = rank(vec![
            candidate("a", 4.0),
            candidate("b", 3.0),
            candidate("c", 2.0),
            candidate("d", 1.0),
        ]);

        assert_eq!(entries[0].medal, Some(Medal::Gold));
        assert_eq!(entries[1].medal, Some(Medal::Silver));
        assert_eq!(entries[2].medal, Some(Medal::Bronze));
        assert_eq!(entries[3].medal, None);
    }

    #[test]
    fn test_equal_sharpe_keeps_input_order() {
        let first = candidate("first", 1.0);
        let second = candidate("second", 1.0);
        let first_id = first.strategy.id;
        let second_id = second.strategy.id;

        let entries = rank(vec![first, second]);
        assert_eq!(entries[0].strategy_id, first_id);
        assert_eq!(entries[1].strategy_id, second_id);
    }

    #[test]
    fn test_reranking_is_idempotent() {
        let candidates = vec![
            candidate("a", 1.0),
            candidate("b", 1.0),
            candidate("c", 0.5),
        ];

        let once = rank(candidates.clone());
        let twice = rank(candidates);
        let ids_once: Vec<Uuid> = once.iter().map(|e| e.strategy_id).collect();
        let ids_twice: Vec<Uuid> = twice.iter().map(|e| e.strategy_id).collect();
        assert_eq!(ids_once, ids_twice);
    }

    #[tokio::test]
    async fn test_build_leaderboard_uses_best_result_per_strategy() {
        let store = MemoryStore::new();

        let strong = SavedStrategy::new("strong", vec![]);
        let weak = SavedStrategy::new("weak", vec![]);
        let unscored = SavedStrategy::new("unscored", vec![]);
        store.put_strategy(&strong).await.unwrap();
        store.put_strategy(&weak).await.unwrap();
        store.put_strategy(&unscored).await.unwrap();

        // The strong strategy's weakest run must not drag it down.
        store
            .put_result(&result_with_sharpe(strong.id, 0.2))
            .await
            .unwrap();
        store
            .put_result(&result_with_sharpe(strong.id, 2.5))
            .await
            .unwrap();
        store
            .put_result(&result_with_sharpe(weak.id, 1.0))
            .await
            .unwrap();

        let board = build_leaderboard(&store).await.unwrap();

        assert_eq!(board.len(), 2);
        assert_eq!(board[0].strategy_id, strong.id);
        assert_eq!(board[0].sharpe_ratio, 2.5);
        assert_eq!(board[1].strategy_id, weak.id);
    }
}
