//! Trade records, equity curve points, and backtest results.

use crate::types::operation::OperationKind;
use crate::types::portfolio::Portfolio;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The simulated time window of one backtest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SimulationWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether the window spans a positive duration.
    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }
}

/// Immutable record of one executed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub kind: OperationKind,
    pub timestamp: DateTime<Utc>,
    pub token_in: Option<String>,
    pub token_out: Option<String>,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    /// Gas cost in reference currency.
    pub gas_cost: Decimal,
    /// Protocol fee in reference currency.
    pub protocol_fee: Decimal,
    /// Realized slippage in percent.
    pub slippage_pct: Decimal,
    /// Realized P&L in reference currency, when the trade closed a position.
    pub pnl: Option<Decimal>,
}

/// One equity sample per simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

/// Risk and cost metrics derived from one completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestMetrics {
    /// Total return (absolute, reference currency).
    pub total_return: Decimal,
    /// Total return percentage of initial capital.
    pub total_return_pct: f64,
    /// Maximum drawdown (absolute, reference currency).
    pub max_drawdown: Decimal,
    /// Maximum drawdown as a percentage of the running peak.
    pub max_drawdown_pct: f64,
    /// Annualized Sharpe ratio (0 when return stdev is 0).
    pub sharpe_ratio: f64,
    /// Fraction of closed trades with positive P&L.
    pub win_rate: f64,
    /// Sum of gas costs across all trades.
    pub total_gas_cost: Decimal,
    /// Sum of protocol fees across all trades.
    pub total_protocol_fees: Decimal,
    /// Notional-weighted impermanent loss across LP positions
    /// (reference currency).
    pub impermanent_loss: f64,
}

/// Everything produced by one completed (non-cancelled, non-errored) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_id: Uuid,
    pub window: SimulationWindow,
    pub initial_capital: Decimal,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: BacktestMetrics,
    pub final_portfolio: Portfolio,
    pub completed_at: DateTime<Utc>,
}

impl BacktestResult {
    /// Final equity of the run (initial capital for an empty curve).
    pub fn final_equity(&self) -> Decimal {
        self.equity_curve
            .last()
            .map(|point| point.equity)
            .unwrap_or(self.initial_capital)
    }

    /// Check if the backtest was profitable.
    pub fn is_profitable(&self) -> bool {
        self.metrics.total_return > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_window_validity() {
        let now = Utc::now();
        assert!(SimulationWindow::new(now, now + Duration::days(1)).is_valid());
        assert!(!SimulationWindow::new(now, now).is_valid());
        assert!(!SimulationWindow::new(now, now - Duration::days(1)).is_valid());
    }

    #[test]
    fn test_final_equity_empty_curve() {
        let result = BacktestResult {
            strategy_id: Uuid::new_v4(),
            window: SimulationWindow::new(Utc::now(), Utc::now() + Duration::days(1)),
            initial_capital: Decimal::new(10000, 0),
            trades: vec![],
            equity_curve: vec![],
            metrics: BacktestMetrics::default(),
            final_portfolio: Portfolio::default(),
            completed_at: Utc::now(),
        };

        assert_eq!(result.final_equity(), Decimal::new(10000, 0));
        assert!(!result.is_profitable());
    }
}
