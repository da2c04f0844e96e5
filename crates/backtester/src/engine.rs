//! Strategy execution engine.
//!
//! Replays a strategy's operations across a discretized timeline, mutating a
//! portfolio and recording trades. Every runtime issue short of a malformed
//! configuration is non-fatal: an operation whose preconditions fail at a
//! tick is skipped for that tick and produces no trade.

use crate::scheduler::CancelToken;
use chrono::Duration;
use market_data::HistoricalDataCache;
use rust_decimal::Decimal;
use std::sync::Arc;
use strategy_core::types::{
    EquityPoint, LendingKind, LendingPosition, LpPosition, OperationKind, Portfolio,
    SavedStrategy, SimulationWindow, StrategyOperation, Trade,
};
use strategy_core::{Error, Result};
use tracing::{debug, info};
use uuid::Uuid;

/// Cost-model and pacing constants for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Asset that denominates capital, equity, and costs.
    pub reference_asset: String,
    /// Gas units charged per executed operation.
    pub gas_units: Decimal,
    /// Gas price in reference currency per unit.
    pub gas_price: Decimal,
    /// Protocol fee on swap notional, in percent.
    pub protocol_fee_pct: Decimal,
    /// Assumed pool liquidity for price-impact sizing.
    pub pool_liquidity: Decimal,
    /// Multiplier applied to the size/liquidity impact percentage.
    pub impact_factor: Decimal,
    /// Maximum loan-to-value fraction for borrowing.
    pub max_ltv: Decimal,
    /// Ticks between cancellation checks and yield points.
    pub tick_batch: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_asset: "USDC".to_string(),
            gas_units: Decimal::new(150_000, 0),
            gas_price: Decimal::new(2, 5),        // 0.00002 per unit
            protocol_fee_pct: Decimal::new(3, 1), // 0.3%
            pool_liquidity: Decimal::new(1_000_000, 0),
            impact_factor: Decimal::new(1, 1), // 0.1
            max_ltv: Decimal::new(75, 2),      // 75%
            tick_batch: 64,
        }
    }
}

impl EngineConfig {
    /// Fixed gas cost per executed operation.
    fn gas_cost(&self) -> Decimal {
        self.gas_units * self.gas_price
    }
}

/// Simulation inputs for one run.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub window: SimulationWindow,
    pub initial_capital: Decimal,
    pub tick_interval: Duration,
}

impl RunParams {
    /// Reject malformed configuration: empty window, non-positive capital
    /// or interval. The only fatal error class in the engine.
    pub fn validate(&self) -> Result<()> {
        if !self.window.is_valid() {
            return Err(Error::config("simulation window must span a positive duration"));
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(Error::config("initial capital must be positive"));
        }
        if self.tick_interval <= Duration::zero() {
            return Err(Error::config("tick interval must be positive"));
        }
        Ok(())
    }
}

/// Raw output of one completed simulation, before metrics.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub portfolio: Portfolio,
}

/// Simulation outcome: ran to the end, or observed cancellation.
#[derive(Debug)]
pub enum SimulationRun {
    Completed(SimulationOutput),
    Cancelled,
}

/// The strategy execution engine.
pub struct ExecutionEngine {
    cache: Arc<HistoricalDataCache>,
    config: EngineConfig,
}

impl ExecutionEngine {
    pub fn new(cache: Arc<HistoricalDataCache>, config: EngineConfig) -> Self {
        Self { cache, config }
    }

    /// Replay `strategy` across the window, applying every operation in
    /// declaration order at each tick.
    ///
    /// Cooperative: the cancel token is observed (and the task yields) every
    /// `tick_batch` ticks. `on_progress` receives (ticks done, total ticks).
    pub async fn simulate(
        &self,
        strategy: &SavedStrategy,
        params: &RunParams,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<SimulationRun> {
        params.validate()?;

        let ticks = tick_timeline(params.window, params.tick_interval);
        let interval_days =
            Decimal::from(params.tick_interval.num_seconds()) / Decimal::new(86_400, 0);

        info!(
            strategy = %strategy.name,
            ticks = ticks.len(),
            operations = strategy.operations.len(),
            "Starting simulation"
        );

        let mut portfolio =
            Portfolio::seeded(&self.config.reference_asset, params.initial_capital);
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(ticks.len());

        for (i, &tick) in ticks.iter().enumerate() {
            let price_of = |asset: &str| self.cache.price_at(asset, tick);

            for operation in &strategy.operations {
                if let Some(trade) = self.apply_operation(operation, &mut portfolio, tick) {
                    trades.push(trade);
                }
            }

            // Interest accrues at the rate sampled when each position was
            // opened: simple, non-compounding, pro-rated daily.
            for position in &mut portfolio.lending_positions {
                position.accrue(interval_days);
            }

            for lp in &mut portfolio.lp_positions {
                let price_b = self.cache.price_at(&lp.token_b, tick);
                if price_b > Decimal::ZERO {
                    lp.current_price = self.cache.price_at(&lp.token_a, tick) / price_b;
                }
            }

            equity_curve.push(EquityPoint {
                timestamp: tick,
                equity: portfolio.total_value(price_of),
            });

            if (i + 1) % self.config.tick_batch == 0 {
                if cancel.is_cancelled() {
                    info!(ticks_done = i + 1, "Simulation observed cancellation");
                    return Ok(SimulationRun::Cancelled);
                }
                on_progress(i + 1, ticks.len());
                tokio::task::yield_now().await;
            }
        }

        if cancel.is_cancelled() {
            return Ok(SimulationRun::Cancelled);
        }
        on_progress(ticks.len(), ticks.len());

        info!(
            trades = trades.len(),
            final_equity = %equity_curve.last().map(|p| p.equity).unwrap_or_default(),
            "Simulation completed"
        );

        Ok(SimulationRun::Completed(SimulationOutput {
            trades,
            equity_curve,
            portfolio,
        }))
    }

    /// Attempt one operation at one tick. `None` means the operation's
    /// preconditions failed and it was skipped without cost.
    fn apply_operation(
        &self,
        operation: &StrategyOperation,
        portfolio: &mut Portfolio,
        tick: chrono::DateTime<chrono::Utc>,
    ) -> Option<Trade> {
        match operation {
            StrategyOperation::Swap {
                token_in,
                token_out,
                amount_in,
                slippage_tolerance_pct,
                ..
            } => self.apply_swap(
                portfolio,
                tick,
                token_in,
                token_out,
                *amount_in,
                *slippage_tolerance_pct,
            ),
            StrategyOperation::Supply { asset, amount } => {
                self.apply_supply(portfolio, tick, asset, *amount)
            }
            StrategyOperation::Borrow { asset, amount } => {
                self.apply_borrow(portfolio, tick, asset, *amount)
            }
            StrategyOperation::CreateLpPosition {
                token_a,
                token_b,
                notional,
                fee_tier_bps,
            } => self.apply_create_lp(portfolio, tick, token_a, token_b, *notional, *fee_tier_bps),
        }
    }

    fn apply_swap(
        &self,
        portfolio: &mut Portfolio,
        tick: chrono::DateTime<chrono::Utc>,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
        tolerance_pct: Decimal,
    ) -> Option<Trade> {
        if amount_in <= Decimal::ZERO || portfolio.balance(token_in) < amount_in {
            debug!(token = %token_in, amount = %amount_in, "Swap skipped: insufficient balance");
            return None;
        }

        let price_in = self.cache.price_at(token_in, tick);
        let price_out = self.cache.price_at(token_out, tick);
        if price_out <= Decimal::ZERO {
            debug!(token = %token_out, "Swap skipped: no usable output price");
            return None;
        }

        // Size-proportional price impact, floored by the configured tolerance.
        // Without a positive pool depth there is no impact term to size.
        let impact_pct = if self.config.pool_liquidity > Decimal::ZERO {
            amount_in / self.config.pool_liquidity
                * Decimal::ONE_HUNDRED
                * self.config.impact_factor
        } else {
            Decimal::ZERO
        };
        let effective_slippage_pct = impact_pct.max(tolerance_pct);

        let amount_out = amount_in * price_in / price_out
            * (Decimal::ONE - effective_slippage_pct / Decimal::ONE_HUNDRED);

        portfolio.debit(token_in, amount_in);
        portfolio.credit(token_out, amount_out);

        let notional = amount_in * price_in;
        Some(Trade {
            id: Uuid::new_v4(),
            kind: OperationKind::Swap,
            timestamp: tick,
            token_in: Some(token_in.to_string()),
            token_out: Some(token_out.to_string()),
            amount_in,
            amount_out,
            gas_cost: self.config.gas_cost(),
            protocol_fee: notional * self.config.protocol_fee_pct / Decimal::ONE_HUNDRED,
            slippage_pct: effective_slippage_pct,
            pnl: None,
        })
    }

    fn apply_supply(
        &self,
        portfolio: &mut Portfolio,
        tick: chrono::DateTime<chrono::Utc>,
        asset: &str,
        amount: Decimal,
    ) -> Option<Trade> {
        if amount <= Decimal::ZERO || !portfolio.debit(asset, amount) {
            debug!(asset = %asset, amount = %amount, "Supply skipped: insufficient balance");
            return None;
        }

        let rate = self.cache.apy_at(asset, tick);
        portfolio.lending_positions.push(LendingPosition {
            asset: asset.to_string(),
            kind: LendingKind::Supply,
            principal: amount,
            accrued: Decimal::ZERO,
            entry_apy_pct: rate.supply_apy,
            opened_at: tick,
        });

        Some(Trade {
            id: Uuid::new_v4(),
            kind: OperationKind::Supply,
            timestamp: tick,
            token_in: Some(asset.to_string()),
            token_out: None,
            amount_in: amount,
            amount_out: Decimal::ZERO,
            gas_cost: self.config.gas_cost(),
            protocol_fee: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
            pnl: None,
        })
    }

    fn apply_borrow(
        &self,
        portfolio: &mut Portfolio,
        tick: chrono::DateTime<chrono::Utc>,
        asset: &str,
        amount: Decimal,
    ) -> Option<Trade> {
        if amount <= Decimal::ZERO {
            return None;
        }

        let price_of = |a: &str| self.cache.price_at(a, tick);
        let collateral = portfolio.supplied_value(price_of);
        let already_borrowed = portfolio.borrowed_value(price_of);
        let borrow_value = amount * self.cache.price_at(asset, tick);

        if already_borrowed + borrow_value > self.config.max_ltv * collateral {
            debug!(
                asset = %asset,
                requested = %borrow_value,
                collateral = %collateral,
                "Borrow skipped: exceeds loan-to-value limit"
            );
            return None;
        }

        let rate = self.cache.apy_at(asset, tick);
        portfolio.credit(asset, amount);
        portfolio.lending_positions.push(LendingPosition {
            asset: asset.to_string(),
            kind: LendingKind::Borrow,
            principal: amount,
            accrued: Decimal::ZERO,
            entry_apy_pct: rate.borrow_apy,
            opened_at: tick,
        });

        Some(Trade {
            id: Uuid::new_v4(),
            kind: OperationKind::Borrow,
            timestamp: tick,
            token_in: None,
            token_out: Some(asset.to_string()),
            amount_in: Decimal::ZERO,
            amount_out: amount,
            gas_cost: self.config.gas_cost(),
            protocol_fee: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
            pnl: None,
        })
    }

    fn apply_create_lp(
        &self,
        portfolio: &mut Portfolio,
        tick: chrono::DateTime<chrono::Utc>,
        token_a: &str,
        token_b: &str,
        notional: Decimal,
        fee_tier_bps: u32,
    ) -> Option<Trade> {
        if notional <= Decimal::ZERO {
            return None;
        }

        let price_a = self.cache.price_at(token_a, tick);
        let price_b = self.cache.price_at(token_b, tick);
        if price_a <= Decimal::ZERO || price_b <= Decimal::ZERO {
            return None;
        }

        // Notional splits evenly between the two sides at current prices.
        let half = notional / Decimal::TWO;
        let amount_a = half / price_a;
        let amount_b = half / price_b;

        if portfolio.balance(token_a) < amount_a || portfolio.balance(token_b) < amount_b {
            debug!(
                token_a = %token_a,
                token_b = %token_b,
                notional = %notional,
                "LP skipped: insufficient balances"
            );
            return None;
        }

        portfolio.debit(token_a, amount_a);
        portfolio.debit(token_b, amount_b);

        let entry_price = price_a / price_b;
        portfolio.lp_positions.push(LpPosition {
            token_a: token_a.to_string(),
            token_b: token_b.to_string(),
            amount_a,
            amount_b,
            entry_price,
            current_price: entry_price,
            entry_notional: notional,
            fee_tier_bps,
            opened_at: tick,
        });

        Some(Trade {
            id: Uuid::new_v4(),
            kind: OperationKind::CreateLpPosition,
            timestamp: tick,
            token_in: Some(token_a.to_string()),
            token_out: Some(token_b.to_string()),
            amount_in: amount_a,
            amount_out: amount_b,
            gas_cost: self.config.gas_cost(),
            protocol_fee: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
            pnl: None,
        })
    }
}

/// Ticks from `window.start` to `window.end` inclusive, stepping by
/// `interval`.
fn tick_timeline(window: SimulationWindow, interval: Duration) -> Vec<chrono::DateTime<chrono::Utc>> {
    let mut ticks = Vec::new();
    let mut tick = window.start;
    while tick <= window.end {
        ticks.push(tick);
        tick += interval;
    }
    ticks
}
