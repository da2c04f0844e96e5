//! Risk-adjusted performance metrics derived from a completed simulation.
//!
//! Pure functions of the equity curve, trade log, and final positions; the
//! only failure mode is the degenerate empty-curve case, which yields zeroed
//! metrics.

use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use strategy_core::types::{BacktestMetrics, EquityPoint, LpPosition, Trade};

/// Compute the full metric set for one run.
pub fn compute(
    equity_curve: &[EquityPoint],
    trades: &[Trade],
    lp_positions: &[LpPosition],
    initial_capital: Decimal,
    tick_interval: Duration,
) -> BacktestMetrics {
    if equity_curve.is_empty() || initial_capital <= Decimal::ZERO {
        return BacktestMetrics::default();
    }

    let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or_default();
    let total_return = final_equity - initial_capital;
    let total_return_pct = (total_return / initial_capital)
        .to_f64()
        .unwrap_or(0.0)
        * 100.0;

    let (max_drawdown, max_drawdown_pct) = max_drawdown(equity_curve);
    let sharpe_ratio = sharpe(equity_curve, tick_interval);
    let win_rate = win_rate(trades);

    let total_gas_cost = trades.iter().map(|t| t.gas_cost).sum();
    let total_protocol_fees = trades.iter().map(|t| t.protocol_fee).sum();

    BacktestMetrics {
        total_return,
        total_return_pct,
        max_drawdown,
        max_drawdown_pct,
        sharpe_ratio,
        win_rate,
        total_gas_cost,
        total_protocol_fees,
        impermanent_loss: impermanent_loss(lp_positions),
    }
}

/// Running-peak drawdown: the largest absolute drop from a prior peak and
/// that drop as a percentage of the peak.
fn max_drawdown(equity_curve: &[EquityPoint]) -> (Decimal, f64) {
    let mut peak = equity_curve[0].equity;
    let mut max_abs = Decimal::ZERO;
    let mut max_pct: f64 = 0.0;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }
        let drawdown = peak - point.equity;
        if drawdown > max_abs {
            max_abs = drawdown;
        }
        if peak > Decimal::ZERO {
            let pct = (drawdown / peak).to_f64().unwrap_or(0.0) * 100.0;
            max_pct = max_pct.max(pct);
        }
    }

    (max_abs, max_pct)
}

/// Annualized Sharpe ratio over per-tick simple returns, with a zero-stdev
/// guard. The annualization factor comes from the number of tick periods
/// implied per year (365 for daily ticks).
fn sharpe(equity_curve: &[EquityPoint], tick_interval: Duration) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev == Decimal::ZERO {
                0.0
            } else {
                ((curr - prev) / prev).to_f64().unwrap_or(0.0)
            }
        })
        .collect();

    let mean: f64 = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance: f64 =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return 0.0;
    }

    let interval_secs = tick_interval.num_seconds();
    if interval_secs <= 0 {
        return 0.0;
    }
    let periods_per_year = (365.0 * 86_400.0) / interval_secs as f64;

    (mean / std_dev) * periods_per_year.sqrt()
}

/// Fraction of closed (realized-P&L) trades with positive P&L.
fn win_rate(trades: &[Trade]) -> f64 {
    let closed: Vec<Decimal> = trades.iter().filter_map(|t| t.pnl).collect();
    if closed.is_empty() {
        return 0.0;
    }
    let wins = closed.iter().filter(|pnl| **pnl > Decimal::ZERO).count();
    wins as f64 / closed.len() as f64
}

/// Notional-weighted impermanent loss across open LP positions, using each
/// position's recorded reference price against its entry price:
/// `|2√ρ/(1+ρ) − 1|` with `ρ = reference / entry`.
fn impermanent_loss(lp_positions: &[LpPosition]) -> f64 {
    lp_positions
        .iter()
        .filter_map(|lp| {
            let entry = lp.entry_price.to_f64()?;
            let current = lp.current_price.to_f64()?;
            if entry <= 0.0 || current <= 0.0 {
                return None;
            }
            let ratio = current / entry;
            let il = (2.0 * ratio.sqrt() / (1.0 + ratio) - 1.0).abs();
            Some(il * lp.entry_notional.to_f64().unwrap_or(0.0))
        })
        .sum()
}
