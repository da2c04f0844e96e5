//! Simulated portfolio state: token balances, LP positions, lending positions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether a lending position is a deposit or a debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LendingKind {
    Supply,
    Borrow,
}

/// An open lending-market position.
///
/// Interest accrues simply (non-compounding) against `principal` at the APY
/// sampled when the position was opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendingPosition {
    pub asset: String,
    pub kind: LendingKind,
    pub principal: Decimal,
    /// Interest accrued so far, in units of `asset`.
    pub accrued: Decimal,
    /// APY (percent) captured at entry time.
    pub entry_apy_pct: Decimal,
    pub opened_at: DateTime<Utc>,
}

impl LendingPosition {
    /// Current size including accrued interest.
    pub fn current_amount(&self) -> Decimal {
        self.principal + self.accrued
    }

    /// Accrue simple interest for one tick of `interval_days` days.
    pub fn accrue(&mut self, interval_days: Decimal) {
        let daily_rate = self.entry_apy_pct / Decimal::ONE_HUNDRED / Decimal::new(365, 0);
        self.accrued += self.principal * daily_rate * interval_days;
    }
}

/// An open two-sided liquidity position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LpPosition {
    pub token_a: String,
    pub token_b: String,
    pub amount_a: Decimal,
    pub amount_b: Decimal,
    /// Relative price (token_a / token_b) at entry.
    pub entry_price: Decimal,
    /// Relative price at the most recent valuation tick.
    pub current_price: Decimal,
    /// Reference-currency value at entry, used to weight IL.
    pub entry_notional: Decimal,
    pub fee_tier_bps: u32,
    pub opened_at: DateTime<Utc>,
}

/// Mutable simulation state, exclusively owned by one in-flight run.
///
/// Held token balances are never negative: debt is tracked as borrow
/// positions contributing negatively to total value, not as negative
/// balance entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Portfolio {
    balances: HashMap<String, Decimal>,
    pub lp_positions: Vec<LpPosition>,
    pub lending_positions: Vec<LendingPosition>,
}

impl Portfolio {
    /// Start a portfolio holding `capital` units of `asset`.
    pub fn seeded(asset: &str, capital: Decimal) -> Self {
        let mut portfolio = Self::default();
        portfolio.credit(asset, capital);
        portfolio
    }

    /// Current balance of `asset` (zero if never held).
    pub fn balance(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Add to a balance.
    pub fn credit(&mut self, asset: &str, amount: Decimal) {
        *self
            .balances
            .entry(asset.to_string())
            .or_insert(Decimal::ZERO) += amount;
    }

    /// Remove from a balance. Returns false (and leaves the balance
    /// untouched) when the held amount is insufficient.
    pub fn debit(&mut self, asset: &str, amount: Decimal) -> bool {
        match self.balances.get_mut(asset) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
                true
            }
            _ => false,
        }
    }

    /// Iterate over held (symbol, balance) pairs.
    pub fn balances(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.balances.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Reference-currency value of supplied collateral at the given prices.
    pub fn supplied_value(&self, price_of: impl Fn(&str) -> Decimal) -> Decimal {
        self.lending_positions
            .iter()
            .filter(|p| p.kind == LendingKind::Supply)
            .map(|p| p.current_amount() * price_of(&p.asset))
            .sum()
    }

    /// Reference-currency value of open borrow obligations.
    pub fn borrowed_value(&self, price_of: impl Fn(&str) -> Decimal) -> Decimal {
        self.lending_positions
            .iter()
            .filter(|p| p.kind == LendingKind::Borrow)
            .map(|p| p.current_amount() * price_of(&p.asset))
            .sum()
    }

    /// Total portfolio value in the reference currency: token balances plus
    /// LP constituents plus lending claims minus borrow obligations.
    pub fn total_value(&self, price_of: impl Fn(&str) -> Decimal) -> Decimal {
        let mut value = Decimal::ZERO;

        for (asset, balance) in &self.balances {
            value += *balance * price_of(asset);
        }

        for lp in &self.lp_positions {
            value += lp.amount_a * price_of(&lp.token_a) + lp.amount_b * price_of(&lp.token_b);
        }

        for position in &self.lending_positions {
            let amount = position.current_amount() * price_of(&position.asset);
            match position.kind {
                LendingKind::Supply => value += amount,
                LendingKind::Borrow => value -= amount,
            }
        }

        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_prices(asset: &str) -> Decimal {
        match asset {
            "ETH" => Decimal::new(2000, 0),
            _ => Decimal::ONE,
        }
    }

    #[test]
    fn test_debit_requires_sufficient_balance() {
        let mut portfolio = Portfolio::seeded("USDC", Decimal::new(100, 0));
        assert!(!portfolio.debit("USDC", Decimal::new(101, 0)));
        assert_eq!(portfolio.balance("USDC"), Decimal::new(100, 0));
        assert!(portfolio.debit("USDC", Decimal::new(40, 0)));
        assert_eq!(portfolio.balance("USDC"), Decimal::new(60, 0));
        assert!(!portfolio.debit("ETH", Decimal::ONE));
    }

    #[test]
    fn test_total_value_includes_lending_sides() {
        let mut portfolio = Portfolio::seeded("USDC", Decimal::new(1000, 0));
        portfolio.lending_positions.push(LendingPosition {
            asset: "USDC".to_string(),
            kind: LendingKind::Supply,
            principal: Decimal::new(500, 0),
            accrued: Decimal::ZERO,
            entry_apy_pct: Decimal::new(3, 0),
            opened_at: Utc::now(),
        });
        portfolio.lending_positions.push(LendingPosition {
            asset: "USDC".to_string(),
            kind: LendingKind::Borrow,
            principal: Decimal::new(200, 0),
            accrued: Decimal::ZERO,
            entry_apy_pct: Decimal::new(5, 0),
            opened_at: Utc::now(),
        });

        // 1000 held + 500 supplied - 200 borrowed
        assert_eq!(
            portfolio.total_value(flat_prices),
            Decimal::new(1300, 0)
        );
    }

    #[test]
    fn test_simple_interest_accrual() {
        let mut position = LendingPosition {
            asset: "USDC".to_string(),
            kind: LendingKind::Supply,
            principal: Decimal::new(3650, 0),
            accrued: Decimal::ZERO,
            entry_apy_pct: Decimal::new(10, 0),
            opened_at: Utc::now(),
        };

        // One day at 10% APY on 3650: 3650 * 0.10 / 365 = 1.0
        position.accrue(Decimal::ONE);
        assert_eq!(position.accrued, Decimal::ONE);

        // Non-compounding: a second day accrues on principal only.
        position.accrue(Decimal::ONE);
        assert_eq!(position.accrued, Decimal::TWO);
    }
}
