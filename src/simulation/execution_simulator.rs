// Execution Simulator
// Turns a taker signal into a fill against the current depth snapshot

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ReplayError, ReplayResult};
use crate::market::Depth;

/// How a signal was filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStatus {
    /// Filled in full against depth
    Full,
    /// Amount reduced to what the book holds at or better than the limit
    Clamped,
    /// No depth available, filled at the requested price and amount
    Idealized,
    /// Nothing executable
    Empty,
}

/// Result of a simulated taker signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub requested_price: Decimal,
    pub requested_amount: Decimal,
    pub price: Decimal,
    pub amount: Decimal,
    pub is_sell: bool,
    pub status: FillStatus,
}

impl Fill {
    pub fn is_empty(&self) -> bool {
        self.status == FillStatus::Empty || self.amount.is_zero()
    }
}

/// Running counters for the run report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub signals: u64,
    pub full: u64,
    pub clamped: u64,
    pub idealized: u64,
    pub empty: u64,
}

/// Execution simulator
#[derive(Debug, Default)]
pub struct ExecutionSimulator {
    stats: ExecutionStats,
}

impl ExecutionSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ExecutionStats {
        self.stats
    }

    /// Simulate a taker signal of `amount` (positive) limited at `price`
    pub fn simulate(
        &mut self,
        depth: Option<&Depth>,
        price: Decimal,
        amount: Decimal,
        is_sell: bool,
    ) -> ReplayResult<Fill> {
        if price <= Decimal::ZERO {
            return Err(ReplayError::violation(format!(
                "signal price must be positive, got {}",
                price
            )));
        }
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ReplayError::violation(format!(
                "signal amount must not be negative, got {}",
                amount
            )));
        }

        self.stats.signals += 1;

        let mut fill = Fill {
            requested_price: price,
            requested_amount: amount,
            price,
            amount,
            is_sell,
            status: FillStatus::Idealized,
        };

        let Some(depth) = depth else {
            if amount.is_zero() {
                fill.status = FillStatus::Empty;
                self.stats.empty += 1;
            } else {
                self.stats.idealized += 1;
            }
            return Ok(fill);
        };

        let max_amount = depth.max_fillable_amount(price, is_sell);
        let clamped = amount.min(max_amount);

        match depth.average_fill(clamped, is_sell) {
            Some(book_fill) => {
                fill.price = book_fill.avg_price;
                fill.amount = book_fill.amount;
                fill.status = if clamped < amount {
                    self.stats.clamped += 1;
                    FillStatus::Clamped
                } else {
                    self.stats.full += 1;
                    FillStatus::Full
                };
                debug!(
                    requested = %amount,
                    filled = %fill.amount,
                    avg_price = %fill.price,
                    is_sell,
                    "💱 signal filled against depth"
                );
            }
            None => {
                if !amount.is_zero() {
                    warn!(
                        limit = %price,
                        requested = %amount,
                        is_sell,
                        "⚠️  no depth at or better than limit, signal dropped"
                    );
                }
                fill.amount = Decimal::ZERO;
                fill.status = FillStatus::Empty;
                self.stats.empty += 1;
            }
        }

        Ok(fill)
    }
}
