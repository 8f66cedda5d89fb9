// Contract Position Ledger
// Tracks average prices, realized/unrealized profit and fees for one perpetual contract

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ReplayError, ReplayResult};
use crate::types::MarginMode;

/// Realized profit snapshot taken at a full close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitRecord {
    /// Realized profit since the previous full close
    pub profit: Decimal,
    /// Cumulative realized profit at this close
    pub profit_total: Decimal,
    pub time: DateTime<Utc>,
}

/// Effect of a single `deal` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DealOutcome {
    pub fee: Decimal,
    pub realized_profit: Decimal,
}

impl DealOutcome {
    fn merge(self, other: DealOutcome) -> DealOutcome {
        DealOutcome {
            fee: self.fee + other.fee,
            realized_profit: self.realized_profit + other.realized_profit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionDirection {
    Long,
    Short,
    Flat,
}

/// Accounting state of one contract position
#[derive(Debug, Clone)]
pub struct ContractPosition {
    inst_id: String,
    margin_mode: MarginMode,
    margin_ccy: String,
    maker_rate: Decimal,
    taker_rate: Decimal,
    trace: bool,

    position: Decimal,
    avg_open_price: Decimal,
    avg_close_price: Decimal,
    realized_profit: Decimal,
    unrealized_profit: Decimal,
    unrealized_profit_ratio: Decimal,
    total_fee: Decimal,
    buy_avg_price: Decimal,
    buy_amount_total: Decimal,
    sell_avg_price: Decimal,
    sell_amount_total: Decimal,
    total_volume: Decimal,
    clear_count: u32,
    profit_records: Vec<ProfitRecord>,
    max_position_abs: Decimal,
}

impl ContractPosition {
    pub fn new(
        inst_id: impl Into<String>,
        margin_mode: MarginMode,
        margin_ccy: impl Into<String>,
        maker_rate: Decimal,
        taker_rate: Decimal,
    ) -> Self {
        Self {
            inst_id: inst_id.into(),
            margin_mode,
            margin_ccy: margin_ccy.into(),
            maker_rate,
            taker_rate,
            trace: false,
            position: Decimal::ZERO,
            avg_open_price: Decimal::ZERO,
            avg_close_price: Decimal::ZERO,
            realized_profit: Decimal::ZERO,
            unrealized_profit: Decimal::ZERO,
            unrealized_profit_ratio: Decimal::ZERO,
            total_fee: Decimal::ZERO,
            buy_avg_price: Decimal::ZERO,
            buy_amount_total: Decimal::ZERO,
            sell_avg_price: Decimal::ZERO,
            sell_amount_total: Decimal::ZERO,
            total_volume: Decimal::ZERO,
            clear_count: 0,
            profit_records: Vec::new(),
            max_position_abs: Decimal::ZERO,
        }
    }

    /// Log every open and every full close at TRACE level
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Record a fill. Positive `amount` buys, negative sells.
    pub fn deal(
        &mut self,
        price: Decimal,
        amount: Decimal,
        is_taker: bool,
        time: DateTime<Utc>,
    ) -> ReplayResult<DealOutcome> {
        if price <= Decimal::ZERO {
            return Err(ReplayError::violation(format!(
                "{}: deal price must be positive, got {}",
                self.inst_id, price
            )));
        }
        if amount.is_zero() {
            return Ok(DealOutcome::default());
        }

        let amount_abs = amount.abs();
        let position_abs = self.position.abs();
        let opening = self.position.is_zero()
            || (amount.is_sign_positive() == self.position.is_sign_positive());

        let mut outcome = DealOutcome::default();

        if opening {
            if self.position.is_zero() {
                self.max_position_abs = Decimal::ZERO;
                self.avg_open_price = Decimal::ZERO;
                self.avg_close_price = Decimal::ZERO;
            }

            self.avg_open_price =
                weighted_avg_price(price, amount_abs, self.avg_open_price, position_abs)?;
            self.position += amount;
            self.max_position_abs = self.max_position_abs.max(self.position.abs());

            if self.trace {
                trace!(
                    inst_id = %self.inst_id,
                    %time,
                    %amount,
                    %price,
                    position = %self.position,
                    avg_open = %self.avg_open_price,
                    "📈 open"
                );
            }
        } else {
            if amount_abs > position_abs {
                // Reversal: close exactly, then open the remainder
                let close_part = -self.position;
                let open_part = amount + self.position;
                let first = self.deal(price, close_part, is_taker, time)?;
                let second = self.deal(price, open_part, is_taker, time)?;
                return Ok(first.merge(second));
            }

            let (_, profit) = self.profit(self.avg_open_price, price, amount)?;
            self.realized_profit += profit;
            outcome.realized_profit = profit;

            let closed_so_far = self.max_position_abs - position_abs;
            self.avg_close_price =
                weighted_avg_price(price, amount_abs, self.avg_close_price, closed_so_far)?;

            self.position += amount;

            if self.position.is_zero() {
                self.record_full_close(time);
            }
        }

        let fee = self.fee(price, amount_abs, is_taker)?;
        self.total_fee += fee;
        outcome.fee = fee;

        if amount.is_sign_positive() {
            self.buy_avg_price =
                weighted_avg_price(price, amount_abs, self.buy_avg_price, self.buy_amount_total)?;
            self.buy_amount_total += amount_abs;
        } else {
            self.sell_avg_price =
                weighted_avg_price(price, amount_abs, self.sell_avg_price, self.sell_amount_total)?;
            self.sell_amount_total += amount_abs;
        }

        self.total_volume += match self.margin_mode {
            MarginMode::Usdt => amount_abs * price,
            MarginMode::Coin => amount_abs / price,
        };

        Ok(outcome)
    }

    fn record_full_close(&mut self, time: DateTime<Utc>) {
        self.clear_count += 1;

        let profit = match self.profit_records.last() {
            Some(prev) => self.realized_profit - prev.profit_total,
            None => self.realized_profit,
        };
        let record = ProfitRecord {
            profit,
            profit_total: self.realized_profit,
            time,
        };

        if self.trace {
            trace!(
                inst_id = %self.inst_id,
                %time,
                profit = %record.profit,
                total = %record.profit_total,
                "🏁 position cleared"
            );
        }

        self.profit_records.push(record);
        self.avg_open_price = Decimal::ZERO;
        self.avg_close_price = Decimal::ZERO;
        self.unrealized_profit = Decimal::ZERO;
        self.unrealized_profit_ratio = Decimal::ZERO;
    }

    /// Re-mark unrealized profit as a hypothetical close of the whole position
    pub fn update(&mut self, current_price: Decimal) -> ReplayResult<()> {
        if current_price <= Decimal::ZERO {
            return Err(ReplayError::violation(format!(
                "{}: mark price must be positive, got {}",
                self.inst_id, current_price
            )));
        }

        if self.position.is_zero() {
            self.unrealized_profit = Decimal::ZERO;
            self.unrealized_profit_ratio = Decimal::ZERO;
            return Ok(());
        }

        let (ratio, profit) = self.profit(self.avg_open_price, current_price, -self.position)?;
        self.unrealized_profit_ratio = ratio;
        self.unrealized_profit = profit;
        Ok(())
    }

    /// Profit rate and profit of closing `closing_amount` (signed, opposite to the position)
    fn profit(
        &self,
        open: Decimal,
        close: Decimal,
        closing_amount: Decimal,
    ) -> ReplayResult<(Decimal, Decimal)> {
        if open <= Decimal::ZERO || close <= Decimal::ZERO {
            return Err(ReplayError::violation(format!(
                "{}: profit needs positive prices, open={} close={}",
                self.inst_id, open, close
            )));
        }

        let amount_abs = closing_amount.abs();
        let closing_long = closing_amount.is_sign_negative();
        let diff = if closing_long { close - open } else { open - close };

        let (rate, margin) = match self.margin_mode {
            MarginMode::Usdt => (diff / open, amount_abs * open),
            MarginMode::Coin => (diff / close, amount_abs / open),
        };

        Ok((rate, rate * margin))
    }

    fn fee(&self, price: Decimal, amount_abs: Decimal, is_taker: bool) -> ReplayResult<Decimal> {
        let rate = if is_taker { self.taker_rate } else { self.maker_rate };
        let fee = match self.margin_mode {
            MarginMode::Usdt => amount_abs * price * rate,
            MarginMode::Coin => amount_abs
                .checked_div(price)
                .ok_or_else(|| ReplayError::violation("fee price is zero"))?
                * rate,
        };
        Ok(fee)
    }

    /// realized + unrealized - fees
    pub fn total_profit(&self) -> Decimal {
        self.realized_profit + self.unrealized_profit - self.total_fee
    }

    /// Profit of the most recent full close
    pub fn last_position_profit(&self) -> Decimal {
        self.profit_records
            .last()
            .map(|r| r.profit)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn direction(&self) -> PositionDirection {
        if self.position > Decimal::ZERO {
            PositionDirection::Long
        } else if self.position < Decimal::ZERO {
            PositionDirection::Short
        } else {
            PositionDirection::Flat
        }
    }

    pub fn inst_id(&self) -> &str {
        &self.inst_id
    }

    pub fn margin_mode(&self) -> MarginMode {
        self.margin_mode
    }

    pub fn margin_ccy(&self) -> &str {
        &self.margin_ccy
    }

    pub fn position(&self) -> Decimal {
        self.position
    }

    pub fn avg_open_price(&self) -> Decimal {
        self.avg_open_price
    }

    pub fn avg_close_price(&self) -> Decimal {
        self.avg_close_price
    }

    pub fn realized_profit(&self) -> Decimal {
        self.realized_profit
    }

    pub fn unrealized_profit(&self) -> Decimal {
        self.unrealized_profit
    }

    pub fn unrealized_profit_ratio(&self) -> Decimal {
        self.unrealized_profit_ratio
    }

    pub fn total_fee(&self) -> Decimal {
        self.total_fee
    }

    pub fn buy_avg_price(&self) -> Decimal {
        self.buy_avg_price
    }

    pub fn buy_amount_total(&self) -> Decimal {
        self.buy_amount_total
    }

    pub fn sell_avg_price(&self) -> Decimal {
        self.sell_avg_price
    }

    pub fn sell_amount_total(&self) -> Decimal {
        self.sell_amount_total
    }

    pub fn total_volume(&self) -> Decimal {
        self.total_volume
    }

    pub fn clear_count(&self) -> u32 {
        self.clear_count
    }

    pub fn profit_records(&self) -> &[ProfitRecord] {
        &self.profit_records
    }

    pub fn max_position_abs(&self) -> Decimal {
        self.max_position_abs
    }
}

/// Harmonic average price after adding `amount_abs` at `price` to `prev_abs` held at `prev_avg`
fn weighted_avg_price(
    price: Decimal,
    amount_abs: Decimal,
    prev_avg: Decimal,
    prev_abs: Decimal,
) -> ReplayResult<Decimal> {
    if price <= Decimal::ZERO {
        return Err(ReplayError::violation("average price needs a positive fill price"));
    }
    if prev_abs <= Decimal::ZERO || prev_avg <= Decimal::ZERO {
        return Ok(price);
    }

    let total = prev_abs + amount_abs;
    let held = prev_abs / prev_avg;
    let added = amount_abs / price;

    total
        .checked_div(held + added)
        .ok_or_else(|| ReplayError::violation("average price denominator is zero"))
}
