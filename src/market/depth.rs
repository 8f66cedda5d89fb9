// Order book depth snapshot
// Levels are stored best-first on both sides

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::records::Ticker;

/// One price level of the book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub amount: Decimal,
    pub order_count: u32,
}

impl DepthLevel {
    pub fn new(price: Decimal, amount: Decimal, order_count: u32) -> Self {
        Self {
            price,
            amount,
            order_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Depth {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    pub asks: Vec<DepthLevel>,
    pub bids: Vec<DepthLevel>,
}

/// Volume-weighted result of walking one side of the book
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookFill {
    pub avg_price: Decimal,
    pub amount: Decimal,
}

impl Depth {
    /// Single-level book from a ticker, each side effectively unlimited
    pub fn from_ticker(ticker: &Ticker) -> Self {
        let unlimited = Decimal::from(i32::MAX);
        Self {
            time: ticker.time,
            asks: vec![DepthLevel::new(ticker.best_ask, unlimited, 1)],
            bids: vec![DepthLevel::new(ticker.best_bid, unlimited, 1)],
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Midpoint of best bid and best ask, `None` unless both sides are populated
    pub fn mid(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    fn opposing_side(&self, is_sell: bool) -> &[DepthLevel] {
        if is_sell {
            &self.bids
        } else {
            &self.asks
        }
    }

    /// Total amount resting at or better than `limit_price` on the side a taker would hit.
    /// Sells count bids priced >= limit, buys count asks priced <= limit.
    pub fn max_fillable_amount(&self, limit_price: Decimal, is_sell: bool) -> Decimal {
        self.opposing_side(is_sell)
            .iter()
            .filter(|level| {
                if is_sell {
                    level.price >= limit_price
                } else {
                    level.price <= limit_price
                }
            })
            .map(|level| level.amount)
            .sum()
    }

    /// Walk the opposing side best-first until `amount` is consumed.
    /// No price limit is applied here; callers clamp with `max_fillable_amount` first.
    /// Returns `None` when nothing could be consumed.
    pub fn average_fill(&self, amount: Decimal, is_sell: bool) -> Option<BookFill> {
        let mut remaining = amount;
        let mut notional = Decimal::ZERO;
        let mut filled = Decimal::ZERO;

        for level in self.opposing_side(is_sell) {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = remaining.min(level.amount);
            notional += take * level.price;
            filled += take;
            remaining -= take;
        }

        if filled > Decimal::ZERO {
            Some(BookFill {
                avg_price: notional / filled,
                amount: filled,
            })
        } else {
            None
        }
    }
}
