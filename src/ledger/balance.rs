// Currency balances and spot fill bookkeeping

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Currency -> amount, iterated in currency order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balances {
    amounts: BTreeMap<String, Decimal>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ccy: &str) -> Option<Decimal> {
        self.amounts.get(ccy).copied()
    }

    pub fn set(&mut self, ccy: impl Into<String>, amount: Decimal) {
        self.amounts.insert(ccy.into(), amount);
    }

    /// Add a signed delta, creating the currency at zero if absent
    pub fn add(&mut self, ccy: &str, delta: Decimal) {
        *self.amounts.entry(ccy.to_string()).or_insert(Decimal::ZERO) += delta;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.amounts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.amounts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Decimal)> for Balances {
    fn from_iter<I: IntoIterator<Item = (S, Decimal)>>(iter: I) -> Self {
        Self {
            amounts: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Spot maker/taker rates applied to balance-only fills
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotAccount {
    pub maker_rate: Decimal,
    pub taker_rate: Decimal,
}

impl SpotAccount {
    pub fn new(maker_rate: Decimal, taker_rate: Decimal) -> Self {
        Self {
            maker_rate,
            taker_rate,
        }
    }

    fn rate(&self, is_taker: bool) -> Decimal {
        if is_taker {
            self.taker_rate
        } else {
            self.maker_rate
        }
    }

    /// Pay quote, receive base net of the fee. Returns the fee in base units.
    pub fn buy(
        &self,
        balances: &mut Balances,
        base: &str,
        quote: &str,
        price: Decimal,
        amount: Decimal,
        is_taker: bool,
    ) -> Decimal {
        let fee = amount * self.rate(is_taker);
        balances.add(quote, -(price * amount));
        balances.add(base, amount - fee);
        fee
    }

    /// Deliver base, receive quote net of the fee. Returns the fee in quote units.
    pub fn sell(
        &self,
        balances: &mut Balances,
        base: &str,
        quote: &str,
        price: Decimal,
        amount: Decimal,
        is_taker: bool,
    ) -> Decimal {
        let proceeds = price * amount;
        let fee = proceeds * self.rate(is_taker);
        balances.add(base, -amount);
        balances.add(quote, proceeds - fee);
        fee
    }
}
