// Strategy context and the live replay state behind it

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::ExecutorConfig;
use crate::error::{ReplayError, ReplayResult};
use crate::ledger::{self, Balances, Baseline, ContractPosition, SpotAccount};
use crate::market::{Depth, InstrumentRegistry};
use crate::simulation::{ExecutionSimulator, ExecutionStats, Fill};

/// What a strategy can see and do during replay
pub trait Context {
    /// Timestamp of the event being processed
    fn time(&self) -> DateTime<Utc>;

    fn balance(&self, ccy: &str) -> Option<Decimal>;

    /// Signed position and average open price, zeros if none
    fn position(&self, inst_id: &str) -> (Decimal, Decimal);

    fn latest_price(&self, inst_id: &str) -> Option<Decimal>;

    fn depth(&self, inst_id: &str) -> Option<&Depth>;

    /// Take liquidity for `amount` (positive) limited at `price`
    fn signal_taker(
        &mut self,
        inst_id: &str,
        price: Decimal,
        amount: Decimal,
        is_sell: bool,
    ) -> ReplayResult<Fill>;
}

/// One booked fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    pub inst_id: String,
    pub price: Decimal,
    pub amount: Decimal,
    pub is_sell: bool,
    pub fee: Decimal,
    /// Spot buys pay in base, spot sells in quote, contracts in the margin currency
    pub fee_ccy: String,
}

/// Balances, positions and market caches mutated by the executor
#[derive(Debug)]
pub struct ReplayState {
    time: DateTime<Utc>,
    registry: InstrumentRegistry,
    balances: Balances,
    initial_balances: Balances,
    baseline: Option<Baseline>,
    positions: BTreeMap<String, ContractPosition>,
    depths: Vec<Option<Depth>>,
    prices: Vec<Option<Decimal>>,
    spot: SpotAccount,
    contract_maker_fee: Decimal,
    contract_taker_fee: Decimal,
    trace_ledger: bool,
    simulator: ExecutionSimulator,
    deals: Vec<DealRecord>,
}

impl ReplayState {
    pub fn new(registry: InstrumentRegistry, config: &ExecutorConfig) -> Self {
        let n = registry.len();
        Self {
            time: DateTime::<Utc>::default(),
            registry,
            balances: Balances::new(),
            initial_balances: Balances::new(),
            baseline: None,
            positions: BTreeMap::new(),
            depths: vec![None; n],
            prices: vec![None; n],
            spot: SpotAccount::new(config.spot_maker_fee, config.spot_taker_fee),
            contract_maker_fee: config.contract_maker_fee,
            contract_taker_fee: config.contract_taker_fee,
            trace_ledger: config.trace_ledger,
            simulator: ExecutionSimulator::new(),
            deals: Vec::new(),
        }
    }

    pub(crate) fn set_time(&mut self, time: DateTime<Utc>) {
        self.time = time;
    }

    pub(crate) fn balances_mut(&mut self) -> &mut Balances {
        &mut self.balances
    }

    /// Snapshot initial balances and fix the NAV baseline
    pub(crate) fn start(&mut self, designated_baseline: Option<&str>) -> ReplayResult<()> {
        self.initial_balances = self.balances.clone();
        self.baseline = ledger::resolve_baseline(&self.initial_balances, designated_baseline)?;
        Ok(())
    }

    pub(crate) fn set_depth(&mut self, inst_index: usize, depth: Depth) {
        if let Some(slot) = self.depths.get_mut(inst_index) {
            *slot = Some(depth);
        }
    }

    /// Update the price cache and re-mark the instrument's position
    pub(crate) fn on_latest_price(&mut self, inst_index: usize, price: Decimal) -> ReplayResult<()> {
        if let Some(slot) = self.prices.get_mut(inst_index) {
            *slot = Some(price);
        }
        if let Some(instrument) = self.registry.get(inst_index) {
            if let Some(position) = self.positions.get_mut(&instrument.id) {
                position.update(price)?;
            }
        }
        Ok(())
    }

    fn price_by_id(&self, inst_id: &str) -> Option<Decimal> {
        self.registry
            .index_of(inst_id)
            .and_then(|i| self.prices.get(i).copied().flatten())
    }

    /// Net asset value against the baseline currency
    pub fn nav(&self) -> Decimal {
        let unrealized = self
            .positions
            .values()
            .map(|p| (p.margin_ccy(), p.unrealized_profit()));
        ledger::nav(self.baseline.as_ref(), &self.balances, unrealized, |id| {
            self.price_by_id(id)
        })
    }

    pub fn registry(&self) -> &InstrumentRegistry {
        &self.registry
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    pub fn initial_balances(&self) -> &Balances {
        &self.initial_balances
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    pub fn positions(&self) -> impl Iterator<Item = &ContractPosition> {
        self.positions.values()
    }

    pub fn contract_position(&self, inst_id: &str) -> Option<&ContractPosition> {
        self.positions.get(inst_id)
    }

    pub fn deals(&self) -> &[DealRecord] {
        &self.deals
    }

    pub fn execution_stats(&self) -> ExecutionStats {
        self.simulator.stats()
    }

    /// Book a fill, returning the fee and the currency it was charged in
    fn book_fill(&mut self, inst_index: usize, fill: &Fill) -> ReplayResult<(Decimal, String)> {
        let instrument = self
            .registry
            .get(inst_index)
            .ok_or_else(|| ReplayError::UnknownInstrument(inst_index.to_string()))?;

        let Some(margin_mode) = instrument.margin_mode() else {
            let fee = if fill.is_sell {
                self.spot.sell(
                    &mut self.balances,
                    &instrument.base,
                    &instrument.quote,
                    fill.price,
                    fill.amount,
                    true,
                )
            } else {
                self.spot.buy(
                    &mut self.balances,
                    &instrument.base,
                    &instrument.quote,
                    fill.price,
                    fill.amount,
                    true,
                )
            };
            let fee_ccy = if fill.is_sell { &instrument.quote } else { &instrument.base };
            return Ok((fee, fee_ccy.clone()));
        };

        let position = self
            .positions
            .entry(instrument.id.clone())
            .or_insert_with(|| {
                ContractPosition::new(
                    instrument.id.clone(),
                    margin_mode,
                    instrument.margin_ccy(),
                    self.contract_maker_fee,
                    self.contract_taker_fee,
                )
                .with_trace(self.trace_ledger)
            });

        let signed = if fill.is_sell { -fill.amount } else { fill.amount };
        let outcome = position.deal(fill.price, signed, true, self.time)?;
        self.balances
            .add(instrument.margin_ccy(), outcome.realized_profit - outcome.fee);
        Ok((outcome.fee, instrument.margin_ccy().to_string()))
    }
}

impl Context for ReplayState {
    fn time(&self) -> DateTime<Utc> {
        self.time
    }

    fn balance(&self, ccy: &str) -> Option<Decimal> {
        self.balances.get(ccy)
    }

    fn position(&self, inst_id: &str) -> (Decimal, Decimal) {
        self.positions
            .get(inst_id)
            .map(|p| (p.position(), p.avg_open_price()))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO))
    }

    fn latest_price(&self, inst_id: &str) -> Option<Decimal> {
        self.price_by_id(inst_id)
    }

    fn depth(&self, inst_id: &str) -> Option<&Depth> {
        self.registry
            .index_of(inst_id)
            .and_then(|i| self.depths.get(i))
            .and_then(Option::as_ref)
    }

    fn signal_taker(
        &mut self,
        inst_id: &str,
        price: Decimal,
        amount: Decimal,
        is_sell: bool,
    ) -> ReplayResult<Fill> {
        let inst_index = self
            .registry
            .index_of(inst_id)
            .ok_or_else(|| ReplayError::UnknownInstrument(inst_id.to_string()))?;

        let depth = self.depths.get(inst_index).and_then(Option::as_ref);
        let fill = self.simulator.simulate(depth, price, amount, is_sell)?;

        if fill.is_empty() {
            return Ok(fill);
        }

        let (fee, fee_ccy) = self.book_fill(inst_index, &fill)?;
        debug!(
            %inst_id,
            price = %fill.price,
            amount = %fill.amount,
            is_sell,
            %fee,
            %fee_ccy,
            "🧾 fill booked"
        );

        self.deals.push(DealRecord {
            time: self.time,
            inst_id: inst_id.to_string(),
            price: fill.price,
            amount: fill.amount,
            is_sell,
            fee,
            fee_ccy,
        });

        Ok(fill)
    }
}
