// Common test utilities and helpers
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use market_replay::{
    Context, Depth, DepthLevel, EnabledKinds, EventSequencer, EventStream, Executor,
    ExecutorConfig, Fill, KlineUnit, LoadRequest, MemoryLoader, ReplayResult, Side, Strategy,
    Ticker, TimeRange, Trade, TradeTag,
};

pub const EXCHANGE: &str = "okx";

pub fn t(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

/// Ticker with a one-unit spread around `price`
pub fn ticker(ms: i64, price: Decimal) -> Ticker {
    ticker_quote(ms, price, price - Decimal::ONE, price + Decimal::ONE)
}

pub fn ticker_quote(ms: i64, price: Decimal, best_bid: Decimal, best_ask: Decimal) -> Ticker {
    Ticker {
        time: t(ms),
        price,
        best_bid,
        best_ask,
    }
}

pub fn trade(ms: i64, price: Decimal, size: Decimal, side: Side) -> Trade {
    Trade {
        time: t(ms),
        price,
        size,
        side,
        tag: TradeTag::Normal,
    }
}

pub fn kline(ms: i64, close: Decimal) -> KlineUnit {
    KlineUnit {
        time: t(ms),
        open: close,
        close,
        high: close,
        low: close,
        volume: Decimal::ONE,
    }
}

/// Book from `(price, amount)` pairs, best level first
pub fn depth(ms: i64, asks: &[(Decimal, Decimal)], bids: &[(Decimal, Decimal)]) -> Depth {
    let levels = |side: &[(Decimal, Decimal)]| -> Vec<DepthLevel> {
        side.iter()
            .map(|&(price, amount)| DepthLevel::new(price, amount, 1))
            .collect()
    };
    Depth {
        time: t(ms),
        asks: levels(asks),
        bids: levels(bids),
    }
}

pub fn request(inst_ids: &[&str], start_ms: i64, end_ms: i64, kinds: EnabledKinds) -> LoadRequest {
    LoadRequest {
        exchange: EXCHANGE.to_string(),
        inst_ids: inst_ids.iter().map(|s| s.to_string()).collect(),
        range: TimeRange::new(t(start_ms), t(end_ms)),
        kinds,
        kline_interval_sec: None,
    }
}

/// Sequence `loader` and wrap the stream in a zero-fee executor
pub fn executor(loader: &MemoryLoader, request: &LoadRequest) -> Executor {
    let stream = EventSequencer::new(loader).build(request).unwrap();
    Executor::new(stream, zero_fee_config())
}

pub fn stream(loader: &MemoryLoader, request: &LoadRequest) -> EventStream {
    EventSequencer::new(loader).build(request).unwrap()
}

pub fn zero_fee_config() -> ExecutorConfig {
    ExecutorConfig {
        spot_maker_fee: Decimal::ZERO,
        spot_taker_fee: Decimal::ZERO,
        contract_maker_fee: Decimal::ZERO,
        contract_taker_fee: Decimal::ZERO,
        ..Default::default()
    }
}

/// Taker order a `ScriptedStrategy` sends at a given event time
#[derive(Debug, Clone)]
pub struct ScriptedOrder {
    pub at_ms: i64,
    pub inst_id: String,
    pub price: Decimal,
    pub amount: Decimal,
    pub is_sell: bool,
}

impl ScriptedOrder {
    pub fn buy(at_ms: i64, inst_id: &str, price: Decimal, amount: Decimal) -> Self {
        Self {
            at_ms,
            inst_id: inst_id.to_string(),
            price,
            amount,
            is_sell: false,
        }
    }

    pub fn sell(at_ms: i64, inst_id: &str, price: Decimal, amount: Decimal) -> Self {
        Self {
            is_sell: true,
            ..Self::buy(at_ms, inst_id, price, amount)
        }
    }
}

/// Records every callback and fires scripted orders on the first event at their time
#[derive(Debug, Default)]
pub struct ScriptedStrategy {
    pub calls: Vec<(String, String, i64)>,
    pub prices_seen: Vec<Option<Decimal>>,
    pub orders: Vec<ScriptedOrder>,
    pub fills: Vec<Fill>,
    pub refreshes: usize,
    pub saved: bool,
}

impl ScriptedStrategy {
    pub fn new(orders: Vec<ScriptedOrder>) -> Self {
        Self {
            orders,
            ..Default::default()
        }
    }

    pub fn calls_of(&self, callback: &str) -> usize {
        self.calls.iter().filter(|(c, _, _)| c == callback).count()
    }

    fn observe(&mut self, callback: &str, inst_id: &str, ctx: &mut dyn Context) -> ReplayResult<()> {
        let now = ctx.time().timestamp_millis();
        self.calls.push((callback.to_string(), inst_id.to_string(), now));
        self.prices_seen.push(ctx.latest_price(inst_id));

        let (due, rest): (Vec<_>, Vec<_>) = self.orders.drain(..).partition(|o| o.at_ms <= now);
        self.orders = rest;
        for order in due {
            let fill = ctx.signal_taker(&order.inst_id, order.price, order.amount, order.is_sell)?;
            self.fills.push(fill);
        }
        Ok(())
    }
}

impl Strategy for ScriptedStrategy {
    fn class(&self) -> &str {
        "scripted"
    }

    fn on_ticker(&mut self, inst_id: &str, _ticker: &Ticker, ctx: &mut dyn Context) -> ReplayResult<()> {
        self.observe("ticker", inst_id, ctx)
    }

    fn on_depth(&mut self, inst_id: &str, _depth: &Depth, ctx: &mut dyn Context) -> ReplayResult<()> {
        self.observe("depth", inst_id, ctx)
    }

    fn on_trade(&mut self, inst_id: &str, _trade: &Trade, ctx: &mut dyn Context) -> ReplayResult<()> {
        self.observe("trade", inst_id, ctx)
    }

    fn on_kline_unit(&mut self, inst_id: &str, _kline: &KlineUnit, ctx: &mut dyn Context) -> ReplayResult<()> {
        self.observe("kline", inst_id, ctx)
    }

    fn on_liquidation(&mut self, inst_id: &str, _trade: &Trade, ctx: &mut dyn Context) -> ReplayResult<()> {
        self.observe("liquidation", inst_id, ctx)
    }

    fn on_visual_refresh(&mut self, _chart: &mut market_replay::ChartRecorder, _ctx: &dyn Context) {
        self.refreshes += 1;
    }

    fn on_visual_save(&mut self, _chart: &mut market_replay::ChartRecorder, _ctx: &dyn Context) {
        self.saved = true;
    }
}
