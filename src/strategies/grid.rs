// Grid trading strategy for replay
// Symmetric buy/sell levels around a center price, re-centered on every triggered level

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::backtest::{ChartRecorder, Context, Strategy};
use crate::config::GridConfig;
use crate::error::ReplayResult;
use crate::market::{KlineUnit, Ticker, Trade};
use crate::types::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSignal {
    Buy(Decimal),
    Sell(Decimal),
    None,
}

pub struct GridStrategy {
    config: GridConfig,
    instrument: Instrument,
    center_price: Option<Decimal>,
    buy_levels: Vec<Decimal>,
    sell_levels: Vec<Decimal>,
    last_triggered_level: Option<Decimal>,
    signals: usize,
    fills: usize,
}

impl GridStrategy {
    pub fn new(config: GridConfig) -> ReplayResult<Self> {
        let instrument = Instrument::parse(&config.inst_id)?;
        Ok(Self {
            config,
            instrument,
            center_price: None,
            buy_levels: Vec::new(),
            sell_levels: Vec::new(),
            last_triggered_level: None,
            signals: 0,
            fills: 0,
        })
    }

    fn setup_grid(&mut self, center_price: Decimal) {
        self.center_price = Some(center_price);
        self.buy_levels.clear();
        self.sell_levels.clear();

        for i in 1..=self.config.levels {
            let offset = self.config.spacing * Decimal::from(i);
            self.buy_levels.push(center_price * (Decimal::ONE - offset));
            self.sell_levels.push(center_price * (Decimal::ONE + offset));
        }

        debug!(
            inst_id = %self.instrument,
            center = %center_price,
            levels = self.config.levels,
            "🎯 grid set up"
        );
    }

    fn check_grid_signals(&self, price: Decimal) -> GridSignal {
        // Deepest crossed level wins
        let buy = self
            .buy_levels
            .iter()
            .rev()
            .find(|&&level| price <= level && self.last_triggered_level != Some(level));
        if let Some(&level) = buy {
            return GridSignal::Buy(level);
        }

        let sell = self
            .sell_levels
            .iter()
            .rev()
            .find(|&&level| price >= level && self.last_triggered_level != Some(level));
        if let Some(&level) = sell {
            return GridSignal::Sell(level);
        }

        GridSignal::None
    }

    fn can_buy(&self, price: Decimal, ctx: &dyn Context) -> bool {
        if self.instrument.is_spot() {
            let cost = price * self.config.order_amount;
            ctx.balance(&self.instrument.quote).map_or(false, |b| b >= cost)
        } else {
            let (position, _) = ctx.position(&self.instrument.id);
            position < self.max_position()
        }
    }

    fn can_sell(&self, ctx: &dyn Context) -> bool {
        if self.instrument.is_spot() {
            ctx.balance(&self.instrument.base)
                .map_or(false, |b| b >= self.config.order_amount)
        } else {
            let (position, _) = ctx.position(&self.instrument.id);
            position > -self.max_position()
        }
    }

    fn max_position(&self) -> Decimal {
        self.config.order_amount * Decimal::from(self.config.levels)
    }

    fn on_price(&mut self, inst_id: &str, price: Decimal, ctx: &mut dyn Context) -> ReplayResult<()> {
        if inst_id != self.instrument.id || price <= Decimal::ZERO {
            return Ok(());
        }

        if self.center_price.is_none() {
            self.setup_grid(price);
            return Ok(());
        }

        let (level, is_sell) = match self.check_grid_signals(price) {
            GridSignal::Buy(level) if self.can_buy(price, ctx) => (level, false),
            GridSignal::Sell(level) if self.can_sell(ctx) => (level, true),
            _ => return Ok(()),
        };

        self.signals += 1;
        // Limit one grid step beyond the current price
        let slack = price * self.config.spacing;
        let limit = if is_sell { price - slack } else { price + slack };

        let fill = ctx.signal_taker(inst_id, limit, self.config.order_amount, is_sell)?;
        if !fill.is_empty() {
            self.fills += 1;
            info!(
                %inst_id,
                side = if is_sell { "sell" } else { "buy" },
                level = %level,
                price = %fill.price,
                amount = %fill.amount,
                "{} grid level hit",
                if is_sell { "🔴" } else { "🟢" }
            );
        }

        self.setup_grid(level);
        self.last_triggered_level = Some(level);
        Ok(())
    }

    pub fn buy_levels(&self) -> &[Decimal] {
        &self.buy_levels
    }

    pub fn sell_levels(&self) -> &[Decimal] {
        &self.sell_levels
    }

    pub fn center_price(&self) -> Option<Decimal> {
        self.center_price
    }

    pub fn signals(&self) -> usize {
        self.signals
    }

    pub fn fills(&self) -> usize {
        self.fills
    }
}

impl Strategy for GridStrategy {
    fn class(&self) -> &str {
        "grid"
    }

    fn on_ticker(&mut self, inst_id: &str, ticker: &Ticker, ctx: &mut dyn Context) -> ReplayResult<()> {
        self.on_price(inst_id, ticker.price, ctx)
    }

    fn on_trade(&mut self, inst_id: &str, trade: &Trade, ctx: &mut dyn Context) -> ReplayResult<()> {
        self.on_price(inst_id, trade.price, ctx)
    }

    fn on_kline_unit(&mut self, inst_id: &str, kline: &KlineUnit, ctx: &mut dyn Context) -> ReplayResult<()> {
        self.on_price(inst_id, kline.close, ctx)
    }

    fn on_visual_refresh(&mut self, chart: &mut ChartRecorder, ctx: &dyn Context) {
        let inst_id = &self.instrument.id;
        if let Some(price) = ctx.latest_price(inst_id) {
            chart.record(&format!("{}.price", inst_id), ctx.time(), price);
        }
        if let Some(center) = self.center_price {
            chart.record(&format!("{}.grid_center", inst_id), ctx.time(), center);
        }
        let (position, _) = ctx.position(inst_id);
        chart.record(&format!("{}.position", inst_id), ctx.time(), position);
    }

    fn on_visual_save(&mut self, chart: &mut ChartRecorder, _ctx: &dyn Context) {
        chart.add_info(format!("grid signals: {}", self.signals));
        chart.add_info(format!("grid fills: {}", self.fills));
    }
}
