// Replay Executor
// Single forward pass over the sorted event stream, feeding a strategy and keeping ledgers marked

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, info_span, warn, Span};

use super::chart::{align_time, ChartRecorder, PointTag};
use super::context::{Context, ReplayState};
use super::report::BacktestReport;
use super::strategy::Strategy;
use crate::config::ExecutorConfig;
use crate::data::{EnabledKinds, EventStream, PriceSource};
use crate::error::{ReplayError, ReplayResult};
use crate::market::{Depth, EventPayload, MarketEvent, TradeTag};

/// Drives one replay of an `EventStream`
#[derive(Debug)]
pub struct Executor {
    config: ExecutorConfig,
    stream: EventStream,
    state: ReplayState,
    chart: ChartRecorder,
    baseline_ccy: Option<String>,
    replayed: bool,
    span: Span,
}

impl Executor {
    pub fn new(stream: EventStream, config: ExecutorConfig) -> Self {
        let state = ReplayState::new(stream.registry.clone(), &config);
        let chart = ChartRecorder::new(config.chart_interval_ms);
        Self {
            config,
            stream,
            state,
            chart,
            baseline_ccy: None,
            replayed: false,
            span: info_span!("replay"),
        }
    }

    /// Log under a caller-provided span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn set_balance(&mut self, ccy: &str, amount: Decimal) {
        self.state.balances_mut().set(ccy, amount);
    }

    /// Measure NAV in `ccy` instead of the single initial currency
    pub fn set_baseline_currency(&mut self, ccy: &str) {
        self.baseline_ccy = Some(ccy.to_string());
    }

    pub fn state(&self) -> &ReplayState {
        &self.state
    }

    pub fn chart(&self) -> &ChartRecorder {
        &self.chart
    }

    pub fn stream(&self) -> &EventStream {
        &self.stream
    }

    pub fn nav(&self) -> Decimal {
        self.state.nav()
    }

    pub fn run(&mut self, strategy: &mut dyn Strategy) -> ReplayResult<BacktestReport> {
        self.run_with_progress(strategy, &mut |_, _| {})
    }

    /// Replay every event once, reporting `(processed, total)`
    pub fn run_with_progress(
        &mut self,
        strategy: &mut dyn Strategy,
        progress: &mut dyn FnMut(usize, usize),
    ) -> ReplayResult<BacktestReport> {
        if self.replayed {
            return Err(ReplayError::AlreadyReplayed);
        }
        self.replayed = true;

        let span = self.span.clone();
        let _enter = span.enter();

        self.state.start(self.baseline_ccy.as_deref())?;

        let kinds = self.stream.kinds;
        let price_source = kinds.price_source();
        let events = std::mem::take(&mut self.stream.events);
        let total = events.len();
        let (start, end) = match (events.first(), events.last()) {
            (Some(first), Some(last)) => (first.time, last.time),
            _ => (self.stream.range.start, self.stream.range.end),
        };

        info!(
            strategy = strategy.class(),
            events = total,
            price_source = ?price_source,
            baseline = ?self.state.baseline().map(|b| b.ccy.as_str()),
            "▶️  replay started"
        );

        strategy.on_visual_init(&mut self.chart, &self.state);

        let mut next_refresh: Option<DateTime<Utc>> = None;
        for (i, event) in events.into_iter().enumerate() {
            self.state.set_time(event.time);
            self.step(event, kinds, price_source, strategy)?;
            self.refresh_visuals(strategy, &mut next_refresh);
            progress(i + 1, total);
        }

        self.save_visuals(strategy, start, end);

        let report = BacktestReport::build(
            strategy.class(),
            &self.stream.exchange,
            start,
            end,
            total,
            &self.state,
        );

        info!(
            nav = %report.final_nav,
            deals = report.deals,
            "🏁 replay finished"
        );

        Ok(report)
    }

    fn step(
        &mut self,
        event: MarketEvent,
        kinds: EnabledKinds,
        price_source: Option<PriceSource>,
        strategy: &mut dyn Strategy,
    ) -> ReplayResult<()> {
        let index = event.inst_index;
        let Some(instrument) = self.stream.registry.get(index) else {
            warn!(inst_index = index, "⚠️  event for unregistered instrument skipped");
            return Ok(());
        };
        let inst_id = instrument.id.as_str();
        let state = &mut self.state;

        match event.payload {
            EventPayload::Ticker(ticker) => {
                if !kinds.ticker {
                    return skip(inst_id, "ticker");
                }
                if !kinds.depth {
                    state.set_depth(index, Depth::from_ticker(&ticker));
                }
                if price_source == Some(PriceSource::Ticker) {
                    state.on_latest_price(index, ticker.price)?;
                }
                strategy.on_ticker(inst_id, &ticker, state)
            }
            EventPayload::Depth(depth) => {
                if !kinds.depth {
                    return skip(inst_id, "depth");
                }
                state.set_depth(index, depth.clone());
                if price_source == Some(PriceSource::Depth) {
                    if let Some(mid) = depth.mid() {
                        state.on_latest_price(index, mid)?;
                    }
                }
                strategy.on_depth(inst_id, &depth, state)
            }
            EventPayload::Trade(trade) => match trade.tag {
                TradeTag::Normal => {
                    if !kinds.trades {
                        return skip(inst_id, "trade");
                    }
                    if price_source == Some(PriceSource::Trade) {
                        state.on_latest_price(index, trade.price)?;
                    }
                    strategy.on_trade(inst_id, &trade, state)
                }
                TradeTag::Liquidation => {
                    if !kinds.liquidations {
                        return skip(inst_id, "liquidation");
                    }
                    strategy.on_liquidation(inst_id, &trade, state)
                }
            },
            EventPayload::Kline(kline) => {
                if !kinds.kline {
                    return skip(inst_id, "kline");
                }
                if price_source == Some(PriceSource::Kline) {
                    state.on_latest_price(index, kline.close)?;
                }
                strategy.on_kline_unit(inst_id, &kline, state)
            }
        }
    }

    fn refresh_visuals(&mut self, strategy: &mut dyn Strategy, next_refresh: &mut Option<DateTime<Utc>>) {
        let interval_ms = self.config.chart_interval_ms;
        if interval_ms <= 0 {
            return;
        }

        let now = self.state.time();
        if next_refresh.map_or(false, |next| now <= next) {
            return;
        }

        self.chart.record("nav", now, self.state.nav());
        strategy.on_visual_refresh(&mut self.chart, &self.state);
        *next_refresh = Some(align_time(now, interval_ms) + chrono::Duration::milliseconds(interval_ms));
    }

    fn save_visuals(&mut self, strategy: &mut dyn Strategy, start: DateTime<Utc>, end: DateTime<Utc>) {
        for deal in self.state.deals() {
            let tag = if deal.is_sell { PointTag::Sell } else { PointTag::Buy };
            self.chart.record_tagged(&deal.inst_id, deal.time, deal.price, tag);
        }

        let duration = end - start;
        self.chart.add_info(format!("start: {}", start.format("%Y-%m-%d %H:%M:%S")));
        self.chart.add_info(format!("end: {}", end.format("%Y-%m-%d %H:%M:%S")));
        self.chart.add_info(format!(
            "duration: {}d {}h {}m",
            duration.num_days(),
            duration.num_hours() % 24,
            duration.num_minutes() % 60
        ));
        self.chart.add_info(format!("nav: {:.4}", self.state.nav()));

        strategy.on_visual_save(&mut self.chart, &self.state);
    }
}

fn skip(inst_id: &str, kind: &str) -> ReplayResult<()> {
    warn!(%inst_id, kind, "⚠️  event kind not enabled for this replay, skipped");
    Ok(())
}
