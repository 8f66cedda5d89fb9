// Event Sequencer
// Checks coverage for every requested stream, then merges all records into one time-ordered list

use tracing::{error, info, info_span, warn, Span};

use super::{EnabledKinds, LoadRequest, MarketDataLoader};
use crate::error::{ReplayError, ReplayResult};
use crate::market::{EventPayload, InstrumentRegistry, MarketEvent, TradeTag};
use crate::types::{DataKind, TimeRange};

/// Sorted events ready for replay
#[derive(Debug, Clone)]
pub struct EventStream {
    pub exchange: String,
    pub range: TimeRange,
    pub registry: InstrumentRegistry,
    pub kinds: EnabledKinds,
    pub events: Vec<MarketEvent>,
}

impl EventStream {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Time of the first and last event
    pub fn span(&self) -> Option<TimeRange> {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => Some(TimeRange::new(first.time, last.time)),
            _ => None,
        }
    }
}

/// Builds an `EventStream` from a loader
pub struct EventSequencer<'a> {
    loader: &'a dyn MarketDataLoader,
    span: Span,
}

impl<'a> EventSequencer<'a> {
    pub fn new(loader: &'a dyn MarketDataLoader) -> Self {
        Self {
            loader,
            span: info_span!("sequencer"),
        }
    }

    /// Log under a caller-provided span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Progress units for a request: 1 per instrument and kind (depth 3), plus 1 for the sort
    pub fn total_weight(request: &LoadRequest) -> f64 {
        let per_inst: u32 = request.data_kinds().iter().map(|k| k.load_weight()).sum();
        1.0 + f64::from(per_inst) * request.inst_ids.len() as f64
    }

    pub fn build(&self, request: &LoadRequest) -> ReplayResult<EventStream> {
        self.build_with_progress(request, &mut |_, _| {})
    }

    /// Build the stream, reporting `(done, total)` in weight units
    pub fn build_with_progress(
        &self,
        request: &LoadRequest,
        progress: &mut dyn FnMut(f64, f64),
    ) -> ReplayResult<EventStream> {
        let _enter = self.span.enter();

        if request.kinds.kline && request.kline_interval_sec.is_none() {
            let e = ReplayError::MissingKlineInterval {
                exchange: request.exchange.clone(),
            };
            error!(error = %e, "❌ invalid load request");
            return Err(e);
        }

        let registry = InstrumentRegistry::new(&request.inst_ids)?;
        let kinds = request.data_kinds();
        let total = Self::total_weight(request);

        info!(
            exchange = %request.exchange,
            instruments = registry.len(),
            range = %request.range,
            "📥 loading market data"
        );

        for kind in &kinds {
            if let Err(e) = self.check_coverage(request, &registry, *kind) {
                error!(error = %e, "❌ coverage check failed");
                return Err(e);
            }
        }

        let mut events = Vec::new();
        let mut done = 0.0;
        for kind in &kinds {
            let weight = f64::from(kind.load_weight());
            for (index, instrument) in registry.iter() {
                let base = done;
                let mut on_file = |i: usize, n: usize| {
                    let frac = if n == 0 { 1.0 } else { i as f64 / n as f64 };
                    progress(base + weight * frac, total);
                };
                let payloads = self.loader.load(
                    &request.exchange,
                    &instrument.id,
                    *kind,
                    &request.range,
                    &mut on_file,
                )?;

                let before = events.len();
                for payload in payloads {
                    match tag_payload(*kind, payload) {
                        Some(payload) => events.push(MarketEvent::new(index, payload)),
                        None => warn!(
                            inst_id = %instrument.id,
                            %kind,
                            "⚠️  record does not match requested kind, skipped"
                        ),
                    }
                }

                info!(
                    inst_id = %instrument.id,
                    %kind,
                    records = events.len() - before,
                    "loaded"
                );
                done = base + weight;
                progress(done, total);
            }
        }

        if events.is_empty() {
            return Err(ReplayError::NoData {
                exchange: request.exchange.clone(),
            });
        }

        // Stable sort keeps kind order, then registry order, between equal timestamps
        events.sort_by_key(|e| e.time);
        progress(total, total);

        info!(events = events.len(), "✅ market data sequenced");

        Ok(EventStream {
            exchange: request.exchange.clone(),
            range: request.range,
            registry,
            kinds: request.kinds,
            events,
        })
    }

    fn check_coverage(
        &self,
        request: &LoadRequest,
        registry: &InstrumentRegistry,
        kind: DataKind,
    ) -> ReplayResult<()> {
        // Liquidations are sparse by nature
        if kind == DataKind::Liquidations {
            return Ok(());
        }

        let exchange = &request.exchange;
        let available = self.loader.instruments(exchange, kind)?;

        if let DataKind::Kline { interval_sec } = kind {
            if available.is_empty() {
                return Err(ReplayError::InvalidKlineInterval {
                    exchange: exchange.clone(),
                    interval_sec,
                });
            }
        }

        for inst_id in registry.ids() {
            if !available.iter().any(|a| a == inst_id) {
                return Err(ReplayError::CoverageMissing {
                    exchange: exchange.clone(),
                    inst_id: inst_id.to_string(),
                    kind,
                });
            }

            let Some(range) = self.loader.time_range(exchange, inst_id, kind)? else {
                return Err(ReplayError::CoverageUnknown {
                    exchange: exchange.clone(),
                    inst_id: inst_id.to_string(),
                    kind,
                });
            };

            if !range.contains(&request.range) {
                return Err(ReplayError::CoverageInsufficient {
                    exchange: exchange.clone(),
                    inst_id: inst_id.to_string(),
                    kind,
                    available: range,
                    requested: request.range,
                });
            }
        }

        Ok(())
    }
}

/// Keep a payload only if its variant matches the kind, tagging trades by origin
fn tag_payload(kind: DataKind, payload: EventPayload) -> Option<EventPayload> {
    match (kind, payload) {
        (DataKind::Ticker, p @ EventPayload::Ticker(_)) => Some(p),
        (DataKind::Depth, p @ EventPayload::Depth(_)) => Some(p),
        (DataKind::Trades, EventPayload::Trade(mut t)) => {
            t.tag = TradeTag::Normal;
            Some(EventPayload::Trade(t))
        }
        (DataKind::Liquidations, EventPayload::Trade(mut t)) => {
            t.tag = TradeTag::Liquidation;
            Some(EventPayload::Trade(t))
        }
        (DataKind::Kline { .. }, p @ EventPayload::Kline(_)) => Some(p),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryLoader;
    use crate::market::{Side, Ticker, Trade};
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn ticker(ms: i64) -> Ticker {
        Ticker {
            time: t(ms),
            price: dec!(100),
            best_bid: dec!(99),
            best_ask: dec!(101),
        }
    }

    fn request(kinds: EnabledKinds) -> LoadRequest {
        LoadRequest {
            exchange: "okx".to_string(),
            inst_ids: vec!["btc_usdt".to_string()],
            range: TimeRange::new(t(0), t(100)),
            kinds,
            kline_interval_sec: None,
        }
    }

    #[test]
    fn test_mismatched_payload_is_skipped() {
        let mut loader = MemoryLoader::new().with_tickers("okx", "btc_usdt", vec![ticker(0), ticker(100)]);
        loader.insert(
            "okx",
            "btc_usdt",
            DataKind::Ticker,
            vec![EventPayload::Trade(Trade {
                time: t(50),
                price: dec!(1),
                size: dec!(1),
                side: Side::Buy,
                tag: TradeTag::Normal,
            })],
        );

        let stream = EventSequencer::new(&loader)
            .build(&request(EnabledKinds {
                ticker: true,
                ..Default::default()
            }))
            .unwrap();
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn test_liquidations_are_tagged_and_unchecked() {
        let liq = Trade {
            time: t(10),
            price: dec!(100),
            size: dec!(2),
            side: Side::Sell,
            tag: TradeTag::Normal,
        };
        let loader = MemoryLoader::new()
            .with_tickers("okx", "btc_usdt", vec![ticker(0), ticker(100)])
            .with_liquidations("okx", "btc_usdt", vec![liq]);

        let stream = EventSequencer::new(&loader)
            .build(&request(EnabledKinds {
                ticker: true,
                liquidations: true,
                ..Default::default()
            }))
            .unwrap();

        assert_eq!(stream.len(), 3);
        match &stream.events[1].payload {
            EventPayload::Trade(trade) => assert_eq!(trade.tag, TradeTag::Liquidation),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_total_weight() {
        let mut req = request(EnabledKinds {
            ticker: true,
            depth: true,
            kline: true,
            ..Default::default()
        });
        req.inst_ids.push("eth_usdt".to_string());
        req.kline_interval_sec = Some(60);
        assert_eq!(EventSequencer::total_weight(&req), 1.0 + 2.0 * 5.0);
    }
}
