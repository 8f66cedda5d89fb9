// In-process loader for tests and embedding callers

use std::collections::BTreeMap;

use super::MarketDataLoader;
use crate::error::ReplayResult;
use crate::market::{Depth, EventPayload, KlineUnit, Ticker, Trade};
use crate::types::{DataKind, TimeRange};

type Key = (String, String, DataKind);

#[derive(Debug, Default)]
struct Series {
    records: Vec<EventPayload>,
    range: Option<TimeRange>,
}

/// Loader backed by records held in memory
#[derive(Debug, Default)]
pub struct MemoryLoader {
    series: BTreeMap<Key, Series>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw payloads; records are kept sorted by time
    pub fn insert(&mut self, exchange: &str, inst_id: &str, kind: DataKind, records: Vec<EventPayload>) {
        let series = self
            .series
            .entry((exchange.to_string(), inst_id.to_string(), kind))
            .or_default();
        series.records.extend(records);
        series.records.sort_by_key(|p| p.time());
    }

    pub fn with_tickers(mut self, exchange: &str, inst_id: &str, tickers: Vec<Ticker>) -> Self {
        let payloads = tickers.into_iter().map(EventPayload::Ticker).collect();
        self.insert(exchange, inst_id, DataKind::Ticker, payloads);
        self
    }

    pub fn with_depths(mut self, exchange: &str, inst_id: &str, depths: Vec<Depth>) -> Self {
        let payloads = depths.into_iter().map(EventPayload::Depth).collect();
        self.insert(exchange, inst_id, DataKind::Depth, payloads);
        self
    }

    pub fn with_trades(mut self, exchange: &str, inst_id: &str, trades: Vec<Trade>) -> Self {
        let payloads = trades.into_iter().map(EventPayload::Trade).collect();
        self.insert(exchange, inst_id, DataKind::Trades, payloads);
        self
    }

    pub fn with_liquidations(mut self, exchange: &str, inst_id: &str, trades: Vec<Trade>) -> Self {
        let payloads = trades.into_iter().map(EventPayload::Trade).collect();
        self.insert(exchange, inst_id, DataKind::Liquidations, payloads);
        self
    }

    pub fn with_klines(
        mut self,
        exchange: &str,
        inst_id: &str,
        interval_sec: u32,
        klines: Vec<KlineUnit>,
    ) -> Self {
        let payloads = klines.into_iter().map(EventPayload::Kline).collect();
        self.insert(exchange, inst_id, DataKind::Kline { interval_sec }, payloads);
        self
    }

    /// Override the advertised coverage, otherwise it spans first to last record
    pub fn with_range(mut self, exchange: &str, inst_id: &str, kind: DataKind, range: TimeRange) -> Self {
        self.series
            .entry((exchange.to_string(), inst_id.to_string(), kind))
            .or_default()
            .range = Some(range);
        self
    }
}

impl MarketDataLoader for MemoryLoader {
    fn instruments(&self, exchange: &str, kind: DataKind) -> ReplayResult<Vec<String>> {
        Ok(self
            .series
            .keys()
            .filter(|(ex, _, k)| ex == exchange && *k == kind)
            .map(|(_, inst, _)| inst.clone())
            .collect())
    }

    fn time_range(
        &self,
        exchange: &str,
        inst_id: &str,
        kind: DataKind,
    ) -> ReplayResult<Option<TimeRange>> {
        let key = (exchange.to_string(), inst_id.to_string(), kind);
        let Some(series) = self.series.get(&key) else {
            return Ok(None);
        };
        if series.range.is_some() {
            return Ok(series.range);
        }
        let range = match (series.records.first(), series.records.last()) {
            (Some(first), Some(last)) => Some(TimeRange::new(first.time(), last.time())),
            _ => None,
        };
        Ok(range)
    }

    fn load(
        &self,
        exchange: &str,
        inst_id: &str,
        kind: DataKind,
        range: &TimeRange,
        progress: &mut dyn FnMut(usize, usize),
    ) -> ReplayResult<Vec<EventPayload>> {
        let key = (exchange.to_string(), inst_id.to_string(), kind);
        let records = self
            .series
            .get(&key)
            .map(|s| {
                s.records
                    .iter()
                    .filter(|p| range.contains_time(p.time()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        progress(1, 1);
        Ok(records)
    }
}
