// Market data loading and event sequencing
//
// Loaders hand back decoded records per (exchange, instrument, kind); the
// sequencer checks coverage and merges everything into one time-ordered stream.

pub mod jsonl;
pub mod memory;
pub mod sequencer;

use serde::{Deserialize, Serialize};

use crate::error::ReplayResult;
use crate::market::EventPayload;
use crate::types::{DataKind, TimeRange};

pub use jsonl::JsonlLoader;
pub use memory::MemoryLoader;
pub use sequencer::{EventSequencer, EventStream};

/// Source of historical records
pub trait MarketDataLoader {
    /// Instruments that have data of `kind` on `exchange`
    fn instruments(&self, exchange: &str, kind: DataKind) -> ReplayResult<Vec<String>>;

    /// Available range for one instrument, `None` if it cannot be determined
    fn time_range(
        &self,
        exchange: &str,
        inst_id: &str,
        kind: DataKind,
    ) -> ReplayResult<Option<TimeRange>>;

    /// Records within `range` in ascending time order.
    /// `progress(i, n)` is reported as units of work complete.
    fn load(
        &self,
        exchange: &str,
        inst_id: &str,
        kind: DataKind,
        range: &TimeRange,
        progress: &mut dyn FnMut(usize, usize),
    ) -> ReplayResult<Vec<EventPayload>>;
}

/// What to load for a replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub exchange: String,
    pub inst_ids: Vec<String>,
    pub range: TimeRange,
    pub kinds: EnabledKinds,
    /// Kline interval in seconds when klines are enabled
    pub kline_interval_sec: Option<u32>,
}

impl LoadRequest {
    /// Requested kinds in loading order
    pub fn data_kinds(&self) -> Vec<DataKind> {
        let mut kinds = Vec::new();
        if self.kinds.ticker {
            kinds.push(DataKind::Ticker);
        }
        if self.kinds.depth {
            kinds.push(DataKind::Depth);
        }
        if self.kinds.trades {
            kinds.push(DataKind::Trades);
        }
        if self.kinds.liquidations {
            kinds.push(DataKind::Liquidations);
        }
        if self.kinds.kline {
            if let Some(interval_sec) = self.kline_interval_sec {
                kinds.push(DataKind::Kline { interval_sec });
            }
        }
        kinds
    }
}

/// Which streams take part in a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledKinds {
    #[serde(default)]
    pub ticker: bool,
    #[serde(default)]
    pub depth: bool,
    #[serde(default)]
    pub trades: bool,
    #[serde(default)]
    pub liquidations: bool,
    #[serde(default)]
    pub kline: bool,
}

/// Stream that drives the latest-price cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Kline,
    Ticker,
    Trade,
    Depth,
}

impl EnabledKinds {
    /// kline > ticker > trade > depth
    pub fn price_source(&self) -> Option<PriceSource> {
        if self.kline {
            Some(PriceSource::Kline)
        } else if self.ticker {
            Some(PriceSource::Ticker)
        } else if self.trades {
            Some(PriceSource::Trade)
        } else if self.depth {
            Some(PriceSource::Depth)
        } else {
            None
        }
    }

    pub fn any(&self) -> bool {
        self.ticker || self.depth || self.trades || self.liquidations || self.kline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_source_priority() {
        let all = EnabledKinds {
            ticker: true,
            depth: true,
            trades: true,
            liquidations: true,
            kline: true,
        };
        assert_eq!(all.price_source(), Some(PriceSource::Kline));

        let no_kline = EnabledKinds { kline: false, ..all };
        assert_eq!(no_kline.price_source(), Some(PriceSource::Ticker));

        let depth_only = EnabledKinds {
            depth: true,
            ..Default::default()
        };
        assert_eq!(depth_only.price_source(), Some(PriceSource::Depth));

        let liq_only = EnabledKinds {
            liquidations: true,
            ..Default::default()
        };
        assert_eq!(liq_only.price_source(), None);
    }
}
