// Replay events and the instrument registry they index into

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::depth::Depth;
use super::records::{KlineUnit, Ticker, Trade};
use crate::error::{ReplayError, ReplayResult};
use crate::types::Instrument;

/// Decoded record carried by an event
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Ticker(Ticker),
    Depth(Depth),
    Trade(Trade),
    Kline(KlineUnit),
}

impl EventPayload {
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            EventPayload::Ticker(t) => t.time,
            EventPayload::Depth(d) => d.time,
            EventPayload::Trade(t) => t.time,
            EventPayload::Kline(k) => k.time,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            EventPayload::Ticker(_) => "ticker",
            EventPayload::Depth(_) => "depth",
            EventPayload::Trade(_) => "trade",
            EventPayload::Kline(_) => "kline",
        }
    }
}

/// A time-stamped record for one registered instrument
#[derive(Debug, Clone, PartialEq)]
pub struct MarketEvent {
    pub time: DateTime<Utc>,
    pub inst_index: usize,
    pub payload: EventPayload,
}

impl MarketEvent {
    pub fn new(inst_index: usize, payload: EventPayload) -> Self {
        Self {
            time: payload.time(),
            inst_index,
            payload,
        }
    }
}

/// Bidirectional mapping between instrument ids and dense indices
#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    instruments: Vec<Instrument>,
    index: HashMap<String, usize>,
}

impl InstrumentRegistry {
    /// Build from ids in request order; duplicates keep their first index
    pub fn new<I, S>(ids: I) -> ReplayResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::default();
        for id in ids {
            let id = id.as_ref();
            if registry.index.contains_key(id) {
                continue;
            }
            let instrument = Instrument::parse(id)?;
            registry.index.insert(id.to_string(), registry.instruments.len());
            registry.instruments.push(instrument);
        }
        Ok(registry)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, index: usize) -> Option<&Instrument> {
        self.instruments.get(index)
    }

    pub fn by_id(&self, id: &str) -> ReplayResult<&Instrument> {
        self.index_of(id)
            .and_then(|i| self.instruments.get(i))
            .ok_or_else(|| ReplayError::UnknownInstrument(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.instruments.iter().map(|i| i.id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Instrument)> {
        self.instruments.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_round_trip() {
        let registry = InstrumentRegistry::new(["btc_usdt", "eth_usdt_swap", "btc_usdt"]).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.index_of("eth_usdt_swap"), Some(1));
        assert_eq!(registry.get(0).map(|i| i.id.as_str()), Some("btc_usdt"));
        assert!(registry.by_id("sol_usdt").is_err());
    }

    #[test]
    fn test_registry_rejects_bad_ids() {
        assert!(InstrumentRegistry::new(["btcusdt"]).is_err());
    }
}
