// Shared instrument, data-kind and time-range types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReplayError, ReplayResult};

/// How an instrument is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstType {
    Spot,
    UsdtSwap,
    CoinSwap,
}

/// Profit convention of a perpetual contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginMode {
    /// Margin in the quote stablecoin, position sized in coins
    Usdt,
    /// Margin in the base coin, position sized in quote units
    Coin,
}

/// A parsed instrument id such as `btc_usdt` or `eth_usd_swap`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub inst_type: InstType,
    pub base: String,
    pub quote: String,
}

impl Instrument {
    pub fn parse(id: &str) -> ReplayResult<Self> {
        let parts: Vec<&str> = id.split('_').collect();
        let invalid = || ReplayError::InvalidInstrument(id.to_string());

        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        let (inst_type, base, quote) = match parts.as_slice() {
            [base, quote] => (InstType::Spot, *base, *quote),
            [base, "usdt", "swap"] => (InstType::UsdtSwap, *base, "usdt"),
            [base, "usd", "swap"] => (InstType::CoinSwap, *base, "usd"),
            _ => return Err(invalid()),
        };

        Ok(Self {
            id: id.to_string(),
            inst_type,
            base: base.to_string(),
            quote: quote.to_string(),
        })
    }

    pub fn is_spot(&self) -> bool {
        self.inst_type == InstType::Spot
    }

    /// Profit convention, `None` for spot
    pub fn margin_mode(&self) -> Option<MarginMode> {
        match self.inst_type {
            InstType::Spot => None,
            InstType::UsdtSwap => Some(MarginMode::Usdt),
            InstType::CoinSwap => Some(MarginMode::Coin),
        }
    }

    /// Currency that receives contract profit and fees
    pub fn margin_ccy(&self) -> &str {
        match self.inst_type {
            InstType::CoinSwap => &self.base,
            _ => &self.quote,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Kind of market data stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Ticker,
    Depth,
    Trades,
    Liquidations,
    Kline { interval_sec: u32 },
}

/// Kline intervals with a directory name in the on-disk layout
pub const KLINE_BARS: [(u32, &str); 9] = [
    (60, "1m"),
    (300, "5m"),
    (900, "15m"),
    (1800, "30m"),
    (3600, "1h"),
    (7200, "2h"),
    (14400, "4h"),
    (28800, "8h"),
    (86400, "1d"),
];

impl DataKind {
    /// Loading cost in progress units
    pub fn load_weight(&self) -> u32 {
        match self {
            DataKind::Depth => 3,
            _ => 1,
        }
    }

    pub fn bar_name(interval_sec: u32) -> Option<&'static str> {
        KLINE_BARS
            .iter()
            .find(|(sec, _)| *sec == interval_sec)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Ticker => f.write_str("ticker"),
            DataKind::Depth => f.write_str("depth"),
            DataKind::Trades => f.write_str("trades"),
            DataKind::Liquidations => f.write_str("liquidations"),
            DataKind::Kline { interval_sec } => write!(f, "kline({}s)", interval_sec),
        }
    }
}

/// Closed time interval `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Range spanning whole UTC days, ending one millisecond before the day after `last_day`
    pub fn whole_days(first_day: DateTime<Utc>, last_day: DateTime<Utc>) -> Self {
        Self {
            start: first_day,
            end: last_day + Duration::days(1) - Duration::milliseconds(1),
        }
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    pub fn contains_time(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.end.format("%Y-%m-%d %H:%M:%S%.3f")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_spot() {
        let inst = Instrument::parse("btc_usdt").unwrap();
        assert_eq!(inst.inst_type, InstType::Spot);
        assert_eq!(inst.base, "btc");
        assert_eq!(inst.quote, "usdt");
        assert!(inst.margin_mode().is_none());
    }

    #[test]
    fn test_parse_swaps() {
        let usdt = Instrument::parse("eth_usdt_swap").unwrap();
        assert_eq!(usdt.margin_mode(), Some(MarginMode::Usdt));
        assert_eq!(usdt.margin_ccy(), "usdt");

        let coin = Instrument::parse("btc_usd_swap").unwrap();
        assert_eq!(coin.margin_mode(), Some(MarginMode::Coin));
        assert_eq!(coin.margin_ccy(), "btc");
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        assert!(Instrument::parse("btcusdt").is_err());
        assert!(Instrument::parse("btc_usd_240628").is_err());
        assert!(Instrument::parse("_usdt").is_err());
    }

    #[test]
    fn test_whole_days_range() {
        let d0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let d1 = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let range = TimeRange::whole_days(d0, d1);
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 1, 3, 23, 59, 59).unwrap() + Duration::milliseconds(999));

        let inner = TimeRange::new(d0 + Duration::hours(1), d1 + Duration::hours(23));
        assert!(range.contains(&inner));
        assert!(!inner.contains(&range));
    }

    #[test]
    fn test_bar_names() {
        assert_eq!(DataKind::bar_name(60), Some("1m"));
        assert_eq!(DataKind::bar_name(86400), Some("1d"));
        assert_eq!(DataKind::bar_name(45), None);
    }
}
