// JSON-lines loader over a per-day directory tree
//
//   <root>/tickers/<ex>/<inst>/<YYYY-MM-DD>.jsonl
//   <root>/depth/<ex>/<inst>/<YYYY-MM-DD>.jsonl
//   <root>/trades/<ex>/<inst>/<YYYY-MM-DD>.jsonl
//   <root>/liquidation/<ex>/<inst>/<YYYY-MM-DD>.jsonl
//   <root>/klines/<ex>/<bar>/<inst>/<YYYY-MM-DD>.jsonl

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::MarketDataLoader;
use crate::error::ReplayResult;
use crate::market::{Depth, EventPayload, KlineUnit, Ticker, Trade};
use crate::types::{DataKind, TimeRange};

const FILE_EXT: &str = "jsonl";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Loader reading `<date>.jsonl` files, one record per line
#[derive(Debug, Clone)]
pub struct JsonlLoader {
    root: PathBuf,
}

impl JsonlLoader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one subdirectory per instrument, `None` for an unknown kline bar
    fn kind_dir(&self, exchange: &str, kind: DataKind) -> Option<PathBuf> {
        let dir = match kind {
            DataKind::Ticker => self.root.join("tickers").join(exchange),
            DataKind::Depth => self.root.join("depth").join(exchange),
            DataKind::Trades => self.root.join("trades").join(exchange),
            DataKind::Liquidations => self.root.join("liquidation").join(exchange),
            DataKind::Kline { interval_sec } => {
                let bar = DataKind::bar_name(interval_sec)?;
                self.root.join("klines").join(exchange).join(bar)
            }
        };
        Some(dir)
    }

    fn inst_dir(&self, exchange: &str, inst_id: &str, kind: DataKind) -> Option<PathBuf> {
        self.kind_dir(exchange, kind).map(|d| d.join(inst_id))
    }

    /// Path of the file for one day
    pub fn day_file(&self, exchange: &str, inst_id: &str, kind: DataKind, day: NaiveDate) -> Option<PathBuf> {
        self.inst_dir(exchange, inst_id, kind)
            .map(|d| d.join(format!("{}.{}", day.format(DATE_FORMAT), FILE_EXT)))
    }

    fn day_files(dir: &Path) -> ReplayResult<Vec<NaiveDate>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut days = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match NaiveDate::parse_from_str(stem, DATE_FORMAT) {
                Ok(day) => days.push(day),
                Err(_) => debug!(path = %path.display(), "skipping file without a date name"),
            }
        }
        days.sort();
        Ok(days)
    }

    fn decode(kind: DataKind, line: &str) -> ReplayResult<EventPayload> {
        let payload = match kind {
            DataKind::Ticker => EventPayload::Ticker(serde_json::from_str::<Ticker>(line)?),
            DataKind::Depth => EventPayload::Depth(serde_json::from_str::<Depth>(line)?),
            DataKind::Trades | DataKind::Liquidations => {
                EventPayload::Trade(serde_json::from_str::<Trade>(line)?)
            }
            DataKind::Kline { .. } => EventPayload::Kline(serde_json::from_str::<KlineUnit>(line)?),
        };
        Ok(payload)
    }
}

fn midnight(day: NaiveDate) -> Option<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt))
}

impl MarketDataLoader for JsonlLoader {
    fn instruments(&self, exchange: &str, kind: DataKind) -> ReplayResult<Vec<String>> {
        let Some(dir) = self.kind_dir(exchange, kind) else {
            return Ok(Vec::new());
        };
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut insts = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.contains('_') {
                    insts.push(name.to_string());
                }
            }
        }
        insts.sort();
        Ok(insts)
    }

    fn time_range(
        &self,
        exchange: &str,
        inst_id: &str,
        kind: DataKind,
    ) -> ReplayResult<Option<TimeRange>> {
        let Some(dir) = self.inst_dir(exchange, inst_id, kind) else {
            return Ok(None);
        };
        let days = Self::day_files(&dir)?;
        let range = match (days.first(), days.last()) {
            (Some(first), Some(last)) => midnight(*first)
                .zip(midnight(*last))
                .map(|(start, end)| TimeRange::whole_days(start, end)),
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
        let first_day = range.start.date_naive();
        let last_day = range.end.date_naive();
        let total_days = (last_day - first_day).num_days().max(0) as usize + 1;

        let mut records = Vec::new();
        let mut day = first_day;
        for i in 0..total_days {
            if let Some(path) = self.day_file(exchange, inst_id, kind, day) {
                if path.is_file() {
                    let reader = BufReader::new(File::open(&path)?);
                    for line in reader.lines() {
                        let line = line?;
                        if line.trim().is_empty() {
                            continue;
                        }
                        let payload = Self::decode(kind, &line)?;
                        if range.contains_time(payload.time()) {
                            records.push(payload);
                        }
                    }
                } else if kind == DataKind::Liquidations {
                    debug!(path = %path.display(), "no liquidations recorded for day");
                } else {
                    warn!(path = %path.display(), "⚠️  missing day file inside covered range");
                }
            }

            progress(i + 1, total_days);
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        records.sort_by_key(|p| p.time());
        Ok(records)
    }
}
