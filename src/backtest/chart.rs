// Chart data collected during a replay
// Rendering is left to external viewers; this only records series and deal marks

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointTag {
    #[default]
    None,
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    pub value: f64,
    #[serde(default, skip_serializing_if = "is_untagged")]
    pub tag: PointTag,
}

fn is_untagged(tag: &PointTag) -> bool {
    *tag == PointTag::None
}

/// Named value series plus free-form summary lines
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartRecorder {
    pub interval_ms: i64,
    series: BTreeMap<String, Vec<ChartPoint>>,
    info: Vec<String>,
}

impl ChartRecorder {
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms,
            ..Default::default()
        }
    }

    pub fn record(&mut self, series: &str, time: DateTime<Utc>, value: Decimal) {
        self.record_tagged(series, time, value, PointTag::None);
    }

    pub fn record_tagged(&mut self, series: &str, time: DateTime<Utc>, value: Decimal, tag: PointTag) {
        let point = ChartPoint {
            time,
            value: value.to_f64().unwrap_or(f64::NAN),
            tag,
        };
        self.series.entry(series.to_string()).or_default().push(point);
    }

    pub fn add_info(&mut self, line: impl Into<String>) {
        self.info.push(line.into());
    }

    pub fn series(&self, name: &str) -> Option<&[ChartPoint]> {
        self.series.get(name).map(Vec::as_slice)
    }

    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn info(&self) -> &[String] {
        &self.info
    }
}

/// Start of the chart bucket containing `time`
pub fn align_time(time: DateTime<Utc>, interval_ms: i64) -> DateTime<Utc> {
    if interval_ms <= 0 {
        return time;
    }
    let ms = time.timestamp_millis();
    let aligned = ms - ms.rem_euclid(interval_ms);
    Utc.timestamp_millis_opt(aligned).single().unwrap_or(time)
}
