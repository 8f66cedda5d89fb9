// Configuration management for market replay runs

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::data::{EnabledKinds, LoadRequest};
use crate::types::{DataKind, Instrument, TimeRange};

/// Fee rates and chart cadence used by the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub chart_interval_ms: i64,
    pub spot_maker_fee: Decimal,
    pub spot_taker_fee: Decimal,
    pub contract_maker_fee: Decimal,
    pub contract_taker_fee: Decimal,
    /// Log every open and full close of contract positions
    pub trace_ledger: bool,
}

fn default_chart_interval_ms() -> i64 {
    60_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            chart_interval_ms: default_chart_interval_ms(),
            spot_maker_fee: dec!(0.0008),
            spot_taker_fee: dec!(0.001),
            contract_maker_fee: dec!(0.0002),
            contract_taker_fee: dec!(0.0005),
            trace_ledger: false,
        }
    }
}

/// What to replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub exchange: String,
    pub instruments: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub data_dir: String,
    pub kinds: EnabledKinds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kline_interval_sec: Option<u32>,
    /// NAV currency; defaults to the only initial balance currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_ccy: Option<String>,
}

/// Parameters of the built-in grid strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub inst_id: String,
    pub levels: usize,
    /// Distance between levels as a fraction of the center price
    pub spacing: Decimal,
    pub order_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_output_dir() -> String {
    "visual".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub executor: ExecutorConfig,
    pub replay: ReplayConfig,
    #[serde(default)]
    pub balances: BTreeMap<String, Decimal>,
    pub grid: GridConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default();
        let end = Utc.with_ymd_and_hms(2024, 1, 7, 23, 59, 59).single().unwrap_or_default();
        Self {
            executor: ExecutorConfig::default(),
            replay: ReplayConfig {
                exchange: "okx".to_string(),
                instruments: vec!["btc_usdt_swap".to_string()],
                start,
                end,
                data_dir: "data".to_string(),
                kinds: EnabledKinds {
                    ticker: true,
                    ..Default::default()
                },
                kline_interval_sec: None,
                baseline_ccy: None,
            },
            balances: BTreeMap::from([("usdt".to_string(), dec!(10000))]),
            grid: GridConfig {
                inst_id: "btc_usdt_swap".to_string(),
                levels: 5,
                spacing: dec!(0.01),
                order_amount: dec!(0.01),
            },
            logging: LoggingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            println!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let replay = &self.replay;

        if replay.exchange.is_empty() {
            return Err(ConfigError::Validation("exchange must not be empty".to_string()));
        }

        if replay.instruments.is_empty() {
            return Err(ConfigError::Validation("at least one instrument is required".to_string()));
        }

        for inst_id in &replay.instruments {
            Instrument::parse(inst_id)
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
        }

        if replay.start >= replay.end {
            return Err(ConfigError::Validation("start must be before end".to_string()));
        }

        if !replay.kinds.any() {
            return Err(ConfigError::Validation("enable at least one data kind".to_string()));
        }

        if replay.kinds.kline {
            match replay.kline_interval_sec {
                Some(sec) if DataKind::bar_name(sec).is_some() => {}
                Some(sec) => {
                    return Err(ConfigError::Validation(format!(
                        "unsupported kline interval: {}s",
                        sec
                    )))
                }
                None => {
                    return Err(ConfigError::Validation(
                        "kline_interval_sec is required when klines are enabled".to_string(),
                    ))
                }
            }
        }

        let fees = [
            self.executor.spot_maker_fee,
            self.executor.spot_taker_fee,
            self.executor.contract_maker_fee,
            self.executor.contract_taker_fee,
        ];
        if fees.iter().any(|f| f.is_sign_negative() && !f.is_zero()) {
            return Err(ConfigError::Validation("fee rates must be non-negative".to_string()));
        }

        if self.executor.chart_interval_ms <= 0 {
            return Err(ConfigError::Validation("chart_interval_ms must be positive".to_string()));
        }

        if self.grid.levels == 0 {
            return Err(ConfigError::Validation("grid levels must be greater than 0".to_string()));
        }

        if self.grid.spacing <= Decimal::ZERO || self.grid.spacing >= Decimal::ONE {
            return Err(ConfigError::Validation("grid spacing must be between 0 and 1".to_string()));
        }

        if self.grid.order_amount <= Decimal::ZERO {
            return Err(ConfigError::Validation("grid order_amount must be positive".to_string()));
        }

        if !replay.instruments.contains(&self.grid.inst_id) {
            return Err(ConfigError::Validation(format!(
                "grid instrument {} is not in the replay instruments",
                self.grid.inst_id
            )));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Loader request described by the `[replay]` section
    pub fn load_request(&self) -> LoadRequest {
        LoadRequest {
            exchange: self.replay.exchange.clone(),
            inst_ids: self.replay.instruments.clone(),
            range: TimeRange::new(self.replay.start, self.replay.end),
            kinds: self.replay.kinds,
            kline_interval_sec: self.replay.kline_interval_sec,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
