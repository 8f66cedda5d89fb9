// Market Replay Library
//
// Deterministic backtesting: historical market data is merged into one
// time-ordered stream and replayed through a strategy, with simulated fills
// and exact position accounting.

pub mod backtest;
pub mod config;
pub mod data;
pub mod error;      // Unified error handling
pub mod ledger;
pub mod market;
pub mod progress;
pub mod simulation;
pub mod strategies;
pub mod types;

// Re-export error types
pub use error::{ReplayError, ReplayResult};

// Re-export configuration
pub use config::{Config, ConfigError, ExecutorConfig, GridConfig, LoggingConfig, OutputConfig, ReplayConfig};

// Re-export shared types
pub use types::{DataKind, InstType, Instrument, MarginMode, TimeRange};

// Re-export market data model
pub use market::{
    BookFill, Depth, DepthLevel, EventPayload, InstrumentRegistry, KlineUnit, MarketEvent, Side,
    Ticker, Trade, TradeTag,
};

// Re-export loading and sequencing
pub use data::{
    EnabledKinds, EventSequencer, EventStream, JsonlLoader, LoadRequest, MarketDataLoader,
    MemoryLoader, PriceSource,
};

// Re-export accounting
pub use ledger::{
    Balances, Baseline, ContractPosition, DealOutcome, PositionDirection, ProfitRecord, SpotAccount,
};

// Re-export execution simulation
pub use simulation::{ExecutionSimulator, ExecutionStats, Fill, FillStatus};

// Re-export backtest components
pub use backtest::{
    BacktestReport, ChartPoint, ChartRecorder, Context, DealRecord, Executor, PointTag,
    PositionSummary, ReplayState, Strategy,
};

pub use strategies::{GridSignal, GridStrategy};
