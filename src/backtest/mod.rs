// Backtest Module
// Replay driver, strategy interface and run outputs

pub mod chart;
pub mod context;
pub mod executor;
pub mod report;
pub mod strategy;

pub use chart::{ChartPoint, ChartRecorder, PointTag};
pub use context::{Context, DealRecord, ReplayState};
pub use executor::Executor;
pub use report::{BacktestReport, PositionSummary};
pub use strategy::Strategy;
