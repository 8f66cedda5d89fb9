// Strategy interface driven by the replay executor

use super::chart::ChartRecorder;
use super::context::Context;
use crate::error::ReplayResult;
use crate::market::{Depth, KlineUnit, Ticker, Trade};

/// A strategy reacts to market events and trades through the `Context`.
///
/// Callbacks run synchronously inside the replay loop. Returning an error
/// aborts the run; state up to that event stays valid.
pub trait Strategy {
    /// Short name used for output directories and reports
    fn class(&self) -> &str;

    fn on_ticker(&mut self, _inst_id: &str, _ticker: &Ticker, _ctx: &mut dyn Context) -> ReplayResult<()> {
        Ok(())
    }

    fn on_depth(&mut self, _inst_id: &str, _depth: &Depth, _ctx: &mut dyn Context) -> ReplayResult<()> {
        Ok(())
    }

    fn on_trade(&mut self, _inst_id: &str, _trade: &Trade, _ctx: &mut dyn Context) -> ReplayResult<()> {
        Ok(())
    }

    fn on_kline_unit(&mut self, _inst_id: &str, _kline: &KlineUnit, _ctx: &mut dyn Context) -> ReplayResult<()> {
        Ok(())
    }

    /// Liquidation trades; never called for regular trades
    fn on_liquidation(&mut self, _inst_id: &str, _trade: &Trade, _ctx: &mut dyn Context) -> ReplayResult<()> {
        Ok(())
    }

    fn on_visual_init(&mut self, _chart: &mut ChartRecorder, _ctx: &dyn Context) {}

    /// Called once per chart interval
    fn on_visual_refresh(&mut self, _chart: &mut ChartRecorder, _ctx: &dyn Context) {}

    fn on_visual_save(&mut self, _chart: &mut ChartRecorder, _ctx: &dyn Context) {}
}
