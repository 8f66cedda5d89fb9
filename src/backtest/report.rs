// Backtest summary written at the end of a replay

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::context::ReplayState;
use crate::ledger::{Balances, Baseline, ContractPosition, PositionDirection, ProfitRecord};
use crate::simulation::ExecutionStats;

/// Ledger snapshot of one contract position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub inst_id: String,
    pub margin_ccy: String,
    pub direction: PositionDirection,
    pub position: Decimal,
    pub avg_open_price: Decimal,
    pub avg_close_price: Decimal,
    pub realized_profit: Decimal,
    pub unrealized_profit: Decimal,
    pub total_fee: Decimal,
    pub total_profit: Decimal,
    pub last_position_profit: Decimal,
    pub buy_avg_price: Decimal,
    pub sell_avg_price: Decimal,
    pub total_volume: Decimal,
    pub clear_count: u32,
    pub profit_records: Vec<ProfitRecord>,
}

impl From<&ContractPosition> for PositionSummary {
    fn from(p: &ContractPosition) -> Self {
        Self {
            inst_id: p.inst_id().to_string(),
            margin_ccy: p.margin_ccy().to_string(),
            direction: p.direction(),
            position: p.position(),
            avg_open_price: p.avg_open_price(),
            avg_close_price: p.avg_close_price(),
            realized_profit: p.realized_profit(),
            unrealized_profit: p.unrealized_profit(),
            total_fee: p.total_fee(),
            total_profit: p.total_profit(),
            last_position_profit: p.last_position_profit(),
            buy_avg_price: p.buy_avg_price(),
            sell_avg_price: p.sell_avg_price(),
            total_volume: p.total_volume(),
            clear_count: p.clear_count(),
            profit_records: p.profit_records().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub strategy: String,
    pub exchange: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_secs: i64,
    pub events: usize,
    pub baseline: Option<Baseline>,
    pub final_nav: Decimal,
    pub initial_balances: Balances,
    pub balances: Balances,
    pub positions: Vec<PositionSummary>,
    pub deals: usize,
    pub execution: ExecutionStats,
}

impl BacktestReport {
    pub(crate) fn build(
        strategy: &str,
        exchange: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        events: usize,
        state: &ReplayState,
    ) -> Self {
        Self {
            strategy: strategy.to_string(),
            exchange: exchange.to_string(),
            start,
            end,
            duration_secs: (end - start).num_seconds(),
            events,
            baseline: state.baseline().cloned(),
            final_nav: state.nav(),
            initial_balances: state.initial_balances().clone(),
            balances: state.balances().clone(),
            positions: state.positions().map(PositionSummary::from).collect(),
            deals: state.deals().len(),
            execution: state.execution_stats(),
        }
    }

    /// Realized + unrealized - fees across all contract positions, per margin currency
    pub fn contract_profit(&self, margin_ccy: &str) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.margin_ccy == margin_ccy)
            .map(|p| p.total_profit)
            .sum()
    }
}
