// Accounting: contract positions, spot balances and NAV

pub mod balance;
pub mod position;
pub mod valuation;

pub use balance::{Balances, SpotAccount};
pub use position::{ContractPosition, DealOutcome, PositionDirection, ProfitRecord};
pub use valuation::{convert, nav, resolve_baseline, Baseline};
