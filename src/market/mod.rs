// Market data model: records, depth snapshots and replay events

pub mod depth;
pub mod event;
pub mod records;

pub use depth::{BookFill, Depth, DepthLevel};
pub use event::{EventPayload, InstrumentRegistry, MarketEvent};
pub use records::{KlineUnit, Side, Ticker, Trade, TradeTag};
