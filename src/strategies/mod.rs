// Built-in strategies

pub mod grid;

pub use grid::{GridSignal, GridStrategy};
