// Simulation Module
// Fill simulation for strategy signals during replay

pub mod execution_simulator;

pub use execution_simulator::{ExecutionSimulator, ExecutionStats, Fill, FillStatus};
