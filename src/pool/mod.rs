//! Unit pool
//!
//! Schedules units onto the executor with bounded concurrency and publishes
//! live status as they finish.

mod scheduler;
mod status;
mod strategy;

pub use scheduler::Pool;
pub use status::{StatusBoard, StatusEvent};
pub use strategy::{BatchStrategy, ContinuousStrategy, Strategy, StrategyKind, UnitJob};
