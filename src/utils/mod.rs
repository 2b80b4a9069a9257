//! Shared utilities
//!
//! Logging setup, timing and terminal styling.

mod logger;
mod style;
mod timer;

pub use logger::{init_logger, LogLevel};
pub use style::Style;
pub use timer::Timer;
