//! Output formatting module
//!
//! Console and JSON run reports plus live progress.

mod formatter;
mod live;

pub use formatter::{OutputFormat, ResultFormatter};
pub use live::StatusPrinter;
