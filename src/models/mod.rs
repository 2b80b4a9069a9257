//! Data models for isorun
//!
//! Units, their statuses, test reports and fault classifications.

mod fault;
mod report;
mod status;
mod unit;

pub use fault::{Diagnostic, Fault, Location, Severity};
pub use report::{BenchMetrics, ErrorInfo, OutcomeKind, Stats, TestOutcome, TestReport};
pub use status::UnitStatus;
pub use unit::{replay, ExecutionResult, LogBuffer, LogEntry, LogStream, Unit};
