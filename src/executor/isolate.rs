//! Isolation executor contract
//!
//! An executor runs one unit's transformed code in a fresh environment.
//! Implementations must not share mutable state between calls, must abort
//! and return `Fault::Timeout` once the budget elapses, and must report
//! uncaught failures as `Fault::Runtime`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::Context;
use crate::models::{Fault, LogBuffer, TestReport, Unit};

/// Everything an executor needs for one call
pub struct ExecRequest<'a> {
    pub unit: &'a Unit,
    pub code: &'a str,
    pub context: Arc<Context>,
    pub timeout: Duration,
    /// Private sink for output the unit emits
    pub logs: &'a LogBuffer,
}

/// Result of a call that did not fault
#[derive(Clone, Debug, PartialEq)]
pub struct ExecOutcome {
    pub succeeded: bool,
    pub report: Option<TestReport>,
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: ExecRequest<'_>) -> Result<ExecOutcome, Fault>;
}
