//! Test report models
//!
//! A `TestReport` is what a unit produces when it runs to completion:
//! one outcome per test or hook plus derived counters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;

use super::UnitStatus;

/// Outcome counters for a report or a whole run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub softfailed: usize,
    pub skipped: usize,
    pub todo: usize,
}

impl Stats {
    /// Count a single outcome status
    pub fn record(&mut self, status: UnitStatus) {
        match status {
            UnitStatus::Passed | UnitStatus::Benched => self.passed += 1,
            UnitStatus::Failed => self.failed += 1,
            UnitStatus::Softfailed => self.softfailed += 1,
            UnitStatus::Todo => self.todo += 1,
            // An outcome that never left pending/running did not run.
            UnitStatus::Skipped | UnitStatus::Pending | UnitStatus::Running => self.skipped += 1,
        }
        self.total += 1;
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.passed + self.failed + self.softfailed + self.skipped + self.todo
    }

    /// Share of `count` in the total, as a percentage
    pub fn percent(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (count as f64 / self.total as f64) * 100.0
        }
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.softfailed += other.softfailed;
        self.skipped += other.skipped;
        self.todo += other.todo;
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Soft: {} | Skip: {} | Todo: {}",
            self.total, self.passed, self.failed, self.softfailed, self.skipped, self.todo
        )
    }
}

/// Whether an outcome belongs to a test or a lifecycle hook
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    #[default]
    Test,
    Hook,
}

/// Error raised by a single test inside a unit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
}

/// Benchmark figures attached to a benched test
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchMetrics {
    pub throughput_median: Option<f64>,
    pub latency_median: Option<f64>,
    pub samples: u64,
}

/// Outcome of one test or hook
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub description: String,
    pub status: UnitStatus,
    #[serde(default)]
    pub kind: OutcomeKind,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
    #[serde(default)]
    pub bench: Option<BenchMetrics>,
}

impl TestOutcome {
    pub fn new(description: impl Into<String>, status: UnitStatus) -> Self {
        Self {
            description: description.into(),
            status,
            kind: OutcomeKind::Test,
            retries: 0,
            error: None,
            bench: None,
        }
    }

    pub fn hook(mut self) -> Self {
        self.kind = OutcomeKind::Hook;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>, stack: Option<String>) -> Self {
        self.error = Some(ErrorInfo {
            message: message.into(),
            stack,
        });
        self
    }

    pub fn with_bench(mut self, bench: BenchMetrics) -> Self {
        self.bench = Some(bench);
        self
    }
}

/// Wire shape of a report; stats are always recomputed from outcomes.
#[derive(Deserialize)]
struct RawReport {
    description: String,
    #[serde(default)]
    outcomes: Vec<TestOutcome>,
}

impl From<RawReport> for TestReport {
    fn from(raw: RawReport) -> Self {
        TestReport::new(raw.description, raw.outcomes)
    }
}

/// Report produced by a unit that ran to completion
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawReport")]
pub struct TestReport {
    pub description: String,
    pub status: UnitStatus,
    pub stats: Stats,
    pub outcomes: Vec<TestOutcome>,
}

impl TestReport {
    pub fn new(description: impl Into<String>, outcomes: Vec<TestOutcome>) -> Self {
        let mut stats = Stats::default();
        for outcome in &outcomes {
            stats.record(outcome.status);
        }

        Self {
            description: description.into(),
            status: derive_status(&outcomes),
            stats,
            outcomes,
        }
    }

    pub fn tests(&self) -> impl Iterator<Item = &TestOutcome> {
        self.outcomes.iter().filter(|o| o.kind == OutcomeKind::Test)
    }

    pub fn hooks(&self) -> impl Iterator<Item = &TestOutcome> {
        self.outcomes.iter().filter(|o| o.kind == OutcomeKind::Hook)
    }
}

/// Overall status of a set of outcomes.
///
/// Failures dominate soft failures; otherwise any pass wins over todo,
/// and todo wins over skipped. An empty report counts as passed.
fn derive_status(outcomes: &[TestOutcome]) -> UnitStatus {
    let any = |status: UnitStatus| outcomes.iter().any(|o| o.status == status);

    if any(UnitStatus::Failed) {
        UnitStatus::Failed
    } else if any(UnitStatus::Softfailed) {
        UnitStatus::Softfailed
    } else if outcomes.is_empty() || any(UnitStatus::Passed) || any(UnitStatus::Benched) {
        UnitStatus::Passed
    } else if any(UnitStatus::Todo) {
        UnitStatus::Todo
    } else {
        UnitStatus::Skipped
    }
}
