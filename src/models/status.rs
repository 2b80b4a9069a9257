//! Unit and test status
//!
//! A single status vocabulary is shared by live status, test outcomes,
//! reports and the run verdict.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle / outcome status of a unit or a single test
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    #[default]
    Pending,
    Running,
    Passed,
    Failed,
    Softfailed,
    Skipped,
    Todo,
    Benched,
}

impl UnitStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnitStatus::Pending => "◌",
            UnitStatus::Running => "⟳",
            UnitStatus::Passed => "✓",
            UnitStatus::Failed => "×",
            UnitStatus::Softfailed => "!",
            UnitStatus::Skipped => "-",
            UnitStatus::Todo => "□",
            UnitStatus::Benched => "⚡",
        }
    }

    /// ANSI color code used when rendering this status
    pub fn color(&self) -> &'static str {
        match self {
            UnitStatus::Passed => "32",
            UnitStatus::Failed | UnitStatus::Softfailed => "31",
            UnitStatus::Skipped | UnitStatus::Running => "33",
            UnitStatus::Todo => "34",
            UnitStatus::Benched => "36",
            UnitStatus::Pending => "90",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, UnitStatus::Pending | UnitStatus::Running)
    }

    /// Whether this status makes the process exit non-zero
    pub fn is_failure(&self) -> bool {
        matches!(self, UnitStatus::Failed | UnitStatus::Softfailed)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Running => "running",
            UnitStatus::Passed => "passed",
            UnitStatus::Failed => "failed",
            UnitStatus::Softfailed => "softfailed",
            UnitStatus::Skipped => "skipped",
            UnitStatus::Todo => "todo",
            UnitStatus::Benched => "benched",
        };
        f.write_str(name)
    }
}
