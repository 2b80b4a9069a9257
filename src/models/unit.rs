//! Units and their execution records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{Fault, TestReport, UnitStatus};
use crate::diagnostics::SourceMap;

/// Identity of one independently executable test module
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unit(String);

impl Unit {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path component, used when a unit has no report description
    pub fn file_name(&self) -> &str {
        Path::new(&self.0)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Unit {
    fn from(id: &str) -> Self {
        Unit::new(id)
    }
}

/// Output stream a log line was written to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// One line of output captured while a unit ran
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub stream: LogStream,
    pub text: String,
}

/// Private, append-only log sink for a single unit call
#[derive(Debug, Default)]
pub struct LogBuffer {
    entries: Mutex<Vec<LogEntry>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, stream: LogStream, text: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(LogEntry {
            stream,
            text: text.into(),
        });
    }

    /// Take every entry captured so far, in emission order
    pub fn take(&self) -> Vec<LogEntry> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *entries)
    }
}

/// Write captured log entries back to the streams they came from
pub fn replay(logs: &[LogEntry]) {
    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();

    for entry in logs {
        // Broken pipes while replaying are not worth failing the run over.
        let _ = match entry.stream {
            LogStream::Stdout => writeln!(out, "{}", entry.text),
            LogStream::Stderr => writeln!(err, "{}", entry.text),
        };
    }
}

/// Outcome record for one unit of a run
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionResult {
    pub unit: Unit,
    /// Terminal status as shown by live status and counted by the verdict
    pub status: UnitStatus,
    pub fault: Option<Fault>,
    pub report: Option<TestReport>,
    /// Wall-clock duration in seconds
    pub duration: f64,
    pub logs: Vec<LogEntry>,
    #[serde(skip)]
    pub source_map: Option<Arc<dyn SourceMap>>,
}

impl ExecutionResult {
    /// Result of a unit whose executor returned a report
    pub fn completed(unit: Unit, status: UnitStatus, report: TestReport, duration: f64) -> Self {
        Self {
            unit,
            status,
            fault: None,
            report: Some(report),
            duration,
            logs: Vec::new(),
            source_map: None,
        }
    }

    /// Result of a unit that faulted; always terminal `failed`
    pub fn faulted(unit: Unit, fault: Fault, duration: f64) -> Self {
        Self {
            unit,
            status: UnitStatus::Failed,
            fault: Some(fault),
            report: None,
            duration,
            logs: Vec::new(),
            source_map: None,
        }
    }

    pub fn with_logs(mut self, logs: Vec<LogEntry>) -> Self {
        self.logs = logs;
        self
    }

    pub fn with_source_map(mut self, source_map: Option<Arc<dyn SourceMap>>) -> Self {
        self.source_map = source_map;
        self
    }

    /// Report description, or the unit's file name when there is no report
    pub fn description(&self) -> &str {
        self.report
            .as_ref()
            .map(|r| r.description.as_str())
            .unwrap_or_else(|| self.unit.file_name())
    }
}
