//! Serializable run summary

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ResultStore;
use crate::models::{ExecutionResult, Stats, UnitStatus};

/// Snapshot of a finished run, suitable for JSON output
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    /// Timestamp when the run started
    pub started_at: DateTime<Utc>,

    /// Timestamp when the last unit finished
    pub finished_at: DateTime<Utc>,

    pub verdict: UnitStatus,

    pub stats: Stats,

    /// Per-unit results in discovery order
    pub units: Vec<&'a ExecutionResult>,
}

impl<'a> RunSummary<'a> {
    pub fn new(store: &'a ResultStore, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at,
            verdict: store.verdict(),
            stats: store.stats(),
            units: store.iter().collect(),
        }
    }

    /// Run duration in seconds
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fault, Unit};
    use chrono::Duration;

    #[test]
    fn test_summary_json() {
        let store = ResultStore::new(vec!["/t/a.js".into()]);
        store
            .record(ExecutionResult::faulted(
                Unit::new("/t/a.js"),
                Fault::Timeout { budget_ms: 10 },
                0.01,
            ))
            .unwrap();

        let start = Utc::now();
        let summary = RunSummary::new(&store, start, start + Duration::milliseconds(1500));
        assert!((summary.elapsed_secs() - 1.5).abs() < f64::EPSILON);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["verdict"], "failed");
        assert_eq!(json["stats"]["failed"], 1);
        assert_eq!(json["units"][0]["unit"], "/t/a.js");
        assert_eq!(json["units"][0]["fault"]["kind"], "timeout");
        assert!(json["units"][0]["report"].is_null());
    }
}
