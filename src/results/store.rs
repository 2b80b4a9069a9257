//! Result store
//!
//! Ordered mapping from unit to its execution result. Slots are fixed at
//! creation in discovery order; each slot is written at most once, so batch
//! members record results concurrently without locking each other out.

use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::warn;

use crate::models::{ExecutionResult, Stats, Unit, UnitStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unit {0} is not part of this run")]
    UnknownUnit(Unit),

    #[error("result for unit {0} was already recorded")]
    AlreadyRecorded(Unit),
}

/// Results of one run, keyed by unit in discovery order
#[derive(Clone, Debug)]
pub struct ResultStore {
    units: Vec<Unit>,
    index: HashMap<Unit, usize>,
    slots: Vec<OnceLock<ExecutionResult>>,
}

impl ResultStore {
    /// Create empty slots for `units`; repeated units keep their first position
    pub fn new(units: Vec<Unit>) -> Self {
        let mut unique = Vec::with_capacity(units.len());
        let mut index = HashMap::with_capacity(units.len());

        for unit in units {
            if index.contains_key(&unit) {
                warn!("Ignoring duplicate unit {}", unit);
                continue;
            }
            index.insert(unit.clone(), unique.len());
            unique.push(unit);
        }

        let slots = unique.iter().map(|_| OnceLock::new()).collect();
        Self {
            units: unique,
            index,
            slots,
        }
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Record the result for its unit. Fails if the unit is unknown or
    /// already has a result.
    pub fn record(&self, result: ExecutionResult) -> Result<(), StoreError> {
        let Some(&idx) = self.index.get(&result.unit) else {
            return Err(StoreError::UnknownUnit(result.unit));
        };

        self.slots[idx]
            .set(result)
            .map_err(|rejected| StoreError::AlreadyRecorded(rejected.unit))
    }

    pub fn get(&self, unit: &Unit) -> Option<&ExecutionResult> {
        self.index.get(unit).and_then(|&idx| self.slots[idx].get())
    }

    /// Units that have no result yet
    pub fn missing(&self) -> Vec<Unit> {
        self.units
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.get().is_none())
            .map(|(unit, _)| unit.clone())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|slot| slot.get().is_some())
    }

    /// Recorded results in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.slots.iter().filter_map(|slot| slot.get())
    }

    /// Sum of every report's stats; a unit with only a fault adds one failure
    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        for result in self.iter() {
            match &result.report {
                Some(report) => stats += report.stats,
                None if result.fault.is_some() => stats.failed += 1,
                None => {}
            }
        }
        stats
    }

    /// Overall run verdict.
    ///
    /// Any failed or softfailed unit fails the run. Otherwise the run passed
    /// if any unit passed, else it is todo if any unit is todo, else skipped.
    /// A run without units passes.
    pub fn verdict(&self) -> UnitStatus {
        let statuses: Vec<UnitStatus> = self.iter().map(|r| r.status).collect();
        let any = |status: UnitStatus| statuses.contains(&status);

        if statuses.iter().any(|s| s.is_failure()) {
            UnitStatus::Failed
        } else if statuses.is_empty() || any(UnitStatus::Passed) || any(UnitStatus::Benched) {
            UnitStatus::Passed
        } else if any(UnitStatus::Todo) {
            UnitStatus::Todo
        } else {
            UnitStatus::Skipped
        }
    }

    /// Process exit code for this run
    pub fn exit_code(&self) -> i32 {
        if self.verdict().is_failure() {
            1
        } else {
            0
        }
    }
}
