//! Live unit status
//!
//! A shared board of per-unit statuses plus an event stream for display
//! consumers. Transition events arrive in completion order.

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::models::{Unit, UnitStatus};

/// Event published to live-status consumers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusEvent {
    /// A unit reached a new status
    Transition { unit: Unit, status: UnitStatus },
    /// A group of units finished; a good moment to repaint
    Drained,
    /// The run is over; nothing follows
    Finished,
}

/// Concurrency-safe status map shared by the pool and its observers
#[derive(Debug, Default)]
pub struct StatusBoard {
    statuses: DashMap<Unit, UnitStatus>,
    events: Option<mpsc::UnboundedSender<StatusEvent>>,
}

impl StatusBoard {
    /// A board with no event subscriber
    pub fn new() -> Self {
        Self::default()
    }

    /// A board together with the receiving end of its event stream
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let board = Self {
            statuses: DashMap::new(),
            events: Some(tx),
        };
        (board, rx)
    }

    /// Mark units pending without emitting events
    pub fn reset(&self, units: &[Unit]) {
        self.statuses.clear();
        for unit in units {
            self.statuses.insert(unit.clone(), UnitStatus::Pending);
        }
    }

    /// Set a unit's status and publish the transition
    pub fn set(&self, unit: &Unit, status: UnitStatus) {
        self.statuses.insert(unit.clone(), status);
        self.publish(StatusEvent::Transition {
            unit: unit.clone(),
            status,
        });
    }

    /// Units tracked in the current run
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// Units that reached a terminal status
    pub fn completed(&self) -> usize {
        self.statuses
            .iter()
            .filter(|entry| entry.value().is_terminal())
            .count()
    }

    pub fn drained(&self) {
        self.publish(StatusEvent::Drained);
    }

    pub fn finish(&self) {
        self.publish(StatusEvent::Finished);
    }

    fn publish(&self, event: StatusEvent) {
        if let Some(tx) = &self.events {
            // A consumer that went away is not the pool's concern.
            let _ = tx.send(event);
        }
    }
}
