//! Live run progress
//!
//! Follows a status board's event stream while the pool runs.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::models::{Unit, UnitStatus};
use crate::pool::{StatusBoard, StatusEvent};
use crate::utils::Style;

/// Logs unit transitions and a progress line whenever a group drains
pub struct StatusPrinter {
    board: Arc<StatusBoard>,
    style: Style,
}

impl StatusPrinter {
    pub fn new(board: Arc<StatusBoard>) -> Self {
        Self {
            board,
            style: Style::new(true),
        }
    }

    pub fn no_color(mut self) -> Self {
        self.style = Style::new(false);
        self
    }

    /// Consume events until the run finishes; returns completed units
    pub async fn follow(self, mut events: UnboundedReceiver<StatusEvent>) -> usize {
        while let Some(event) = events.recv().await {
            if event == StatusEvent::Finished {
                break;
            }
            if let Some(line) = self.handle(&event) {
                info!("{}", line);
            }
        }
        self.board.completed()
    }

    fn handle(&self, event: &StatusEvent) -> Option<String> {
        match event {
            StatusEvent::Transition { unit, status } => Some(self.transition(unit, *status)),
            StatusEvent::Drained => Some(self.progress()),
            StatusEvent::Finished => None,
        }
    }

    fn transition(&self, unit: &Unit, status: UnitStatus) -> String {
        format!(
            "{} {} {}",
            self.style.paint(status.color(), status.symbol()),
            unit.file_name(),
            self.style.gray(status.to_string())
        )
    }

    fn progress(&self) -> String {
        format!("{}/{} units done", self.board.completed(), self.board.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_reads_the_board() {
        let board = Arc::new(StatusBoard::new());
        board.reset(&[Unit::new("/t/a.js"), Unit::new("/t/b.js")]);
        board.set(&Unit::new("/t/a.js"), UnitStatus::Passed);
        let printer = StatusPrinter::new(board).no_color();

        let line = printer.handle(&StatusEvent::Transition {
            unit: Unit::new("/t/a.js"),
            status: UnitStatus::Passed,
        });
        assert_eq!(line.as_deref(), Some("✓ a.js passed"));
        assert_eq!(printer.handle(&StatusEvent::Drained).as_deref(), Some("1/2 units done"));
        assert_eq!(printer.handle(&StatusEvent::Finished), None);
    }

    #[test]
    fn test_follow_stops_at_finish_while_board_is_alive() {
        let (board, rx) = StatusBoard::channel();
        let board = Arc::new(board);
        board.reset(&[Unit::new("a"), Unit::new("b")]);
        board.set(&Unit::new("a"), UnitStatus::Failed);
        board.set(&Unit::new("b"), UnitStatus::Skipped);
        board.drained();
        board.finish();

        let printer = StatusPrinter::new(board.clone()).no_color();
        let done = tokio_test::block_on(printer.follow(rx));
        assert_eq!(done, 2);
    }
}
