//! Scheduling strategies
//!
//! A strategy decides when each unit job starts, never running more than
//! `limit` at once. Jobs record their own results; a strategy only spawns,
//! awaits and signals when a group has drained.

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use super::StatusBoard;

/// Runs the unit at the given index to a terminal state
pub type UnitJob = Arc<dyn Fn(usize) -> BoxFuture<'static, ()> + Send + Sync>;

#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run jobs `0..count` with at most `limit` (≥ 1) in flight
    async fn schedule(&self, count: usize, limit: usize, job: UnitJob, board: Arc<StatusBoard>);
}

/// Consecutive batches of `limit` units, each fully drained before the next
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchStrategy;

#[async_trait]
impl Strategy for BatchStrategy {
    fn name(&self) -> &'static str {
        "batch"
    }

    async fn schedule(&self, count: usize, limit: usize, job: UnitJob, board: Arc<StatusBoard>) {
        let indices: Vec<usize> = (0..count).collect();

        for (n, batch) in indices.chunks(limit.max(1)).enumerate() {
            debug!("Starting batch {} with {} unit(s)", n + 1, batch.len());

            let handles: Vec<_> = batch.iter().map(|&i| tokio::spawn(job(i))).collect();
            for joined in join_all(handles).await {
                if let Err(e) = joined {
                    error!("Unit task aborted: {}", e);
                }
            }

            board.drained();
        }
    }
}

/// Semaphore-bounded pool: a finished unit's slot is refilled immediately
#[derive(Clone, Copy, Debug, Default)]
pub struct ContinuousStrategy;

#[async_trait]
impl Strategy for ContinuousStrategy {
    fn name(&self) -> &'static str {
        "continuous"
    }

    async fn schedule(&self, count: usize, limit: usize, job: UnitJob, board: Arc<StatusBoard>) {
        let limit = limit.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let finished = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..count)
            .map(|i| {
                let semaphore = semaphore.clone();
                let finished = finished.clone();
                let board = board.clone();
                let job = job.clone();

                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    job(i).await;

                    if (finished.fetch_add(1, Ordering::SeqCst) + 1) % limit == 0 {
                        board.drained();
                    }
                })
            })
            .collect();

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!("Unit task aborted: {}", e);
            }
        }

        if finished.load(Ordering::SeqCst) % limit != 0 || count == 0 {
            board.drained();
        }
    }
}

/// Strategy selected by name in configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Batch,
    Continuous,
}

impl StrategyKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "batch" => Some(StrategyKind::Batch),
            "continuous" | "pool" => Some(StrategyKind::Continuous),
            _ => None,
        }
    }

    pub fn build(self) -> Arc<dyn Strategy> {
        match self {
            StrategyKind::Batch => Arc::new(BatchStrategy),
            StrategyKind::Continuous => Arc::new(ContinuousStrategy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::StatusEvent;
    use futures::FutureExt;
    use std::sync::Mutex;
    use std::time::Duration;

    fn recording_job(order: Arc<Mutex<Vec<usize>>>) -> UnitJob {
        Arc::new(move |i: usize| {
            let order = order.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                order.lock().unwrap().push(i);
            }
            .boxed()
        })
    }

    fn drained_count(rx: &mut tokio::sync::mpsc::UnboundedReceiver<StatusEvent>) -> usize {
        let mut drained = 0;
        while let Ok(event) = rx.try_recv() {
            if event == StatusEvent::Drained {
                drained += 1;
            }
        }
        drained
    }

    #[tokio::test]
    async fn test_batch_drains_per_batch() {
        let (board, mut rx) = StatusBoard::channel();
        let order = Arc::new(Mutex::new(Vec::new()));

        BatchStrategy
            .schedule(7, 3, recording_job(order.clone()), Arc::new(board))
            .await;

        assert_eq!(order.lock().unwrap().len(), 7);
        assert_eq!(drained_count(&mut rx), 3);
    }

    #[tokio::test]
    async fn test_continuous_runs_everything() {
        let (board, mut rx) = StatusBoard::channel();
        let order = Arc::new(Mutex::new(Vec::new()));

        ContinuousStrategy
            .schedule(5, 2, recording_job(order.clone()), Arc::new(board))
            .await;

        let mut seen = order.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        // drained after 2, after 4, and once more for the remainder
        assert_eq!(drained_count(&mut rx), 3);
    }

    #[test]
    fn test_strategy_kind_from_str() {
        assert_eq!(StrategyKind::from_str("Batch"), Some(StrategyKind::Batch));
        assert_eq!(StrategyKind::from_str("pool"), Some(StrategyKind::Continuous));
        assert_eq!(StrategyKind::from_str("random"), None);
        assert_eq!(StrategyKind::Continuous.build().name(), "continuous");
    }
}
