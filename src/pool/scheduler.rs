//! Unit scheduler
//!
//! Runs every unit through transform and executor under a concurrency
//! bound and records exactly one result per unit. Unit failures of any kind
//! are captured at the unit boundary; they never abort the run.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::strategy::{BatchStrategy, Strategy, UnitJob};
use super::StatusBoard;
use crate::diagnostics::SourceMap;
use crate::executor::{Context, ExecOutcome, ExecRequest, Executor, SourceTransform};
use crate::models::{ExecutionResult, Fault, LogBuffer, Unit, UnitStatus};
use crate::results::ResultStore;
use crate::utils::Timer;

/// Bounded-concurrency test unit pool
pub struct Pool {
    transform: Arc<dyn SourceTransform>,
    executor: Arc<dyn Executor>,
    strategy: Arc<dyn Strategy>,
    board: Arc<StatusBoard>,
    context: Arc<Context>,
    concurrency: usize,
    timeout: Duration,
}

impl Pool {
    pub fn new(transform: Arc<dyn SourceTransform>, executor: Arc<dyn Executor>) -> Self {
        Self {
            transform,
            executor,
            strategy: Arc::new(BatchStrategy),
            board: Arc::new(StatusBoard::new()),
            context: Arc::new(Context::new()),
            concurrency: 4,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        if concurrency == 0 {
            warn!("Concurrency of 0 requested, using 1");
        }
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_status_board(mut self, board: Arc<StatusBoard>) -> Self {
        self.board = board;
        self
    }

    pub fn with_context(mut self, context: Arc<Context>) -> Self {
        self.context = context;
        self
    }

    /// Run all units and return their results in discovery order
    pub async fn run(&self, units: Vec<Unit>) -> ResultStore {
        let store = Arc::new(ResultStore::new(units));
        let units: Arc<Vec<Unit>> = Arc::new(store.units().to_vec());
        self.board.reset(&units);

        info!(
            "Running {} unit(s), {} at a time ({} strategy, {}ms budget)",
            units.len(),
            self.concurrency,
            self.strategy.name(),
            self.timeout.as_millis()
        );

        let task = Arc::new(UnitTask {
            transform: self.transform.clone(),
            executor: self.executor.clone(),
            board: self.board.clone(),
            context: self.context.clone(),
            store: store.clone(),
            timeout: self.timeout,
        });

        let job_units = units.clone();
        let job: UnitJob = Arc::new(move |i: usize| {
            let task = task.clone();
            let unit = job_units[i].clone();
            async move { task.run_guarded(unit).await }.boxed()
        });

        let timer = Timer::start("run");
        self.strategy
            .schedule(units.len(), self.concurrency, job, self.board.clone())
            .await;

        for unit in store.missing() {
            error!("Unit {} ended without a result", unit);
            record_lost(
                &store,
                &self.board,
                &unit,
                "Unit task was aborted before recording a result",
            );
        }
        self.board.finish();

        let elapsed = timer.stop();
        info!(
            "Run finished in {}ms: {}",
            elapsed.as_millis(),
            store.stats()
        );

        Arc::try_unwrap(store).unwrap_or_else(|shared| (*shared).clone())
    }
}

/// Shared state for running a single unit
struct UnitTask {
    transform: Arc<dyn SourceTransform>,
    executor: Arc<dyn Executor>,
    board: Arc<StatusBoard>,
    context: Arc<Context>,
    store: Arc<ResultStore>,
    timeout: Duration,
}

impl UnitTask {
    /// Run the unit; a panic is recorded as a runtime fault for this unit
    async fn run_guarded(&self, unit: Unit) {
        if AssertUnwindSafe(self.run(unit.clone())).catch_unwind().await.is_err() {
            error!("Unit task for {} panicked", unit);
            record_lost(
                &self.store,
                &self.board,
                &unit,
                "Unit task panicked before recording a result",
            );
        }
    }

    async fn run(&self, unit: Unit) {
        let timer = Timer::start(unit.as_str());
        let logs = LogBuffer::new();
        let mut source_map: Option<Arc<dyn SourceMap>> = None;

        let outcome = match self.transform.transform(&unit).await {
            Ok(transformed) => {
                source_map = transformed.source_map.clone();
                self.executor
                    .execute(ExecRequest {
                        unit: &unit,
                        code: &transformed.code,
                        context: self.context.clone(),
                        timeout: self.timeout,
                        logs: &logs,
                    })
                    .await
            }
            Err(fault) => Err(fault),
        };

        let duration = timer.stop().as_secs_f64();
        let result = match outcome {
            Ok(ExecOutcome {
                succeeded,
                report: Some(report),
            }) => {
                let status = if succeeded {
                    report.status
                } else {
                    UnitStatus::Failed
                };
                ExecutionResult::completed(unit.clone(), status, report, duration)
            }
            Ok(ExecOutcome { report: None, .. }) => ExecutionResult::faulted(
                unit.clone(),
                Fault::runtime("Unit finished without producing a report", ""),
                duration,
            ),
            Err(fault) => {
                warn!("{} faulted ({}): {}", unit, fault.kind(), fault);
                ExecutionResult::faulted(unit.clone(), fault, duration)
            }
        };

        let status = result.status;
        let result = result.with_logs(logs.take()).with_source_map(source_map);

        if let Err(e) = self.store.record(result) {
            error!("{}", e);
        }
        self.board.set(&unit, status);
    }
}

/// Record a fault for a unit whose task ended without recording a result
fn record_lost(store: &ResultStore, board: &StatusBoard, unit: &Unit, message: &str) {
    let fault = Fault::runtime(message, "");
    match store.record(ExecutionResult::faulted(unit.clone(), fault, 0.0)) {
        Ok(()) => board.set(unit, UnitStatus::Failed),
        Err(e) => error!("{}", e),
    }
}
