//! Bounded-concurrency batch execution with optional fail-fast.
//!
//! Tasks are futures driven together on the caller's task; a semaphore caps
//! how many are past their admission point at once. Results come back in
//! submission order regardless of completion order.

use crate::error::{GeopinError, Result};
use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Per-batch execution options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BatchOptions {
    /// Stop admitting new tasks after the first failure
    #[serde(default)]
    pub fail_fast: bool,
    /// Lower the controller's limit for this batch (clamped to it, must be
    /// at least 1)
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

impl BatchOptions {
    pub fn fail_fast() -> Self {
        Self {
            fail_fast: true,
            max_concurrency: None,
        }
    }

    /// # Errors
    ///
    /// `InvalidInput` when `max_concurrency` is `Some(0)`.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == Some(0) {
            return Err(GeopinError::InvalidInput(
                "Batch max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why a task produced no value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError<E> {
    #[error("{0}")]
    Failed(E),
    /// Never started because an earlier task failed under fail-fast.
    #[error("stopped due to previous error")]
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome<T, E> {
    /// Position of the task in the submitted batch
    pub index: usize,
    pub result: std::result::Result<T, TaskError<E>>,
}

/// Results of one batch, in submission order.
#[derive(Debug, Clone)]
pub struct BatchReport<T, E> {
    pub results: Vec<TaskOutcome<T, E>>,
    pub successful: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl<T, E> BatchReport<T, E> {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Successful values only, in submission order.
    pub fn into_values(self) -> Vec<T> {
        self.results
            .into_iter()
            .filter_map(|outcome| outcome.result.ok())
            .collect()
    }

    /// Transform successful values, leaving errors and timing untouched.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> BatchReport<U, E> {
        BatchReport {
            results: self
                .results
                .into_iter()
                .map(|outcome| TaskOutcome {
                    index: outcome.index,
                    result: outcome.result.map(&mut f),
                })
                .collect(),
            successful: self.successful,
            failed: self.failed,
            duration: self.duration,
        }
    }
}

/// Runs batches of async tasks with at most `max_concurrency` in flight.
#[derive(Debug, Clone)]
pub struct ConcurrencyController {
    max_concurrency: usize,
}

impl ConcurrencyController {
    /// # Errors
    ///
    /// `InvalidConfig` when `max_concurrency` is zero.
    pub fn new(max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(GeopinError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self { max_concurrency })
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    fn effective_limit(&self, options: &BatchOptions) -> Result<usize> {
        options.validate()?;
        Ok(options
            .max_concurrency
            .map_or(self.max_concurrency, |n| n.min(self.max_concurrency)))
    }

    /// Run every task and collect one outcome per task.
    ///
    /// With `fail_fast`, the first failure stops tasks that have not yet
    /// been admitted; they report [`TaskError::Stopped`]. Tasks already
    /// running are left to finish.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the options ask for a zero limit. No task runs.
    ///
    /// ```rust
    /// use geopin::concurrency::{BatchOptions, ConcurrencyController};
    ///
    /// # tokio_test::block_on(async {
    /// let controller = ConcurrencyController::new(2)?;
    /// let tasks: Vec<_> = (0..4)
    ///     .map(|i| move || async move { Ok::<_, String>(i * 10) })
    ///     .collect();
    ///
    /// let report = controller.run(tasks, BatchOptions::default()).await?;
    /// assert_eq!(report.successful, 4);
    /// assert_eq!(report.into_values(), vec![0, 10, 20, 30]);
    /// # Ok::<(), geopin::GeopinError>(())
    /// # });
    /// ```
    pub async fn run<T, E, F, Fut>(
        &self,
        tasks: Vec<F>,
        options: BatchOptions,
    ) -> Result<BatchReport<T, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let limit = self.effective_limit(&options)?;
        let started = Instant::now();
        let semaphore = Semaphore::new(limit);
        let stopped = AtomicBool::new(false);

        let pending = tasks.into_iter().enumerate().map(|(index, task)| {
            let semaphore = &semaphore;
            let stopped = &stopped;
            async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) if !stopped.load(Ordering::SeqCst) => match task().await {
                        Ok(value) => Ok(value),
                        Err(e) => {
                            if options.fail_fast {
                                stopped.store(true, Ordering::SeqCst);
                            }
                            Err(TaskError::Failed(e))
                        }
                    },
                    _ => Err(TaskError::Stopped),
                };
                TaskOutcome { index, result }
            }
        });

        let results = join_all(pending).await;
        let successful = results.iter().filter(|o| o.result.is_ok()).count();
        let failed = results.len() - successful;

        log::debug!(
            "Batch finished: {} ok, {} failed in {:?}",
            successful,
            failed,
            started.elapsed()
        );

        Ok(BatchReport {
            results,
            successful,
            failed,
            duration: started.elapsed(),
        })
    }
}
