//! Bounded worker pool with a start gate.
//!
//! Jobs are only queued by [`Workers::add_worker`]; nothing runs until
//! [`Workers::start_and_wait`], which releases every queued job at once.
//! A semaphore caps concurrent filesystem work and results come back in
//! the order the jobs were added.

use crate::error::{CoreError, CoreResult, MultiError};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Default cap of concurrent filesystem jobs.
pub const DEFAULT_MAX_WORKERS: usize = 32;

type Job<T> = Box<dyn FnOnce() -> CoreResult<T> + Send + 'static>;

/// Queue of blocking jobs.
pub struct Workers<T> {
    cancel: CancellationToken,
    max_workers: usize,
    jobs: Vec<Job<T>>,
}

impl<T> std::fmt::Debug for Workers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workers")
            .field("max_workers", &self.max_workers)
            .field("queued", &self.jobs.len())
            .finish()
    }
}

impl<T: Send + 'static> Workers<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(cancel: CancellationToken, max_workers: usize) -> Self {
        Self {
            cancel,
            max_workers: max_workers.max(1),
            jobs: Vec::new(),
        }
    }

    /// Queues a job. It does not start until [`Self::start_and_wait`].
    pub fn add_worker<F>(&mut self, job: F)
    where
        F: FnOnce() -> CoreResult<T> + Send + 'static,
    {
        self.jobs.push(Box::new(job));
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Starts all queued jobs and waits for them.
    ///
    /// Jobs that have not acquired a permit when the token is cancelled
    /// return [`CoreError::Cancelled`]; started jobs run to completion.
    pub async fn start_and_wait(self) -> Vec<CoreResult<T>> {
        let Workers {
            cancel,
            max_workers,
            jobs,
        } = self;
        let semaphore = Arc::new(Semaphore::new(max_workers));

        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| tokio::spawn(run_job(job, Arc::clone(&semaphore), cancel.clone())))
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(CoreError::WorkerFailed {
                    message: e.to_string(),
                }),
            });
        }
        results
    }
}

async fn run_job<T: Send + 'static>(
    job: Job<T>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) -> CoreResult<T> {
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(CoreError::Cancelled),
        permit = semaphore.acquire_owned() => permit.map_err(|e| CoreError::WorkerFailed {
            message: e.to_string(),
        })?,
    };
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| CoreError::WorkerFailed {
            message: e.to_string(),
        })?
}

/// Splits worker results into values and an aggregate of the errors,
/// keeping definition order.
pub fn split_results<T>(results: Vec<CoreResult<T>>) -> (Vec<T>, MultiError) {
    let mut values = Vec::new();
    let mut errors = MultiError::new();
    for r in results {
        match r {
            Ok(v) => values.push(v),
            Err(e) => errors.push(e),
        }
    }
    (values, errors)
}
