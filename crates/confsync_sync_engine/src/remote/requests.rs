//! Bounded concurrent API requests.

use crate::error::{SyncError, SyncResult};
use confsync_core::CoreError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// One queued API request.
pub type Request<T> = Pin<Box<dyn Future<Output = SyncResult<T>> + Send + 'static>>;

/// Runs `requests` with at most `max` in flight and returns the results in
/// request order.
///
/// Requests that have not started when `cancel` fires return
/// [`SyncError::Cancelled`].
pub async fn run_requests<T: Send + 'static>(
    requests: Vec<Request<T>>,
    max: usize,
    cancel: &CancellationToken,
) -> Vec<SyncResult<T>> {
    let semaphore = Arc::new(Semaphore::new(max.max(1)));
    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| {
            tokio::spawn(run_request(
                request,
                Arc::clone(&semaphore),
                cancel.clone(),
            ))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(match handle.await {
            Ok(result) => result,
            Err(e) => Err(SyncError::Core(CoreError::WorkerFailed {
                message: e.to_string(),
            })),
        });
    }
    results
}

async fn run_request<T>(
    request: Request<T>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) -> SyncResult<T> {
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(SyncError::Cancelled),
        permit = semaphore.acquire_owned() => permit.map_err(|e| {
            SyncError::Core(CoreError::WorkerFailed { message: e.to_string() })
        })?,
    };
    request.await
}
