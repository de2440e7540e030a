//! Ticket provider: reserves new object ids.
//!
//! Callers queue one request per object that needs an id, resolve them
//! together and then apply each resolved id in an explicit step. A
//! ticket is a plain value; nothing runs as a side effect of resolving.

use super::requests::{run_requests, Request};
use crate::api::StorageApi;
use crate::error::SyncResult;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A reserved id for the request tagged `tag`.
#[derive(Debug)]
pub struct Ticket<T> {
    /// Caller's tag of the request.
    pub tag: T,
    /// Reserved id, or the failure.
    pub id: SyncResult<String>,
}

/// Batch of pending id requests.
pub struct TicketProvider<T> {
    api: Arc<dyn StorageApi>,
    max_requests: usize,
    tags: Vec<T>,
}

impl<T> TicketProvider<T> {
    /// Creates an empty provider.
    pub fn new(api: Arc<dyn StorageApi>, max_requests: usize) -> Self {
        Self {
            api,
            max_requests,
            tags: Vec::new(),
        }
    }

    /// Queues a request for one new id.
    pub fn request(&mut self, tag: T) {
        self.tags.push(tag);
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Resolves all queued requests concurrently.
    ///
    /// Tickets come back in request order.
    pub async fn resolve(self, cancel: &CancellationToken) -> Vec<Ticket<T>> {
        let TicketProvider {
            api,
            max_requests,
            tags,
        } = self;
        let requests: Vec<Request<String>> = tags
            .iter()
            .map(|_| {
                let api = Arc::clone(&api);
                Box::pin(async move { api.generate_new_id().await }) as Request<String>
            })
            .collect();
        let ids = run_requests(requests, max_requests, cancel).await;
        debug!(count = ids.len(), "tickets resolved");
        tags.into_iter()
            .zip(ids)
            .map(|(tag, id)| Ticket { tag, id })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStorageApi;

    #[tokio::test]
    async fn tickets_match_tags() {
        let api = Arc::new(MockStorageApi::new());
        let mut provider = TicketProvider::new(api.clone(), 2);
        provider.request("a");
        provider.request("b");
        provider.request("c");
        assert_eq!(provider.len(), 3);
        let tickets = provider.resolve(&CancellationToken::new()).await;
        let mut ids: Vec<String> = tickets.iter().map(|t| t.id.as_ref().unwrap().clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["1001", "1002", "1003"]);
        let tags: Vec<&str> = tickets.iter().map(|t| t.tag).collect();
        assert_eq!(tags, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failure_is_per_ticket() {
        let api = Arc::new(MockStorageApi::new());
        api.fail_on("generate_new_id");
        let mut provider = TicketProvider::new(api, 2);
        provider.request(1);
        let tickets = provider.resolve(&CancellationToken::new()).await;
        assert!(tickets[0].id.is_err());
    }
}
