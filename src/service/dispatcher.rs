//! Dispatch loop moving pending requests into the worker pool
//!
//! One dispatcher runs per started generation. It drains the pending set in
//! insertion order, parks when the set is empty, and exits as soon as its
//! generation is no longer the running one.

use std::sync::Arc;
use tracing::{debug, info};

use super::executor::WorkerPool;
use super::lifecycle::Lifecycle;
use super::pending::PendingRequests;

#[derive(Debug)]
pub struct Dispatcher {
    pending: Arc<PendingRequests>,
    pool: Arc<WorkerPool>,
    lifecycle: Arc<Lifecycle>,
    generation: u64,
}

impl Dispatcher {
    pub fn new(
        pending: Arc<PendingRequests>,
        pool: Arc<WorkerPool>,
        lifecycle: Arc<Lifecycle>,
        generation: u64,
    ) -> Self {
        Self {
            pending,
            pool,
            lifecycle,
            generation,
        }
    }

    pub async fn run(self) {
        info!(generation = self.generation, "🚀 Dispatcher started");
        let mut dispatched: u64 = 0;

        loop {
            // Enabled before the checks below so a wake-up issued in between is kept.
            let notified = self.pending.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.lifecycle.is_current(self.generation) {
                break;
            }

            match self.pending.dequeue_oldest() {
                Some(request) => {
                    debug!(
                        request_key = %request.key(),
                        generation = self.generation,
                        "Dispatching request"
                    );
                    // Detached; the task reports through the event channel.
                    drop(self.pool.submit(request, self.generation));
                    dispatched += 1;
                }
                None => notified.await,
            }
        }

        info!(
            generation = self.generation,
            dispatched,
            remaining = self.pending.len(),
            "🛑 Dispatcher stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::error::FetchError;
    use crate::freshness::Freshness;
    use crate::requests::{RawResponse, ResourceRequest};
    use crate::service::events::CompletionPublisher;
    use crate::service::executor::RequestExecutor;
    use std::time::Duration;

    fn parts() -> (Arc<PendingRequests>, Arc<WorkerPool>, Arc<Lifecycle>, CompletionPublisher) {
        let lifecycle = Arc::new(Lifecycle::new());
        let publisher = CompletionPublisher::new(16);
        let executor = RequestExecutor::new(
            CacheStore::in_memory(),
            publisher.clone(),
            Arc::clone(&lifecycle),
        );
        let pool = Arc::new(WorkerPool::new(2, executor));
        (Arc::new(PendingRequests::new()), pool, lifecycle, publisher)
    }

    fn request(id: &str) -> ResourceRequest {
        ResourceRequest::new(id, Freshness::Immediately, || async {
            Ok::<_, FetchError>(RawResponse::ok("true"))
        })
    }

    #[tokio::test]
    async fn test_dispatches_queued_and_late_requests() {
        let (pending, pool, lifecycle, publisher) = parts();
        let mut events = publisher.subscribe();
        pending.enqueue(request("early"));

        let generation = lifecycle.begin().unwrap();
        let handle = tokio::spawn(
            Dispatcher::new(
                Arc::clone(&pending),
                Arc::clone(&pool),
                Arc::clone(&lifecycle),
                generation,
            )
            .run(),
        );

        let first = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.resource_id.as_str(), "early");

        pending.enqueue(request("late"));
        let second = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.resource_id.as_str(), "late");

        lifecycle.end();
        pending.wake_all();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_exits_immediately_for_stale_generation() {
        let (pending, pool, lifecycle, _publisher) = parts();
        let generation = lifecycle.begin().unwrap();
        lifecycle.end();
        pending.enqueue(request("kept"));

        tokio::time::timeout(
            Duration::from_secs(2),
            Dispatcher::new(Arc::clone(&pending), pool, lifecycle, generation).run(),
        )
        .await
        .unwrap();

        assert_eq!(pending.len(), 1);
    }
}
