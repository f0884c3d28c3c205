//! # Completion Events
//!
//! Every request a live service finishes produces exactly one
//! [`CompletionEvent`], broadcast to all current subscribers. Subscribers that
//! fall more than `event_buffer_size` events behind observe a lag error on
//! their receiver and skip ahead; publishing never blocks a worker.
//!
//! ```rust
//! use fetchcache::service::events::CompletionPublisher;
//!
//! # tokio_test::block_on(async {
//! let publisher = CompletionPublisher::new(16);
//! let mut events = publisher.subscribe();
//! assert_eq!(publisher.subscriber_count(), 1);
//!
//! // Nothing has completed yet
//! assert!(events.try_recv().is_err());
//! # });
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::constants::events::{REQUEST_COMPLETED, REQUEST_FAILED};
use crate::error::RequestError;
use crate::freshness::Freshness;
use crate::requests::{ResourceId, ResourceRequest, ResponseStatus};

/// A finished request, as seen by listeners
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionEvent {
    pub resource_id: ResourceId,
    pub freshness: Freshness,
    /// Transport status; `None` for cache hits and failures that never got a response
    pub status: Option<ResponseStatus>,
    /// Decoded payload; `None` when the request failed
    pub payload: Option<Value>,
    pub from_cache: bool,
    pub error: Option<RequestError>,
    pub completed_at: DateTime<Utc>,
}

impl CompletionEvent {
    pub fn from_request(request: &ResourceRequest) -> Self {
        let outcome = request.outcome();
        Self {
            resource_id: request.id().clone(),
            freshness: request.freshness(),
            status: outcome.status.clone(),
            payload: outcome.payload.clone(),
            from_cache: outcome.from_cache,
            error: outcome.error.clone(),
            completed_at: Utc::now(),
        }
    }

    pub fn was_successful(&self) -> bool {
        self.error.is_none()
    }

    pub fn event_type(&self) -> &'static str {
        if self.was_successful() {
            REQUEST_COMPLETED
        } else {
            REQUEST_FAILED
        }
    }
}

/// Counters describing publisher activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub published: u64,
    pub undelivered: u64,
    pub subscribers: usize,
}

/// Broadcast fan-out of completion events
#[derive(Debug, Clone)]
pub struct CompletionPublisher {
    sender: broadcast::Sender<CompletionEvent>,
    correlation_id: String,
    published: Arc<AtomicU64>,
    undelivered: Arc<AtomicU64>,
}

impl CompletionPublisher {
    /// `capacity` must be non-zero
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            correlation_id: format!("pub_{}", &Uuid::new_v4().to_string()[..8]),
            published: Arc::new(AtomicU64::new(0)),
            undelivered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Send to all current subscribers, returning how many received it
    pub fn publish(&self, event: CompletionEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let event_type = event.event_type();
        let resource_id = event.resource_id.clone();

        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(
                    correlation_id = %self.correlation_id,
                    resource_id = %resource_id,
                    event_type,
                    receivers,
                    "Published completion event"
                );
                receivers
            }
            Err(_) => {
                self.undelivered.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %self.correlation_id,
                    resource_id = %resource_id,
                    event_type,
                    "No subscribers for completion event"
                );
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            published: self.published.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::requests::RawResponse;
    use serde_json::json;

    fn finished_request() -> ResourceRequest {
        let mut request = ResourceRequest::new("feed", Freshness::OneHour, || async {
            Ok::<_, FetchError>(RawResponse::ok("[]"))
        });
        request
            .outcome_mut()
            .record_fetched(ResponseStatus::new(200, "OK"), json!({"items": []}));
        request
    }

    #[test]
    fn test_event_mirrors_request_outcome() {
        let event = CompletionEvent::from_request(&finished_request());

        assert_eq!(event.resource_id.as_str(), "feed");
        assert_eq!(event.freshness, Freshness::OneHour);
        assert_eq!(event.status.as_ref().map(|s| s.code), Some(200));
        assert_eq!(event.payload, Some(json!({"items": []})));
        assert!(!event.from_cache);
        assert_eq!(event.event_type(), REQUEST_COMPLETED);
    }

    #[test]
    fn test_failed_event_type() {
        let mut request = finished_request();
        request
            .outcome_mut()
            .record_fetch_failure(FetchError::error_status(503, "Service Unavailable"));
        let event = CompletionEvent::from_request(&request);

        assert!(!event.was_successful());
        assert_eq!(event.event_type(), REQUEST_FAILED);
        assert_eq!(event.status.map(|s| s.code), Some(503));
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let publisher = CompletionPublisher::new(8);
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();

        let delivered = publisher.publish(CompletionEvent::from_request(&finished_request()));

        assert_eq!(delivered, 2);
        assert_eq!(first.recv().await.unwrap().resource_id.as_str(), "feed");
        assert_eq!(second.recv().await.unwrap().resource_id.as_str(), "feed");
    }

    #[test]
    fn test_publish_without_subscribers_is_counted() {
        let publisher = CompletionPublisher::new(8);
        assert_eq!(
            publisher.publish(CompletionEvent::from_request(&finished_request())),
            0
        );

        let stats = publisher.stats();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.undelivered, 1);
        assert_eq!(stats.subscribers, 0);
        assert!(publisher.correlation_id().starts_with("pub_"));
    }
}
