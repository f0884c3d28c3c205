//! # Pending-Request Set
//!
//! Requests waiting for the dispatcher, in insertion order and free of
//! duplicates. A request whose key is already queued is dropped; the queued
//! one keeps its place.
//!
//! The queue lock is only held for the map/deque bookkeeping, never across
//! I/O or an `.await`.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::debug;

use crate::requests::{RequestKey, ResourceRequest};

/// Ordered, duplicate-free request queue
#[derive(Debug, Default)]
pub struct PendingQueue {
    order: VecDeque<RequestKey>,
    requests: HashMap<RequestKey, ResourceRequest>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `request` unless an equal one is queued; returns whether it was added
    pub fn enqueue(&mut self, request: ResourceRequest) -> bool {
        let key = request.key();
        if self.requests.contains_key(&key) {
            return false;
        }
        self.order.push_back(key.clone());
        self.requests.insert(key, request);
        true
    }

    /// Remove and return the earliest-inserted request
    pub fn dequeue_oldest(&mut self) -> Option<ResourceRequest> {
        while let Some(key) = self.order.pop_front() {
            if let Some(request) = self.requests.remove(&key) {
                return Some(request);
            }
        }
        None
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.requests.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// The pending queue plus the signal that wakes a parked dispatcher
#[derive(Debug, Default)]
pub struct PendingRequests {
    queue: Mutex<PendingQueue>,
    wakeup: Notify,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request and wake the dispatcher; duplicates are ignored
    pub fn enqueue(&self, request: ResourceRequest) -> bool {
        let key = request.key();
        let inserted = self.queue.lock().enqueue(request);

        if inserted {
            debug!(request_key = %key, "Request queued");
            self.wakeup.notify_one();
        } else {
            debug!(request_key = %key, "Request already queued, ignoring duplicate");
        }
        inserted
    }

    pub fn dequeue_oldest(&self) -> Option<ResourceRequest> {
        self.queue.lock().dequeue_oldest()
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.queue.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Future completing on the next wake-up
    ///
    /// Callers enable it before checking for work so a wake-up that lands
    /// between the check and the wait is not lost.
    pub fn notified(&self) -> Notified<'_> {
        self.wakeup.notified()
    }

    /// Wake every parked waiter, used on shutdown
    pub fn wake_all(&self) {
        self.wakeup.notify_waiters();
    }
}
