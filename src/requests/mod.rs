//! # Resource Requests
//!
//! The unit of work handed to the fetch service. A request names the
//! resource, states how old a cached copy may be, and carries the fetch
//! operation used when the cache cannot answer. While it executes, the
//! worker accumulates the outcome on the request itself.
//!
//! Two requests are the same logical request when both the resource id and
//! the freshness policy match. A request for the same resource with a
//! different policy is a distinct request.

pub mod fetcher;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{FetchError, RequestError};
use crate::freshness::Freshness;

pub use fetcher::Fetcher;

/// Opaque, comparable name of a logical resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity of a request: resource plus freshness policy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub resource_id: ResourceId,
    pub freshness: Freshness,
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.resource_id, self.freshness)
    }
}

/// Status line of a response
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub code: u16,
    pub phrase: String,
}

impl ResponseStatus {
    pub fn new(code: u16, phrase: impl Into<String>) -> Self {
        Self {
            code,
            phrase: phrase.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.phrase)
    }
}

/// What a fetcher hands back: status line and undecoded body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: ResponseStatus,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(code: u16, phrase: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: ResponseStatus::new(code, phrase),
            body: body.into(),
        }
    }

    /// `200 OK` with the given body
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, "OK", body)
    }

    /// `200 OK` with a JSON-serialized body
    pub fn json(value: &serde_json::Value) -> Self {
        Self::ok(value.to_string())
    }
}

/// Result fields accumulated while a request executes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOutcome {
    pub from_cache: bool,
    pub status: Option<ResponseStatus>,
    pub payload: Option<serde_json::Value>,
    pub error: Option<RequestError>,
}

impl RequestOutcome {
    pub fn was_successful(&self) -> bool {
        self.error.is_none()
    }

    pub(crate) fn record_cache_hit(&mut self, payload: serde_json::Value) {
        self.payload = Some(payload);
        self.from_cache = true;
        self.error = None;
    }

    pub(crate) fn record_fetched(&mut self, status: ResponseStatus, payload: serde_json::Value) {
        self.status = Some(status);
        self.payload = Some(payload);
        self.from_cache = false;
        self.error = None;
    }

    /// A fetch that never produced a usable body. Any status the failure
    /// carries is kept so listeners see how far the exchange got.
    pub(crate) fn record_fetch_failure(&mut self, error: FetchError) {
        if let Some(status) = error.status() {
            self.status = Some(status.clone());
        }
        self.payload = None;
        self.from_cache = false;
        self.error = Some(RequestError::Fetch(error));
    }

    /// Response arrived but its body could not be decoded
    pub(crate) fn record_decode_failure(&mut self, status: ResponseStatus, message: String) {
        self.status = Some(status);
        self.payload = None;
        self.from_cache = false;
        self.error = Some(RequestError::decode(message));
    }
}

/// A pending or executing fetch of one resource
pub struct ResourceRequest {
    id: ResourceId,
    freshness: Freshness,
    fetcher: Arc<dyn Fetcher>,
    outcome: RequestOutcome,
}

impl ResourceRequest {
    pub fn new<F>(id: impl Into<ResourceId>, freshness: Freshness, fetcher: F) -> Self
    where
        F: Fetcher + 'static,
    {
        Self::with_shared_fetcher(id, freshness, Arc::new(fetcher))
    }

    /// Build a request around a fetcher shared with other requests
    pub fn with_shared_fetcher(
        id: impl Into<ResourceId>,
        freshness: Freshness,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            id: id.into(),
            freshness,
            fetcher,
            outcome: RequestOutcome::default(),
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    pub fn key(&self) -> RequestKey {
        RequestKey {
            resource_id: self.id.clone(),
            freshness: self.freshness,
        }
    }

    pub fn outcome(&self) -> &RequestOutcome {
        &self.outcome
    }

    pub(crate) fn outcome_mut(&mut self) -> &mut RequestOutcome {
        &mut self.outcome
    }

    pub(crate) fn fetcher(&self) -> Arc<dyn Fetcher> {
        Arc::clone(&self.fetcher)
    }
}

impl fmt::Debug for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRequest")
            .field("id", &self.id)
            .field("freshness", &self.freshness)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ResourceRequest {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.freshness == other.freshness
    }
}

impl Eq for ResourceRequest {}

impl Hash for ResourceRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.freshness.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, freshness: Freshness) -> ResourceRequest {
        ResourceRequest::new(id, freshness, || async {
            Ok::<_, FetchError>(RawResponse::ok("{}"))
        })
    }

    #[test]
    fn test_identity_is_id_and_freshness() {
        let a = request("feeds/1", Freshness::OneHour);
        let b = request("feeds/1", Freshness::OneHour);
        let c = request("feeds/1", Freshness::OneDay);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_new_request_has_empty_outcome() {
        let req = request("feeds/1", Freshness::Immediately);
        assert!(req.outcome().was_successful());
        assert!(!req.outcome().from_cache);
        assert!(req.outcome().payload.is_none());
        assert!(req.outcome().status.is_none());
    }

    #[test]
    fn test_fetch_failure_keeps_error_status() {
        let mut outcome = RequestOutcome::default();
        outcome.record_fetch_failure(FetchError::error_status(503, "Service Unavailable"));

        assert!(!outcome.was_successful());
        assert_eq!(outcome.status, Some(ResponseStatus::new(503, "Service Unavailable")));
        assert!(outcome.payload.is_none());
    }

    #[test]
    fn test_cache_hit_marks_provenance() {
        let mut outcome = RequestOutcome::default();
        outcome.record_cache_hit(serde_json::json!({"cached": true}));
        assert!(outcome.from_cache);
        assert_eq!(outcome.payload, Some(serde_json::json!({"cached": true})));
    }

    #[test]
    fn test_key_display() {
        let req = request("feeds/1", Freshness::OneMinute);
        assert_eq!(req.key().to_string(), "feeds/1@one_minute");
    }
}
