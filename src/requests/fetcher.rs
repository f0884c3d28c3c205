//! Fetch operation seam
//!
//! The service never talks to a network itself. Each request carries a
//! `Fetcher` that knows how to obtain its raw response; any async closure
//! returning `Result<RawResponse, FetchError>` is a `Fetcher`.

use async_trait::async_trait;
use std::future::Future;

use super::RawResponse;
use crate::error::FetchError;

/// Retrieves the raw response for one resource
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self) -> Result<RawResponse, FetchError>;
}

#[async_trait]
impl<F, Fut> Fetcher for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<RawResponse, FetchError>> + Send,
{
    async fn fetch(&self) -> Result<RawResponse, FetchError> {
        (self)().await
    }
}
