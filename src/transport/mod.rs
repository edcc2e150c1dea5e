//! The seam to the remote completion service.

mod http;

pub use http::{HttpTransport, DEFAULT_BASE_URL, DEFAULT_MODEL};

use crate::types::{CompletionRequest, CompletionResponse};
use crate::Result;
use async_trait::async_trait;

/// Asynchronous "create completion" operation of the remote service.
///
/// Implementations report a structural rejection as
/// [`Error::MalformedRequest`](crate::Error::MalformedRequest); that is the only class
/// the executor retries.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn create_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
