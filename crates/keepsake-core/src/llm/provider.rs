//! TextCompletion trait definition.
//!
//! The one abstraction the extraction pipeline needs from a model backend:
//! prompt in, raw text out. Uses native async fn in traits (RPITIT, Rust
//! 2024 edition). Implementations live in the hosting application; tests
//! use in-process fakes.

use keepsake_types::llm::{CompletionError, CompletionRequest, CompletionResponse};

/// Trait for text-completion backends.
///
/// Callers are responsible for bounding the call with a timeout (the
/// extraction pipeline applies 30 seconds) and for any bounded retry;
/// implementations must not retry recursively on their own.
pub trait TextCompletion: Send + Sync {
    /// Human-readable backend name, for logs.
    fn name(&self) -> &str;

    /// Send a completion request and receive the full raw response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, CompletionError>> + Send;
}
