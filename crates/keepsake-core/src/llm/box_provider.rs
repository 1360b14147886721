//! Object-safe dynamic dispatch wrapper for TextCompletion.
//!
//! RPITIT traits cannot be used as trait objects directly, so:
//! 1. Define an object-safe `TextCompletionDyn` trait with a boxed future
//! 2. Blanket-impl `TextCompletionDyn` for all `T: TextCompletion`
//! 3. `BoxTextCompletion` wraps `Box<dyn TextCompletionDyn>` and implements
//!    `TextCompletion` again by delegating, so an erased backend passes
//!    through the same generic call sites (e.g. `ingest_transcript`)

use std::future::Future;
use std::pin::Pin;

use keepsake_types::llm::{CompletionError, CompletionRequest, CompletionResponse};

use super::provider::TextCompletion;

/// Object-safe version of [`TextCompletion`] with a boxed future.
///
/// Exists solely to enable dynamic dispatch; a blanket implementation is
/// provided for all types implementing `TextCompletion`.
pub trait TextCompletionDyn: Send + Sync {
    fn name_dyn(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, CompletionError>> + Send + 'a>>;
}

impl<T: TextCompletion> TextCompletionDyn for T {
    fn name_dyn(&self) -> &str {
        self.name()
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, CompletionError>> + Send + 'a>>
    {
        Box::pin(self.complete(request))
    }
}

/// Type-erased completion backend for runtime selection.
pub struct BoxTextCompletion {
    inner: Box<dyn TextCompletionDyn + Send + Sync>,
}

impl BoxTextCompletion {
    /// Wrap a concrete `TextCompletion` in a type-erased box.
    pub fn new<T: TextCompletion + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

}

impl TextCompletion for BoxTextCompletion {
    fn name(&self) -> &str {
        self.inner.name_dyn()
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        self.inner.complete_boxed(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    struct EchoBackend;

    impl TextCompletion for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            Ok(CompletionResponse {
                raw: request.user_prompt.clone(),
            })
        }
    }

    #[tokio::test]
    async fn box_provider_delegates() {
        let boxed = BoxTextCompletion::new(EchoBackend);
        assert_eq!(boxed.name(), "echo");

        let response = boxed
            .complete(&CompletionRequest {
                system_prompt: String::new(),
                user_prompt: "hello".to_string(),
                request_id: Uuid::now_v7(),
            })
            .await
            .unwrap();
        assert_eq!(response.raw, "hello");
    }
}
