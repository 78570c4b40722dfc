// mcpscope-server/src/traits.rs
use crate::error::ServiceError;
use std::future::Future;
use std::pin::Pin;

/// A hosted text-completion service. Object-safe so handlers can hold an
/// `Arc<dyn CompletionBackend>` and tests can swap in a canned one.
pub trait CompletionBackend: Send + Sync {
    /// Send one prompt and return the first text segment of the reply verbatim.
    fn complete<'a>(&'a self, prompt: &'a str)
        -> Pin<Box<dyn Future<Output = Result<String, ServiceError>> + Send + 'a>>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}
