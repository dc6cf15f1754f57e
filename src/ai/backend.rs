use futures::future::BoxFuture;
use thiserror::Error;

/// Why a single backend attempt did not produce a usable classification.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),
    #[error("backend timed out")]
    BackendTimeout,
    #[error("backend returned HTTP {0}")]
    BackendStatus(u16),
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

impl ClassifyError {
    /// Transient failures get exactly one retry; anything else falls open immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ClassifyError::BackendStatus(code) => *code >= 500 || *code == 429,
            _ => true,
        }
    }
}

impl From<reqwest::Error> for ClassifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClassifyError::BackendTimeout
        } else if let Some(status) = err.status() {
            ClassifyError::BackendStatus(status.as_u16())
        } else if err.is_decode() {
            ClassifyError::MalformedResponse(err.to_string())
        } else {
            ClassifyError::BackendUnreachable(err.to_string())
        }
    }
}

/// A text-generation backend that answers a prompt with a JSON document.
pub trait LlmBackend: Send + Sync {
    fn model(&self) -> &str;

    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ClassifyError>>;

    fn health(&self) -> BoxFuture<'_, bool>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use futures::FutureExt;

    use super::*;

    type Responder = dyn Fn(&str, usize) -> (Duration, Result<String, ClassifyError>) + Send + Sync;

    /// In-process backend driven by a closure of `(prompt, call_index)`.
    pub struct FakeBackend {
        calls: AtomicUsize,
        healthy: bool,
        respond: Box<Responder>,
    }

    impl FakeBackend {
        pub fn new(
            respond: impl Fn(&str, usize) -> (Duration, Result<String, ClassifyError>)
                + Send
                + Sync
                + 'static,
        ) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                healthy: true,
                respond: Box::new(respond),
            }
        }

        pub fn replying(json: &'static str) -> Self {
            Self::new(move |_, _| (Duration::ZERO, Ok(json.to_string())))
        }

        pub fn unreachable() -> Self {
            let mut backend = Self::new(|_, _| {
                (
                    Duration::ZERO,
                    Err(ClassifyError::BackendUnreachable("connection refused".into())),
                )
            });
            backend.healthy = false;
            backend
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LlmBackend for FakeBackend {
        fn model(&self) -> &str {
            "fake-model"
        }

        fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ClassifyError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, reply) = (self.respond)(prompt, call);
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                reply
            }
            .boxed()
        }

        fn health(&self) -> BoxFuture<'_, bool> {
            let healthy = self.healthy;
            async move { healthy }.boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_not_retried() {
        assert!(!ClassifyError::BackendStatus(404).is_transient());
        assert!(ClassifyError::BackendStatus(503).is_transient());
        assert!(ClassifyError::BackendStatus(429).is_transient());
        assert!(ClassifyError::MalformedResponse("".into()).is_transient());
        assert!(ClassifyError::BackendTimeout.is_transient());
    }
}
