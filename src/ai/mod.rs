pub mod backend;
pub mod client;
pub mod engine;
pub mod inference;
pub mod prompt;

pub use backend::{ClassifyError, LlmBackend};
pub use client::OllamaClient;
pub use engine::{fail_open, ClassificationEngine, RetryPolicy};
