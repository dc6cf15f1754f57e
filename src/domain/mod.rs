pub mod intents;
pub mod settings;
pub mod types;
pub mod wire;

pub use intents::{IntentCatalog, IntentDefinition};
pub use settings::Settings;
pub use types::{
    is_too_short, truncate_content, validate_content, Action, ClassificationResult, ContentError,
    ContentItem, Intent, MAX_CONTENT_LENGTH, MIN_CONTENT_LENGTH,
};
pub use wire::{
    BatchClassifyRequest, BatchClassifyResponse, ClassifyRequest, ErrorBody, HealthResponse,
    HealthStatus,
};
