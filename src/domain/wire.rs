use serde::{Deserialize, Serialize};

use super::types::{ClassificationResult, ContentItem};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchClassifyRequest {
    pub items: Vec<ContentItem>,
}

/// `None` marks an item whose classification could not be produced at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchClassifyResponse {
    pub results: Vec<Option<ClassificationResult>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub backend_connected: bool,
    pub model: String,
}

impl HealthResponse {
    pub fn disconnected() -> Self {
        Self {
            status: HealthStatus::Disconnected,
            backend_connected: false,
            model: "none".to_string(),
        }
    }

    /// Processing only starts against a healthy server with a connected backend.
    pub fn is_ready(&self) -> bool {
        self.status == HealthStatus::Ok && self.backend_connected
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
