use std::time::Duration;

use anyhow::{Context, Result};
use futures::{future::BoxFuture, FutureExt};
use reqwest::Client;
use thiserror::Error;
use url::Url;

use crate::domain::{
    BatchClassifyRequest, BatchClassifyResponse, ClassificationResult, ContentItem,
    HealthResponse,
};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
/// Covers a worst-case batch: two backend timeouts plus the retry backoff.
const BATCH_TIMEOUT: Duration = Duration::from_secs(70);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("classification server unreachable: {0}")]
    Unreachable(String),
    #[error("classification server answered HTTP {0}")]
    Status(u16),
    #[error("classification server returned {got} results for {expected} items")]
    LengthMismatch { expected: usize, got: usize },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => TransportError::Status(status.as_u16()),
            None => TransportError::Unreachable(err.to_string()),
        }
    }
}

/// Relays batches from the scheduler to the classification server.
pub trait ClassifyTransport: Send + Sync {
    fn classify_batch<'a>(
        &'a self,
        items: &'a [ContentItem],
    ) -> BoxFuture<'a, Result<Vec<Option<ClassificationResult>>, TransportError>>;

    /// Never fails: an unreachable server is reported as `disconnected`.
    fn health(&self) -> BoxFuture<'_, HealthResponse>;
}

#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    batch_url: Url,
    health_url: Url,
}

impl HttpTransport {
    pub fn new(http: Client, server_url: &Url) -> Result<Self> {
        let batch_url = server_url
            .join("classify/batch")
            .with_context(|| format!("invalid server url {server_url}"))?;
        let health_url = server_url
            .join("health")
            .with_context(|| format!("invalid server url {server_url}"))?;
        Ok(Self {
            http,
            batch_url,
            health_url,
        })
    }

    async fn post_batch(
        &self,
        items: &[ContentItem],
    ) -> Result<Vec<Option<ClassificationResult>>, TransportError> {
        let request = BatchClassifyRequest {
            items: items.to_vec(),
        };
        let response: BatchClassifyResponse = self
            .http
            .post(self.batch_url.clone())
            .timeout(BATCH_TIMEOUT)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.results.len() != items.len() {
            return Err(TransportError::LengthMismatch {
                expected: items.len(),
                got: response.results.len(),
            });
        }
        Ok(response.results)
    }

    async fn fetch_health(&self) -> HealthResponse {
        let response = self
            .http
            .get(self.health_url.clone())
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status());
        let parsed = match response {
            Ok(response) => response.json::<HealthResponse>().await,
            Err(err) => Err(err),
        };
        parsed.unwrap_or_else(|err| {
            tracing::debug!(target: "transport", error = %err, "health check failed");
            HealthResponse::disconnected()
        })
    }
}

impl ClassifyTransport for HttpTransport {
    fn classify_batch<'a>(
        &'a self,
        items: &'a [ContentItem],
    ) -> BoxFuture<'a, Result<Vec<Option<ClassificationResult>>, TransportError>> {
        self.post_batch(items).boxed()
    }

    fn health(&self) -> BoxFuture<'_, HealthResponse> {
        self.fetch_health().boxed()
    }
}
