use std::time::Duration;

use anyhow::{Context, Result};
use futures::{future::BoxFuture, FutureExt};
use reqwest::Client;
use url::Url;

use crate::config::BackendConfig;

use super::{
    backend::{ClassifyError, LlmBackend},
    inference::{build_request, parse_response, GENERATE_PATH, TAGS_PATH},
};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    config: BackendConfig,
    generate_url: Url,
    tags_url: Url,
}

impl OllamaClient {
    pub fn new(http: Client, config: BackendConfig) -> Result<Self> {
        let generate_url = config
            .host
            .join(GENERATE_PATH)
            .with_context(|| format!("invalid backend host {}", config.host))?;
        let tags_url = config
            .host
            .join(TAGS_PATH)
            .with_context(|| format!("invalid backend host {}", config.host))?;
        Ok(Self {
            http,
            config,
            generate_url,
            tags_url,
        })
    }

    pub fn host(&self) -> &Url {
        &self.config.host
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, ClassifyError> {
        let request = build_request(&self.config, prompt);
        let response = self
            .http
            .post(self.generate_url.clone())
            .timeout(self.config.timeout)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        parse_response(response).await
    }

    pub async fn check_health(&self) -> bool {
        match self
            .http
            .get(self.tags_url.clone())
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(target: "engine", error = %err, "backend health probe failed");
                false
            }
        }
    }
}

impl LlmBackend for OllamaClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ClassifyError>> {
        self.complete(prompt).boxed()
    }

    fn health(&self) -> BoxFuture<'_, bool> {
        self.check_health().boxed()
    }
}
