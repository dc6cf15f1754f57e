use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::time::{sleep, timeout};

use crate::{
    cache::{content_hash, ServerCache},
    config::{BackendConfig, CacheConfig},
    domain::{is_too_short, ClassificationResult, Intent, IntentCatalog},
};

use super::{
    backend::{ClassifyError, LlmBackend},
    prompt::PromptBuilder,
};

const MAX_REASONING_CHARS: usize = 280;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub retry_delay: Duration,
    pub retries: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            timeout: config.timeout,
            retry_delay: config.retry_delay,
            retries: 1,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&BackendConfig::default())
    }
}

/// Problems in an otherwise readable response; corrected in place, never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    InvalidIntent(String),
    ConfidenceOutOfRange(f64),
}

pub struct ClassificationEngine {
    backend: Arc<dyn LlmBackend>,
    catalog: Arc<IntentCatalog>,
    prompt: PromptBuilder,
    cache: ServerCache,
    policy: RetryPolicy,
}

impl ClassificationEngine {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        catalog: Arc<IntentCatalog>,
        cache_config: &CacheConfig,
        policy: RetryPolicy,
    ) -> Self {
        let prompt = PromptBuilder::new(&catalog);
        Self {
            backend,
            catalog,
            prompt,
            cache: ServerCache::from_config(cache_config),
            policy,
        }
    }

    pub fn catalog(&self) -> &IntentCatalog {
        &self.catalog
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    pub fn cache(&self) -> &ServerCache {
        &self.cache
    }

    pub async fn health(&self) -> bool {
        self.backend.health().await
    }

    /// Classifies `content`. Every failure resolves to the fail-open result.
    pub async fn classify(&self, content: &str) -> ClassificationResult {
        if is_too_short(content) {
            return ClassificationResult::too_short();
        }

        let key = content_hash(content);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(target: "engine", hash = %key, "server cache hit");
            return hit;
        }

        let prompt = self.prompt.build(content);
        let outcome = self.call_with_retry(&prompt).await;
        if let Ok(result) = &outcome {
            self.cache.put(key, result.clone());
        }
        fail_open(outcome)
    }

    async fn call_with_retry(&self, prompt: &str) -> Result<ClassificationResult, ClassifyError> {
        let mut attempt = 0;
        loop {
            match self.attempt(prompt).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() && attempt < self.policy.retries => {
                    attempt += 1;
                    tracing::warn!(
                        target: "engine",
                        error = %err,
                        attempt,
                        delay_ms = self.policy.retry_delay.as_millis() as u64,
                        "backend call failed, retrying"
                    );
                    sleep(self.policy.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(&self, prompt: &str) -> Result<ClassificationResult, ClassifyError> {
        let raw = timeout(self.policy.timeout, self.backend.generate(prompt))
            .await
            .map_err(|_| ClassifyError::BackendTimeout)??;
        self.parse_response(&raw)
    }

    fn parse_response(&self, raw: &str) -> Result<ClassificationResult, ClassifyError> {
        let data = parse_json_object(raw)?;

        let raw_intent = data
            .get("intent")
            .and_then(Value::as_str)
            .unwrap_or("neutral");
        let intent = match Intent::parse(raw_intent) {
            Some(intent) => intent,
            None => {
                report(ValidationIssue::InvalidIntent(raw_intent.to_string()));
                Intent::Neutral
            }
        };

        let raw_confidence = data.get("confidence").and_then(confidence_value).unwrap_or(0.5);
        let confidence = if (0.0..=1.0).contains(&raw_confidence) {
            raw_confidence
        } else {
            report(ValidationIssue::ConfidenceOutOfRange(raw_confidence));
            raw_confidence.clamp(0.0, 1.0)
        };

        let reasoning: String = data
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .chars()
            .take(MAX_REASONING_CHARS)
            .collect();

        Ok(ClassificationResult {
            intent,
            confidence,
            reasoning,
            action: self.catalog.action(intent),
            manipulation_score: self.catalog.weight(intent) * confidence,
        })
    }
}

/// The one place a classification error turns into a result.
pub fn fail_open(outcome: Result<ClassificationResult, ClassifyError>) -> ClassificationResult {
    match outcome {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(
                target: "engine",
                error = %err,
                "classification failed, passing content"
            );
            ClassificationResult::fail_open(err)
        }
    }
}

fn report(issue: ValidationIssue) {
    tracing::warn!(target: "engine", ?issue, "corrected backend response");
}

fn parse_json_object(raw: &str) -> Result<serde_json::Map<String, Value>, ClassifyError> {
    let parsed = serde_json::from_str::<Value>(raw).or_else(|err| {
        // Some models wrap the object in prose despite format=json.
        match (raw.find('{'), raw.rfind('}')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&raw[start..=end]),
            _ => Err(err),
        }
    });
    match parsed {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ClassifyError::MalformedResponse(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(err) => {
            let preview: String = raw.chars().take(200).collect();
            tracing::warn!(
                target: "engine",
                response = %preview,
                "invalid JSON in backend response"
            );
            Err(ClassifyError::MalformedResponse(err.to_string()))
        }
    }
}

fn confidence_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}
