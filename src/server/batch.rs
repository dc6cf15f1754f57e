use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;

use crate::{
    ai::ClassificationEngine,
    domain::{validate_content, ClassificationResult, ContentError, ContentItem},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch of {len} items exceeds the maximum of {max}")]
    TooLarge { len: usize, max: usize },
    #[error("item {index} is invalid: {reason}")]
    InvalidItem { index: usize, reason: ContentError },
}

/// Runs every item of a batch concurrently and hands results back in input order.
pub struct BatchCoordinator {
    engine: Arc<ClassificationEngine>,
    max_batch_size: usize,
}

impl BatchCoordinator {
    pub fn new(engine: Arc<ClassificationEngine>, max_batch_size: usize) -> Self {
        Self {
            engine,
            max_batch_size,
        }
    }

    pub fn engine(&self) -> &Arc<ClassificationEngine> {
        &self.engine
    }

    /// Rejects the whole request before classifying anything if it is oversized or any
    /// item is invalid. A slot is `None` only when its task died.
    pub async fn classify_batch(
        &self,
        items: Vec<ContentItem>,
    ) -> Result<Vec<Option<ClassificationResult>>, BatchError> {
        if items.len() > self.max_batch_size {
            return Err(BatchError::TooLarge {
                len: items.len(),
                max: self.max_batch_size,
            });
        }
        for (index, item) in items.iter().enumerate() {
            validate_content(&item.content)
                .map_err(|reason| BatchError::InvalidItem { index, reason })?;
        }

        let total = items.len();
        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let engine = self.engine.clone();
                tokio::spawn(async move { engine.classify(&item.content).await })
            })
            .collect();

        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, joined)| match joined {
                Ok(result) => Some(result),
                Err(err) => {
                    tracing::error!(target: "batch", index, error = %err, "batch item task failed");
                    None
                }
            })
            .collect();

        tracing::debug!(
            target: "batch",
            total,
            failed = results.iter().filter(|r| r.is_none()).count(),
            "batch classified"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        ai::{backend::testing::FakeBackend, ClassifyError, RetryPolicy},
        config::CacheConfig,
        domain::{Intent, IntentCatalog},
    };

    fn coordinator(backend: Arc<FakeBackend>, max: usize) -> BatchCoordinator {
        let engine = ClassificationEngine::new(
            backend,
            Arc::new(IntentCatalog::default()),
            &CacheConfig::default(),
            RetryPolicy {
                retry_delay: Duration::ZERO,
                ..RetryPolicy::default()
            },
        );
        BatchCoordinator::new(Arc::new(engine), max)
    }

    fn item(text: &str) -> ContentItem {
        ContentItem::new(text, "twitter")
    }

    const A: &str = "Alpha post that is clearly long enough to classify";
    const B: &str = "Bravo post that is clearly long enough to classify";
    const C: &str = "Charlie post that is clearly long enough to classify";

    #[tokio::test]
    async fn oversized_batch_is_rejected_without_classifying() {
        let backend = Arc::new(FakeBackend::replying(r#"{"intent": "hype", "confidence": 0.5}"#));
        let batch = coordinator(backend.clone(), 50);
        let items = (0..55).map(|n| item(&format!("{A} #{n}"))).collect();
        assert_eq!(
            batch.classify_batch(items).await,
            Err(BatchError::TooLarge { len: 55, max: 50 })
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_item_rejects_whole_batch() {
        let backend = Arc::new(FakeBackend::replying(r#"{"intent": "hype", "confidence": 0.5}"#));
        let batch = coordinator(backend.clone(), 50);
        let err = batch
            .classify_batch(vec![item(A), item(""), item(C)])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BatchError::InvalidItem {
                index: 1,
                reason: ContentError::Empty
            }
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn results_follow_input_order_not_completion_order() {
        let backend = Arc::new(FakeBackend::new(|prompt, _| {
            // A finishes last, C first.
            let (delay, intent) = if prompt.contains(A) {
                (300, "ragebait")
            } else if prompt.contains(B) {
                (200, "hype")
            } else {
                (100, "genuine")
            };
            (
                Duration::from_millis(delay),
                Ok(format!(r#"{{"intent": "{intent}", "confidence": 0.9}}"#)),
            )
        }));
        let results = coordinator(backend, 50)
            .classify_batch(vec![item(A), item(B), item(C)])
            .await
            .unwrap();
        let intents: Vec<_> = results.iter().map(|r| r.as_ref().unwrap().intent).collect();
        assert_eq!(intents, vec![Intent::Ragebait, Intent::Hype, Intent::Genuine]);
    }

    #[tokio::test]
    async fn failing_item_does_not_disturb_neighbours() {
        let backend = Arc::new(FakeBackend::new(|prompt, _| {
            if prompt.contains(B) {
                (
                    Duration::ZERO,
                    Err(ClassifyError::BackendUnreachable("connection reset".into())),
                )
            } else {
                (
                    Duration::ZERO,
                    Ok(r#"{"intent": "divisive", "confidence": 0.8}"#.to_string()),
                )
            }
        }));
        let results = coordinator(backend, 50)
            .classify_batch(vec![item(A), item(B), item(C)])
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().intent, Intent::Divisive);
        let failed = results[1].as_ref().unwrap();
        assert_eq!(failed.intent, Intent::Neutral);
        assert!(failed.reasoning.starts_with("Classification failed"));
        assert_eq!(results[2].as_ref().unwrap().intent, Intent::Divisive);
    }

    #[tokio::test]
    async fn crashed_item_becomes_null_slot() {
        let backend = Arc::new(FakeBackend::new(|prompt, _| {
            if prompt.contains(B) {
                panic!("backend adapter bug");
            }
            (
                Duration::ZERO,
                Ok(r#"{"intent": "hype", "confidence": 0.4}"#.to_string()),
            )
        }));
        let results = coordinator(backend, 50)
            .classify_batch(vec![item(A), item(B), item(C)])
            .await
            .unwrap();
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_some());
    }

    #[tokio::test]
    async fn empty_batch_is_fine() {
        let backend = Arc::new(FakeBackend::replying("{}"));
        let results = coordinator(backend, 50).classify_batch(Vec::new()).await.unwrap();
        assert!(results.is_empty());
    }
}
