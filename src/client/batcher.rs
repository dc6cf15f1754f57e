use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    cache::{content_hash, ClientCache},
    domain::{ClassificationResult, ContentItem},
};

use super::transport::ClassifyTransport;

/// Client half of batching: answers from the local cache first, then sends the misses
/// to the server in fixed-size chunks, one chunk at a time.
pub struct ClientBatcher {
    transport: Arc<dyn ClassifyTransport>,
    cache: Mutex<ClientCache>,
    chunk_size: usize,
}

impl ClientBatcher {
    pub fn new(
        transport: Arc<dyn ClassifyTransport>,
        cache_size: usize,
        chunk_size: usize,
    ) -> Self {
        Self {
            transport,
            cache: Mutex::new(ClientCache::new(cache_size)),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn transport(&self) -> &Arc<dyn ClassifyTransport> {
        &self.transport
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }

    /// One slot per input item; `None` means the item could not be classified.
    pub async fn classify_items(&self, items: &[ContentItem]) -> Vec<Option<ClassificationResult>> {
        let mut slots: Vec<Option<ClassificationResult>> = vec![None; items.len()];
        let mut pending = Vec::new();
        {
            let mut cache = self.cache.lock();
            for (slot, item) in items.iter().enumerate() {
                let key = content_hash(&item.content);
                match cache.get(&key) {
                    Some(hit) => slots[slot] = Some(hit),
                    None => pending.push((slot, key, item.clone())),
                }
            }
        }

        let hits = items.len() - pending.len();
        tracing::debug!(
            target: "scheduler",
            total = items.len(),
            hits,
            misses = pending.len(),
            "client cache checked"
        );

        for chunk in pending.chunks(self.chunk_size) {
            let batch: Vec<ContentItem> = chunk.iter().map(|(_, _, item)| item.clone()).collect();
            match self.transport.classify_batch(&batch).await {
                Ok(results) => {
                    let mut cache = self.cache.lock();
                    for ((slot, key, _), result) in chunk.iter().zip(results) {
                        let Some(result) = result else { continue };
                        // Fail-open answers are not worth remembering.
                        if result.confidence > 0.0 {
                            cache.put(key.clone(), result.clone());
                        }
                        slots[*slot] = Some(result);
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        target: "transport",
                        error = %err,
                        items = chunk.len(),
                        "batch request failed, marking chunk as failed"
                    );
                }
            }
        }
        slots
    }
}
