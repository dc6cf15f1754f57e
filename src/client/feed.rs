use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use super::{
    resolver::Decision,
    scheduler::{ContentId, ContentSource, DiscoveredContent, ItemState},
};

const DEFAULT_HISTORY: usize = 1000;

struct PendingEntry {
    id: ContentId,
    text: String,
    source: String,
    decision: Option<Decision>,
}

struct SettledEntry {
    id: ContentId,
    state: ItemState,
    decision: Option<Decision>,
}

#[derive(Default)]
struct FeedState {
    pending: Vec<PendingEntry>,
    settled: VecDeque<SettledEntry>,
}

/// Content source backed by memory. Scans only walk unmarked entries; once an entry is
/// marked its text is dropped and only its outcome is kept, for the most recent
/// `history` entries.
pub struct MemoryFeed {
    state: Mutex<FeedState>,
    history: usize,
    next_id: AtomicU64,
    scans: AtomicUsize,
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: usize) -> Self {
        Self {
            state: Mutex::new(FeedState::default()),
            history,
            next_id: AtomicU64::new(0),
            scans: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, text: &str, source: &str) -> ContentId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.state.lock().pending.push(PendingEntry {
            id,
            text: text.to_string(),
            source: source.to_string(),
            decision: None,
        });
        id
    }

    /// `None` while the entry is unmarked or once it has aged out of the history.
    pub fn state(&self, id: ContentId) -> Option<ItemState> {
        self.state
            .lock()
            .settled
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.state)
    }

    pub fn decision(&self, id: ContentId) -> Option<Decision> {
        let state = self.state.lock();
        if let Some(entry) = state.settled.iter().find(|entry| entry.id == id) {
            return entry.decision.clone();
        }
        state
            .pending
            .iter()
            .find(|entry| entry.id == id)
            .and_then(|entry| entry.decision.clone())
    }

    pub fn unmarked(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn settled(&self) -> usize {
        self.state.lock().settled.len()
    }

    /// Number of scans that actually looked at the feed.
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::Acquire)
    }
}

impl ContentSource for MemoryFeed {
    fn scan(&self) -> Vec<DiscoveredContent> {
        self.scans.fetch_add(1, Ordering::AcqRel);
        self.state
            .lock()
            .pending
            .iter()
            .map(|entry| DiscoveredContent {
                id: entry.id,
                text: entry.text.clone(),
                source: entry.source.clone(),
            })
            .collect()
    }

    fn mark(&self, id: ContentId, item_state: ItemState) {
        let mut state = self.state.lock();
        let Some(index) = state.pending.iter().position(|entry| entry.id == id) else {
            return;
        };
        let entry = state.pending.swap_remove(index);
        state.settled.push_back(SettledEntry {
            id,
            state: item_state,
            decision: entry.decision,
        });
        while state.settled.len() > self.history {
            state.settled.pop_front();
        }
    }

    fn apply(&self, id: ContentId, decision: &Decision) {
        tracing::info!(
            target: "feed",
            id,
            action = %decision.action,
            label = decision.label.map(|intent| intent.as_str()).unwrap_or("-"),
            score = decision.manipulation_score,
            "decision applied"
        );
        let mut state = self.state.lock();
        if let Some(entry) = state.pending.iter_mut().find(|entry| entry.id == id) {
            entry.decision = Some(decision.clone());
        }
    }
}
