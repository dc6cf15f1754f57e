use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
    time::sleep,
};

use crate::{
    domain::{is_too_short, truncate_content, ContentItem, Settings},
    infrastructure::shutdown::ShutdownListener,
};

use super::{
    batcher::ClientBatcher,
    resolver::{resolve_action, Decision},
};

static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

pub type ContentId = u64;

/// Final mark left on a piece of content. Marked content is never scanned again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Processed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct DiscoveredContent {
    pub id: ContentId,
    pub text: String,
    pub source: String,
}

/// The host the scheduler reads content from and hands decisions back to.
pub trait ContentSource: Send + Sync {
    /// Content that carries no mark yet.
    fn scan(&self) -> Vec<DiscoveredContent>;

    fn mark(&self, id: ContentId, state: ItemState);

    fn apply(&self, id: ContentId, decision: &Decision);
}

/// Normalised text as sent to the server, capped so one long post cannot get its
/// whole chunk rejected.
pub fn extract_text(raw: &str) -> String {
    truncate_content(&WHITESPACE_REGEX.replace_all(raw.trim(), " "))
}

/// Debounced, non-reentrant scan/classify/apply loop.
///
/// `processing` guarantees at most one scan at a time; a `run` that arrives while a
/// scan is in flight only raises `pending_reprocess`, which buys exactly one more
/// pass once the current one finishes. A caller that raises the flag after the holder
/// let go claims the slot itself, so a raised flag always has an owner.
pub struct ContentScheduler {
    source: Arc<dyn ContentSource>,
    batcher: ClientBatcher,
    settings: watch::Receiver<Settings>,
    debounce: Duration,
    changed: Notify,
    processing: AtomicBool,
    pending_reprocess: AtomicBool,
}

impl ContentScheduler {
    pub fn new(
        source: Arc<dyn ContentSource>,
        batcher: ClientBatcher,
        settings: watch::Receiver<Settings>,
        debounce: Duration,
    ) -> Self {
        Self {
            source,
            batcher,
            settings,
            debounce,
            changed: Notify::new(),
            processing: AtomicBool::new(false),
            pending_reprocess: AtomicBool::new(false),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Signals that content changed. Bursts collapse into one run after the debounce window.
    pub fn notify_changed(&self) {
        self.changed.notify_one();
    }

    pub fn spawn(self: Arc<Self>, shutdown: ShutdownListener) -> JoinHandle<()> {
        // Content already present when the scheduler starts gets picked up too.
        self.notify_changed();
        tokio::spawn(async move {
            self.debounce_loop(shutdown).await;
            tracing::info!(target: "scheduler", "content scheduler stopped");
        })
    }

    async fn debounce_loop(self: Arc<Self>, mut shutdown: ShutdownListener) {
        let mut settings = self.settings.clone();
        let mut settings_open = true;
        loop {
            tokio::select! {
                _ = self.changed.notified() => {}
                res = settings.changed(), if settings_open => {
                    if res.is_err() {
                        settings_open = false;
                        continue;
                    }
                    tracing::debug!(target: "scheduler", "settings changed");
                }
                _ = shutdown.notified() => return,
            }

            loop {
                tokio::select! {
                    _ = sleep(self.debounce) => break,
                    _ = self.changed.notified() => continue,
                    _ = shutdown.notified() => return,
                }
            }

            let scheduler = self.clone();
            tokio::spawn(async move { scheduler.run().await });
        }
    }

    pub async fn run(&self) {
        if self.processing.swap(true, Ordering::SeqCst) {
            self.pending_reprocess.store(true, Ordering::SeqCst);
            // The holder may have checked the flag just before we raised it.
            if self.processing.swap(true, Ordering::SeqCst) {
                tracing::debug!(target: "scheduler", "scan in flight, queued a reprocess");
                return;
            }
            // Our scan has not started yet, so it covers whatever was queued.
            self.pending_reprocess.store(false, Ordering::SeqCst);
        }

        loop {
            self.process_once().await;
            self.processing.store(false, Ordering::SeqCst);

            if !self.pending_reprocess.swap(false, Ordering::SeqCst) {
                break;
            }
            // Someone else may have claimed the slot in between; their scan covers ours.
            if self.processing.swap(true, Ordering::SeqCst) {
                break;
            }
            tracing::debug!(target: "scheduler", "reprocessing content that arrived mid-batch");
        }
    }

    async fn process_once(&self) {
        if !self.current_settings().enabled {
            tracing::debug!(target: "scheduler", "filtering disabled, skipping scan");
            return;
        }

        let health = self.batcher.transport().health().await;
        if !health.is_ready() {
            tracing::warn!(
                target: "scheduler",
                status = ?health.status,
                backend_connected = health.backend_connected,
                "classification server not ready, skipping scan"
            );
            return;
        }

        let discovered = self.source.scan();
        if discovered.is_empty() {
            return;
        }

        let mut pending = Vec::with_capacity(discovered.len());
        let mut skipped = 0usize;
        for content in discovered {
            let text = extract_text(&content.text);
            if is_too_short(&text) {
                self.source.mark(content.id, ItemState::Skipped);
                skipped += 1;
                continue;
            }
            pending.push((content.id, ContentItem::new(text, content.source)));
        }

        let items: Vec<ContentItem> = pending.iter().map(|(_, item)| item.clone()).collect();
        let results = self.batcher.classify_items(&items).await;

        // Settings may have moved while the batch was in flight.
        let settings = self.current_settings();
        let mut failed = 0usize;
        for ((id, _), result) in pending.iter().zip(results) {
            match result {
                Some(result) => {
                    let decision = resolve_action(&result, &settings);
                    self.source.apply(*id, &decision);
                    self.source.mark(*id, ItemState::Processed);
                }
                None => {
                    self.source.mark(*id, ItemState::Failed);
                    failed += 1;
                }
            }
        }

        tracing::info!(
            target: "scheduler",
            classified = pending.len() - failed,
            skipped,
            failed,
            "scan complete"
        );
    }

    fn current_settings(&self) -> Settings {
        self.settings.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::{feed::MemoryFeed, settings::SettingsStore, transport::testing::FakeTransport},
        domain::{Action, HealthStatus, Intent, MAX_CONTENT_LENGTH},
        infrastructure::shutdown::Shutdown,
    };

    const RAGEBAIT: &str = "Scroll, scroll, scroll. WAKE UP PEOPLE. THIS IS HOW THEY WANT YOU.";
    const BAIT: &str = "Like if you agree, comment if you care, share with everyone!";
    const PLAIN: &str = "The community garden opens again next Saturday morning.";

    fn scheduler(
        feed: Arc<MemoryFeed>,
        transport: Arc<FakeTransport>,
        store: &SettingsStore,
    ) -> Arc<ContentScheduler> {
        Arc::new(ContentScheduler::new(
            feed,
            ClientBatcher::new(transport, 1000, 5),
            store.subscribe(),
            Duration::from_millis(200),
        ))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition never became true");
    }

    #[test]
    fn extraction_collapses_whitespace() {
        assert_eq!(extract_text("  WAKE\n\n UP\tPEOPLE  "), "WAKE UP PEOPLE");
    }

    #[test]
    fn extraction_caps_length() {
        let text = extract_text(&"word\n".repeat(MAX_CONTENT_LENGTH));
        assert_eq!(text.chars().count(), MAX_CONTENT_LENGTH);
    }

    #[tokio::test]
    async fn long_post_does_not_sink_its_chunk() {
        let feed = Arc::new(MemoryFeed::new());
        let transport = Arc::new(FakeTransport::new());
        let store = SettingsStore::default();
        let rage = feed.push(RAGEBAIT, "twitter");
        let long = feed.push(&"A calm post about gardening. ".repeat(120), "reddit");
        let plain = feed.push(PLAIN, "reddit");

        scheduler(feed.clone(), transport.clone(), &store).run().await;

        for id in [rage, long, plain] {
            assert_eq!(feed.state(id), Some(ItemState::Processed));
        }
        assert_eq!(feed.decision(rage).unwrap().action, Action::Blur);
        let batches = transport.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][1].chars().count(), MAX_CONTENT_LENGTH);
    }

    #[tokio::test]
    async fn run_classifies_skips_and_applies() {
        let feed = Arc::new(MemoryFeed::new());
        let transport = Arc::new(FakeTransport::new());
        let store = SettingsStore::default();
        let rage = feed.push(RAGEBAIT, "twitter");
        let short = feed.push("Hi", "twitter");
        let bait = feed.push(BAIT, "facebook");
        let plain = feed.push(PLAIN, "reddit");

        scheduler(feed.clone(), transport.clone(), &store).run().await;

        assert_eq!(feed.state(short), Some(ItemState::Skipped));
        assert_eq!(feed.decision(short), None);
        assert_eq!(feed.state(rage), Some(ItemState::Processed));
        assert_eq!(feed.decision(rage).unwrap().action, Action::Blur);
        // 0.6 weight x 0.8 confidence stays under the 0.6 threshold
        let bait_decision = feed.decision(bait).unwrap();
        assert_eq!(bait_decision.action, Action::Tag);
        assert_eq!(bait_decision.label, Some(Intent::EngagementBait));
        let plain_decision = feed.decision(plain).unwrap();
        assert_eq!(plain_decision.action, Action::Pass);
        assert_eq!(plain_decision.label, None);

        assert_eq!(transport.batch_count(), 1);
        assert_eq!(transport.batches.lock()[0].len(), 3);
    }

    #[tokio::test]
    async fn threshold_change_is_picked_up_without_rebuilding() {
        let feed = Arc::new(MemoryFeed::new());
        let transport = Arc::new(FakeTransport::new());
        let store = SettingsStore::default();
        let scheduler = scheduler(feed.clone(), transport, &store);

        store.update(|s| s.manipulation_threshold = 0.8).unwrap();
        let rage = feed.push(RAGEBAIT, "twitter");
        scheduler.run().await;

        let decision = feed.decision(rage).unwrap();
        assert_eq!(decision.action, Action::Tag);
        assert_eq!(decision.label, Some(Intent::Ragebait));
    }

    #[tokio::test]
    async fn marked_content_is_not_rescanned() {
        let feed = Arc::new(MemoryFeed::new());
        let transport = Arc::new(FakeTransport::new());
        let store = SettingsStore::default();
        let scheduler = scheduler(feed.clone(), transport.clone(), &store);
        feed.push(RAGEBAIT, "twitter");

        scheduler.run().await;
        scheduler.run().await;
        assert_eq!(transport.batch_count(), 1);
        assert_eq!(feed.unmarked(), 0);
    }

    #[tokio::test]
    async fn run_during_scan_queues_exactly_one_more_pass() {
        let feed = Arc::new(MemoryFeed::new());
        let transport = Arc::new(FakeTransport::gated());
        let store = SettingsStore::default();
        let scheduler = scheduler(feed.clone(), transport.clone(), &store);
        let first = feed.push(RAGEBAIT, "twitter");

        let in_flight = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };
        wait_until(|| transport.max_in_flight.load(Ordering::SeqCst) == 1).await;
        assert!(scheduler.is_processing());

        let late = feed.push(BAIT, "facebook");
        scheduler.run().await;
        scheduler.run().await;
        assert_eq!(feed.scans(), 1, "no second scan may start while one is in flight");

        transport.release(10);
        in_flight.await.unwrap();

        assert_eq!(feed.scans(), 2);
        assert!(!scheduler.is_processing());
        assert_eq!(feed.state(first), Some(ItemState::Processed));
        assert_eq!(feed.state(late), Some(ItemState::Processed));
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(transport.batch_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_runs_never_strand_a_queued_pass() {
        let feed = Arc::new(MemoryFeed::new());
        let transport = Arc::new(FakeTransport::new());
        let store = SettingsStore::default();
        let scheduler = scheduler(feed.clone(), transport, &store);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let scheduler = scheduler.clone();
                tokio::spawn(async move {
                    for _ in 0..500 {
                        scheduler.run().await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert!(!scheduler.is_processing());
        assert!(!scheduler.pending_reprocess.load(Ordering::SeqCst));
        assert!(feed.scans() > 0);
    }

    #[tokio::test]
    async fn unhealthy_server_means_no_processing() {
        let feed = Arc::new(MemoryFeed::new());
        let transport = Arc::new(FakeTransport::new());
        transport.health.lock().status = HealthStatus::Degraded;
        let store = SettingsStore::default();
        let id = feed.push(RAGEBAIT, "twitter");

        scheduler(feed.clone(), transport.clone(), &store).run().await;
        assert_eq!(feed.scans(), 0);
        assert_eq!(feed.state(id), None);
        assert_eq!(transport.batch_count(), 0);
    }

    #[tokio::test]
    async fn transport_failure_marks_items_failed_and_leaves_them_untouched() {
        let feed = Arc::new(MemoryFeed::new());
        let transport = Arc::new(FakeTransport::failing_on("WAKE UP"));
        let store = SettingsStore::default();
        let id = feed.push(RAGEBAIT, "twitter");

        scheduler(feed.clone(), transport, &store).run().await;
        assert_eq!(feed.state(id), Some(ItemState::Failed));
        assert_eq!(feed.decision(id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_are_debounced_into_one_scan() {
        let feed = Arc::new(MemoryFeed::new());
        let transport = Arc::new(FakeTransport::new());
        let store = SettingsStore::default();
        let scheduler = scheduler(feed.clone(), transport.clone(), &store);
        let (shutdown, listener) = Shutdown::new();
        let handle = scheduler.clone().spawn(listener);

        for n in 0..5 {
            feed.push(&format!("{PLAIN} (update {n})"), "reddit");
            scheduler.notify_changed();
            sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(feed.scans(), 0);

        sleep(Duration::from_millis(300)).await;
        assert_eq!(feed.scans(), 1);
        assert_eq!(feed.unmarked(), 0);
        assert_eq!(transport.batch_count(), 1);

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn enabling_filtering_triggers_a_scan() {
        let feed = Arc::new(MemoryFeed::new());
        let transport = Arc::new(FakeTransport::new());
        let store = SettingsStore::new(Settings {
            enabled: false,
            ..Settings::default()
        });
        let scheduler = scheduler(feed.clone(), transport.clone(), &store);
        let (shutdown, listener) = Shutdown::new();
        let handle = scheduler.clone().spawn(listener);
        let id = feed.push(RAGEBAIT, "twitter");

        sleep(Duration::from_millis(500)).await;
        assert_eq!(feed.state(id), None);

        store.update(|s| s.enabled = true).unwrap();
        sleep(Duration::from_millis(500)).await;
        assert_eq!(feed.state(id), Some(ItemState::Processed));

        shutdown.trigger();
        handle.await.unwrap();
    }
}
