use std::{env, sync::Arc, time::Duration};

use anyhow::Result;
use intentkeeper::{
    app::http_client,
    client::{ClientBatcher, ContentScheduler, HttpTransport, MemoryFeed, SettingsStore},
    config,
    infrastructure::{directories, logging, shutdown},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::{sleep, Instant},
};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(90);
const DRAIN_POLL: Duration = Duration::from_secs(1);

/// Reads posts from stdin, one per line (optionally `source<TAB>text`), and logs the
/// decision for each once the classification server has answered.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths =
        directories::ensure_directories(&config.directories, config.intents_path.as_deref())?;
    logging::init_tracing(&config.logging, &paths, "intentkeeper-watch.log")?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let settings = SettingsStore::from_record(env::var("INTENTKEEPER_SETTINGS").ok().as_deref());
    tracing::info!(target: "settings", settings = ?settings.get(), "settings loaded");

    let transport = HttpTransport::new(http_client()?, &config.client.server_url)?;
    let batcher = ClientBatcher::new(
        Arc::new(transport),
        config.client.cache_size,
        config.client.batch_size,
    );
    let feed = Arc::new(MemoryFeed::new());
    let scheduler = Arc::new(ContentScheduler::new(
        feed.clone(),
        batcher,
        settings.subscribe(),
        config.client.debounce,
    ));
    let handle = scheduler.clone().spawn(shutdown.subscribe());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut listener = shutdown.subscribe();
    while let Some(line) = listener.guard(lines.next_line()).await {
        let Some(line) = line? else { break };
        let (source, text) = line.split_once('\t').unwrap_or(("stdin", line.as_str()));
        if text.trim().is_empty() {
            continue;
        }
        feed.push(text, source);
        scheduler.notify_changed();
    }

    let deadline = Instant::now() + DRAIN_TIMEOUT;
    while !listener.is_triggered() && (feed.unmarked() > 0 || scheduler.is_processing()) {
        if Instant::now() >= deadline {
            tracing::warn!(
                target: "scheduler",
                unmarked = feed.unmarked(),
                "gave up waiting for the classification server"
            );
            break;
        }
        sleep(DRAIN_POLL).await;
        // Retries items that were left alone while the server was not ready.
        scheduler.notify_changed();
    }

    shutdown.trigger();
    let _ = handle.await;
    Ok(())
}
