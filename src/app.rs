use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, task::JoinHandle, time::sleep};

use crate::{
    ai::{ClassificationEngine, OllamaClient, RetryPolicy},
    config::AppConfig,
    domain::IntentCatalog,
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    server::{self, AppState, BatchCoordinator},
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(format!("intentkeeper/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build http client")
}

pub struct IntentKeeperApp {
    _paths: ResolvedPaths,
    listener: TcpListener,
    state: AppState,
    shutdown: Shutdown,
}

impl IntentKeeperApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let host = config.server.host.as_str();
        let port = config.server.port;
        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("failed to bind {host}:{port}"))?;

        let backend = OllamaClient::new(http_client()?, config.backend.clone())?;
        if let (Some(path), None) = (&config.intents_path, &paths.intents_file) {
            tracing::warn!(
                target: "config",
                path = %path.display(),
                "intents file not found, using built-in definitions"
            );
        }
        let catalog = IntentCatalog::load_or_default(paths.intents_file.as_deref());
        let engine = ClassificationEngine::new(
            Arc::new(backend.clone()),
            Arc::new(catalog),
            &config.cache,
            RetryPolicy::from_config(&config.backend),
        );

        if engine.health().await {
            tracing::info!(
                target: "engine",
                host = %backend.host(),
                model = engine.model(),
                "backend reachable"
            );
        } else {
            tracing::warn!(
                target: "engine",
                host = %backend.host(),
                model = engine.model(),
                "backend unreachable, classifications will fail open until it comes up"
            );
        }

        let batch = BatchCoordinator::new(Arc::new(engine), config.batch.max_batch_size);
        Ok(Self {
            _paths: paths,
            listener,
            state: AppState::new(Arc::new(batch)),
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let IntentKeeperApp {
            _paths: _,
            listener,
            state,
            shutdown,
        } = self;

        tracing::info!(
            target: "lifecycle",
            version = env!("CARGO_PKG_VERSION"),
            "intentkeeper starting"
        );

        let mut shutdown_listener = shutdown.subscribe();
        let mut server_handle: JoinHandle<Result<()>> =
            tokio::spawn(server::serve(listener, state, shutdown.subscribe()));
        let mut server_completed = false;

        tokio::select! {
            _ = shutdown_listener.notified() => {
                tracing::info!(target: "lifecycle", "shutdown signal received");
            }
            res = &mut server_handle => {
                server_completed = true;
                log_server_exit(res);
            }
        }

        shutdown.trigger();

        if !server_completed {
            let wait = sleep(SHUTDOWN_TIMEOUT);
            tokio::pin!(wait);
            tokio::select! {
                res = &mut server_handle => log_server_exit(res),
                _ = &mut wait => {
                    tracing::warn!(
                        target: "lifecycle",
                        "server did not stop within {:?}; aborting open connections",
                        SHUTDOWN_TIMEOUT
                    );
                    server_handle.abort();
                }
            }
        }

        tracing::info!(target: "lifecycle", "intentkeeper stopped");
        Ok(())
    }
}

fn log_server_exit(res: Result<Result<()>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) => tracing::info!(target: "server", "server stopped"),
        Ok(Err(err)) => tracing::error!(target: "server", error = ?err, "server exited with error"),
        Err(err) if err.is_panic() => tracing::error!(target: "server", "server task panicked"),
        Err(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn config(port: u16) -> AppConfig {
        let mut config = AppConfig::default();
        config.server.port = port;
        config.backend.host = Url::parse("http://127.0.0.1:9").unwrap();
        config
    }

    fn paths() -> ResolvedPaths {
        ResolvedPaths {
            logs_dir: std::env::temp_dir(),
            intents_file: None,
        }
    }

    #[tokio::test]
    async fn starts_with_backend_down_and_stops_on_shutdown() {
        let (shutdown, _) = Shutdown::new();
        let app = IntentKeeperApp::initialize(config(0), paths(), shutdown.clone())
            .await
            .unwrap();
        let handle = tokio::spawn(app.run());

        sleep(Duration::from_millis(50)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn binds_hostnames_as_well_as_addresses() {
        let mut named = config(0);
        named.server.host = "localhost".into();
        let (shutdown, _) = Shutdown::new();
        let app = IntentKeeperApp::initialize(named, paths(), shutdown)
            .await
            .unwrap();
        assert!(app.listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn port_already_in_use_fails_initialization() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let (shutdown, _) = Shutdown::new();
        let err = IntentKeeperApp::initialize(config(port), paths(), shutdown)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }
}
