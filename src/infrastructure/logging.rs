use std::io;

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{config::LoggingConfig, infrastructure::directories::ResolvedPaths};

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Installs the global subscriber: stderr always, plus a daily-rolling `file_prefix.*`
/// under the logs directory when file logging is on. Later calls are no-ops.
pub fn init_tracing(
    logging: &LoggingConfig,
    paths: &ResolvedPaths,
    file_prefix: &str,
) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let console_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_ansi(true);

        let file_layer = logging.to_file.then(|| {
            let appender = tracing_appender::rolling::daily(&paths.logs_dir, file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = GUARD.set(guard);
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
        });

        tracing_subscriber::registry()
            .with(build_filter(&logging.level))
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::info!(
            target: "lifecycle",
            level = %logging.level,
            file = logging.to_file.then_some(file_prefix).unwrap_or("-"),
            logs = %paths.logs_dir.display(),
            "tracing initialized"
        );
        Ok(())
    })?;
    Ok(())
}

/// `RUST_LOG` wins over the configured level; an unparsable level falls back to `info`.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

