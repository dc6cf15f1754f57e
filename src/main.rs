use anyhow::Result;
use intentkeeper::{
    app,
    config,
    infrastructure::{directories, logging, shutdown},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths =
        directories::ensure_directories(&config.directories, config.intents_path.as_deref())?;
    logging::init_tracing(&config.logging, &paths, "intentkeeper.log")?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::IntentKeeperApp::initialize(config, paths, shutdown.clone()).await?;
    app.run().await
}
