mod config;
mod fs_media;
mod gc;

use std::sync::Arc;

use tracing::info;

use parley_db::Database;
use parley_store::{Registries, Store};

use crate::config::{ServerConfig, Settings};
use crate::fs_media::FsMedia;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug".into()),
        )
        .init();

    // Config
    let settings = Settings::from_env()?;
    let config = ServerConfig::load(&settings.config_path)?;
    info!("Loaded config from {}", settings.config_path.display());

    // `parley init-db [--reset]` creates the schema and exits.
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("init-db") {
        let reset = args.iter().any(|a| a == "--reset");
        let db = Database::new();
        Store::init_db(&db, &config.store_config, reset)?;
        info!("Database initialized");
        return Ok(());
    }

    // Handlers
    let registries = Arc::new(Registries::new());
    registries.register_media_handler(fs_media::NAME, Arc::new(FsMedia::new()))?;
    if let Some(name) = &config.media.use_handler {
        registries.use_media_handler(name, &config.media.handler_config(name))?;
    }

    // Store
    let store = Arc::new(Store::open(
        Arc::new(Database::new()),
        settings.worker_id,
        &config.store_config,
        registries,
    )?);

    // Background GC of unused uploads
    let gc = tokio::spawn(gc::run_gc_loop(store.clone(), settings.gc));
    info!(
        "Parley store running (GC every {}s, batch {})",
        settings.gc.interval.as_secs(),
        settings.gc.batch
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    gc.abort();
    store.close()?;

    Ok(())
}
