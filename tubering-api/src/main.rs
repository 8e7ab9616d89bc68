//! tubering-api - classroom video safety service
//!
//! Analyzes YouTube videos for classroom use with Gemini, recommends
//! educational videos through the YouTube Data API, and stores teachers'
//! saved-video collections and community board in SQLite.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tubering_common::config::{
    config_file_path, load_toml_config_optional, RootFolderInitializer, RootFolderResolver,
    DEFAULT_PORT,
};
use tubering_common::events::EventBus;

use tubering_api::db::search_cache::{self, DEFAULT_TTL_SECS};
use tubering_api::services::youtube_client::SearchCache;
use tubering_api::services::{GeminiClient, SettingsKeyIndex, YouTubeClient};
use tubering_api::AppState;

/// Command-line arguments for tubering-api
#[derive(Parser, Debug)]
#[command(name = "tubering-api")]
#[command(about = "Classroom video safety analysis and recommendation service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "TUBERING_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = load_toml_config_optional().unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting tubering-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Root folder and database
    let root_folder = RootFolderResolver::new(args.root_folder).resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = tubering_api::db::init_database_pool(&db_path).await?;

    // API keys: missing keys leave the service up but degraded
    let gemini_key = match tubering_api::config::resolve_gemini_api_key(&db_pool, &toml_config).await {
        Ok(key) => Some(key),
        Err(e) => {
            warn!("{}", e);
            None
        }
    };
    let youtube_keys =
        match tubering_api::config::resolve_youtube_api_keys(&db_pool, &toml_config).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        };

    let gemini_slot = Arc::new(RwLock::new(gemini_key));
    let youtube_slot = Arc::new(RwLock::new(youtube_keys));

    let model = GeminiClient::new(gemini_slot.clone(), toml_config.gemini_model.clone())?;
    info!("Gemini model: {}", model.model());

    let ttl_secs = toml_config.search_cache_ttl_secs.unwrap_or(DEFAULT_TTL_SECS);
    match search_cache::purge_expired(&db_pool, ttl_secs).await {
        Ok(purged) if purged > 0 => info!(purged, "Purged expired search cache entries"),
        Ok(_) => {}
        Err(e) => warn!("Search cache purge failed: {}", e),
    }

    let catalog = YouTubeClient::new(
        youtube_slot.clone(),
        Arc::new(SettingsKeyIndex::new(db_pool.clone())),
    )?
    .with_cache(SearchCache {
        pool: db_pool.clone(),
        ttl_secs,
    });

    let event_bus = EventBus::new(100);

    let state = AppState::new(db_pool, event_bus, Arc::new(model), Arc::new(catalog))
        .with_key_slots(gemini_slot, youtube_slot)
        .with_toml_path(config_file_path());

    let app = tubering_api::build_router(state);

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
