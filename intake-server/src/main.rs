//! Intake Server - mobile analytics submission endpoint

mod handler;
mod management;
mod reload;
mod server;
mod sink;
mod stats;

use anyhow::Result;
use intake_common::{IntakeConfig, PostDistrictMapper};
use sink::{ObjectKeyNameProvider, StreamClient, UniqueObjectKeyNameProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Shared application state
pub struct AppState {
    pub config: Arc<RwLock<IntakeConfig>>,
    pub mapper: Arc<RwLock<PostDistrictMapper>>,
    pub stats: Arc<RwLock<stats::Stats>>,
    pub keys: Arc<dyn ObjectKeyNameProvider>,
    pub stream: StreamClient,
    pub start_time: std::time::Instant,
    pub config_path: PathBuf,
}

impl AppState {
    pub fn new(
        config: IntakeConfig,
        mapper: PostDistrictMapper,
        config_path: PathBuf,
        keys: Arc<dyn ObjectKeyNameProvider>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            mapper: Arc::new(RwLock::new(mapper)),
            stats: Arc::new(RwLock::new(stats::Stats::default())),
            keys,
            stream: sink::stream_client(),
            start_time: std::time::Instant::now(),
            config_path,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intake=info".parse()?)
        )
        .init();

    info!("Starting Intake Server v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("intake.toml"));

    // Load or create default configuration
    let mut config = if config_path.exists() {
        info!("Loading configuration from {}", config_path.display());
        IntakeConfig::load(&config_path)?
    } else {
        info!("No configuration file found, using defaults");
        let config = IntakeConfig::default();
        // Save default config for reference
        if let Err(e) = config.save(&config_path) {
            error!("Failed to save default config: {}", e);
        }
        config
    };

    reload::apply_env_overrides(&mut config);
    if config.submission.maintenance_mode {
        warn!("Maintenance mode is on, submissions will be rejected");
    }

    config.validate()?;
    let mapper = reload::mapper_for(&config)?;

    // Create shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        mapper,
        config_path.clone(),
        Arc::new(UniqueObjectKeyNameProvider),
    ));

    // Start file watcher for live reloading
    let reload_state = state.clone();
    let reload_handle = tokio::spawn(async move {
        if let Err(e) = reload::watch_config(reload_state).await {
            error!("Config watcher error: {}", e);
        }
    });

    // Start management WebSocket server
    let mgmt_state = state.clone();
    let mgmt_handle = if config.management.enabled {
        let addr = format!("{}:{}", config.management.address, config.management.port);
        info!("Starting management API on ws://{}", addr);
        Some(tokio::spawn(async move {
            if let Err(e) = management::run_management_server(mgmt_state).await {
                error!("Management server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start HTTP server
    let server_state = state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::run_server(server_state).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            if let Err(e) = result {
                error!("Server task failed: {}", e);
            }
        }
    }

    // Cleanup
    reload_handle.abort();
    if let Some(handle) = mgmt_handle {
        handle.abort();
    }

    info!("Intake Server shutdown complete");
    Ok(())
}
