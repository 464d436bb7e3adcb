mod app;

use anyhow::Result;
use std::fs::{self, OpenOptions};

use tracing_subscriber::{prelude::*, EnvFilter};
use ttr_planner_core::{
    config::{self, AppConfig},
    BoardController, GameDataStore, SolverClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    tracing::info!(server = %config.server_url, "Starting route planner");

    let client = SolverClient::new(&config)?;
    let store = GameDataStore::new();
    let board = BoardController::new(store.clone()).with_extent(config.map_extent());

    let mut app = app::PlannerApp::new(config, client, store, board);
    app.run().await
}

/// The terminal owns stdout, so log lines only go to `logs/ttrplan.log`.
fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("ttrplan.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
