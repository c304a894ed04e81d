//! # sensorhub
//!
//! Server binary: loads settings, initialises logging, opens the database and
//! starts the HTTP/WebSocket server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use sensorhub_core::provider::InsightProvider;
use sensorhub_core::security::ApiKey;
use sensorhub_insight::{OpenAiConfig, OpenAiProvider};
use sensorhub_server::ServerConfig;
use sensorhub_settings::{InsightSettings, Settings};
use sensorhub_store::Database;
use sensorhub_telemetry::{init_telemetry, TelemetryConfig};

const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Sensor telemetry ingestion server.
#[derive(Parser, Debug)]
#[command(name = "sensorhub", about = "Sensor telemetry ingestion server")]
struct Cli {
    /// Settings file (defaults to `~/.sensorhub/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the SQLite database (overrides settings).
    #[arg(long)]
    db: Option<PathBuf>,
}

impl Cli {
    fn load_settings(&self) -> Result<Settings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(sensorhub_settings::settings_path);
        let mut settings = sensorhub_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        if let Some(host) = &self.host {
            settings.server.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(db) = &self.db {
            settings.database.path = db.clone();
        }
        Ok(settings)
    }
}

/// Build the text-generation provider when a credential is available.
fn insight_provider(settings: &InsightSettings) -> Result<Option<Arc<dyn InsightProvider>>> {
    let Some(api_key) = std::env::var(API_KEY_VAR).ok().and_then(ApiKey::from_raw) else {
        tracing::warn!("{API_KEY_VAR} not set, insights disabled");
        return Ok(None);
    };

    let provider = OpenAiProvider::new(OpenAiConfig {
        api_key,
        base_url: settings.base_url.clone(),
        model: settings.model.clone(),
        timeout: Duration::from_secs(settings.timeout_secs),
    })
    .context("Failed to build insight provider")?;

    tracing::info!(model = %settings.model, "insights enabled");
    Ok(Some(Arc::new(provider)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;

    init_telemetry(&TelemetryConfig::from_level_str(
        &settings.logging.level,
        settings.logging.json,
    ))?;

    tracing::info!("Starting sensorhub");

    let db_path = &settings.database.path;
    let db = Database::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "Database opened");

    let insight = insight_provider(&settings.insight)?;

    let config = ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        max_send_queue: settings.server.max_send_queue,
        insight_max_readings: settings.insight.max_readings,
        insight_temperature: settings.insight.temperature,
    };
    let handle = sensorhub_server::start(config, db, insight)
        .await
        .context("Failed to start server")?;

    tracing::info!(port = handle.port, "sensorhub ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    handle.shutdown();
    Ok(())
}
