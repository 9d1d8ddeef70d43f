mod app;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsstand_core::{load_config, validate_config, SanitizedConfig};

/// Exit status when a source failed and the config asks to surface it.
const EXIT_SOURCE_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let json = std::env::var("NEWSSTAND_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run() -> Result<ExitCode> {
    // Determine config path
    let config_path = std::env::var("NEWSSTAND_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(sanitized.as_bytes()));
    info!("Configuration loaded (hash {}): {}", &config_hash[..16], sanitized);

    let app = app::App::build(&config).await?;
    let report = app.coordinator.run_all(&app.sources).await;

    for line in report.summary_lines() {
        info!("{}", line);
    }
    info!(
        "Run took {}s",
        (report.finished_at - report.started_at).num_seconds()
    );

    if let Some(path) = &config.metrics.textfile_path {
        if let Err(e) = app::write_metrics_textfile(path).await {
            warn!("Failed to write metrics to {:?}: {:#}", path, e);
        }
    }

    if report.has_failures() && config.runner.fail_exit_on_failed_source {
        warn!("Failed sources: {}", report.failed_sources().join(", "));
        return Ok(ExitCode::from(EXIT_SOURCE_FAILED));
    }
    Ok(ExitCode::SUCCESS)
}
