use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use eink_player::core::{ManualUpdateRequest, RefreshTask};
use eink_player::display::drivers::driver_for;
use eink_player::display::{DisplayManager, ImageFiles};
use eink_player::playlist::model::Settings;
use eink_player::render::plugins::PluginRegistry;
use eink_player::services::storage::JsonConfigStore;

#[derive(Parser, Debug)]
#[command(name = "eink-player", about = "E-ink playlist player")]
struct Args {
    /// Device config file (created with defaults if missing)
    #[arg(short, long, default_value = "config/device.json")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Render this plugin once, then exit
    #[arg(long, value_name = "PLUGIN_ID")]
    update_now: Option<String>,

    /// Plugin setting for --update-now, as key=value (repeatable)
    #[arg(long = "setting", value_name = "KEY=VALUE", value_parser = parse_setting)]
    settings: Vec<(String, serde_json::Value)>,
}

/// Values that parse as JSON keep their type; anything else is a string
fn parse_setting(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.parse().unwrap_or_default()),
        )
        .init();

    info!("eink-player v{} starting", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(JsonConfigStore::new(&args.config));
    let config = store
        .load_or_bootstrap()
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;

    let registry = PluginRegistry::with_builtins();
    info!("Plugins available: {}", registry.ids().join(", "));

    let display = DisplayManager::new(driver_for(&config), ImageFiles::from_config(&config));
    let driver_name = display.driver_name();
    info!(
        "Panel {}x{} via '{}', {} playlist(s)",
        config.resolution[0],
        config.resolution[1],
        driver_name,
        config.playlist_config.playlists.len()
    );

    let task = RefreshTask::new(config, registry, display, store);
    task.start().await;

    if let Some(plugin_id) = args.update_now {
        let settings: Settings = args.settings.into_iter().collect();
        let result = task
            .manual_update(ManualUpdateRequest::plugin(&plugin_id, settings))
            .await;
        task.stop().await;
        let metrics = result.with_context(|| format!("Manual update of '{plugin_id}' failed"))?;
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }

    // Render whatever is due right away instead of waiting a full interval
    task.signal_config_change();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    task.stop().await;
    info!("eink-player shutdown");
    Ok(())
}
