use anyhow::{anyhow, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;

/// Initialize logging; `RUST_LOG` wins over the debug flag.
pub fn init_logging_with_debug(debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), default_level)?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(debug)
        .with_line_number(debug);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized with level: {}", default_level);
    Ok(())
}

fn build_filter(directives: Option<&str>, default_level: &str) -> Result<EnvFilter> {
    match directives {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .map_err(|e| anyhow!("Invalid log filter {:?}: {}", directives, e)),
        _ => EnvFilter::try_new(default_level).map_err(|e| anyhow!("Invalid log level: {}", e)),
    }
}

/// Log the effective configuration at startup.
pub fn log_startup_info(config: &AppConfig, base_url: &str) {
    info!("=== Media server starting ===");
    info!("Media folder: {}", config.media.root.display());
    info!("Playlist folder: {}", config.playlists.root.display());
    info!("Listed extensions: {}", config.media.extensions.join(", "));
    info!(
        "Listing cache: ttl {}s, capacity {}",
        config.media.cache_ttl_seconds, config.media.cache_capacity
    );
    info!("Links are built against {}", base_url);

    if !config.media.root.is_dir() {
        warn!(
            "Media folder {} is not an accessible directory; listings will fail",
            config.media.root.display()
        );
    }
    if !config.playlists.root.exists() {
        info!("Playlist folder does not exist yet and will be created on first write");
    }
    if !config.playlists.lock_writes {
        info!("Playlist writes are not serialized; concurrent edits of one playlist can race");
    }
}
