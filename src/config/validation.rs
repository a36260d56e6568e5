use anyhow::{anyhow, Context, Result};
use std::net::IpAddr;

use super::AppConfig;

/// Configuration validator for ensuring configuration integrity
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the entire application configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        Self::validate_server_config(config)?;
        Self::validate_media_config(config)?;
        Self::validate_playlist_config(config)?;
        Ok(())
    }

    fn validate_server_config(config: &AppConfig) -> Result<()> {
        if config.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }

        config
            .server
            .interface
            .parse::<IpAddr>()
            .with_context(|| format!("Invalid server interface address: {}", config.server.interface))?;

        if let Some(base_url) = &config.server.base_url {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(anyhow!("Base URL must start with http:// or https://: {}", base_url));
            }
        }

        Ok(())
    }

    fn validate_media_config(config: &AppConfig) -> Result<()> {
        config.media_root()?;

        if config.media.extensions.is_empty() {
            return Err(anyhow!("At least one media file extension must be configured"));
        }

        let mut extensions: Vec<String> = config
            .media
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        if extensions.iter().any(|ext| ext.is_empty()) {
            return Err(anyhow!("Media file extensions cannot be empty"));
        }
        extensions.sort();
        extensions.dedup();
        if extensions.len() != config.media.extensions.len() {
            return Err(anyhow!("Duplicate file extensions found in media.extensions"));
        }

        if config.media.cache_ttl_seconds == 0 {
            return Err(anyhow!("Listing cache TTL must be greater than 0 seconds"));
        }
        if config.media.cache_capacity == 0 {
            return Err(anyhow!("Listing cache capacity must be greater than 0"));
        }

        Ok(())
    }

    fn validate_playlist_config(config: &AppConfig) -> Result<()> {
        let playlist_root = config.playlist_root()?;
        let media_root = config.media_root()?;

        if playlist_root == media_root {
            return Err(anyhow!(
                "Playlist folder and media folder must differ: {}",
                playlist_root.as_path().display()
            ));
        }

        Ok(())
    }
}
