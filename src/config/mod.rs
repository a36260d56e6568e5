use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{
    net::IpAddr,
    path::{Path, PathBuf},
    time::Duration,
};

pub mod validation;

use crate::content::default_extensions;
use crate::sandbox::ConfinedRoot;
use validation::ConfigValidator;

pub const DEFAULT_PORT: u16 = 3000;

pub const ENV_PORT: &str = "MM_PORT";
pub const ENV_HOST: &str = "MM_HOST";
pub const ENV_MEDIA_FOLDER: &str = "MM_FOLDER";
pub const ENV_PLAYLIST_FOLDER: &str = "MM_PLAYLIST_FOLDER";

/// Command line interface of the server binary.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The directory containing media files to serve
    pub media_dir: Option<PathBuf>,

    /// The directory holding .pls playlists
    #[arg(long)]
    pub playlist_dir: Option<PathBuf>,

    /// The network port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind, e.g. 0.0.0.0
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Public base URL used in listing links, e.g. http://music.local:3000
    #[arg(long)]
    pub base_url: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    pub init_config: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Main application configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub playlists: PlaylistConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub interface: String,
    pub port: u16,
    /// Prefix of the `enter` links; derived from the local address when unset.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    pub cache_ttl_seconds: u64,
    pub cache_capacity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    pub root: PathBuf,
    /// Serialize concurrent writers on the same playlist.
    pub lock_writes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interface: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            base_url: None,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./media"),
            extensions: default_extensions(),
            cache_ttl_seconds: 300,
            cache_capacity: 1000,
        }
    }
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./playlists"),
            lock_writes: false,
        }
    }
}

impl AppConfig {
    /// Build the effective configuration: defaults, then the config file,
    /// then `MM_*` environment variables, then command line flags.
    pub fn load(args: &Args) -> Result<Self> {
        let mut config = match Self::config_file_path(args) {
            Some(path) if path.exists() => Self::load_from_file(&path)?,
            Some(path) if args.config.is_some() => {
                anyhow::bail!("Config file does not exist: {}", path.display())
            }
            _ => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.apply_args(args);

        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        config.make_roots_absolute(&cwd);

        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Explicit `--config`, otherwise the per-user default location.
    pub fn config_file_path(args: &Args) -> Option<PathBuf> {
        args.config
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join("mmserver").join("config.toml")))
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, config_path: P) -> Result<()> {
        let config_path = config_path.as_ref();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Apply `MM_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_PORT) {
            self.server.port = parse_port(&raw);
        }
        if let Some(host) = lookup(ENV_HOST).filter(|h| !h.trim().is_empty()) {
            self.server.base_url = Some(host);
        }
        if let Some(folder) = lookup(ENV_MEDIA_FOLDER).filter(|f| !f.trim().is_empty()) {
            self.media.root = PathBuf::from(folder);
        }
        if let Some(folder) = lookup(ENV_PLAYLIST_FOLDER).filter(|f| !f.trim().is_empty()) {
            self.playlists.root = PathBuf::from(folder);
        }
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(media_dir) = &args.media_dir {
            self.media.root = media_dir.clone();
        }
        if let Some(playlist_dir) = &args.playlist_dir {
            self.playlists.root = playlist_dir.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(interface) = &args.interface {
            self.server.interface = interface.clone();
        }
        if let Some(base_url) = &args.base_url {
            self.server.base_url = Some(base_url.clone());
        }
    }

    /// Resolve relative roots against `cwd`.
    pub fn make_roots_absolute(&mut self, cwd: &Path) {
        if self.media.root.is_relative() {
            self.media.root = cwd.join(&self.media.root);
        }
        if self.playlists.root.is_relative() {
            self.playlists.root = cwd.join(&self.playlists.root);
        }
    }

    pub fn media_root(&self) -> Result<ConfinedRoot> {
        ConfinedRoot::new(&self.media.root)
            .with_context(|| format!("Invalid media folder: {}", self.media.root.display()))
    }

    pub fn playlist_root(&self) -> Result<ConfinedRoot> {
        ConfinedRoot::new(&self.playlists.root)
            .with_context(|| format!("Invalid playlist folder: {}", self.playlists.root.display()))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.media.cache_ttl_seconds)
    }

    /// Base URL for links handed to clients, without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.server.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let ip = get_local_ip().unwrap_or(IpAddr::from([127, 0, 0, 1]));
                format!("http://{}:{}", ip, self.server.port)
            }
        }
    }
}

/// Parse a port, falling back to [`DEFAULT_PORT`] when it is not in 1..=65535.
pub fn parse_port(raw: &str) -> u16 {
    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => port,
        _ => {
            tracing::warn!("Ignoring invalid port {:?}, using {}", raw, DEFAULT_PORT);
            DEFAULT_PORT
        }
    }
}

/// Finds the local IP address of the machine.
fn get_local_ip() -> Option<IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
