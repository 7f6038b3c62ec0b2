//! Configuration loading and parsing.
//!
//! Defines the server config schema and resolves defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level server configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Bind address (host:port).
    pub bind: Option<String>,
    /// Music library root directory.
    pub music_dir: Option<String>,
    /// Song database file.
    pub db_path: Option<String>,
    /// Directory holding the static landing page.
    pub webapp_dir: Option<String>,
    /// External cover art settings.
    pub covers: Option<CoversConfig>,
}

/// Cover Art Archive configuration.
#[derive(Debug, Default, Deserialize)]
pub struct CoversConfig {
    /// Enable external cover lookups.
    pub enabled: Option<bool>,
    /// User-Agent string required by the archive (include contact info).
    pub user_agent: Option<String>,
    /// Optional base URL override (defaults to https://coverartarchive.org/release).
    pub base_url: Option<String>,
    /// Minimum delay between requests in milliseconds (default: 1000).
    pub rate_limit_ms: Option<u64>,
}

impl ServerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ServerConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Parse an optional bind address from config.
pub fn bind_from_config(cfg: &ServerConfig) -> Result<Option<SocketAddr>> {
    let Some(bind) = cfg.bind.as_deref() else {
        return Ok(None);
    };
    let addr = bind.parse().with_context(|| format!("parse bind {bind}"))?;
    Ok(Some(addr))
}

/// Music root from config, defaulting to `./songs`.
pub fn music_dir_from_config(cfg: &ServerConfig) -> PathBuf {
    cfg.music_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./songs"))
}

/// Database file from config, defaulting to `./songs.db`.
pub fn db_path_from_config(cfg: &ServerConfig) -> PathBuf {
    cfg.db_path
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./songs.db"))
}

/// Landing page directory from config, defaulting to `./webapp`.
pub fn webapp_dir_from_config(cfg: &ServerConfig) -> PathBuf {
    cfg.webapp_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./webapp"))
}
