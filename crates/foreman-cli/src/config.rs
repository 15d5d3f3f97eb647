//! Configuration file management.
//!
//! A TOML config at `~/.config/foreman/config.toml` plus a resolution
//! chain: CLI flag > environment variable > config file > built-in default.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use foreman_core::dispatch::DEFAULT_OLLAMA_BASE_URL;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub worker: WorkerSection,
    #[serde(default)]
    pub tracker: TrackerSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WorkerSection {
    /// Worker binary; defaults to `claude` on `$PATH`.
    pub binary: Option<String>,
    /// Endpoint for the local model tier.
    pub ollama_base_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TrackerSection {
    /// `owner/repo` the issue bridge talks to; defaults to the current
    /// repository context of the tracker CLI.
    pub repo: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Config directory, always XDG layout: `$XDG_CONFIG_HOME/foreman` or
/// `~/.config/foreman`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("foreman");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("foreman")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file; a missing file is the default config.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn save_config(config: &ConfigFile) -> Result<()> {
    let dir = config_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config dir {}", dir.display()))?;
    let text = toml::to_string_pretty(config).context("failed to serialize config")?;
    let path = config_path();
    fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolution
// -----------------------------------------------------------------------

/// Effective settings after the resolution chain is applied.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub worker_binary: String,
    pub ollama_base_url: String,
    pub repo: Option<String>,
}

impl ResolvedConfig {
    pub fn resolve(repo_flag: Option<&str>) -> Result<Self> {
        let file = load_config()?;

        let worker_binary = std::env::var("FOREMAN_WORKER_BIN")
            .ok()
            .filter(|v| !v.is_empty())
            .or(file.worker.binary)
            .unwrap_or_else(|| "claude".to_owned());

        let ollama_base_url = std::env::var("OLLAMA_BASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .or(file.worker.ollama_base_url)
            .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_owned());

        let repo = repo_flag.map(str::to_owned).or(file.tracker.repo);

        Ok(Self {
            worker_binary,
            ollama_base_url,
            repo,
        })
    }
}
