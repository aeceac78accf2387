//! Global configuration loaded from `~/.config/mdl/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per image (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.5,
            max_delay_secs: 8,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Which background downloader the CLI talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Jobs run inside the invoking process.
    #[default]
    InProcess,
    /// Jobs run in a separately started `mdl serve` daemon.
    Daemon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdlConfig {
    /// Chapters fetched concurrently per job.
    pub chapter_workers: usize,
    /// Images fetched concurrently per chapter.
    pub image_workers: usize,
    /// User agents to rotate through; empty = libcurl default.
    #[serde(default)]
    pub user_agents: Vec<String>,
    /// Proxy URL for all job traffic (`socks5h://`, `http://`). None = direct.
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// Endpoint returning the caller's public IP (JSON or plain text).
    pub ip_lookup_url: String,
    /// Cache root; defaults to `~/.cache/mdl`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Where finished archives go when no `--output` is given; defaults to the current directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Process-wide cap on concurrently running jobs. None = unbounded.
    #[serde(default)]
    pub max_concurrent_jobs: Option<usize>,
    /// Status bus capacity.
    pub status_buffer: usize,
    #[serde(default)]
    pub backend: BackendKind,
    /// Keep the chapter cache after a fully successful job.
    #[serde(default)]
    pub keep_cache: bool,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for MdlConfig {
    fn default() -> Self {
        Self {
            chapter_workers: 4,
            image_workers: 10,
            user_agents: Vec::new(),
            proxy_url: None,
            ip_lookup_url: "https://api.ipify.org?format=json".to_string(),
            cache_dir: None,
            output_dir: None,
            connect_timeout_secs: 15,
            request_timeout_secs: 60,
            max_concurrent_jobs: None,
            status_buffer: crate::status_bus::DEFAULT_STATUS_BUFFER,
            backend: BackendKind::InProcess,
            keep_cache: false,
            retry: None,
        }
    }
}

impl MdlConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryConfig::to_policy)
            .unwrap_or_default()
    }

    /// Configured cache root, or `$XDG_CACHE_HOME/mdl`.
    pub fn cache_root(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mdl")?;
        Ok(xdg_dirs.get_cache_home())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdlConfig> {
    load_or_init_at(&config_path()?)
}

/// `load_or_init` against an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<MdlConfig> {
    if !path.exists() {
        let default_cfg = MdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: MdlConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
