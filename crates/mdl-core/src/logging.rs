//! Tracing setup for the `mdl` binary and daemon.
//!
//! Job runs are long and mostly unattended, so events go to an append-only
//! file under the XDG state dir; stderr stays free for the progress line.
//! `MDL_LOG` takes precedence over `RUST_LOG`; both use `EnvFilter` syntax.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const FILTER_ENV: &str = "MDL_LOG";

/// Engine internals at debug, dependencies (sqlx, scraper) at info.
const DEFAULT_FILTER: &str = "info,mdl_core=debug,mdl=debug";

fn filter_from(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

fn env_filter() -> EnvFilter {
    filter_from(std::env::var(FILTER_ENV).ok())
}

/// `~/.local/state/mdl/mdl.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdl")?;
    Ok(xdg_dirs.get_state_home().join("mdl.log"))
}

/// Send job events to the log file. Errors (state dir unwritable, subscriber
/// already set) are returned so `main` can fall back to
/// [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    tracing::info!(log = %path.display(), pid = std::process::id(), "mdl started");
    Ok(())
}

pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
