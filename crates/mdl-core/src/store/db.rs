//! Connection, migrations, and timestamp helpers. Record CRUD lives in `ops`.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite-backed operation store.
///
/// The database file lives under the XDG state directory:
/// `~/.local/state/mdl/jobs.db`.
#[derive(Clone, Debug)]
pub struct OperationStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl OperationStore {
    /// Open (or create) the default store and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mdl")?;
        let state_dir = xdg_dirs.get_state_home();
        Self::open_at(state_dir.join("jobs.db")).await
    }

    /// Open (or create) the store at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await
            .with_context(|| format!("open job store {}", path.display()))?;
        let store = OperationStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // `record_json` is the full QueuedOperation; the other columns are
        // denormalized for listing without deserializing every record.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS operations (
                location_key TEXT PRIMARY KEY NOT NULL,
                job_id TEXT NOT NULL,
                series_url TEXT NOT NULL,
                state TEXT NOT NULL,
                record_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds (for row timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Open an in-memory store for tests (no disk I/O).
#[cfg(test)]
pub(crate) async fn open_memory() -> Result<OperationStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let store = OperationStore { pool };
    store.migrate().await?;
    Ok(store)
}
