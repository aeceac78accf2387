//! Disk I/O and file lifecycle.
//!
//! Every image lands through a `.part` temp file that is synced and then
//! renamed onto the final name, so a reader (or a resumed run) only ever sees
//! complete files. Leftover `.part` files from an interrupted run are swept
//! before a chapter is fetched again.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `page_001.jpg` → `page_001.jpg.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Write `data` to `final_path` atomically: temp file, fsync, rename.
/// On failure the temp file is removed and `final_path` is untouched.
pub async fn write_atomic(final_path: &Path, data: &[u8]) -> Result<()> {
    let tp = temp_path(final_path);
    let res = write_and_rename(&tp, final_path, data).await;
    if res.is_err() {
        let _ = tokio::fs::remove_file(&tp).await;
    }
    res
}

async fn write_and_rename(tp: &Path, final_path: &Path, data: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(tp)
        .await
        .with_context(|| format!("failed to create temp file: {}", tp.display()))?;
    file.write_all(data)
        .await
        .with_context(|| format!("failed to write {}", tp.display()))?;
    file.sync_all().await.context("storage sync failed")?;
    drop(file);
    tokio::fs::rename(tp, final_path).await.with_context(|| {
        format!("failed to rename {} to {}", tp.display(), final_path.display())
    })?;
    Ok(())
}

/// Remove stray `.part` files directly inside `dir`. Missing dir is not an error.
pub async fn remove_stale_parts(dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("read {}", dir.display())),
    };
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().ends_with(TEMP_SUFFIX) {
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    Ok(removed)
}
