//! Moving a finished archive to its destination.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Moves a file to its final destination.
#[async_trait]
pub trait Placement: Send + Sync {
    /// Move `source` to `destination/final_name`. Returns where it landed,
    /// or an empty string on failure.
    async fn move_to_final_destination(
        &self,
        source: &Path,
        destination: &str,
        final_name: &str,
    ) -> String;
}

/// Local filesystem placement: copy into a temp file inside the destination
/// directory, then atomically persist it under the final name (replacing any
/// existing file). The destination never holds a partial archive.
#[derive(Debug, Clone, Default)]
pub struct FilesystemPlacement;

impl FilesystemPlacement {
    fn place(source: &Path, destination: &Path, final_name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(destination)
            .with_context(|| format!("create {}", destination.display()))?;
        let target = destination.join(final_name);
        let mut tmp = tempfile::NamedTempFile::new_in(destination)
            .with_context(|| format!("temp file in {}", destination.display()))?;
        let mut src = std::fs::File::open(source)
            .with_context(|| format!("open {}", source.display()))?;
        std::io::copy(&mut src, tmp.as_file_mut())
            .with_context(|| format!("copy {} into {}", source.display(), destination.display()))?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("persist {}", target.display()))?;
        Ok(target)
    }
}

#[async_trait]
impl Placement for FilesystemPlacement {
    async fn move_to_final_destination(
        &self,
        source: &Path,
        destination: &str,
        final_name: &str,
    ) -> String {
        let source = source.to_path_buf();
        let destination = if destination.trim().is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(destination)
        };
        let final_name = final_name.to_string();
        let placed = tokio::task::spawn_blocking(move || {
            let target = Self::place(&source, &destination, &final_name)?;
            let _ = std::fs::remove_file(&source);
            Ok::<_, anyhow::Error>(target)
        })
        .await;
        match placed {
            Ok(Ok(target)) => target.to_string_lossy().into_owned(),
            Ok(Err(e)) => {
                tracing::warn!("placing archive failed: {e:#}");
                String::new()
            }
            Err(e) => {
                tracing::warn!("placement task failed: {e}");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn moves_into_destination_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("work").join("S.cbz");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, b"new archive").unwrap();
        let dest = dir.path().join("library");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("S.cbz"), b"old").unwrap();

        let placed = FilesystemPlacement
            .move_to_final_destination(&src, dest.to_str().unwrap(), "S.cbz")
            .await;

        assert_eq!(PathBuf::from(&placed), dest.join("S.cbz"));
        assert_eq!(std::fs::read(dest.join("S.cbz")).unwrap(), b"new archive");
        assert!(!src.exists());
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn missing_source_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        let placed = FilesystemPlacement
            .move_to_final_destination(
                &dir.path().join("nope.cbz"),
                dir.path().to_str().unwrap(),
                "x.cbz",
            )
            .await;
        assert!(placed.is_empty());
        assert!(!dir.path().join("x.cbz").exists());
    }
}
