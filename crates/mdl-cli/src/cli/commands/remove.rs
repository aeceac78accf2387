//! `mdl remove <key>` – forget a job; drop its cache unless `--keep-cache`.

use anyhow::Result;

use crate::cli::app::App;

pub async fn run_remove(app: &App, key: &str, keep_cache: bool) -> Result<()> {
    let existed = app.store.delete(key).await?;
    if !keep_cache {
        // The store key and the cache slug are the same source identity.
        app.cache.remove_source(key).await?;
        tracing::debug!(key, "cache removed");
    }
    if existed {
        println!("Removed job {key}");
    } else {
        println!("No stored job with key {key}");
    }
    Ok(())
}
