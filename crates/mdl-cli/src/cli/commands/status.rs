//! `mdl status` – list stored jobs with cache progress.

use anyhow::Result;

use crate::cli::app::App;

pub async fn run_status(app: &App) -> Result<()> {
    let jobs = app.store.list().await?;
    if jobs.is_empty() {
        println!("No jobs in database.");
        return Ok(());
    }
    println!("{:<10} {:<9} {:<32} {}", "STATE", "CACHED", "KEY", "URL");
    for j in jobs {
        let total = match app.store.load(&j.location_key).await {
            Ok(Some(op)) => op.chapters.iter().filter(|c| c.selected_source.is_some()).count(),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(key = %j.location_key, "unreadable job record: {e:#}");
                0
            }
        };
        let cached = app
            .cache
            .chapter_status(&j.location_key)
            .await
            .map(|s| s.values().filter(|done| **done).count())
            .unwrap_or(0);
        println!(
            "{:<10} {:<9} {:<32} {}",
            j.state.as_str(),
            format!("{cached}/{total}"),
            j.location_key,
            j.series_url
        );
    }
    Ok(())
}
