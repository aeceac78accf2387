//! `mdl resume [KEY]` – continue a paused job, or every unfinished one.

use anyhow::{bail, Result};
use mdl_core::model::JobState;

use super::start_and_follow;
use crate::cli::app::App;

/// Without a key, resumes every job that is queued or paused. Failed jobs are
/// only resumed when named explicitly.
pub async fn run_resume(app: &App, key: Option<&str>) -> Result<()> {
    let keys: Vec<String> = match key {
        Some(k) => vec![k.to_string()],
        None => app
            .store
            .list()
            .await?
            .into_iter()
            .filter(|j| matches!(j.state, JobState::Queued | JobState::Paused | JobState::Running))
            .map(|j| j.location_key)
            .collect(),
    };
    if keys.is_empty() {
        println!("No unfinished jobs.");
        return Ok(());
    }

    let backend = app.backend().await?;
    for key in keys {
        let Some(op) = app.store.load(&key).await? else {
            bail!("no stored job with key {key}");
        };
        println!("Resuming {} ({})", op.display_title(), key);
        start_and_follow(std::sync::Arc::clone(&backend), op).await?;
    }
    Ok(())
}
