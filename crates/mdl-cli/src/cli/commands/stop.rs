//! `mdl stop <job-id>` / `mdl stop --all` – stop jobs running in the daemon.

use anyhow::Result;

use crate::cli::app::App;

pub async fn run_stop(app: &App, job_id: Option<&str>, all: bool) -> Result<()> {
    let daemon = app.daemon().await?;
    match job_id {
        Some(id) if !all => {
            daemon.stop_job(id).await?;
            println!("Stopped {id}");
        }
        _ => {
            daemon.stop_all_jobs().await?;
            println!("Stopped all jobs");
        }
    }
    Ok(())
}
