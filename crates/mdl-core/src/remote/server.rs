use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use super::Command;
use crate::supervisor::JobSupervisor;

/// Accept connections on `path` until `shutdown` fires, then stop every job.
///
/// A stale socket file at `path` is replaced.
pub async fn serve(supervisor: Arc<JobSupervisor>, path: &Path, shutdown: CancellationToken) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)
        .with_context(|| format!("binding control socket {}", path.display()))?;
    tracing::info!(path = %path.display(), "daemon listening");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let supervisor = Arc::clone(&supervisor);
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle(stream, &supervisor, shutdown).await {
                            tracing::debug!("control connection: {e:#}");
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            },
        }
    }

    supervisor.stop_all_jobs().await;
    let _ = std::fs::remove_file(path);
    tracing::info!("daemon stopped");
    Ok(())
}

async fn handle(stream: UnixStream, supervisor: &JobSupervisor, shutdown: CancellationToken) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(cmd) = Command::parse(&line) else {
            write.write_all(b"err unknown command\n").await?;
            continue;
        };
        tracing::debug!(?cmd, "control command");
        match cmd {
            Command::Start(key) => {
                let reply = match supervisor.runner().store().load(&key).await {
                    Ok(Some(op)) => {
                        if supervisor.start_job(op) {
                            "ok started\n".to_string()
                        } else {
                            "ok already-running\n".to_string()
                        }
                    }
                    Ok(None) => format!("err unknown job {key}\n"),
                    Err(e) => format!("err {e}\n"),
                };
                write.write_all(reply.as_bytes()).await?;
            }
            Command::Stop(job_id) => {
                supervisor.stop_job(&job_id).await;
                write.write_all(b"ok stopped\n").await?;
            }
            Command::StopAll => {
                supervisor.stop_all_jobs().await;
                write.write_all(b"ok stopped\n").await?;
            }
            Command::Watch => {
                let mut sub = supervisor.status_bus().subscribe();
                write.write_all(b"ok watching\n").await?;
                loop {
                    let update = tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        update = sub.recv() => update,
                    };
                    let Some(update) = update else {
                        return Ok(());
                    };
                    let mut json = serde_json::to_string(&update)?;
                    json.push('\n');
                    write.write_all(json.as_bytes()).await?;
                }
            }
        }
    }
    Ok(())
}
