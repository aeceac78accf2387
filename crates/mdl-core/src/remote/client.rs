use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;

use super::{parse_reply, Command};
use crate::model::{JobState, JobStatusUpdate, QueuedOperation};
use crate::status_bus::StatusBus;
use crate::store::OperationStore;
use crate::supervisor::DownloadBackend;

/// Talks to a running `mdl serve` daemon. Status lines from the daemon are
/// republished on a local bus, so front ends subscribe the same way as with
/// the in-process supervisor.
pub struct DaemonClient {
    socket: PathBuf,
    store: OperationStore,
    bus: StatusBus,
    relay: JoinHandle<()>,
}

impl DaemonClient {
    /// Connect and start relaying status. Fails if no daemon is listening.
    pub async fn connect(socket: impl AsRef<Path>, store: OperationStore, bus: StatusBus) -> Result<Self> {
        let socket = socket.as_ref().to_path_buf();
        let stream = UnixStream::connect(&socket)
            .await
            .with_context(|| format!("no daemon at {}", socket.display()))?;
        let (read, mut write) = stream.into_split();
        write.write_all(Command::Watch.to_line().as_bytes()).await?;
        let mut lines = BufReader::new(read).lines();
        let first = lines.next_line().await?.unwrap_or_default();
        if let Err(e) = parse_reply(&first) {
            bail!("daemon refused watch: {e}");
        }

        let relay_bus = bus.clone();
        let relay = tokio::spawn(async move {
            // Keep the write half open; the daemon ends the stream on shutdown.
            let _write = write;
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match serde_json::from_str::<JobStatusUpdate>(&line) {
                        Ok(update) => relay_bus.publish(update),
                        Err(e) => tracing::debug!("bad status line from daemon: {e}"),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!("daemon status stream: {e}");
                        break;
                    }
                }
            }
            tracing::debug!("daemon status relay ended");
        });

        Ok(Self {
            socket,
            store,
            bus,
            relay,
        })
    }

    async fn request(&self, cmd: Command) -> Result<String> {
        let stream = UnixStream::connect(&self.socket)
            .await
            .with_context(|| format!("no daemon at {}", self.socket.display()))?;
        let (read, mut write) = stream.into_split();
        write.write_all(cmd.to_line().as_bytes()).await?;
        let reply = BufReader::new(read)
            .lines()
            .next_line()
            .await?
            .context("daemon closed the connection")?;
        parse_reply(&reply).map_err(|e| anyhow::anyhow!("daemon: {e}"))
    }
}

impl Drop for DaemonClient {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

#[async_trait]
impl DownloadBackend for DaemonClient {
    async fn start_job(&self, op: QueuedOperation) -> Result<bool> {
        // A running job owns its record; the daemon answers already-running.
        if self.store.state(&op.location_key()).await? != Some(JobState::Running) {
            self.store.save(&op).await?;
        }
        let detail = self.request(Command::Start(op.location_key())).await?;
        Ok(detail == "started")
    }

    async fn stop_job(&self, job_id: &str) -> Result<()> {
        self.request(Command::Stop(job_id.to_string())).await.map(|_| ())
    }

    async fn stop_all_jobs(&self) -> Result<()> {
        self.request(Command::StopAll).await.map(|_| ())
    }

    fn status_bus(&self) -> StatusBus {
        self.bus.clone()
    }
}
