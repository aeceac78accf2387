//! In-process job supervisor: at most one run per job, cooperative stop.
//!
//! Constructed once at the composition root and shared by reference. Each
//! started job gets a child of the supervisor's root token, so
//! `stop_all_jobs` and process shutdown cancel the whole tree.

mod backend;

pub use backend::DownloadBackend;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::model::{JobOutcome, JobState, JobStatusUpdate, QueuedOperation};
use crate::runner::JobRunner;
use crate::status_bus::StatusBus;

struct RunningJob {
    location_key: String,
    token: CancellationToken,
    outcome: watch::Receiver<Option<JobOutcome>>,
    generation: u64,
}

#[derive(Default)]
struct Registry {
    running: HashMap<String, RunningJob>,
    /// Last outcome per job id, for `wait` after the job deregistered.
    finished: HashMap<String, JobOutcome>,
}

pub struct JobSupervisor {
    runner: JobRunner,
    registry: Arc<Mutex<Registry>>,
    limiter: Option<Arc<Semaphore>>,
    root: CancellationToken,
    generation: AtomicU64,
}

impl JobSupervisor {
    /// `max_concurrent_jobs` of `None` (or 0) leaves the number of concurrent jobs unbounded.
    pub fn new(runner: JobRunner, max_concurrent_jobs: Option<usize>) -> Self {
        Self {
            runner,
            registry: Arc::new(Mutex::new(Registry::default())),
            limiter: max_concurrent_jobs
                .filter(|n| *n > 0)
                .map(|n| Arc::new(Semaphore::new(n))),
            root: CancellationToken::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn status_bus(&self) -> StatusBus {
        self.runner.status_bus().clone()
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        lock(&self.registry)
    }

    /// Start `op` in the background. Returns `false` (and does nothing) when
    /// the same job id, or another job for the same source, is already running.
    pub fn start_job(&self, op: QueuedOperation) -> bool {
        let job_id = op.job_id.clone();
        let location_key = op.location_key();
        let (tx, rx) = watch::channel(None);
        let token = self.root.child_token();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut reg = self.registry();
            if reg.running.contains_key(&job_id) {
                tracing::debug!(job_id = %job_id, "start ignored: job already running");
                return false;
            }
            if let Some((other, _)) = reg.running.iter().find(|(_, j)| j.location_key == location_key) {
                tracing::info!(job_id = %job_id, running = %other, "start ignored: source already downloading");
                return false;
            }
            reg.finished.remove(&job_id);
            reg.running.insert(
                job_id.clone(),
                RunningJob {
                    location_key,
                    token: token.clone(),
                    outcome: rx,
                    generation,
                },
            );
        }

        let runner = self.runner.clone();
        let registry = Arc::clone(&self.registry);
        let limiter = self.limiter.clone();
        tokio::spawn(async move {
            let outcome = run_when_admitted(&runner, limiter, op, token).await;
            {
                let mut reg = lock(&registry);
                if reg.running.get(&job_id).is_some_and(|j| j.generation == generation) {
                    reg.running.remove(&job_id);
                }
                reg.finished.insert(job_id.clone(), outcome.clone());
            }
            let _ = tx.send(Some(outcome));
        });
        true
    }

    /// Request cancellation of `job_id` and wait until it has stopped. The run
    /// finishes its in-flight writes and deregisters itself.
    pub async fn stop_job(&self, job_id: &str) -> Option<JobOutcome> {
        let rx = {
            let reg = self.registry();
            let job = reg.running.get(job_id)?;
            tracing::info!(job_id, "stopping job");
            job.token.cancel();
            job.outcome.clone()
        };
        wait_outcome(rx).await
    }

    pub async fn stop_all_jobs(&self) {
        let receivers: Vec<_> = {
            let reg = self.registry();
            reg.running
                .values()
                .map(|j| {
                    j.token.cancel();
                    j.outcome.clone()
                })
                .collect()
        };
        if !receivers.is_empty() {
            tracing::info!(count = receivers.len(), "stopping all jobs");
        }
        for rx in receivers {
            wait_outcome(rx).await;
        }
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.registry().running.contains_key(job_id)
    }

    pub fn running_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry().running.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Wait for the current run of `job_id`; returns its last outcome if it
    /// already finished, `None` if it was never started here.
    pub async fn wait(&self, job_id: &str) -> Option<JobOutcome> {
        let rx = {
            let reg = self.registry();
            match reg.running.get(job_id) {
                Some(job) => job.outcome.clone(),
                None => return reg.finished.get(job_id).cloned(),
            }
        };
        wait_outcome(rx).await
    }
}

impl Drop for JobSupervisor {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

async fn wait_outcome(mut rx: watch::Receiver<Option<JobOutcome>>) -> Option<JobOutcome> {
    let outcome = match rx.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone(),
        Err(_) => None,
    };
    outcome
}

/// Hold a job slot for the whole run when a cap is configured.
async fn run_when_admitted(
    runner: &JobRunner,
    limiter: Option<Arc<Semaphore>>,
    op: QueuedOperation,
    token: CancellationToken,
) -> JobOutcome {
    let Some(limiter) = limiter else {
        return runner.run(op, token).await;
    };
    let _permit = match Arc::clone(&limiter).try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            runner
                .status_bus()
                .publish(JobStatusUpdate::new(&op.job_id).with_status("Queued: waiting for a free slot"));
            tokio::select! {
                biased;
                _ = token.cancelled() => return paused_before_start(runner, &op).await,
                permit = limiter.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return paused_before_start(runner, &op).await,
                },
            }
        }
    };
    runner.run(op, token).await
}

async fn paused_before_start(runner: &JobRunner, op: &QueuedOperation) -> JobOutcome {
    if let Err(e) = runner.store().set_state(&op.location_key(), JobState::Paused).await {
        tracing::warn!(job_id = %op.job_id, "storing job state failed: {e:#}");
    }
    runner
        .status_bus()
        .publish(JobStatusUpdate::new(&op.job_id).with_status("Paused").finished());
    JobOutcome::Paused {
        reason: "Paused".to_string(),
    }
}
