//! Live-reconfigurable download settings.
//!
//! The fetch engine never captures worker counts or user agents by value; it
//! holds providers that read from here at every dispatch point, so a change
//! made while a job runs takes effect on the next chapter or image started.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::config::MdlConfig;

/// Provider of a worker count, re-read at each dispatch.
pub type WorkerProvider = Arc<dyn Fn() -> usize + Send + Sync>;

/// Provider of the user-agent list, re-read for each chapter.
pub type UserAgentProvider = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

#[derive(Debug)]
pub struct LiveSettings {
    chapter_workers: AtomicUsize,
    image_workers: AtomicUsize,
    user_agents: RwLock<Vec<String>>,
}

impl LiveSettings {
    pub fn new(chapter_workers: usize, image_workers: usize, user_agents: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            chapter_workers: AtomicUsize::new(chapter_workers.max(1)),
            image_workers: AtomicUsize::new(image_workers.max(1)),
            user_agents: RwLock::new(user_agents),
        })
    }

    pub fn from_config(cfg: &MdlConfig) -> Arc<Self> {
        Self::new(cfg.chapter_workers, cfg.image_workers, cfg.user_agents.clone())
    }

    pub fn chapter_workers(&self) -> usize {
        self.chapter_workers.load(Ordering::Relaxed)
    }

    pub fn image_workers(&self) -> usize {
        self.image_workers.load(Ordering::Relaxed)
    }

    pub fn set_chapter_workers(&self, n: usize) {
        self.chapter_workers.store(n.max(1), Ordering::Relaxed);
    }

    pub fn set_image_workers(&self, n: usize) {
        self.image_workers.store(n.max(1), Ordering::Relaxed);
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.user_agents
            .read()
            .map(|ua| ua.clone())
            .unwrap_or_default()
    }

    pub fn set_user_agents(&self, agents: Vec<String>) {
        if let Ok(mut ua) = self.user_agents.write() {
            *ua = agents;
        }
    }

    pub fn chapter_worker_provider(self: &Arc<Self>) -> WorkerProvider {
        let s = Arc::clone(self);
        Arc::new(move || s.chapter_workers())
    }

    /// Image workers for one job: the job's own count when it set one, else the live value.
    pub fn image_worker_provider(self: &Arc<Self>, job_override: Option<usize>) -> WorkerProvider {
        let s = Arc::clone(self);
        match job_override.filter(|n| *n > 0) {
            Some(n) => Arc::new(move || n),
            None => Arc::new(move || s.image_workers()),
        }
    }

    /// User agents for one job: the job's own list when non-empty, else the live list.
    pub fn user_agent_provider(self: &Arc<Self>, job_agents: Vec<String>) -> UserAgentProvider {
        let s = Arc::clone(self);
        if job_agents.is_empty() {
            Arc::new(move || s.user_agents())
        } else {
            Arc::new(move || job_agents.clone())
        }
    }
}
