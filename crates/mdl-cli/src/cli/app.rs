//! Composition root: config, store, cache, and the chosen backend.

use anyhow::Result;
use mdl_core::cache::ChapterCache;
use mdl_core::config::{self, BackendKind, MdlConfig};
use mdl_core::fetch::FetchEngine;
use mdl_core::http::CurlClientFactory;
use mdl_core::runner::JobRunner;
use mdl_core::scraper::WpMangaScraper;
use mdl_core::settings::LiveSettings;
use mdl_core::status_bus::StatusBus;
use mdl_core::store::OperationStore;
use mdl_core::supervisor::{DownloadBackend, JobSupervisor};
use std::path::PathBuf;
use std::sync::Arc;

pub struct App {
    pub cfg: MdlConfig,
    pub store: OperationStore,
    pub cache: ChapterCache,
    pub settings: Arc<LiveSettings>,
}

impl App {
    pub async fn load() -> Result<Self> {
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = OperationStore::open_default().await?;
        let cache = ChapterCache::new(cfg.cache_root()?);
        let settings = LiveSettings::from_config(&cfg);
        Ok(Self {
            cfg,
            store,
            cache,
            settings,
        })
    }

    pub fn http(&self) -> Arc<CurlClientFactory> {
        Arc::new(CurlClientFactory::from_config(&self.cfg))
    }

    pub fn runner(&self) -> JobRunner {
        let engine = FetchEngine::new(self.http(), Arc::new(WpMangaScraper))
            .with_proxy(self.cfg.proxy_url.clone())
            .with_retry(self.cfg.retry_policy());
        JobRunner::new(
            engine,
            self.store.clone(),
            self.cache.clone(),
            StatusBus::new(self.cfg.status_buffer),
            Arc::clone(&self.settings),
        )
        .keep_cache(self.cfg.keep_cache)
    }

    /// In-process supervisor. Rows left `running` by a crashed process are
    /// moved back to `paused` first.
    pub async fn supervisor(&self) -> Result<JobSupervisor> {
        let recovered = self.store.recover_running().await?;
        if recovered > 0 {
            tracing::info!("recovered {} job(s) from previous run", recovered);
        }
        Ok(JobSupervisor::new(self.runner(), self.cfg.max_concurrent_jobs))
    }

    /// The backend selected by `backend` in the config.
    pub async fn backend(&self) -> Result<Arc<dyn DownloadBackend>> {
        match self.cfg.backend {
            BackendKind::InProcess => Ok(Arc::new(self.supervisor().await?)),
            BackendKind::Daemon => self.daemon().await,
        }
    }

    #[cfg(unix)]
    pub async fn daemon(&self) -> Result<Arc<dyn DownloadBackend>> {
        let socket = mdl_core::control::default_control_socket_path()?;
        let client = mdl_core::remote::DaemonClient::connect(
            &socket,
            self.store.clone(),
            StatusBus::new(self.cfg.status_buffer),
        )
        .await?;
        Ok(Arc::new(client))
    }

    #[cfg(not(unix))]
    pub async fn daemon(&self) -> Result<Arc<dyn DownloadBackend>> {
        anyhow::bail!("the download daemon needs Unix sockets")
    }

    /// `arg`, else the configured output directory, else the current directory.
    pub fn output_dir(&self, arg: Option<PathBuf>) -> Result<PathBuf> {
        match arg.or_else(|| self.cfg.output_dir.clone()) {
            Some(dir) => Ok(dir),
            None => Ok(std::env::current_dir()?),
        }
    }
}
