//! libcurl-backed client. Each request runs on the blocking pool.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{HttpClient, HttpClientFactory};
use crate::retry::{ErrorKind, FetchError};

/// Bodies above this size are refused (an image or chapter page never gets close).
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CurlClientFactory {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl Default for CurlClientFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(15), Duration::from_secs(60))
    }
}

impl CurlClientFactory {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }

    pub fn from_config(cfg: &crate::config::MdlConfig) -> Self {
        Self::new(cfg.connect_timeout(), cfg.request_timeout())
    }
}

impl HttpClientFactory for CurlClientFactory {
    fn client(&self, proxy: Option<&str>, user_agent: Option<&str>) -> Arc<dyn HttpClient> {
        Arc::new(CurlClient {
            proxy: proxy.map(str::to_string),
            user_agent: user_agent.map(str::to_string),
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CurlClient {
    proxy: Option<String>,
    user_agent: Option<String>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

#[async_trait]
impl HttpClient for CurlClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let this = self.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || this.get_blocking(&url))
            .await
            .map_err(|e| FetchError::transport(ErrorKind::Other, format!("fetch task failed: {e}")))?
    }
}

impl CurlClient {
    /// Runs in the current thread; `get` wraps this in `spawn_blocking`.
    fn get_blocking(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        // An empty proxy string disables proxying entirely, including the
        // http_proxy/https_proxy environment variables.
        easy.proxy(self.proxy.as_deref().unwrap_or(""))?;
        if let Some(ua) = &self.user_agent {
            easy.useragent(ua)?;
        }
        easy.accept_encoding("")?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.request_timeout)?;

        let mut body = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                if body.len() + data.len() > MAX_BODY_BYTES {
                    return Ok(0);
                }
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code as u16));
        }
        Ok(body)
    }
}
