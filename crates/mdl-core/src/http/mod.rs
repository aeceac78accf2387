//! HTTP client seam.
//!
//! The engine only sees `HttpClient` and `HttpClientFactory`; the default
//! implementation is libcurl (`CurlClientFactory`). Tests swap in in-memory
//! fakes through the same traits.

mod curl_client;

pub use curl_client::{CurlClient, CurlClientFactory};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::sync::Arc;

use crate::retry::FetchError;

/// A configured client: fixed proxy choice and user agent.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `url` and return the full body. Non-2xx is `FetchError::Http`.
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Builds clients from (optional proxy, optional user agent).
///
/// `proxy = None` means direct egress; `Some(url)` means every request goes
/// through that proxy and fails if it is unreachable. Implementations must
/// never fall back from one to the other.
pub trait HttpClientFactory: Send + Sync {
    fn client(&self, proxy: Option<&str>, user_agent: Option<&str>) -> Arc<dyn HttpClient>;
}

/// Pick one user agent at random; `None` for an empty list.
pub fn pick_user_agent(agents: &[String]) -> Option<String> {
    agents.choose(&mut rand::thread_rng()).cloned()
}
