//! Network health verification: does the proxy reroute traffic, and does an
//! unreachable proxy fail closed?
//!
//! The outcome is always a `ProxyTestResult`; lookup failures are recorded in
//! it rather than returned as errors.

mod identity;

pub use identity::parse_identity;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::http::HttpClientFactory;

/// One test in flight per process.
static TEST_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KillSwitch {
    /// A request through an unreachable proxy failed.
    Working,
    /// A request through an unreachable proxy succeeded: traffic left directly.
    Leaking,
    Untested,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyTestResult {
    pub baseline_ip: Option<String>,
    pub proxied_ip: Option<String>,
    pub ip_changed: bool,
    pub kill_switch: KillSwitch,
    pub error: Option<String>,
    pub passed: bool,
}

impl ProxyTestResult {
    fn failed(error: String) -> Self {
        Self {
            baseline_ip: None,
            proxied_ip: None,
            ip_changed: false,
            kill_switch: KillSwitch::Untested,
            error: Some(error),
            passed: false,
        }
    }
}

pub struct ProxyVerifier {
    http: Arc<dyn HttpClientFactory>,
}

impl ProxyVerifier {
    pub fn new(http: Arc<dyn HttpClientFactory>) -> Self {
        Self { http }
    }

    /// Baseline identity, identity through `proxy_url`, then the kill-switch
    /// probe against the same host on a random port.
    pub async fn run_comprehensive_proxy_test(&self, proxy_url: &str, ip_lookup_url: &str) -> ProxyTestResult {
        let _guard = TEST_LOCK.lock().await;
        tracing::info!(proxy = %proxy_url, lookup = %ip_lookup_url, "proxy test starting");

        let invalid = match invalid_endpoint(proxy_url) {
            Ok(url) => url,
            Err(e) => return ProxyTestResult::failed(format!("invalid proxy url: {e}")),
        };

        let baseline = match self.identity(None, ip_lookup_url).await {
            Ok(ip) => ip,
            Err(e) => return ProxyTestResult::failed(format!("baseline lookup failed: {e}")),
        };
        let mut result = ProxyTestResult {
            baseline_ip: Some(baseline.clone()),
            proxied_ip: None,
            ip_changed: false,
            kill_switch: KillSwitch::Untested,
            error: None,
            passed: false,
        };

        match self.identity(Some(proxy_url), ip_lookup_url).await {
            Ok(ip) => {
                result.ip_changed = ip != baseline;
                result.proxied_ip = Some(ip);
                if !result.ip_changed {
                    result.error = Some("proxy does not change the public address".to_string());
                }
            }
            Err(e) => result.error = Some(format!("proxy lookup failed: {e}")),
        }

        result.kill_switch = match self.identity(Some(&invalid), ip_lookup_url).await {
            Ok(ip) => {
                tracing::warn!(endpoint = %invalid, %ip, "request through an unreachable proxy succeeded");
                result.error = Some("kill switch failed: traffic bypassed an unreachable proxy".to_string());
                KillSwitch::Leaking
            }
            Err(e) => {
                tracing::debug!(endpoint = %invalid, "unreachable proxy refused as expected: {e}");
                KillSwitch::Working
            }
        };

        result.passed = result.ip_changed && result.kill_switch == KillSwitch::Working;
        tracing::info!(
            passed = result.passed,
            ip_changed = result.ip_changed,
            kill_switch = ?result.kill_switch,
            "proxy test finished"
        );
        result
    }

    async fn identity(&self, proxy: Option<&str>, lookup: &str) -> Result<String, String> {
        let body = self
            .http
            .client(proxy, None)
            .get(lookup)
            .await
            .map_err(|e| e.to_string())?;
        parse_identity(&body).ok_or_else(|| "empty identity response".to_string())
    }
}

/// The proxy's host on a random high port other than its own.
fn invalid_endpoint(proxy_url: &str) -> Result<String, String> {
    let mut url = url::Url::parse(proxy_url).map_err(|e| e.to_string())?;
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    let current = url.port_or_known_default();
    let mut rng = rand::thread_rng();
    let port = loop {
        let candidate: u16 = rng.gen_range(49152..=65535);
        if Some(candidate) != current {
            break candidate;
        }
    };
    url.set_port(Some(port)).map_err(|_| "proxy url cannot carry a port".to_string())?;
    Ok(url.to_string())
}
