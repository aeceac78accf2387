//! `mdl proxy-test` – verify the proxy reroutes traffic and fails closed.

use anyhow::{bail, Context, Result};
use mdl_core::proxy_check::{KillSwitch, ProxyVerifier};

use crate::cli::app::App;

pub async fn run_proxy_test(app: &App, proxy: Option<&str>, lookup: Option<&str>) -> Result<()> {
    let proxy = proxy
        .map(str::to_string)
        .or_else(|| app.cfg.proxy_url.clone())
        .context("no proxy given and none configured (proxy_url)")?;
    let lookup = lookup.unwrap_or(&app.cfg.ip_lookup_url);

    let result = ProxyVerifier::new(app.http())
        .run_comprehensive_proxy_test(&proxy, lookup)
        .await;

    let show = |ip: &Option<String>| ip.clone().unwrap_or_else(|| "-".to_string());
    println!("Direct address:   {}", show(&result.baseline_ip));
    println!("Proxied address:  {}", show(&result.proxied_ip));
    println!("Address changed:  {}", if result.ip_changed { "yes" } else { "no" });
    let kill_switch = match result.kill_switch {
        KillSwitch::Working => "working",
        KillSwitch::Leaking => "FAILED (traffic leaked past an unreachable proxy)",
        KillSwitch::Untested => "not tested",
    };
    println!("Kill switch:      {kill_switch}");

    if !result.passed {
        bail!(
            "proxy test failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("Proxy test passed.");
    Ok(())
}
