//! `mdl serve` – run the download daemon until Ctrl-C.

use anyhow::Result;

use crate::cli::app::App;

#[cfg(unix)]
pub async fn run_serve(app: &App) -> Result<()> {
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    let supervisor = Arc::new(app.supervisor().await?);
    let socket = mdl_core::control::default_control_socket_path()?;
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping daemon");
            }
            shutdown.cancel();
        }
    });
    println!("Listening on {} (Ctrl-C to stop)", socket.display());
    mdl_core::remote::serve(supervisor, &socket, shutdown).await
}

#[cfg(not(unix))]
pub async fn run_serve(_app: &App) -> Result<()> {
    anyhow::bail!("the download daemon needs Unix sockets")
}
