//! Development server command.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;

use baler_build::{BuildMode, Builder, ConfigFile};
use baler_server::{DevServer, ServerState, WatchSession};

/// Run the dev server.
pub async fn run(
    config_path: &Path,
    port: Option<u16>,
    host: Option<String>,
    open: bool,
) -> Result<()> {
    let file_config = ConfigFile::load(config_path)?;
    let mut config = file_config.into_config(BuildMode::Development);

    if let Some(port) = port {
        config.dev.port = port;
    }
    if let Some(host) = host {
        config.dev.host = host;
    }

    let host = config.dev.host.clone();
    let port = config.dev.port;
    let open = open && config.dev.open;

    let builder = Builder::new(config);
    let initial = builder.build()?;

    tracing::info!(
        "Initial build: {} bundle(s) in {}ms",
        initial.bundles_built.len(),
        initial.duration_ms
    );

    let state = ServerState::new(initial.manifest.clone());
    let session = WatchSession::new(builder, initial, Arc::clone(&state));
    let server = DevServer::new(Arc::clone(&state));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server_shutdown = shutdown_rx.clone();
    let server_host = host.clone();
    let server_task =
        tokio::spawn(async move { server.run(&server_host, port, server_shutdown).await });

    let mut session_task = tokio::spawn(session.run(shutdown_rx));

    if open {
        let url = format!("http://{host}:{port}");
        let _ = open::that(&url);
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down...");
        }
        result = &mut session_task => {
            // A fatal watch failure ends the session on its own.
            result??;
        }
    }

    let _ = shutdown_tx.send(true);

    if !session_task.is_finished() {
        session_task.await??;
    }
    server_task.await??;

    Ok(())
}
