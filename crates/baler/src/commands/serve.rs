//! Preview server command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use axum::Router;
use tower_http::services::ServeDir;

use baler_build::{BuildConfig, BuildMode, ConfigFile};

/// Resolve the directory and address to serve, flags winning over
/// `baler.toml`.
fn resolve(config: &BuildConfig, port: Option<u16>, dir: Option<PathBuf>) -> (PathBuf, String) {
    let dir = dir.unwrap_or_else(|| config.output_dir.clone());
    let addr = format!("{}:{}", config.dev.host, port.unwrap_or(config.dev.port));
    (dir, addr)
}

/// Run the serve command.
pub async fn run(
    config_path: &Path,
    port: Option<u16>,
    dir: Option<PathBuf>,
    open: bool,
) -> Result<()> {
    let config = ConfigFile::load(config_path)?.into_config(BuildMode::Production);
    let (dir, addr) = resolve(&config, port, dir);

    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'baler build' first.",
            dir.display()
        );
    }

    tracing::info!("Serving {} at http://{}", dir.display(), addr);

    let app = Router::new().fallback_service(ServeDir::new(&dir));

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if open {
        let _ = open::that(format!("http://{addr}"));
    }

    axum::serve(listener, app).await?;

    Ok(())
}
