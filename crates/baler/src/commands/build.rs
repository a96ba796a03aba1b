//! One-shot build command.

use std::path::{Path, PathBuf};

use anyhow::Result;

use baler_build::{BuildMode, Builder, ConfigFile};

/// Run the build command.
pub async fn run(
    config_path: &Path,
    mode: BuildMode,
    output: Option<PathBuf>,
    minify: Option<bool>,
) -> Result<()> {
    tracing::info!("Building in {mode} mode...");

    let file_config = ConfigFile::load(config_path)?;
    let mut config = file_config.into_config(mode);

    if let Some(output) = output {
        config.output_dir = output;
    }
    if let Some(minify) = minify {
        config.minify = minify;
    }

    let builder = Builder::new(config);
    let output = builder.build()?;
    builder.write(&output.manifest)?;

    tracing::info!(
        "Built {} bundle(s), {} file(s) in {}ms",
        output.bundles_built.len(),
        output.manifest.files.len(),
        output.duration_ms
    );
    tracing::info!("Output: {}", builder.config().output_dir.display());

    Ok(())
}
