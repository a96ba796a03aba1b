//! Initialize a project skeleton.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(yes: bool) -> Result<()> {
    tracing::info!("Initializing baler...");

    let src_dir = Path::new("src");

    // Check if src already exists
    if src_dir.exists() {
        if !yes {
            tracing::warn!("src/ directory already exists. Use --yes to overwrite.");
            return Ok(());
        }
    } else {
        fs::create_dir_all(src_dir).context("Failed to create src directory")?;
    }

    // Create default config
    let config_path = Path::new("baler.toml");
    if !config_path.exists() || yes {
        fs::write(config_path, DEFAULT_CONFIG).context("Failed to write baler.toml")?;
        tracing::info!("Created baler.toml");
    }

    // Create entry script
    let entry_path = src_dir.join("index.js");
    if !entry_path.exists() || yes {
        fs::write(&entry_path, DEFAULT_ENTRY).context("Failed to write index.js")?;
        tracing::info!("Created src/index.js");
    }

    // Create stylesheet
    let style_path = src_dir.join("style.scss");
    if !style_path.exists() || yes {
        fs::write(&style_path, DEFAULT_STYLE).context("Failed to write style.scss")?;
        tracing::info!("Created src/style.scss");
    }

    // Create entry document template
    let template_path = src_dir.join("index.html");
    if !template_path.exists() || yes {
        fs::write(&template_path, DEFAULT_TEMPLATE).context("Failed to write index.html")?;
        tracing::info!("Created src/index.html");
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'baler dev' to start the development server.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Baler Configuration

[build]
# Source directory for assets
source = "src"

# Output directory for built bundles
output = "dist"

# Bundle filename templates ([name] and [hash] tokens)
script_filename = "[name].bundle.js"
style_filename = "[name].bundle.css"

# Entry document template, relative to the source directory
template = "index.html"

# Page title for the default template
title = "baler app"

# Enable minification in production builds
minify = true

[entries]
# Entry name = entry script, relative to the source directory
index = "index.js"

[dev]
host = "localhost"
port = 8080
open = true
"#;

const DEFAULT_ENTRY: &str = r#"import './style.scss';

console.log('hello from baler');
"#;

const DEFAULT_STYLE: &str = r#"body {
  font-family: sans-serif;
  margin: 2rem;
}

h1 {
  color: #333;
}
"#;

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>baler app</title>
</head>
<body>
  <h1>baler</h1>
</body>
</html>
"#;
