//! Build configuration (`baler.toml`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use baler_pipeline::BuildMode;
use serde::Deserialize;

use crate::error::BuildError;

/// Configuration file structure (`baler.toml`).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    build: BuildSection,
    #[serde(default)]
    entries: BTreeMap<String, String>,
    #[serde(default)]
    dev: DevSection,
}

#[derive(Debug, Deserialize)]
struct BuildSection {
    #[serde(default = "default_source")]
    source: String,
    #[serde(default = "default_output")]
    output: String,
    #[serde(default = "default_script_filename")]
    script_filename: String,
    #[serde(default = "default_style_filename")]
    style_filename: String,
    #[serde(default = "default_title")]
    title: String,
    /// HTML template relative to the source root
    #[serde(default = "default_template")]
    template: String,
    #[serde(default = "default_minify")]
    minify: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
            script_filename: default_script_filename(),
            style_filename: default_style_filename(),
            title: default_title(),
            template: default_template(),
            minify: default_minify(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DevSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_open")]
    open: bool,
    /// Extra watched paths (relative to the source root), additive to the
    /// module-graph watch set
    #[serde(default)]
    watch: Vec<String>,
}

impl Default for DevSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: default_open(),
            watch: Vec::new(),
        }
    }
}

fn default_source() -> String {
    "src".to_string()
}
fn default_output() -> String {
    "dist".to_string()
}
fn default_script_filename() -> String {
    "[name].bundle.js".to_string()
}
fn default_style_filename() -> String {
    "[name].bundle.css".to_string()
}
fn default_title() -> String {
    "baler app".to_string()
}
fn default_template() -> String {
    "index.html".to_string()
}
fn default_minify() -> bool {
    true
}
fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_open() -> bool {
    true
}

impl ConfigFile {
    /// Load `baler.toml` from the given path, falling back to defaults when
    /// the file does not exist. A malformed file is a configuration error.
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| BuildError::read(path, e))?;
        toml::from_str(&content)
            .map_err(|e| BuildError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Resolve into a [`BuildConfig`] for the session.
    pub fn into_config(self, mode: BuildMode) -> BuildConfig {
        let mut entries: BTreeMap<String, PathBuf> = self
            .entries
            .into_iter()
            .map(|(name, path)| (name, PathBuf::from(path)))
            .collect();

        if entries.is_empty() {
            entries.insert("index".to_string(), PathBuf::from("index.js"));
        }

        BuildConfig {
            source_root: PathBuf::from(self.build.source),
            output_dir: PathBuf::from(self.build.output),
            entries,
            script_template: self.build.script_filename,
            style_template: self.build.style_filename,
            html_template: PathBuf::from(self.build.template),
            title: self.build.title,
            minify: self.build.minify,
            mode,
            dev: DevConfig {
                host: self.dev.host,
                port: self.dev.port,
                open: self.dev.open,
                watch: self.dev.watch.into_iter().map(PathBuf::from).collect(),
            },
        }
    }
}

/// Dev-server settings.
#[derive(Debug, Clone)]
pub struct DevConfig {
    pub host: String,
    pub port: u16,
    pub open: bool,
    pub watch: Vec<PathBuf>,
}

/// Resolved build configuration, immutable for the session.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory containing source assets
    pub source_root: PathBuf,

    /// Directory receiving one-shot build output
    pub output_dir: PathBuf,

    /// Entry name -> entry file relative to the source root
    pub entries: BTreeMap<String, PathBuf>,

    /// Script bundle filename template (`[name]`, `[hash]` tokens)
    pub script_template: String,

    /// Extracted stylesheet bundle filename template
    pub style_template: String,

    /// Entry HTML template relative to the source root
    pub html_template: PathBuf,

    /// Title injected into the default entry document
    pub title: String,

    /// Whether the production optimizer runs
    pub minify: bool,

    /// Build mode, set once at session start
    pub mode: BuildMode,

    pub dev: DevConfig,
}

impl BuildConfig {
    /// Validate the parts of the configuration that must hold before any
    /// output is produced.
    pub fn validate(&self) -> Result<(), BuildError> {
        if !self.source_root.is_dir() {
            return Err(BuildError::Config(format!(
                "source root not found: {}",
                self.source_root.display()
            )));
        }

        for (name, entry) in &self.entries {
            let path = self.source_root.join(entry);
            if !path.is_file() {
                return Err(BuildError::Config(format!(
                    "entry '{name}' not found: {}",
                    path.display()
                )));
            }
        }

        Ok(())
    }
}
