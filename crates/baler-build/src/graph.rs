//! Static asset graph: which files each bundle is built from.
//!
//! The graph exists for two reasons: fixing the deterministic concatenation
//! order of each bundle, and answering "which bundles does a changed path
//! affect" during watch sessions. It is not a module resolver; only relative
//! specifiers inside the source root participate.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use baler_pipeline::{classify, scan_script_imports, scan_style_imports, PipelineKind};

use crate::config::BuildConfig;
use crate::error::BuildError;

/// The asset set of one entry/bundle.
#[derive(Debug, Clone)]
pub struct EntryGraph {
    /// Bundle name (entry name)
    pub name: String,

    /// Script assets in dependency-first order, relative to the source root
    pub scripts: Vec<PathBuf>,

    /// Top-level stylesheet modules in discovery order
    pub styles: Vec<PathBuf>,

    /// Static assets referenced from scripts, copied through unchanged
    pub statics: Vec<PathBuf>,

    /// Every path that contributes to this bundle, including stylesheets
    /// reachable only through `@import`
    pub reachable: BTreeSet<PathBuf>,
}

/// Asset graph for a whole build session.
#[derive(Debug, Clone)]
pub struct AssetGraph {
    pub entries: Vec<EntryGraph>,
}

impl AssetGraph {
    /// Walk every entry and collect its reachable asset set.
    pub fn discover(config: &BuildConfig) -> Result<Self, BuildError> {
        let mut entries = Vec::new();

        for (name, entry_path) in &config.entries {
            let mut graph = EntryGraph {
                name: name.clone(),
                scripts: Vec::new(),
                styles: Vec::new(),
                statics: Vec::new(),
                reachable: BTreeSet::new(),
            };

            let mut visited = HashSet::new();
            walk_script(config, entry_path, &mut graph, &mut visited)?;

            entries.push(graph);
        }

        Ok(Self { entries })
    }

    /// Bundle names affected by a set of changed source paths.
    ///
    /// A bundle is affected when its transitive asset set contains any
    /// changed path; unrelated bundles stay untouched.
    pub fn affected_bundles(&self, changed: &HashSet<PathBuf>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| changed.iter().any(|path| entry.reachable.contains(path)))
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Union of every bundle's reachable set, relative to the source root.
    pub fn watched_paths(&self) -> BTreeSet<PathBuf> {
        self.entries
            .iter()
            .flat_map(|entry| entry.reachable.iter().cloned())
            .collect()
    }

    pub fn entry(&self, name: &str) -> Option<&EntryGraph> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// Collapse `.` and `..` components lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn read_source(config: &BuildConfig, path: &Path) -> Result<String, BuildError> {
    let full = config.source_root.join(path);
    fs::read_to_string(&full).map_err(|e| BuildError::read(full, e))
}

/// Depth-first walk of a script file: dependencies land in the graph before
/// their importer, giving the bundle its concatenation order.
fn walk_script(
    config: &BuildConfig,
    path: &Path,
    graph: &mut EntryGraph,
    visited: &mut HashSet<PathBuf>,
) -> Result<(), BuildError> {
    let path = normalize(path);
    if !visited.insert(path.clone()) {
        return Ok(());
    }

    classify(&path, &config.source_root).map_err(|e| BuildError::Config(e.to_string()))?;

    let content = read_source(config, &path)?;
    let dir = path.parent().unwrap_or(Path::new("")).to_path_buf();

    for spec in scan_script_imports(&content) {
        let dep = normalize(&dir.join(&spec));
        let kind = classify(&dep, &config.source_root)
            .map_err(|e| BuildError::Config(e.to_string()))?;

        match kind {
            PipelineKind::Script => walk_script(config, &dep, graph, visited)?,
            PipelineKind::Stylesheet => {
                if visited.insert(dep.clone()) {
                    graph.styles.push(dep.clone());
                    graph.reachable.insert(dep.clone());
                    walk_style(config, &dep, graph)?;
                }
            }
            PipelineKind::Passthrough => {
                if visited.insert(dep.clone()) {
                    graph.statics.push(dep.clone());
                    graph.reachable.insert(dep);
                }
            }
        }
    }

    graph.scripts.push(path.clone());
    graph.reachable.insert(path);
    Ok(())
}

/// Follow `@import`s so nested stylesheets invalidate the bundle too.
fn walk_style(config: &BuildConfig, path: &Path, graph: &mut EntryGraph) -> Result<(), BuildError> {
    let content = read_source(config, path)?;
    let dir = path.parent().unwrap_or(Path::new("")).to_path_buf();

    for spec in scan_style_imports(&content) {
        let dep = normalize(&dir.join(&spec));
        if graph.reachable.insert(dep.clone()) {
            // Missing @import targets surface later as a css-imports stage
            // error; the graph walk only tracks what exists.
            if config.source_root.join(&dep).is_file() {
                walk_style(config, &dep, graph)?;
            }
        }
    }

    Ok(())
}
