//! Build orchestration: classify -> transform -> assemble -> optimize.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use baler_pipeline::{classify, Asset, BuildMode, Pipeline, PipelineKind, TransformedAsset};

use crate::assemble::{
    assemble_script_bundle, assemble_style_bundle, expand_template, OutputFile, OutputKind,
    OutputManifest,
};
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::graph::{AssetGraph, EntryGraph};
use crate::html;
use crate::optimize::Optimizer;

/// Result of a full or incremental build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub manifest: OutputManifest,
    pub graph: AssetGraph,

    /// Names of the bundles this run actually rebuilt
    pub bundles_built: Vec<String>,

    pub duration_ms: u64,
}

/// A re-transformed stylesheet module for a hot update.
#[derive(Debug, Clone)]
pub struct StyleUpdate {
    pub source_path: PathBuf,
    pub css: String,
}

/// Raw bundle contents of one entry, before filenames are finalized.
struct EntryArtifacts {
    name: String,
    script: Vec<u8>,
    style: Option<Vec<u8>>,
    statics: Vec<(PathBuf, Vec<u8>)>,
}

/// Coordinates one build session.
///
/// The configuration (including the build mode) is immutable for the
/// builder's lifetime; the optimizer cache persists across rebuilds.
pub struct Builder {
    config: BuildConfig,
    optimizer: Optimizer,
}

impl Builder {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            optimizer: Optimizer::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run a full build of every entry, entirely in memory.
    pub fn build(&self) -> Result<BuildOutput, BuildError> {
        let start = Instant::now();
        self.config.validate()?;

        let graph = AssetGraph::discover(&self.config)?;
        let names: Vec<String> = graph.entries.iter().map(|e| e.name.clone()).collect();

        let manifest = self.assemble_entries(&graph.entries)?;

        Ok(BuildOutput {
            manifest,
            graph,
            bundles_built: names,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Rebuild only the bundles affected by a set of changed source paths
    /// (relative to the source root), merging with the previous manifest.
    ///
    /// With no affected bundle and no template change, the previous manifest
    /// is returned untouched and `bundles_built` is empty.
    pub fn rebuild(
        &self,
        previous: &BuildOutput,
        changed: &HashSet<PathBuf>,
    ) -> Result<BuildOutput, BuildError> {
        let start = Instant::now();

        // Imports may have been added or removed; re-derive the graph.
        let graph = AssetGraph::discover(&self.config)?;

        let affected = graph.affected_bundles(changed);
        let template_changed = changed.contains(&self.config.html_template)
            || self.config.dev.watch.iter().any(|p| changed.contains(p));

        if affected.is_empty() && !template_changed {
            return Ok(BuildOutput {
                manifest: previous.manifest.clone(),
                graph,
                bundles_built: Vec::new(),
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let entries: Vec<EntryGraph> = graph
            .entries
            .iter()
            .filter(|e| affected.contains(&e.name) || template_changed)
            .cloned()
            .collect();

        let fresh = self.assemble_entries(&entries)?;

        let mut manifest = previous.manifest.clone();
        for (logical, file) in fresh.files {
            manifest.insert(logical, file);
        }

        Ok(BuildOutput {
            manifest,
            graph,
            bundles_built: affected,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Re-transform the stylesheet modules whose content is influenced by
    /// the changed paths, for per-module hot updates.
    pub fn style_updates(
        &self,
        graph: &AssetGraph,
        changed: &HashSet<PathBuf>,
    ) -> Result<Vec<StyleUpdate>, BuildError> {
        let pipeline = Pipeline::for_kind(PipelineKind::Stylesheet, &self.config.source_root);
        let mut updates: Vec<StyleUpdate> = Vec::new();

        for entry in &graph.entries {
            for module in &entry.styles {
                if updates.iter().any(|u| &u.source_path == module) {
                    continue;
                }

                let asset = self.read_asset(module, PipelineKind::Stylesheet)?;
                let transformed = pipeline.transform(&asset, self.config.mode)?;

                let influenced = changed.contains(module)
                    || transformed.meta.inlined.iter().any(|p| changed.contains(p));
                if influenced {
                    updates.push(StyleUpdate {
                        source_path: module.clone(),
                        css: String::from_utf8_lossy(&transformed.content).into_owned(),
                    });
                }
            }
        }

        Ok(updates)
    }

    /// Write a manifest to the output directory.
    ///
    /// Callers invoke this only after a fully successful build, so a failed
    /// build never leaves partial output on disk.
    pub fn write(&self, manifest: &OutputManifest) -> Result<(), BuildError> {
        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| BuildError::write(&self.config.output_dir, e))?;

        for file in manifest.files.values() {
            let path = self.config.output_dir.join(&file.filename);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| BuildError::write(parent, e))?;
            }
            fs::write(&path, &file.content).map_err(|e| BuildError::write(&path, e))?;
        }

        Ok(())
    }

    /// Transform and assemble a set of entries into a manifest fragment.
    ///
    /// Entries share no mutable state beyond the read-only configuration,
    /// so they are processed in parallel. Filenames are finalized after the
    /// optimizer runs (a `[hash]` token must hash the emitted content), and
    /// the HTML entry documents are generated strictly last.
    fn assemble_entries(&self, entries: &[EntryGraph]) -> Result<OutputManifest, BuildError> {
        let artifacts: Vec<EntryArtifacts> = entries
            .par_iter()
            .map(|entry| self.build_entry(entry))
            .collect::<Result<_, _>>()?;

        let mut manifest = OutputManifest::default();
        for artifact in artifacts {
            manifest.insert(
                format!("{}.js", artifact.name),
                OutputFile {
                    filename: String::new(),
                    kind: OutputKind::Script,
                    content: artifact.script,
                },
            );

            if let Some(style) = artifact.style {
                manifest.insert(
                    format!("{}.css", artifact.name),
                    OutputFile {
                        filename: String::new(),
                        kind: OutputKind::Stylesheet,
                        content: style,
                    },
                );
            }

            for (path, content) in artifact.statics {
                let name = path.to_string_lossy().replace('\\', "/");
                manifest.insert(
                    name.clone(),
                    OutputFile {
                        filename: name,
                        kind: OutputKind::Static,
                        content,
                    },
                );
            }
        }

        if self.config.mode.is_production() && self.config.minify {
            self.optimizer.optimize(&mut manifest)?;
        }

        for entry in entries {
            let script_name = {
                let file = manifest
                    .files
                    .get(&format!("{}.js", entry.name))
                    .expect("script bundle was assembled");
                expand_template(&self.config.script_template, &entry.name, &file.content)
            };
            if let Some(file) = manifest.files.get_mut(&format!("{}.js", entry.name)) {
                file.filename = script_name;
            }

            let style_name = manifest.files.get(&format!("{}.css", entry.name)).map(|file| {
                expand_template(&self.config.style_template, &entry.name, &file.content)
            });
            if let Some(name) = &style_name {
                if let Some(file) = manifest.files.get_mut(&format!("{}.css", entry.name)) {
                    file.filename = name.clone();
                }
            }
        }

        // Entry documents reference bundles by their final names, so this
        // happens only after every filename above is fixed.
        let template = html::load_template(
            &self.config.source_root,
            &self.config.html_template,
            &self.config.title,
        )?;

        for entry in entries {
            let script = manifest
                .files
                .get(&format!("{}.js", entry.name))
                .map(|f| f.filename.clone())
                .expect("script bundle was assembled");
            let style = manifest
                .files
                .get(&format!("{}.css", entry.name))
                .map(|f| f.filename.clone());

            let styles: Vec<&str> = style.as_deref().into_iter().collect();
            let doc = html::inject_bundles(&template, &styles, &[&script]);

            manifest.insert(
                format!("{}.html", entry.name),
                OutputFile {
                    filename: format!("{}.html", entry.name),
                    kind: OutputKind::Html,
                    content: doc.into_bytes(),
                },
            );
        }

        Ok(manifest)
    }

    fn read_asset(&self, path: &Path, kind: PipelineKind) -> Result<Asset, BuildError> {
        let full = self.config.source_root.join(path);
        let content = fs::read(&full).map_err(|e| BuildError::read(&full, e))?;

        let mut asset = Asset::new(path, content, kind);
        asset.modified = fs::metadata(&full).and_then(|m| m.modified()).ok();
        Ok(asset)
    }

    /// Transform every asset of one entry and concatenate the bundles.
    fn build_entry(&self, entry: &EntryGraph) -> Result<EntryArtifacts, BuildError> {
        let script_pipeline = Pipeline::for_kind(PipelineKind::Script, &self.config.source_root);
        let style_pipeline = Pipeline::for_kind(PipelineKind::Stylesheet, &self.config.source_root);

        let scripts: Vec<TransformedAsset> = entry
            .scripts
            .iter()
            .map(|path| {
                let kind = classify(path, &self.config.source_root)
                    .map_err(|e| BuildError::Config(e.to_string()))?;
                let asset = self.read_asset(path, kind)?;
                script_pipeline
                    .transform(&asset, self.config.mode)
                    .map_err(BuildError::from)
            })
            .collect::<Result<_, _>>()?;

        let styles: Vec<TransformedAsset> = entry
            .styles
            .iter()
            .map(|path| {
                let asset = self.read_asset(path, PipelineKind::Stylesheet)?;
                style_pipeline
                    .transform(&asset, self.config.mode)
                    .map_err(BuildError::from)
            })
            .collect::<Result<_, _>>()?;

        let statics: Vec<(PathBuf, Vec<u8>)> = entry
            .statics
            .iter()
            .map(|path| {
                let asset = self.read_asset(path, PipelineKind::Passthrough)?;
                Ok((path.clone(), asset.content))
            })
            .collect::<Result<_, BuildError>>()?;

        let script = assemble_script_bundle(&scripts, &styles, self.config.mode);

        // Stylesheets are extracted to their own bundle only in production;
        // development injects them at runtime from the script bundle.
        let style = if self.config.mode.is_production() && !styles.is_empty() {
            Some(assemble_style_bundle(&styles))
        } else {
            None
        };

        tracing::debug!(
            "bundle '{}': {} scripts, {} styles, {} static",
            entry.name,
            scripts.len(),
            styles.len(),
            statics.len()
        );

        Ok(EntryArtifacts {
            name: entry.name.clone(),
            script,
            style,
            statics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const ENTRY_JS: &str = "import './style.scss';\nconsole.log('hello');\n";
    const STYLE_SCSS: &str = "h1 { color: red; }\n";
    const TEMPLATE: &str =
        "<!DOCTYPE html>\n<html>\n<head>\n<title>t</title>\n</head>\n<body>\n</body>\n</html>\n";

    fn scaffold(mode: BuildMode) -> (TempDir, Builder) {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("index.js"), ENTRY_JS).unwrap();
        fs::write(src.join("style.scss"), STYLE_SCSS).unwrap();
        fs::write(src.join("index.html"), TEMPLATE).unwrap();

        let mut config = ConfigFile::default().into_config(mode);
        config.source_root = src;
        config.output_dir = temp.path().join("dist");

        (temp, Builder::new(config))
    }

    #[test]
    fn production_build_extracts_css_and_references_both() {
        let (_temp, builder) = scaffold(BuildMode::Production);
        let output = builder.build().unwrap();

        let js = output.manifest.get("index.js").unwrap();
        let css = output.manifest.get("index.css").unwrap();
        let html = output.manifest.get("index.html").unwrap();

        assert_eq!(js.filename, "index.bundle.js");
        assert_eq!(css.filename, "index.bundle.css");

        let doc = String::from_utf8_lossy(&html.content);
        assert!(doc.contains("index.bundle.js"));
        assert!(doc.contains("index.bundle.css"));
    }

    #[test]
    fn development_build_has_no_css_file() {
        let (_temp, builder) = scaffold(BuildMode::Development);
        let output = builder.build().unwrap();

        assert!(output.manifest.get("index.css").is_none());

        let js = String::from_utf8_lossy(&output.manifest.get("index.js").unwrap().content);
        assert!(js.contains("__balerInjectStyle"));
        assert!(js.contains("color: red"));

        let doc = String::from_utf8_lossy(&output.manifest.get("index.html").unwrap().content);
        assert!(doc.contains("index.bundle.js"));
        assert!(!doc.contains("index.bundle.css"));
    }

    #[test]
    fn builds_are_deterministic() {
        let (_temp, builder) = scaffold(BuildMode::Production);

        let a = builder.build().unwrap();
        let b = builder.build().unwrap();

        assert_eq!(a.manifest.files.len(), b.manifest.files.len());
        for (logical, file) in &a.manifest.files {
            let other = b.manifest.get(logical).unwrap();
            assert_eq!(file.filename, other.filename, "{logical}");
            assert_eq!(file.content, other.content, "{logical}");
        }
    }

    #[test]
    fn production_output_is_smaller_than_development() {
        let (_temp, dev_builder) = scaffold(BuildMode::Development);
        let (_temp2, prod_builder) = scaffold(BuildMode::Production);

        let dev = dev_builder.build().unwrap();
        let prod = prod_builder.build().unwrap();

        let dev_js = dev.manifest.get("index.js").unwrap();
        let prod_js = prod.manifest.get("index.js").unwrap();

        // Same program, different optimizer involvement.
        assert!(prod_js.content.len() < dev_js.content.len());
        assert!(String::from_utf8_lossy(&prod_js.content).contains("hello"));
    }

    #[test]
    fn rebuild_with_no_changes_touches_nothing() {
        let (_temp, builder) = scaffold(BuildMode::Development);
        let output = builder.build().unwrap();

        let rebuilt = builder.rebuild(&output, &HashSet::new()).unwrap();

        assert!(rebuilt.bundles_built.is_empty());
        assert_eq!(
            rebuilt.manifest.get("index.js").unwrap().content,
            output.manifest.get("index.js").unwrap().content
        );
    }

    #[test]
    fn rebuild_only_touches_affected_bundles() {
        let (_temp, builder) = {
            let temp = tempdir().unwrap();
            let src = temp.path().join("src");
            fs::create_dir_all(&src).unwrap();
            fs::write(src.join("index.js"), ENTRY_JS).unwrap();
            fs::write(src.join("style.scss"), STYLE_SCSS).unwrap();
            fs::write(src.join("admin.js"), "console.log('admin');\n").unwrap();

            let mut config = ConfigFile::default().into_config(BuildMode::Development);
            config.source_root = src;
            config.entries.insert("admin".to_string(), PathBuf::from("admin.js"));
            (temp, Builder::new(config))
        };

        let output = builder.build().unwrap();

        let changed: HashSet<PathBuf> = [PathBuf::from("style.scss")].into();
        let rebuilt = builder.rebuild(&output, &changed).unwrap();

        assert_eq!(rebuilt.bundles_built, vec!["index"]);
    }

    #[test]
    fn stage_error_aborts_without_output() {
        let (temp, builder) = scaffold(BuildMode::Development);
        fs::write(
            builder.config().source_root.join("index.js"),
            "import './style.scss';\nconst broken = ;\n",
        )
        .unwrap();

        let err = builder.build().unwrap_err();
        assert!(matches!(err, BuildError::Stage(_)));
        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn missing_source_root_is_a_config_error() {
        let temp = tempdir().unwrap();
        let mut config = ConfigFile::default().into_config(BuildMode::Development);
        config.source_root = temp.path().join("nope");

        let err = Builder::new(config).build().unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn style_updates_cover_changed_modules_only() {
        let (_temp, builder) = scaffold(BuildMode::Development);
        let output = builder.build().unwrap();

        let changed: HashSet<PathBuf> = [PathBuf::from("style.scss")].into();
        let updates = builder.style_updates(&output.graph, &changed).unwrap();

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].source_path, PathBuf::from("style.scss"));
        assert!(updates[0].css.contains("color: red"));

        let unrelated: HashSet<PathBuf> = [PathBuf::from("index.js")].into();
        let updates = builder.style_updates(&output.graph, &unrelated).unwrap();
        assert!(updates.is_empty());
    }

    #[test]
    fn write_emits_every_manifest_file() {
        let (temp, builder) = scaffold(BuildMode::Production);
        let output = builder.build().unwrap();
        builder.write(&output.manifest).unwrap();

        let dist = temp.path().join("dist");
        assert!(dist.join("index.bundle.js").exists());
        assert!(dist.join("index.bundle.css").exists());
        assert!(dist.join("index.html").exists());
    }

    #[test]
    fn hashed_filenames_change_with_content() {
        let (_temp, builder) = {
            let temp = tempdir().unwrap();
            let src = temp.path().join("src");
            fs::create_dir_all(&src).unwrap();
            fs::write(src.join("index.js"), "console.log(1);\n").unwrap();

            let mut config = ConfigFile::default().into_config(BuildMode::Development);
            config.source_root = src;
            config.script_template = "[name].[hash].js".to_string();
            (temp, Builder::new(config))
        };

        let first = builder.build().unwrap();
        let name_a = first.manifest.get("index.js").unwrap().filename.clone();

        fs::write(
            builder.config().source_root.join("index.js"),
            "console.log(2);\n",
        )
        .unwrap();

        let second = builder.build().unwrap();
        let name_b = second.manifest.get("index.js").unwrap().filename.clone();

        assert_ne!(name_a, name_b);

        let doc = String::from_utf8_lossy(&second.manifest.get("index.html").unwrap().content);
        assert!(doc.contains(&name_b), "entry document references the final name");
    }
}
