//! Output assembly: bundles, filenames and the manifest.

use std::collections::BTreeMap;

use baler_pipeline::{BuildMode, TransformedAsset};

/// What an emitted file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Script,
    Stylesheet,
    Html,
    Static,
}

/// One emitted file.
#[derive(Debug, Clone)]
pub struct OutputFile {
    /// Final filename relative to the output directory
    pub filename: String,

    pub kind: OutputKind,
    pub content: Vec<u8>,
}

/// The mapping from logical output names (`index.js`, `index.css`,
/// `index.html`, ...) to final emitted files.
///
/// A `BTreeMap` keeps iteration deterministic so two assemble runs over the
/// same inputs write files in the same order.
#[derive(Debug, Clone, Default)]
pub struct OutputManifest {
    pub files: BTreeMap<String, OutputFile>,
}

impl OutputManifest {
    pub fn get(&self, logical: &str) -> Option<&OutputFile> {
        self.files.get(logical)
    }

    pub fn insert(&mut self, logical: impl Into<String>, file: OutputFile) {
        self.files.insert(logical.into(), file);
    }

    /// Look up a file by its emitted filename (dev-server request paths).
    pub fn by_filename(&self, filename: &str) -> Option<&OutputFile> {
        self.files.values().find(|f| f.filename == filename)
    }
}

/// Expand a filename template for a bundle.
///
/// `[name]` is the bundle name; `[hash]` is the first 8 hex chars of the
/// blake3 hash of the final content — a pure function of content, so
/// rebuilding unchanged input reproduces the same filename.
pub fn expand_template(template: &str, name: &str, content: &[u8]) -> String {
    let mut out = template.replace("[name]", name);
    if out.contains("[hash]") {
        let hash = blake3::hash(content);
        out = out.replace("[hash]", &hash.to_hex().as_str()[..8]);
    }
    out
}

/// JS string literal for embedded CSS (JSON escaping is valid JS).
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

const STYLE_RUNTIME: &str = r#"function __balerInjectStyle(source, css) {
  var el = document.querySelector('style[data-source="' + source + '"]');
  if (!el) {
    el = document.createElement('style');
    el.setAttribute('data-source', source);
    document.head.appendChild(el);
  }
  el.textContent = css;
}
"#;

/// Concatenate transformed scripts (dependency-first order) into one bundle.
///
/// In development each stylesheet module is embedded as an
/// `__balerInjectStyle(sourcePath, css)` call, keyed by source path so a hot
/// update can replace exactly one module's styles at runtime. In production
/// stylesheets are extracted instead and the runtime is omitted.
pub fn assemble_script_bundle(
    scripts: &[TransformedAsset],
    styles: &[TransformedAsset],
    mode: BuildMode,
) -> Vec<u8> {
    let mut out = String::new();

    // External (bare) imports hoist above the wrapper, deduplicated in
    // first-seen order.
    let mut seen = std::collections::BTreeSet::new();
    for script in scripts {
        for external in &script.meta.externals {
            if seen.insert(external.clone()) {
                out.push_str(external);
                out.push('\n');
            }
        }
    }

    out.push_str("(function () {\n'use strict';\n");

    if mode == BuildMode::Development && !styles.is_empty() {
        out.push_str(STYLE_RUNTIME);
        for style in styles {
            let css = String::from_utf8_lossy(&style.content);
            out.push_str(&format!(
                "__balerInjectStyle({}, {});\n",
                js_string(&style.source_path.to_string_lossy()),
                js_string(&css),
            ));
        }
    }

    for script in scripts {
        out.push_str(&String::from_utf8_lossy(&script.content));
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }

    out.push_str("})();\n");
    out.into_bytes()
}

/// Concatenate transformed stylesheets into the extracted CSS bundle
/// (production output).
pub fn assemble_style_bundle(styles: &[TransformedAsset]) -> Vec<u8> {
    let mut out = String::new();
    for style in styles {
        out.push_str(&String::from_utf8_lossy(&style.content));
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    out.into_bytes()
}
