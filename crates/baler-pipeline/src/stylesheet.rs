//! Stylesheet pipeline stages: `@import` inlining and CSS normalization.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use regex::Regex;

use crate::mode::BuildMode;
use crate::stage::{Stage, StageError, StageIo};

/// Matches a CSS `@import` statement, capturing the specifier.
static CSS_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']([^"']+)["']\s*\)?\s*;"#)
        .expect("css import regex is valid")
});

/// Collect `@import` specifiers from stylesheet source.
pub fn scan_style_imports(content: &str) -> Vec<String> {
    CSS_IMPORT_RE
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Collapse `.` and `..` components without touching the filesystem.
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

/// Stage "css-imports": recursively inlines `@import`ed stylesheets relative
/// to the importing file. Each inlined file is recorded in the metadata so
/// the watch session can invalidate the importer when a nested file changes.
pub struct CssImports {
    source_root: PathBuf,
}

impl CssImports {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
        }
    }

    fn inline(
        &self,
        content: &str,
        relative_to: &Path,
        visited: &mut HashSet<PathBuf>,
        inlined: &mut Vec<PathBuf>,
        origin: &Path,
    ) -> Result<String, StageError> {
        let mut out = String::with_capacity(content.len());
        let mut last = 0;

        for caps in CSS_IMPORT_RE.captures_iter(content) {
            let whole = caps.get(0).expect("match");
            let spec = &caps[1];

            out.push_str(&content[last..whole.start()]);
            last = whole.end();

            let target = normalize(&relative_to.join(spec));
            if !visited.insert(target.clone()) {
                // Import cycle: second occurrence contributes nothing.
                continue;
            }

            let nested_content =
                fs::read_to_string(self.source_root.join(&target)).map_err(|e| {
                    StageError::new(
                        "css-imports",
                        origin.display().to_string(),
                        format!("cannot resolve @import '{spec}': {e}"),
                    )
                })?;

            inlined.push(target.clone());

            let nested_dir = target.parent().unwrap_or(Path::new("")).to_path_buf();
            let nested = self.inline(&nested_content, &nested_dir, visited, inlined, origin)?;
            out.push_str(&nested);
        }

        out.push_str(&content[last..]);
        Ok(out)
    }
}

impl Stage for CssImports {
    fn name(&self) -> &'static str {
        "css-imports"
    }

    fn apply(&self, mut input: StageIo, _mode: BuildMode) -> Result<StageIo, StageError> {
        let origin = input.meta.source_path.clone();
        let dir = origin.parent().unwrap_or(Path::new("")).to_path_buf();

        let mut visited = HashSet::new();
        visited.insert(normalize(&origin));

        let mut inlined = Vec::new();
        let content = self.inline(&input.content, &dir, &mut visited, &mut inlined, &origin)?;

        input.content = content;
        input.meta.inlined.extend(inlined);
        Ok(input)
    }
}

/// Stage "css-transform": parses the stylesheet and reprints it in canonical
/// (un-minified) form. Parse failures become stage errors with the offending
/// source path attached.
pub struct CssTransform;

impl Stage for CssTransform {
    fn name(&self) -> &'static str {
        "css-transform"
    }

    fn apply(&self, mut input: StageIo, _mode: BuildMode) -> Result<StageIo, StageError> {
        let path = input.meta.source_path.display().to_string();

        let code = {
            let stylesheet = StyleSheet::parse(&input.content, ParserOptions::default())
                .map_err(|e| StageError::new(self.name(), path.clone(), e.to_string()))?;

            stylesheet
                .to_css(PrinterOptions::default())
                .map_err(|e| StageError::new(self.name(), path.clone(), e.to_string()))?
                .code
        };

        input.content = code;
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::TransformMeta;
    use std::fs;
    use tempfile::tempdir;

    fn io(path: &str, content: &str) -> StageIo {
        StageIo {
            content: content.to_string(),
            meta: TransformMeta {
                source_path: PathBuf::from(path),
                ..Default::default()
            },
        }
    }

    #[test]
    fn scans_import_specifiers() {
        let css = "@import './base.css';\n@import url(\"theme.css\");\nbody { margin: 0; }";
        assert_eq!(scan_style_imports(css), vec!["./base.css", "theme.css"]);
    }

    #[test]
    fn inlines_imports_recursively() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("base.css"), "@import './colors.css';\nbody { margin: 0; }").unwrap();
        fs::write(temp.path().join("colors.css"), ":root { --fg: black; }").unwrap();

        let stage = CssImports::new(temp.path());
        let out = stage
            .apply(io("style.scss", "@import './base.css';\nh1 { color: var(--fg); }"), BuildMode::Development)
            .unwrap();

        assert!(out.content.contains("--fg: black"));
        assert!(out.content.contains("margin: 0"));
        assert!(out.content.contains("h1"));
        assert!(!out.content.contains("@import"));
        assert_eq!(
            out.meta.inlined,
            vec![PathBuf::from("base.css"), PathBuf::from("colors.css")]
        );
    }

    #[test]
    fn import_cycles_are_inlined_once() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.css"), "@import './b.css';\n.a { color: red; }").unwrap();
        fs::write(temp.path().join("b.css"), "@import './a.css';\n.b { color: blue; }").unwrap();

        let stage = CssImports::new(temp.path());
        let out = stage
            .apply(io("a.css", "@import './b.css';\n.a { color: red; }"), BuildMode::Development)
            .unwrap();

        assert_eq!(out.content.matches(".b {").count(), 1);
    }

    #[test]
    fn missing_import_is_a_stage_error() {
        let temp = tempdir().unwrap();
        let stage = CssImports::new(temp.path());

        let err = stage
            .apply(io("style.css", "@import './missing.css';"), BuildMode::Development)
            .unwrap_err();

        assert_eq!(err.stage, "css-imports");
        assert!(err.message.contains("missing.css"));
    }

    #[test]
    fn transform_normalizes_css() {
        let out = CssTransform
            .apply(io("style.css", "body{margin:0px;color:#ff0000}"), BuildMode::Development)
            .unwrap();

        assert!(out.content.contains("body"));
        // Source path metadata survives the chain.
        assert_eq!(out.meta.source_path, PathBuf::from("style.css"));
    }

    #[test]
    fn transform_rejects_garbage() {
        let err = CssTransform
            .apply(io("style.css", "body { color: }@}{"), BuildMode::Development)
            .unwrap_err();

        assert_eq!(err.stage, "css-transform");
    }
}
