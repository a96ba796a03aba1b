//! Source assets and the classifier mapping them to pipelines.

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// The category of transformation chain applicable to an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// ES module scripts (`.js`, `.mjs`)
    Script,

    /// Stylesheets (`.css`, `.scss`, `.sass`)
    Stylesheet,

    /// Everything else, copied through unchanged
    Passthrough,
}

/// A single source file tracked by the build.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Path relative to the source root
    pub path: PathBuf,

    /// Raw content bytes as last read from disk
    pub content: Vec<u8>,

    /// Pipeline this asset goes through
    pub kind: PipelineKind,

    /// Last-modified timestamp, when the filesystem provides one
    pub modified: Option<SystemTime>,
}

impl Asset {
    pub fn new(path: impl Into<PathBuf>, content: Vec<u8>, kind: PipelineKind) -> Self {
        Self {
            path: path.into(),
            content,
            kind,
            modified: None,
        }
    }
}

/// Errors from the classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Path escapes the source root: {}", .0.display())]
    OutsideSourceRoot(PathBuf),
}

/// Classify a path into its pipeline kind.
///
/// Pure and total over extensions: every path under the source root maps to
/// exactly one kind, with unrecognized extensions falling through to
/// [`PipelineKind::Passthrough`]. A path outside the source root is a
/// configuration error.
pub fn classify(path: &Path, source_root: &Path) -> Result<PipelineKind, ClassifyError> {
    if escapes_root(path, source_root) {
        return Err(ClassifyError::OutsideSourceRoot(path.to_path_buf()));
    }

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    Ok(match ext {
        "js" | "mjs" => PipelineKind::Script,
        "css" | "scss" | "sass" => PipelineKind::Stylesheet,
        _ => PipelineKind::Passthrough,
    })
}

/// Whether a path resolves outside the source root.
///
/// Absolute paths must sit under the root; relative paths must not climb out
/// of it with `..` components.
fn escapes_root(path: &Path, source_root: &Path) -> bool {
    if path.is_absolute() {
        return !path.starts_with(source_root);
    }

    let mut depth: i32 = 0;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        let root = Path::new("src");
        assert_eq!(classify(Path::new("index.js"), root).unwrap(), PipelineKind::Script);
        assert_eq!(classify(Path::new("app.mjs"), root).unwrap(), PipelineKind::Script);
        assert_eq!(
            classify(Path::new("style.scss"), root).unwrap(),
            PipelineKind::Stylesheet
        );
        assert_eq!(classify(Path::new("main.css"), root).unwrap(), PipelineKind::Stylesheet);
    }

    #[test]
    fn unknown_extensions_pass_through() {
        let root = Path::new("src");
        assert_eq!(classify(Path::new("logo.png"), root).unwrap(), PipelineKind::Passthrough);
        assert_eq!(classify(Path::new("README"), root).unwrap(), PipelineKind::Passthrough);
    }

    #[test]
    fn rejects_paths_escaping_the_root() {
        let root = Path::new("/project/src");
        assert!(classify(Path::new("/etc/passwd"), root).is_err());
        assert!(classify(Path::new("../outside.js"), root).is_err());
        assert!(classify(Path::new("nested/../../outside.js"), root).is_err());
    }

    #[test]
    fn accepts_paths_under_the_root() {
        let root = Path::new("/project/src");
        assert!(classify(Path::new("/project/src/index.js"), root).is_ok());
        assert!(classify(Path::new("nested/../index.js"), root).is_ok());
    }
}
