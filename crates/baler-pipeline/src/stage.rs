//! Stage trait and the content/metadata pair flowing between stages.

use std::path::PathBuf;

use crate::mode::BuildMode;

/// Metadata carried alongside content through a pipeline.
///
/// The source path survives every stage so a change can later be attributed
/// to a specific file (required for stylesheet hot updates in development).
#[derive(Debug, Clone, Default)]
pub struct TransformMeta {
    /// Source path of the asset this content originated from
    pub source_path: PathBuf,

    /// Relative script specifiers collected from import statements
    pub script_deps: Vec<String>,

    /// Relative stylesheet specifiers collected from import statements
    pub style_deps: Vec<String>,

    /// Stylesheet files inlined into this content by `@import` resolution
    pub inlined: Vec<PathBuf>,

    /// Verbatim import statements for bare (external) specifiers, hoisted
    /// to the top of the assembled bundle
    pub externals: Vec<String>,
}

/// Content plus metadata consumed and produced by each stage.
#[derive(Debug, Clone)]
pub struct StageIo {
    pub content: String,
    pub meta: TransformMeta,
}

/// A transform or optimize stage failure, carrying the stage name and a
/// diagnostic message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Stage '{stage}' failed for {path}: {message}")]
pub struct StageError {
    pub stage: String,
    pub path: String,
    pub message: String,
}

impl StageError {
    pub fn new(stage: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            path: path.into(),
            message: message.into(),
        }
    }
}

/// One named step of a transformation pipeline.
///
/// Stages consume the previous stage's output and either produce new
/// content/metadata or fail with a [`StageError`]. A stage must be
/// deterministic: the same input and mode always yield the same output.
pub trait Stage: Send + Sync {
    /// Stage name used in diagnostics (e.g. "es-imports")
    fn name(&self) -> &'static str;

    /// Apply this stage.
    fn apply(&self, input: StageIo, mode: BuildMode) -> Result<StageIo, StageError>;
}
