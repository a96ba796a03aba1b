//! Build error taxonomy.

use std::path::PathBuf;

use baler_pipeline::StageError;

/// Errors that can occur during a build.
///
/// Configuration errors are fatal before any output is produced. Stage
/// errors abort a one-shot build with no partial output written; a watch
/// session reports them and keeps serving the previous manifest.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("Failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("Failed to write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

impl BuildError {
    pub fn read(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        BuildError::Read {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        BuildError::Write {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
