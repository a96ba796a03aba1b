//! Asset classification and transformation pipelines for baler.
//!
//! Maps source files to a [`PipelineKind`] and runs them through a fixed,
//! deterministic chain of named stages. Identical content and mode always
//! produce byte-identical output.

pub mod asset;
pub mod mode;
pub mod pipeline;
pub mod script;
pub mod stage;
pub mod stylesheet;

pub use asset::{classify, Asset, ClassifyError, PipelineKind};
pub use mode::BuildMode;
pub use pipeline::{Pipeline, TransformedAsset};
pub use script::scan_script_imports;
pub use stage::{Stage, StageError, StageIo, TransformMeta};
pub use stylesheet::scan_style_imports;
