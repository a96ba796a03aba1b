//! Bundle assembly for baler.
//!
//! Takes classified, transformed assets and assembles them into named output
//! bundles plus an entry HTML document, with a production-only optimization
//! pass. Given the same asset contents and mode, every build of a bundle is
//! byte-identical.

pub mod assemble;
pub mod builder;
pub mod config;
pub mod error;
pub mod graph;
pub mod html;
pub mod optimize;

pub use assemble::{expand_template, OutputFile, OutputKind, OutputManifest};
pub use builder::{BuildOutput, Builder, StyleUpdate};
pub use config::{BuildConfig, ConfigFile, DevConfig};
pub use error::BuildError;
pub use graph::{AssetGraph, EntryGraph};
pub use optimize::Optimizer;

pub use baler_pipeline::BuildMode;
