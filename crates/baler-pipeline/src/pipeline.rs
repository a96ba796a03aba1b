//! Pipelines: fixed stage chains per asset kind.

use std::path::{Path, PathBuf};

use crate::asset::{Asset, PipelineKind};
use crate::mode::BuildMode;
use crate::script::{EsImports, ScriptParse};
use crate::stage::{Stage, StageError, StageIo, TransformMeta};
use crate::stylesheet::{CssImports, CssTransform};

/// Output of running an asset through its pipeline.
#[derive(Debug, Clone)]
pub struct TransformedAsset {
    pub source_path: PathBuf,
    pub kind: PipelineKind,
    pub content: Vec<u8>,
    pub meta: TransformMeta,
}

/// An ordered chain of named stages for one pipeline kind.
///
/// Stage order is fixed per kind and deterministic: the same asset content
/// and mode always produce byte-identical output.
pub struct Pipeline {
    kind: PipelineKind,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Build the pipeline for an asset kind.
    ///
    /// The source root anchors `@import` resolution for stylesheets.
    pub fn for_kind(kind: PipelineKind, source_root: &Path) -> Self {
        let stages: Vec<Box<dyn Stage>> = match kind {
            PipelineKind::Script => vec![Box::new(EsImports), Box::new(ScriptParse)],
            PipelineKind::Stylesheet => {
                vec![Box::new(CssImports::new(source_root)), Box::new(CssTransform)]
            }
            PipelineKind::Passthrough => Vec::new(),
        };

        Self { kind, stages }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Run the asset through every stage in order.
    ///
    /// Passthrough assets skip the text stages entirely and keep their raw
    /// bytes, so binary assets survive unchanged.
    pub fn transform(&self, asset: &Asset, mode: BuildMode) -> Result<TransformedAsset, StageError> {
        let meta = TransformMeta {
            source_path: asset.path.clone(),
            ..Default::default()
        };

        if self.stages.is_empty() {
            return Ok(TransformedAsset {
                source_path: asset.path.clone(),
                kind: self.kind,
                content: asset.content.clone(),
                meta,
            });
        }

        let content = String::from_utf8(asset.content.clone()).map_err(|_| {
            StageError::new(
                "decode",
                asset.path.display().to_string(),
                "asset content is not valid UTF-8",
            )
        })?;

        let mut io = StageIo { content, meta };
        for stage in &self.stages {
            io = stage.apply(io, mode)?;
        }

        Ok(TransformedAsset {
            source_path: asset.path.clone(),
            kind: self.kind,
            content: io.content.into_bytes(),
            meta: io.meta,
        })
    }
}
