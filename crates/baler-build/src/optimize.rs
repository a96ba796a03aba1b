//! Production-only output optimization.
//!
//! Scripts go through the oxc minifier, stylesheets through lightningcss.
//! Both passes are behavior-preserving. Results are cached keyed by the
//! blake3 hash of the input, so an unchanged bundle skips re-optimization
//! entirely on the next rebuild of a watch session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use rayon::prelude::*;

use baler_pipeline::StageError;

use crate::assemble::{OutputKind, OutputManifest};

/// Minify a script bundle.
fn minify_js(source: &str) -> Result<String, String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(error.to_string());
    }

    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);

    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;

    Ok(code)
}

/// Minify a stylesheet bundle.
fn minify_css(source: &str) -> Result<String, String> {
    let stylesheet =
        StyleSheet::parse(source, ParserOptions::default()).map_err(|e| e.to_string())?;

    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    Ok(result.code)
}

/// Shrinks script and stylesheet outputs, with a content-addressed cache.
pub struct Optimizer {
    cache: Mutex<HashMap<blake3::Hash, Vec<u8>>>,
    hits: AtomicUsize,
}

impl Optimizer {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
        }
    }

    /// Cache hits observed so far (unchanged inputs short-circuited).
    pub fn cache_hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    fn optimize_one(&self, kind: OutputKind, content: &[u8]) -> Result<Option<Vec<u8>>, StageError> {
        let stage = match kind {
            OutputKind::Script => "minify-js",
            OutputKind::Stylesheet => "minify-css",
            OutputKind::Html | OutputKind::Static => return Ok(None),
        };

        let key = blake3::hash(content);
        if let Some(cached) = self.cache.lock().expect("optimizer cache lock").get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(cached.clone()));
        }

        let source = std::str::from_utf8(content)
            .map_err(|_| StageError::new(stage, "<bundle>", "bundle is not valid UTF-8"))?;

        let minified = match kind {
            OutputKind::Script => minify_js(source),
            OutputKind::Stylesheet => minify_css(source),
            _ => unreachable!(),
        }
        .map_err(|message| StageError::new(stage, "<bundle>", message))?;

        let bytes = minified.into_bytes();
        self.cache
            .lock()
            .expect("optimizer cache lock")
            .insert(key, bytes.clone());

        Ok(Some(bytes))
    }

    /// Optimize every script and stylesheet file in the manifest in place.
    ///
    /// Files have no cross-dependencies, so they are processed in parallel.
    pub fn optimize(&self, manifest: &mut OutputManifest) -> Result<(), StageError> {
        let results: Vec<(String, Option<Vec<u8>>)> = manifest
            .files
            .par_iter()
            .map(|(logical, file)| {
                self.optimize_one(file.kind, &file.content)
                    .map(|content| (logical.clone(), content))
            })
            .collect::<Result<_, _>>()?;

        for (logical, content) in results {
            if let (Some(file), Some(content)) = (manifest.files.get_mut(&logical), content) {
                tracing::debug!(
                    "optimized {}: {} -> {} bytes",
                    logical,
                    file.content.len(),
                    content.len()
                );
                file.content = content;
            }
        }

        Ok(())
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}
