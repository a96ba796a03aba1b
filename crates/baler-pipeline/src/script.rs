//! Script pipeline stages: import collection and syntax validation.

use std::sync::LazyLock;

use oxc::allocator::Allocator;
use oxc::parser::Parser;
use oxc::span::SourceType;
use regex::{Captures, Regex};

use crate::mode::BuildMode;
use crate::stage::{Stage, StageError, StageIo};

/// Matches a full-line ES import statement, capturing the specifier.
static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s+(?:[\w$\s{},*]+?from\s+)?["']([^"']+)["']\s*;?[ \t]*$"#)
        .expect("import regex is valid")
});

/// Whether a specifier points into the local source tree.
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

fn is_style_specifier(specifier: &str) -> bool {
    specifier.ends_with(".css") || specifier.ends_with(".scss") || specifier.ends_with(".sass")
}

/// Collect relative import specifiers from script source.
///
/// Bare specifiers (package imports) are external to the build and skipped;
/// module resolution across a package tree is out of scope.
pub fn scan_script_imports(content: &str) -> Vec<String> {
    IMPORT_RE
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .filter(|spec| is_relative(spec))
        .collect()
}

/// Stage "es-imports": strips every import statement, recording relative
/// specifiers as dependencies and bare specifiers as externals.
///
/// Stripped script imports are satisfied by bundle concatenation order;
/// stripped stylesheet imports feed the extracted/injected style set. Bare
/// (package) statements are kept verbatim in the metadata so the assembler
/// can hoist them to the top of the bundle, outside the wrapper.
pub struct EsImports;

impl Stage for EsImports {
    fn name(&self) -> &'static str {
        "es-imports"
    }

    fn apply(&self, mut input: StageIo, _mode: BuildMode) -> Result<StageIo, StageError> {
        let mut script_deps = Vec::new();
        let mut style_deps = Vec::new();
        let mut externals = Vec::new();

        let content = IMPORT_RE
            .replace_all(&input.content, |caps: &Captures| {
                let spec = &caps[1];
                if is_relative(spec) {
                    if is_style_specifier(spec) {
                        style_deps.push(spec.to_string());
                    } else {
                        script_deps.push(spec.to_string());
                    }
                } else {
                    externals.push(caps[0].trim().to_string());
                }
                String::new()
            })
            .into_owned();

        input.content = content;
        input.meta.script_deps.extend(script_deps);
        input.meta.style_deps.extend(style_deps);
        input.meta.externals.extend(externals);

        Ok(input)
    }
}

/// Stage "script-parse": validates the (already import-stripped) script as an
/// ES module. Syntax errors become stage failures; the content is passed
/// through unchanged so development output stays readable.
pub struct ScriptParse;

impl Stage for ScriptParse {
    fn name(&self) -> &'static str {
        "script-parse"
    }

    fn apply(&self, input: StageIo, _mode: BuildMode) -> Result<StageIo, StageError> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &input.content, SourceType::mjs()).parse();

        if let Some(error) = ret.errors.first() {
            return Err(StageError::new(
                self.name(),
                input.meta.source_path.display().to_string(),
                error.to_string(),
            ));
        }

        Ok(input)
    }
}
