//! Entry HTML document generation.
//!
//! The template is the user's own HTML file (or an embedded default); the
//! final bundle filenames are injected as `<link>`/`<script>` tags. This
//! runs strictly after every bundle filename is finalized, since filenames
//! may depend on content hashes.

use std::fs;
use std::path::Path;

use crate::error::BuildError;

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>__BALER_TITLE__</title>
</head>
<body>
</body>
</html>
"#;

/// Load the entry template, falling back to the embedded default.
pub fn load_template(source_root: &Path, template: &Path, title: &str) -> Result<String, BuildError> {
    let path = source_root.join(template);
    if path.is_file() {
        fs::read_to_string(&path).map_err(|e| BuildError::read(path, e))
    } else {
        Ok(DEFAULT_TEMPLATE.replace("__BALER_TITLE__", title))
    }
}

/// Inject bundle references into a template.
///
/// Stylesheet links go before `</head>`, script tags before `</body>`. A
/// template without those markers gets the tags prepended/appended, so the
/// output always references every bundle.
pub fn inject_bundles(template: &str, styles: &[&str], scripts: &[&str]) -> String {
    let mut html = template.to_string();

    if !styles.is_empty() {
        let links: String = styles
            .iter()
            .map(|f| format!("  <link rel=\"stylesheet\" href=\"{f}\">\n"))
            .collect();

        match html.find("</head>") {
            Some(pos) => html.insert_str(pos, &links),
            None => html.insert_str(0, &links),
        }
    }

    if !scripts.is_empty() {
        let tags: String = scripts
            .iter()
            .map(|f| format!("  <script src=\"{f}\"></script>\n"))
            .collect();

        match html.find("</body>") {
            Some(pos) => html.insert_str(pos, &tags),
            None => html.push_str(&tags),
        }
    }

    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn injects_before_head_and_body_close() {
        let html = inject_bundles(
            DEFAULT_TEMPLATE,
            &["index.bundle.css"],
            &["index.bundle.js"],
        );

        let link = html.find("index.bundle.css").unwrap();
        let head_close = html.find("</head>").unwrap();
        let script = html.find("index.bundle.js").unwrap();
        let body_close = html.find("</body>").unwrap();

        assert!(link < head_close);
        assert!(script < body_close);
        assert!(head_close < script);
    }

    #[test]
    fn handles_templates_without_markers() {
        let html = inject_bundles("<h1>bare</h1>", &["a.css"], &["a.js"]);

        assert!(html.contains("a.css"));
        assert!(html.contains("a.js"));
        assert!(html.contains("<h1>bare</h1>"));
    }

    #[test]
    fn no_styles_means_no_link_tags() {
        let html = inject_bundles(DEFAULT_TEMPLATE, &[], &["index.bundle.js"]);
        assert!(!html.contains("stylesheet"));
    }

    #[test]
    fn prefers_user_template() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), "<html><body>mine</body></html>").unwrap();

        let template =
            load_template(temp.path(), Path::new("index.html"), "ignored").unwrap();
        assert!(template.contains("mine"));
    }

    #[test]
    fn default_template_carries_the_title() {
        let temp = tempdir().unwrap();
        let template = load_template(temp.path(), Path::new("index.html"), "My App").unwrap();
        assert!(template.contains("<title>My App</title>"));
    }
}
