//! Structured-data parsers: JSON, YAML, Markdown, CSS-family, HTML.
//!
//! None of these build a call/function model — they record the file and,
//! where possible, attach parsed content or import-like references. Grounded
//! in `json_parser.py`/`yaml_parser.py`/`markdown_parser.py`/
//! `html_css_parser.py`/`less_parser.py`/`scss_parser.py`/`sass_parser.py`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{DetailedImport, FileRecord, ImportKind, Language, ParseResult};

use super::loc;

fn base_file_record(rel_path: &str, language: Language, text: &str) -> FileRecord {
    FileRecord {
        path: rel_path.to_string(),
        language,
        loc: loc(text),
        framework: None,
        content_hash: String::new(),
        last_modified: 0.0,
        metadata: BTreeMap::new(),
    }
}

pub fn parse_json(rel_path: &str, text: &str) -> ParseResult {
    let mut result = ParseResult::default();
    let mut file = base_file_record(rel_path, Language::Json, text);

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => {
            file.metadata.insert("parsed".to_string(), value);
        }
        Err(e) => {
            result.error = Some(format!("invalid JSON: {e}"));
        }
    }

    result.files.insert(rel_path.to_string(), file);
    result
}

pub fn parse_yaml(rel_path: &str, text: &str) -> ParseResult {
    let mut result = ParseResult::default();
    let mut file = base_file_record(rel_path, Language::Yaml, text);

    match serde_yaml::from_str::<serde_yaml::Value>(text) {
        Ok(value) => {
            if let Ok(json_value) = serde_json::to_value(&value) {
                file.metadata.insert("parsed".to_string(), json_value);
            }
        }
        Err(e) => {
            result.error = Some(format!("invalid YAML: {e}"));
        }
    }

    result.files.insert(rel_path.to_string(), file);
    result
}

pub fn parse_markdown(rel_path: &str, text: &str) -> ParseResult {
    let mut result = ParseResult::default();
    let file = base_file_record(rel_path, Language::Markdown, text);
    result.files.insert(rel_path.to_string(), file);
    result
}

static CSS_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@(?:import|use)\s+['"]([^'"]+)['"]"#).unwrap());
static HTML_SCRIPT_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<script[^>]*\bsrc=["']([^"']+)["']"#).unwrap());
static HTML_LINK_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<link[^>]*\bhref=["']([^"']+)["']"#).unwrap());

/// CSS-family files (`.css`, `.scss`, `.sass`, `.less`) and HTML share a
/// shape: LOC plus whatever `@import`/`<script src>`/`<link href>`
/// references they carry, recorded as imports.
pub fn parse_css_or_html(rel_path: &str, text: &str, language: Language) -> ParseResult {
    let mut result = ParseResult::default();
    let file = base_file_record(rel_path, language, text);
    result.files.insert(rel_path.to_string(), file);

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx as u32 + 1;
        let mut record_import = |module: String| {
            *result
                .imports
                .entry(rel_path.to_string())
                .or_default()
                .entry(module.clone())
                .or_insert(0) += 1;
            result.imports_detailed.entry(rel_path.to_string()).or_default().push(DetailedImport {
                module,
                imported_names: vec![],
                line: lineno,
                kind: ImportKind::Import,
                statement: line.trim().to_string(),
            });
        };

        if language == Language::Css {
            if let Some(caps) = CSS_IMPORT_RE.captures(line) {
                record_import(caps[1].to_string());
            }
        } else {
            if let Some(caps) = HTML_SCRIPT_SRC_RE.captures(line) {
                record_import(caps[1].to_string());
            }
            if let Some(caps) = HTML_LINK_HREF_RE.captures(line) {
                record_import(caps[1].to_string());
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_parses_and_attaches_value() {
        let result = parse_json("pkg.json", r#"{"name": "x"}"#);
        assert!(result.error.is_none());
        assert!(result.files["pkg.json"].metadata.contains_key("parsed"));
    }

    #[test]
    fn json_syntax_error_is_recorded() {
        let result = parse_json("pkg.json", "{not json");
        assert!(result.error.is_some());
        assert!(result.files.contains_key("pkg.json"));
    }

    #[test]
    fn css_import_is_recorded() {
        let result = parse_css_or_html("app.css", "@import 'base.css';\n", Language::Css);
        assert_eq!(result.imports["app.css"].get("base.css"), Some(&1));
    }

    #[test]
    fn html_script_src_is_recorded() {
        let result = parse_css_or_html(
            "index.html",
            "<script src=\"bundle.js\"></script>\n",
            Language::Html,
        );
        assert_eq!(result.imports["index.html"].get("bundle.js"), Some(&1));
    }
}
