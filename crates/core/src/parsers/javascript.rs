//! Heuristic JavaScript parser: line-scanned regexes for top-level
//! `function`/`class` declarations and `import`/`export` statements.
//! No parse tree — complexity is hardcoded to 1 for every function since
//! no AST is available to count branches.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{
    ExportKind, ExportRecord, FileRecord, FunctionRecord, ImportKind, Language, Parameter,
    ParseResult, ClassRecord, DetailedImport,
};

use super::loc;

static FUNC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bfunction\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());
static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bclass\s+([A-Za-z_][A-Za-z0-9_]*)\b").unwrap());
static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bimport\b.*?\bfrom\b\s*['"]([^'"]+)['"]"#).unwrap());
static EXPORT_FUNC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bexport\s+function\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());
static EXPORT_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bexport\s+class\s+([A-Za-z_][A-Za-z0-9_]*)\b").unwrap());
static EXPORT_DEFAULT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bexport\s+default\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

pub fn parse(rel_path: &str, text: &str) -> ParseResult {
    parse_as(rel_path, text, Language::Javascript)
}

/// Shared by the TypeScript parser, which layers additional recognizers
/// on top of this pass.
pub fn parse_as(rel_path: &str, text: &str, language: Language) -> ParseResult {
    let mut result = ParseResult::default();
    result.files.insert(
        rel_path.to_string(),
        FileRecord {
            path: rel_path.to_string(),
            language,
            loc: loc(text),
            framework: None,
            content_hash: String::new(),
            last_modified: 0.0,
            metadata: BTreeMap::new(),
        },
    );

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx as u32 + 1;

        if let Some(caps) = IMPORT_RE.captures(line) {
            let module = caps[1].to_string();
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
                kind: ImportKind::FromImport,
                statement: line.trim().to_string(),
            });
        }

        for caps in FUNC_RE.captures_iter(line) {
            let name = caps[1].to_string();
            let id = FunctionRecord::make_id(rel_path, &name);
            result.functions.entry(id.clone()).or_insert_with(|| FunctionRecord {
                id,
                file_path: rel_path.to_string(),
                name: name.clone(),
                language,
                line_start: lineno,
                line_end: lineno,
                complexity: 1,
                parameters: vec![] as Vec<Parameter>,
                calls: vec![],
                docstring: None,
                is_exported: false,
                is_async: line.trim_start().starts_with("async") || line.contains("async function"),
                return_type: None,
                decorators: vec![],
                source: line.trim().to_string(),
            });
        }

        for caps in CLASS_RE.captures_iter(line) {
            let name = caps[1].to_string();
            let id = ClassRecord::make_id(rel_path, &name);
            result.classes.entry(id.clone()).or_insert_with(|| ClassRecord {
                id,
                file_path: rel_path.to_string(),
                name,
                language,
                line_start: lineno,
                line_end: lineno,
                bases: vec![],
                methods: vec![],
                docstring: None,
                decorators: vec![],
            });
        }

        for caps in EXPORT_FUNC_RE.captures_iter(line) {
            let exports = result.exports.entry(rel_path.to_string()).or_default();
            exports.insert(caps[1].to_string(), ExportRecord { kind: ExportKind::Function, line: lineno });
            if let Some(func) = result.functions.get_mut(&FunctionRecord::make_id(rel_path, &caps[1])) {
                func.is_exported = true;
            }
        }
        for caps in EXPORT_CLASS_RE.captures_iter(line) {
            let exports = result.exports.entry(rel_path.to_string()).or_default();
            exports.insert(caps[1].to_string(), ExportRecord { kind: ExportKind::Class, line: lineno });
        }
        for caps in EXPORT_DEFAULT_RE.captures_iter(line) {
            let exports = result.exports.entry(rel_path.to_string()).or_default();
            exports.entry(caps[1].to_string()).or_insert(ExportRecord { kind: ExportKind::Default, line: lineno });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_top_level_function_and_class() {
        let source = "function greet(name) {\n  return name;\n}\n\nclass Widget {}\n";
        let result = parse("app.js", source);
        assert!(result.functions.contains_key("app.js::greet"));
        assert!(result.classes.contains_key("app.js::Widget"));
    }

    #[test]
    fn export_default_does_not_override_named_export() {
        let source = "export function Widget() {}\nexport default Widget\n";
        let result = parse("app.js", source);
        let exports = result.exports.get("app.js").unwrap();
        assert_eq!(exports.get("Widget").unwrap().kind as u8, ExportKind::Function as u8);
    }

    #[test]
    fn records_import_module() {
        let source = "import { useState } from \"react\";\n";
        let result = parse("app.js", source);
        assert_eq!(result.imports.get("app.js").unwrap().get("react"), Some(&1));
    }
}
