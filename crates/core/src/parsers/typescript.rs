//! TypeScript parser: wraps the JavaScript parser and layers on recognizers
//! for `interface`, `type` aliases, `enum`, `namespace`, decorators, and
//! type-only imports. Grounded in `typescript_parser.py`'s
//! `TypeScriptParser(JavaScriptParser)` subclassing — same "keep HOW" shape,
//! ported to a wrapping function instead of inheritance.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{ClassRecord, DetailedImport, ImportKind, Language, ParseResult};

use super::javascript;

static INTERFACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:export\s+)?interface\s+(\w+)").unwrap());
static TYPE_ALIAS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:export\s+)?type\s+(\w+)(?:<[^>]+>)?\s*=").unwrap());
static ENUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:export\s+)?enum\s+(\w+)").unwrap());
static NAMESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:export\s+)?namespace\s+(\w+)").unwrap());
static DECORATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\w+)").unwrap());
static TYPE_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"import\s+type\s+\{([^}]+)\}\s+from\s+['"]([^'"]+)['"]"#).unwrap());

pub fn parse(rel_path: &str, text: &str) -> ParseResult {
    let mut result = javascript::parse_as(rel_path, text, Language::Typescript);

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx as u32 + 1;

        if let Some(caps) = INTERFACE_RE.captures(line) {
            record_type_construct(&mut result, rel_path, &caps[1], lineno, "interface");
        }
        if let Some(caps) = TYPE_ALIAS_RE.captures(line) {
            record_type_construct(&mut result, rel_path, &caps[1], lineno, "type_alias");
        }
        if let Some(caps) = ENUM_RE.captures(line) {
            record_type_construct(&mut result, rel_path, &caps[1], lineno, "enum");
        }
        if let Some(caps) = NAMESPACE_RE.captures(line) {
            record_type_construct(&mut result, rel_path, &caps[1], lineno, "namespace");
        }
        for caps in DECORATOR_RE.captures_iter(line) {
            if let Some(func) = result.functions.values_mut().find(|f| f.line_start == lineno + 1) {
                func.decorators.push(caps[1].to_string());
            }
        }
        if let Some(caps) = TYPE_IMPORT_RE.captures(line) {
            let module = caps[2].to_string();
            let imported_names = caps[1].split(',').map(|s| s.trim().to_string()).collect();
            *result
                .imports
                .entry(rel_path.to_string())
                .or_default()
                .entry(module.clone())
                .or_insert(0) += 1;
            result.imports_detailed.entry(rel_path.to_string()).or_default().push(DetailedImport {
                module,
                imported_names,
                line: lineno,
                kind: ImportKind::FromImport,
                statement: line.trim().to_string(),
            });
        }
    }

    result
}

/// Interfaces/type aliases/enums/namespaces are recorded as `ClassRecord`
/// entries — there is no dedicated overlay table for them — tagged via their
/// sole decorator so downstream consumers can tell them apart from real
/// classes.
fn record_type_construct(result: &mut ParseResult, rel_path: &str, name: &str, line: u32, kind: &str) {
    let id = ClassRecord::make_id(rel_path, name);
    result.classes.entry(id.clone()).or_insert_with(|| ClassRecord {
        id,
        file_path: rel_path.to_string(),
        name: name.to_string(),
        language: Language::Typescript,
        line_start: line,
        line_end: line,
        bases: vec![],
        methods: vec![],
        docstring: None,
        decorators: vec![kind.to_string()],
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_interface_and_enum() {
        let source = "export interface User {\n  id: number;\n}\n\nenum Role { Admin, User }\n";
        let result = parse("types.ts", source);
        assert!(result.classes.contains_key("types.ts::User"));
        assert!(result.classes.contains_key("types.ts::Role"));
    }

    #[test]
    fn records_type_only_import() {
        let source = "import type { User } from \"./types\";\n";
        let result = parse("app.ts", source);
        assert_eq!(result.imports["app.ts"].get("./types"), Some(&1));
    }
}
