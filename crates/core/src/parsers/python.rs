//! Python parser: builds a tree-sitter AST and extracts top-level
//! functions, classes, imports, entry points, and cyclomatic complexity.

use std::collections::BTreeMap;

use tree_sitter::{Node, Parser, Tree};

use crate::model::{
    ClassRecord, DetailedImport, EntryPoint, EntryType, ExportKind, ExportRecord, FileRecord,
    FunctionRecord, ImportKind, Language, MethodDescriptor, Parameter, ParseResult,
};

use super::loc;

fn build_tree(text: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .ok()?;
    parser.parse(text, None)
}

pub fn parse(rel_path: &str, text: &str) -> ParseResult {
    let mut result = ParseResult::default();
    result.files.insert(
        rel_path.to_string(),
        FileRecord {
            path: rel_path.to_string(),
            language: Language::Python,
            loc: loc(text),
            framework: None,
            content_hash: String::new(),
            last_modified: 0.0,
            metadata: BTreeMap::new(),
        },
    );

    let Some(tree) = build_tree(text) else {
        result.error = Some("failed to initialize python parser".to_string());
        return result;
    };
    let root = tree.root_node();
    if root.has_error() {
        // Syntax error: minimal ParseResult with just the file record, per §4.5.
        return result;
    }

    let src = text.as_bytes();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "import_statement" | "import_from_statement" => {
                extract_import(&child, src, rel_path, &mut result);
            }
            "function_definition" => {
                extract_function(&child, src, text, rel_path, &mut result);
            }
            "decorated_definition" => {
                if let Some(inner) = child.child_by_field_name("definition") {
                    match inner.kind() {
                        "function_definition" => {
                            extract_function(&inner, src, text, rel_path, &mut result)
                        }
                        "class_definition" => extract_class(&inner, src, text, rel_path, &mut result),
                        _ => {}
                    }
                }
            }
            "class_definition" => {
                extract_class(&child, src, text, rel_path, &mut result);
            }
            "if_statement" => {
                if is_main_guard(&child, src) {
                    result.entry_points.push(EntryPoint {
                        file_path: rel_path.to_string(),
                        entry_type: EntryType::Main,
                        function_name: Some("__main__".to_string()),
                        line: child.start_position().row as u32 + 1,
                        confidence: 1.0,
                    });
                }
            }
            _ => {}
        }
    }

    result
}

fn node_text<'a>(node: &Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

fn is_main_guard(node: &Node, src: &[u8]) -> bool {
    let Some(condition) = node.child_by_field_name("condition") else { return false };
    if condition.kind() != "comparison_operator" {
        return false;
    }
    let Some(left) = condition.child(0) else { return false };
    left.kind() == "identifier" && node_text(&left, src) == "__name__"
}

fn extract_import(node: &Node, src: &[u8], rel_path: &str, result: &mut ParseResult) {
    let line = node.start_position().row as u32 + 1;
    let statement = node_text(node, src).to_string();

    if node.kind() == "import_statement" {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "dotted_name" || child.kind() == "aliased_import" {
                let module = module_name_of(&child, src);
                bump_import(result, rel_path, &module);
                result.imports_detailed.entry(rel_path.to_string()).or_default().push(DetailedImport {
                    module,
                    imported_names: vec![],
                    line,
                    kind: ImportKind::Import,
                    statement: statement.clone(),
                });
            }
        }
    } else if let Some(module_node) = node.child_by_field_name("module_name") {
        let module = node_text(&module_node, src).to_string();
        let mut imported_names = vec![];
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "dotted_name" && child != module_node {
                imported_names.push(node_text(&child, src).to_string());
            } else if child.kind() == "aliased_import" {
                if let Some(name) = child.child(0) {
                    imported_names.push(node_text(&name, src).to_string());
                }
            } else if child.kind() == "wildcard_import" {
                imported_names.push("*".to_string());
            }
        }
        bump_import(result, rel_path, &module);
        result.imports_detailed.entry(rel_path.to_string()).or_default().push(DetailedImport {
            module,
            imported_names,
            line,
            kind: ImportKind::FromImport,
            statement,
        });
    }
}

fn module_name_of(node: &Node, src: &[u8]) -> String {
    if node.kind() == "aliased_import" {
        node.child(0).map(|n| node_text(&n, src).to_string()).unwrap_or_default()
    } else {
        node_text(node, src).to_string()
    }
}

fn bump_import(result: &mut ParseResult, rel_path: &str, module: &str) {
    *result
        .imports
        .entry(rel_path.to_string())
        .or_default()
        .entry(module.to_string())
        .or_insert(0) += 1;
}

fn calculate_complexity(node: &Node) -> u32 {
    let mut complexity = 1u32;
    walk_complexity(node, &mut complexity);
    complexity
}

fn walk_complexity(node: &Node, complexity: &mut u32) {
    match node.kind() {
        "if_statement" | "for_statement" | "while_statement" | "with_statement" | "assert_statement" => {
            *complexity += 1;
        }
        "elif_clause" => *complexity += 1,
        "except_clause" => *complexity += 1,
        "try_statement" => {
            let mut cursor = node.walk();
            let handlers = node.children(&mut cursor).filter(|c| c.kind() == "except_clause").count();
            *complexity += handlers as u32;
        }
        "boolean_operator" => {
            // Each boolean_operator node is binary; nested chains add up
            // naturally as the walk descends into operands.
            *complexity += 1;
        }
        "list_comprehension" | "dictionary_comprehension" | "set_comprehension" | "generator_expression" => {
            *complexity += 1;
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "if_clause" {
                    *complexity += 1;
                }
            }
        }
        "conditional_expression" => *complexity += 1,
        "match_statement" => {
            let mut cursor = node.walk();
            if let Some(body) = node.child_by_field_name("body").or_else(|| node.children(&mut cursor).find(|c| c.kind() == "block")) {
                let mut bcursor = body.walk();
                let cases = body.children(&mut bcursor).filter(|c| c.kind() == "case_clause").count();
                *complexity += cases as u32;
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_complexity(&child, complexity);
    }
}

fn extract_calls(node: &Node, src: &[u8]) -> Vec<String> {
    let mut calls = Vec::new();
    let mut seen = std::collections::HashSet::new();
    walk_calls(node, src, &mut calls, &mut seen);
    calls
}

fn walk_calls(node: &Node, src: &[u8], calls: &mut Vec<String>, seen: &mut std::collections::HashSet<String>) {
    if node.kind() == "call" {
        if let Some(func) = node.child_by_field_name("function") {
            if let Some(name) = dotted_call_name(&func, src) {
                if seen.insert(name.clone()) {
                    calls.push(name);
                }
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_calls(&child, src, calls, seen);
    }
}

fn dotted_call_name(node: &Node, src: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, src).to_string()),
        "attribute" => {
            let mut parts = Vec::new();
            let mut current = *node;
            loop {
                match current.kind() {
                    "attribute" => {
                        let attr = current.child_by_field_name("attribute")?;
                        parts.push(node_text(&attr, src).to_string());
                        current = current.child_by_field_name("object")?;
                    }
                    "identifier" => {
                        parts.push(node_text(&current, src).to_string());
                        break;
                    }
                    _ => break,
                }
            }
            parts.reverse();
            Some(parts.join("."))
        }
        _ => None,
    }
}

fn extract_decorators(node: &Node, src: &[u8]) -> Vec<String> {
    let mut decorators = Vec::new();
    if let Some(parent) = node.parent() {
        if parent.kind() == "decorated_definition" {
            let mut cursor = parent.walk();
            for child in parent.children(&mut cursor) {
                if child.kind() == "decorator" {
                    if let Some(expr) = child.child(1) {
                        let text = match expr.kind() {
                            "call" => expr
                                .child_by_field_name("function")
                                .and_then(|f| dotted_call_name(&f, src))
                                .unwrap_or_else(|| node_text(&expr, src).to_string()),
                            _ => dotted_call_name(&expr, src).unwrap_or_else(|| node_text(&expr, src).to_string()),
                        };
                        decorators.push(text);
                    }
                }
            }
        }
    }
    decorators
}

fn docstring_of(body: &Node, src: &[u8]) -> Option<String> {
    let mut cursor = body.walk();
    let first = body.children(&mut cursor).next()?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.child(0)?;
    if expr.kind() == "string" {
        Some(node_text(&expr, src).trim_matches(|c| c == '"' || c == '\'').to_string())
    } else {
        None
    }
}

fn extract_parameters(node: &Node, src: &[u8]) -> Vec<Parameter> {
    let Some(params) = node.child_by_field_name("parameters") else { return vec![] };
    let mut result = vec![];
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        match child.kind() {
            "identifier" => result.push(Parameter { name: node_text(&child, src).to_string(), type_annotation: None }),
            "typed_parameter" => {
                let name = child.child(0).map(|n| node_text(&n, src).to_string()).unwrap_or_default();
                let ty = child.child_by_field_name("type").map(|n| node_text(&n, src).to_string());
                result.push(Parameter { name, type_annotation: ty });
            }
            "default_parameter" | "typed_default_parameter" => {
                let name = child.child_by_field_name("name").map(|n| node_text(&n, src).to_string()).unwrap_or_default();
                let ty = child.child_by_field_name("type").map(|n| node_text(&n, src).to_string());
                result.push(Parameter { name, type_annotation: ty });
            }
            _ => {}
        }
    }
    result
}

fn extract_function(node: &Node, src: &[u8], text: &str, rel_path: &str, result: &mut ParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = node_text(&name_node, src).to_string();
    let id = FunctionRecord::make_id(rel_path, &name);

    let line_start = node.start_position().row as u32 + 1;
    let line_end = node.end_position().row as u32 + 1;
    let complexity = calculate_complexity(node);
    let calls = extract_calls(node, src);
    let parameters = extract_parameters(node, src);
    let is_async = node_text(node, src).trim_start().starts_with("async");
    let decorators = extract_decorators(node, src);
    let return_type = node.child_by_field_name("return_type").map(|n| node_text(&n, src).to_string());
    let docstring = node.child_by_field_name("body").and_then(|b| docstring_of(&b, src));
    let lines: Vec<&str> = text.lines().collect();
    let source = lines
        .get((line_start as usize).saturating_sub(1)..line_end as usize)
        .map(|s| s.join("\n"))
        .unwrap_or_default();

    result.functions.insert(
        id,
        FunctionRecord {
            id: FunctionRecord::make_id(rel_path, &name),
            file_path: rel_path.to_string(),
            name: name.clone(),
            language: Language::Python,
            line_start,
            line_end,
            complexity,
            parameters,
            calls,
            docstring,
            is_exported: !name.starts_with('_'),
            is_async,
            return_type,
            decorators,
            source,
        },
    );

    if !name.starts_with('_') {
        result
            .exports
            .entry(rel_path.to_string())
            .or_default()
            .insert(name, ExportRecord { kind: ExportKind::Function, line: line_start });
    }
}

fn extract_class(node: &Node, src: &[u8], _text: &str, rel_path: &str, result: &mut ParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else { return };
    let name = node_text(&name_node, src).to_string();
    let id = ClassRecord::make_id(rel_path, &name);

    let line_start = node.start_position().row as u32 + 1;
    let line_end = node.end_position().row as u32 + 1;

    let mut bases = vec![];
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for child in superclasses.children(&mut cursor) {
            if let Some(n) = dotted_call_name(&child, src) {
                bases.push(n);
            }
        }
    }

    let decorators = extract_decorators(node, src);
    let docstring = node.child_by_field_name("body").and_then(|b| docstring_of(&b, src));

    let mut methods = vec![];
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            let func = if child.kind() == "function_definition" {
                Some(child)
            } else if child.kind() == "decorated_definition" {
                child.child_by_field_name("definition").filter(|d| d.kind() == "function_definition")
            } else {
                None
            };
            if let Some(func) = func {
                let Some(mname_node) = func.child_by_field_name("name") else { continue };
                let mname = node_text(&mname_node, src).to_string();
                let decs = extract_decorators(&func, src);
                let is_classmethod = decs.iter().any(|d| d == "classmethod");
                let is_staticmethod = decs.iter().any(|d| d == "staticmethod");
                let is_property = decs.iter().any(|d| d == "property");
                methods.push(MethodDescriptor {
                    is_async: node_text(&func, src).trim_start().starts_with("async"),
                    is_private: mname.starts_with('_'),
                    name: mname,
                    is_classmethod,
                    is_staticmethod,
                    is_property,
                });
            }
        }
    }

    result.classes.insert(
        id,
        ClassRecord {
            id: ClassRecord::make_id(rel_path, &name),
            file_path: rel_path.to_string(),
            name: name.clone(),
            language: Language::Python,
            line_start,
            line_end,
            bases,
            methods,
            docstring,
            decorators,
        },
    );

    if !name.starts_with('_') {
        result
            .exports
            .entry(rel_path.to_string())
            .or_default()
            .insert(name, ExportRecord { kind: ExportKind::Class, line: line_start });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_function_with_nested_branches() {
        let source = "def calculate(a, b):\n    if a > 0:\n        if b > 0:\n            return a + b\n    return 0\n";
        let result = parse("utils.py", source);
        let func = result.functions.get("utils.py::calculate").unwrap();
        assert_eq!(func.complexity, 3);
        assert_eq!(func.line_start, 1);
    }

    #[test]
    fn detects_main_guard_entry_point() {
        let source = "def main():\n    pass\n\nif __name__ == \"__main__\":\n    main()\n";
        let result = parse("app.py", source);
        assert_eq!(result.entry_points.len(), 1);
        assert_eq!(result.entry_points[0].entry_type as u8, EntryType::Main as u8);
    }

    #[test]
    fn records_imports_with_detail() {
        let source = "import os\nfrom collections import OrderedDict\n";
        let result = parse("m.py", source);
        assert_eq!(result.imports.get("m.py").unwrap().get("os"), Some(&1));
        let detailed = result.imports_detailed.get("m.py").unwrap();
        assert_eq!(detailed.len(), 2);
    }

    #[test]
    fn syntax_error_yields_minimal_result() {
        let source = "def broken(:\n";
        let result = parse("broken.py", source);
        assert!(result.functions.is_empty());
        assert!(result.files.contains_key("broken.py"));
    }

    #[test]
    fn private_function_is_not_exported() {
        let source = "def _helper():\n    pass\n";
        let result = parse("m.py", source);
        assert!(result.exports.get("m.py").is_none());
    }
}
