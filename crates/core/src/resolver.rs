//! Dependency resolver (C7): links call names and import statements across
//! files, and detects import cycles. Ported at the semantic level from
//! `dependency_resolver.py`'s `DependencyResolver`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{OrcError, OrcResult};
use crate::model::{CallEdge, Cycle, FileDependency, ImportKind, ParseResult, ResolvedDependencies};

/// `name -> [(file, function_id, line_start)]`, used to resolve both
/// same-name function calls and (indirectly) module names.
struct NameToDefinitions(HashMap<String, Vec<(String, String, u32)>>);

fn build_name_to_definitions(result: &ParseResult) -> NameToDefinitions {
    let mut map: HashMap<String, Vec<(String, String, u32)>> = HashMap::new();
    for func in result.functions.values() {
        map.entry(func.name.clone()).or_default().push((
            func.file_path.clone(),
            func.id.clone(),
            func.line_start,
        ));
    }
    NameToDefinitions(map)
}

fn resolve_relative_import(module: &str, source_file: &str, file_paths: &HashSet<String>) -> Option<String> {
    let dots = module.len() - module.trim_start_matches('.').len();
    if dots == 0 {
        return None;
    }
    let remainder = module.trim_start_matches('.');

    let source_dir: Vec<&str> = {
        let mut parts: Vec<&str> = source_file.split('/').collect();
        parts.pop(); // drop the file name itself
        parts
    };

    let mut target_dir = source_dir;
    for _ in 0..dots.saturating_sub(1) {
        target_dir.pop();
    }

    let target_path = if remainder.is_empty() {
        let mut p = target_dir.clone();
        p.push("__init__.py");
        p.join("/")
    } else {
        let rel = remainder.replace('.', "/");
        format!("{}/{}.py", target_dir.join("/"), rel)
    };

    // Normalize away any leading "/" from an empty target_dir.
    let normalized = target_path.trim_start_matches('/').to_string();
    if file_paths.contains(&normalized) {
        Some(normalized)
    } else {
        file_paths.iter().find(|p| **p == target_path).cloned()
    }
}

fn resolve_absolute_module(module: &str, file_paths: &HashSet<String>) -> Option<String> {
    let module_lower = module.to_lowercase().replace('.', "/");
    file_paths
        .iter()
        .find(|path| {
            let path_lower = path.to_lowercase();
            path_lower.ends_with(&format!("/{module_lower}.py"))
                || path_lower == format!("{module_lower}.py")
                || path_lower.contains(&format!("/{module_lower}/"))
        })
        .cloned()
}

fn resolve_file_dependencies(result: &ParseResult) -> Vec<FileDependency> {
    let file_paths: HashSet<String> = result.files.keys().cloned().collect();
    let mut deps = Vec::new();

    for (source_file, imports) in &result.imports_detailed {
        for imp in imports {
            let target = if imp.module.starts_with('.') {
                resolve_relative_import(&imp.module, source_file, &file_paths)
            } else {
                resolve_absolute_module(&imp.module, &file_paths)
            };

            let is_resolved = target.is_some();
            deps.push(FileDependency {
                source_file: source_file.clone(),
                target: target.unwrap_or_else(|| imp.module.clone()),
                is_resolved,
                is_external: !is_resolved,
                import_kind: imp.kind,
                line: imp.line,
            });
        }
    }

    deps
}

fn resolve_function_calls(result: &ParseResult, names: &NameToDefinitions) -> Vec<CallEdge> {
    let mut edges = Vec::new();
    for func in result.functions.values() {
        for call_name in &func.calls {
            let leaf = call_name.rsplit('.').next().unwrap_or(call_name);
            let candidates = names.0.get(leaf);

            let resolved = candidates.and_then(|matches| {
                matches
                    .iter()
                    .find(|(file, ..)| file == &func.file_path)
                    .or_else(|| matches.first())
            });

            edges.push(CallEdge {
                caller_function_id: func.id.clone(),
                callee_name: call_name.clone(),
                callee_function_id: resolved.map(|(_, id, _)| id.clone()),
                callee_file: resolved.map(|(file, ..)| file.clone()),
                resolved: resolved.is_some(),
            });
        }
    }
    edges
}

/// Iterative (non-recursive) cycle detection over the resolved file
/// dependency graph, so deep graphs cannot overflow a call stack the way
/// the original's recursive DFS could. Each cycle is emitted once, rotated
/// to start at its lexicographically smallest node.
fn detect_cycles(file_deps: &[FileDependency]) -> Vec<Cycle> {
    let mut graph: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for dep in file_deps {
        if dep.is_resolved {
            graph.entry(&dep.source_file).or_default().push(&dep.target);
        }
    }

    let mut found: BTreeSet<Vec<String>> = BTreeSet::new();
    let nodes: Vec<&str> = graph.keys().copied().collect();

    for start in &nodes {
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        let mut path: Vec<&str> = vec![start];
        let mut on_path: HashSet<&str> = HashSet::from([*start]);

        while let Some((node, child_idx)) = stack.pop() {
            let neighbors = graph.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if child_idx < neighbors.len() {
                stack.push((node, child_idx + 1));
                let next = neighbors[child_idx];

                if next == *start && path.len() > 1 {
                    found.insert(canonical_rotation(&path));
                } else if !on_path.contains(next) {
                    path.push(next);
                    on_path.insert(next);
                    stack.push((next, 0));
                }
            } else {
                path.pop();
                on_path.remove(node);
            }
        }
    }

    found.into_iter().map(Cycle).collect()
}

/// Rotates `path` so it starts at its lexicographically smallest node, then
/// appends that node again to close the cycle (matching spec.md's
/// `[a.py, b.py, a.py]` example shape).
fn canonical_rotation(path: &[&str]) -> Vec<String> {
    let min_idx = path
        .iter()
        .enumerate()
        .min_by_key(|(_, n)| **n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut rotated: Vec<String> = path[min_idx..].iter().chain(path[..min_idx].iter()).map(|s| s.to_string()).collect();
    rotated.push(rotated[0].clone());
    rotated
}

/// Resolves all dependencies in `result`. Pure and deterministic: running
/// this twice on the same `ParseResult` yields byte-identical output after
/// the canonical ordering already applied here (invariant 6, §8).
pub fn resolve(result: &ParseResult) -> OrcResult<ResolvedDependencies> {
    for func in result.functions.values() {
        if func.file_path.is_empty() {
            return Err(OrcError::resolver(format!(
                "function record {} is missing its file_path",
                func.id
            )));
        }
    }

    let names = build_name_to_definitions(result);
    let file_dependencies = resolve_file_dependencies(result);
    let function_calls_resolved = resolve_function_calls(result, &names);
    let circular_dependencies = detect_cycles(&file_dependencies);

    tracing::debug!(
        file_deps = file_dependencies.len(),
        calls = function_calls_resolved.len(),
        cycles = circular_dependencies.len(),
        "dependency resolution complete"
    );

    Ok(ResolvedDependencies { file_dependencies, function_calls_resolved, circular_dependencies })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DetailedImport, FileRecord, FunctionRecord, Language, Parameter};
    use std::collections::BTreeMap;

    fn file(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            language: Language::Python,
            loc: 1,
            framework: None,
            content_hash: String::new(),
            last_modified: 0.0,
            metadata: BTreeMap::new(),
        }
    }

    fn function(file_path: &str, name: &str, calls: Vec<&str>) -> FunctionRecord {
        FunctionRecord {
            id: FunctionRecord::make_id(file_path, name),
            file_path: file_path.to_string(),
            name: name.to_string(),
            language: Language::Python,
            line_start: 1,
            line_end: 2,
            complexity: 1,
            parameters: vec![] as Vec<Parameter>,
            calls: calls.into_iter().map(String::from).collect(),
            docstring: None,
            is_exported: true,
            is_async: false,
            return_type: None,
            decorators: vec![],
            source: String::new(),
        }
    }

    #[test]
    fn resolves_same_file_call_preferentially() {
        let mut result = ParseResult::default();
        result.files.insert("a.py".into(), file("a.py"));
        result.functions.insert("a.py::helper".into(), function("a.py", "helper", vec![]));
        result.functions.insert("a.py::main".into(), function("a.py", "main", vec!["helper"]));

        let resolved = resolve(&result).unwrap();
        let edge = resolved.function_calls_resolved.iter().find(|e| e.callee_name == "helper").unwrap();
        assert!(edge.resolved);
        assert_eq!(edge.callee_file.as_deref(), Some("a.py"));
    }

    #[test]
    fn detects_two_file_cycle() {
        let mut result = ParseResult::default();
        result.files.insert("a.py".into(), file("a.py"));
        result.files.insert("b.py".into(), file("b.py"));
        result.imports_detailed.insert(
            "a.py".into(),
            vec![DetailedImport {
                module: "b".into(),
                imported_names: vec![],
                line: 1,
                kind: ImportKind::Import,
                statement: "import b".into(),
            }],
        );
        result.imports_detailed.insert(
            "b.py".into(),
            vec![DetailedImport {
                module: "a".into(),
                imported_names: vec![],
                line: 1,
                kind: ImportKind::Import,
                statement: "import a".into(),
            }],
        );

        let resolved = resolve(&result).unwrap();
        assert_eq!(resolved.circular_dependencies.len(), 1);
        let cycle = &resolved.circular_dependencies[0].0;
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn resolution_is_deterministic_across_runs() {
        let mut result = ParseResult::default();
        result.files.insert("a.py".into(), file("a.py"));
        result.functions.insert("a.py::f".into(), function("a.py", "f", vec!["g"]));

        let first = resolve(&result).unwrap();
        let second = resolve(&result).unwrap();
        assert_eq!(first.function_calls_resolved.len(), second.function_calls_resolved.len());
        assert_eq!(
            first.function_calls_resolved[0].callee_name,
            second.function_calls_resolved[0].callee_name
        );
    }
}
