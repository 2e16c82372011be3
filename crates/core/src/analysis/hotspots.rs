//! Hotspot report: top-N functions by complexity, files by size, and
//! modules by import fan-in, each with a one-line suggested remediation.
//! Grounded in spec.md §4.10's hotspot bullet; fan-in is computed from
//! [`crate::resolver::resolve`]'s output rather than re-walking imports,
//! since that's already the resolved, dedup'd dependency edge list.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{ParseResult, ResolvedDependencies};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityHotspot {
    pub function_id: String,
    pub name: String,
    pub file_path: String,
    pub complexity: u32,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeHotspot {
    pub file_path: String,
    pub loc: u64,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanInHotspot {
    pub file_path: String,
    pub dependent_count: usize,
    pub suggestion: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotspotReport {
    pub by_complexity: Vec<ComplexityHotspot>,
    pub by_size: Vec<SizeHotspot>,
    pub by_fan_in: Vec<FanInHotspot>,
}

fn complexity_suggestion(complexity: u32) -> String {
    if complexity >= 20 {
        "extract helper functions to break up branching before touching this again".to_string()
    } else if complexity >= 15 {
        "consider splitting into smaller functions along its branch boundaries".to_string()
    } else {
        "watch this one; it's trending toward needing a split".to_string()
    }
}

fn size_suggestion(loc: u64) -> String {
    if loc >= 1000 {
        "this file is large enough to warrant splitting into a module".to_string()
    } else {
        "growing; consider a module split if this keeps expanding".to_string()
    }
}

fn fan_in_suggestion(count: usize) -> String {
    if count >= 20 {
        "widely depended-on; changes here carry broad blast radius, add tests before editing".to_string()
    } else {
        "several modules depend on this; review before changing its public surface".to_string()
    }
}

/// `top_n` bounds each of the three ranked lists independently.
pub fn report(result: &ParseResult, deps: &ResolvedDependencies, top_n: usize) -> HotspotReport {
    let mut functions: Vec<&crate::model::FunctionRecord> = result.functions.values().collect();
    functions.sort_by(|a, b| b.complexity.cmp(&a.complexity).then_with(|| a.id.cmp(&b.id)));
    let by_complexity = functions
        .into_iter()
        .take(top_n)
        .map(|f| ComplexityHotspot {
            function_id: f.id.clone(),
            name: f.name.clone(),
            file_path: f.file_path.clone(),
            complexity: f.complexity,
            suggestion: complexity_suggestion(f.complexity),
        })
        .collect();

    let mut files: Vec<&crate::model::FileRecord> = result.files.values().collect();
    files.sort_by(|a, b| b.loc.cmp(&a.loc).then_with(|| a.path.cmp(&b.path)));
    let by_size = files
        .into_iter()
        .take(top_n)
        .map(|f| SizeHotspot { file_path: f.path.clone(), loc: f.loc, suggestion: size_suggestion(f.loc) })
        .collect();

    let mut fan_in: BTreeMap<&str, usize> = BTreeMap::new();
    for dep in &deps.file_dependencies {
        if dep.is_resolved && !dep.is_external {
            *fan_in.entry(dep.target.as_str()).or_default() += 1;
        }
    }
    let mut fan_in_vec: Vec<(&str, usize)> = fan_in.into_iter().collect();
    fan_in_vec.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let by_fan_in = fan_in_vec
        .into_iter()
        .take(top_n)
        .map(|(file_path, count)| FanInHotspot { file_path: file_path.to_string(), dependent_count: count, suggestion: fan_in_suggestion(count) })
        .collect();

    HotspotReport { by_complexity, by_size, by_fan_in }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileDependency, FileRecord, FunctionRecord, ImportKind, Language};

    fn func(name: &str, complexity: u32) -> FunctionRecord {
        FunctionRecord {
            id: format!("f.py::{name}"),
            file_path: "f.py".into(),
            name: name.into(),
            language: Language::Python,
            line_start: 1,
            line_end: 5,
            complexity,
            parameters: vec![],
            calls: vec![],
            docstring: None,
            is_exported: true,
            is_async: false,
            return_type: None,
            decorators: vec![],
            source: String::new(),
        }
    }

    #[test]
    fn ranks_functions_by_complexity_descending() {
        let mut result = ParseResult::default();
        result.functions.insert("f.py::a".into(), func("a", 5));
        result.functions.insert("f.py::b".into(), func("b", 25));
        let deps = ResolvedDependencies { file_dependencies: vec![], function_calls_resolved: vec![], circular_dependencies: vec![] };

        let report = report(&result, &deps, 10);
        assert_eq!(report.by_complexity[0].name, "b");
    }

    #[test]
    fn ranks_files_by_fan_in() {
        let mut result = ParseResult::default();
        result.files.insert("util.py".into(), FileRecord { path: "util.py".into(), language: Language::Python, loc: 10, framework: None, content_hash: String::new(), last_modified: 0.0, metadata: Default::default() });
        let deps = ResolvedDependencies {
            file_dependencies: vec![
                FileDependency { source_file: "a.py".into(), target: "util.py".into(), is_resolved: true, is_external: false, import_kind: ImportKind::Import, line: 1 },
                FileDependency { source_file: "b.py".into(), target: "util.py".into(), is_resolved: true, is_external: false, import_kind: ImportKind::Import, line: 1 },
            ],
            function_calls_resolved: vec![],
            circular_dependencies: vec![],
        };

        let report = report(&result, &deps, 10);
        assert_eq!(report.by_fan_in[0].file_path, "util.py");
        assert_eq!(report.by_fan_in[0].dependent_count, 2);
    }
}
