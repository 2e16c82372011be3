//! Dead-code heuristic: scores each function's likelihood of being unused.
//! Ported at the semantic level from
//! `original_source/orc/orc_package/analysis/dead_code.py`'s
//! scan-then-filter shape, with the confidence model spec.md §4.10 adds on
//! top (the original only returns a flat unused/used split).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{FunctionRecord, ParseResult};

const ENTRY_POINT_PATTERNS: &[&str] = &["main", "test_", "setup", "__main__", "run", "start", "init", "__init__"];
const DEPRECATED_PREFIXES: &[&str] = &["old_", "legacy_", "deprecated_"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    SafeToDelete,
    ReviewNeeded,
    PossiblyUnused,
}

fn bucket_of(score: f64) -> Confidence {
    if score >= 0.9 {
        Confidence::SafeToDelete
    } else if score >= 0.7 {
        Confidence::ReviewNeeded
    } else {
        Confidence::PossiblyUnused
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadCodeFinding {
    pub function_id: String,
    pub name: String,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub confidence: f64,
    pub bucket: Confidence,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeadCodeReport {
    pub safe_to_delete: Vec<DeadCodeFinding>,
    pub review_needed: Vec<DeadCodeFinding>,
    pub possibly_unused: Vec<DeadCodeFinding>,
    pub estimated_lines_saved: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fast substring scan (`name(`, `.name(`).
    Fast,
    /// Regex set covering attribute access, decorator, and keyword-arg forms.
    Deep,
}

fn is_entry_point(name: &str) -> bool {
    let lower = name.to_lowercase();
    ENTRY_POINT_PATTERNS.iter().any(|p| lower.contains(p))
}

fn is_test_context(func: &FunctionRecord) -> bool {
    func.name.starts_with("test_") || func.file_path.contains("test") || func.file_path.contains("tests/")
}

fn is_exported(result: &ParseResult, func: &FunctionRecord) -> bool {
    result.exports.get(&func.file_path).map(|exports| exports.contains_key(&func.name)).unwrap_or(false)
}

fn has_deprecated_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    DEPRECATED_PREFIXES.iter().any(|p| lower.starts_with(p))
}

static WORD_BOUNDARY_CALL: LazyLock<fn(&str, &str) -> bool> = LazyLock::new(|| {
    fn check(haystack: &str, name: &str) -> bool {
        haystack.contains(&format!("{name}(")) || haystack.contains(&format!(".{name}("))
    }
    check
});

fn deep_call_regex(name: &str) -> Regex {
    let escaped = regex::escape(name);
    Regex::new(&format!(r"(?:\.{escaped}\s*\(|^{escaped}\s*\(|@{escaped}\b|\b{escaped}\s*=)")).unwrap_or_else(|_| Regex::new("$^").unwrap())
}

/// Scans every file's raw text (as already captured via the function's own
/// file) for a call site. `all_sources` maps file path → full file text —
/// the orchestrator's scan keeps these around only transiently, so analysis
/// callers pass whatever subset they still have; a missing file is treated
/// as "no call site found there".
fn has_call_site(name: &str, all_sources: &std::collections::BTreeMap<String, String>, mode: Mode) -> bool {
    match mode {
        Mode::Fast => all_sources.values().any(|text| WORD_BOUNDARY_CALL(text, name)),
        Mode::Deep => {
            let re = deep_call_regex(name);
            all_sources.values().any(|text| re.is_match(text))
        }
    }
}

fn score_function(result: &ParseResult, func: &FunctionRecord, called_anywhere: bool, has_source_call_site: bool) -> (f64, String) {
    let mut confidence: f64 = 0.7;
    let mut reasons = Vec::new();

    if called_anywhere || has_source_call_site {
        confidence -= 0.5;
        reasons.push("a call site was found".to_string());
    }
    if func.name.starts_with('_') {
        confidence += 0.1;
        reasons.push("private-prefixed name".to_string());
    }
    if is_entry_point(&func.name) {
        confidence -= 0.4;
        reasons.push("matches an entry-point naming convention".to_string());
    }
    if is_test_context(func) {
        confidence -= 0.3;
        reasons.push("test function or file".to_string());
    }
    if is_exported(result, func) {
        confidence -= 0.2;
        reasons.push("present in an exports list".to_string());
    }
    if has_deprecated_name(&func.name) {
        confidence += 0.3;
        reasons.push("deprecated/unused naming pattern".to_string());
    }
    let length = func.line_end.saturating_sub(func.line_start) + 1;
    if length <= 3 {
        confidence += 0.1;
        reasons.push("very small function body".to_string());
    }

    (confidence.clamp(0.0, 1.0), reasons.join("; "))
}

/// Analyzes `result` for unused functions. `all_sources` supplies raw file
/// text for the deep-mode call-site scan; pass an empty map to rely solely
/// on the resolved call graph (fast, but misses calls the resolver
/// couldn't attribute — e.g. dynamic dispatch).
pub fn analyze(result: &ParseResult, all_sources: &std::collections::BTreeMap<String, String>, mode: Mode) -> DeadCodeReport {
    let called_names: std::collections::HashSet<&str> =
        result.functions.values().flat_map(|f| f.calls.iter()).map(|c| c.rsplit('.').next().unwrap_or(c)).collect();

    let mut report = DeadCodeReport::default();

    for func in result.functions.values() {
        if func.name.starts_with("__") && func.name.ends_with("__") {
            continue;
        }
        let called_anywhere = called_names.contains(func.name.as_str());
        let source_call_site = if all_sources.is_empty() { false } else { has_call_site(&func.name, all_sources, mode) };

        if called_anywhere || is_entry_point(&func.name) {
            if !(has_deprecated_name(&func.name) && !called_anywhere) {
                continue;
            }
        }

        let (confidence, reason) = score_function(result, func, called_anywhere, source_call_site);
        let finding = DeadCodeFinding {
            function_id: func.id.clone(),
            name: func.name.clone(),
            file_path: func.file_path.clone(),
            line_start: func.line_start,
            line_end: func.line_end,
            confidence,
            bucket: bucket_of(confidence),
            reason,
        };

        let lines = (func.line_end.saturating_sub(func.line_start) + 1) as u64;
        match finding.bucket {
            Confidence::SafeToDelete => {
                report.estimated_lines_saved += lines;
                report.safe_to_delete.push(finding);
            }
            Confidence::ReviewNeeded => report.review_needed.push(finding),
            Confidence::PossiblyUnused => report.possibly_unused.push(finding),
        }
    }

    for bucket in [&mut report.safe_to_delete, &mut report.review_needed, &mut report.possibly_unused] {
        bucket.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.function_id.cmp(&b.function_id)));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;
    use std::collections::BTreeMap;

    fn func(name: &str, file: &str, lines: (u32, u32)) -> FunctionRecord {
        FunctionRecord {
            id: format!("{file}::{name}"),
            file_path: file.into(),
            name: name.into(),
            language: Language::Python,
            line_start: lines.0,
            line_end: lines.1,
            complexity: 2,
            parameters: vec![],
            calls: vec![],
            docstring: None,
            is_exported: false,
            is_async: false,
            return_type: None,
            decorators: vec![],
            source: String::new(),
        }
    }

    #[test]
    fn flags_uncalled_deprecated_function_as_safe_to_delete() {
        let mut result = ParseResult::default();
        result.functions.insert("a.py::old_helper".into(), func("old_helper", "a.py", (1, 3)));

        let report = analyze(&result, &BTreeMap::new(), Mode::Fast);
        assert_eq!(report.safe_to_delete.len(), 1);
        assert!(report.safe_to_delete[0].confidence >= 0.9);
        assert!(report.safe_to_delete[0].reason.contains("deprecated"));
    }

    #[test]
    fn called_function_is_not_flagged() {
        let mut result = ParseResult::default();
        result.functions.insert("a.py::helper".into(), func("helper", "a.py", (1, 3)));
        let mut caller = func("main", "a.py", (5, 10));
        caller.calls.push("helper".to_string());
        result.functions.insert("a.py::main".into(), caller);

        let report = analyze(&result, &BTreeMap::new(), Mode::Fast);
        let flagged: Vec<&str> = report
            .safe_to_delete
            .iter()
            .chain(report.review_needed.iter())
            .chain(report.possibly_unused.iter())
            .map(|f| f.name.as_str())
            .collect();
        assert!(!flagged.contains(&"helper"));
    }
}
