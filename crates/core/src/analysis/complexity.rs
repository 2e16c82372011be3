//! Complexity report: severity buckets and ranked problem functions.
//! Grounded in spec.md §4.10 (bucket thresholds, `(priority, -complexity)`
//! ordering) — there's no one-to-one original Python module, since
//! `original_source/orc` computes complexity inline during indexing rather
//! than as a standalone report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ParseResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    fn bucket(complexity: u32) -> Severity {
        match complexity {
            c if c >= 20 => Severity::Critical,
            c if c >= 15 => Severity::High,
            c if c >= 10 => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAggregate {
    pub file_path: String,
    pub total_complexity: u64,
    pub max_complexity: u32,
    pub average_complexity: f64,
    pub function_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemFunction {
    pub id: String,
    pub name: String,
    pub file_path: String,
    pub line_start: u32,
    pub complexity: u32,
    pub severity: Severity,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplexityReport {
    pub counts_by_bucket: BTreeMap<String, u64>,
    pub file_aggregates: Vec<FileAggregate>,
    pub top_problem_functions: Vec<ProblemFunction>,
}

fn issues_for(complexity: u32, line_start: u32, line_end: u32) -> Vec<String> {
    let mut issues = Vec::new();
    let length = line_end.saturating_sub(line_start) + 1;
    if complexity >= 15 {
        issues.push("high cyclomatic complexity".to_string());
    }
    if length > 80 {
        issues.push("long function body".to_string());
    }
    if length > 0 && complexity as f64 / length as f64 > 0.3 {
        issues.push("dense branching relative to length".to_string());
    }
    issues
}

/// `threshold` filters which functions are eligible for
/// `top_problem_functions`; `limit` bounds the list size.
pub fn report(result: &ParseResult, threshold: u32, limit: usize) -> ComplexityReport {
    let mut counts_by_bucket: BTreeMap<String, u64> =
        [("critical", 0), ("high", 0), ("medium", 0), ("low", 0)].into_iter().map(|(k, v)| (k.to_string(), v)).collect();

    let mut per_file: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
    for func in result.functions.values() {
        let bucket = Severity::bucket(func.complexity);
        *counts_by_bucket.entry(bucket_key(bucket).to_string()).or_default() += 1;
        per_file.entry(&func.file_path).or_default().push(func.complexity);
    }

    let file_aggregates = per_file
        .into_iter()
        .map(|(file_path, complexities)| {
            let total: u64 = complexities.iter().map(|c| *c as u64).sum();
            let max = complexities.iter().copied().max().unwrap_or(0);
            let average = total as f64 / complexities.len() as f64;
            FileAggregate { file_path: file_path.to_string(), total_complexity: total, max_complexity: max, average_complexity: average, function_count: complexities.len() }
        })
        .collect();

    let mut candidates: Vec<&crate::model::FunctionRecord> =
        result.functions.values().filter(|f| f.complexity >= threshold).collect();
    candidates.sort_by(|a, b| b.complexity.cmp(&a.complexity).then_with(|| a.id.cmp(&b.id)));

    let top_problem_functions = candidates
        .into_iter()
        .take(limit)
        .map(|f| ProblemFunction {
            id: f.id.clone(),
            name: f.name.clone(),
            file_path: f.file_path.clone(),
            line_start: f.line_start,
            complexity: f.complexity,
            severity: Severity::bucket(f.complexity),
            issues: issues_for(f.complexity, f.line_start, f.line_end),
        })
        .collect();

    ComplexityReport { counts_by_bucket, file_aggregates, top_problem_functions }
}

fn bucket_key(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::High => "high",
        Severity::Medium => "medium",
        Severity::Low => "low",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileRecord, FunctionRecord, Language};
    use std::collections::BTreeMap as Map;

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
    fn buckets_functions_by_complexity() {
        let mut result = ParseResult::default();
        result.files.insert("f.py".into(), FileRecord { path: "f.py".into(), language: Language::Python, loc: 10, framework: None, content_hash: String::new(), last_modified: 0.0, metadata: Map::new() });
        result.functions.insert("f.py::a".into(), func("a", 25));
        result.functions.insert("f.py::b".into(), func("b", 5));

        let report = report(&result, 0, 10);
        assert_eq!(report.counts_by_bucket["critical"], 1);
        assert_eq!(report.counts_by_bucket["low"], 1);
        assert_eq!(report.top_problem_functions[0].name, "a");
    }

    #[test]
    fn threshold_filters_problem_functions() {
        let mut result = ParseResult::default();
        result.functions.insert("f.py::a".into(), func("a", 25));
        result.functions.insert("f.py::b".into(), func("b", 5));

        let report = report(&result, 20, 10);
        assert_eq!(report.top_problem_functions.len(), 1);
        assert_eq!(report.top_problem_functions[0].name, "a");
    }
}
