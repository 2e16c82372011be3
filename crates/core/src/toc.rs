//! Table of contents generator (C9): a searchable summary of one parse run,
//! built directly from the already-typed [`ParseResult`]/[`ResolvedDependencies`]
//! rather than re-querying the store — the store is just a normalized
//! persistence of the same data the TOC already has in hand. Ported at the
//! semantic level from `original_source/orc/core/toc_generator.py`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{OrcError, OrcResult};
use crate::model::{ParseResult, RiskLevel};

/// Splits `part` at lowercase→uppercase and acronym→word boundaries, e.g.
/// `"getUserID"` → `["get", "User", "ID"]`. `regex`'s engine has no
/// lookahead, so this walks the string directly rather than porting the
/// original's `[A-Z]?[a-z]+|[A-Z]+(?=[A-Z][a-z]|\b)` pattern verbatim.
fn split_camel_case(part: &str) -> Vec<String> {
    let chars: Vec<char> = part.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let at_boundary = prev.is_lowercase() || (prev.is_uppercase() && next.is_some_and(char::is_lowercase));
            if at_boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Toc {
    pub sections: BTreeMap<String, Value>,
    pub keywords: BTreeMap<String, Vec<String>>,
    pub statistics: Value,
}

fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords = Vec::new();
    for part in text.split('_') {
        if part.is_empty() {
            continue;
        }
        let camel_parts = split_camel_case(part);
        if camel_parts.is_empty() {
            keywords.push(part.to_string());
        } else {
            keywords.extend(camel_parts);
        }
    }
    keywords.into_iter().map(|k| k.to_lowercase()).filter(|k| k.len() >= 3).collect()
}

fn add_keyword(map: &mut BTreeMap<String, Vec<String>>, keyword: &str, location: &str) {
    let keyword = keyword.to_lowercase();
    if keyword.len() < 3 {
        return;
    }
    let locations = map.entry(keyword).or_default();
    if !locations.iter().any(|l| l == location) {
        locations.push(location.to_string());
    }
}

/// Generates a complete TOC from a merged, resolved parse run.
pub fn generate(result: &ParseResult) -> Toc {
    let mut sections = BTreeMap::new();
    sections.insert("files".to_string(), summarize_files(result));
    sections.insert("functions".to_string(), summarize_functions(result));
    sections.insert("classes".to_string(), summarize_classes(result));
    sections.insert("api_endpoints".to_string(), summarize_api_endpoints(result));
    sections.insert("database_queries".to_string(), summarize_database_queries(result));
    sections.insert("error_handlers".to_string(), summarize_error_handlers(result));
    sections.insert("config_usage".to_string(), summarize_config_usage(result));
    sections.insert("side_effects".to_string(), summarize_side_effects(result));
    sections.insert("cross_cutting".to_string(), summarize_cross_cutting(result));
    sections.insert("security_risks".to_string(), summarize_security_risks(result));
    sections.insert("data_models".to_string(), summarize_data_models(result));
    sections.insert("concurrency".to_string(), summarize_concurrency(result));

    let keywords = build_keyword_index(result);
    let statistics = generate_statistics(result);

    tracing::info!(
        files = result.files.len(),
        functions = result.functions.len(),
        keywords = keywords.len(),
        "TOC generated"
    );

    Toc { sections, keywords, statistics }
}

fn summarize_files(result: &ParseResult) -> Value {
    let mut languages: Vec<&str> = result.files.values().map(|f| f.language.as_str()).collect();
    languages.sort_unstable();
    languages.dedup();
    let total_loc: u64 = result.files.values().map(|f| f.loc).sum();

    json!({
        "count": result.files.len(),
        "languages": languages,
        "language_count": languages.len(),
        "total_loc": total_loc,
    })
}

const ENTRY_POINT_NAMES: &[&str] = &["main", "__main__", "run", "start", "app", "serve"];

fn summarize_functions(result: &ParseResult) -> Value {
    let mut by_complexity: Vec<_> = result.functions.values().collect();
    by_complexity.sort_by(|a, b| b.complexity.cmp(&a.complexity));
    let top_complex: Vec<Value> = by_complexity
        .iter()
        .take(10)
        .map(|f| json!({"name": f.name, "file": f.file_path, "complexity": f.complexity, "line": f.line_start}))
        .collect();

    let entry_points: Vec<Value> = result
        .functions
        .values()
        .filter(|f| ENTRY_POINT_NAMES.contains(&f.name.as_str()))
        .map(|f| json!({"name": f.name, "file": f.file_path, "line": f.line_start}))
        .collect();

    let avg_complexity = average(result.functions.values().map(|f| f.complexity as f64));

    json!({
        "count": result.functions.len(),
        "top_complex": top_complex,
        "entry_points": entry_points,
        "avg_complexity": round2(avg_complexity),
    })
}

fn summarize_classes(result: &ParseResult) -> Value {
    let mut all_classes: Vec<_> = result.classes.values().collect();
    all_classes.sort_by(|a, b| a.name.cmp(&b.name));
    let details: Vec<Value> = all_classes.iter().map(|c| json!({"name": c.name, "file": c.file_path, "line": c.line_start})).collect();
    let names: Vec<&str> = all_classes.iter().map(|c| c.name.as_str()).collect();

    json!({ "count": result.classes.len(), "names": names, "details": details })
}

fn summarize_api_endpoints(result: &ParseResult) -> Value {
    let mut routes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut details = Vec::new();
    let mut total = 0usize;

    for (file, endpoints) in &result.api_endpoints {
        for ep in endpoints {
            total += 1;
            routes.entry(ep.route.clone()).or_default().push(ep.method.clone());
            details.push(json!({"route": ep.route, "method": ep.method, "handler": ep.handler, "file": file, "line": ep.line}));
        }
    }

    json!({ "count": total, "routes": routes, "details": details })
}

fn summarize_database_queries(result: &ParseResult) -> Value {
    let mut tables: Vec<String> = Vec::new();
    let mut orm_types: Vec<String> = Vec::new();
    let mut total = 0usize;

    for queries in result.database_queries.values() {
        for q in queries {
            total += 1;
            if let Some(table) = &q.table_name {
                if !tables.contains(table) {
                    tables.push(table.clone());
                }
            }
            if !orm_types.contains(&q.orm_type) {
                orm_types.push(q.orm_type.clone());
            }
        }
    }
    tables.sort();
    orm_types.sort();

    json!({ "count": total, "tables": tables, "orm_types": orm_types })
}

fn summarize_error_handlers(result: &ParseResult) -> Value {
    let mut types: Vec<String> = Vec::new();
    let mut total = 0usize;
    for handlers in result.error_handlers.values() {
        for h in handlers {
            total += 1;
            if !types.contains(&h.handler_type) {
                types.push(h.handler_type.clone());
            }
        }
    }
    types.sort();
    json!({ "count": total, "handler_types": types })
}

fn summarize_config_usage(result: &ParseResult) -> Value {
    let mut details = Vec::new();
    let mut keys = Vec::new();
    for (file, uses) in &result.config_usage {
        for c in uses {
            let kind = match c.kind {
                crate::model::ConfigUsageKind::Env => "env",
                crate::model::ConfigUsageKind::Flag => "flag",
                crate::model::ConfigUsageKind::Constant => "constant",
            };
            details.push(json!({"key": c.key, "type": kind, "file": file, "line": c.line}));
            keys.push(c.key.clone());
        }
    }
    details.sort_by(|a, b| a["key"].as_str().cmp(&b["key"].as_str()));
    json!({ "count": keys.len(), "keys": keys, "details": details })
}

fn summarize_side_effects(result: &ParseResult) -> Value {
    let mut targets: Vec<String> = Vec::new();
    let mut types: Vec<String> = Vec::new();
    let mut total = 0usize;
    for effects in result.side_effects.values() {
        for e in effects {
            total += 1;
            if let Some(target) = &e.target {
                if !targets.contains(target) {
                    targets.push(target.clone());
                }
            }
            if !types.contains(&e.effect_type) {
                types.push(e.effect_type.clone());
            }
        }
    }
    targets.sort();
    types.sort();
    json!({ "count": total, "targets": targets, "types": types })
}

fn summarize_cross_cutting(result: &ParseResult) -> Value {
    let mut types: Vec<String> = Vec::new();
    let mut total = 0usize;
    for concerns in result.cross_cutting_concerns.values() {
        for c in concerns {
            total += 1;
            if !types.contains(&c.concern_type) {
                types.push(c.concern_type.clone());
            }
        }
    }
    types.sort();
    json!({ "count": total, "concern_types": types })
}

fn summarize_security_risks(result: &ParseResult) -> Value {
    let mut high_priority = Vec::new();
    let mut types: Vec<String> = Vec::new();
    let mut total = 0usize;
    for (file, risks) in &result.security_risks {
        for r in risks {
            total += 1;
            if matches!(r.risk_level, RiskLevel::High | RiskLevel::Critical) {
                high_priority.push(json!({"type": r.risk_type, "level": r.risk_level.as_str(), "reason": r.reason, "file": file, "line": r.line}));
            }
            if !types.contains(&r.risk_type) {
                types.push(r.risk_type.clone());
            }
        }
    }
    high_priority.sort_by(|a, b| (a["file"].as_str(), a["line"].as_u64()).cmp(&(b["file"].as_str(), b["line"].as_u64())));
    types.sort();
    json!({ "count": total, "high_priority": high_priority, "risk_types": types })
}

fn summarize_data_models(result: &ParseResult) -> Value {
    let mut all: Vec<(&String, &crate::model::DataModel)> = Vec::new();
    for (file, models) in &result.data_models {
        for m in models {
            all.push((file, m));
        }
    }
    all.sort_by(|a, b| a.1.name.cmp(&b.1.name));
    let details: Vec<Value> = all.iter().map(|(file, m)| json!({"name": m.name, "type": m.kind, "file": file, "line": m.line})).collect();
    let names: Vec<&str> = all.iter().map(|(_, m)| m.name.as_str()).collect();
    json!({ "count": all.len(), "names": names, "details": details })
}

fn summarize_concurrency(result: &ParseResult) -> Value {
    let mut types: Vec<String> = Vec::new();
    let mut total = 0usize;
    for patterns in result.concurrency_patterns.values() {
        for p in patterns {
            total += 1;
            if !types.contains(&p.pattern_type) {
                types.push(p.pattern_type.clone());
            }
        }
    }
    types.sort();
    json!({ "count": total, "pattern_types": types })
}

fn generate_statistics(result: &ParseResult) -> Value {
    let total_lines: u64 = result.files.values().map(|f| f.loc).sum();
    let avg_complexity = average(result.functions.values().map(|f| f.complexity as f64));
    let mut languages: Vec<&str> = result.files.values().map(|f| f.language.as_str()).collect();
    languages.sort_unstable();
    languages.dedup();

    json!({
        "total_files": result.files.len(),
        "total_functions": result.functions.len(),
        "total_classes": result.classes.len(),
        "total_lines": total_lines,
        "avg_complexity": round2(avg_complexity),
        "languages": languages,
    })
}

fn build_keyword_index(result: &ParseResult) -> BTreeMap<String, Vec<String>> {
    let mut map = BTreeMap::new();

    for func in result.functions.values() {
        let location = format!("functions.{}@{}:{}", func.name, func.file_path, func.line_start);
        for keyword in extract_keywords(&func.name) {
            add_keyword(&mut map, &keyword, &location);
        }
    }

    for class in result.classes.values() {
        let location = format!("classes.{}@{}:{}", class.name, class.file_path, class.line_start);
        for keyword in extract_keywords(&class.name) {
            add_keyword(&mut map, &keyword, &location);
        }
    }

    for (file, endpoints) in &result.api_endpoints {
        for ep in endpoints {
            let location = format!("api_endpoints.{}:{}@{}:{}", ep.method, ep.route, file, ep.line);
            for part in ep.route.split('/').filter(|p| !p.is_empty()) {
                add_keyword(&mut map, part, &location);
            }
        }
    }

    for (file, uses) in &result.config_usage {
        for c in uses {
            let location = format!("config.{}@{}:{}", c.key, file, c.line);
            for keyword in extract_keywords(&c.key) {
                add_keyword(&mut map, &keyword, &location);
            }
        }
    }

    for (file, queries) in &result.database_queries {
        for q in queries {
            if let Some(table) = &q.table_name {
                let location = format!("database_queries.{table}@{file}");
                for keyword in extract_keywords(table) {
                    add_keyword(&mut map, &keyword, &location);
                }
            }
        }
    }

    for (file, risks) in &result.security_risks {
        for r in risks {
            let location = format!("security_risks.{}@{}:{}", r.risk_type, file, r.line);
            for keyword in extract_keywords(&r.risk_type) {
                add_keyword(&mut map, &keyword, &location);
            }
        }
    }

    tracing::debug!(keywords = map.len(), "built keyword index");
    map
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub kind: String,
    pub name: String,
    pub file: String,
    pub line: u32,
    pub location: String,
}

impl Toc {
    pub fn get_section_summary(&self, section: &str) -> Value {
        self.sections.get(section).cloned().unwrap_or(Value::Null)
    }

    /// Searches the keyword index and parses each `"<kind>.<name>@<file>:<line>"`
    /// location string back into its parts.
    pub fn search(&self, keyword: &str) -> Vec<SearchResult> {
        let keyword = keyword.to_lowercase();
        let Some(locations) = self.keywords.get(&keyword) else {
            return Vec::new();
        };

        locations
            .iter()
            .map(|loc| {
                let (type_name, file_line) = loc.split_once('@').unwrap_or((loc.as_str(), ""));
                let (kind, name) = type_name.split_once('.').unwrap_or((type_name, ""));
                let (file, line) = match file_line.rsplit_once(':') {
                    Some((f, l)) => (f.to_string(), l.parse().unwrap_or(0)),
                    None => (file_line.to_string(), 0),
                };
                SearchResult { kind: kind.to_string(), name: name.to_string(), file, line, location: loc.clone() }
            })
            .collect()
    }

    pub fn save(&self, path: &Path) -> OrcResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        tracing::info!(path = %path.display(), "TOC saved");
        Ok(())
    }

    pub fn load(path: &Path) -> OrcResult<Toc> {
        if !path.exists() {
            return Err(OrcError::query(format!("TOC file not found: {}", path.display())));
        }
        let text = std::fs::read_to_string(path)?;
        let toc: Toc = serde_json::from_str(&text)?;
        tracing::info!(path = %path.display(), "TOC loaded");
        Ok(toc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileRecord, FunctionRecord, Language, Parameter};
    use std::collections::BTreeMap as Map;

    fn sample_result() -> ParseResult {
        let mut result = ParseResult::default();
        result.files.insert(
            "app.py".to_string(),
            FileRecord {
                path: "app.py".into(),
                language: Language::Python,
                loc: 42,
                framework: None,
                content_hash: String::new(),
                last_modified: 0.0,
                metadata: Map::new(),
            },
        );
        result.functions.insert(
            "app.py::get_user".into(),
            FunctionRecord {
                id: "app.py::get_user".into(),
                file_path: "app.py".into(),
                name: "get_user".into(),
                language: Language::Python,
                line_start: 10,
                line_end: 20,
                complexity: 5,
                parameters: vec![Parameter { name: "id".into(), type_annotation: None }],
                calls: vec![],
                docstring: None,
                is_exported: true,
                is_async: false,
                return_type: None,
                decorators: vec![],
                source: String::new(),
            },
        );
        result
    }

    #[test]
    fn extracts_snake_case_keywords() {
        let keywords = extract_keywords("get_user_profile");
        assert_eq!(keywords, vec!["get", "user", "profile"]);
    }

    #[test]
    fn extracts_camel_case_keywords() {
        let keywords = extract_keywords("getUserProfile");
        assert_eq!(keywords, vec!["get", "user", "profile"]);
    }

    #[test]
    fn generate_builds_searchable_keyword_index() {
        let toc = generate(&sample_result());
        let results = toc.search("user");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, "functions");
        assert_eq!(results[0].file, "app.py");
        assert_eq!(results[0].line, 10);
    }

    #[test]
    fn statistics_reflect_merged_result() {
        let toc = generate(&sample_result());
        assert_eq!(toc.statistics["total_files"], 1);
        assert_eq!(toc.statistics["total_functions"], 1);
    }
}
