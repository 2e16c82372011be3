//! The uniform data model shared by every parser, the resolver, and the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Closed set of languages/content types the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    React,
    Html,
    Css,
    Json,
    Yaml,
    Markdown,
    Unknown,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::React => "react",
            Language::Html => "html",
            Language::Css => "css",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Markdown => "markdown",
            Language::Unknown => "unknown",
        }
    }

    /// Inverse of [`Language::as_str`], for reconstructing the enum from a
    /// stored column rather than an extension.
    pub fn from_name(name: &str) -> Language {
        match name {
            "python" => Language::Python,
            "javascript" => Language::Javascript,
            "typescript" => Language::Typescript,
            "react" => Language::React,
            "html" => Language::Html,
            "css" => Language::Css,
            "json" => Language::Json,
            "yaml" => Language::Yaml,
            "markdown" => Language::Markdown,
            _ => Language::Unknown,
        }
    }

    /// Maps a lowercased file extension (without the leading dot) to a language.
    pub fn from_extension(ext: &str) -> Language {
        match ext {
            "py" | "pyi" => Language::Python,
            "js" | "mjs" | "cjs" => Language::Javascript,
            "ts" => Language::Typescript,
            "jsx" | "tsx" => Language::React,
            "html" | "htm" => Language::Html,
            "css" | "scss" | "sass" | "less" => Language::Css,
            "json" => Language::Json,
            "yaml" | "yml" => Language::Yaml,
            "md" | "markdown" => Language::Markdown,
            _ => Language::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub language: Language,
    pub loc: u64,
    pub framework: Option<String>,
    pub content_hash: String,
    pub last_modified: f64,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_annotation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub id: String,
    pub file_path: String,
    pub name: String,
    pub language: Language,
    pub line_start: u32,
    pub line_end: u32,
    pub complexity: u32,
    pub parameters: Vec<Parameter>,
    pub calls: Vec<String>,
    pub docstring: Option<String>,
    pub is_exported: bool,
    pub is_async: bool,
    pub return_type: Option<String>,
    pub decorators: Vec<String>,
    pub source: String,
}

impl FunctionRecord {
    pub fn make_id(file_path: &str, name: &str) -> String {
        format!("{file_path}::{name}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub is_async: bool,
    pub is_classmethod: bool,
    pub is_staticmethod: bool,
    pub is_property: bool,
    pub is_private: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: String,
    pub file_path: String,
    pub name: String,
    pub language: Language,
    pub line_start: u32,
    pub line_end: u32,
    pub bases: Vec<String>,
    pub methods: Vec<MethodDescriptor>,
    pub docstring: Option<String>,
    pub decorators: Vec<String>,
}

impl ClassRecord {
    pub fn make_id(file_path: &str, name: &str) -> String {
        format!("{file_path}::{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Import,
    FromImport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedImport {
    pub module: String,
    pub imported_names: Vec<String>,
    pub line: u32,
    pub kind: ImportKind,
    pub statement: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Function,
    Class,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub kind: ExportKind,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Main,
    Cli,
    Route,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPoint {
    pub file_path: String,
    pub entry_type: EntryType,
    pub function_name: Option<String>,
    pub line: u32,
    pub confidence: f64,
}

// --- Semantic overlays (§3) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub route: String,
    pub method: String,
    pub handler: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseQuery {
    pub orm_type: String,
    pub table_name: Option<String>,
    pub line: u32,
    pub statement: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandler {
    pub handler_type: String,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigUsageKind {
    Env,
    Flag,
    Constant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigUsage {
    pub key: String,
    pub kind: ConfigUsageKind,
    pub default: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideEffect {
    pub effect_type: String,
    pub target: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossCuttingConcern {
    pub concern_type: String,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRisk {
    pub risk_type: String,
    pub risk_level: RiskLevel,
    pub reason: String,
    pub line: u32,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataModel {
    pub name: String,
    pub kind: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyPattern {
    pub pattern_type: String,
    pub line: u32,
}

/// Uniform intermediate representation every parser produces for one file.
///
/// Map fields merge by union-update across files during the reduce step;
/// list fields concatenate. See the parallel orchestrator (§4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub files: BTreeMap<String, FileRecord>,
    pub functions: BTreeMap<String, FunctionRecord>,
    pub classes: BTreeMap<String, ClassRecord>,
    pub imports: BTreeMap<String, BTreeMap<String, u64>>,
    pub imports_detailed: BTreeMap<String, Vec<DetailedImport>>,
    pub exports: BTreeMap<String, BTreeMap<String, ExportRecord>>,
    pub entry_points: Vec<EntryPoint>,

    pub api_endpoints: BTreeMap<String, Vec<ApiEndpoint>>,
    pub database_queries: BTreeMap<String, Vec<DatabaseQuery>>,
    pub error_handlers: BTreeMap<String, Vec<ErrorHandler>>,
    pub config_usage: BTreeMap<String, Vec<ConfigUsage>>,
    pub side_effects: BTreeMap<String, Vec<SideEffect>>,
    pub cross_cutting_concerns: BTreeMap<String, Vec<CrossCuttingConcern>>,
    pub security_risks: BTreeMap<String, Vec<SecurityRisk>>,
    pub data_models: BTreeMap<String, Vec<DataModel>>,
    pub concurrency_patterns: BTreeMap<String, Vec<ConcurrencyPattern>>,

    /// Set when this result represents a failed parse; the file row is still
    /// populated (minimally) so the file is not treated as missing.
    pub error: Option<String>,
}

impl ParseResult {
    /// Merges `other` into `self`: map fields by union-update (the later
    /// value for a duplicate key wins), list fields by concatenation.
    pub fn merge(&mut self, other: ParseResult) {
        self.files.extend(other.files);
        self.functions.extend(other.functions);
        self.classes.extend(other.classes);
        for (k, v) in other.imports {
            self.imports.entry(k).or_default().extend(v);
        }
        for (k, v) in other.imports_detailed {
            self.imports_detailed.entry(k).or_default().extend(v);
        }
        for (k, v) in other.exports {
            self.exports.entry(k).or_default().extend(v);
        }
        self.entry_points.extend(other.entry_points);

        macro_rules! merge_overlay {
            ($field:ident) => {
                for (k, v) in other.$field {
                    self.$field.entry(k).or_default().extend(v);
                }
            };
        }
        merge_overlay!(api_endpoints);
        merge_overlay!(database_queries);
        merge_overlay!(error_handlers);
        merge_overlay!(config_usage);
        merge_overlay!(side_effects);
        merge_overlay!(cross_cutting_concerns);
        merge_overlay!(security_risks);
        merge_overlay!(data_models);
        merge_overlay!(concurrency_patterns);
    }

    pub fn minimal_for_error(path: &str, language: Language, message: impl Into<String>) -> Self {
        let mut result = ParseResult::default();
        result.files.insert(
            path.to_string(),
            FileRecord {
                path: path.to_string(),
                language,
                loc: 0,
                framework: None,
                content_hash: String::new(),
                last_modified: 0.0,
                metadata: BTreeMap::new(),
            },
        );
        result.error = Some(message.into());
        result
    }
}

// --- Resolved edges (§3, produced by the resolver) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller_function_id: String,
    pub callee_name: String,
    pub callee_function_id: Option<String>,
    pub callee_file: Option<String>,
    pub resolved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDependency {
    pub source_file: String,
    pub target: String,
    pub is_resolved: bool,
    pub is_external: bool,
    pub import_kind: ImportKind,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle(pub Vec<String>);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedDependencies {
    pub file_dependencies: Vec<FileDependency>,
    pub function_calls_resolved: Vec<CallEdge>,
    pub circular_dependencies: Vec<Cycle>,
}

// --- Index manifest (§3) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub language: Language,
    pub last_modified: f64,
    pub content_hash: String,
    pub last_indexed_at: f64,
}
