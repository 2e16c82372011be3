//! ORC CLI — command-line surface over `orc-core`.
//!
//! Calls `orc-core` directly with no server overhead, mirroring the
//! teacher's single-file `main.rs` command dispatch.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use clap::{Parser, Subcommand};

use orc_core::analysis::{complexity, dead_code, hotspots};
use orc_core::cache::Cache;
use orc_core::config::{self, Config};
use orc_core::ignore_matcher::IgnoreMatcher;
use orc_core::model::ParseResult;
use orc_core::orchestrator;
use orc_core::resolver;
use orc_core::scanner;
use orc_core::store::Store;
use orc_core::toc;
use orc_core::OrcError;

const DEPENDENCY_GRAPH_KEY: &str = "dependencies";

/// ORC — codebase intelligence engine.
#[derive(Parser)]
#[command(name = "orc", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize ORC in the current directory
    Init,
    /// Scan, parse, resolve, and persist the full index
    Index {
        /// Re-parse every file, ignoring the cache
        #[arg(long)]
        force: bool,
        /// Suppress the progress summary
        #[arg(long)]
        quiet: bool,
    },
    /// Substring search across functions, classes, and files
    Query {
        /// Search pattern
        pattern: String,
        /// Restrict the search to one symbol kind
        #[arg(long, value_enum)]
        r#type: Option<QueryType>,
        /// Maximum number of results
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Emit aggregate statistics for the indexed codebase
    Stats,
    /// Emit a complexity report
    Complexity {
        /// Only functions at or above this complexity are "problem functions"
        #[arg(long, default_value = "10")]
        threshold: u32,
        /// Maximum number of problem functions listed
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Run the dead-code heuristic
    Dead {
        /// Minimum confidence score (0.0-1.0) for a finding to be reported
        #[arg(long, default_value = "0.7")]
        confidence: f64,
        /// Maximum number of findings listed per bucket
        #[arg(long, default_value = "30")]
        limit: usize,
        /// Best-effort wall-clock budget in seconds; a warning is printed if exceeded
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
    /// Rank functions, files, and modules by complexity/size/fan-in
    Hotspots {
        /// Maximum number of entries per ranked list
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Append a pattern to .orcignore
    Ignore {
        /// Gitignore-style pattern
        pattern: String,
    },
    /// View or edit orc_config.yaml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved configuration
    Show,
    /// Set a single key to a value
    Set { key: String, value: String },
    /// Add a pattern to the config's ignore_patterns list
    AddIgnore { pattern: String },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum QueryType {
    Functions,
    Classes,
    Files,
}

fn project_root() -> PathBuf {
    std::env::current_dir().expect("could not determine current directory")
}

fn orc_dir(root: &Path) -> PathBuf {
    root.join(".orc")
}

fn graph_db_path(root: &Path) -> PathBuf {
    orc_dir(root).join("graph.db")
}

fn toc_path(root: &Path) -> PathBuf {
    orc_dir(root).join("toc.json")
}

fn orcignore_path(root: &Path) -> PathBuf {
    root.join(".orcignore")
}

fn config_path(root: &Path) -> PathBuf {
    root.join("orc_config.yaml")
}

fn fail(err: OrcError) -> ! {
    let hint = match &err {
        OrcError::Config { .. } => "check orc_config.yaml, or run `orc init` to create one",
        OrcError::Scan { .. } => "check that the project root is readable",
        OrcError::Parse { .. } => "the offending file was skipped; re-run with --force to retry it",
        OrcError::Store { .. } => "the .orc/graph.db file may be corrupt; remove it and re-run `orc index`",
        OrcError::Cache { .. } => "the .orc/cache directory may be corrupt; it is safe to delete and re-run `orc index`",
        OrcError::Resolver { .. } => "re-run `orc index` to rebuild the dependency graph",
        OrcError::Query { .. } => "check the query arguments",
        OrcError::Io(_) => "check file permissions under the project root",
    };
    eprintln!("error: {err}");
    eprintln!("  hint: {hint}");
    std::process::exit(1);
}

fn open_store(root: &Path) -> Store {
    Store::open(&graph_db_path(root)).unwrap_or_else(|e| fail(e))
}

/// Loads the persisted [`ParseResult`], falling back to a clear error
/// directing the user to index first rather than a confusing empty report.
fn load_parse_result(store: &Store) -> ParseResult {
    let result = store.load_parse_result().unwrap_or_else(|e| fail(e));
    if result.files.is_empty() {
        eprintln!("error: no indexed files found");
        eprintln!("  hint: run `orc index` first");
        std::process::exit(1);
    }
    result
}

fn print_json(value: &impl serde::Serialize) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("orc=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let root = project_root();

    match cli.command {
        Commands::Init => cmd_init(&root),
        Commands::Index { force, quiet } => cmd_index(&root, force, quiet),
        Commands::Query { pattern, r#type, limit } => cmd_query(&root, &pattern, r#type, limit, cli.json),
        Commands::Stats => cmd_stats(&root, cli.json),
        Commands::Complexity { threshold, limit } => cmd_complexity(&root, threshold, limit, cli.json),
        Commands::Dead { confidence, limit, timeout } => cmd_dead(&root, confidence, limit, timeout, cli.json),
        Commands::Hotspots { limit } => cmd_hotspots(&root, limit, cli.json),
        Commands::Ignore { pattern } => cmd_ignore(&root, &pattern),
        Commands::Config { action } => cmd_config(&root, action, cli.json),
    }
}

fn cmd_init(root: &Path) {
    let dir = orc_dir(root);
    if let Err(e) = std::fs::create_dir_all(dir.join("cache")) {
        fail(OrcError::Io(e));
    }
    println!("created .orc/ directory");

    let cfg_path = config_path(root);
    if cfg_path.exists() {
        println!("orc_config.yaml already exists, skipping");
    } else {
        if let Err(e) = std::fs::write(&cfg_path, config::default_yaml()) {
            fail(OrcError::Io(e));
        }
        println!("created orc_config.yaml");
    }

    let ignore_path = orcignore_path(root);
    if ignore_path.exists() {
        println!(".orcignore already exists, skipping");
    } else {
        let patterns = config::default_orcignore();
        if let Err(e) = std::fs::write(&ignore_path, patterns) {
            fail(OrcError::Io(e));
        }
        println!("created .orcignore");
    }

    println!("\nORC initialized. Next: `orc index` to build the project graph.");
}

fn run_index(root: &Path, force: bool) -> (ParseResult, orchestrator::IndexRunStats) {
    let config = Config::load(Some(&config_path(root))).unwrap_or_else(|e| fail(e));
    let matcher =
        IgnoreMatcher::from_orcignore_and_patterns(root, &orcignore_path(root), config.ignore_patterns());
    let files = scanner::scan_files(root, config.file_extensions(), &matcher).unwrap_or_else(|e| fail(e));

    let cache = if force {
        None
    } else {
        Some(Mutex::new(Cache::new(config.cache_dir(), config.cache_ttl()).unwrap_or_else(|e| fail(e))))
    };

    let (result, stats) = orchestrator::index_files(root, &files, config.max_workers(), cache.as_ref(), force);
    (result, stats)
}

fn cmd_index(root: &Path, force: bool, quiet: bool) {
    let started = Instant::now();
    let (result, stats) = run_index(root, force);

    let resolved = resolver::resolve(&result).unwrap_or_else(|e| fail(e));

    let store = open_store(root);
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    store.apply_parse_run(&result, now).unwrap_or_else(|e| fail(e));
    store.save_graph(DEPENDENCY_GRAPH_KEY, &resolved).unwrap_or_else(|e| fail(e));

    let toc = toc::generate(&result);
    toc.save(&toc_path(root)).unwrap_or_else(|e| fail(e));

    if !quiet {
        println!(
            "indexed {} files ({} parsed, {} failed, {} cache hits) in {:.2}s",
            result.files.len(),
            stats.files_parsed,
            stats.files_failed,
            stats.cache_hits,
            started.elapsed().as_secs_f64(),
        );
        println!(
            "{} functions, {} classes, {} circular dependencies",
            result.functions.len(),
            result.classes.len(),
            resolved.circular_dependencies.len(),
        );
    }
}

fn cmd_query(root: &Path, pattern: &str, query_type: Option<QueryType>, limit: usize, json: bool) {
    let store = open_store(root);

    match query_type {
        Some(QueryType::Functions) => {
            let rows = store.query_functions(Some(pattern), None, None, limit, 0).unwrap_or_else(|e| fail(e));
            if json {
                print_json(&rows.iter().map(|r| serde_json::json!({
                    "id": r.id, "file_path": r.file_path, "name": r.name,
                    "language": r.language, "line_start": r.line_start,
                    "line_end": r.line_end, "complexity": r.complexity,
                })).collect::<Vec<_>>());
            } else {
                for r in &rows {
                    println!("{:<40} {}:{}-{}  complexity={}", r.name, r.file_path, r.line_start, r.line_end, r.complexity);
                }
                eprintln!("\n{} functions", rows.len());
            }
        }
        Some(QueryType::Classes) => {
            let rows = store.query_classes(Some(pattern), limit, 0).unwrap_or_else(|e| fail(e));
            if json {
                print_json(&rows.iter().map(|r| serde_json::json!({
                    "id": r.id, "file_path": r.file_path, "name": r.name, "language": r.language,
                })).collect::<Vec<_>>());
            } else {
                for r in &rows {
                    println!("{:<40} {}", r.name, r.file_path);
                }
                eprintln!("\n{} classes", rows.len());
            }
        }
        Some(QueryType::Files) => {
            let rows = store.query_files(Some(pattern), limit, 0).unwrap_or_else(|e| fail(e));
            if json {
                print_json(&rows.iter().map(|f| serde_json::json!({
                    "path": f.path, "language": f.language.as_str(), "loc": f.loc,
                })).collect::<Vec<_>>());
            } else {
                for f in &rows {
                    println!("{:<50} {:>6} loc  {}", f.path, f.loc, f.language.as_str());
                }
                eprintln!("\n{} files", rows.len());
            }
        }
        None => {
            let matches = store.search_symbols(pattern, limit).unwrap_or_else(|e| fail(e));
            if json {
                print_json(&matches.iter().map(|m| serde_json::json!({
                    "kind": m.kind, "name": m.name, "file": m.file,
                    "language": m.language, "line_start": m.line_start, "line_end": m.line_end,
                })).collect::<Vec<_>>());
            } else {
                if matches.is_empty() {
                    eprintln!("no matches for '{pattern}'");
                    std::process::exit(1);
                }
                for m in &matches {
                    println!("[{}] {:<30} {}", m.kind, m.name, m.file);
                }
                eprintln!("\n{} matches", matches.len());
            }
        }
    }
}

fn cmd_stats(root: &Path, json: bool) {
    let store = open_store(root);
    let stats = store.get_statistics().unwrap_or_else(|e| fail(e));

    if json {
        print_json(&stats);
    } else {
        println!("Files:               {}", stats.total_files);
        println!("Functions:           {}", stats.total_functions);
        println!("Classes:             {}", stats.total_classes);
        println!("Average complexity:  {:.2}", stats.average_complexity);
        println!("Max complexity:      {}", stats.max_complexity);
        println!("\nBy language:");
        for (lang, count) in &stats.by_language {
            println!("  {:<12} {}", lang, count);
        }
    }
}

fn cmd_complexity(root: &Path, threshold: u32, limit: usize, json: bool) {
    let store = open_store(root);
    let result = load_parse_result(&store);
    let report = complexity::report(&result, threshold, limit);

    if json {
        print_json(&report);
    } else {
        println!("Complexity by severity:");
        for (bucket, count) in &report.counts_by_bucket {
            println!("  {:<10} {}", bucket, count);
        }
        println!("\nTop problem functions (threshold >= {threshold}):");
        for f in &report.top_problem_functions {
            println!("  {:<30} {}:{}  complexity={} [{:?}]", f.name, f.file_path, f.line_start, f.complexity, f.severity);
            for issue in &f.issues {
                println!("    - {issue}");
            }
        }
    }
}

fn cmd_dead(root: &Path, confidence: f64, limit: usize, timeout: u64, json: bool) {
    let started = Instant::now();
    let store = open_store(root);
    let result = load_parse_result(&store);

    let mut sources = std::collections::BTreeMap::new();
    for path in result.files.keys() {
        if let Ok(text) = std::fs::read_to_string(root.join(path)) {
            sources.insert(path.clone(), text);
        }
    }

    let mode = if result.files.len() > 2000 { dead_code::Mode::Fast } else { dead_code::Mode::Deep };
    let mut report = dead_code::analyze(&result, &sources, mode);
    report.safe_to_delete.retain(|f| f.confidence >= confidence);
    report.review_needed.retain(|f| f.confidence >= confidence);
    report.possibly_unused.retain(|f| f.confidence >= confidence);
    report.safe_to_delete.truncate(limit);
    report.review_needed.truncate(limit);
    report.possibly_unused.truncate(limit);

    if started.elapsed().as_secs() > timeout {
        eprintln!("warning: dead-code scan exceeded the {timeout}s budget ({:.1}s elapsed)", started.elapsed().as_secs_f64());
    }

    if json {
        print_json(&report);
    } else {
        println!("Safe to delete ({}):", report.safe_to_delete.len());
        for f in &report.safe_to_delete {
            println!("  {:<30} {}:{}  {}", f.name, f.file_path, f.line_start, f.reason);
        }
        println!("\nReview needed ({}):", report.review_needed.len());
        for f in &report.review_needed {
            println!("  {:<30} {}:{}  {}", f.name, f.file_path, f.line_start, f.reason);
        }
        println!("\nPossibly unused ({}):", report.possibly_unused.len());
        for f in &report.possibly_unused {
            println!("  {:<30} {}:{}  {}", f.name, f.file_path, f.line_start, f.reason);
        }
        println!("\nEstimated lines saved: {}", report.estimated_lines_saved);
    }
}

fn cmd_hotspots(root: &Path, limit: usize, json: bool) {
    let store = open_store(root);
    let result = load_parse_result(&store);
    let resolved = store
        .load_graph(DEPENDENCY_GRAPH_KEY)
        .unwrap_or_else(|e| fail(e))
        .unwrap_or_else(|| resolver::resolve(&result).unwrap_or_else(|e| fail(e)));

    let report = hotspots::report(&result, &resolved, limit);

    if json {
        print_json(&report);
    } else {
        println!("By complexity:");
        for h in &report.by_complexity {
            println!("  {:<30} {}  complexity={}  {}", h.name, h.file_path, h.complexity, h.suggestion);
        }
        println!("\nBy size:");
        for h in &report.by_size {
            println!("  {:<50} {} loc  {}", h.file_path, h.loc, h.suggestion);
        }
        println!("\nBy fan-in:");
        for h in &report.by_fan_in {
            println!("  {:<50} {} dependents  {}", h.file_path, h.dependent_count, h.suggestion);
        }
    }
}

fn cmd_ignore(root: &Path, pattern: &str) {
    let path = orcignore_path(root);
    if !path.exists() {
        if let Err(e) = std::fs::write(&path, "# ORC Ignore Patterns\n\n") {
            fail(OrcError::Io(e));
        }
    }

    let existing = std::fs::read_to_string(&path).unwrap_or_default();
    if existing.lines().any(|line| line == pattern) {
        println!("pattern '{pattern}' already in .orcignore");
        return;
    }

    let mut updated = existing;
    if !updated.ends_with('\n') && !updated.is_empty() {
        updated.push('\n');
    }
    updated.push_str(pattern);
    updated.push('\n');
    if let Err(e) = std::fs::write(&path, updated) {
        fail(OrcError::Io(e));
    }
    println!("added '{pattern}' to .orcignore");
}

fn cmd_config(root: &Path, action: ConfigAction, json: bool) {
    let path = config_path(root);

    match action {
        ConfigAction::Show => {
            if !path.exists() {
                eprintln!("error: no orc_config.yaml found");
                eprintln!("  hint: run `orc init` first");
                std::process::exit(1);
            }
            let config = Config::load(Some(&path)).unwrap_or_else(|e| fail(e));
            if json {
                print_json(&serde_json::json!({
                    "project_root": config.project_root().display().to_string(),
                    "cache_dir": config.cache_dir().display().to_string(),
                    "cache_ttl": config.cache_ttl(),
                    "max_workers": config.max_workers(),
                    "ignore_patterns": config.ignore_patterns(),
                    "file_extensions": config.file_extensions(),
                    "log_level": config.log_level(),
                }));
            } else {
                println!("project_root:    {}", config.project_root().display());
                println!("cache_dir:       {}", config.cache_dir().display());
                println!("cache_ttl:       {}", config.cache_ttl());
                println!("max_workers:     {}", config.max_workers().map(|n| n.to_string()).unwrap_or_else(|| "auto".into()));
                println!("log_level:       {}", config.log_level());
                println!("ignore_patterns:");
                for p in config.ignore_patterns() {
                    println!("  - {p}");
                }
            }
        }
        ConfigAction::Set { key, value } => {
            if !path.exists() {
                eprintln!("error: no orc_config.yaml found");
                eprintln!("  hint: run `orc init` first");
                std::process::exit(1);
            }
            config::set_key(&path, &key, &value).unwrap_or_else(|e| fail(e));
            println!("set {key} = {value}");
        }
        ConfigAction::AddIgnore { pattern } => {
            if !path.exists() {
                eprintln!("error: no orc_config.yaml found");
                eprintln!("  hint: run `orc init` first");
                std::process::exit(1);
            }
            config::add_ignore_pattern(&path, &pattern).unwrap_or_else(|e| fail(e));
            println!("added '{pattern}' to ignore_patterns");
        }
    }
}
