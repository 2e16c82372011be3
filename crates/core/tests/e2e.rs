//! End-to-end scenarios exercising the full scan -> parse -> resolve ->
//! store pipeline against small on-disk fixture projects.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use orc_core::analysis::dead_code::{self, Mode};
use orc_core::ignore_matcher::IgnoreMatcher;
use orc_core::model::RiskLevel;
use orc_core::orchestrator;
use orc_core::resolver;
use orc_core::scanner;
use orc_core::store::Store;

fn py_extensions() -> HashSet<String> {
    [".py".to_string()].into_iter().collect()
}

fn index(root: &Path) -> orc_core::model::ParseResult {
    let matcher = IgnoreMatcher::from_orcignore_and_patterns(root, &root.join(".orcignore"), &[]);
    let files = scanner::scan_files(root, &py_extensions(), &matcher).unwrap();
    let (result, _stats) = orchestrator::index_files(root, &files, Some(2), None, false);
    result
}

/// S1: a 3-file project; `utils.py::calculate` has two nested `if`s and a
/// 10-line file.
#[test]
fn s1_complexity_and_loc_match_source_shape() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.py"), "import utils\n\nutils.calculate(1, 2)\n").unwrap();
    fs::write(
        dir.path().join("utils.py"),
        "\"\"\"Utility functions.\"\"\"\n\
\n\
def calculate(a, b):\n\
    if a > 0:\n\
        if b > 0:\n\
            return a + b\n\
    return 0\n\
\n\
def helper():\n\
    return 1\n",
    )
    .unwrap();
    fs::write(dir.path().join("config.py"), "DEBUG = False\n").unwrap();

    let result = index(dir.path());

    let calculate = result.functions.get("utils.py::calculate").expect("calculate indexed");
    assert_eq!(calculate.complexity, 3);
    assert_eq!(calculate.line_start, 3);

    let utils_file = result.files.get("utils.py").expect("utils.py indexed");
    assert_eq!(utils_file.loc, 10);
}

/// S2: `.orcignore` containing `vendor/` excludes every file under it from
/// the scan, and therefore from every downstream table.
#[test]
fn s2_orcignore_excludes_vendored_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("vendor")).unwrap();
    fs::write(dir.path().join("vendor/third_party.py"), "def lib():\n    pass\n").unwrap();
    fs::write(dir.path().join("app.py"), "def main():\n    pass\n").unwrap();
    fs::write(dir.path().join(".orcignore"), "vendor/\n").unwrap();

    let result = index(dir.path());

    assert!(result.files.contains_key("app.py"));
    assert!(!result.files.keys().any(|p| p.starts_with("vendor/")));
    assert!(!result.functions.keys().any(|id| id.starts_with("vendor/")));
}

/// S3: `a.py` and `b.py` import each other; the resolver reports exactly
/// one cycle, canonically rotated to its lexicographically smallest node.
#[test]
fn s3_mutual_imports_yield_exactly_one_canonical_cycle() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.py"), "import b\n").unwrap();
    fs::write(dir.path().join("b.py"), "import a\n").unwrap();

    let result = index(dir.path());
    let resolved = resolver::resolve(&result).unwrap();

    assert_eq!(resolved.circular_dependencies.len(), 1);
    let cycle = &resolved.circular_dependencies[0].0;
    assert_eq!(cycle.first(), cycle.last());
    assert_eq!(cycle.first().unwrap(), "a.py");
}

/// S4: an unreferenced, deprecated-prefixed helper with a tiny body lands
/// in `safe_to_delete` with confidence >= 0.9.
#[test]
fn s4_unreferenced_deprecated_helper_is_safe_to_delete() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("legacy.py"), "def old_helper():\n    pass\n").unwrap();
    fs::write(dir.path().join("app.py"), "def main():\n    pass\n").unwrap();

    let result = index(dir.path());
    let mut sources = std::collections::BTreeMap::new();
    for (path, _) in &result.files {
        sources.insert(path.clone(), fs::read_to_string(dir.path().join(path)).unwrap());
    }

    let report = dead_code::analyze(&result, &sources, Mode::Deep);
    let finding = report
        .safe_to_delete
        .iter()
        .find(|f| f.name == "old_helper")
        .expect("old_helper reported as safe to delete");
    assert!(finding.confidence >= 0.9);
    assert!(finding.reason.contains("deprecated"));
}

/// S5: a hardcoded password literal yields exactly one critical
/// `hardcoded_secret` security risk.
#[test]
fn s5_hardcoded_password_is_flagged_critical() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("settings.py"), "password = \"hunter2\"\n").unwrap();

    let result = index(dir.path());
    let risks = result.security_risks.get("settings.py").expect("security risks recorded");

    assert_eq!(risks.len(), 1);
    assert_eq!(risks[0].risk_type, "hardcoded_secret");
    assert_eq!(risks[0].risk_level, RiskLevel::Critical);
}

/// S6: re-indexing an unchanged project serves every file from cache on
/// the second run.
#[test]
fn s6_unchanged_reindex_is_fully_cached() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.py"), "def a():\n    pass\n").unwrap();
    fs::write(dir.path().join("b.py"), "def b():\n    pass\n").unwrap();

    let matcher = IgnoreMatcher::from_orcignore_and_patterns(dir.path(), &dir.path().join(".orcignore"), &[]);
    let files = scanner::scan_files(dir.path(), &py_extensions(), &matcher).unwrap();

    let cache_dir = dir.path().join(".orc/cache");
    let cache = std::sync::Mutex::new(orc_core::cache::Cache::new(&cache_dir, 3600).unwrap());

    let (_, first) = orchestrator::index_files(dir.path(), &files, Some(2), Some(&cache), false);
    assert_eq!(first.cache_hits, 0);

    let (result, second) = orchestrator::index_files(dir.path(), &files, Some(2), Some(&cache), false);
    assert_eq!(second.cache_hits, files.len());
    assert_eq!(result.functions.len(), 2);
}

/// Store round-trip: what `apply_parse_run` writes, `load_parse_result`
/// reads back byte-for-byte in the fields that matter to queries.
#[test]
fn store_persists_and_reloads_a_full_index_run() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.py"), "def a():\n    pass\n").unwrap();

    let result = index(dir.path());
    let store = Store::open(&dir.path().join(".orc/graph.db")).unwrap();
    store.apply_parse_run(&result, 0.0).unwrap();

    let stats = store.get_statistics().unwrap();
    assert_eq!(stats.total_files, 1);
    assert_eq!(stats.total_functions, 1);

    let reloaded = store.load_parse_result().unwrap();
    assert!(reloaded.functions.contains_key("a.py::a"));
}
