//! Parallel parser orchestrator (C6): fans scanned files out across a rayon
//! thread pool, one parser invocation per file, and reduces the results back
//! into a single [`ParseResult`] single-threaded. Grounded in the original's
//! `parallel_indexer.py` (worker pool sizing, per-file error isolation,
//! periodic progress logging) and the teacher's rayon-backed `scan.rs`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rayon::prelude::*;

use crate::cache::Cache;
use crate::model::{Language, ParseResult};
use crate::scanner::ScannedFile;

const PROGRESS_INTERVAL: usize = 100;
const PARSE_CACHE_PREFIX: &str = "parse:";

/// How many files completed, how many produced a hard parser error (not to
/// be confused with a language's own syntax-error recovery, which parsers
/// already fold into `ParseResult` without raising), and how many were
/// served from the parse cache instead of re-parsed.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexRunStats {
    pub files_parsed: usize,
    pub files_failed: usize,
    pub cache_hits: usize,
}

/// Builds a rayon pool sized `max_workers` (falling back to `num_cpus - 1`,
/// floor 1, when `max_workers` is `None` — the "auto" config value), parses
/// every file in `files` on it, and merges the per-file results into one
/// [`ParseResult`] in file-path order so output stays deterministic
/// regardless of which worker finished first (invariant 6, §8).
///
/// When `cache` is given and `force` is false, each file is looked up by
/// `rel_path` before parsing; a fresh hit (unchanged mtime, unexpired TTL —
/// `Cache::get` already checks both) is reused instead of re-parsing, and
/// every freshly parsed result is written back so the next run can skip it.
pub fn index_files(
    root: &std::path::Path,
    files: &[ScannedFile],
    max_workers: Option<usize>,
    cache: Option<&Mutex<Cache>>,
    force: bool,
) -> (ParseResult, IndexRunStats) {
    let workers = max_workers.unwrap_or_else(|| (num_cpus_available()).saturating_sub(1).max(1));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .unwrap_or_else(|_| rayon::ThreadPoolBuilder::new().build().expect("default rayon pool"));

    let completed = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let cache_hits = AtomicUsize::new(0);
    let total = files.len();

    tracing::info!(total, workers, "indexing started");

    let partials: Vec<ParseResult> = pool.install(|| {
        files
            .par_iter()
            .map(|scanned| {
                let abs_path = root.join(&scanned.rel_path);
                let cache_key = format!("{PARSE_CACHE_PREFIX}{}", scanned.rel_path);

                if !force {
                    if let Some(cache) = cache {
                        if let Some(cached) = cache.lock().unwrap().get::<ParseResult>(&cache_key) {
                            cache_hits.fetch_add(1, Ordering::Relaxed);
                            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                            if done % PROGRESS_INTERVAL == 0 || done == total {
                                tracing::info!(done, total, "indexing progress");
                            }
                            return cached;
                        }
                    }
                }

                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    crate::parsers::parse_file(&abs_path, &scanned.rel_path)
                }))
                .unwrap_or_else(|panic_payload| {
                    let message = panic_message(&panic_payload);
                    tracing::warn!(file = %scanned.rel_path, %message, "parser panicked");
                    ParseResult::minimal_for_error(
                        &scanned.rel_path,
                        Language::from_extension(&scanned.extension),
                        message,
                    )
                });

                if result.error.is_some() {
                    failed.fetch_add(1, Ordering::Relaxed);
                } else if let Some(cache) = cache {
                    let _ = cache.lock().unwrap().set(&cache_key, &result, None, Some(&abs_path));
                }

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_INTERVAL == 0 || done == total {
                    tracing::info!(done, total, "indexing progress");
                }

                result
            })
            .collect()
    });

    let mut merged = ParseResult::default();
    for partial in partials {
        merged.merge(partial);
    }

    let stats = IndexRunStats {
        files_parsed: total,
        files_failed: failed.load(Ordering::Relaxed),
        cache_hits: cache_hits.load(Ordering::Relaxed),
    };
    tracing::info!(parsed = stats.files_parsed, failed = stats.files_failed, cache_hits = stats.cache_hits, "indexing complete");

    (merged, stats)
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown parser panic".to_string()
    }
}

fn num_cpus_available() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn merges_results_across_multiple_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def foo():\n    pass\n").unwrap();
        fs::write(dir.path().join("b.py"), "def bar():\n    pass\n").unwrap();

        let files = vec![
            ScannedFile { rel_path: "a.py".into(), abs_path: dir.path().join("a.py"), extension: "py".into() },
            ScannedFile { rel_path: "b.py".into(), abs_path: dir.path().join("b.py"), extension: "py".into() },
        ];

        let (result, stats) = index_files(dir.path(), &files, Some(2), None, false);
        assert_eq!(stats.files_parsed, 2);
        assert_eq!(stats.files_failed, 0);
        assert_eq!(result.files.len(), 2);
        assert!(result.functions.keys().any(|k| k.contains("foo")));
        assert!(result.functions.keys().any(|k| k.contains("bar")));
    }

    #[test]
    fn missing_file_is_isolated_as_a_parse_error_not_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![ScannedFile {
            rel_path: "missing.py".into(),
            abs_path: dir.path().join("missing.py"),
            extension: "py".into(),
        }];

        let (result, stats) = index_files(dir.path(), &files, Some(1), None, false);
        assert_eq!(stats.files_parsed, 1);
        assert_eq!(stats.files_failed, 1);
        assert!(result.files["missing.py"].path == "missing.py");
    }

    #[test]
    fn second_run_reuses_cached_parse_result_for_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def foo():\n    pass\n").unwrap();
        let files = vec![ScannedFile { rel_path: "a.py".into(), abs_path: dir.path().join("a.py"), extension: "py".into() }];

        let cache_dir = dir.path().join(".cache");
        let cache = Mutex::new(Cache::new(&cache_dir, 3600).unwrap());

        let (_, first) = index_files(dir.path(), &files, Some(1), Some(&cache), false);
        assert_eq!(first.cache_hits, 0);

        let (result, second) = index_files(dir.path(), &files, Some(1), Some(&cache), false);
        assert_eq!(second.cache_hits, 1);
        assert!(result.functions.keys().any(|k| k.contains("foo")));
    }

    #[test]
    fn force_bypasses_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def foo():\n    pass\n").unwrap();
        let files = vec![ScannedFile { rel_path: "a.py".into(), abs_path: dir.path().join("a.py"), extension: "py".into() }];

        let cache_dir = dir.path().join(".cache");
        let cache = Mutex::new(Cache::new(&cache_dir, 3600).unwrap());
        index_files(dir.path(), &files, Some(1), Some(&cache), false);

        let (_, stats) = index_files(dir.path(), &files, Some(1), Some(&cache), true);
        assert_eq!(stats.cache_hits, 0);
    }
}
