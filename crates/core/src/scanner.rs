//! Parallel directory walk producing the ordered list of files to parse.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ignore::WalkBuilder;

use crate::error::{OrcError, OrcResult};
use crate::ignore_matcher::IgnoreMatcher;

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub extension: String,
}

/// Walks `root`, dropping ignored directories entirely (no descent) and
/// including files whose extension is in `extensions` and which are not
/// themselves ignored.
///
/// Fails only if `root` itself cannot be opened; permission errors on
/// subtrees are logged and skipped.
pub fn scan_files(
    root: &Path,
    extensions: &std::collections::HashSet<String>,
    matcher: &IgnoreMatcher,
) -> OrcResult<Vec<ScannedFile>> {
    if !root.is_dir() {
        return Err(OrcError::scan(root, "project root is not a readable directory"));
    }

    let results: Mutex<Vec<ScannedFile>> = Mutex::new(Vec::new());
    let threads = rayon::current_num_threads().min(12);

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .threads(threads)
        .build_parallel();

    walker.run(|| {
        let root = root.to_path_buf();
        let results = &results;
        Box::new(move |entry| {
            let Ok(entry) = entry else { return ignore::WalkState::Continue };
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);

            let rel = path.strip_prefix(&root).unwrap_or(path);
            if rel.as_os_str().is_empty() {
                return ignore::WalkState::Continue;
            }

            if matcher.should_ignore(rel, is_dir) {
                return if is_dir { ignore::WalkState::Skip } else { ignore::WalkState::Continue };
            }

            if is_dir {
                return ignore::WalkState::Continue;
            }

            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                return ignore::WalkState::Continue;
            };
            let dotted = format!(".{ext}");
            if !extensions.contains(&dotted) {
                return ignore::WalkState::Continue;
            }

            let rel_path = rel.to_string_lossy().replace('\\', "/");
            results.lock().unwrap().push(ScannedFile {
                rel_path,
                abs_path: path.to_path_buf(),
                extension: ext.to_lowercase(),
            });

            ignore::WalkState::Continue
        })
    });

    let mut files = results.into_inner().unwrap();
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    tracing::info!(count = files.len(), root = %root.display(), "scan complete");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn ext_set(exts: &[&str]) -> std::collections::HashSet<String> {
        exts.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn scans_matching_extensions_and_skips_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(dir.path().join("main.py"), "x").unwrap();
        fs::write(dir.path().join("readme.txt"), "x").unwrap();

        let matcher = IgnoreMatcher::new(dir.path(), &[]);
        let files = scan_files(dir.path(), &ext_set(&[".py", ".js"]), &matcher).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, "main.py");
    }

    #[test]
    fn fails_on_unreadable_root() {
        let matcher = IgnoreMatcher::new(Path::new("/"), &[]);
        let result = scan_files(Path::new("/does/not/exist"), &ext_set(&[".py"]), &matcher);
        assert!(result.is_err());
    }
}
