//! Compiles `.orcignore` + default patterns into a predicate over paths.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

const FAST_PATH_SEGMENTS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    "target",
    ".next",
    "coverage",
    ".pytest_cache",
    ".mypy_cache",
];

/// A compiled predicate over project-relative paths.
pub struct IgnoreMatcher {
    compiled: Gitignore,
}

impl IgnoreMatcher {
    /// Builds a matcher from `root` plus an explicit pattern list (the
    /// config's `ignore_patterns`, already merged with `.orcignore` content
    /// by the caller).
    pub fn new(root: &Path, patterns: &[String]) -> IgnoreMatcher {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in patterns {
            // A malformed individual pattern must not abort the whole
            // matcher; skip it and keep the rest.
            let _ = builder.add_line(None, pattern);
        }
        let compiled = builder.build().unwrap_or_else(|_| Gitignore::empty());
        IgnoreMatcher { compiled }
    }

    /// Loads patterns from an `.orcignore` file (gitignore syntax: blank
    /// lines and `#` comments ignored, trailing `/` marks a directory
    /// pattern) in addition to `extra_patterns`.
    pub fn from_orcignore_and_patterns(
        root: &Path,
        orcignore_path: &Path,
        extra_patterns: &[String],
    ) -> IgnoreMatcher {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in extra_patterns {
            let _ = builder.add_line(None, pattern);
        }
        if orcignore_path.exists() {
            let _ = builder.add(orcignore_path);
        }
        let compiled = builder.build().unwrap_or_else(|_| Gitignore::empty());
        IgnoreMatcher { compiled }
    }

    /// Fast O(1)-ish substring test against the commonly-ignored segment
    /// set, bypassing full gitignore pattern evaluation.
    pub fn is_commonly_ignored_segment(path: &Path) -> bool {
        path.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|s| FAST_PATH_SEGMENTS.contains(&s))
                .unwrap_or(false)
        })
    }

    pub fn should_ignore(&self, path: &Path, is_dir: bool) -> bool {
        if Self::is_commonly_ignored_segment(path) {
            return true;
        }
        self.compiled.matched(path, is_dir).is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_path_catches_node_modules() {
        assert!(IgnoreMatcher::is_commonly_ignored_segment(Path::new(
            "project/node_modules/pkg/index.js"
        )));
        assert!(!IgnoreMatcher::is_commonly_ignored_segment(Path::new(
            "project/src/index.js"
        )));
    }

    #[test]
    fn glob_pattern_matches_extension() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = IgnoreMatcher::new(dir.path(), &["*.pyc".to_string()]);
        assert!(matcher.should_ignore(&dir.path().join("module.pyc"), false));
        assert!(!matcher.should_ignore(&dir.path().join("module.py"), false));
    }

    #[test]
    fn trailing_slash_matches_directory() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = IgnoreMatcher::new(dir.path(), &["vendor/".to_string()]);
        assert!(matcher.should_ignore(&dir.path().join("vendor"), true));
    }
}
