//! Codebase map: a directory-depth rollup of file/function/class counts.
//! Generalizes the teacher's `get_category_path`/`build_tree` pair
//! (`server/src/scan.rs`) from "category" breadcrumb strings keyed by a
//! noise-dir filtered path prefix to a configurable directory-depth
//! truncation over the store's own file/function/class rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ParseResult;

pub const DEFAULT_DEPTH: usize = 2;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderStats {
    pub files: u64,
    pub loc: u64,
    pub functions: u64,
    pub classes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderNode {
    pub stats: FolderStats,
    pub subdirs: BTreeMap<String, FolderNode>,
}

/// Truncates `path`'s directory portion (i.e. drops the file name) to at
/// most `depth` leading segments. A file directly under the root maps to
/// the empty segment list — rolled up under the synthetic `"."` folder.
fn truncated_dir(path: &str, depth: usize) -> Vec<String> {
    let mut parts: Vec<&str> = path.split('/').collect();
    if !parts.is_empty() {
        parts.pop();
    }
    parts.into_iter().take(depth).map(str::to_string).collect()
}

fn node_at<'a>(root: &'a mut FolderNode, segments: &[String]) -> &'a mut FolderNode {
    let mut node = root;
    for segment in segments {
        node = node.subdirs.entry(segment.clone()).or_default();
    }
    node
}

/// Rolls `result`'s files up to `depth` directory levels, attributing each
/// function/class to the folder of its own file. Ignored paths never reach
/// this function in the first place (the scanner never emits them), so no
/// separate exclusion pass is needed here.
pub fn build(result: &ParseResult, depth: usize) -> FolderNode {
    let depth = depth.max(1);
    let mut root = FolderNode::default();

    let mut function_counts: BTreeMap<&str, u64> = BTreeMap::new();
    for func in result.functions.values() {
        *function_counts.entry(func.file_path.as_str()).or_default() += 1;
    }
    let mut class_counts: BTreeMap<&str, u64> = BTreeMap::new();
    for class in result.classes.values() {
        *class_counts.entry(class.file_path.as_str()).or_default() += 1;
    }

    for (path, file) in &result.files {
        let segments = truncated_dir(path, depth);
        let node = node_at(&mut root, &segments);
        node.stats.files += 1;
        node.stats.loc += file.loc;
        node.stats.functions += function_counts.get(path.as_str()).copied().unwrap_or(0);
        node.stats.classes += class_counts.get(path.as_str()).copied().unwrap_or(0);
    }

    roll_up_totals(&mut root);
    root
}

/// Propagates each subdirectory's stats into its ancestors so a parent
/// folder's `stats` reflects its whole subtree, not just files directly
/// placed at that depth.
fn roll_up_totals(node: &mut FolderNode) {
    for child in node.subdirs.values_mut() {
        roll_up_totals(child);
        node.stats.files += child.stats.files;
        node.stats.loc += child.stats.loc;
        node.stats.functions += child.stats.functions;
        node.stats.classes += child.stats.classes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileRecord, FunctionRecord, Language, Parameter};
    use std::collections::BTreeMap as Map;

    fn file(path: &str, loc: u64) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            language: Language::Python,
            loc,
            framework: None,
            content_hash: String::new(),
            last_modified: 0.0,
            metadata: Map::new(),
        }
    }

    fn func(file_path: &str, name: &str) -> FunctionRecord {
        FunctionRecord {
            id: format!("{file_path}::{name}"),
            file_path: file_path.to_string(),
            name: name.to_string(),
            language: Language::Python,
            line_start: 1,
            line_end: 2,
            complexity: 1,
            parameters: vec![] as Vec<Parameter>,
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
    fn rolls_up_files_and_functions_by_directory_depth() {
        let mut result = ParseResult::default();
        result.files.insert("src/api/routes.py".into(), file("src/api/routes.py", 50));
        result.files.insert("src/api/handlers.py".into(), file("src/api/handlers.py", 30));
        result.functions.insert("src/api/routes.py::get".into(), func("src/api/routes.py", "get"));

        let map = build(&result, 2);
        let src = &map.subdirs["src"];
        let api = &src.subdirs["api"];
        assert_eq!(api.stats.files, 2);
        assert_eq!(api.stats.loc, 80);
        assert_eq!(api.stats.functions, 1);
        assert_eq!(src.stats.files, 2);
    }

    #[test]
    fn root_level_file_is_not_lost() {
        let mut result = ParseResult::default();
        result.files.insert("main.py".into(), file("main.py", 10));
        let map = build(&result, 2);
        assert_eq!(map.stats.files, 1);
        assert!(map.subdirs.is_empty());
    }
}
