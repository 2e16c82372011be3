//! Tailwind annotator: tags `.css`/`.jsx`/`.tsx` files that use Tailwind's
//! utility-class conventions. Grounded in `tailwind_parser.py`'s
//! `TAILWIND_RE` heuristic detector.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::ParseResult;

static TAILWIND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:bg|text|p|m|w|h|flex|grid|items|justify|gap)-[\w:-]+\b").unwrap());

/// Returns `true` (and tags `result`'s file record) iff `text` contains
/// recognizable Tailwind utility classes.
pub fn annotate(rel_path: &str, text: &str, result: &mut ParseResult) -> bool {
    if TAILWIND_RE.find_iter(text).count() < 3 {
        return false;
    }
    if let Some(file) = result.files.get_mut(rel_path) {
        if file.framework.is_none() {
            file.framework = Some("tailwind".to_string());
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileRecord, Language};
    use std::collections::BTreeMap;

    #[test]
    fn tags_file_with_several_utility_classes() {
        let mut result = ParseResult::default();
        result.files.insert(
            "app.css".to_string(),
            FileRecord {
                path: "app.css".to_string(),
                language: Language::Css,
                loc: 1,
                framework: None,
                content_hash: String::new(),
                last_modified: 0.0,
                metadata: BTreeMap::new(),
            },
        );
        let source = "<div class=\"bg-blue-500 text-white p-4 flex items-center\">";
        assert!(annotate("app.css", source, &mut result));
        assert_eq!(result.files["app.css"].framework.as_deref(), Some("tailwind"));
    }
}
