//! Language parsers: each implements `parse(path) -> ParseResult`.
//!
//! All parsers are pure functions of file bytes — no shared state, no I/O
//! beyond reading the one file they're given.

pub mod django;
pub mod fastapi;
pub mod javascript;
pub mod python;
pub mod react;
pub mod structured;
pub mod tailwind;
pub mod typescript;

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};

use crate::model::{Language, ParseResult};

/// Reads `path`, computes its content hash and mtime, and dispatches to the
/// parser registered for its extension. Returns a minimal error-marked
/// `ParseResult` rather than propagating on any failure, per the
/// orchestrator's worker-failure contract (§4.6).
pub fn parse_file(path: &Path, rel_path: &str) -> ParseResult {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            return ParseResult::minimal_for_error(rel_path, Language::Unknown, e.to_string());
        }
    };
    let text = String::from_utf8_lossy(&bytes).into_owned();

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let language = Language::from_extension(&ext);

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let content_hash = format!("{:x}", hasher.finalize());

    let last_modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    let mut result = match language {
        Language::Python => python::parse(rel_path, &text),
        Language::Javascript => javascript::parse(rel_path, &text),
        Language::Typescript => typescript::parse(rel_path, &text),
        Language::React => react::parse(rel_path, &text),
        Language::Json => structured::parse_json(rel_path, &text),
        Language::Yaml => structured::parse_yaml(rel_path, &text),
        Language::Markdown => structured::parse_markdown(rel_path, &text),
        Language::Html | Language::Css => structured::parse_css_or_html(rel_path, &text, language),
        Language::Unknown => ParseResult::minimal_for_error(rel_path, Language::Unknown, "unsupported extension"),
    };

    if let Some(file) = result.files.get_mut(rel_path) {
        file.content_hash = content_hash;
        file.last_modified = last_modified;
    }

    if language == Language::Python {
        let matched_django = django::annotate(rel_path, &text, &mut result);
        if !matched_django {
            fastapi::annotate(rel_path, &text, &mut result);
        }
    }
    if matches!(language, Language::Css | Language::React) {
        tailwind::annotate(rel_path, &text, &mut result);
    }

    crate::analysis::security::annotate(&mut result, rel_path, &text);

    result
}

pub(crate) fn loc(text: &str) -> u64 {
    text.lines().count() as u64
}
