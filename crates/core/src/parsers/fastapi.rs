//! FastAPI framework annotator. The original `fastapi_parser.py` only tags
//! `framework = 'fastapi'`; SPEC_FULL §4.5 asks for route-decorator
//! detection too, so this also recognizes `@app.get/post/put/delete/patch`
//! (and `@router.*`) as `ApiEndpoint` overlays.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{ApiEndpoint, ParseResult};

static ROUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@(?:app|router)\.(get|post|put|delete|patch)\s*\(\s*['"]([^'"]+)['"]"#).unwrap()
});
static FASTAPI_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"from\s+fastapi|import\s+fastapi").unwrap());

/// Returns `true` (and annotates `result`) iff `text` imports FastAPI.
pub fn annotate(rel_path: &str, text: &str, result: &mut ParseResult) -> bool {
    if !FASTAPI_MARKER_RE.is_match(text) {
        return false;
    }

    if let Some(file) = result.files.get_mut(rel_path) {
        file.framework = Some("fastapi".to_string());
    }

    let lines: Vec<&str> = text.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = ROUTE_RE.captures(line) {
            let handler = lines
                .get(idx + 1..)
                .and_then(|rest| rest.iter().find(|l| l.contains("def ")))
                .and_then(|l| l.split("def ").nth(1))
                .and_then(|l| l.split('(').next())
                .map(str::trim)
                .unwrap_or("")
                .to_string();
            result.api_endpoints.entry(rel_path.to_string()).or_default().push(ApiEndpoint {
                route: caps[2].to_string(),
                method: caps[1].to_uppercase(),
                handler,
                line: idx as u32 + 1,
            });
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::python;

    #[test]
    fn detects_route_decorator() {
        let source = "from fastapi import FastAPI\napp = FastAPI()\n\n@app.get(\"/users\")\ndef list_users():\n    return []\n";
        let mut result = python::parse("main.py", source);
        assert!(annotate("main.py", source, &mut result));
        let endpoints = &result.api_endpoints["main.py"];
        assert_eq!(endpoints[0].route, "/users");
        assert_eq!(endpoints[0].method, "GET");
        assert_eq!(endpoints[0].handler, "list_users");
    }
}
