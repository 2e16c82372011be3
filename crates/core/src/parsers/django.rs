//! Django framework annotator: runs after the Python parser and layers
//! `DataModel`/`ApiEndpoint` overlays on top of its `ParseResult`. Grounded
//! in `django_parser.py`'s `DjangoParser(PythonParser)`.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{ApiEndpoint, DataModel, ParseResult};

static MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+(\w+)\s*\(\s*(?:models\.Model|Model)").unwrap());
static VIEW_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+(\w+)\s*\(\s*(?:[\w.]*View|APIView|GenericAPIView)").unwrap());
static URL_PATTERN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:path|re_path|url)\s*\(\s*['"]([^'"]+)['"]"#).unwrap());
static FORM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+(\w+)\s*\(\s*(?:forms\.(?:Model)?Form|Form)").unwrap());
static ADMIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"admin\.site\.register\s*\(\s*(\w+)").unwrap());
static SERIALIZER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+(\w+)\s*\(\s*(?:serializers\.\w+|ModelSerializer)").unwrap());
static SIGNAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@receiver\s*\(\s*(\w+)").unwrap());
static DJANGO_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"from\s+django|import\s+django|models\.Model|@receiver").unwrap());

/// Returns `true` (and annotates `result`) iff `text` looks like Django code.
/// The orchestrator's parser dispatch (`parsers::parse_file`) tries the
/// FastAPI annotator only when this one declines, mirroring the original's
/// framework-detection-by-import-signature approach.
pub fn annotate(rel_path: &str, text: &str, result: &mut ParseResult) -> bool {
    if !DJANGO_MARKER_RE.is_match(text) {
        return false;
    }

    if let Some(file) = result.files.get_mut(rel_path) {
        file.framework = Some("django".to_string());
    }

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx as u32 + 1;

        if let Some(caps) = MODEL_RE.captures(line) {
            result.data_models.entry(rel_path.to_string()).or_default().push(DataModel {
                name: caps[1].to_string(),
                kind: "django_model".to_string(),
                line: lineno,
            });
        }
        if let Some(caps) = FORM_RE.captures(line) {
            result.data_models.entry(rel_path.to_string()).or_default().push(DataModel {
                name: caps[1].to_string(),
                kind: "django_form".to_string(),
                line: lineno,
            });
        }
        if let Some(caps) = SERIALIZER_RE.captures(line) {
            result.data_models.entry(rel_path.to_string()).or_default().push(DataModel {
                name: caps[1].to_string(),
                kind: "django_serializer".to_string(),
                line: lineno,
            });
        }
        if let Some(caps) = VIEW_CLASS_RE.captures(line) {
            result.api_endpoints.entry(rel_path.to_string()).or_default().push(ApiEndpoint {
                route: String::new(),
                method: "CLASS_BASED_VIEW".to_string(),
                handler: caps[1].to_string(),
                line: lineno,
            });
        }
        if let Some(caps) = URL_PATTERN_RE.captures(line) {
            result.api_endpoints.entry(rel_path.to_string()).or_default().push(ApiEndpoint {
                route: caps[1].to_string(),
                method: "URL_PATTERN".to_string(),
                handler: String::new(),
                line: lineno,
            });
        }
        if let Some(caps) = ADMIN_RE.captures(line) {
            result
                .cross_cutting_concerns
                .entry(rel_path.to_string())
                .or_default()
                .push(crate::model::CrossCuttingConcern {
                    concern_type: format!("admin_registration:{}", &caps[1]),
                    line: lineno,
                });
        }
        if let Some(caps) = SIGNAL_RE.captures(line) {
            result
                .cross_cutting_concerns
                .entry(rel_path.to_string())
                .or_default()
                .push(crate::model::CrossCuttingConcern {
                    concern_type: format!("signal:{}", &caps[1]),
                    line: lineno,
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
    fn detects_model_and_tags_framework() {
        let source = "from django.db import models\n\nclass User(models.Model):\n    name = models.CharField()\n";
        let mut result = python::parse("models.py", source);
        let matched = annotate("models.py", source, &mut result);
        assert!(matched);
        assert_eq!(result.files["models.py"].framework.as_deref(), Some("django"));
        assert_eq!(result.data_models["models.py"][0].name, "User");
    }

    #[test]
    fn non_django_file_is_declined() {
        let source = "def add(a, b):\n    return a + b\n";
        let mut result = python::parse("m.py", source);
        assert!(!annotate("m.py", source, &mut result));
    }
}
