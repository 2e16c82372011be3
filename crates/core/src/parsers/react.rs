//! React/JSX parser: wraps the JavaScript parser and layers on recognizers
//! for function/class components, hooks, contexts, memo/forwardRef/lazy
//! wrappers, HOCs, and PropTypes/defaultProps assignments. Grounded in
//! `react_parser.py`'s `ReactParser(JavaScriptParser)`.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{
    ClassRecord, CrossCuttingConcern, FunctionRecord, Language, MethodDescriptor, Parameter,
    ParseResult,
};

use super::javascript;

static FUNCTION_COMPONENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:export\s+(?:default\s+)?)?(?:const|let|var|function)\s+([A-Z]\w*)\s*[=:]").unwrap()
});
static CLASS_COMPONENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+([A-Z]\w*)\s+extends\s+(?:React\.)?(?:Component|PureComponent)").unwrap()
});
static HOOK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(use[A-Z]\w*)\s*\(").unwrap());
static CONTEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:const|let|var)\s+(\w+Context)\s*=\s*React\.createContext").unwrap());
static MEMO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"React\.memo\s*\(\s*([A-Z]\w*)").unwrap());
static FORWARD_REF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"React\.forwardRef\s*\(").unwrap());
static LAZY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"React\.lazy\s*\(\s*\(\s*\)\s*=>\s*import\s*\(['"]([^'"]+)['"]"#).unwrap());
static HOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:export\s+(?:default\s+)?)?(?:const|function)\s+(with[A-Z]\w*)\s*\(").unwrap());
static PROP_TYPES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\w+)\.propTypes\s*=").unwrap());
static DEFAULT_PROPS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\w+)\.defaultProps\s*=").unwrap());

pub fn parse(rel_path: &str, text: &str) -> ParseResult {
    let mut result = javascript::parse_as(rel_path, text, Language::React);

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx as u32 + 1;

        if let Some(caps) = CLASS_COMPONENT_RE.captures(line) {
            let name = caps[1].to_string();
            let id = ClassRecord::make_id(rel_path, &name);
            result.classes.entry(id.clone()).or_insert_with(|| ClassRecord {
                id,
                file_path: rel_path.to_string(),
                name,
                language: Language::React,
                line_start: lineno,
                line_end: lineno,
                bases: vec!["Component".to_string()],
                methods: vec![] as Vec<MethodDescriptor>,
                docstring: None,
                decorators: vec!["class_component".to_string()],
            });
        } else if let Some(caps) = FUNCTION_COMPONENT_RE.captures(line) {
            if line_returns_jsx(text, idx) {
                let name = caps[1].to_string();
                let id = FunctionRecord::make_id(rel_path, &name);
                result.functions.entry(id.clone()).or_insert_with(|| FunctionRecord {
                    id,
                    file_path: rel_path.to_string(),
                    name,
                    language: Language::React,
                    line_start: lineno,
                    line_end: lineno,
                    complexity: 1,
                    parameters: vec![] as Vec<Parameter>,
                    calls: vec![],
                    docstring: None,
                    is_exported: line.contains("export"),
                    is_async: false,
                    return_type: None,
                    decorators: vec!["function_component".to_string()],
                    source: line.trim().to_string(),
                });
            }
        }

        if let Some(caps) = HOC_RE.captures(line) {
            let name = caps[1].to_string();
            let id = FunctionRecord::make_id(rel_path, &name);
            if let Some(func) = result.functions.get_mut(&id) {
                func.decorators.push("hoc".to_string());
            } else {
                result.functions.insert(
                    id.clone(),
                    FunctionRecord {
                        id,
                        file_path: rel_path.to_string(),
                        name,
                        language: Language::React,
                        line_start: lineno,
                        line_end: lineno,
                        complexity: 1,
                        parameters: vec![],
                        calls: vec![],
                        docstring: None,
                        is_exported: line.contains("export"),
                        is_async: false,
                        return_type: None,
                        decorators: vec!["hoc".to_string()],
                        source: line.trim().to_string(),
                    },
                );
            }
        }

        for caps in HOOK_RE.captures_iter(line) {
            push_concern(&mut result, rel_path, format!("hook:{}", &caps[1]), lineno);
        }
        if let Some(caps) = CONTEXT_RE.captures(line) {
            let id = ClassRecord::make_id(rel_path, &caps[1]);
            result.classes.entry(id.clone()).or_insert_with(|| ClassRecord {
                id,
                file_path: rel_path.to_string(),
                name: caps[1].to_string(),
                language: Language::React,
                line_start: lineno,
                line_end: lineno,
                bases: vec![],
                methods: vec![],
                docstring: None,
                decorators: vec!["context".to_string()],
            });
        }
        if MEMO_RE.is_match(line) {
            push_concern(&mut result, rel_path, "memo".to_string(), lineno);
        }
        if FORWARD_REF_RE.is_match(line) {
            push_concern(&mut result, rel_path, "forward_ref".to_string(), lineno);
        }
        if LAZY_RE.is_match(line) {
            push_concern(&mut result, rel_path, "lazy".to_string(), lineno);
        }
        if PROP_TYPES_RE.is_match(line) {
            push_concern(&mut result, rel_path, "prop_types".to_string(), lineno);
        }
        if DEFAULT_PROPS_RE.is_match(line) {
            push_concern(&mut result, rel_path, "default_props".to_string(), lineno);
        }
    }

    result
}

fn push_concern(result: &mut ParseResult, rel_path: &str, concern_type: String, line: u32) {
    result
        .cross_cutting_concerns
        .entry(rel_path.to_string())
        .or_default()
        .push(CrossCuttingConcern { concern_type, line });
}

/// Heuristic JSX detection: look a few lines ahead for a `<Tag` or `<tag`
/// opening, which is as close as a line-scanned parser gets to "returns
/// JSX" without a real parse tree.
fn line_returns_jsx(text: &str, start_idx: usize) -> bool {
    static JSX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[A-Za-z]").unwrap());
    text.lines().skip(start_idx).take(5).any(|l| JSX_RE.is_match(l))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_function_component() {
        let source = "const Widget = () => {\n  return <div>hi</div>;\n};\n";
        let result = parse("Widget.jsx", source);
        assert!(result.functions.contains_key("Widget.jsx::Widget"));
    }

    #[test]
    fn detects_class_component() {
        let source = "class Widget extends React.Component {\n  render() {}\n}\n";
        let result = parse("Widget.jsx", source);
        assert!(result.classes.contains_key("Widget.jsx::Widget"));
    }

    #[test]
    fn detects_hook_usage() {
        let source = "function Widget() {\n  const [x, setX] = useState(0);\n  return <div />;\n}\n";
        let result = parse("Widget.jsx", source);
        let concerns = result.cross_cutting_concerns.get("Widget.jsx").unwrap();
        assert!(concerns.iter().any(|c| c.concern_type == "hook:useState"));
    }
}
