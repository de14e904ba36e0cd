//! Static dependency extraction from tool source files.
//!
//! Tools declare third-party packages in a `dependencies` variable (a list
//! or tuple literal, optionally type-annotated, at module or class level).
//! Extraction is purely textual: locate the assignment, read the literal
//! with a small safe evaluator, fall back to a balanced-delimiter splitter
//! when the literal is malformed, then normalize every candidate into a
//! pip-installable name.

use std::path::Path;

use anyhow::{Context, Result};

/// Fixed import-name → pip-name alias table. Unknown names pass through.
const PACKAGE_ALIASES: &[(&str, &str)] = &[
    ("cv2", "opencv-python"),
    ("PIL", "Pillow"),
    ("sklearn", "scikit-learn"),
    ("yaml", "PyYAML"),
    ("dotenv", "python-dotenv"),
];

/// Extract the deduplicated, sorted dependency set from a tool source file.
/// A file with no `dependencies` variable yields an empty set.
pub fn extract_from_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Read tool source {}", path.display()))?;
    Ok(extract_from_source(&content))
}

/// Extract dependencies from source text.
pub fn extract_from_source(content: &str) -> Vec<String> {
    let raw = match find_dependencies_literal(content) {
        Some(raw) => raw,
        None => {
            tracing::debug!("No dependencies variable found in source");
            return Vec::new();
        }
    };

    let candidates = match parse_literal(&raw) {
        Some(literal) => flatten_candidates(&literal),
        None => {
            tracing::debug!("Literal evaluation refused, using balanced splitter");
            split_balanced(&raw)
        }
    };

    let mut packages: Vec<String> = candidates
        .iter()
        .filter_map(|candidate| clean_package_name(candidate))
        .collect();
    packages.sort();
    packages.dedup();
    packages
}

/// Locate the right-hand side of the `dependencies` assignment.
/// Accepted shapes: list literal, annotated assignment with a list RHS,
/// tuple literal.
fn find_dependencies_literal(content: &str) -> Option<String> {
    let patterns = [
        r"(?s)dependencies\s*=\s*(\[.*?\])",
        r"(?s)dependencies\s*:\s*List.*?=\s*(\[.*?\])",
        r"(?s)dependencies\s*=\s*(\(.*?\))",
    ];

    for pattern in patterns {
        let re = regex::Regex::new(pattern).unwrap_or_else(|_| unreachable!());
        if let Some(caps) = re.captures(content) {
            return caps.get(1).map(|m| m.as_str().trim().to_string());
        }
    }
    None
}

// ─── Safe literal evaluator ──────────────────────────────────────────────────

/// A parsed Python literal, restricted to the shapes dependency declarations
/// actually use: strings and (possibly nested) sequences of strings.
enum PyLiteral {
    Str(String),
    Seq(Vec<PyLiteral>),
}

/// Safe literal evaluator. Returns None for anything it does not recognize,
/// which sends the caller to the balanced-splitter fallback.
fn parse_literal(input: &str) -> Option<PyLiteral> {
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0usize;
    let literal = parse_value(&chars, &mut pos)?;
    skip_whitespace(&chars, &mut pos);
    if pos == chars.len() {
        Some(literal)
    } else {
        None
    }
}

fn skip_whitespace(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}

fn parse_value(chars: &[char], pos: &mut usize) -> Option<PyLiteral> {
    skip_whitespace(chars, pos);
    match chars.get(*pos)? {
        '[' => parse_seq(chars, pos, '[', ']'),
        '(' => parse_seq(chars, pos, '(', ')'),
        '\'' | '"' => parse_string(chars, pos),
        _ => None,
    }
}

fn parse_seq(chars: &[char], pos: &mut usize, open: char, close: char) -> Option<PyLiteral> {
    if chars.get(*pos) != Some(&open) {
        return None;
    }
    *pos += 1;
    let mut items = Vec::new();
    loop {
        skip_whitespace(chars, pos);
        match chars.get(*pos) {
            Some(c) if *c == close => {
                *pos += 1;
                return Some(PyLiteral::Seq(items));
            }
            Some(_) => {
                items.push(parse_value(chars, pos)?);
                skip_whitespace(chars, pos);
                match chars.get(*pos) {
                    Some(',') => {
                        *pos += 1;
                    }
                    Some(c) if *c == close => {}
                    _ => return None,
                }
            }
            None => return None,
        }
    }
}

fn parse_string(chars: &[char], pos: &mut usize) -> Option<PyLiteral> {
    let quote = *chars.get(*pos)?;
    *pos += 1;
    let mut out = String::new();
    while let Some(&c) = chars.get(*pos) {
        *pos += 1;
        if c == '\\' {
            if let Some(&escaped) = chars.get(*pos) {
                *pos += 1;
                out.push(escaped);
            }
        } else if c == quote {
            return Some(PyLiteral::Str(out));
        } else {
            out.push(c);
        }
    }
    None
}

/// Flatten a parsed literal into raw candidates: a string is one candidate,
/// a pair-shaped sequence contributes every string child.
fn flatten_candidates(literal: &PyLiteral) -> Vec<String> {
    let mut out = Vec::new();
    match literal {
        PyLiteral::Str(s) => out.push(s.clone()),
        PyLiteral::Seq(items) => {
            for item in items {
                match item {
                    PyLiteral::Str(s) => out.push(s.clone()),
                    PyLiteral::Seq(children) => {
                        for child in children {
                            if let PyLiteral::Str(s) = child {
                                out.push(s.clone());
                            }
                        }
                    }
                }
            }
        }
    }
    out
}

// ─── Balanced-delimiter fallback ─────────────────────────────────────────────

/// Fallback splitter: strips outer delimiters and splits on top-level commas,
/// tracking parentheses, brackets, and quoted strings.
fn split_balanced(raw: &str) -> Vec<String> {
    let trimmed = raw
        .trim()
        .trim_matches(|c| matches!(c, '[' | ']' | '(' | ')'))
        .trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut paren_depth = 0i32;
    let mut bracket_depth = 0i32;
    let mut quote: Option<char> = None;

    for c in trimmed.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    paren_depth += 1;
                    current.push(c);
                }
                ')' => {
                    paren_depth -= 1;
                    current.push(c);
                }
                '[' => {
                    bracket_depth += 1;
                    current.push(c);
                }
                ']' => {
                    bracket_depth -= 1;
                    current.push(c);
                }
                ',' if paren_depth == 0 && bracket_depth == 0 => {
                    let item = current.trim();
                    if !item.is_empty() {
                        items.push(item.to_string());
                    }
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    let item = current.trim();
    if !item.is_empty() {
        items.push(item.to_string());
    }
    items
}

// ─── Candidate cleaning ──────────────────────────────────────────────────────

/// Normalize one candidate: strip quotes and whitespace, drop any version
/// specifier, apply the alias table, and reject malformed names.
fn clean_package_name(raw: &str) -> Option<String> {
    let mut package = raw
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .trim()
        .to_string();
    if package.is_empty() {
        return None;
    }

    if let Some(pos) = package.find(|c| matches!(c, '<' | '>' | '=' | '!')) {
        package.truncate(pos);
        package = package.trim().to_string();
    }

    for (alias, canonical) in PACKAGE_ALIASES {
        if package == *alias {
            package = canonical.to_string();
            break;
        }
    }

    let mut chars = package.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphanumeric())
        .unwrap_or(false);
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if head_ok && tail_ok {
        Some(package)
    } else {
        tracing::warn!(candidate = %raw, "Dropping invalid package name");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_list_literal() {
        let src = r#"
class WeatherTool(BaseTool):
    dependencies = ["requests", "pandas"]
"#;
        assert_eq!(extract_from_source(src), vec!["pandas", "requests"]);
    }

    #[test]
    fn pair_tuples_take_every_string_child() {
        let src = r#"dependencies = [("requests", "requests"), ("bs4", "beautifulsoup4")]"#;
        assert_eq!(
            extract_from_source(src),
            vec!["beautifulsoup4", "bs4", "requests"]
        );
    }

    #[test]
    fn annotated_assignment() {
        let src = r#"dependencies: List[str] = ["httpx"]"#;
        assert_eq!(extract_from_source(src), vec!["httpx"]);
    }

    #[test]
    fn tuple_literal() {
        let src = r#"dependencies = ("numpy", "scipy")"#;
        assert_eq!(extract_from_source(src), vec!["numpy", "scipy"]);
    }

    #[test]
    fn version_specifiers_are_stripped() {
        let src = r#"dependencies = ["requests>=2.28", "pandas==2.0.1", "numpy!=1.24"]"#;
        assert_eq!(extract_from_source(src), vec!["numpy", "pandas", "requests"]);
    }

    #[test]
    fn alias_table_applies_exactly_once() {
        let src = r#"dependencies = ["cv2", "PIL", "sklearn", "yaml", "dotenv"]"#;
        let deps = extract_from_source(src);
        assert_eq!(
            deps,
            vec![
                "Pillow",
                "PyYAML",
                "opencv-python",
                "python-dotenv",
                "scikit-learn"
            ]
        );
        assert!(!deps.contains(&"cv2".to_string()));
    }

    #[test]
    fn duplicates_and_empties_are_dropped() {
        let src = r#"dependencies = ["requests", "requests", "", "  "]"#;
        assert_eq!(extract_from_source(src), vec!["requests"]);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let src = r#"dependencies = ["good-pkg", "-leading-dash", "has space", "git+https://x"]"#;
        assert_eq!(extract_from_source(src), vec!["good-pkg"]);
    }

    #[test]
    fn no_dependencies_variable_yields_empty_set() {
        assert!(extract_from_source("class Tool:\n    pass\n").is_empty());
    }

    #[test]
    fn empty_list_yields_empty_set() {
        assert!(extract_from_source("dependencies = []").is_empty());
    }

    #[test]
    fn malformed_literal_falls_back_to_splitter() {
        // A trailing comment inside the literal defeats the safe evaluator.
        let src = "dependencies = [\"requests\", unquoted]";
        assert_eq!(extract_from_source(src), vec!["requests", "unquoted"]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let src = r#"dependencies = [("cv2", "opencv-python"), "requests>=2"]"#;
        let first = extract_from_source(src);
        let second = extract_from_source(src);
        assert_eq!(first, second);
        assert_eq!(first, vec!["opencv-python", "requests"]);
    }

    #[test]
    fn extract_from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Tool.py");
        std::fs::write(&path, r#"dependencies = ["requests"]"#).unwrap();
        assert_eq!(extract_from_file(&path).unwrap(), vec!["requests"]);
        assert!(extract_from_file(&dir.path().join("missing.py")).is_err());
    }
}
