//! Response Parsers (spec §4.4)
//!
//! Strategy-dispatched extraction over a closed enum of parser kinds. Every
//! parser returns an ordered list of strings; a missing/unmatched input
//! yields an empty list rather than an error.

use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;

/// Closed set of response-extraction strategies.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum Parser {
    Json { path: String },
    Css { selector: String },
    Regex { pattern: String, group: usize },
    Lr { left: String, right: String },
}

impl Parser {
    pub fn extract(&self, input: &str) -> Vec<String> {
        match self {
            Parser::Json { path } => extract_json(input, path),
            Parser::Css { selector } => extract_css(input, selector),
            Parser::Regex { pattern, group } => extract_regex(input, pattern, *group),
            Parser::Lr { left, right } => extract_lr(input, left, right),
        }
    }
}

fn extract_json(input: &str, path: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(input) else {
        return Vec::new();
    };

    let mut current = &value;
    for segment in path.split('.') {
        current = match segment.parse::<usize>() {
            Ok(idx) => match current.get(idx) {
                Some(v) => v,
                None => return Vec::new(),
            },
            Err(_) => match current.get(segment) {
                Some(v) => v,
                None => return Vec::new(),
            },
        };
    }

    match current {
        serde_json::Value::String(s) => vec![s.clone()],
        serde_json::Value::Array(arr) => arr.iter().map(value_to_string).collect(),
        serde_json::Value::Null => Vec::new(),
        other => vec![value_to_string(other)],
    }
}

fn value_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn extract_css(input: &str, selector: &str) -> Vec<String> {
    let (css_selector, attr) = match selector.split_once('@') {
        Some((sel, attr)) => (sel, Some(attr)),
        None => (selector, None),
    };

    let Ok(sel) = Selector::parse(css_selector) else {
        return Vec::new();
    };

    let document = Html::parse_document(input);
    document
        .select(&sel)
        .map(|el| match attr {
            Some(attr) => el.value().attr(attr).unwrap_or_default().to_string(),
            None => el.text().collect::<Vec<_>>().join(""),
        })
        .collect()
}

fn extract_regex(input: &str, pattern: &str, group: usize) -> Vec<String> {
    let Ok(re) = Regex::new(pattern) else {
        return Vec::new();
    };
    re.captures_iter(input)
        .filter_map(|caps| caps.get(group))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn extract_lr(input: &str, left: &str, right: &str) -> Vec<String> {
    if left.is_empty() || right.is_empty() {
        return Vec::new();
    }

    let mut results = Vec::new();
    let mut cursor = 0usize;

    while let Some(left_rel) = input[cursor..].find(left) {
        let content_start = cursor + left_rel + left.len();
        match input[content_start..].find(right) {
            Some(right_rel) => {
                let content_end = content_start + right_rel;
                results.push(input[content_start..content_end].to_string());
                cursor = content_end + right.len();
            }
            None => break,
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_dotted_path() {
        let input = r#"{"a":{"b":[{"c":"found"}]}}"#;
        let result = Parser::Json {
            path: "a.b.0.c".to_string(),
        }
        .extract(input);
        assert_eq!(result, vec!["found".to_string()]);
    }

    #[test]
    fn json_missing_path_is_empty() {
        let input = r#"{"a":1}"#;
        let result = Parser::Json {
            path: "a.b.c".to_string(),
        }
        .extract(input);
        assert!(result.is_empty());
    }

    #[test]
    fn css_text_extraction() {
        let input = "<div><span class='token'>abc123</span></div>";
        let result = Parser::Css {
            selector: "span.token".to_string(),
        }
        .extract(input);
        assert_eq!(result, vec!["abc123".to_string()]);
    }

    #[test]
    fn css_attribute_extraction() {
        let input = "<input name='csrf' value='xyz'/>";
        let result = Parser::Css {
            selector: "input@value".to_string(),
        }
        .extract(input);
        assert_eq!(result, vec!["xyz".to_string()]);
    }

    #[test]
    fn lr_non_overlapping_substrings() {
        let input = "[a][b][c]";
        let result = Parser::Lr {
            left: "[".to_string(),
            right: "]".to_string(),
        }
        .extract(input);
        assert_eq!(result, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn regex_all_matches() {
        let input = "id=1 id=2 id=3";
        let result = Parser::Regex {
            pattern: r"id=(\d+)".to_string(),
            group: 1,
        }
        .extract(input);
        assert_eq!(result, vec!["1".to_string(), "2".to_string(), "3".to_string()]);
    }
}
