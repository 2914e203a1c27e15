//! Turns a keyword-extraction LLM response into a keyword list.
//!
//! The prompt asks for `{"keywords": [...]}`; anything else is read line by line.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::llm_client::strip_json_fences;

lazy_static! {
    static ref LIST_MARKER: Regex =
        Regex::new(r"^(?:[-•*]\s*|\d+[.)]\s*)+").expect("list marker regex is valid");
}

/// Lines that are JSON scaffolding rather than keywords.
const STRUCTURAL_LINES: &[&str] = &["{", "}", "[", "]", "],", "\"keywords\": [", "```", "```json"];

#[derive(Debug, Deserialize)]
struct KeywordList {
    keywords: Vec<String>,
}

pub fn parse_keywords(response: &str) -> Vec<String> {
    let body = strip_json_fences(response);
    if body.starts_with('{') {
        match serde_json::from_str::<KeywordList>(body) {
            Ok(list) => {
                return list
                    .keywords
                    .into_iter()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            }
            Err(e) => debug!("Keyword JSON parsing failed, falling back to line parsing: {e}"),
        }
    }

    response.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || STRUCTURAL_LINES.contains(&line) || line.starts_with("\"keywords\"") {
        return None;
    }

    let line = LIST_MARKER.replace(line, "");
    let keyword = line
        .trim()
        .trim_end_matches(',')
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();

    (keyword.chars().count() > 1).then(|| keyword.to_string())
}

/// Case-insensitive de-duplication keeping the first spelling, capped at `limit`.
pub fn dedupe(keywords: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keywords
        .into_iter()
        .filter(|k| seen.insert(k.to_lowercase()))
        .take(limit)
        .collect()
}
