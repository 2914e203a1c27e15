//! Keyword coverage: splits job keywords into those present in and missing from a resume.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::warn;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]+>").expect("html tag regex is valid");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace regex is valid");
}

#[derive(Debug, Clone, Copy)]
pub struct CoverageSettings {
    pub case_sensitive: bool,
    pub plural_matching: bool,
}

impl Default for CoverageSettings {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            plural_matching: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeywordCoverage {
    pub total_keywords: usize,
    pub covered_count: usize,
    /// Whole percent, 0-100.
    pub coverage_percentage: u32,
    pub covered_keywords: Vec<String>,
    pub missed_keywords: Vec<String>,
}

/// Plain text from resume HTML: tags dropped, common entities decoded,
/// whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

pub fn analyze(resume: &str, keywords: &[String], settings: CoverageSettings) -> KeywordCoverage {
    let text = strip_html(resume);
    let keywords: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();

    if text.is_empty() || keywords.is_empty() {
        return KeywordCoverage::default();
    }

    let mut covered = Vec::new();
    let mut missed = Vec::new();

    for keyword in &keywords {
        if contains_keyword(&text, keyword, settings) {
            covered.push(keyword.to_string());
        } else {
            missed.push(keyword.to_string());
        }
    }

    let total = keywords.len();
    let percentage = (covered.len() as f64 * 100.0 / total as f64).round() as u32;

    KeywordCoverage {
        total_keywords: total,
        covered_count: covered.len(),
        coverage_percentage: percentage,
        covered_keywords: covered,
        missed_keywords: missed,
    }
}

fn contains_keyword(text: &str, keyword: &str, settings: CoverageSettings) -> bool {
    if whole_word_match(text, keyword, settings.case_sensitive) {
        return true;
    }
    if !settings.plural_matching {
        return false;
    }

    let lower = keyword.to_lowercase();
    let variant = if lower.ends_with('s') && keyword.chars().count() > 1 {
        let mut chars = keyword.chars();
        chars.next_back();
        chars.as_str().to_string()
    } else {
        format!("{keyword}s")
    };
    whole_word_match(text, &variant, settings.case_sensitive)
}

/// Keyword bounded by non-word characters or the ends of the text. Works for
/// keywords that start or end in symbols, like `C++` or `.NET`.
fn whole_word_match(text: &str, keyword: &str, case_sensitive: bool) -> bool {
    let pattern = format!(r"(?:^|[^\w]){}(?:[^\w]|$)", regex::escape(keyword));
    match RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()
    {
        Ok(re) => re.is_match(text),
        Err(e) => {
            warn!("Keyword pattern for '{keyword}' failed to compile: {e}");
            false
        }
    }
}
