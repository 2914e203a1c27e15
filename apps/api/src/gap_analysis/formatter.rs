//! HTML Formatter: renders parsed sections into the output HTML fragments.

use tracing::warn;

use super::models::{FormattedGapAnalysis, GapField, ParsedGapAnalysis};
use super::parser::{ASSESSMENT_EMPTY_PLACEHOLDER, ASSESSMENT_MISSING_PLACEHOLDER};

pub const CORE_STRENGTHS_FALLBACK: &str =
    "<ol><li>Unable to analyze core strengths. Please try again.</li></ol>";
pub const KEY_GAPS_FALLBACK: &str = "<ol><li>Unable to analyze key gaps. Please try again.</li></ol>";
pub const QUICK_IMPROVEMENTS_FALLBACK: &str =
    "<ol><li>Unable to analyze quick improvements. Please try again.</li></ol>";
pub const ASSESSMENT_FALLBACK: &str = "<p>Unable to generate a comprehensive assessment. \
     Please review the individual sections above for detailed analysis.</p>";

pub fn format(parsed: &ParsedGapAnalysis) -> FormattedGapAnalysis {
    FormattedGapAnalysis {
        core_strengths: ordered_list(&parsed.strengths, GapField::Strengths),
        key_gaps: ordered_list(&parsed.gaps, GapField::Gaps),
        quick_improvements: ordered_list(&parsed.improvements, GapField::Improvements),
        overall_assessment: assessment_paragraph(&parsed.assessment),
        skill_search_queries: parsed.skill_queries.clone(),
    }
}

fn ordered_list(items: &[String], field: GapField) -> String {
    if items.is_empty() {
        warn!("{field} is empty");
        return fallback_html(field).to_string();
    }
    let body: String = items.iter().map(|item| format!("<li>{item}</li>")).collect();
    format!("<ol>{body}</ol>")
}

fn assessment_paragraph(assessment: &str) -> String {
    let is_placeholder = assessment.trim().is_empty()
        || assessment == ASSESSMENT_EMPTY_PLACEHOLDER
        || assessment == ASSESSMENT_MISSING_PLACEHOLDER;
    if is_placeholder {
        warn!("Empty or placeholder overall assessment detected in formatting");
        return ASSESSMENT_FALLBACK.to_string();
    }
    format!("<p>{assessment}</p>")
}

/// Fixed fallback HTML for a string field. Skill queries fall back to `[]`.
pub fn fallback_html(field: GapField) -> &'static str {
    match field {
        GapField::Strengths => CORE_STRENGTHS_FALLBACK,
        GapField::Gaps => KEY_GAPS_FALLBACK,
        GapField::Improvements => QUICK_IMPROVEMENTS_FALLBACK,
        GapField::Assessment => ASSESSMENT_FALLBACK,
        GapField::SkillQueries => "",
    }
}

impl FormattedGapAnalysis {
    /// Every field at its fallback value.
    pub fn fallback() -> Self {
        let mut formatted = FormattedGapAnalysis {
            core_strengths: String::new(),
            key_gaps: String::new(),
            quick_improvements: String::new(),
            overall_assessment: String::new(),
            skill_search_queries: Vec::new(),
        };
        for field in GapField::ALL {
            formatted.apply_fallback(field);
        }
        formatted
    }

    pub fn apply_fallback(&mut self, field: GapField) {
        let html = fallback_html(field).to_string();
        match field {
            GapField::Strengths => self.core_strengths = html,
            GapField::Gaps => self.key_gaps = html,
            GapField::Improvements => self.quick_improvements = html,
            GapField::Assessment => self.overall_assessment = html,
            GapField::SkillQueries => self.skill_search_queries.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap_analysis::parser::parse;

    #[test]
    fn test_lists_render_as_ordered_lists() {
        let parsed = ParsedGapAnalysis {
            strengths: vec!["a".into(), "<strong>b</strong>".into()],
            gaps: vec!["c".into()],
            improvements: vec!["d".into()],
            assessment: "Solid.".into(),
            ..Default::default()
        };
        let formatted = format(&parsed);
        assert_eq!(formatted.core_strengths, "<ol><li>a</li><li><strong>b</strong></li></ol>");
        assert_eq!(formatted.key_gaps, "<ol><li>c</li></ol>");
        assert_eq!(formatted.quick_improvements, "<ol><li>d</li></ol>");
        assert_eq!(formatted.overall_assessment, "<p>Solid.</p>");
    }

    #[test]
    fn test_empty_lists_use_field_fallbacks() {
        let formatted = format(&ParsedGapAnalysis::default());
        assert_eq!(formatted.core_strengths, CORE_STRENGTHS_FALLBACK);
        assert_eq!(formatted.key_gaps, KEY_GAPS_FALLBACK);
        assert_eq!(formatted.quick_improvements, QUICK_IMPROVEMENTS_FALLBACK);
        assert_eq!(formatted.overall_assessment, ASSESSMENT_FALLBACK);
    }

    #[test]
    fn test_parser_placeholders_become_formatter_fallback() {
        for raw in ["", "<overall_assessment></overall_assessment>"] {
            assert_eq!(format(&parse(raw)).overall_assessment, ASSESSMENT_FALLBACK);
        }
    }

    #[test]
    fn test_fallback_fills_every_field() {
        let fallback = FormattedGapAnalysis::fallback();
        assert_eq!(fallback.core_strengths, CORE_STRENGTHS_FALLBACK);
        assert_eq!(fallback.overall_assessment, ASSESSMENT_FALLBACK);
        assert!(fallback.skill_search_queries.is_empty());
    }

    #[test]
    fn test_fallback_wording_is_stable() {
        assert_eq!(
            ASSESSMENT_FALLBACK,
            "<p>Unable to generate a comprehensive assessment. Please review the individual sections above for detailed analysis.</p>"
        );
    }
}
