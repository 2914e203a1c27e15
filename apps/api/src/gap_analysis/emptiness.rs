//! Emptiness Detector: which formatted fields carry no real content.
//!
//! Checked on the formatted output so that an empty list and a fallback from an
//! earlier stage or attempt are recognised the same way.

use std::collections::BTreeSet;

use serde::Serialize;

use super::formatter::{
    ASSESSMENT_FALLBACK, CORE_STRENGTHS_FALLBACK, KEY_GAPS_FALLBACK, QUICK_IMPROVEMENTS_FALLBACK,
};
use super::models::{FormattedGapAnalysis, GapField};
use super::parser::{ASSESSMENT_EMPTY_PLACEHOLDER, ASSESSMENT_MISSING_PLACEHOLDER};

const EMPTY_LIST: &str = "<ol></ol>";
const EMPTY_PARAGRAPH: &str = "<p></p>";

/// Fields judged empty for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmptinessReport(BTreeSet<GapField>);

impl EmptinessReport {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: GapField) -> bool {
        self.0.contains(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = GapField> + '_ {
        self.0.iter().copied()
    }

    /// Output key names, for logs and telemetry.
    pub fn names(&self) -> Vec<&'static str> {
        self.fields().map(|f| f.output_key()).collect()
    }
}

impl FromIterator<GapField> for EmptinessReport {
    fn from_iter<I: IntoIterator<Item = GapField>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub fn check_empty(formatted: &FormattedGapAnalysis) -> EmptinessReport {
    GapField::ALL
        .into_iter()
        .filter(|field| is_field_empty(formatted, *field))
        .collect()
}

fn is_field_empty(formatted: &FormattedGapAnalysis, field: GapField) -> bool {
    let list_empty = |html: &str, fallback: &str| {
        let html = html.trim();
        html.is_empty() || html == EMPTY_LIST || html == fallback
    };

    match field {
        GapField::Strengths => list_empty(&formatted.core_strengths, CORE_STRENGTHS_FALLBACK),
        GapField::Gaps => list_empty(&formatted.key_gaps, KEY_GAPS_FALLBACK),
        GapField::Improvements => {
            list_empty(&formatted.quick_improvements, QUICK_IMPROVEMENTS_FALLBACK)
        }
        GapField::Assessment => is_assessment_empty(&formatted.overall_assessment),
        GapField::SkillQueries => formatted.skill_search_queries.is_empty(),
    }
}

fn is_assessment_empty(html: &str) -> bool {
    let html = html.trim();
    if html.is_empty() || html == EMPTY_PARAGRAPH || html == ASSESSMENT_FALLBACK {
        return true;
    }
    [ASSESSMENT_EMPTY_PLACEHOLDER, ASSESSMENT_MISSING_PLACEHOLDER]
        .iter()
        .any(|placeholder| html == format!("<p>{placeholder}</p>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap_analysis::formatter::format;
    use crate::gap_analysis::models::{SkillCategory, SkillQuery};
    use crate::gap_analysis::parser::parse;

    fn complete() -> FormattedGapAnalysis {
        FormattedGapAnalysis {
            core_strengths: "<ol><li>a</li></ol>".into(),
            key_gaps: "<ol><li>b</li></ol>".into(),
            quick_improvements: "<ol><li>c</li></ol>".into(),
            overall_assessment: "<p>d</p>".into(),
            skill_search_queries: vec![SkillQuery {
                skill_name: "Docker".into(),
                skill_category: SkillCategory::Technical,
                description: "e".into(),
            }],
        }
    }

    #[test]
    fn test_complete_output_is_not_empty() {
        assert!(check_empty(&complete()).is_empty());
    }

    #[test]
    fn test_fully_empty_input_flags_every_field() {
        let report = check_empty(&format(&parse("")));
        assert_eq!(report, GapField::ALL.into_iter().collect::<EmptinessReport>());
        assert_eq!(
            report.names(),
            vec!["CoreStrengths", "KeyGaps", "QuickImprovements", "OverallAssessment", "SkillSearchQueries"]
        );
    }

    #[test]
    fn test_raw_empty_markup_is_empty() {
        let mut formatted = complete();
        formatted.core_strengths = "<ol></ol>".into();
        formatted.overall_assessment = "<p></p>".into();
        let report = check_empty(&formatted);
        assert!(report.contains(GapField::Strengths));
        assert!(report.contains(GapField::Assessment));
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_every_fallback_and_placeholder_is_recognised() {
        let mut formatted = FormattedGapAnalysis::fallback();
        assert_eq!(check_empty(&formatted).len(), 5);

        for placeholder in [ASSESSMENT_EMPTY_PLACEHOLDER, ASSESSMENT_MISSING_PLACEHOLDER] {
            formatted.overall_assessment = format!("<p>{placeholder}</p>");
            assert!(check_empty(&formatted).contains(GapField::Assessment));
        }
    }

    #[test]
    fn test_partial_output_flags_only_missing_sections() {
        let raw = "<core_strengths>- Python</core_strengths>\
                   <key_gaps>- Docker</key_gaps>\
                   <overall_assessment>Good fit.</overall_assessment>";
        let report = check_empty(&format(&parse(raw)));
        assert_eq!(
            report,
            [GapField::Improvements, GapField::SkillQueries]
                .into_iter()
                .collect::<EmptinessReport>()
        );
    }
}
