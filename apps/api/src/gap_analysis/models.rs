//! Gap analysis data model: request, parsed sections, and the HTML output contract.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::language::Language;

/// A validated gap analysis request. `matched ∪ missing == job_keywords` and
/// `matched ∩ missing == ∅` hold once constructed by the service.
#[derive(Debug, Clone)]
pub struct GapAnalysisRequest {
    pub job_description: String,
    pub resume: String,
    pub job_keywords: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub language: Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillCategory {
    Technical,
    NonTechnical,
}

impl SkillCategory {
    /// Upper-cases the label; anything unrecognised is `Technical`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "NON_TECHNICAL" => SkillCategory::NonTechnical,
            _ => SkillCategory::Technical,
        }
    }
}

/// One skill-development priority, used downstream as a course search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillQuery {
    pub skill_name: String,
    pub skill_category: SkillCategory,
    pub description: String,
}

/// What the parser noticed about the raw text. Logged, never returned to callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseDiagnostics {
    pub missing_tags: Vec<&'static str>,
    pub empty_tags: Vec<&'static str>,
}

/// Sections pulled out of one LLM response. Every field is always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedGapAnalysis {
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub improvements: Vec<String>,
    pub assessment: String,
    pub skill_queries: Vec<SkillQuery>,
    #[serde(skip)]
    pub diagnostics: ParseDiagnostics,
}

/// The final gap analysis exposed under `data.gap_analysis`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FormattedGapAnalysis {
    pub core_strengths: String,
    pub key_gaps: String,
    pub quick_improvements: String,
    pub overall_assessment: String,
    pub skill_search_queries: Vec<SkillQuery>,
}

/// The five gap analysis fields, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GapField {
    Strengths,
    Gaps,
    Improvements,
    Assessment,
    SkillQueries,
}

impl GapField {
    pub const ALL: [GapField; 5] = [
        GapField::Strengths,
        GapField::Gaps,
        GapField::Improvements,
        GapField::Assessment,
        GapField::SkillQueries,
    ];

    /// Key in the JSON output.
    pub fn output_key(&self) -> &'static str {
        match self {
            GapField::Strengths => "CoreStrengths",
            GapField::Gaps => "KeyGaps",
            GapField::Improvements => "QuickImprovements",
            GapField::Assessment => "OverallAssessment",
            GapField::SkillQueries => "SkillSearchQueries",
        }
    }

    /// Tag name delimiting the section in LLM output.
    pub fn tag(&self) -> &'static str {
        match self {
            GapField::Strengths => "core_strengths",
            GapField::Gaps => "key_gaps",
            GapField::Improvements => "quick_improvements",
            GapField::Assessment => "overall_assessment",
            GapField::SkillQueries => "skill_development_priorities",
        }
    }
}

impl fmt::Display for GapField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.output_key())
    }
}

impl Serialize for GapField {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.output_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_category_from_label() {
        assert_eq!(SkillCategory::from_label("technical"), SkillCategory::Technical);
        assert_eq!(SkillCategory::from_label(" non_technical "), SkillCategory::NonTechnical);
        assert_eq!(SkillCategory::from_label("SOFT"), SkillCategory::Technical);
    }

    #[test]
    fn test_formatted_output_keys() {
        let formatted = FormattedGapAnalysis {
            core_strengths: "<ol></ol>".into(),
            key_gaps: "<ol></ol>".into(),
            quick_improvements: "<ol></ol>".into(),
            overall_assessment: "<p></p>".into(),
            skill_search_queries: vec![SkillQuery {
                skill_name: "Docker".into(),
                skill_category: SkillCategory::NonTechnical,
                description: "d".into(),
            }],
        };
        let value = serde_json::to_value(&formatted).unwrap();
        for field in GapField::ALL {
            assert!(value.get(field.output_key()).is_some(), "missing {field}");
        }
        assert_eq!(value["SkillSearchQueries"][0]["skill_category"], "NON_TECHNICAL");
        assert_eq!(value["SkillSearchQueries"][0]["skill_name"], "Docker");
    }

    #[test]
    fn test_parsed_diagnostics_not_serialized() {
        let value = serde_json::to_value(ParsedGapAnalysis::default()).unwrap();
        assert!(value.get("diagnostics").is_none());
        assert_eq!(value["assessment"], "");
    }
}
