//! Structured-Text Parser: pulls the five tagged sections out of raw LLM text.
//!
//! Total over all inputs. A missing or empty section yields the field's empty
//! form; only the assessment gets a placeholder sentence, and which one tells
//! a missing tag apart from an empty one.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use super::models::{GapField, ParseDiagnostics, ParsedGapAnalysis, SkillCategory, SkillQuery};

pub const ASSESSMENT_EMPTY_PLACEHOLDER: &str =
    "Unable to generate overall assessment. Please review the strengths and gaps above.";
pub const ASSESSMENT_MISSING_PLACEHOLDER: &str =
    "Overall assessment not available. Please refer to the detailed analysis above.";

const SKILL_DELIMITER: &str = "::";

fn section_regex(field: GapField) -> Regex {
    let tag = field.tag();
    Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>")).expect("section regex is valid")
}

lazy_static! {
    static ref STRENGTHS: Regex = section_regex(GapField::Strengths);
    static ref GAPS: Regex = section_regex(GapField::Gaps);
    static ref IMPROVEMENTS: Regex = section_regex(GapField::Improvements);
    static ref ASSESSMENT: Regex = section_regex(GapField::Assessment);
    static ref SKILL_QUERIES: Regex = section_regex(GapField::SkillQueries);

    // A lone `*` is a bullet only when followed by whitespace, so `**bold**` survives.
    static ref BULLET: Regex = Regex::new(r"^\s*(?:[-•]|\*(?:\s|$))\s*").expect("bullet regex is valid");
    static ref NUMBERING: Regex = Regex::new(r"^\s*\d+\.\s*").expect("numbering regex is valid");

    static ref BOLD: Regex = Regex::new(r"\*\*(.*?)\*\*").expect("bold regex is valid");
    static ref ITALIC: Regex = Regex::new(r"\*([^*]+?)\*").expect("italic regex is valid");
    static ref CODE: Regex = Regex::new(r"`([^`]+?)`").expect("code regex is valid");
    static ref CONTROL: Regex =
        Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("control char regex is valid");
}

fn section_pattern(field: GapField) -> &'static Regex {
    match field {
        GapField::Strengths => &STRENGTHS,
        GapField::Gaps => &GAPS,
        GapField::Improvements => &IMPROVEMENTS,
        GapField::Assessment => &ASSESSMENT,
        GapField::SkillQueries => &SKILL_QUERIES,
    }
}

/// Content between the first open tag and the first matching close tag.
pub fn extract_section(raw: &str, field: GapField) -> Option<&str> {
    section_pattern(field)
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Inline markdown to HTML: `**bold**`, `*italic*`, `` `code` ``. Control
/// characters are dropped.
pub fn markdown_to_html(text: &str) -> String {
    let text = BOLD.replace_all(text, "<strong>$1</strong>");
    let text = ITALIC.replace_all(&text, "<em>$1</em>");
    let text = CODE.replace_all(&text, "<code>$1</code>");
    CONTROL.replace_all(&text, "").into_owned()
}

pub fn parse(raw: &str) -> ParsedGapAnalysis {
    let mut diagnostics = ParseDiagnostics::default();

    let mut list = |field: GapField| -> Vec<String> {
        match extract_section(raw, field) {
            Some(content) => {
                let items = list_items(content);
                if items.is_empty() {
                    diagnostics.empty_tags.push(field.tag());
                }
                items
            }
            None => {
                diagnostics.missing_tags.push(field.tag());
                Vec::new()
            }
        }
    };

    let strengths = list(GapField::Strengths);
    let gaps = list(GapField::Gaps);
    let improvements = list(GapField::Improvements);

    let assessment = match extract_section(raw, GapField::Assessment) {
        Some(content) if content.trim().is_empty() => {
            warn!("Overall assessment tag found but content is empty");
            diagnostics.empty_tags.push(GapField::Assessment.tag());
            ASSESSMENT_EMPTY_PLACEHOLDER.to_string()
        }
        Some(content) => paragraph(content),
        None => {
            warn!("Overall assessment tag not found in response");
            diagnostics.missing_tags.push(GapField::Assessment.tag());
            ASSESSMENT_MISSING_PLACEHOLDER.to_string()
        }
    };

    let skill_queries = match extract_section(raw, GapField::SkillQueries) {
        Some(content) => {
            let skills = skill_queries(content);
            if skills.is_empty() {
                diagnostics.empty_tags.push(GapField::SkillQueries.tag());
            }
            skills
        }
        None => {
            diagnostics.missing_tags.push(GapField::SkillQueries.tag());
            Vec::new()
        }
    };

    debug!(
        strengths = strengths.len(),
        gaps = gaps.len(),
        improvements = improvements.len(),
        skills = skill_queries.len(),
        missing = ?diagnostics.missing_tags,
        empty = ?diagnostics.empty_tags,
        "Parsed gap analysis response"
    );

    ParsedGapAnalysis {
        strengths,
        gaps,
        improvements,
        assessment,
        skill_queries,
        diagnostics,
    }
}

fn list_items(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let text = BULLET.replace(line, "");
            let text = NUMBERING.replace(&text, "");
            if text.is_empty() {
                return None;
            }
            let html = markdown_to_html(&text);
            (!html.trim().is_empty()).then_some(html)
        })
        .collect()
}

fn paragraph(content: &str) -> String {
    let joined = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let html = markdown_to_html(&joined);
    if html.is_empty() {
        warn!("Markdown conversion resulted in empty text, using raw content");
        joined
    } else {
        html
    }
}

/// Lines of the form `SKILL_N::Name::CATEGORY::Description`.
fn skill_queries(content: &str) -> Vec<SkillQuery> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| line.contains(SKILL_DELIMITER))
        .filter_map(|line| {
            let parts: Vec<&str> = line.splitn(4, SKILL_DELIMITER).collect();
            let [_, name, category, description] = parts.as_slice() else {
                return None;
            };
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(SkillQuery {
                skill_name: name.to_string(),
                skill_category: SkillCategory::from_label(category),
                description: description.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "\
<core_strengths>
- Strong **Python** background
* Built REST APIs with `FastAPI`-like frameworks
</core_strengths>
<key_gaps>
1. No Docker experience
2. Limited *cloud* exposure
</key_gaps>
<quick_improvements>
• Add container projects
</quick_improvements>
<overall_assessment>
The candidate is a solid backend developer.
Some gaps remain in DevOps.
</overall_assessment>
<skill_development_priorities>
SKILL_1::Docker::technical::Containerisation basics
SKILL_2::Stakeholder Communication::NON_TECHNICAL::Explaining trade-offs
SKILL_3::::TECHNICAL::nameless
SKILL_4::Kubernetes::CLOUD::Orchestration::with extra colons
not a skill line
</skill_development_priorities>";

    #[test]
    fn test_parse_full_response() {
        let parsed = parse(FULL);
        assert_eq!(
            parsed.strengths,
            vec![
                "Strong <strong>Python</strong> background",
                "Built REST APIs with <code>FastAPI</code>-like frameworks",
            ]
        );
        assert_eq!(
            parsed.gaps,
            vec!["No Docker experience", "Limited <em>cloud</em> exposure"]
        );
        assert_eq!(parsed.improvements, vec!["Add container projects"]);
        assert_eq!(
            parsed.assessment,
            "The candidate is a solid backend developer. Some gaps remain in DevOps."
        );
        assert_eq!(parsed.diagnostics, ParseDiagnostics::default());
    }

    #[test]
    fn test_skill_lines() {
        let skills = parse(FULL).skill_queries;
        assert_eq!(skills.len(), 3);
        assert_eq!(skills[0].skill_name, "Docker");
        assert_eq!(skills[0].skill_category, SkillCategory::Technical);
        assert_eq!(skills[1].skill_category, SkillCategory::NonTechnical);
        assert_eq!(skills[2].skill_name, "Kubernetes");
        assert_eq!(skills[2].skill_category, SkillCategory::Technical);
        assert_eq!(skills[2].description, "Orchestration::with extra colons");
    }

    #[test]
    fn test_empty_input_yields_empty_forms() {
        let parsed = parse("");
        assert!(parsed.strengths.is_empty());
        assert!(parsed.gaps.is_empty());
        assert!(parsed.improvements.is_empty());
        assert!(parsed.skill_queries.is_empty());
        assert_eq!(parsed.assessment, ASSESSMENT_MISSING_PLACEHOLDER);
        assert_eq!(parsed.diagnostics.missing_tags.len(), 5);
    }

    #[test]
    fn test_empty_vs_missing_assessment() {
        let empty = parse("<overall_assessment>\n   \n</overall_assessment>");
        assert_eq!(empty.assessment, ASSESSMENT_EMPTY_PLACEHOLDER);
        assert!(empty.diagnostics.empty_tags.contains(&"overall_assessment"));

        let missing = parse("<core_strengths>- a</core_strengths>");
        assert_eq!(missing.assessment, ASSESSMENT_MISSING_PLACEHOLDER);
        assert!(missing.diagnostics.missing_tags.contains(&"overall_assessment"));
    }

    #[test]
    fn test_unclosed_and_malformed_tags() {
        let inputs = [
            "<core_strengths>- never closed",
            "</key_gaps>- backwards<key_gaps>",
            "<overall_assessment>",
            "<<<>>>::::",
            "<skill_development_priorities>SKILL_1::Only::Two</skill_development_priorities>",
        ];
        for input in inputs {
            let parsed = parse(input);
            assert!(parsed.strengths.is_empty(), "{input}");
            assert!(parsed.gaps.is_empty(), "{input}");
            assert!(parsed.skill_queries.is_empty(), "{input}");
        }
    }

    #[test]
    fn test_first_occurrence_non_greedy() {
        let raw = "<key_gaps>- first</key_gaps> noise <key_gaps>- second</key_gaps>";
        assert_eq!(parse(raw).gaps, vec!["first"]);
    }

    #[test]
    fn test_blank_only_lists_are_empty() {
        let parsed = parse("<core_strengths>\n - \n\n 1. \n</core_strengths>");
        assert!(parsed.strengths.is_empty());
        assert!(parsed.diagnostics.empty_tags.contains(&"core_strengths"));
    }

    #[test]
    fn test_markdown_to_html() {
        assert_eq!(
            markdown_to_html("**a** and *b* with `c`"),
            "<strong>a</strong> and <em>b</em> with <code>c</code>"
        );
        assert_eq!(markdown_to_html("tab\u{0007}bell"), "tabbell");
        assert_eq!(markdown_to_html(""), "");
    }
}
