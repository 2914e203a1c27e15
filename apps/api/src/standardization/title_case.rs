//! Casing rules applied before pattern matching.
//!
//! Position titles ("lead data scientist") get title case with known acronyms
//! kept upper-case; a handful of technology names get their exact brand casing.

const POSITION_INDICATORS: &[&str] = &[
    "analyst",
    "engineer",
    "developer",
    "manager",
    "director",
    "specialist",
    "coordinator",
    "administrator",
    "architect",
    "designer",
    "scientist",
    "researcher",
    "consultant",
    "lead",
    "supervisor",
    "associate",
    "assistant",
    "officer",
    "executive",
    "technician",
    "expert",
    "advisor",
    "strategist",
    "planner",
];

const LEVEL_MODIFIERS: &[&str] = &[
    "senior",
    "junior",
    "lead",
    "principal",
    "staff",
    "chief",
    "associate",
    "assistant",
    "deputy",
    "vice",
    "head",
    "team",
];

const ACRONYMS: &[(&str, &str)] = &[
    ("ai", "AI"),
    ("ml", "ML"),
    ("bi", "BI"),
    ("it", "IT"),
    ("hr", "HR"),
    ("qa", "QA"),
    ("ux", "UX"),
    ("ui", "UI"),
    ("vp", "VP"),
    ("ceo", "CEO"),
    ("cto", "CTO"),
    ("cfo", "CFO"),
    ("phd", "PhD"),
    ("mba", "MBA"),
    ("sql", "SQL"),
    ("etl", "ETL"),
];

const SMALL_WORDS: &[&str] = &[
    "of", "and", "or", "the", "a", "an", "in", "on", "at", "to", "for",
];

const TECH_CASING: &[(&str, &str)] = &[
    ("javascript", "JavaScript"),
    ("typescript", "TypeScript"),
    ("mongodb", "MongoDB"),
    ("postgresql", "PostgreSQL"),
    ("mysql", "MySQL"),
    ("nodejs", "Node.js"),
    ("reactjs", "React.js"),
    ("vuejs", "Vue.js"),
    ("graphql", "GraphQL"),
    ("restful", "RESTful"),
    ("linkedin", "LinkedIn"),
    ("github", "GitHub"),
    ("gitlab", "GitLab"),
    ("tensorflow", "TensorFlow"),
    ("pytorch", "PyTorch"),
    ("scikit-learn", "Scikit-learn"),
    ("jupyter", "Jupyter"),
    ("powerbi", "Power BI"),
    ("tableau", "Tableau"),
];

/// True when the keyword reads like a job title: it contains a position noun
/// anywhere, or its first word is a seniority/level modifier.
pub fn is_position_title(keyword: &str) -> bool {
    let lower = keyword.to_lowercase();
    let contains_position = POSITION_INDICATORS.iter().any(|p| lower.contains(p));
    let starts_with_level = lower
        .split_whitespace()
        .next()
        .is_some_and(|first| LEVEL_MODIFIERS.contains(&first));
    contains_position || starts_with_level
}

/// Applies position title case or exact technology casing. Returns the input
/// unchanged when neither rule applies.
pub fn apply(keyword: &str) -> String {
    if is_position_title(keyword) {
        return title_case_position(keyword);
    }

    let lower = keyword.to_lowercase();
    TECH_CASING
        .iter()
        .find(|(raw, _)| *raw == lower)
        .map(|(_, cased)| cased.to_string())
        .unwrap_or_else(|| keyword.to_string())
}

fn title_case_position(keyword: &str) -> String {
    keyword
        .to_lowercase()
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            if i > 0 && SMALL_WORDS.contains(&word) {
                word.to_string()
            } else {
                word.split('-').map(title_case_segment).collect::<Vec<_>>().join("-")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hyphenated words are cased per segment: "full-stack" becomes "Full-Stack".
fn title_case_segment(segment: &str) -> String {
    match ACRONYMS.iter().find(|(raw, _)| *raw == segment) {
        Some((_, acronym)) => acronym.to_string(),
        None => capitalize(segment),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
