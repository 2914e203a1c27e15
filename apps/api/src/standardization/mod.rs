//! Keyword Standardizer: maps free-text keywords to canonical spellings.
//!
//! Tables come from four YAML files under the standardization directory:
//! `skills.yaml`, `positions.yaml` and `tools.yaml` hold nested
//! `{group: {original: canonical}}` dictionaries; `patterns.yaml` holds ordered
//! `{group: [{pattern, replacement, type}]}` regex rules.
//!
//! Lookup order per keyword, short-circuiting on the first hit:
//! 1. exact dictionary match (case-insensitive)
//! 2. title casing for position titles / exact tech casing
//! 3. ordered pattern rules, re-checking the dictionary after every change
//!
//! The loaded tables are immutable. `reload()` builds a fresh set and swaps it
//! in; requests already holding a snapshot keep using the old one.

pub mod handlers;
pub mod title_case;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

pub const SKILLS_FILE: &str = "skills.yaml";
pub const POSITIONS_FILE: &str = "positions.yaml";
pub const TOOLS_FILE: &str = "tools.yaml";
pub const PATTERNS_FILE: &str = "patterns.yaml";

/// Pattern rules of this type are skipped for position titles, so "AI Engineer"
/// is not expanded to "Artificial Intelligence Engineer".
const ABBREVIATION_RULE: &str = "abbreviation";

#[derive(Debug, Error)]
pub enum StandardizationError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Results
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    #[serde(rename = "dictionary")]
    Dictionary,
    #[serde(rename = "pattern")]
    Pattern,
    #[serde(rename = "pattern+dictionary")]
    PatternDictionary,
    #[serde(rename = "title_case")]
    TitleCase,
    #[serde(rename = "title_case+pattern")]
    TitleCasePattern,
    #[serde(rename = "title_case+pattern+dictionary")]
    TitleCasePatternDictionary,
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Skill,
    Position,
    Tool,
    General,
    None,
}

/// Outcome for one keyword. Also the change-log entry of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standardized {
    pub original: String,
    pub standardized: String,
    pub method: Method,
    pub category: Category,
}

impl Standardized {
    pub fn changed(&self) -> bool {
        self.original != self.standardized
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardizerStats {
    pub total_dictionary_entries: usize,
    pub skill_entries: usize,
    pub position_entries: usize,
    pub tool_entries: usize,
    pub pattern_rules: usize,
    pub data_directory: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Keys defined in more than one category file.
    pub duplicates: Vec<String>,
    /// Canonical forms that differ only in letter case.
    pub conflicts: Vec<String>,
    pub invalid_patterns: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.conflicts.is_empty() && self.invalid_patterns.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tables
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct DictionaryEntry {
    canonical: String,
    category: Category,
}

#[derive(Debug)]
struct PatternRule {
    regex: Regex,
    replacement: String,
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RawPattern {
    pattern: String,
    #[serde(default)]
    replacement: String,
    #[serde(rename = "type", default = "default_pattern_type")]
    kind: String,
}

fn default_pattern_type() -> String {
    "unknown".to_string()
}

/// One immutable snapshot of dictionaries and pattern rules.
#[derive(Debug, Default)]
pub struct StandardizationTables {
    /// Per-category dictionaries, lowercased keys, in lookup precedence order.
    categories: Vec<(Category, BTreeMap<String, String>)>,
    combined: HashMap<String, DictionaryEntry>,
    patterns: Vec<PatternRule>,
    invalid_patterns: Vec<String>,
}

impl StandardizationTables {
    /// Loads all four files. A missing file yields an empty table with a warning;
    /// an unreadable or malformed file is an error.
    pub fn load(dir: &Path) -> Result<Self, StandardizationError> {
        let categories = vec![
            (Category::Skill, load_dictionary(&dir.join(SKILLS_FILE))?),
            (Category::Position, load_dictionary(&dir.join(POSITIONS_FILE))?),
            (Category::Tool, load_dictionary(&dir.join(TOOLS_FILE))?),
        ];
        let (patterns, invalid_patterns) = load_patterns(&dir.join(PATTERNS_FILE))?;
        Ok(Self::from_parts(categories, patterns, invalid_patterns))
    }

    fn from_parts(
        categories: Vec<(Category, BTreeMap<String, String>)>,
        patterns: Vec<PatternRule>,
        invalid_patterns: Vec<String>,
    ) -> Self {
        let mut combined: HashMap<String, DictionaryEntry> = HashMap::new();

        // Earlier categories win on key collisions.
        for (category, dictionary) in &categories {
            for (key, canonical) in dictionary {
                combined.entry(key.clone()).or_insert_with(|| DictionaryEntry {
                    canonical: canonical.clone(),
                    category: *category,
                });
            }
        }

        // Canonical skill and tool forms map to themselves so a standardized
        // keyword standardizes to itself. Position titles are stable under
        // title casing already.
        for (category, dictionary) in &categories {
            if *category == Category::Position {
                continue;
            }
            for canonical in dictionary.values() {
                combined
                    .entry(canonical.to_lowercase())
                    .or_insert_with(|| DictionaryEntry {
                        canonical: canonical.clone(),
                        category: *category,
                    });
            }
        }

        Self {
            categories,
            combined,
            patterns,
            invalid_patterns,
        }
    }

    fn lookup(&self, keyword: &str) -> Option<&DictionaryEntry> {
        self.combined.get(&keyword.trim().to_lowercase())
    }

    fn entries_in(&self, category: Category) -> usize {
        self.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, d)| d.len())
            .unwrap_or(0)
    }

    /// Standardizes one keyword against this snapshot.
    pub fn standardize(&self, keyword: &str) -> Standardized {
        let original = keyword.to_string();
        let trimmed = keyword.trim();

        if trimmed.is_empty() {
            return Standardized {
                original,
                standardized: keyword.to_string(),
                method: Method::None,
                category: Category::None,
            };
        }

        if let Some(entry) = self.lookup(trimmed) {
            return Standardized {
                original,
                standardized: entry.canonical.clone(),
                method: Method::Dictionary,
                category: entry.category,
            };
        }

        let title_cased = title_case::apply(trimmed);
        let title_case_applied = title_cased != trimmed;
        let is_position = title_case::is_position_title(trimmed);

        let mut current = title_cased;
        let mut pattern_applied = false;

        for rule in &self.patterns {
            if is_position && rule.kind == ABBREVIATION_RULE {
                continue;
            }
            let replaced = rule
                .regex
                .replace_all(&current, rule.replacement.as_str())
                .into_owned();
            if replaced == current {
                continue;
            }
            current = replaced.trim().to_string();
            pattern_applied = true;

            if let Some(entry) = self.lookup(&current) {
                let method = if title_case_applied {
                    Method::TitleCasePatternDictionary
                } else {
                    Method::PatternDictionary
                };
                return Standardized {
                    original,
                    standardized: entry.canonical.clone(),
                    method,
                    category: entry.category,
                };
            }
        }

        let (method, category) = match (title_case_applied, pattern_applied) {
            (true, true) => (Method::TitleCasePattern, Category::General),
            (false, true) => (Method::Pattern, Category::General),
            (true, false) => (Method::TitleCase, Category::General),
            (false, false) => (Method::None, Category::None),
        };

        Standardized {
            original,
            standardized: current,
            method,
            category,
        }
    }
}

fn read_yaml(path: &Path) -> Result<Option<serde_yaml::Value>, StandardizationError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Standardization file not found: {}", path.display());
            return Ok(None);
        }
        Err(source) => {
            return Err(StandardizationError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_yaml::from_str(&content)
        .map(Some)
        .map_err(|source| StandardizationError::Yaml {
            path: path.to_path_buf(),
            source,
        })
}

/// Flattens `{group: {original: canonical}}` into `{original_lowercase: canonical}`.
fn load_dictionary(path: &Path) -> Result<BTreeMap<String, String>, StandardizationError> {
    let mut dictionary = BTreeMap::new();
    let Some(value) = read_yaml(path)? else {
        return Ok(dictionary);
    };

    let groups: BTreeMap<String, BTreeMap<String, String>> = serde_yaml::from_value(value)
        .map_err(|source| StandardizationError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

    for (_, mappings) in groups {
        for (original, canonical) in mappings {
            dictionary.insert(original.trim().to_lowercase(), canonical);
        }
    }

    info!("Loaded {} entries from {}", dictionary.len(), path.display());
    Ok(dictionary)
}

/// Compiles pattern rules case-insensitively, preserving file order. Invalid
/// regexes are logged and skipped.
fn load_patterns(path: &Path) -> Result<(Vec<PatternRule>, Vec<String>), StandardizationError> {
    let mut rules = Vec::new();
    let mut invalid = Vec::new();
    let Some(value) = read_yaml(path)? else {
        return Ok((rules, invalid));
    };

    // serde_yaml::Mapping keeps insertion order, so group order is file order.
    let groups: serde_yaml::Mapping = serde_yaml::from_value(value).map_err(|source| {
        StandardizationError::Yaml {
            path: path.to_path_buf(),
            source,
        }
    })?;

    for (_, group) in groups {
        let raw: Vec<RawPattern> = serde_yaml::from_value(group).map_err(|source| {
            StandardizationError::Yaml {
                path: path.to_path_buf(),
                source,
            }
        })?;

        for rule in raw {
            match RegexBuilder::new(&rule.pattern).case_insensitive(true).build() {
                Ok(regex) => rules.push(PatternRule {
                    regex,
                    replacement: rule.replacement,
                    kind: rule.kind,
                }),
                Err(e) => {
                    error!("Invalid regex pattern '{}': {}", rule.pattern, e);
                    invalid.push(rule.pattern);
                }
            }
        }
    }

    info!("Loaded {} patterns from {}", rules.len(), path.display());
    Ok((rules, invalid))
}

// ────────────────────────────────────────────────────────────────────────────
// Standardizer
// ────────────────────────────────────────────────────────────────────────────

/// Shared standardizer. Reads take a snapshot `Arc`; `reload()` replaces it.
pub struct KeywordStandardizer {
    data_dir: PathBuf,
    tables: RwLock<Arc<StandardizationTables>>,
}

impl KeywordStandardizer {
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self, StandardizationError> {
        let data_dir = data_dir.into();
        let tables = StandardizationTables::load(&data_dir)?;
        info!(
            "Initialized KeywordStandardizer with {} dictionary entries and {} patterns from {}",
            tables.combined.len(),
            tables.patterns.len(),
            data_dir.display()
        );
        Ok(Self {
            data_dir,
            tables: RwLock::new(Arc::new(tables)),
        })
    }

    /// Current tables. Holding the snapshot across a batch keeps the batch consistent.
    pub fn snapshot(&self) -> Arc<StandardizationTables> {
        self.tables.read().clone()
    }

    pub fn standardize(&self, keyword: &str) -> Standardized {
        self.snapshot().standardize(keyword)
    }

    /// Standardizes a batch. The change log only lists keywords that changed.
    pub fn standardize_keywords(&self, keywords: &[String]) -> (Vec<String>, Vec<Standardized>) {
        let tables = self.snapshot();
        let mut standardized = Vec::with_capacity(keywords.len());
        let mut changes = Vec::new();

        for keyword in keywords {
            let result = tables.standardize(keyword);
            standardized.push(result.standardized.clone());
            if result.changed() {
                changes.push(result);
            }
        }

        info!(
            "Standardized {} keywords, {} were modified",
            keywords.len(),
            changes.len()
        );
        (standardized, changes)
    }

    /// Re-reads every file and swaps the tables in one step. On failure the
    /// previous tables stay active.
    pub fn reload(&self) -> Result<StandardizerStats, StandardizationError> {
        info!("Reloading standardization dictionaries and patterns");
        let tables = StandardizationTables::load(&self.data_dir)?;
        *self.tables.write() = Arc::new(tables);
        let stats = self.stats();
        info!(
            "Reload complete: {} dictionary entries, {} patterns",
            stats.total_dictionary_entries, stats.pattern_rules
        );
        Ok(stats)
    }

    pub fn stats(&self) -> StandardizerStats {
        let tables = self.snapshot();
        StandardizerStats {
            total_dictionary_entries: tables.combined.len(),
            skill_entries: tables.entries_in(Category::Skill),
            position_entries: tables.entries_in(Category::Position),
            tool_entries: tables.entries_in(Category::Tool),
            pattern_rules: tables.patterns.len(),
            data_directory: self.data_dir.display().to_string(),
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let tables = self.snapshot();
        let mut report = ValidationReport {
            invalid_patterns: tables.invalid_patterns.clone(),
            ..Default::default()
        };

        let mut owner: HashMap<&str, Category> = HashMap::new();
        let mut spellings: BTreeMap<String, String> = BTreeMap::new();

        for (category, dictionary) in &tables.categories {
            for (key, canonical) in dictionary {
                match owner.get(key.as_str()) {
                    Some(first) if first != category => report.duplicates.push(format!(
                        "'{key}' appears in both {first:?} and {category:?}"
                    )),
                    Some(_) => {}
                    None => {
                        owner.insert(key, *category);
                    }
                }

                match spellings.get(&canonical.to_lowercase()) {
                    Some(seen) if seen != canonical => report.conflicts.push(format!(
                        "'{seen}' and '{canonical}' differ only in case"
                    )),
                    Some(_) => {}
                    None => {
                        spellings.insert(canonical.to_lowercase(), canonical.clone());
                    }
                }
            }
        }

        info!(
            "Validation complete: {} duplicates, {} conflicts",
            report.duplicates.len(),
            report.conflicts.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/standardization")
    }

    fn standardizer() -> KeywordStandardizer {
        KeywordStandardizer::load(data_dir()).unwrap()
    }

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_dictionary_lookup_is_case_insensitive() {
        let s = standardizer();
        for input in ["sql", "SQL", "Sql", "structured query language", "STRUCTURED QUERY LANGUAGE"] {
            let result = s.standardize(input);
            assert_eq!(result.standardized, "SQL", "input {input}");
            assert_eq!(result.method, Method::Dictionary);
            assert_eq!(result.category, Category::Skill);
        }
    }

    #[test]
    fn test_technology_names() {
        let s = standardizer();
        let cases = [
            ("python", "Python"),
            ("golang", "Go"),
            ("c++", "C++"),
            ("c#", "C#"),
            ("nodejs", "Node.js"),
            ("node.js", "Node.js"),
            ("amazon web services", "AWS"),
            ("k8s", "Kubernetes"),
            ("spark", "Apache Spark"),
            ("mysql", "MySQL"),
            ("sql server", "SQL Server"),
        ];
        for (input, expected) in cases {
            assert_eq!(s.standardize(input).standardized, expected, "input {input}");
        }
        assert_eq!(s.standardize("docker").category, Category::Tool);
    }

    #[test]
    fn test_ml_algorithms_resolves_through_pattern_then_dictionary() {
        let result = standardizer().standardize("ml algorithms");
        assert_eq!(result.standardized, "Machine Learning");
        assert_eq!(result.method, Method::PatternDictionary);
        assert_eq!(result.category, Category::Skill);
    }

    #[test]
    fn test_suffix_removal_hits_dictionary() {
        let s = standardizer();
        assert_eq!(s.standardize("sql queries").standardized, "SQL");
        assert_eq!(s.standardize("python programming").standardized, "Python");
    }

    #[test]
    fn test_lead_data_scientist_uses_title_case() {
        let result = standardizer().standardize("lead data scientist");
        assert_eq!(result.standardized, "Lead Data Scientist");
        assert_eq!(result.method, Method::TitleCase);
        assert_eq!(result.category, Category::General);
    }

    #[test]
    fn test_position_variants_from_dictionary() {
        let s = standardizer();
        for input in ["lead ds", "sr. lead data scientist", "senior lead data scientist"] {
            let result = s.standardize(input);
            assert_eq!(result.standardized, "Lead Data Scientist", "input {input}");
            assert_eq!(result.category, Category::Position);
        }
    }

    #[test]
    fn test_position_titles_skip_abbreviation_expansion() {
        let result = standardizer().standardize("ml engineer");
        assert_eq!(result.standardized, "ML Engineer");
        assert_eq!(result.method, Method::TitleCase);
    }

    #[test]
    fn test_abbreviation_expansion_outside_positions() {
        let result = standardizer().standardize("ai ethics");
        assert_eq!(result.standardized, "Artificial Intelligence ethics");
        assert_eq!(result.method, Method::Pattern);
        assert_eq!(result.category, Category::General);
    }

    #[test]
    fn test_unknown_keyword_unchanged() {
        let result = standardizer().standardize("stakeholder empathy");
        assert_eq!(result.standardized, "stakeholder empathy");
        assert_eq!(result.method, Method::None);
        assert_eq!(result.category, Category::None);
        assert!(!result.changed());
    }

    #[test]
    fn test_empty_keyword() {
        let result = standardizer().standardize("");
        assert_eq!(result.standardized, "");
        assert_eq!(result.method, Method::None);
    }

    #[test]
    fn test_standardization_is_idempotent() {
        let s = standardizer();
        let samples = [
            "ml algorithms",
            "lead data scientist",
            "LEAD DATA SCIENTIST",
            "lead ds",
            "python programming",
            "sql queries",
            "k8s",
            "amazon web services",
            "ai ethics",
            "ml engineer",
            "javascript",
            "dba",
            "object oriented programming",
            "ci/cd",
            "restful api",
            "vp of engineering",
            "stakeholder empathy",
            "spark",
            "node js",
            "full stack developer",
            "fullstack developer",
        ];
        for keyword in samples {
            let once = s.standardize(keyword).standardized;
            let twice = s.standardize(&once).standardized;
            assert_eq!(once, twice, "not idempotent for {keyword}");
        }
    }

    #[test]
    fn test_every_dictionary_entry_is_idempotent() {
        let s = standardizer();
        let tables = s.snapshot();
        let mut unstable = Vec::new();

        for (_, dictionary) in &tables.categories {
            for (key, canonical) in dictionary {
                for input in [key.clone(), canonical.clone(), format!("{key} skills")] {
                    let once = tables.standardize(&input).standardized;
                    let twice = tables.standardize(&once).standardized;
                    if once != twice {
                        unstable.push(format!("{input} -> {once} -> {twice}"));
                    }
                }
            }
        }
        assert!(unstable.is_empty(), "{unstable:?}");
    }

    #[test]
    fn test_batch_change_log_only_lists_changes() {
        let keywords: Vec<String> = ["python", "Python", "stakeholder empathy", "aws"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (standardized, changes) = standardizer().standardize_keywords(&keywords);

        assert_eq!(standardized, vec!["Python", "Python", "stakeholder empathy", "AWS"]);
        let changed: Vec<&str> = changes.iter().map(|c| c.original.as_str()).collect();
        assert_eq!(changed, vec!["python", "aws"]);
    }

    #[test]
    fn test_shipped_tables_validate_clean() {
        let s = standardizer();
        let report = s.validate();
        assert!(report.is_clean(), "{report:?}");

        let stats = s.stats();
        assert!(stats.skill_entries > 0);
        assert!(stats.position_entries > 0);
        assert!(stats.tool_entries > 0);
        assert!(stats.pattern_rules > 0);
    }

    #[test]
    fn test_earlier_category_wins_and_validate_reports_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SKILLS_FILE, "core:\n  go: Go\n  vue: Vue.js\n");
        write(dir.path(), TOOLS_FILE, "other:\n  go: Go Tool\n  vuejs: Vue.JS\n");

        let s = KeywordStandardizer::load(dir.path()).unwrap();
        let result = s.standardize("go");
        assert_eq!(result.standardized, "Go");
        assert_eq!(result.category, Category::Skill);

        let report = s.validate();
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.conflicts.len(), 1);
        assert!(report.conflicts[0].contains("Vue.JS"));
    }

    #[test]
    fn test_missing_files_yield_empty_tables() {
        let dir = tempfile::tempdir().unwrap();
        let s = KeywordStandardizer::load(dir.path()).unwrap();
        assert_eq!(s.stats().total_dictionary_entries, 0);
        assert_eq!(s.standardize("python").method, Method::None);
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            PATTERNS_FILE,
            "broken:\n  - pattern: '(unclosed'\n    replacement: x\n  - pattern: '\\bjs\\b'\n    replacement: JavaScript\n    type: abbreviation\n",
        );

        let s = KeywordStandardizer::load(dir.path()).unwrap();
        assert_eq!(s.stats().pattern_rules, 1);
        assert_eq!(s.validate().invalid_patterns, vec!["(unclosed".to_string()]);
        assert_eq!(s.standardize("js tooling").standardized, "JavaScript tooling");
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SKILLS_FILE, "core: [not, a, mapping");
        assert!(matches!(
            KeywordStandardizer::load(dir.path()),
            Err(StandardizationError::Yaml { .. })
        ));
    }

    #[test]
    fn test_reload_swaps_tables_and_keeps_old_on_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SKILLS_FILE, "core:\n  py: Python\n");
        let s = KeywordStandardizer::load(dir.path()).unwrap();

        let before = s.snapshot();
        write(dir.path(), SKILLS_FILE, "core:\n  py: Python\n  rs: Rust\n");
        let stats = s.reload().unwrap();
        assert_eq!(stats.skill_entries, 2);
        assert_eq!(s.standardize("rs").standardized, "Rust");
        // A snapshot taken before the reload is unaffected.
        assert_eq!(before.standardize("rs").standardized, "rs");

        write(dir.path(), SKILLS_FILE, "core: [broken");
        assert!(s.reload().is_err());
        assert_eq!(s.standardize("rs").standardized, "Rust");
    }
}
