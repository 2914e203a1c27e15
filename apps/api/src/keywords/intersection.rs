//! Two-round agreement. Keywords both rounds produced are the most reliable;
//! when too few agree, the union tops the list up.

use std::collections::HashSet;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    PureIntersection,
    Supplement,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionStats {
    pub intersection_count: usize,
    pub round1_count: usize,
    pub round2_count: usize,
    pub total_available: usize,
    pub final_count: usize,
    pub supplement_count: usize,
    pub strategy_used: Strategy,
    pub warning: bool,
    pub warning_message: String,
}

impl Default for IntersectionStats {
    fn default() -> Self {
        Self {
            intersection_count: 0,
            round1_count: 0,
            round2_count: 0,
            total_available: 0,
            final_count: 0,
            supplement_count: 0,
            strategy_used: Strategy::None,
            warning: false,
            warning_message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntersectionSettings {
    /// Shared keywords needed to use the intersection alone.
    pub min_intersection: usize,
    /// Fewer keywords than this after supplementing raises a warning.
    pub expected_minimum: usize,
    pub max_keywords: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub keywords: Vec<String>,
    pub stats: IntersectionStats,
}

/// Rounds are expected de-duplicated. Matching ignores case; round 1's
/// spelling and order win.
pub fn select(round1: &[String], round2: &[String], settings: IntersectionSettings) -> Selection {
    let first: HashSet<String> = round1.iter().map(|k| key(k)).collect();
    let second: HashSet<String> = round2.iter().map(|k| key(k)).collect();

    let shared: Vec<&String> = round1.iter().filter(|k| second.contains(&key(k))).collect();
    let intersection_count = shared.len();
    let total_available = first.union(&second).count();

    let (keywords, strategy, warning_message) = if intersection_count >= settings.min_intersection {
        let keywords: Vec<String> = shared
            .into_iter()
            .take(settings.max_keywords)
            .cloned()
            .collect();
        (keywords, Strategy::PureIntersection, String::new())
    } else {
        let only_first = round1.iter().filter(|k| !second.contains(&key(k)));
        let only_second = round2.iter().filter(|k| !first.contains(&key(k)));
        let keywords: Vec<String> = shared
            .into_iter()
            .chain(only_first)
            .chain(only_second)
            .take(settings.max_keywords)
            .cloned()
            .collect();

        let message = if keywords.len() < settings.expected_minimum {
            format!(
                "Only {} keywords could be extracted. The job description may be too brief.",
                keywords.len()
            )
        } else {
            String::new()
        };
        (keywords, Strategy::Supplement, message)
    };

    let stats = IntersectionStats {
        intersection_count,
        round1_count: round1.len(),
        round2_count: round2.len(),
        total_available,
        final_count: keywords.len(),
        supplement_count: keywords.len().saturating_sub(intersection_count),
        strategy_used: strategy,
        warning: !warning_message.is_empty(),
        warning_message,
    };

    Selection { keywords, stats }
}

fn key(keyword: &str) -> String {
    keyword.to_lowercase()
}
