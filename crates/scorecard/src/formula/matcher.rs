//! Fuzzy linking between formula reference phrases and data point names.
//!
//! Scoring is tiered: an exact name, then a shared uppercase abbreviation, then a
//! base-name substring, then stop-word-filtered word overlap. Only the single best match per
//! phrase is kept, and only when it clears the configured confidence threshold.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::segment::references;
use crate::config::EngineConfig;

const STOP_WORDS: &[&str] = &[
    "the", "of", "and", "for", "with", "from", "to", "in", "on", "at", "by", "a", "an", "value",
    "number", "total", "no",
];

const DOMAIN_KEYWORDS: &[&str] = &[
    "earned",
    "planned",
    "actual",
    "budget",
    "cost",
    "milestone",
    "milestones",
    "completion",
    "approved",
    "original",
    "latest",
    "construction",
    "risk",
    "risks",
    "schedule",
    "design",
    "contract",
    "change",
    "variance",
    "forecast",
    "baseline",
    "procurement",
    "safety",
    "quality",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Abbreviation,
    Substring,
    WordOverlap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPointMatch {
    pub data_point: String,
    pub confidence: f64,
    pub method: MatchMethod,
}

/// Persisted link from a formula phrase to the data point that supplies its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaBinding {
    pub token: String,
    pub data_point: String,
    pub confidence: f64,
    pub method: MatchMethod,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindOutcome {
    pub bindings: Vec<FormulaBinding>,
    pub unresolved: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormulaMatcher {
    threshold: f64,
}

impl Default for FormulaMatcher {
    fn default() -> Self {
        Self::new(EngineConfig::DEFAULT_MATCH_THRESHOLD)
    }
}

impl FormulaMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score one phrase against one data point name. `None` when no heuristic applies.
    pub fn score(&self, token: &str, data_point: &str) -> Option<DataPointMatch> {
        let matched = |confidence: f64, method| DataPointMatch {
            data_point: data_point.to_string(),
            confidence,
            method,
        };

        if token.trim().eq_ignore_ascii_case(data_point.trim()) {
            return Some(matched(1.0, MatchMethod::Exact));
        }

        let dp_abbreviations = parenthetical_abbreviations(data_point);
        if !dp_abbreviations.is_empty() {
            if parenthetical_abbreviations(token)
                .iter()
                .any(|abbreviation| dp_abbreviations.contains(abbreviation))
            {
                return Some(matched(0.98, MatchMethod::Abbreviation));
            }
            // A phrase naming two abbreviations (`EV AC`) cannot stand for either one.
            let mut words: Vec<&str> = bare_words(token).collect();
            words.sort_unstable();
            words.dedup();
            if words.len() == 1 && dp_abbreviations.contains(&words[0]) {
                return Some(matched(0.95, MatchMethod::Abbreviation));
            }
        }

        let token_base = normalized(base_name(token));
        let dp_base = normalized(base_name(data_point));
        if token_base.len() >= 3 && dp_base.len() >= 3 {
            if token_base == dp_base {
                return Some(matched(0.98, MatchMethod::Substring));
            }
            if token_base.contains(&dp_base) || dp_base.contains(&token_base) {
                let shorter = token_base.len().min(dp_base.len()) as f64;
                let longer = token_base.len().max(dp_base.len()) as f64;
                let coverage = shorter / longer;
                return Some(matched(0.85 + 0.13 * coverage, MatchMethod::Substring));
            }
        }

        let token_words = content_words(&token_base);
        let dp_words = content_words(&dp_base);
        if token_words.is_empty() || dp_words.is_empty() {
            return None;
        }
        let shared: Vec<&String> = token_words.intersection(&dp_words).collect();
        if shared.is_empty() {
            return None;
        }
        let formula_coverage = shared.len() as f64 / token_words.len() as f64;
        let dp_coverage = shared.len() as f64 / dp_words.len() as f64;
        let mut confidence = (0.8 * formula_coverage + 0.2 * dp_coverage) * 0.85;
        if shared
            .iter()
            .any(|word| DOMAIN_KEYWORDS.contains(&word.as_str()))
        {
            confidence *= 1.3;
        }
        Some(matched(confidence.min(0.9), MatchMethod::WordOverlap))
    }

    /// Highest-confidence candidate at or above the threshold. Ties go to the longer base
    /// name, then the lexically smaller full name.
    pub fn best_match<S: AsRef<str>>(
        &self,
        token: &str,
        candidates: &[S],
    ) -> Option<DataPointMatch> {
        candidates
            .iter()
            .filter_map(|candidate| self.score(token, candidate.as_ref()))
            .filter(|candidate| candidate.confidence >= self.threshold)
            .min_by(rank)
    }

    /// Resolve every reference phrase in `formula` against `candidates`.
    pub fn bind<S: AsRef<str>>(&self, formula: &str, candidates: &[S]) -> BindOutcome {
        self.bind_tokens(&references(formula), candidates)
    }

    pub fn bind_tokens<S: AsRef<str>>(&self, tokens: &[String], candidates: &[S]) -> BindOutcome {
        let mut outcome = BindOutcome::default();
        for token in tokens {
            match self.best_match(token, candidates) {
                Some(found) => outcome.bindings.push(FormulaBinding {
                    token: token.clone(),
                    data_point: found.data_point,
                    confidence: found.confidence,
                    method: found.method,
                }),
                None => outcome.unresolved.push(token.clone()),
            }
        }
        outcome
    }

    /// Data points referenced by `formula`, one per phrase, strongest first.
    pub fn match_formula<S: AsRef<str>>(
        &self,
        formula: &str,
        candidates: &[S],
    ) -> Vec<DataPointMatch> {
        let mut matches: Vec<DataPointMatch> = Vec::new();
        for token in references(formula) {
            if let Some(found) = self.best_match(&token, candidates) {
                match matches
                    .iter_mut()
                    .find(|existing| existing.data_point == found.data_point)
                {
                    Some(existing) if existing.confidence < found.confidence => *existing = found,
                    Some(_) => {}
                    None => matches.push(found),
                }
            }
        }
        matches.sort_by(rank);
        matches
    }
}

fn rank(left: &DataPointMatch, right: &DataPointMatch) -> Ordering {
    right
        .confidence
        .total_cmp(&left.confidence)
        .then_with(|| base_name(&right.data_point).len().cmp(&base_name(&left.data_point).len()))
        .then_with(|| left.data_point.cmp(&right.data_point))
}

/// Name with every trailing parenthetical removed: `Earned Value (EV) (No.)` → `Earned Value`.
pub fn base_name(name: &str) -> &str {
    let mut current = name.trim_end();
    while current.ends_with(')') {
        let Some(open) = current.rfind('(') else {
            break;
        };
        let stripped = current[..open].trim_end();
        if stripped.is_empty() {
            break;
        }
        current = stripped;
    }
    current
}

fn parenthetical_abbreviations(name: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = name;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(')') else {
            break;
        };
        let inner = after[..close].trim();
        if is_abbreviation(inner) {
            found.push(inner);
        }
        rest = &after[close + 1..];
    }
    found
}

fn is_abbreviation(candidate: &str) -> bool {
    candidate.chars().count() >= 2
        && candidate
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_uppercase())
        && candidate
            .chars()
            .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '&')
}

fn bare_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|ch: char| !(ch.is_alphanumeric() || ch == '&'))
        .filter(|word| is_abbreviation(word))
}

fn normalized(text: &str) -> String {
    text.chars()
        .map(|ch| {
            if ch.is_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn content_words(normalized: &str) -> HashSet<String> {
    normalized
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const POINTS: [&str; 4] = [
        "Earned Value (EV) (No.)",
        "Planned Value (PV) (No.)",
        "Actual Cost (AC) (No.)",
        "Approved Budget (No.)",
    ];

    #[test]
    fn base_name_strips_all_trailing_parentheticals() {
        assert_eq!(base_name("Earned Value (EV) (No.)"), "Earned Value");
        assert_eq!(base_name("Budget"), "Budget");
        assert_eq!(base_name("(EV)"), "(EV)");
    }

    #[test]
    fn parenthesised_abbreviation_scores_highest() {
        let matcher = FormulaMatcher::default();
        let found = matcher
            .score("Earned Value (EV)", POINTS[0])
            .expect("abbreviation matches");
        assert_eq!(found.method, MatchMethod::Abbreviation);
        assert_eq!(found.confidence, 0.98);

        let bare = matcher.score("EV", POINTS[0]).expect("bare abbreviation");
        assert_eq!(bare.confidence, 0.95);
    }

    #[test]
    fn phrase_with_two_abbreviations_binds_to_neither() {
        let matcher = FormulaMatcher::default();
        assert!(matcher.score("EV AC", POINTS[0]).is_none());
        assert!(matcher.score("EV-AC", POINTS[2]).is_none());

        let joined = matcher.bind_tokens(&["EV-AC".to_string()], &POINTS);
        assert!(joined.bindings.is_empty());
        assert_eq!(joined.unresolved, vec!["EV-AC".to_string()]);

        let split = matcher.bind("EV-AC", &POINTS);
        assert!(split.unresolved.is_empty());
        let bound: Vec<&str> = split
            .bindings
            .iter()
            .map(|binding| binding.data_point.as_str())
            .collect();
        assert_eq!(bound, vec![POINTS[0], POINTS[2]]);
    }

    #[test]
    fn abbreviations_are_case_sensitive() {
        let matcher = FormulaMatcher::default();
        assert!(matcher.score("ev", POINTS[0]).is_none());
    }

    #[test]
    fn substring_confidence_scales_with_coverage() {
        let matcher = FormulaMatcher::default();
        let exact = matcher
            .score("Approved Budget", POINTS[3])
            .expect("same base");
        assert_eq!(exact.confidence, 0.98);
        let partial = matcher
            .score("Latest Approved Budget", POINTS[3])
            .expect("substring");
        assert_eq!(partial.method, MatchMethod::Substring);
        assert!(partial.confidence > 0.85 && partial.confidence < 0.98);
    }

    #[test]
    fn word_overlap_is_boosted_by_domain_keywords_and_capped() {
        let matcher = FormulaMatcher::default();
        let found = matcher
            .score("Total budget approved by board", POINTS[3])
            .expect("overlap");
        assert_eq!(found.method, MatchMethod::WordOverlap);
        assert!(found.confidence <= 0.9);
        assert!(found.confidence >= 0.5);

        let weak = matcher
            .score("Number of staff meetings", "Staff headcount (No.)")
            .expect("overlap");
        assert!(weak.confidence < 0.5);
    }

    #[test]
    fn binds_each_phrase_to_its_best_point() {
        let outcome =
            FormulaMatcher::default().bind("Earned Value (EV) / Planned Value (PV)", &POINTS);
        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.bindings.len(), 2);
        assert_eq!(outcome.bindings[0].data_point, "Earned Value (EV) (No.)");
        assert_eq!(outcome.bindings[1].data_point, "Planned Value (PV) (No.)");
    }

    #[test]
    fn unknown_phrases_stay_unresolved() {
        let outcome = FormulaMatcher::default().bind("Weather index / Planned Value (PV)", &POINTS);
        assert_eq!(outcome.unresolved, vec!["Weather index".to_string()]);
        assert_eq!(outcome.bindings.len(), 1);
    }

    #[test]
    fn ties_prefer_longer_base_name_then_lexical_order() {
        let matcher = FormulaMatcher::default();
        let candidates = ["Cost (A)", "Cost (B)"];
        let found = matcher.best_match("Cost", &candidates).expect("match");
        assert_eq!(found.data_point, "Cost (A)");

        let candidates = ["Value (EV)", "Earned Value (EV)"];
        let found = matcher.best_match("EV", &candidates).expect("match");
        assert_eq!(found.data_point, "Earned Value (EV)");
    }

    #[test]
    fn match_formula_keeps_one_entry_per_point() {
        let matches = FormulaMatcher::default().match_formula(
            "(Actual Cost (AC) - Earned Value (EV)) / Earned Value (EV)",
            &POINTS,
        );
        let names: Vec<&str> = matches
            .iter()
            .map(|found| found.data_point.as_str())
            .collect();
        assert_eq!(names, vec!["Earned Value (EV) (No.)", "Actual Cost (AC) (No.)"]);
    }

    #[test]
    fn threshold_filters_weak_matches() {
        let strict = FormulaMatcher::new(0.99);
        assert!(strict.best_match("Earned Value (EV)", &POINTS).is_none());
        let exact = strict.best_match("Approved Budget (No.)", &POINTS);
        assert_eq!(
            exact.map(|found| found.method),
            Some(MatchMethod::Exact)
        );
    }
}
