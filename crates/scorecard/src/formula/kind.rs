use once_cell::sync::Lazy;
use regex::Regex;

use super::qualitative::{classify_response, is_textual};
use crate::hierarchy::FormulaKind;
use crate::rating::{ThresholdExpr, ThresholdSet};

static DESCRIPTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:describe|explain|list|provide|outline|summari[sz]e|comment)\b|\bdescription of\b|\bnarrative\b|\bmanual (?:input|entry|assessment)\b")
        .expect("descriptive pattern")
});
static QUALITATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\byes\s*/\s*no\b|\byes or no\b|\bwhether\b|^\s*(?:is|are|has|have|does|do|was|were)\s+(?:there|the|a|an)\b|\bin place\b|\bexistence of\b|\bavailability of\b")
        .expect("qualitative pattern")
});
static OPERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+*/×÷]|\s-\s|\s[xX]\s").expect("operator pattern"));

/// Infer how a criterion should be evaluated when its definition leaves the kind blank.
pub fn detect_kind(formula: &str, thresholds: &ThresholdSet) -> FormulaKind {
    let formula = formula.trim();
    if formula.is_empty() || DESCRIPTIVE.is_match(formula) {
        return FormulaKind::Descriptive;
    }
    if QUALITATIVE.is_match(formula) {
        return FormulaKind::Qualitative;
    }
    let textual_bands = thresholds
        .bands()
        .filter(|(_, text)| is_textual(text) && classify_response(text).is_some())
        .count();
    if textual_bands > 0 {
        return FormulaKind::Qualitative;
    }
    if OPERATOR.is_match(formula) {
        return FormulaKind::Quantitative;
    }
    if thresholds
        .bands()
        .any(|(_, text)| ThresholdExpr::parse(text).is_ok())
    {
        return FormulaKind::Quantitative;
    }
    FormulaKind::Descriptive
}
