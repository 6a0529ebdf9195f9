use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::rating::{Rating, ThresholdExpr, ThresholdSet};

/// Standard response for yes/no style criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualitativeLabel {
    Yes,
    PartiallyApplied,
    No,
}

impl QualitativeLabel {
    pub fn label(&self) -> &'static str {
        match self {
            QualitativeLabel::Yes => "Yes",
            QualitativeLabel::PartiallyApplied => "Partially Applied",
            QualitativeLabel::No => "No",
        }
    }

    /// Display score; qualitative results never enter weighted averages.
    pub fn score(&self) -> f64 {
        match self {
            QualitativeLabel::Yes => 1.0,
            QualitativeLabel::PartiallyApplied => 0.5,
            QualitativeLabel::No => 0.0,
        }
    }

    pub fn default_rating(&self) -> Rating {
        match self {
            QualitativeLabel::Yes => Rating::Good,
            QualitativeLabel::PartiallyApplied => Rating::Satisfactory,
            QualitativeLabel::No => Rating::NeedsImprovement,
        }
    }
}

static NEGATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:not|non|none|never)\b").expect("negation pattern"));
static PARTIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:partial|partially|partly|in progress|ongoing|some|inadequate|limited)\b")
        .expect("partial pattern")
});
static AFFIRMATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:yes|y|true|complete|completed|applied|full|fully|implemented|compliant|conducted|documented|established|approved|available|in place|done)\b",
    )
    .expect("affirmative pattern")
});
static DENIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:no|n|false|absent|missing)\b").expect("denial pattern"));

/// Map free-text input to a standard label. Negations win over partial markers, which win
/// over affirmatives, so `Yes, but inadequate` reads as partial and `Not applied` as no.
pub fn classify_response(text: &str) -> Option<QualitativeLabel> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else if NEGATION.is_match(trimmed) {
        Some(QualitativeLabel::No)
    } else if PARTIAL.is_match(trimmed) {
        Some(QualitativeLabel::PartiallyApplied)
    } else if AFFIRMATIVE.is_match(trimmed) {
        Some(QualitativeLabel::Yes)
    } else if DENIAL.is_match(trimmed) {
        Some(QualitativeLabel::No)
    } else {
        None
    }
}

/// Rating for a response. Threshold text that reads as the same label decides first.
pub fn rating_for(label: QualitativeLabel, thresholds: &ThresholdSet) -> Rating {
    thresholds
        .bands()
        .find(|(_, text)| is_textual(text) && classify_response(text) == Some(label))
        .map(|(rating, _)| rating)
        .unwrap_or_else(|| label.default_rating())
}

/// Selectable response for a qualitative criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualitativeOption {
    pub text: String,
    pub label: QualitativeLabel,
    pub rating: Rating,
}

/// Options offered for a criterion, read from textual thresholds when present.
pub fn qualitative_options(thresholds: &ThresholdSet) -> Vec<QualitativeOption> {
    let from_thresholds: Vec<QualitativeOption> = thresholds
        .bands()
        .filter(|(_, text)| is_textual(text))
        .filter_map(|(rating, text)| {
            classify_response(text).map(|label| QualitativeOption {
                text: text.to_string(),
                label,
                rating,
            })
        })
        .collect();

    if !from_thresholds.is_empty() {
        return from_thresholds;
    }

    [
        QualitativeLabel::Yes,
        QualitativeLabel::PartiallyApplied,
        QualitativeLabel::No,
    ]
    .into_iter()
    .map(|label| QualitativeOption {
        text: label.label().to_string(),
        label,
        rating: label.default_rating(),
    })
    .collect()
}

pub(crate) fn is_textual(threshold: &str) -> bool {
    ThresholdExpr::parse(threshold).is_err() && threshold.chars().any(char::is_alphabetic)
}
