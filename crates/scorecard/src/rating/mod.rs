//! Threshold-based rating bands.

mod threshold;

pub use threshold::{Comparison, ThresholdExpr, ThresholdParseError};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    Good,
    Satisfactory,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    Unknown,
}

impl Rating {
    pub const BANDS: [Rating; 3] = [Rating::Good, Rating::Satisfactory, Rating::NeedsImprovement];

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Good => "Good",
            Rating::Satisfactory => "Satisfactory",
            Rating::NeedsImprovement => "Needs Improvement",
            Rating::Unknown => "Unknown",
        }
    }
}

/// Threshold text per band, exactly as entered in the definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satisfactory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_improvement: Option<String>,
}

impl ThresholdSet {
    pub fn new(good: &str, satisfactory: &str, needs_improvement: &str) -> Self {
        let keep = |value: &str| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };
        Self {
            good: keep(good),
            satisfactory: keep(satisfactory),
            needs_improvement: keep(needs_improvement),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.good.is_none() && self.satisfactory.is_none() && self.needs_improvement.is_none()
    }

    pub fn get(&self, rating: Rating) -> Option<&str> {
        match rating {
            Rating::Good => self.good.as_deref(),
            Rating::Satisfactory => self.satisfactory.as_deref(),
            Rating::NeedsImprovement => self.needs_improvement.as_deref(),
            Rating::Unknown => None,
        }
    }

    /// Bands in precedence order, skipping blanks.
    pub fn bands(&self) -> impl Iterator<Item = (Rating, &str)> + '_ {
        Rating::BANDS
            .into_iter()
            .filter_map(move |rating| self.get(rating).map(|text| (rating, text)))
    }
}

/// A threshold that could not be read and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThresholdWarning {
    pub rating: Rating,
    pub threshold: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub rating: Rating,
    /// `true` when no supplied threshold matched and the default band decided.
    pub defaulted: bool,
    pub warnings: Vec<ThresholdWarning>,
}

/// Maps a decimal-scale value to a rating band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingClassifier {
    good_from: f64,
    satisfactory_from: f64,
}

impl Default for RatingClassifier {
    fn default() -> Self {
        Self {
            good_from: 0.9,
            satisfactory_from: 0.7,
        }
    }
}

impl RatingClassifier {
    pub fn classify(&self, value: f64, thresholds: &ThresholdSet) -> Rating {
        self.classify_with_warnings(value, thresholds).rating
    }

    /// Supplied thresholds are tried Good → Satisfactory → Needs Improvement, first match
    /// wins. Unreadable thresholds never match. When nothing matches the default band applies.
    pub fn classify_with_warnings(&self, value: f64, thresholds: &ThresholdSet) -> Classification {
        if !value.is_finite() {
            return Classification {
                rating: Rating::Unknown,
                defaulted: false,
                warnings: Vec::new(),
            };
        }

        let mut warnings = Vec::new();
        for (rating, text) in thresholds.bands() {
            match ThresholdExpr::parse(text) {
                Ok(expr) if expr.matches(value) => {
                    return Classification {
                        rating,
                        defaulted: false,
                        warnings,
                    };
                }
                Ok(_) => {}
                Err(error) => warnings.push(ThresholdWarning {
                    rating,
                    threshold: text.to_string(),
                    reason: error.to_string(),
                }),
            }
        }

        Classification {
            rating: self.default_band(value),
            defaulted: true,
            warnings,
        }
    }

    pub fn default_band(&self, value: f64) -> Rating {
        if !value.is_finite() {
            Rating::Unknown
        } else if value >= self.good_from {
            Rating::Good
        } else if value >= self.satisfactory_from {
            Rating::Satisfactory
        } else {
            Rating::NeedsImprovement
        }
    }
}
