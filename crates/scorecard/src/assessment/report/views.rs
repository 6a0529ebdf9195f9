use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::formula::EvaluationStatus;
use crate::rating::Rating;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RatingCounts {
    pub good: usize,
    pub satisfactory: usize,
    pub needs_improvement: usize,
    pub unknown: usize,
}

impl RatingCounts {
    pub(crate) fn record(&mut self, rating: Rating) {
        match rating {
            Rating::Good => self.good += 1,
            Rating::Satisfactory => self.satisfactory += 1,
            Rating::NeedsImprovement => self.needs_improvement += 1,
            Rating::Unknown => self.unknown += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub calculated: usize,
    pub incomplete: usize,
    pub error: usize,
}

impl StatusCounts {
    pub(crate) fn record(&mut self, status: EvaluationStatus) {
        match status {
            EvaluationStatus::Calculated => self.calculated += 1,
            EvaluationStatus::Incomplete => self.incomplete += 1,
            EvaluationStatus::Error => self.error += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutiveSummary {
    pub overall: Option<f64>,
    pub rating: Rating,
    pub rating_label: &'static str,
    pub criteria: RatingCounts,
    pub signals: RatingCounts,
    pub key_topics: RatingCounts,
    pub statuses: StatusCounts,
    pub overridden: usize,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub key_topic: String,
    pub pillar: String,
    pub value: Option<f64>,
    pub rating: Rating,
    pub rating_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weakest_signal: Option<String>,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImprovementArea {
    pub criterion: String,
    pub performance_signal: String,
    pub key_topic: String,
    pub weight: f64,
    pub value: f64,
    pub rating_label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PillarTopic {
    pub name: String,
    pub value: Option<f64>,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PillarBreakdown {
    pub pillar: String,
    pub value: Option<f64>,
    pub rating: Rating,
    pub rating_label: &'static str,
    pub key_topics: Vec<PillarTopic>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentReportView {
    pub summary: ExecutiveSummary,
    pub recommendations: Vec<Recommendation>,
    pub improvement_areas: Vec<ImprovementArea>,
    pub pillars: Vec<PillarBreakdown>,
}
