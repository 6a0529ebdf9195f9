use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::formula::{EvaluationInput, EvaluationIssue, EvaluationStatus, QualitativeLabel};
use crate::hierarchy::{FormulaKind, Level};
use crate::rating::Rating;

/// Manual value entered by an operator for one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionOverride {
    /// Decimal-scale score; enters the signal average like a calculated value.
    Value(f64),
    Response(QualitativeLabel),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub name: String,
    pub performance_signal: String,
    pub kind: FormulaKind,
    pub weight: f64,
    /// 0 when the criterion did not calculate.
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<QualitativeLabel>,
    pub rating: Rating,
    pub status: EvaluationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<EvaluationIssue>,
    #[serde(default)]
    pub inputs: Vec<EvaluationInput>,
    #[serde(default)]
    pub overridden: bool,
    /// Whether the value takes part in the performance signal average.
    pub contributes: bool,
    pub calculated_at: DateTime<Utc>,
}

impl CriterionResult {
    pub fn message(&self) -> Option<String> {
        self.issue.as_ref().map(ToString::to_string)
    }

    pub(crate) fn contribution(&self) -> Option<f64> {
        self.contributes.then_some(self.value)
    }

    /// Value as shown to users: the response label for qualitative results.
    pub fn display_value(&self) -> String {
        match (self.label, self.status) {
            (Some(label), _) => label.label().to_string(),
            (None, EvaluationStatus::Calculated) => format!("{:.4}", self.value),
            (None, _) => String::new(),
        }
    }
}

/// Weighted roll-up of a performance signal or key topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupResult {
    pub name: String,
    pub parent: String,
    pub level: Level,
    pub weight: f64,
    pub value: Option<f64>,
    pub rating: Rating,
    pub status: EvaluationStatus,
    pub contributing: usize,
    pub skipped: usize,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallResult {
    pub value: Option<f64>,
    pub rating: Rating,
    pub contributing: usize,
    pub skipped: usize,
}

/// Everything one calculation run produced, in hierarchy order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub criteria: Vec<CriterionResult>,
    pub signals: Vec<RollupResult>,
    pub key_topics: Vec<RollupResult>,
    pub overall: OverallResult,
    pub calculated_at: DateTime<Utc>,
}

impl AssessmentResult {
    pub fn criterion(&self, name: &str) -> Option<&CriterionResult> {
        self.criteria.iter().find(|result| result.name == name)
    }

    pub fn signal(&self, name: &str) -> Option<&RollupResult> {
        self.signals.iter().find(|result| result.name == name)
    }

    pub fn key_topic(&self, name: &str) -> Option<&RollupResult> {
        self.key_topics.iter().find(|result| result.name == name)
    }

    pub fn criteria_for_signal<'a>(
        &'a self,
        signal: &'a str,
    ) -> impl Iterator<Item = &'a CriterionResult> + 'a {
        self.criteria
            .iter()
            .filter(move |result| result.performance_signal == signal)
    }

    pub fn signals_for_topic<'a>(
        &'a self,
        key_topic: &'a str,
    ) -> impl Iterator<Item = &'a RollupResult> + 'a {
        self.signals
            .iter()
            .filter(move |result| result.parent == key_topic)
    }
}
