use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::result::{
    AssessmentResult, CriterionOverride, CriterionResult, OverallResult, RollupResult,
};
use crate::aggregation::{AggregateOutcome, Aggregator, WeightedValue};
use crate::formula::{rating_for, EvaluationIssue, EvaluationStatus, FormulaEvaluator};
use crate::hierarchy::{AssessmentCriterion, FormulaKind, Hierarchy, Level};
use crate::rating::{Rating, RatingClassifier, ThresholdSet};
use crate::store::ValueSource;

pub type Overrides = BTreeMap<String, CriterionOverride>;

/// Runs full and incremental calculations over a linked hierarchy.
#[derive(Debug, Clone)]
pub struct AssessmentEngine {
    hierarchy: Arc<Hierarchy>,
    evaluator: FormulaEvaluator,
    classifier: RatingClassifier,
    aggregator: Aggregator,
}

impl AssessmentEngine {
    pub fn new(hierarchy: Arc<Hierarchy>) -> Self {
        Self {
            hierarchy,
            evaluator: FormulaEvaluator,
            classifier: RatingClassifier::default(),
            aggregator: Aggregator::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: RatingClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchy
    }

    /// Evaluate every criterion and roll the results up to the overall score.
    pub fn calculate(&self, values: &dyn ValueSource, overrides: &Overrides) -> AssessmentResult {
        let now = Utc::now();
        let criteria = self
            .hierarchy
            .criteria()
            .iter()
            .map(|criterion| self.evaluate_criterion(criterion, values, overrides, now))
            .collect();
        let result = self.roll_up(criteria, None, &BTreeSet::new(), now);
        log_run("full", &result);
        result
    }

    /// Re-evaluate only the criteria affected by the changed data points or overrides, then
    /// recompute the roll-ups above them. Untouched entries are carried over from `previous`.
    pub fn recalculate(
        &self,
        previous: &AssessmentResult,
        changed_data_points: &[String],
        changed_criteria: &[String],
        values: &dyn ValueSource,
        overrides: &Overrides,
    ) -> AssessmentResult {
        let now = Utc::now();
        let mut dirty: BTreeSet<&str> = changed_criteria.iter().map(String::as_str).collect();
        for data_point in changed_data_points {
            dirty.extend(
                self.hierarchy
                    .criteria_for_data_point(data_point)
                    .iter()
                    .map(String::as_str),
            );
        }

        let mut dirty_signals = BTreeSet::new();
        let criteria = self
            .hierarchy
            .criteria()
            .iter()
            .map(|criterion| {
                let reusable = previous
                    .criterion(&criterion.name)
                    .filter(|_| !dirty.contains(criterion.name.as_str()));
                match reusable {
                    Some(result) => result.clone(),
                    None => {
                        dirty_signals.insert(criterion.performance_signal.clone());
                        self.evaluate_criterion(criterion, values, overrides, now)
                    }
                }
            })
            .collect();

        debug!(
            criteria = dirty.len(),
            signals = dirty_signals.len(),
            "incremental recalculation"
        );
        let result = self.roll_up(criteria, Some(previous), &dirty_signals, now);
        log_run("incremental", &result);
        result
    }

    pub fn evaluate_criterion(
        &self,
        criterion: &AssessmentCriterion,
        values: &dyn ValueSource,
        overrides: &Overrides,
        now: DateTime<Utc>,
    ) -> CriterionResult {
        if let Some(manual) = overrides.get(&criterion.name) {
            return self.overridden(criterion, *manual, now);
        }

        let evaluation = self.evaluator.evaluate(criterion, values);
        let rating = match (evaluation.status, evaluation.label) {
            (EvaluationStatus::Calculated, Some(label)) => rating_for(label, &criterion.thresholds),
            (EvaluationStatus::Calculated, None) => {
                self.classify(evaluation.value, &criterion.thresholds)
            }
            _ => Rating::Unknown,
        };
        let contributes = evaluation.is_calculated()
            && evaluation.label.is_none()
            && criterion.kind != FormulaKind::Qualitative;

        if !evaluation.is_calculated() {
            debug!(
                ac = %criterion.name,
                status = evaluation.status.label(),
                issue = %evaluation.message().unwrap_or_default(),
                "criterion not calculated"
            );
        }

        CriterionResult {
            name: criterion.name.clone(),
            performance_signal: criterion.performance_signal.clone(),
            kind: criterion.kind,
            weight: criterion.weight,
            value: evaluation.value,
            label: evaluation.label,
            rating,
            status: evaluation.status,
            issue: evaluation.issue,
            inputs: evaluation.inputs,
            overridden: false,
            contributes,
            calculated_at: now,
        }
    }

    fn overridden(
        &self,
        criterion: &AssessmentCriterion,
        manual: CriterionOverride,
        now: DateTime<Utc>,
    ) -> CriterionResult {
        let valid = !matches!(manual, CriterionOverride::Value(value) if !value.is_finite());
        let (value, label, rating, contributes) = match manual {
            CriterionOverride::Value(value) if value.is_finite() => (
                value,
                None,
                self.classify(value, &criterion.thresholds),
                true,
            ),
            CriterionOverride::Value(_) => (0.0, None, Rating::Unknown, false),
            CriterionOverride::Response(label) => (
                label.score(),
                Some(label),
                rating_for(label, &criterion.thresholds),
                false,
            ),
        };
        CriterionResult {
            name: criterion.name.clone(),
            performance_signal: criterion.performance_signal.clone(),
            kind: criterion.kind,
            weight: criterion.weight,
            value,
            label,
            rating,
            status: if valid {
                EvaluationStatus::Calculated
            } else {
                EvaluationStatus::Error
            },
            issue: (!valid).then(|| EvaluationIssue::EvaluationError {
                message: "override is not a finite number".to_string(),
            }),
            inputs: Vec::new(),
            overridden: true,
            contributes,
            calculated_at: now,
        }
    }

    fn roll_up(
        &self,
        criteria: Vec<CriterionResult>,
        previous: Option<&AssessmentResult>,
        dirty_signals: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> AssessmentResult {
        let mut dirty_topics = BTreeSet::new();
        let signals: Vec<RollupResult> = self
            .hierarchy
            .signals()
            .iter()
            .map(|signal| {
                let reusable = previous
                    .and_then(|result| result.signal(&signal.name))
                    .filter(|_| !dirty_signals.contains(&signal.name));
                if let Some(result) = reusable {
                    return result.clone();
                }
                dirty_topics.insert(signal.key_topic.clone());
                let children: Vec<WeightedValue> = criteria
                    .iter()
                    .filter(|result| result.performance_signal == signal.name)
                    .map(|result| WeightedValue::new(result.contribution(), result.weight))
                    .collect();
                self.rollup(
                    &signal.name,
                    &signal.key_topic,
                    Level::PerformanceSignal,
                    signal.weight,
                    self.aggregator.aggregate(&children),
                    &signal.thresholds,
                    now,
                )
            })
            .collect();

        let key_topics: Vec<RollupResult> = self
            .hierarchy
            .key_topics()
            .iter()
            .map(|topic| {
                let reusable = previous
                    .and_then(|result| result.key_topic(&topic.name))
                    .filter(|_| !dirty_topics.contains(&topic.name));
                if let Some(result) = reusable {
                    return result.clone();
                }
                let children: Vec<WeightedValue> = signals
                    .iter()
                    .filter(|result| result.parent == topic.name)
                    .map(|result| WeightedValue::new(result.value, result.weight))
                    .collect();
                self.rollup(
                    &topic.name,
                    &topic.pillar,
                    Level::KeyTopic,
                    0.0,
                    self.aggregator.aggregate(&children),
                    &topic.thresholds,
                    now,
                )
            })
            .collect();

        let topic_values: Vec<Option<f64>> = key_topics.iter().map(|result| result.value).collect();
        let outcome = self.aggregator.overall(&topic_values);
        let overall = OverallResult {
            value: outcome.value,
            rating: outcome
                .value
                .map(|value| self.classifier.default_band(value))
                .unwrap_or(Rating::Unknown),
            contributing: outcome.contributing,
            skipped: outcome.skipped,
        };

        AssessmentResult {
            criteria,
            signals,
            key_topics,
            overall,
            calculated_at: now,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn rollup(
        &self,
        name: &str,
        parent: &str,
        level: Level,
        weight: f64,
        outcome: AggregateOutcome,
        thresholds: &ThresholdSet,
        now: DateTime<Utc>,
    ) -> RollupResult {
        let (rating, status) = match outcome.value {
            Some(value) => (
                self.classify(value, thresholds),
                EvaluationStatus::Calculated,
            ),
            None => (Rating::Unknown, EvaluationStatus::Incomplete),
        };
        RollupResult {
            name: name.to_string(),
            parent: parent.to_string(),
            level,
            weight,
            value: outcome.value,
            rating,
            status,
            contributing: outcome.contributing,
            skipped: outcome.skipped,
            calculated_at: now,
        }
    }

    fn classify(&self, value: f64, thresholds: &ThresholdSet) -> Rating {
        let classification = self.classifier.classify_with_warnings(value, thresholds);
        for warning in &classification.warnings {
            debug!(
                threshold = %warning.threshold,
                reason = %warning.reason,
                "threshold ignored"
            );
        }
        classification.rating
    }
}

fn log_run(mode: &'static str, result: &AssessmentResult) {
    let calculated = result
        .criteria
        .iter()
        .filter(|criterion| criterion.status == EvaluationStatus::Calculated)
        .count();
    info!(
        mode,
        criteria = result.criteria.len(),
        calculated,
        overall = result.overall.value,
        rating = result.overall.rating.label(),
        "assessment calculated"
    );
}
