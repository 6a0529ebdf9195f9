use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::evaluator::{Evaluation, FormulaEvaluator};
use super::kind::detect_kind;
use super::matcher::{FormulaBinding, FormulaMatcher};
use super::qualitative::rating_for;
use crate::hierarchy::FormulaKind;
use crate::rating::{Rating, RatingClassifier, ThresholdSet};
use crate::store::DataValue;

/// Ad-hoc formula evaluation request, independent of any hierarchy.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewRequest {
    pub formula: String,
    #[serde(default)]
    pub kind: Option<FormulaKind>,
    /// Raw entries keyed by data point name; types are inferred.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub thresholds: ThresholdSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewOutcome {
    pub kind: FormulaKind,
    pub bindings: Vec<FormulaBinding>,
    pub unresolved: Vec<String>,
    pub evaluation: Evaluation,
    pub rating: Rating,
}

/// Bind, evaluate and rate a single formula against the supplied values.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaPreview {
    matcher: FormulaMatcher,
    evaluator: FormulaEvaluator,
    classifier: RatingClassifier,
}

impl FormulaPreview {
    pub fn new(matcher: FormulaMatcher) -> Self {
        Self {
            matcher,
            ..Self::default()
        }
    }

    pub fn run(&self, request: &PreviewRequest) -> PreviewOutcome {
        let values: BTreeMap<String, DataValue> = request
            .values
            .iter()
            .map(|(name, raw)| (name.clone(), DataValue::infer(raw)))
            .collect();
        let names: Vec<&str> = values.keys().map(String::as_str).collect();
        let kind = request
            .kind
            .unwrap_or_else(|| detect_kind(&request.formula, &request.thresholds));
        let bound = self.matcher.bind(&request.formula, &names);

        let declared: Vec<String> = if bound.bindings.is_empty() && names.len() == 1 {
            names.iter().map(|name| name.to_string()).collect()
        } else {
            Vec::new()
        };
        let evaluation = self.evaluator.evaluate_as(
            kind,
            &request.formula,
            &bound.bindings,
            &declared,
            &values,
        );

        let rating = match (kind, evaluation.label) {
            (_, Some(label)) => rating_for(label, &request.thresholds),
            (FormulaKind::Quantitative, None) if evaluation.is_calculated() => self
                .classifier
                .classify(evaluation.value, &request.thresholds),
            _ => Rating::Unknown,
        };

        PreviewOutcome {
            kind,
            bindings: bound.bindings,
            unresolved: bound.unresolved,
            evaluation,
            rating,
        }
    }
}
