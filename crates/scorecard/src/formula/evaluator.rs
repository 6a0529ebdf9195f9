use std::fmt;

use serde::{Deserialize, Serialize};

use super::expression::{Expr, ExpressionError};
use super::matcher::FormulaBinding;
use super::qualitative::{classify_response, QualitativeLabel};
use super::segment::{render, segment, Segment};
use crate::hierarchy::{AssessmentCriterion, FormulaKind};
use crate::store::{DataValue, ValueSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Calculated,
    Incomplete,
    Error,
}

impl EvaluationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EvaluationStatus::Calculated => "calculated",
            EvaluationStatus::Incomplete => "incomplete",
            EvaluationStatus::Error => "error",
        }
    }
}

/// Why a criterion did not produce a clean value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationIssue {
    NoMatchFound,
    IncompleteData { missing: Vec<String> },
    EvaluationError { message: String },
    UnrecognizedResponse { response: String },
    ManualInputRequired,
}

impl fmt::Display for EvaluationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationIssue::NoMatchFound => {
                f.write_str("formula does not reference any known data point")
            }
            EvaluationIssue::IncompleteData { missing } => {
                write!(f, "missing data: {}", missing.join(", "))
            }
            EvaluationIssue::EvaluationError { message } => f.write_str(message),
            EvaluationIssue::UnrecognizedResponse { response } => {
                write!(f, "unrecognized response '{response}'")
            }
            EvaluationIssue::ManualInputRequired => f.write_str("manual input required"),
        }
    }
}

/// A data point value substituted into a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub token: String,
    pub data_point: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub status: EvaluationStatus,
    /// 0 unless the status is `Calculated`.
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<QualitativeLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<EvaluationIssue>,
    #[serde(default)]
    pub inputs: Vec<EvaluationInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl Evaluation {
    fn calculated(value: f64, inputs: Vec<EvaluationInput>, expression: String) -> Self {
        Self {
            status: EvaluationStatus::Calculated,
            value,
            label: None,
            issue: None,
            inputs,
            expression: Some(expression),
        }
    }

    fn response(label: QualitativeLabel, inputs: Vec<EvaluationInput>) -> Self {
        Self {
            status: EvaluationStatus::Calculated,
            value: label.score(),
            label: Some(label),
            issue: None,
            inputs,
            expression: None,
        }
    }

    fn incomplete(issue: EvaluationIssue, inputs: Vec<EvaluationInput>) -> Self {
        Self {
            status: EvaluationStatus::Incomplete,
            value: 0.0,
            label: None,
            issue: Some(issue),
            inputs,
            expression: None,
        }
    }

    fn failed(issue: EvaluationIssue, inputs: Vec<EvaluationInput>) -> Self {
        Self {
            status: EvaluationStatus::Error,
            value: 0.0,
            label: None,
            issue: Some(issue),
            inputs,
            expression: None,
        }
    }

    pub fn is_calculated(&self) -> bool {
        self.status == EvaluationStatus::Calculated
    }

    pub fn message(&self) -> Option<String> {
        self.issue.as_ref().map(ToString::to_string)
    }
}

/// Evaluates linked criteria against a value source. Never panics and never returns `Err`:
/// every failure is folded into the returned [`Evaluation`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaEvaluator;

impl FormulaEvaluator {
    pub fn evaluate(
        &self,
        criterion: &AssessmentCriterion,
        values: &dyn ValueSource,
    ) -> Evaluation {
        self.evaluate_as(
            criterion.kind,
            &criterion.formula,
            &criterion.bindings,
            &criterion.data_points,
            values,
        )
    }

    pub fn evaluate_as(
        &self,
        kind: FormulaKind,
        formula: &str,
        bindings: &[FormulaBinding],
        declared: &[String],
        values: &dyn ValueSource,
    ) -> Evaluation {
        match kind {
            FormulaKind::Quantitative => self.quantitative(formula, bindings, values),
            FormulaKind::Qualitative => self.qualitative(bindings, declared, values),
            FormulaKind::Descriptive => {
                Evaluation::incomplete(EvaluationIssue::ManualInputRequired, Vec::new())
            }
        }
    }

    /// Substitute bound values into the segmented formula and evaluate the arithmetic.
    pub fn quantitative(
        &self,
        formula: &str,
        bindings: &[FormulaBinding],
        values: &dyn ValueSource,
    ) -> Evaluation {
        let mut substituted = Vec::new();
        let mut inputs: Vec<EvaluationInput> = Vec::new();
        let mut unbound: Vec<String> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        let mut bound_any = false;

        for piece in segment(formula) {
            let token = match piece {
                Segment::Reference(token) => token,
                other => {
                    substituted.push(other);
                    continue;
                }
            };
            let Some(binding) = bindings.iter().find(|binding| binding.token == token) else {
                push_unique(&mut unbound, token.clone());
                substituted.push(Segment::Reference(token));
                continue;
            };
            bound_any = true;
            match values.value(&binding.data_point) {
                Some(value) => {
                    let numeric = value.to_numeric();
                    if !inputs.iter().any(|input| input.token == token) {
                        inputs.push(EvaluationInput {
                            token: token.clone(),
                            data_point: binding.data_point.clone(),
                            value: numeric,
                        });
                    }
                    substituted.push(Segment::Number(numeric));
                }
                None => {
                    push_unique(&mut missing, binding.data_point.clone());
                    substituted.push(Segment::Reference(token));
                }
            }
        }

        if !bound_any {
            return Evaluation::incomplete(EvaluationIssue::NoMatchFound, inputs);
        }
        if !unbound.is_empty() || !missing.is_empty() {
            unbound.extend(missing);
            return Evaluation::incomplete(
                EvaluationIssue::IncompleteData { missing: unbound },
                inputs,
            );
        }

        let expression = render(&substituted);
        match Expr::from_segments(&substituted)
            .and_then(|expr| expr.without_percent_factor().evaluate())
        {
            Ok(value) => Evaluation::calculated(value, inputs, expression),
            Err(error) => {
                let mut evaluation = Evaluation::failed(
                    EvaluationIssue::EvaluationError {
                        message: error_message(&error),
                    },
                    inputs,
                );
                evaluation.expression = Some(expression);
                evaluation
            }
        }
    }

    /// Read the single referenced data point as a Yes / Partially Applied / No response.
    pub fn qualitative(
        &self,
        bindings: &[FormulaBinding],
        declared: &[String],
        values: &dyn ValueSource,
    ) -> Evaluation {
        let candidates = bindings
            .iter()
            .map(|binding| (binding.token.as_str(), binding.data_point.as_str()))
            .chain(declared.iter().map(|name| (name.as_str(), name.as_str())));

        let mut referenced = Vec::new();
        for (token, data_point) in candidates {
            if let Some(value) = values.value(data_point) {
                let input = EvaluationInput {
                    token: token.to_string(),
                    data_point: data_point.to_string(),
                    value: value.to_numeric(),
                };
                return match response_label(value) {
                    Some(label) => Evaluation::response(label, vec![input]),
                    None => Evaluation::failed(
                        EvaluationIssue::UnrecognizedResponse {
                            response: value.to_string(),
                        },
                        vec![input],
                    ),
                };
            }
            push_unique(&mut referenced, data_point.to_string());
        }

        if referenced.is_empty() {
            Evaluation::incomplete(EvaluationIssue::NoMatchFound, Vec::new())
        } else {
            Evaluation::incomplete(
                EvaluationIssue::IncompleteData {
                    missing: referenced,
                },
                Vec::new(),
            )
        }
    }
}

fn response_label(value: &DataValue) -> Option<QualitativeLabel> {
    match value {
        DataValue::Boolean(true) => Some(QualitativeLabel::Yes),
        DataValue::Boolean(false) => Some(QualitativeLabel::No),
        DataValue::Number(number) | DataValue::Percent(number) => Some(if *number >= 1.0 {
            QualitativeLabel::Yes
        } else if *number <= 0.0 {
            QualitativeLabel::No
        } else {
            QualitativeLabel::PartiallyApplied
        }),
        DataValue::Text(text) => classify_response(text),
        DataValue::Date(_) => None,
    }
}

fn error_message(error: &ExpressionError) -> String {
    match error {
        ExpressionError::UnresolvedReference(name) => {
            format!("formula text '{name}' is not a number or a data point")
        }
        other => other.to_string(),
    }
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}
