use serde::Serialize;

use super::{FormulaKind, Hierarchy, WeightIssue};
use crate::formula::{qualitative_options, FormulaBinding, QualitativeOption};
use crate::rating::ThresholdSet;

/// Read-only tree view of the hierarchy for API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyOutline {
    pub pillars: Vec<String>,
    pub key_topics: Vec<KeyTopicOutline>,
    pub data_points: usize,
    pub weight_issues: Vec<WeightIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyTopicOutline {
    pub name: String,
    pub pillar: String,
    pub signals: Vec<SignalOutline>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalOutline {
    pub name: String,
    pub weight: f64,
    pub criteria: Vec<CriterionOutline>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriterionOutline {
    pub name: String,
    pub weight: f64,
    pub kind: FormulaKind,
    pub formula: String,
    pub data_points: Vec<String>,
    pub bindings: Vec<FormulaBinding>,
    #[serde(skip_serializing_if = "ThresholdSet::is_empty")]
    pub thresholds: ThresholdSet,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QualitativeOption>,
}

impl Hierarchy {
    pub fn outline(&self) -> HierarchyOutline {
        let key_topics = self
            .key_topics()
            .iter()
            .map(|topic| KeyTopicOutline {
                name: topic.name.clone(),
                pillar: topic.pillar.clone(),
                signals: self
                    .signals_for_topic(topic)
                    .map(|signal| SignalOutline {
                        name: signal.name.clone(),
                        weight: signal.weight,
                        criteria: self
                            .criteria_for_signal(signal)
                            .map(|criterion| CriterionOutline {
                                name: criterion.name.clone(),
                                weight: criterion.weight,
                                kind: criterion.kind,
                                formula: criterion.formula.clone(),
                                data_points: criterion.data_points.clone(),
                                bindings: criterion.bindings.clone(),
                                thresholds: criterion.thresholds.clone(),
                                options: if criterion.kind == FormulaKind::Qualitative {
                                    qualitative_options(&criterion.thresholds)
                                } else {
                                    Vec::new()
                                },
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        HierarchyOutline {
            pillars: self.pillars().into_iter().map(str::to_string).collect(),
            key_topics,
            data_points: self.data_points().len(),
            weight_issues: self.weight_issues(),
        }
    }
}
