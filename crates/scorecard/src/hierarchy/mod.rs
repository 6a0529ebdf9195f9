//! Static KT → PS → AC → DP tables built once from a master definition.
//!
//! The hierarchy is read-only to the calculation engine. Parent/child lists are derived from
//! the parent references carried by each entry, so a definition only has to name the parent
//! once per row. Formula bindings are attached by [`Hierarchy::link_formulas`].

pub mod domain;
pub mod import;
mod outline;
mod weights;

pub use domain::{
    AssessmentCriterion, DataPointDef, DataType, FormulaKind, KeyTopic, Level, PerformanceSignal,
};
pub use outline::{CriterionOutline, HierarchyOutline, KeyTopicOutline, SignalOutline};
pub use weights::WeightIssue;

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::formula::FormulaMatcher;
use crate::rating::ThresholdSet;

/// Error raised when a definition is structurally inconsistent.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HierarchyError {
    #[error("duplicate {level:?} '{name}'")]
    Duplicate { level: Level, name: String },
    #[error("performance signal '{signal}' references unknown key topic '{key_topic}'")]
    UnknownKeyTopic { signal: String, key_topic: String },
    #[error("assessment criterion '{criterion}' references unknown performance signal '{signal}'")]
    UnknownSignal { criterion: String, signal: String },
    #[error("assessment criterion '{criterion}' references unknown data point '{data_point}'")]
    UnknownDataPoint {
        criterion: String,
        data_point: String,
    },
}

/// Collects definitions in insertion order and validates them into a [`Hierarchy`].
#[derive(Debug, Default)]
pub struct HierarchyBuilder {
    key_topics: Vec<KeyTopic>,
    signals: Vec<PerformanceSignal>,
    criteria: Vec<AssessmentCriterion>,
    data_points: Vec<DataPointDef>,
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_topic(mut self, name: &str, pillar: &str) -> Self {
        self.add_key_topic(name, pillar);
        self
    }

    pub fn signal(mut self, name: &str, key_topic: &str, weight: f64) -> Self {
        self.add_signal(name, key_topic, weight);
        self
    }

    pub fn data_point(mut self, name: &str, pillar: &str, data_type: DataType) -> Self {
        self.add_data_point(name, pillar, data_type);
        self
    }

    pub fn criterion(mut self, criterion: AssessmentCriterion) -> Self {
        self.add_criterion(criterion);
        self
    }

    pub fn add_key_topic(&mut self, name: &str, pillar: &str) {
        self.key_topics.push(KeyTopic {
            name: name.to_string(),
            pillar: pillar.to_string(),
            signals: Vec::new(),
            thresholds: ThresholdSet::default(),
        });
    }

    pub fn add_signal(&mut self, name: &str, key_topic: &str, weight: f64) {
        self.signals.push(PerformanceSignal {
            name: name.to_string(),
            key_topic: key_topic.to_string(),
            weight,
            criteria: Vec::new(),
            thresholds: ThresholdSet::default(),
        });
    }

    pub fn add_data_point(&mut self, name: &str, pillar: &str, data_type: DataType) {
        self.data_points.push(DataPointDef {
            name: name.to_string(),
            pillar: pillar.to_string(),
            data_type,
        });
    }

    pub fn add_criterion(&mut self, criterion: AssessmentCriterion) {
        self.criteria.push(criterion);
    }

    pub fn build(self) -> Result<Hierarchy, HierarchyError> {
        let mut hierarchy = Hierarchy::default();

        for mut topic in self.key_topics {
            if hierarchy.topic_index.contains_key(&topic.name) {
                return Err(HierarchyError::Duplicate {
                    level: Level::KeyTopic,
                    name: topic.name,
                });
            }
            topic.signals.clear();
            hierarchy
                .topic_index
                .insert(topic.name.clone(), hierarchy.key_topics.len());
            hierarchy.key_topics.push(topic);
        }

        for mut signal in self.signals {
            if hierarchy.signal_index.contains_key(&signal.name) {
                return Err(HierarchyError::Duplicate {
                    level: Level::PerformanceSignal,
                    name: signal.name,
                });
            }
            let Some(&topic_position) = hierarchy.topic_index.get(&signal.key_topic) else {
                return Err(HierarchyError::UnknownKeyTopic {
                    signal: signal.name,
                    key_topic: signal.key_topic,
                });
            };
            hierarchy.key_topics[topic_position]
                .signals
                .push(signal.name.clone());
            signal.criteria.clear();
            hierarchy
                .signal_index
                .insert(signal.name.clone(), hierarchy.signals.len());
            hierarchy.signals.push(signal);
        }

        for data_point in self.data_points {
            if hierarchy.data_point_index.contains_key(&data_point.name) {
                continue;
            }
            hierarchy
                .data_point_index
                .insert(data_point.name.clone(), hierarchy.data_points.len());
            hierarchy.data_points.push(data_point);
        }

        for criterion in self.criteria {
            if hierarchy.criterion_index.contains_key(&criterion.name) {
                return Err(HierarchyError::Duplicate {
                    level: Level::AssessmentCriterion,
                    name: criterion.name,
                });
            }
            let Some(&signal_position) = hierarchy.signal_index.get(&criterion.performance_signal)
            else {
                return Err(HierarchyError::UnknownSignal {
                    criterion: criterion.name,
                    signal: criterion.performance_signal,
                });
            };
            for data_point in &criterion.data_points {
                if !hierarchy.data_point_index.contains_key(data_point) {
                    return Err(HierarchyError::UnknownDataPoint {
                        criterion: criterion.name.clone(),
                        data_point: data_point.clone(),
                    });
                }
                hierarchy
                    .dependents
                    .entry(data_point.clone())
                    .or_default()
                    .push(criterion.name.clone());
            }
            hierarchy.signals[signal_position]
                .criteria
                .push(criterion.name.clone());
            hierarchy
                .criterion_index
                .insert(criterion.name.clone(), hierarchy.criteria.len());
            hierarchy.criteria.push(criterion);
        }

        Ok(hierarchy)
    }
}

/// Indexed, validated assessment hierarchy.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    key_topics: Vec<KeyTopic>,
    signals: Vec<PerformanceSignal>,
    criteria: Vec<AssessmentCriterion>,
    data_points: Vec<DataPointDef>,
    topic_index: HashMap<String, usize>,
    signal_index: HashMap<String, usize>,
    criterion_index: HashMap<String, usize>,
    data_point_index: HashMap<String, usize>,
    /// Reverse index: data point → criteria that reference it, directly or through a binding.
    dependents: BTreeMap<String, Vec<String>>,
}

/// Outcome of linking formula text to data points.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkReport {
    pub bound_tokens: usize,
    pub unresolved: Vec<UnresolvedToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedToken {
    pub criterion: String,
    pub token: String,
}

impl Hierarchy {
    pub fn builder() -> HierarchyBuilder {
        HierarchyBuilder::new()
    }

    pub fn key_topics(&self) -> &[KeyTopic] {
        &self.key_topics
    }

    pub fn signals(&self) -> &[PerformanceSignal] {
        &self.signals
    }

    pub fn criteria(&self) -> &[AssessmentCriterion] {
        &self.criteria
    }

    pub fn data_points(&self) -> &[DataPointDef] {
        &self.data_points
    }

    pub fn key_topic(&self, name: &str) -> Option<&KeyTopic> {
        self.topic_index
            .get(name)
            .map(|&position| &self.key_topics[position])
    }

    pub fn signal(&self, name: &str) -> Option<&PerformanceSignal> {
        self.signal_index
            .get(name)
            .map(|&position| &self.signals[position])
    }

    pub fn criterion(&self, name: &str) -> Option<&AssessmentCriterion> {
        self.criterion_index
            .get(name)
            .map(|&position| &self.criteria[position])
    }

    pub fn data_point(&self, name: &str) -> Option<&DataPointDef> {
        self.data_point_index
            .get(name)
            .map(|&position| &self.data_points[position])
    }

    pub fn signals_for_topic<'a>(
        &'a self,
        key_topic: &'a KeyTopic,
    ) -> impl Iterator<Item = &'a PerformanceSignal> + 'a {
        key_topic
            .signals
            .iter()
            .filter_map(move |name| self.signal(name))
    }

    pub fn criteria_for_signal<'a>(
        &'a self,
        signal: &'a PerformanceSignal,
    ) -> impl Iterator<Item = &'a AssessmentCriterion> + 'a {
        signal
            .criteria
            .iter()
            .filter_map(move |name| self.criterion(name))
    }

    /// Criteria whose value depends on the given data point.
    pub fn criteria_for_data_point(&self, data_point: &str) -> &[String] {
        self.dependents
            .get(data_point)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn pillars(&self) -> Vec<&str> {
        let mut pillars: Vec<&str> = Vec::new();
        for topic in &self.key_topics {
            if !pillars.contains(&topic.pillar.as_str()) {
                pillars.push(topic.pillar.as_str());
            }
        }
        pillars
    }

    /// Resolve every quantitative/qualitative formula to explicit data point bindings.
    ///
    /// The criterion's declared data points are tried first; tokens they cannot satisfy fall
    /// back to every data point in the hierarchy.
    pub fn link_formulas(&mut self, matcher: &FormulaMatcher) -> LinkReport {
        let all_points: Vec<String> = self
            .data_points
            .iter()
            .map(|point| point.name.clone())
            .collect();
        let mut report = LinkReport::default();

        for criterion in &mut self.criteria {
            if criterion.kind == FormulaKind::Descriptive {
                criterion.bindings.clear();
                continue;
            }

            let declared = matcher.bind(&criterion.formula, &criterion.data_points);
            let mut bindings = declared.bindings;
            let fallback = matcher.bind_tokens(&declared.unresolved, &all_points);
            bindings.extend(fallback.bindings);

            for token in fallback.unresolved {
                debug!(criterion = %criterion.name, %token, "formula token left unbound");
                report.unresolved.push(UnresolvedToken {
                    criterion: criterion.name.clone(),
                    token,
                });
            }

            report.bound_tokens += bindings.len();
            criterion.bindings = bindings;
        }

        self.dependents.clear();
        for criterion in &self.criteria {
            let referenced = criterion
                .data_points
                .iter()
                .chain(criterion.bindings.iter().map(|binding| &binding.data_point));
            for data_point in referenced {
                let entry = self.dependents.entry(data_point.clone()).or_default();
                if !entry.contains(&criterion.name) {
                    entry.push(criterion.name.clone());
                }
            }
        }

        report
    }

    pub(crate) fn criteria_mut(&mut self) -> &mut [AssessmentCriterion] {
        &mut self.criteria
    }

    pub(crate) fn signals_mut(&mut self) -> &mut [PerformanceSignal] {
        &mut self.signals
    }

    pub(crate) fn key_topic_mut(&mut self, name: &str) -> Option<&mut KeyTopic> {
        let position = *self.topic_index.get(name)?;
        self.key_topics.get_mut(position)
    }

    pub(crate) fn signal_mut(&mut self, name: &str) -> Option<&mut PerformanceSignal> {
        let position = *self.signal_index.get(name)?;
        self.signals.get_mut(position)
    }
}
