mod normalizer;
mod parser;

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::{
    AssessmentCriterion, DataType, FormulaKind, Hierarchy, HierarchyBuilder, HierarchyError,
    LinkReport,
};
use crate::formula::{detect_kind, FormulaMatcher};
use crate::rating::ThresholdSet;

pub(crate) use normalizer::expand_pillar;
use parser::{parse_rows, parse_weight, MasterRow};

/// Built-in definition used by the demo and when no master file is configured.
pub const SAMPLE_MASTER_FILE: &str = include_str!("../../../data/sample_master.csv");
/// `Data Point, Value` entries matching [`SAMPLE_MASTER_FILE`].
pub const SAMPLE_VALUES_FILE: &str = include_str!("../../../data/sample_values.csv");

#[derive(Debug, thiserror::Error)]
pub enum MasterFileImportError {
    #[error("failed to read master file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid master file CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("master file describes an inconsistent hierarchy: {0}")]
    Hierarchy(#[from] HierarchyError),
    #[error("master file contains no assessment criteria")]
    Empty,
}

/// Non-fatal observation made while reading the master file. Rows are 1-based data rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportWarning {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ImportedHierarchy {
    pub hierarchy: Hierarchy,
    pub warnings: Vec<ImportWarning>,
    pub link: LinkReport,
}

/// Reads the flattened `Pillar … Data Type` CSV export of the definition workbook.
pub struct MasterFileImporter;

impl MasterFileImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        matcher: &FormulaMatcher,
    ) -> Result<ImportedHierarchy, MasterFileImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, matcher)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        matcher: &FormulaMatcher,
    ) -> Result<ImportedHierarchy, MasterFileImportError> {
        let rows = parse_rows(reader)?;
        let mut assembly = Assembly::default();
        let mut carry = Carry::default();

        for (index, row) in rows.into_iter().enumerate() {
            assembly.apply(index + 1, row, &mut carry);
        }

        if assembly.criteria.is_empty() {
            return Err(MasterFileImportError::Empty);
        }

        let Assembly {
            mut builder,
            criteria,
            level_thresholds,
            mut warnings,
            ..
        } = assembly;
        for (_, criterion) in criteria {
            builder.add_criterion(criterion);
        }
        let mut hierarchy = builder.build()?;

        for (level, name, thresholds) in level_thresholds {
            match level {
                LevelTarget::Signal => {
                    if let Some(signal) = hierarchy.signal_mut(&name) {
                        signal.thresholds = thresholds;
                    }
                }
                LevelTarget::KeyTopic => {
                    if let Some(topic) = hierarchy.key_topic_mut(&name) {
                        topic.thresholds = thresholds;
                    }
                }
            }
        }

        let link = hierarchy.link_formulas(matcher);
        for unresolved in &link.unresolved {
            warnings.push(ImportWarning {
                row: 0,
                message: format!(
                    "'{}' in the formula of '{}' matches no data point",
                    unresolved.token, unresolved.criterion
                ),
            });
        }

        info!(
            key_topics = hierarchy.key_topics().len(),
            signals = hierarchy.signals().len(),
            criteria = hierarchy.criteria().len(),
            data_points = hierarchy.data_points().len(),
            warnings = warnings.len(),
            "imported master file"
        );

        Ok(ImportedHierarchy {
            hierarchy,
            warnings,
            link,
        })
    }
}

/// Merged-cell state inherited by following rows.
#[derive(Debug, Default, Clone)]
struct Carry {
    pillar: Option<String>,
    key_topic: Option<String>,
    signal: Option<String>,
    signal_weight: Option<String>,
    criterion: Option<String>,
    criterion_weight: Option<String>,
    formula: Option<String>,
    formula_type: Option<String>,
    thresholds: ThresholdSet,
}

#[derive(Debug, Clone, Copy)]
enum LevelTarget {
    Signal,
    KeyTopic,
}

#[derive(Default)]
struct Assembly {
    builder: HierarchyBuilder,
    key_topics: Vec<String>,
    signals: Vec<String>,
    data_points: Vec<String>,
    criteria: Vec<(String, AssessmentCriterion)>,
    level_thresholds: Vec<(LevelTarget, String, ThresholdSet)>,
    warnings: Vec<ImportWarning>,
}

impl Assembly {
    fn apply(&mut self, row_number: usize, row: MasterRow, carry: &mut Carry) {
        let level_row = row.criterion.is_none() && row.data_point.is_none();

        let pillar = row.pillar.clone().map(|value| expand_pillar(&value));
        let pillar_changed = pillar.is_some() && pillar != carry.pillar;
        if pillar.is_some() {
            carry.pillar = pillar;
        }

        let topic_changed = inherit(&mut carry.key_topic, row.key_topic.clone(), pillar_changed);
        let signal_changed = inherit(
            &mut carry.signal,
            row.performance_signal.clone(),
            topic_changed,
        );
        if row.ps_weight.is_some() || signal_changed {
            carry.signal_weight = row.ps_weight.clone();
        }

        let Some(topic) = carry.key_topic.clone() else {
            self.warn(row_number, "row has no key topic and was skipped");
            return;
        };
        let pillar = carry.pillar.clone().unwrap_or_default();
        self.ensure_key_topic(&topic, &pillar);

        let signal = carry.signal.clone();
        if let Some(signal) = &signal {
            let weight = self.signal_weight(row_number, signal, carry.signal_weight.as_deref());
            self.ensure_signal(row_number, signal, &topic, weight);
        }

        if level_row {
            carry.criterion = None;
            if row.has_thresholds() {
                let thresholds = row_thresholds(&row);
                match (&row.performance_signal, &signal) {
                    (Some(_), Some(signal)) => self.level_thresholds.push((
                        LevelTarget::Signal,
                        signal.clone(),
                        thresholds,
                    )),
                    _ => self
                        .level_thresholds
                        .push((LevelTarget::KeyTopic, topic, thresholds)),
                }
            }
            return;
        }

        let Some(signal) = signal else {
            self.warn(row_number, "row has no performance signal and was skipped");
            return;
        };

        let criterion_changed =
            inherit(&mut carry.criterion, row.criterion.clone(), signal_changed);
        if criterion_changed {
            carry.criterion_weight = row.ac_weight.clone();
            carry.formula = row.formula.clone();
            carry.formula_type = row.formula_type.clone();
            carry.thresholds = row_thresholds(&row);
        } else {
            fill(&mut carry.criterion_weight, &row.ac_weight);
            fill(&mut carry.formula, &row.formula);
            fill(&mut carry.formula_type, &row.formula_type);
            if row.has_thresholds() {
                carry.thresholds = row_thresholds(&row);
            }
        }

        let Some(criterion_name) = carry.criterion.clone() else {
            self.warn(row_number, "row has no assessment criterion and was skipped");
            return;
        };

        let data_point = row.data_point.as_deref().map(|name| {
            let data_type = row
                .data_type
                .as_deref()
                .and_then(DataType::from_label)
                .or_else(|| DataType::infer_from_name(name))
                .unwrap_or(DataType::Number);
            self.ensure_data_point(name, &pillar, data_type);
            name.to_string()
        });

        self.upsert_criterion(row_number, &criterion_name, &signal, carry, data_point);
    }

    fn upsert_criterion(
        &mut self,
        row_number: usize,
        name: &str,
        signal: &str,
        carry: &Carry,
        data_point: Option<String>,
    ) {
        let formula = carry.formula.clone().unwrap_or_default();
        let kind = carry
            .formula_type
            .as_deref()
            .and_then(FormulaKind::from_label)
            .unwrap_or_else(|| detect_kind(&formula, &carry.thresholds));

        if let Some((_, existing)) = self.criteria.iter_mut().find(|(key, _)| key == name) {
            if let Some(point) = data_point {
                if !existing.data_points.contains(&point) {
                    existing.data_points.push(point);
                }
            }
            if existing.formula.is_empty() && !formula.is_empty() {
                existing.formula = formula;
                existing.kind = kind;
            }
            if existing.thresholds.is_empty() {
                existing.thresholds = carry.thresholds.clone();
            }
            return;
        }

        let weight = match carry.criterion_weight.as_deref() {
            Some(raw) => parse_weight(raw).unwrap_or_else(|| {
                self.warn(
                    row_number,
                    &format!("AC weight '{raw}' for '{name}' is not a number; using 0"),
                );
                0.0
            }),
            None => {
                self.warn(row_number, &format!("AC '{name}' has no weight; using 0"));
                0.0
            }
        };

        self.criteria.push((
            name.to_string(),
            AssessmentCriterion {
                name: name.to_string(),
                performance_signal: signal.to_string(),
                formula,
                kind,
                weight,
                data_points: data_point.into_iter().collect(),
                thresholds: carry.thresholds.clone(),
                bindings: Vec::new(),
            },
        ));
    }

    fn signal_weight(&mut self, row_number: usize, signal: &str, raw: Option<&str>) -> f64 {
        if self.signals.iter().any(|name| name == signal) {
            return 0.0;
        }
        match raw {
            Some(raw) => parse_weight(raw).unwrap_or_else(|| {
                self.warn(
                    row_number,
                    &format!("PS weight '{raw}' for '{signal}' is not a number; using 0"),
                );
                0.0
            }),
            None => {
                self.warn(row_number, &format!("PS '{signal}' has no weight; using 0"));
                0.0
            }
        }
    }

    fn ensure_key_topic(&mut self, name: &str, pillar: &str) {
        if !self.key_topics.iter().any(|existing| existing == name) {
            self.key_topics.push(name.to_string());
            self.builder.add_key_topic(name, pillar);
        }
    }

    fn ensure_signal(&mut self, row_number: usize, name: &str, key_topic: &str, weight: f64) {
        if self.signals.iter().any(|existing| existing == name) {
            return;
        }
        if name.is_empty() {
            self.warn(row_number, "empty performance signal name");
            return;
        }
        self.signals.push(name.to_string());
        self.builder.add_signal(name, key_topic, weight);
    }

    fn ensure_data_point(&mut self, name: &str, pillar: &str, data_type: DataType) {
        if !self.data_points.iter().any(|existing| existing == name) {
            self.data_points.push(name.to_string());
            self.builder.add_data_point(name, pillar, data_type);
        }
    }

    fn warn(&mut self, row: usize, message: &str) {
        warn!(row, reason = message, "master file warning");
        self.warnings.push(ImportWarning {
            row,
            message: message.to_string(),
        });
    }
}

/// Take the row's own cell or keep the inherited one. An explicit cell, or a change higher up
/// the tree, starts a new group. Returns whether the group changed.
fn inherit(slot: &mut Option<String>, cell: Option<String>, parent_changed: bool) -> bool {
    match cell {
        Some(value) => {
            let changed = slot.as_deref() != Some(value.as_str()) || parent_changed;
            *slot = Some(value);
            changed
        }
        None if parent_changed => {
            *slot = None;
            true
        }
        None => false,
    }
}

fn fill(slot: &mut Option<String>, cell: &Option<String>) {
    if let Some(value) = cell {
        *slot = Some(value.clone());
    }
}

fn row_thresholds(row: &MasterRow) -> ThresholdSet {
    ThresholdSet::new(
        row.good.as_deref().unwrap_or_default(),
        row.satisfactory.as_deref().unwrap_or_default(),
        row.needs_improvement.as_deref().unwrap_or_default(),
    )
}
