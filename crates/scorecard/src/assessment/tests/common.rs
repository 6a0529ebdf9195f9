use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

use crate::assessment::repository::{
    AssessmentId, AssessmentRecord, AssessmentRepository, RepositoryError,
};
use crate::assessment::{AssessmentEngine, AssessmentResult, AssessmentService};
use crate::formula::FormulaMatcher;
use crate::hierarchy::{AssessmentCriterion, DataType, FormulaKind, Hierarchy};
use crate::rating::ThresholdSet;
use crate::store::DataValue;

pub(super) const EV: &str = "Earned Value (EV) (No.)";
pub(super) const PV: &str = "Planned Value (PV) (No.)";
pub(super) const AC: &str = "Actual Cost (AC) (No.)";
pub(super) const ACHIEVED: &str = "Milestones achieved (No.)";
pub(super) const PLANNED: &str = "Milestones planned (No.)";
pub(super) const REGISTER: &str = "Risk register in place (Yes/No)";

fn criterion(
    name: &str,
    signal: &str,
    formula: &str,
    kind: FormulaKind,
    weight: f64,
    points: &[&str],
    thresholds: ThresholdSet,
) -> AssessmentCriterion {
    AssessmentCriterion {
        name: name.to_string(),
        performance_signal: signal.to_string(),
        formula: formula.to_string(),
        kind,
        weight,
        data_points: points.iter().map(|point| point.to_string()).collect(),
        thresholds,
        bindings: Vec::new(),
    }
}

/// Two key topics: project controls (quantitative) and governance (qualitative/descriptive).
pub(super) fn hierarchy() -> Arc<Hierarchy> {
    let pillar = "Planning & Monitoring";
    let mut hierarchy = Hierarchy::builder()
        .key_topic("Project Controls", pillar)
        .key_topic("Governance", "Strategy & Operations")
        .signal("Schedule Health", "Project Controls", 60.0)
        .signal("Cost Health", "Project Controls", 40.0)
        .signal("Risk Management", "Governance", 100.0)
        .data_point(EV, pillar, DataType::Number)
        .data_point(PV, pillar, DataType::Number)
        .data_point(AC, pillar, DataType::Number)
        .data_point(ACHIEVED, pillar, DataType::Number)
        .data_point(PLANNED, pillar, DataType::Number)
        .data_point(REGISTER, "Strategy & Operations", DataType::Boolean)
        .criterion(criterion(
            "Schedule Performance Index",
            "Schedule Health",
            "Earned Value (EV) / Planned Value (PV)",
            FormulaKind::Quantitative,
            60.0,
            &[EV, PV],
            ThresholdSet::new(">0.95", "0.85-0.95", "<0.85"),
        ))
        .criterion(criterion(
            "Milestone Adherence",
            "Schedule Health",
            "Milestones achieved (No.) / Milestones planned (No.)",
            FormulaKind::Quantitative,
            40.0,
            &[ACHIEVED, PLANNED],
            ThresholdSet::default(),
        ))
        .criterion(criterion(
            "Cost Performance Index",
            "Cost Health",
            "Earned Value (EV) / Actual Cost (AC)",
            FormulaKind::Quantitative,
            100.0,
            &[EV, AC],
            ThresholdSet::default(),
        ))
        .criterion(criterion(
            "Risk register",
            "Risk Management",
            "Is there a risk register in place?",
            FormulaKind::Qualitative,
            50.0,
            &[REGISTER],
            ThresholdSet::new("Yes", "Partially", "No"),
        ))
        .criterion(criterion(
            "Risk culture",
            "Risk Management",
            "Describe how risks are escalated",
            FormulaKind::Descriptive,
            50.0,
            &[],
            ThresholdSet::default(),
        ))
        .build()
        .expect("hierarchy builds");
    hierarchy.link_formulas(&FormulaMatcher::default());
    Arc::new(hierarchy)
}

pub(super) fn engine() -> AssessmentEngine {
    AssessmentEngine::new(hierarchy())
}

pub(super) fn values(entries: &[(&str, DataValue)]) -> BTreeMap<String, DataValue> {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// Inputs for a fully populated assessment.
pub(super) fn complete_values() -> BTreeMap<String, DataValue> {
    values(&[
        (EV, DataValue::Number(920_000.0)),
        (PV, DataValue::Number(1_000_000.0)),
        (AC, DataValue::Number(1_000_000.0)),
        (ACHIEVED, DataValue::Number(9.0)),
        (PLANNED, DataValue::Number(10.0)),
        (REGISTER, DataValue::Boolean(true)),
    ])
}

pub(super) fn raw(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

pub(super) fn complete_raw() -> BTreeMap<String, String> {
    raw(&[
        (EV, "920000"),
        (PV, "1,000,000"),
        (AC, "1000000"),
        (ACHIEVED, "9"),
        (PLANNED, "10"),
        (REGISTER, "Yes"),
    ])
}

/// Values, ratings and statuses of every entry, without timestamps.
pub(super) fn outcome_shape(result: &AssessmentResult) -> Vec<(String, String, String, String)> {
    let criteria = result.criteria.iter().map(|entry| {
        (
            entry.name.clone(),
            format!("{:.9}", entry.value),
            entry.rating.label().to_string(),
            entry.status.label().to_string(),
        )
    });
    let rollups = result
        .signals
        .iter()
        .chain(result.key_topics.iter())
        .map(|entry| {
            (
                entry.name.clone(),
                format!("{:?}", entry.value.map(|value| format!("{value:.9}"))),
                entry.rating.label().to_string(),
                entry.status.label().to_string(),
            )
        });
    let overall = std::iter::once((
        "overall".to_string(),
        format!("{:?}", result.overall.value.map(|value| format!("{value:.9}"))),
        result.overall.rating.label().to_string(),
        String::new(),
    ));
    criteria.chain(rollups).chain(overall).collect()
}

pub(super) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

pub(super) fn build_service() -> (AssessmentService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = AssessmentService::new(repository.clone(), Arc::new(engine()));
    (service, repository)
}

pub(super) async fn read_json_body(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body readable");
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<AssessmentId, AssessmentRecord>>>,
}

impl AssessmentRepository for MemoryRepository {
    fn insert(&self, record: AssessmentRecord) -> Result<AssessmentRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: AssessmentRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(record.id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &AssessmentId) -> Result<Option<AssessmentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self, limit: usize) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().take(limit).cloned().collect())
    }
}

pub(super) struct ConflictRepository;

impl AssessmentRepository for ConflictRepository {
    fn insert(&self, _record: AssessmentRecord) -> Result<AssessmentRecord, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn update(&self, _record: AssessmentRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn fetch(&self, _id: &AssessmentId) -> Result<Option<AssessmentRecord>, RepositoryError> {
        Ok(None)
    }

    fn list(&self, _limit: usize) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        Ok(Vec::new())
    }
}

pub(super) struct UnavailableRepository;

impl AssessmentRepository for UnavailableRepository {
    fn insert(&self, _record: AssessmentRecord) -> Result<AssessmentRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: AssessmentRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &AssessmentId) -> Result<Option<AssessmentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _limit: usize) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}
