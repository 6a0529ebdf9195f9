use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::common::*;
use crate::assessment::{
    AssessmentId, AssessmentRecord, AssessmentRepository, AssessmentService,
    AssessmentServiceError, CriterionOverride, NewAssessment, RepositoryError,
};
use crate::rating::Rating;
use crate::store::{DataValue, StoreError};

fn create_complete(service: &AssessmentService<MemoryRepository>) -> AssessmentId {
    service
        .create(NewAssessment {
            name: "Metro line 2".to_string(),
            values: complete_raw(),
        })
        .expect("assessment created")
        .id
}

#[test]
fn create_parses_initial_values() {
    let (service, repository) = build_service();
    let record = service
        .create(NewAssessment {
            name: "  Metro line 2 ".to_string(),
            values: complete_raw(),
        })
        .expect("assessment created");

    assert!(record.id.0.starts_with("asmt-"));
    assert_eq!(record.name, "Metro line 2");
    assert_eq!(record.store.len(), 6);
    assert_eq!(record.store.get(PV), Some(&DataValue::Number(1_000_000.0)));
    assert_eq!(record.store.get(REGISTER), Some(&DataValue::Boolean(true)));
    assert_eq!(record.pending_data_points.len(), 6);
    assert!(record.result.is_none());

    let stored = repository
        .records
        .lock()
        .expect("repository mutex poisoned")
        .get(&record.id)
        .cloned()
        .expect("record persisted");
    assert_eq!(stored, record);
}

#[test]
fn blank_name_gets_a_placeholder() {
    let (service, _) = build_service();
    let record = service
        .create(NewAssessment::default())
        .expect("assessment created");
    assert_eq!(record.name, "Untitled assessment");
    assert_eq!(record.store.len(), 0);
}

#[test]
fn unknown_data_point_is_rejected_before_writing() {
    let (service, _) = build_service();
    let id = create_complete(&service);

    let mut values = raw(&[(EV, "1")]);
    values.insert("Contingency drawdown (No.)".to_string(), "5".to_string());
    let error = service
        .record_values(&id, &values)
        .expect_err("unknown data point");
    assert!(matches!(
        error,
        AssessmentServiceError::Store(StoreError::UnknownDataPoint(ref name))
            if name == "Contingency drawdown (No.)"
    ));

    let record = service.get(&id).expect("record");
    assert_eq!(record.store.get(EV), Some(&DataValue::Number(920_000.0)));
}

#[test]
fn calculate_stores_versioned_snapshots() {
    let (service, _) = build_service();
    let id = create_complete(&service);

    let first = service.calculate(&id).expect("first calculation");
    assert_close(first.overall.value.expect("overall"), 0.9152);

    service
        .record_values(&id, &raw(&[(EV, "800000")]))
        .expect("values recorded");
    let pending = service.get(&id).expect("record");
    assert_eq!(pending.pending_data_points, vec![EV.to_string()]);
    assert!(pending.summary_view().stale);

    let second = service.calculate(&id).expect("second calculation");
    assert_close(
        second
            .criterion("Schedule Performance Index")
            .expect("criterion result")
            .value,
        0.8,
    );

    let record = service.get(&id).expect("record");
    assert_eq!(record.latest_version(), 2);
    assert!(record.pending_data_points.is_empty());
    assert!(!record.summary_view().stale);

    let history = service.history(&id).expect("history");
    let versions: Vec<u32> = history.iter().map(|entry| entry.version).collect();
    assert_eq!(versions, vec![2, 1]);
    assert_eq!(history[1].rating, "Good");
    assert_eq!(history[0].values, 6);
}

#[test]
fn unchanged_entries_do_not_mark_pending_work() {
    let (service, _) = build_service();
    let id = create_complete(&service);
    service.calculate(&id).expect("calculation");

    let record = service
        .record_values(&id, &raw(&[(EV, "920000")]))
        .expect("values recorded");
    assert!(record.pending_data_points.is_empty());
}

#[test]
fn overrides_are_validated_and_applied() {
    let (service, _) = build_service();
    let id = create_complete(&service);
    service.calculate(&id).expect("calculation");

    let mut unknown = BTreeMap::new();
    unknown.insert(
        "Stakeholder engagement".to_string(),
        Some(CriterionOverride::Value(0.5)),
    );
    assert!(matches!(
        service.set_overrides(&id, &unknown),
        Err(AssessmentServiceError::UnknownCriterion(_))
    ));

    let mut overrides = BTreeMap::new();
    overrides.insert(
        "Risk culture".to_string(),
        Some(CriterionOverride::Value(0.95)),
    );
    let record = service.set_overrides(&id, &overrides).expect("overrides set");
    assert_eq!(record.pending_criteria, vec!["Risk culture".to_string()]);

    let result = service.calculate(&id).expect("calculation");
    let governance = result.key_topic("Governance").expect("topic result");
    assert_close(governance.value.expect("value"), 0.95);
    assert_eq!(governance.rating, Rating::Good);

    let mut cleared = BTreeMap::new();
    cleared.insert("Risk culture".to_string(), None);
    let record = service.set_overrides(&id, &cleared).expect("override cleared");
    assert!(record.overrides.is_empty());
    let result = service.calculate(&id).expect("calculation");
    assert_eq!(
        result.key_topic("Governance").expect("topic result").value,
        None
    );
}

#[test]
fn restore_brings_back_snapshot_inputs() {
    let (service, _) = build_service();
    let id = create_complete(&service);
    service.calculate(&id).expect("first calculation");

    service
        .record_values(&id, &raw(&[(EV, "500000")]))
        .expect("values recorded");
    let degraded = service.calculate(&id).expect("second calculation");
    assert_eq!(degraded.overall.rating, Rating::NeedsImprovement);

    let record = service.restore(&id, 1).expect("restored");
    assert_eq!(record.store.get(EV), Some(&DataValue::Number(920_000.0)));
    assert_eq!(record.pending_data_points, vec![EV.to_string()]);
    assert_eq!(record.latest_version(), 2);

    let recalculated = service.calculate(&id).expect("third calculation");
    assert_close(recalculated.overall.value.expect("overall"), 0.9152);
    assert_eq!(service.get(&id).expect("record").latest_version(), 3);

    assert!(matches!(
        service.restore(&id, 9),
        Err(AssessmentServiceError::UnknownVersion(9))
    ));
}

#[test]
fn result_and_report_require_a_calculation() {
    let (service, _) = build_service();
    let id = create_complete(&service);

    assert!(matches!(
        service.result(&id),
        Err(AssessmentServiceError::NoResult(ref pending)) if *pending == id
    ));
    assert!(service.report(&id).is_err());

    service.calculate(&id).expect("calculation");
    let report = service.report(&id).expect("report");
    assert_eq!(report.summary.rating, Rating::Good);
    let csv = service.export_csv(&id, Some("P&M")).expect("csv export");
    assert!(csv.starts_with("Level,Name,Parent,Value,Rating,Status,Weight,Message"));
}

#[test]
fn missing_assessment_is_not_found() {
    let (service, _) = build_service();
    let error = service
        .get(&AssessmentId("asmt-missing".to_string()))
        .expect_err("missing record");
    assert!(matches!(
        error,
        AssessmentServiceError::Repository(RepositoryError::NotFound)
    ));
}

#[test]
fn repository_conflicts_surface_to_callers() {
    let service = AssessmentService::new(Arc::new(ConflictRepository), Arc::new(engine()));
    let error = service
        .create(NewAssessment::default())
        .expect_err("conflict");
    assert!(matches!(
        error,
        AssessmentServiceError::Repository(RepositoryError::Conflict)
    ));
}

#[test]
fn unavailable_repository_is_reported() {
    let service = AssessmentService::new(Arc::new(UnavailableRepository), Arc::new(engine()));
    let error = service.list(10).expect_err("unavailable");
    assert_eq!(error.to_string(), "repository unavailable: database offline");
}

/// Memory store with a slow read, widening the gap between fetch and update.
#[derive(Default)]
struct SlowReadRepository {
    inner: MemoryRepository,
}

impl AssessmentRepository for SlowReadRepository {
    fn insert(&self, record: AssessmentRecord) -> Result<AssessmentRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(&self, record: AssessmentRecord) -> Result<(), RepositoryError> {
        self.inner.update(record)
    }

    fn fetch(&self, id: &AssessmentId) -> Result<Option<AssessmentRecord>, RepositoryError> {
        let record = self.inner.fetch(id);
        thread::sleep(Duration::from_millis(20));
        record
    }

    fn list(&self, limit: usize) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        self.inner.list(limit)
    }
}

#[test]
fn concurrent_writes_to_one_assessment_are_all_kept() {
    let service = AssessmentService::new(
        Arc::new(SlowReadRepository::default()),
        Arc::new(engine()),
    );
    let id = service
        .create(NewAssessment {
            name: "Metro line 2".to_string(),
            values: BTreeMap::new(),
        })
        .expect("assessment created")
        .id;
    let entries = complete_raw();

    thread::scope(|scope| {
        for (name, value) in &entries {
            let service = &service;
            let id = &id;
            scope.spawn(move || {
                service
                    .record_values(id, &raw(&[(name.as_str(), value.as_str())]))
                    .expect("values recorded");
            });
        }
        scope.spawn(|| {
            let manual = BTreeMap::from([(
                "Schedule Performance Index".to_string(),
                Some(CriterionOverride::Value(0.5)),
            )]);
            service.set_overrides(&id, &manual).expect("override applied");
        });
    });

    let record = service.get(&id).expect("record stored");
    assert_eq!(record.store.len(), entries.len());
    assert_eq!(record.pending_data_points.len(), entries.len());
    assert_eq!(record.overrides.len(), 1);
}
