use std::collections::BTreeMap;
use std::sync::Arc;

use scorecard::assessment::{
    AssessmentEngine, AssessmentResult, AssessmentService, JsonFileRepository, NewAssessment,
    Overrides,
};
use scorecard::formula::{EvaluationStatus, FormulaMatcher, QualitativeLabel};
use scorecard::hierarchy::import::{MasterFileImporter, SAMPLE_MASTER_FILE, SAMPLE_VALUES_FILE};
use scorecard::hierarchy::Hierarchy;
use scorecard::rating::Rating;
use scorecard::store::DataPointStore;

fn sample_hierarchy() -> Arc<Hierarchy> {
    let imported =
        MasterFileImporter::from_reader(SAMPLE_MASTER_FILE.as_bytes(), &FormulaMatcher::default())
            .expect("sample imports");
    Arc::new(imported.hierarchy)
}

fn sample_store(hierarchy: &Hierarchy) -> DataPointStore {
    let mut store = DataPointStore::for_hierarchy(hierarchy);
    store
        .load_csv(SAMPLE_VALUES_FILE.as_bytes())
        .expect("sample values load");
    store
}

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}

fn shape(result: &AssessmentResult) -> Vec<(String, String, Rating)> {
    result
        .criteria
        .iter()
        .map(|entry| (entry.name.clone(), format!("{:.9}", entry.value), entry.rating))
        .chain(
            result
                .signals
                .iter()
                .chain(result.key_topics.iter())
                .map(|entry| {
                    (
                        entry.name.clone(),
                        format!("{:?}", entry.value.map(|value| format!("{value:.9}"))),
                        entry.rating,
                    )
                }),
        )
        .collect()
}

#[test]
fn sample_assessment_rolls_up_to_overall_score() {
    let hierarchy = sample_hierarchy();
    let store = sample_store(&hierarchy);
    assert_eq!(store.len(), 9);

    let engine = AssessmentEngine::new(hierarchy.clone());
    let result = engine.calculate(&store, &Overrides::new());

    let spi = result
        .criterion("Schedule Performance Index")
        .expect("criterion result");
    assert!(close(spi.value, 0.92));
    assert_eq!(spi.rating, Rating::Satisfactory);

    let controls = result.key_topic("Project Controls").expect("topic result");
    assert!(close(controls.value.expect("value"), 0.9152));
    assert_eq!(controls.rating, Rating::Good);

    let design = result.key_topic("Design Management").expect("topic result");
    assert!(close(design.value.expect("value"), 0.75));
    assert_eq!(design.rating, Rating::Satisfactory);

    let register = result.criterion("Risk register").expect("criterion result");
    assert_eq!(register.label, Some(QualitativeLabel::PartiallyApplied));
    assert_eq!(register.rating, Rating::Satisfactory);
    assert!(!register.contributes);

    let culture = result.criterion("Risk culture").expect("criterion result");
    assert_eq!(culture.status, EvaluationStatus::Incomplete);
    assert_eq!(result.key_topic("Governance").expect("topic").value, None);

    let overall = result.overall.value.expect("overall");
    assert!(close(overall, (0.9152 + 0.75) / 2.0));
    assert_eq!(result.overall.rating, Rating::Satisfactory);
    assert_eq!(result.overall.contributing, 2);
    assert_eq!(result.overall.skipped, 1);
}

#[test]
fn missing_input_is_excluded_not_zeroed() {
    let hierarchy = sample_hierarchy();
    let mut store = sample_store(&hierarchy);
    store.clear("Drawings planned (No.)");

    let result = AssessmentEngine::new(hierarchy).calculate(&store, &Overrides::new());
    let completion = result
        .criterion("Design completion")
        .expect("criterion result");
    assert_eq!(completion.status, EvaluationStatus::Incomplete);
    assert_eq!(completion.value, 0.0);

    let progress = result.signal("Design Progress").expect("signal result");
    assert_eq!(progress.value, None);
    assert_eq!(progress.rating, Rating::Unknown);
    let overall = result.overall.value.expect("overall");
    assert!(close(overall, 0.9152));
}

#[test]
fn incremental_recalculation_equals_full_recalculation() {
    let hierarchy = sample_hierarchy();
    let mut store = sample_store(&hierarchy);
    let engine = AssessmentEngine::new(hierarchy);
    let overrides = Overrides::new();
    let mut previous = engine.calculate(&store, &overrides);

    for (data_point, raw) in [
        ("Earned Value (EV) (No.)", "1,010,000"),
        ("Drawings approved (No.)", "58"),
        ("Risk register in place (Yes/No)", "No"),
    ] {
        assert!(store.set_raw(data_point, raw).expect("known data point"));
        let incremental =
            engine.recalculate(&previous, &[data_point.to_string()], &[], &store, &overrides);
        let full = engine.calculate(&store, &overrides);
        assert_eq!(shape(&incremental), shape(&full), "after changing {data_point}");
        previous = incremental;
    }
}

#[test]
fn percent_input_matches_decimal_input() {
    let hierarchy = sample_hierarchy();
    let engine = AssessmentEngine::new(hierarchy.clone());

    let mut percent = sample_store(&hierarchy);
    percent
        .set_raw("Milestones achieved (No.)", "90%")
        .expect("known data point");
    percent
        .set_raw("Milestones planned (No.)", "1")
        .expect("known data point");

    let mut decimal = sample_store(&hierarchy);
    decimal
        .set_raw("Milestones achieved (No.)", "0.9")
        .expect("known data point");
    decimal
        .set_raw("Milestones planned (No.)", "1")
        .expect("known data point");

    let left = engine.calculate(&percent, &Overrides::new());
    let right = engine.calculate(&decimal, &Overrides::new());
    assert_eq!(shape(&left), shape(&right));
    assert!(close(
        left.criterion("Milestone Adherence")
            .expect("criterion result")
            .value,
        0.9
    ));
}

#[test]
fn json_store_keeps_history_across_service_instances() {
    let directory = tempfile::tempdir().expect("temp dir");
    let hierarchy = sample_hierarchy();
    let engine = Arc::new(AssessmentEngine::new(hierarchy));

    let values: BTreeMap<String, String> = [
        ("Earned Value (EV) (No.)", "920000"),
        ("Planned Value (PV) (No.)", "1000000"),
        ("Actual Cost (AC) (No.)", "1000000"),
    ]
    .into_iter()
    .map(|(name, raw)| (name.to_string(), raw.to_string()))
    .collect();

    let id = {
        let repository =
            Arc::new(JsonFileRepository::new(directory.path()).expect("repository opens"));
        let service = AssessmentService::new(repository, engine.clone());
        let record = service
            .create(NewAssessment {
                name: "Depot expansion".to_string(),
                values,
            })
            .expect("assessment created");
        service.calculate(&record.id).expect("first calculation");
        let mut update = BTreeMap::new();
        update.insert("Actual Cost (AC) (No.)".to_string(), "1150000".to_string());
        service
            .record_values(&record.id, &update)
            .expect("values recorded");
        service.calculate(&record.id).expect("second calculation");
        record.id
    };

    let repository = Arc::new(JsonFileRepository::new(directory.path()).expect("repository opens"));
    let service = AssessmentService::new(repository, engine);
    let history = service.history(&id).expect("history");
    assert_eq!(
        history.iter().map(|entry| entry.version).collect::<Vec<_>>(),
        vec![2, 1]
    );

    let restored = service.restore(&id, 1).expect("restored");
    assert_eq!(
        restored.pending_data_points,
        vec!["Actual Cost (AC) (No.)".to_string()]
    );
    let result = service.calculate(&id).expect("third calculation");
    let cost = result
        .criterion("Cost Performance Index")
        .expect("criterion result");
    assert!(close(cost.value, 0.92));
    assert_eq!(service.list(10).expect("listing").len(), 1);
}
