use super::common::*;
use crate::assessment::{CriterionOverride, Overrides};
use crate::formula::{EvaluationIssue, EvaluationStatus, QualitativeLabel};
use crate::rating::Rating;
use crate::hierarchy::DataType;
use crate::store::DataValue;

#[test]
fn full_calculation_rolls_up_weighted_values() {
    let engine = engine();
    let result = engine.calculate(&complete_values(), &Overrides::new());

    let spi = result
        .criterion("Schedule Performance Index")
        .expect("criterion result");
    assert_close(spi.value, 0.92);
    assert_eq!(spi.rating, Rating::Satisfactory);
    assert_eq!(spi.status, EvaluationStatus::Calculated);
    assert_eq!(spi.inputs.len(), 2);

    let schedule = result.signal("Schedule Health").expect("signal result");
    assert_close(schedule.value.expect("value"), 0.912);
    assert_eq!(schedule.contributing, 2);

    let controls = result.key_topic("Project Controls").expect("topic result");
    assert_close(controls.value.expect("value"), 0.9152);
    assert_eq!(controls.rating, Rating::Good);

    assert_close(result.overall.value.expect("overall"), 0.9152);
    assert_eq!(result.overall.rating, Rating::Good);
    assert_eq!(result.overall.skipped, 1);
}

#[test]
fn qualitative_and_descriptive_criteria_stay_out_of_averages() {
    let result = engine().calculate(&complete_values(), &Overrides::new());

    let register = result.criterion("Risk register").expect("criterion result");
    assert_eq!(register.label, Some(QualitativeLabel::Yes));
    assert_eq!(register.rating, Rating::Good);
    assert!(!register.contributes);

    let culture = result.criterion("Risk culture").expect("criterion result");
    assert_eq!(culture.status, EvaluationStatus::Incomplete);
    assert_eq!(culture.issue, Some(EvaluationIssue::ManualInputRequired));

    let risk = result.signal("Risk Management").expect("signal result");
    assert_eq!(risk.value, None);
    assert_eq!(risk.rating, Rating::Unknown);
    assert_eq!(risk.status, EvaluationStatus::Incomplete);
    assert_eq!(risk.skipped, 2);
}

#[test]
fn missing_data_point_is_incomplete_and_excluded() {
    let mut values = complete_values();
    values.remove(PV);
    let result = engine().calculate(&values, &Overrides::new());

    let spi = result
        .criterion("Schedule Performance Index")
        .expect("criterion result");
    assert_eq!(spi.status, EvaluationStatus::Incomplete);
    assert_eq!(spi.value, 0.0);
    assert!(!spi.contributes);
    assert_eq!(
        spi.message().as_deref(),
        Some("missing data: Planned Value (PV) (No.)")
    );

    let schedule = result.signal("Schedule Health").expect("signal result");
    assert_close(schedule.value.expect("value"), 0.9);
    assert_eq!(schedule.skipped, 1);
}

#[test]
fn division_by_zero_is_an_error_with_zero_value() {
    let mut values = complete_values();
    values.insert(PV.to_string(), DataValue::Number(0.0));
    let result = engine().calculate(&values, &Overrides::new());

    let spi = result
        .criterion("Schedule Performance Index")
        .expect("criterion result");
    assert_eq!(spi.status, EvaluationStatus::Error);
    assert_eq!(spi.value, 0.0);
    assert_eq!(spi.rating, Rating::Unknown);
    assert!(spi
        .message()
        .expect("message")
        .contains("division by zero"));
}

#[test]
fn overrides_replace_formula_results() {
    let mut overrides = Overrides::new();
    overrides.insert("Risk culture".to_string(), CriterionOverride::Value(0.6));
    overrides.insert(
        "Risk register".to_string(),
        CriterionOverride::Response(QualitativeLabel::PartiallyApplied),
    );
    let result = engine().calculate(&complete_values(), &overrides);

    let culture = result.criterion("Risk culture").expect("criterion result");
    assert!(culture.overridden);
    assert!(culture.contributes);
    assert_eq!(culture.rating, Rating::NeedsImprovement);

    let register = result.criterion("Risk register").expect("criterion result");
    assert_eq!(register.label, Some(QualitativeLabel::PartiallyApplied));
    assert_eq!(register.rating, Rating::Satisfactory);

    let risk = result.signal("Risk Management").expect("signal result");
    assert_close(risk.value.expect("value"), 0.6);
    assert_close(
        result.overall.value.expect("overall"),
        (0.9152 + 0.6) / 2.0,
    );
}

#[test]
fn incremental_recalculation_matches_full_run() {
    let engine = engine();
    let overrides = Overrides::new();
    let mut values = complete_values();
    let first = engine.calculate(&values, &overrides);

    values.insert(EV.to_string(), DataValue::Number(800_000.0));
    let incremental = engine.recalculate(&first, &[EV.to_string()], &[], &values, &overrides);
    let full = engine.calculate(&values, &overrides);

    assert_eq!(outcome_shape(&incremental), outcome_shape(&full));
    assert_close(
        incremental
            .criterion("Cost Performance Index")
            .expect("criterion result")
            .value,
        0.8,
    );
    let untouched = incremental
        .criterion("Milestone Adherence")
        .expect("criterion result");
    assert_eq!(
        untouched.calculated_at,
        first
            .criterion("Milestone Adherence")
            .expect("criterion result")
            .calculated_at
    );
}

#[test]
fn incremental_recalculation_picks_up_override_changes() {
    let engine = engine();
    let values = complete_values();
    let first = engine.calculate(&values, &Overrides::new());

    let mut overrides = Overrides::new();
    overrides.insert("Risk culture".to_string(), CriterionOverride::Value(0.95));
    let incremental = engine.recalculate(
        &first,
        &[],
        &["Risk culture".to_string()],
        &values,
        &overrides,
    );

    assert_eq!(
        outcome_shape(&incremental),
        outcome_shape(&engine.calculate(&values, &overrides))
    );
    assert_eq!(
        incremental
            .key_topic("Governance")
            .expect("topic result")
            .rating,
        Rating::Good
    );
}

#[test]
fn percent_and_decimal_inputs_evaluate_identically() {
    let engine = engine();
    let mut decimal = complete_values();
    decimal.insert(ACHIEVED.to_string(), DataValue::Number(0.9));
    decimal.insert(PLANNED.to_string(), DataValue::Number(1.0));
    let mut percent = decimal.clone();
    percent.insert(
        ACHIEVED.to_string(),
        DataValue::parse("90%", DataType::Number),
    );

    let left = engine.calculate(&decimal, &Overrides::new());
    let right = engine.calculate(&percent, &Overrides::new());
    assert_eq!(outcome_shape(&left), outcome_shape(&right));
}
