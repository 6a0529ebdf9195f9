use super::common::*;
use crate::assessment::{
    write_csv, AssessmentReport, AssessmentResult, CriterionOverride, Overrides,
};
use crate::rating::Rating;
use crate::store::DataValue;

/// Weak controls (NI) and a manually scored governance topic (Satisfactory).
fn weak_result() -> AssessmentResult {
    let mut values = complete_values();
    values.insert(EV.to_string(), DataValue::Number(500_000.0));
    let mut overrides = Overrides::new();
    overrides.insert("Risk culture".to_string(), CriterionOverride::Value(0.8));
    engine().calculate(&values, &overrides)
}

fn export(result: &AssessmentResult, pillar: Option<&str>) -> Vec<String> {
    let mut buffer = Vec::new();
    write_csv(&hierarchy(), result, pillar, &mut buffer).expect("csv written");
    String::from_utf8(buffer)
        .expect("utf8 csv")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn summary_counts_ratings_and_statuses() {
    let hierarchy = hierarchy();
    let result = engine().calculate(&complete_values(), &Overrides::new());
    let summary = AssessmentReport::new(&hierarchy, &result).summary();

    assert_eq!(summary.rating, Rating::Good);
    assert_eq!(summary.rating_label, "Good");
    assert_close(summary.overall.expect("overall"), 0.9152);
    assert_eq!(summary.criteria.good, 2);
    assert_eq!(summary.criteria.satisfactory, 2);
    assert_eq!(summary.criteria.unknown, 1);
    assert_eq!(summary.statuses.calculated, 4);
    assert_eq!(summary.statuses.incomplete, 1);
    assert_eq!(summary.signals.good, 2);
    assert_eq!(summary.key_topics.unknown, 1);
    assert_eq!(summary.overridden, 0);
}

#[test]
fn recommendations_list_weakest_topics_first() {
    let hierarchy = hierarchy();
    let result = weak_result();
    let recommendations = AssessmentReport::new(&hierarchy, &result).recommendations();

    assert_eq!(recommendations.len(), 2);
    assert_eq!(recommendations[0].key_topic, "Project Controls");
    assert_eq!(recommendations[0].rating, Rating::NeedsImprovement);
    assert_eq!(
        recommendations[0].weakest_signal.as_deref(),
        Some("Cost Health")
    );
    assert_eq!(
        recommendations[0].action,
        "Prioritise corrective action on Cost Health"
    );
    assert_eq!(recommendations[1].key_topic, "Governance");
    assert_eq!(recommendations[1].rating, Rating::Satisfactory);
    assert_eq!(
        recommendations[1].action,
        "Strengthen Risk Management to reach Good"
    );
}

#[test]
fn healthy_assessment_has_no_recommendations() {
    let hierarchy = hierarchy();
    let result = engine().calculate(&complete_values(), &Overrides::new());
    assert!(AssessmentReport::new(&hierarchy, &result)
        .recommendations()
        .is_empty());
}

#[test]
fn improvement_areas_are_ordered_by_weight() {
    let hierarchy = hierarchy();
    let result = weak_result();
    let areas = AssessmentReport::new(&hierarchy, &result).improvement_areas();

    let names: Vec<&str> = areas.iter().map(|area| area.criterion.as_str()).collect();
    assert_eq!(
        names,
        vec!["Cost Performance Index", "Schedule Performance Index"]
    );
    assert_eq!(areas[0].key_topic, "Project Controls");
    assert_eq!(areas[0].rating_label, "Needs Improvement");
}

#[test]
fn pillar_breakdown_follows_definition_order() {
    let hierarchy = hierarchy();
    let result = weak_result();
    let pillars = AssessmentReport::new(&hierarchy, &result).pillar_breakdown();

    assert_eq!(pillars.len(), 2);
    assert_eq!(pillars[0].pillar, "Planning & Monitoring");
    assert_close(pillars[0].value.expect("value"), 0.596);
    assert_eq!(pillars[0].rating, Rating::NeedsImprovement);
    assert_eq!(pillars[1].pillar, "Strategy & Operations");
    assert_close(pillars[1].value.expect("value"), 0.8);
    assert_eq!(pillars[1].key_topics[0].name, "Governance");
}

#[test]
fn csv_export_lists_overall_then_each_topic() {
    let result = engine().calculate(&complete_values(), &Overrides::new());
    let lines = export(&result, None);

    assert_eq!(lines[0], "Level,Name,Parent,Value,Rating,Status,Weight,Message");
    assert_eq!(lines[1], "Overall,Overall,,0.9152,Good,calculated,,");
    assert_eq!(
        lines[2],
        "KT,Project Controls,Planning & Monitoring,0.9152,Good,calculated,,"
    );
    assert_eq!(lines[3], "PS,Schedule Health,Project Controls,0.9120,Good,calculated,60,");
    assert_eq!(
        lines[4],
        "AC,Schedule Performance Index,Schedule Health,0.9200,Satisfactory,calculated,60,"
    );
    assert!(lines.contains(
        &"PS,Risk Management,Governance,,Unknown,incomplete,100,2 of 2 criteria excluded"
            .to_string()
    ));
    assert!(lines.contains(
        &"AC,Risk register,Risk Management,Yes,Good,calculated,50,".to_string()
    ));
    assert!(lines.contains(
        &"AC,Risk culture,Risk Management,,Unknown,incomplete,50,manual input required"
            .to_string()
    ));
    assert_eq!(lines.len(), 12);
}

#[test]
fn csv_export_filters_by_pillar_abbreviation() {
    let result = engine().calculate(&complete_values(), &Overrides::new());

    let lines = export(&result, Some("P&M"));
    assert_eq!(lines.len(), 7);
    assert!(lines[1].starts_with("KT,Project Controls,"));
    assert!(lines.iter().all(|line| !line.starts_with("Overall,")));
    assert!(lines.iter().all(|line| !line.contains("Governance")));

    let lines = export(&result, Some("strategy & operations"));
    assert_eq!(lines.len(), 5);
    assert!(lines[1].starts_with("KT,Governance,"));
}
