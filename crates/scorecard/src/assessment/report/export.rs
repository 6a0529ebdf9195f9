use std::io::Write;

use serde::Serialize;

use crate::assessment::result::AssessmentResult;
use crate::hierarchy::import::expand_pillar;
use crate::hierarchy::{Hierarchy, Level};

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Level")]
    level: &'static str,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Parent")]
    parent: &'a str,
    #[serde(rename = "Value")]
    value: String,
    #[serde(rename = "Rating")]
    rating: &'static str,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Weight")]
    weight: String,
    #[serde(rename = "Message")]
    message: String,
}

/// Write the result as a flat CSV, overall first, then each key topic followed by its signals
/// and criteria. A pillar filter (full name or abbreviation) drops other key topics and the
/// overall row.
pub fn write_csv<W: Write>(
    hierarchy: &Hierarchy,
    result: &AssessmentResult,
    pillar: Option<&str>,
    writer: W,
) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let pillar = pillar.map(expand_pillar);

    if pillar.is_none() {
        let overall = &result.overall;
        csv_writer.serialize(ExportRow {
            level: Level::Overall.label(),
            name: "Overall",
            parent: "",
            value: format_value(overall.value),
            rating: overall.rating.label(),
            status: if overall.value.is_some() {
                "calculated"
            } else {
                "incomplete"
            },
            weight: String::new(),
            message: String::new(),
        })?;
    }

    for topic in hierarchy.key_topics() {
        if let Some(filter) = pillar.as_deref() {
            if !topic.pillar.eq_ignore_ascii_case(filter) {
                continue;
            }
        }
        if let Some(rollup) = result.key_topic(&topic.name) {
            csv_writer.serialize(ExportRow {
                level: Level::KeyTopic.label(),
                name: &rollup.name,
                parent: &topic.pillar,
                value: format_value(rollup.value),
                rating: rollup.rating.label(),
                status: rollup.status.label(),
                weight: String::new(),
                message: String::new(),
            })?;
        }

        for signal in result.signals_for_topic(&topic.name) {
            csv_writer.serialize(ExportRow {
                level: Level::PerformanceSignal.label(),
                name: &signal.name,
                parent: &signal.parent,
                value: format_value(signal.value),
                rating: signal.rating.label(),
                status: signal.status.label(),
                weight: format_weight(signal.weight),
                message: if signal.skipped > 0 {
                    format!(
                        "{} of {} criteria excluded",
                        signal.skipped,
                        signal.skipped + signal.contributing
                    )
                } else {
                    String::new()
                },
            })?;

            for criterion in result.criteria_for_signal(&signal.name) {
                csv_writer.serialize(ExportRow {
                    level: Level::AssessmentCriterion.label(),
                    name: &criterion.name,
                    parent: &criterion.performance_signal,
                    value: criterion.display_value(),
                    rating: criterion.rating.label(),
                    status: criterion.status.label(),
                    weight: format_weight(criterion.weight),
                    message: criterion.message().unwrap_or_default(),
                })?;
            }
        }
    }

    csv_writer.flush()?;
    Ok(())
}

fn format_value(value: Option<f64>) -> String {
    value.map(|value| format!("{value:.4}")).unwrap_or_default()
}

fn format_weight(weight: f64) -> String {
    format!("{weight}")
}
