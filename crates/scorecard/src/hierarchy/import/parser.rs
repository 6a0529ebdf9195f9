use super::normalizer::clean_text;
use serde::{Deserialize, Deserializer};
use std::io::Read;

/// One spreadsheet row as exported; blank cells are `None` and inherit from earlier rows.
#[derive(Debug, Deserialize)]
pub(crate) struct MasterRow {
    #[serde(rename = "Pillar", alias = "Category", default, deserialize_with = "cleaned")]
    pub(crate) pillar: Option<String>,
    #[serde(rename = "Key Topic", alias = "KT", default, deserialize_with = "cleaned")]
    pub(crate) key_topic: Option<String>,
    #[serde(
        rename = "Performance Signal",
        alias = "PS",
        default,
        deserialize_with = "cleaned"
    )]
    pub(crate) performance_signal: Option<String>,
    #[serde(rename = "PS Weight", default, deserialize_with = "cleaned")]
    pub(crate) ps_weight: Option<String>,
    #[serde(
        rename = "Assessment Criteria",
        alias = "Assessment Criterion",
        alias = "AC",
        default,
        deserialize_with = "cleaned"
    )]
    pub(crate) criterion: Option<String>,
    #[serde(rename = "AC Weight", default, deserialize_with = "cleaned")]
    pub(crate) ac_weight: Option<String>,
    #[serde(rename = "Formula", default, deserialize_with = "cleaned")]
    pub(crate) formula: Option<String>,
    #[serde(rename = "Formula Type", default, deserialize_with = "cleaned")]
    pub(crate) formula_type: Option<String>,
    #[serde(rename = "Good", default, deserialize_with = "cleaned")]
    pub(crate) good: Option<String>,
    #[serde(rename = "Satisfactory", default, deserialize_with = "cleaned")]
    pub(crate) satisfactory: Option<String>,
    #[serde(rename = "Needs Improvement", default, deserialize_with = "cleaned")]
    pub(crate) needs_improvement: Option<String>,
    #[serde(rename = "Data Point", default, deserialize_with = "cleaned")]
    pub(crate) data_point: Option<String>,
    #[serde(rename = "Data Type", default, deserialize_with = "cleaned")]
    pub(crate) data_type: Option<String>,
}

impl MasterRow {
    pub(crate) fn has_thresholds(&self) -> bool {
        self.good.is_some() || self.satisfactory.is_some() || self.needs_improvement.is_some()
    }
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<MasterRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in csv_reader.deserialize::<MasterRow>() {
        rows.push(record?);
    }
    Ok(rows)
}

/// `60`, `60%` and `60.0` all read as 60.
pub(crate) fn parse_weight(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

fn cleaned<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt
        .map(|value| clean_text(&value))
        .filter(|value| !value.is_empty()))
}
