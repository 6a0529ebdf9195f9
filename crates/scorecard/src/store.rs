//! Per-assessment data point values.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::hierarchy::{DataType, Hierarchy};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d/%m/%y", "%d-%m-%Y"];

static NUMERIC_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-?(?:\d[\d,]*(?:\.\d+)?|\.\d+)").expect("numeric pattern compiles")
});

/// A raw input after boundary parsing. Percentages are already fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DataValue {
    Number(f64),
    Percent(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
}

impl DataValue {
    /// Parse a raw entry against its declared type. Entries that do not fit are kept as text
    /// so that formula coercion can still read them.
    pub fn parse(raw: &str, declared: DataType) -> Self {
        let trimmed = raw.trim();
        match declared {
            DataType::Number => parse_number(trimmed)
                .map(|value| {
                    if trimmed.ends_with('%') {
                        DataValue::Percent(value / 100.0)
                    } else {
                        DataValue::Number(value)
                    }
                })
                .unwrap_or_else(|| DataValue::Text(trimmed.to_string())),
            DataType::Percent => parse_number(trimmed)
                .map(|value| {
                    if trimmed.ends_with('%') || value.abs() > 1.0 {
                        DataValue::Percent(value / 100.0)
                    } else {
                        DataValue::Percent(value)
                    }
                })
                .unwrap_or_else(|| DataValue::Text(trimmed.to_string())),
            DataType::Boolean => parse_boolean(trimmed)
                .map(DataValue::Boolean)
                .unwrap_or_else(|| DataValue::Text(trimmed.to_string())),
            DataType::Date => parse_date(trimmed)
                .map(DataValue::Date)
                .unwrap_or_else(|| DataValue::Text(trimmed.to_string())),
            DataType::Text => DataValue::Text(trimmed.to_string()),
        }
    }

    /// Parse an entry with no declared type.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.ends_with('%') {
            if let Some(value) = parse_number(trimmed) {
                return DataValue::Percent(value / 100.0);
            }
        }
        if let Some(value) = parse_number(trimmed) {
            return DataValue::Number(value);
        }
        if let Some(flag) = parse_boolean(trimmed) {
            return DataValue::Boolean(flag);
        }
        if let Some(date) = parse_date(trimmed) {
            return DataValue::Date(date);
        }
        DataValue::Text(trimmed.to_string())
    }

    /// Numeric reading used by formulas. Text keeps only its numeric characters and an
    /// embedded `%` divides by 100; anything unreadable is 0.
    pub fn to_numeric(&self) -> f64 {
        match self {
            DataValue::Number(value) | DataValue::Percent(value) => *value,
            DataValue::Boolean(flag) => {
                if *flag {
                    1.0
                } else {
                    0.0
                }
            }
            DataValue::Text(text) => coerce_text(text),
            DataValue::Date(_) => 0.0,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataValue::Number(_) | DataValue::Percent(_))
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Number(value) => write!(f, "{value}"),
            DataValue::Percent(value) => write!(f, "{}%", value * 100.0),
            DataValue::Text(text) => f.write_str(text),
            DataValue::Boolean(true) => f.write_str("Yes"),
            DataValue::Boolean(false) => f.write_str("No"),
            DataValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|ch| !matches!(ch, ',' | ' ' | '$' | '£' | '€'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" => Some(true),
        "no" | "n" | "false" => Some(false),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

fn coerce_text(text: &str) -> f64 {
    let value = NUMERIC_RUN
        .find(text)
        .and_then(|found| found.as_str().replace(',', "").parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0);
    if text.contains('%') {
        value / 100.0
    } else {
        value
    }
}

/// Read access to data point values for a calculation.
pub trait ValueSource {
    fn value(&self, data_point: &str) -> Option<&DataValue>;
}

impl ValueSource for BTreeMap<String, DataValue> {
    fn value(&self, data_point: &str) -> Option<&DataValue> {
        self.get(data_point)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown data point '{0}'")]
    UnknownDataPoint(String),
    #[error("invalid values file: {0}")]
    Csv(#[from] csv::Error),
}

/// Values entered for one assessment, keyed by data point name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPointStore {
    definitions: BTreeMap<String, DataType>,
    values: BTreeMap<String, DataValue>,
}

impl DataPointStore {
    pub fn for_hierarchy(hierarchy: &Hierarchy) -> Self {
        let definitions = hierarchy
            .data_points()
            .iter()
            .map(|point| (point.name.clone(), point.data_type))
            .collect();
        Self {
            definitions,
            values: BTreeMap::new(),
        }
    }

    /// Parse and store a raw entry; a blank entry clears the value. Returns whether the stored
    /// value changed.
    pub fn set_raw(&mut self, data_point: &str, raw: &str) -> Result<bool, StoreError> {
        let declared = *self
            .definitions
            .get(data_point)
            .ok_or_else(|| StoreError::UnknownDataPoint(data_point.to_string()))?;
        if raw.trim().is_empty() {
            return Ok(self.values.remove(data_point).is_some());
        }
        let value = DataValue::parse(raw, declared);
        Ok(self.put(data_point, value))
    }

    pub fn set(&mut self, data_point: &str, value: DataValue) -> Result<bool, StoreError> {
        if !self.definitions.contains_key(data_point) {
            return Err(StoreError::UnknownDataPoint(data_point.to_string()));
        }
        Ok(self.put(data_point, value))
    }

    pub fn clear(&mut self, data_point: &str) -> bool {
        self.values.remove(data_point).is_some()
    }

    pub fn get(&self, data_point: &str) -> Option<&DataValue> {
        self.values.get(data_point)
    }

    pub fn values(&self) -> &BTreeMap<String, DataValue> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace every value, dropping names the hierarchy does not define. Returns the names
    /// whose value differs from before.
    pub fn restore(&mut self, values: BTreeMap<String, DataValue>) -> Vec<String> {
        let incoming: BTreeMap<String, DataValue> = values
            .into_iter()
            .filter(|(name, _)| self.definitions.contains_key(name))
            .collect();
        let mut changed: Vec<String> = self
            .values
            .keys()
            .chain(incoming.keys())
            .filter(|name| self.values.get(*name) != incoming.get(*name))
            .cloned()
            .collect();
        changed.sort();
        changed.dedup();
        self.values = incoming;
        changed
    }

    /// Load a `Data Point, Value` CSV. Returns the names whose value changed.
    pub fn load_csv<R: Read>(&mut self, reader: R) -> Result<Vec<String>, StoreError> {
        let mut changed = Vec::new();
        for (data_point, raw) in read_values_csv(reader)? {
            if self.set_raw(&data_point, &raw)? && !changed.contains(&data_point) {
                changed.push(data_point);
            }
        }
        Ok(changed)
    }

    fn put(&mut self, data_point: &str, value: DataValue) -> bool {
        if self.values.get(data_point) == Some(&value) {
            return false;
        }
        self.values.insert(data_point.to_string(), value);
        true
    }
}

impl ValueSource for DataPointStore {
    fn value(&self, data_point: &str) -> Option<&DataValue> {
        self.values.get(data_point)
    }
}

/// Raw `Data Point, Value` entries in file order; blank values come back empty.
pub fn read_values_csv<R: Read>(reader: R) -> Result<Vec<(String, String)>, StoreError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = Vec::new();
    for row in csv_reader.deserialize::<ValueRow>() {
        let row = row?;
        entries.push((row.data_point, row.value.unwrap_or_default()));
    }
    Ok(entries)
}

#[derive(Debug, Deserialize)]
struct ValueRow {
    #[serde(rename = "Data Point")]
    data_point: String,
    #[serde(rename = "Value", default, deserialize_with = "empty_string_as_none")]
    value: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
