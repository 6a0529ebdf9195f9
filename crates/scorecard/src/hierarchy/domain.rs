use serde::{Deserialize, Serialize};

use crate::formula::FormulaBinding;
use crate::rating::ThresholdSet;

/// Level of the assessment hierarchy a result or audit entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    AssessmentCriterion,
    PerformanceSignal,
    KeyTopic,
    Overall,
}

impl Level {
    pub fn label(&self) -> &'static str {
        match self {
            Level::AssessmentCriterion => "AC",
            Level::PerformanceSignal => "PS",
            Level::KeyTopic => "KT",
            Level::Overall => "Overall",
        }
    }
}

/// Declared shape of a raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Number,
    Percent,
    Text,
    Boolean,
    Date,
}

impl DataType {
    pub fn label(&self) -> &'static str {
        match self {
            DataType::Number => "No.",
            DataType::Percent => "%",
            DataType::Text => "Text",
            DataType::Boolean => "Yes/No",
            DataType::Date => "Date",
        }
    }

    /// Interpret a free-form type column such as `No.`, `%`, `dd/mm/yy` or `Yes/No`.
    pub fn from_label(value: &str) -> Option<Self> {
        let lowered = value.trim().to_ascii_lowercase();
        if lowered.is_empty() {
            return None;
        }
        if lowered.contains("yes/no") || lowered.contains("bool") {
            Some(DataType::Boolean)
        } else if lowered.contains('%') || lowered.contains("percent") {
            Some(DataType::Percent)
        } else if lowered.contains("no.") || lowered.contains("number") || lowered == "no" {
            Some(DataType::Number)
        } else if lowered.contains("date") || lowered.contains("dd/mm") {
            Some(DataType::Date)
        } else if lowered.contains("text") {
            Some(DataType::Text)
        } else {
            None
        }
    }

    /// Infer the type from a trailing suffix in a data point name, e.g. `Planned Value (PV) (No.)`.
    pub fn infer_from_name(name: &str) -> Option<Self> {
        let trimmed = name.trim_end();
        let open = trimmed.rfind('(')?;
        if !trimmed.ends_with(')') {
            return None;
        }
        Self::from_label(&trimmed[open + 1..trimmed.len() - 1])
    }
}

/// Raw input definition; its value lives in the per-assessment store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPointDef {
    pub name: String,
    pub pillar: String,
    pub data_type: DataType,
}

/// How an assessment criterion's formula is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaKind {
    Quantitative,
    Qualitative,
    Descriptive,
}

impl FormulaKind {
    pub fn label(&self) -> &'static str {
        match self {
            FormulaKind::Quantitative => "quantitative",
            FormulaKind::Qualitative => "qualitative",
            FormulaKind::Descriptive => "descriptive",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quantitative" | "quant" | "numeric" => Some(FormulaKind::Quantitative),
            "qualitative" | "qual" => Some(FormulaKind::Qualitative),
            "descriptive" | "manual" => Some(FormulaKind::Descriptive),
            _ => None,
        }
    }
}

/// Smallest scored unit of the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentCriterion {
    pub name: String,
    pub performance_signal: String,
    pub formula: String,
    pub kind: FormulaKind,
    /// Relative to sibling criteria under the same performance signal.
    pub weight: f64,
    pub data_points: Vec<String>,
    pub thresholds: ThresholdSet,
    /// Formula token to data point links resolved when the hierarchy was linked.
    #[serde(default)]
    pub bindings: Vec<FormulaBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSignal {
    pub name: String,
    pub key_topic: String,
    /// Relative to sibling signals under the same key topic.
    pub weight: f64,
    pub criteria: Vec<String>,
    #[serde(default)]
    pub thresholds: ThresholdSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyTopic {
    pub name: String,
    pub pillar: String,
    pub signals: Vec<String>,
    #[serde(default)]
    pub thresholds: ThresholdSet,
}
