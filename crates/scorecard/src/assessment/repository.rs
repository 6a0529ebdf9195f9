use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::engine::Overrides;
use super::result::AssessmentResult;
use crate::store::{DataPointStore, DataValue};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssessmentId(pub String);

impl fmt::Display for AssessmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inputs and result captured by one calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSnapshot {
    pub version: u32,
    pub values: BTreeMap<String, DataValue>,
    pub overrides: Overrides,
    pub result: AssessmentResult,
    pub created_at: DateTime<Utc>,
}

/// Repository record for one assessment session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: AssessmentId,
    pub name: String,
    pub store: DataPointStore,
    #[serde(default)]
    pub overrides: Overrides,
    #[serde(default)]
    pub result: Option<AssessmentResult>,
    /// Data points changed since the last calculation.
    #[serde(default)]
    pub pending_data_points: Vec<String>,
    /// Criteria whose override changed since the last calculation.
    #[serde(default)]
    pub pending_criteria: Vec<String>,
    #[serde(default)]
    pub snapshots: Vec<AssessmentSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssessmentRecord {
    pub fn latest_version(&self) -> u32 {
        self.snapshots
            .iter()
            .map(|snapshot| snapshot.version)
            .max()
            .unwrap_or(0)
    }

    pub fn snapshot(&self, version: u32) -> Option<&AssessmentSnapshot> {
        self.snapshots
            .iter()
            .find(|snapshot| snapshot.version == version)
    }

    pub fn summary_view(&self) -> AssessmentSummaryView {
        AssessmentSummaryView {
            id: self.id.clone(),
            name: self.name.clone(),
            values: self.store.len(),
            overrides: self.overrides.len(),
            version: self.latest_version(),
            overall: self.result.as_ref().and_then(|result| result.overall.value),
            rating: self
                .result
                .as_ref()
                .map(|result| result.overall.rating.label()),
            stale: !self.pending_data_points.is_empty() || !self.pending_criteria.is_empty(),
            updated_at: self.updated_at,
        }
    }
}

/// Storage abstraction so the service can be exercised in isolation.
pub trait AssessmentRepository: Send + Sync {
    fn insert(&self, record: AssessmentRecord) -> Result<AssessmentRecord, RepositoryError>;
    fn update(&self, record: AssessmentRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &AssessmentId) -> Result<Option<AssessmentRecord>, RepositoryError>;
    fn list(&self, limit: usize) -> Result<Vec<AssessmentRecord>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Compact listing entry for API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentSummaryView {
    pub id: AssessmentId,
    pub name: String,
    pub values: usize,
    pub overrides: usize,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<&'static str>,
    /// Inputs changed since the stored result was calculated.
    pub stale: bool,
    pub updated_at: DateTime<Utc>,
}
