use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::engine::AssessmentEngine;
use super::report::{write_csv, AssessmentReport, AssessmentReportView};
use super::repository::{
    AssessmentId, AssessmentRecord, AssessmentRepository, AssessmentSnapshot, RepositoryError,
};
use super::result::{AssessmentResult, CriterionOverride};
use crate::formula::{FormulaMatcher, FormulaPreview, PreviewOutcome, PreviewRequest};
use crate::hierarchy::Hierarchy;
use crate::store::{DataPointStore, StoreError};

/// Payload for opening a new assessment session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAssessment {
    pub name: String,
    /// Raw entries keyed by data point name.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// Listing entry for the snapshot history of one assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub values: usize,
    pub overrides: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<f64>,
    pub rating: &'static str,
}

/// Service composing the calculation engine with assessment persistence.
///
/// Changes to one assessment are read, applied and written back while holding that
/// assessment's write lock, so concurrent requests for the same id never drop each other's
/// edits.
pub struct AssessmentService<R> {
    repository: Arc<R>,
    engine: Arc<AssessmentEngine>,
    preview: FormulaPreview,
    write_locks: Mutex<HashMap<AssessmentId, Arc<Mutex<()>>>>,
}

static ASSESSMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Timestamp prefix keeps ids unique across restarts when records are kept on disk.
fn next_assessment_id(now: DateTime<Utc>) -> AssessmentId {
    let id = ASSESSMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AssessmentId(format!("asmt-{}-{id:04}", now.format("%y%m%d%H%M%S")))
}

impl<R> AssessmentService<R>
where
    R: AssessmentRepository + 'static,
{
    pub fn new(repository: Arc<R>, engine: Arc<AssessmentEngine>) -> Self {
        Self {
            repository,
            engine,
            preview: FormulaPreview::default(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn write_lock(&self, id: &AssessmentId) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().expect("write lock table poisoned");
        locks.entry(id.clone()).or_default().clone()
    }

    /// Use the given matcher for ad-hoc formula previews.
    pub fn with_matcher(mut self, matcher: FormulaMatcher) -> Self {
        self.preview = FormulaPreview::new(matcher);
        self
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        self.engine.hierarchy()
    }

    pub fn preview(&self, request: &PreviewRequest) -> PreviewOutcome {
        self.preview.run(request)
    }

    /// Open a session with an empty store, applying any initial values.
    pub fn create(
        &self,
        request: NewAssessment,
    ) -> Result<AssessmentRecord, AssessmentServiceError> {
        let now = Utc::now();
        let mut store = DataPointStore::for_hierarchy(self.hierarchy());
        let mut pending_data_points = Vec::new();
        for (name, raw) in &request.values {
            if store.set_raw(name, raw)? {
                pending_data_points.push(name.clone());
            }
        }

        let name = if request.name.trim().is_empty() {
            "Untitled assessment".to_string()
        } else {
            request.name.trim().to_string()
        };
        let record = AssessmentRecord {
            id: next_assessment_id(now),
            name,
            store,
            overrides: BTreeMap::new(),
            result: None,
            pending_data_points,
            pending_criteria: Vec::new(),
            snapshots: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert(record)?;
        info!(assessment_id = %stored.id, values = stored.store.len(), "assessment created");
        Ok(stored)
    }

    pub fn get(&self, id: &AssessmentId) -> Result<AssessmentRecord, AssessmentServiceError> {
        let record = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn list(&self, limit: usize) -> Result<Vec<AssessmentRecord>, AssessmentServiceError> {
        Ok(self.repository.list(limit)?)
    }

    /// Store raw entries; blank entries clear the value. Every name is validated before any
    /// value is written.
    pub fn record_values(
        &self,
        id: &AssessmentId,
        values: &BTreeMap<String, String>,
    ) -> Result<AssessmentRecord, AssessmentServiceError> {
        let lock = self.write_lock(id);
        let _guard = lock.lock().expect("assessment write lock poisoned");
        let mut record = self.get(id)?;
        if let Some(unknown) = values
            .keys()
            .find(|name| self.hierarchy().data_point(name).is_none())
        {
            return Err(StoreError::UnknownDataPoint(unknown.clone()).into());
        }

        let mut changed = 0;
        for (name, raw) in values {
            if record.store.set_raw(name, raw)? {
                changed += 1;
                if !record.pending_data_points.contains(name) {
                    record.pending_data_points.push(name.clone());
                }
            }
        }
        record.updated_at = Utc::now();
        self.repository.update(record.clone())?;
        info!(assessment_id = %id, changed, "data point values recorded");
        Ok(record)
    }

    /// Set or clear (`None`) manual criterion values.
    pub fn set_overrides(
        &self,
        id: &AssessmentId,
        overrides: &BTreeMap<String, Option<CriterionOverride>>,
    ) -> Result<AssessmentRecord, AssessmentServiceError> {
        let lock = self.write_lock(id);
        let _guard = lock.lock().expect("assessment write lock poisoned");
        let mut record = self.get(id)?;
        if let Some(unknown) = overrides
            .keys()
            .find(|name| self.hierarchy().criterion(name).is_none())
        {
            return Err(AssessmentServiceError::UnknownCriterion(unknown.clone()));
        }

        for (name, manual) in overrides {
            let previous = match manual {
                Some(manual) => record.overrides.insert(name.clone(), *manual),
                None => record.overrides.remove(name),
            };
            if previous != *manual && !record.pending_criteria.contains(name) {
                record.pending_criteria.push(name.clone());
            }
        }
        record.updated_at = Utc::now();
        self.repository.update(record.clone())?;
        info!(assessment_id = %id, overrides = record.overrides.len(), "overrides updated");
        Ok(record)
    }

    /// Calculate the assessment and store the result as a new snapshot. After the first run
    /// only criteria affected by pending changes are re-evaluated.
    pub fn calculate(
        &self,
        id: &AssessmentId,
    ) -> Result<AssessmentResult, AssessmentServiceError> {
        let lock = self.write_lock(id);
        let _guard = lock.lock().expect("assessment write lock poisoned");
        let mut record = self.get(id)?;
        let result = match &record.result {
            Some(previous) => self.engine.recalculate(
                previous,
                &record.pending_data_points,
                &record.pending_criteria,
                &record.store,
                &record.overrides,
            ),
            None => self.engine.calculate(&record.store, &record.overrides),
        };

        let version = record.latest_version() + 1;
        record.snapshots.push(AssessmentSnapshot {
            version,
            values: record.store.values().clone(),
            overrides: record.overrides.clone(),
            result: result.clone(),
            created_at: result.calculated_at,
        });
        record.result = Some(result.clone());
        record.pending_data_points.clear();
        record.pending_criteria.clear();
        record.updated_at = Utc::now();
        self.repository.update(record)?;

        info!(
            assessment_id = %id,
            version,
            overall = result.overall.value,
            "assessment snapshot stored"
        );
        Ok(result)
    }

    pub fn result(&self, id: &AssessmentId) -> Result<AssessmentResult, AssessmentServiceError> {
        self.get(id)?
            .result
            .ok_or_else(|| AssessmentServiceError::NoResult(id.clone()))
    }

    pub fn report(
        &self,
        id: &AssessmentId,
    ) -> Result<AssessmentReportView, AssessmentServiceError> {
        let result = self.result(id)?;
        Ok(AssessmentReport::new(self.hierarchy(), &result).view())
    }

    pub fn export_csv(
        &self,
        id: &AssessmentId,
        pillar: Option<&str>,
    ) -> Result<String, AssessmentServiceError> {
        let result = self.result(id)?;
        let mut buffer = Vec::new();
        write_csv(self.hierarchy(), &result, pillar, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn history(
        &self,
        id: &AssessmentId,
    ) -> Result<Vec<SnapshotSummary>, AssessmentServiceError> {
        let record = self.get(id)?;
        Ok(record
            .snapshots
            .iter()
            .rev()
            .map(|snapshot| SnapshotSummary {
                version: snapshot.version,
                created_at: snapshot.created_at,
                values: snapshot.values.len(),
                overrides: snapshot.overrides.len(),
                overall: snapshot.result.overall.value,
                rating: snapshot.result.overall.rating.label(),
            })
            .collect())
    }

    /// Bring back the values and overrides of an earlier snapshot. The restored inputs are
    /// pending until the next calculation.
    pub fn restore(
        &self,
        id: &AssessmentId,
        version: u32,
    ) -> Result<AssessmentRecord, AssessmentServiceError> {
        let lock = self.write_lock(id);
        let _guard = lock.lock().expect("assessment write lock poisoned");
        let mut record = self.get(id)?;
        let Some(snapshot) = record.snapshot(version).cloned() else {
            warn!(assessment_id = %id, version, "restore requested for unknown snapshot");
            return Err(AssessmentServiceError::UnknownVersion(version));
        };

        for name in record.store.restore(snapshot.values) {
            if !record.pending_data_points.contains(&name) {
                record.pending_data_points.push(name);
            }
        }
        let mut touched: Vec<String> = record
            .overrides
            .keys()
            .chain(snapshot.overrides.keys())
            .filter(|name| record.overrides.get(*name) != snapshot.overrides.get(*name))
            .cloned()
            .collect();
        touched.sort();
        touched.dedup();
        for name in touched {
            if !record.pending_criteria.contains(&name) {
                record.pending_criteria.push(name);
            }
        }
        record.overrides = snapshot.overrides;
        record.updated_at = Utc::now();
        self.repository.update(record.clone())?;
        info!(assessment_id = %id, version, "snapshot inputs restored");
        Ok(record)
    }
}

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("unknown assessment criterion '{0}'")]
    UnknownCriterion(String),
    #[error("assessment {0} has not been calculated yet")]
    NoResult(AssessmentId),
    #[error("snapshot version {0} does not exist")]
    UnknownVersion(u32),
    #[error("failed to export result: {0}")]
    Export(#[from] csv::Error),
    #[error("assessment task did not complete: {0}")]
    Worker(String),
}
