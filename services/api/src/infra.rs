use metrics_exporter_prometheus::PrometheusHandle;
use scorecard::assessment::{
    AssessmentId, AssessmentRecord, AssessmentRepository, JsonFileRepository, RepositoryError,
};
use scorecard::config::EngineConfig;
use scorecard::formula::FormulaMatcher;
use scorecard::hierarchy::import::{
    ImportedHierarchy, MasterFileImportError, MasterFileImporter, SAMPLE_MASTER_FILE,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAssessmentRepository {
    records: Arc<Mutex<HashMap<AssessmentId, AssessmentRecord>>>,
}

impl AssessmentRepository for InMemoryAssessmentRepository {
    fn insert(&self, record: AssessmentRecord) -> Result<AssessmentRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: AssessmentRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            guard.insert(record.id.clone(), record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &AssessmentId) -> Result<Option<AssessmentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self, limit: usize) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<AssessmentRecord> = guard.values().cloned().collect();
        records.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
        records.truncate(limit);
        Ok(records)
    }
}

/// Storage chosen from `SCORECARD_DATA_DIR`: JSON documents on disk, or process memory.
pub(crate) enum ConfiguredRepository {
    Memory(InMemoryAssessmentRepository),
    Json(JsonFileRepository),
}

impl ConfiguredRepository {
    pub(crate) fn from_config(engine: &EngineConfig) -> Result<Self, RepositoryError> {
        match &engine.data_dir {
            Some(dir) => {
                info!(data_dir = %dir.display(), "persisting assessments as json documents");
                Ok(Self::Json(JsonFileRepository::new(dir)?))
            }
            None => Ok(Self::Memory(InMemoryAssessmentRepository::default())),
        }
    }
}

impl AssessmentRepository for ConfiguredRepository {
    fn insert(&self, record: AssessmentRecord) -> Result<AssessmentRecord, RepositoryError> {
        match self {
            Self::Memory(repository) => repository.insert(record),
            Self::Json(repository) => repository.insert(record),
        }
    }

    fn update(&self, record: AssessmentRecord) -> Result<(), RepositoryError> {
        match self {
            Self::Memory(repository) => repository.update(record),
            Self::Json(repository) => repository.update(record),
        }
    }

    fn fetch(&self, id: &AssessmentId) -> Result<Option<AssessmentRecord>, RepositoryError> {
        match self {
            Self::Memory(repository) => repository.fetch(id),
            Self::Json(repository) => repository.fetch(id),
        }
    }

    fn list(&self, limit: usize) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        match self {
            Self::Memory(repository) => repository.list(limit),
            Self::Json(repository) => repository.list(limit),
        }
    }
}

/// Import the configured master file, falling back to the bundled sample definition.
pub(crate) fn load_hierarchy(
    engine: &EngineConfig,
) -> Result<(ImportedHierarchy, FormulaMatcher), MasterFileImportError> {
    let matcher = FormulaMatcher::new(engine.match_threshold);
    let imported = match &engine.hierarchy_path {
        Some(path) => MasterFileImporter::from_path(path, &matcher)?,
        None => MasterFileImporter::from_reader(SAMPLE_MASTER_FILE.as_bytes(), &matcher)?,
    };
    report_import(&imported);
    Ok((imported, matcher))
}

pub(crate) fn report_import(imported: &ImportedHierarchy) {
    let hierarchy = &imported.hierarchy;
    info!(
        key_topics = hierarchy.key_topics().len(),
        criteria = hierarchy.criteria().len(),
        data_points = hierarchy.data_points().len(),
        "hierarchy loaded"
    );
    for warning in &imported.warnings {
        warn!(row = warning.row, message = %warning.message, "master file warning");
    }
    for issue in hierarchy.weight_issues() {
        warn!(
            level = issue.level.label(),
            parent = %issue.parent,
            total = issue.total,
            "sibling weights do not sum to 100"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scorecard::store::DataPointStore;
    use std::collections::BTreeMap;

    fn record(id: &str) -> AssessmentRecord {
        let now = Utc::now();
        AssessmentRecord {
            id: AssessmentId(id.to_string()),
            name: id.to_string(),
            store: DataPointStore::default(),
            overrides: BTreeMap::new(),
            result: None,
            pending_data_points: Vec::new(),
            pending_criteria: Vec::new(),
            snapshots: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn in_memory_repository_rejects_duplicates_and_missing_updates() {
        let repository = InMemoryAssessmentRepository::default();
        repository.insert(record("asmt-1")).expect("inserted");
        assert!(matches!(
            repository.insert(record("asmt-1")),
            Err(RepositoryError::Conflict)
        ));
        assert!(matches!(
            repository.update(record("asmt-2")),
            Err(RepositoryError::NotFound)
        ));
        assert_eq!(repository.list(10).expect("listing").len(), 1);
    }

    #[test]
    fn sample_hierarchy_loads_without_a_master_file() {
        let engine = EngineConfig {
            match_threshold: 0.5,
            hierarchy_path: None,
            data_dir: None,
        };
        let (imported, _) = load_hierarchy(&engine).expect("sample imports");
        assert_eq!(imported.hierarchy.key_topics().len(), 3);
        assert!(matches!(
            ConfiguredRepository::from_config(&engine),
            Ok(ConfiguredRepository::Memory(_))
        ));
    }
}
