use std::fs;
use std::path::{Path, PathBuf};

use super::repository::{AssessmentId, AssessmentRecord, AssessmentRepository, RepositoryError};

/// One pretty-printed JSON document per assessment: `{root}/{id}.json`.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|err| {
            RepositoryError::Unavailable(format!("cannot create {}: {err}", root.display()))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &AssessmentId) -> PathBuf {
        let file_name: String = id
            .0
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }

    fn write(&self, record: &AssessmentRecord) -> Result<(), RepositoryError> {
        let path = self.path_for(&record.id);
        let body = serde_json::to_vec_pretty(record)
            .map_err(|err| RepositoryError::Unavailable(format!("cannot encode record: {err}")))?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, body).map_err(|err| {
            RepositoryError::Unavailable(format!("cannot write {}: {err}", temp_path.display()))
        })?;
        fs::rename(&temp_path, &path).map_err(|err| {
            RepositoryError::Unavailable(format!("cannot replace {}: {err}", path.display()))
        })
    }

    fn read(path: &Path) -> Result<AssessmentRecord, RepositoryError> {
        let body = fs::read(path).map_err(|err| {
            RepositoryError::Unavailable(format!("cannot read {}: {err}", path.display()))
        })?;
        serde_json::from_slice(&body).map_err(|err| {
            RepositoryError::Unavailable(format!("corrupt record {}: {err}", path.display()))
        })
    }
}

impl AssessmentRepository for JsonFileRepository {
    fn insert(&self, record: AssessmentRecord) -> Result<AssessmentRecord, RepositoryError> {
        if self.path_for(&record.id).exists() {
            return Err(RepositoryError::Conflict);
        }
        self.write(&record)?;
        Ok(record)
    }

    fn update(&self, record: AssessmentRecord) -> Result<(), RepositoryError> {
        if !self.path_for(&record.id).exists() {
            return Err(RepositoryError::NotFound);
        }
        self.write(&record)
    }

    fn fetch(&self, id: &AssessmentId) -> Result<Option<AssessmentRecord>, RepositoryError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path).map(Some)
    }

    /// Most recently updated first.
    fn list(&self, limit: usize) -> Result<Vec<AssessmentRecord>, RepositoryError> {
        let entries = fs::read_dir(&self.root).map_err(|err| {
            RepositoryError::Unavailable(format!("cannot list {}: {err}", self.root.display()))
        })?;
        let mut records = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|err| RepositoryError::Unavailable(err.to_string()))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                records.push(Self::read(&path)?);
            }
        }
        records.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
        records.truncate(limit);
        Ok(records)
    }
}
