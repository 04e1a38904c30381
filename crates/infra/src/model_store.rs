//! On-disk forecast model cache.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use insight_ai::forecast::{CachedModel, ModelKey, ModelStore, ModelStoreError};

/// One JSON artifact per model key under a directory.
///
/// Each save writes a temp file in the same directory and renames it over
/// the artifact, so readers never see a half-written file. Concurrent
/// writers for the same key resolve as last-writer-wins.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    /// Creates `dir` if it does not exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ModelStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &ModelKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.storage_name()))
    }
}

impl ModelStore for FileModelStore {
    fn load(&self, key: &ModelKey) -> Result<Option<CachedModel>, ModelStoreError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => CachedModel::from_bytes(&bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn save(&self, model: &CachedModel) -> Result<(), ModelStoreError> {
        let bytes = model.to_bytes()?;
        let path = self.path_for(&model.key);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        tmp.write_all(&bytes).map_err(|e| io_error(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| io_error(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| io_error(&path, e.error))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "model artifact written");
        Ok(())
    }

    fn invalidate(&self, key: &ModelKey) -> Result<(), ModelStoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

fn io_error(path: &Path, e: io::Error) -> ModelStoreError {
    ModelStoreError::Io(format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use insight_ai::forecast::{
        CacheOutcome, ForecastModelManager, ForecastParams, ForecastTarget, TrendSeasonalModel,
    };
    use insight_core::{CompanyId, EntityKey, Granularity, ProductId, TimeSeriesPoint, WarehouseId};

    use super::*;

    fn key() -> ModelKey {
        ModelKey::new(
            ForecastTarget::Demand,
            EntityKey::product(CompanyId::new(1), WarehouseId::new(5), ProductId::new(100)),
        )
    }

    fn series() -> Vec<TimeSeriesPoint> {
        (1..=10)
            .map(|d| TimeSeriesPoint::new(NaiveDate::from_ymd_opt(2024, 1, d).unwrap(), 2.0 * d as f64))
            .collect()
    }

    fn artifact() -> CachedModel {
        let params = ForecastParams::default();
        let model = TrendSeasonalModel::fit(&series(), Granularity::Day, &params).unwrap();
        CachedModel::new(key(), params, model)
    }

    #[test]
    fn artifacts_are_named_after_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::open(dir.path()).unwrap();
        let saved = artifact();
        store.save(&saved).unwrap();

        assert!(dir.path().join("demand_c1_w5_p100.json").is_file());
        assert_eq!(store.load(&key()).unwrap(), Some(saved));
    }

    #[test]
    fn absent_artifact_loads_as_none_and_invalidate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::open(dir.path().join("nested/models")).unwrap();
        assert_eq!(store.load(&key()).unwrap(), None);
        store.invalidate(&key()).unwrap();
        store.invalidate(&key()).unwrap();
    }

    #[test]
    fn truncated_file_is_reported_as_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::open(dir.path()).unwrap();
        fs::write(store.path_for(&key()), b"{\"schema_version\": 1, \"key\":").unwrap();

        let err = store.load(&key()).unwrap_err();
        assert!(err.is_corruption(), "{err}");
    }

    #[test]
    fn manager_retrains_over_a_corrupt_file_and_reuses_afterwards() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileModelStore::open(dir.path()).unwrap());
        fs::write(store.path_for(&key()), b"garbage").unwrap();

        let manager = ForecastModelManager::new(store.clone(), ForecastParams::default());
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();

        let first = manager
            .forecast(&key(), &series(), Granularity::Day, 3, as_of)
            .unwrap()
            .unwrap();
        assert_eq!(first.cache, CacheOutcome::Retrained);
        assert!(store.load(&key()).unwrap().is_some());

        let second = manager
            .forecast(&key(), &series(), Granularity::Day, 3, as_of)
            .unwrap()
            .unwrap();
        assert_eq!(second.cache, CacheOutcome::Reused);
        assert_eq!(first.points, second.points);
    }

    #[test]
    fn models_survive_a_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        FileModelStore::open(dir.path()).unwrap().save(&artifact()).unwrap();

        let reopened = FileModelStore::open(dir.path()).unwrap();
        let loaded = reopened.load(&key()).unwrap().unwrap();
        assert_eq!(loaded.key, key());
        assert_eq!(loaded.model, artifact().model);
    }
}
