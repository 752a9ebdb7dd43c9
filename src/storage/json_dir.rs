//! A directory of JSON records, one file per key.

use crate::error::{StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

const EXTENSION: &str = "json";

pub(crate) struct JsonDir {
    dir: PathBuf,
}

impl JsonDir {
    /// Open `dir`, creating it if needed.
    pub(crate) fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StorageError::DirectoryError(e.to_string()))?;
        Ok(Self { dir })
    }

    fn file(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, EXTENSION))
    }

    pub(crate) fn exists(&self, key: &str) -> bool {
        self.file(key).exists()
    }

    pub(crate) fn read<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let content = match fs::read_to_string(self.file(key)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::LoadFailed(e.to_string())),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageError::LoadFailed(format!("{}: {}", key, e)))
    }

    /// Write through a temporary file so readers never see a partial record.
    pub(crate) fn write<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(value)?;
        let file = self.file(key);
        let tmp = file.with_extension("json.tmp");

        fs::write(&tmp, content).map_err(|e| StorageError::SaveFailed(e.to_string()))?;
        fs::rename(&tmp, &file).map_err(|e| StorageError::SaveFailed(e.to_string()))
    }

    pub(crate) fn remove(&self, key: &str) -> StorageResult<bool> {
        match fs::remove_file(self.file(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::SaveFailed(e.to_string())),
        }
    }

    /// Load every readable record. Unreadable files are skipped with a warning.
    pub(crate) fn read_all<T: DeserializeOwned>(&self) -> StorageResult<Vec<T>> {
        let entries =
            fs::read_dir(&self.dir).map_err(|e| StorageError::DirectoryError(e.to_string()))?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::DirectoryError(e.to_string()))?;
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };

            match self.read(&key) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable record"),
            }
        }

        Ok(records)
    }
}
