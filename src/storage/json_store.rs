//! JSON-file job and schedule stores.
//!
//! Each record is a separate JSON file named by its id, which keeps records
//! human-readable and lets a single bad file be skipped rather than losing
//! the whole store.

use crate::error::{StorageError, StorageResult};
use crate::job::{JobStatus, ScanJob};
use crate::scheduler::ScheduleDefinition;
use crate::storage::json_dir::JsonDir;
use crate::storage::{sort_by_name, sort_newest_first, JobStore, ScheduleStore};
use crate::types::{JobId, ScheduleId};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Jobs stored as `<dir>/<job id>.json`.
pub struct JsonJobStore {
    files: JsonDir,
    // Serializes read-modify-write cycles across jobs in this process.
    write_lock: Mutex<()>,
}

impl JsonJobStore {
    /// Open a job store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self {
            files: JsonDir::open(dir)?,
            write_lock: Mutex::new(()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobStore for JsonJobStore {
    fn create(&self, job: &ScanJob) -> StorageResult<JobId> {
        let _guard = self.lock();
        let key = job.id.to_string();
        if self.files.exists(&key) {
            return Err(StorageError::AlreadyExists(key));
        }
        self.files.write(&key, job)?;
        Ok(job.id)
    }

    fn save(&self, job: &ScanJob) -> StorageResult<()> {
        let _guard = self.lock();
        self.files.write(&job.id.to_string(), job)
    }

    fn save_if(&self, job: &ScanJob, expected: &[JobStatus]) -> StorageResult<bool> {
        let _guard = self.lock();
        let key = job.id.to_string();
        let current: Option<ScanJob> = self.files.read(&key)?;
        match current {
            Some(current) if expected.contains(&current.status) => {
                self.files.write(&key, job)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn find_by_id(&self, id: &JobId) -> StorageResult<Option<ScanJob>> {
        self.files.read(&id.to_string())
    }

    fn delete(&self, id: &JobId) -> StorageResult<bool> {
        let _guard = self.lock();
        self.files.remove(&id.to_string())
    }

    fn list_all(&self) -> StorageResult<Vec<ScanJob>> {
        let mut jobs: Vec<ScanJob> = self.files.read_all()?;
        sort_newest_first(&mut jobs);
        Ok(jobs)
    }
}

/// Schedule definitions stored as `<dir>/<schedule id>.json`.
pub struct JsonScheduleStore {
    files: JsonDir,
    write_lock: Mutex<()>,
}

impl JsonScheduleStore {
    /// Open a schedule store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self {
            files: JsonDir::open(dir)?,
            write_lock: Mutex::new(()),
        })
    }
}

impl ScheduleStore for JsonScheduleStore {
    fn save(&self, def: &ScheduleDefinition) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.files.write(&def.id.to_string(), def)
    }

    fn find(&self, id: &ScheduleId) -> StorageResult<Option<ScheduleDefinition>> {
        self.files.read(&id.to_string())
    }

    fn delete(&self, id: &ScheduleId) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.files.remove(&id.to_string())
    }

    fn record_run(
        &self,
        id: &ScheduleId,
        at: DateTime<Utc>,
        next: Option<DateTime<Utc>>,
    ) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let key = id.to_string();
        let Some(mut def) = self.files.read::<ScheduleDefinition>(&key)? else {
            return Ok(false);
        };
        def.record_run(at, next);
        self.files.write(&key, &def)?;
        Ok(true)
    }

    fn list_all(&self) -> StorageResult<Vec<ScheduleDefinition>> {
        let mut defs: Vec<ScheduleDefinition> = self.files.read_all()?;
        sort_by_name(&mut defs);
        Ok(defs)
    }
}
