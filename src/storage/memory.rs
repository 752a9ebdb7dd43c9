//! In-memory stores.

use crate::error::{StorageError, StorageResult};
use crate::job::{JobStatus, ScanJob};
use crate::scheduler::ScheduleDefinition;
use crate::storage::{sort_by_name, sort_newest_first, JobStore, ScheduleStore};
use crate::types::{JobId, ScheduleId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Jobs held in a map for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, ScanJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, ScanJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobStore for MemoryJobStore {
    fn create(&self, job: &ScanJob) -> StorageResult<JobId> {
        let mut jobs = self.jobs();
        if jobs.contains_key(&job.id) {
            return Err(StorageError::AlreadyExists(job.id.to_string()));
        }
        jobs.insert(job.id, job.clone());
        Ok(job.id)
    }

    fn save(&self, job: &ScanJob) -> StorageResult<()> {
        self.jobs().insert(job.id, job.clone());
        Ok(())
    }

    fn save_if(&self, job: &ScanJob, expected: &[JobStatus]) -> StorageResult<bool> {
        let mut jobs = self.jobs();
        match jobs.get_mut(&job.id) {
            Some(current) if expected.contains(&current.status) => {
                *current = job.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn find_by_id(&self, id: &JobId) -> StorageResult<Option<ScanJob>> {
        Ok(self.jobs().get(id).cloned())
    }

    fn delete(&self, id: &JobId) -> StorageResult<bool> {
        Ok(self.jobs().remove(id).is_some())
    }

    fn list_all(&self) -> StorageResult<Vec<ScanJob>> {
        let mut jobs: Vec<ScanJob> = self.jobs().values().cloned().collect();
        sort_newest_first(&mut jobs);
        Ok(jobs)
    }
}

/// Schedule definitions held in a map for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    defs: Mutex<HashMap<ScheduleId, ScheduleDefinition>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn defs(&self) -> MutexGuard<'_, HashMap<ScheduleId, ScheduleDefinition>> {
        self.defs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn save(&self, def: &ScheduleDefinition) -> StorageResult<()> {
        self.defs().insert(def.id, def.clone());
        Ok(())
    }

    fn find(&self, id: &ScheduleId) -> StorageResult<Option<ScheduleDefinition>> {
        Ok(self.defs().get(id).cloned())
    }

    fn delete(&self, id: &ScheduleId) -> StorageResult<bool> {
        Ok(self.defs().remove(id).is_some())
    }

    fn record_run(
        &self,
        id: &ScheduleId,
        at: DateTime<Utc>,
        next: Option<DateTime<Utc>>,
    ) -> StorageResult<bool> {
        match self.defs().get_mut(id) {
            Some(def) => {
                def.record_run(at, next);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_all(&self) -> StorageResult<Vec<ScheduleDefinition>> {
        let mut defs: Vec<ScheduleDefinition> = self.defs().values().cloned().collect();
        sort_by_name(&mut defs);
        Ok(defs)
    }
}
