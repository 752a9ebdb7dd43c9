//! Job and schedule persistence.
//!
//! The engine talks to storage through the [`JobStore`] and [`ScheduleStore`]
//! traits. JSON-file stores keep one file per record; in-memory stores back
//! tests and ephemeral runs.

mod json_dir;
mod json_store;
mod memory;

pub use json_store::{JsonJobStore, JsonScheduleStore};
pub use memory::{MemoryJobStore, MemoryScheduleStore};

use crate::error::{StorageError, StorageResult};
use crate::job::{JobStatus, ScanJob};
use crate::scheduler::ScheduleDefinition;
use crate::types::{JobId, ScheduleId};
use chrono::{DateTime, Utc};

/// Durable storage of scan jobs.
///
/// Writes to the same job are serialized by the implementation.
pub trait JobStore: Send + Sync {
    /// Store a new job, failing if its id is already taken.
    fn create(&self, job: &ScanJob) -> StorageResult<JobId>;

    /// Insert or overwrite a job.
    fn save(&self, job: &ScanJob) -> StorageResult<()>;

    /// Overwrite a job only if its stored status is one of `expected`.
    ///
    /// Returns whether the write happened.
    fn save_if(&self, job: &ScanJob, expected: &[JobStatus]) -> StorageResult<bool>;

    fn find_by_id(&self, id: &JobId) -> StorageResult<Option<ScanJob>>;

    /// Remove a job. Returns whether it existed.
    fn delete(&self, id: &JobId) -> StorageResult<bool>;

    /// Every job, newest first.
    fn list_all(&self) -> StorageResult<Vec<ScanJob>>;

    /// Jobs in `status`, newest first.
    fn list_by_status(&self, status: JobStatus) -> StorageResult<Vec<ScanJob>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|job| job.status == status)
            .collect())
    }

    /// Jobs created at or after `since`, newest first.
    fn list_recent_since(&self, since: DateTime<Utc>) -> StorageResult<Vec<ScanJob>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|job| job.created_at >= since)
            .collect())
    }

    /// Find the single job whose id starts with `prefix`.
    fn find_by_prefix(&self, prefix: &str) -> StorageResult<ScanJob> {
        unique_prefix_match(self.list_all()?, prefix, |job| job.id.to_string())
    }
}

/// Durable storage of schedule definitions.
pub trait ScheduleStore: Send + Sync {
    /// Insert or overwrite a definition.
    fn save(&self, def: &ScheduleDefinition) -> StorageResult<()>;

    fn find(&self, id: &ScheduleId) -> StorageResult<Option<ScheduleDefinition>>;

    /// Remove a definition. Returns whether it existed.
    fn delete(&self, id: &ScheduleId) -> StorageResult<bool>;

    /// Set the run times of the stored definition, leaving every other
    /// field as currently stored. Returns false if the definition is gone.
    fn record_run(
        &self,
        id: &ScheduleId,
        at: DateTime<Utc>,
        next: Option<DateTime<Utc>>,
    ) -> StorageResult<bool>;

    /// Every definition, ordered by name.
    fn list_all(&self) -> StorageResult<Vec<ScheduleDefinition>>;

    /// Enabled definitions, ordered by name.
    fn list_enabled(&self) -> StorageResult<Vec<ScheduleDefinition>> {
        Ok(self.list_all()?.into_iter().filter(|d| d.enabled).collect())
    }

    fn find_by_name(&self, name: &str) -> StorageResult<Option<ScheduleDefinition>> {
        Ok(self.list_all()?.into_iter().find(|d| d.name == name))
    }

    /// Find a definition by exact name or unique id prefix.
    fn find_by_handle(&self, handle: &str) -> StorageResult<ScheduleDefinition> {
        if let Some(def) = self.find_by_name(handle)? {
            return Ok(def);
        }
        unique_prefix_match(self.list_all()?, handle, |d| d.id.to_string())
    }
}

/// Pick the one item whose id starts with `prefix` (case-insensitive).
fn unique_prefix_match<T>(
    items: Vec<T>,
    prefix: &str,
    id_of: impl Fn(&T) -> String,
) -> StorageResult<T> {
    let prefix_lc = prefix.trim().to_ascii_lowercase();
    if prefix_lc.is_empty() {
        return Err(StorageError::NotFound(prefix.to_string()));
    }

    let mut matches: Vec<T> = items
        .into_iter()
        .filter(|item| id_of(item).starts_with(&prefix_lc))
        .collect();

    match matches.len() {
        0 => Err(StorageError::NotFound(prefix.to_string())),
        1 => Ok(matches.remove(0)),
        n => Err(StorageError::AmbiguousPrefix {
            prefix: prefix.to_string(),
            matches: n,
        }),
    }
}

/// Newest first, ties broken by id for a stable order.
fn sort_newest_first(jobs: &mut [ScanJob]) {
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

fn sort_by_name(defs: &mut [ScheduleDefinition]) {
    defs.sort_by(|a, b| a.name.cmp(&b.name));
}
