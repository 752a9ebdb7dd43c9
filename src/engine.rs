//! Scan engine: the operations exposed to front ends.
//!
//! Creating a job validates the request, durably stores a `PENDING` record,
//! and launches the coordinator on its own task. Everything after that is
//! communicated through the job store; the engine only keeps a registry of
//! cancellation tokens and live progress counters for jobs still running.

use crate::error::{EngineError, EngineResult, StorageError};
use crate::job::{JobStatus, JobSummary, ScanJob};
use crate::scanner::{Coordinator, ProbeProgress, Prober, ScannerConfig};
use crate::scheduler::ScheduleDefinition;
use crate::storage::JobStore;
use crate::types::{JobId, Port, PortSpec, ScheduleId, Target};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Handles for a job whose coordinator task is still alive.
#[derive(Debug, Clone)]
struct ActiveJob {
    /// Identifies the coordinator that owns the entry.
    run: u64,
    cancel: CancellationToken,
    progress: ProbeProgress,
}

type Registry = Arc<Mutex<HashMap<JobId, ActiveJob>>>;

fn current_runtime() -> EngineResult<Handle> {
    Handle::try_current().map_err(|e| EngineError::Orchestration(e.to_string()))
}

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<JobId, ActiveJob>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drop the entry for `id` if it still belongs to `run`.
fn unregister(registry: &Registry, id: &JobId, run: u64) {
    let mut active = lock(registry);
    if active.get(id).is_some_and(|entry| entry.run == run) {
        active.remove(id);
    }
}

/// Filter for [`ScanEngine::list_jobs`].
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    /// Only jobs created at or after this time.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Aggregate job counts for an overview screen.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_scans: usize,
    pub scans_last_24h: usize,
    pub scans_last_7d: usize,
    pub running_scans: usize,
    pub completed_scans: usize,
    pub failed_scans: usize,
    pub cancelled_scans: usize,
    /// Jobs from the last seven days, newest first.
    pub recent_scans: Vec<JobSummary>,
}

/// Entry point for creating, inspecting and cancelling scan jobs.
pub struct ScanEngine {
    store: Arc<dyn JobStore>,
    coordinator: Arc<Coordinator>,
    common_ports: Vec<Port>,
    active: Registry,
    next_run: AtomicU64,
}

impl ScanEngine {
    /// Create an engine probing through `prober`.
    pub fn new(store: Arc<dyn JobStore>, prober: Arc<dyn Prober>, config: &ScannerConfig) -> Self {
        let coordinator = Coordinator::new(Arc::clone(&store), prober, config.max_concurrent_probes);
        Self {
            store,
            coordinator: Arc::new(coordinator),
            common_ports: config.common_ports.clone(),
            active: Arc::default(),
            next_run: AtomicU64::new(0),
        }
    }

    /// Create an engine that probes over TCP as described by `config`.
    pub fn with_tcp(store: Arc<dyn JobStore>, config: &ScannerConfig) -> Self {
        Self::new(store, Arc::new(config.tcp_prober()), config)
    }

    /// Validate a request, store it as `PENDING` and start scanning.
    ///
    /// Returns as soon as the pending record is stored. A malformed port
    /// specification or target is rejected before anything is stored.
    /// Must be called from within a Tokio runtime.
    pub fn create_job(&self, target: &str, port_spec: &str) -> EngineResult<JobSummary> {
        self.launch(target, port_spec, None)
    }

    /// Start a job on behalf of a schedule definition.
    pub fn create_scheduled_job(&self, def: &ScheduleDefinition) -> EngineResult<JobSummary> {
        self.launch(&def.target, &def.port_range, Some(def.id))
    }

    /// Validate and store a `PENDING` job without starting it.
    ///
    /// A daemon picks queued jobs up through [`ScanEngine::start_queued`].
    pub fn enqueue_job(&self, target: &str, port_spec: &str) -> EngineResult<JobSummary> {
        let (job, _ports) = self.prepare(target, port_spec, None)?;
        self.store.create(&job)?;
        info!(job = %job.id.short(), target = %job.target, "scan job queued");
        Ok(job.summary())
    }

    /// Start every stored `PENDING` job not already owned by this engine.
    pub fn start_queued(&self) -> EngineResult<Vec<JobId>> {
        let runtime = current_runtime()?;
        let mut started = Vec::new();

        for listed in self.store.list_by_status(JobStatus::Pending)? {
            let Some(handles) = self.register(listed.id) else {
                continue;
            };

            // The owner may have finished and released it since the listing.
            let mut job = match self.store.find_by_id(&listed.id) {
                Ok(Some(job)) if job.status == JobStatus::Pending => job,
                Ok(_) => {
                    unregister(&self.active, &listed.id, handles.run);
                    continue;
                }
                Err(e) => {
                    unregister(&self.active, &listed.id, handles.run);
                    return Err(e.into());
                }
            };

            match PortSpec::parse(&job.port_range) {
                Ok(spec) => {
                    let ports = spec.expand(&self.common_ports);
                    self.spawn_run(&runtime, job.id, job.target.clone(), ports, handles);
                    started.push(job.id);
                }
                Err(e) => {
                    unregister(&self.active, &job.id, handles.run);
                    // Hand-edited or stale record; it can never run.
                    if job.mark_running().is_ok() && job.fail(e.to_string()).is_ok() {
                        self.store.save_if(&job, &[JobStatus::Pending])?;
                    }
                    error!(job = %job.id.short(), error = %e, "queued job has an invalid port specification");
                }
            }
        }

        if !started.is_empty() {
            info!(count = started.len(), "queued scan jobs started");
        }
        Ok(started)
    }

    fn launch(
        &self,
        target: &str,
        port_spec: &str,
        schedule_id: Option<ScheduleId>,
    ) -> EngineResult<JobSummary> {
        let (job, ports) = self.prepare(target, port_spec, schedule_id)?;
        let runtime = current_runtime()?;

        // Owned before it is visible in the store, so a queue scan skips it.
        let handles = self
            .register(job.id)
            .ok_or_else(|| EngineError::Orchestration(format!("job {} is already running", job.id)))?;
        let job_id = match self.store.create(&job) {
            Ok(id) => id,
            Err(e) => {
                unregister(&self.active, &job.id, handles.run);
                return Err(e.into());
            }
        };

        info!(
            job = %job_id.short(),
            target = %job.target,
            ports = ports.len(),
            scheduled = schedule_id.is_some(),
            "scan job created"
        );
        self.spawn_run(&runtime, job_id, job.target.clone(), ports, handles);

        Ok(job.summary())
    }

    /// Validate a request and build its pending job and port list.
    fn prepare(
        &self,
        target: &str,
        port_spec: &str,
        schedule_id: Option<ScheduleId>,
    ) -> EngineResult<(ScanJob, Vec<Port>)> {
        let ports = PortSpec::parse(port_spec)?.expand(&self.common_ports);
        let target = target.trim();
        Target::parse(target)?;

        let mut job = ScanJob::pending(target, port_spec.trim(), ports.len());
        if let Some(schedule_id) = schedule_id {
            job = job.with_schedule(schedule_id);
        }
        Ok((job, ports))
    }

    /// Claim `id` for a new coordinator, unless one already owns it.
    fn register(&self, id: JobId) -> Option<ActiveJob> {
        let mut active = lock(&self.active);
        if active.contains_key(&id) {
            return None;
        }
        let handles = ActiveJob {
            run: self.next_run.fetch_add(1, Ordering::Relaxed),
            cancel: CancellationToken::new(),
            progress: ProbeProgress::new(),
        };
        active.insert(id, handles.clone());
        Some(handles)
    }

    fn spawn_run(
        &self,
        runtime: &Handle,
        job_id: JobId,
        target: String,
        ports: Vec<Port>,
        handles: ActiveJob,
    ) {
        let coordinator = Arc::clone(&self.coordinator);
        let registry = Arc::clone(&self.active);
        runtime.spawn(async move {
            let result = coordinator
                .run(job_id, &target, ports, handles.cancel, handles.progress)
                .await;
            if let Err(e) = result {
                error!(job = %job_id.short(), error = %e, "scan job could not be finalized");
            }
            unregister(&registry, &job_id, handles.run);
        });
    }

    fn load(&self, id: &JobId) -> EngineResult<ScanJob> {
        self.store
            .find_by_id(id)?
            .ok_or_else(|| EngineError::job_not_found(id))
    }

    fn live_summary(&self, job: &ScanJob) -> JobSummary {
        let summary = job.summary();
        match lock(&self.active).get(&job.id) {
            Some(active) => summary.with_live_progress(active.progress.finished()),
            None => summary,
        }
    }

    /// Current status of a job, with live progress while it runs.
    pub fn get_status(&self, id: &JobId) -> EngineResult<JobSummary> {
        let job = self.load(id)?;
        Ok(self.live_summary(&job))
    }

    /// A job with its full outcome list.
    pub fn get_full_results(&self, id: &JobId) -> EngineResult<ScanJob> {
        self.load(id)
    }

    /// Cancel a pending or running job.
    ///
    /// Cancelling a job that already finished leaves it unchanged and returns
    /// its current summary.
    pub fn cancel(&self, id: &JobId) -> EngineResult<JobSummary> {
        let mut job = self.load(id)?;
        if job.status.is_terminal() {
            debug!(job = %id.short(), status = %job.status, "cancel ignored for finished job");
            return Ok(job.summary());
        }

        if let Some(active) = lock(&self.active).get(id) {
            active.cancel.cancel();
        }

        if job.cancel().is_ok()
            && self
                .store
                .save_if(&job, &[JobStatus::Pending, JobStatus::Running])?
        {
            info!(job = %id.short(), "scan job cancelled");
            return Ok(job.summary());
        }

        // Finished while we were cancelling.
        Ok(self.load(id)?.summary())
    }

    /// Delete a job, cancelling it first if it is still running.
    pub fn delete(&self, id: &JobId) -> EngineResult<()> {
        if let Some(active) = lock(&self.active).remove(id) {
            active.cancel.cancel();
        }
        if !self.store.delete(id)? {
            return Err(EngineError::job_not_found(id));
        }
        info!(job = %id.short(), "scan job deleted");
        Ok(())
    }

    /// Job summaries, newest first.
    pub fn list_jobs(&self, filter: &JobFilter) -> EngineResult<Vec<JobSummary>> {
        let jobs = match (filter.status, filter.since) {
            (Some(status), _) => self.store.list_by_status(status)?,
            (None, Some(since)) => self.store.list_recent_since(since)?,
            (None, None) => self.store.list_all()?,
        };

        Ok(jobs
            .iter()
            .filter(|job| filter.since.map_or(true, |since| job.created_at >= since))
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|job| self.live_summary(job))
            .collect())
    }

    /// Aggregate counts as of `now`.
    pub fn dashboard(&self, now: DateTime<Utc>) -> EngineResult<DashboardStats> {
        let jobs = self.store.list_all()?;
        let day_ago = now - ChronoDuration::days(1);
        let week_ago = now - ChronoDuration::days(7);

        let count_status =
            |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();
        let count_since =
            |since: DateTime<Utc>| jobs.iter().filter(|j| j.created_at >= since).count();

        Ok(DashboardStats {
            total_scans: jobs.len(),
            scans_last_24h: count_since(day_ago),
            scans_last_7d: count_since(week_ago),
            running_scans: count_status(JobStatus::Running),
            completed_scans: count_status(JobStatus::Completed),
            failed_scans: count_status(JobStatus::Failed),
            cancelled_scans: count_status(JobStatus::Cancelled),
            recent_scans: jobs
                .iter()
                .filter(|j| j.created_at >= week_ago)
                .map(|j| self.live_summary(j))
                .collect(),
        })
    }

    /// Resolve a full job id or a unique id prefix.
    pub fn resolve_job_id(&self, handle: &str) -> EngineResult<JobId> {
        if let Ok(id) = handle.parse::<JobId>() {
            return Ok(id);
        }
        match self.store.find_by_prefix(handle) {
            Ok(job) => Ok(job.id),
            Err(StorageError::NotFound(_)) => Err(EngineError::job_not_found(handle)),
            Err(e) => Err(e.into()),
        }
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait_for(&self, id: &JobId, poll: Duration) -> EngineResult<JobSummary> {
        loop {
            let summary = self.get_status(id)?;
            if summary.status.is_terminal() {
                return Ok(summary);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Number of jobs whose coordinator task is still alive.
    pub fn active_jobs(&self) -> usize {
        lock(&self.active).len()
    }

    /// Signal every running job to stop.
    pub fn cancel_all(&self) {
        for active in lock(&self.active).values() {
            active.cancel.cancel();
        }
    }
}
