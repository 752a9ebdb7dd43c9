//! Scan coordinator.
//!
//! Fans a job's port set out across a bounded pool of concurrent probe tasks,
//! collects one outcome per port, and drives the job through its lifecycle in
//! the job store. Per-port failures become outcomes; only failures of the
//! fan-out itself fail the job.

pub mod rate_limiter;
pub mod tcp;
pub mod traits;

use crate::banner::BannerSettings;
use crate::error::{EngineError, EngineResult};
use crate::job::JobStatus;
use crate::storage::JobStore;
use crate::types::{JobId, Port, Target};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use rate_limiter::RateLimiter;
pub use tcp::{ProbeError, TcpProber};
pub use traits::{PortOutcome, PortStatus, Prober};

/// Scanner tunables, injected at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    /// Bound on each connection attempt.
    pub connect_timeout: Duration,
    /// Limits for banner collection on open ports.
    pub banner: BannerSettings,
    /// Maximum simultaneous in-flight probes per job.
    pub max_concurrent_probes: usize,
    /// Probes per second across a job, 0 for unlimited.
    pub probe_rate_limit: u32,
    /// Ports used for the `common` specification.
    pub common_ports: Vec<Port>,
}

impl ScannerConfig {
    /// Build the TCP prober described by this configuration.
    pub fn tcp_prober(&self) -> TcpProber {
        let prober = TcpProber::new(self.connect_timeout, self.banner);
        match RateLimiter::per_second(self.probe_rate_limit) {
            Some(limiter) => prober.with_rate_limiter(limiter),
            None => prober,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        crate::config::Settings::default().scanner_config()
    }
}

/// Count of finished probes for a running job.
#[derive(Debug, Clone, Default)]
pub struct ProbeProgress(Arc<AtomicUsize>);

impl ProbeProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, n: usize) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Probes finished so far.
    pub fn finished(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives scan jobs from `PENDING` to a terminal state.
pub struct Coordinator {
    store: Arc<dyn JobStore>,
    prober: Arc<dyn Prober>,
    max_concurrent: usize,
}

impl Coordinator {
    /// Create a coordinator.
    ///
    /// `max_concurrent` bounds in-flight probes per job; it is clamped to at least 1.
    pub fn new(store: Arc<dyn JobStore>, prober: Arc<dyn Prober>, max_concurrent: usize) -> Self {
        Self {
            store,
            prober,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Run a stored `PENDING` job to completion.
    ///
    /// Returns the status the job ended in. The outcome itself is only
    /// published through the job store. An error is returned only when the
    /// job could not be loaded or its final state could not be persisted.
    pub async fn run(
        &self,
        job_id: JobId,
        target: &str,
        ports: Vec<Port>,
        cancel: CancellationToken,
        progress: ProbeProgress,
    ) -> EngineResult<JobStatus> {
        let mut job = self
            .store
            .find_by_id(&job_id)?
            .ok_or_else(|| EngineError::job_not_found(job_id))?;

        if job.mark_running().is_err() || !self.store.save_if(&job, &[JobStatus::Pending])? {
            // Cancelled before it started.
            return self.current_status(job_id);
        }

        info!(
            job = %job_id.short(),
            target = %target,
            ports = ports.len(),
            "starting scan"
        );
        let started = Instant::now();

        let result = match self.scan(target, &ports, &cancel, &progress).await {
            Ok(Some(outcomes)) if outcomes.len() == ports.len() => Ok(Some(outcomes)),
            Ok(Some(outcomes)) => Err(EngineError::Orchestration(format!(
                "collected {} outcomes for {} ports",
                outcomes.len(),
                ports.len()
            ))),
            other => other,
        };

        match result {
            Ok(Some(outcomes)) => {
                job.complete(outcomes)
                    .map_err(|e| EngineError::Orchestration(e.to_string()))?;
                match self.store.save_if(&job, &[JobStatus::Running]) {
                    Ok(true) => {
                        info!(
                            job = %job_id.short(),
                            open = job.open_ports,
                            closed = job.closed_ports,
                            filtered = job.filtered_ports,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "scan completed"
                        );
                        Ok(JobStatus::Completed)
                    }
                    Ok(false) => self.current_status(job_id),
                    Err(e) => self.fail(job_id, &EngineError::Storage(e)),
                }
            }
            Ok(None) => self.finish_cancelled(job_id),
            Err(e) => self.fail(job_id, &e),
        }
    }

    /// Probe every port, or return `None` if cancelled first.
    async fn scan(
        &self,
        target: &str,
        ports: &[Port],
        cancel: &CancellationToken,
        progress: &ProbeProgress,
    ) -> EngineResult<Option<Vec<PortOutcome>>> {
        let target = Target::parse(target).map_err(|e| EngineError::Orchestration(e.to_string()))?;
        let addr = match target.resolve().await {
            Ok(addr) => addr,
            Err(e) => {
                warn!(%target, error = %e, "target did not resolve, all ports filtered");
                progress.record(ports.len());
                return Ok(Some(
                    ports
                        .iter()
                        .map(|&port| PortOutcome::filtered(port, 0, e.to_string()))
                        .collect(),
                ));
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for &port in ports {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    permit.map_err(|e| EngineError::Orchestration(e.to_string()))?
                }
            };

            let prober = Arc::clone(&self.prober);
            let progress = progress.clone();
            tasks.spawn(async move {
                // Released when the task ends, panicking or not.
                let _permit = permit;
                let outcome = AssertUnwindSafe(prober.probe(addr, port))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| PortOutcome::filtered(port, 0, "probe task panicked"));
                progress.record(1);
                outcome
            });
        }

        let mut outcomes = Vec::with_capacity(ports.len());
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                next = tasks.join_next() => match next {
                    Some(Ok(outcome)) => outcomes.push(outcome),
                    Some(Err(e)) => {
                        return Err(EngineError::Orchestration(format!("probe task failed: {}", e)))
                    }
                    None => break,
                },
            }
        }

        Ok(Some(outcomes))
    }

    /// Record a cancellation the token delivered, unless the store already has it.
    fn finish_cancelled(&self, job_id: JobId) -> EngineResult<JobStatus> {
        if let Some(mut job) = self.store.find_by_id(&job_id)? {
            if job.cancel().is_ok() {
                self.store
                    .save_if(&job, &[JobStatus::Pending, JobStatus::Running])?;
            }
        }
        info!(job = %job_id.short(), "scan cancelled");
        self.current_status(job_id)
    }

    fn fail(&self, job_id: JobId, cause: &EngineError) -> EngineResult<JobStatus> {
        error!(job = %job_id.short(), error = %cause, "scan failed");
        let mut job = self
            .store
            .find_by_id(&job_id)?
            .ok_or_else(|| EngineError::job_not_found(job_id))?;
        if job.fail(cause.to_string()).is_ok() {
            self.store.save_if(&job, &[JobStatus::Running])?;
        }
        self.current_status(job_id)
    }

    fn current_status(&self, job_id: JobId) -> EngineResult<JobStatus> {
        self.store
            .find_by_id(&job_id)?
            .map(|job| job.status)
            .ok_or_else(|| EngineError::job_not_found(job_id))
    }
}
