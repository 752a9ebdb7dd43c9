//! Scan job records and their lifecycle.
//!
//! A job moves `PENDING -> RUNNING -> {COMPLETED | FAILED}` and may be
//! cancelled while pending or running. Terminal states are final, and
//! `completed_at` is set exactly when the job reaches one.

use crate::scanner::{PortOutcome, PortStatus};
use crate::types::{JobId, ScheduleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 5] = [
        Self::Pending,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn can_become(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Running, Self::Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown job status: {}", s))
    }
}

/// Attempted a transition the lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move job from {from} to {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One scan run over a set of ports against one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: JobId,
    pub target: String,
    /// The port specification exactly as requested.
    pub port_range: String,
    pub status: JobStatus,
    /// Percentage, 0-100.
    pub progress: u8,
    pub total_ports: usize,
    pub scanned_ports: usize,
    pub open_ports: usize,
    pub closed_ports: usize,
    pub filtered_ports: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Schedule that triggered this job, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<ScheduleId>,
    #[serde(default)]
    pub results: Vec<PortOutcome>,
}

impl ScanJob {
    /// Create a new pending job.
    pub fn pending(target: impl Into<String>, port_range: impl Into<String>, total_ports: usize) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            target: target.into(),
            port_range: port_range.into(),
            status: JobStatus::Pending,
            progress: 0,
            total_ports,
            scanned_ports: 0,
            open_ports: 0,
            closed_ports: 0,
            filtered_ports: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
            schedule_id: None,
            results: Vec::new(),
        }
    }

    /// Record the schedule that created this job.
    pub fn with_schedule(mut self, schedule_id: ScheduleId) -> Self {
        self.schedule_id = Some(schedule_id);
        self
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_become(to) {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        let now = Utc::now();
        self.status = to;
        self.updated_at = now;
        if to.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Move a pending job to running.
    pub fn mark_running(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Running)
    }

    /// Finish a running job with its full outcome set.
    pub fn complete(&mut self, mut outcomes: Vec<PortOutcome>) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Completed)?;

        let count = |status: PortStatus| outcomes.iter().filter(|o| o.status == status).count();
        self.open_ports = count(PortStatus::Open);
        self.closed_ports = count(PortStatus::Closed);
        self.filtered_ports = count(PortStatus::Filtered);
        self.scanned_ports = outcomes.len();
        self.progress = 100;

        outcomes.sort_by_key(|o| o.port);
        self.results = outcomes;
        Ok(())
    }

    /// Fail a running job, recording the cause.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(error.into());
        Ok(())
    }

    /// Cancel a pending or running job. Partial outcomes are discarded.
    pub fn cancel(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Cancelled)?;
        self.results.clear();
        Ok(())
    }

    /// Outcomes for open ports only.
    pub fn open_results(&self) -> impl Iterator<Item = &PortOutcome> {
        self.results.iter().filter(|r| r.is_open())
    }

    /// Caller-facing summary of this job.
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            target: self.target.clone(),
            port_range: self.port_range.clone(),
            status: self.status,
            progress: self.progress,
            total_ports: self.total_ports,
            scanned_ports: self.scanned_ports,
            open_ports: self.open_ports,
            closed_ports: self.closed_ports,
            filtered_ports: self.filtered_ports,
            created_at: self.created_at,
            completed_at: self.completed_at,
            error_message: self.error_message.clone(),
            statistics: PortStatistics::new(
                self.open_ports,
                self.closed_ports,
                self.filtered_ports,
                self.total_ports,
            ),
        }
    }
}

/// Job status as exposed to callers, without the outcome list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub target: String,
    pub port_range: String,
    pub status: JobStatus,
    pub progress: u8,
    pub total_ports: usize,
    pub scanned_ports: usize,
    pub open_ports: usize,
    pub closed_ports: usize,
    pub filtered_ports: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub statistics: PortStatistics,
}

impl JobSummary {
    /// Overlay live probe progress onto a running job's summary.
    pub fn with_live_progress(mut self, scanned: usize) -> Self {
        if self.status == JobStatus::Running && self.total_ports > 0 {
            self.scanned_ports = scanned.min(self.total_ports);
            self.progress = (self.scanned_ports * 100 / self.total_ports) as u8;
        }
        self
    }
}

/// Counts and percentages of each port state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortStatistics {
    pub open_count: usize,
    pub closed_count: usize,
    pub filtered_count: usize,
    pub open_percentage: f64,
    pub closed_percentage: f64,
    pub filtered_percentage: f64,
}

impl PortStatistics {
    /// Compute percentages of `total`; all zero when `total` is 0.
    pub fn new(open: usize, closed: usize, filtered: usize, total: usize) -> Self {
        let pct = |count: usize| {
            if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            }
        };
        Self {
            open_count: open,
            closed_count: closed,
            filtered_count: filtered,
            open_percentage: pct(open),
            closed_percentage: pct(closed),
            filtered_percentage: pct(filtered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Port;

    fn outcomes() -> Vec<PortOutcome> {
        vec![
            PortOutcome::filtered(Port::new(9999).unwrap(), 1000, "timed out"),
            PortOutcome::open(Port::new(22).unwrap(), "SSH", "SSH-2.0-x".into(), 2),
            PortOutcome::closed(Port::new(80).unwrap(), 1),
            PortOutcome::closed(Port::new(81).unwrap(), 1),
        ]
    }

    #[test]
    fn test_pending_job() {
        let job = ScanJob::pending("127.0.0.1", "22,80-81,9999", 4);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_complete_aggregates_counts() {
        let mut job = ScanJob::pending("127.0.0.1", "22,80-81,9999", 4);
        job.mark_running().unwrap();
        assert!(job.completed_at.is_none());
        job.complete(outcomes()).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.scanned_ports, job.total_ports);
        assert_eq!(job.open_ports, 1);
        assert_eq!(job.closed_ports, 2);
        assert_eq!(job.filtered_ports, 1);
        assert_eq!(
            job.open_ports + job.closed_ports + job.filtered_ports,
            job.scanned_ports
        );
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
        let ports: Vec<u16> = job.results.iter().map(|r| r.port.as_u16()).collect();
        assert_eq!(ports, vec![22, 80, 81, 9999]);
    }

    #[test]
    fn test_illegal_transitions() {
        let mut job = ScanJob::pending("127.0.0.1", "22", 1);
        assert!(job.complete(Vec::new()).is_err());
        assert!(job.fail("boom").is_err());

        job.cancel().unwrap();
        assert!(job.completed_at.is_some());
        assert_eq!(
            job.mark_running(),
            Err(InvalidTransition {
                from: JobStatus::Cancelled,
                to: JobStatus::Running
            })
        );
        assert!(job.complete(Vec::new()).is_err());
    }

    #[test]
    fn test_fail_records_error() {
        let mut job = ScanJob::pending("127.0.0.1", "22", 1);
        job.mark_running().unwrap();
        job.fail("store unavailable").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("store unavailable"));
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_summary_statistics() {
        let mut job = ScanJob::pending("127.0.0.1", "22,80-81,9999", 4);
        job.mark_running().unwrap();
        job.complete(outcomes()).unwrap();

        let summary = job.summary();
        assert_eq!(summary.statistics.open_percentage, 25.0);
        assert_eq!(summary.statistics.closed_percentage, 50.0);
        assert_eq!(summary.statistics.filtered_percentage, 25.0);
    }

    #[test]
    fn test_statistics_with_zero_total() {
        let stats = PortStatistics::new(0, 0, 0, 0);
        assert_eq!(stats.open_percentage, 0.0);
        assert_eq!(stats.filtered_percentage, 0.0);
    }

    #[test]
    fn test_live_progress_only_while_running() {
        let mut job = ScanJob::pending("127.0.0.1", "1-10", 10);
        assert_eq!(job.summary().with_live_progress(5).progress, 0);

        job.mark_running().unwrap();
        let summary = job.summary().with_live_progress(5);
        assert_eq!(summary.progress, 50);
        assert_eq!(summary.scanned_ports, 5);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("running".parse::<JobStatus>().unwrap(), JobStatus::Running);
        assert_eq!("CANCELLED".parse::<JobStatus>().unwrap(), JobStatus::Cancelled);
        assert!("done".parse::<JobStatus>().is_err());
    }
}
