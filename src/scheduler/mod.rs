//! Schedule trigger loop.
//!
//! On every tick, each enabled schedule definition is checked against the
//! configured [`DuePolicy`]; due definitions get a new scan job and an
//! updated last-run time. A definition that fails to start a job is logged
//! and skipped so the rest of the tick proceeds.

pub mod definition;
pub mod manager;
pub mod policy;

pub use definition::ScheduleDefinition;
pub use manager::{ScheduleManager, ScheduleUpdate};
pub use policy::{DuePolicy, FixedIntervalPolicy, PolicyKind, Trigger, TriggerPolicy};

use crate::engine::ScanEngine;
use crate::storage::ScheduleStore;
use crate::types::{JobId, ScheduleId};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Trigger loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerConfig {
    /// Period between evaluations.
    pub tick: Duration,
    /// Fixed run interval used by the due policy.
    pub interval: Duration,
    pub policy: PolicyKind,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            interval: Duration::from_secs(3600),
            policy: PolicyKind::Fixed,
        }
    }
}

/// What one evaluation pass did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Enabled definitions looked at.
    pub evaluated: usize,
    /// Definitions that started a job.
    pub triggered: Vec<(ScheduleId, JobId)>,
    /// Definitions that were due but could not start a job.
    pub failed: Vec<(ScheduleId, String)>,
}

/// Turns due schedule definitions into scan jobs.
pub struct ScheduleTrigger {
    engine: Arc<ScanEngine>,
    schedules: Arc<dyn ScheduleStore>,
    policy: Arc<dyn DuePolicy>,
    period: Duration,
}

impl ScheduleTrigger {
    pub fn new(
        engine: Arc<ScanEngine>,
        schedules: Arc<dyn ScheduleStore>,
        config: &TriggerConfig,
    ) -> Self {
        Self {
            engine,
            schedules,
            policy: config.policy.build(config.interval),
            period: config.tick,
        }
    }

    /// Replace the due policy.
    pub fn with_policy(mut self, policy: Arc<dyn DuePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Evaluate every enabled definition once, as of `now`.
    pub fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        let definitions = match self.schedules.list_enabled() {
            Ok(defs) => defs,
            Err(e) => {
                warn!(error = %e, "could not load schedule definitions");
                return report;
            }
        };

        for def in definitions {
            report.evaluated += 1;
            if !self.policy.is_due(&def, now) {
                continue;
            }

            let job = match self.engine.create_scheduled_job(&def) {
                Ok(job) => job,
                Err(e) => {
                    warn!(schedule = %def.name, error = %e, "scheduled scan could not be started");
                    report.failed.push((def.id, e.to_string()));
                    continue;
                }
            };

            // The stored definition may have been edited since it was listed;
            // only the run times are written back.
            let next = self.policy.next_run(&def, now);
            match self.schedules.record_run(&def.id, now, Some(next)) {
                Ok(true) => {}
                Ok(false) => debug!(schedule = %def.name, "schedule deleted while it was triggered"),
                Err(e) => warn!(schedule = %def.name, error = %e, "could not record schedule run"),
            }

            info!(
                schedule = %def.name,
                job = %job.id.short(),
                target = %def.target,
                next_run = %next,
                "scheduled scan started"
            );
            report.triggered.push((def.id, job.id));
        }

        debug!(
            evaluated = report.evaluated,
            triggered = report.triggered.len(),
            failed = report.failed.len(),
            "schedule tick finished"
        );
        report
    }

    /// Tick on a fixed period until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_secs = self.period.as_secs(), "schedule trigger loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(Utc::now());
                }
            }
        }

        info!("schedule trigger loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageResult;
    use crate::job::JobStatus;
    use crate::scanner::{PortOutcome, Prober, ScannerConfig};
    use crate::storage::{JobStore, MemoryJobStore, MemoryScheduleStore};
    use crate::types::Port;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use std::net::IpAddr;

    struct ClosedProber;

    #[async_trait]
    impl Prober for ClosedProber {
        async fn probe(&self, _addr: IpAddr, port: Port) -> PortOutcome {
            PortOutcome::closed(port, 0)
        }
    }

    struct Fixture {
        jobs: Arc<MemoryJobStore>,
        schedules: Arc<MemoryScheduleStore>,
        trigger: ScheduleTrigger,
    }

    fn fixture() -> Fixture {
        let jobs = Arc::new(MemoryJobStore::new());
        let schedules = Arc::new(MemoryScheduleStore::new());
        let engine = Arc::new(ScanEngine::new(
            jobs.clone(),
            Arc::new(ClosedProber),
            &ScannerConfig::default(),
        ));
        let trigger = ScheduleTrigger::new(engine, schedules.clone(), &TriggerConfig::default());
        Fixture {
            jobs,
            schedules,
            trigger,
        }
    }

    #[tokio::test]
    async fn test_due_schedule_creates_one_job() {
        let f = fixture();
        let now = Utc::now();
        let mut def = ScheduleDefinition::new("hourly-web", "127.0.0.1", "80,443");
        def.last_run_at = Some(now - TimeDelta::hours(2));
        f.schedules.save(&def).unwrap();

        let report = f.trigger.tick(now);
        assert_eq!(report.triggered.len(), 1);
        assert!(report.failed.is_empty());

        let jobs = f.jobs.list_all().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].schedule_id, Some(def.id));
        assert_eq!(jobs[0].total_ports, 2);

        let stored = f.schedules.find(&def.id).unwrap().unwrap();
        assert_eq!(stored.last_run_at, Some(now));
        assert_eq!(stored.next_run_at, Some(now + TimeDelta::hours(1)));
    }

    #[tokio::test]
    async fn test_not_due_and_disabled_are_skipped() {
        let f = fixture();
        let now = Utc::now();

        let mut recent = ScheduleDefinition::new("recent", "127.0.0.1", "22");
        recent.last_run_at = Some(now - TimeDelta::minutes(10));
        let mut disabled = ScheduleDefinition::new("disabled", "127.0.0.1", "22");
        disabled.enabled = false;
        f.schedules.save(&recent).unwrap();
        f.schedules.save(&disabled).unwrap();

        let report = f.trigger.tick(now);
        assert_eq!(report.evaluated, 1);
        assert!(report.triggered.is_empty());
        assert!(f.jobs.list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_schedules() {
        let f = fixture();
        // Stored without validation, as a hand-edited file could be.
        let broken = ScheduleDefinition::new("a-broken", "127.0.0.1", "not-ports");
        let good = ScheduleDefinition::new("b-good", "127.0.0.1", "22");
        f.schedules.save(&broken).unwrap();
        f.schedules.save(&good).unwrap();

        let report = f.trigger.tick(Utc::now());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, broken.id);
        assert_eq!(report.triggered.len(), 1);
        assert_eq!(report.triggered[0].0, good.id);

        let broken = f.schedules.find(&broken.id).unwrap().unwrap();
        assert!(broken.last_run_at.is_none());
    }

    /// Disables and edits every definition right after listing it, as a
    /// `schedules toggle` from another process would mid-tick.
    struct EditedAfterList(MemoryScheduleStore);

    impl ScheduleStore for EditedAfterList {
        fn save(&self, def: &ScheduleDefinition) -> StorageResult<()> {
            self.0.save(def)
        }

        fn find(&self, id: &ScheduleId) -> StorageResult<Option<ScheduleDefinition>> {
            self.0.find(id)
        }

        fn delete(&self, id: &ScheduleId) -> StorageResult<bool> {
            self.0.delete(id)
        }

        fn record_run(
            &self,
            id: &ScheduleId,
            at: DateTime<Utc>,
            next: Option<DateTime<Utc>>,
        ) -> StorageResult<bool> {
            self.0.record_run(id, at, next)
        }

        fn list_all(&self) -> StorageResult<Vec<ScheduleDefinition>> {
            let defs = self.0.list_all()?;
            for def in &defs {
                let mut edited = def.clone();
                edited.enabled = false;
                edited.port_range = "443".to_string();
                self.0.save(&edited)?;
            }
            Ok(defs)
        }
    }

    #[tokio::test]
    async fn test_tick_only_writes_run_times() {
        let jobs = Arc::new(MemoryJobStore::new());
        let schedules = Arc::new(EditedAfterList(MemoryScheduleStore::new()));
        let engine = Arc::new(ScanEngine::new(
            jobs.clone(),
            Arc::new(ClosedProber),
            &ScannerConfig::default(),
        ));
        let trigger = ScheduleTrigger::new(engine, schedules.clone(), &TriggerConfig::default());

        let def = ScheduleDefinition::new("edited", "127.0.0.1", "22");
        schedules.0.save(&def).unwrap();

        let now = Utc::now();
        assert_eq!(trigger.tick(now).triggered.len(), 1);

        let stored = schedules.0.find(&def.id).unwrap().unwrap();
        assert!(!stored.enabled);
        assert_eq!(stored.port_range, "443");
        assert_eq!(stored.last_run_at, Some(now));
        assert_eq!(stored.next_run_at, Some(now + TimeDelta::hours(1)));
    }

    #[tokio::test]
    async fn test_second_tick_within_interval_does_nothing() {
        let f = fixture();
        let def = ScheduleDefinition::new("once", "127.0.0.1", "22");
        f.schedules.save(&def).unwrap();

        let now = Utc::now();
        assert_eq!(f.trigger.tick(now).triggered.len(), 1);
        assert!(f.trigger.tick(now + TimeDelta::minutes(5)).triggered.is_empty());
        assert_eq!(f.trigger.tick(now + TimeDelta::hours(1)).triggered.len(), 1);
        assert_eq!(f.jobs.list_all().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_trigger_policy_honors_expression() {
        let f = fixture();
        let trigger = f
            .trigger
            .with_policy(PolicyKind::Trigger.build(Duration::from_secs(3600)));
        let now = Utc::now();
        let mut def = ScheduleDefinition::new("fast", "127.0.0.1", "22").with_trigger("@every 5m");
        def.last_run_at = Some(now - TimeDelta::minutes(6));
        f.schedules.save(&def).unwrap();

        assert_eq!(trigger.tick(now).triggered.len(), 1);
        let stored = f.schedules.find(&def.id).unwrap().unwrap();
        assert_eq!(stored.next_run_at, Some(now + TimeDelta::minutes(5)));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let f = fixture();
        let def = ScheduleDefinition::new("loop", "127.0.0.1", "22");
        f.schedules.save(&def).unwrap();

        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stop.cancel();
        });
        f.trigger.run(shutdown).await;

        // The first tick fires immediately.
        let jobs = f.jobs.list_all().unwrap();
        assert_eq!(jobs.len(), 1);
        let job = jobs[0].id;
        let job = f.jobs.find_by_id(&job).unwrap().unwrap();
        assert!(matches!(
            job.status,
            JobStatus::Pending | JobStatus::Running | JobStatus::Completed
        ));
    }
}
