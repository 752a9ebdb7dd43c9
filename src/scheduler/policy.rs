//! Due-ness policies for schedule definitions.
//!
//! The trigger loop only asks a [`DuePolicy`] whether a definition should run
//! now and when it will next be due, so the evaluation strategy can change
//! without touching the loop.

use crate::error::{ScheduleError, ScheduleResult};
use crate::scheduler::ScheduleDefinition;
use chrono::{DateTime, Datelike, Days, DurationRound, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Decides when a schedule definition is due.
pub trait DuePolicy: Send + Sync {
    /// Whether `def` should create a job at `now`.
    fn is_due(&self, def: &ScheduleDefinition, now: DateTime<Utc>) -> bool;

    /// When a definition that ran at `last_run` is next due.
    fn next_run(&self, def: &ScheduleDefinition, last_run: DateTime<Utc>) -> DateTime<Utc>;
}

/// Which [`DuePolicy`] the trigger loop uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Every definition runs once per fixed interval; trigger expressions are ignored.
    #[default]
    Fixed,
    /// Trigger expressions are honored, the fixed interval covers definitions without one.
    Trigger,
}

impl PolicyKind {
    /// Build the policy with `interval` as the fixed run interval.
    pub fn build(self, interval: Duration) -> Arc<dyn DuePolicy> {
        let fixed = FixedIntervalPolicy::new(interval);
        match self {
            Self::Fixed => Arc::new(fixed),
            Self::Trigger => Arc::new(TriggerPolicy::new(fixed)),
        }
    }
}

fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

/// Due when never run, or when at least one interval has passed since the last run.
#[derive(Debug, Clone, Copy)]
pub struct FixedIntervalPolicy {
    interval: TimeDelta,
}

impl FixedIntervalPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: to_delta(interval),
        }
    }
}

impl Default for FixedIntervalPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl DuePolicy for FixedIntervalPolicy {
    fn is_due(&self, def: &ScheduleDefinition, now: DateTime<Utc>) -> bool {
        match def.last_run_at {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.interval,
        }
    }

    fn next_run(&self, _def: &ScheduleDefinition, last_run: DateTime<Utc>) -> DateTime<Utc> {
        last_run
            .checked_add_signed(self.interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// A parsed trigger expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Top of every hour, UTC.
    Hourly,
    /// Midnight UTC.
    Daily,
    /// Monday midnight UTC.
    Weekly,
    /// A fixed period after the last run.
    Every(Duration),
}

impl Trigger {
    /// Parse `@hourly`, `@daily`, `@weekly` or `@every <n><s|m|h|d>`.
    pub fn parse(expr: &str) -> ScheduleResult<Self> {
        let invalid = || ScheduleError::InvalidTrigger(expr.to_string());
        let expr_lc = expr.trim().to_ascii_lowercase();

        match expr_lc.as_str() {
            "@hourly" => return Ok(Self::Hourly),
            "@daily" | "@midnight" => return Ok(Self::Daily),
            "@weekly" => return Ok(Self::Weekly),
            _ => {}
        }

        let period = expr_lc
            .strip_prefix("@every")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(invalid)?;
        let (split, _) = period.char_indices().last().ok_or_else(invalid)?;
        let (count, unit) = period.split_at(split);
        let count: u64 = count.trim().parse().map_err(|_| invalid())?;
        let secs = match unit {
            "s" => count,
            "m" => count.saturating_mul(60),
            "h" => count.saturating_mul(3600),
            "d" => count.saturating_mul(86_400),
            _ => return Err(invalid()),
        };
        if secs == 0 {
            return Err(invalid());
        }
        Ok(Self::Every(Duration::from_secs(secs)))
    }

    /// First firing time strictly after `after`.
    pub fn next_after(self, after: DateTime<Utc>) -> DateTime<Utc> {
        let midnight_after = |days: u64| {
            after
                .date_naive()
                .checked_add_days(Days::new(days))
                .map(|d| d.and_time(NaiveTime::MIN).and_utc())
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        };

        match self {
            Self::Hourly => after
                .duration_trunc(TimeDelta::hours(1))
                .ok()
                .and_then(|hour| hour.checked_add_signed(TimeDelta::hours(1)))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Self::Daily => midnight_after(1),
            Self::Weekly => {
                let since_monday = u64::from(after.weekday().num_days_from_monday());
                midnight_after(7 - since_monday)
            }
            Self::Every(period) => after
                .checked_add_signed(to_delta(period))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

/// Honors each definition's trigger expression.
///
/// Definitions without a trigger, or with one that does not parse, fall back
/// to the fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct TriggerPolicy {
    fallback: FixedIntervalPolicy,
}

impl TriggerPolicy {
    pub fn new(fallback: FixedIntervalPolicy) -> Self {
        Self { fallback }
    }

    fn trigger(def: &ScheduleDefinition) -> Option<Trigger> {
        def.trigger.as_deref().and_then(|t| Trigger::parse(t).ok())
    }
}

impl DuePolicy for TriggerPolicy {
    fn is_due(&self, def: &ScheduleDefinition, now: DateTime<Utc>) -> bool {
        match (Self::trigger(def), def.last_run_at) {
            (None, _) => self.fallback.is_due(def, now),
            (Some(_), None) => true,
            (Some(trigger), Some(last)) => now >= trigger.next_after(last),
        }
    }

    fn next_run(&self, def: &ScheduleDefinition, last_run: DateTime<Utc>) -> DateTime<Utc> {
        match Self::trigger(def) {
            Some(trigger) => trigger.next_after(last_run),
            None => self.fallback.next_run(def, last_run),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn def_last_run(last: Option<DateTime<Utc>>) -> ScheduleDefinition {
        let mut def = ScheduleDefinition::new("s", "10.0.0.1", "22");
        def.last_run_at = last;
        def
    }

    #[test]
    fn test_fixed_never_run_is_due() {
        let policy = FixedIntervalPolicy::default();
        assert!(policy.is_due(&def_last_run(None), Utc::now()));
    }

    #[test]
    fn test_fixed_interval_boundary() {
        let policy = FixedIntervalPolicy::default();
        let now = at(2026, 3, 10, 12, 0);

        assert!(policy.is_due(&def_last_run(Some(now - TimeDelta::hours(2))), now));
        assert!(policy.is_due(&def_last_run(Some(now - TimeDelta::hours(1))), now));
        assert!(!policy.is_due(&def_last_run(Some(now - TimeDelta::minutes(59))), now));
        assert_eq!(
            policy.next_run(&def_last_run(None), now),
            now + TimeDelta::hours(1)
        );
    }

    #[test]
    fn test_parse_triggers() {
        assert_eq!(Trigger::parse("@hourly").unwrap(), Trigger::Hourly);
        assert_eq!(Trigger::parse(" @DAILY ").unwrap(), Trigger::Daily);
        assert_eq!(Trigger::parse("@weekly").unwrap(), Trigger::Weekly);
        assert_eq!(
            Trigger::parse("@every 30m").unwrap(),
            Trigger::Every(Duration::from_secs(1800))
        );
        assert_eq!(
            Trigger::parse("@every2h").unwrap(),
            Trigger::Every(Duration::from_secs(7200))
        );

        for bad in ["", "@every", "@every 0m", "@every 5x", "@every m", "0 0 * * *", "@yearly"] {
            assert!(Trigger::parse(bad).is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_next_after() {
        let t = at(2026, 3, 11, 14, 25); // a Wednesday
        assert_eq!(Trigger::Hourly.next_after(t), at(2026, 3, 11, 15, 0));
        assert_eq!(Trigger::Daily.next_after(t), at(2026, 3, 12, 0, 0));
        assert_eq!(Trigger::Weekly.next_after(t), at(2026, 3, 16, 0, 0));
        assert_eq!(
            Trigger::Every(Duration::from_secs(600)).next_after(t),
            at(2026, 3, 11, 14, 35)
        );

        // Exactly on a boundary moves to the next one.
        let monday = at(2026, 3, 16, 0, 0);
        assert_eq!(Trigger::Weekly.next_after(monday), at(2026, 3, 23, 0, 0));
        assert_eq!(Trigger::Hourly.next_after(monday), at(2026, 3, 16, 1, 0));
    }

    #[test]
    fn test_trigger_policy() {
        let policy = TriggerPolicy::new(FixedIntervalPolicy::default());
        let last = at(2026, 3, 11, 23, 50);

        let mut def = def_last_run(Some(last)).with_trigger("@daily");
        assert!(!policy.is_due(&def, at(2026, 3, 11, 23, 59)));
        assert!(policy.is_due(&def, at(2026, 3, 12, 0, 0)));
        assert_eq!(policy.next_run(&def, last), at(2026, 3, 12, 0, 0));

        def.last_run_at = None;
        assert!(policy.is_due(&def, last));
    }

    #[test]
    fn test_trigger_policy_falls_back() {
        let policy = TriggerPolicy::new(FixedIntervalPolicy::new(Duration::from_secs(600)));
        let now = at(2026, 3, 11, 12, 0);

        let def = def_last_run(Some(now - TimeDelta::minutes(11)));
        assert!(policy.is_due(&def, now));

        let def = def_last_run(Some(now - TimeDelta::minutes(5))).with_trigger("garbage");
        assert!(!policy.is_due(&def, now));
    }

    #[test]
    fn test_policy_kind_serde() {
        assert_eq!(serde_json::to_string(&PolicyKind::Trigger).unwrap(), "\"trigger\"");
        let kind: PolicyKind = serde_json::from_str("\"fixed\"").unwrap();
        assert_eq!(kind, PolicyKind::Fixed);
    }
}
