//! Named recurring scan definitions.

use crate::error::{ScheduleError, ScheduleResult};
use crate::scheduler::policy::Trigger;
use crate::types::{PortSpec, ScheduleId, Target};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted schedule name.
const MAX_NAME_LEN: usize = 64;

/// A named, recurring request to create scan jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    pub id: ScheduleId,
    /// Unique name, used as a handle on the command line.
    pub name: String,
    pub target: String,
    /// Port specification passed to each job.
    pub port_range: String,
    /// Trigger expression, e.g. `@daily` or `@every 30m`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run_at: Option<DateTime<Utc>>,
}

impl ScheduleDefinition {
    /// Create an enabled schedule that has never run.
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        port_range: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ScheduleId::new(),
            name: name.into(),
            target: target.into(),
            port_range: port_range.into(),
            trigger: None,
            enabled: true,
            created_at: now,
            updated_at: now,
            last_run_at: None,
            next_run_at: None,
        }
    }

    /// Set the trigger expression.
    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// Check the name, target, port specification and trigger expression.
    pub fn validate(&self) -> ScheduleResult<()> {
        validate_name(&self.name)?;
        Target::parse(&self.target).map_err(crate::error::EngineError::from)?;
        PortSpec::parse(&self.port_range).map_err(crate::error::EngineError::from)?;
        if let Some(trigger) = &self.trigger {
            Trigger::parse(trigger)?;
        }
        Ok(())
    }

    /// Record a run started at `at`.
    pub fn record_run(&mut self, at: DateTime<Utc>, next: Option<DateTime<Utc>>) {
        self.last_run_at = Some(at);
        self.next_run_at = next;
    }
}

/// Names are non-empty and limited to alphanumerics, `-` and `_`.
pub fn validate_name(name: &str) -> ScheduleResult<()> {
    if name.is_empty() {
        return Err(ScheduleError::InvalidName("name cannot be empty".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ScheduleError::InvalidName(format!(
            "name is longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(ScheduleError::InvalidName(
            "name can only contain alphanumeric characters, hyphens, and underscores".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_new_definition() {
        let def = ScheduleDefinition::new("nightly", "10.0.0.1", "common");
        assert!(def.enabled);
        assert!(def.last_run_at.is_none());
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_invalid_name() {
        let def = ScheduleDefinition::new("bad name!", "10.0.0.1", "22");
        assert!(matches!(def.validate(), Err(ScheduleError::InvalidName(_))));
        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(65)).is_err());
        assert!(validate_name("web-01_daily").is_ok());
    }

    #[test]
    fn test_invalid_ports_and_target() {
        let def = ScheduleDefinition::new("a", "10.0.0.1", "abc");
        assert!(matches!(
            def.validate(),
            Err(ScheduleError::Engine(EngineError::InvalidPortSpec(_)))
        ));

        let def = ScheduleDefinition::new("a", "999.1.1.1", "22");
        assert!(matches!(
            def.validate(),
            Err(ScheduleError::Engine(EngineError::InvalidTarget(_)))
        ));
    }

    #[test]
    fn test_invalid_trigger() {
        let def = ScheduleDefinition::new("a", "10.0.0.1", "22").with_trigger("0 * * * *");
        assert!(matches!(def.validate(), Err(ScheduleError::InvalidTrigger(_))));

        let def = ScheduleDefinition::new("a", "10.0.0.1", "22").with_trigger("@every 15m");
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_serde_defaults() {
        let def = ScheduleDefinition::new("a", "host.example", "80");
        let json = serde_json::to_string(&def).unwrap();
        assert!(!json.contains("trigger"));
        let parsed: ScheduleDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, def);
    }
}
