//! Schedule definition management.

use crate::error::{EngineError, ScheduleError, ScheduleResult, StorageError};
use crate::scheduler::ScheduleDefinition;
use crate::storage::ScheduleStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Changes applied by [`ScheduleManager::update`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub target: Option<String>,
    pub port_range: Option<String>,
    /// `Some(None)` clears the trigger expression.
    pub trigger: Option<Option<String>>,
    pub enabled: Option<bool>,
}

/// Validated create, update, toggle and delete over a schedule store.
pub struct ScheduleManager {
    store: Arc<dyn ScheduleStore>,
}

impl ScheduleManager {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    /// Look up a definition by name or id prefix.
    pub fn get(&self, handle: &str) -> ScheduleResult<ScheduleDefinition> {
        self.store.find_by_handle(handle).map_err(|e| match e {
            StorageError::NotFound(_) => ScheduleError::from(EngineError::schedule_not_found(handle)),
            e => ScheduleError::from(e),
        })
    }

    /// All definitions, ordered by name.
    pub fn list(&self) -> ScheduleResult<Vec<ScheduleDefinition>> {
        Ok(self.store.list_all()?)
    }

    /// Validate and store a new definition. Names are unique.
    pub fn create(&self, def: ScheduleDefinition) -> ScheduleResult<ScheduleDefinition> {
        def.validate()?;
        if self.store.find_by_name(&def.name)?.is_some() {
            return Err(ScheduleError::AlreadyExists(def.name));
        }

        self.store.save(&def)?;
        info!(schedule = %def.name, id = %def.id.short(), target = %def.target, "schedule created");
        Ok(def)
    }

    /// Apply `update` to an existing definition.
    pub fn update(&self, handle: &str, update: ScheduleUpdate) -> ScheduleResult<ScheduleDefinition> {
        let mut def = self.get(handle)?;

        if let Some(name) = update.name {
            if name != def.name && self.store.find_by_name(&name)?.is_some() {
                return Err(ScheduleError::AlreadyExists(name));
            }
            def.name = name;
        }
        if let Some(target) = update.target {
            def.target = target;
        }
        if let Some(port_range) = update.port_range {
            def.port_range = port_range;
        }
        if let Some(trigger) = update.trigger {
            def.trigger = trigger;
        }
        if let Some(enabled) = update.enabled {
            def.enabled = enabled;
        }

        def.validate()?;
        def.updated_at = Utc::now();
        self.store.save(&def)?;
        info!(schedule = %def.name, "schedule updated");
        Ok(def)
    }

    /// Flip the enabled flag.
    pub fn toggle(&self, handle: &str) -> ScheduleResult<ScheduleDefinition> {
        let mut def = self.get(handle)?;
        def.enabled = !def.enabled;
        def.updated_at = Utc::now();
        self.store.save(&def)?;
        info!(schedule = %def.name, enabled = def.enabled, "schedule toggled");
        Ok(def)
    }

    /// Remove a definition. Jobs it already created are kept.
    pub fn delete(&self, handle: &str) -> ScheduleResult<ScheduleDefinition> {
        let def = self.get(handle)?;
        if !self.store.delete(&def.id)? {
            return Err(EngineError::schedule_not_found(handle).into());
        }
        info!(schedule = %def.name, "schedule deleted");
        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryScheduleStore;

    fn manager() -> ScheduleManager {
        ScheduleManager::new(Arc::new(MemoryScheduleStore::new()))
    }

    #[test]
    fn test_create_and_get() {
        let m = manager();
        let def = m
            .create(ScheduleDefinition::new("nightly", "10.0.0.1", "common"))
            .unwrap();
        assert_eq!(m.get("nightly").unwrap().id, def.id);
        assert_eq!(m.get(&def.id.short()).unwrap().name, "nightly");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let m = manager();
        m.create(ScheduleDefinition::new("dup", "10.0.0.1", "22")).unwrap();
        assert!(matches!(
            m.create(ScheduleDefinition::new("dup", "10.0.0.2", "80")),
            Err(ScheduleError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_invalid_definition_not_stored() {
        let m = manager();
        assert!(m.create(ScheduleDefinition::new("x", "10.0.0.1", "abc")).is_err());
        assert!(m.list().unwrap().is_empty());
    }

    #[test]
    fn test_update() {
        let m = manager();
        m.create(ScheduleDefinition::new("a", "10.0.0.1", "22")).unwrap();
        m.create(ScheduleDefinition::new("b", "10.0.0.1", "22")).unwrap();

        let updated = m
            .update(
                "a",
                ScheduleUpdate {
                    port_range: Some("1-1024".to_string()),
                    trigger: Some(Some("@daily".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.port_range, "1-1024");
        assert_eq!(updated.trigger.as_deref(), Some("@daily"));

        let rename = ScheduleUpdate {
            name: Some("b".to_string()),
            ..Default::default()
        };
        assert!(matches!(m.update("a", rename), Err(ScheduleError::AlreadyExists(_))));

        let bad = ScheduleUpdate {
            port_range: Some("70000".to_string()),
            ..Default::default()
        };
        assert!(m.update("a", bad).is_err());
        assert_eq!(m.get("a").unwrap().port_range, "1-1024");
    }

    #[test]
    fn test_toggle_and_delete() {
        let m = manager();
        m.create(ScheduleDefinition::new("t", "10.0.0.1", "22")).unwrap();

        assert!(!m.toggle("t").unwrap().enabled);
        assert!(m.toggle("t").unwrap().enabled);

        m.delete("t").unwrap();
        assert!(matches!(
            m.get("t"),
            Err(ScheduleError::Engine(EngineError::NotFound { .. }))
        ));
    }
}
