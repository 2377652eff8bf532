use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

/// Registry of named loading indicators, one per independent data-fetch
/// concern. Components register a flag, flip it around their fetches, and
/// the flag unregisters itself on drop. The watchdog inspects the registry
/// instead of scanning rendered output.
#[derive(Clone, Default)]
pub struct LoadingRegistry {
    flags: Arc<RwLock<HashMap<String, bool>>>,
}

impl LoadingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named flag, initially inactive. Re-registering a name
    /// replaces the previous entry.
    pub fn register(&self, name: &str) -> LoadingFlag {
        self.flags
            .write()
            .unwrap()
            .insert(name.to_string(), false);
        LoadingFlag {
            registry: self.clone(),
            name: name.to_string(),
        }
    }

    pub fn any_active(&self) -> bool {
        self.flags.read().unwrap().values().any(|active| *active)
    }

    pub fn active_names(&self) -> Vec<String> {
        self.flags
            .read()
            .unwrap()
            .iter()
            .filter(|(_, active)| **active)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Flips every flag inactive; returns how many were active.
    pub fn force_reset_all(&self) -> usize {
        let mut flags = self.flags.write().unwrap();
        let mut reset = 0;
        for (name, active) in flags.iter_mut() {
            if *active {
                debug!("Force-resetting loading flag '{}'", name);
                *active = false;
                reset += 1;
            }
        }
        reset
    }

    fn set(&self, name: &str, value: bool) {
        if let Some(flag) = self.flags.write().unwrap().get_mut(name) {
            *flag = value;
        }
    }

    fn is_set(&self, name: &str) -> bool {
        self.flags
            .read()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(false)
    }

    fn unregister(&self, name: &str) {
        self.flags.write().unwrap().remove(name);
    }
}

/// Handle to one named flag. Dropping it removes the flag from the registry.
pub struct LoadingFlag {
    registry: LoadingRegistry,
    name: String,
}

impl LoadingFlag {
    pub fn set(&self) {
        self.registry.set(&self.name, true);
    }

    pub fn clear(&self) {
        self.registry.set(&self.name, false);
    }

    pub fn is_set(&self) -> bool {
        self.registry.is_set(&self.name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LoadingFlag {
    fn drop(&mut self) {
        self.registry.unregister(&self.name);
    }
}
