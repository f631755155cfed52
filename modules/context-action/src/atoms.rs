//! Side-registry of named setters for external state cells.
//!
//! Handlers push values into state they do not own by key, without holding a
//! reference to the cell. Entries are upserted and never removed; the last
//! registration for a key wins.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

struct Setter<T>(Box<dyn Fn(T) + Send + Sync>);

struct Entry {
    setter: Arc<dyn Any + Send + Sync>,
    value_type: &'static str,
}

#[derive(Default)]
pub struct AtomSetterRegistry {
    setters: Mutex<HashMap<String, Entry>>,
}

impl AtomSetterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.setters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the setter stored under `key`.
    pub fn register<T: 'static>(&self, key: impl Into<String>, setter: impl Fn(T) + Send + Sync + 'static) {
        let key = key.into();
        let entry = Entry {
            setter: Arc::new(Setter::<T>(Box::new(setter))),
            value_type: type_name::<T>(),
        };
        if self.lock().insert(key.clone(), entry).is_some() {
            debug!(key = key.as_str(), "Atom setter replaced");
        } else {
            debug!(key = key.as_str(), "Atom setter registered");
        }
    }

    /// Push `value` through the setter stored under `key`.
    pub fn set<T: 'static>(&self, key: &str, value: T) -> PipelineResult<()> {
        let setter = {
            let setters = self.lock();
            let entry = setters
                .get(key)
                .ok_or_else(|| PipelineError::UnknownAtomSetter {
                    key: key.to_string(),
                })?;
            entry.setter.clone()
        };

        // Call unlocked: a setter may itself touch the registry.
        let setter = setter
            .downcast::<Setter<T>>()
            .map_err(|_| PipelineError::AtomSetterType {
                key: key.to_string(),
                expected: type_name::<T>(),
            })?;
        (setter.0)(value);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Type name of the value the setter under `key` accepts.
    pub fn value_type(&self, key: &str) -> Option<&'static str> {
        self.lock().get(key).map(|entry| entry.value_type)
    }
}

impl std::fmt::Debug for AtomSetterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomSetterRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
