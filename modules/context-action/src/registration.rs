//! Unregister handles returned by `ActionRegister::register`.

use std::sync::Weak;

use tracing::debug;

use crate::action::ActionName;
use crate::register::RegistryInner;

/// Removes exactly one registration when `unregister` is called.
///
/// Idempotent: calling it again, after the action was cleared, or after the
/// register itself was dropped is a no-op. A rejected registration hands
/// out an inert handle.
#[derive(Debug, Clone)]
pub struct Registration {
    slot: Option<Slot>,
}

#[derive(Debug, Clone)]
struct Slot {
    registry: Weak<RegistryInner>,
    action: ActionName,
    id: String,
    serial: u64,
}

impl Registration {
    pub(crate) fn new(
        registry: Weak<RegistryInner>,
        action: ActionName,
        id: String,
        serial: u64,
    ) -> Self {
        Self {
            slot: Some(Slot {
                registry,
                action,
                id,
                serial,
            }),
        }
    }

    /// Handle for a registration that never took effect.
    pub(crate) fn noop() -> Self {
        Self { slot: None }
    }

    pub fn unregister(&self) {
        let Some(slot) = &self.slot else {
            return;
        };
        let Some(registry) = slot.registry.upgrade() else {
            return;
        };
        if registry.remove(slot.action, slot.serial) {
            debug!(action = slot.action, handler_id = slot.id.as_str(), "Handler unregistered");
        }
    }

    /// The handler id, or `None` for a rejected registration.
    pub fn id(&self) -> Option<&str> {
        self.slot.as_ref().map(|slot| slot.id.as_str())
    }

    /// Whether this registration is still installed.
    pub fn is_registered(&self) -> bool {
        self.slot.as_ref().is_some_and(|slot| {
            slot.registry
                .upgrade()
                .is_some_and(|registry| registry.contains(slot.action, slot.serial))
        })
    }

    /// Tie the registration to a scope: it is removed when the guard drops.
    pub fn into_guard(self) -> RegistrationGuard {
        RegistrationGuard { registration: self }
    }
}

/// Unregisters on drop.
#[derive(Debug)]
#[must_use = "dropping the guard unregisters the handler immediately"]
pub struct RegistrationGuard {
    registration: Registration,
}

impl RegistrationGuard {
    pub fn registration(&self) -> &Registration {
        &self.registration
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registration.unregister();
    }
}
