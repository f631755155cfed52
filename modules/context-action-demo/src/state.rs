//! State cells owned by the app shell. Handlers write to them through the
//! pipeline's atom setters, never through direct references.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use context_action::ActionRegister;

use crate::actions::{Theme, ToastKind};

pub const THEME: &str = "theme";
pub const SIDEBAR_OPEN: &str = "sidebar-open";
pub const SESSION: &str = "session";
pub const PROFILE: &str = "profile";
pub const TOAST: &str = "toast";

#[derive(Debug, Clone)]
pub struct Session {
    pub email: String,
    pub token: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    pub shown_at: DateTime<Utc>,
}

/// A shared, settable value.
#[derive(Debug, Default)]
pub struct Cell<T>(Arc<Mutex<T>>);

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Clone> Cell<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> T {
        self.lock().clone()
    }

    pub fn set(&self, value: T) {
        *self.lock() = value;
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.lock());
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub theme: Cell<Theme>,
    pub sidebar_open: Cell<bool>,
    pub session: Cell<Option<Session>>,
    pub profile: Cell<Profile>,
    pub toasts: Cell<Vec<Toast>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            profile: Cell::new(Profile {
                name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
                avatar: None,
                bio: None,
            }),
            ..Self::default()
        }
    }

    /// Expose every cell to handlers as an atom setter.
    pub fn bind_atoms(&self, pipeline: &ActionRegister) {
        let theme = self.theme.clone();
        pipeline.register_atom_setter(THEME, move |value: Theme| theme.set(value));

        let sidebar = self.sidebar_open.clone();
        pipeline.register_atom_setter(SIDEBAR_OPEN, move |open: bool| sidebar.set(open));

        let session = self.session.clone();
        pipeline.register_atom_setter(SESSION, move |value: Option<Session>| session.set(value));

        let profile = self.profile.clone();
        pipeline.register_atom_setter(PROFILE, move |value: Profile| profile.set(value));

        let toasts = self.toasts.clone();
        pipeline.register_atom_setter(TOAST, move |toast: Toast| toasts.update(|all| all.push(toast)));
    }
}
