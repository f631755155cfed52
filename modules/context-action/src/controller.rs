//! Per-invocation controller handed to every handler.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::action::ActionName;

/// Mutable state of one dispatch: the continue flag and the in-flight payload.
///
/// Shared by every controller created during that dispatch and by nothing
/// else, so `abort` and `modify_payload` never leak into other dispatches.
pub(crate) struct DispatchState<P> {
    inner: Mutex<WalkState<P>>,
}

struct WalkState<P> {
    payload: P,
    proceed: bool,
    abort_reason: Option<String>,
}

impl<P: Clone> DispatchState<P> {
    pub(crate) fn new(payload: P) -> Self {
        Self {
            inner: Mutex::new(WalkState {
                payload,
                proceed: true,
                abort_reason: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WalkState<P>> {
        // Every write below is a single assignment, so a poisoned guard
        // still holds consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn payload(&self) -> P {
        self.lock().payload.clone()
    }

    pub(crate) fn should_continue(&self) -> bool {
        self.lock().proceed
    }

    pub(crate) fn abort_reason(&self) -> Option<String> {
        self.lock().abort_reason.clone()
    }

    fn abort(&self, reason: Option<String>) {
        let mut state = self.lock();
        state.proceed = false;
        if state.abort_reason.is_none() {
            state.abort_reason = reason;
        }
    }

    /// Read-modify-write under one lock, so concurrent updates from a
    /// detached controller and the walk never overwrite each other.
    fn update_payload(&self, modifier: impl FnOnce(P) -> P) {
        let mut state = self.lock();
        let current = state.payload.clone();
        state.payload = modifier(current);
    }
}

/// Lets a handler stop the walk or rewrite the payload for later handlers.
///
/// A fresh controller is built for each handler call. Cloning is cheap; a
/// clone moved into a detached task keeps acting on the same dispatch.
pub struct PipelineController<P> {
    action: ActionName,
    handler_id: Arc<str>,
    state: Arc<DispatchState<P>>,
}

impl<P> Clone for PipelineController<P> {
    fn clone(&self) -> Self {
        Self {
            action: self.action,
            handler_id: self.handler_id.clone(),
            state: self.state.clone(),
        }
    }
}

impl<P: Clone> PipelineController<P> {
    pub(crate) fn new(action: ActionName, handler_id: Arc<str>, state: Arc<DispatchState<P>>) -> Self {
        Self {
            action,
            handler_id,
            state,
        }
    }

    /// Explicit "continue". The walk already continues by default, and this
    /// does not revive a walk that was aborted.
    pub fn next(&self) {}

    /// Stop the walk once the current handler returns.
    pub fn abort(&self) {
        info!(action = self.action, handler_id = %self.handler_id, "Pipeline aborted");
        self.state.abort(None);
    }

    /// Stop the walk once the current handler returns, recording why.
    /// The first recorded reason of a dispatch is kept.
    pub fn abort_with(&self, reason: impl Into<String>) {
        let reason = reason.into();
        info!(
            action = self.action,
            handler_id = %self.handler_id,
            reason = reason.as_str(),
            "Pipeline aborted"
        );
        self.state.abort(Some(reason));
    }

    /// Replace the in-flight payload with `modifier(current)`.
    ///
    /// Visible to every handler invoked after this call in the same
    /// dispatch; handlers that already ran keep what they were given.
    ///
    /// Updates are applied atomically in call order. `modifier` runs while
    /// this dispatch's state is locked and must not call back into a
    /// controller of the same dispatch.
    pub fn modify_payload(&self, modifier: impl FnOnce(P) -> P) {
        self.state.update_payload(modifier);
    }

    /// Current in-flight payload of this dispatch.
    pub fn payload(&self) -> P {
        self.state.payload()
    }

    pub fn is_aborted(&self) -> bool {
        !self.state.should_continue()
    }

    pub fn action(&self) -> ActionName {
        self.action
    }

    /// Id of the registration this controller was created for.
    pub fn handler_id(&self) -> &str {
        &self.handler_id
    }
}

impl<P> std::fmt::Debug for PipelineController<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("action", &self.action)
            .field("handler_id", &self.handler_id)
            .finish()
    }
}
