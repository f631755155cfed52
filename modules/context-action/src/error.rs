//! Typed errors for the action pipeline.

use thiserror::Error;

use crate::action::ActionName;

/// Errors surfaced to pipeline callers.
///
/// Only a failing blocking handler ever escapes `dispatch`; every other
/// failure mode of the walk is logged and contained.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A blocking handler failed. The walk stopped at this handler.
    #[error("handler {handler_id} failed for action {action}: {source}")]
    Handler {
        action: ActionName,
        handler_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// No setter registered under this key
    #[error("no atom setter registered for key: {key}")]
    UnknownAtomSetter { key: String },

    /// A setter exists under this key but takes a different value type
    #[error("atom setter {key} does not accept values of type {expected}")]
    AtomSetterType { key: String, expected: &'static str },

    /// Reached through a weak handle after the last `ActionRegister` dropped
    #[error("action register was dropped")]
    RegistryDropped,

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
