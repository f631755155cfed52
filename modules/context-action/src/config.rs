use std::env;

use crate::error::{PipelineError, PipelineResult};

/// Per-registration settings.
///
/// ```
/// use context_action::HandlerConfig;
///
/// let config = HandlerConfig::new().priority(10).id("login-validator").blocking(true);
/// assert_eq!(config.priority, 10);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Higher runs earlier. Ties run in registration order.
    pub priority: i32,
    /// Unique within one action. Generated when `None`.
    pub id: Option<String>,
    /// Await this handler before moving on, and propagate its failure.
    pub blocking: bool,
}

impl HandlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }
}

/// Pipeline-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Log dispatches that found no handlers at warn level (debug otherwise).
    pub warn_on_unhandled: bool,
    /// Prefix of generated handler ids: `{prefix}_{uuid}`.
    pub auto_id_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            warn_on_unhandled: true,
            auto_id_prefix: "handler".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    /// Unset variables fall back to the defaults.
    pub fn from_env() -> PipelineResult<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> PipelineResult<Self> {
        let defaults = Self::default();

        let warn_on_unhandled = match var("CONTEXT_ACTION_WARN_UNHANDLED") {
            Some(raw) => parse_bool("CONTEXT_ACTION_WARN_UNHANDLED", &raw)?,
            None => defaults.warn_on_unhandled,
        };

        let auto_id_prefix = match var("CONTEXT_ACTION_ID_PREFIX") {
            Some(raw) if raw.trim().is_empty() => {
                return Err(PipelineError::Config(
                    "CONTEXT_ACTION_ID_PREFIX must not be empty".to_string(),
                ))
            }
            Some(raw) => raw.trim().to_string(),
            None => defaults.auto_id_prefix,
        };

        Ok(Self {
            warn_on_unhandled,
            auto_id_prefix,
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> PipelineResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PipelineError::Config(format!(
            "{key} must be a boolean, got {other:?}"
        ))),
    }
}
