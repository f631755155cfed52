//! Typed action dispatch pipeline.
//!
//! Independent parts of an application register ordered, possibly-async
//! handlers for named actions. `dispatch` walks them by priority; any handler
//! can stop the walk or rewrite the payload seen by the handlers after it.
//!
//! Consumers declare their action set with [`define_action!`] (or by
//! implementing [`Action`] by hand) and share one [`ActionRegister`] per
//! logical scope.

pub mod action;
pub mod atoms;
pub mod config;
pub mod controller;
pub mod error;
pub mod handler;
pub mod register;
pub mod registration;

pub use action::{Action, ActionName};
pub use atoms::AtomSetterRegistry;
pub use config::{HandlerConfig, PipelineConfig};
pub use controller::PipelineController;
pub use error::{PipelineError, PipelineResult};
pub use handler::ActionHandler;
pub use register::{ActionRegister, DispatchReport, WeakActionRegister};
pub use registration::{Registration, RegistrationGuard};
