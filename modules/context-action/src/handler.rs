//! The handler seam.

use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;

use crate::controller::PipelineController;

/// Reacts to one dispatched action.
///
/// Receives the payload as it stands when the handler is reached, plus a
/// controller for stopping the walk or rewriting the payload for later
/// handlers. Failing is only observable to the dispatch caller when the
/// handler was registered as blocking.
///
/// Implemented for async closures. Structs implementing it are registered
/// with `ActionRegister::register_handler`; closures usually go through
/// `ActionRegister::register`, which infers their argument types:
///
/// ```ignore
/// pipeline.register::<UserLogin, _>(
///     |payload, controller| async move {
///         if payload.email.is_empty() {
///             controller.abort_with("missing email");
///         }
///         Ok(())
///     },
///     HandlerConfig::new().priority(10).blocking(true),
/// );
/// ```
#[async_trait]
pub trait ActionHandler<P>: Send + Sync {
    async fn handle(&self, payload: P, controller: PipelineController<P>) -> Result<()>;
}

#[async_trait]
impl<P, F, Fut> ActionHandler<P> for F
where
    P: Send + 'static,
    F: Fn(P, PipelineController<P>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, payload: P, controller: PipelineController<P>) -> Result<()> {
        (self)(payload, controller).await
    }
}
