//! The registry and the dispatch walk.
//!
//! Lookup → snapshot → walk in priority order → settle.
//! Each dispatch walks a frozen copy of the handler list, so registrations
//! made while it runs only affect later dispatches.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::Poll;

use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::action::{Action, ActionName};
use crate::atoms::AtomSetterRegistry;
use crate::config::{HandlerConfig, PipelineConfig};
use crate::controller::{DispatchState, PipelineController};
use crate::error::{PipelineError, PipelineResult};
use crate::handler::ActionHandler;
use crate::registration::Registration;

// ---------------------------------------------------------------------------
// Handler storage
// ---------------------------------------------------------------------------

struct HandlerEntry<P> {
    id: Arc<str>,
    serial: u64,
    priority: i32,
    blocking: bool,
    handler: Arc<dyn ActionHandler<P>>,
}

impl<P> Clone for HandlerEntry<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            serial: self.serial,
            priority: self.priority,
            blocking: self.blocking,
            handler: self.handler.clone(),
        }
    }
}

/// Handlers of one action, kept in execution order:
/// priority descending, then registration order.
struct HandlerSet<P> {
    entries: Vec<HandlerEntry<P>>,
}

impl<P> HandlerSet<P> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn contains_id(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| &*entry.id == id)
    }

    fn insert(&mut self, entry: HandlerEntry<P>) {
        // Behind every existing entry of equal or higher priority.
        let position = self
            .entries
            .partition_point(|existing| existing.priority >= entry.priority);
        self.entries.insert(position, entry);
    }
}

/// Payload-independent view of a `HandlerSet`, so one map can hold the
/// handler sets of every action.
trait ErasedHandlerSet: Send + Sync {
    fn len(&self) -> usize;
    fn remove(&mut self, serial: u64) -> bool;
    fn contains(&self, serial: u64) -> bool;
    fn ids(&self) -> Vec<String>;
    fn payload_type(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<P: Send + Sync + 'static> ErasedHandlerSet for HandlerSet<P> {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn remove(&mut self, serial: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.serial != serial);
        self.entries.len() != before
    }

    fn contains(&self, serial: u64) -> bool {
        self.entries.iter().any(|entry| entry.serial == serial)
    }

    fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.id.to_string()).collect()
    }

    fn payload_type(&self) -> &'static str {
        type_name::<P>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type Pipelines = HashMap<ActionName, Box<dyn ErasedHandlerSet>>;

pub(crate) struct RegistryInner {
    pipelines: Mutex<Pipelines>,
    next_serial: AtomicU64,
    atoms: AtomSetterRegistry,
    config: PipelineConfig,
}

impl RegistryInner {
    fn lock(&self) -> MutexGuard<'_, Pipelines> {
        // Map mutations are single insert/retain/remove calls; a panic in
        // another thread cannot leave a half-sorted handler list behind.
        self.pipelines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove one registration. Drops the action's collection once empty.
    pub(crate) fn remove(&self, action: ActionName, serial: u64) -> bool {
        let mut pipelines = self.lock();
        let Some(set) = pipelines.get_mut(action) else {
            return false;
        };
        let removed = set.remove(serial);
        if set.len() == 0 {
            pipelines.remove(action);
        }
        removed
    }

    pub(crate) fn contains(&self, action: ActionName, serial: u64) -> bool {
        self.lock()
            .get(action)
            .is_some_and(|set| set.contains(serial))
    }
}

enum Lookup<P> {
    Missing,
    Mismatch { registered: &'static str },
    Found(Vec<HandlerEntry<P>>),
}

// ---------------------------------------------------------------------------
// ActionRegister
// ---------------------------------------------------------------------------

/// What one dispatch did.
#[derive(Debug, Clone)]
pub struct DispatchReport<P> {
    /// Handlers invoked, in order, including the one that aborted.
    pub visited: usize,
    pub aborted: bool,
    /// First reason passed to `abort_with`, if any.
    pub abort_reason: Option<String>,
    /// The in-flight payload when the walk ended.
    pub payload: P,
}

impl<P> DispatchReport<P> {
    fn unhandled(payload: P) -> Self {
        Self {
            visited: 0,
            aborted: false,
            abort_reason: None,
            payload,
        }
    }
}

/// Per-scope action pipeline registry.
///
/// Clones share the same handlers and atom setters; create a new register
/// for an isolated scope.
#[derive(Clone)]
pub struct ActionRegister {
    inner: Arc<RegistryInner>,
}

impl ActionRegister {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                pipelines: Mutex::new(HashMap::new()),
                next_serial: AtomicU64::new(1),
                atoms: AtomSetterRegistry::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Register an async closure for action `A`.
    ///
    /// Returns the handle that removes this registration. A duplicate id is
    /// rejected: the existing handler stays installed and the returned
    /// handle does nothing.
    pub fn register<A, Fut>(
        &self,
        handler: impl Fn(A::Payload, PipelineController<A::Payload>) -> Fut + Send + Sync + 'static,
        config: HandlerConfig,
    ) -> Registration
    where
        A: Action,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register_handler::<A>(handler, config)
    }

    /// Register any [`ActionHandler`] for action `A`. Same rules as
    /// [`register`](Self::register).
    pub fn register_handler<A: Action>(
        &self,
        handler: impl ActionHandler<A::Payload> + 'static,
        config: HandlerConfig,
    ) -> Registration {
        let id = config
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.generate_id());
        let mut pipelines = self.inner.lock();

        let set = pipelines
            .entry(A::NAME)
            .or_insert_with(|| Box::new(HandlerSet::<A::Payload>::new()) as Box<dyn ErasedHandlerSet>);
        let registered = set.payload_type();

        let Some(set) = set.as_any_mut().downcast_mut::<HandlerSet<A::Payload>>() else {
            error!(
                action = A::NAME,
                handler_id = id.as_str(),
                registered,
                offered = type_name::<A::Payload>(),
                "Payload type conflicts with existing handlers, registration rejected"
            );
            return Registration::noop();
        };

        if set.contains_id(&id) {
            warn!(
                action = A::NAME,
                handler_id = id.as_str(),
                "Handler with this id already exists, registration rejected"
            );
            return Registration::noop();
        }

        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
        set.insert(HandlerEntry {
            id: Arc::from(id.as_str()),
            serial,
            priority: config.priority,
            blocking: config.blocking,
            handler: Arc::new(handler),
        });
        debug!(
            action = A::NAME,
            handler_id = id.as_str(),
            priority = config.priority,
            blocking = config.blocking,
            handlers = set.entries.len(),
            "Handler registered"
        );
        drop(pipelines);

        Registration::new(Arc::downgrade(&self.inner), A::NAME, id, serial)
    }

    /// Dispatch `payload` through every handler of action `A`.
    ///
    /// Settles once the walk ends. Fails only when a blocking handler fails;
    /// the remaining handlers are then skipped. Dispatching an action with
    /// no handlers is a successful no-op.
    pub async fn dispatch<A: Action>(&self, payload: A::Payload) -> PipelineResult<()> {
        self.dispatch_report::<A>(payload).await.map(|_| ())
    }

    /// Like [`dispatch`](Self::dispatch), also reporting how the walk ended.
    pub async fn dispatch_report<A: Action>(
        &self,
        payload: A::Payload,
    ) -> PipelineResult<DispatchReport<A::Payload>> {
        // 1. Lookup + snapshot
        let snapshot = match self.snapshot::<A>() {
            Lookup::Found(snapshot) => snapshot,
            Lookup::Missing => {
                self.log_unhandled(A::NAME);
                return Ok(DispatchReport::unhandled(payload));
            }
            Lookup::Mismatch { registered } => {
                log_payload_conflict::<A>(registered, "dispatch");
                return Ok(DispatchReport::unhandled(payload));
            }
        };

        // 2. Walk
        let state = Arc::new(DispatchState::new(payload));
        let mut visited = 0;

        for entry in snapshot {
            let controller = PipelineController::new(A::NAME, entry.id.clone(), state.clone());
            let handler = entry.handler.clone();
            let current = state.payload();
            let invocation = async move { handler.handle(current, controller).await };
            visited += 1;

            if entry.blocking {
                if let Err(source) = invocation.await {
                    error!(
                        action = A::NAME,
                        handler_id = %entry.id,
                        error = %source,
                        "Blocking handler failed, dispatch stopped"
                    );
                    return Err(PipelineError::Handler {
                        action: A::NAME,
                        handler_id: entry.id.to_string(),
                        source,
                    });
                }
            } else {
                run_detached(A::NAME, entry.id.clone(), invocation).await;
            }

            if !state.should_continue() {
                debug!(action = A::NAME, handler_id = %entry.id, visited, "Walk stopped by abort");
                break;
            }
        }

        // 3. Settle
        Ok(DispatchReport {
            visited,
            aborted: !state.should_continue(),
            abort_reason: state.abort_reason(),
            payload: state.payload(),
        })
    }

    fn snapshot<A: Action>(&self) -> Lookup<A::Payload> {
        let pipelines = self.inner.lock();
        let Some(set) = pipelines.get(A::NAME) else {
            return Lookup::Missing;
        };
        match set.as_any().downcast_ref::<HandlerSet<A::Payload>>() {
            Some(set) if set.entries.is_empty() => Lookup::Missing,
            Some(set) => Lookup::Found(set.entries.clone()),
            None => Lookup::Mismatch {
                registered: set.payload_type(),
            },
        }
    }

    fn log_unhandled(&self, action: ActionName) {
        if self.inner.config.warn_on_unhandled {
            warn!(action, "No handlers registered for action");
        } else {
            debug!(action, "No handlers registered for action");
        }
    }

    fn generate_id(&self) -> String {
        format!(
            "{}_{}",
            self.inner.config.auto_id_prefix,
            Uuid::new_v4().simple()
        )
    }

    // -----------------------------------------------------------------------
    // Management
    // -----------------------------------------------------------------------

    /// Run `f` on the handler set of action `A`. `None` when nothing is
    /// registered under `A::NAME` or the set holds another payload type.
    fn inspect<A: Action, R>(&self, f: impl FnOnce(&HandlerSet<A::Payload>) -> R) -> Option<R> {
        let pipelines = self.inner.lock();
        let set = pipelines.get(A::NAME)?;
        match set.as_any().downcast_ref::<HandlerSet<A::Payload>>() {
            Some(set) => Some(f(set)),
            None => {
                let registered = set.payload_type();
                drop(pipelines);
                log_payload_conflict::<A>(registered, "inspect");
                None
            }
        }
    }

    /// Drop every handler of action `A`. Returns how many were removed.
    ///
    /// Handlers stored under the same name with another payload type are
    /// left alone.
    pub fn clear<A: Action>(&self) -> usize {
        let mut pipelines = self.inner.lock();
        let found = pipelines
            .get(A::NAME)
            .map(|set| (set.as_any().is::<HandlerSet<A::Payload>>(), set.payload_type()));

        let removed = match found {
            None => 0,
            Some((true, _)) => pipelines.remove(A::NAME).map(|set| set.len()).unwrap_or(0),
            Some((false, registered)) => {
                drop(pipelines);
                log_payload_conflict::<A>(registered, "clear");
                return 0;
            }
        };
        debug!(action = A::NAME, removed, "Handlers cleared");
        removed
    }

    /// Drop every handler of every action. Atom setters are kept.
    pub fn clear_all(&self) {
        self.inner.lock().clear();
        debug!("All handlers cleared");
    }

    pub fn handler_count<A: Action>(&self) -> usize {
        self.inspect::<A, _>(|set| set.entries.len()).unwrap_or(0)
    }

    pub fn has_handlers<A: Action>(&self) -> bool {
        self.handler_count::<A>() > 0
    }

    /// Handler ids of action `A`, in execution order.
    pub fn handler_ids<A: Action>(&self) -> Vec<String> {
        self.inspect::<A, _>(|set| set.ids()).unwrap_or_default()
    }

    /// Actions that currently have handlers, sorted.
    pub fn action_names(&self) -> Vec<ActionName> {
        let mut names: Vec<ActionName> = self.inner.lock().keys().copied().collect();
        names.sort_unstable();
        names
    }

    // -----------------------------------------------------------------------
    // Atom setters
    // -----------------------------------------------------------------------

    /// Upsert the setter stored under `key`; the last registration wins.
    pub fn register_atom_setter<T: 'static>(
        &self,
        key: impl Into<String>,
        setter: impl Fn(T) + Send + Sync + 'static,
    ) {
        self.inner.atoms.register(key, setter);
    }

    /// Push `value` through the setter stored under `key`.
    pub fn set_atom<T: 'static>(&self, key: &str, value: T) -> PipelineResult<()> {
        self.inner.atoms.set(key, value)
    }

    pub fn has_atom_setter(&self, key: &str) -> bool {
        self.inner.atoms.contains(key)
    }

    pub fn atom_setter_keys(&self) -> Vec<String> {
        self.inner.atoms.keys()
    }

    pub fn atoms(&self) -> &AtomSetterRegistry {
        &self.inner.atoms
    }
}

impl ActionRegister {
    /// A handle that does not keep the registry alive.
    ///
    /// Handlers that dispatch or write atoms through their own registry
    /// capture this instead of a clone, so dropping the last
    /// `ActionRegister` frees the registry and every handler in it.
    pub fn downgrade(&self) -> WeakActionRegister {
        WeakActionRegister {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for ActionRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegister")
            .field("actions", &self.action_names())
            .field("atom_setters", &self.atom_setter_keys())
            .finish()
    }
}

/// Non-owning form of [`ActionRegister`], see [`ActionRegister::downgrade`].
#[derive(Clone)]
pub struct WeakActionRegister {
    inner: Weak<RegistryInner>,
}

impl WeakActionRegister {
    pub fn upgrade(&self) -> Option<ActionRegister> {
        self.inner.upgrade().map(|inner| ActionRegister { inner })
    }

    /// [`ActionRegister::dispatch`] on the registry, if it is still alive.
    pub async fn dispatch<A: Action>(&self, payload: A::Payload) -> PipelineResult<()> {
        let register = self.upgrade().ok_or(PipelineError::RegistryDropped)?;
        register.dispatch::<A>(payload).await
    }

    /// [`ActionRegister::set_atom`] on the registry, if it is still alive.
    pub fn set_atom<T: 'static>(&self, key: &str, value: T) -> PipelineResult<()> {
        let register = self.upgrade().ok_or(PipelineError::RegistryDropped)?;
        register.set_atom(key, value)
    }
}

impl std::fmt::Debug for WeakActionRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakActionRegister")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

fn log_payload_conflict<A: Action>(registered: &'static str, operation: &'static str) {
    error!(
        action = A::NAME,
        registered,
        offered = type_name::<A::Payload>(),
        operation,
        "Payload type conflicts with registered handlers, nothing done"
    );
}

/// Invoke a non-blocking handler without waiting for it.
///
/// The handler runs inline up to its first suspension point, so an abort or
/// payload change made before that point is seen by the walk. Whatever is
/// left is spawned onto the current runtime with its failure logged.
async fn run_detached<F>(action: ActionName, handler_id: Arc<str>, invocation: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    // A panic counts as a failure of this handler only.
    let mut invocation = AssertUnwindSafe(invocation).catch_unwind().boxed();

    match futures::poll!(invocation.as_mut()) {
        Poll::Ready(outcome) => log_detached_outcome(action, &handler_id, outcome),
        Poll::Pending => match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    log_detached_outcome(action, &handler_id, invocation.await);
                });
            }
            Err(_) => {
                warn!(
                    action,
                    handler_id = %handler_id,
                    "No tokio runtime to detach onto, non-blocking handler dropped"
                );
            }
        },
    }
}

type Panic = Box<dyn Any + Send>;

fn log_detached_outcome(action: ActionName, handler_id: &str, outcome: Result<anyhow::Result<()>, Panic>) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(action, handler_id, error = %e, "Non-blocking handler failed");
        }
        Err(panic) => {
            error!(
                action,
                handler_id,
                panic = panic_message(&*panic),
                "Non-blocking handler panicked"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
