//! Application contexts
//!
//! A context is the live record of one application. It is born
//! [`State::Running`], collects finish hooks while running, and becomes
//! [`State::Finished`] exactly once through [`ApplicationContext::finish`],
//! which runs the collected hooks in registration order.
//!
//! A context is meant to be driven by one logical flow at a time. The
//! reference implementation, [`SimpleApplicationContext`], is internally
//! locked so sharing it is memory safe, but interleaving `finish()` with
//! hook registration from several threads still gives no ordering
//! guarantees between them.

mod simple;

pub use simple::SimpleApplicationContext;

use crate::applicable::ApplicableRef;
use crate::target::holder::HolderRef;
use crate::target::{DelegatedTarget, Target};
use crate::{ApplicationError, Result};
use std::fmt;
use std::sync::Arc;

/// Shared handle to any application context
pub type ContextRef<T> = Arc<dyn ApplicationContext<T>>;

/// Deferred action run once when a context finishes
pub type FinishHook<T> = Box<dyn FnOnce(&dyn ApplicationContext<T>) -> Result<()> + Send>;

/// Outcome of starting an application
pub type Applied<T> = std::result::Result<ContextRef<T>, ApplyFailure<T>>;

/// Lifecycle state of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Hooks may still be added; `finish()` has not completed
    Running,
    /// `finish()` has run; the context is spent
    Finished,
}

/// Live record of one application
pub trait ApplicationContext<T: Target>: DelegatedTarget<T> + fmt::Debug + Send + Sync {
    /// Current lifecycle state
    fn state(&self) -> State;

    /// The applicable that started this application
    fn applied(&self) -> ApplicableRef<T>;

    /// Holder of the target this application runs against
    fn target_holder(&self) -> HolderRef<T>;

    /// Register a hook to run when this context finishes
    fn add_finish_hook(&self, hook: FinishHook<T>) -> Result<()>;

    /// Run all registered hooks in order and mark the context finished
    fn finish(&self) -> Result<()>;

    /// Whether `finish()` has completed
    fn is_finished(&self) -> bool {
        self.state() == State::Finished
    }

    /// Whether the context is still running
    fn is_running(&self) -> bool {
        self.state() == State::Running
    }

    /// Scoped release; same as [`finish`](Self::finish)
    fn close(&self) -> Result<()> {
        self.finish()
    }
}

/// Box a closure as a [`FinishHook`]
pub fn hook<T, F>(f: F) -> FinishHook<T>
where
    T: Target,
    F: FnOnce(&dyn ApplicationContext<T>) -> Result<()> + Send + 'static,
{
    Box::new(f)
}

/// Failure raised while an application was being started
///
/// Carries the context the failure happened in, so the caller can still
/// finish it and run whatever hooks were registered before the failure.
#[derive(thiserror::Error)]
#[error("Application failed: {error}")]
pub struct ApplyFailure<T: Target> {
    context: ContextRef<T>,
    #[source]
    error: ApplicationError,
}

impl<T: Target> ApplyFailure<T> {
    /// Pair a failure with the context it happened in
    pub fn new(context: ContextRef<T>, error: ApplicationError) -> Self {
        Self { context, error }
    }

    /// Context the failure happened in
    pub fn context(&self) -> &ContextRef<T> {
        &self.context
    }

    /// The failure itself
    pub fn error(&self) -> &ApplicationError {
        &self.error
    }

    /// Split into context and failure
    pub fn into_parts(self) -> (ContextRef<T>, ApplicationError) {
        (self.context, self.error)
    }

    /// Finish the context, then return the original failure
    ///
    /// A failure from `finish()` itself is logged and dropped in favor of the
    /// original one.
    pub fn finish(self) -> ApplicationError {
        if let Err(finish_error) = self.context.finish() {
            tracing::warn!(error = %finish_error, "finish after failed application also failed");
        }
        self.error
    }
}

impl<T: Target> fmt::Debug for ApplyFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyFailure")
            .field("state", &self.context.state())
            .field("error", &self.error)
            .finish()
    }
}

impl<T: Target> From<ApplyFailure<T>> for ApplicationError {
    fn from(failure: ApplyFailure<T>) -> Self {
        failure.error
    }
}

/// Finishes a context when dropped
///
/// Used to release a context on every exit path, including unwinding. Call
/// [`FinishGuard::finish`] on the normal path to observe the result; a
/// failure while finishing on drop is only logged.
pub struct FinishGuard<'a, T: Target> {
    context: &'a dyn ApplicationContext<T>,
    armed: bool,
}

impl<'a, T: Target> FinishGuard<'a, T> {
    /// Guard `context`
    pub fn new(context: &'a dyn ApplicationContext<T>) -> Self {
        Self {
            context,
            armed: true,
        }
    }

    /// Finish now and report the result
    pub fn finish(mut self) -> Result<()> {
        self.armed = false;
        self.context.finish()
    }

    /// Drop the guard without finishing
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T: Target> Drop for FinishGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(error) = self.context.finish() {
                tracing::warn!(%error, "scoped finish failed");
            }
        }
    }
}

impl<T: Target> fmt::Debug for FinishGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinishGuard")
            .field("context", &self.context)
            .field("armed", &self.armed)
            .finish()
    }
}
