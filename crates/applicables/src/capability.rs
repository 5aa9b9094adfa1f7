//! Two-phase capabilities
//!
//! A [`Capability`] splits its behavior into `on_apply`, run as soon as it is
//! applied, and `on_finish`, run when the context finishes. Every capability
//! becomes an [`Applicable`] through [`CapabilityApplicable`] (see
//! [`applicable`] and [`Capability::into_applicable`]), whose `apply` runs
//! this protocol:
//!
//! 1. run `on_apply(ctx)`;
//! 2. register `on_finish` as a finish hook on `ctx`, even when step 1
//!    returned an error or panicked;
//! 3. report step 1's failure after step 2. `on_finish` itself only ever
//!    runs from `ctx.finish()`. If step 2 was refused as well (hook limit,
//!    finished context) both failures come back as
//!    [`ApplicationError::Unscheduled`].
//!
//! With [`Completion::Instant`] the protocol is additionally scoped: the
//! context is finished on every exit path, so nobody has to finish an
//! instant capability's context by hand.
//!
//! Decorators wrap a capability instead of re-implementing the protocol:
//! [`DelegatedCapability`] forwards both phases, [`TracedCapability`]
//! forwards them inside tracing spans.

use crate::applicable::{Applicable, ApplicableRef, DelegatedApplicable};
use crate::context::{ApplicationContext, FinishGuard};
use crate::target::Target;
use crate::{ApplicationError, Result};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, debug_span, warn};

/// When a capability's context is finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Completion {
    /// The caller finishes the context
    #[default]
    Deferred,
    /// The context is finished as soon as the apply protocol returns
    Instant,
}

/// Applicable with separate apply and finish phases
pub trait Capability<T: Target>: Send + Sync + 'static {
    /// Run immediately when the capability is applied
    fn on_apply(&self, ctx: &dyn ApplicationContext<T>) -> Result<()>;

    /// Run once, when the context finishes
    fn on_finish(&self, ctx: &dyn ApplicationContext<T>) -> Result<()>;

    /// Whether the context finishes itself after applying
    fn completion(&self) -> Completion {
        Completion::Deferred
    }

    /// This capability as a shared applicable
    fn into_applicable(self: Arc<Self>) -> ApplicableRef<T>
    where
        Self: Sized,
    {
        applicable(self)
    }
}

/// Registers `on_finish` exactly once, on the normal path or while unwinding
struct PendingFinish<'a, T: Target, C: Capability<T> + ?Sized> {
    capability: Option<Arc<C>>,
    ctx: &'a dyn ApplicationContext<T>,
}

impl<T: Target, C: Capability<T> + ?Sized> PendingFinish<'_, T, C> {
    fn register(&mut self) -> Result<()> {
        match self.capability.take() {
            Some(capability) => self.ctx.add_finish_hook(Box::new(
                move |ctx: &dyn ApplicationContext<T>| capability.on_finish(ctx),
            )),
            None => Ok(()),
        }
    }
}

impl<T: Target, C: Capability<T> + ?Sized> Drop for PendingFinish<'_, T, C> {
    fn drop(&mut self) {
        if let Err(error) = self.register() {
            warn!(%error, "could not register finish phase while unwinding");
        }
    }
}

fn apply_protocol<T: Target, C: Capability<T> + ?Sized>(
    capability: &Arc<C>,
    ctx: &dyn ApplicationContext<T>,
) -> Result<()> {
    let mut pending = PendingFinish {
        capability: Some(Arc::clone(capability)),
        ctx,
    };
    let applied = capability.on_apply(ctx);
    let registered = pending.register();
    match (applied, registered) {
        (Err(apply), Err(registration)) => {
            warn!(%apply, %registration, "apply phase failed and finish phase was not scheduled");
            Err(ApplicationError::Unscheduled {
                apply: Box::new(apply),
                registration: Box::new(registration),
            })
        }
        (applied, registered) => applied.and(registered),
    }
}

/// A capability seen as an [`Applicable`]
pub struct CapabilityApplicable<C: ?Sized> {
    capability: Arc<C>,
}

impl<C: ?Sized> CapabilityApplicable<C> {
    /// Wrap `capability`
    pub fn new(capability: Arc<C>) -> Self {
        Self { capability }
    }

    /// The wrapped capability
    pub fn capability(&self) -> &Arc<C> {
        &self.capability
    }
}

impl<C: ?Sized> fmt::Debug for CapabilityApplicable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityApplicable").finish_non_exhaustive()
    }
}

/// Share `capability` as an applicable
pub fn applicable<T, C>(capability: Arc<C>) -> ApplicableRef<T>
where
    T: Target,
    C: Capability<T> + ?Sized,
{
    Arc::new(CapabilityApplicable::new(capability))
}

impl<T: Target, C: Capability<T> + ?Sized> Applicable<T> for CapabilityApplicable<C> {
    fn apply(self: Arc<Self>, ctx: &dyn ApplicationContext<T>) -> Result<()> {
        let capability = &self.capability;
        match capability.completion() {
            Completion::Deferred => apply_protocol(capability, ctx),
            Completion::Instant => {
                let guard = FinishGuard::new(ctx);
                let applied = apply_protocol(capability, ctx);
                let finished = guard.finish();
                applied.and(finished)
            }
        }
    }
}

/// Capability built from two closures
pub struct FnCapability<T, A, F> {
    applier: A,
    finisher: F,
    completion: Completion,
    _target: PhantomData<fn() -> T>,
}

impl<T, A, F> FnCapability<T, A, F> {
    /// Completion mode of this capability
    pub fn completion_mode(&self) -> Completion {
        self.completion
    }
}

/// Build a deferred capability from an applier and a finisher
pub fn of<T, A, F>(applier: A, finisher: F) -> FnCapability<T, A, F>
where
    T: Target,
    A: Fn(&dyn ApplicationContext<T>) -> Result<()> + Send + Sync + 'static,
    F: Fn(&dyn ApplicationContext<T>) -> Result<()> + Send + Sync + 'static,
{
    FnCapability {
        applier,
        finisher,
        completion: Completion::Deferred,
        _target: PhantomData,
    }
}

/// Build an instant capability from an applier and a finisher
pub fn of_instant<T, A, F>(applier: A, finisher: F) -> FnCapability<T, A, F>
where
    T: Target,
    A: Fn(&dyn ApplicationContext<T>) -> Result<()> + Send + Sync + 'static,
    F: Fn(&dyn ApplicationContext<T>) -> Result<()> + Send + Sync + 'static,
{
    FnCapability {
        completion: Completion::Instant,
        ..of(applier, finisher)
    }
}

impl<T, A, F> Capability<T> for FnCapability<T, A, F>
where
    T: Target,
    A: Fn(&dyn ApplicationContext<T>) -> Result<()> + Send + Sync + 'static,
    F: Fn(&dyn ApplicationContext<T>) -> Result<()> + Send + Sync + 'static,
{
    fn on_apply(&self, ctx: &dyn ApplicationContext<T>) -> Result<()> {
        (self.applier)(ctx)
    }

    fn on_finish(&self, ctx: &dyn ApplicationContext<T>) -> Result<()> {
        (self.finisher)(ctx)
    }

    fn completion(&self) -> Completion {
        self.completion
    }
}

impl<T, A, F> fmt::Debug for FnCapability<T, A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCapability")
            .field("completion", &self.completion)
            .finish_non_exhaustive()
    }
}

/// Capability that forwards both phases to an inner capability
pub struct DelegatedCapability<C: ?Sized> {
    inner: Arc<C>,
    completion: Option<Completion>,
}

impl<C: ?Sized> DelegatedCapability<C> {
    /// Forward to `inner`, keeping its completion mode
    pub fn new(inner: Arc<C>) -> Self {
        Self {
            inner,
            completion: None,
        }
    }

    /// Forward to `inner`, finishing the context right after applying
    pub fn instant(inner: Arc<C>) -> Self {
        Self {
            inner,
            completion: Some(Completion::Instant),
        }
    }

    /// The wrapped capability
    pub fn capability(&self) -> &Arc<C> {
        &self.inner
    }
}

impl<C: ?Sized> Clone for DelegatedCapability<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            completion: self.completion,
        }
    }
}

impl<C: fmt::Debug + ?Sized> fmt::Debug for DelegatedCapability<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedCapability")
            .field("inner", &self.inner)
            .field("completion", &self.completion)
            .finish()
    }
}

impl<T: Target, C: Capability<T> + ?Sized> Capability<T> for DelegatedCapability<C> {
    fn on_apply(&self, ctx: &dyn ApplicationContext<T>) -> Result<()> {
        self.inner.on_apply(ctx)
    }

    fn on_finish(&self, ctx: &dyn ApplicationContext<T>) -> Result<()> {
        self.inner.on_finish(ctx)
    }

    fn completion(&self) -> Completion {
        self.completion.unwrap_or_else(|| self.inner.completion())
    }
}

impl<T: Target, C: Capability<T> + ?Sized> DelegatedApplicable<T> for DelegatedCapability<C> {
    fn applicable(&self) -> ApplicableRef<T> {
        applicable(Arc::clone(&self.inner))
    }
}

/// Delegated capability that traces each phase
pub struct TracedCapability<C: ?Sized> {
    delegate: DelegatedCapability<C>,
    name: Cow<'static, str>,
}

impl<C: ?Sized> TracedCapability<C> {
    /// Trace `inner` under `name`
    pub fn new(inner: Arc<C>, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            delegate: DelegatedCapability::new(inner),
            name: name.into(),
        }
    }

    /// Name used in spans
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped capability
    pub fn capability(&self) -> &Arc<C> {
        self.delegate.capability()
    }
}

impl<C: fmt::Debug + ?Sized> fmt::Debug for TracedCapability<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedCapability")
            .field("name", &self.name)
            .field("delegate", &self.delegate)
            .finish()
    }
}

impl<T: Target, C: Capability<T> + ?Sized> Capability<T> for TracedCapability<C> {
    fn on_apply(&self, ctx: &dyn ApplicationContext<T>) -> Result<()> {
        let span = debug_span!("capability.apply", capability = %self.name);
        let _entered = span.enter();
        debug!("applying");
        let result = self.delegate.on_apply(ctx);
        if let Err(error) = &result {
            warn!(%error, "apply phase failed");
        }
        result
    }

    fn on_finish(&self, ctx: &dyn ApplicationContext<T>) -> Result<()> {
        let span = debug_span!("capability.finish", capability = %self.name);
        let _entered = span.enter();
        debug!("finishing");
        let result = self.delegate.on_finish(ctx);
        if let Err(error) = &result {
            warn!(%error, "finish phase failed");
        }
        result
    }

    fn completion(&self) -> Completion {
        self.delegate.completion()
    }
}

impl<T: Target, C: Capability<T> + ?Sized> DelegatedApplicable<T> for TracedCapability<C> {
    fn applicable(&self) -> ApplicableRef<T> {
        self.delegate.applicable()
    }
}
