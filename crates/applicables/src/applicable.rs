//! Applicable behavior
//!
//! An [`Applicable`] is the single-phase unit of behavior: it is run once
//! against the context that an application created for it. Two-phase
//! behavior is expressed with [`Capability`](crate::Capability), which every
//! capability gets an `Applicable` implementation from.

use crate::context::ApplicationContext;
use crate::target::Target;
use crate::Result;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Shared handle to any applicable
pub type ApplicableRef<T> = Arc<dyn Applicable<T>>;

/// Behavior that can be run against an application context
pub trait Applicable<T: Target>: Send + Sync + 'static {
    /// Run this behavior in `ctx`
    ///
    /// Takes the shared handle so implementations can keep themselves alive
    /// in finish hooks.
    fn apply(self: Arc<Self>, ctx: &dyn ApplicationContext<T>) -> Result<()>;
}

/// Applicable that wraps another one
pub trait DelegatedApplicable<T: Target> {
    /// The wrapped applicable
    fn applicable(&self) -> ApplicableRef<T>;
}

/// Applicable built from a closure
pub struct FnApplicable<T, F> {
    apply: F,
    _target: PhantomData<fn() -> T>,
}

/// Build an applicable from a closure
pub fn from_fn<T, F>(apply: F) -> FnApplicable<T, F>
where
    T: Target,
    F: Fn(&dyn ApplicationContext<T>) -> Result<()> + Send + Sync + 'static,
{
    FnApplicable {
        apply,
        _target: PhantomData,
    }
}

impl<T, F> Applicable<T> for FnApplicable<T, F>
where
    T: Target,
    F: Fn(&dyn ApplicationContext<T>) -> Result<()> + Send + Sync + 'static,
{
    fn apply(self: Arc<Self>, ctx: &dyn ApplicationContext<T>) -> Result<()> {
        (self.apply)(ctx)
    }
}

impl<T, F> fmt::Debug for FnApplicable<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnApplicable").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyFailure;
    use crate::target::{start_simple, DelegatedTarget};
    use crate::test_utils::Counter;
    use crate::ApplicationError;

    #[test]
    fn test_fn_applicable_runs_once_per_application() {
        let counter = Arc::new(Counter::new("c"));
        let applicable: ApplicableRef<Counter> = Arc::new(from_fn(
            |ctx: &dyn ApplicationContext<Counter>| {
                ctx.target().add(1);
                Ok(())
            },
        ));

        start_simple(Arc::clone(&counter), Arc::clone(&applicable)).unwrap();
        start_simple(Arc::clone(&counter), applicable).unwrap();
        assert_eq!(counter.value(), 2);
    }

    #[test]
    fn test_fn_applicable_failure_keeps_context() {
        let counter = Arc::new(Counter::new("c"));
        let applicable: ApplicableRef<Counter> = Arc::new(from_fn(
            |_: &dyn ApplicationContext<Counter>| Err(ApplicationError::failed("nope")),
        ));

        let failure: ApplyFailure<Counter> = start_simple(counter, applicable).unwrap_err();
        assert!(failure.context().is_running());
        assert_eq!(failure.error().to_string(), "Behavior failed: nope");
    }
}
