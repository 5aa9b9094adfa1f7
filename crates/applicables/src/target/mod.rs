//! Targets: entities that accept applications
//!
//! A [`Target`] knows one thing: how to start an application of some
//! [`Applicable`](crate::Applicable) against itself and hand back the
//! resulting context. It does not know its capabilities in advance.
//!
//! Targets are shared through `Arc<T>`. Every contract in this crate is
//! generic over `T: Target`, and a target's own applications are
//! `Applicable<Self>`, which is how "a type that is a target of itself" is
//! expressed.
//!
//! Values that cannot implement [`Target`] themselves participate through
//! [`adapter`]; values that need to be swapped at runtime are wrapped in a
//! [`holder`].

pub mod adapter;
pub mod holder;

use crate::applicable::ApplicableRef;
use crate::context::{Applied, SimpleApplicationContext};
use holder::StaticTargetHolder;
use std::sync::Arc;

/// An entity that applicables can be applied to
pub trait Target: Send + Sync + Sized + 'static {
    /// Start an application of `applicable` against this target
    ///
    /// The returned context's holder resolves back to this target and its
    /// `applied()` is `applicable`. Whether the applicable has already run
    /// when this returns depends on the context; [`start_simple`] runs it
    /// before returning.
    fn apply(self: Arc<Self>, applicable: ApplicableRef<Self>) -> Applied<Self>;
}

/// Anything that resolves to a target and forwards applications to it
///
/// Implemented by every target holder and every application context.
pub trait DelegatedTarget<T: Target> {
    /// Current target
    fn target(&self) -> Arc<T>;

    /// Start an application against the current target
    fn apply(&self, applicable: ApplicableRef<T>) -> Applied<T> {
        T::apply(self.target(), applicable)
    }
}

/// Start a [`SimpleApplicationContext`] over `target` and run `applicable` in it
///
/// This is the usual body of [`Target::apply`]: the target is held
/// immutably and the applicable runs before this returns.
pub fn start_simple<T: Target>(target: Arc<T>, applicable: ApplicableRef<T>) -> Applied<T> {
    let holder = Arc::new(StaticTargetHolder::new(target));
    SimpleApplicationContext::start(applicable, holder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applicable;
    use crate::context::{ApplicationContext, State};
    use crate::test_utils::Counter;

    #[test]
    fn test_start_simple_binds_target_and_applicable() {
        let counter = Arc::new(Counter::new("c"));
        let applicable: ApplicableRef<Counter> =
            Arc::new(applicable::from_fn(|ctx: &dyn ApplicationContext<Counter>| {
                ctx.target().add(2);
                Ok(())
            }));

        let ctx = Arc::clone(&counter)
            .apply(Arc::clone(&applicable))
            .unwrap();

        assert_eq!(counter.value(), 2);
        assert!(Arc::ptr_eq(&ctx.target(), &counter));
        assert!(Arc::ptr_eq(&ctx.applied(), &applicable));
        assert_eq!(ctx.state(), State::Running);
    }

    #[test]
    fn test_delegated_apply_starts_independent_context() {
        let counter = Arc::new(Counter::new("c"));
        let holder = StaticTargetHolder::new(Arc::clone(&counter));

        let first = holder
            .apply(Arc::new(applicable::from_fn(
                |ctx: &dyn ApplicationContext<Counter>| {
                    ctx.target().add(1);
                    Ok(())
                },
            )))
            .unwrap();
        let second = first
            .apply(Arc::new(applicable::from_fn(
                |ctx: &dyn ApplicationContext<Counter>| {
                    ctx.target().add(10);
                    Ok(())
                },
            )))
            .unwrap();

        first.finish().unwrap();
        assert!(first.is_finished());
        assert!(second.is_running());
        assert_eq!(counter.value(), 11);
    }
}
