//! Foreign values as targets
//!
//! A type that cannot implement [`Target`] (it lives in another crate, or
//! its applications need a translation step) is paired with a
//! [`TargetAdapter`]. The resulting [`Adapted`] exposes the untouched
//! foreign value through [`Adapted::target`] and routes every application
//! through the adapter, which decides what `Target` actually receives it.

use super::Target;
use crate::applicable::ApplicableRef;
use crate::context::Applied;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Translates applications on a foreign value `O` into applications on a target
pub trait TargetAdapter<O>: Send + Sync + 'static {
    /// Target the applications end up on
    type Target: Target;

    /// Apply `applicable` on behalf of `foreign`
    fn apply(&self, foreign: &O, applicable: ApplicableRef<Self::Target>) -> Applied<Self::Target>;

    /// Pair `foreign` with this adapter
    fn adapt(self, foreign: O) -> Adapted<O, Self>
    where
        Self: Sized,
    {
        Adapted::new(foreign, Arc::new(self))
    }
}

/// A foreign value paired with the adapter that applies on its behalf
///
/// `Adapted` is not itself a [`Target`] and does not implement
/// [`DelegatedTarget`](super::DelegatedTarget), so it cannot be placed in a
/// holder. Contexts started through it are bound to the adapter's
/// `A::Target`: `ctx.target()` returns that target, never the foreign `O`.
/// Behavior that needs the foreign value must reach it through the adapter,
/// which receives `&O` on every [`apply`](Self::apply).
pub struct Adapted<O, A> {
    foreign: O,
    adapter: Arc<A>,
}

impl<O, A: TargetAdapter<O>> Adapted<O, A> {
    /// Pair `foreign` with a shared adapter
    pub fn new(foreign: O, adapter: Arc<A>) -> Self {
        Self { foreign, adapter }
    }

    /// The foreign value, as given
    pub fn target(&self) -> &O {
        &self.foreign
    }

    /// Adapter applications are routed through
    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    /// Take the foreign value back
    pub fn into_inner(self) -> O {
        self.foreign
    }

    /// Start an application through the adapter
    pub fn apply(&self, applicable: ApplicableRef<A::Target>) -> Applied<A::Target> {
        self.adapter.apply(&self.foreign, applicable)
    }
}

impl<O: Clone, A> Clone for Adapted<O, A> {
    fn clone(&self) -> Self {
        Self {
            foreign: self.foreign.clone(),
            adapter: Arc::clone(&self.adapter),
        }
    }
}

impl<O: fmt::Debug, A> fmt::Debug for Adapted<O, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapted")
            .field("target", &self.foreign)
            .field("adapter", &std::any::type_name::<A>())
            .finish()
    }
}

/// Pair `foreign` with `adapter`
pub fn adapt<O, A: TargetAdapter<O>>(foreign: O, adapter: A) -> Adapted<O, A> {
    adapter.adapt(foreign)
}

/// Adapter built from a closure
pub struct FnAdapter<O, T, F> {
    apply: F,
    _types: PhantomData<fn(&O) -> T>,
}

/// Build an adapter from `(foreign, applicable) -> Applied`
pub fn from_fn<O, T, F>(apply: F) -> FnAdapter<O, T, F>
where
    O: 'static,
    T: Target,
    F: Fn(&O, ApplicableRef<T>) -> Applied<T> + Send + Sync + 'static,
{
    FnAdapter {
        apply,
        _types: PhantomData,
    }
}

impl<O, T, F> TargetAdapter<O> for FnAdapter<O, T, F>
where
    O: 'static,
    T: Target,
    F: Fn(&O, ApplicableRef<T>) -> Applied<T> + Send + Sync + 'static,
{
    type Target = T;

    fn apply(&self, foreign: &O, applicable: ApplicableRef<T>) -> Applied<T> {
        (self.apply)(foreign, applicable)
    }
}

impl<O, T, F> fmt::Debug for FnAdapter<O, T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAdapter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applicable;
    use crate::context::ApplicationContext;
    use crate::target::{start_simple, DelegatedTarget};
    use crate::test_utils::{Counter, RecordingAdapter};

    /// Stands in for a type from another crate
    #[derive(Debug, Clone, PartialEq)]
    struct Gauge {
        label: &'static str,
        reading: i64,
    }

    fn bump(by: i64) -> ApplicableRef<Counter> {
        Arc::new(applicable::from_fn(move |ctx: &dyn ApplicationContext<Counter>| {
            ctx.target().add(by);
            Ok(())
        }))
    }

    #[test]
    fn test_target_is_the_foreign_value() {
        let gauge = Gauge {
            label: "g",
            reading: 7,
        };
        let adapted = adapt(gauge.clone(), RecordingAdapter::new(Arc::new(Counter::new("c"))));
        assert_eq!(adapted.target(), &gauge);
        assert_eq!(adapted.clone().into_inner(), gauge);
    }

    #[test]
    fn test_apply_routes_through_adapter() {
        let counter = Arc::new(Counter::new("c"));
        let adapted = adapt(
            Gauge {
                label: "g",
                reading: 7,
            },
            RecordingAdapter::new(Arc::clone(&counter)),
        );

        let applied = bump(3);
        let ctx = adapted.apply(Arc::clone(&applied)).unwrap();

        assert_eq!(counter.value(), 3);
        assert!(Arc::ptr_eq(&ctx.applied(), &applied));
        assert_eq!(adapted.adapter().calls(), vec![r#"Gauge { label: "g", reading: 7 }"#]);
    }

    #[test]
    fn test_context_bound_to_adapter_target() {
        let counter = Arc::new(Counter::new("c"));
        let adapted = adapt(
            Gauge {
                label: "g",
                reading: 7,
            },
            RecordingAdapter::new(Arc::clone(&counter)),
        );

        let ctx = adapted.apply(bump(1)).unwrap();
        assert!(Arc::ptr_eq(&ctx.target(), &counter));
        assert!(Arc::ptr_eq(&ctx.target_holder().target(), &counter));
        assert_eq!(adapted.target().label, "g");
    }

    #[test]
    fn test_fn_adapter_builds_target_from_foreign() {
        let adapter = from_fn(|gauge: &Gauge, applicable: ApplicableRef<Counter>| {
            let counter = Arc::new(Counter::new(gauge.label));
            counter.add(gauge.reading);
            start_simple(counter, applicable)
        });
        let adapted = adapter.adapt(Gauge {
            label: "g",
            reading: 40,
        });

        let ctx = adapted.apply(bump(2)).unwrap();
        assert_eq!(ctx.target().value(), 42);
        assert_eq!(ctx.target().name(), "g");
        assert_eq!(adapted.target().reading, 40);
    }

    #[test]
    fn test_shared_adapter_across_values() {
        let counter = Arc::new(Counter::new("c"));
        let adapter = Arc::new(RecordingAdapter::new(Arc::clone(&counter)));
        let first = Adapted::new(1_u8, Arc::clone(&adapter));
        let second = Adapted::new(2_u8, Arc::clone(&adapter));

        first.apply(bump(1)).unwrap();
        second.apply(bump(1)).unwrap();
        assert_eq!(counter.value(), 2);
        assert_eq!(adapter.calls(), vec!["1", "2"]);
    }
}
