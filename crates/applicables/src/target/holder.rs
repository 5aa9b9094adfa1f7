//! Target holders
//!
//! A holder owns exactly one `Arc<T>` and forwards target calls to it. The
//! set of holders is closed: [`StaticTargetHolder`] (fixed target),
//! [`DynamicTargetHolder`] (swappable, lock-guarded target) and
//! [`DelegatedTargetHolder`] (forwards to an inner holder and traces every
//! read and write). Composition happens by wrapping, not by implementing the
//! holder traits.
//!
//! A holder's target is never absent once it exists: the fallible
//! constructors and [`MutableTargetHolder::set_target`] reject `None` before
//! touching any state.

use super::{DelegatedTarget, Target};
use crate::applicable::ApplicableRef;
use crate::context::Applied;
use crate::{ApplicationError, Result};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

mod sealed {
    pub trait Sealed {}
}

/// Shared handle to any holder
pub type HolderRef<T> = Arc<dyn TargetHolder<T>>;

/// Owner of a single target reference
pub trait TargetHolder<T: Target>: DelegatedTarget<T> + sealed::Sealed + Send + Sync {}

/// Holder whose target can be replaced at runtime
pub trait MutableTargetHolder<T: Target>: TargetHolder<T> {
    /// Replace the target; `None` is rejected and leaves the holder untouched
    fn set_target(&self, target: Option<Arc<T>>) -> Result<()>;

    /// Replace the target and return the previous one
    fn replace(&self, target: Arc<T>) -> Arc<T>;
}

fn require_present<T>(target: Option<Arc<T>>) -> Result<Arc<T>> {
    target.ok_or_else(|| ApplicationError::invalid("target must be present"))
}

/// Hold `target` immutably; fails with `Invalid` if it is absent
pub fn of_immutable<T: Target>(target: impl Into<Option<Arc<T>>>) -> Result<StaticTargetHolder<T>> {
    StaticTargetHolder::try_new(target)
}

/// Hold `target` behind a lock so it can be swapped; fails with `Invalid` if absent
pub fn of_mutable<T: Target>(target: impl Into<Option<Arc<T>>>) -> Result<DynamicTargetHolder<T>> {
    DynamicTargetHolder::try_new(target)
}

/// Holder with a target fixed at construction
pub struct StaticTargetHolder<T> {
    target: Arc<T>,
}

impl<T: Target> StaticTargetHolder<T> {
    /// Hold `target`
    pub fn new(target: Arc<T>) -> Self {
        Self { target }
    }

    /// Hold `target`, rejecting an absent value
    pub fn try_new(target: impl Into<Option<Arc<T>>>) -> Result<Self> {
        require_present(target.into()).map(Self::new)
    }
}

impl<T> Clone for StaticTargetHolder<T> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StaticTargetHolder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTargetHolder")
            .field("target", &self.target)
            .finish()
    }
}

impl<T> sealed::Sealed for StaticTargetHolder<T> {}

impl<T: Target> DelegatedTarget<T> for StaticTargetHolder<T> {
    fn target(&self) -> Arc<T> {
        Arc::clone(&self.target)
    }
}

impl<T: Target> TargetHolder<T> for StaticTargetHolder<T> {}

/// Holder with a swappable target
///
/// Every read and write takes the same mutex for the duration of that call
/// only. A read followed by a dependent write is not atomic; callers that
/// need that must coordinate themselves.
pub struct DynamicTargetHolder<T> {
    target: Mutex<Arc<T>>,
}

impl<T: Target> DynamicTargetHolder<T> {
    /// Hold `target`
    pub fn new(target: Arc<T>) -> Self {
        Self {
            target: Mutex::new(target),
        }
    }

    /// Hold `target`, rejecting an absent value
    pub fn try_new(target: impl Into<Option<Arc<T>>>) -> Result<Self> {
        require_present(target.into()).map(Self::new)
    }
}

impl<T: fmt::Debug> fmt::Debug for DynamicTargetHolder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicTargetHolder")
            .field("target", &*self.target.lock())
            .finish()
    }
}

impl<T> sealed::Sealed for DynamicTargetHolder<T> {}

impl<T: Target> DelegatedTarget<T> for DynamicTargetHolder<T> {
    fn target(&self) -> Arc<T> {
        Arc::clone(&self.target.lock())
    }
}

impl<T: Target> TargetHolder<T> for DynamicTargetHolder<T> {}

impl<T: Target> MutableTargetHolder<T> for DynamicTargetHolder<T> {
    fn set_target(&self, target: Option<Arc<T>>) -> Result<()> {
        let target = require_present(target)?;
        let previous = std::mem::replace(&mut *self.target.lock(), target);
        // The old target may run arbitrary drop code; release it outside the lock.
        drop(previous);
        Ok(())
    }

    fn replace(&self, target: Arc<T>) -> Arc<T> {
        std::mem::replace(&mut *self.target.lock(), target)
    }
}

/// Holder that forwards to an inner holder
///
/// Each read, write and application is traced at `trace` level under the
/// holder's label before being forwarded.
pub struct DelegatedTargetHolder<H> {
    inner: H,
    label: Cow<'static, str>,
}

impl<H> DelegatedTargetHolder<H> {
    /// Wrap `inner`, tracing under `label`
    pub fn new(inner: H, label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner,
            label: label.into(),
        }
    }

    /// Holder calls are forwarded to
    pub fn target_holder(&self) -> &H {
        &self.inner
    }

    /// Label used in trace events
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Unwrap the inner holder
    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: fmt::Debug> fmt::Debug for DelegatedTargetHolder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedTargetHolder")
            .field("label", &self.label)
            .field("inner", &self.inner)
            .finish()
    }
}

impl<H> sealed::Sealed for DelegatedTargetHolder<H> {}

impl<T: Target, H: TargetHolder<T>> DelegatedTarget<T> for DelegatedTargetHolder<H> {
    fn target(&self) -> Arc<T> {
        trace!(holder = %self.label, "target read");
        self.inner.target()
    }

    fn apply(&self, applicable: ApplicableRef<T>) -> Applied<T> {
        trace!(holder = %self.label, "application forwarded");
        self.inner.apply(applicable)
    }
}

impl<T: Target, H: TargetHolder<T>> TargetHolder<T> for DelegatedTargetHolder<H> {}

impl<T: Target, H: MutableTargetHolder<T>> MutableTargetHolder<T> for DelegatedTargetHolder<H> {
    fn set_target(&self, target: Option<Arc<T>>) -> Result<()> {
        trace!(holder = %self.label, present = target.is_some(), "target write");
        self.inner.set_target(target)
    }

    fn replace(&self, target: Arc<T>) -> Arc<T> {
        trace!(holder = %self.label, "target replace");
        self.inner.replace(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Counter;
    use assert_matches::assert_matches;

    #[test]
    fn test_absent_target_rejected() {
        assert_matches!(
            of_immutable::<Counter>(None),
            Err(ApplicationError::Invalid { .. })
        );
        assert_matches!(
            of_mutable::<Counter>(None),
            Err(ApplicationError::Invalid { .. })
        );
    }

    #[test]
    fn test_static_holder_resolves_same_target() {
        let counter = Arc::new(Counter::new("a"));
        let holder = of_immutable(Arc::clone(&counter)).unwrap();
        assert!(Arc::ptr_eq(&holder.target(), &counter));
        assert!(Arc::ptr_eq(&holder.clone().target(), &counter));
    }

    #[test]
    fn test_set_target_rejects_none_without_mutation() {
        let a = Arc::new(Counter::new("a"));
        let holder = of_mutable(Arc::clone(&a)).unwrap();

        let err = holder.set_target(None).unwrap_err();
        assert_matches!(err, ApplicationError::Invalid { .. });
        assert!(Arc::ptr_eq(&holder.target(), &a));
    }

    #[test]
    fn test_set_and_replace() {
        let a = Arc::new(Counter::new("a"));
        let b = Arc::new(Counter::new("b"));
        let holder = DynamicTargetHolder::new(Arc::clone(&a));

        holder.set_target(Some(Arc::clone(&b))).unwrap();
        assert!(Arc::ptr_eq(&holder.target(), &b));

        let previous = holder.replace(Arc::clone(&a));
        assert!(Arc::ptr_eq(&previous, &b));
        assert!(Arc::ptr_eq(&holder.target(), &a));
    }

    #[test]
    fn test_delegated_forwards_to_inner() {
        let a = Arc::new(Counter::new("a"));
        let b = Arc::new(Counter::new("b"));
        let holder = DelegatedTargetHolder::new(DynamicTargetHolder::new(Arc::clone(&a)), "traced");

        assert_eq!(holder.label(), "traced");
        assert!(Arc::ptr_eq(&holder.target(), &a));

        holder.set_target(Some(Arc::clone(&b))).unwrap();
        assert!(Arc::ptr_eq(&holder.target_holder().target(), &b));
        assert_matches!(holder.set_target(None), Err(ApplicationError::Invalid { .. }));
        assert!(Arc::ptr_eq(&holder.into_inner().target(), &b));
    }

    #[test]
    fn test_holders_as_trait_objects() {
        let a = Arc::new(Counter::new("a"));
        let holders: Vec<HolderRef<Counter>> = vec![
            Arc::new(StaticTargetHolder::new(Arc::clone(&a))),
            Arc::new(DynamicTargetHolder::new(Arc::clone(&a))),
            Arc::new(DelegatedTargetHolder::new(
                StaticTargetHolder::new(Arc::clone(&a)),
                "nested",
            )),
        ];
        for holder in holders {
            assert!(Arc::ptr_eq(&holder.target(), &a));
        }
    }
}
