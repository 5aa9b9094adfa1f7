//! Applicables - two-phase behavior attached to targets
//!
//! A caller attaches a reusable unit of behavior to a *target* and tracks the
//! attachment through a short-lived *application context*. The context is
//! born running, collects finish hooks, and finishes exactly once, running
//! the hooks in the order they were registered.
//!
//! # Architecture
//!
//! - [`Target`]: anything that accepts applications; generic contracts are
//!   parameterized over `T: Target`
//! - [`target::holder`]: sealed owners of a target reference, immutable,
//!   lock-guarded mutable, or traced delegating wrappers
//! - [`target::adapter`]: lets a foreign value route applications through a
//!   [`TargetAdapter`] without implementing [`Target`] itself
//! - [`Applicable`]: single-phase behavior run against a context
//! - [`Capability`]: behavior split into `on_apply` and a deferred
//!   `on_finish`, with instant and delegating variants
//! - [`ApplicationContext`]: lifecycle record; [`SimpleApplicationContext`]
//!   is the reference implementation, tuned by [`ContextConfig`]
//!
//! # Example
//!
//! ```
//! use applicables::prelude::*;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Debug, Default)]
//! struct Door {
//!     opened: AtomicUsize,
//! }
//!
//! impl Target for Door {
//!     fn apply(self: Arc<Self>, applicable: ApplicableRef<Self>) -> Applied<Self> {
//!         start_simple(self, applicable)
//!     }
//! }
//!
//! let door = Arc::new(Door::default());
//! let open = capability::of::<Door, _, _>(
//!     |ctx| {
//!         ctx.target().opened.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     },
//!     |ctx| {
//!         ctx.target().opened.fetch_sub(1, Ordering::SeqCst);
//!         Ok(())
//!     },
//! );
//!
//! let ctx = Arc::clone(&door).apply(Arc::new(open).into_applicable())?;
//! assert_eq!(door.opened.load(Ordering::SeqCst), 1);
//! assert!(ctx.is_running());
//!
//! ctx.finish()?;
//! assert_eq!(door.opened.load(Ordering::SeqCst), 0);
//! assert!(ctx.is_finished());
//! # Ok::<(), applicables::ApplicationError>(())
//! ```

#![forbid(unsafe_code)]

/// Single-phase behavior
pub mod applicable;

/// Two-phase behavior and its decorators
pub mod capability;

/// Context configuration
pub mod config;

/// Application contexts and their lifecycle
pub mod context;

/// Unified error handling
pub mod errors;

/// Targets, holders and adapters
pub mod target;

/// Internal test utilities
#[doc(hidden)]
pub mod test_utils;

pub use applicable::{Applicable, ApplicableRef, DelegatedApplicable, FnApplicable};
pub use capability::{
    CapabilityApplicable, Capability, Completion, DelegatedCapability, FnCapability,
    TracedCapability,
};
pub use config::{
    ConfigValidator, ContextConfig, HookFailurePolicy, LateHookPolicy, RepeatFinishPolicy,
    ValidationError,
};
pub use context::{
    hook, ApplicationContext, Applied, ApplyFailure, ContextRef, FinishGuard, FinishHook,
    SimpleApplicationContext, State,
};
pub use errors::{ApplicationError, BoxError, Result};
pub use target::adapter::{adapt, Adapted, FnAdapter, TargetAdapter};
pub use target::holder::{
    DelegatedTargetHolder, DynamicTargetHolder, HolderRef, MutableTargetHolder,
    StaticTargetHolder, TargetHolder,
};
pub use target::{start_simple, DelegatedTarget, Target};

/// Everything needed to implement targets and write capabilities
pub mod prelude {
    pub use crate::capability;
    pub use crate::target::holder;
    pub use crate::{
        adapt, start_simple, Applicable, ApplicableRef, ApplicationContext, ApplicationError,
        Applied, Capability, Completion, DelegatedTarget, MutableTargetHolder, Result, State,
        Target, TargetAdapter, TargetHolder,
    };
}
