//! Reference application context

use super::{ApplicationContext, Applied, ApplyFailure, ContextRef, FinishHook, State};
use crate::applicable::ApplicableRef;
use crate::config::{
    ContextConfig, HookFailurePolicy, LateHookPolicy, RepeatFinishPolicy, MAX_INITIAL_HOOK_CAPACITY,
};
use crate::target::holder::HolderRef;
use crate::target::{DelegatedTarget, Target};
use crate::{ApplicationError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    /// `finish()` is draining hooks; reported as running
    Finishing,
    Finished,
}

struct Lifecycle<T: Target> {
    phase: Phase,
    hooks: Vec<FinishHook<T>>,
    registered: usize,
}

/// Context binding an applicable to a target holder
///
/// Hooks and lifecycle state sit behind one mutex that is never held while
/// caller code runs, so hooks may register further hooks or inspect the
/// context. Hooks registered while finishing run in the same `finish()`
/// call, after the hooks already queued.
pub struct SimpleApplicationContext<T: Target> {
    applied: ApplicableRef<T>,
    target_holder: HolderRef<T>,
    config: ContextConfig,
    lifecycle: Mutex<Lifecycle<T>>,
}

impl<T: Target> SimpleApplicationContext<T> {
    /// Create a running context without applying anything
    pub fn new(applied: ApplicableRef<T>, target_holder: HolderRef<T>) -> Self {
        Self::with_config(applied, target_holder, ContextConfig::default())
    }

    /// Create a running context with explicit configuration
    pub fn with_config(
        applied: ApplicableRef<T>,
        target_holder: HolderRef<T>,
        config: ContextConfig,
    ) -> Self {
        let lifecycle = Lifecycle {
            phase: Phase::Running,
            hooks: Vec::with_capacity(config.initial_hook_capacity.min(MAX_INITIAL_HOOK_CAPACITY)),
            registered: 0,
        };
        Self {
            applied,
            target_holder,
            config,
            lifecycle: Mutex::new(lifecycle),
        }
    }

    /// Create a context and run `applied` in it before returning
    pub fn start(applied: ApplicableRef<T>, target_holder: HolderRef<T>) -> Applied<T> {
        Self::start_with_config(applied, target_holder, ContextConfig::default())
    }

    /// Create a context with explicit configuration and run `applied` in it
    pub fn start_with_config(
        applied: ApplicableRef<T>,
        target_holder: HolderRef<T>,
        config: ContextConfig,
    ) -> Applied<T> {
        let context = Arc::new(Self::with_config(
            Arc::clone(&applied),
            target_holder,
            config,
        ));
        debug!(target_type = std::any::type_name::<T>(), "application started");

        match applied.apply(&*context) {
            Ok(()) => Ok(context),
            Err(error) => {
                warn!(%error, "application failed while starting");
                let context: ContextRef<T> = context;
                Err(ApplyFailure::new(context, error))
            }
        }
    }

    /// Configuration this context runs under
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Number of hooks waiting to run
    pub fn pending_hooks(&self) -> usize {
        self.lifecycle.lock().hooks.len()
    }

    fn run_hooks(&self) -> Result<()> {
        let this: &dyn ApplicationContext<T> = self;
        let mut failures = Vec::new();
        loop {
            let batch = std::mem::take(&mut self.lifecycle.lock().hooks);
            if batch.is_empty() {
                break;
            }
            for hook in batch {
                if let Err(error) = hook(this) {
                    warn!(%error, policy = %self.config.hook_failure, "finish hook failed");
                    match self.config.hook_failure {
                        HookFailurePolicy::Abort => return Err(error),
                        HookFailurePolicy::Isolate => failures.push(error),
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ApplicationError::HooksFailed { failures })
        }
    }
}

/// Marks the lifecycle finished on every exit from `finish()`
struct MarkFinished<'a, T: Target> {
    lifecycle: &'a Mutex<Lifecycle<T>>,
}

impl<T: Target> Drop for MarkFinished<'_, T> {
    fn drop(&mut self) {
        let skipped = {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.phase = Phase::Finished;
            std::mem::take(&mut lifecycle.hooks)
        };
        if !skipped.is_empty() {
            debug!(skipped = skipped.len(), "finish hooks skipped");
        }
        debug!("application finished");
    }
}

impl<T: Target> DelegatedTarget<T> for SimpleApplicationContext<T> {
    fn target(&self) -> Arc<T> {
        self.target_holder.target()
    }

    fn apply(&self, applicable: ApplicableRef<T>) -> Applied<T> {
        self.target_holder.apply(applicable)
    }
}

impl<T: Target> ApplicationContext<T> for SimpleApplicationContext<T> {
    fn state(&self) -> State {
        match self.lifecycle.lock().phase {
            Phase::Running | Phase::Finishing => State::Running,
            Phase::Finished => State::Finished,
        }
    }

    fn applied(&self) -> ApplicableRef<T> {
        Arc::clone(&self.applied)
    }

    fn target_holder(&self) -> HolderRef<T> {
        Arc::clone(&self.target_holder)
    }

    fn add_finish_hook(&self, hook: FinishHook<T>) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.phase == Phase::Finished {
            drop(lifecycle);
            return match self.config.late_hook {
                LateHookPolicy::Reject => {
                    warn!("finish hook added after finish");
                    Err(ApplicationError::already_finished("add finish hook"))
                }
                LateHookPolicy::Ignore => {
                    trace!("late finish hook ignored");
                    Ok(())
                }
            };
        }

        if let Some(limit) = self.config.max_finish_hooks {
            if lifecycle.registered >= limit {
                return Err(ApplicationError::HookLimit { limit });
            }
        }
        lifecycle.hooks.push(hook);
        lifecycle.registered += 1;
        trace!(registered = lifecycle.registered, "finish hook added");
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            let phase = lifecycle.phase;
            match phase {
                Phase::Running => lifecycle.phase = Phase::Finishing,
                Phase::Finishing => {
                    trace!("finish requested while finishing");
                    return Ok(());
                }
                Phase::Finished => {
                    drop(lifecycle);
                    return match self.config.repeat_finish {
                        RepeatFinishPolicy::Ignore => Ok(()),
                        RepeatFinishPolicy::Reject => {
                            warn!("finish called on a finished context");
                            Err(ApplicationError::already_finished("finish"))
                        }
                    };
                }
            }
        }

        let _finished = MarkFinished {
            lifecycle: &self.lifecycle,
        };
        self.run_hooks()
    }
}

impl<T: Target> fmt::Debug for SimpleApplicationContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.lifecycle.lock();
        f.debug_struct("SimpleApplicationContext")
            .field("target_type", &std::any::type_name::<T>())
            .field("phase", &lifecycle.phase)
            .field("pending_hooks", &lifecycle.hooks.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
