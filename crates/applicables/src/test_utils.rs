//! Recording targets, capabilities and adapters for tests

#![allow(missing_docs)]

use crate::applicable::ApplicableRef;
use crate::capability::{Capability, Completion};
use crate::context::{ApplicationContext, Applied};
use crate::target::adapter::TargetAdapter;
use crate::target::{start_simple, Target};
use crate::{ApplicationError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Named integer target
pub struct Counter {
    name: String,
    value: AtomicI64,
}

impl Counter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicI64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&self, amount: i64) {
        self.value.fetch_add(amount, Ordering::SeqCst);
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }
}

impl Target for Counter {
    fn apply(self: Arc<Self>, applicable: ApplicableRef<Self>) -> Applied<Self> {
        start_simple(self, applicable)
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("name", &self.name)
            .field("value", &self.value())
            .finish()
    }
}

/// Shared, ordered record of events
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.lock().iter()).finish()
    }
}

/// Capability that logs `apply:<name>` and `finish:<name>`
///
/// Either phase can be switched to fail with `Failed { message }` carrying
/// the same entry it logs.
#[derive(Debug)]
pub struct RecordingCapability {
    name: String,
    log: EventLog,
    completion: Completion,
    fail_apply: bool,
    fail_finish: bool,
    applies: AtomicUsize,
    finishes: AtomicUsize,
}

impl RecordingCapability {
    pub fn new(name: impl Into<String>, log: &EventLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            completion: Completion::Deferred,
            fail_apply: false,
            fail_finish: false,
            applies: AtomicUsize::new(0),
            finishes: AtomicUsize::new(0),
        }
    }

    pub fn instant(mut self) -> Self {
        self.completion = Completion::Instant;
        self
    }

    pub fn failing_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    pub fn failing_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }

    pub fn apply_count(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }

    pub fn finish_count(&self) -> usize {
        self.finishes.load(Ordering::SeqCst)
    }

    fn record(&self, phase: &str, fail: bool) -> Result<()> {
        let entry = format!("{phase}:{}", self.name);
        self.log.push(entry.clone());
        if fail {
            Err(ApplicationError::failed(entry))
        } else {
            Ok(())
        }
    }
}

impl<T: Target> Capability<T> for RecordingCapability {
    fn on_apply(&self, _ctx: &dyn ApplicationContext<T>) -> Result<()> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        self.record("apply", self.fail_apply)
    }

    fn on_finish(&self, _ctx: &dyn ApplicationContext<T>) -> Result<()> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        self.record("finish", self.fail_finish)
    }

    fn completion(&self) -> Completion {
        self.completion
    }
}

/// Adapter that records each foreign value it applies for, then applies to a
/// fixed counter
#[derive(Debug)]
pub struct RecordingAdapter {
    target: Arc<Counter>,
    calls: Mutex<Vec<String>>,
}

impl RecordingAdapter {
    pub fn new(target: Arc<Counter>) -> Self {
        Self {
            target,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `Debug` renderings of the foreign values, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl<O: fmt::Debug + 'static> TargetAdapter<O> for RecordingAdapter {
    type Target = Counter;

    fn apply(&self, foreign: &O, applicable: ApplicableRef<Counter>) -> Applied<Counter> {
        self.calls.lock().push(format!("{foreign:?}"));
        start_simple(Arc::clone(&self.target), applicable)
    }
}
