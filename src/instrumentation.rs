use std::{
    cell::RefCell,
    mem::take,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

use parse_display::Display;
use serde::Serialize;

use crate::core::FiberId;


thread_local! {
    static INSTRUMENTATION: RefCell<Option<Rc<dyn TapInstrumentation>>> = const { RefCell::new(None) };
}

/// Lifecycle callbacks observed around render, commit and cleanup.
///
/// All methods default to doing nothing. Callbacks run synchronously on the stack of the
/// instrumented operation and must not change its outcome.
/// A panicking callback is caught and discarded.
pub trait TapInstrumentation {
    fn on_render_start(&self, fiber: FiberId) {
        let _ = fiber;
    }
    fn on_render_end(&self, fiber: FiberId) {
        let _ = fiber;
    }
    fn on_commit_start(&self, fiber: FiberId) {
        let _ = fiber;
    }
    fn on_commit_end(&self, fiber: FiberId) {
        let _ = fiber;
    }
    fn on_effect_run_start(&self, fiber: FiberId, cell: usize) {
        let _ = (fiber, cell);
    }
    fn on_effect_run_end(&self, fiber: FiberId, cell: usize) {
        let _ = (fiber, cell);
    }
    fn on_effect_skipped(&self, fiber: FiberId, cell: usize) {
        let _ = (fiber, cell);
    }
    fn on_effect_cleanup_start(&self, fiber: FiberId, cell: usize) {
        let _ = (fiber, cell);
    }
    fn on_effect_cleanup_end(&self, fiber: FiberId, cell: usize) {
        let _ = (fiber, cell);
    }
}

/// Replaces the instrumentation of the current thread.
///
/// The previous instrumentation is discarded, not stacked.
/// Pass `None` to disable instrumentation.
pub fn set_tap_instrumentation(value: Option<Rc<dyn TapInstrumentation>>) {
    INSTRUMENTATION.with(|slot| *slot.borrow_mut() = value);
}

/// Returns the instrumentation of the current thread.
pub fn tap_instrumentation() -> Option<Rc<dyn TapInstrumentation>> {
    INSTRUMENTATION
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

pub(crate) fn emit(f: impl FnOnce(&dyn TapInstrumentation)) {
    let Some(instrumentation) = tap_instrumentation() else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| f(&*instrumentation))).is_err() {
        tracing::warn!("instrumentation callback panicked; ignored");
    }
}

/// Emits an event when dropped, including during unwinding.
pub(crate) struct EmitOnDrop<F: FnOnce(&dyn TapInstrumentation)>(Option<F>);

impl<F: FnOnce(&dyn TapInstrumentation)> EmitOnDrop<F> {
    pub fn new(f: F) -> Self {
        Self(Some(f))
    }
}
impl<F: FnOnce(&dyn TapInstrumentation)> Drop for EmitOnDrop<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            emit(f);
        }
    }
}

/// Sets the instrumentation of the current thread while alive, and restores the previous one on drop.
#[must_use]
pub struct InstrumentationScope {
    previous: Option<Rc<dyn TapInstrumentation>>,
}

impl InstrumentationScope {
    pub fn new(value: Rc<dyn TapInstrumentation>) -> Self {
        let previous = tap_instrumentation();
        set_tap_instrumentation(Some(value));
        Self { previous }
    }
}
impl Drop for InstrumentationScope {
    fn drop(&mut self) {
        set_tap_instrumentation(self.previous.take());
    }
}

/// Instrumentation event recorded by [`EventLog`].
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TapEvent {
    #[display("render:start")]
    RenderStart { fiber: FiberId },
    #[display("render:end")]
    RenderEnd { fiber: FiberId },
    #[display("commit:start")]
    CommitStart { fiber: FiberId },
    #[display("commit:end")]
    CommitEnd { fiber: FiberId },
    #[display("effect:run:start:{cell}")]
    EffectRunStart { fiber: FiberId, cell: usize },
    #[display("effect:run:end:{cell}")]
    EffectRunEnd { fiber: FiberId, cell: usize },
    #[display("effect:skipped:{cell}")]
    EffectSkipped { fiber: FiberId, cell: usize },
    #[display("cleanup:start:{cell}")]
    EffectCleanupStart { fiber: FiberId, cell: usize },
    #[display("cleanup:end:{cell}")]
    EffectCleanupEnd { fiber: FiberId, cell: usize },
}

impl TapEvent {
    pub fn fiber(&self) -> FiberId {
        match *self {
            TapEvent::RenderStart { fiber }
            | TapEvent::RenderEnd { fiber }
            | TapEvent::CommitStart { fiber }
            | TapEvent::CommitEnd { fiber }
            | TapEvent::EffectRunStart { fiber, .. }
            | TapEvent::EffectRunEnd { fiber, .. }
            | TapEvent::EffectSkipped { fiber, .. }
            | TapEvent::EffectCleanupStart { fiber, .. }
            | TapEvent::EffectCleanupEnd { fiber, .. } => fiber,
        }
    }
}

/// Instrumentation that records every event in memory.
#[derive(Debug, Default)]
pub struct EventLog(RefCell<Vec<TapEvent>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn events(&self) -> Vec<TapEvent> {
        self.0.borrow().clone()
    }
    pub fn take(&self) -> Vec<TapEvent> {
        take(&mut *self.0.borrow_mut())
    }
    /// Drains the recorded events as their display labels, such as `"effect:run:start:0"`.
    pub fn take_labels(&self) -> Vec<String> {
        self.take().iter().map(|e| e.to_string()).collect()
    }
    fn push(&self, event: TapEvent) {
        self.0.borrow_mut().push(event);
    }
}

impl TapInstrumentation for EventLog {
    fn on_render_start(&self, fiber: FiberId) {
        self.push(TapEvent::RenderStart { fiber });
    }
    fn on_render_end(&self, fiber: FiberId) {
        self.push(TapEvent::RenderEnd { fiber });
    }
    fn on_commit_start(&self, fiber: FiberId) {
        self.push(TapEvent::CommitStart { fiber });
    }
    fn on_commit_end(&self, fiber: FiberId) {
        self.push(TapEvent::CommitEnd { fiber });
    }
    fn on_effect_run_start(&self, fiber: FiberId, cell: usize) {
        self.push(TapEvent::EffectRunStart { fiber, cell });
    }
    fn on_effect_run_end(&self, fiber: FiberId, cell: usize) {
        self.push(TapEvent::EffectRunEnd { fiber, cell });
    }
    fn on_effect_skipped(&self, fiber: FiberId, cell: usize) {
        self.push(TapEvent::EffectSkipped { fiber, cell });
    }
    fn on_effect_cleanup_start(&self, fiber: FiberId, cell: usize) {
        self.push(TapEvent::EffectCleanupStart { fiber, cell });
    }
    fn on_effect_cleanup_end(&self, fiber: FiberId, cell: usize) {
        self.push(TapEvent::EffectCleanupEnd { fiber, cell });
    }
}

/// Instrumentation that forwards every event to `tracing` at `TRACE` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingInstrumentation;

impl TapInstrumentation for TracingInstrumentation {
    fn on_render_start(&self, fiber: FiberId) {
        tracing::trace!(%fiber, "render start");
    }
    fn on_render_end(&self, fiber: FiberId) {
        tracing::trace!(%fiber, "render end");
    }
    fn on_commit_start(&self, fiber: FiberId) {
        tracing::trace!(%fiber, "commit start");
    }
    fn on_commit_end(&self, fiber: FiberId) {
        tracing::trace!(%fiber, "commit end");
    }
    fn on_effect_run_start(&self, fiber: FiberId, cell: usize) {
        tracing::trace!(%fiber, cell, "effect run start");
    }
    fn on_effect_run_end(&self, fiber: FiberId, cell: usize) {
        tracing::trace!(%fiber, cell, "effect run end");
    }
    fn on_effect_skipped(&self, fiber: FiberId, cell: usize) {
        tracing::trace!(%fiber, cell, "effect skipped");
    }
    fn on_effect_cleanup_start(&self, fiber: FiberId, cell: usize) {
        tracing::trace!(%fiber, cell, "cleanup start");
    }
    fn on_effect_cleanup_end(&self, fiber: FiberId, cell: usize) {
        tracing::trace!(%fiber, cell, "cleanup end");
    }
}
