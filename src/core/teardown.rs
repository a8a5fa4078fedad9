use std::{
    any::Any,
    panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
};

use crate::{
    core::{Cell, FiberId, ResourceFiber},
    instrumentation::{emit, EmitOnDrop},
    Cleanup, TapError,
};


pub(crate) enum TeardownFailure {
    Error(TapError),
    Panic(Box<dyn Any + Send>),
}

impl<R: 'static, P: 'static> ResourceFiber<R, P> {
    /// Runs the cleanup of every mounted effect, last registered first.
    ///
    /// A failing cleanup does not stop the others.
    /// After all cleanups ran, the first failure is returned (or its panic resumed);
    /// later failures are logged and discarded.
    ///
    /// After teardown, state updates to this fiber are ignored.
    pub fn teardown(&mut self) -> Result<(), TapError> {
        self.shared.disposed.set(true);
        match teardown_effects(self.shared.id, &mut self.cells) {
            Ok(()) => Ok(()),
            Err(TeardownFailure::Error(e)) => Err(e),
            Err(TeardownFailure::Panic(payload)) => resume_unwind(payload),
        }
    }
}

pub(crate) fn run_cleanup(fiber: FiberId, index: usize, cleanup: Cleanup) -> Result<(), TapError> {
    emit(|i| i.on_effect_cleanup_start(fiber, index));
    let _end = EmitOnDrop::new(|i| i.on_effect_cleanup_end(fiber, index));
    cleanup
        .run()
        .map_err(|source| TapError::Cleanup {
            fiber,
            index,
            source,
        })
}

pub(crate) fn teardown_effects(fiber: FiberId, cells: &mut [Cell]) -> Result<(), TeardownFailure> {
    tracing::debug!(%fiber, "teardown");
    let mut first = None;
    for (index, cell) in cells.iter_mut().enumerate().rev() {
        let Cell::Effect(effect) = cell else {
            continue;
        };
        if !effect.mounted {
            continue;
        }
        effect.mounted = false;
        let Some(cleanup) = effect.cleanup.take() else {
            continue;
        };
        let failure = match catch_unwind(AssertUnwindSafe(|| run_cleanup(fiber, index, cleanup))) {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => TeardownFailure::Error(e),
            Err(payload) => TeardownFailure::Panic(payload),
        };
        if first.is_none() {
            first = Some(failure);
        } else {
            tracing::warn!(%fiber, index, "cleanup failed after an earlier failure; discarded");
        }
    }
    match first {
        Some(failure) => Err(failure),
        None => Ok(()),
    }
}
