use crate::{
    core::{teardown::run_cleanup, Cell, CellKind, CommitTask, EffectCell, FiberId, RenderResult, ResourceFiber},
    deps::deps_changed,
    instrumentation::{emit, EmitOnDrop},
    EffectError, TapError,
};


impl<R: 'static, P: 'static> ResourceFiber<R, P> {
    /// Applies a render result: runs or skips each planned effect in order.
    ///
    /// Returns the output of the render.
    ///
    /// # Panics
    ///
    /// Panics if `result` was rendered by another fiber.
    pub fn commit(&mut self, result: RenderResult<R, P>) -> Result<R, TapError> {
        let RenderResult {
            fiber,
            output,
            props,
            tasks,
        } = result;
        if fiber != self.shared.id {
            panic!("render result of {fiber} committed to {}", self.shared.id);
        }
        self.shared.committed.set(true);
        self.props = Some(props);
        for cell in &self.cells {
            if let Cell::State(state) = cell {
                state.commit();
            }
        }
        commit_effects(fiber, &mut self.cells, tasks)?;
        Ok(output)
    }
}

fn effect_cell(fiber: FiberId, cells: &mut [Cell], index: usize) -> Result<&mut EffectCell, TapError> {
    match cells.get_mut(index) {
        Some(Cell::Effect(cell)) => Ok(cell),
        stored => Err(TapError::CellShape {
            fiber,
            index,
            requested: CellKind::Effect,
            stored: stored.map(|cell| cell.kind()),
        }),
    }
}

/// Runs or skips each task in the order given.
///
/// Every task is checked before any effect runs,
/// so a shape violation leaves all effect cells untouched.
pub(crate) fn commit_effects(
    fiber: FiberId,
    cells: &mut [Cell],
    tasks: Vec<CommitTask>,
) -> Result<(), TapError> {
    tracing::debug!(%fiber, tasks = tasks.len(), "commit");
    emit(|i| i.on_commit_start(fiber));
    let _end = EmitOnDrop::new(move |i| i.on_commit_end(fiber));

    let mut plan = Vec::with_capacity(tasks.len());
    for task in tasks {
        let index = task.cell_index;
        let cell = effect_cell(fiber, cells, index)?;
        let run = deps_changed(cell.deps.as_ref(), task.deps.as_ref());
        if run && cell.mounted && cell.deps.is_some() != task.deps.is_some() {
            return Err(TapError::DepsShape { fiber, index });
        }
        plan.push((task, run));
    }

    for (task, run) in plan {
        let CommitTask {
            cell_index: index,
            effect,
            deps,
        } = task;
        if !run {
            emit(|i| i.on_effect_skipped(fiber, index));
            continue;
        }
        let cell = effect_cell(fiber, cells, index)?;
        if cell.mounted {
            cell.mounted = false;
            if let Some(cleanup) = cell.cleanup.take() {
                run_cleanup(fiber, index, cleanup)?;
            }
        }

        let returned = {
            emit(|i| i.on_effect_run_start(fiber, index));
            let _end = EmitOnDrop::new(|i| i.on_effect_run_end(fiber, index));
            effect()
        };
        let cleanup = returned.map_err(|e| match e {
            EffectError::InvalidReturn { received } => TapError::InvalidEffectReturn {
                fiber,
                index,
                received,
            },
            EffectError::Failed(source) => TapError::Effect {
                fiber,
                index,
                source,
            },
        })?;
        cell.mounted = true;
        cell.cleanup = cleanup;
        cell.deps = deps;
    }

    Ok(())
}
