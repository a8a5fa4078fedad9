use std::{
    any::Any,
    fmt,
    panic::{catch_unwind, panic_any, resume_unwind, AssertUnwindSafe},
    rc::Rc,
};

use crate::{
    core::{Cell, CellKind, FiberId, FiberShared, ResourceFiber},
    instrumentation::{emit, EmitOnDrop},
    Cleanup, Deps, EffectError, TapError,
};

pub(crate) type EffectThunk = Box<dyn FnOnce() -> Result<Option<Cleanup>, EffectError>>;

/// One effect planned by a render, applied by the following commit.
pub struct CommitTask {
    pub(crate) cell_index: usize,
    pub(crate) effect: EffectThunk,
    pub(crate) deps: Option<Deps>,
}
impl CommitTask {
    pub fn cell_index(&self) -> usize {
        self.cell_index
    }
    pub fn deps(&self) -> Option<&Deps> {
        self.deps.as_ref()
    }
}
impl fmt::Debug for CommitTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitTask")
            .field("cell_index", &self.cell_index)
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

/// Output of one render pass.
///
/// Must be passed to [`ResourceFiber::commit`] of the fiber that produced it.
#[must_use]
#[derive(Debug)]
pub struct RenderResult<R, P> {
    pub(crate) fiber: FiberId,
    pub(crate) output: R,
    pub(crate) props: P,
    pub(crate) tasks: Vec<CommitTask>,
}
impl<R, P> RenderResult<R, P> {
    pub fn fiber(&self) -> FiberId {
        self.fiber
    }
    pub fn output(&self) -> &R {
        &self.output
    }
    pub fn props(&self) -> &P {
        &self.props
    }
    pub fn commit_tasks(&self) -> &[CommitTask] {
        &self.tasks
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ContextId(pub u64);

/// Context values visible to a render, innermost first.
pub(crate) struct ContextFrame {
    pub id: ContextId,
    pub value: Rc<dyn Any>,
    pub parent: Option<Rc<ContextFrame>>,
}
impl ContextFrame {
    pub fn find(frame: &Option<Rc<ContextFrame>>, id: ContextId) -> Option<&Rc<dyn Any>> {
        let mut frame = frame.as_ref();
        while let Some(f) = frame {
            if f.id == id {
                return Some(&f.value);
            }
            frame = f.parent.as_ref();
        }
        None
    }
}

struct RenderAbort(TapError);

/// Aborts the current render pass with `e`.
///
/// The error is returned from [`ResourceFiber::render`].
/// Unwinding goes through the panic hook, so the default hook prints a message.
pub(crate) fn raise(e: TapError) -> ! {
    panic_any(RenderAbort(e))
}

/// Aborts the current render pass because cell `index` holds a value that is not a `T`.
pub(crate) fn raise_cell_type<T>(fiber: FiberId, index: usize) -> ! {
    raise(TapError::CellType {
        fiber,
        index,
        requested: std::any::type_name::<T>(),
    })
}

/// Context passed to the render function of a resource.
///
/// Each `tap_*` method claims the next cell of the fiber.
/// A resource must call the same primitives in the same order on every render.
pub struct RenderContext<'a> {
    pub(crate) shared: &'a Rc<FiberShared>,
    cells: &'a mut Vec<Cell>,
    cursor: usize,
    first_render: bool,
    strict_mode: bool,
    pub(crate) tasks: Vec<CommitTask>,
    pub(crate) scope: Option<Rc<ContextFrame>>,
}

impl<'a> RenderContext<'a> {
    pub fn fiber(&self) -> FiberId {
        self.shared.id
    }
    pub fn is_strict_mode(&self) -> bool {
        self.strict_mode
    }

    /// Requests another render after this one, without notifying the host.
    pub(crate) fn mark_dirty(&self) {
        self.shared.dirty.set(true);
    }

    /// Index the next primitive call will claim.
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    /// Claims the next cell, creating it with `create` on the first render.
    pub(crate) fn next_cell(&mut self, kind: CellKind, create: impl FnOnce() -> Cell) -> &mut Cell {
        let index = self.cursor;
        self.cursor += 1;
        if index == self.cells.len() && self.first_render {
            self.cells.push(create());
        }
        let stored = self.cells.get(index).map(Cell::kind);
        if stored != Some(kind) {
            raise(TapError::CellShape {
                fiber: self.shared.id,
                index,
                requested: kind,
                stored,
            });
        }
        &mut self.cells[index]
    }
}

struct RenderingGuard<'a>(&'a FiberShared);

impl<'a> RenderingGuard<'a> {
    fn new(shared: &'a FiberShared) -> Self {
        shared.rendering.set(true);
        Self(shared)
    }
}
impl Drop for RenderingGuard<'_> {
    fn drop(&mut self) {
        self.0.rendering.set(false);
    }
}

impl<R: 'static, P: 'static> ResourceFiber<R, P> {
    /// Runs the render function with `props`.
    ///
    /// Effects are not run; they are returned as commit tasks in call order.
    ///
    /// # Errors
    ///
    /// Misuse of a primitive ([`TapError::CellShape`], [`TapError::CellType`]) stops the render
    /// function by unwinding, and the error is returned once the unwind is caught here.
    /// The installed panic hook still runs, so the default hook prints a "panicked at" message.
    /// Such errors need `panic = "unwind"`; with `panic = "abort"` they end the process.
    pub fn render(&mut self, props: P) -> Result<RenderResult<R, P>, TapError> {
        self.render_scoped(props, None)
    }

    pub(crate) fn render_scoped(
        &mut self,
        props: P,
        scope: Option<Rc<ContextFrame>>,
    ) -> Result<RenderResult<R, P>, TapError> {
        if self.options.strict_mode {
            self.render_pass(&props, scope.clone())?;
        }
        let (output, tasks) = self.render_pass(&props, scope)?;
        Ok(RenderResult {
            fiber: self.shared.id,
            output,
            props,
            tasks,
        })
    }

    fn render_pass(
        &mut self,
        props: &P,
        scope: Option<Rc<ContextFrame>>,
    ) -> Result<(R, Vec<CommitTask>), TapError> {
        let fiber = self.shared.id;
        tracing::debug!(%fiber, generation = self.generation, "render");
        emit(|i| i.on_render_start(fiber));
        let _end = EmitOnDrop::new(move |i| i.on_render_end(fiber));

        let first_render = self.cell_count.is_none();
        if first_render {
            self.cells.clear();
        }
        self.shared.dirty.set(false);
        let _rendering = RenderingGuard::new(&self.shared);
        let mut cx = RenderContext {
            shared: &self.shared,
            cells: &mut self.cells,
            cursor: 0,
            first_render,
            strict_mode: self.options.strict_mode,
            tasks: Vec::new(),
            scope,
        };
        let resource = &self.resource;
        let output = match catch_unwind(AssertUnwindSafe(|| resource.call(&mut cx, props))) {
            Ok(output) => output,
            Err(payload) => match payload.downcast::<RenderAbort>() {
                Ok(abort) => return Err(abort.0),
                Err(payload) => resume_unwind(payload),
            },
        };
        let found = cx.cursor;
        let tasks = cx.tasks;
        match self.cell_count {
            None => self.cell_count = Some(found),
            Some(expected) if expected != found => {
                return Err(TapError::CellCount {
                    fiber,
                    expected,
                    found,
                })
            }
            Some(_) => {}
        }
        self.generation += 1;
        Ok((output, tasks))
    }
}
