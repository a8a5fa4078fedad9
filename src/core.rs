use std::{
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
    thread::panicking,
};

use derive_ex::Ex;
use parse_display::Display;
use serde::Serialize;

use crate::Resource;

mod cell;
mod commit;
mod render;
mod teardown;


pub(crate) use cell::*;
pub use cell::CellKind;
pub(crate) use render::{raise, raise_cell_type};
pub use render::{CommitTask, RenderContext, RenderResult};
pub(crate) use render::{ContextFrame, ContextId};
use teardown::{teardown_effects, TeardownFailure};

static NEXT_FIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one mounted resource instance.
#[derive(Clone, Copy, Display, Debug, Ex, Serialize)]
#[derive_ex(PartialEq, Eq, Hash)]
#[display("{name}#{id}")]
pub struct FiberId {
    id: u64,
    #[eq(ignore)]
    name: &'static str,
}
impl FiberId {
    fn next(name: &'static str) -> Self {
        Self {
            id: NEXT_FIBER_ID.fetch_add(1, Ordering::Relaxed),
            name,
        }
    }
    pub fn id(self) -> u64 {
        self.id
    }
    pub fn name(self) -> &'static str {
        self.name
    }
}

/// Options of a [`ResourceFiber`].
#[derive(Clone, Copy, Debug, Ex)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct FiberOptions {
    /// Render twice per update and discard the first pass.
    pub strict_mode: bool,
}
impl FiberOptions {
    pub const fn new() -> Self {
        Self { strict_mode: false }
    }
    pub const fn with_strict_mode(self, strict_mode: bool) -> Self {
        Self { strict_mode, ..self }
    }
}

pub(crate) type Updater = Rc<dyn Fn()>;

/// Fiber state reachable from the handles that primitives give out.
pub(crate) struct FiberShared {
    pub id: FiberId,
    pub rendering: std::cell::Cell<bool>,
    pub committed: std::cell::Cell<bool>,
    pub disposed: std::cell::Cell<bool>,
    pub dirty: std::cell::Cell<bool>,
    updater: Option<Updater>,
}
impl FiberShared {
    fn new(id: FiberId, updater: Option<Updater>) -> Self {
        Self {
            id,
            rendering: Default::default(),
            committed: Default::default(),
            disposed: Default::default(),
            dirty: Default::default(),
            updater,
        }
    }

    /// Panics if the fiber cannot accept state updates right now.
    ///
    /// Returns false if the fiber has been torn down and the update should be dropped.
    pub fn check_dispatch(&self) -> bool {
        if self.disposed.get() {
            return false;
        }
        if self.rendering.get() {
            panic!("{}: resource updated during render", self.id);
        }
        if !self.committed.get() {
            panic!("{}: resource updated before mount", self.id);
        }
        true
    }

    /// Marks the fiber dirty and notifies its host.
    pub fn request_update(&self) {
        if self.disposed.get() {
            return;
        }
        self.dirty.set(true);
        if let Some(updater) = &self.updater {
            updater();
        }
    }
}

/// Persistent execution context of one mounted instance of a [`Resource`].
///
/// A fiber is driven by its host in cycles of [`render`](Self::render) followed by
/// [`commit`](Self::commit), and retired with [`teardown`](Self::teardown).
/// Dropping a fiber that was not torn down runs its cleanups and logs any failure.
pub struct ResourceFiber<R: 'static, P: 'static = ()> {
    resource: Resource<R, P>,
    cells: Vec<Cell>,
    cell_count: Option<usize>,
    shared: Rc<FiberShared>,
    options: FiberOptions,
    props: Option<P>,
    generation: u64,
}

impl<R: 'static, P: 'static> ResourceFiber<R, P> {
    pub fn new(resource: Resource<R, P>) -> Self {
        Self::with_options(resource, FiberOptions::default())
    }
    pub fn with_options(resource: Resource<R, P>, options: FiberOptions) -> Self {
        Self::with_updater(resource, options, None)
    }

    /// Creates a fiber whose state updates call `updater` after marking the fiber dirty.
    pub fn with_update_callback(
        resource: Resource<R, P>,
        options: FiberOptions,
        updater: impl Fn() + 'static,
    ) -> Self {
        Self::with_updater(resource, options, Some(Rc::new(updater)))
    }

    pub(crate) fn with_updater(
        resource: Resource<R, P>,
        options: FiberOptions,
        updater: Option<Updater>,
    ) -> Self {
        let id = FiberId::next(resource.name());
        Self {
            resource,
            cells: Vec::new(),
            cell_count: None,
            shared: Rc::new(FiberShared::new(id, updater)),
            options,
            props: None,
            generation: 0,
        }
    }

    pub fn id(&self) -> FiberId {
        self.shared.id
    }
    pub fn resource(&self) -> &Resource<R, P> {
        &self.resource
    }
    pub fn options(&self) -> FiberOptions {
        self.options
    }

    /// Props of the last commit.
    pub fn props(&self) -> Option<&P> {
        self.props.as_ref()
    }

    /// Number of completed render passes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true if state was updated since the last render.
    pub fn is_dirty(&self) -> bool {
        self.shared.dirty.get()
    }

    /// Returns true if the fiber has been committed and not torn down.
    pub fn is_mounted(&self) -> bool {
        self.shared.committed.get() && !self.shared.disposed.get()
    }

    /// Kinds of the cells in index order.
    pub fn cell_kinds(&self) -> Vec<CellKind> {
        self.cells.iter().map(Cell::kind).collect()
    }

    /// Returns true if the effect at `index` is mounted.
    pub fn is_effect_mounted(&self, index: usize) -> bool {
        matches!(self.cells.get(index), Some(Cell::Effect(effect)) if effect.mounted)
    }
}

impl<R: 'static, P: 'static> Drop for ResourceFiber<R, P> {
    fn drop(&mut self) {
        if self.shared.disposed.get() {
            return;
        }
        self.shared.disposed.set(true);
        match teardown_effects(self.shared.id, &mut self.cells) {
            Ok(()) => {}
            Err(TeardownFailure::Error(e)) => {
                tracing::error!(fiber = %self.shared.id, error = %e, "cleanup failed while dropping fiber");
            }
            Err(TeardownFailure::Panic(payload)) => {
                if panicking() {
                    tracing::error!(fiber = %self.shared.id, "cleanup panicked while dropping fiber");
                } else {
                    std::panic::resume_unwind(payload);
                }
            }
        }
    }
}
