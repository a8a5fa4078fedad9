use std::{any::Any, rc::Rc};

use parse_display::Display;
use serde::Serialize;

use crate::{core::ContextId, Cleanup, Deps};

/// Kind of primitive that owns a cell.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Effect,
    State,
    Memo,
    Ref,
    Context,
}

/// One ordered slot of a fiber.
pub(crate) enum Cell {
    Effect(EffectCell),
    State(Rc<dyn StateCell>),
    Memo(Option<MemoCell>),
    Ref(Box<dyn Any>),
    Context(ContextId),
}
impl Cell {
    pub fn kind(&self) -> CellKind {
        match self {
            Cell::Effect(_) => CellKind::Effect,
            Cell::State(_) => CellKind::State,
            Cell::Memo(_) => CellKind::Memo,
            Cell::Ref(_) => CellKind::Ref,
            Cell::Context(_) => CellKind::Context,
        }
    }
}

/// Type-erased storage of a reducer cell.
pub(crate) trait StateCell {
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;

    /// Makes the last rendered value the committed one.
    fn commit(&self);
}

/// Committed state of one effect.
///
/// `cleanup` is only set while `mounted` is true.
#[derive(Default)]
pub(crate) struct EffectCell {
    pub mounted: bool,
    pub deps: Option<Deps>,
    pub cleanup: Option<Cleanup>,
}

pub(crate) struct MemoCell {
    pub deps: Deps,
    pub value: Box<dyn Any>,
}
