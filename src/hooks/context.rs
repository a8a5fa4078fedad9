use std::{
    any::Any,
    mem::replace,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use derive_ex::derive_ex;

use crate::{
    core::{raise_cell_type, Cell, CellKind, ContextFrame, ContextId},
    RenderContext,
};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Value passed down from a resource to the resources rendered inside it.
#[derive_ex(Clone, bound())]
pub struct Context<T: 'static> {
    id: ContextId,
    default: Rc<T>,
}

impl<T: 'static> Context<T> {
    /// Creates a context whose value is `default` where no value is provided.
    pub fn new(default: T) -> Self {
        Self {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            default: Rc::new(default),
        }
    }
}

impl RenderContext<'_> {
    /// Calls `body` with `value` provided for `context`.
    ///
    /// The value is visible to [`tap_context`](Self::tap_context) calls made in `body`,
    /// including those of child resources rendered in `body`.
    pub fn provide<T: 'static, U>(
        &mut self,
        context: &Context<T>,
        value: T,
        body: impl FnOnce(&mut Self) -> U,
    ) -> U {
        let frame = Rc::new(ContextFrame {
            id: context.id,
            value: Rc::new(value),
            parent: self.scope.clone(),
        });
        let parent = replace(&mut self.scope, Some(frame));
        let ret = body(self);
        self.scope = parent;
        ret
    }

    /// Reads the innermost value provided for `context`, or its default.
    pub fn tap_context<T: Clone + 'static>(&mut self, context: &Context<T>) -> T {
        let fiber = self.fiber();
        let index = self.cursor();
        let Cell::Context(id) = self.next_cell(CellKind::Context, || Cell::Context(context.id)) else {
            unreachable!()
        };
        if *id != context.id {
            raise_cell_type::<Context<T>>(fiber, index);
        }
        let value: Option<&dyn Any> = ContextFrame::find(&self.scope, context.id).map(|v| &**v);
        match value {
            Some(value) => match value.downcast_ref::<T>() {
                Some(value) => value.clone(),
                None => raise_cell_type::<T>(fiber, index),
            },
            None => T::clone(&context.default),
        }
    }
}
