use std::{cell::RefCell, rc::Rc};

use derive_ex::derive_ex;

use crate::{
    core::{raise_cell_type, Cell, CellKind, MemoCell},
    deps, Deps, RenderContext,
};

impl RenderContext<'_> {
    /// Returns the value computed by `f`, recomputed only when `deps` change.
    pub fn tap_memo<T: Clone + 'static>(&mut self, deps: Deps, f: impl FnOnce() -> T) -> T {
        let fiber = self.fiber();
        let index = self.cursor();
        let Cell::Memo(memo) = self.next_cell(CellKind::Memo, || Cell::Memo(None)) else {
            unreachable!()
        };
        if let Some(prev) = memo.as_ref() {
            if prev.deps.same_values(&deps) {
                return match prev.value.downcast_ref::<T>() {
                    Some(value) => value.clone(),
                    None => raise_cell_type::<T>(fiber, index),
                };
            }
        }
        let value = f();
        *memo = Some(MemoCell {
            deps,
            value: Box::new(value.clone()),
        });
        value
    }

    /// Returns the value computed by `f` on the first render.
    pub fn tap_const<T: Clone + 'static>(&mut self, f: impl FnOnce() -> T) -> T {
        self.tap_memo(deps![], f)
    }

    /// Returns a callback whose identity changes only when `deps` change.
    pub fn tap_callback<A: 'static, O: 'static>(
        &mut self,
        deps: Deps,
        f: impl Fn(A) -> O + 'static,
    ) -> Callback<A, O> {
        self.tap_memo(deps, move || Callback(Rc::new(f)))
    }

    /// Mutable value kept across renders. Changing it does not re-render.
    pub fn tap_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
        let fiber = self.fiber();
        let index = self.cursor();
        let Cell::Ref(value) = self.next_cell(CellKind::Ref, || {
            Cell::Ref(Box::new(Rc::new(RefCell::new(init()))))
        }) else {
            unreachable!()
        };
        match value.downcast_ref::<Rc<RefCell<T>>>() {
            Some(value) => value.clone(),
            None => raise_cell_type::<T>(fiber, index),
        }
    }
}

/// Shared callback returned by [`RenderContext::tap_callback`].
#[derive_ex(Clone, bound())]
pub struct Callback<A: 'static, O: 'static>(Rc<dyn Fn(A) -> O>);

impl<A: 'static, O: 'static> Callback<A, O> {
    pub fn call(&self, arg: A) -> O {
        (self.0)(arg)
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
