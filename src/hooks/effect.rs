use std::{cell::RefCell, rc::Rc};

use derive_ex::derive_ex;

use crate::{
    core::{Cell, CellKind, CommitTask, EffectCell},
    Deps, EffectOutput, RenderContext,
};

impl RenderContext<'_> {
    /// Schedules `f` to run in the next commit.
    ///
    /// With `Some(deps)`, the effect is skipped while `deps` stay the same.
    /// With `None`, it runs on every commit.
    /// Before it runs again, the cleanup it returned last time is called.
    pub fn tap_effect<O: EffectOutput>(
        &mut self,
        deps: impl Into<Option<Deps>>,
        f: impl FnOnce() -> O + 'static,
    ) {
        let cell_index = self.cursor();
        self.next_cell(CellKind::Effect, || Cell::Effect(EffectCell::default()));
        self.tasks.push(CommitTask {
            cell_index,
            effect: Box::new(move || f().into_cleanup()),
            deps: deps.into(),
        });
    }

    /// Returns a handle with a stable identity that calls the `f` of the last commit.
    pub fn tap_effect_event<A: 'static, O: 'static>(
        &mut self,
        f: impl Fn(A) -> O + 'static,
    ) -> EffectEvent<A, O> {
        let slot = self.tap_ref(|| None::<Rc<dyn Fn(A) -> O>>);
        let latest: Rc<dyn Fn(A) -> O> = Rc::new(f);
        let target = slot.clone();
        self.tap_effect(None, move || {
            *target.borrow_mut() = Some(latest);
        });
        EffectEvent(slot)
    }
}

/// Handle returned by [`RenderContext::tap_effect_event`].
#[derive_ex(Clone, bound())]
pub struct EffectEvent<A: 'static, O: 'static>(Rc<RefCell<Option<Rc<dyn Fn(A) -> O>>>>);

impl<A: 'static, O: 'static> EffectEvent<A, O> {
    /// # Panics
    ///
    /// Panics if the resource has not been committed yet.
    pub fn call(&self, arg: A) -> O {
        let Some(f) = self.0.borrow().clone() else {
            panic!("effect event called before the resource was committed");
        };
        f(arg)
    }
}
