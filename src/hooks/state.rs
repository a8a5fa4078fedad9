use std::{
    any::Any,
    cell::RefCell,
    mem::take,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;

use crate::{
    core::{raise_cell_type, Cell, CellKind, FiberShared, StateCell},
    RenderContext,
};

type Reducer<S, A> = Rc<dyn Fn(&S, A) -> S>;

struct QueuedAction<S, A> {
    action: A,
    eager: Option<S>,
}

/// Reducer cell.
///
/// `current` is the value of the last commit, `work` the value of the last render.
struct ReducerState<S, A> {
    fiber: Weak<FiberShared>,
    reducer: RefCell<Reducer<S, A>>,
    current: RefCell<S>,
    work: RefCell<S>,
    queue: RefCell<Vec<QueuedAction<S, A>>>,
}

impl<S: Clone + 'static, A: 'static> StateCell for ReducerState<S, A> {
    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
    fn commit(&self) {
        *self.current.borrow_mut() = self.work.borrow().clone();
    }
}

trait Enqueue<A> {
    fn enqueue(&self, action: A);
}
impl<S: PartialEq, A: Clone> Enqueue<A> for ReducerState<S, A> {
    fn enqueue(&self, action: A) {
        let Some(fiber) = self.fiber.upgrade() else {
            return;
        };
        if !fiber.check_dispatch() {
            return;
        }
        let mut eager = None;
        if !fiber.dirty.get() && self.queue.borrow().is_empty() {
            let reducer = self.reducer.borrow().clone();
            let value = reducer(&*self.work.borrow(), action.clone());
            if value == *self.current.borrow() {
                return;
            }
            eager = Some(value);
        }
        self.queue.borrow_mut().push(QueuedAction { action, eager });
        fiber.request_update();
    }
}

/// Sends actions to a state cell created by [`RenderContext::tap_reducer`].
#[derive_ex(Clone, bound())]
pub struct Dispatch<A: 'static>(Rc<dyn Enqueue<A>>);

impl<A: 'static> Dispatch<A> {
    /// Queues `action` and requests a re-render of the fiber.
    ///
    /// If no other update is pending, the reducer runs right away and an action that leaves the
    /// committed value unchanged is dropped without requesting a re-render.
    /// Actions sent after the fiber is torn down are ignored.
    ///
    /// # Panics
    ///
    /// Panics if called while the fiber is rendering, or before its first commit.
    pub fn dispatch(&self, action: A) {
        self.0.enqueue(action);
    }
}

pub type StateUpdate<T> = Rc<dyn Fn(&T) -> T>;

/// Updates a state cell created by [`RenderContext::tap_state`].
#[derive_ex(Clone, bound())]
pub struct SetState<T: 'static>(Dispatch<StateUpdate<T>>);

impl<T: Clone + 'static> SetState<T> {
    pub fn set(&self, value: T) {
        self.0.dispatch(Rc::new(move |_| value.clone()));
    }
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        self.0.dispatch(Rc::new(f));
    }
}

impl RenderContext<'_> {
    /// State cell updated by `reducer`.
    ///
    /// Actions dispatched since the last render are applied in order before the value is returned.
    /// In strict mode `init` and `reducer` are each called one extra time and the result dropped.
    pub fn tap_reducer<S, A>(
        &mut self,
        reducer: impl Fn(&S, A) -> S + 'static,
        init: impl Fn() -> S,
    ) -> (S, Dispatch<A>)
    where
        S: Clone + PartialEq + 'static,
        A: Clone + 'static,
    {
        self.reducer_cell(Rc::new(reducer), None, init)
    }

    /// Like [`tap_reducer`](Self::tap_reducer), but passes the value through `derive` after the
    /// queued actions are applied.
    ///
    /// If `derive` changes the value, the fiber is marked dirty so it renders again.
    pub fn tap_reducer_with_derived_state<S, A>(
        &mut self,
        reducer: impl Fn(&S, A) -> S + 'static,
        derive: impl Fn(&S) -> S,
        init: impl Fn() -> S,
    ) -> (S, Dispatch<A>)
    where
        S: Clone + PartialEq + 'static,
        A: Clone + 'static,
    {
        self.reducer_cell(Rc::new(reducer), Some(&derive as &dyn Fn(&S) -> S), init)
    }

    fn reducer_cell<S, A>(
        &mut self,
        reducer: Reducer<S, A>,
        derive: Option<&dyn Fn(&S) -> S>,
        init: impl Fn() -> S,
    ) -> (S, Dispatch<A>)
    where
        S: Clone + PartialEq + 'static,
        A: Clone + 'static,
    {
        let id = self.fiber();
        let index = self.cursor();
        let strict = self.is_strict_mode();
        let fiber = Rc::downgrade(self.shared);
        let Cell::State(state) = self.next_cell(CellKind::State, || {
            let value = init();
            if strict {
                init();
            }
            Cell::State(Rc::new(ReducerState {
                fiber,
                reducer: RefCell::new(reducer.clone()),
                current: RefCell::new(value.clone()),
                work: RefCell::new(value),
                queue: RefCell::new(Vec::<QueuedAction<S, A>>::new()),
            }))
        }) else {
            unreachable!()
        };
        let Ok(state) = state.clone().into_any().downcast::<ReducerState<S, A>>() else {
            raise_cell_type::<S>(id, index)
        };
        *state.reducer.borrow_mut() = reducer.clone();

        let queued = take(&mut *state.queue.borrow_mut());
        let mut changed_by_derive = false;
        let value = {
            let mut work = state.work.borrow_mut();
            for QueuedAction { action, eager } in queued {
                let value = match eager {
                    Some(value) => value,
                    None => reducer(&*work, action.clone()),
                };
                if strict {
                    reducer(&*work, action);
                }
                *work = value;
            }
            if let Some(derive) = derive {
                let derived = derive(&*work);
                if derived != *work {
                    *work = derived;
                    changed_by_derive = true;
                }
            }
            work.clone()
        };
        if changed_by_derive {
            self.mark_dirty();
        }
        (value, Dispatch(state))
    }

    /// State cell holding a value.
    ///
    /// Setting a value equal to the committed one does not request a re-render.
    pub fn tap_state<T>(&mut self, init: impl Fn() -> T) -> (T, SetState<T>)
    where
        T: Clone + PartialEq + 'static,
    {
        let (value, dispatch) = self.tap_reducer(|value: &T, f: StateUpdate<T>| f(value), init);
        (value, SetState(dispatch))
    }
}
