use std::{
    cell::RefCell,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use derive_ex::Ex;
use futures::{
    channel::mpsc::{unbounded, UnboundedReceiver},
    Stream,
};
use slabmap::SlabMap;

use crate::{FiberId, FiberOptions, Resource, ResourceFiber, Subscription, TapError};


/// Options of a [`ResourceRoot`].
#[derive(Clone, Copy, Debug, Ex)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct RootOptions {
    /// Render twice per update and discard the first pass.
    pub strict_mode: bool,
    /// Number of re-renders [`flush`](ResourceRoot::flush) performs before giving up.
    pub max_update_depth: usize,
}
impl RootOptions {
    pub const fn new() -> Self {
        Self {
            strict_mode: false,
            max_update_depth: 50,
        }
    }
    pub const fn with_strict_mode(self, strict_mode: bool) -> Self {
        Self {
            strict_mode,
            ..self
        }
    }
    pub const fn with_max_update_depth(self, max_update_depth: usize) -> Self {
        Self {
            max_update_depth,
            ..self
        }
    }
}

type Listeners<R> = Rc<RefCell<SlabMap<Rc<dyn Fn(&R)>>>>;

/// Host that mounts a resource and keeps it committed.
///
/// State updates only mark the root dirty; call [`flush`](Self::flush) to re-render and commit.
pub struct ResourceRoot<R: 'static, P: 'static = ()> {
    fiber: ResourceFiber<R, P>,
    options: RootOptions,
    value: R,
    listeners: Listeners<R>,
}

impl<R, P> ResourceRoot<R, P>
where
    R: Clone + PartialEq + 'static,
    P: Clone + 'static,
{
    /// Renders and commits `resource`, then flushes updates requested by its effects.
    pub fn mount(resource: Resource<R, P>, props: P, options: RootOptions) -> Result<Self, TapError> {
        let fiber_options = FiberOptions::new().with_strict_mode(options.strict_mode);
        let mut fiber = ResourceFiber::with_options(resource, fiber_options);
        let result = fiber.render(props)?;
        let value = fiber.commit(result)?;
        let mut root = Self {
            fiber,
            options,
            value,
            listeners: Rc::new(RefCell::new(SlabMap::new())),
        };
        root.flush()?;
        Ok(root)
    }

    pub fn fiber_id(&self) -> FiberId {
        self.fiber.id()
    }

    /// Output of the last commit.
    pub fn value(&self) -> &R {
        &self.value
    }

    pub fn is_dirty(&self) -> bool {
        self.fiber.is_dirty()
    }

    /// Re-renders with `props` and flushes.
    pub fn set_props(&mut self, props: P) -> Result<(), TapError> {
        let before = self.value.clone();
        self.update(props)?;
        self.settle(before)
    }

    /// Re-renders and commits until no state update is pending.
    ///
    /// Returns true if anything was re-rendered.
    pub fn flush(&mut self) -> Result<bool, TapError> {
        if !self.fiber.is_dirty() {
            return Ok(false);
        }
        let before = self.value.clone();
        self.settle(before)?;
        Ok(true)
    }

    fn settle(&mut self, before: R) -> Result<(), TapError> {
        let mut depth = 0;
        while self.fiber.is_dirty() {
            if depth == self.options.max_update_depth {
                return Err(TapError::UpdateDepth {
                    fiber: self.fiber.id(),
                    limit: self.options.max_update_depth,
                });
            }
            depth += 1;
            let Some(props) = self.fiber.props().cloned() else {
                break;
            };
            self.update(props)?;
        }
        if self.value != before {
            self.notify();
        }
        Ok(())
    }

    fn update(&mut self, props: P) -> Result<(), TapError> {
        let result = self.fiber.render(props)?;
        self.value = self.fiber.commit(result)?;
        Ok(())
    }

    fn notify(&self) {
        let listeners: Vec<_> = self.listeners.borrow().values().cloned().collect();
        for listener in listeners {
            listener(&self.value);
        }
    }

    /// Calls `f` with the new value after each flush that changed it.
    pub fn subscribe(&self, f: impl Fn(&R) + 'static) -> Subscription {
        let key = self.listeners.borrow_mut().insert(Rc::new(f));
        let listeners = Rc::downgrade(&self.listeners);
        Subscription::from_fn(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().remove(key);
            }
        })
    }

    /// Stream of values after each flush that changed it.
    ///
    /// The stream ends when the root is dropped.
    pub fn values(&self) -> impl Stream<Item = R> + Unpin + 'static {
        let (sender, receiver) = unbounded();
        let subscription = self.subscribe(move |value: &R| {
            let _ = sender.unbounded_send(value.clone());
        });
        ValueStream {
            receiver,
            _subscription: subscription,
        }
    }

    /// Tears down the fiber.
    pub fn unmount(mut self) -> Result<(), TapError> {
        self.fiber.teardown()
    }
}

struct ValueStream<R> {
    receiver: UnboundedReceiver<R>,
    _subscription: Subscription,
}

impl<R> Stream for ValueStream<R> {
    type Item = R;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<R>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}
