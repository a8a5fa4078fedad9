use std::{fmt, rc::Rc};

use derive_ex::derive_ex;

use crate::RenderContext;

struct ResourceDef<R, P> {
    name: &'static str,
    #[allow(clippy::type_complexity)]
    render: Box<dyn Fn(&mut RenderContext, &P) -> R>,
}

/// A stateful unit of logic described by a render function.
///
/// Two resources are the same type only if one is a clone of the other.
#[derive_ex(Clone, bound())]
pub struct Resource<R: 'static, P: 'static = ()>(Rc<ResourceDef<R, P>>);

impl<R: 'static, P: 'static> Resource<R, P> {
    pub fn new(name: &'static str, render: impl Fn(&mut RenderContext, &P) -> R + 'static) -> Self {
        Self(Rc::new(ResourceDef {
            name,
            render: Box::new(render),
        }))
    }

    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// Returns true if both are the same resource type.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Pairs this resource with props, to be mounted by
    /// [`tap_resources`](RenderContext::tap_resources).
    pub fn element(&self, props: P) -> ResourceElement<R, P> {
        ResourceElement {
            resource: self.clone(),
            props,
        }
    }

    pub(crate) fn call(&self, cx: &mut RenderContext, props: &P) -> R {
        (self.0.render)(cx, props)
    }
}
impl<R: 'static, P: 'static> fmt::Debug for Resource<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource({})", self.0.name)
    }
}

/// A resource together with the props to render it with.
#[derive(Debug)]
pub struct ResourceElement<R: 'static, P: 'static = ()> {
    pub resource: Resource<R, P>,
    pub props: P,
}
