//! A hooks-style resource runtime.
//!
//! A [`Resource`] is a render function that calls primitives such as
//! [`tap_state`](RenderContext::tap_state) and [`tap_effect`](RenderContext::tap_effect).
//! Each mounted instance lives in a [`ResourceFiber`], which its host drives through
//! [`render`](ResourceFiber::render), [`commit`](ResourceFiber::commit) and
//! [`teardown`](ResourceFiber::teardown).
//! Effects never run during render; they are planned as commit tasks and run in call order
//! when the render is committed, skipping those whose dependencies did not change.
//!
//! [`ResourceRoot`] is a ready-made host that keeps one resource committed.

mod core;
mod deps;
mod effect;
mod error;
mod hooks;
mod instrumentation;
mod resource;
mod root;
mod subscription;

#[cfg(test)]
mod test_helpers;

pub use crate::core::{
    CellKind, CommitTask, FiberId, FiberOptions, RenderContext, RenderResult, ResourceFiber,
};
pub use deps::{Dep, Deps, SameValue};
pub use effect::{Cleanup, EffectError, EffectOutput, EffectValue};
pub use error::{BoxError, TapError};
pub use hooks::*;
pub use instrumentation::{
    set_tap_instrumentation, tap_instrumentation, EventLog, InstrumentationScope,
    TapEvent, TapInstrumentation, TracingInstrumentation,
};
pub use resource::{Resource, ResourceElement};
pub use root::{ResourceRoot, RootOptions};
pub use subscription::Subscription;
