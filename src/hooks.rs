//! Primitives available to render functions.
//!
//! Every primitive is a method of [`RenderContext`](crate::RenderContext) and claims one cell
//! (two for [`tap_effect_event`](crate::RenderContext::tap_effect_event)).

mod context;
mod effect;
mod memo;
mod resources;
mod state;

#[cfg(test)]
mod tests;

pub use context::Context;
pub use effect::EffectEvent;
pub use memo::Callback;
pub use state::{Dispatch, SetState, StateUpdate};
