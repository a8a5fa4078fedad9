use std::rc::Rc;

use assert_call::call;

use crate::{FiberId, InstrumentationScope, ResourceFiber, TapError, TapInstrumentation};

/// Reports every instrumentation callback to `assert_call`.
pub struct CallInstrumentation;

impl TapInstrumentation for CallInstrumentation {
    fn on_render_start(&self, _fiber: FiberId) {
        call!("render:start");
    }
    fn on_render_end(&self, _fiber: FiberId) {
        call!("render:end");
    }
    fn on_commit_start(&self, _fiber: FiberId) {
        call!("commit:start");
    }
    fn on_commit_end(&self, _fiber: FiberId) {
        call!("commit:end");
    }
    fn on_effect_run_start(&self, _fiber: FiberId, cell: usize) {
        call!("effect:run:start:{}", cell);
    }
    fn on_effect_run_end(&self, _fiber: FiberId, cell: usize) {
        call!("effect:run:end:{}", cell);
    }
    fn on_effect_skipped(&self, _fiber: FiberId, cell: usize) {
        call!("effect:skipped:{}", cell);
    }
    fn on_effect_cleanup_start(&self, _fiber: FiberId, _cell: usize) {
        call!("cleanup:start");
    }
    fn on_effect_cleanup_end(&self, _fiber: FiberId, _cell: usize) {
        call!("cleanup:end");
    }
}

pub fn instrument_calls() -> InstrumentationScope {
    InstrumentationScope::new(Rc::new(CallInstrumentation))
}

pub fn render_commit<R: 'static, P: 'static>(
    fiber: &mut ResourceFiber<R, P>,
    props: P,
) -> Result<R, TapError> {
    let result = fiber.render(props)?;
    fiber.commit(result)
}
