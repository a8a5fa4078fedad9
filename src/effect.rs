use std::{any::Any, fmt};

use crate::BoxError;


/// Cleanup function returned by an effect.
///
/// Called once before the effect runs again, or when the fiber is torn down.
#[must_use]
pub struct Cleanup(Box<dyn FnOnce() -> Result<(), BoxError>>);

impl Cleanup {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(move || {
            f();
            Ok(())
        }))
    }
    pub fn try_new(f: impl FnOnce() -> Result<(), BoxError> + 'static) -> Self {
        Self(Box::new(f))
    }
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub(crate) fn run(self) -> Result<(), BoxError> {
        (self.0)()
    }
}
impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// Dynamically typed effect result, for hosts that forward values from untyped code.
#[derive(Debug)]
pub enum EffectValue {
    Nothing,
    Cleanup(Cleanup),
    /// Anything else. Holds the name of the received type.
    Other(&'static str),
}

/// Failure of a single effect body.
#[derive(Debug)]
pub enum EffectError {
    InvalidReturn { received: &'static str },
    Failed(BoxError),
}

/// Values an effect body may return.
pub trait EffectOutput: 'static {
    fn into_cleanup(self) -> Result<Option<Cleanup>, EffectError>;
}

impl EffectOutput for () {
    fn into_cleanup(self) -> Result<Option<Cleanup>, EffectError> {
        Ok(None)
    }
}
impl EffectOutput for Cleanup {
    fn into_cleanup(self) -> Result<Option<Cleanup>, EffectError> {
        Ok(Some(self))
    }
}
impl EffectOutput for Option<Cleanup> {
    fn into_cleanup(self) -> Result<Option<Cleanup>, EffectError> {
        Ok(self)
    }
}
impl<T, E> EffectOutput for Result<T, E>
where
    T: EffectOutput,
    E: Into<BoxError> + 'static,
{
    fn into_cleanup(self) -> Result<Option<Cleanup>, EffectError> {
        match self {
            Ok(value) => value.into_cleanup(),
            Err(e) => Err(EffectError::Failed(e.into())),
        }
    }
}
impl EffectOutput for EffectValue {
    fn into_cleanup(self) -> Result<Option<Cleanup>, EffectError> {
        match self {
            EffectValue::Nothing => Ok(None),
            EffectValue::Cleanup(cleanup) => Ok(Some(cleanup)),
            EffectValue::Other(received) => Err(EffectError::InvalidReturn { received }),
        }
    }
}
impl EffectOutput for Box<dyn Any> {
    fn into_cleanup(self) -> Result<Option<Cleanup>, EffectError> {
        let value = match self.downcast::<Cleanup>() {
            Ok(cleanup) => return Ok(Some(*cleanup)),
            Err(value) => value,
        };
        let value = match value.downcast::<Option<Cleanup>>() {
            Ok(cleanup) => return Ok(*cleanup),
            Err(value) => value,
        };
        let value = match value.downcast::<EffectValue>() {
            Ok(value) => return value.into_cleanup(),
            Err(value) => value,
        };
        if value.is::<()>() {
            return Ok(None);
        }
        Err(EffectError::InvalidReturn {
            received: describe_any(&*value),
        })
    }
}

fn describe_any(value: &dyn Any) -> &'static str {
    if value.is::<&'static str>() || value.is::<String>() {
        "string"
    } else if value.is::<bool>() {
        "boolean"
    } else if value.is::<i32>()
        || value.is::<i64>()
        || value.is::<u32>()
        || value.is::<u64>()
        || value.is::<usize>()
        || value.is::<f64>()
        || value.is::<f32>()
    {
        "number"
    } else {
        "object"
    }
}
