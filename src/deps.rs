use std::{
    any::{type_name, Any},
    fmt,
    rc::{Rc, Weak},
    sync::Arc,
};


/// Identity-or-equality comparison used to decide whether a dependency changed.
///
/// Values compare like the ECMAScript `SameValue` algorithm:
/// primitives compare by value, shared pointers compare by identity,
/// `NaN` is the same as `NaN`, and `0.0` is not the same as `-0.0`.
pub trait SameValue: 'static {
    fn same_value(&self, other: &Self) -> bool;
}

macro_rules! impl_same_value_by_eq {
    ($($t:ty),* $(,)?) => {
        $(
            impl SameValue for $t {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}
impl_same_value_by_eq!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    String,
    &'static str,
);

macro_rules! impl_same_value_float {
    ($($t:ty),*) => {
        $(
            impl SameValue for $t {
                fn same_value(&self, other: &Self) -> bool {
                    if self.is_nan() {
                        other.is_nan()
                    } else {
                        self.to_bits() == other.to_bits()
                    }
                }
            }
        )*
    };
}
impl_same_value_float!(f32, f64);

impl<T: ?Sized + 'static> SameValue for Rc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}
impl<T: ?Sized + 'static> SameValue for Weak<T> {
    fn same_value(&self, other: &Self) -> bool {
        Weak::ptr_eq(self, other)
    }
}
impl<T: ?Sized + 'static> SameValue for Arc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}
impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

macro_rules! impl_same_value_tuple {
    ($(($($n:tt $t:ident),*)),*) => {
        $(
            impl<$($t: SameValue),*> SameValue for ($($t,)*) {
                fn same_value(&self, other: &Self) -> bool {
                    $(self.$n.same_value(&other.$n))&&*
                }
            }
        )*
    };
}
impl_same_value_tuple!((0 A, 1 B), (0 A, 1 B, 2 C), (0 A, 1 B, 2 C, 3 D));

trait DynDep {
    fn as_any(&self) -> &dyn Any;
    fn same_dyn(&self, other: &dyn DynDep) -> bool;
    fn type_name(&self) -> &'static str;
}

struct SameValueDep<T>(T);

impl<T: SameValue> DynDep for SameValueDep<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn same_dyn(&self, other: &dyn DynDep) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self.0.same_value(&other.0))
    }
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

struct EqDep<T>(T);

impl<T: PartialEq + 'static> DynDep for EqDep<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn same_dyn(&self, other: &dyn DynDep) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self.0 == other.0)
    }
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// One type-erased entry of a dependency array.
///
/// Entries of different types are never the same.
pub struct Dep(Box<dyn DynDep>);

impl Dep {
    /// Creates an entry compared with [`SameValue`].
    pub fn new<T: SameValue>(value: T) -> Self {
        Self(Box::new(SameValueDep(value)))
    }

    /// Creates an entry compared with [`PartialEq`].
    ///
    /// Useful for plain data that has no identity of its own.
    pub fn by_eq<T: PartialEq + 'static>(value: T) -> Self {
        Self(Box::new(EqDep(value)))
    }

    pub fn same_value(&self, other: &Dep) -> bool {
        self.0.same_dyn(&*other.0)
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }
}
impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dep<{}>", self.type_name())
    }
}

/// Dependency array of an effect or memo.
///
/// Use the [`deps!`](crate::deps!) macro to build one.
#[derive(Debug, Default)]
pub struct Deps(Vec<Dep>);

impl Deps {
    pub fn new() -> Self {
        Self(Vec::new())
    }
    pub fn from_vec(deps: Vec<Dep>) -> Self {
        Self(deps)
    }
    pub fn push(&mut self, dep: Dep) {
        self.0.push(dep);
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Dep> {
        self.0.iter()
    }

    /// Returns true if both arrays have the same length and every pair of entries is the same.
    pub fn same_values(&self, other: &Deps) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| a.same_value(b))
    }
}
impl FromIterator<Dep> for Deps {
    fn from_iter<I: IntoIterator<Item = Dep>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Returns true if an effect with `prev` committed dependencies must run again for `next`.
///
/// A missing array on either side always reruns.
pub(crate) fn deps_changed(prev: Option<&Deps>, next: Option<&Deps>) -> bool {
    match (prev, next) {
        (Some(prev), Some(next)) => !prev.same_values(next),
        _ => true,
    }
}

/// Builds a [`Deps`] array; each entry is compared with [`SameValue`].
///
/// ```
/// use tap_runtime::deps;
/// let deps = deps![1, "a", 0.5];
/// assert_eq!(deps.len(), 3);
/// ```
#[macro_export]
macro_rules! deps {
    () => {
        $crate::Deps::new()
    };
    ($($e:expr),+ $(,)?) => {
        $crate::Deps::from_vec(vec![$($crate::Dep::new($e)),+])
    };
}
