//! [`Persist`](crate::Persist) implementations for foreign types.
//!
//! ## Implemented Menu
//!
//! - scalars:
//!     - `bool`, `char`, `i8`-`i128`, `isize`, `u8`-`u128`, `usize`, `f32`, `f64`
//!     - `String`, `Cow<'static, str>`, `PathBuf`
//!     - `chrono` feature: `DateTime<Utc>`, `NaiveDate`, `NaiveTime`, `NaiveDateTime`
//! - sequences: `Vec<T>`, `VecDeque<T>`
//! - maps: `HashMap<K, V, S>`, `BTreeMap<K, V>`
//! - carriers: `Option<T>`, [`Shared<T>`](crate::Shared)
//!
//! Sets and plain `Box<T>` are not implemented. A `Box<dyn Trait>` is
//! declared with [`polymorphic!`](crate::polymorphic).

// -----------------------------------------------------------------------------
// Modules

mod collections;
mod primitives;
mod wrappers;

#[cfg(feature = "chrono")]
mod chrono;

// -----------------------------------------------------------------------------
// Macros

/// Implements [`Persist`](crate::Persist) for a `Display + FromStr` type as a
/// scalar.
///
/// The friendly name is the last segment of the type path, unless given.
///
/// ```
/// use std::fmt;
/// use std::str::FromStr;
///
/// #[derive(Debug, PartialEq)]
/// pub struct Celsius(f32);
///
/// impl fmt::Display for Celsius {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         write!(f, "{}C", self.0)
///     }
/// }
///
/// impl FromStr for Celsius {
///     type Err = std::num::ParseFloatError;
///     fn from_str(s: &str) -> Result<Self, Self::Err> {
///         s.trim_end_matches('C').parse().map(Celsius)
///     }
/// }
///
/// persist_graph::impl_scalar!(Celsius);
///
/// use persist_graph::Persist;
/// assert_eq!(<Celsius as Persist>::type_name(), "Celsius");
/// ```
#[macro_export]
macro_rules! impl_scalar {
    ($ty:ty) => {
        $crate::impl_scalar!($ty, $crate::__macro_exports::last_segment(::core::any::type_name::<$ty>()));
    };
    ($ty:ty, $name:expr) => {
        impl $crate::Persist for $ty {
            fn type_path() -> $crate::__macro_exports::Cow<'static, str> {
                $crate::__macro_exports::Cow::Borrowed(::core::any::type_name::<$ty>())
            }

            fn type_name() -> $crate::__macro_exports::Cow<'static, str> {
                $crate::__macro_exports::Cow::Borrowed($name)
            }

            fn type_ident() -> &'static str {
                $name
            }

            fn shape() -> $crate::schema::Shape {
                $crate::schema::Shape::Scalar($crate::schema::ScalarShape::of::<$ty>())
            }
        }
    };
}
