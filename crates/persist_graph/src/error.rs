use alloc::borrow::Cow;
use alloc::string::String;

use thiserror::Error;

/// A specialized [`Result`](core::result::Result) for archive operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;

// -----------------------------------------------------------------------------
// SchemaError

/// A type cannot be described, or a document names a type the schema does
/// not know.
///
/// Compile-time variants are raised by [`Schema::compile`] before any node is
/// written or read.
///
/// [`Schema::compile`]: crate::Schema::compile
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("`{member}` owns a value of its own type; mark one member on the cycle as a reference")]
    Cycle { member: String },

    #[error("`{member}` is marked as a reference but `{ty}` is a scalar")]
    ReferenceOnScalar { member: String, ty: String },

    #[error("`{member}` is marked as a reference but `{ty}` is not a `Shared` record")]
    ReferenceNotShared { member: String, ty: String },

    #[error("`{member}` is anonymous but `{ty}` is a scalar")]
    AnonymousScalar { member: String, ty: String },

    #[error("`{ty}` has no constructor usable by `{member}`")]
    NoConstructor { member: String, ty: String },

    #[error("variant `{ty}` of `{base}` is not a record")]
    VariantNotRecord { base: String, ty: String },

    #[error("no variant of `{base}` is registered as `{ty}`")]
    UnknownVariant { base: String, ty: String },

    #[error("`{name}` names more than one variant of `{base}`; use the full type path")]
    AmbiguousVariant { base: String, name: String },

    #[error("`{base}` has no base type and the node carries no discriminator")]
    MissingDiscriminator { base: String },
}

// -----------------------------------------------------------------------------
// Error

/// Every failure an archive operation can report.
///
/// All errors are fatal for the call that raised them: a failed write yields
/// no document and a failed read yields no value.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("value is not an instance of `{expected}`")]
    TypeMismatch { expected: Cow<'static, str> },

    #[error("unresolved reference to address `{address}`")]
    UnresolvedReference { address: String },

    #[error("structural error: {0}")]
    Structural(String),

    #[error("cannot convert `{text}` to `{ty}`")]
    Parse { ty: Cow<'static, str>, text: String },

    #[error("format error: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a [`Error::TypeMismatch`] for the type `expected`.
    #[inline]
    pub fn mismatch(expected: impl Into<Cow<'static, str>>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
        }
    }

    /// Creates a [`Error::Parse`] for text that does not convert to `ty`.
    #[inline]
    pub fn parse(ty: impl Into<Cow<'static, str>>, text: &str) -> Self {
        Self::Parse {
            ty: ty.into(),
            text: text.into(),
        }
    }

    /// Creates a [`Error::Format`] from any adapter error.
    #[inline]
    pub fn format(err: impl core::fmt::Display) -> Self {
        Self::Format(alloc::format!("{err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, SchemaError};

    #[test]
    fn messages() {
        let err = Error::from(SchemaError::Cycle {
            member: "Node.next".into(),
        });
        assert!(err.to_string().contains("`Node.next`"));

        let err = Error::UnresolvedReference {
            address: "42".into(),
        };
        assert_eq!(err.to_string(), "unresolved reference to address `42`");

        let err = Error::parse("i32", "x1");
        assert_eq!(err.to_string(), "cannot convert `x1` to `i32`");
    }
}
