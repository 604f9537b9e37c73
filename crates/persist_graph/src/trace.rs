#[cfg(all(debug_assertions, feature = "debug"))]
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
#[cfg(all(debug_assertions, feature = "debug"))]
use alloc::vec::Vec;
use core::fmt;

use crate::Error;

/// The members walked from the root to the current node.
///
/// Only recorded in debug builds with the `debug` feature, where it is
/// appended to structural errors. Otherwise every operation is a no-op.
#[derive(Default, Clone)]
pub(crate) struct MemberPath {
    #[cfg(all(debug_assertions, feature = "debug"))]
    stack: Vec<Arc<str>>,
}

impl MemberPath {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, name: &Arc<str>) {
        #[cfg(all(debug_assertions, feature = "debug"))]
        self.stack.push(Arc::clone(name));
        #[cfg(not(all(debug_assertions, feature = "debug")))]
        let _ = name;
    }

    #[inline]
    pub fn pop(&mut self) {
        #[cfg(all(debug_assertions, feature = "debug"))]
        self.stack.pop();
    }

    /// Creates an [`Error::Structural`], with the path when recorded.
    pub fn structural(&self, message: impl Into<String>) -> Error {
        let message = message.into();
        #[cfg(all(debug_assertions, feature = "debug"))]
        if !self.stack.is_empty() {
            return Error::Structural(format!("{message} (at {self:?})"));
        }
        Error::Structural(message)
    }
}

impl fmt::Debug for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(all(debug_assertions, feature = "debug"))]
        for (index, name) in self.stack.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "`{name}`")?;
        }
        #[cfg(not(all(debug_assertions, feature = "debug")))]
        let _ = f;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::MemberPath;
    use crate::Error;

    #[test]
    fn structural_message() {
        let mut path = MemberPath::new();
        path.push(&Arc::from("Classroom"));
        path.push(&Arc::from("Students"));
        path.pop();

        let Error::Structural(message) = path.structural("bad") else {
            panic!("expected a structural error");
        };
        assert!(message.starts_with("bad"));
        #[cfg(all(debug_assertions, feature = "debug"))]
        assert_eq!(message, "bad (at `Classroom`)");
    }
}
