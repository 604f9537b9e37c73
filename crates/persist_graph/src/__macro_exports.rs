//! Items used by generated code. Not public API.
#![doc(hidden)]

pub use alloc::borrow::Cow;
pub use alloc::boxed::Box;
pub use alloc::format;
pub use alloc::vec;

#[cfg(feature = "auto_register")]
pub use inventory;

/// The last `::` segment of a type path, e.g. `Transition` for
/// `crate::model::Transition`.
pub fn last_segment(path: &'static str) -> &'static str {
    let path = path.trim();
    match path.rfind("::") {
        Some(index) => path[index + 2..].trim(),
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::last_segment;

    #[test]
    fn segments() {
        assert_eq!(last_segment("alloc::string::String"), "String");
        assert_eq!(last_segment("crate :: model :: Transition"), "Transition");
        assert_eq!(last_segment("u8"), "u8");
    }
}
