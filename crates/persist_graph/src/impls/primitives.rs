use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::String;
use core::any::Any;
use std::path::PathBuf;

use crate::Persist;
use crate::impl_scalar;
use crate::schema::{ScalarShape, Shape, downcast_ref};

impl_scalar!(bool);
impl_scalar!(char);
impl_scalar!(i8);
impl_scalar!(i16);
impl_scalar!(i32);
impl_scalar!(i64);
impl_scalar!(i128);
impl_scalar!(isize);
impl_scalar!(u8);
impl_scalar!(u16);
impl_scalar!(u32);
impl_scalar!(u64);
impl_scalar!(u128);
impl_scalar!(usize);
impl_scalar!(f32);
impl_scalar!(f64);
impl_scalar!(String);

impl Persist for Cow<'static, str> {
    fn type_path() -> Cow<'static, str> {
        Cow::Borrowed("alloc::borrow::Cow<str>")
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("Cow<str>")
    }

    fn type_ident() -> &'static str {
        "Cow"
    }

    fn shape() -> Shape {
        Shape::Scalar(ScalarShape::new(
            |value| Ok(String::from(downcast_ref::<Cow<'static, str>>(value)?.as_ref())),
            |text| Ok(Box::new(Cow::<'static, str>::Owned(String::from(text))) as Box<dyn Any>),
        ))
    }
}

impl Persist for PathBuf {
    fn type_path() -> Cow<'static, str> {
        Cow::Borrowed("std::path::PathBuf")
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("PathBuf")
    }

    fn type_ident() -> &'static str {
        "PathBuf"
    }

    fn shape() -> Shape {
        Shape::Scalar(ScalarShape::new(
            |value| Ok(downcast_ref::<PathBuf>(value)?.to_string_lossy().into_owned()),
            |text| Ok(Box::new(PathBuf::from(text)) as Box<dyn Any>),
        ))
    }
}

#[cfg(test)]
mod tests {
    use alloc::borrow::Cow;
    use alloc::string::String;
    use std::path::PathBuf;

    use crate::Persist;
    use crate::schema::{Shape, downcast_box};

    fn text_of<T: Persist>(value: &T) -> String {
        match T::shape() {
            Shape::Scalar(scalar) => (scalar.to_text)(value).unwrap(),
            _ => panic!("not a scalar"),
        }
    }

    fn parse<T: Persist>(text: &str) -> crate::Result<T> {
        match T::shape() {
            Shape::Scalar(scalar) => downcast_box::<T>((scalar.from_text)(text)?),
            _ => panic!("not a scalar"),
        }
    }

    #[test]
    fn names() {
        assert_eq!(<i32 as Persist>::type_name(), "i32");
        assert_eq!(<String as Persist>::type_name(), "String");
        assert_eq!(<String as Persist>::type_path(), "alloc::string::String");
        assert_eq!(<PathBuf as Persist>::type_ident(), "PathBuf");
    }

    #[test]
    fn text_conversions() {
        assert_eq!(text_of(&-12_i64), "-12");
        assert_eq!(text_of(&true), "true");
        assert_eq!(text_of(&0.1_f64), "0.1");
        assert_eq!(parse::<f64>("0.1").unwrap(), 0.1);
        assert_eq!(parse::<char>("x").unwrap(), 'x');
        assert_eq!(parse::<Cow<'static, str>>("abc").unwrap(), "abc");
        assert_eq!(parse::<PathBuf>("a/b").unwrap(), PathBuf::from("a/b"));
    }

    #[test]
    fn bad_text() {
        let err = parse::<u8>("300").unwrap_err();
        assert_eq!(err.to_string(), "cannot convert `300` to `u8`");
        assert!(parse::<bool>("yes").is_err());
    }
}
