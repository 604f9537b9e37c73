use alloc::borrow::Cow;
use alloc::format;

use crate::schema::{OptionalShape, Shape, SharedShape};
use crate::{Persist, Shared};

impl<T: Persist> Persist for Option<T> {
    fn type_path() -> Cow<'static, str> {
        Cow::Owned(format!("core::option::Option<{}>", T::type_path()))
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("Option<{}>", T::type_name()))
    }

    fn type_ident() -> &'static str {
        "Option"
    }

    fn shape() -> Shape {
        Shape::Optional(OptionalShape::of::<T>())
    }
}

impl<T: Persist> Persist for Shared<T> {
    fn type_path() -> Cow<'static, str> {
        Cow::Owned(format!("persist_graph::Shared<{}>", T::type_path()))
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("Shared<{}>", T::type_name()))
    }

    fn type_ident() -> &'static str {
        "Shared"
    }

    fn shape() -> Shape {
        Shape::Shared(SharedShape::of::<T>())
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;

    use crate::schema::OptionalShape;
    use crate::{Persist, Shared};

    #[test]
    fn names() {
        assert_eq!(<Option<Shared<u8>> as Persist>::type_name(), "Option<Shared<u8>>");
        assert_eq!(<Shared<u8> as Persist>::type_ident(), "Shared");
    }

    #[test]
    fn erased_option() {
        let shape = OptionalShape::of::<u8>();
        let none = (shape.none)();
        assert!((shape.get)(&*none).unwrap().is_none());

        let some = (shape.some)(Box::new(3_u8)).unwrap();
        let inner = (shape.get)(&*some).unwrap().unwrap();
        assert_eq!(inner.downcast_ref::<u8>(), Some(&3));
    }
}
