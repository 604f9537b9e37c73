use alloc::boxed::Box;
use alloc::rc::Rc;
use core::any::Any;
use core::cell::{Ref, RefCell, RefMut};
use core::fmt;

use crate::schema::{Persist, TypeRef, downcast_box, downcast_ref};
use crate::{Error, Result};

// -----------------------------------------------------------------------------
// Shared

/// A value with object identity.
///
/// Clones of a `Shared` point to the same value, and the archive writes that
/// value once. Members marked as references hold a `Shared` and are written
/// as the address of the owning occurrence.
///
/// ```
/// use persist_graph::Shared;
///
/// let a = Shared::new(1);
/// let b = a.clone();
/// *b.borrow_mut() += 1;
///
/// assert_eq!(*a.borrow(), 2);
/// assert!(Shared::ptr_eq(&a, &b));
/// assert!(!Shared::ptr_eq(&a, &Shared::new(2)));
/// ```
pub struct Shared<T>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Immutably borrows the value.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently mutably borrowed.
    #[inline]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Mutably borrows the value.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently borrowed.
    #[inline]
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Returns `true` if both handles point to the same value.
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }

    /// Address of the shared allocation; stable while any handle lives.
    #[inline]
    pub fn identity(this: &Self) -> usize {
        Rc::as_ptr(&this.0) as *const () as usize
    }
}

impl<T> Clone for Shared<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Default> Default for Shared<T> {
    #[inline]
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared({:#x})", Self::identity(self))
    }
}

impl<T> From<T> for Shared<T> {
    #[inline]
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

// -----------------------------------------------------------------------------
// SharedShape

type Visit<'v> = &'v mut dyn FnMut(&dyn Any) -> Result<()>;
type VisitMut<'v> = &'v mut dyn FnMut(&mut dyn Any) -> Result<()>;

/// Type-erased operations of `Shared<T>`.
///
/// The handle half (`handle`/`from_handle`) lets the reader keep one
/// `Rc<dyn Any>` per address and hand out typed clones of it later.
#[derive(Clone, Copy)]
pub struct SharedShape {
    pub(crate) inner: TypeRef,
    pub(crate) identity: fn(&dyn Any) -> Result<usize>,
    pub(crate) with: fn(&dyn Any, Visit<'_>) -> Result<()>,
    pub(crate) with_mut: fn(&dyn Any, VisitMut<'_>) -> Result<()>,
    pub(crate) wrap: fn(Box<dyn Any>) -> Result<Box<dyn Any>>,
    pub(crate) handle: fn(&dyn Any) -> Result<Rc<dyn Any>>,
    pub(crate) from_handle: fn(Rc<dyn Any>) -> Result<Box<dyn Any>>,
}

impl SharedShape {
    /// The shape of `Shared<T>`.
    pub fn of<T: Persist>() -> Self {
        Self {
            inner: TypeRef::of::<T>(),
            identity: |value| downcast_ref::<Shared<T>>(value).map(Shared::identity),
            with: |value, visit| {
                let shared = downcast_ref::<Shared<T>>(value)?;
                let inner = shared.0.try_borrow().map_err(|_| busy::<T>())?;
                visit(&*inner)
            },
            with_mut: |value, visit| {
                let shared = downcast_ref::<Shared<T>>(value)?;
                let mut inner = shared.0.try_borrow_mut().map_err(|_| busy::<T>())?;
                visit(&mut *inner)
            },
            wrap: |value| Ok(Box::new(Shared::new(downcast_box::<T>(value)?))),
            handle: |value| {
                let shared = downcast_ref::<Shared<T>>(value)?;
                Ok(Rc::clone(&shared.0) as Rc<dyn Any>)
            },
            from_handle: |handle| match handle.downcast::<RefCell<T>>() {
                Ok(cell) => Ok(Box::new(Shared(cell))),
                Err(_) => Err(Error::mismatch(T::type_name())),
            },
        }
    }
}

fn busy<T: Persist>() -> Error {
    Error::Structural(alloc::format!(
        "`Shared<{}>` is already borrowed",
        T::type_name()
    ))
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::string::String;

    use super::{Shared, SharedShape};

    #[test]
    fn handles_keep_identity() {
        let shape = SharedShape::of::<String>();
        let value = Shared::new(String::from("x"));

        let handle = (shape.handle)(&value).unwrap();
        let back = (shape.from_handle)(handle).unwrap();
        let back = back.downcast::<Shared<String>>().unwrap();

        assert!(Shared::ptr_eq(&value, &back));
        assert_eq!((shape.identity)(&value).unwrap(), Shared::identity(&back));
    }

    #[test]
    fn wrong_handle() {
        let shape = SharedShape::of::<String>();
        let other = Shared::new(3_u8);
        let handle = (SharedShape::of::<u8>().handle)(&other).unwrap();
        assert!((shape.from_handle)(handle).is_err());
        assert!((shape.wrap)(Box::new(3_u8)).is_err());
    }

    #[test]
    fn borrowed_value_is_an_error() {
        let shape = SharedShape::of::<u8>();
        let value = Shared::new(3_u8);
        let _guard = value.borrow_mut();
        assert!((shape.with)(&value, &mut |_| Ok(())).is_err());
    }
}
