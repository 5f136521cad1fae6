//! Sentinel handles.
//!
//! A [`Handle`] owns one native identifier of a [`Resource`] kind, or holds
//! the kind's sentinel when it owns nothing. Ownership moves with the value;
//! the moved-from binding is gone, so two live handles can only share an
//! identifier if someone built one with the unsafe [`Handle::from_raw`].
//! Dropping a valid handle releases the identifier exactly once.
//!
//! A [`View`] borrows an identifier without owning it. Views are `Copy` and
//! never release anything.

use std::fmt;
use std::marker::PhantomData;
use std::mem;

/// A kind of native resource: the identifier type, its sentinel and the
/// native release routine.
pub trait Resource {
    /// Native identifier (descriptor, pointer, thread id, pid).
    type Id: Copy + Eq + fmt::Debug;

    /// Identifier meaning "no resource held".
    const SENTINEL: Self::Id;

    /// Human readable kind, used in logs.
    const NAME: &'static str;

    /// Whether `id` refers to a resource.
    fn is_valid(id: Self::Id) -> bool {
        id != Self::SENTINEL
    }

    /// Release `id`. Called at most once per acquired identifier, and only
    /// for valid ones. Failures are not reported.
    fn release(id: Self::Id);
}

/// Owning holder of one native identifier.
pub struct Handle<R: Resource> {
    id: R::Id,
    _resource: PhantomData<R>,
}

impl<R: Resource> Handle<R> {
    /// A handle holding the sentinel.
    pub const fn new() -> Self {
        Self {
            id: R::SENTINEL,
            _resource: PhantomData,
        }
    }

    /// Take ownership of an already acquired identifier.
    ///
    /// # Safety
    ///
    /// `id` must be the sentinel or an identifier that nothing else will
    /// release.
    pub unsafe fn from_raw(id: R::Id) -> Self {
        Self {
            id,
            _resource: PhantomData,
        }
    }

    /// Whether the handle currently owns a resource.
    pub fn valid(&self) -> bool {
        R::is_valid(self.id)
    }

    /// The held identifier, possibly the sentinel.
    pub fn raw(&self) -> R::Id {
        self.id
    }

    /// Replace the held identifier and return the previous one, without
    /// releasing anything.
    ///
    /// # Safety
    ///
    /// The caller takes over responsibility for the returned identifier,
    /// and `id` must satisfy the requirements of [`Handle::from_raw`].
    pub unsafe fn reset(&mut self, id: R::Id) -> R::Id {
        mem::replace(&mut self.id, id)
    }

    /// Return the held identifier and leave the sentinel behind. The
    /// resource is not released.
    pub fn take(&mut self) -> R::Id {
        mem::replace(&mut self.id, R::SENTINEL)
    }

    /// Give up ownership of the identifier.
    pub fn into_raw(mut self) -> R::Id {
        self.take()
    }

    /// Move `other` into `self`.
    ///
    /// The identifier `self` held before is released, unless both handles
    /// hold the same identifier, in which case releasing it would free the
    /// resource that `self` is about to own.
    pub fn assign(&mut self, mut other: Self) {
        let incoming = other.take();
        let previous = mem::replace(&mut self.id, incoming);
        if R::is_valid(previous) && previous != incoming {
            log::trace!("releasing {} {:?} on assignment", R::NAME, previous);
            R::release(previous);
        }
    }

    /// Release the held resource, if any, and return to the sentinel.
    pub fn release(&mut self) {
        let id = self.take();
        if R::is_valid(id) {
            log::trace!("releasing {} {:?}", R::NAME, id);
            R::release(id);
        }
    }

    /// Borrow the identifier as a non-owning view.
    pub fn view(&self) -> View<'_, R> {
        View {
            id: self.id,
            _borrow: PhantomData,
        }
    }
}

impl<R: Resource> Default for Handle<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> Drop for Handle<R> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<R: Resource> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &R::NAME)
            .field("id", &self.id)
            .finish()
    }
}

/// Non-owning alias of an identifier.
pub struct View<'a, R: Resource> {
    id: R::Id,
    _borrow: PhantomData<&'a R>,
}

impl<'a, R: Resource> View<'a, R> {
    /// A view of an identifier owned elsewhere.
    ///
    /// # Safety
    ///
    /// The identifier must stay valid for the lifetime `'a`.
    pub unsafe fn from_raw(id: R::Id) -> Self {
        Self {
            id,
            _borrow: PhantomData,
        }
    }

    /// Whether the viewed identifier refers to a resource.
    pub fn valid(&self) -> bool {
        R::is_valid(self.id)
    }

    /// The viewed identifier.
    pub fn raw(&self) -> R::Id {
        self.id
    }
}

impl<R: Resource> Clone for View<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Resource> Copy for View<'_, R> {}

impl<R: Resource> fmt::Debug for View<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("kind", &R::NAME)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    thread_local! {
        static RELEASED: RefCell<Vec<i32>> = const { RefCell::new(Vec::new()) };
    }

    struct Token;

    impl Resource for Token {
        type Id = i32;
        const SENTINEL: i32 = 0;
        const NAME: &'static str = "token";

        fn release(id: i32) {
            RELEASED.with(|released| released.borrow_mut().push(id));
        }
    }

    fn released() -> Vec<i32> {
        RELEASED.with(|released| released.borrow().clone())
    }

    fn token(id: i32) -> Handle<Token> {
        unsafe { Handle::from_raw(id) }
    }

    #[test]
    fn test_default_is_sentinel() {
        let handle = Handle::<Token>::default();
        assert!(!handle.valid());
        assert_eq!(handle.raw(), 0);
        drop(handle);
        assert!(released().is_empty());
    }

    #[test]
    fn test_drop_releases_once() {
        {
            let handle = token(5);
            assert!(handle.valid());
        }
        assert_eq!(released(), vec![5]);
    }

    #[test]
    fn test_take_twice_yields_sentinel() {
        let mut handle = token(3);
        assert_eq!(handle.take(), 3);
        assert_eq!(handle.take(), 0);
        assert_eq!(handle.take(), 0);
        drop(handle);
        assert!(released().is_empty());
    }

    #[test]
    fn test_reset_returns_previous() {
        let mut handle = token(4);
        let previous = unsafe { handle.reset(9) };
        assert_eq!(previous, 4);
        assert_eq!(handle.raw(), 9);
        drop(handle);
        assert_eq!(released(), vec![9]);
    }

    #[test]
    fn test_assign_releases_previous() {
        let mut b = token(2);
        let a = token(1);
        b.assign(a);
        assert_eq!(b.raw(), 1);
        assert_eq!(released(), vec![2]);
        drop(b);
        assert_eq!(released(), vec![2, 1]);
    }

    #[test]
    fn test_assign_aliased_skips_release() {
        let mut b = token(8);
        let a = token(8);
        b.assign(a);
        assert_eq!(b.raw(), 8);
        assert!(released().is_empty());
        drop(b);
        assert_eq!(released(), vec![8]);
    }

    #[test]
    fn test_assign_onto_sentinel() {
        let mut b = Handle::<Token>::new();
        b.assign(token(6));
        assert!(released().is_empty());
        assert_eq!(b.into_raw(), 6);
        assert!(released().is_empty());
    }

    #[test]
    fn test_view_never_releases() {
        let handle = token(11);
        let view = handle.view();
        let copy = view;
        assert_eq!(copy.raw(), 11);
        assert!(view.valid());
        assert!(released().is_empty());
        drop(handle);
        assert_eq!(released(), vec![11]);
    }
}
