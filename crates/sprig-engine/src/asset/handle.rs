use std::fmt;
use std::rc::{Rc, Weak};

/// Non-owning reference to a cache entry.
///
/// The cache holds the only owning reference. Once the entry is unloaded or
/// overwritten the handle reports [`is_expired`](Self::is_expired) and
/// [`upgrade`](Self::upgrade) returns `None`; it never observes a freed
/// resource.
pub struct WeakHandle<T>(Weak<T>);

impl<T> WeakHandle<T> {
    /// A handle that refers to nothing.
    #[inline]
    pub fn empty() -> Self {
        Self(Weak::new())
    }

    #[inline]
    pub(crate) fn new(owner: &Rc<T>) -> Self {
        Self(Rc::downgrade(owner))
    }

    /// Temporarily borrows the resource. Do not store the result.
    #[inline]
    pub fn upgrade(&self) -> Option<Rc<T>> {
        self.0.upgrade()
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.0.strong_count() == 0
    }

    /// Whether both handles refer to the same cache entry.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for WeakHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakHandle")
            .field(&if self.is_expired() { "expired" } else { "live" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_handle_is_expired() {
        let h: WeakHandle<u32> = WeakHandle::empty();
        assert!(h.is_expired());
        assert!(h.upgrade().is_none());
    }

    #[test]
    fn handle_expires_with_owner() {
        let owner = Rc::new(7u32);
        let h = WeakHandle::new(&owner);
        assert_eq!(h.upgrade().as_deref(), Some(&7));
        drop(owner);
        assert!(h.is_expired());
    }

    #[test]
    fn clones_share_identity() {
        let owner = Rc::new(1u8);
        let a = WeakHandle::new(&owner);
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&WeakHandle::new(&Rc::new(1u8))));
    }
}
