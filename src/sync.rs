//! Locking primitives behind the `thread-safe` feature.
//!
//! With the feature enabled (the default) every lock is a real `parking_lot`
//! lock and the crate's trait objects are `Send + Sync`. With the feature
//! disabled the same call sites compile against `RefCell`-backed shims, so a
//! single-threaded consumer pays nothing for synchronization. Semantics are
//! identical either way.

#[cfg(feature = "thread-safe")]
mod imp {
    pub(crate) type Mutex<T> = parking_lot::Mutex<T>;
    pub(crate) type RwLock<T> = parking_lot::RwLock<T>;
}

#[cfg(not(feature = "thread-safe"))]
mod imp {
    use std::cell::{Ref, RefCell, RefMut};

    /// Single-threaded stand-in for a mutex; `lock` is a plain borrow.
    pub(crate) struct Mutex<T>(RefCell<T>);

    impl<T> Mutex<T> {
        pub(crate) fn new(value: T) -> Self {
            Self(RefCell::new(value))
        }

        pub(crate) fn lock(&self) -> RefMut<'_, T> {
            self.0.borrow_mut()
        }
    }

    /// Single-threaded stand-in for a reader-writer lock.
    pub(crate) struct RwLock<T>(RefCell<T>);

    impl<T> RwLock<T> {
        pub(crate) fn new(value: T) -> Self {
            Self(RefCell::new(value))
        }

        pub(crate) fn read(&self) -> Ref<'_, T> {
            self.0.borrow()
        }

        pub(crate) fn write(&self) -> RefMut<'_, T> {
            self.0.borrow_mut()
        }
    }
}

pub(crate) use imp::{Mutex, RwLock};
