//! # Decoded-State Store
//!
//! Latest decoded state of one link behind a reader/writer lock. The link's
//! worker is the only writer and applies each frame inside a single write
//! section, so readers never observe half of one frame mixed with another.

use std::sync::{Arc, PoisonError, RwLock};

/// Shared handle to one link's decoded state.
#[derive(Debug, Default)]
pub struct StateStore<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for StateStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> StateStore<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    /// Run `f` against the current state under the read lock.
    ///
    /// The lock is held only for the duration of `f`.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Apply a whole update under the write lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl<T: Clone> StateStore<T> {
    /// Copy of the current state.
    pub fn snapshot(&self) -> T {
        self.read(T::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Pair {
        a: u32,
        b: u32,
    }

    #[test]
    fn test_update_then_snapshot() {
        let store = StateStore::new(Pair::default());
        store.update(|p| {
            p.a = 1;
            p.b = 2;
        });
        assert_eq!(store.snapshot(), Pair { a: 1, b: 2 });
    }

    #[test]
    fn test_clones_share_state() {
        let writer = StateStore::new(Pair::default());
        let reader = writer.clone();

        writer.update(|p| p.a = 7);
        assert_eq!(reader.read(|p| p.a), 7);
    }

    #[test]
    fn test_readers_never_see_torn_updates() {
        let store = StateStore::new(Pair::default());
        let reader = store.clone();

        let handle = std::thread::spawn(move || {
            for _ in 0..10_000 {
                let p = reader.snapshot();
                assert_eq!(p.a, p.b, "observed a half-applied update");
            }
        });

        for i in 0..10_000 {
            store.update(|p| {
                p.a = i;
                p.b = i;
            });
        }

        handle.join().unwrap();
    }
}
