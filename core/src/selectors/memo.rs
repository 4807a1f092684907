//! Memoized selectors.

use std::sync::{Arc, Mutex, PoisonError};

/// Caches the last result of a derivation.
///
/// While the key is unchanged, [`get`](Self::get) hands back the same `Arc`,
/// so callers can compare results with [`Arc::ptr_eq`] to skip work. Key on
/// the store revisions the derivation reads plus its arguments.
pub struct Memoized<K, V> {
    last: Mutex<Option<(K, Arc<V>)>>,
}

impl<K: PartialEq, V> Memoized<K, V> {
    /// An empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    /// The cached value for `key`, computing it if the key changed.
    pub fn get(&self, key: K, compute: impl FnOnce() -> V) -> Arc<V> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_key, value)) = last.as_ref() {
            if *cached_key == key {
                return Arc::clone(value);
            }
        }
        let value = Arc::new(compute());
        *last = Some((key, Arc::clone(&value)));
        value
    }

    /// Drop the cached value.
    pub fn invalidate(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl<K: PartialEq, V> Default for Memoized<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for Memoized<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memoized").finish_non_exhaustive()
    }
}
