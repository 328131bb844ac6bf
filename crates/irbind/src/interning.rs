//! Handle interning map
//!
//! Maps native handles to the single wrapper created for each. First
//! insertion for a handle is linearized by the map lock, so two threads
//! racing on a never-seen handle observe the same wrapper.
//!
//! Entries are never removed by callers. Removal is crate-internal and only
//! reachable from native notifications and context disposal.

use std::fmt;
use std::hash::Hash;

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;

/// Keyed cache enforcing one wrapper per native handle
pub struct HandleInterningMap<H, M> {
    entries: Mutex<FxHashMap<H, M>>,
}

impl<H, M> HandleInterningMap<H, M>
where
    H: Copy + Eq + Hash,
    M: Clone,
{
    /// Create an empty map
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty map with room for `capacity` handles
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(FxHashMap::with_capacity_and_hasher(
                capacity,
                Default::default(),
            )),
        }
    }

    /// Get the wrapper for `handle`, creating it with `factory` on first use
    ///
    /// On a hit, `found_handle_release` (if any) is invoked with the handle
    /// after the lock is released, so callers can drop a duplicate native
    /// reference they obtained while fetching an already-known handle.
    ///
    /// On a miss, `factory` runs exactly once under the map lock. If it fails
    /// nothing is cached and the error is returned. The factory must not
    /// re-enter this map.
    pub fn get_or_create<E, F>(
        &self,
        handle: H,
        factory: F,
        found_handle_release: Option<&dyn Fn(H)>,
    ) -> Result<M, E>
    where
        F: FnOnce(H) -> Result<M, E>,
    {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&handle) {
            let existing = existing.clone();
            drop(entries);
            if let Some(release) = found_handle_release {
                release(handle);
            }
            return Ok(existing);
        }

        let created = factory(handle)?;
        entries.insert(handle, created.clone());
        Ok(created)
    }

    /// Get the wrapper for `handle` if it is interned
    pub fn get(&self, handle: H) -> Option<M> {
        self.entries.lock().get(&handle).cloned()
    }

    /// Check if `handle` is interned
    pub fn contains(&self, handle: H) -> bool {
        self.entries.lock().contains_key(&handle)
    }

    /// Number of interned handles
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every interned wrapper, for diagnostics and shutdown sweeps
    pub fn snapshot(&self) -> Vec<M> {
        self.entries.lock().values().cloned().collect()
    }

    /// Lock the map for a compound update (callback handlers)
    pub(crate) fn lock(&self) -> MutexGuard<'_, FxHashMap<H, M>> {
        self.entries.lock()
    }

    /// Remove all entries, returning them
    pub(crate) fn drain(&self) -> Vec<(H, M)> {
        self.entries.lock().drain().collect()
    }
}

impl<H, M> Default for HandleInterningMap<H, M>
where
    H: Copy + Eq + Hash,
    M: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<H, M> fmt::Debug for HandleInterningMap<H, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleInterningMap")
            .field("len", &self.entries.lock().len())
            .finish()
    }
}
