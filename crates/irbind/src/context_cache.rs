//! Context registry
//!
//! Maps native context handles to the single `Context` that owns their
//! caches. The process-wide instance is reached through
//! [`ContextCache::global`]; it is never torn down implicitly, so hosts that
//! unload the native library call [`ContextCache::dispose_all`] first.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::debug;

use irbind_sys::ContextRef;

use crate::context::Context;
use crate::error::{InteropError, InteropResult};

static GLOBAL: Lazy<ContextCache> = Lazy::new(ContextCache::new);

/// Registry of live contexts keyed by native handle
pub struct ContextCache {
    contexts: DashMap<ContextRef, Arc<Context>>,
}

impl ContextCache {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            contexts: DashMap::new(),
        }
    }

    /// The process-wide registry
    pub fn global() -> &'static ContextCache {
        &GLOBAL
    }

    /// Context registered under `handle`
    pub fn try_get_value(&self, handle: ContextRef) -> Option<Arc<Context>> {
        self.contexts.get(&handle).map(|entry| Arc::clone(entry.value()))
    }

    /// Register a context under its own handle
    pub fn add(&self, context: Arc<Context>) -> InteropResult<()> {
        let handle = context.handle();
        match self.contexts.entry(handle) {
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(context);
                debug!(?handle, "context registered");
                return Ok(());
            }
        }
        // The rejected context may be the last reference; it is dropped here,
        // outside the shard lock its disposal would take.
        Err(InteropError::DuplicateContext(handle))
    }

    /// Get the context registered under `handle`, registering `create()` if absent
    ///
    /// `create` runs at most once and must not touch this registry.
    pub fn get_or_insert_with<F>(&self, handle: ContextRef, create: F) -> InteropResult<Arc<Context>>
    where
        F: FnOnce() -> InteropResult<Arc<Context>>,
    {
        match self.contexts.entry(handle) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(slot) => {
                let context = create()?;
                slot.insert(Arc::clone(&context));
                debug!(?handle, "context registered");
                Ok(context)
            }
        }
    }

    /// Unregister `handle`, returning the context that was registered
    pub fn remove(&self, handle: ContextRef) -> Option<Arc<Context>> {
        self.contexts.remove(&handle).map(|(_, context)| context)
    }

    /// Unregister `context` if it is the one registered under its handle
    pub(crate) fn unregister(&self, context: &Context) -> bool {
        self.contexts
            .remove_if(&context.handle(), |_, registered| {
                std::ptr::eq(Arc::as_ptr(registered), context)
            })
            .is_some()
    }

    /// Registered handles
    pub fn handles(&self) -> Vec<ContextRef> {
        self.contexts.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of registered contexts
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Check if no context is registered
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Unregister every context, returning them
    pub fn drain(&self) -> Vec<Arc<Context>> {
        let handles = self.handles();
        handles
            .into_iter()
            .filter_map(|handle| self.remove(handle))
            .collect()
    }

    /// Unregister and dispose every context
    pub fn dispose_all(&self) {
        let contexts = self.drain();
        debug!(count = contexts.len(), "disposing all contexts");
        for context in contexts {
            context.dispose();
        }
    }
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContextCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCache")
            .field("len", &self.contexts.len())
            .finish()
    }
}
