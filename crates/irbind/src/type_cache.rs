//! Per-context type cache
//!
//! Types are never destroyed individually by the native library, so this
//! cache has no native counterpart and no callbacks: entries live until the
//! owning context is disposed.

use std::sync::Arc;

use tracing::{debug, trace};

use irbind_sys::{ContextRef, NativeLibrary, TypeRef};

use crate::dispatch;
use crate::error::{InteropError, InteropResult};
use crate::interning::HandleInterningMap;
use crate::types::IrType;

/// Interning cache for the types of one context
pub struct TypeCache {
    library: Arc<dyn NativeLibrary>,
    context: ContextRef,
    entries: HandleInterningMap<TypeRef, Arc<IrType>>,
}

impl TypeCache {
    /// Create an empty cache for `context`
    pub fn new(library: Arc<dyn NativeLibrary>, context: ContextRef, capacity: usize) -> Self {
        Self {
            library,
            context,
            entries: HandleInterningMap::with_capacity(capacity),
        }
    }

    /// Get the wrapper for `handle`, constructing it on first use
    pub fn get_or_create_item(&self, handle: TypeRef) -> InteropResult<Arc<IrType>> {
        if handle.is_null() {
            return Err(InteropError::NativeNull("type handle"));
        }

        let mut constructed = false;
        let ty = self.entries.get_or_create(
            handle,
            |h| {
                constructed = true;
                self.construct(h)
            },
            None,
        )?;

        if !constructed {
            trace!(?handle, "type cache hit");
        }
        Ok(ty)
    }

    fn construct(&self, handle: TypeRef) -> InteropResult<Arc<IrType>> {
        let actual = self.library.type_context(handle);
        if actual != self.context {
            return Err(InteropError::WrongScope {
                handle: handle.addr(),
                expected: self.context,
                actual,
            });
        }

        let (kind, class) = dispatch::classify_type(self.library.type_kind(handle))?;
        debug!(?handle, ?kind, %class, "type interned");
        Ok(Arc::new(IrType::new(handle, self.context, kind, class)))
    }

    /// Number of interned types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no type is interned
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every interned type
    pub fn snapshot(&self) -> Vec<Arc<IrType>> {
        self.entries.snapshot()
    }

    /// Drop every entry
    pub(crate) fn clear(&self) -> usize {
        self.entries.drain().len()
    }
}

impl std::fmt::Debug for TypeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeCache")
            .field("context", &self.context)
            .field("len", &self.entries.len())
            .finish()
    }
}
