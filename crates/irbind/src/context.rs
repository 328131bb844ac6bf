//! Context - owner of the per-context caches
//!
//! A `Context` wraps one native context handle and owns the value and type
//! caches for everything created in it. Contexts are registered in the
//! global [`ContextCache`] so a bare value handle can be traced back to the
//! caches that intern it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use irbind_sys::{ContextRef, NativeLibrary, TypeRef, ValueRef};

use crate::context_cache::ContextCache;
use crate::error::{InteropError, InteropResult};
use crate::options::{ContextOptions, ThreadGuard};
use crate::type_cache::TypeCache;
use crate::types::IrType;
use crate::uses::{Operands, Uses};
use crate::value::{Value, ValueType};
use crate::value_cache::ValueCache;

/// A native context and its caches
pub struct Context {
    handle: ContextRef,
    library: Arc<dyn NativeLibrary>,
    values: ValueCache,
    types: TypeCache,
    /// Whether disposal destroys the native context
    owned: bool,
    disposed: AtomicBool,
    guard: ThreadGuard,
}

impl Context {
    /// Create a native context with default options
    pub fn create(library: Arc<dyn NativeLibrary>) -> InteropResult<Arc<Context>> {
        Self::with_options(library, ContextOptions::default())
    }

    /// Create a native context
    ///
    /// The context is registered in the global registry and owns its native
    /// handle: disposal destroys it.
    pub fn with_options(
        library: Arc<dyn NativeLibrary>,
        options: ContextOptions,
    ) -> InteropResult<Arc<Context>> {
        let handle = library
            .create_context()
            .non_null()
            .ok_or(InteropError::NativeNull("context"))?;

        let context = match Self::build(library.clone(), handle, &options, true) {
            Ok(context) => Arc::new(context),
            Err(err) => {
                library.dispose_context(handle);
                return Err(err);
            }
        };

        ContextCache::global().add(Arc::clone(&context))?;
        Ok(context)
    }

    /// Get the context registered for `handle`, registering an unowned one
    /// if there is none
    ///
    /// Disposing an unowned context releases its caches but leaves the
    /// native context alive.
    pub fn from_handle(
        library: Arc<dyn NativeLibrary>,
        handle: ContextRef,
    ) -> InteropResult<Arc<Context>> {
        if handle.is_null() {
            return Err(InteropError::NativeNull("context"));
        }

        ContextCache::global().get_or_insert_with(handle, || {
            Self::build(library, handle, &ContextOptions::default(), false).map(Arc::new)
        })
    }

    fn build(
        library: Arc<dyn NativeLibrary>,
        handle: ContextRef,
        options: &ContextOptions,
        owned: bool,
    ) -> InteropResult<Self> {
        let values = ValueCache::new(
            library.clone(),
            handle,
            options.value_capacity,
            options.concurrency,
        )?;
        let types = TypeCache::new(library.clone(), handle, options.type_capacity);
        debug!(?handle, owned, concurrency = ?options.concurrency, "context created");

        Ok(Self {
            handle,
            library,
            values,
            types,
            owned,
            disposed: AtomicBool::new(false),
            guard: ThreadGuard::new(options.concurrency),
        })
    }

    /// Native context handle
    pub fn handle(&self) -> ContextRef {
        self.handle
    }

    /// The native library this context was created with
    pub fn library(&self) -> &Arc<dyn NativeLibrary> {
        &self.library
    }

    /// Check if disposal destroys the native context
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Check if the context has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Value cache of this context
    pub fn values(&self) -> &ValueCache {
        &self.values
    }

    /// Type cache of this context
    pub fn types(&self) -> &TypeCache {
        &self.types
    }

    fn ensure_live(&self) -> InteropResult<()> {
        if self.is_disposed() {
            Err(InteropError::Disposed("context"))
        } else {
            Ok(())
        }
    }

    fn check_scope(&self, value: &Value) -> InteropResult<()> {
        if value.context() == self.handle {
            Ok(())
        } else {
            Err(InteropError::WrongScope {
                handle: value.handle().addr(),
                expected: self.handle,
                actual: value.context(),
            })
        }
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Interned wrapper for a value handle
    #[track_caller]
    pub fn value_for(&self, handle: ValueRef) -> InteropResult<Arc<Value>> {
        self.ensure_live()?;
        self.values.get_or_create_item(handle, None)
    }

    /// Interned wrapper for a value handle, viewed as `T`
    #[track_caller]
    pub fn resolve<T: ValueType>(&self, handle: ValueRef) -> InteropResult<T> {
        self.ensure_live()?;
        self.values.resolve(handle)
    }

    /// Interned wrapper for a type handle
    pub fn type_for(&self, handle: TypeRef) -> InteropResult<Arc<IrType>> {
        self.guard.check("type_for")?;
        self.ensure_live()?;
        self.types.get_or_create_item(handle)
    }

    /// Type of a value
    pub fn type_of(&self, value: &Value) -> InteropResult<Arc<IrType>> {
        self.check_scope(value)?;
        self.type_for(self.library.type_of(value.handle()))
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Uses of `value`, in native chain order
    pub fn uses_of(&self, value: &Value) -> InteropResult<Uses<'_>> {
        self.guard.check("uses_of")?;
        self.ensure_live()?;
        self.check_scope(value)?;
        Ok(Uses::new(self, value.handle()))
    }

    /// Operands of `user`, in slot order
    pub fn operands_of(&self, user: &Value) -> InteropResult<Operands<'_>> {
        self.guard.check("operands_of")?;
        self.ensure_live()?;
        self.check_scope(user)?;
        Ok(Operands::new(self, user.handle()))
    }

    // ========================================================================
    // Native mutation
    // ========================================================================

    /// Replace every use of `old` with `new`
    ///
    /// Native code notifies the value cache before this returns: afterwards
    /// `old`'s handle resolves to `new`'s wrapper.
    pub fn replace_all_uses_with(&self, old: &Value, new: &Value) -> InteropResult<()> {
        self.guard.check("replace_all_uses_with")?;
        self.ensure_live()?;
        self.check_scope(old)?;
        self.check_scope(new)?;

        self.library.replace_all_uses_with(old.handle(), new.handle());
        Ok(())
    }

    /// Destroy a value
    ///
    /// Native code notifies the value cache before this returns: the entry
    /// and its pin are gone, while `Arc`s held by callers stay valid.
    pub fn delete_value(&self, value: &Value) -> InteropResult<()> {
        self.guard.check("delete_value")?;
        self.ensure_live()?;
        self.check_scope(value)?;

        self.library.delete_value(value.handle());
        Ok(())
    }

    // ========================================================================
    // Disposal
    // ========================================================================

    /// Release every cache entry and, if owned, destroy the native context
    ///
    /// Idempotent. The native value cache is disposed before the native
    /// context, so destroying the context's values fires no callback here.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        ContextCache::global().unregister(self);
        self.values.dispose();
        let types = self.types.clear();

        if self.owned {
            self.library.dispose_context(self.handle);
        }
        debug!(handle = ?self.handle, owned = self.owned, types, "context disposed");
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("handle", &self.handle)
            .field("owned", &self.owned)
            .field("values", &self.values.len())
            .field("types", &self.types.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Resolve a value handle through the context that owns it
///
/// The owning context is found through the global registry; a context seen
/// for the first time is registered unowned.
pub fn resolve<T: ValueType>(
    library: &Arc<dyn NativeLibrary>,
    handle: ValueRef,
) -> InteropResult<T> {
    if handle.is_null() {
        return Err(InteropError::NativeNull("value handle"));
    }

    let owner = library
        .value_context(handle)
        .non_null()
        .ok_or(InteropError::NativeNull("value context"))?;

    Context::from_handle(Arc::clone(library), owner)?.resolve(handle)
}
