//! NativeLibrary trait - the native call surface consumed by irbind
//!
//! Each method corresponds to one C entry point of the native library. The
//! trait exists so the interning layer can be driven by the real library or
//! by an in-process stand-in without depending on either.
//!
//! # Callback contract
//!
//! A native value cache stores one token per value handle. When native code
//! destroys a value or replaces all uses of it, it invokes the registered
//! callback *before* updating its own table:
//!
//! - `deleted(ctx, value, token)` - the association for `value` is dropped
//!   after the callback returns.
//! - `replaced(ctx, old, token, new) -> token` - the returned token is stored
//!   under `old`; returning [`NO_TOKEN`] drops the association instead.
//!
//! Callbacks must not touch the association of the key being updated. They
//! may add associations for other keys.

use std::ffi::c_void;

use crate::handles::{ContextRef, TypeRef, UseRef, ValueCacheRef, ValueRef};

/// Token value meaning "no association"
pub const NO_TOKEN: isize = 0;

/// Invoked when a value with a cached token is destroyed
pub type ItemDeletedCallback =
    unsafe extern "C" fn(callback_context: *mut c_void, value: ValueRef, token: isize);

/// Invoked when all uses of a value with a cached token are replaced
pub type ItemReplacedCallback = unsafe extern "C" fn(
    callback_context: *mut c_void,
    old_value: ValueRef,
    token: isize,
    new_value: ValueRef,
) -> isize;

/// The native call surface.
///
/// Handle-returning queries return the null handle where the C API returns
/// `NULL`. Queries on handles the library does not know return null or zero
/// rather than failing.
pub trait NativeLibrary: Send + Sync {
    // ========================================================================
    // Contexts
    // ========================================================================

    /// Create a new native context
    fn create_context(&self) -> ContextRef;

    /// Destroy a native context and every object it owns
    fn dispose_context(&self, context: ContextRef);

    // ========================================================================
    // Values
    // ========================================================================

    /// Raw value-kind tag of a value
    fn value_kind(&self, value: ValueRef) -> u32;

    /// Context owning a value
    fn value_context(&self, value: ValueRef) -> ContextRef;

    /// Type of a value
    fn type_of(&self, value: ValueRef) -> TypeRef;

    /// Replace every use of `old_value` with `new_value`
    ///
    /// Fires the replacement callback of every value cache holding `old_value`
    /// before returning.
    fn replace_all_uses_with(&self, old_value: ValueRef, new_value: ValueRef);

    /// Destroy a value
    ///
    /// Fires the deletion callback of every value cache holding `value`
    /// before returning.
    fn delete_value(&self, value: ValueRef);

    // ========================================================================
    // Types
    // ========================================================================

    /// Raw type-kind tag of a type
    fn type_kind(&self, ty: TypeRef) -> u32;

    /// Context owning a type
    fn type_context(&self, ty: TypeRef) -> ContextRef;

    // ========================================================================
    // Def-use chains
    // ========================================================================

    /// First use of a value
    fn first_use(&self, value: ValueRef) -> UseRef;

    /// Next use in the same chain
    fn next_use(&self, use_ref: UseRef) -> UseRef;

    /// The user holding a use
    fn use_user(&self, use_ref: UseRef) -> ValueRef;

    /// The value referenced by a use
    fn use_value(&self, use_ref: UseRef) -> ValueRef;

    /// Number of operands of a user
    fn operand_count(&self, user: ValueRef) -> u32;

    /// Operand of a user at `index`
    fn operand(&self, user: ValueRef, index: u32) -> ValueRef;

    // ========================================================================
    // Value cache
    // ========================================================================

    /// Create a native value cache bound to the given callbacks
    ///
    /// # Safety
    ///
    /// `callback_context` is passed verbatim to every callback invocation.
    /// The caller must keep whatever it points to alive until
    /// [`dispose_value_cache`](Self::dispose_value_cache) returns, and the
    /// callbacks must never unwind.
    unsafe fn create_value_cache(
        &self,
        callback_context: *mut c_void,
        deleted: Option<ItemDeletedCallback>,
        replaced: ItemReplacedCallback,
    ) -> ValueCacheRef;

    /// Destroy a native value cache; no callback fires after this returns
    fn dispose_value_cache(&self, cache: ValueCacheRef);

    /// Associate `token` with `value`
    fn value_cache_add(&self, cache: ValueCacheRef, value: ValueRef, token: isize);

    /// Token associated with `value`, or [`NO_TOKEN`]
    fn value_cache_lookup(&self, cache: ValueCacheRef, value: ValueRef) -> isize;
}
