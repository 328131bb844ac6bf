//! In-process native library
//!
//! `SimLibrary` implements [`NativeLibrary`] entirely in Rust so the
//! interning layer can be exercised without linking the real IR library.
//! It keeps the parts of the native object model the interning layer
//! observes:
//!
//! - Contexts owning values and types
//! - Value kinds and types
//! - Def-use chains and operand lists
//! - Value caches that invoke their `extern "C"` callbacks on deletion and
//!   replace-all-uses-with, following the callback contract in `irbind-sys`
//!
//! Handles are minted from a process-wide counter, so handles from different
//! `SimLibrary` instances never compare equal.
//!
//! The internal lock is never held while a callback runs: callbacks are free
//! to call back into the library.

#![warn(missing_docs)]

use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

use irbind_sys::{
    ContextRef, ItemDeletedCallback, ItemReplacedCallback, NativeLibrary, OpaqueContext,
    OpaqueType, OpaqueUse, OpaqueValue, OpaqueValueCache, TypeKind, TypeRef, UseRef,
    ValueCacheRef, ValueKind, ValueRef, NO_TOKEN,
};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

/// Next handle address. Aligned like a real allocation and never zero.
static NEXT_ADDR: AtomicUsize = AtomicUsize::new(0x10_000);

fn mint_addr() -> usize {
    NEXT_ADDR.fetch_add(0x10, Ordering::Relaxed)
}

/// Operand count as reported over the `u32` native interface, saturating
fn operand_count_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

struct SimValue {
    context: ContextRef,
    kind: u32,
    ty: TypeRef,
    /// Uses held by this value as a user, in operand order
    operands: Vec<UseRef>,
}

struct SimUse {
    user: ValueRef,
    value: ValueRef,
}

struct SimType {
    context: ContextRef,
    kind: u32,
}

struct SimCache {
    /// Opaque callback context, stored as an address so the table stays `Send`
    callback_context: usize,
    deleted: Option<ItemDeletedCallback>,
    replaced: ItemReplacedCallback,
    entries: FxHashMap<ValueRef, isize>,
}

#[derive(Default)]
struct SimState {
    contexts: FxHashSet<ContextRef>,
    values: FxHashMap<ValueRef, SimValue>,
    /// Def-use chain of each value, in the order uses were created
    use_lists: FxHashMap<ValueRef, Vec<UseRef>>,
    uses: FxHashMap<UseRef, SimUse>,
    types: FxHashMap<TypeRef, SimType>,
    caches: FxHashMap<ValueCacheRef, SimCache>,
}

/// Pending callback collected under the lock and invoked after releasing it
struct PendingCallback<F> {
    cache: ValueCacheRef,
    callback_context: usize,
    callback: F,
    token: isize,
}

/// In-process implementation of the native library
#[derive(Default)]
pub struct SimLibrary {
    state: Mutex<SimState>,
}

impl SimLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Object creation
    // ========================================================================

    /// Create a type with the given kind
    pub fn add_type(&self, context: ContextRef, kind: TypeKind) -> TypeRef {
        self.add_type_raw(context, kind.raw())
    }

    /// Create a type with an arbitrary raw kind tag
    pub fn add_type_raw(&self, context: ContextRef, kind: u32) -> TypeRef {
        let ty = TypeRef::from_raw(mint_addr() as *mut OpaqueType);
        self.state.lock().types.insert(ty, SimType { context, kind });
        ty
    }

    /// Create an untyped value with the given kind
    pub fn add_value(&self, context: ContextRef, kind: ValueKind) -> ValueRef {
        self.add_value_raw(context, kind.raw())
    }

    /// Create an untyped value with an arbitrary raw kind tag
    pub fn add_value_raw(&self, context: ContextRef, kind: u32) -> ValueRef {
        self.insert_value(context, kind, TypeRef::NULL)
    }

    /// Create a value of the given kind and type
    pub fn add_typed_value(&self, context: ContextRef, kind: ValueKind, ty: TypeRef) -> ValueRef {
        self.insert_value(context, kind.raw(), ty)
    }

    fn insert_value(&self, context: ContextRef, kind: u32, ty: TypeRef) -> ValueRef {
        let value = ValueRef::from_raw(mint_addr() as *mut OpaqueValue);
        self.state.lock().values.insert(
            value,
            SimValue {
                context,
                kind,
                ty,
                operands: Vec::new(),
            },
        );
        value
    }

    /// Append `value` to the operand list of `user`, creating a use
    ///
    /// Returns the null handle if either value is unknown.
    pub fn add_operand(&self, user: ValueRef, value: ValueRef) -> UseRef {
        let mut state = self.state.lock();
        if !state.values.contains_key(&user) || !state.values.contains_key(&value) {
            return UseRef::NULL;
        }

        let use_ref = UseRef::from_raw(mint_addr() as *mut OpaqueUse);
        state.uses.insert(use_ref, SimUse { user, value });
        state.use_lists.entry(value).or_default().push(use_ref);
        if let Some(user_value) = state.values.get_mut(&user) {
            user_value.operands.push(use_ref);
        }
        use_ref
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Check if a value is still alive
    pub fn value_exists(&self, value: ValueRef) -> bool {
        self.state.lock().values.contains_key(&value)
    }

    /// Number of associations held by a value cache
    pub fn cache_len(&self, cache: ValueCacheRef) -> usize {
        self.state
            .lock()
            .caches
            .get(&cache)
            .map_or(0, |c| c.entries.len())
    }

    /// Number of live value caches
    pub fn cache_count(&self) -> usize {
        self.state.lock().caches.len()
    }

    /// Check if a context is alive
    pub fn context_exists(&self, context: ContextRef) -> bool {
        self.state.lock().contexts.contains(&context)
    }

    // ========================================================================
    // Direct callback invocation
    // ========================================================================

    /// Invoke the deletion callback of `cache` without touching any table
    ///
    /// Used to replay notifications, e.g. a duplicate deletion.
    pub fn fire_item_deleted(&self, cache: ValueCacheRef, value: ValueRef, token: isize) {
        let target = {
            let state = self.state.lock();
            state
                .caches
                .get(&cache)
                .and_then(|c| c.deleted.map(|cb| (c.callback_context, cb)))
        };

        if let Some((callback_context, callback)) = target {
            // SAFETY: the callback and its context were registered together
            // through `create_value_cache` and the cache is still alive.
            unsafe { callback(callback_context as *mut c_void, value, token) };
        }
    }

    /// Invoke the replacement callback of `cache` without touching any table
    ///
    /// Returns the token produced by the callback, or `NO_TOKEN` if the
    /// cache is unknown.
    pub fn fire_item_replaced(
        &self,
        cache: ValueCacheRef,
        old_value: ValueRef,
        token: isize,
        new_value: ValueRef,
    ) -> isize {
        let target = {
            let state = self.state.lock();
            state
                .caches
                .get(&cache)
                .map(|c| (c.callback_context, c.replaced))
        };

        match target {
            // SAFETY: see `fire_item_deleted`.
            Some((callback_context, callback)) => unsafe {
                callback(callback_context as *mut c_void, old_value, token, new_value)
            },
            None => NO_TOKEN,
        }
    }

    fn pending_deletions(
        state: &SimState,
        value: ValueRef,
    ) -> Vec<PendingCallback<ItemDeletedCallback>> {
        state
            .caches
            .iter()
            .filter_map(|(cache_ref, cache)| {
                let token = *cache.entries.get(&value)?;
                let callback = cache.deleted?;
                Some(PendingCallback {
                    cache: *cache_ref,
                    callback_context: cache.callback_context,
                    callback,
                    token,
                })
            })
            .collect()
    }

    fn remove_value(state: &mut SimState, value: ValueRef) {
        for cache in state.caches.values_mut() {
            cache.entries.remove(&value);
        }

        let Some(removed) = state.values.remove(&value) else {
            return;
        };

        // Uses held by the removed value as a user
        for use_ref in removed.operands {
            if let Some(sim_use) = state.uses.remove(&use_ref) {
                if let Some(list) = state.use_lists.get_mut(&sim_use.value) {
                    list.retain(|u| *u != use_ref);
                }
            }
        }

        // Uses of the removed value held by other users
        for use_ref in state.use_lists.remove(&value).unwrap_or_default() {
            if let Some(sim_use) = state.uses.remove(&use_ref) {
                if let Some(user) = state.values.get_mut(&sim_use.user) {
                    user.operands.retain(|u| *u != use_ref);
                }
            }
        }
    }
}

impl NativeLibrary for SimLibrary {
    fn create_context(&self) -> ContextRef {
        let context = ContextRef::from_raw(mint_addr() as *mut OpaqueContext);
        self.state.lock().contexts.insert(context);
        tracing::trace!(?context, "sim: context created");
        context
    }

    fn dispose_context(&self, context: ContextRef) {
        let owned: Vec<ValueRef> = {
            let state = self.state.lock();
            if !state.contexts.contains(&context) {
                return;
            }
            state
                .values
                .iter()
                .filter(|(_, v)| v.context == context)
                .map(|(handle, _)| *handle)
                .collect()
        };

        // Destroying the context destroys its values, notifying any cache
        // that is still registered.
        for value in owned {
            self.delete_value(value);
        }

        let mut state = self.state.lock();
        state.types.retain(|_, t| t.context != context);
        state.contexts.remove(&context);
        tracing::trace!(?context, "sim: context disposed");
    }

    fn value_kind(&self, value: ValueRef) -> u32 {
        self.state.lock().values.get(&value).map_or(0, |v| v.kind)
    }

    fn value_context(&self, value: ValueRef) -> ContextRef {
        self.state
            .lock()
            .values
            .get(&value)
            .map_or(ContextRef::NULL, |v| v.context)
    }

    fn type_of(&self, value: ValueRef) -> TypeRef {
        self.state
            .lock()
            .values
            .get(&value)
            .map_or(TypeRef::NULL, |v| v.ty)
    }

    fn replace_all_uses_with(&self, old_value: ValueRef, new_value: ValueRef) {
        if old_value == new_value {
            return;
        }

        let pending: Vec<PendingCallback<ItemReplacedCallback>> = {
            let mut state = self.state.lock();
            if !state.values.contains_key(&old_value) || !state.values.contains_key(&new_value) {
                return;
            }

            let moved = state.use_lists.remove(&old_value).unwrap_or_default();
            for use_ref in &moved {
                if let Some(sim_use) = state.uses.get_mut(use_ref) {
                    sim_use.value = new_value;
                }
            }
            state.use_lists.entry(new_value).or_default().extend(moved);

            state
                .caches
                .iter()
                .filter_map(|(cache_ref, cache)| {
                    let token = *cache.entries.get(&old_value)?;
                    Some(PendingCallback {
                        cache: *cache_ref,
                        callback_context: cache.callback_context,
                        callback: cache.replaced,
                        token,
                    })
                })
                .collect()
        };

        for p in pending {
            // SAFETY: the callback and its context were registered together
            // and the cache was alive when the callback was collected.
            let replacement = unsafe {
                (p.callback)(p.callback_context as *mut c_void, old_value, p.token, new_value)
            };

            let mut state = self.state.lock();
            if let Some(cache) = state.caches.get_mut(&p.cache) {
                if replacement == NO_TOKEN {
                    cache.entries.remove(&old_value);
                } else {
                    cache.entries.insert(old_value, replacement);
                }
            }
        }
    }

    fn delete_value(&self, value: ValueRef) {
        let pending = {
            let state = self.state.lock();
            if !state.values.contains_key(&value) {
                return;
            }
            Self::pending_deletions(&state, value)
        };

        for p in pending {
            // SAFETY: see `replace_all_uses_with`.
            unsafe { (p.callback)(p.callback_context as *mut c_void, value, p.token) };
            tracing::trace!(cache = ?p.cache, ?value, "sim: deletion delivered");
        }

        Self::remove_value(&mut self.state.lock(), value);
    }

    fn type_kind(&self, ty: TypeRef) -> u32 {
        self.state.lock().types.get(&ty).map_or(0, |t| t.kind)
    }

    fn type_context(&self, ty: TypeRef) -> ContextRef {
        self.state
            .lock()
            .types
            .get(&ty)
            .map_or(ContextRef::NULL, |t| t.context)
    }

    fn first_use(&self, value: ValueRef) -> UseRef {
        self.state
            .lock()
            .use_lists
            .get(&value)
            .and_then(|list| list.first().copied())
            .unwrap_or(UseRef::NULL)
    }

    fn next_use(&self, use_ref: UseRef) -> UseRef {
        let state = self.state.lock();
        let Some(sim_use) = state.uses.get(&use_ref) else {
            return UseRef::NULL;
        };
        let Some(list) = state.use_lists.get(&sim_use.value) else {
            return UseRef::NULL;
        };
        list.iter()
            .position(|u| *u == use_ref)
            .and_then(|i| list.get(i + 1).copied())
            .unwrap_or(UseRef::NULL)
    }

    fn use_user(&self, use_ref: UseRef) -> ValueRef {
        self.state
            .lock()
            .uses
            .get(&use_ref)
            .map_or(ValueRef::NULL, |u| u.user)
    }

    fn use_value(&self, use_ref: UseRef) -> ValueRef {
        self.state
            .lock()
            .uses
            .get(&use_ref)
            .map_or(ValueRef::NULL, |u| u.value)
    }

    fn operand_count(&self, user: ValueRef) -> u32 {
        self.state
            .lock()
            .values
            .get(&user)
            .map_or(0, |v| operand_count_u32(v.operands.len()))
    }

    fn operand(&self, user: ValueRef, index: u32) -> ValueRef {
        let state = self.state.lock();
        state
            .values
            .get(&user)
            .and_then(|v| v.operands.get(index as usize))
            .and_then(|u| state.uses.get(u))
            .map_or(ValueRef::NULL, |u| u.value)
    }

    unsafe fn create_value_cache(
        &self,
        callback_context: *mut c_void,
        deleted: Option<ItemDeletedCallback>,
        replaced: ItemReplacedCallback,
    ) -> ValueCacheRef {
        let cache = ValueCacheRef::from_raw(mint_addr() as *mut OpaqueValueCache);
        self.state.lock().caches.insert(
            cache,
            SimCache {
                callback_context: callback_context as usize,
                deleted,
                replaced,
                entries: FxHashMap::default(),
            },
        );
        cache
    }

    fn dispose_value_cache(&self, cache: ValueCacheRef) {
        self.state.lock().caches.remove(&cache);
    }

    fn value_cache_add(&self, cache: ValueCacheRef, value: ValueRef, token: isize) {
        if let Some(c) = self.state.lock().caches.get_mut(&cache) {
            c.entries.insert(value, token);
        }
    }

    fn value_cache_lookup(&self, cache: ValueCacheRef, value: ValueRef) -> isize {
        self.state
            .lock()
            .caches
            .get(&cache)
            .and_then(|c| c.entries.get(&value).copied())
            .unwrap_or(NO_TOKEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicIsize;

    static LAST_DELETED: AtomicIsize = AtomicIsize::new(0);

    unsafe extern "C" fn record_deleted(_ctx: *mut c_void, _value: ValueRef, token: isize) {
        LAST_DELETED.store(token, Ordering::SeqCst);
    }

    unsafe extern "C" fn bump_replaced(
        _ctx: *mut c_void,
        _old: ValueRef,
        token: isize,
        _new: ValueRef,
    ) -> isize {
        token + 100
    }

    #[test]
    fn test_handles_are_unique() {
        let sim = SimLibrary::new();
        let ctx = sim.create_context();
        let a = sim.add_value(ctx, ValueKind::Argument);
        let b = sim.add_value(ctx, ValueKind::Argument);
        assert_ne!(a, b);
        assert!(!a.is_null());
        assert_eq!(sim.value_context(a), ctx);
        assert_eq!(sim.value_kind(b), ValueKind::Argument.raw());
    }

    #[test]
    fn test_use_chain_and_operands() {
        let sim = SimLibrary::new();
        let ctx = sim.create_context();
        let arg = sim.add_value(ctx, ValueKind::Argument);
        let add = sim.add_value(ctx, ValueKind::Add);
        let mul = sim.add_value(ctx, ValueKind::Mul);

        let u1 = sim.add_operand(add, arg);
        let u2 = sim.add_operand(mul, arg);

        assert_eq!(sim.first_use(arg), u1);
        assert_eq!(sim.next_use(u1), u2);
        assert!(sim.next_use(u2).is_null());
        assert_eq!(sim.use_user(u2), mul);
        assert_eq!(sim.use_value(u2), arg);
        assert_eq!(sim.operand_count(add), 1);
        assert_eq!(sim.operand(add, 0), arg);
        assert!(sim.operand(add, 1).is_null());
    }

    #[test]
    fn test_operand_count_saturates() {
        assert_eq!(operand_count_u32(3), 3);
        assert_eq!(operand_count_u32(u32::MAX as usize), u32::MAX);
        assert_eq!(operand_count_u32(usize::MAX), u32::MAX);
    }

    #[test]
    fn test_rauw_moves_uses_and_updates_cache() {
        let sim = SimLibrary::new();
        let ctx = sim.create_context();
        let old = sim.add_value(ctx, ValueKind::Argument);
        let new = sim.add_value(ctx, ValueKind::Argument);
        let user = sim.add_value(ctx, ValueKind::Ret);
        sim.add_operand(user, old);

        let cache = unsafe {
            sim.create_value_cache(std::ptr::null_mut(), Some(record_deleted), bump_replaced)
        };
        sim.value_cache_add(cache, old, 7);

        sim.replace_all_uses_with(old, new);

        assert_eq!(sim.operand(user, 0), new);
        assert!(sim.first_use(old).is_null());
        assert_eq!(sim.value_cache_lookup(cache, old), 107);
    }

    #[test]
    fn test_delete_fires_callback_then_drops_association() {
        let sim = SimLibrary::new();
        let ctx = sim.create_context();
        let value = sim.add_value(ctx, ValueKind::Alloca);

        let cache = unsafe {
            sim.create_value_cache(std::ptr::null_mut(), Some(record_deleted), bump_replaced)
        };
        sim.value_cache_add(cache, value, 42);

        sim.delete_value(value);

        assert_eq!(LAST_DELETED.load(Ordering::SeqCst), 42);
        assert_eq!(sim.value_cache_lookup(cache, value), NO_TOKEN);
        assert!(!sim.value_exists(value));
        assert_eq!(sim.cache_len(cache), 0);
    }

    #[test]
    fn test_dispose_context_removes_owned_objects() {
        let sim = SimLibrary::new();
        let ctx = sim.create_context();
        let ty = sim.add_type(ctx, TypeKind::Integer);
        let value = sim.add_typed_value(ctx, ValueKind::ConstantInt, ty);

        assert_eq!(sim.type_of(value), ty);
        sim.dispose_context(ctx);

        assert!(!sim.context_exists(ctx));
        assert!(!sim.value_exists(value));
        assert!(sim.type_context(ty).is_null());
    }
}
