//! Per-context value cache
//!
//! Interns value handles and keeps the interning in step with native code.
//! Every interned handle is registered with a native value cache under a
//! token; native code echoes that token back when it deletes the value or
//! replaces all uses of it, and the callbacks in [`crate::callback`] apply
//! the change here.
//!
//! Each entry holds the token together with a strong `Arc<Value>`. That
//! `Arc` is the pin kept alive on behalf of native code: entry and pin are
//! always inserted and removed together under the map lock.
//!
//! # Lock discipline
//!
//! Native mutations (`replace_all_uses_with`, `delete_value`) invoke the
//! callbacks before returning, and the callbacks take the map lock. They are
//! therefore never issued while the map lock is held.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use tracing::{debug, trace, warn};

use irbind_sys::{ContextRef, NativeLibrary, ValueCacheRef, ValueRef};

use crate::callback;
use crate::dispatch;
use crate::error::{InteropError, InteropResult};
use crate::interning::HandleInterningMap;
use crate::options::{ConcurrencyPolicy, ThreadGuard};
use crate::value::{Value, ValueType};

/// A cache entry: the token registered with native code and the pinned wrapper
#[derive(Clone)]
pub(crate) struct PinnedValue {
    token: isize,
    value: Arc<Value>,
}

/// Counters describing cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently pinned
    pub live: usize,
    /// Wrappers constructed
    pub constructed: u64,
    /// Entries released by deletion callbacks or disposal
    pub released: u64,
    /// Entries repointed by replacement callbacks
    pub replaced: u64,
}

/// State shared with the native callbacks
///
/// The callbacks reach this through a `Weak` whose raw pointer is registered
/// as the native callback context.
pub(crate) struct ValueCacheInner {
    library: Arc<dyn NativeLibrary>,
    context: ContextRef,
    entries: HandleInterningMap<ValueRef, PinnedValue>,
    native: OnceCell<ValueCacheRef>,
    next_token: AtomicIsize,
    constructed: AtomicU64,
    released: AtomicU64,
    replaced: AtomicU64,
}

impl ValueCacheInner {
    fn native(&self) -> InteropResult<ValueCacheRef> {
        self.native
            .get()
            .copied()
            .ok_or(InteropError::Disposed("native value cache"))
    }

    fn mint_token(&self) -> isize {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    /// Build and register the wrapper for a handle not yet interned
    ///
    /// Runs under the map lock. The native registration does not fire any
    /// callback, so calling into the library here is safe.
    fn construct(&self, handle: ValueRef) -> InteropResult<PinnedValue> {
        let native = self.native()?;

        let actual = self.library.value_context(handle);
        if actual != self.context {
            return Err(InteropError::WrongScope {
                handle: handle.addr(),
                expected: self.context,
                actual,
            });
        }

        let tag = self.library.value_kind(handle);
        let class = dispatch::classify_value(tag)?;
        let value = Arc::new(Value::new(handle, self.context, tag, class));

        let token = self.mint_token();
        self.library.value_cache_add(native, handle, token);
        self.constructed.fetch_add(1, Ordering::Relaxed);

        debug!(?handle, %class, tag, token, "value interned");
        Ok(PinnedValue { token, value })
    }

    /// Apply a native deletion notification
    ///
    /// Native code destroys the handle whatever this returns, so the entry
    /// goes even when the echoed token disagrees with the cached one.
    pub(crate) fn on_item_deleted(&self, handle: ValueRef, token: isize) -> InteropResult<()> {
        let removed = self.entries.lock().remove(&handle).ok_or_else(|| {
            InteropError::ReentrantCorruption(format!(
                "deletion of {handle:?} (token {token}) with no cached entry"
            ))
        })?;

        self.released.fetch_add(1, Ordering::Relaxed);
        if removed.token != token {
            warn!(
                ?handle,
                token,
                cached = removed.token,
                "deletion token mismatch, entry released"
            );
        } else {
            debug!(?handle, token, "value released");
        }
        drop(removed);
        Ok(())
    }

    /// Apply a native replace-all-uses-with notification
    ///
    /// Returns the token native code must store under `old`.
    pub(crate) fn on_item_replaced(
        &self,
        old: ValueRef,
        token: isize,
        new: ValueRef,
    ) -> InteropResult<isize> {
        let mut entries = self.entries.lock();
        match entries.get(&old).map(|entry| entry.token) {
            None => {
                return Err(InteropError::ReentrantCorruption(format!(
                    "replacement of {old:?} (token {token}) with no cached entry"
                )))
            }
            Some(cached) if cached != token => {
                // Returning no token makes native code forget `old` too
                let stale = entries.remove(&old);
                drop(entries);
                self.released.fetch_add(1, Ordering::Relaxed);
                drop(stale);
                return Err(InteropError::ReentrantCorruption(format!(
                    "replacement of {old:?} with token {token}, cached token is {cached}"
                )));
            }
            Some(_) => {}
        }

        let existing = entries.get(&new).map(|entry| Arc::clone(&entry.value));
        let replacement = match existing {
            Some(value) => value,
            None => match self.construct(new) {
                Ok(pinned) => {
                    let value = Arc::clone(&pinned.value);
                    entries.insert(new, pinned);
                    value
                }
                Err(err) => {
                    // Native code drops the association when the callback
                    // fails, so the entry goes with it.
                    entries.remove(&old);
                    self.released.fetch_add(1, Ordering::Relaxed);
                    return Err(err);
                }
            },
        };

        let new_token = self.mint_token();
        entries.insert(
            old,
            PinnedValue {
                token: new_token,
                value: replacement,
            },
        );
        drop(entries);

        self.replaced.fetch_add(1, Ordering::Relaxed);
        debug!(?old, ?new, token, new_token, "value replaced");
        Ok(new_token)
    }
}

/// Interning cache for the values of one context
pub struct ValueCache {
    inner: Arc<ValueCacheInner>,
    /// `Weak::into_raw` of `inner`, registered as the callback context
    callback_context: AtomicUsize,
    disposed: AtomicBool,
    guard: ThreadGuard,
}

impl ValueCache {
    /// Create a cache for `context` and its native counterpart
    pub fn new(
        library: Arc<dyn NativeLibrary>,
        context: ContextRef,
        capacity: usize,
        concurrency: ConcurrencyPolicy,
    ) -> InteropResult<Self> {
        let inner = Arc::new(ValueCacheInner {
            library,
            context,
            entries: HandleInterningMap::with_capacity(capacity),
            native: OnceCell::new(),
            next_token: AtomicIsize::new(1),
            constructed: AtomicU64::new(0),
            released: AtomicU64::new(0),
            replaced: AtomicU64::new(0),
        });

        let weak = Weak::into_raw(Arc::downgrade(&inner));

        // SAFETY: `weak` stays valid until `dispose` reclaims it, which only
        // happens after the native cache is disposed. Both callbacks catch
        // every panic before returning to native code.
        let native = unsafe {
            inner.library.create_value_cache(
                weak as *mut c_void,
                Some(callback::native_on_item_deleted),
                callback::native_on_item_replaced,
            )
        };

        if native.is_null() {
            // SAFETY: produced by `Weak::into_raw` above and never registered.
            unsafe { drop(Weak::from_raw(weak)) };
            return Err(InteropError::NativeNull("value cache"));
        }

        // Freshly created cell; cannot already be set.
        let _ = inner.native.set(native);
        debug!(?context, ?native, "value cache created");

        Ok(Self {
            inner,
            callback_context: AtomicUsize::new(weak as usize),
            disposed: AtomicBool::new(false),
            guard: ThreadGuard::new(concurrency),
        })
    }

    /// Context whose values this cache interns
    pub fn context(&self) -> ContextRef {
        self.inner.context
    }

    /// Native cache handle, `None` once disposed
    pub fn native_handle(&self) -> Option<ValueCacheRef> {
        if self.is_disposed() {
            None
        } else {
            self.inner.native.get().copied()
        }
    }

    /// Check if the cache has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Get the wrapper for `handle`, constructing and registering it on first use
    ///
    /// `found_handle_release` runs only on a hit, for callers that obtained
    /// a native reference they must give back when the wrapper already exists.
    #[track_caller]
    pub fn get_or_create_item(
        &self,
        handle: ValueRef,
        found_handle_release: Option<&dyn Fn(ValueRef)>,
    ) -> InteropResult<Arc<Value>> {
        self.guard.check("get_or_create_item")?;

        if self.is_disposed() {
            return Err(InteropError::Disposed("value cache"));
        }
        if handle.is_null() {
            return Err(InteropError::NativeNull("value handle"));
        }

        let mut constructed = false;
        let pinned = self.inner.entries.get_or_create(
            handle,
            |h| {
                constructed = true;
                self.inner.construct(h)
            },
            found_handle_release,
        )?;

        if !constructed {
            trace!(?handle, "value cache hit");
        }
        Ok(pinned.value)
    }

    /// Resolve `handle` and view it as `T`
    #[track_caller]
    pub fn resolve<T: ValueType>(&self, handle: ValueRef) -> InteropResult<T> {
        self.get_or_create_item(handle, None)?.downcast()
    }

    /// Wrapper currently interned under `handle`, without constructing one
    pub fn lookup(&self, handle: ValueRef) -> Option<Arc<Value>> {
        self.inner.entries.get(handle).map(|entry| entry.value)
    }

    /// Token currently registered for `handle`
    pub fn token_of(&self, handle: ValueRef) -> Option<isize> {
        self.inner.entries.get(handle).map(|entry| entry.token)
    }

    /// Check if `handle` is interned
    pub fn contains(&self, handle: ValueRef) -> bool {
        self.inner.entries.contains(handle)
    }

    /// Number of interned handles
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Check if nothing is interned
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Every pinned wrapper; a wrapper reachable under several keys after a
    /// replacement appears once per key
    pub fn snapshot(&self) -> Vec<Arc<Value>> {
        self.inner
            .entries
            .snapshot()
            .into_iter()
            .map(|entry| entry.value)
            .collect()
    }

    /// Activity counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            live: self.inner.entries.len(),
            constructed: self.inner.constructed.load(Ordering::Relaxed),
            released: self.inner.released.load(Ordering::Relaxed),
            replaced: self.inner.replaced.load(Ordering::Relaxed),
        }
    }

    /// Dispose the native cache and release every pin
    ///
    /// Idempotent. No callback reaches this cache once it returns.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(native) = self.inner.native.get() {
            self.inner.library.dispose_value_cache(*native);
        }

        let weak = self.callback_context.swap(0, Ordering::AcqRel);
        if weak != 0 {
            // SAFETY: produced by `Weak::into_raw` in `new`; the native cache
            // that held it is gone, so nothing else can use the pointer.
            unsafe { drop(Weak::from_raw(weak as *const ValueCacheInner)) };
        }

        let drained = self.inner.entries.drain();
        self.inner
            .released
            .fetch_add(drained.len() as u64, Ordering::Relaxed);
        debug!(context = ?self.inner.context, released = drained.len(), "value cache disposed");
    }
}

impl Drop for ValueCache {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ValueCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCache")
            .field("context", &self.inner.context)
            .field("native", &self.inner.native.get())
            .field("len", &self.inner.entries.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
