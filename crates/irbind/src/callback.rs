//! Native callback boundary
//!
//! The functions here are registered with the native value cache and are
//! invoked from native frames. Neither a Rust error nor a panic may cross
//! back: every body runs inside [`guard`], which logs the failure and
//! returns a fallback instead.

use std::any::Any;
use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use tracing::{error, warn};

use irbind_sys::{ValueRef, NO_TOKEN};

use crate::error::InteropResult;
use crate::value_cache::ValueCacheInner;

/// Run a callback body, converting errors and panics into `fallback`
pub(crate) fn guard<T, F>(callback: &'static str, fallback: T, body: F) -> T
where
    F: FnOnce() -> InteropResult<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            warn!(callback, error = %err, "native callback failed");
            fallback
        }
        Err(payload) => {
            error!(
                callback,
                panic = %panic_message(payload.as_ref()),
                "panic caught at native callback boundary"
            );
            fallback
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Recover the cache behind a callback context without consuming the `Weak`
///
/// # Safety
///
/// `callback_context` must be null or a pointer produced by
/// `Weak::into_raw` that has not been reclaimed yet.
unsafe fn upgrade(callback_context: *mut c_void) -> Option<Arc<ValueCacheInner>> {
    if callback_context.is_null() {
        return None;
    }
    let weak = ManuallyDrop::new(Weak::from_raw(callback_context as *const ValueCacheInner));
    weak.upgrade()
}

/// Deletion callback registered with every native value cache
pub(crate) unsafe extern "C" fn native_on_item_deleted(
    callback_context: *mut c_void,
    value: ValueRef,
    token: isize,
) {
    guard("item_deleted", (), || {
        // SAFETY: the context is the `Weak` registered by `ValueCache::new`,
        // reclaimed only after the native cache stops calling back.
        match unsafe { upgrade(callback_context) } {
            Some(cache) => cache.on_item_deleted(value, token),
            None => Ok(()),
        }
    })
}

/// Replacement callback registered with every native value cache
pub(crate) unsafe extern "C" fn native_on_item_replaced(
    callback_context: *mut c_void,
    old_value: ValueRef,
    token: isize,
    new_value: ValueRef,
) -> isize {
    guard("item_replaced", NO_TOKEN, || {
        // SAFETY: see `native_on_item_deleted`.
        match unsafe { upgrade(callback_context) } {
            Some(cache) => cache.on_item_replaced(old_value, token, new_value),
            None => Ok(NO_TOKEN),
        }
    })
}
