//! Opaque native handles
//!
//! Every handle is a `#[repr(transparent)]` wrapper around a raw pointer to a
//! zero-sized `#[repr(C)]` marker struct, so it has exactly the ABI of the
//! corresponding C typedef (`typedef struct OpaqueValue* ValueRef;`).

use std::fmt;
use std::ptr;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident => $opaque:ident) => {
        /// Opaque native object (never constructed or dereferenced from Rust)
        #[repr(C)]
        pub struct $opaque {
            _private: [u8; 0],
        }

        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(*mut $opaque);

        // Handles are plain pointer values. The Rust side never reads through
        // them, so moving them between threads is sound.
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}

        impl $name {
            /// The null handle
            pub const NULL: Self = Self(ptr::null_mut());

            /// Wrap a raw pointer received from native code
            #[inline]
            pub const fn from_raw(ptr: *mut $opaque) -> Self {
                Self(ptr)
            }

            /// Get the raw pointer to pass back to native code
            #[inline]
            pub const fn as_raw(self) -> *mut $opaque {
                self.0
            }

            /// Pointer value of the handle
            #[inline]
            pub fn addr(self) -> usize {
                self.0 as usize
            }

            /// Check if this is the null handle
            #[inline]
            pub fn is_null(self) -> bool {
                self.0.is_null()
            }

            /// `None` for the null handle, `Some(self)` otherwise
            #[inline]
            pub fn non_null(self) -> Option<Self> {
                if self.is_null() {
                    None
                } else {
                    Some(self)
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NULL
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.addr())
            }
        }
    };
}

native_handle!(
    /// Handle to a native context (the arena owning values and types)
    ContextRef => OpaqueContext
);
native_handle!(
    /// Handle to a native value
    ValueRef => OpaqueValue
);
native_handle!(
    /// Handle to a native type
    TypeRef => OpaqueType
);
native_handle!(
    /// Handle to one link of a value's def-use chain
    UseRef => OpaqueUse
);
native_handle!(
    /// Handle to a native value cache (value -> token association table)
    ValueCacheRef => OpaqueValueCache
);
