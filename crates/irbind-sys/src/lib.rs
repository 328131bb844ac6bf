//! irbind-sys - native interface of the IR library
//!
//! This crate describes the C-ABI surface that the interning layer in
//! `irbind` consumes:
//!
//! - Opaque handle types (`ContextRef`, `ValueRef`, `TypeRef`, `UseRef`,
//!   `ValueCacheRef`)
//! - Kind tags reported by the native library (`ValueKind`, `TypeKind`)
//! - Callback signatures for the native value cache
//! - The `NativeLibrary` trait implemented by the native call surface
//!
//! Nothing here dereferences a handle. Handles are compared and hashed by
//! pointer value only.

#![warn(missing_docs)]

mod handles;
mod kinds;
mod library;

pub use handles::{
    ContextRef, OpaqueContext, OpaqueType, OpaqueUse, OpaqueValue, OpaqueValueCache, TypeRef,
    UseRef, ValueCacheRef, ValueRef,
};
pub use kinds::{KindError, TypeKind, ValueKind};
pub use library::{ItemDeletedCallback, ItemReplacedCallback, NativeLibrary, NO_TOKEN};
