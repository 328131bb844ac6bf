//! Error types for handle resolution

use irbind_sys::{ContextRef, KindError};

/// Result type for interning operations
pub type InteropResult<T> = Result<T, InteropError>;

/// Errors raised while resolving native handles
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteropError {
    /// Handle belongs to a different context than the cache resolving it
    #[error("Wrong scope: handle {handle:#x} belongs to {actual:?}, not {expected:?}")]
    WrongScope {
        /// Address of the offending handle
        handle: usize,
        /// Context of the cache
        expected: ContextRef,
        /// Context reported by the native library
        actual: ContextRef,
    },

    /// Tag with no class and no fallback
    #[error("Unknown {family} tag: {tag}")]
    UnknownTag {
        /// Kind family ("value" or "type")
        family: &'static str,
        /// The raw tag
        tag: u32,
    },

    /// Null handle where a live object was required
    #[error("Null native handle: {0}")]
    NativeNull(&'static str),

    /// A callback found its entry missing or changed unexpectedly
    #[error("Callback protocol violation: {0}")]
    ReentrantCorruption(String),

    /// Resolved wrapper is not of the requested type
    #[error("Invalid cast: expected {expected}, got {actual}")]
    InvalidCast {
        /// Requested class name
        expected: &'static str,
        /// Runtime class name
        actual: &'static str,
    },

    /// A context handle is already registered
    #[error("Context {0:?} is already registered")]
    DuplicateContext(ContextRef),

    /// Operation on a disposed object
    #[error("{0} has been disposed")]
    Disposed(&'static str),

    /// Caller-initiated operation off the owning thread of an `OwnerThread` context
    #[error("{0} called off the owning thread")]
    WrongThread(&'static str),
}

impl From<KindError> for InteropError {
    fn from(err: KindError) -> Self {
        InteropError::UnknownTag {
            family: err.family,
            tag: err.tag,
        }
    }
}
