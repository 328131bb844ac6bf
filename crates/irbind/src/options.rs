//! Context configuration

use std::thread::{self, ThreadId};

use crate::error::{InteropError, InteropResult};

/// Threading policy for the caches owned by a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyPolicy {
    /// Any thread may resolve handles; insert, delete and replace are
    /// serialized by the cache lock
    #[default]
    Shared,

    /// Caller-initiated operations must run on the thread that created the
    /// context; elsewhere they fail with `InteropError::WrongThread`. Native
    /// callbacks are exempt since native code owns their threads.
    OwnerThread,
}

/// Options for creating a `Context`
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Initial capacity of the value cache
    pub value_capacity: usize,

    /// Initial capacity of the type cache
    pub type_capacity: usize,

    /// Threading policy
    pub concurrency: ConcurrencyPolicy,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            value_capacity: 256,
            type_capacity: 64,
            concurrency: ConcurrencyPolicy::Shared,
        }
    }
}

impl ContextOptions {
    /// Options enforcing the single-writer convention
    pub fn owner_thread() -> Self {
        Self {
            concurrency: ConcurrencyPolicy::OwnerThread,
            ..Default::default()
        }
    }

    /// Options with specific cache capacities
    pub fn with_capacity(value_capacity: usize, type_capacity: usize) -> Self {
        Self {
            value_capacity,
            type_capacity,
            ..Default::default()
        }
    }
}

/// Enforces a `ConcurrencyPolicy` for one cache
#[derive(Debug, Clone, Copy)]
pub(crate) struct ThreadGuard {
    policy: ConcurrencyPolicy,
    owner: ThreadId,
}

impl ThreadGuard {
    /// Guard owned by the current thread
    pub(crate) fn new(policy: ConcurrencyPolicy) -> Self {
        Self {
            policy,
            owner: thread::current().id(),
        }
    }

    /// Check that a caller-initiated operation is allowed on this thread
    pub(crate) fn check(&self, operation: &'static str) -> InteropResult<()> {
        if self.policy == ConcurrencyPolicy::OwnerThread && thread::current().id() != self.owner {
            return Err(InteropError::WrongThread(operation));
        }
        Ok(())
    }
}
