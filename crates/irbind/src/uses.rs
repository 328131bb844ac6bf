//! Def-use traversal
//!
//! Read-only walks over native use lists and operand lists. Every handle
//! met on the way is resolved through the owning context's value cache, so
//! the wrappers yielded are the interned ones.

use std::iter::FusedIterator;
use std::sync::Arc;

use irbind_sys::{UseRef, ValueRef};

use crate::context::Context;
use crate::error::{InteropError, InteropResult};
use crate::value::Value;

/// One edge of a def-use chain
#[derive(Debug, Clone)]
pub struct Use {
    handle: UseRef,
    user: Arc<Value>,
    value: Arc<Value>,
}

impl Use {
    /// Native use handle
    pub fn handle(&self) -> UseRef {
        self.handle
    }

    /// The user holding the reference
    pub fn user(&self) -> &Arc<Value> {
        &self.user
    }

    /// The referenced value
    pub fn value(&self) -> &Arc<Value> {
        &self.value
    }
}

/// Iterator over the uses of a value, in native chain order
///
/// Follows `first_use` then `next_use`. The walk cannot be restarted; call
/// `Context::uses_of` again for a fresh one.
pub struct Uses<'a> {
    context: &'a Context,
    next: UseRef,
}

impl<'a> Uses<'a> {
    pub(crate) fn new(context: &'a Context, value: ValueRef) -> Self {
        Self {
            next: context.library().first_use(value),
            context,
        }
    }

    fn resolve(&self, handle: UseRef) -> InteropResult<Use> {
        let library = self.context.library();
        let user = self.context.value_for(library.use_user(handle))?;
        let value = self.context.value_for(library.use_value(handle))?;
        Ok(Use {
            handle,
            user,
            value,
        })
    }
}

impl Iterator for Uses<'_> {
    type Item = InteropResult<Use>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.non_null()?;
        self.next = self.context.library().next_use(current);
        Some(self.resolve(current))
    }
}

impl FusedIterator for Uses<'_> {}

/// Iterator over the operands of a user, in slot order
pub struct Operands<'a> {
    context: &'a Context,
    user: ValueRef,
    index: u32,
    count: u32,
}

impl<'a> Operands<'a> {
    pub(crate) fn new(context: &'a Context, user: ValueRef) -> Self {
        Self {
            count: context.library().operand_count(user),
            context,
            user,
            index: 0,
        }
    }
}

impl Iterator for Operands<'_> {
    type Item = InteropResult<Arc<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let operand = self.context.library().operand(self.user, self.index);
        self.index += 1;

        if operand.is_null() {
            return Some(Err(InteropError::NativeNull("operand")));
        }
        Some(self.context.value_for(operand))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.count - self.index) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Operands<'_> {}

impl FusedIterator for Operands<'_> {}
