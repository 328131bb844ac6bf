//! Type wrappers

use std::fmt;

use irbind_sys::{ContextRef, TypeKind, TypeRef};

/// Wrapper class of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// Any type without a dedicated wrapper (integers, floats, void, ...)
    Type,
    /// Structure type
    Struct,
    /// Array type
    Array,
    /// Pointer type
    Pointer,
    /// Fixed or scalable vector type
    Vector,
    /// Function signature
    Function,
}

impl TypeClass {
    /// Class name
    pub fn name(self) -> &'static str {
        match self {
            TypeClass::Type => "Type",
            TypeClass::Struct => "Struct",
            TypeClass::Array => "Array",
            TypeClass::Pointer => "Pointer",
            TypeClass::Vector => "Vector",
            TypeClass::Function => "Function",
        }
    }

    /// Arrays and vectors
    pub fn is_sequential(self) -> bool {
        matches!(self, TypeClass::Array | TypeClass::Vector)
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wrapper for one native type handle
pub struct IrType {
    handle: TypeRef,
    context: ContextRef,
    kind: TypeKind,
    class: TypeClass,
}

impl IrType {
    pub(crate) fn new(handle: TypeRef, context: ContextRef, kind: TypeKind, class: TypeClass) -> Self {
        Self {
            handle,
            context,
            kind,
            class,
        }
    }

    /// The wrapped native handle
    #[inline]
    pub fn handle(&self) -> TypeRef {
        self.handle
    }

    /// Context owning the type
    #[inline]
    pub fn context(&self) -> ContextRef {
        self.context
    }

    /// Native type kind
    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Wrapper class
    #[inline]
    pub fn class(&self) -> TypeClass {
        self.class
    }

    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        self.kind == TypeKind::Integer
    }

    /// Check if this is a floating point type
    pub fn is_floating_point(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Half
                | TypeKind::BFloat
                | TypeKind::Float
                | TypeKind::Double
                | TypeKind::X86Fp80
                | TypeKind::Fp128
                | TypeKind::PpcFp128
        )
    }
}

impl fmt::Debug for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrType")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .finish()
    }
}
