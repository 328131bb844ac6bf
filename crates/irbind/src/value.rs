//! Value wrappers and their class hierarchy
//!
//! Every interned value handle is wrapped by exactly one [`Value`], shared as
//! `Arc<Value>`. The concrete class is decided once, from the kind tag, when
//! the wrapper is constructed. Typed views in [`views`] are zero-cost
//! newtypes over the same `Arc` and are only obtainable through a checked
//! downcast.

use std::fmt;
use std::sync::Arc;

use irbind_sys::{ContextRef, ValueKind, ValueRef};

use crate::error::{InteropError, InteropResult};

mod sealed {
    /// Proof of crate-internal construction for typed views
    pub struct Token(pub(crate) ());
}

macro_rules! value_classes {
    (
        root $root:ident;
        $($name:ident : $parent:ident,)*
    ) => {
        /// Concrete wrapper class of a value
        ///
        /// Classes form a single-inheritance tree rooted at `Value`. Several
        /// kind tags may map to the same class.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ValueClass {
            #[doc = "Generic value"]
            $root,
            $(
                #[doc = concat!("`", stringify!($name), "` (a kind of `", stringify!($parent), "`)")]
                $name,
            )*
        }

        impl ValueClass {
            /// Every class, parents before children
            pub const ALL: &'static [ValueClass] = &[ValueClass::$root, $(ValueClass::$name,)*];

            /// Direct base class, `None` for the root
            pub fn parent(self) -> Option<ValueClass> {
                match self {
                    ValueClass::$root => None,
                    $(ValueClass::$name => Some(ValueClass::$parent),)*
                }
            }

            /// Class name
            pub fn name(self) -> &'static str {
                match self {
                    ValueClass::$root => stringify!($root),
                    $(ValueClass::$name => stringify!($name),)*
                }
            }
        }

        /// Typed views over interned values
        ///
        /// A view is obtained with [`Value::downcast`] or `resolve::<T>` and
        /// derefs to the underlying [`Value`].
        pub mod views {
            use std::sync::Arc;

            use super::{sealed, Value, ValueClass, ValueType};

            $(
                #[doc = concat!("Typed view of a `", stringify!($name), "` value")]
                #[derive(Clone)]
                #[repr(transparent)]
                pub struct $name(Arc<Value>);

                impl ValueType for $name {
                    const CLASS: ValueClass = ValueClass::$name;

                    fn from_checked(value: Arc<Value>, _: sealed::Token) -> Self {
                        $name(value)
                    }

                    fn as_value(&self) -> &Arc<Value> {
                        &self.0
                    }
                }

                impl std::ops::Deref for $name {
                    type Target = Value;

                    fn deref(&self) -> &Value {
                        &self.0
                    }
                }

                impl std::fmt::Debug for $name {
                    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        std::fmt::Debug::fmt(&*self.0, f)
                    }
                }
            )*
        }
    };
}

value_classes! {
    root Value;

    User: Value,
    Argument: Value,
    BasicBlock: Value,
    InlineAsm: Value,
    MetadataAsValue: Value,

    // Constants
    Constant: User,
    GlobalValue: Constant,
    GlobalAlias: GlobalValue,
    GlobalIFunc: GlobalValue,
    GlobalObject: GlobalValue,
    Function: GlobalObject,
    GlobalVariable: GlobalObject,
    BlockAddress: Constant,
    ConstantExpression: Constant,
    UndefValue: Constant,
    PoisonValue: UndefValue,
    ConstantAggregateZero: Constant,
    ConstantDataArray: Constant,
    ConstantDataVector: Constant,
    ConstantInt: Constant,
    ConstantFp: Constant,
    ConstantPointerNull: Constant,
    ConstantAggregate: Constant,
    ConstantArray: ConstantAggregate,
    ConstantStruct: ConstantAggregate,
    ConstantVector: ConstantAggregate,

    // Instructions
    Instruction: User,
    Terminator: Instruction,
    ReturnInstruction: Terminator,
    Branch: Terminator,
    Switch: Terminator,
    IndirectBranch: Terminator,
    Invoke: Terminator,
    ResumeInstruction: Terminator,
    Unreachable: Terminator,
    CleanupReturn: Terminator,
    CatchReturn: Terminator,
    CatchSwitch: Terminator,
    UnaryOperator: Instruction,
    BinaryOperator: Instruction,
    Alloca: Instruction,
    Load: Instruction,
    Store: Instruction,
    GetElementPtr: Instruction,
    Fence: Instruction,
    AtomicCmpXchg: Instruction,
    AtomicRmw: Instruction,
    Cast: Instruction,
    Trunc: Cast,
    ZeroExtend: Cast,
    SignExtend: Cast,
    FpToUi: Cast,
    FpToSi: Cast,
    UiToFp: Cast,
    SiToFp: Cast,
    FpTrunc: Cast,
    FpExt: Cast,
    PointerToInt: Cast,
    IntToPointer: Cast,
    BitCast: Cast,
    AddressSpaceCast: Cast,
    FuncletPad: Instruction,
    CleanupPad: FuncletPad,
    CatchPad: FuncletPad,
    Cmp: Instruction,
    IntCmp: Cmp,
    FCmp: Cmp,
    PhiNode: Instruction,
    CallInstruction: Instruction,
    SelectInstruction: Instruction,
    UserOp1: Instruction,
    UserOp2: Instruction,
    VaArg: Instruction,
    ExtractElement: Instruction,
    InsertElement: Instruction,
    ShuffleVector: Instruction,
    ExtractValue: Instruction,
    InsertValue: Instruction,
    LandingPad: Instruction,
}

impl ValueClass {
    /// Check if this class is `ancestor` or derives from it
    pub fn is_a(self, ancestor: ValueClass) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == ancestor {
                return true;
            }
            current = class.parent();
        }
        false
    }
}

impl fmt::Display for ValueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A type that an interned value can be viewed as
///
/// Implemented by `Arc<Value>` (any value) and by every type in [`views`].
/// The trait is sealed: views cannot be built outside a checked downcast.
pub trait ValueType: Sized {
    /// Class a value must be (or derive from) to be viewed as `Self`
    const CLASS: ValueClass;

    #[doc(hidden)]
    fn from_checked(value: Arc<Value>, token: sealed::Token) -> Self;

    /// The underlying interned wrapper
    fn as_value(&self) -> &Arc<Value>;
}

impl ValueType for Arc<Value> {
    const CLASS: ValueClass = ValueClass::Value;

    fn from_checked(value: Arc<Value>, _: sealed::Token) -> Self {
        value
    }

    fn as_value(&self) -> &Arc<Value> {
        self
    }
}

/// Wrapper for one native value handle
pub struct Value {
    handle: ValueRef,
    context: ContextRef,
    tag: u32,
    class: ValueClass,
}

impl Value {
    pub(crate) fn new(handle: ValueRef, context: ContextRef, tag: u32, class: ValueClass) -> Self {
        Self {
            handle,
            context,
            tag,
            class,
        }
    }

    /// The wrapped native handle
    #[inline]
    pub fn handle(&self) -> ValueRef {
        self.handle
    }

    /// Context owning the value
    #[inline]
    pub fn context(&self) -> ContextRef {
        self.context
    }

    /// Raw kind tag reported when the wrapper was built
    #[inline]
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Decoded kind, `None` for tags in the fallback band
    pub fn kind(&self) -> Option<ValueKind> {
        ValueKind::from_raw(self.tag)
    }

    /// Concrete wrapper class
    #[inline]
    pub fn class(&self) -> ValueClass {
        self.class
    }

    /// Check if the value is of class `class` or a subclass of it
    pub fn is_a(&self, class: ValueClass) -> bool {
        self.class.is_a(class)
    }

    /// View the value as `T`, failing with `InvalidCast` on a class mismatch
    pub fn downcast<T: ValueType>(self: &Arc<Self>) -> InteropResult<T> {
        if self.class.is_a(T::CLASS) {
            Ok(T::from_checked(Arc::clone(self), sealed::Token(())))
        } else {
            Err(InteropError::InvalidCast {
                expected: T::CLASS.name(),
                actual: self.class.name(),
            })
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("handle", &self.handle)
            .field("class", &self.class)
            .field("tag", &self.tag)
            .finish()
    }
}
