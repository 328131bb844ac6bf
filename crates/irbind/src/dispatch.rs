//! Kind tag to wrapper class dispatch
//!
//! Classification is a table lookup. The tables are built once from the
//! `(kind, class)` lists below, so coverage can be checked against
//! `ValueKind::ALL` instead of reading a long match.
//!
//! Tags without an explicit entry fall back by range:
//!
//! | Tag                            | Class         |
//! |--------------------------------|---------------|
//! | constant range                 | `Constant`    |
//! | above `INSTRUCTION_MARKER`     | `Instruction` |
//! | anything else below the marker | `Value`       |
//! | the marker itself              | `UnknownTag`  |
//!
//! Native opcode numbering moves between library versions faster than the
//! classified surface does, so every opcode is accepted.

use once_cell::sync::Lazy;

use irbind_sys::{TypeKind, ValueKind};

use crate::error::{InteropError, InteropResult};
use crate::types::TypeClass;
use crate::value::ValueClass;

/// Explicitly classified value kinds
///
/// Kinds absent here (e.g. `PoisonValue`, `Freeze`, `MemoryPhi`) take the
/// range fallback.
const VALUE_CLASSES: &[(ValueKind, ValueClass)] = &[
    (ValueKind::Argument, ValueClass::Argument),
    (ValueKind::BasicBlock, ValueClass::BasicBlock),
    (ValueKind::MetadataAsValue, ValueClass::MetadataAsValue),
    (ValueKind::InlineAsm, ValueClass::InlineAsm),
    // Global values
    (ValueKind::Function, ValueClass::Function),
    (ValueKind::GlobalAlias, ValueClass::GlobalAlias),
    (ValueKind::GlobalIFunc, ValueClass::GlobalIFunc),
    (ValueKind::GlobalVariable, ValueClass::GlobalVariable),
    // Constants
    (ValueKind::BlockAddress, ValueClass::BlockAddress),
    (ValueKind::ConstantExpr, ValueClass::ConstantExpression),
    (ValueKind::ConstantArray, ValueClass::ConstantArray),
    (ValueKind::ConstantStruct, ValueClass::ConstantStruct),
    (ValueKind::ConstantVector, ValueClass::ConstantVector),
    (ValueKind::UndefValue, ValueClass::UndefValue),
    (ValueKind::ConstantAggregateZero, ValueClass::ConstantAggregateZero),
    (ValueKind::ConstantDataArray, ValueClass::ConstantDataArray),
    (ValueKind::ConstantDataVector, ValueClass::ConstantDataVector),
    (ValueKind::ConstantInt, ValueClass::ConstantInt),
    (ValueKind::ConstantFp, ValueClass::ConstantFp),
    (ValueKind::ConstantPointerNull, ValueClass::ConstantPointerNull),
    // Terminators
    (ValueKind::Ret, ValueClass::ReturnInstruction),
    (ValueKind::Br, ValueClass::Branch),
    (ValueKind::Switch, ValueClass::Switch),
    (ValueKind::IndirectBr, ValueClass::IndirectBranch),
    (ValueKind::Invoke, ValueClass::Invoke),
    (ValueKind::Resume, ValueClass::ResumeInstruction),
    (ValueKind::Unreachable, ValueClass::Unreachable),
    (ValueKind::CleanupRet, ValueClass::CleanupReturn),
    (ValueKind::CatchRet, ValueClass::CatchReturn),
    (ValueKind::CatchSwitch, ValueClass::CatchSwitch),
    // Operators
    (ValueKind::FNeg, ValueClass::UnaryOperator),
    (ValueKind::Add, ValueClass::BinaryOperator),
    (ValueKind::FAdd, ValueClass::BinaryOperator),
    (ValueKind::Sub, ValueClass::BinaryOperator),
    (ValueKind::FSub, ValueClass::BinaryOperator),
    (ValueKind::Mul, ValueClass::BinaryOperator),
    (ValueKind::FMul, ValueClass::BinaryOperator),
    (ValueKind::UDiv, ValueClass::BinaryOperator),
    (ValueKind::SDiv, ValueClass::BinaryOperator),
    (ValueKind::FDiv, ValueClass::BinaryOperator),
    (ValueKind::URem, ValueClass::BinaryOperator),
    (ValueKind::SRem, ValueClass::BinaryOperator),
    (ValueKind::FRem, ValueClass::BinaryOperator),
    (ValueKind::Shl, ValueClass::BinaryOperator),
    (ValueKind::LShr, ValueClass::BinaryOperator),
    (ValueKind::AShr, ValueClass::BinaryOperator),
    (ValueKind::And, ValueClass::BinaryOperator),
    (ValueKind::Or, ValueClass::BinaryOperator),
    (ValueKind::Xor, ValueClass::BinaryOperator),
    // Memory
    (ValueKind::Alloca, ValueClass::Alloca),
    (ValueKind::Load, ValueClass::Load),
    (ValueKind::Store, ValueClass::Store),
    (ValueKind::GetElementPtr, ValueClass::GetElementPtr),
    (ValueKind::Fence, ValueClass::Fence),
    (ValueKind::AtomicCmpXchg, ValueClass::AtomicCmpXchg),
    (ValueKind::AtomicRmw, ValueClass::AtomicRmw),
    // Casts
    (ValueKind::Trunc, ValueClass::Trunc),
    (ValueKind::ZExt, ValueClass::ZeroExtend),
    (ValueKind::SExt, ValueClass::SignExtend),
    (ValueKind::FpToUi, ValueClass::FpToUi),
    (ValueKind::FpToSi, ValueClass::FpToSi),
    (ValueKind::UiToFp, ValueClass::UiToFp),
    (ValueKind::SiToFp, ValueClass::SiToFp),
    (ValueKind::FpTrunc, ValueClass::FpTrunc),
    (ValueKind::FpExt, ValueClass::FpExt),
    (ValueKind::PtrToInt, ValueClass::PointerToInt),
    (ValueKind::IntToPtr, ValueClass::IntToPointer),
    (ValueKind::BitCast, ValueClass::BitCast),
    (ValueKind::AddrSpaceCast, ValueClass::AddressSpaceCast),
    // Exception handling pads
    (ValueKind::CleanupPad, ValueClass::CleanupPad),
    (ValueKind::CatchPad, ValueClass::CatchPad),
    (ValueKind::LandingPad, ValueClass::LandingPad),
    // Other instructions
    (ValueKind::ICmp, ValueClass::IntCmp),
    (ValueKind::FCmp, ValueClass::FCmp),
    (ValueKind::Phi, ValueClass::PhiNode),
    (ValueKind::Call, ValueClass::CallInstruction),
    (ValueKind::Select, ValueClass::SelectInstruction),
    (ValueKind::UserOp1, ValueClass::UserOp1),
    (ValueKind::UserOp2, ValueClass::UserOp2),
    (ValueKind::VaArg, ValueClass::VaArg),
    (ValueKind::ExtractElement, ValueClass::ExtractElement),
    (ValueKind::InsertElement, ValueClass::InsertElement),
    (ValueKind::ShuffleVector, ValueClass::ShuffleVector),
    (ValueKind::ExtractValue, ValueClass::ExtractValue),
    (ValueKind::InsertValue, ValueClass::InsertValue),
];

/// Type kinds with a dedicated wrapper class; every other kind is `Type`
const TYPE_CLASSES: &[(TypeKind, TypeClass)] = &[
    (TypeKind::Function, TypeClass::Function),
    (TypeKind::Struct, TypeClass::Struct),
    (TypeKind::Array, TypeClass::Array),
    (TypeKind::Pointer, TypeClass::Pointer),
    (TypeKind::Vector, TypeClass::Vector),
    (TypeKind::ScalableVector, TypeClass::Vector),
];

/// One slot per known kind; tags past the end take the range fallback
static VALUE_TABLE: Lazy<Vec<Option<ValueClass>>> = Lazy::new(|| {
    let len = ValueKind::ALL
        .iter()
        .map(|kind| kind.raw() as usize + 1)
        .max()
        .unwrap_or(0);
    let mut table = vec![None; len];
    for &(kind, class) in VALUE_CLASSES {
        table[kind.raw() as usize] = Some(class);
    }
    table
});

static TYPE_TABLE: Lazy<Vec<TypeClass>> = Lazy::new(|| {
    let mut table = vec![TypeClass::Type; TypeKind::ALL.len()];
    for &(kind, class) in TYPE_CLASSES {
        table[kind.raw() as usize] = class;
    }
    table
});

/// Class explicitly assigned to `kind`, if any
pub fn explicit_value_class(kind: ValueKind) -> Option<ValueClass> {
    VALUE_TABLE.get(kind.raw() as usize).copied().flatten()
}

/// Classify a raw value tag
pub fn classify_value(tag: u32) -> InteropResult<ValueClass> {
    if tag == ValueKind::INSTRUCTION_MARKER {
        return Err(unknown_value_tag(tag));
    }

    if let Some(class) = VALUE_TABLE.get(tag as usize).copied().flatten() {
        return Ok(class);
    }

    if ValueKind::is_constant_tag(tag) {
        Ok(ValueClass::Constant)
    } else if ValueKind::is_instruction_tag(tag) {
        Ok(ValueClass::Instruction)
    } else {
        Ok(ValueClass::Value)
    }
}

/// Classify a raw type tag
pub fn classify_type(tag: u32) -> InteropResult<(TypeKind, TypeClass)> {
    let kind = TypeKind::try_from(tag)?;
    let class = TYPE_TABLE
        .get(tag as usize)
        .copied()
        .unwrap_or(TypeClass::Type);
    Ok((kind, class))
}

fn unknown_value_tag(tag: u32) -> InteropError {
    InteropError::UnknownTag {
        family: "value",
        tag,
    }
}
