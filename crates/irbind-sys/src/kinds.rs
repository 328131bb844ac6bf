//! Kind tags reported by the native library
//!
//! Value kinds follow the native library's value-id enumeration: the
//! non-instruction kinds first, then the `Instruction` marker, then one entry
//! per opcode at `Instruction + opcode`. Opcode numbering tracks the native
//! library version and is less stable than the rest of the enumeration, so
//! consumers must tolerate raw tags that have no variant here.

/// A raw tag that does not correspond to a known kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {family} tag: {tag}")]
pub struct KindError {
    /// Kind family ("value" or "type")
    pub family: &'static str,
    /// The raw tag
    pub tag: u32,
}

macro_rules! kind_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($family:literal) {
            $($variant:ident = $value:expr,)*
        }
    ) => {
        $(#[$meta])*
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                $variant = $value,
            )*
        }

        impl $name {
            /// Every kind, in tag order
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            /// Decode a raw tag
            pub fn from_raw(tag: u32) -> Option<Self> {
                match tag {
                    $(x if x == $value => Some($name::$variant),)*
                    _ => None,
                }
            }

            /// Raw tag value
            #[inline]
            pub fn raw(self) -> u32 {
                self as u32
            }

            /// Variant name
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)*
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = KindError;

            fn try_from(tag: u32) -> Result<Self, KindError> {
                Self::from_raw(tag).ok_or(KindError { family: $family, tag })
            }
        }
    };
}

kind_enum! {
    /// Discriminant of a native value (`ValueRef`)
    pub enum ValueKind ("value") {
        Function = 0,
        GlobalAlias = 1,
        GlobalIFunc = 2,
        GlobalVariable = 3,
        BlockAddress = 4,
        ConstantExpr = 5,
        DsoLocalEquivalent = 6,
        NoCfiValue = 7,
        ConstantPtrAuth = 8,
        ConstantArray = 9,
        ConstantStruct = 10,
        ConstantVector = 11,
        UndefValue = 12,
        PoisonValue = 13,
        ConstantAggregateZero = 14,
        ConstantDataArray = 15,
        ConstantDataVector = 16,
        ConstantInt = 17,
        ConstantFp = 18,
        ConstantTargetNone = 19,
        ConstantPointerNull = 20,
        ConstantTokenNone = 21,
        Argument = 22,
        BasicBlock = 23,
        MetadataAsValue = 24,
        InlineAsm = 25,
        MemoryUse = 26,
        MemoryDef = 27,
        MemoryPhi = 28,
        Instruction = 29,
        Ret = 30,
        Br = 31,
        Switch = 32,
        IndirectBr = 33,
        Invoke = 34,
        Resume = 35,
        Unreachable = 36,
        CleanupRet = 37,
        CatchRet = 38,
        CatchSwitch = 39,
        CallBr = 40,
        FNeg = 41,
        Add = 42,
        FAdd = 43,
        Sub = 44,
        FSub = 45,
        Mul = 46,
        FMul = 47,
        UDiv = 48,
        SDiv = 49,
        FDiv = 50,
        URem = 51,
        SRem = 52,
        FRem = 53,
        Shl = 54,
        LShr = 55,
        AShr = 56,
        And = 57,
        Or = 58,
        Xor = 59,
        Alloca = 60,
        Load = 61,
        Store = 62,
        GetElementPtr = 63,
        Fence = 64,
        AtomicCmpXchg = 65,
        AtomicRmw = 66,
        Trunc = 67,
        ZExt = 68,
        SExt = 69,
        FpToUi = 70,
        FpToSi = 71,
        UiToFp = 72,
        SiToFp = 73,
        FpTrunc = 74,
        FpExt = 75,
        PtrToInt = 76,
        IntToPtr = 77,
        BitCast = 78,
        AddrSpaceCast = 79,
        CleanupPad = 80,
        CatchPad = 81,
        ICmp = 82,
        FCmp = 83,
        Phi = 84,
        Call = 85,
        Select = 86,
        UserOp1 = 87,
        UserOp2 = 88,
        VaArg = 89,
        ExtractElement = 90,
        InsertElement = 91,
        ShuffleVector = 92,
        ExtractValue = 93,
        InsertValue = 94,
        LandingPad = 95,
        Freeze = 96,
    }
}

impl ValueKind {
    /// First constant kind
    pub const CONSTANT_FIRST: u32 = ValueKind::Function as u32;
    /// Last constant kind
    pub const CONSTANT_LAST: u32 = ValueKind::ConstantTokenNone as u32;
    /// First constant-data kind
    pub const CONSTANT_DATA_FIRST: u32 = ValueKind::UndefValue as u32;
    /// Last constant-data kind
    pub const CONSTANT_DATA_LAST: u32 = ValueKind::ConstantTokenNone as u32;
    /// First constant-aggregate kind
    pub const CONSTANT_AGGREGATE_FIRST: u32 = ValueKind::ConstantArray as u32;
    /// Last constant-aggregate kind
    pub const CONSTANT_AGGREGATE_LAST: u32 = ValueKind::ConstantVector as u32;
    /// The instruction marker
    ///
    /// Every tag strictly greater is an instruction opcode, including
    /// opcodes newer than this enumeration.
    pub const INSTRUCTION_MARKER: u32 = ValueKind::Instruction as u32;

    /// Check if a raw tag lies in the constant range
    #[inline]
    pub fn is_constant_tag(tag: u32) -> bool {
        (Self::CONSTANT_FIRST..=Self::CONSTANT_LAST).contains(&tag)
    }

    /// Check if a raw tag is an opcode above the instruction marker
    #[inline]
    pub fn is_instruction_tag(tag: u32) -> bool {
        tag > Self::INSTRUCTION_MARKER
    }
}

kind_enum! {
    /// Discriminant of a native type (`TypeRef`)
    pub enum TypeKind ("type") {
        Void = 0,
        Half = 1,
        Float = 2,
        Double = 3,
        X86Fp80 = 4,
        Fp128 = 5,
        PpcFp128 = 6,
        Label = 7,
        Integer = 8,
        Function = 9,
        Struct = 10,
        Array = 11,
        Pointer = 12,
        Vector = 13,
        Metadata = 14,
        X86Mmx = 15,
        Token = 16,
        ScalableVector = 17,
        BFloat = 18,
        X86Amx = 19,
        TargetExt = 20,
    }
}
