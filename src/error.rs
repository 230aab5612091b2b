//! Crate-wide error types.
//!
//! One enum per fallible boundary, in the style of the teacher crate's
//! `DecodeError`/`TraceFileError`: each variant names the component and the
//! offending value, and higher-level errors wrap lower-level ones with
//! `#[from]` rather than stringifying them.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DecodeError {
    #[error("no instruction class matches op0=0b{op0:04b} in word 0x{word:08x}")]
    UnknownClass { word: u32, op0: u32 },

    #[error("opi=0b{opi:03b} is reserved in the data-processing immediate class (word 0x{word:08x})")]
    ReservedOpi { word: u32, opi: u32 },

    #[error("hw={hw} is not allowed with sf=0 (word 0x{word:08x})")]
    NarrowWideMoveShift { word: u32, hw: u32 },

    #[error("condition code 0b{cond:04b} is not one of the supported conditions (word 0x{word:08x})")]
    InvalidCondition { word: u32, cond: u32 },

    #[error("offset bits 0b{offset:012b} do not match any addressing mode (word 0x{word:08x})")]
    UnknownAddressingMode { word: u32, offset: u32 },

    #[error("register-branch word 0x{word:08x} has nonzero reserved low bits")]
    MalformedRegisterBranch { word: u32 },

    #[error("conditional-branch word 0x{word:08x} has nonzero reserved bit 4")]
    MalformedConditionalBranch { word: u32 },

    #[error("word 0x{word:08x} matches neither the single-data-transfer nor load-literal load/store header")]
    MalformedLoadStoreHeader { word: u32 },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EncodeError {
    #[error("label '{0}' is not defined in the symbol table")]
    UnresolvedLabel(String),

    #[error("value {value} does not fit in a {bit_width}-bit field")]
    ImmediateOutOfRange { value: i64, bit_width: u32 },

    #[error("branch offset {offset} (to label '{label}') does not fit in a {bit_width}-bit field")]
    OffsetOutOfRange {
        label: String,
        offset: i64,
        bit_width: u32,
    },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AssembleError {
    #[error("duplicate label '{0}'")]
    DuplicateLabel(String),

    #[error("line {line}: unknown mnemonic '{mnemonic}'")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: malformed label '{label}'")]
    MalformedLabel { line: usize, label: String },

    #[error("line {line}: could not parse operand '{operand}'")]
    BadOperand { line: usize, operand: String },

    #[error("line {line}: expected {expected} operands, found {found}")]
    WrongOperandCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: registers of mixed width in a single instruction")]
    MixedRegisterWidth { line: usize },

    #[error("line {line}: {source}")]
    Encode {
        line: usize,
        #[source]
        source: EncodeError,
    },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ExecuteError {
    #[error("fetch at pc=0x{pc:x} failed to decode: {source}")]
    Fetch {
        pc: u64,
        #[source]
        source: DecodeError,
    },

    #[error("memory access at address 0x{address:x} (width {width} bytes) is outside the 0x{limit:x}-byte image")]
    MemoryOutOfRange {
        address: u64,
        width: u32,
        limit: u64,
    },

    #[error("program counter 0x{pc:x} is not 4-byte aligned")]
    MisalignedPc { pc: u64 },
}
