//! The intermediate representation shared by the decoder, encoder, two-pass
//! assembler and executor.
//!
//! Every family is an exhaustive discriminated union instead of the tagged
//! `struct + union + function-pointer table` the original C implementation
//! uses, so `decode`/`encode`/`execute` are total matches the compiler
//! checks for coverage. Opcode discriminants are assigned explicitly so
//! that they equal their binary encoding (spec invariant: "every enum
//! ordinal equals its binary encoding").

/// Either a resolved immediate or a label awaiting resolution by the
/// assembler's symbol table. The IR never holds a reference into the
/// symbol table itself -- resolution happens only at translation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Immediate(i64),
    Label(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add = 0,
    Adds = 1,
    Sub = 2,
    Subs = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WideMoveOp {
    Movn = 0,
    Movz = 2,
    Movk = 3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImmOperand {
    Arithmetic { sh: bool, imm12: u16, rn: u8 },
    WideMove { hw: u8, imm16: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImmOpcode {
    Arithmetic(ArithOp),
    WideMove(WideMoveOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftType {
    Lsl = 0,
    Lsr = 1,
    Asr = 2,
    Ror = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And = 0,
    Orr = 1,
    Eor = 2,
    Ands = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulOp {
    Madd = 0,
    Msub = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegArithOp {
    Add = 0,
    Adds = 1,
    Sub = 2,
    Subs = 3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegOpcode {
    Arithmetic(RegArithOp),
    BitLogic(LogicOp),
    Multiply(MulOp),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegOperand {
    /// Arithmetic / bit-logic share the same operand shape: a 6-bit
    /// shift amount applied to `rm`.
    Shifted { imm6: u8 },
    /// Multiply's third source/accumulator register and negate flag.
    Multiply { x: bool, ra: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// `[xn, #uoffset]`, uoffset scaled by the access width.
    UnsignedOffset { uoffset: u16 },
    /// `[xn, #simm9]!`
    PreIndexed { simm9: i16 },
    /// `[xn], #simm9`
    PostIndexed { simm9: i16 },
    /// `[xn, xm]`
    RegisterOffset { xm: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStoreKind {
    SingleDataTransfer {
        l: bool,
        xn: u8,
        mode: AddressingMode,
    },
    LoadLiteral {
        literal: Literal,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq = 0,
    Ne = 1,
    Ge = 10,
    Lt = 11,
    Gt = 12,
    Le = 13,
    Al = 14,
}

impl Cond {
    pub const ALL: [Cond; 7] = [
        Cond::Eq,
        Cond::Ne,
        Cond::Ge,
        Cond::Lt,
        Cond::Gt,
        Cond::Le,
        Cond::Al,
    ];

    pub fn from_bits(bits: u32) -> Option<Cond> {
        Some(match bits {
            0 => Cond::Eq,
            1 => Cond::Ne,
            10 => Cond::Ge,
            11 => Cond::Lt,
            12 => Cond::Gt,
            13 => Cond::Le,
            14 => Cond::Al,
            _ => return None,
        })
    }

    pub fn to_bits(self) -> u32 {
        self as u32
    }

    pub fn mnemonic_suffix(self) -> &'static str {
        match self {
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::Ge => "ge",
            Cond::Lt => "lt",
            Cond::Gt => "gt",
            Cond::Le => "le",
            Cond::Al => "al",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Cond> {
        Cond::ALL
            .into_iter()
            .find(|cond| cond.mnemonic_suffix() == suffix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchKind {
    Unconditional { literal: Literal },
    Register { xn: u8 },
    Conditional { literal: Literal, cond: Cond },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ir {
    Immediate {
        sf: bool,
        opcode: ImmOpcode,
        rd: u8,
        operand: ImmOperand,
    },
    Register {
        sf: bool,
        opcode: RegOpcode,
        shift: ShiftType,
        negated: bool,
        rm: u8,
        rn: u8,
        rd: u8,
        operand: RegOperand,
    },
    LoadStore {
        sf: bool,
        rt: u8,
        kind: LoadStoreKind,
    },
    Branch(BranchKind),
    Directive {
        value: u32,
    },
}

/// Encoding of the hardwired zero register, used by alias expansion and
/// operand parsing alike.
pub const ZERO_REG: u8 = 31;
