//! IR -> binary word direction of the C4 decoder/translator.
//!
//! The inverse of `decode.rs`, field for field. Anything that can carry an
//! unresolved label (`Literal::Label`) takes the assembler's symbol table
//! so a branch offset can be computed relative to the instruction's own
//! address; instructions with no label operand ignore it.

use crate::assembler::symbols::SymbolTable;
use crate::bits::{mask, truncate};
use crate::error::EncodeError;
use crate::ir::*;

fn fits_unsigned(value: u32, bit_width: u32) -> bool {
    value & !(mask(bit_width - 1, 0)) == 0
}

fn fits_signed(value: i64, bit_width: u32) -> bool {
    let min = -(1i64 << (bit_width - 1));
    let max = (1i64 << (bit_width - 1)) - 1;
    value >= min && value <= max
}

/// Resolve a `Literal` to a signed word-count offset (the units branch and
/// load-literal fields are always stored in, per `decode.rs`/`executor.rs`'s
/// `pc + 4 * offset` convention): an `Immediate` is already in those units
/// and passes through unchanged, while a `Label` is resolved against
/// `symbols` and converted from the byte distance `target - here` by
/// dividing by 4 -- the one case that actually needs scaling.
fn resolve_literal(
    literal: &Literal,
    here: u64,
    symbols: &SymbolTable,
    bit_width: u32,
) -> Result<i64, EncodeError> {
    match literal {
        Literal::Immediate(value) => Ok(*value),
        Literal::Label(name) => {
            let target = symbols
                .get(name)
                .ok_or_else(|| EncodeError::UnresolvedLabel(name.clone()))?;
            let byte_offset = target as i64 - here as i64;
            if byte_offset % 4 != 0 {
                return Err(EncodeError::OffsetOutOfRange {
                    label: name.clone(),
                    offset: byte_offset,
                    bit_width,
                });
            }
            Ok(byte_offset / 4)
        }
    }
}

/// Encode a single IR node at address `here`, resolving any label operand
/// against `symbols`. `here` is only consulted for branch/load-literal
/// instructions; every other family ignores it.
pub fn encode(ir: &Ir, here: u64, symbols: &SymbolTable) -> Result<u32, EncodeError> {
    match ir {
        Ir::Immediate {
            sf,
            opcode,
            rd,
            operand,
        } => encode_immediate(*sf, opcode, *rd, operand),
        Ir::Register {
            sf,
            opcode,
            shift,
            negated,
            rm,
            rn,
            rd,
            operand,
        } => encode_register(*sf, opcode, *shift, *negated, *rm, *rn, *rd, operand),
        Ir::LoadStore { sf, rt, kind } => encode_load_store(*sf, *rt, kind, here, symbols),
        Ir::Branch(kind) => encode_branch(kind, here, symbols),
        Ir::Directive { value } => Ok(*value),
    }
}

fn encode_immediate(
    sf: bool,
    opcode: &ImmOpcode,
    rd: u8,
    operand: &ImmOperand,
) -> Result<u32, EncodeError> {
    let sf_bit = (sf as u32) << 31;

    match (opcode, operand) {
        (ImmOpcode::Arithmetic(op), ImmOperand::Arithmetic { sh, imm12, rn }) => {
            if !fits_unsigned(*imm12 as u32, 12) {
                return Err(EncodeError::ImmediateOutOfRange {
                    value: *imm12 as i64,
                    bit_width: 12,
                });
            }
            let opc = *op as u32;
            Ok(sf_bit
                | (opc << 29)
                | (0b10001 << 24)
                | ((*sh as u32) << 22)
                | ((*imm12 as u32) << 10)
                | ((*rn as u32) << 5)
                | rd as u32)
        }
        (ImmOpcode::WideMove(op), ImmOperand::WideMove { hw, imm16 }) => {
            if !sf && *hw > 1 {
                return Err(EncodeError::ImmediateOutOfRange {
                    value: *hw as i64,
                    bit_width: 1,
                });
            }
            let opc = *op as u32;
            Ok(sf_bit
                | (opc << 29)
                | (0b100101 << 23)
                | ((*hw as u32) << 21)
                | ((*imm16 as u32) << 5)
                | rd as u32)
        }
        _ => unreachable!("opcode/operand shape mismatch is a decode.rs/ir.rs construction bug"),
    }
}

fn encode_register(
    sf: bool,
    opcode: &RegOpcode,
    shift: ShiftType,
    negated: bool,
    rm: u8,
    rn: u8,
    rd: u8,
    operand: &RegOperand,
) -> Result<u32, EncodeError> {
    let sf_bit = (sf as u32) << 31;

    match (opcode, operand) {
        (RegOpcode::Arithmetic(op), RegOperand::Shifted { imm6 }) => {
            let opc = *op as u32;
            Ok(sf_bit
                | (opc << 29)
                | (0b01011 << 24)
                | ((shift as u32) << 22)
                | ((rm as u32) << 16)
                | ((*imm6 as u32) << 10)
                | ((rn as u32) << 5)
                | rd as u32)
        }
        (RegOpcode::BitLogic(op), RegOperand::Shifted { imm6 }) => {
            let opc = *op as u32;
            Ok(sf_bit
                | (opc << 29)
                | (0b01010 << 24)
                | ((shift as u32) << 22)
                | ((negated as u32) << 21)
                | ((rm as u32) << 16)
                | ((*imm6 as u32) << 10)
                | ((rn as u32) << 5)
                | rd as u32)
        }
        (RegOpcode::Multiply(op), RegOperand::Multiply { x, ra }) => {
            let _ = op;
            Ok(sf_bit
                | (0b00 << 29)
                | (0b11011 << 24)
                | (0b000 << 21)
                | ((rm as u32) << 16)
                | ((*x as u32) << 15)
                | ((*ra as u32) << 10)
                | ((rn as u32) << 5)
                | rd as u32)
        }
        _ => unreachable!("opcode/operand shape mismatch is a decode.rs/ir.rs construction bug"),
    }
}

fn encode_load_store(
    sf: bool,
    rt: u8,
    kind: &LoadStoreKind,
    here: u64,
    symbols: &SymbolTable,
) -> Result<u32, EncodeError> {
    // `sf` lives at bit 30 for load/store; bit 31 is a fixed class bit,
    // set explicitly by each arm below rather than carrying the width.
    let sf_bit = (sf as u32) << 30;

    match kind {
        LoadStoreKind::SingleDataTransfer { l, xn, mode } => {
            let header = (1 << 31) | sf_bit | (0b11100 << 25) | ((*l as u32) << 22);
            let (u, offset) = match mode {
                AddressingMode::UnsignedOffset { uoffset } => {
                    if !fits_unsigned(*uoffset as u32, 12) {
                        return Err(EncodeError::ImmediateOutOfRange {
                            value: *uoffset as i64,
                            bit_width: 12,
                        });
                    }
                    (true, *uoffset as u32)
                }
                AddressingMode::RegisterOffset { xm } => {
                    (false, 0b100000011010 | ((*xm as u32) << 6))
                }
                AddressingMode::PreIndexed { simm9 } => {
                    if !fits_signed(*simm9 as i64, 9) {
                        return Err(EncodeError::ImmediateOutOfRange {
                            value: *simm9 as i64,
                            bit_width: 9,
                        });
                    }
                    let simm9 = truncate(*simm9 as i64 as u64, 9) as u32;
                    (false, (simm9 << 2) | 0b11)
                }
                AddressingMode::PostIndexed { simm9 } => {
                    if !fits_signed(*simm9 as i64, 9) {
                        return Err(EncodeError::ImmediateOutOfRange {
                            value: *simm9 as i64,
                            bit_width: 9,
                        });
                    }
                    let simm9 = truncate(*simm9 as i64 as u64, 9) as u32;
                    (false, (simm9 << 2) | 0b01)
                }
            };
            Ok(header | ((u as u32) << 24) | (offset << 10) | ((*xn as u32) << 5) | rt as u32)
        }
        LoadStoreKind::LoadLiteral { literal } => {
            let scaled = resolve_literal(literal, here, symbols, 19)?;
            if !fits_signed(scaled, 19) {
                return Err(EncodeError::OffsetOutOfRange {
                    label: literal_label(literal),
                    offset: scaled,
                    bit_width: 19,
                });
            }
            let simm19 = truncate(scaled as u64, 19) as u32;
            Ok(sf_bit | (0b011000 << 24) | (simm19 << 5) | rt as u32)
        }
    }
}

fn encode_branch(kind: &BranchKind, here: u64, symbols: &SymbolTable) -> Result<u32, EncodeError> {
    match kind {
        BranchKind::Unconditional { literal } => {
            let scaled = resolve_literal(literal, here, symbols, 26)?;
            if !fits_signed(scaled, 26) {
                return Err(EncodeError::OffsetOutOfRange {
                    label: literal_label(literal),
                    offset: scaled,
                    bit_width: 26,
                });
            }
            let simm26 = truncate(scaled as u64, 26) as u32;
            Ok((0b000101 << 26) | simm26)
        }
        BranchKind::Register { xn } => {
            Ok((0b1101_0110_0001_1111_0000_00 << 10) | ((*xn as u32) << 5))
        }
        BranchKind::Conditional { literal, cond } => {
            let scaled = resolve_literal(literal, here, symbols, 19)?;
            if !fits_signed(scaled, 19) {
                return Err(EncodeError::OffsetOutOfRange {
                    label: literal_label(literal),
                    offset: scaled,
                    bit_width: 19,
                });
            }
            let simm19 = truncate(scaled as u64, 19) as u32;
            Ok((0b0101_0100 << 24) | (simm19 << 5) | cond.to_bits())
        }
    }
}

fn literal_label(literal: &Literal) -> String {
    match literal {
        Literal::Label(name) => name.clone(),
        Literal::Immediate(value) => format!("<offset {value}>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;

    #[test]
    fn arithmetic_immediate_round_trips() {
        let ir = Ir::Immediate {
            sf: true,
            opcode: ImmOpcode::Arithmetic(ArithOp::Add),
            rd: 0,
            operand: ImmOperand::Arithmetic {
                sh: false,
                imm12: 42,
                rn: 1,
            },
        };
        let symbols = SymbolTable::new();
        let word = encode(&ir, 0, &symbols).unwrap();
        assert_eq!(decode::decode(word).unwrap(), ir);
    }

    #[test]
    fn out_of_range_immediate_is_rejected() {
        let ir = Ir::Immediate {
            sf: true,
            opcode: ImmOpcode::Arithmetic(ArithOp::Add),
            rd: 0,
            operand: ImmOperand::Arithmetic {
                sh: false,
                imm12: 0x1000,
                rn: 1,
            },
        };
        let symbols = SymbolTable::new();
        assert!(encode(&ir, 0, &symbols).is_err());
    }

    #[test]
    fn unconditional_branch_resolves_backward_label() {
        let mut symbols = SymbolTable::new();
        symbols.define("loop".to_string(), 0).unwrap();
        let ir = Ir::Branch(BranchKind::Unconditional {
            literal: Literal::Label("loop".to_string()),
        });
        let word = encode(&ir, 16, &symbols).unwrap();
        match decode::decode(word).unwrap() {
            Ir::Branch(BranchKind::Unconditional {
                literal: Literal::Immediate(offset),
            }) => assert_eq!(offset, -16),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn resolved_immediate_branch_target_is_not_rescaled() {
        // A `Literal::Immediate` is already in word units (as `decode.rs` and
        // `executor.rs` agree); it must pass through `encode` unchanged, not
        // get divided by 4 a second time as though it were still a byte
        // distance.
        let symbols = SymbolTable::new();
        let ir = Ir::Branch(BranchKind::Unconditional {
            literal: Literal::Immediate(-4),
        });
        let word = encode(&ir, 16, &symbols).unwrap();
        match decode::decode(word).unwrap() {
            Ir::Branch(BranchKind::Unconditional {
                literal: Literal::Immediate(offset),
            }) => assert_eq!(offset, -4),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn resolved_immediate_load_literal_target_is_not_rescaled() {
        let symbols = SymbolTable::new();
        let ir = Ir::LoadStore {
            sf: true,
            rt: 3,
            kind: LoadStoreKind::LoadLiteral {
                literal: Literal::Immediate(7),
            },
        };
        let word = encode(&ir, 0, &symbols).unwrap();
        assert_eq!(decode::decode(word).unwrap(), ir);
    }

    #[test]
    fn single_data_transfer_round_trips_at_both_widths() {
        // Regression: `sf` for load/store lives at bit 30, with bit 31 a
        // fixed class bit -- a 32-bit `str` (`sf=false`, bit31 still 1)
        // must decode just as readily as a 64-bit one.
        let symbols = SymbolTable::new();
        for sf in [true, false] {
            let ir = Ir::LoadStore {
                sf,
                rt: 0,
                kind: LoadStoreKind::SingleDataTransfer {
                    l: false,
                    xn: 1,
                    mode: AddressingMode::UnsignedOffset { uoffset: 0 },
                },
            };
            let word = encode(&ir, 0, &symbols).unwrap();
            assert_eq!(decode::decode(word).unwrap(), ir, "sf={sf}");
        }
    }

    #[test]
    fn load_literal_round_trips_at_both_widths() {
        // Regression: a 32-bit load-literal (`sf=false`, bit31 fixed 0)
        // must decode just as readily as a 64-bit one (`sf=true`).
        let symbols = SymbolTable::new();
        for sf in [true, false] {
            let ir = Ir::LoadStore {
                sf,
                rt: 2,
                kind: LoadStoreKind::LoadLiteral {
                    literal: Literal::Immediate(5),
                },
            };
            let word = encode(&ir, 0, &symbols).unwrap();
            assert_eq!(decode::decode(word).unwrap(), ir, "sf={sf}");
        }
    }

    #[test]
    fn unresolved_label_is_an_error() {
        let symbols = SymbolTable::new();
        let ir = Ir::Branch(BranchKind::Unconditional {
            literal: Literal::Label("nope".to_string()),
        });
        assert_eq!(
            encode(&ir, 0, &symbols),
            Err(EncodeError::UnresolvedLabel("nope".to_string()))
        );
    }
}
