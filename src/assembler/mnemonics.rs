//! Alias expansion and mnemonic dispatch: turns a classified instruction
//! line into its IR.
//!
//! The teacher's binary-search-table idiom doesn't fit a domain this
//! small -- a `match` over a handful of string arms already gives the
//! compiler the same exhaustiveness and a reader the same "one mnemonic,
//! one arm" structure without hand-rolling a sorted array.

use crate::error::AssembleError;
use crate::ir::*;

use super::operand::{self, Register};

/// Rewrite one of the nine data-processing aliases into its canonical
/// mnemonic + operand list, inserting the zero register where the spec
/// calls for it. Non-alias mnemonics pass through untouched.
fn expand_alias(mnemonic: &str, operands: Vec<String>) -> (String, Vec<String>) {
    let zr = |sf_hint: &str| if sf_hint.starts_with('w') { "wzr" } else { "xzr" };

    match mnemonic {
        "cmp" if operands.len() == 2 => {
            let rn = &operands[0];
            let zero = zr(rn).to_string();
            ("subs".to_string(), vec![zero, operands[0].clone(), operands[1].clone()])
        }
        "cmn" if operands.len() == 2 => {
            let rn = &operands[0];
            let zero = zr(rn).to_string();
            ("adds".to_string(), vec![zero, operands[0].clone(), operands[1].clone()])
        }
        "neg" | "negs" if operands.len() == 2 => {
            let base = if mnemonic == "negs" { "subs" } else { "sub" };
            let rd = &operands[0];
            let zero = zr(rd).to_string();
            (base.to_string(), vec![operands[0].clone(), zero, operands[1].clone()])
        }
        "tst" if operands.len() == 2 => {
            let rn = &operands[0];
            let zero = zr(rn).to_string();
            ("ands".to_string(), vec![zero, operands[0].clone(), operands[1].clone()])
        }
        "mvn" if operands.len() == 2 => {
            let rd = &operands[0];
            let zero = zr(rd).to_string();
            ("orn".to_string(), vec![operands[0].clone(), zero, operands[1].clone()])
        }
        "mov" if operands.len() == 2 => {
            let rd = &operands[0];
            let zero = zr(rd).to_string();
            ("orr".to_string(), vec![operands[0].clone(), zero, operands[1].clone()])
        }
        "mul" | "mneg" if operands.len() == 3 => {
            let base = if mnemonic == "mneg" { "msub" } else { "madd" };
            let rd = &operands[0];
            let zero = zr(rd).to_string();
            (
                base.to_string(),
                vec![operands[0].clone(), operands[1].clone(), operands[2].clone(), zero],
            )
        }
        _ => (mnemonic.to_string(), operands),
    }
}

fn expect_operands<'a>(
    operands: &'a [String],
    expected: usize,
    line: usize,
) -> Result<&'a [String], AssembleError> {
    if operands.len() != expected {
        return Err(AssembleError::WrongOperandCount {
            line,
            expected,
            found: operands.len(),
        });
    }
    Ok(operands)
}

fn reg(operands: &[String], index: usize, line: usize) -> Result<Register, AssembleError> {
    operand::parse_register(&operands[index], line)
}

/// Dispatch entry point used by the two-pass driver: resolves the `b.cond`
/// sub-mnemonic form, expands data-processing aliases, then parses the
/// (now canonical) mnemonic into its IR.
pub fn dispatch(
    mnemonic: &str,
    suffix: Option<&str>,
    operands: Vec<String>,
    line: usize,
) -> Result<Ir, AssembleError> {
    if mnemonic == "b" && suffix.is_some() {
        return parse_conditional_branch(suffix, &operands, line);
    }

    let (mnemonic, operands) = expand_alias(mnemonic, operands);

    match mnemonic.as_str() {
        "add" | "adds" | "sub" | "subs" => parse_arith(&mnemonic, &operands, line),
        "movz" | "movn" | "movk" => parse_wide_move(&mnemonic, &operands, line),
        "and" | "bic" | "orr" | "orn" | "eor" | "eon" | "ands" | "bics" => {
            parse_bit_logic(&mnemonic, &operands, line)
        }
        "madd" | "msub" => parse_multiply(&mnemonic, &operands, line),
        "ldr" | "str" => parse_load_store(&mnemonic, &operands, line),
        "b" => parse_unconditional_branch(&operands, line),
        "br" => parse_register_branch(&operands, line),
        _ => Err(AssembleError::UnknownMnemonic {
            line,
            mnemonic: mnemonic.clone(),
        }),
    }
}

fn parse_arith(mnemonic: &str, operands: &[String], line: usize) -> Result<Ir, AssembleError> {
    if operands.len() != 3 && operands.len() != 4 {
        return Err(AssembleError::WrongOperandCount {
            line,
            expected: 3,
            found: operands.len(),
        });
    }
    let rd = reg(operands, 0, line)?;
    let rn = reg(operands, 1, line)?;

    let op_is_immediate = operands[2].trim_start().starts_with('#');

    if op_is_immediate {
        operand::check_uniform_width(&[rd, rn], line)?;
        let imm = operand::parse_immediate(operands[2].trim(), line)?;
        if !(0..=0xfff).contains(&imm) {
            return Err(AssembleError::BadOperand {
                line,
                operand: operands[2].clone(),
            });
        }
        let sh = if operands.len() == 4 {
            let (shift, amount) = operand::parse_shift(operands[3].trim(), line)?;
            if !matches!(shift, ShiftType::Lsl) || (amount != 0 && amount != 12) {
                return Err(AssembleError::BadOperand {
                    line,
                    operand: operands[3].clone(),
                });
            }
            amount == 12
        } else {
            false
        };
        let arith = match mnemonic {
            "add" => ArithOp::Add,
            "adds" => ArithOp::Adds,
            "sub" => ArithOp::Sub,
            "subs" => ArithOp::Subs,
            _ => unreachable!(),
        };
        Ok(Ir::Immediate {
            sf: rd.sf,
            opcode: ImmOpcode::Arithmetic(arith),
            rd: rd.encoding,
            operand: ImmOperand::Arithmetic {
                sh,
                imm12: imm as u16,
                rn: rn.encoding,
            },
        })
    } else {
        if operands.len() != 3 {
            return Err(AssembleError::WrongOperandCount {
                line,
                expected: 3,
                found: operands.len(),
            });
        }
        let rm = reg(operands, 2, line)?;
        operand::check_uniform_width(&[rd, rn, rm], line)?;
        let arith = match mnemonic {
            "add" => RegArithOp::Add,
            "adds" => RegArithOp::Adds,
            "sub" => RegArithOp::Sub,
            "subs" => RegArithOp::Subs,
            _ => unreachable!(),
        };
        Ok(Ir::Register {
            sf: rd.sf,
            opcode: RegOpcode::Arithmetic(arith),
            shift: ShiftType::Lsl,
            negated: false,
            rm: rm.encoding,
            rn: rn.encoding,
            rd: rd.encoding,
            operand: RegOperand::Shifted { imm6: 0 },
        })
    }
}

fn parse_wide_move(mnemonic: &str, operands: &[String], line: usize) -> Result<Ir, AssembleError> {
    if operands.len() != 2 && operands.len() != 3 {
        return Err(AssembleError::WrongOperandCount {
            line,
            expected: 2,
            found: operands.len(),
        });
    }
    let rd = reg(operands, 0, line)?;
    let imm16 = operand::parse_immediate(operands[1].trim(), line)?;
    let hw = if operands.len() == 3 {
        let (shift, amount) = operand::parse_shift(operands[2].trim(), line)?;
        if !matches!(shift, ShiftType::Lsl) || amount % 16 != 0 {
            return Err(AssembleError::BadOperand {
                line,
                operand: operands[2].clone(),
            });
        }
        amount / 16
    } else {
        0
    };
    let op = match mnemonic {
        "movz" => WideMoveOp::Movz,
        "movn" => WideMoveOp::Movn,
        "movk" => WideMoveOp::Movk,
        _ => unreachable!(),
    };
    Ok(Ir::Immediate {
        sf: rd.sf,
        opcode: ImmOpcode::WideMove(op),
        rd: rd.encoding,
        operand: ImmOperand::WideMove {
            hw,
            imm16: imm16 as u16,
        },
    })
}

fn parse_bit_logic(mnemonic: &str, operands: &[String], line: usize) -> Result<Ir, AssembleError> {
    if operands.len() != 3 && operands.len() != 4 {
        return Err(AssembleError::WrongOperandCount {
            line,
            expected: 3,
            found: operands.len(),
        });
    }
    let rd = reg(operands, 0, line)?;
    let rn = reg(operands, 1, line)?;
    let rm = reg(operands, 2, line)?;
    operand::check_uniform_width(&[rd, rn, rm], line)?;

    let (shift, imm6) = if operands.len() == 4 {
        operand::parse_shift(operands[3].trim(), line)?
    } else {
        (ShiftType::Lsl, 0)
    };

    let (op, negated) = match mnemonic {
        "and" => (LogicOp::And, false),
        "bic" => (LogicOp::And, true),
        "orr" => (LogicOp::Orr, false),
        "orn" => (LogicOp::Orr, true),
        "eor" => (LogicOp::Eor, false),
        "eon" => (LogicOp::Eor, true),
        "ands" => (LogicOp::Ands, false),
        "bics" => (LogicOp::Ands, true),
        _ => unreachable!(),
    };

    Ok(Ir::Register {
        sf: rd.sf,
        opcode: RegOpcode::BitLogic(op),
        shift,
        negated,
        rm: rm.encoding,
        rn: rn.encoding,
        rd: rd.encoding,
        operand: RegOperand::Shifted { imm6 },
    })
}

fn parse_multiply(mnemonic: &str, operands: &[String], line: usize) -> Result<Ir, AssembleError> {
    let operands = expect_operands(operands, 4, line)?;
    let rd = reg(operands, 0, line)?;
    let rn = reg(operands, 1, line)?;
    let rm = reg(operands, 2, line)?;
    let ra = reg(operands, 3, line)?;
    operand::check_uniform_width(&[rd, rn, rm, ra], line)?;

    let (op, x) = match mnemonic {
        "madd" => (MulOp::Madd, false),
        "msub" => (MulOp::Msub, true),
        _ => unreachable!(),
    };

    Ok(Ir::Register {
        sf: rd.sf,
        opcode: RegOpcode::Multiply(op),
        shift: ShiftType::Lsl,
        negated: false,
        rm: rm.encoding,
        rn: rn.encoding,
        rd: rd.encoding,
        operand: RegOperand::Multiply { x, ra: ra.encoding },
    })
}

fn parse_load_store(mnemonic: &str, operands: &[String], line: usize) -> Result<Ir, AssembleError> {
    if operands.len() != 2 && operands.len() != 3 {
        return Err(AssembleError::WrongOperandCount {
            line,
            expected: 2,
            found: operands.len(),
        });
    }
    let rt = reg(operands, 0, line)?;
    let l = mnemonic == "ldr";

    if operands[1].trim().starts_with('[') {
        let trailing = operands.get(2).map(|s| s.trim());
        let scale = if rt.sf { 8 } else { 4 };
        let (xn, mode) =
            operand::parse_addressing_mode(operands[1].trim(), trailing, scale, line)?;
        Ok(Ir::LoadStore {
            sf: rt.sf,
            rt: rt.encoding,
            kind: LoadStoreKind::SingleDataTransfer {
                l,
                xn: xn.encoding,
                mode,
            },
        })
    } else if l && operands.len() == 2 {
        Ok(Ir::LoadStore {
            sf: rt.sf,
            rt: rt.encoding,
            kind: LoadStoreKind::LoadLiteral {
                literal: operand::parse_literal(operands[1].trim()),
            },
        })
    } else {
        Err(AssembleError::BadOperand {
            line,
            operand: operands[1].clone(),
        })
    }
}

fn parse_unconditional_branch(operands: &[String], line: usize) -> Result<Ir, AssembleError> {
    let operands = expect_operands(operands, 1, line)?;
    Ok(Ir::Branch(BranchKind::Unconditional {
        literal: operand::parse_literal(operands[0].trim()),
    }))
}

fn parse_register_branch(operands: &[String], line: usize) -> Result<Ir, AssembleError> {
    let operands = expect_operands(operands, 1, line)?;
    let xn = reg(operands, 0, line)?;
    Ok(Ir::Branch(BranchKind::Register { xn: xn.encoding }))
}

fn parse_conditional_branch(
    suffix: Option<&str>,
    operands: &[String],
    line: usize,
) -> Result<Ir, AssembleError> {
    let operands = expect_operands(operands, 1, line)?;
    let suffix = suffix.ok_or(AssembleError::BadOperand {
        line,
        operand: "b".to_string(),
    })?;
    let cond = Cond::from_suffix(suffix).ok_or_else(|| AssembleError::BadOperand {
        line,
        operand: format!("b.{suffix}"),
    })?;
    Ok(Ir::Branch(BranchKind::Conditional {
        literal: operand::parse_literal(operands[0].trim()),
        cond,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_alias_expands_to_orr_with_zero_register() {
        let ir = dispatch("mov", None, vec!["x0".to_string(), "x1".to_string()], 1).unwrap();
        assert_eq!(
            ir,
            Ir::Register {
                sf: true,
                opcode: RegOpcode::BitLogic(LogicOp::Orr),
                shift: ShiftType::Lsl,
                negated: false,
                rm: 1,
                rn: ZERO_REG,
                rd: 0,
                operand: RegOperand::Shifted { imm6: 0 },
            }
        );
    }

    #[test]
    fn cmp_alias_expands_to_subs_discarding_result() {
        let ir = dispatch("cmp", None, vec!["x0".to_string(), "#4".to_string()], 1).unwrap();
        match ir {
            Ir::Immediate { rd, .. } => assert_eq!(rd, ZERO_REG),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn add_with_immediate_operand_parses_as_immediate_family() {
        let ir = dispatch(
            "add",
            None,
            vec!["x0".to_string(), "x1".to_string(), "#1".to_string()],
            1,
        )
        .unwrap();
        assert!(matches!(ir, Ir::Immediate { .. }));
    }

    #[test]
    fn add_with_immediate_and_lsl_12_sets_sh_bit() {
        let ir = dispatch(
            "add",
            None,
            vec![
                "x0".to_string(),
                "x1".to_string(),
                "#1".to_string(),
                "lsl #12".to_string(),
            ],
            1,
        )
        .unwrap();
        match ir {
            Ir::Immediate {
                operand: ImmOperand::Arithmetic { sh, imm12, .. },
                ..
            } => {
                assert!(sh);
                assert_eq!(imm12, 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn add_with_immediate_and_lsl_0_leaves_sh_clear() {
        let ir = dispatch(
            "add",
            None,
            vec![
                "x0".to_string(),
                "x1".to_string(),
                "#1".to_string(),
                "lsl #0".to_string(),
            ],
            1,
        )
        .unwrap();
        match ir {
            Ir::Immediate {
                operand: ImmOperand::Arithmetic { sh, .. },
                ..
            } => assert!(!sh),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn add_immediate_rejects_non_12_shift_amount() {
        assert!(dispatch(
            "add",
            None,
            vec![
                "x0".to_string(),
                "x1".to_string(),
                "#1".to_string(),
                "lsl #4".to_string(),
            ],
            1,
        )
        .is_err());
    }

    #[test]
    fn add_with_register_operand_parses_as_register_family() {
        let ir = dispatch(
            "add",
            None,
            vec!["x0".to_string(), "x1".to_string(), "x2".to_string()],
            1,
        )
        .unwrap();
        assert!(matches!(ir, Ir::Register { .. }));
    }

    #[test]
    fn conditional_branch_suffix_resolves_cond() {
        let ir = dispatch("b", Some("lt"), vec!["loop".to_string()], 1).unwrap();
        match ir {
            Ir::Branch(BranchKind::Conditional { cond, .. }) => assert_eq!(cond, Cond::Lt),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn ldr_with_unsigned_offset_parses_as_single_data_transfer() {
        // x0 is a 64-bit access, so the #16 byte offset scales down to
        // field value 2 (16 / 8).
        let ir = dispatch(
            "ldr",
            None,
            vec!["x0".to_string(), "[x1, #16]".to_string()],
            1,
        )
        .unwrap();
        match ir {
            Ir::LoadStore {
                kind: LoadStoreKind::SingleDataTransfer { l, mode, .. },
                ..
            } => {
                assert!(l);
                assert_eq!(mode, AddressingMode::UnsignedOffset { uoffset: 2 });
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn ldr_with_w_register_scales_unsigned_offset_by_four() {
        let ir = dispatch(
            "ldr",
            None,
            vec!["w0".to_string(), "[x1, #16]".to_string()],
            1,
        )
        .unwrap();
        match ir {
            Ir::LoadStore {
                kind: LoadStoreKind::SingleDataTransfer { mode, .. },
                ..
            } => assert_eq!(mode, AddressingMode::UnsignedOffset { uoffset: 4 }),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn ldr_with_bare_label_parses_as_load_literal() {
        let ir = dispatch("ldr", None, vec!["x0".to_string(), "value".to_string()], 1).unwrap();
        assert!(matches!(
            ir,
            Ir::LoadStore {
                kind: LoadStoreKind::LoadLiteral { .. },
                ..
            }
        ));
    }

    #[test]
    fn unknown_mnemonic_is_an_error() {
        assert!(dispatch("frobnicate", None, vec![], 1).is_err());
    }
}
