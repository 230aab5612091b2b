//! Operand grammar: registers, immediates, literals and load/store
//! addressing modes, parsed from the trimmed token strings `lexer.rs`
//! produces.

use crate::error::AssembleError;
use crate::ir::{AddressingMode, Literal, ShiftType};

/// A parsed register operand: its width flag and its 5-bit encoding
/// (31 for the zero/stack-pointer spellings).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub sf: bool,
    pub encoding: u8,
}

pub fn parse_register(token: &str, line: usize) -> Result<Register, AssembleError> {
    let bad = || AssembleError::BadOperand {
        line,
        operand: token.to_string(),
    };

    let sf = match token.chars().next() {
        Some('x') => true,
        Some('w') => false,
        _ => return Err(bad()),
    };
    let rest = &token[1..];
    let encoding = match rest {
        "zr" | "sp" => 31,
        digits => {
            let value = digits.parse::<u8>().map_err(|_| bad())?;
            if value >= 31 {
                return Err(bad());
            }
            value
        }
    };
    Ok(Register { sf, encoding })
}

/// Enforce that every register operand in one instruction shares a width.
pub fn check_uniform_width(regs: &[Register], line: usize) -> Result<bool, AssembleError> {
    match regs.first() {
        None => Ok(true),
        Some(first) => {
            if regs.iter().all(|r| r.sf == first.sf) {
                Ok(first.sf)
            } else {
                Err(AssembleError::MixedRegisterWidth { line })
            }
        }
    }
}

/// Parse a `#123` / `#0x7b` immediate token.
pub fn parse_immediate(token: &str, line: usize) -> Result<i64, AssembleError> {
    let bad = || AssembleError::BadOperand {
        line,
        operand: token.to_string(),
    };
    let digits = token.strip_prefix('#').ok_or_else(bad)?;
    parse_numeric(digits).ok_or_else(bad)
}

fn parse_numeric(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("-0x")) {
        let value = i64::from_str_radix(hex, 16).ok()?;
        Some(if text.starts_with('-') { -value } else { value })
    } else {
        text.parse::<i64>().ok()
    }
}

/// Parse a branch/load-literal target: numeric immediate or bare label.
pub fn parse_literal(token: &str) -> Literal {
    if let Some(digits) = token.strip_prefix('#') {
        if let Some(value) = parse_numeric(digits) {
            return Literal::Immediate(value);
        }
    }
    Literal::Label(token.to_string())
}

pub fn parse_shift(token: &str, line: usize) -> Result<(ShiftType, u8), AssembleError> {
    let bad = || AssembleError::BadOperand {
        line,
        operand: token.to_string(),
    };
    let (kind, amount) = token.split_once(' ').ok_or_else(bad)?;
    let shift = match kind {
        "lsl" => ShiftType::Lsl,
        "lsr" => ShiftType::Lsr,
        "asr" => ShiftType::Asr,
        "ror" => ShiftType::Ror,
        _ => return Err(bad()),
    };
    let amount = parse_immediate(amount.trim(), line)?;
    Ok((shift, amount as u8))
}

/// Parse a load/store offset token: `[xn]`, `[xn, #imm]`, `[xn, #imm]!`,
/// `[xn], #imm` (the second, trailing operand), or `[xn, xm]`.
///
/// `trailing` is the post-indexed displacement operand that follows the
/// closing `[xn]` as a separate comma-delimited operand, if the
/// instruction supplied one. `scale` is the access width in bytes (8 for
/// `sf=1`, 4 for `sf=0`): an unsigned-offset immediate is a byte count in
/// source text but the 12-bit field stores it divided by `scale` (spec
/// §4.3/§4.5), so it must be an exact multiple.
pub fn parse_addressing_mode(
    bracketed: &str,
    trailing: Option<&str>,
    scale: u64,
    line: usize,
) -> Result<(Register, AddressingMode), AssembleError> {
    let bad = || AssembleError::BadOperand {
        line,
        operand: bracketed.to_string(),
    };

    let pre_indexed = bracketed.ends_with('!');
    let inner = bracketed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(if pre_indexed { "]!" } else { "]" }))
        .ok_or_else(bad)?;

    let mut parts = inner.split(',').map(str::trim);
    let xn = parse_register(parts.next().ok_or_else(bad)?, line)?;
    let second = parts.next();

    if let Some(offset_text) = trailing {
        if second.is_some() || pre_indexed {
            return Err(bad());
        }
        let simm9 = parse_immediate(offset_text, line)? as i16;
        return Ok((xn, AddressingMode::PostIndexed { simm9 }));
    }

    match second {
        None => Ok((xn, AddressingMode::UnsignedOffset { uoffset: 0 })),
        Some(tok) if tok.starts_with('x') || tok.starts_with('w') => {
            let xm = parse_register(tok, line)?;
            Ok((xn, AddressingMode::RegisterOffset { xm: xm.encoding }))
        }
        Some(tok) => {
            let imm = parse_immediate(tok, line)?;
            if pre_indexed {
                Ok((xn, AddressingMode::PreIndexed { simm9: imm as i16 }))
            } else {
                if imm % scale as i64 != 0 {
                    return Err(bad());
                }
                Ok((
                    xn,
                    AddressingMode::UnsignedOffset {
                        uoffset: (imm / scale as i64) as u16,
                    },
                ))
            }
        }
    }
}
