//! C5a -- the two-pass assembler.
//!
//! Pass 1 walks the source once, classifying each line, inserting labels
//! into the symbol table and parsing directives/instructions into IR
//! while tracking the emit address. Pass 2 resets the address and
//! translates the now-complete IR list to bytes against the closed
//! symbol table, so forward label references just work.

pub mod lexer;
pub mod mnemonics;
pub mod operand;
pub mod symbols;

use log::debug;

use crate::encode;
use crate::error::AssembleError;
use crate::ir::Ir;
use lexer::Statement;
use symbols::SymbolTable;

/// Assemble `source` into a little-endian binary image, ready to be
/// loaded directly into the emulator's memory at address 0.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssembleError> {
    let mut symbols = SymbolTable::new();
    let mut ir_list: Vec<(usize, Ir)> = Vec::new();
    let mut address = 0u64;

    for (line_no, raw_line) in source.lines().enumerate() {
        let line = line_no + 1;
        let Some(statement) = lexer::classify(raw_line, line)? else {
            continue;
        };
        match statement {
            Statement::Label(name) => {
                symbols.define(name, address)?;
            }
            Statement::Directive { name, operands } => {
                let ir = parse_directive(&name, &operands, line)?;
                ir_list.push((line, ir));
                address += 4;
            }
            Statement::Instruction {
                mnemonic,
                suffix,
                operands,
            } => {
                let ir = mnemonics::dispatch(&mnemonic, suffix.as_deref(), operands, line)?;
                ir_list.push((line, ir));
                address += 4;
            }
        }
    }
    debug!("pass 1 complete: {} instructions, {} labels", ir_list.len(), address / 4);

    let mut image = Vec::with_capacity(ir_list.len() * 4);
    let mut address = 0u64;
    for (line, ir) in &ir_list {
        let word = encode::encode(ir, address, &symbols).map_err(|source| AssembleError::Encode {
            line: *line,
            source,
        })?;
        image.extend_from_slice(&word.to_le_bytes());
        address += 4;
    }
    Ok(image)
}

fn parse_directive(name: &str, operands: &[String], line: usize) -> Result<Ir, AssembleError> {
    if name != "int" {
        return Err(AssembleError::UnknownMnemonic {
            line,
            mnemonic: format!(".{name}"),
        });
    }
    if operands.len() != 1 {
        return Err(AssembleError::WrongOperandCount {
            line,
            expected: 1,
            found: operands.len(),
        });
    }
    let text = operands[0].trim();
    let value = if let Some(hex) = text.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse::<i64>().map(|v| v as u32)
    }
    .map_err(|_| AssembleError::BadOperand {
        line,
        operand: operands[0].clone(),
    })?;
    Ok(Ir::Directive { value })
}
