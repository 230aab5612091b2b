//! C2 -- machine state: the register file, PSTATE flags, program counter
//! and byte-addressable memory the executor operates on.
//!
//! Shape follows the teacher crate's split between `register_file.rs` and
//! `memory.rs`, folded into one module here since the spec ties register
//! width and memory width together through the same `sf` flag.

use std::fmt;

use crate::error::ExecuteError;
use crate::ir::ZERO_REG;

/// Size of the emulator's fixed memory image: 2 MiB.
pub const MEMORY_SIZE: usize = 1 << 21;

/// The four-flag AArch64 processor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PState {
    pub n: bool,
    pub z: bool,
    pub c: bool,
    pub v: bool,
}

impl fmt::Display for PState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let flag = |set: bool, letter: char| if set { letter } else { '-' };
        write!(
            f,
            "{}{}{}{}",
            flag(self.n, 'N'),
            flag(self.z, 'Z'),
            flag(self.c, 'C'),
            flag(self.v, 'V')
        )
    }
}

/// 31 general registers plus the hardwired zero register, a program
/// counter and the PSTATE flags.
#[derive(Debug)]
pub struct Cpu {
    registers: [u64; 31],
    pc: u64,
    pstate: PState,
    memory: Vec<u8>,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            registers: [0; 31],
            pc: 0,
            // spec: initial PSTATE = {N:0, Z:1, C:0, V:0}
            pstate: PState {
                n: false,
                z: true,
                c: false,
                v: false,
            },
            memory: vec![0; MEMORY_SIZE],
        }
    }

    /// Preload the memory image from a binary file, starting at address 0.
    pub fn load_image(&mut self, bytes: &[u8]) -> Result<(), ExecuteError> {
        if bytes.len() > self.memory.len() {
            return Err(ExecuteError::MemoryOutOfRange {
                address: 0,
                width: bytes.len() as u32,
                limit: self.memory.len() as u64,
            });
        }
        self.memory[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Read register `id`, zero-extended to 64 bits if `sf` is false
    /// (32-bit access). Reading id 31 always yields 0.
    pub fn read_reg(&self, id: u8, sf: bool) -> u64 {
        if id == ZERO_REG {
            return 0;
        }
        let value = self.registers[id as usize];
        if sf {
            value
        } else {
            value & 0xffff_ffff
        }
    }

    /// Write `value` into register `id`. A 32-bit write (`sf=false`)
    /// zero-extends into the full 64-bit register. Writes to id 31 are
    /// silently discarded.
    pub fn write_reg(&mut self, id: u8, sf: bool, value: u64) {
        if id == ZERO_REG {
            return;
        }
        self.registers[id as usize] = if sf { value } else { value & 0xffff_ffff };
    }

    pub fn pc(&self) -> u64 {
        self.pc
    }

    pub fn set_pc(&mut self, value: u64) {
        self.pc = value;
    }

    pub fn inc_pc(&mut self) {
        self.pc = self.pc.wrapping_add(4);
    }

    pub fn flags(&self) -> PState {
        self.pstate
    }

    pub fn set_flags(&mut self, flags: PState) {
        self.pstate = flags;
    }

    fn access_width_bytes(sf: bool) -> usize {
        if sf {
            8
        } else {
            4
        }
    }

    /// Read `sf`-width unit at `address`, little-endian, zero-extended to
    /// 64 bits for a 32-bit access.
    pub fn read_mem(&self, address: u64, sf: bool) -> Result<u64, ExecuteError> {
        let width = Self::access_width_bytes(sf);
        let start = self.bounds_check(address, width)?;
        let mut buf = [0u8; 8];
        buf[..width].copy_from_slice(&self.memory[start..start + width]);
        Ok(u64::from_le_bytes(buf))
    }

    /// Write `sf`-width unit of `value` to `address`, little-endian.
    pub fn write_mem(&mut self, address: u64, sf: bool, value: u64) -> Result<(), ExecuteError> {
        let width = Self::access_width_bytes(sf);
        let start = self.bounds_check(address, width)?;
        let bytes = value.to_le_bytes();
        self.memory[start..start + width].copy_from_slice(&bytes[..width]);
        Ok(())
    }

    /// Fetch the raw 32-bit instruction word at `address` without going
    /// through the `sf`-parameterised read path (instruction fetch is
    /// always a fixed 4-byte access).
    pub fn fetch_word(&self, address: u64) -> Result<u32, ExecuteError> {
        let start = self.bounds_check(address, 4)?;
        let bytes = &self.memory[start..start + 4];
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn bounds_check(&self, address: u64, width: usize) -> Result<usize, ExecuteError> {
        let start = usize::try_from(address).map_err(|_| ExecuteError::MemoryOutOfRange {
            address,
            width: width as u32,
            limit: self.memory.len() as u64,
        })?;
        if start.checked_add(width).map_or(true, |end| end > self.memory.len()) {
            return Err(ExecuteError::MemoryOutOfRange {
                address,
                width: width as u32,
                limit: self.memory.len() as u64,
            });
        }
        Ok(start)
    }

    /// Render the external register/memory dump contract: a full register
    /// listing followed by every non-zero 4-byte-aligned memory word, in
    /// ascending address order. Deliberately not a `Display` impl -- this
    /// is an external wire format, not a debug convenience.
    pub fn dump(&self, mut out: impl std::io::Write) -> std::io::Result<()> {
        writeln!(out, "Registers:")?;
        for id in 0..31u8 {
            writeln!(out, "X{id:02} = {:016x}", self.read_reg(id, true))?;
        }
        writeln!(out, "PC = {:016x}", self.pc)?;
        writeln!(out, "PSTATE : {}", self.pstate)?;
        writeln!(out, "Non-zero memory:")?;
        for addr in (0..self.memory.len()).step_by(4) {
            let word = u32::from_le_bytes(self.memory[addr..addr + 4].try_into().unwrap());
            if word != 0 {
                writeln!(out, "0x{addr:08x}: 0x{word:08x}")?;
            }
        }
        Ok(())
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
