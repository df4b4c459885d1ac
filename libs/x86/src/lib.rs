// This file is part of Retrodump.
//
// Retrodump is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Retrodump is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Retrodump.  If not, see <http://www.gnu.org/licenses/>.

//! Linear-sweep disassembler for 32-bit x86 code.
//!
//! The decoder walks a byte buffer front to back, one instruction at a
//! time: peel prefixes, read the opcode, hand off to the first handler
//! in a fixed-priority table that admits the byte, and record the
//! result. It never follows control flow and never executes anything.
mod cursor;
mod disasm;
mod handlers;
mod inst;
mod modrm;
mod operand;
mod reg;

pub use crate::{
    cursor::Cursor,
    disasm::{disassemble, disassemble_at, Disassembly},
    inst::{Cond, Instruction, InstructionKind},
    operand::{Immediate, Operand},
    reg::{Reg, RepPrefix, SegReg, Width},
};

use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum DisassemblyError {
    /// The buffer ended inside an instruction. `phase` names the field
    /// being read when the bytes ran out.
    #[error("byte buffer ended while reading {phase}")]
    TooShort { phase: &'static str },

    /// No handler admitted the opcode byte at `offset`.
    #[error("unrecognized opcode 0x{op:02X} at offset 0x{offset:X}")]
    UnknownOpcode { offset: usize, op: u8 },

    /// A group opcode carried a `reg` selector with no defined meaning.
    #[error("opcode 0x{op:02X} has no operation for selector {selector}")]
    BadGroupSelector { op: u8, selector: u8 },
}
