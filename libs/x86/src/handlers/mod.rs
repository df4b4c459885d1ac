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

//! The opcode dispatch table. Each family module contributes a fixed
//! slice of handlers; the concatenation order below is the admission
//! priority. Predicates may peek at unread bytes (a second opcode byte,
//! a group selector in the next ModR/M byte) but never consume any.
mod arith;
mod fpu;
mod jump;
mod misc;
mod mov;
mod shift;
mod stack;
mod string;
mod test;

use crate::{
    cursor::Cursor,
    inst::InstructionKind,
    operand::Operand,
    reg::{Reg, Width},
};
use anyhow::Result;
use lazy_static::lazy_static;

/// What a handler produces. The driver stamps on address, length, raw
/// bytes, and prefix annotations; handlers only name the operation and
/// its operands.
#[derive(Debug)]
pub struct Decoded {
    pub kind: InstructionKind,
    pub operands: Vec<Operand>,
}

impl Decoded {
    pub fn nullary(kind: InstructionKind) -> Self {
        Self {
            kind,
            operands: Vec::new(),
        }
    }

    pub fn unary(kind: InstructionKind, a: Operand) -> Self {
        Self {
            kind,
            operands: vec![a],
        }
    }

    pub fn binary(kind: InstructionKind, a: Operand, b: Operand) -> Self {
        Self {
            kind,
            operands: vec![a, b],
        }
    }

    pub fn ternary(kind: InstructionKind, a: Operand, b: Operand, c: Operand) -> Self {
        Self {
            kind,
            operands: vec![a, b, c],
        }
    }
}

/// One dispatch entry. `matches` is called with the opcode byte already
/// consumed and the cursor resting just past it; `decode` is called the
/// same way and must consume the rest of the instruction.
pub struct Handler {
    pub name: &'static str,
    pub matches: fn(op: u8, cursor: &Cursor) -> bool,
    pub decode: fn(op: u8, cursor: &mut Cursor) -> Result<Decoded>,
}

lazy_static! {
    static ref DISPATCH: Vec<&'static Handler> = {
        let families: [&[Handler]; 9] = [
            fpu::HANDLERS,
            string::HANDLERS,
            jump::HANDLERS,
            stack::HANDLERS,
            shift::HANDLERS,
            test::HANDLERS,
            misc::HANDLERS,
            mov::HANDLERS,
            arith::HANDLERS,
        ];
        let mut table = Vec::new();
        for family in families {
            table.extend(family.iter());
        }
        table
    };
}

/// Find the first handler that admits this opcode, or None if the byte
/// is not something we decode.
pub fn resolve(op: u8, cursor: &Cursor) -> Option<&'static Handler> {
    DISPATCH.iter().copied().find(|h| (h.matches)(op, cursor))
}

/// The accumulator register at the given width (AL, AX, or EAX).
fn accumulator(width: Width) -> Operand {
    Operand::reg(Reg::Eax, width)
}

#[cfg(test)]
mod dispatch_tests {
    use super::*;

    #[test]
    fn every_handler_is_named() {
        for h in DISPATCH.iter() {
            assert!(!h.name.is_empty());
        }
    }

    #[test]
    fn at_most_one_family_admits_each_plain_opcode() {
        // For opcodes that do not require lookahead the table must not
        // hide one family's handler behind another's.
        let code: [u8; 0] = [];
        let cursor = Cursor::new(&code);
        for op in [0x50u8, 0x90, 0xC3, 0xE8, 0xA4, 0xF4] {
            let admitted: Vec<_> = DISPATCH
                .iter()
                .filter(|h| (h.matches)(op, &cursor))
                .map(|h| h.name)
                .collect();
            assert_eq!(admitted.len(), 1, "opcode 0x{:02X}: {:?}", op, admitted);
        }
    }

    #[test]
    fn prefix_bytes_are_never_admitted() {
        let code: [u8; 0] = [];
        let cursor = Cursor::new(&code);
        for op in [0x26u8, 0x2E, 0x36, 0x3E, 0x64, 0x65, 0x66, 0x67, 0xF0, 0xF2, 0xF3] {
            assert!(
                resolve(op, &cursor).is_none(),
                "prefix 0x{:02X} reached dispatch",
                op
            );
        }
    }
}
