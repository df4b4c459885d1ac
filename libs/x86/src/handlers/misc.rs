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

//! Everything small: NOP (one-byte and the 0x0F 0x1F long forms), HLT,
//! sign extensions, flag manipulation, LEAVE.
use super::{Decoded, Handler};
use crate::{cursor::Cursor, inst::InstructionKind, modrm};
use anyhow::Result;

pub(super) const HANDLERS: &[Handler] = &[
    Handler {
        name: "nop",
        matches: |op, _| op == 0x90,
        decode: |_, _| Ok(Decoded::nullary(InstructionKind::Nop)),
    },
    Handler {
        name: "nop-long",
        matches: |op, cursor| op == 0x0F && cursor.peek() == Some(0x1F),
        decode: decode_nop_long,
    },
    Handler {
        name: "no-operand",
        matches: |op, _| nullary_kind(op).is_some(),
        decode: decode_nullary,
    },
];

fn nullary_kind(op: u8) -> Option<InstructionKind> {
    Some(match op {
        0xF4 => InstructionKind::Hlt,
        0x98 => InstructionKind::Cwde,
        0x99 => InstructionKind::Cdq,
        0xF8 => InstructionKind::Clc,
        0xF9 => InstructionKind::Stc,
        0xF5 => InstructionKind::Cmc,
        0xFC => InstructionKind::Cld,
        0xFD => InstructionKind::Std,
        0xFA => InstructionKind::Cli,
        0xFB => InstructionKind::Sti,
        0xC9 => InstructionKind::Leave,
        _ => return None,
    })
}

fn decode_nullary(op: u8, _cursor: &mut Cursor) -> Result<Decoded> {
    Ok(Decoded::nullary(
        nullary_kind(op).unwrap_or(InstructionKind::Nop),
    ))
}

/// The multi-byte NOP reserves a full ModR/M encoding; decode it so the
/// listing shows the padded form's operand.
fn decode_nop_long(_op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    cursor.read_u8("opcode2")?;
    let width = cursor.operand_width();
    let (_, rm) = modrm::read(cursor, width)?;
    Ok(Decoded::unary(InstructionKind::Nop, rm))
}
