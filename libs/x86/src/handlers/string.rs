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

//! String operations. The implicit ESI/EDI/accumulator operands are
//! recorded for consumers; any REP/REPNE prefix rides on the
//! instruction itself, not here.
use super::{accumulator, Decoded, Handler};
use crate::{
    cursor::Cursor,
    inst::InstructionKind,
    operand::Operand,
    reg::{Reg, Width},
};
use anyhow::Result;

pub(super) const HANDLERS: &[Handler] = &[Handler {
    name: "string-op",
    matches: |op, _| matches!(op, 0xA4 | 0xA5 | 0xA6 | 0xA7 | 0xAA | 0xAB | 0xAC | 0xAD | 0xAE | 0xAF),
    decode: decode_string_op,
}];

fn mem(base: Reg, width: Width) -> Operand {
    Operand::BaseRegisterMemory {
        base,
        width,
        segment: None,
    }
}

fn decode_string_op(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    // Even opcodes are the byte forms; odd ones follow the operand-size
    // attribute.
    let width = if op & 1 == 0 {
        Width::Byte
    } else {
        cursor.operand_width()
    };
    Ok(match op & 0xFE {
        0xA4 => Decoded::binary(
            InstructionKind::Movs,
            mem(Reg::Edi, width),
            mem(Reg::Esi, width),
        ),
        0xA6 => Decoded::binary(
            InstructionKind::Cmps,
            mem(Reg::Esi, width),
            mem(Reg::Edi, width),
        ),
        0xAA => Decoded::binary(InstructionKind::Stos, mem(Reg::Edi, width), accumulator(width)),
        0xAC => Decoded::binary(InstructionKind::Lods, accumulator(width), mem(Reg::Esi, width)),
        _ => Decoded::binary(InstructionKind::Scas, accumulator(width), mem(Reg::Edi, width)),
    })
}
