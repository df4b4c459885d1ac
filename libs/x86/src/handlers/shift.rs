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

//! Shifts and rotates: group 2 in its immediate, by-one, and by-CL
//! encodings. Selector 6 has no defined operation.
use super::{Decoded, Handler};
use crate::{
    cursor::Cursor,
    inst::InstructionKind,
    modrm,
    operand::{Immediate, Operand},
    reg::{Reg, Width},
    DisassemblyError,
};
use anyhow::{bail, Result};

pub(super) const HANDLERS: &[Handler] = &[Handler {
    name: "group2-shift",
    matches: |op, _| matches!(op, 0xC0 | 0xC1 | 0xD0 | 0xD1 | 0xD2 | 0xD3),
    decode: decode_group2,
}];

fn shift_kind(op: u8, selector: u8) -> Result<InstructionKind> {
    Ok(match selector {
        0 => InstructionKind::Rol,
        1 => InstructionKind::Ror,
        2 => InstructionKind::Rcl,
        3 => InstructionKind::Rcr,
        4 => InstructionKind::Shl,
        5 => InstructionKind::Shr,
        7 => InstructionKind::Sar,
        selector => bail!(DisassemblyError::BadGroupSelector { op, selector }),
    })
}

fn decode_group2(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = if op & 1 == 0 {
        Width::Byte
    } else {
        cursor.operand_width()
    };
    let (m, rm) = modrm::read(cursor, width)?;
    let kind = shift_kind(op, m.reg)?;
    let count = match op {
        // 0xC0/0xC1 carry an explicit count byte.
        0xC0 | 0xC1 => {
            Operand::imm(Immediate::unsigned(cursor.read_u8("imm8")?.into(), Width::Byte))
        }
        // 0xD0/0xD1 shift by exactly one.
        0xD0 | 0xD1 => Operand::imm(Immediate::unsigned(1, Width::Byte)),
        // 0xD2/0xD3 shift by CL.
        _ => Operand::reg(Reg::Ecx, Width::Byte),
    };
    Ok(Decoded::binary(kind, rm, count))
}
