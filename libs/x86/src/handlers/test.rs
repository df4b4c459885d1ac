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

//! TEST in its r/m and accumulator-immediate encodings.
use super::{accumulator, Decoded, Handler};
use crate::{
    cursor::Cursor,
    inst::InstructionKind,
    modrm,
    operand::{Immediate, Operand},
    reg::{Reg, Width},
};
use anyhow::Result;

pub(super) const HANDLERS: &[Handler] = &[
    Handler {
        name: "test-rm",
        matches: |op, _| matches!(op, 0x84 | 0x85),
        decode: decode_test_rm,
    },
    Handler {
        name: "test-acc-imm",
        matches: |op, _| matches!(op, 0xA8 | 0xA9),
        decode: decode_test_acc,
    },
];

fn decode_test_rm(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = if op == 0x84 {
        Width::Byte
    } else {
        cursor.operand_width()
    };
    let (m, rm) = modrm::read(cursor, width)?;
    Ok(Decoded::binary(
        InstructionKind::Test,
        rm,
        Operand::reg(Reg::from_index(m.reg), width),
    ))
}

fn decode_test_acc(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    Ok(if op == 0xA8 {
        let imm = Immediate::unsigned(cursor.read_u8("imm8")?.into(), Width::Byte);
        Decoded::binary(InstructionKind::Test, accumulator(Width::Byte), Operand::imm(imm))
    } else {
        let width = cursor.operand_width();
        let imm = match width {
            Width::Word => Immediate::unsigned(cursor.read_u16("imm16")?.into(), Width::Word),
            _ => Immediate::unsigned(cursor.read_u32("imm32")?, Width::Dword),
        };
        Decoded::binary(InstructionKind::Test, accumulator(width), Operand::imm(imm))
    })
}
