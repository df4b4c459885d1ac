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

//! Stack traffic: PUSH/POP in register, immediate, and r/m encodings,
//! plus PUSHAD/POPAD.
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

pub(super) const HANDLERS: &[Handler] = &[
    Handler {
        name: "push-pop-reg",
        matches: |op, _| (0x50..=0x5F).contains(&op),
        decode: decode_push_pop_reg,
    },
    Handler {
        name: "push-imm",
        matches: |op, _| matches!(op, 0x68 | 0x6A),
        decode: decode_push_imm,
    },
    Handler {
        name: "pop-rm",
        matches: |op, _| op == 0x8F,
        decode: decode_pop_rm,
    },
    Handler {
        name: "push-rm",
        matches: |op, cursor| op == 0xFF && modrm::peek_reg(cursor) == Some(6),
        decode: decode_push_rm,
    },
    Handler {
        name: "pushad-popad",
        matches: |op, _| matches!(op, 0x60 | 0x61),
        decode: decode_pushad_popad,
    },
];

fn decode_push_pop_reg(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let kind = if op < 0x58 {
        InstructionKind::Push
    } else {
        InstructionKind::Pop
    };
    let reg = Reg::from_index(op & 0x07);
    Ok(Decoded::unary(kind, Operand::reg(reg, cursor.operand_width())))
}

fn decode_push_imm(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let imm = if op == 0x6A {
        // PUSH imm8 sign-extends onto the stack as a dword.
        Immediate::signed(i32::from(cursor.read_u8("imm8")? as i8), Width::Dword)
    } else {
        Immediate::unsigned(cursor.read_u32("imm32")?, Width::Dword)
    };
    Ok(Decoded::unary(InstructionKind::Push, Operand::imm(imm)))
}

fn decode_pop_rm(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = cursor.operand_width();
    let (m, rm) = modrm::read(cursor, width)?;
    if m.reg != 0 {
        bail!(DisassemblyError::BadGroupSelector {
            op,
            selector: m.reg
        });
    }
    Ok(Decoded::unary(InstructionKind::Pop, rm))
}

fn decode_push_rm(_op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = cursor.operand_width();
    let (_, rm) = modrm::read(cursor, width)?;
    Ok(Decoded::unary(InstructionKind::Push, rm))
}

fn decode_pushad_popad(op: u8, _cursor: &mut Cursor) -> Result<Decoded> {
    Ok(Decoded::nullary(if op == 0x60 {
        InstructionKind::Pushad
    } else {
        InstructionKind::Popad
    }))
}
