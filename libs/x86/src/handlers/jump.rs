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

//! Control transfer: JMP, conditional jumps, CALL, RET, INT. Relative
//! targets resolve to absolute addresses here; every recorded target is
//! end-of-instruction plus the signed displacement.
use super::{Decoded, Handler};
use crate::{
    cursor::Cursor,
    inst::{Cond, InstructionKind},
    modrm,
    operand::{Immediate, Operand},
    reg::Width,
};
use anyhow::Result;

pub(super) const HANDLERS: &[Handler] = &[
    Handler {
        name: "jmp-rel",
        matches: |op, _| matches!(op, 0xEB | 0xE9),
        decode: decode_jmp_rel,
    },
    Handler {
        name: "jcc-short",
        matches: |op, _| (0x70..=0x7F).contains(&op),
        decode: decode_jcc_short,
    },
    Handler {
        name: "jcc-near",
        matches: |op, cursor| {
            op == 0x0F && matches!(cursor.peek(), Some(op2) if (0x80..=0x8F).contains(&op2))
        },
        decode: decode_jcc_near,
    },
    Handler {
        name: "jecxz",
        matches: |op, _| op == 0xE3,
        decode: decode_jecxz,
    },
    Handler {
        name: "call-rel",
        matches: |op, _| op == 0xE8,
        decode: decode_call_rel,
    },
    Handler {
        name: "call-jmp-rm",
        matches: |op, cursor| {
            op == 0xFF && matches!(modrm::peek_reg(cursor), Some(2) | Some(4))
        },
        decode: decode_call_jmp_rm,
    },
    Handler {
        name: "ret",
        matches: |op, _| matches!(op, 0xC3 | 0xC2 | 0xCB | 0xCA),
        decode: decode_ret,
    },
    Handler {
        name: "int",
        matches: |op, _| matches!(op, 0xCC | 0xCD),
        decode: decode_int,
    },
];

/// Read a rel8 and resolve it against the end of the instruction.
fn rel8_target(cursor: &mut Cursor) -> Result<Operand> {
    let offset = i32::from(cursor.read_u8("rel8")? as i8);
    Ok(target_operand(cursor, offset))
}

fn rel32_target(cursor: &mut Cursor) -> Result<Operand> {
    let offset = cursor.read_u32("rel32")? as i32;
    Ok(target_operand(cursor, offset))
}

fn target_operand(cursor: &Cursor, offset: i32) -> Operand {
    let target = cursor.address().wrapping_add_signed(offset);
    Operand::imm(Immediate::unsigned(target, Width::Dword))
}

fn decode_jmp_rel(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let target = if op == 0xEB {
        rel8_target(cursor)?
    } else {
        rel32_target(cursor)?
    };
    Ok(Decoded::unary(InstructionKind::Jmp, target))
}

fn decode_jcc_short(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let cond = Cond::from_nibble(op & 0x0F);
    let target = rel8_target(cursor)?;
    Ok(Decoded::unary(InstructionKind::Jcc(cond), target))
}

fn decode_jcc_near(_op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let op2 = cursor.read_u8("opcode2")?;
    let cond = Cond::from_nibble(op2 & 0x0F);
    let target = rel32_target(cursor)?;
    Ok(Decoded::unary(InstructionKind::Jcc(cond), target))
}

fn decode_jecxz(_op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let target = rel8_target(cursor)?;
    Ok(Decoded::unary(InstructionKind::Jecxz, target))
}

fn decode_call_rel(_op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let target = rel32_target(cursor)?;
    Ok(Decoded::unary(InstructionKind::Call, target))
}

fn decode_call_jmp_rm(_op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = cursor.operand_width();
    let (m, rm) = modrm::read(cursor, width)?;
    let kind = if m.reg == 2 {
        InstructionKind::Call
    } else {
        InstructionKind::Jmp
    };
    Ok(Decoded::unary(kind, rm))
}

fn decode_ret(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let kind = if op & 0x08 == 0 {
        InstructionKind::Ret
    } else {
        InstructionKind::Retf
    };
    Ok(if op & 1 == 0 {
        // 0xC2/0xCA pop an imm16 worth of arguments on return.
        let imm = Immediate::unsigned(cursor.read_u16("imm16")?.into(), Width::Word);
        Decoded::unary(kind, Operand::imm(imm))
    } else {
        Decoded::nullary(kind)
    })
}

fn decode_int(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    Ok(if op == 0xCC {
        Decoded::nullary(InstructionKind::Int3)
    } else {
        let imm = Immediate::unsigned(cursor.read_u8("imm8")?.into(), Width::Byte);
        Decoded::unary(InstructionKind::Int, Operand::imm(imm))
    })
}
