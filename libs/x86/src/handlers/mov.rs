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

//! Data movement: MOV in all its encodings, LEA, MOVZX/MOVSX, XCHG.
use super::{accumulator, Decoded, Handler};
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
        name: "mov-rm",
        matches: |op, _| (0x88..=0x8B).contains(&op),
        decode: decode_mov_rm,
    },
    Handler {
        name: "mov-direct-offset",
        matches: |op, _| (0xA0..=0xA3).contains(&op),
        decode: decode_mov_offset,
    },
    Handler {
        name: "mov-imm-reg",
        matches: |op, _| (0xB0..=0xBF).contains(&op),
        decode: decode_mov_imm_reg,
    },
    Handler {
        name: "mov-imm-rm",
        matches: |op, _| matches!(op, 0xC6 | 0xC7),
        decode: decode_mov_imm_rm,
    },
    Handler {
        // LEA requires a memory source; mod==3 falls through to no
        // handler and lists as an unknown byte.
        name: "lea",
        matches: |op, cursor| op == 0x8D && modrm::peek_mod(cursor) != Some(0b11),
        decode: decode_lea,
    },
    Handler {
        name: "movzx-movsx",
        matches: |op, cursor| {
            op == 0x0F && matches!(cursor.peek(), Some(0xB6) | Some(0xB7) | Some(0xBE) | Some(0xBF))
        },
        decode: decode_movzx_movsx,
    },
    Handler {
        name: "xchg-acc",
        matches: |op, _| (0x91..=0x97).contains(&op),
        decode: decode_xchg_acc,
    },
    Handler {
        name: "xchg-rm",
        matches: |op, _| matches!(op, 0x86 | 0x87),
        decode: decode_xchg_rm,
    },
];

fn decode_mov_rm(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = if op & 1 == 0 {
        Width::Byte
    } else {
        cursor.operand_width()
    };
    let (m, rm) = modrm::read(cursor, width)?;
    let reg = Operand::reg(Reg::from_index(m.reg), width);
    // Bit 1 selects the direction: clear writes to r/m, set reads it.
    Ok(if op & 2 == 0 {
        Decoded::binary(InstructionKind::Mov, rm, reg)
    } else {
        Decoded::binary(InstructionKind::Mov, reg, rm)
    })
}

/// The moffs forms: accumulator to or from an absolute address with no
/// ModR/M byte at all.
fn decode_mov_offset(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = if op & 1 == 0 {
        Width::Byte
    } else {
        cursor.operand_width()
    };
    let memory = Operand::DirectMemory {
        address: cursor.read_u32("moffs")?,
        width,
        segment: cursor.segment_override(),
    };
    Ok(if op & 2 == 0 {
        Decoded::binary(InstructionKind::Mov, accumulator(width), memory)
    } else {
        Decoded::binary(InstructionKind::Mov, memory, accumulator(width))
    })
}

fn decode_mov_imm_reg(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let reg = Reg::from_index(op & 0x07);
    Ok(if op < 0xB8 {
        let imm = Immediate::unsigned(cursor.read_u8("imm8")?.into(), Width::Byte);
        Decoded::binary(
            InstructionKind::Mov,
            Operand::reg(reg, Width::Byte),
            Operand::imm(imm),
        )
    } else {
        let width = cursor.operand_width();
        let imm = match width {
            Width::Word => Immediate::unsigned(cursor.read_u16("imm16")?.into(), Width::Word),
            _ => Immediate::unsigned(cursor.read_u32("imm32")?, Width::Dword),
        };
        Decoded::binary(
            InstructionKind::Mov,
            Operand::reg(reg, width),
            Operand::imm(imm),
        )
    })
}

fn decode_mov_imm_rm(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = if op == 0xC6 {
        Width::Byte
    } else {
        cursor.operand_width()
    };
    let (m, rm) = modrm::read(cursor, width)?;
    if m.reg != 0 {
        bail!(DisassemblyError::BadGroupSelector {
            op,
            selector: m.reg
        });
    }
    let imm = match width {
        Width::Byte => Immediate::unsigned(cursor.read_u8("imm8")?.into(), Width::Byte),
        Width::Word => Immediate::unsigned(cursor.read_u16("imm16")?.into(), Width::Word),
        _ => Immediate::unsigned(cursor.read_u32("imm32")?, Width::Dword),
    };
    Ok(Decoded::binary(InstructionKind::Mov, rm, Operand::imm(imm)))
}

fn decode_lea(_op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = cursor.operand_width();
    let (m, rm) = modrm::read(cursor, width)?;
    Ok(Decoded::binary(
        InstructionKind::Lea,
        Operand::reg(Reg::from_index(m.reg), width),
        rm,
    ))
}

fn decode_movzx_movsx(_op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let op2 = cursor.read_u8("opcode2")?;
    let kind = if op2 & 0x08 == 0 {
        InstructionKind::Movzx
    } else {
        InstructionKind::Movsx
    };
    let source_width = if op2 & 1 == 0 {
        Width::Byte
    } else {
        Width::Word
    };
    let dest_width = cursor.operand_width();
    let (m, rm) = modrm::read(cursor, source_width)?;
    Ok(Decoded::binary(
        kind,
        Operand::reg(Reg::from_index(m.reg), dest_width),
        rm,
    ))
}

fn decode_xchg_acc(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = cursor.operand_width();
    Ok(Decoded::binary(
        InstructionKind::Xchg,
        accumulator(width),
        Operand::reg(Reg::from_index(op & 0x07), width),
    ))
}

fn decode_xchg_rm(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = if op == 0x86 {
        Width::Byte
    } else {
        cursor.operand_width()
    };
    let (m, rm) = modrm::read(cursor, width)?;
    Ok(Decoded::binary(
        InstructionKind::Xchg,
        rm,
        Operand::reg(Reg::from_index(m.reg), width),
    ))
}
