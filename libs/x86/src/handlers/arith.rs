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

//! ALU instructions: the regular 0x00-0x3D block, INC/DEC, the
//! immediate groups 1 and 3, group-5 INC/DEC, and the IMUL forms.
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
        name: "alu-block",
        matches: is_alu_block,
        decode: decode_alu_block,
    },
    Handler {
        name: "inc-dec-reg",
        matches: |op, _| (0x40..=0x4F).contains(&op),
        decode: decode_inc_dec_reg,
    },
    Handler {
        name: "group1-imm",
        matches: |op, _| matches!(op, 0x80 | 0x81 | 0x83),
        decode: decode_group1,
    },
    Handler {
        name: "group3",
        matches: |op, _| matches!(op, 0xF6 | 0xF7),
        decode: decode_group3,
    },
    Handler {
        name: "group5-inc-dec",
        matches: |op, cursor| {
            op == 0xFE || (op == 0xFF && matches!(modrm::peek_reg(cursor), Some(0) | Some(1)))
        },
        decode: decode_group5_inc_dec,
    },
    Handler {
        name: "imul-imm",
        matches: |op, _| matches!(op, 0x69 | 0x6B),
        decode: decode_imul_imm,
    },
    Handler {
        name: "imul-two-byte",
        matches: |op, cursor| op == 0x0F && cursor.peek() == Some(0xAF),
        decode: decode_imul_rm,
    },
];

/// The eight regular ALU operations in base-opcode order.
fn alu_kind(base: u8) -> InstructionKind {
    match base {
        0x00 => InstructionKind::Add,
        0x08 => InstructionKind::Or,
        0x10 => InstructionKind::Adc,
        0x18 => InstructionKind::Sbb,
        0x20 => InstructionKind::And,
        0x28 => InstructionKind::Sub,
        0x30 => InstructionKind::Xor,
        0x38 => InstructionKind::Cmp,
        _ => unreachable!("admission predicate bounds the base"),
    }
}

fn is_alu_block(op: u8, _cursor: &Cursor) -> bool {
    op < 0x40 && (op & 0x07) <= 5
}

/// Form offsets within each base: +0 rm8,r8 / +1 rm,r / +2 r8,rm8 /
/// +3 r,rm / +4 al,imm8 / +5 eax,imm.
fn decode_alu_block(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let kind = alu_kind(op & 0x38);
    let wide = cursor.operand_width();
    Ok(match op & 0x07 {
        0 => {
            let (m, rm) = modrm::read(cursor, Width::Byte)?;
            Decoded::binary(kind, rm, Operand::reg(Reg::from_index(m.reg), Width::Byte))
        }
        1 => {
            let (m, rm) = modrm::read(cursor, wide)?;
            Decoded::binary(kind, rm, Operand::reg(Reg::from_index(m.reg), wide))
        }
        2 => {
            let (m, rm) = modrm::read(cursor, Width::Byte)?;
            Decoded::binary(kind, Operand::reg(Reg::from_index(m.reg), Width::Byte), rm)
        }
        3 => {
            let (m, rm) = modrm::read(cursor, wide)?;
            Decoded::binary(kind, Operand::reg(Reg::from_index(m.reg), wide), rm)
        }
        4 => {
            let imm = Immediate::unsigned(cursor.read_u8("imm8")?.into(), Width::Byte);
            Decoded::binary(kind, accumulator(Width::Byte), Operand::imm(imm))
        }
        5 => {
            let imm = read_imm_v(cursor, wide)?;
            Decoded::binary(kind, accumulator(wide), Operand::imm(imm))
        }
        _ => unreachable!("admission predicate bounds the form"),
    })
}

/// A `v`-sized immediate: dword normally, word under the 0x66 prefix.
fn read_imm_v(cursor: &mut Cursor, width: Width) -> Result<Immediate> {
    Ok(match width {
        Width::Word => Immediate::unsigned(cursor.read_u16("imm16")?.into(), Width::Word),
        _ => Immediate::unsigned(cursor.read_u32("imm32")?, Width::Dword),
    })
}

fn decode_inc_dec_reg(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let kind = if op < 0x48 {
        InstructionKind::Inc
    } else {
        InstructionKind::Dec
    };
    let reg = Reg::from_index(op & 0x07);
    Ok(Decoded::unary(kind, Operand::reg(reg, cursor.operand_width())))
}

fn group1_kind(selector: u8) -> InstructionKind {
    alu_kind(selector << 3)
}

fn decode_group1(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = if op == 0x80 {
        Width::Byte
    } else {
        cursor.operand_width()
    };
    let (m, rm) = modrm::read(cursor, width)?;
    let kind = group1_kind(m.reg);
    let imm = match op {
        // 0x83 sign-extends its byte immediate to the operand width.
        0x83 => Immediate::signed(i32::from(cursor.read_u8("imm8")? as i8), width),
        0x80 => Immediate::unsigned(cursor.read_u8("imm8")?.into(), Width::Byte),
        _ => read_imm_v(cursor, width)?,
    };
    Ok(Decoded::binary(kind, rm, Operand::imm(imm)))
}

fn decode_group3(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = if op == 0xF6 {
        Width::Byte
    } else {
        cursor.operand_width()
    };
    let (m, rm) = modrm::read(cursor, width)?;
    Ok(match m.reg {
        0 => {
            let imm = if op == 0xF6 {
                Immediate::unsigned(cursor.read_u8("imm8")?.into(), Width::Byte)
            } else {
                read_imm_v(cursor, width)?
            };
            Decoded::binary(InstructionKind::Test, rm, Operand::imm(imm))
        }
        2 => Decoded::unary(InstructionKind::Not, rm),
        3 => Decoded::unary(InstructionKind::Neg, rm),
        4 => Decoded::unary(InstructionKind::Mul, rm),
        5 => Decoded::unary(InstructionKind::Imul, rm),
        6 => Decoded::unary(InstructionKind::Div, rm),
        7 => Decoded::unary(InstructionKind::Idiv, rm),
        selector => bail!(DisassemblyError::BadGroupSelector { op, selector }),
    })
}

fn decode_group5_inc_dec(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = if op == 0xFE {
        Width::Byte
    } else {
        cursor.operand_width()
    };
    let (m, rm) = modrm::read(cursor, width)?;
    Ok(match m.reg {
        0 => Decoded::unary(InstructionKind::Inc, rm),
        1 => Decoded::unary(InstructionKind::Dec, rm),
        selector => bail!(DisassemblyError::BadGroupSelector { op, selector }),
    })
}

/// IMUL r, r/m, imm: three operands, immediate width keyed by opcode.
fn decode_imul_imm(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let width = cursor.operand_width();
    let (m, rm) = modrm::read(cursor, width)?;
    let imm = if op == 0x6B {
        Immediate::signed(i32::from(cursor.read_u8("imm8")? as i8), width)
    } else {
        read_imm_v(cursor, width)?
    };
    Ok(Decoded::ternary(
        InstructionKind::Imul,
        Operand::reg(Reg::from_index(m.reg), width),
        rm,
        Operand::imm(imm),
    ))
}

fn decode_imul_rm(_op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    cursor.read_u8("opcode2")?;
    let width = cursor.operand_width();
    let (m, rm) = modrm::read(cursor, width)?;
    Ok(Decoded::binary(
        InstructionKind::Imul,
        Operand::reg(Reg::from_index(m.reg), width),
        rm,
    ))
}
