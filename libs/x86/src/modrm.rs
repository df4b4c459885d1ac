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

//! The addressing-mode decoder: ModR/M byte, optional SIB byte, optional
//! displacement. This module is the single source of truth for memory
//! operand shapes; no handler decodes any of these fields itself.
use crate::{
    cursor::Cursor,
    operand::Operand,
    reg::{Reg, Width},
};
use anyhow::Result;

/// The three fields of an addressing byte. Transient: used to build
/// operands and to select group sub-opcodes, never retained in output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ModRm {
    pub mod_: u8,
    pub reg: u8,
    pub rm: u8,
}

impl ModRm {
    pub fn split(b: u8) -> Self {
        Self {
            mod_: b >> 6,
            reg: (b >> 3) & 0b111,
            rm: b & 0b111,
        }
    }

    pub fn is_register_direct(&self) -> bool {
        self.mod_ == 0b11
    }
}

/// Peek the `reg` field of the addressing byte without consuming it.
/// Group opcodes are disambiguated on this before the owning handler
/// runs; the handler then re-reads the byte during the real decode.
pub fn peek_reg(cursor: &Cursor) -> Option<u8> {
    cursor.peek().map(|b| ModRm::split(b).reg)
}

pub fn peek_mod(cursor: &Cursor) -> Option<u8> {
    cursor.peek().map(|b| ModRm::split(b).mod_)
}

/// Consume the addressing byte and everything it implies (SIB byte,
/// displacement) and build the r/m operand at the requested width.
/// Returns the field triple alongside so callers can use `reg` as a
/// register operand or group selector.
pub fn read(cursor: &mut Cursor, width: Width) -> Result<(ModRm, Operand)> {
    read_with(cursor, width, false)
}

/// The x87 variant: a register-direct r/m names an FPU stack slot
/// instead of a general-purpose register.
pub fn read_fpu(cursor: &mut Cursor, width: Width) -> Result<(ModRm, Operand)> {
    read_with(cursor, width, true)
}

fn read_with(cursor: &mut Cursor, width: Width, fpu: bool) -> Result<(ModRm, Operand)> {
    let modrm = ModRm::split(cursor.read_u8("modrm")?);
    if modrm.is_register_direct() {
        let operand = if fpu {
            Operand::FpuRegister(modrm.rm)
        } else {
            Operand::Register {
                reg: Reg::from_index(modrm.rm),
                width,
            }
        };
        return Ok((modrm, operand));
    }
    let operand = read_memory(cursor, modrm, width)?;
    Ok((modrm, operand))
}

fn read_memory(cursor: &mut Cursor, modrm: ModRm, width: Width) -> Result<Operand> {
    let segment = cursor.segment_override();
    Ok(match modrm.mod_ {
        0b00 => match modrm.rm {
            4 => read_sib(cursor, modrm.mod_, width)?,
            5 => Operand::DirectMemory {
                address: cursor.read_u32("disp32")?,
                width,
                segment,
            },
            rm => Operand::BaseRegisterMemory {
                base: Reg::from_index(rm),
                width,
                segment,
            },
        },
        0b01 => {
            if modrm.rm == 4 {
                read_sib(cursor, modrm.mod_, width)?
            } else {
                let base = Reg::from_index(modrm.rm);
                let displacement = i32::from(cursor.read_u8("disp8")? as i8);
                Operand::DisplacementMemory {
                    base,
                    displacement,
                    width,
                    segment,
                }
            }
        }
        0b10 => {
            if modrm.rm == 4 {
                read_sib(cursor, modrm.mod_, width)?
            } else {
                let base = Reg::from_index(modrm.rm);
                let displacement = cursor.read_u32("disp32")? as i32;
                Operand::DisplacementMemory {
                    base,
                    displacement,
                    width,
                    segment,
                }
            }
        }
        _ => unreachable!("register-direct handled above"),
    })
}

/// Decode the SIB byte plus its displacement. Two irregularities to get
/// bit-exact: index field 4 means "no index register", and under mod==0
/// a base field of 5 means "no base register, disp32 follows".
fn read_sib(cursor: &mut Cursor, mod_: u8, width: Width) -> Result<Operand> {
    let segment = cursor.segment_override();
    let sib = cursor.read_u8("sib")?;
    let scale = 1u8 << (sib >> 6);
    let index_field = (sib >> 3) & 0b111;
    let base_field = sib & 0b111;

    let index = if index_field == 4 {
        None
    } else {
        Some(Reg::from_index(index_field))
    };
    let (base, mut displacement) = if mod_ == 0 && base_field == 5 {
        (None, cursor.read_u32("sib disp32")? as i32)
    } else {
        (Some(Reg::from_index(base_field)), 0)
    };

    // The outer mod field still owns the trailing displacement.
    match mod_ {
        0b01 => displacement = i32::from(cursor.read_u8("sib disp8")? as i8),
        0b10 => displacement = cursor.read_u32("sib disp32")? as i32,
        _ => {}
    }

    Ok(match (index, base) {
        (Some(index), base) => Operand::ScaledIndexMemory {
            index,
            scale,
            base,
            displacement,
            width,
            segment,
        },
        (None, Some(base)) => {
            if displacement == 0 {
                Operand::BaseRegisterMemory {
                    base,
                    width,
                    segment,
                }
            } else {
                Operand::DisplacementMemory {
                    base,
                    displacement,
                    width,
                    segment,
                }
            }
        }
        (None, None) => Operand::DirectMemory {
            address: displacement as u32,
            width,
            segment,
        },
    })
}
