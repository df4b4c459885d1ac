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
use crate::reg::{Reg, SegReg, Width};
use std::fmt;

/// An immediate value, already sign- or zero-extended to its declared
/// width by the handler that created it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Immediate {
    pub value: i64,
    pub width: Width,
    pub signed: bool,
}

impl Immediate {
    pub fn unsigned(value: u32, width: Width) -> Self {
        Self {
            value: i64::from(value),
            width,
            signed: false,
        }
    }

    pub fn signed(value: i32, width: Width) -> Self {
        Self {
            value: i64::from(value),
            width,
            signed: true,
        }
    }

    /// The value truncated to the declared width, as raw bits.
    pub fn bits(&self) -> u64 {
        let mask = match self.width {
            Width::Byte => 0xFF,
            Width::Word => 0xFFFF,
            Width::Dword => 0xFFFF_FFFF,
            Width::Qword => u64::MAX,
        };
        (self.value as u64) & mask
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.signed && self.value < 0 {
            // Show the full-width two's complement form so that e.g. a
            // sign-extended -1 reads as 0xFFFFFFFF.
            match self.width {
                Width::Byte => write!(f, "0x{:02X}", self.bits()),
                Width::Word => write!(f, "0x{:04X}", self.bits()),
                _ => write!(f, "0x{:08X}", self.bits()),
            }
        } else {
            write!(f, "0x{:X}", self.bits())
        }
    }
}

/// Every operand shape the decoder can produce. Closed by design: the
/// renderer and all downstream consumers match exhaustively on this.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// A general-purpose register at an explicit width.
    Register { reg: Reg, width: Width },

    /// An x87 stack slot ST(0)..ST(7).
    FpuRegister(u8),

    /// An immediate value.
    Immediate(Immediate),

    /// `[disp32]` — absolute address, no registers.
    DirectMemory {
        address: u32,
        width: Width,
        segment: Option<SegReg>,
    },

    /// `[reg]` — base register, no displacement.
    BaseRegisterMemory {
        base: Reg,
        width: Width,
        segment: Option<SegReg>,
    },

    /// `[reg+disp]` — base register plus signed displacement.
    DisplacementMemory {
        base: Reg,
        displacement: i32,
        width: Width,
        segment: Option<SegReg>,
    },

    /// `[base+index*scale+disp]` — full SIB shape. `base` is absent in
    /// the mod==0/base==5 encoding.
    ScaledIndexMemory {
        index: Reg,
        scale: u8,
        base: Option<Reg>,
        displacement: i32,
        width: Width,
        segment: Option<SegReg>,
    },
}

impl Operand {
    pub fn reg(reg: Reg, width: Width) -> Self {
        Operand::Register { reg, width }
    }

    pub fn reg32(index: u8) -> Self {
        Operand::Register {
            reg: Reg::from_index(index),
            width: Width::Dword,
        }
    }

    pub fn imm(imm: Immediate) -> Self {
        Operand::Immediate(imm)
    }

    /// The explicit width of this operand, in bits.
    pub fn width(&self) -> Width {
        match self {
            Operand::Register { width, .. } => *width,
            Operand::FpuRegister(_) => Width::Qword,
            Operand::Immediate(imm) => imm.width,
            Operand::DirectMemory { width, .. } => *width,
            Operand::BaseRegisterMemory { width, .. } => *width,
            Operand::DisplacementMemory { width, .. } => *width,
            Operand::ScaledIndexMemory { width, .. } => *width,
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(
            self,
            Operand::DirectMemory { .. }
                | Operand::BaseRegisterMemory { .. }
                | Operand::DisplacementMemory { .. }
                | Operand::ScaledIndexMemory { .. }
        )
    }

    pub fn segment(&self) -> Option<SegReg> {
        match self {
            Operand::DirectMemory { segment, .. }
            | Operand::BaseRegisterMemory { segment, .. }
            | Operand::DisplacementMemory { segment, .. }
            | Operand::ScaledIndexMemory { segment, .. } => *segment,
            _ => None,
        }
    }
}

fn seg_prefix(segment: &Option<SegReg>) -> String {
    match segment {
        Some(seg) => format!("{}:", seg),
        None => String::new(),
    }
}

fn disp_suffix(displacement: i32) -> String {
    if displacement == 0 {
        return String::new();
    }
    let magnitude = (displacement as i64).unsigned_abs();
    let sign = if displacement < 0 { "-" } else { "+" };
    if magnitude < 0x100 {
        format!("{}0x{:02X}", sign, magnitude)
    } else {
        format!("{}0x{:X}", sign, magnitude)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Register { reg, width } => write!(f, "{}", reg.name(*width)),
            Operand::FpuRegister(slot) => write!(f, "st({})", slot),
            Operand::Immediate(imm) => write!(f, "{}", imm),
            Operand::DirectMemory {
                address,
                width,
                segment,
            } => write!(
                f,
                "{}{}[0x{:08X}]",
                width.ptr_prefix(),
                seg_prefix(segment),
                address
            ),
            Operand::BaseRegisterMemory {
                base,
                width,
                segment,
            } => write!(
                f,
                "{}{}[{}]",
                width.ptr_prefix(),
                seg_prefix(segment),
                base
            ),
            Operand::DisplacementMemory {
                base,
                displacement,
                width,
                segment,
            } => write!(
                f,
                "{}{}[{}{}]",
                width.ptr_prefix(),
                seg_prefix(segment),
                base,
                disp_suffix(*displacement)
            ),
            Operand::ScaledIndexMemory {
                index,
                scale,
                base,
                displacement,
                width,
                segment,
            } => {
                write!(f, "{}{}[", width.ptr_prefix(), seg_prefix(segment))?;
                if let Some(base) = base {
                    write!(f, "{}+", base)?;
                }
                write!(f, "{}", index)?;
                if *scale > 1 {
                    write!(f, "*{}", scale)?;
                }
                write!(f, "{}]", disp_suffix(*displacement))
            }
        }
    }
}
