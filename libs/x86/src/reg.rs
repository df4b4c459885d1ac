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
use lazy_static::lazy_static;
use std::{collections::HashSet, fmt};

/// Operand and memory-access widths. Every operand carries one of these
/// explicitly; nothing in the decoder defaults a width.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Width {
    Byte,
    Word,
    Dword,
    Qword,
}

impl Width {
    pub fn bits(&self) -> u16 {
        match self {
            Width::Byte => 8,
            Width::Word => 16,
            Width::Dword => 32,
            Width::Qword => 64,
        }
    }

    pub fn bytes(&self) -> usize {
        self.bits() as usize / 8
    }

    /// The size prefix used when rendering a memory operand of this width.
    pub fn ptr_prefix(&self) -> &'static str {
        match self {
            Width::Byte => "byte ptr ",
            Width::Word => "word ptr ",
            Width::Dword => "dword ptr ",
            Width::Qword => "qword ptr ",
        }
    }
}

/// A general-purpose register identity in hardware encoding order: the
/// discriminant is exactly the 3-bit value found in ModR/M reg/rm fields,
/// SIB index/base fields, and inline-register opcodes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reg {
    Eax = 0,
    Ecx = 1,
    Edx = 2,
    Ebx = 3,
    Esp = 4,
    Ebp = 5,
    Esi = 6,
    Edi = 7,
}

const NAMES8: [&str; 8] = ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"];
const NAMES16: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];
const NAMES32: [&str; 8] = ["eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi"];

impl Reg {
    pub fn from_index(index: u8) -> Self {
        match index & 0b111 {
            0 => Reg::Eax,
            1 => Reg::Ecx,
            2 => Reg::Edx,
            3 => Reg::Ebx,
            4 => Reg::Esp,
            5 => Reg::Ebp,
            6 => Reg::Esi,
            7 => Reg::Edi,
            _ => unreachable!(),
        }
    }

    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// The conventional name at the given width. At byte width the index
    /// selects among AL..BH, where 4..7 are the high halves of A..B.
    pub fn name(&self, width: Width) -> &'static str {
        let i = self.index() as usize;
        match width {
            Width::Byte => NAMES8[i],
            Width::Word => NAMES16[i],
            _ => NAMES32[i],
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name(Width::Dword))
    }
}

/// Segment registers, for override annotations on memory operands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SegReg {
    Es,
    Cs,
    Ss,
    Ds,
    Fs,
    Gs,
}

impl SegReg {
    pub fn from_prefix(prefix: u8) -> Option<Self> {
        match prefix {
            0x26 => Some(SegReg::Es),
            0x2E => Some(SegReg::Cs),
            0x36 => Some(SegReg::Ss),
            0x3E => Some(SegReg::Ds),
            0x64 => Some(SegReg::Fs),
            0x65 => Some(SegReg::Gs),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SegReg::Es => "es",
            SegReg::Cs => "cs",
            SegReg::Ss => "ss",
            SegReg::Ds => "ds",
            SegReg::Fs => "fs",
            SegReg::Gs => "gs",
        }
    }
}

impl fmt::Display for SegReg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Repeat-prefix kind recorded on string instructions.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RepPrefix {
    #[default]
    None,
    Rep,
    RepNe,
}

lazy_static! {
    /// Every byte the prefix scanner will peel off the head of an
    /// instruction before the opcode proper.
    pub static ref PREFIX_CODES: HashSet<u8> = [
        0x26u8, 0x2E, 0x36, 0x3E, 0x64, 0x65, // segment overrides
        0x66, 0x67, // operand/address size
        0xF0, // lock
        0xF2, 0xF3, // repne / rep
    ]
    .iter()
    .copied()
    .collect();
}

/// Prefix bytes consumed at the head of the current instruction. Reset
/// before each decode; read-only once the opcode byte has been read.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrefixState {
    pub operand_size: bool,
    pub address_size: bool,
    pub segment: Option<SegReg>,
    pub rep: RepPrefix,
    pub lock: bool,
}

impl PrefixState {
    pub fn apply(&mut self, b: u8) -> bool {
        if let Some(seg) = SegReg::from_prefix(b) {
            self.segment = Some(seg);
            return true;
        }
        match b {
            0x66 => self.operand_size = true,
            0x67 => self.address_size = true,
            0xF0 => self.lock = true,
            0xF2 => self.rep = RepPrefix::RepNe,
            0xF3 => self.rep = RepPrefix::Rep,
            _ => return false,
        }
        true
    }

    /// The width selected by the operand-size attribute for `v`-sized
    /// operands: dword normally, word under the 0x66 override.
    pub fn operand_width(&self) -> Width {
        if self.operand_size {
            Width::Word
        } else {
            Width::Dword
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_names_follow_hardware_order() {
        assert_eq!(Reg::from_index(0).name(Width::Dword), "eax");
        assert_eq!(Reg::from_index(4).name(Width::Dword), "esp");
        assert_eq!(Reg::from_index(5).name(Width::Dword), "ebp");
        assert_eq!(Reg::from_index(4).name(Width::Byte), "ah");
        assert_eq!(Reg::from_index(3).name(Width::Byte), "bl");
        assert_eq!(Reg::from_index(6).name(Width::Word), "si");
    }

    #[test]
    fn prefix_state_accumulates() {
        let mut p = PrefixState::default();
        assert!(p.apply(0x26));
        assert!(p.apply(0x66));
        assert!(p.apply(0xF3));
        assert!(!p.apply(0x90));
        assert_eq!(p.segment, Some(SegReg::Es));
        assert_eq!(p.operand_width(), Width::Word);
        assert_eq!(p.rep, RepPrefix::Rep);
        assert!(!p.lock);
    }

    #[test]
    fn prefix_codes_cover_all_prefix_bytes() {
        for b in [0x26, 0x2E, 0x36, 0x3E, 0x64, 0x65, 0x66, 0x67, 0xF0, 0xF2, 0xF3] {
            assert!(PREFIX_CODES.contains(&b));
        }
        assert!(!PREFIX_CODES.contains(&0x90));
    }
}
