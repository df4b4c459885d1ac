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
use crate::{
    operand::Operand,
    reg::{RepPrefix, Width},
};
use std::fmt;

/// Condition codes in encoding order. The discriminant is the `tttn`
/// field: the low nibble of a 0x70-series short jump or of the second
/// byte of a 0x0F 0x80-series near jump.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cond {
    O = 0x0,
    No = 0x1,
    B = 0x2,
    Ae = 0x3,
    E = 0x4,
    Ne = 0x5,
    Be = 0x6,
    A = 0x7,
    S = 0x8,
    Ns = 0x9,
    P = 0xA,
    Np = 0xB,
    L = 0xC,
    Ge = 0xD,
    Le = 0xE,
    G = 0xF,
}

impl Cond {
    pub fn from_nibble(n: u8) -> Self {
        match n & 0xF {
            0x0 => Cond::O,
            0x1 => Cond::No,
            0x2 => Cond::B,
            0x3 => Cond::Ae,
            0x4 => Cond::E,
            0x5 => Cond::Ne,
            0x6 => Cond::Be,
            0x7 => Cond::A,
            0x8 => Cond::S,
            0x9 => Cond::Ns,
            0xA => Cond::P,
            0xB => Cond::Np,
            0xC => Cond::L,
            0xD => Cond::Ge,
            0xE => Cond::Le,
            0xF => Cond::G,
            _ => unreachable!(),
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Cond::O => "o",
            Cond::No => "no",
            Cond::B => "b",
            Cond::Ae => "ae",
            Cond::E => "e",
            Cond::Ne => "ne",
            Cond::Be => "be",
            Cond::A => "a",
            Cond::S => "s",
            Cond::Ns => "ns",
            Cond::P => "p",
            Cond::Np => "np",
            Cond::L => "l",
            Cond::Ge => "ge",
            Cond::Le => "le",
            Cond::G => "g",
        }
    }
}

/// One variant per mnemonic family. Conditional jumps fold their sixteen
/// encodings into a single parameterized variant; everything else is a
/// bare tag. `Unknown` stands in for a byte no handler admitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstructionKind {
    // ALU
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
    Inc,
    Dec,
    Not,
    Neg,
    Mul,
    Imul,
    Div,
    Idiv,
    Test,

    // Data movement
    Mov,
    Lea,
    Movzx,
    Movsx,
    Xchg,

    // Stack
    Push,
    Pop,
    Pushad,
    Popad,
    Leave,

    // Control flow
    Jmp,
    Jcc(Cond),
    Jecxz,
    Call,
    Ret,
    Retf,
    Int3,
    Int,

    // Shifts and rotates
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Shr,
    Sar,

    // String operations (repeat prefix is instruction metadata)
    Movs,
    Cmps,
    Stos,
    Lods,
    Scas,

    // x87
    Fadd,
    Fmul,
    Fcom,
    Fcomp,
    Fsub,
    Fsubr,
    Fdiv,
    Fdivr,
    Fiadd,
    Fimul,
    Ficom,
    Ficomp,
    Fisub,
    Fisubr,
    Fidiv,
    Fidivr,
    Faddp,
    Fmulp,
    Fsubp,
    Fsubrp,
    Fdivp,
    Fdivrp,
    Fcompp,
    Fld,
    Fst,
    Fstp,
    Fild,
    Fist,
    Fistp,
    Fxch,
    Fchs,
    Fabs,
    Fnstsw,
    Fninit,
    Finit,
    Fnclex,
    Fwait,

    // Misc
    Nop,
    Hlt,
    Cwde,
    Cdq,
    Clc,
    Stc,
    Cmc,
    Cld,
    Std,
    Cli,
    Sti,

    Unknown,
}

impl InstructionKind {
    pub fn is_string_op(&self) -> bool {
        matches!(
            self,
            InstructionKind::Movs
                | InstructionKind::Cmps
                | InstructionKind::Stos
                | InstructionKind::Lods
                | InstructionKind::Scas
        )
    }

    fn base_mnemonic(&self) -> &'static str {
        match self {
            InstructionKind::Add => "add",
            InstructionKind::Or => "or",
            InstructionKind::Adc => "adc",
            InstructionKind::Sbb => "sbb",
            InstructionKind::And => "and",
            InstructionKind::Sub => "sub",
            InstructionKind::Xor => "xor",
            InstructionKind::Cmp => "cmp",
            InstructionKind::Inc => "inc",
            InstructionKind::Dec => "dec",
            InstructionKind::Not => "not",
            InstructionKind::Neg => "neg",
            InstructionKind::Mul => "mul",
            InstructionKind::Imul => "imul",
            InstructionKind::Div => "div",
            InstructionKind::Idiv => "idiv",
            InstructionKind::Test => "test",
            InstructionKind::Mov => "mov",
            InstructionKind::Lea => "lea",
            InstructionKind::Movzx => "movzx",
            InstructionKind::Movsx => "movsx",
            InstructionKind::Xchg => "xchg",
            InstructionKind::Push => "push",
            InstructionKind::Pop => "pop",
            InstructionKind::Pushad => "pushad",
            InstructionKind::Popad => "popad",
            InstructionKind::Leave => "leave",
            InstructionKind::Jmp => "jmp",
            InstructionKind::Jcc(_) => "j",
            InstructionKind::Jecxz => "jecxz",
            InstructionKind::Call => "call",
            InstructionKind::Ret => "ret",
            InstructionKind::Retf => "retf",
            InstructionKind::Int3 => "int3",
            InstructionKind::Int => "int",
            InstructionKind::Rol => "rol",
            InstructionKind::Ror => "ror",
            InstructionKind::Rcl => "rcl",
            InstructionKind::Rcr => "rcr",
            InstructionKind::Shl => "shl",
            InstructionKind::Shr => "shr",
            InstructionKind::Sar => "sar",
            InstructionKind::Movs => "movs",
            InstructionKind::Cmps => "cmps",
            InstructionKind::Stos => "stos",
            InstructionKind::Lods => "lods",
            InstructionKind::Scas => "scas",
            InstructionKind::Fadd => "fadd",
            InstructionKind::Fmul => "fmul",
            InstructionKind::Fcom => "fcom",
            InstructionKind::Fcomp => "fcomp",
            InstructionKind::Fsub => "fsub",
            InstructionKind::Fsubr => "fsubr",
            InstructionKind::Fdiv => "fdiv",
            InstructionKind::Fdivr => "fdivr",
            InstructionKind::Fiadd => "fiadd",
            InstructionKind::Fimul => "fimul",
            InstructionKind::Ficom => "ficom",
            InstructionKind::Ficomp => "ficomp",
            InstructionKind::Fisub => "fisub",
            InstructionKind::Fisubr => "fisubr",
            InstructionKind::Fidiv => "fidiv",
            InstructionKind::Fidivr => "fidivr",
            InstructionKind::Faddp => "faddp",
            InstructionKind::Fmulp => "fmulp",
            InstructionKind::Fsubp => "fsubp",
            InstructionKind::Fsubrp => "fsubrp",
            InstructionKind::Fdivp => "fdivp",
            InstructionKind::Fdivrp => "fdivrp",
            InstructionKind::Fcompp => "fcompp",
            InstructionKind::Fld => "fld",
            InstructionKind::Fst => "fst",
            InstructionKind::Fstp => "fstp",
            InstructionKind::Fild => "fild",
            InstructionKind::Fist => "fist",
            InstructionKind::Fistp => "fistp",
            InstructionKind::Fxch => "fxch",
            InstructionKind::Fchs => "fchs",
            InstructionKind::Fabs => "fabs",
            InstructionKind::Fnstsw => "fnstsw",
            InstructionKind::Fninit => "fninit",
            InstructionKind::Finit => "finit",
            InstructionKind::Fnclex => "fnclex",
            InstructionKind::Fwait => "fwait",
            InstructionKind::Nop => "nop",
            InstructionKind::Hlt => "hlt",
            InstructionKind::Cwde => "cwde",
            InstructionKind::Cdq => "cdq",
            InstructionKind::Clc => "clc",
            InstructionKind::Stc => "stc",
            InstructionKind::Cmc => "cmc",
            InstructionKind::Cld => "cld",
            InstructionKind::Std => "std",
            InstructionKind::Cli => "cli",
            InstructionKind::Sti => "sti",
            InstructionKind::Unknown => "db",
        }
    }
}

fn string_op_suffix(width: Width) -> &'static str {
    match width {
        Width::Byte => "b",
        Width::Word => "w",
        _ => "d",
    }
}

/// One decoded instruction. Immutable once the handler returns it; the
/// driver only stamps on the address and the raw byte span.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    /// Absolute address of the first byte, prefixes included.
    pub address: u32,
    /// Total consumed length in bytes, prefixes included.
    pub length: usize,
    pub kind: InstructionKind,
    pub operands: Vec<Operand>,
    /// The exact bytes consumed, for listings and round-trip checks.
    pub raw: Vec<u8>,
    pub rep: RepPrefix,
    pub lock: bool,
}

impl Instruction {
    pub fn is_unknown(&self) -> bool {
        self.kind == InstructionKind::Unknown
    }

    /// The address of the byte after this instruction. Relative jumps
    /// are resolved against this value.
    pub fn next_address(&self) -> u32 {
        self.address.wrapping_add(self.length as u32)
    }

    /// The rendered mnemonic, with the condition suffix spliced into
    /// conditional jumps and the element-size suffix onto string ops.
    pub fn mnemonic(&self) -> String {
        match self.kind {
            InstructionKind::Jcc(cond) => format!("j{}", cond.suffix()),
            kind if kind.is_string_op() => {
                let width = self
                    .operands
                    .first()
                    .map(|op| op.width())
                    .unwrap_or(Width::Dword);
                format!("{}{}", kind.base_mnemonic(), string_op_suffix(width))
            }
            kind => kind.base_mnemonic().to_owned(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.lock {
            write!(f, "lock ")?;
        }
        match self.rep {
            RepPrefix::None => {}
            RepPrefix::Rep => write!(f, "rep ")?,
            RepPrefix::RepNe => write!(f, "repne ")?,
        }
        write!(f, "{}", self.mnemonic())?;
        if self.kind == InstructionKind::Unknown {
            // Unknown bytes list as data definitions.
            for b in &self.raw {
                write!(f, " 0x{:02X}", b)?;
            }
            return Ok(());
        }
        // String operations print their element size in the mnemonic;
        // the implicit operands stay off the listing.
        if self.kind.is_string_op() {
            return Ok(());
        }
        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", op)?;
            } else {
                write!(f, ", {}", op)?;
            }
        }
        Ok(())
    }
}
