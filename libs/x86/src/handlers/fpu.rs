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

//! The x87 escape block 0xD8-0xDF. Each escape byte splits on the mod
//! and reg fields of the byte that follows: memory forms address a
//! real or integer value of an opcode-specific width, register forms
//! address the FPU stack. 0x9B (FWAIT) lives here too because the
//! three-byte FINIT sequence starts with it.
use super::{Decoded, Handler};
use crate::{
    cursor::Cursor,
    inst::InstructionKind,
    modrm::{self, ModRm},
    operand::Operand,
    reg::{Reg, Width},
    DisassemblyError,
};
use anyhow::{bail, Result};

pub(super) const HANDLERS: &[Handler] = &[
    Handler {
        name: "fpu-escape",
        matches: |op, _| (0xD8..=0xDF).contains(&op),
        decode: decode_escape,
    },
    Handler {
        name: "fwait",
        matches: |op, _| op == 0x9B,
        decode: decode_fwait,
    },
];

fn st(slot: u8) -> Operand {
    Operand::FpuRegister(slot)
}

/// The eight real-arithmetic operations shared by 0xD8 and 0xDC, in
/// reg-field order.
fn real_arith(op: u8, selector: u8) -> Result<InstructionKind> {
    Ok(match selector {
        0 => InstructionKind::Fadd,
        1 => InstructionKind::Fmul,
        2 => InstructionKind::Fcom,
        3 => InstructionKind::Fcomp,
        4 => InstructionKind::Fsub,
        5 => InstructionKind::Fsubr,
        6 => InstructionKind::Fdiv,
        7 => InstructionKind::Fdivr,
        selector => bail!(DisassemblyError::BadGroupSelector { op, selector }),
    })
}

/// The integer counterparts shared by 0xDA (m32) and 0xDE (m16).
fn int_arith(op: u8, selector: u8) -> Result<InstructionKind> {
    Ok(match selector {
        0 => InstructionKind::Fiadd,
        1 => InstructionKind::Fimul,
        2 => InstructionKind::Ficom,
        3 => InstructionKind::Ficomp,
        4 => InstructionKind::Fisub,
        5 => InstructionKind::Fisubr,
        6 => InstructionKind::Fidiv,
        7 => InstructionKind::Fidivr,
        selector => bail!(DisassemblyError::BadGroupSelector { op, selector }),
    })
}

fn load_store(op: u8, selector: u8, load: InstructionKind) -> Result<InstructionKind> {
    Ok(match selector {
        0 => load,
        2 => match load {
            InstructionKind::Fld => InstructionKind::Fst,
            _ => InstructionKind::Fist,
        },
        3 => match load {
            InstructionKind::Fld => InstructionKind::Fstp,
            _ => InstructionKind::Fistp,
        },
        selector => bail!(DisassemblyError::BadGroupSelector { op, selector }),
    })
}

fn decode_escape(op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    let Some(b) = cursor.peek() else {
        bail!(DisassemblyError::TooShort { phase: "modrm" });
    };
    let m = ModRm::split(b);
    if m.is_register_direct() {
        cursor.read_u8("modrm")?;
        decode_register_form(op, m)
    } else {
        decode_memory_form(op, m, cursor)
    }
}

fn decode_memory_form(op: u8, m: ModRm, cursor: &mut Cursor) -> Result<Decoded> {
    let (kind, width) = match op {
        0xD8 => (real_arith(op, m.reg)?, Width::Dword),
        0xD9 => (load_store(op, m.reg, InstructionKind::Fld)?, Width::Dword),
        0xDA => (int_arith(op, m.reg)?, Width::Dword),
        0xDB => (load_store(op, m.reg, InstructionKind::Fild)?, Width::Dword),
        0xDC => (real_arith(op, m.reg)?, Width::Qword),
        0xDD => (load_store(op, m.reg, InstructionKind::Fld)?, Width::Qword),
        0xDE => (int_arith(op, m.reg)?, Width::Word),
        _ => match m.reg {
            // 0xDF mixes 16-bit and 64-bit integer forms.
            0 | 2 | 3 => (load_store(op, m.reg, InstructionKind::Fild)?, Width::Word),
            5 => (InstructionKind::Fild, Width::Qword),
            7 => (InstructionKind::Fistp, Width::Qword),
            selector => bail!(DisassemblyError::BadGroupSelector { op, selector }),
        },
    };
    let (_, operand) = modrm::read_fpu(cursor, width)?;
    Ok(Decoded::unary(kind, operand))
}

fn decode_register_form(op: u8, m: ModRm) -> Result<Decoded> {
    Ok(match op {
        // ST(0) op ST(i)
        0xD8 => Decoded::binary(real_arith(op, m.reg)?, st(0), st(m.rm)),
        0xD9 => match (m.reg, m.rm) {
            (0, i) => Decoded::unary(InstructionKind::Fld, st(i)),
            (1, i) => Decoded::unary(InstructionKind::Fxch, st(i)),
            (4, 0) => Decoded::nullary(InstructionKind::Fchs),
            (4, 1) => Decoded::nullary(InstructionKind::Fabs),
            (selector, _) => bail!(DisassemblyError::BadGroupSelector { op, selector }),
        },
        0xDB => match (m.reg, m.rm) {
            (4, 2) => Decoded::nullary(InstructionKind::Fnclex),
            (4, 3) => Decoded::nullary(InstructionKind::Fninit),
            (selector, _) => bail!(DisassemblyError::BadGroupSelector { op, selector }),
        },
        // ST(i) op ST(0), results landing in ST(i)
        0xDC => Decoded::binary(reversed_arith(op, m.reg)?, st(m.rm), st(0)),
        0xDD => match m.reg {
            2 => Decoded::unary(InstructionKind::Fst, st(m.rm)),
            3 => Decoded::unary(InstructionKind::Fstp, st(m.rm)),
            selector => bail!(DisassemblyError::BadGroupSelector { op, selector }),
        },
        0xDE => match (m.reg, m.rm) {
            (3, 1) => Decoded::nullary(InstructionKind::Fcompp),
            (reg, i) => Decoded::binary(pop_arith(op, reg)?, st(i), st(0)),
        },
        0xDF => match (m.reg, m.rm) {
            (4, 0) => Decoded::unary(
                InstructionKind::Fnstsw,
                Operand::reg(Reg::Eax, Width::Word),
            ),
            (selector, _) => bail!(DisassemblyError::BadGroupSelector { op, selector }),
        },
        // 0xDA register forms are the FCMOV family, which we do not
        // decode.
        _ => bail!(DisassemblyError::BadGroupSelector {
            op,
            selector: m.reg
        }),
    })
}

/// 0xDC register forms: the subtract/divide pairs swap their r suffix
/// relative to the memory encodings.
fn reversed_arith(op: u8, selector: u8) -> Result<InstructionKind> {
    Ok(match selector {
        0 => InstructionKind::Fadd,
        1 => InstructionKind::Fmul,
        4 => InstructionKind::Fsubr,
        5 => InstructionKind::Fsub,
        6 => InstructionKind::Fdivr,
        7 => InstructionKind::Fdiv,
        selector => bail!(DisassemblyError::BadGroupSelector { op, selector }),
    })
}

/// 0xDE register forms: arithmetic that pops the stack on completion.
fn pop_arith(op: u8, selector: u8) -> Result<InstructionKind> {
    Ok(match selector {
        0 => InstructionKind::Faddp,
        1 => InstructionKind::Fmulp,
        4 => InstructionKind::Fsubrp,
        5 => InstructionKind::Fsubp,
        6 => InstructionKind::Fdivrp,
        7 => InstructionKind::Fdivp,
        selector => bail!(DisassemblyError::BadGroupSelector { op, selector }),
    })
}

/// 0x9B alone is FWAIT; followed by DB E3 it forms the three-byte FINIT
/// sequence and is decoded as one instruction.
fn decode_fwait(_op: u8, cursor: &mut Cursor) -> Result<Decoded> {
    if cursor.peek() == Some(0xDB) && cursor.peek_at(1) == Some(0xE3) {
        cursor.read_u8("finit")?;
        cursor.read_u8("finit")?;
        return Ok(Decoded::nullary(InstructionKind::Finit));
    }
    Ok(Decoded::nullary(InstructionKind::Fwait))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Decoded {
        let mut cursor = Cursor::new(&bytes[1..]);
        decode_escape(bytes[0], &mut cursor).unwrap()
    }

    #[test]
    fn fadd_register_form_names_both_stack_slots() {
        // D8 C1: fadd st(0), st(1)
        let d = decode(&[0xD8, 0xC1]);
        assert_eq!(d.kind, InstructionKind::Fadd);
        assert_eq!(d.operands, vec![st(0), st(1)]);
    }

    #[test]
    fn dc_register_form_reverses_operand_order() {
        // DC C1: fadd st(1), st(0)
        let d = decode(&[0xDC, 0xC1]);
        assert_eq!(d.kind, InstructionKind::Fadd);
        assert_eq!(d.operands, vec![st(1), st(0)]);
        // DC E1: fsubr st(1), st(0)
        let d = decode(&[0xDC, 0xE1]);
        assert_eq!(d.kind, InstructionKind::Fsubr);
    }

    #[test]
    fn fnstsw_ax_fixed_encoding() {
        let d = decode(&[0xDF, 0xE0]);
        assert_eq!(d.kind, InstructionKind::Fnstsw);
        assert_eq!(d.operands, vec![Operand::reg(Reg::Eax, Width::Word)]);
    }

    #[test]
    fn fcompp_fixed_encoding() {
        let d = decode(&[0xDE, 0xD9]);
        assert_eq!(d.kind, InstructionKind::Fcompp);
        assert!(d.operands.is_empty());
    }

    #[test]
    fn memory_widths_follow_the_escape_byte() {
        // D8 /0 m32, DC /0 m64, DE /0 m16
        let d = decode(&[0xD8, 0x00]);
        assert_eq!(d.operands[0].width(), Width::Dword);
        let d = decode(&[0xDC, 0x00]);
        assert_eq!(d.operands[0].width(), Width::Qword);
        let d = decode(&[0xDE, 0x00]);
        assert_eq!(d.kind, InstructionKind::Fiadd);
        assert_eq!(d.operands[0].width(), Width::Word);
    }

    #[test]
    fn df_mixes_integer_widths() {
        let d = decode(&[0xDF, 0x00]);
        assert_eq!(d.kind, InstructionKind::Fild);
        assert_eq!(d.operands[0].width(), Width::Word);
        let d = decode(&[0xDF, 0x28]);
        assert_eq!(d.kind, InstructionKind::Fild);
        assert_eq!(d.operands[0].width(), Width::Qword);
    }

    #[test]
    fn fwait_vs_finit() {
        let code = [0xDB, 0xE3];
        let mut cursor = Cursor::new(&code);
        let d = decode_fwait(0x9B, &mut cursor).unwrap();
        assert_eq!(d.kind, InstructionKind::Finit);
        assert_eq!(cursor.position(), 2);

        let code = [0x90];
        let mut cursor = Cursor::new(&code);
        let d = decode_fwait(0x9B, &mut cursor).unwrap();
        assert_eq!(d.kind, InstructionKind::Fwait);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn undefined_register_forms_are_rejected() {
        let code = [0xC0];
        let mut cursor = Cursor::new(&code);
        assert!(decode_escape(0xDA, &mut cursor).is_err());
    }
}
