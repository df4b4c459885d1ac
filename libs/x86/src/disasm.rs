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

//! The linear-sweep driver. Walks the buffer front to back; every byte
//! lands in exactly one instruction record, and the sweep only stops
//! early when the buffer ends inside an instruction.
use crate::{
    cursor::Cursor,
    handlers::{self, Decoded},
    inst::{Instruction, InstructionKind},
    DisassemblyError,
};
use log::trace;

/// The result of one sweep. Instruction records cover the buffer from
/// the front; `truncated` is set when the tail ended mid-instruction,
/// in which case the failing instruction's bytes are not represented.
#[derive(Debug)]
pub struct Disassembly {
    pub instructions: Vec<Instruction>,
    /// The field being read when the bytes ran out, if the buffer ended
    /// inside an instruction.
    pub truncated: Option<&'static str>,
}

impl Disassembly {
    pub fn is_complete(&self) -> bool {
        self.truncated.is_none()
    }

    /// Total bytes covered by instruction records.
    pub fn byte_count(&self) -> usize {
        self.instructions.iter().map(|i| i.length).sum()
    }
}

/// Sweep a buffer that notionally starts at address zero.
pub fn disassemble(code: &[u8]) -> Disassembly {
    disassemble_at(code, 0)
}

/// Sweep a buffer whose first byte lives at `base`. Jump and call
/// targets come out as absolute addresses in that space.
pub fn disassemble_at(code: &[u8], base: u32) -> Disassembly {
    let mut cursor = Cursor::with_base(code, base);
    let mut instructions = Vec::new();
    let mut truncated = None;

    while !cursor.is_at_end() {
        let start = cursor.position();
        cursor.consume_prefixes();
        let op_start = cursor.position();
        let op = match cursor.read_u8("opcode") {
            Ok(op) => op,
            Err(_) => {
                // Prefix bytes with no opcode behind them.
                truncated = Some("opcode");
                break;
            }
        };

        let decoded = match handlers::resolve(op, &cursor) {
            Some(handler) => match (handler.decode)(op, &mut cursor) {
                Ok(decoded) => decoded,
                Err(e) => match e.downcast_ref::<DisassemblyError>() {
                    Some(DisassemblyError::TooShort { phase }) => {
                        trace!(
                            "truncated at 0x{:X}: buffer ended while reading {}",
                            base.wrapping_add(start as u32),
                            phase
                        );
                        truncated = Some(*phase);
                        break;
                    }
                    _ => {
                        trace!("undecodable form at 0x{:X}: {}", base.wrapping_add(start as u32), e);
                        cursor.set_position(op_start + 1);
                        Decoded::nullary(InstructionKind::Unknown)
                    }
                },
            },
            None => {
                trace!(
                    "no handler for opcode 0x{:02X} at 0x{:X}",
                    op,
                    base.wrapping_add(start as u32)
                );
                cursor.set_position(op_start + 1);
                Decoded::nullary(InstructionKind::Unknown)
            }
        };

        let end = cursor.position();
        let unknown = decoded.kind == InstructionKind::Unknown;
        let inst = Instruction {
            address: base.wrapping_add(start as u32),
            length: end - start,
            kind: decoded.kind,
            operands: decoded.operands,
            raw: cursor.slice(start, end).to_vec(),
            rep: if unknown {
                Default::default()
            } else {
                cursor.rep()
            },
            lock: !unknown && cursor.has_lock(),
        };
        trace!("0x{:08X}  {}", inst.address, inst);
        instructions.push(inst);
    }

    Disassembly {
        instructions,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        inst::Cond,
        operand::{Immediate, Operand},
        reg::{Reg, RepPrefix, SegReg, Width},
    };

    fn one(code: &[u8]) -> Instruction {
        let d = disassemble(code);
        assert!(d.is_complete(), "unexpected truncation: {:?}", d.truncated);
        assert_eq!(d.instructions.len(), 1, "expected one instruction");
        d.instructions.into_iter().next().unwrap()
    }

    #[test]
    fn empty_buffer_yields_empty_result() {
        let d = disassemble(&[]);
        assert!(d.instructions.is_empty());
        assert!(d.is_complete());
    }

    #[test]
    fn push_covers_the_whole_register_range() {
        for op in 0x50..=0x57u8 {
            let inst = one(&[op]);
            assert_eq!(inst.kind, InstructionKind::Push);
            assert_eq!(inst.length, 1);
            assert_eq!(
                inst.operands,
                vec![Operand::reg(Reg::from_index(op & 7), Width::Dword)]
            );
        }
        for op in 0x58..=0x5Fu8 {
            assert_eq!(one(&[op]).kind, InstructionKind::Pop);
        }
    }

    #[test]
    fn group1_byte_immediate() {
        let inst = one(&[0x80, 0xC0, 0x42]);
        assert_eq!(inst.to_string(), "add al, 0x42");
    }

    #[test]
    fn group1_dword_vs_sign_extended_immediate() {
        // 0x81 carries a full dword.
        let inst = one(&[0x81, 0xC1, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(inst.to_string(), "add ecx, 0x12345678");
        // 0x83 sign-extends its single byte.
        let inst = one(&[0x83, 0xC1, 0xFF]);
        assert_eq!(inst.to_string(), "add ecx, 0xFFFFFFFF");
        assert_eq!(inst.length, 3);
    }

    #[test]
    fn mov_imm_reg() {
        let inst = one(&[0xB8, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(inst.kind, InstructionKind::Mov);
        assert_eq!(inst.length, 5);
        assert_eq!(inst.to_string(), "mov eax, 0x1");
    }

    #[test]
    fn segment_prefixed_group5_push() {
        let inst = one(&[0x26, 0xFF, 0x75, 0x10]);
        assert_eq!(inst.kind, InstructionKind::Push);
        assert_eq!(inst.length, 4);
        assert_eq!(
            inst.operands,
            vec![Operand::DisplacementMemory {
                base: Reg::Ebp,
                displacement: 0x10,
                width: Width::Dword,
                segment: Some(SegReg::Es),
            }]
        );
        assert_eq!(inst.to_string(), "push dword ptr es:[ebp+0x10]");
    }

    #[test]
    fn jump_target_is_end_of_instruction_plus_offset() {
        let inst = one(&[0xE9, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(inst.kind, InstructionKind::Jmp);
        assert_eq!(
            inst.operands,
            vec![Operand::imm(Immediate::unsigned(5, Width::Dword))]
        );
        // Backward short jump: target = 2 + (-2) = 0.
        let inst = one(&[0x74, 0xFE]);
        assert_eq!(inst.kind, InstructionKind::Jcc(Cond::E));
        assert_eq!(
            inst.operands,
            vec![Operand::imm(Immediate::unsigned(0, Width::Dword))]
        );
        assert_eq!(inst.to_string(), "je 0x0");
    }

    #[test]
    fn base_address_shifts_targets_and_addresses() {
        let d = disassemble_at(&[0x90, 0xE8, 0xFA, 0xFF, 0xFF, 0xFF], 0x40_1000);
        assert_eq!(d.instructions[0].address, 0x40_1000);
        assert_eq!(d.instructions[1].address, 0x40_1001);
        // call back to the start: 0x401006 - 6 = 0x401000
        assert_eq!(
            d.instructions[1].operands,
            vec![Operand::imm(Immediate::unsigned(0x40_1000, Width::Dword))]
        );
    }

    #[test]
    fn truncated_instruction_stops_the_sweep() {
        // A lone 0x89 admits the MOV handler but has no ModR/M byte.
        let d = disassemble(&[0x89]);
        assert!(d.instructions.is_empty());
        assert_eq!(d.truncated, Some("modrm"));
        // Valid instruction then a truncated one: partial result.
        let d = disassemble(&[0x90, 0xB8, 0x01]);
        assert_eq!(d.instructions.len(), 1);
        assert!(!d.is_complete());
    }

    #[test]
    fn unknown_opcode_advances_one_byte() {
        // Neither 0xF1 nor 0xD6 is a form we decode; both bytes must
        // still be covered, one record each.
        let d = disassemble(&[0xF1, 0xD6, 0x90]);
        assert_eq!(d.instructions.len(), 3);
        assert!(d.instructions[0].is_unknown());
        assert_eq!(d.instructions[0].length, 1);
        assert!(d.instructions[1].is_unknown());
        assert_eq!(d.instructions[2].kind, InstructionKind::Nop);
        assert_eq!(d.byte_count(), 3);
    }

    #[test]
    fn operand_size_prefixed_nop() {
        let inst = one(&[0x66, 0x90]);
        assert_eq!(inst.kind, InstructionKind::Nop);
        assert_eq!(inst.length, 2);
        assert_eq!(inst.raw, vec![0x66, 0x90]);
    }

    #[test]
    fn rep_string_op() {
        let inst = one(&[0xF3, 0xA5]);
        assert_eq!(inst.kind, InstructionKind::Movs);
        assert_eq!(inst.rep, RepPrefix::Rep);
        assert_eq!(inst.to_string(), "rep movsd");
        let inst = one(&[0xF2, 0xAE]);
        assert_eq!(inst.to_string(), "repne scasb");
    }

    #[test]
    fn operand_size_prefix_narrows_immediates() {
        let inst = one(&[0x66, 0xB8, 0x34, 0x12]);
        assert_eq!(inst.to_string(), "mov ax, 0x1234");
        assert_eq!(inst.length, 4);
    }

    #[test]
    fn fpu_status_word_store() {
        let inst = one(&[0xDF, 0xE0]);
        assert_eq!(inst.to_string(), "fnstsw ax");
        let inst = one(&[0xD8, 0xC1]);
        assert_eq!(inst.to_string(), "fadd st(0), st(1)");
    }

    #[test]
    fn finit_sequence_is_one_instruction() {
        let inst = one(&[0x9B, 0xDB, 0xE3]);
        assert_eq!(inst.kind, InstructionKind::Finit);
        assert_eq!(inst.length, 3);
        let d = disassemble(&[0x9B, 0x90]);
        assert_eq!(d.instructions.len(), 2);
        assert_eq!(d.instructions[0].kind, InstructionKind::Fwait);
    }

    #[test]
    fn lock_prefix_is_recorded() {
        let inst = one(&[0xF0, 0xFF, 0x00]);
        assert!(inst.lock);
        assert_eq!(inst.to_string(), "lock inc dword ptr [eax]");
    }

    #[test]
    fn sweep_is_idempotent_and_covers_every_byte() {
        let _ = env_logger::builder().is_test(true).try_init();
        let code: Vec<u8> = vec![
            0x55, // push ebp
            0x8B, 0xEC, // mov ebp, esp
            0x83, 0xEC, 0x08, // sub esp, 0x8
            0x26, 0xFF, 0x75, 0x10, // push dword ptr es:[ebp+0x10]
            0xF1, 0xD6, // unknown, unknown
            0xE8, 0x00, 0x00, 0x00, 0x00, // call
            0xC9, // leave
            0xC3, // ret
        ];
        let first = disassemble(&code);
        let second = disassemble(&code);
        assert_eq!(first.instructions, second.instructions);
        assert!(first.is_complete());
        assert_eq!(first.byte_count(), code.len());
        // Records are contiguous and in address order.
        let mut expected = 0u32;
        for inst in &first.instructions {
            assert_eq!(inst.address, expected);
            expected = inst.next_address();
        }
    }

    #[test]
    fn bad_group_selector_lists_as_unknown() {
        // 0xC6 with a nonzero reg selector has no defined operation.
        let d = disassemble(&[0xC6, 0x08, 0x01]);
        assert!(d.instructions[0].is_unknown());
        assert_eq!(d.instructions[0].length, 1);
        assert_eq!(d.byte_count(), 3);
    }

    #[test]
    fn shift_group_forms() {
        let inst = one(&[0xC1, 0xE0, 0x04]);
        assert_eq!(inst.to_string(), "shl eax, 0x4");
        let inst = one(&[0xD1, 0xF8]);
        assert_eq!(inst.to_string(), "sar eax, 0x1");
        let inst = one(&[0xD3, 0xE8]);
        assert_eq!(inst.to_string(), "shr eax, cl");
        // Selector 6 is undefined.
        let d = disassemble(&[0xC1, 0xF0, 0x04]);
        assert!(d.instructions[0].is_unknown());
    }

    #[test]
    fn two_byte_forms() {
        let inst = one(&[0x0F, 0xB6, 0xC1]);
        assert_eq!(inst.to_string(), "movzx eax, cl");
        let inst = one(&[0x0F, 0xBF, 0xD3]);
        assert_eq!(inst.to_string(), "movsx edx, bx");
        let inst = one(&[0x0F, 0xAF, 0xC3]);
        assert_eq!(inst.to_string(), "imul eax, ebx");
        let inst = one(&[0x0F, 0x84, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(inst.to_string(), "je 0x16");
    }
}
