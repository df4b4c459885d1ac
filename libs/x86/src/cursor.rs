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
    reg::{PrefixState, RepPrefix, SegReg, Width, PREFIX_CODES},
    DisassemblyError,
};
use anyhow::{ensure, Result};

/// A bounds-checked read position over one code buffer, plus the prefix
/// state of the instruction currently being decoded.
///
/// All consuming reads fail closed: a read past the end of the buffer
/// returns [`DisassemblyError::TooShort`] without advancing, and the
/// caller must treat the instruction as truncated.
pub struct Cursor<'a> {
    code: &'a [u8],
    pos: usize,
    base: u32,
    prefix: PrefixState,
}

impl<'a> Cursor<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self::with_base(code, 0)
    }

    /// A cursor whose positions map to absolute addresses starting at
    /// `base`. Relative branch targets resolve against this.
    pub fn with_base(code: &'a [u8], base: u32) -> Self {
        Self {
            code,
            pos: 0,
            base,
            prefix: PrefixState::default(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// The absolute address of the current position.
    pub fn address(&self) -> u32 {
        self.base.wrapping_add(self.pos as u32)
    }

    pub fn can_read(&self, n: usize) -> bool {
        self.pos + n <= self.code.len()
    }

    pub fn remaining(&self) -> usize {
        self.code.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    /// Read ahead without advancing. `ahead` is relative to the current
    /// position; `peek_at(0)` is the next byte a consuming read returns.
    pub fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.code.get(self.pos + ahead).copied()
    }

    pub fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    pub fn read_u8(&mut self, phase: &'static str) -> Result<u8> {
        ensure!(self.can_read(1), DisassemblyError::TooShort { phase });
        let b = self.code[self.pos];
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self, phase: &'static str) -> Result<u16> {
        ensure!(self.can_read(2), DisassemblyError::TooShort { phase });
        let w = u16::from_le_bytes([self.code[self.pos], self.code[self.pos + 1]]);
        self.pos += 2;
        Ok(w)
    }

    pub fn read_u32(&mut self, phase: &'static str) -> Result<u32> {
        ensure!(self.can_read(4), DisassemblyError::TooShort { phase });
        let dw = u32::from_le_bytes([
            self.code[self.pos],
            self.code[self.pos + 1],
            self.code[self.pos + 2],
            self.code[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(dw)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Explicit rewind/seek. Group disambiguation peeks the addressing
    /// byte before the owning handler formally consumes it, so decode
    /// routines occasionally step backward within the current instruction.
    pub fn set_position(&mut self, pos: usize) {
        debug_assert!(pos <= self.code.len());
        self.pos = pos;
    }

    pub fn slice(&self, start: usize, end: usize) -> &'a [u8] {
        &self.code[start..end]
    }

    /// Reset prefix state and peel every prefix byte at the head of the
    /// next instruction. Returns the number of prefix bytes consumed.
    pub fn consume_prefixes(&mut self) -> usize {
        self.prefix = PrefixState::default();
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !PREFIX_CODES.contains(&b) {
                break;
            }
            self.prefix.apply(b);
            self.pos += 1;
        }
        self.pos - start
    }

    pub fn prefix(&self) -> &PrefixState {
        &self.prefix
    }

    pub fn has_operand_size_override(&self) -> bool {
        self.prefix.operand_size
    }

    pub fn has_lock(&self) -> bool {
        self.prefix.lock
    }

    pub fn segment_override(&self) -> Option<SegReg> {
        self.prefix.segment
    }

    pub fn rep(&self) -> RepPrefix {
        self.prefix.rep
    }

    /// The width of `v`-sized operands under the current prefix state.
    pub fn operand_width(&self) -> Width {
        self.prefix.operand_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_little_endian() -> Result<()> {
        let code = [0x78, 0x56, 0x34, 0x12, 0xAA];
        let mut c = Cursor::new(&code);
        assert_eq!(c.read_u32("test")?, 0x1234_5678);
        assert_eq!(c.read_u8("test")?, 0xAA);
        assert_eq!(c.position(), 5);
        Ok(())
    }

    #[test]
    fn reads_fail_closed_without_advancing() {
        let code = [0x01, 0x02];
        let mut c = Cursor::new(&code);
        assert!(c.read_u32("test").is_err());
        assert_eq!(c.position(), 0);
        assert!(c.read_u16("test").is_ok());
        assert!(c.read_u8("test").is_err());
        assert_eq!(c.position(), 2);
    }

    #[test]
    fn peek_does_not_advance() {
        let code = [0x90, 0xC3];
        let mut c = Cursor::new(&code);
        assert_eq!(c.peek(), Some(0x90));
        assert_eq!(c.peek_at(1), Some(0xC3));
        assert_eq!(c.peek_at(2), None);
        assert_eq!(c.position(), 0);
        c.set_position(1);
        assert_eq!(c.peek(), Some(0xC3));
    }

    #[test]
    fn consume_prefixes_resets_state_each_instruction() {
        let code = [0x66, 0x26, 0x90, 0x90];
        let mut c = Cursor::new(&code);
        assert_eq!(c.consume_prefixes(), 2);
        assert!(c.has_operand_size_override());
        assert_eq!(c.segment_override(), Some(SegReg::Es));
        assert_eq!(c.peek(), Some(0x90));
        c.set_position(3);
        assert_eq!(c.consume_prefixes(), 0);
        assert!(!c.has_operand_size_override());
        assert_eq!(c.segment_override(), None);
    }

    #[test]
    fn address_tracks_base_plus_position() {
        let code = [0x90, 0x90, 0x90];
        let mut c = Cursor::with_base(&code, 0x40_1000);
        assert_eq!(c.address(), 0x40_1000);
        c.set_position(2);
        assert_eq!(c.address(), 0x40_1002);
    }

    #[test]
    fn prefix_only_buffer_leaves_cursor_at_end() {
        let code = [0xF3, 0x66];
        let mut c = Cursor::new(&code);
        assert_eq!(c.consume_prefixes(), 2);
        assert!(c.is_at_end());
        assert_eq!(c.rep(), RepPrefix::Rep);
    }
}
