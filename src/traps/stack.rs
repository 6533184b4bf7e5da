// Emulated-stack plumbing for Toolbox calling conventions: arguments are
// popped in reverse order, booleans travel in the high byte of a word, and a
// function's caller reserves a result slot beneath its arguments which the
// handler overwrites in place.

use crate::errors::Result;
use crate::records::{Ptr, Record};
use crate::Core;

impl Core {
    pub fn pop_u16(&mut self) -> Result<u16> {
        self.cpu.pop16()
    }

    pub fn pop_i16(&mut self) -> Result<i16> {
        Ok(self.cpu.pop16()? as i16)
    }

    pub fn pop_u32(&mut self) -> Result<u32> {
        self.cpu.pop32()
    }

    /// Booleans occupy a word on the stack.
    pub fn pop_bool(&mut self) -> Result<bool> {
        Ok(self.cpu.pop16()? != 0)
    }

    /// Pops a by-value record (Point and other <= 4 byte records).
    pub fn pop_record<T: Record>(&mut self) -> Result<T> {
        let sp = self.cpu.a[7];
        let value = T::read_from(self.memory.region(), sp as usize)?;
        self.cpu.a[7] = sp + T::SIZE as u32;
        Ok(value)
    }

    /// Pops a pointer and reads the record it addresses. The AND accounts
    /// for flag bits stored in the upper byte on non-32-bit-clean systems.
    pub fn pop_ref<T: Record>(&mut self) -> Result<(Ptr, T)> {
        let ptr = self.cpu.pop32()? & 0x00FF_FFFF;
        Ok((ptr, T::read_from(self.memory.region(), ptr as usize)?))
    }

    /// Pops a pointer to a Pascal string and reads it.
    pub fn pop_pstr_ref(&mut self) -> Result<String> {
        let ptr = self.cpu.pop32()? & 0x00FF_FFFF;
        self.memory.region().read_pstr(ptr as usize)
    }

    pub fn peek_u16(&self, offset: u32) -> Result<u16> {
        self.memory.region().read_u16((self.cpu.a[7] + offset) as usize)
    }

    /// Writes a function result into the caller-reserved slot now at the
    /// top of the stack (the caller removes it after the trap returns).
    pub fn trap_return_u16(&mut self, value: u16) -> Result<()> {
        self.memory.region().write_u16(self.cpu.a[7] as usize, value)
    }

    pub fn trap_return_i16(&mut self, value: i16) -> Result<()> {
        self.trap_return_u16(value as u16)
    }

    pub fn trap_return_u32(&mut self, value: u32) -> Result<()> {
        self.memory.region().write_u32(self.cpu.a[7] as usize, value)
    }

    /// Booleans return in the high byte of the result word.
    pub fn trap_return_bool(&mut self, value: bool) -> Result<()> {
        self.trap_return_u16(if value { 0x0100 } else { 0x0000 })
    }
}
