// Instruction execution. Operand plumbing goes through `read_ea`/`write_ea`;
// the arithmetic helpers compute the condition codes from the operand and
// result sign bits, per size.

use crate::errors::{EmuError, Result};

use super::decode::{AluKind, BitMode, Ea, ImmKind, Instr, MovemEa, ShiftCount, ShiftKind, Size};
use super::{Ccr, Cpu};

impl Cpu {
    pub(crate) fn read_ea(&mut self, ea: Ea, size: Size) -> Result<u32> {
        match ea {
            Ea::DataReg(reg) => Ok(self.d[reg] & size.mask()),
            Ea::AddrReg(reg) => Ok(self.a[reg] & size.mask()),
            Ea::Imm(value) => Ok(value & size.mask()),
            Ea::Mem(address) => match size {
                Size::Byte => Ok(self.read8(address)? as u32),
                Size::Word => Ok(self.read16(address)? as u32),
                Size::Long => self.read32(address),
            },
        }
    }

    pub(crate) fn write_ea(&mut self, ea: Ea, size: Size, value: u32) -> Result<()> {
        match ea {
            Ea::DataReg(reg) => {
                self.d[reg] = (self.d[reg] & !size.mask()) | (value & size.mask());
                Ok(())
            }
            Ea::AddrReg(reg) => {
                // Word writes to an address register sign-extend.
                self.a[reg] = match size {
                    Size::Word => value as u16 as i16 as i32 as u32,
                    _ => value,
                };
                Ok(())
            }
            Ea::Imm(_) => Err(EmuError::malformed("write to an immediate operand".to_string())),
            Ea::Mem(address) => match size {
                Size::Byte => self.write8(address, value as u8),
                Size::Word => self.write16(address, value as u16),
                Size::Long => self.write32(address, value),
            },
        }
    }

    fn set_nz(&mut self, value: u32, size: Size) {
        self.set_flag(Ccr::N, value & size.msb() != 0);
        self.set_flag(Ccr::Z, value & size.mask() == 0);
    }

    /// dst + src (+ extend); returns the truncated result and sets NZVCX.
    fn add_with_flags(&mut self, dst: u32, src: u32, extend: bool, size: Size, sticky_z: bool) -> u32 {
        let result = dst.wrapping_add(src).wrapping_add(extend as u32) & size.mask();
        let (s, d, r) = (src & size.msb() != 0, dst & size.msb() != 0, result & size.msb() != 0);
        let carry = (s && d) || (!r && d) || (s && !r);
        let overflow = (s && d && !r) || (!s && !d && r);
        self.set_flag(Ccr::C, carry);
        self.set_flag(Ccr::X, carry);
        self.set_flag(Ccr::V, overflow);
        self.set_flag(Ccr::N, r);
        if sticky_z {
            if result != 0 {
                self.set_flag(Ccr::Z, false);
            }
        } else {
            self.set_flag(Ccr::Z, result == 0);
        }
        result
    }

    /// dst - src (- extend); returns the truncated result and sets NZVC
    /// (and X unless `keep_x`, for CMP-style uses).
    fn sub_with_flags(
        &mut self,
        dst: u32,
        src: u32,
        extend: bool,
        size: Size,
        keep_x: bool,
        sticky_z: bool,
    ) -> u32 {
        let result = dst.wrapping_sub(src).wrapping_sub(extend as u32) & size.mask();
        let (s, d, r) = (src & size.msb() != 0, dst & size.msb() != 0, result & size.msb() != 0);
        let borrow = (s && !d) || (r && !d) || (s && r);
        let overflow = (!s && d && !r) || (s && !d && r);
        self.set_flag(Ccr::C, borrow);
        if !keep_x {
            self.set_flag(Ccr::X, borrow);
        }
        self.set_flag(Ccr::V, overflow);
        self.set_flag(Ccr::N, r);
        if sticky_z {
            if result != 0 {
                self.set_flag(Ccr::Z, false);
            }
        } else {
            self.set_flag(Ccr::Z, result == 0);
        }
        result
    }

    fn logic_flags(&mut self, result: u32, size: Size) {
        self.set_nz(result, size);
        self.set_flag(Ccr::V, false);
        self.set_flag(Ccr::C, false);
    }

    pub(crate) fn condition(&self, code: u16) -> bool {
        let c = self.flag(Ccr::C);
        let v = self.flag(Ccr::V);
        let z = self.flag(Ccr::Z);
        let n = self.flag(Ccr::N);
        match code {
            0 => true,
            1 => false,
            2 => !c && !z,
            3 => c || z,
            4 => !c,
            5 => c,
            6 => !z,
            7 => z,
            8 => !v,
            9 => v,
            10 => !n,
            11 => n,
            12 => n == v,
            13 => n != v,
            14 => !z && n == v,
            _ => z || n != v,
        }
    }

    pub(crate) fn execute(&mut self, instr: Instr) -> Result<()> {
        match instr {
            Instr::Nop | Instr::Reset => Ok(()),

            Instr::OriCcr(mask) => {
                self.set_sr(self.sr | mask as u16);
                Ok(())
            }
            Instr::AndiCcr(mask) => {
                let low = (self.sr as u8) & mask;
                self.set_sr((self.sr & 0xFF00) | low as u16);
                Ok(())
            }
            Instr::EoriCcr(mask) => {
                let low = (self.sr as u8) ^ mask;
                self.set_sr((self.sr & 0xFF00) | low as u16);
                Ok(())
            }
            Instr::OriSr(mask) => {
                self.set_sr(self.sr | mask);
                Ok(())
            }
            Instr::AndiSr(mask) => {
                self.set_sr(self.sr & mask);
                Ok(())
            }
            Instr::EoriSr(mask) => {
                self.set_sr(self.sr ^ mask);
                Ok(())
            }

            Instr::ImmOp { op, size, dst, imm } => {
                let value = self.read_ea(dst, size)?;
                match op {
                    ImmKind::Or => {
                        let result = value | imm;
                        self.logic_flags(result, size);
                        self.write_ea(dst, size, result)
                    }
                    ImmKind::And => {
                        let result = value & imm;
                        self.logic_flags(result, size);
                        self.write_ea(dst, size, result)
                    }
                    ImmKind::Eor => {
                        let result = value ^ imm;
                        self.logic_flags(result, size);
                        self.write_ea(dst, size, result)
                    }
                    ImmKind::Add => {
                        let result = self.add_with_flags(value, imm, false, size, false);
                        self.write_ea(dst, size, result)
                    }
                    ImmKind::Sub => {
                        let result = self.sub_with_flags(value, imm, false, size, false, false);
                        self.write_ea(dst, size, result)
                    }
                    ImmKind::Cmp => {
                        self.sub_with_flags(value, imm, false, size, true, false);
                        Ok(())
                    }
                }
            }

            Instr::BitOp { mode, bit, dst } => {
                let bit_number = match bit {
                    ShiftCount::Fixed(number) => number,
                    ShiftCount::Reg(reg) => self.d[reg],
                };
                let (size, bit_number) = match dst {
                    Ea::DataReg(_) => (Size::Long, bit_number % 32),
                    _ => (Size::Byte, bit_number % 8),
                };
                let value = self.read_ea(dst, size)?;
                let mask = 1u32 << bit_number;
                self.set_flag(Ccr::Z, value & mask == 0);
                let result = match mode {
                    BitMode::Test => return Ok(()),
                    BitMode::Change => value ^ mask,
                    BitMode::Clear => value & !mask,
                    BitMode::Set => value | mask,
                };
                self.write_ea(dst, size, result)
            }

            Instr::Movep { data_reg, address, size, to_memory } => {
                let count = size.bytes();
                if to_memory {
                    let value = self.d[data_reg];
                    for index in 0..count {
                        let shift = 8 * (count - 1 - index);
                        self.write8(address + index * 2, (value >> shift) as u8)?;
                    }
                } else {
                    let mut value: u32 = 0;
                    for index in 0..count {
                        value = (value << 8) | self.read8(address + index * 2)? as u32;
                    }
                    let mask = size.mask();
                    self.d[data_reg] = (self.d[data_reg] & !mask) | (value & mask);
                }
                Ok(())
            }

            Instr::Move { size, src, dst } => {
                let value = self.read_ea(src, size)?;
                self.logic_flags(value, size);
                self.write_ea(dst, size, value)
            }
            Instr::Movea { size, src, reg } => {
                let value = self.read_ea(src, size)?;
                self.a[reg] = size.sign_extend(value) as u32;
                Ok(())
            }
            Instr::MoveFromSr { dst } => self.write_ea(dst, Size::Word, self.sr as u32),
            Instr::MoveToCcr { src } => {
                let value = self.read_ea(src, Size::Word)? as u8;
                self.set_sr((self.sr & 0xFF00) | value as u16);
                Ok(())
            }
            Instr::MoveToSr { src } => {
                let value = self.read_ea(src, Size::Word)? as u16;
                self.set_sr(value);
                Ok(())
            }

            Instr::Negx { size, dst } => {
                let value = self.read_ea(dst, size)?;
                let x = self.flag(Ccr::X);
                let result = self.sub_with_flags(0, value, x, size, false, true);
                self.write_ea(dst, size, result)
            }
            Instr::Clr { size, dst } => {
                self.logic_flags(0, size);
                self.write_ea(dst, size, 0)
            }
            Instr::Neg { size, dst } => {
                let value = self.read_ea(dst, size)?;
                let result = self.sub_with_flags(0, value, false, size, false, false);
                self.write_ea(dst, size, result)
            }
            Instr::Not { size, dst } => {
                let value = self.read_ea(dst, size)?;
                let result = !value & size.mask();
                self.logic_flags(result, size);
                self.write_ea(dst, size, result)
            }
            Instr::Ext { to, reg } => {
                let result = match to {
                    Size::Word => {
                        let value = self.d[reg] as u8 as i8 as i16 as u16 as u32;
                        self.d[reg] = (self.d[reg] & 0xFFFF_0000) | value;
                        value
                    }
                    _ => {
                        self.d[reg] = self.d[reg] as u16 as i16 as i32 as u32;
                        self.d[reg]
                    }
                };
                self.logic_flags(result, to);
                Ok(())
            }
            Instr::Swap { reg } => {
                self.d[reg] = self.d[reg].rotate_left(16);
                self.logic_flags(self.d[reg], Size::Long);
                Ok(())
            }
            Instr::Pea { address } => self.push32(address),
            Instr::Lea { reg, address } => {
                self.a[reg] = address;
                Ok(())
            }

            Instr::Movem { size, to_memory, mask, ea } => self.movem(size, to_memory, mask, ea),

            Instr::Tst { size, dst } => {
                let value = self.read_ea(dst, size)?;
                self.logic_flags(value, size);
                Ok(())
            }
            Instr::Tas { dst } => {
                let value = self.read_ea(dst, Size::Byte)?;
                self.logic_flags(value, Size::Byte);
                self.write_ea(dst, Size::Byte, value | 0x80)
            }
            Instr::Nbcd { dst } => {
                let value = self.read_ea(dst, Size::Byte)? as u8;
                let x = self.flag(Ccr::X) as u8;
                let (result, borrow) = bcd_sub(0, value, x);
                self.set_flag(Ccr::C, borrow);
                self.set_flag(Ccr::X, borrow);
                if result != 0 {
                    self.set_flag(Ccr::Z, false);
                }
                self.write_ea(dst, Size::Byte, result as u32)
            }

            Instr::Chk { reg, src } => {
                let bound = self.read_ea(src, Size::Word)? as u16 as i16;
                let value = self.d[reg] as u16 as i16;
                if value < 0 || value > bound {
                    self.set_flag(Ccr::N, value < 0);
                    return self.exception(6);
                }
                Ok(())
            }

            Instr::Link { reg, displacement } => {
                let value = self.a[reg];
                self.push32(value)?;
                self.a[reg] = self.a[7];
                self.a[7] = (self.a[7] as i32).wrapping_add(displacement as i32) as u32;
                Ok(())
            }
            Instr::Unlk { reg } => {
                self.a[7] = self.a[reg];
                self.a[reg] = self.pop32()?;
                Ok(())
            }
            Instr::MoveToUsp { reg } => {
                let value = self.a[reg];
                self.set_user_sp(value);
                Ok(())
            }
            Instr::MoveFromUsp { reg } => {
                self.a[reg] = self.user_sp();
                Ok(())
            }

            Instr::Stop { sr } => {
                self.set_sr(sr);
                self.set_stopped(true);
                Ok(())
            }
            Instr::Rte => {
                let sr = self.pop16()?;
                self.pc = self.pop32()?;
                self.set_sr(sr);
                Ok(())
            }
            Instr::Rts => self.return_subroutine(),
            Instr::Rtr => {
                let ccr = self.pop16()?;
                self.pc = self.pop32()?;
                self.set_sr((self.sr & 0xFF00) | (ccr & 0xFF));
                Ok(())
            }
            Instr::Trapv => {
                if self.flag(Ccr::V) {
                    return self.exception(7);
                }
                Ok(())
            }
            Instr::Trap { vector } => self.exception(32 + vector as u32),

            Instr::Jsr { address } => {
                let return_address = self.pc;
                self.push32(return_address)?;
                self.pc = address;
                Ok(())
            }
            Instr::Jmp { address } => {
                self.pc = address;
                Ok(())
            }

            Instr::AddSubQ { subtract, size, data, dst } => {
                if let Ea::AddrReg(reg) = dst {
                    // Address destinations take the full register, no flags.
                    self.a[reg] = if subtract {
                        self.a[reg].wrapping_sub(data)
                    } else {
                        self.a[reg].wrapping_add(data)
                    };
                    return Ok(());
                }
                let value = self.read_ea(dst, size)?;
                let result = if subtract {
                    self.sub_with_flags(value, data, false, size, false, false)
                } else {
                    self.add_with_flags(value, data, false, size, false)
                };
                self.write_ea(dst, size, result)
            }

            Instr::Scc { condition, dst } => {
                let value = if self.condition(condition) { 0xFF } else { 0x00 };
                self.write_ea(dst, Size::Byte, value)
            }
            Instr::Dbcc { condition, reg, target } => {
                if !self.condition(condition) {
                    let counter = (self.d[reg] as u16).wrapping_sub(1);
                    self.d[reg] = (self.d[reg] & 0xFFFF_0000) | counter as u32;
                    if counter != 0xFFFF {
                        self.pc = target;
                    }
                }
                Ok(())
            }
            Instr::Bra { target } => {
                self.pc = target;
                Ok(())
            }
            Instr::Bsr { target } => {
                let return_address = self.pc;
                self.push32(return_address)?;
                self.pc = target;
                Ok(())
            }
            Instr::Bcc { condition, target } => {
                if self.condition(condition) {
                    self.pc = target;
                }
                Ok(())
            }
            Instr::Moveq { reg, data } => {
                self.d[reg] = data as i32 as u32;
                self.logic_flags(self.d[reg], Size::Long);
                Ok(())
            }

            Instr::Alu { op, size, reg, to_ea, ea } => {
                let reg_value = self.d[reg] & size.mask();
                let ea_value = self.read_ea(ea, size)?;
                let (dst_value, src_value) =
                    if to_ea { (ea_value, reg_value) } else { (reg_value, ea_value) };
                let result = match op {
                    AluKind::Or => {
                        let result = dst_value | src_value;
                        self.logic_flags(result, size);
                        result
                    }
                    AluKind::And => {
                        let result = dst_value & src_value;
                        self.logic_flags(result, size);
                        result
                    }
                    AluKind::Eor => {
                        let result = dst_value ^ src_value;
                        self.logic_flags(result, size);
                        result
                    }
                    AluKind::Add => self.add_with_flags(dst_value, src_value, false, size, false),
                    AluKind::Sub => self.sub_with_flags(dst_value, src_value, false, size, false, false),
                    AluKind::Cmp => {
                        self.sub_with_flags(dst_value, src_value, false, size, true, false);
                        return Ok(());
                    }
                };
                if to_ea {
                    self.write_ea(ea, size, result)
                } else {
                    self.d[reg] = (self.d[reg] & !size.mask()) | result;
                    Ok(())
                }
            }

            Instr::AddrAlu { op, size, reg, src } => {
                let value = size.sign_extend(self.read_ea(src, size)?) as u32;
                match op {
                    AluKind::Add => self.a[reg] = self.a[reg].wrapping_add(value),
                    AluKind::Sub => self.a[reg] = self.a[reg].wrapping_sub(value),
                    _ => {
                        // CMPA compares the full register, no X.
                        self.sub_with_flags(self.a[reg], value, false, Size::Long, true, false);
                    }
                }
                Ok(())
            }

            Instr::AddSubX { subtract, size, rx, ry, memory } => {
                let x = self.flag(Ccr::X);
                if memory {
                    let step = if ry == 7 && size == Size::Byte { 2 } else { size.bytes() };
                    self.a[ry] = self.a[ry].wrapping_sub(step);
                    let src = self.read_ea(Ea::Mem(self.a[ry]), size)?;
                    let step = if rx == 7 && size == Size::Byte { 2 } else { size.bytes() };
                    self.a[rx] = self.a[rx].wrapping_sub(step);
                    let dst_addr = self.a[rx];
                    let dst = self.read_ea(Ea::Mem(dst_addr), size)?;
                    let result = if subtract {
                        self.sub_with_flags(dst, src, x, size, false, true)
                    } else {
                        self.add_with_flags(dst, src, x, size, true)
                    };
                    self.write_ea(Ea::Mem(dst_addr), size, result)
                } else {
                    let src = self.d[ry] & size.mask();
                    let dst = self.d[rx] & size.mask();
                    let result = if subtract {
                        self.sub_with_flags(dst, src, x, size, false, true)
                    } else {
                        self.add_with_flags(dst, src, x, size, true)
                    };
                    self.d[rx] = (self.d[rx] & !size.mask()) | result;
                    Ok(())
                }
            }

            Instr::Cmpm { size, ax, ay } => {
                let step = |reg: usize| {
                    if reg == 7 && size == Size::Byte {
                        2
                    } else {
                        size.bytes()
                    }
                };
                let src_addr = self.a[ay];
                self.a[ay] = self.a[ay].wrapping_add(step(ay));
                let src = self.read_ea(Ea::Mem(src_addr), size)?;
                let dst_addr = self.a[ax];
                self.a[ax] = self.a[ax].wrapping_add(step(ax));
                let dst = self.read_ea(Ea::Mem(dst_addr), size)?;
                self.sub_with_flags(dst, src, false, size, true, false);
                Ok(())
            }

            Instr::Abcd { rx, ry, memory } | Instr::Sbcd { rx, ry, memory } => {
                let subtract = matches!(instr, Instr::Sbcd { .. });
                let x = self.flag(Ccr::X) as u8;
                let (dst, src, dst_ea) = if memory {
                    self.a[ry] = self.a[ry].wrapping_sub(1);
                    let src = self.read8(self.a[ry])?;
                    self.a[rx] = self.a[rx].wrapping_sub(1);
                    let dst = self.read8(self.a[rx])?;
                    (dst, src, Some(self.a[rx]))
                } else {
                    (self.d[rx] as u8, self.d[ry] as u8, None)
                };
                let (result, carry) =
                    if subtract { bcd_sub(dst, src, x) } else { bcd_add(dst, src, x) };
                self.set_flag(Ccr::C, carry);
                self.set_flag(Ccr::X, carry);
                if result != 0 {
                    self.set_flag(Ccr::Z, false);
                }
                match dst_ea {
                    Some(address) => self.write8(address, result),
                    None => {
                        self.d[rx] = (self.d[rx] & !0xFF) | result as u32;
                        Ok(())
                    }
                }
            }

            Instr::Exg { mode, rx, ry } => {
                match mode {
                    0x08 => self.d.swap(rx, ry),
                    0x09 => self.a.swap(rx, ry),
                    _ => std::mem::swap(&mut self.d[rx], &mut self.a[ry]),
                }
                Ok(())
            }

            Instr::Mul { signed, reg, src } => {
                let factor = self.read_ea(src, Size::Word)?;
                let result = if signed {
                    ((self.d[reg] as u16 as i16 as i32) * (factor as u16 as i16 as i32)) as u32
                } else {
                    (self.d[reg] as u16 as u32).wrapping_mul(factor as u16 as u32)
                };
                self.d[reg] = result;
                self.logic_flags(result, Size::Long);
                Ok(())
            }

            Instr::Div { signed, reg, src } => {
                let divisor = self.read_ea(src, Size::Word)?;
                if divisor & 0xFFFF == 0 {
                    return self.exception(5);
                }
                if signed {
                    let dividend = self.d[reg] as i32;
                    let divisor = divisor as u16 as i16 as i32;
                    let quotient = dividend / divisor;
                    let remainder = dividend % divisor;
                    if quotient > i16::MAX as i32 || quotient < i16::MIN as i32 {
                        self.set_flag(Ccr::V, true);
                        self.set_flag(Ccr::C, false);
                        return Ok(());
                    }
                    self.d[reg] = ((remainder as u16 as u32) << 16) | (quotient as u16 as u32);
                    self.set_nz(quotient as u32, Size::Word);
                } else {
                    let dividend = self.d[reg];
                    let divisor = divisor & 0xFFFF;
                    let quotient = dividend / divisor;
                    let remainder = dividend % divisor;
                    if quotient > 0xFFFF {
                        self.set_flag(Ccr::V, true);
                        self.set_flag(Ccr::C, false);
                        return Ok(());
                    }
                    self.d[reg] = (remainder << 16) | quotient;
                    self.set_nz(quotient, Size::Word);
                }
                self.set_flag(Ccr::V, false);
                self.set_flag(Ccr::C, false);
                Ok(())
            }

            Instr::ShiftReg { kind, left, size, reg, count } => {
                let count = match count {
                    ShiftCount::Fixed(n) => n,
                    ShiftCount::Reg(n) => self.d[n] % 64,
                };
                let value = self.d[reg] & size.mask();
                let result = self.shift(kind, left, size, value, count);
                self.d[reg] = (self.d[reg] & !size.mask()) | result;
                Ok(())
            }
            Instr::ShiftMem { kind, left, address } => {
                let value = self.read_ea(Ea::Mem(address), Size::Word)?;
                let result = self.shift(kind, left, Size::Word, value, 1);
                self.write_ea(Ea::Mem(address), Size::Word, result)
            }
        }
    }

    /// One shift/rotate family member, `count` steps. Stepwise so that the
    /// C/X/V semantics fall out of the definitions.
    fn shift(&mut self, kind: ShiftKind, left: bool, size: Size, value: u32, count: u32) -> u32 {
        let msb = size.msb();
        let mask = size.mask();
        let mut result = value & mask;
        let mut overflow = false;
        let mut carry = false;

        for _ in 0..count {
            match (kind, left) {
                (ShiftKind::Arithmetic, true) | (ShiftKind::Logical, true) => {
                    carry = result & msb != 0;
                    let shifted = (result << 1) & mask;
                    if kind == ShiftKind::Arithmetic && (shifted & msb != 0) != (result & msb != 0) {
                        overflow = true;
                    }
                    result = shifted;
                    self.set_flag(Ccr::X, carry);
                }
                (ShiftKind::Arithmetic, false) => {
                    carry = result & 1 != 0;
                    let sign = result & msb;
                    result = (result >> 1) | sign;
                    self.set_flag(Ccr::X, carry);
                }
                (ShiftKind::Logical, false) => {
                    carry = result & 1 != 0;
                    result >>= 1;
                    self.set_flag(Ccr::X, carry);
                }
                (ShiftKind::Rotate, true) => {
                    carry = result & msb != 0;
                    result = ((result << 1) | carry as u32) & mask;
                }
                (ShiftKind::Rotate, false) => {
                    carry = result & 1 != 0;
                    result = (result >> 1) | if carry { msb } else { 0 };
                }
                (ShiftKind::RotateExtend, true) => {
                    let x = self.flag(Ccr::X);
                    carry = result & msb != 0;
                    result = ((result << 1) | x as u32) & mask;
                    self.set_flag(Ccr::X, carry);
                }
                (ShiftKind::RotateExtend, false) => {
                    let x = self.flag(Ccr::X);
                    carry = result & 1 != 0;
                    result = (result >> 1) | if x { msb } else { 0 };
                    self.set_flag(Ccr::X, carry);
                }
            }
        }

        self.set_nz(result, size);
        self.set_flag(Ccr::V, kind == ShiftKind::Arithmetic && left && overflow);
        if count == 0 {
            // A zero count clears C (X is untouched); rotates always do.
            self.set_flag(Ccr::C, if kind == ShiftKind::RotateExtend { self.flag(Ccr::X) } else { false });
        } else {
            self.set_flag(Ccr::C, carry);
        }
        result
    }

    fn movem(&mut self, size: Size, to_memory: bool, mask: u16, ea: MovemEa) -> Result<()> {
        let step = size.bytes();

        let read_reg = |cpu: &Cpu, index: usize| {
            if index < 8 {
                cpu.d[index]
            } else {
                cpu.a[index - 8]
            }
        };
        let write_reg = |cpu: &mut Cpu, index: usize, value: u32| {
            if index < 8 {
                cpu.d[index] = value;
            } else {
                cpu.a[index - 8] = value;
            }
        };

        match ea {
            MovemEa::PreDec(reg) => {
                // Mask bit 0 is A7, bit 15 is D0; stored descending.
                let mut address = self.a[reg];
                for bit in 0..16 {
                    if mask & (1 << bit) == 0 {
                        continue;
                    }
                    let index = 15 - bit;
                    address = address.wrapping_sub(step);
                    let value = read_reg(self, index);
                    match size {
                        Size::Word => self.write16(address, value as u16)?,
                        _ => self.write32(address, value)?,
                    }
                }
                self.a[reg] = address;
                Ok(())
            }
            MovemEa::PostInc(reg) => {
                let mut address = self.a[reg];
                for bit in 0..16 {
                    if mask & (1 << bit) == 0 {
                        continue;
                    }
                    let value = match size {
                        Size::Word => self.read16(address)? as i16 as i32 as u32,
                        _ => self.read32(address)?,
                    };
                    write_reg(self, bit, value);
                    address = address.wrapping_add(step);
                }
                self.a[reg] = address;
                Ok(())
            }
            MovemEa::Control(base) => {
                let mut address = base;
                for bit in 0..16 {
                    if mask & (1 << bit) == 0 {
                        continue;
                    }
                    if to_memory {
                        let value = read_reg(self, bit);
                        match size {
                            Size::Word => self.write16(address, value as u16)?,
                            _ => self.write32(address, value)?,
                        }
                    } else {
                        let value = match size {
                            Size::Word => self.read16(address)? as i16 as i32 as u32,
                            _ => self.read32(address)?,
                        };
                        write_reg(self, bit, value);
                    }
                    address = address.wrapping_add(step);
                }
                Ok(())
            }
        }
    }
}

/// Packed BCD add with carry-in; returns (result, carry).
fn bcd_add(dst: u8, src: u8, extend: u8) -> (u8, bool) {
    let mut low = (dst & 0xF) + (src & 0xF) + extend;
    let mut carry = 0;
    if low > 9 {
        low -= 10;
        carry = 1;
    }
    let mut high = (dst >> 4) + (src >> 4) + carry;
    let carry_out = high > 9;
    if carry_out {
        high -= 10;
    }
    ((high << 4) | low, carry_out)
}

/// Packed BCD subtract with borrow-in; returns (result, borrow).
fn bcd_sub(dst: u8, src: u8, extend: u8) -> (u8, bool) {
    let mut low = (dst & 0xF) as i8 - (src & 0xF) as i8 - extend as i8;
    let mut borrow = 0;
    if low < 0 {
        low += 10;
        borrow = 1;
    }
    let mut high = (dst >> 4) as i8 - (src >> 4) as i8 - borrow;
    let borrow_out = high < 0;
    if borrow_out {
        high += 10;
    }
    (((high as u8) << 4) | low as u8, borrow_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memmap::{SystemMemory, HEAP_START, STACK_START};

    fn cpu_with(program: &[u16]) -> Cpu {
        let memory = SystemMemory::new();
        let mut cpu = Cpu::new(memory);
        cpu.init(HEAP_START + 0x200);
        for (index, word) in program.iter().enumerate() {
            cpu.memory()
                .region()
                .write_u16(HEAP_START as usize + 0x200 + index * 2, *word)
                .unwrap();
        }
        cpu
    }

    #[test]
    fn moveq_and_flags() {
        let mut cpu = cpu_with(&[0x70FF]); // MOVEQ #-1,D0
        cpu.step().unwrap();
        assert_eq!(cpu.d[0], 0xFFFF_FFFF);
        assert!(cpu.flag(Ccr::N));
        assert!(!cpu.flag(Ccr::Z));
    }

    #[test]
    fn move_long_through_memory() {
        // MOVE.L #$11223344,D1 ; MOVE.L D1,$address ; MOVE.L $address,D2
        let address = HEAP_START + 0x400;
        let mut cpu = cpu_with(&[
            0x223C, 0x1122, 0x3344, // MOVE.L #imm,D1
            0x23C1, (address >> 16) as u16, address as u16, // MOVE.L D1,(addr).L
            0x2439, (address >> 16) as u16, address as u16, // MOVE.L (addr).L,D2
        ]);
        cpu.step().unwrap();
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.d[2], 0x1122_3344);
        assert_eq!(cpu.memory().region().read_u32(address as usize).unwrap(), 0x1122_3344);
    }

    #[test]
    fn byte_moves_only_touch_the_low_byte() {
        let mut cpu = cpu_with(&[0x1401]); // MOVE.B D1,D2
        cpu.d[1] = 0xAB;
        cpu.d[2] = 0x1234_5678;
        cpu.step().unwrap();
        assert_eq!(cpu.d[2], 0x1234_56AB);
    }

    #[test]
    fn add_sets_carry_and_overflow() {
        let mut cpu = cpu_with(&[0xD240, 0xD240]); // ADD.W D0,D1 twice
        cpu.d[0] = 0x7FFF;
        cpu.d[1] = 0x0001;
        cpu.step().unwrap();
        assert_eq!(cpu.d[1] & 0xFFFF, 0x8000);
        assert!(cpu.flag(Ccr::V));
        assert!(cpu.flag(Ccr::N));
        assert!(!cpu.flag(Ccr::C));

        cpu.d[0] = 0xFFFF;
        cpu.step().unwrap();
        assert_eq!(cpu.d[1] & 0xFFFF, 0x7FFF);
        assert!(cpu.flag(Ccr::C));
        assert!(cpu.flag(Ccr::X));
    }

    #[test]
    fn sub_and_cmp_flags() {
        let mut cpu = cpu_with(&[0xB240]); // CMP.W D0,D1
        cpu.d[0] = 5;
        cpu.d[1] = 5;
        cpu.step().unwrap();
        assert!(cpu.flag(Ccr::Z));
        assert!(!cpu.flag(Ccr::C));
    }

    #[test]
    fn postincrement_and_predecrement() {
        let base = HEAP_START + 0x500;
        let mut cpu = cpu_with(&[]);
        cpu.a[0] = base;
        let ea = cpu.ea(3, 0, Size::Word).unwrap();
        assert_eq!(ea, Ea::Mem(base));
        assert_eq!(cpu.a[0], base + 2);
        let ea = cpu.ea(4, 0, Size::Word).unwrap();
        assert_eq!(ea, Ea::Mem(base));
        assert_eq!(cpu.a[0], base);
        // Byte-sized A7 keeps word alignment.
        cpu.a[7] = STACK_START;
        cpu.ea(4, 7, Size::Byte).unwrap();
        assert_eq!(cpu.a[7], STACK_START - 2);
    }

    #[test]
    fn jsr_rts_round_trip() {
        let target = HEAP_START + 0x600;
        let mut cpu = cpu_with(&[0x4EB9, (target >> 16) as u16, target as u16]); // JSR (target).L
        let return_address = cpu.pc + 6;
        cpu.memory().region().write_u16(target as usize, 0x4E75).unwrap(); // RTS
        cpu.step().unwrap();
        assert_eq!(cpu.pc, target);
        cpu.step().unwrap();
        assert_eq!(cpu.pc, return_address);
    }

    #[test]
    fn bsr_and_bcc_branching() {
        let mut cpu = cpu_with(&[0x6702, 0x7001, 0x7002]); // BEQ +2 ; MOVEQ #1,D0 ; MOVEQ #2,D0
        cpu.set_flag(Ccr::Z, true);
        cpu.step().unwrap(); // takes the branch over MOVEQ #1
        cpu.step().unwrap();
        assert_eq!(cpu.d[0], 2);
    }

    #[test]
    fn dbf_counts_down() {
        // MOVEQ #2,D0 ; DBF D0,-2 (loops until D0 wraps past 0)
        let mut cpu = cpu_with(&[0x7002, 0x51C8, 0xFFFE]);
        cpu.step().unwrap();
        let mut steps = 0;
        while cpu.d[0] as u16 != 0xFFFF && steps < 10 {
            cpu.step().unwrap();
            steps += 1;
        }
        assert_eq!(cpu.d[0] as u16, 0xFFFF);
        assert_eq!(steps, 3);
    }

    #[test]
    fn movem_predecrement_round_trip() {
        let mut cpu = cpu_with(&[
            0x48E7, 0xC000, // MOVEM.L D0-D1,-(A7)
            0x4CDF, 0x0003, // MOVEM.L (A7)+,D0-D1
        ]);
        cpu.d[0] = 0x1111_1111;
        cpu.d[1] = 0x2222_2222;
        let sp = cpu.a[7];
        cpu.step().unwrap();
        assert_eq!(cpu.a[7], sp - 8);
        cpu.d[0] = 0;
        cpu.d[1] = 0;
        cpu.step().unwrap();
        assert_eq!(cpu.a[7], sp);
        assert_eq!(cpu.d[0], 0x1111_1111);
        assert_eq!(cpu.d[1], 0x2222_2222);
    }

    #[test]
    fn link_and_unlk() {
        let mut cpu = cpu_with(&[0x4E56, 0xFFF8, 0x4E5E]); // LINK A6,#-8 ; UNLK A6
        let sp = cpu.a[7];
        cpu.a[6] = 0xCAFE;
        cpu.step().unwrap();
        assert_eq!(cpu.a[6], sp - 4);
        assert_eq!(cpu.a[7], sp - 12);
        cpu.step().unwrap();
        assert_eq!(cpu.a[7], sp);
        assert_eq!(cpu.a[6], 0xCAFE);
    }

    #[test]
    fn lsl_shifts_and_carries() {
        let mut cpu = cpu_with(&[0xE348]); // LSL.W #1,D0
        cpu.d[0] = 0x8001;
        cpu.step().unwrap();
        assert_eq!(cpu.d[0] & 0xFFFF, 0x0002);
        assert!(cpu.flag(Ccr::C));
        assert!(cpu.flag(Ccr::X));
    }

    #[test]
    fn mul_and_div() {
        let mut cpu = cpu_with(&[0xC0C1, 0x82C2]); // MULU D1,D0 ; DIVU D2,D1
        cpu.d[0] = 7;
        cpu.d[1] = 6;
        cpu.step().unwrap();
        assert_eq!(cpu.d[0], 42);

        cpu.d[1] = 100;
        cpu.d[2] = 7;
        cpu.step().unwrap();
        // quotient 14, remainder 2.
        assert_eq!(cpu.d[1] & 0xFFFF, 14);
        assert_eq!(cpu.d[1] >> 16, 2);
    }

    #[test]
    fn trap_vectors_through_the_ivt() {
        let handler = HEAP_START + 0x700;
        let mut cpu = cpu_with(&[0x4E41]); // TRAP #1
        cpu.memory().region().write_u32((32 + 1) * 4, handler).unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.pc, handler);
        // SR and the return address are on the supervisor stack.
        assert_eq!(cpu.a[7], STACK_START - 6);
    }
}
