// The CPU host: a 68000 interpreter driven in timeslices, with a registry of
// addresses that hand control to native code. The decoder and executor live
// in `decode`/`exec`; this module owns the register file, the exception
// machinery, and the timeslice protocol the rest of the emulator builds on.
//
// Native functions work by planting a `NOP` at a registered address. The
// per-instruction hook notices the program counter reaching such an address,
// lets that one instruction execute, then ends the timeslice so the host can
// run the registered call. At most one native call is pending at a time.

mod decode;
mod exec;

pub use decode::{Ea, Instr, MovemEa, ShiftCount, ShiftKind, Size};

use std::collections::BTreeMap;

use log::warn;

use crate::errors::{EmuError, Result};
use crate::memmap::{self, SystemMemory};

/// Condition-code register bit positions within the status register.
#[derive(Debug, Clone, Copy)]
pub enum Ccr {
    C = 0,
    V = 1,
    Z = 2,
    N = 3,
    X = 4,
    S = 13,
}

/// What the host should invoke when a registered address is reached. A sum
/// type rather than stored closures keeps the CPU decoupled from the trap
/// machinery that interprets these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCall {
    /// The A-line exception handler (an `RTE` planted in the system heap).
    TrapEntry,
    /// The tail of the trap exit routine, after its `TST.W D0`.
    TrapExit,
    /// A one-word Toolbox trap stub, by trap index.
    ToolboxStub(u16),
    /// A one-word OS trap stub, by trap index.
    SystemStub(u16),
}

/// Why `run_timeslice` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimesliceEnd {
    /// The instruction quantum was exhausted (or the CPU is stopped).
    Quantum,
    /// A registered native address was reached; the caller must invoke it.
    Native(NativeCall),
}

pub struct Cpu {
    pub d: [u32; 8],
    /// Address registers; `a[7]` is always the active stack pointer.
    pub a: [u32; 8],
    /// The inactive stack pointer (USP while in supervisor mode).
    other_sp: u32,
    pub pc: u32,
    pub sr: u16,
    /// Logs every executed instruction's address and opcode word.
    pub trace: bool,
    stopped: bool,
    memory: SystemMemory,
    native: BTreeMap<u32, NativeCall>,
}

impl Cpu {
    pub fn new(memory: SystemMemory) -> Self {
        Cpu {
            d: [0; 8],
            a: [0; 8],
            other_sp: 0,
            pc: 0,
            sr: 0,
            trace: false,
            stopped: false,
            memory,
            native: BTreeMap::new(),
        }
    }

    /// Initializes registers for Mac OS emulation. Expects the segment
    /// loader to have determined the initial PC and the A5 world position.
    pub fn init(&mut self, pc: u32) {
        self.pc = pc;
        self.a[7] = memmap::STACK_START;
        self.a[5] = self.memory.a5_world();
        // Mac OS always runs in supervisor mode.
        self.sr |= 1 << (Ccr::S as u16);
    }

    pub fn memory(&self) -> &SystemMemory {
        &self.memory
    }

    /// Writes `NOP` at `address` and arranges for `call` to be handed to the
    /// host when the instruction pointer reaches it.
    pub fn register_native(&mut self, address: u32, call: NativeCall) -> Result<()> {
        self.memory.region().write_u16(address as usize, 0x4E71 /* NOP */)?;
        self.native.insert(address, call);
        Ok(())
    }

    /// Wires the A-line exception. The vector at IVT offset 0x28 points at a
    /// subroutine whose first word is `RTE`; once that RTE has restored PC
    /// and SR (to the A-Trap instruction itself), the `TrapEntry` native call
    /// fires exactly once. The stack the dispatcher sees is therefore the
    /// post-return stack, not an exception frame.
    pub fn register_a_trap_handler(&mut self) -> Result<()> {
        self.register_native(memmap::A_TRAP_HANDLER_ADDRESS, NativeCall::TrapEntry)?;
        self.memory.region().write_u32(0x28, memmap::A_TRAP_HANDLER_ADDRESS)?;
        // Replace the NOP written by register_native with the RTE.
        self.memory
            .region()
            .write_u16(memmap::A_TRAP_HANDLER_ADDRESS as usize, 0x4E73 /* RTE */)?;
        Ok(())
    }

    /// Runs until a registered native address is reached or the quantum is
    /// spent. The instruction at a registered address still executes before
    /// the timeslice ends (cf. the RTE above).
    pub fn run_timeslice(&mut self, max_instructions: usize) -> Result<TimesliceEnd> {
        if self.stopped {
            return Ok(TimesliceEnd::Quantum);
        }
        for _ in 0..max_instructions {
            if self.pc == 0 {
                return Err(EmuError::malformed("PC hit the reset vector".to_string()));
            }
            if self.a[7] > memmap::STACK_START || self.a[7] <= memmap::STACK_END {
                warn!("stack pointer 0x{:x} outside the stack bounds", self.a[7]);
            }
            if let Some(&call) = self.native.get(&self.pc) {
                self.step()?;
                return Ok(TimesliceEnd::Native(call));
            }
            self.step()?;
            if self.stopped {
                return Ok(TimesliceEnd::Quantum);
            }
        }
        Ok(TimesliceEnd::Quantum)
    }

    /// Fetches, decodes and executes one instruction.
    pub fn step(&mut self) -> Result<()> {
        let start = self.pc;
        let opcode = self.fetch16()?;
        if self.trace {
            log::trace!("0x{:08x}: 0x{:04x}", start, opcode);
        }
        if opcode & 0xF000 == 0xA000 {
            // Line 1010: the saved PC is the A-line instruction itself so
            // the dispatcher can read the trap word after the RTE returns.
            self.pc = start;
            return self.exception(10);
        }
        let instr = self.decode(opcode).map_err(|err| match err {
            EmuError::IllegalInstruction { opcode, .. } => {
                EmuError::IllegalInstruction { opcode, pc: start }
            }
            other => other,
        })?;
        self.execute(instr)
    }

    pub fn flag(&self, bit: Ccr) -> bool {
        self.sr & (1 << (bit as u16)) != 0
    }

    pub fn set_flag(&mut self, bit: Ccr, value: bool) {
        if value {
            self.sr |= 1 << (bit as u16);
        } else {
            self.sr &= !(1 << (bit as u16));
        }
    }

    pub fn in_supervisor_mode(&self) -> bool {
        self.flag(Ccr::S)
    }

    /// Replaces the status register, swapping the active stack pointer when
    /// the supervisor bit changes.
    pub fn set_sr(&mut self, value: u16) {
        let was_supervisor = self.in_supervisor_mode();
        self.sr = value;
        if was_supervisor != self.in_supervisor_mode() {
            std::mem::swap(&mut self.a[7], &mut self.other_sp);
        }
    }

    pub fn user_sp(&self) -> u32 {
        if self.in_supervisor_mode() {
            self.other_sp
        } else {
            self.a[7]
        }
    }

    pub fn set_user_sp(&mut self, value: u32) {
        if self.in_supervisor_mode() {
            self.other_sp = value;
        } else {
            self.a[7] = value;
        }
    }

    // ---- policy-checked memory accessors -------------------------------

    pub fn read8(&self, address: u32) -> Result<u8> {
        self.memory.check_read(address)?;
        self.memory.region().read_u8(address as usize)
    }

    pub fn read16(&self, address: u32) -> Result<u16> {
        self.memory.check_read(address)?;
        self.memory.region().read_u16(address as usize)
    }

    pub fn read32(&self, address: u32) -> Result<u32> {
        self.memory.check_read(address)?;
        self.memory.region().read_u32(address as usize)
    }

    pub fn write8(&self, address: u32, value: u8) -> Result<()> {
        self.memory.check_write(address, value as u32)?;
        self.memory.region().write_u8(address as usize, value)
    }

    pub fn write16(&self, address: u32, value: u16) -> Result<()> {
        self.memory.check_write(address, value as u32)?;
        self.memory.region().write_u16(address as usize, value)
    }

    pub fn write32(&self, address: u32, value: u32) -> Result<()> {
        self.memory.check_write(address, value)?;
        self.memory.region().write_u32(address as usize, value)
    }

    pub(crate) fn fetch16(&mut self) -> Result<u16> {
        let word = self.read16(self.pc)?;
        self.pc = self.pc.wrapping_add(2);
        Ok(word)
    }

    pub(crate) fn fetch32(&mut self) -> Result<u32> {
        let high = self.fetch16()? as u32;
        let low = self.fetch16()? as u32;
        Ok((high << 16) | low)
    }

    // ---- stack helpers -------------------------------------------------

    pub fn push16(&mut self, value: u16) -> Result<()> {
        self.a[7] = self.a[7].wrapping_sub(2);
        self.write16(self.a[7], value)
    }

    pub fn push32(&mut self, value: u32) -> Result<()> {
        self.a[7] = self.a[7].wrapping_sub(4);
        self.write32(self.a[7], value)
    }

    pub fn pop16(&mut self) -> Result<u16> {
        let value = self.read16(self.a[7])?;
        self.a[7] = self.a[7].wrapping_add(2);
        Ok(value)
    }

    pub fn pop32(&mut self) -> Result<u32> {
        let value = self.read32(self.a[7])?;
        self.a[7] = self.a[7].wrapping_add(4);
        Ok(value)
    }

    /// Emulates `RTS` on behalf of native code: restores the previous PC
    /// from the stack.
    pub fn return_subroutine(&mut self) -> Result<()> {
        self.pc = self.pop32()?;
        Ok(())
    }

    /// Takes an exception: pushes PC and SR, enters supervisor mode and
    /// vectors through the IVT. IVT reads bypass the access policy.
    pub(crate) fn exception(&mut self, vector: u32) -> Result<()> {
        let old_sr = self.sr;
        if !self.in_supervisor_mode() {
            self.set_sr(self.sr | 1 << (Ccr::S as u16));
        }
        self.push32(self.pc)?;
        self.push16(old_sr)?;
        self.pc = self.memory.region().read_u32((vector * 4) as usize)?;
        Ok(())
    }

    pub(crate) fn set_stopped(&mut self, stopped: bool) {
        self.stopped = stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memmap::HEAP_START;

    fn cpu_at(program: &[u16]) -> Cpu {
        let memory = SystemMemory::new();
        let mut cpu = Cpu::new(memory);
        cpu.init(HEAP_START + 0x100);
        for (index, word) in program.iter().enumerate() {
            cpu.memory
                .region()
                .write_u16(HEAP_START as usize + 0x100 + index * 2, *word)
                .unwrap();
        }
        cpu
    }

    #[test]
    fn executes_a_quantum_of_nops() {
        let mut cpu = cpu_at(&[0x4E71, 0x4E71, 0x4E71]);
        let start = cpu.pc;
        assert_eq!(cpu.run_timeslice(3).unwrap(), TimesliceEnd::Quantum);
        assert_eq!(cpu.pc, start + 6);
    }

    #[test]
    fn native_address_ends_the_timeslice_after_executing() {
        let mut cpu = cpu_at(&[0x4E71]);
        let target = cpu.pc + 2;
        cpu.register_native(target, NativeCall::TrapExit).unwrap();
        assert_eq!(
            cpu.run_timeslice(100).unwrap(),
            TimesliceEnd::Native(NativeCall::TrapExit)
        );
        // The NOP at the registered address itself was executed.
        assert_eq!(cpu.pc, target + 2);
    }

    #[test]
    fn a_line_vectors_through_the_rte_and_fires_trap_entry() {
        let mut cpu = cpu_at(&[0xA9F4, 0x4E71]);
        cpu.register_a_trap_handler().unwrap();
        let trap_address = cpu.pc;

        let end = cpu.run_timeslice(100).unwrap();
        assert_eq!(end, TimesliceEnd::Native(NativeCall::TrapEntry));
        // The RTE already restored PC to the A-line instruction and the
        // stack holds no exception frame anymore.
        assert_eq!(cpu.pc, trap_address);
        assert_eq!(cpu.a[7], memmap::STACK_START);
        assert!(cpu.in_supervisor_mode());
    }

    #[test]
    fn stack_helpers_round_trip() {
        let mut cpu = cpu_at(&[]);
        cpu.push32(0xDEADBEEF).unwrap();
        cpu.push16(0x1234).unwrap();
        assert_eq!(cpu.pop16().unwrap(), 0x1234);
        assert_eq!(cpu.pop32().unwrap(), 0xDEADBEEF);
        assert_eq!(cpu.a[7], memmap::STACK_START);
    }
}
