// The trap dispatcher. Entry runs after the A-line exception's RTE has
// restored PC and SR, so the stack the dispatcher sees is the post-return
// stack: it pushes the return address itself, saves the registers an OS trap
// must preserve, consults the patch table, and finally either calls a native
// handler or jumps into patched emulated code.

pub mod names;
pub mod stack;
mod system;
mod toolbox;

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::cpu::NativeCall;
use crate::errors::Result;
use crate::memmap;
use crate::Core;

pub fn is_toolbox(trap: u16) -> bool {
    // Bit 11 selects Toolbox; OS traps have it clear.
    (trap >> 11) & 1 == 1
}

pub fn is_system(trap: u16) -> bool {
    !is_toolbox(trap)
}

/// The 10-bit (Toolbox) or 8-bit (OS) trap index.
pub fn extract_index(trap: u16) -> u16 {
    if is_toolbox(trap) {
        trap & 0x03FF
    } else {
        trap & 0x00FF
    }
}

/// Bit 10 of a Toolbox trap: called through a glue subroutine, so the
/// dispatcher must return to the glue's caller instead.
pub fn is_auto_pop_set(trap: u16) -> bool {
    is_toolbox(trap) && (trap >> 10) & 1 == 1
}

/// Bit 8 of an OS trap: clear means A0 is saved and restored around the
/// handler.
pub fn should_save_a0(trap: u16) -> bool {
    is_system(trap) && (trap >> 8) & 1 == 0
}

#[derive(Default)]
pub struct TrapState {
    /// Traps redirected to emulated code by SetTrapAddress or PACK loading.
    pub patches: BTreeMap<u16, u32>,
    /// Accumulates framed shapes between OpenRgn and CloseRgn.
    pub region_recording: Option<crate::graphics::region::OwnedRegion>,
    /// The File Manager's single scratch "file".
    pub file_scratch: Vec<u8>,
    pub file_position: usize,
}

impl Core {
    /// Plants the trap machinery into emulated memory: the exit routine
    /// (`TST.W D0` + native return), one RTS word per trap slot (each also
    /// registered as a native stub so patches can chain to the original),
    /// and the legacy entry word.
    pub fn install_trap_stubs(&mut self) -> Result<()> {
        let region = self.memory.region().clone();

        region.write_u16(memmap::TRAP_ENTRY_ADDRESS as usize, 0x4E75 /* RTS */)?;
        region.write_u32(0x28, memmap::TRAP_ENTRY_ADDRESS)?;

        region.write_u16(memmap::TRAP_EXIT_ADDRESS as usize, 0x4A40 /* TST.W D0 */)?;
        // The native exit must run after the TST.W has executed.
        self.cpu.register_native(memmap::TRAP_EXIT_ADDRESS + 2, NativeCall::TrapExit)?;

        for index in 0..1024u16 {
            let address = memmap::TOOLBOX_TRAP_STUBS + index as u32 * 2;
            region.write_u16(address as usize, 0x4E75)?;
            self.cpu.register_native(address, NativeCall::ToolboxStub(index))?;
        }
        for index in 0..256u16 {
            let address = memmap::SYSTEM_TRAP_STUBS + index as u32 * 2;
            region.write_u16(address as usize, 0x4E75)?;
            self.cpu.register_native(address, NativeCall::SystemStub(index))?;
        }
        Ok(())
    }

    /// Trap entry: PC still addresses the A-line instruction. Classifies the
    /// opcode, arranges the stack per convention, then dispatches.
    pub fn trap_entry(&mut self) -> Result<()> {
        let mut ip = self.cpu.pc;
        let mut trap_op = self.memory.region().read_u16(ip as usize)?;

        if is_auto_pop_set(trap_op) {
            trap_op &= !(1 << 10);
            // Called through glue: return to the glue's caller.
            ip = self.cpu.pop32()?;
        } else {
            // Resume past the 16-bit A-line word.
            ip += 2;
        }

        debug!(
            "A-Line {}::{} (0x{:04x}) index {}",
            if is_toolbox(trap_op) { "Toolbox" } else { "OS" },
            names::trap_name(trap_op),
            trap_op,
            extract_index(trap_op)
        );

        self.cpu.push32(ip)?;

        if is_system(trap_op) {
            if should_save_a0(trap_op) {
                let a0 = self.cpu.a[0];
                self.cpu.push32(a0)?;
            }
            let (a1, d1, d2) = (self.cpu.a[1], self.cpu.d[1], self.cpu.d[2]);
            self.cpu.push32(a1)?;
            self.cpu.push32(d1)?;
            self.cpu.push32(d2)?;
            // Exit reads the opcode back out of D1 to know what to restore.
            self.cpu.d[1] = trap_op as u32;
        }

        if let Some(&patched) = self.traps.patches.get(&trap_op) {
            debug!(
                "patched trap {} (0x{:04x}) -> 0x{:x}",
                names::trap_name(trap_op),
                trap_op,
                patched
            );
            // Patched OS traps still have to land on the exit routine so
            // the registers above are restored; pushing it fakes a JSR.
            if is_system(trap_op) {
                self.cpu.push32(memmap::TRAP_EXIT_ADDRESS)?;
            }
            self.cpu.pc = patched;
            return Ok(());
        }

        self.trap_dispatch(extract_index(trap_op), is_toolbox(trap_op))?;

        if is_system(trap_op) {
            self.cpu.pc = memmap::TRAP_EXIT_ADDRESS;
            return Ok(());
        }
        let return_address = self.cpu.pop32()?;
        // LoadSeg legitimately rewinds the return address so the patched
        // jump-table entry re-executes.
        if return_address != ip && trap_op != names::LOAD_SEG {
            warn!(
                "toolbox trap returned to 0x{:x}, expected 0x{:x}",
                return_address, ip
            );
        }
        self.cpu.pc = return_address;
        Ok(())
    }

    /// Trap exit (after `TST.W D0`): restores the saved registers, then
    /// returns to the address the entry pushed.
    pub fn trap_exit(&mut self) -> Result<()> {
        let trap_op = self.cpu.d[1] as u16;
        self.cpu.d[2] = self.cpu.pop32()?;
        self.cpu.d[1] = self.cpu.pop32()?;
        self.cpu.a[1] = self.cpu.pop32()?;
        if should_save_a0(trap_op) {
            self.cpu.a[0] = self.cpu.pop32()?;
        }
        self.cpu.return_subroutine()
    }

    /// A trap-table stub was called (patched code chaining to the original
    /// handler): dispatch and emulate the stub's RTS.
    pub fn trap_stub(&mut self, index: u16, toolbox: bool) -> Result<()> {
        self.trap_dispatch(index, toolbox)?;
        self.cpu.return_subroutine()
    }

    /// Runs the native handler for a trap index. The return address comes
    /// off the stack first so handlers see their arguments on top, and goes
    /// back afterwards (LoadSeg rewinds it to re-run the patched entry).
    fn trap_dispatch(&mut self, index: u16, toolbox: bool) -> Result<()> {
        let trap_op = if toolbox {
            0xA800 | index
        } else {
            let held = self.cpu.d[1] as u16;
            if extract_index(held) == index && is_system(held) {
                held
            } else {
                0xA000 | index
            }
        };

        let mut return_address = self.cpu.pop32()?;

        if trap_op == names::LOAD_SEG {
            let segment_id = self.cpu.pop16()?;
            debug!("LoadSeg({})", segment_id);
            self.load_segment_trap(segment_id, &mut return_address)?;
        } else if !self.internal_dispatch(trap_op)? {
            if toolbox {
                self.dispatch_toolbox_trap(trap_op)?;
            } else {
                self.dispatch_system_trap(trap_op)?;
            }
        }

        self.cpu.push32(return_address)
    }

    /// The current dispatch target for `trap`: a patch if installed, else
    /// the trap's native stub.
    pub fn trap_address(&self, trap: u16) -> u32 {
        if trap == names::UNIMPLEMENTED {
            return 0;
        }
        if let Some(&address) = self.traps.patches.get(&trap) {
            return address;
        }
        if is_toolbox(trap) {
            memmap::TOOLBOX_TRAP_STUBS + extract_index(trap) as u32 * 2
        } else {
            memmap::SYSTEM_TRAP_STUBS + extract_index(trap) as u32 * 2
        }
    }

    /// Installs (or, when pointed back at a stub, removes) a trap patch.
    pub fn set_trap_patch(&mut self, trap: u16, address: u32) {
        if address >= memmap::TOOLBOX_TRAP_STUBS && address < memmap::TRAP_EXIT_ADDRESS {
            self.traps.patches.remove(&trap);
            return;
        }
        debug!("patch trap {} (0x{:04x}) -> 0x{:x}", names::trap_name(trap), trap, address);
        self.traps.patches.insert(trap, address);
    }

    /// Traps that manage the dispatcher itself. Returns true when handled.
    fn internal_dispatch(&mut self, trap_op: u16) -> Result<bool> {
        match trap_op {
            names::GET_OS_TRAP_ADDRESS => {
                let index = extract_index(self.cpu.d[0] as u16 & 0xFF);
                self.cpu.a[0] = self.trap_address(0xA000 | index);
                Ok(true)
            }
            names::GET_TOOLBOX_TRAP_ADDRESS => {
                let index = self.cpu.d[0] as u16 & 0x3FF;
                self.cpu.a[0] = self.trap_address(0xA800 | index);
                Ok(true)
            }
            names::GET_TRAP_ADDRESS => {
                let mut trap = self.cpu.d[0] as u16;
                if trap < 0xFF {
                    // Trap numbers $00-$4F, $54 and $57 live in the OS
                    // table; everything else low is Toolbox.
                    let in_system = trap < 0x4F || trap == 0x54 || trap == 0x57;
                    if !in_system {
                        trap |= 1 << 11;
                    }
                    trap |= 0xA000;
                }
                self.cpu.a[0] = self.trap_address(trap);
                Ok(true)
            }
            names::SET_TRAP_ADDRESS | names::SET_TOOLBOX_TRAP_ADDRESS => {
                let address = self.cpu.a[0];
                let trap = self.cpu.d[0] as u16;
                self.set_trap_patch(trap, address);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
