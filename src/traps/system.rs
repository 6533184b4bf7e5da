// OS trap handlers: arguments arrive in registers, results leave in D0 (and
// A0 for allocators). File Manager calls are stubs that report noErr through
// the parameter block, except Read/Write which share one scratch buffer.

use log::{debug, info, warn};

use crate::errors::{EmuError, Result};
use crate::memmap::{self, globals};
use crate::records::{Record, SysEnvRecord};
use crate::Core;

use super::names;

/// Mac OS error codes surfaced to emulated code.
pub const NO_ERR: u32 = 0;
pub const MEM_FULL_ERR: u32 = (-108i32) as u32;

// Parameter-block field offsets (IM: Files).
const IO_RESULT: u32 = 16;
const IO_REF_NUM: u32 = 24;
const IO_BUFFER: u32 = 32;
const IO_REQ_COUNT: u32 = 36;
const IO_ACT_COUNT: u32 = 40;

impl Core {
    pub(crate) fn dispatch_system_trap(&mut self, trap: u16) -> Result<()> {
        match trap {
            // =================== Memory Manager ===================
            names::BLOCK_MOVE | names::BLOCK_MOVE_DATA => {
                let source = self.cpu.a[0];
                let dest = self.cpu.a[1];
                let count = self.cpu.d[0];
                debug!("BlockMove(0x{:x} -> 0x{:x}, {} bytes)", source, dest, count);
                let region = self.memory.region().clone();
                for index in 0..count {
                    let byte = region.read_u8((source + index) as usize)?;
                    region.write_u8((dest + index) as usize, byte)?;
                }
                self.cpu.d[0] = NO_ERR;
                Ok(())
            }
            names::DISPOSE_PTR => {
                debug!("DisposePtr(0x{:x})", self.cpu.a[0]);
                self.cpu.d[0] = NO_ERR;
                Ok(())
            }
            names::GET_HANDLE_SIZE => {
                let handle = self.cpu.a[0];
                self.cpu.d[0] = self.mem.handle_size(handle)?;
                Ok(())
            }
            names::NEW_PTR | names::NEW_PTR_CLEAR | names::NEW_PTR_SYS
            | names::NEW_PTR_SYS_CLEAR => {
                // Allocations are zero-filled and never reused, so the
                // clear/system variants collapse into one path.
                let size = self.cpu.d[0];
                debug!("NewPtr({})", size);
                if self.mem.has_space_for(size) {
                    self.cpu.a[0] = self.mem.allocate(size)?;
                    self.cpu.d[0] = NO_ERR;
                } else {
                    self.cpu.d[0] = MEM_FULL_ERR;
                }
                Ok(())
            }
            names::NEW_HANDLE | names::NEW_HANDLE_CLEAR => {
                let size = self.cpu.d[0];
                debug!("NewHandle({})", size);
                if self.mem.has_space_for(size) {
                    self.cpu.a[0] = self.mem.allocate_handle(size, "NewHandle")?;
                    self.cpu.d[0] = NO_ERR;
                } else {
                    self.cpu.d[0] = MEM_FULL_ERR;
                }
                Ok(())
            }
            names::DISPOSE_HANDLE => {
                self.mem.deallocate(self.cpu.a[0]);
                self.cpu.d[0] = NO_ERR;
                Ok(())
            }
            names::RECOVER_HANDLE => {
                self.cpu.a[0] = self.mem.recover_handle(self.cpu.a[0]);
                Ok(())
            }
            names::H_LOCK | names::H_UNLOCK | names::H_PURGE | names::H_NO_PURGE => {
                // Blocks never move and are never purged, so locking always
                // succeeds.
                self.cpu.d[0] = NO_ERR;
                Ok(())
            }
            names::MAX_APPL_ZONE | names::MORE_MASTERS | names::SET_GROW_ZONE => {
                self.cpu.d[0] = NO_ERR;
                Ok(())
            }
            names::SET_APPL_LIMIT => {
                let limit = self.cpu.a[0];
                debug!("SetApplLimit(0x{:x})", limit);
                self.cpu.d[0] =
                    if self.mem.set_appl_limit(limit)? { NO_ERR } else { MEM_FULL_ERR };
                Ok(())
            }
            names::FREE_MEM => {
                self.cpu.d[0] = self.mem.free_memory();
                Ok(())
            }

            // =================== Event Manager ===================
            names::FLUSH_EVENTS => {
                let mask = self.cpu.d[0] as u16;
                debug!("FlushEvents(0b{:016b})", mask);
                self.events.flush_events(mask);
                self.cpu.d[0] = NO_ERR;
                Ok(())
            }
            names::POST_EVENT => {
                let what = self.cpu.a[0] as u16;
                let message = self.cpu.d[0];
                debug!("PostEvent({}, 0x{:x})", what, message);
                self.events.queue_raw_event(what, message);
                self.cpu.d[0] = NO_ERR;
                Ok(())
            }

            // =================== Date & Time ===================
            names::READ_DATE_TIME => {
                let time_var = self.cpu.a[0];
                let time = self.memory.region().read_u32(globals::TIME as usize)?;
                self.memory.region().write_u32(time_var as usize, time)?;
                self.cpu.d[0] = NO_ERR;
                Ok(())
            }
            names::DELAY => {
                let ticks = self.cpu.d[0];
                std::thread::sleep(std::time::Duration::from_millis(ticks as u64 * 16));
                self.cpu.d[0] = self.events.now_ticks();
                Ok(())
            }

            // =================== Gestalt ===================
            names::SYS_ENVIRONS => {
                let version_requested = self.cpu.d[0] as u16;
                let world_var = self.cpu.a[0];
                debug!("SysEnvirons(v{}, 0x{:x})", version_requested, world_var);
                let record = SysEnvRecord {
                    environs_version: 2,
                    machine_type: 1, // macSE-era machine class
                    system_version: 0x0604,
                    processor: 1, // env68000
                    has_fpu: 0,
                    has_color_qd: 0,
                    keyboard_type: 1,
                    at_drvr_vers_num: 0,
                    sys_v_ref_num: 0,
                };
                record.write_to(self.memory.region(), world_var as usize)?;
                self.cpu.d[0] = NO_ERR;
                Ok(())
            }

            // =================== File Manager (stubs) ===================
            names::CREATE | names::DELETE | names::OPEN_RF | names::GET_VOL_INFO
            | names::GET_FILE_INFO | names::SET_FILE_INFO | names::SET_EOF
            | names::ALLOCATE | names::GET_EOF | names::FLUSH_VOL | names::SET_VOL
            | names::CLOSE => {
                info!("File Manager {} treated as noErr", names::trap_name(trap));
                self.file_stub_reply(NO_ERR as u16)
            }
            names::OPEN => {
                info!("Open treated as noErr (scratch file)");
                let block = self.cpu.a[0];
                self.memory.region().write_u16((block + IO_REF_NUM) as usize, 2)?;
                self.traps.file_position = 0;
                self.file_stub_reply(NO_ERR as u16)
            }
            names::READ => self.file_read(),
            names::WRITE => self.file_write(),

            _ => Err(EmuError::UnimplementedTrap {
                name: names::trap_name(trap),
                opcode: trap,
            }),
        }
    }

    /// Completes a stubbed File Manager call: ioResult and D0 say noErr.
    fn file_stub_reply(&mut self, result: u16) -> Result<()> {
        let block = self.cpu.a[0];
        self.memory.region().write_u16((block + IO_RESULT) as usize, result)?;
        self.cpu.d[0] = result as u32;
        Ok(())
    }

    /// Read from the scratch buffer at the current position.
    fn file_read(&mut self) -> Result<()> {
        let block = self.cpu.a[0];
        let region = self.memory.region().clone();
        let buffer = region.read_u32((block + IO_BUFFER) as usize)?;
        let requested = region.read_i32((block + IO_REQ_COUNT) as usize)?.max(0) as usize;

        let position = self.traps.file_position;
        let available = self.traps.file_scratch.len().saturating_sub(position);
        let count = requested.min(available);
        let bytes = self.traps.file_scratch[position..position + count].to_vec();
        region.write_bytes(buffer as usize, &bytes)?;
        self.traps.file_position += count;

        debug!("Read {} of {} requested bytes from scratch", count, requested);
        region.write_i32((block + IO_ACT_COUNT) as usize, count as i32)?;
        self.file_stub_reply(NO_ERR as u16)
    }

    /// Write into the scratch buffer, growing it as needed.
    fn file_write(&mut self) -> Result<()> {
        let block = self.cpu.a[0];
        let region = self.memory.region().clone();
        let buffer = region.read_u32((block + IO_BUFFER) as usize)?;
        let requested = region.read_i32((block + IO_REQ_COUNT) as usize)?.max(0) as usize;

        if requested > memmap::SYSTEM_MEMORY_SIZE {
            warn!("Write of {} bytes clamped to system memory size", requested);
        }
        let bytes = region.read_bytes(buffer as usize, requested)?;
        let position = self.traps.file_position;
        if self.traps.file_scratch.len() < position + requested {
            self.traps.file_scratch.resize(position + requested, 0);
        }
        self.traps.file_scratch[position..position + requested].copy_from_slice(&bytes);
        self.traps.file_position += requested;

        debug!("Write {} bytes into scratch", requested);
        region.write_i32((block + IO_ACT_COUNT) as usize, requested as i32)?;
        self.file_stub_reply(NO_ERR as u16)
    }
}
