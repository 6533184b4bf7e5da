// The single 512 KiB address space exposed to the emulated m68k and the
// access policy enforced on every CPU read and write. Where classic machines
// differ on the "correct" location of a boundary the largest option is used,
// so stray accesses in the in-between territory still get caught.
//
//  [ HIGH MEMORY ]
//  Trap-manager entry word
//  Trap-manager exit routine ('TST.W D0' + native return)
//  System A-Trap stubs (256 words)
//  Toolbox A-Trap stubs (1024 words)
//    ... buffer for the A5 world to grow up into
//  Jump table (above A5)
//  A5 world (A5)
//  Application & QuickDraw globals (below A5)
//  Stack (A7)
//  Application heap (ApplZone)
//  0x1C00 System heap (SysZone)
//  0x0C00 Toolbox A-Trap table
//  0x0800 System globals
//  0x0400 System A-Trap table
//  0x0100 System globals
//  0x0000 Interrupt vector table
//  [ LOW MEMORY ]

use std::cell::RefCell;
use std::rc::Rc;

use log::{info, trace, warn};

use crate::errors::{EmuError, Result};
use crate::memory::MemoryRegion;
use crate::records::Field;

pub const SYSTEM_MEMORY_SIZE: usize = 512 * 1024;
pub const DEFAULT_STACK_SIZE: usize = 4 * 1024;

pub const TRAP_ENTRY_ADDRESS: u32 = (SYSTEM_MEMORY_SIZE - 2) as u32;
pub const TRAP_EXIT_ADDRESS: u32 = TRAP_ENTRY_ADDRESS - 4;

pub const SYSTEM_TRAP_STUBS: u32 = TRAP_EXIT_ADDRESS - 256 * 2;
pub const TOOLBOX_TRAP_STUBS: u32 = SYSTEM_TRAP_STUBS - 1024 * 2;

/// Addresses at or above this one are reserved for native-function stubs.
pub const LAST_EMULATED_SUBROUTINE: u32 = TOOLBOX_TRAP_STUBS;

pub const STACK_START: u32 = (SYSTEM_MEMORY_SIZE - 32 * 1024) as u32;
pub const STACK_END: u32 = STACK_START - DEFAULT_STACK_SIZE as u32;

pub const SYSTEM_HEAP_START: u32 = 0x1C00;
pub const SYSTEM_HEAP_END: u32 = SYSTEM_HEAP_START + 4 * 1024;

pub const HEAP_START: u32 = SYSTEM_HEAP_END;
pub const HEAP_END: u32 = STACK_END;

pub const TOOLBOX_TRAP_TABLE_START: u32 = 0x0C00;
pub const TOOLBOX_TRAP_TABLE_END: u32 = 0x1C00;

pub const SYSTEM_GLOBALS_HIGH_START: u32 = 0x0800;
pub const SYSTEM_GLOBALS_HIGH_END: u32 = 0x0C00;

pub const SYSTEM_TRAP_TABLE_START: u32 = 0x0400;
pub const SYSTEM_TRAP_TABLE_END: u32 = 0x0800;

pub const SYSTEM_GLOBALS_LOW_START: u32 = 0x0100;
pub const SYSTEM_GLOBALS_LOW_END: u32 = 0x0400;

pub const IVT_END: u32 = 0x0100;

/// Where the A-line exception vector lands: a subroutine whose first word is
/// `RTE`, planted inside the system heap.
pub const A_TRAP_HANDLER_ADDRESS: u32 = 0x1FFE;

/// Low-memory globals, by classic address. The policy only lets emulated code
/// at the whitelisted subset below; everything else in the globals ranges is
/// a fatal access.
pub mod globals {
    pub const MONKEY_LIVES: u32 = 0x100;
    pub const SCR_V_RES: u32 = 0x102;
    pub const SCR_H_RES: u32 = 0x104;
    pub const SCREEN_ROW: u32 = 0x106;
    pub const APPL_LIMIT: u32 = 0x130;
    pub const TICKS: u32 = 0x16A;
    pub const TIME: u32 = 0x20C;
    pub const MEM_ERR: u32 = 0x220;
    pub const SD_VOLUME: u32 = 0x260;
    pub const ROM85: u32 = 0x28E;
    pub const DOUBLE_TIME: u32 = 0x2F0;
    pub const HP_CHK: u32 = 0x316;
    pub const LO_3_BYTES: u32 = 0x31A;
    pub const CURRENT_A5: u32 = 0x904;
    pub const CUR_STACK_BASE: u32 = 0x908;
    pub const CUR_AP_NAME: u32 = 0x910;
    pub const SAVE_SEG_HANDLE: u32 = 0x930;
    pub const TOOL_SCRATCH: u32 = 0x9CE;
    pub const PAINT_WHITE: u32 = 0x9DC;
    pub const WMGR_PORT: u32 = 0x9DE;
    pub const TEMP_RECT: u32 = 0x9FA;
    pub const ONE_ONE: u32 = 0xA02;
    pub const MINUS_ONE: u32 = 0xA06;
    pub const ICON_BITMAP: u32 = 0xA0E;
    pub const DESK_PATTERN: u32 = 0xA3C;
    pub const RES_LOAD: u32 = 0xA5E;
    pub const RES_ERR: u32 = 0xA60;
    pub const APPL_SCRATCH: u32 = 0xA78;
    pub const APP_PARM_HANDLE: u32 = 0xAEC;
}

/// `(name, address, byte length)` for every global the policy knows about.
const GLOBAL_TABLE: &[(&str, u32, u32)] = &[
    ("MonkeyLives", globals::MONKEY_LIVES, 2),
    ("ScrVRes", globals::SCR_V_RES, 2),
    ("ScrHRes", globals::SCR_H_RES, 2),
    ("ScreenRow", globals::SCREEN_ROW, 2),
    ("ApplLimit", globals::APPL_LIMIT, 4),
    ("Ticks", globals::TICKS, 4),
    ("Time", globals::TIME, 4),
    ("MemErr", globals::MEM_ERR, 2),
    ("SdVolume", globals::SD_VOLUME, 1),
    ("ROM85", globals::ROM85, 2),
    ("DoubleTime", globals::DOUBLE_TIME, 4),
    ("HpChk", globals::HP_CHK, 4),
    ("Lo3Bytes", globals::LO_3_BYTES, 4),
    ("CurrentA5", globals::CURRENT_A5, 4),
    ("CurStackBase", globals::CUR_STACK_BASE, 4),
    // CurApName is a Str31 but is consistently read together with the
    // two bytes that follow it, so track the full 34 bytes as one range.
    ("CurApName", globals::CUR_AP_NAME, 34),
    ("SaveSegHandle", globals::SAVE_SEG_HANDLE, 4),
    ("ToolScratch", globals::TOOL_SCRATCH, 8),
    ("PaintWhite", globals::PAINT_WHITE, 2),
    ("WMgrPort", globals::WMGR_PORT, 4),
    ("TempRect", globals::TEMP_RECT, 8),
    ("OneOne", globals::ONE_ONE, 4),
    ("MinusOne", globals::MINUS_ONE, 4),
    ("IconBitmap", globals::ICON_BITMAP, 14),
    ("DeskPattern", globals::DESK_PATTERN, 8),
    ("ResLoad", globals::RES_LOAD, 2),
    ("ResErr", globals::RES_ERR, 2),
    ("ApplScratch", globals::APPL_SCRATCH, 12),
    ("AppParmHandle", globals::APP_PARM_HANDLE, 4),
];

const READ_WHITELIST: &[u32] = &[
    globals::CURRENT_A5,
    globals::CUR_AP_NAME,
    globals::CUR_STACK_BASE,
    globals::APP_PARM_HANDLE,
    globals::WMGR_PORT,
    globals::TIME,
    globals::TICKS,
    // Low-memory constants (read-only).
    globals::MINUS_ONE,
    globals::ONE_ONE,
    globals::LO_3_BYTES,
    // Communal scratch space (read/write).
    globals::TOOL_SCRATCH,
    globals::TEMP_RECT,
    globals::ICON_BITMAP,
    globals::APPL_SCRATCH,
    // `TST.W HpChk` appears in a few programs, apparently an MPW habit.
    globals::HP_CHK,
    // Read alongside CurApName; see the 34-byte range note above.
    globals::SAVE_SEG_HANDLE,
    globals::SD_VOLUME,
    // -1 marks the old 64k ROMs; positive values the newer ones.
    globals::ROM85,
    globals::SCREEN_ROW,
    globals::DOUBLE_TIME,
    globals::MONKEY_LIVES,
    globals::DESK_PATTERN,
];

const WRITE_WHITELIST: &[u32] = &[
    globals::TOOL_SCRATCH,
    globals::TEMP_RECT,
    globals::ICON_BITMAP,
    globals::APPL_SCRATCH,
    // Resources are always loaded regardless of this flag.
    globals::RES_LOAD,
    globals::MEM_ERR,
    globals::PAINT_WHITE,
];

pub fn global_var_at(address: u32) -> Option<(&'static str, u32)> {
    GLOBAL_TABLE
        .iter()
        .find(|(_, start, len)| address >= *start && address < start + len)
        .map(|(name, start, _)| (*name, *start))
}

pub fn global_var_name(address: u32) -> String {
    match global_var_at(address) {
        Some((name, _)) => name.to_string(),
        None => format!("unknown global 0x{:x}", address),
    }
}

/// A record placed in emulated memory whose bytes may only be touched at the
/// whitelisted fields. Any other access within the range is fatal.
struct RestrictedRange {
    name: String,
    start: u32,
    end: u32,
    whitelist: Vec<Field>,
}

impl RestrictedRange {
    fn is_violation(&self, address: u32) -> bool {
        let relative = (address - self.start) as usize;
        !self
            .whitelist
            .iter()
            .any(|field| field.offset <= relative && relative < field.offset + field.size)
    }
}

struct PolicyState {
    initialized: Vec<bool>,
    above_a5: u32,
    below_a5: u32,
    a5_world: u32,
    read_ranges: Vec<RestrictedRange>,
    write_ranges: Vec<RestrictedRange>,
}

/// The policy-enforcing view over system memory. Native handlers use the
/// plain MemoryRegion accessors; the CPU goes through `check_read` /
/// `check_write` first and treats a policy failure as fatal.
#[derive(Clone)]
pub struct SystemMemory {
    region: MemoryRegion,
    policy: Rc<RefCell<PolicyState>>,
}

impl SystemMemory {
    pub fn new() -> Self {
        let region = MemoryRegion::new("System", SYSTEM_MEMORY_SIZE);
        let policy = Rc::new(RefCell::new(PolicyState {
            initialized: vec![false; SYSTEM_MEMORY_SIZE],
            above_a5: 0,
            below_a5: 0,
            a5_world: 0,
            read_ranges: Vec::new(),
            write_ranges: Vec::new(),
        }));

        // Initialization tracking rides on the region's write watcher so that
        // every path into the buffer is observed.
        let watched = Rc::clone(&policy);
        region.set_watcher(Box::new(move |offset, len| {
            let mut state = watched.borrow_mut();
            for flag in &mut state.initialized[offset..offset + len] {
                *flag = true;
            }
        }));

        SystemMemory { region, policy }
    }

    pub fn region(&self) -> &MemoryRegion {
        &self.region
    }

    /// Sets the bounds of the A5 world for bounds classification.
    pub fn set_a5_world_bounds(&self, above_a5: u32, below_a5: u32) -> Result<()> {
        let a5_world = STACK_START + below_a5;
        if a5_world + above_a5 > LAST_EMULATED_SUBROUTINE {
            return Err(EmuError::out_of_range(format!(
                "A5 world is too large for available memory by {} bytes",
                a5_world + above_a5 - LAST_EMULATED_SUBROUTINE
            )));
        }
        let mut state = self.policy.borrow_mut();
        state.above_a5 = above_a5;
        state.below_a5 = below_a5;
        state.a5_world = a5_world;
        Ok(())
    }

    pub fn a5_world(&self) -> u32 {
        self.policy.borrow().a5_world
    }

    pub fn map_summary(&self) -> String {
        let state = self.policy.borrow();
        format!(
            "Heap: [0x{:x}, 0x{:x}] Stack: [0x{:x}, 0x{:x}] A5 World: 0x{:x} (+{}, -{})",
            HEAP_START, HEAP_END, STACK_END, STACK_START, state.a5_world, state.above_a5,
            state.below_a5
        )
    }

    /// Restricts a record's byte range so only the whitelisted fields may be
    /// read or written by emulated code. Overlapping earlier entries are
    /// replaced, so re-registering a record at the same address overrides.
    pub fn restrict_fields(&self, name: &str, address: u32, length: usize, whitelist: Vec<Field>) {
        let mut state = self.policy.borrow_mut();
        let entry = || RestrictedRange {
            name: name.to_string(),
            start: address,
            end: address + length as u32,
            whitelist: whitelist.clone(),
        };
        let overlaps = |ranges: &mut Vec<RestrictedRange>| {
            ranges.retain(|range| {
                range.start.max(address) >= range.end.min(address + length as u32)
            });
        };
        overlaps(&mut state.read_ranges);
        state.read_ranges.push(entry());
        overlaps(&mut state.write_ranges);
        state.write_ranges.push(entry());
    }

    fn is_initialized(&self, address: u32) -> bool {
        self.policy.borrow().initialized[address as usize]
    }

    /// Classifies a CPU read. Policy violations are fatal.
    pub fn check_read(&self, address: u32) -> Result<()> {
        let within = |lower: u32, upper: u32| address >= lower && address < upper;

        {
            let state = self.policy.borrow();
            for range in &state.read_ranges {
                if within(range.start, range.end) {
                    if range.is_violation(address) {
                        return Err(EmuError::Policy(format!(
                            "read within protected '{}': 0x{:x} (+0x{:x})",
                            range.name,
                            address,
                            address - range.start
                        )));
                    }
                    trace!(
                        "read within unprotected '{}': 0x{:x} (+0x{:x})",
                        range.name,
                        address,
                        address - range.start
                    );
                }
            }
        }

        // Interrupt vector table reads are silent (exception processing).
        if within(0, IVT_END) {
            return Ok(());
        }

        if within(SYSTEM_GLOBALS_LOW_START, SYSTEM_GLOBALS_LOW_END)
            || within(SYSTEM_GLOBALS_HIGH_START, SYSTEM_GLOBALS_HIGH_END)
        {
            if let Some((name, start)) = global_var_at(address) {
                if READ_WHITELIST.contains(&start) {
                    trace!("read global {}", name);
                    return Ok(());
                }
            }
            return Err(EmuError::Policy(format!(
                "read system global at 0x{:x}: {}",
                address,
                global_var_name(address)
            )));
        }

        if within(SYSTEM_TRAP_TABLE_START, SYSTEM_TRAP_TABLE_END) {
            return Err(EmuError::Policy(format!(
                "read system A-Trap table directly: 0x{:x}",
                address
            )));
        }
        if within(TOOLBOX_TRAP_TABLE_START, TOOLBOX_TRAP_TABLE_END) {
            return Err(EmuError::Policy(format!(
                "read toolbox A-Trap table directly: 0x{:x}",
                address
            )));
        }

        if within(SYSTEM_HEAP_START, SYSTEM_HEAP_END) {
            if !self.is_initialized(address) {
                warn!("read uninitialized system heap: 0x{:x}", address);
            }
            return Ok(());
        }

        if within(HEAP_START, HEAP_END) {
            return Ok(());
        }

        if within(STACK_END, STACK_START) {
            trace!("read stack: 0x{:x} (-0x{:x})", address, STACK_START - address);
            return Ok(());
        }

        let (a5_world, below, above) = {
            let state = self.policy.borrow();
            (state.a5_world, state.below_a5, state.above_a5)
        };

        if address == a5_world {
            warn!("read A5 (pointer to QuickDraw globals): 0x{:x}", address);
            return Ok(());
        }
        if within(a5_world - below, a5_world) {
            if !self.is_initialized(address) {
                warn!(
                    "read uninitialized below A5: 0x{:x} (-0x{:x})",
                    address,
                    a5_world - address
                );
            }
            return Ok(());
        }
        if within(a5_world, a5_world + above) {
            if address < a5_world + 32 {
                warn!(
                    "read unimplemented application parameters: 0x{:x} (+0x{:x})",
                    address,
                    address - a5_world
                );
            }
            return Ok(());
        }

        if address >= LAST_EMULATED_SUBROUTINE {
            return Ok(());
        }

        Err(EmuError::Policy(format!("untracked read: 0x{:x}", address)))
    }

    /// Classifies a CPU write. Policy violations are fatal.
    pub fn check_write(&self, address: u32, value: u32) -> Result<()> {
        let within = |lower: u32, upper: u32| address >= lower && address < upper;

        {
            let state = self.policy.borrow();
            for range in &state.write_ranges {
                if within(range.start, range.end) && range.is_violation(address) {
                    return Err(EmuError::Policy(format!(
                        "write within protected '{}': 0x{:x} (+0x{:x}) = 0x{:x}",
                        range.name,
                        address,
                        address - range.start,
                        value
                    )));
                }
            }
        }

        if within(0, IVT_END) {
            return Err(EmuError::Policy(format!("IVT is read-only: 0x{:x}", address)));
        }

        if within(SYSTEM_GLOBALS_LOW_START, SYSTEM_GLOBALS_LOW_END)
            || within(SYSTEM_GLOBALS_HIGH_START, SYSTEM_GLOBALS_HIGH_END)
        {
            if let Some((name, start)) = global_var_at(address) {
                if WRITE_WHITELIST.contains(&start) {
                    trace!("write global {}", name);
                    return Ok(());
                }
            }
            return Err(EmuError::Policy(format!(
                "write system global at 0x{:x}: {} = 0x{:x}",
                address,
                global_var_name(address),
                value
            )));
        }

        if within(SYSTEM_TRAP_TABLE_START, SYSTEM_TRAP_TABLE_END) {
            return Err(EmuError::Policy(format!(
                "write system A-Trap table directly: 0x{:x} = 0x{:x}",
                address, value
            )));
        }
        if within(TOOLBOX_TRAP_TABLE_START, TOOLBOX_TRAP_TABLE_END) {
            return Err(EmuError::Policy(format!(
                "write toolbox A-Trap table directly: 0x{:x} = 0x{:x}",
                address, value
            )));
        }

        if within(SYSTEM_HEAP_START, SYSTEM_HEAP_END) {
            if !self.is_initialized(address) {
                warn!("write to system heap: 0x{:x} = 0x{:x}", address, value);
            }
            return Ok(());
        }

        if within(HEAP_START, HEAP_END) {
            return Ok(());
        }

        if within(STACK_END, STACK_START) {
            trace!(
                "write stack: 0x{:x} (-0x{:x}) = 0x{:x}",
                address,
                STACK_START - address,
                value
            );
            return Ok(());
        }

        let (a5_world, below, above) = {
            let state = self.policy.borrow();
            (state.a5_world, state.below_a5, state.above_a5)
        };

        if address == a5_world {
            warn!("write A5 (pointer to QuickDraw globals): 0x{:x} = 0x{:x}", address, value);
            return Ok(());
        }
        if within(a5_world - below, a5_world) {
            trace!(
                "write below A5 (app globals): 0x{:x} (-0x{:x}) = 0x{:x}",
                address,
                a5_world - address,
                value
            );
            return Ok(());
        }
        if within(a5_world, a5_world + above) {
            if address < a5_world + 32 {
                warn!(
                    "write unimplemented application parameters: 0x{:x} (+0x{:x}) = 0x{:x}",
                    address,
                    address - a5_world,
                    value
                );
            } else {
                warn!(
                    "write above A5: 0x{:x} (+0x{:x}) = 0x{:x}",
                    address,
                    address - a5_world,
                    value
                );
            }
            return Ok(());
        }

        if address >= LAST_EMULATED_SUBROUTINE {
            return Err(EmuError::Policy(format!(
                "write to address reserved for native function calls: 0x{:x} = 0x{:x}",
                address, value
            )));
        }

        Err(EmuError::Policy(format!(
            "untracked write: 0x{:x} = 0x{:x}",
            address, value
        )))
    }

    pub fn log_a5_world(&self) {
        let state = self.policy.borrow();
        let start = (state.a5_world - state.below_a5) as usize;
        let len = (state.below_a5 + state.above_a5) as usize;
        if let Ok(view) = self.region.subregion_sized("A5 World", start, len) {
            info!("A5 World:\n{}", view);
        }
    }
}

impl Default for SystemMemory {
    fn default() -> Self {
        SystemMemory::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Record, Rect};

    #[test]
    fn layout_is_contiguous() {
        assert_eq!(TOOLBOX_TRAP_STUBS, SYSTEM_TRAP_STUBS - 2048);
        assert_eq!(STACK_START - STACK_END, DEFAULT_STACK_SIZE as u32);
        assert_eq!(HEAP_START, 0x2C00);
        assert!(STACK_START < LAST_EMULATED_SUBROUTINE);
    }

    #[test]
    fn ivt_writes_are_fatal_and_reads_silent() {
        let memory = SystemMemory::new();
        assert!(memory.check_read(0x28).is_ok());
        assert!(memory.check_write(0x28, 0).is_err());
    }

    #[test]
    fn whitelisted_globals_pass() {
        let memory = SystemMemory::new();
        assert!(memory.check_read(globals::TICKS).is_ok());
        assert!(memory.check_read(globals::CURRENT_A5).is_ok());
        assert!(memory.check_write(globals::MEM_ERR, 0).is_ok());
        // Not on the write whitelist.
        assert!(memory.check_write(globals::CURRENT_A5, 0).is_err());
        // Not on any whitelist.
        assert!(memory.check_read(0x180).is_err());
    }

    #[test]
    fn trap_tables_are_off_limits() {
        let memory = SystemMemory::new();
        assert!(memory.check_read(SYSTEM_TRAP_TABLE_START).is_err());
        assert!(memory.check_write(TOOLBOX_TRAP_TABLE_START + 8, 1).is_err());
    }

    #[test]
    fn heap_and_stack_access_is_allowed() {
        let memory = SystemMemory::new();
        assert!(memory.check_read(HEAP_START + 0x100).is_ok());
        assert!(memory.check_write(HEAP_START + 0x100, 0xFF).is_ok());
        assert!(memory.check_read(STACK_START - 4).is_ok());
        assert!(memory.check_write(STACK_START - 4, 0xFF).is_ok());
    }

    #[test]
    fn restricted_fields_allow_only_whitelist() {
        let memory = SystemMemory::new();
        let address = HEAP_START + 0x40;
        memory.restrict_fields("Rect", address, Rect::SIZE, vec![Rect::field("top")]);

        assert!(memory.check_read(address).is_ok());
        assert!(memory.check_write(address + 1, 0).is_ok());
        assert!(memory.check_read(address + 2).is_err());
        assert!(memory.check_write(address + 4, 0).is_err());
    }

    #[test]
    fn restricted_fields_can_be_overridden() {
        let memory = SystemMemory::new();
        let address = HEAP_START + 0x40;
        memory.restrict_fields("Rect", address, Rect::SIZE, vec![]);
        assert!(memory.check_read(address).is_err());

        memory.restrict_fields("Rect", address, Rect::SIZE, vec![Rect::field("top")]);
        assert!(memory.check_read(address).is_ok());
    }

    #[test]
    fn a5_world_bounds_are_validated() {
        let memory = SystemMemory::new();
        assert!(memory.set_a5_world_bounds(0x100, 0x100).is_ok());
        assert_eq!(memory.a5_world(), STACK_START + 0x100);
        // Asking for more above-A5 space than exists below the trap stubs.
        assert!(memory.set_a5_world_bounds(0x8000, 0x100).is_err());
    }
}
