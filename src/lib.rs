// A classic Motorola 68000 Macintosh emulator: a Toolbox/OS execution
// environment wrapped around an m68k interpreter. The `Core` struct below is
// the single context threaded through every trap handler; the manager
// modules hang their operations off it as methods.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub mod errors;
pub mod memory;
pub mod records;

pub mod memmap;
pub mod memmgr;

pub mod rsrc;
pub mod rsrcmgr;

pub mod cpu;
pub mod graphics;

pub mod dialogs;
pub mod events;
pub mod menus;
pub mod quickdraw;
pub mod segments;
pub mod windows;

pub mod traps;

pub mod screen;

use errors::Result;
use log::{debug, info};

use crate::cpu::{Cpu, NativeCall, TimesliceEnd};
use crate::events::EventManager;
use crate::graphics::font::{system_font, Font, ResFont};
use crate::graphics::{BitmapImage, FillMode, GRAY_PATTERN};
use crate::memmap::{globals, SystemMemory};
use crate::memmgr::MemoryManager;
use crate::records::{os_type, BitMap, Record, Rect};
use crate::rsrcmgr::ResourceManager;

pub const SCREEN_WIDTH: i32 = 512;
pub const SCREEN_HEIGHT: i32 = 384;

/// Instructions per frame-loop timeslice.
const TIMESLICE_INSTRUCTIONS: usize = 100_000;

/// The host side of the frame loop: blits the raster and feeds input into
/// the event queue. Nested event pumps (menu tracking, drags, modal dialogs)
/// call this between iterations so they never starve the outer loop.
pub trait HostBridge {
    /// Runs one host tick. Returns false when the host wants to quit.
    fn pump(&mut self, events: &EventManager, screen: &BitmapImage) -> bool;
}

/// A font selected for drawing; resource strikes are shared behind Rc.
#[derive(Clone)]
pub enum FontRef {
    Builtin,
    Strike(Rc<ResFont>),
}

impl FontRef {
    pub fn as_font(&self) -> &dyn Font {
        match self {
            FontRef::Builtin => system_font(),
            FontRef::Strike(font) => font.as_ref(),
        }
    }
}

pub struct Core {
    pub memory: SystemMemory,
    pub cpu: Cpu,
    pub mem: MemoryManager,
    pub rsrc: ResourceManager,
    pub events: EventManager,

    /// The physical raster, aliasing a heap block in emulated memory so the
    /// BitMap handed to QuickDraw describes real bytes.
    pub screen: BitmapImage,
    pub screen_bits: BitMap,

    pub windows: windows::WindowState,
    pub menus: menus::MenuState,
    pub dialogs: dialogs::DialogState,
    pub segments: segments::SegmentState,
    pub traps: traps::TrapState,

    fonts: HashMap<i16, Rc<ResFont>>,

    pub host: Option<Rc<RefCell<dyn HostBridge>>>,
    pub running: bool,
}

impl Core {
    pub fn new(
        file: rsrc::ResourceFile,
        system_file: Option<rsrc::ResourceFile>,
    ) -> Result<Core> {
        let memory = SystemMemory::new();
        let mut mem = MemoryManager::new(memory.clone());
        let rsrc = ResourceManager::new(memory.clone(), file, system_file);
        let events = EventManager::new();

        // The screen raster lives in the application heap so that the
        // BitMap in the QuickDraw globals points at honest bytes.
        let row_bytes = graphics::pixel_width_to_bytes(SCREEN_WIDTH);
        let base_addr = mem.allocate((row_bytes * SCREEN_HEIGHT) as u32)?;
        let screen_bits = BitMap {
            base_addr,
            row_bytes: row_bytes as i16,
            bounds: graphics::new_rect(0, 0, SCREEN_WIDTH as i16, SCREEN_HEIGHT as i16),
        };
        let screen = BitmapImage::from_bitmap(&screen_bits, memory.region())?;

        Ok(Core {
            cpu: Cpu::new(memory.clone()),
            memory,
            mem,
            rsrc,
            events,
            screen,
            screen_bits,
            windows: windows::WindowState::default(),
            menus: menus::MenuState::default(),
            dialogs: dialogs::DialogState::default(),
            segments: segments::SegmentState::default(),
            traps: traps::TrapState::default(),
            fonts: HashMap::new(),
            host: None,
            running: true,
        })
    }

    /// Boots the application: loads the jump table and first segment, lays
    /// out the VM globals and trap stubs, and paints the empty desktop.
    pub fn boot(&mut self) -> Result<()> {
        self.segment_boot()?;
        let entry_point = self.segment_load(1)?;
        info!("initial PC 0x{:x}", entry_point);
        info!("memory map: {}", self.memory.map_summary());

        self.init_vm_globals()?;
        self.install_trap_stubs()?;
        self.cpu.register_a_trap_handler()?;

        // A program that "returns" from its entry point falls into the
        // ExitToShell stub.
        self.cpu.a[7] = memmap::STACK_START;
        self.cpu.push32(
            memmap::TOOLBOX_TRAP_STUBS + (traps::names::EXIT_TO_SHELL as u32 & 0x03FF) * 2,
        )?;
        let stack_top = self.cpu.a[7];
        self.cpu.init(entry_point);
        self.cpu.a[7] = stack_top;

        self.patch_traps_from_system_file()?;

        // The classic grey desktop with an empty menu bar.
        let desktop = self.screen.bounds();
        self.screen.fill_rect(&desktop, &GRAY_PATTERN, FillMode::Copy);
        self.draw_menu_bar();
        Ok(())
    }

    fn init_vm_globals(&mut self) -> Result<()> {
        let region = self.memory.region().clone();
        region.write_u32(globals::APPL_LIMIT as usize, memmap::HEAP_END)?;
        region.write_u32(globals::CURRENT_A5 as usize, self.memory.a5_world())?;
        region.write_u32(globals::CUR_STACK_BASE as usize, memmap::STACK_START)?;
        // An empty Pascal string until something sets the application name.
        region.write_u8(globals::CUR_AP_NAME as usize, 0)?;

        // Low-memory constants.
        region.write_u32(globals::MINUS_ONE as usize, 0xFFFF_FFFF)?;
        region.write_u32(globals::ONE_ONE as usize, 0x0001_0001)?;
        region.write_u32(globals::LO_3_BYTES as usize, 0x00FF_FFFF)?;
        region.write_u16(globals::ROM85 as usize, 0x3FFF)?;
        region.write_u16(globals::SCREEN_ROW as usize, self.screen_bits.row_bytes as u16)?;

        self.update_global_time()?;
        Ok(())
    }

    /// Refreshes the Time global from the host clock (HFS epoch seconds).
    pub fn update_global_time(&self) -> Result<()> {
        let now = chrono::Utc::now().timestamp() + rsrc::HFS_EPOCH_OFFSET;
        self.memory.region().write_u32(globals::TIME as usize, now as u32)?;
        self.memory
            .region()
            .write_u32(globals::TICKS as usize, self.events.now_ticks())
    }

    /// One frame of emulation: a CPU timeslice plus however many native
    /// calls it runs into, bounded so a trap storm cannot wedge the host.
    pub fn run_frame(&mut self) -> Result<()> {
        self.update_global_time()?;
        for _ in 0..TIMESLICE_INSTRUCTIONS {
            if !self.running {
                return Ok(());
            }
            match self.cpu.run_timeslice(TIMESLICE_INSTRUCTIONS)? {
                TimesliceEnd::Quantum => return Ok(()),
                TimesliceEnd::Native(call) => self.dispatch_native(call)?,
            }
        }
        Ok(())
    }

    /// Runs the native side of a timeslice exit (exposed for stepwise tests
    /// as well as the frame loop).
    pub fn dispatch_native(&mut self, call: NativeCall) -> Result<()> {
        match call {
            NativeCall::TrapEntry => self.trap_entry(),
            NativeCall::TrapExit => self.trap_exit(),
            NativeCall::ToolboxStub(index) => self.trap_stub(index, true),
            NativeCall::SystemStub(index) => self.trap_stub(index, false),
        }
    }

    /// Yields to the host for one tick during nested event pumps. Returns
    /// false when there is no host (tests) or the host asked to quit.
    pub fn host_yield(&mut self) -> bool {
        if !self.running {
            return false;
        }
        match self.host.clone() {
            Some(host) => host.borrow_mut().pump(&self.events, &self.screen),
            None => false,
        }
    }

    /// Resolves a font by QuickDraw family id, falling back to the built-in
    /// 8x8 face. 'FONT' resource ids encode the family in bits 7-14 with
    /// the point size below.
    pub fn font_for(&mut self, family: i16) -> FontRef {
        if family == 0 {
            return FontRef::Builtin;
        }
        if let Some(font) = self.fonts.get(&family) {
            return FontRef::Strike(Rc::clone(font));
        }
        for size in [12i16, 9, 10] {
            let id = (family << 7) | size;
            let handle = match self.rsrc.get_resource(&mut self.mem, os_type(b"FONT"), id) {
                Ok(handle) if handle != 0 => handle,
                _ => continue,
            };
            let data = match self.mem.region_for_handle(handle) {
                Ok(region) => region,
                Err(_) => continue,
            };
            match ResFont::parse(&data) {
                Ok(font) => {
                    let font = Rc::new(font);
                    self.fonts.insert(family, Rc::clone(&font));
                    return FontRef::Strike(font);
                }
                Err(err) => {
                    debug!("FONT {} failed to parse: {}", id, err);
                }
            }
        }
        debug!("no strike for font family {}, using the built-in face", family);
        FontRef::Builtin
    }

    /// Loads PACK 4 and 7 from the System file as trap patches.
    fn patch_traps_from_system_file(&mut self) -> Result<()> {
        if self.rsrc.system_file().is_none() {
            return Ok(());
        }
        if let Some(version) = self.rsrc.system_file().unwrap().find(os_type(b"STR "), 0) {
            if let Ok(text) = version.data().read_pstr(0) {
                info!("using System: {}", text);
            }
        }

        for (pack_id, trap) in [(4i16, traps::names::PACK4), (7i16, traps::names::PACK7)] {
            let handle = self.rsrc.get_resource(&mut self.mem, os_type(b"PACK"), pack_id)?;
            if handle == 0 {
                continue;
            }
            let address = self.memory.region().read_u32(handle as usize)?;
            info!("loading PACK{} into memory at 0x{:x}", pack_id, address);
            self.set_trap_patch(trap, address);
        }
        Ok(())
    }

    // ---- record plumbing shared by the managers ------------------------

    pub fn read_record_at<T: Record>(&self, address: u32) -> Result<T> {
        T::read_from(self.memory.region(), address as usize)
    }

    pub fn write_record_at<T: Record>(&self, address: u32, value: &T) -> Result<()> {
        value.write_to(self.memory.region(), address as usize)
    }

    /// The desktop: everything below the menu bar.
    pub fn desktop_rect(&self) -> Rect {
        graphics::new_rect(
            0,
            menus::MENU_BAR_HEIGHT,
            SCREEN_WIDTH as i16,
            (SCREEN_HEIGHT as i16) - menus::MENU_BAR_HEIGHT,
        )
    }
}
