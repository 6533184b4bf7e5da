// Shared fixtures: minimal application resource forks and a booted Core.
// Each integration test binary compiles its own copy, so not every helper
// is used everywhere.
#![allow(dead_code)]

use emmac::cpu::TimesliceEnd;
use emmac::memory::MemoryRegion;
use emmac::records::{QDGlobals, Record};
use emmac::rsrc::{Resource, ResourceFile, ResourceGroup};
use emmac::Core;

/// 'CODE' 0 with one dormant jump-table entry for segment 1, offset 0.
pub fn code_zero() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x100u32.to_be_bytes()); // above A5
    bytes.extend_from_slice(&0x100u32.to_be_bytes()); // below A5
    bytes.extend_from_slice(&8u32.to_be_bytes()); // table size
    bytes.extend_from_slice(&32u32.to_be_bytes()); // table offset
    // Dormant entry: routine offset, MOVE.W #1,-(SP), _LoadSeg.
    for word in [0x0000u16, 0x3F3C, 0x0001, 0xA9F0] {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    bytes
}

/// 'CODE' 1 whose single routine is `code` (offset 0).
pub fn code_one(code: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0u16.to_be_bytes()); // first entry offset
    bytes.extend_from_slice(&1u16.to_be_bytes()); // entry count
    for word in code {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    bytes
}

pub fn application(code: &[u16]) -> ResourceFile {
    let group = ResourceGroup::new(
        emmac::records::os_type(b"CODE"),
        vec![
            Resource::new(0, 0, String::new(), MemoryRegion::from_vec("code0", code_zero())),
            Resource::new(1, 0, String::new(), MemoryRegion::from_vec("code1", code_one(code))),
        ],
    );
    ResourceFile::from_groups(vec![group])
}

pub fn booted_core(code: &[u16]) -> Core {
    let mut core = Core::new(application(code), None).unwrap();
    core.boot().unwrap();
    core
}

/// An empty application, for driving the managers natively.
pub fn bare_core() -> Core {
    Core::new(ResourceFile::from_groups(Vec::new()), None).unwrap()
}

/// Sets up the QuickDraw globals the way an application's InitGraf would.
pub fn init_quickdraw(core: &mut Core) {
    let qd_block = core.mem.allocate(QDGlobals::SIZE as u32 + 4).unwrap();
    let global_ptr = qd_block + QDGlobals::SIZE as u32 - 4;
    let a5_storage = core.mem.allocate(4).unwrap();
    core.cpu.a[5] = a5_storage;
    core.memory.region().write_u32(a5_storage as usize, global_ptr).unwrap();

    let mut globals = QDGlobals::default();
    globals.screen_bits = core.screen_bits;
    globals.random_seed = 1;
    core.write_qd_globals(&globals).unwrap();
}

/// Single-steps the CPU (running native calls inline) until PC reaches
/// `target`.
pub fn step_until(core: &mut Core, target: u32) {
    for _ in 0..10_000 {
        if core.cpu.pc == target {
            return;
        }
        match core.cpu.run_timeslice(1).unwrap() {
            TimesliceEnd::Native(call) => core.dispatch_native(call).unwrap(),
            TimesliceEnd::Quantum => {}
        }
    }
    panic!("PC never reached 0x{:x} (stuck at 0x{:x})", target, core.cpu.pc);
}
