// End-to-end boot scenarios: segment loading, the A-Trap round trip, and
// the memory traps, driven through the real dispatcher.

mod common;

use common::{booted_core, step_until};
use emmac::memmap;
use emmac::records::{Record, SegmentTableEntry};
use emmac::segments::JMP_ABSOLUTE;

#[test]
fn trivial_application_boots_and_exits() {
    // 'CODE' 1 is a bare _ExitToShell; one frame runs it to completion.
    let mut core = booted_core(&[0xA9F4]);
    assert!(core.running);
    core.run_frame().unwrap();
    assert!(!core.running);
}

#[test]
fn boot_patches_the_jump_table() {
    let core = booted_core(&[0xA9F4]);

    // After load(1) the dormant entry reads (id, JMP, heap address).
    let table_entry = core.memory.a5_world() + 32;
    let entry =
        SegmentTableEntry::read_from(core.memory.region(), table_entry as usize).unwrap();
    assert_eq!(entry.segment_id, 1);
    assert_eq!(entry.jmp_instr, JMP_ABSOLUTE);
    assert!(entry.address > memmap::HEAP_START && entry.address < memmap::HEAP_END);

    // The initial PC is the resolved routine itself.
    assert_eq!(core.cpu.pc, entry.address);
    assert_eq!(core.cpu.a[5], core.memory.a5_world());
    assert_eq!(core.cpu.a[7], memmap::STACK_START - 4);
}

#[test]
fn block_move_copies_and_returns_no_err() {
    // _BlockMove then a NOP to land on.
    let mut core = booted_core(&[0xA02E, 0x4E71]);
    let entry = core.cpu.pc;

    let source = memmap::HEAP_START + 0x8000;
    for offset in 0..16u32 {
        core.memory.region().write_u8((source + offset) as usize, offset as u8).unwrap();
    }

    core.cpu.a[0] = source;
    core.cpu.a[1] = source + 32;
    core.cpu.d[0] = 16;
    // Sentinels prove the dispatcher restores the preserved registers.
    core.cpu.d[1] = 0x1111_1111;
    core.cpu.d[2] = 0x2222_2222;
    core.cpu.a[1] = source + 32;

    step_until(&mut core, entry + 2);

    for offset in 0..16u32 {
        let byte = core.memory.region().read_u8((source + 32 + offset) as usize).unwrap();
        assert_eq!(byte, offset as u8);
    }
    assert_eq!(core.cpu.d[0], 0, "BlockMove returns noErr");
    assert_eq!(core.cpu.d[1], 0x1111_1111);
    assert_eq!(core.cpu.d[2], 0x2222_2222);
    assert_eq!(core.cpu.a[1], source + 32);
    assert_eq!(core.cpu.a[7], memmap::STACK_START - 4, "stack is balanced");
}

#[test]
fn os_trap_round_trip_preserves_pc_and_stack() {
    // _FreeMem leaves its result in D0 and the PC on the next instruction.
    let mut core = booted_core(&[0xA01C, 0x4E71]);
    let entry = core.cpu.pc;
    let stack = core.cpu.a[7];

    let expected = core.mem.free_memory();
    step_until(&mut core, entry + 2);

    assert_eq!(core.cpu.d[0], expected);
    assert_eq!(core.cpu.a[7], stack);
}

#[test]
fn new_handle_trap_allocates_in_the_heap() {
    let mut core = booted_core(&[0xA122, 0x4E71]);
    let entry = core.cpu.pc;

    core.cpu.d[0] = 64;
    step_until(&mut core, entry + 2);

    let handle = core.cpu.a[0];
    assert_eq!(core.cpu.d[0], 0);
    assert_eq!(core.mem.handle_size(handle).unwrap(), 64);
    // The word at the handle address equals the block start.
    let block = core.memory.region().read_u32(handle as usize).unwrap();
    assert_eq!(core.mem.ptr_for_handle(handle).unwrap(), block);
}

#[test]
fn get_resource_trap_returns_a_code_handle() {
    let mut core = booted_core(&[0x4E71]);

    // Toolbox convention: the caller reserves a result slot below the
    // arguments; the handler consumes the arguments and fills the slot.
    core.cpu.a[7] -= 4; // result slot
    let result_slot = core.cpu.a[7];
    core.cpu.push32(emmac::records::os_type(b"CODE")).unwrap();
    core.cpu.push16(1).unwrap();

    // Execute the A-trap itself at a scratch address.
    let scratch = memmap::HEAP_START + 0x9000;
    core.memory.region().write_u16(scratch as usize, 0xA9A0).unwrap();
    core.memory.region().write_u16(scratch as usize + 2, 0x4E71).unwrap();
    core.cpu.pc = scratch;
    step_until(&mut core, scratch + 2);

    let handle = core.memory.region().read_u32(result_slot as usize).unwrap();
    assert_ne!(handle, 0);
    // 'CODE' 1 was already cached by the boot-time segment load.
    assert_eq!(core.mem.tag(handle), "Resource[CODE:1]");
    assert_eq!(core.cpu.a[7], result_slot, "arguments consumed, slot on top");
}
