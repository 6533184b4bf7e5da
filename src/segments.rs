// The Segment Loader. 'CODE' 0 holds the jump table and the A5 world sizes;
// loading segment N copies its code into a heap handle and rewrites every
// dormant jump-table entry for that segment into an absolute `JMP`, so
// subsequent calls bypass the _LoadSeg trap entirely.

use log::{debug, info};

use crate::errors::{EmuError, Result};
use crate::memmap::globals;
use crate::records::{os_type, Ptr, Record, SegmentTableEntry, SegmentTableHeader};
use crate::Core;

/// The `JMP (xxx).L` opcode planted into resolved jump-table entries.
pub const JMP_ABSOLUTE: u16 = 0x4EF9;

/// Near-model segments carry a 4-byte header; far-model segments announce
/// themselves with a leading 0xFFFF and a 0x28-byte header.
const NEAR_MODEL_HEADER: u32 = 4;

#[derive(Default)]
pub struct SegmentState {
    pub table: SegmentTableHeader,
}

impl Core {
    /// Parses 'CODE' 0, sizes the A5 world, copies the dormant jump table
    /// above A5 and writes the application parameters below it.
    pub fn segment_boot(&mut self) -> Result<()> {
        let table_data = {
            let segment_zero = self.rsrc.segment_zero().ok_or_else(|| {
                EmuError::malformed("missing 'CODE' segment 0".to_string())
            })?;
            segment_zero.data().clone()
        };

        let header = SegmentTableHeader::read_from(&table_data, 0)?;
        if header.table_size as usize != table_data.size() - SegmentTableHeader::SIZE {
            return Err(EmuError::malformed(format!(
                "jump table size {} does not match 'CODE' 0 payload {}",
                header.table_size,
                table_data.size() - SegmentTableHeader::SIZE
            )));
        }
        if header.table_offset != 32 {
            return Err(EmuError::malformed(format!(
                "jump table offset should be 32 bytes, not {}",
                header.table_offset
            )));
        }

        self.memory.set_a5_world_bounds(header.above_a5, header.below_a5)?;
        let a5_world = self.memory.a5_world();

        // The dormant entries go above A5 verbatim; they resolve lazily.
        let table_bytes =
            table_data.read_bytes(SegmentTableHeader::SIZE, header.table_size as usize)?;
        self.memory
            .region()
            .write_bytes((a5_world + header.table_offset) as usize, &table_bytes)?;

        self.write_app_params(a5_world)?;

        self.segments.table = header;
        Ok(())
    }

    /// The application parameters sit at the bottom of the above-A5 space:
    /// stdin/stdout references (zeroed) and a Finder information handle
    /// describing nothing to open.
    fn write_app_params(&mut self, a5_world: u32) -> Result<()> {
        let region = self.memory.region().clone();
        // Standard input (0 = keyboard) and output (0 = screen).
        region.write_u32(a5_world as usize + 8, 0)?;
        region.write_u32(a5_world as usize + 12, 0)?;

        let handle = self.mem.allocate_handle(4, "FinderInfo")?;
        let finder_info = self.mem.region_for_handle(handle)?;
        finder_info.write_u16(0, 0)?; // open verb
        finder_info.write_u16(2, 0)?; // document count

        region.write_u32(a5_world as usize + 16, handle)?;
        region.write_u32(globals::APP_PARM_HANDLE as usize, handle)?;
        Ok(())
    }

    /// Loads 'CODE' `segment_id` and patches its jump-table entries to
    /// absolute jumps. Returns the last patched routine address, which for
    /// the boot-time load of segment 1 is the initial program counter.
    pub fn segment_load(&mut self, segment_id: u16) -> Result<Ptr> {
        let handle =
            self.rsrc.get_resource(&mut self.mem, os_type(b"CODE"), segment_id as i16)?;
        if handle == 0 {
            return Err(EmuError::ResourceNotFound {
                type_name: "CODE".to_string(),
                id: segment_id as i16,
            });
        }
        let segment = self.mem.region_for_handle(handle)?;

        if segment.read_u16(0)? == 0xFFFF {
            return Err(EmuError::Unsupported(
                "far-model jump tables (0x28-byte segment headers)".to_string(),
            ));
        }

        let offset_in_table = segment.read_u16(0)? as u32;
        let entry_count = segment.read_u16(2)?;
        info!("load segment {} ({} jump table entries)", segment_id, entry_count);

        let table_base =
            self.memory.a5_world() + self.segments.table.table_offset + offset_in_table;

        let mut absolute_address = 0;
        for index in (0..entry_count).rev() {
            let entry_offset = table_base + index as u32 * 8;
            let routine_offset =
                self.memory.region().read_u16(entry_offset as usize)? as u32;

            absolute_address =
                segment.base_offset() as u32 + NEAR_MODEL_HEADER + routine_offset;
            debug!(
                "entry {} of segment {}: routine +0x{:x} -> 0x{:x}",
                index, segment_id, routine_offset, absolute_address
            );

            let entry = SegmentTableEntry {
                segment_id,
                jmp_instr: JMP_ABSOLUTE,
                address: absolute_address,
            };
            entry.write_to(self.memory.region(), entry_offset as usize)?;
        }
        Ok(absolute_address)
    }

    /// The _LoadSeg trap: loads the segment, then rewinds the return address
    /// six bytes so the freshly patched `JMP` entry re-executes.
    pub fn load_segment_trap(&mut self, segment_id: u16, return_address: &mut u32) -> Result<()> {
        self.segment_load(segment_id)?;
        *return_address -= 6;
        Ok(())
    }

    /// UnloadSeg is advisory here: segments are never evicted.
    pub fn unload_segment(&mut self, address: u32) {
        debug!("UnloadSeg(0x{:x}) ignored: segments stay resident", address);
    }
}
