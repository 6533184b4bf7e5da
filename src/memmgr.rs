// The Memory Manager hands out pointers and handles inside the application
// heap. Two monotonic cursors: handles grow from the heap start through a
// fixed handle-table region, blocks grow from the end of that region toward
// the stack. Nothing is ever moved or compacted; disposal only drops the
// side-table metadata.

use std::collections::BTreeMap;

use log::{debug, error, info};

use crate::errors::{EmuError, Result};
use crate::memmap::{self, globals, SystemMemory};
use crate::memory::MemoryRegion;
use crate::records::{Handle, Ptr, Record};

/// Bytes reserved at the start of the application heap for handle words.
pub const HEAP_HANDLE_BYTES: u32 = 4096;

struct HandleMetadata {
    tag: String,
    start: u32,
    end: u32,
    size: u32,
}

pub struct MemoryManager {
    memory: SystemMemory,
    heap_offset: u32,
    handle_offset: u32,
    metadata: BTreeMap<Handle, HandleMetadata>,
}

impl MemoryManager {
    pub fn new(memory: SystemMemory) -> Self {
        MemoryManager {
            memory,
            heap_offset: HEAP_HANDLE_BYTES,
            handle_offset: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn has_space_for(&self, size: u32) -> bool {
        memmap::HEAP_START + self.heap_offset + size < memmap::HEAP_END
    }

    /// Allocates `size` bytes of non-relocatable storage.
    pub fn allocate(&mut self, size: u32) -> Result<Ptr> {
        let ptr = memmap::HEAP_START + self.heap_offset;
        if ptr + size >= memmap::HEAP_END {
            return Err(EmuError::OutOfMemory { requested: size });
        }
        self.heap_offset += size;
        debug!(
            "allocate {} bytes at 0x{:x} ({} / {} used)",
            size,
            ptr,
            self.heap_offset,
            memmap::HEAP_END - memmap::HEAP_START
        );
        Ok(ptr)
    }

    /// Allocates a block and a handle word pointing at it. The word stored at
    /// the handle address always equals the block start.
    pub fn allocate_handle(&mut self, size: u32, tag: &str) -> Result<Handle> {
        if self.handle_offset + 4 > HEAP_HANDLE_BYTES {
            return Err(EmuError::OutOfMemory { requested: size });
        }
        let block = self.allocate(size)?;
        let handle = memmap::HEAP_START + self.handle_offset;
        self.handle_offset += 4;

        debug!(
            "handle {} [0x{:x}] -> 0x{:x} for '{}'",
            self.handle_offset / 4,
            handle,
            block,
            tag
        );
        self.memory.region().write_u32(handle as usize, block)?;

        self.metadata.insert(
            handle,
            HandleMetadata { tag: tag.to_string(), start: block, end: block + size, size },
        );
        Ok(handle)
    }

    /// Allocates a handle whose block is a copy of `data`.
    pub fn allocate_handle_for_region(&mut self, data: &MemoryRegion, tag: &str) -> Result<Handle> {
        let handle = self.allocate_handle(data.size() as u32, tag)?;
        let block = self.memory.region().read_u32(handle as usize)?;
        let bytes = data.read_bytes(0, data.size())?;
        self.memory.region().write_bytes(block as usize, &bytes)?;
        Ok(handle)
    }

    /// Drops the handle's metadata. The block itself is never reclaimed.
    pub fn deallocate(&mut self, handle: Handle) -> bool {
        match self.metadata.remove(&handle) {
            Some(meta) => {
                info!("dealloc '{}'", meta.tag);
                true
            }
            None => {
                error!("handle 0x{:x} was already deallocated", handle);
                false
            }
        }
    }

    fn meta(&self, handle: Handle) -> Result<&HandleMetadata> {
        self.metadata.get(&handle).ok_or_else(|| {
            EmuError::out_of_range(format!("handle 0x{:x} can not be found", handle))
        })
    }

    /// Re-reads the handle word and verifies it still equals the recorded
    /// block start (blocks never move in this implementation).
    pub fn ptr_for_handle(&self, handle: Handle) -> Result<Ptr> {
        let meta = self.meta(handle)?;
        let current = self.memory.region().read_u32(handle as usize)?;
        if current != meta.start {
            return Err(EmuError::malformed(format!(
                "handle 0x{:x} word 0x{:x} does not match block start 0x{:x}",
                handle, current, meta.start
            )));
        }
        Ok(current)
    }

    /// A view over the handle's backing block.
    pub fn region_for_handle(&self, handle: Handle) -> Result<MemoryRegion> {
        let start = self.ptr_for_handle(handle)?;
        let size = self.meta(handle)?.size;
        self.memory.region().subregion_sized(
            &format!("Handle[{}]", self.meta(handle)?.tag),
            start as usize,
            size as usize,
        )
    }

    pub fn handle_size(&self, handle: Handle) -> Result<u32> {
        Ok(self.meta(handle)?.size)
    }

    pub fn tag(&self, handle: Handle) -> String {
        self.metadata.get(&handle).map(|meta| meta.tag.clone()).unwrap_or_default()
    }

    /// Finds the handle whose block contains `address`, or 0.
    pub fn handle_containing(&self, address: u32) -> Handle {
        for (handle, meta) in &self.metadata {
            if address >= meta.start && address < meta.end {
                return *handle;
            }
        }
        0
    }

    /// Finds the handle whose block starts at `ptr`, or 0 (RecoverHandle).
    pub fn recover_handle(&self, ptr: Ptr) -> Handle {
        for (handle, meta) in &self.metadata {
            if meta.start == ptr {
                return *handle;
            }
        }
        0
    }

    /// Updates the ApplLimit global; fails when `last_addr` is past the heap.
    pub fn set_appl_limit(&mut self, last_addr: Ptr) -> Result<bool> {
        if last_addr >= memmap::HEAP_END {
            log::warn!("requested more heap memory than available");
            return Ok(false);
        }
        self.memory.region().write_u32(globals::APPL_LIMIT as usize, last_addr)?;
        Ok(true)
    }

    /// Points an existing handle at a freshly allocated block of `size`
    /// bytes. The old block is abandoned (nothing is ever compacted), which
    /// is how variable-sized region data grows behind a stable handle.
    pub fn resize_handle(&mut self, handle: Handle, size: u32) -> Result<()> {
        if self.handle_size(handle)? >= size {
            return Ok(());
        }
        let block = self.allocate(size)?;
        self.memory.region().write_u32(handle as usize, block)?;
        let meta = self.metadata.get_mut(&handle).unwrap();
        meta.start = block;
        meta.end = block + size;
        meta.size = size;
        Ok(())
    }

    pub fn free_memory(&self) -> u32 {
        memmap::HEAP_END - (memmap::HEAP_START + self.heap_offset)
    }

    pub fn read_record<T: Record>(&self, handle: Handle) -> Result<T> {
        let region = self.region_for_handle(handle)?;
        T::read_from(&region, 0)
    }

    pub fn write_record<T: Record>(&self, handle: Handle, value: &T) -> Result<()> {
        let region = self.region_for_handle(handle)?;
        value.write_to(&region, 0)
    }

    pub fn new_handle_for<T: Record>(&mut self, value: &T, tag: &str) -> Result<Handle> {
        let handle = self.allocate_handle(T::SIZE as u32, tag)?;
        self.write_record(handle, value)?;
        Ok(handle)
    }

    pub fn log_handles(&self) -> String {
        let mut out = String::new();
        for (handle, meta) in &self.metadata {
            out.push_str(&format!("\n0x{:x} -> 0x{:x} ({})", handle, meta.start, meta.tag));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Rect;

    fn manager() -> MemoryManager {
        MemoryManager::new(SystemMemory::new())
    }

    #[test]
    fn handle_word_points_at_block() {
        let mut mgr = manager();
        let handle = mgr.allocate_handle(16, "test").unwrap();
        let start = mgr.ptr_for_handle(handle).unwrap();

        assert_eq!(mgr.handle_size(handle).unwrap(), 16);
        assert_eq!(mgr.region_for_handle(handle).unwrap().size(), 16);
        for k in 0..16 {
            assert_eq!(mgr.handle_containing(start + k), handle);
        }
        assert_eq!(mgr.handle_containing(start + 16), 0);
        assert_eq!(mgr.recover_handle(start), handle);
        assert_eq!(mgr.tag(handle), "test");
    }

    #[test]
    fn handles_live_below_the_handle_table_bound() {
        let mut mgr = manager();
        let first = mgr.allocate_handle(8, "a").unwrap();
        let second = mgr.allocate_handle(8, "b").unwrap();
        assert_eq!(second, first + 4);
        assert!(second < memmap::HEAP_START + HEAP_HANDLE_BYTES);
        // Blocks are laid out after the handle table, in order.
        let first_block = mgr.ptr_for_handle(first).unwrap();
        let second_block = mgr.ptr_for_handle(second).unwrap();
        assert_eq!(first_block, memmap::HEAP_START + HEAP_HANDLE_BYTES);
        assert_eq!(second_block, first_block + 8);
    }

    #[test]
    fn exhausting_the_heap_reports_out_of_memory() {
        let mut mgr = manager();
        let available = mgr.free_memory();
        assert!(mgr.allocate(available + 1).is_err());
        assert!(mgr.allocate(64).is_ok());
    }

    #[test]
    fn deallocate_is_metadata_only() {
        let mut mgr = manager();
        let handle = mgr.allocate_handle(8, "gone").unwrap();
        assert!(mgr.deallocate(handle));
        assert!(!mgr.deallocate(handle));
        assert!(mgr.ptr_for_handle(handle).is_err());
    }

    #[test]
    fn records_round_trip_through_handles() {
        let mut mgr = manager();
        let rect = Rect { top: 1, left: 2, bottom: 3, right: 4 };
        let handle = mgr.new_handle_for(&rect, "Rect").unwrap();
        assert_eq!(mgr.read_record::<Rect>(handle).unwrap(), rect);
    }
}
