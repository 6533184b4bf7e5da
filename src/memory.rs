// A MemoryRegion is a named, bounds-tracked view into a shared byte buffer.
// Multi-byte accesses are always big-endian, the byte order of the m68k; the
// host's endianness never leaks through this interface. Sub-regions may be
// carved out of any region with offsets relative to their parent, but no view
// can ever escape the root buffer.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::warn;

use crate::errors::{EmuError, Result};

/// Observes writes to the backing buffer (absolute offsets). Installed on the
/// root region; views all share it.
pub type WriteWatcher = Box<dyn FnMut(usize, usize)>;

struct Backing {
    bytes: Vec<u8>,
    watcher: Option<WriteWatcher>,
}

type BackingPtr = Rc<RefCell<Backing>>;

#[derive(Clone)]
pub struct MemoryRegion {
    name: Rc<String>,
    backing: BackingPtr,
    /// Absolute start of this view within the backing buffer.
    start: usize,
    /// Declared size of this view. Exceeding it is a warning, not an error.
    size: usize,
    /// Bytes between `start` and the end of the root buffer; the hard limit.
    max_size: usize,
}

impl MemoryRegion {
    /// Creates a zero-filled root region of `size` bytes.
    pub fn new(name: &str, size: usize) -> Self {
        Self::from_vec(name, vec![0u8; size])
    }

    /// Creates a root region owning `bytes` (e.g. a file read into memory).
    pub fn from_vec(name: &str, bytes: Vec<u8>) -> Self {
        let size = bytes.len();
        MemoryRegion {
            name: Rc::new(name.to_string()),
            backing: Rc::new(RefCell::new(Backing { bytes, watcher: None })),
            start: 0,
            size,
            max_size: size,
        }
    }

    /// Installs the write watcher. Every view into the same backing store
    /// reports through it with absolute offsets.
    pub fn set_watcher(&self, watcher: WriteWatcher) {
        self.backing.borrow_mut().watcher = Some(watcher);
    }

    /// Creates a sub-region `[offset, parent end)` relative to this region.
    pub fn subregion(&self, name: &str, offset: usize) -> Result<MemoryRegion> {
        self.subregion_sized(name, offset, self.max_size.saturating_sub(offset))
    }

    /// Creates a sub-region `[offset, offset + size)` relative to this region.
    /// Exceeding the root is an error; exceeding only the parent's declared
    /// size is legal but warned about.
    pub fn subregion_sized(&self, name: &str, offset: usize, size: usize) -> Result<MemoryRegion> {
        if offset + size > self.max_size {
            return Err(EmuError::out_of_range(format!(
                "sub-region '{}' [{}:+{}] overflows '{}' ({} bytes to root end)",
                name, offset, size, self.name, self.max_size
            )));
        }
        if self.size > 0 && offset + size > self.size {
            warn!(
                "sub-region '{}' [{}:+{}] is outside of '{}' ({} bytes)",
                name, offset, size, self.name, self.size
            );
        }
        Ok(MemoryRegion {
            name: Rc::new(name.to_string()),
            backing: Rc::clone(&self.backing),
            start: self.start + offset,
            size,
            max_size: self.max_size - offset,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The offset of this region within the root buffer.
    pub fn base_offset(&self) -> usize {
        self.start
    }

    fn check_access(&self, what: &str, offset: usize, len: usize) -> Result<()> {
        if offset + len > self.max_size {
            return Err(EmuError::out_of_range(format!(
                "{} of {} bytes at offset {} overflows '{}' ({} bytes to root end)",
                what, len, offset, self.name, self.max_size
            )));
        }
        if self.size > 0 && offset + len > self.size {
            warn!(
                "{} of {} bytes at offset {} is outside of '{}' ({} bytes)",
                what, len, offset, self.name, self.size
            );
        }
        Ok(())
    }

    pub fn read_exact(&self, dest: &mut [u8], offset: usize) -> Result<()> {
        self.check_access("read", offset, dest.len())?;
        let backing = self.backing.borrow();
        let at = self.start + offset;
        dest.copy_from_slice(&backing.bytes[at..at + dest.len()]);
        Ok(())
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        self.read_exact(&mut buffer, offset)?;
        Ok(buffer)
    }

    pub fn write_bytes(&self, offset: usize, src: &[u8]) -> Result<()> {
        self.check_access("write", offset, src.len())?;
        let mut backing = self.backing.borrow_mut();
        let at = self.start + offset;
        backing.bytes[at..at + src.len()].copy_from_slice(src);
        let Backing { watcher, .. } = &mut *backing;
        if let Some(watcher) = watcher.as_mut() {
            watcher(at, src.len());
        }
        Ok(())
    }

    /// Fills `[offset, offset + len)` with `value`.
    pub fn fill(&self, offset: usize, len: usize, value: u8) -> Result<()> {
        self.check_access("fill", offset, len)?;
        let mut backing = self.backing.borrow_mut();
        let at = self.start + offset;
        for byte in &mut backing.bytes[at..at + len] {
            *byte = value;
        }
        let Backing { watcher, .. } = &mut *backing;
        if let Some(watcher) = watcher.as_mut() {
            watcher(at, len);
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        let mut buffer = [0u8; 1];
        self.read_exact(&mut buffer, offset)?;
        Ok(buffer[0])
    }

    pub fn read_i8(&self, offset: usize) -> Result<i8> {
        Ok(self.read_u8(offset)? as i8)
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        let mut buffer = [0u8; 2];
        self.read_exact(&mut buffer, offset)?;
        Ok(u16::from_be_bytes(buffer))
    }

    pub fn read_i16(&self, offset: usize) -> Result<i16> {
        Ok(self.read_u16(offset)? as i16)
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let mut buffer = [0u8; 4];
        self.read_exact(&mut buffer, offset)?;
        Ok(u32::from_be_bytes(buffer))
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32> {
        Ok(self.read_u32(offset)? as i32)
    }

    /// Reads a big-endian 24-bit quantity (used by resource map entries).
    pub fn read_u24(&self, offset: usize) -> Result<u32> {
        let mut buffer = [0u8; 3];
        self.read_exact(&mut buffer, offset)?;
        Ok(((buffer[0] as u32) << 16) | ((buffer[1] as u32) << 8) | buffer[2] as u32)
    }

    pub fn write_u8(&self, offset: usize, value: u8) -> Result<()> {
        self.write_bytes(offset, &[value])
    }

    pub fn write_u16(&self, offset: usize, value: u16) -> Result<()> {
        self.write_bytes(offset, &value.to_be_bytes())
    }

    pub fn write_i16(&self, offset: usize, value: i16) -> Result<()> {
        self.write_bytes(offset, &value.to_be_bytes())
    }

    pub fn write_u32(&self, offset: usize, value: u32) -> Result<()> {
        self.write_bytes(offset, &value.to_be_bytes())
    }

    pub fn write_i32(&self, offset: usize, value: i32) -> Result<()> {
        self.write_bytes(offset, &value.to_be_bytes())
    }

    pub fn write_u24(&self, offset: usize, value: u32) -> Result<()> {
        let bytes = [(value >> 16) as u8, (value >> 8) as u8, value as u8];
        self.write_bytes(offset, &bytes)
    }

    /// Reads a Pascal string (1-byte length prefix).
    pub fn read_pstr(&self, offset: usize) -> Result<String> {
        let length = self.read_u8(offset)? as usize;
        let bytes = self.read_bytes(offset + 1, length)?;
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    /// Writes a Pascal string. Lengths above 255 cannot be represented.
    pub fn write_pstr(&self, offset: usize, value: &str) -> Result<()> {
        if value.len() > 255 {
            return Err(EmuError::malformed(format!(
                "Pascal string of {} bytes is too long",
                value.len()
            )));
        }
        self.write_u8(offset, value.len() as u8)?;
        self.write_bytes(offset + 1, value.as_bytes())
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "'{}' ({} bytes at +0x{:x}):", self.name, self.size, self.start)?;
        let backing = self.backing.borrow();
        let end = self.start + self.size.min(self.max_size);
        let bytes = &backing.bytes[self.start..end];
        for (row, chunk) in bytes.chunks(16).enumerate() {
            write!(f, "  {:06x}:", row * 16)?;
            for byte in chunk {
                write!(f, " {:02x}", byte)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Sequential typed reads over a MemoryRegion, tracking a cursor.
pub struct Reader {
    region: MemoryRegion,
    offset: usize,
}

impl Reader {
    pub fn new(region: MemoryRegion) -> Self {
        Reader { region, offset: 0 }
    }

    pub fn at(region: MemoryRegion, offset: usize) -> Self {
        Reader { region, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn has_next(&self) -> bool {
        self.offset < self.region.size()
    }

    pub fn seek(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn skip(&mut self, bytes: usize) {
        self.offset += bytes;
    }

    /// Moves the cursor up to the start of the next `block_size`-aligned
    /// block (no-op when already aligned).
    pub fn align_to(&mut self, block_size: usize) {
        if self.offset % block_size != 0 {
            self.offset = ((self.offset / block_size) + 1) * block_size;
        }
    }

    pub fn next_u8(&mut self) -> Result<u8> {
        let value = self.region.read_u8(self.offset)?;
        self.offset += 1;
        Ok(value)
    }

    pub fn next_i8(&mut self) -> Result<i8> {
        Ok(self.next_u8()? as i8)
    }

    pub fn next_u16(&mut self) -> Result<u16> {
        let value = self.region.read_u16(self.offset)?;
        self.offset += 2;
        Ok(value)
    }

    pub fn next_i16(&mut self) -> Result<i16> {
        Ok(self.next_u16()? as i16)
    }

    pub fn next_u32(&mut self) -> Result<u32> {
        let value = self.region.read_u32(self.offset)?;
        self.offset += 4;
        Ok(value)
    }

    pub fn next_i32(&mut self) -> Result<i32> {
        Ok(self.next_u32()? as i32)
    }

    pub fn next_u24(&mut self) -> Result<u32> {
        let value = self.region.read_u24(self.offset)?;
        self.offset += 3;
        Ok(value)
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.region.read_u8(self.offset)
    }

    pub fn peek_u16(&self) -> Result<u16> {
        self.region.read_u16(self.offset)
    }

    pub fn peek_i16(&self) -> Result<i16> {
        self.region.read_i16(self.offset)
    }

    /// Reads a record of a fixed-layout type, consuming its full size.
    pub fn next_record<T: crate::records::Record>(&mut self) -> Result<T> {
        let value = T::read_from(&self.region, self.offset)?;
        self.offset += T::SIZE;
        Ok(value)
    }

    pub fn peek_record<T: crate::records::Record>(&self) -> Result<T> {
        T::read_from(&self.region, self.offset)
    }

    /// Reads a Pascal string. When `fixed_size` is given the string length
    /// must fit within it and the cursor always advances by `fixed_size`.
    pub fn next_pstr(&mut self, fixed_size: Option<usize>) -> Result<String> {
        let length = self.next_u8()? as usize;
        if let Some(fixed) = fixed_size {
            if length > fixed {
                return Err(EmuError::malformed(format!(
                    "string of length {} exceeds its fixed size {}",
                    length, fixed
                )));
            }
        }
        let bytes = self.region.read_bytes(self.offset, length)?;
        self.offset += fixed_size.unwrap_or(length);
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    /// Carves a sub-region of `length` bytes starting at the cursor.
    pub fn next_region(&mut self, name: &str, length: usize) -> Result<MemoryRegion> {
        let region = self.region.subregion_sized(name, self.offset, length)?;
        self.offset += length;
        Ok(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_big_endian_integers() {
        let region = MemoryRegion::new("test", 32);
        region.write_u16(0, 0x1234).unwrap();
        region.write_u32(2, 0xCAFEBABE).unwrap();
        region.write_u24(6, 0xABCDEF).unwrap();
        assert_eq!(region.read_u16(0).unwrap(), 0x1234);
        assert_eq!(region.read_u8(0).unwrap(), 0x12);
        assert_eq!(region.read_u8(1).unwrap(), 0x34);
        assert_eq!(region.read_u32(2).unwrap(), 0xCAFEBABE);
        assert_eq!(region.read_u24(6).unwrap(), 0xABCDEF);
    }

    #[test]
    fn rejects_out_of_range_access() {
        let region = MemoryRegion::new("test", 4);
        assert!(region.read_u32(1).is_err());
        assert!(region.write_u16(3, 0).is_err());
        assert!(region.read_u32(0).is_ok());
    }

    #[test]
    fn subregion_offsets_are_relative() {
        let root = MemoryRegion::new("root", 16);
        root.write_u16(8, 0xBEEF).unwrap();
        let sub = root.subregion_sized("sub", 8, 4).unwrap();
        assert_eq!(sub.read_u16(0).unwrap(), 0xBEEF);
        assert_eq!(sub.base_offset(), 8);
        // Beyond the declared size but within the root: allowed with warning.
        assert!(sub.read_u16(6).is_ok());
        // Beyond the root: error.
        assert!(sub.read_u16(7).is_err());
    }

    #[test]
    fn watcher_sees_absolute_write_ranges() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let root = MemoryRegion::new("root", 16);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        root.set_watcher(Box::new(move |offset, len| {
            sink.borrow_mut().push((offset, len));
        }));

        let sub = root.subregion_sized("sub", 4, 8).unwrap();
        sub.write_u32(2, 1).unwrap();
        assert_eq!(*seen.borrow(), vec![(6, 4)]);
    }

    #[test]
    fn reader_pascal_strings() {
        let region = MemoryRegion::new("test", 16);
        region.write_pstr(0, "Mac").unwrap();
        let mut reader = Reader::new(region);
        assert_eq!(reader.next_pstr(None).unwrap(), "Mac");
        assert_eq!(reader.offset(), 4);
    }

    #[test]
    fn reader_fixed_length_pascal_strings() {
        let region = MemoryRegion::new("test", 66);
        region.write_pstr(0, "App").unwrap();
        let mut reader = Reader::new(region);
        assert_eq!(reader.next_pstr(Some(63)).unwrap(), "App");
        assert_eq!(reader.offset(), 64);
    }

    #[test]
    fn align_to_rounds_up_to_block_boundary() {
        let region = MemoryRegion::new("test", 64);
        let mut reader = Reader::new(region);
        reader.skip(3);
        reader.align_to(16);
        assert_eq!(reader.offset(), 16);
        reader.align_to(16);
        assert_eq!(reader.offset(), 16);
    }
}
