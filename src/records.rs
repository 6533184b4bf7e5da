// Fixed-layout records and the schema codec behind them. Rather than scatter
// hand-written offset math everywhere, each record declares its fields once
// and the `record!` macro derives the byte size, a big-endian reader/writer
// pair, and a field table used by the access policy to whitelist individual
// fields of a record placed in emulated memory.

use crate::errors::{EmuError, Result};
use crate::memory::MemoryRegion;

/// Describes one field of a record for the field table.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// A scalar of the given byte width.
    Scalar(usize),
    /// A nested record with its own field table and total size.
    Record(&'static [FieldDef], usize),
}

impl FieldKind {
    pub const fn size(&self) -> usize {
        match *self {
            FieldKind::Scalar(size) => size,
            FieldKind::Record(_, size) => size,
        }
    }
}

/// A resolved `(offset, size)` byte range of a field within a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    pub offset: usize,
    pub size: usize,
}

/// Resolves a dotted field path (e.g. `"port.port_rect"`) against a field
/// table, returning the byte range of the named field.
pub fn field_in(fields: &'static [FieldDef], path: &str) -> Option<Field> {
    let mut parts = path.splitn(2, '.');
    let head = parts.next()?;
    let rest = parts.next();

    let mut offset = 0;
    for def in fields {
        if def.name == head {
            return match (rest, def.kind) {
                (None, kind) => Some(Field { offset, size: kind.size() }),
                (Some(tail), FieldKind::Record(inner, _)) => {
                    let field = field_in(inner, tail)?;
                    Some(Field { offset: offset + field.offset, size: field.size })
                }
                (Some(_), FieldKind::Scalar(_)) => None,
            };
        }
        offset += def.kind.size();
    }
    None
}

/// A value that knows how to move itself between host form and big-endian
/// bytes in a MemoryRegion. Implemented for the primitive widths and, via a
/// blanket impl, for every `Record`.
pub trait FieldCodec: Sized {
    const SIZE: usize;
    const KIND: FieldKind;
    fn get(region: &MemoryRegion, offset: usize) -> Result<Self>;
    fn put(&self, region: &MemoryRegion, offset: usize) -> Result<()>;
}

/// A fixed-layout record with a known byte size and field table.
pub trait Record: Sized {
    const SIZE: usize;
    const FIELDS: &'static [FieldDef];
    fn read_from(region: &MemoryRegion, offset: usize) -> Result<Self>;
    fn write_to(&self, region: &MemoryRegion, offset: usize) -> Result<()>;

    /// Resolves a dotted field path against this record's layout.
    fn field(path: &str) -> Field {
        match field_in(Self::FIELDS, path) {
            Some(field) => field,
            None => panic!("no field '{}' in record", path),
        }
    }
}

impl<T: Record> FieldCodec for T {
    const SIZE: usize = T::SIZE;
    const KIND: FieldKind = FieldKind::Record(T::FIELDS, T::SIZE);
    fn get(region: &MemoryRegion, offset: usize) -> Result<Self> {
        T::read_from(region, offset)
    }
    fn put(&self, region: &MemoryRegion, offset: usize) -> Result<()> {
        self.write_to(region, offset)
    }
}

macro_rules! scalar_codec {
    ($ty:ty, $size:expr, $read:ident, $write:ident) => {
        impl FieldCodec for $ty {
            const SIZE: usize = $size;
            const KIND: FieldKind = FieldKind::Scalar($size);
            fn get(region: &MemoryRegion, offset: usize) -> Result<Self> {
                region.$read(offset)
            }
            fn put(&self, region: &MemoryRegion, offset: usize) -> Result<()> {
                region.$write(offset, *self)
            }
        }
    };
}

scalar_codec!(u8, 1, read_u8, write_u8);
scalar_codec!(u16, 2, read_u16, write_u16);
scalar_codec!(i16, 2, read_i16, write_i16);
scalar_codec!(u32, 4, read_u32, write_u32);
scalar_codec!(i32, 4, read_i32, write_i32);

/// A big-endian 24-bit quantity packed against a byte (resource map entries).
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct U24(pub u32);

impl FieldCodec for U24 {
    const SIZE: usize = 3;
    const KIND: FieldKind = FieldKind::Scalar(3);
    fn get(region: &MemoryRegion, offset: usize) -> Result<Self> {
        Ok(U24(region.read_u24(offset)?))
    }
    fn put(&self, region: &MemoryRegion, offset: usize) -> Result<()> {
        region.write_u24(offset, self.0)
    }
}

/// An 8-byte QuickDraw fill pattern, one row per byte.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Pattern {
    pub bytes: [u8; 8],
}

impl Pattern {
    pub const fn of(bytes: [u8; 8]) -> Self {
        Pattern { bytes }
    }
}

impl FieldCodec for Pattern {
    const SIZE: usize = 8;
    const KIND: FieldKind = FieldKind::Scalar(8);
    fn get(region: &MemoryRegion, offset: usize) -> Result<Self> {
        let mut bytes = [0u8; 8];
        region.read_exact(&mut bytes, offset)?;
        Ok(Pattern { bytes })
    }
    fn put(&self, region: &MemoryRegion, offset: usize) -> Result<()> {
        region.write_bytes(offset, &self.bytes)
    }
}

/// A 16x16 1-bpp plane (cursor data and mask).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bits16 {
    pub rows: [u8; 32],
}

impl Default for Bits16 {
    fn default() -> Self {
        Bits16 { rows: [0u8; 32] }
    }
}

impl FieldCodec for Bits16 {
    const SIZE: usize = 32;
    const KIND: FieldKind = FieldKind::Scalar(32);
    fn get(region: &MemoryRegion, offset: usize) -> Result<Self> {
        let mut rows = [0u8; 32];
        region.read_exact(&mut rows, offset)?;
        Ok(Bits16 { rows })
    }
    fn put(&self, region: &MemoryRegion, offset: usize) -> Result<()> {
        region.write_bytes(offset, &self.rows)
    }
}

macro_rules! record {
    ($(#[$meta:meta])* pub struct $name:ident {
        $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty ),+ $(,)?
    }) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, Copy, PartialEq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )+
        }

        impl Record for $name {
            const SIZE: usize = 0 $( + <$ty as FieldCodec>::SIZE )+;
            const FIELDS: &'static [FieldDef] = &[
                $( FieldDef { name: stringify!($field), kind: <$ty as FieldCodec>::KIND }, )+
            ];

            fn read_from(region: &MemoryRegion, offset: usize) -> Result<Self> {
                let mut at = offset;
                $(
                    let $field = <$ty as FieldCodec>::get(region, at)?;
                    at += <$ty as FieldCodec>::SIZE;
                )+
                let _ = at;
                Ok($name { $( $field, )+ })
            }

            fn write_to(&self, region: &MemoryRegion, offset: usize) -> Result<()> {
                let mut at = offset;
                $(
                    <$ty as FieldCodec>::put(&self.$field, region, at)?;
                    at += <$ty as FieldCodec>::SIZE;
                )+
                let _ = at;
                Ok(())
            }
        }
    };
}

// Mac OS base aliases used throughout the crate.
pub type Ptr = u32;
pub type Handle = u32;
pub type OSType = u32;
pub type ResId = i16;

/// Renders an OSType as its four-character form for logs and cache keys.
pub fn os_type_name(os_type: OSType) -> String {
    os_type.to_be_bytes().iter().map(|&b| b as char).collect()
}

/// Builds an OSType from a four-character literal.
pub const fn os_type(tag: &[u8; 4]) -> OSType {
    u32::from_be_bytes(*tag)
}

record! {
    /// A QuickDraw point; vertical coordinate first, as laid out in memory.
    pub struct Point {
        pub y: i16,
        pub x: i16,
    }
}

record! {
    pub struct Rect {
        pub top: i16,
        pub left: i16,
        pub bottom: i16,
        pub right: i16,
    }
}

record! {
    pub struct BitMap {
        pub base_addr: Ptr,
        pub row_bytes: i16,
        pub bounds: Rect,
    }
}

record! {
    pub struct CursorRecord {
        pub data: Bits16,
        pub mask: Bits16,
        pub hot_spot: Point,
    }
}

record! {
    /// Per-drawable QuickDraw state, laid out exactly as Inside Macintosh
    /// describes a GrafPort (108 bytes).
    pub struct GrafPort {
        pub device: i16,
        pub port_bits: BitMap,
        pub port_rect: Rect,
        pub visible_region: Handle,
        pub clip_region: Handle,
        pub back_pattern: Pattern,
        pub fill_pattern: Pattern,
        pub pen_location: Point,
        pub pen_size: Point,
        pub pen_mode: i16,
        pub pen_pattern: Pattern,
        pub pen_visibility: i16,
        pub text_font: i16,
        pub text_face: i16,
        pub text_mode: i16,
        pub text_size: i16,
        pub space_extra: i32,
        pub foreground_color: u32,
        pub background_color: u32,
        pub color_bit: i16,
        pub pattern_stretch: i16,
        pub picture_save: Handle,
        pub region_save: Handle,
        pub polygon_save: Handle,
        pub graf_procs: Ptr,
    }
}

record! {
    /// A window record embedding its GrafPort (156 bytes).
    /// `window_definition_proc` holds the window variation code directly
    /// rather than a real 'WDEF' handle; only definition ID 0 is supported
    /// so the field never escapes to emulated code as a handle.
    pub struct WindowRecord {
        pub port: GrafPort,
        pub window_kind: i16,
        pub visible: u8,
        pub hilited: u8,
        pub has_close: u8,
        pub spare_flag: u8,
        pub structure_region: Handle,
        pub content_region: Handle,
        pub update_region: Handle,
        pub window_definition_proc: Handle,
        pub data_handle: Handle,
        pub title_handle: Handle,
        pub title_width: i16,
        pub control_list: Handle,
        pub next_window: Ptr,
        pub window_pic: Handle,
        pub reference_constant: u32,
    }
}

record! {
    /// A dialog record wrapping a WindowRecord (170 bytes).
    pub struct DialogRecord {
        pub window_record: WindowRecord,
        pub items: Handle,
        pub text_handle: Handle,
        pub edit_field: i16,
        pub edit_open: i16,
        pub default_item: i16,
    }
}

record! {
    pub struct EventRecord {
        pub what: u16,
        pub message: u32,
        pub when: u32,
        pub location: Point,
        pub modifiers: u16,
    }
}

record! {
    /// The fixed header of a scanline-encoded region. Rectangular regions
    /// are exactly this header (size 10) with no scanline data following.
    pub struct RegionRecord {
        pub region_size: u16,
        pub bounding_box: Rect,
    }
}

record! {
    /// The QuickDraw globals that sit immediately below the address stored
    /// at A5, ordered low to high memory with `the_port` on top (130 bytes).
    pub struct QDGlobals {
        pub random_seed: i32,
        pub screen_bits: BitMap,
        pub arrow: CursorRecord,
        pub dk_gray: Pattern,
        pub lt_gray: Pattern,
        pub gray: Pattern,
        pub black: Pattern,
        pub white: Pattern,
        pub the_port: Ptr,
    }
}

record! {
    /// Resource fork top-level header.
    pub struct ResourceHeader {
        pub data_offset: u32,
        pub map_offset: u32,
        pub data_length: u32,
        pub map_length: u32,
    }
}

record! {
    /// Resource map header (begins with a copy of the file header).
    pub struct ResourceMapHeader {
        pub file_header: ResourceHeader,
        pub reserved_handle: u32,
        pub reserved_file_ref: u16,
        pub file_attributes: u16,
        pub type_list_offset: u16,
        pub name_list_offset: u16,
    }
}

record! {
    /// One entry of the resource type list. `count` stores count - 1.
    pub struct ResourceTypeItem {
        pub type_id: OSType,
        pub count: u16,
        pub offset: u16,
    }
}

record! {
    /// One entry of a per-type reference list.
    pub struct ResourceEntry {
        pub id: u16,
        pub name_offset: u16,
        pub attributes: u8,
        pub data_offset: U24,
        pub reserved_handle: u32,
    }
}

record! {
    /// 'CODE' segment 0 header.
    pub struct SegmentTableHeader {
        pub above_a5: u32,
        pub below_a5: u32,
        pub table_size: u32,
        pub table_offset: u32,
    }
}

record! {
    /// A loaded jump-table entry: `JMP` to an absolute heap address.
    pub struct SegmentTableEntry {
        pub segment_id: u16,
        pub jmp_instr: u16,
        pub address: u32,
    }
}

record! {
    /// The fixed prefix of a serialized dialog item.
    pub struct ItemHeader {
        pub item: Handle,
        pub bounds: Rect,
        pub type_and_disabled: u8,
    }
}

record! {
    pub struct DateTimeRec {
        pub year: u16,
        pub month: u16,
        pub day: u16,
        pub hour: u16,
        pub minute: u16,
        pub second: u16,
        pub day_of_week: u16,
    }
}

record! {
    pub struct SysEnvRecord {
        pub environs_version: i16,
        pub machine_type: i16,
        pub system_version: i16,
        pub processor: i16,
        pub has_fpu: u8,
        pub has_color_qd: u8,
        pub keyboard_type: i16,
        pub at_drvr_vers_num: i16,
        pub sys_v_ref_num: i16,
    }
}

record! {
    /// Fixed header of a 'FONT'/'NFNT' bitmap font resource.
    pub struct FontRecord {
        pub font_type: i16,
        pub first_char: i16,
        pub last_char: i16,
        pub wid_max: i16,
        pub kern_max: i16,
        pub n_descent: i16,
        pub f_rect_width: i16,
        pub f_rect_height: i16,
        pub owt_loc: u16,
        pub ascent: i16,
        pub descent: i16,
        pub leading: i16,
        pub row_words: u16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes_match_classic_layouts() {
        assert_eq!(<Point as Record>::SIZE, 4);
        assert_eq!(<Rect as Record>::SIZE, 8);
        assert_eq!(<BitMap as Record>::SIZE, 14);
        assert_eq!(<GrafPort as Record>::SIZE, 108);
        assert_eq!(<WindowRecord as Record>::SIZE, 156);
        assert_eq!(<DialogRecord as Record>::SIZE, 170);
        assert_eq!(<EventRecord as Record>::SIZE, 16);
        assert_eq!(<RegionRecord as Record>::SIZE, 10);
        assert_eq!(<QDGlobals as Record>::SIZE, 130);
        assert_eq!(<ResourceHeader as Record>::SIZE, 16);
        assert_eq!(<ResourceMapHeader as Record>::SIZE, 28);
        assert_eq!(<ResourceEntry as Record>::SIZE, 12);
        assert_eq!(<SegmentTableEntry as Record>::SIZE, 8);
        assert_eq!(<ItemHeader as Record>::SIZE, 13);
    }

    #[test]
    fn records_round_trip_through_memory() {
        let region = MemoryRegion::new("test", 64);
        let rect = Rect { top: -4, left: 8, bottom: 100, right: 200 };
        rect.write_to(&region, 10).unwrap();
        assert_eq!(Rect::read_from(&region, 10).unwrap(), rect);
        // Big-endian on the wire: top is at offset 10, sign intact.
        assert_eq!(region.read_i16(10).unwrap(), -4);
    }

    #[test]
    fn nested_records_round_trip() {
        let region = MemoryRegion::new("test", 256);
        let mut port = GrafPort::default();
        port.port_rect = Rect { top: 0, left: 0, bottom: 342, right: 512 };
        port.port_bits.bounds = Rect { top: -20, left: -30, bottom: 322, right: 482 };
        port.pen_mode = 8;
        port.write_to(&region, 0).unwrap();

        let back = GrafPort::read_from(&region, 0).unwrap();
        assert_eq!(back, port);
    }

    #[test]
    fn field_paths_resolve_to_byte_ranges() {
        assert_eq!(Rect::field("top"), Field { offset: 0, size: 2 });
        assert_eq!(Rect::field("bottom"), Field { offset: 4, size: 2 });
        assert_eq!(GrafPort::field("port_rect"), Field { offset: 16, size: 8 });
        assert_eq!(
            WindowRecord::field("port.port_bits.bounds"),
            Field { offset: 8, size: 8 }
        );
        assert_eq!(WindowRecord::field("window_kind"), Field { offset: 108, size: 2 });
        assert_eq!(WindowRecord::field("hilited"), Field { offset: 111, size: 1 });
        assert_eq!(WindowRecord::field("structure_region"), Field { offset: 114, size: 4 });
    }

    #[test]
    fn os_type_round_trip() {
        let code = os_type(b"CODE");
        assert_eq!(os_type_name(code), "CODE");
    }
}
