// Text rendering: a built-in fixed 8x8 face that needs no resources, plus
// bitmap fonts parsed out of 'FONT'/'NFNT' strikes. Both draw through the
// raster's bit copier so glyphs land on arbitrary pixel boundaries.

use log::warn;

use crate::errors::{EmuError, Result};
use crate::graphics::bitmap::BitmapImage;
use crate::graphics::new_rect;
use crate::memory::{MemoryRegion, Reader};
use crate::records::{FontRecord, Record};

#[derive(Debug, Clone, Copy, Default)]
pub struct FontInfo {
    pub ascent: i16,
    pub descent: i16,
    pub wid_max: i16,
    pub leading: i16,
}

pub trait Font {
    /// Draws `ch` with its top-left corner at (x, y); returns the advance.
    fn draw_char(&self, image: &mut BitmapImage, ch: u8, x: i16, y: i16) -> i16;

    fn char_width(&self, ch: u8) -> i16;

    fn font_info(&self) -> FontInfo;

    fn line_height(&self) -> i16 {
        let info = self.font_info();
        info.ascent + info.descent + info.leading
    }

    /// Draws `text` with its top-left corner at (x, y); a carriage return
    /// starts a new line. Returns the width in pixels of the longest line.
    fn draw_string(&self, image: &mut BitmapImage, text: &str, x: i16, y: i16) -> i16 {
        let mut x_offset = 0;
        let mut widest = 0;
        let mut y = y;
        for ch in text.bytes() {
            if ch == b'\r' {
                x_offset = 0;
                y += self.line_height();
                continue;
            }
            x_offset += self.draw_char(image, ch, x + x_offset, y);
            widest = widest.max(x_offset);
        }
        widest
    }

    fn string_width(&self, text: &str) -> i16 {
        text.bytes().map(|ch| self.char_width(ch)).sum()
    }
}

/// The glyph used for the Apple menu title (code 0x14 in the system font).
pub const APPLE_GLYPH: u8 = 0x14;

/// The command-key clover (code 0x11 in the system font).
pub const COMMAND_GLYPH: u8 = 0x11;

const GLYPH_WIDTH: i16 = 8;
const GLYPH_HEIGHT: i16 = 8;

/// A fixed-width 8x8 face covering printable ASCII; anything else renders as
/// the fallback box. Always available, no resources required.
pub struct BuiltInFont;

static SYSTEM_FONT: BuiltInFont = BuiltInFont;

pub fn system_font() -> &'static BuiltInFont {
    &SYSTEM_FONT
}

impl Font for BuiltInFont {
    fn draw_char(&self, image: &mut BitmapImage, ch: u8, x: i16, y: i16) -> i16 {
        let glyph = glyph_for(ch);
        image.copy_bits(
            glyph,
            &new_rect(0, 0, GLYPH_WIDTH, GLYPH_HEIGHT),
            &new_rect(0, 0, GLYPH_WIDTH, GLYPH_HEIGHT),
            &new_rect(x, y, GLYPH_WIDTH, GLYPH_HEIGHT),
        );
        GLYPH_WIDTH
    }

    fn char_width(&self, _ch: u8) -> i16 {
        GLYPH_WIDTH
    }

    fn font_info(&self) -> FontInfo {
        FontInfo { ascent: 7, descent: 1, wid_max: GLYPH_WIDTH, leading: 2 }
    }
}

fn glyph_for(ch: u8) -> &'static [u8; 8] {
    match ch {
        APPLE_GLYPH => &APPLE_GLYPH_BITS,
        COMMAND_GLYPH => &COMMAND_GLYPH_BITS,
        0x20..=0x7E => &GLYPHS[(ch - 0x20) as usize],
        _ => &FALLBACK_GLYPH,
    }
}

const FALLBACK_GLYPH: [u8; 8] = [0x00, 0x7E, 0x42, 0x42, 0x42, 0x42, 0x7E, 0x00];

const APPLE_GLYPH_BITS: [u8; 8] = [0x08, 0x10, 0x3C, 0x7E, 0x7C, 0x7E, 0x3C, 0x00];

const COMMAND_GLYPH_BITS: [u8; 8] = [0x00, 0x66, 0x66, 0x3C, 0x3C, 0x66, 0x66, 0x00];

// One row per byte, MSB-first, glyphs left-anchored in a 7-wide cell.
#[rustfmt::skip]
const GLYPHS: [[u8; 8]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // space
    [0x10, 0x10, 0x10, 0x10, 0x10, 0x00, 0x10, 0x00], // !
    [0x28, 0x28, 0x28, 0x00, 0x00, 0x00, 0x00, 0x00], // "
    [0x28, 0x28, 0x7C, 0x28, 0x7C, 0x28, 0x28, 0x00], // #
    [0x10, 0x3C, 0x50, 0x38, 0x14, 0x78, 0x10, 0x00], // $
    [0x60, 0x64, 0x08, 0x10, 0x20, 0x4C, 0x0C, 0x00], // %
    [0x30, 0x48, 0x50, 0x20, 0x54, 0x48, 0x34, 0x00], // &
    [0x10, 0x10, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00], // '
    [0x08, 0x10, 0x20, 0x20, 0x20, 0x10, 0x08, 0x00], // (
    [0x20, 0x10, 0x08, 0x08, 0x08, 0x10, 0x20, 0x00], // )
    [0x00, 0x28, 0x10, 0x7C, 0x10, 0x28, 0x00, 0x00], // *
    [0x00, 0x10, 0x10, 0x7C, 0x10, 0x10, 0x00, 0x00], // +
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x10, 0x20], // ,
    [0x00, 0x00, 0x00, 0x7C, 0x00, 0x00, 0x00, 0x00], // -
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00], // .
    [0x04, 0x04, 0x08, 0x10, 0x20, 0x40, 0x40, 0x00], // /
    [0x38, 0x44, 0x4C, 0x54, 0x64, 0x44, 0x38, 0x00], // 0
    [0x10, 0x30, 0x10, 0x10, 0x10, 0x10, 0x38, 0x00], // 1
    [0x38, 0x44, 0x04, 0x18, 0x20, 0x40, 0x7C, 0x00], // 2
    [0x38, 0x44, 0x04, 0x18, 0x04, 0x44, 0x38, 0x00], // 3
    [0x08, 0x18, 0x28, 0x48, 0x7C, 0x08, 0x08, 0x00], // 4
    [0x7C, 0x40, 0x78, 0x04, 0x04, 0x44, 0x38, 0x00], // 5
    [0x18, 0x20, 0x40, 0x78, 0x44, 0x44, 0x38, 0x00], // 6
    [0x7C, 0x04, 0x08, 0x10, 0x20, 0x20, 0x20, 0x00], // 7
    [0x38, 0x44, 0x44, 0x38, 0x44, 0x44, 0x38, 0x00], // 8
    [0x38, 0x44, 0x44, 0x3C, 0x04, 0x08, 0x30, 0x00], // 9
    [0x00, 0x18, 0x18, 0x00, 0x18, 0x18, 0x00, 0x00], // :
    [0x00, 0x18, 0x18, 0x00, 0x18, 0x18, 0x20, 0x00], // ;
    [0x08, 0x10, 0x20, 0x40, 0x20, 0x10, 0x08, 0x00], // <
    [0x00, 0x00, 0x7C, 0x00, 0x7C, 0x00, 0x00, 0x00], // =
    [0x20, 0x10, 0x08, 0x04, 0x08, 0x10, 0x20, 0x00], // >
    [0x38, 0x44, 0x04, 0x08, 0x10, 0x00, 0x10, 0x00], // ?
    [0x38, 0x44, 0x5C, 0x54, 0x5C, 0x40, 0x38, 0x00], // @
    [0x38, 0x44, 0x44, 0x7C, 0x44, 0x44, 0x44, 0x00], // A
    [0x78, 0x44, 0x44, 0x78, 0x44, 0x44, 0x78, 0x00], // B
    [0x38, 0x44, 0x40, 0x40, 0x40, 0x44, 0x38, 0x00], // C
    [0x70, 0x48, 0x44, 0x44, 0x44, 0x48, 0x70, 0x00], // D
    [0x7C, 0x40, 0x40, 0x78, 0x40, 0x40, 0x7C, 0x00], // E
    [0x7C, 0x40, 0x40, 0x78, 0x40, 0x40, 0x40, 0x00], // F
    [0x38, 0x44, 0x40, 0x5C, 0x44, 0x44, 0x3C, 0x00], // G
    [0x44, 0x44, 0x44, 0x7C, 0x44, 0x44, 0x44, 0x00], // H
    [0x38, 0x10, 0x10, 0x10, 0x10, 0x10, 0x38, 0x00], // I
    [0x1C, 0x08, 0x08, 0x08, 0x08, 0x48, 0x30, 0x00], // J
    [0x44, 0x48, 0x50, 0x60, 0x50, 0x48, 0x44, 0x00], // K
    [0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x7C, 0x00], // L
    [0x44, 0x6C, 0x54, 0x54, 0x44, 0x44, 0x44, 0x00], // M
    [0x44, 0x64, 0x54, 0x4C, 0x44, 0x44, 0x44, 0x00], // N
    [0x38, 0x44, 0x44, 0x44, 0x44, 0x44, 0x38, 0x00], // O
    [0x78, 0x44, 0x44, 0x78, 0x40, 0x40, 0x40, 0x00], // P
    [0x38, 0x44, 0x44, 0x44, 0x54, 0x48, 0x34, 0x00], // Q
    [0x78, 0x44, 0x44, 0x78, 0x50, 0x48, 0x44, 0x00], // R
    [0x38, 0x44, 0x40, 0x38, 0x04, 0x44, 0x38, 0x00], // S
    [0x7C, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x00], // T
    [0x44, 0x44, 0x44, 0x44, 0x44, 0x44, 0x38, 0x00], // U
    [0x44, 0x44, 0x44, 0x44, 0x44, 0x28, 0x10, 0x00], // V
    [0x44, 0x44, 0x44, 0x54, 0x54, 0x6C, 0x44, 0x00], // W
    [0x44, 0x44, 0x28, 0x10, 0x28, 0x44, 0x44, 0x00], // X
    [0x44, 0x44, 0x28, 0x10, 0x10, 0x10, 0x10, 0x00], // Y
    [0x7C, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7C, 0x00], // Z
    [0x38, 0x20, 0x20, 0x20, 0x20, 0x20, 0x38, 0x00], // [
    [0x40, 0x40, 0x20, 0x10, 0x08, 0x04, 0x04, 0x00], // backslash
    [0x38, 0x08, 0x08, 0x08, 0x08, 0x08, 0x38, 0x00], // ]
    [0x10, 0x28, 0x44, 0x00, 0x00, 0x00, 0x00, 0x00], // ^
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7C], // _
    [0x20, 0x10, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00], // `
    [0x00, 0x00, 0x38, 0x04, 0x3C, 0x44, 0x3C, 0x00], // a
    [0x40, 0x40, 0x78, 0x44, 0x44, 0x44, 0x78, 0x00], // b
    [0x00, 0x00, 0x38, 0x44, 0x40, 0x44, 0x38, 0x00], // c
    [0x04, 0x04, 0x3C, 0x44, 0x44, 0x44, 0x3C, 0x00], // d
    [0x00, 0x00, 0x38, 0x44, 0x7C, 0x40, 0x38, 0x00], // e
    [0x18, 0x24, 0x20, 0x70, 0x20, 0x20, 0x20, 0x00], // f
    [0x00, 0x00, 0x3C, 0x44, 0x44, 0x3C, 0x04, 0x38], // g
    [0x40, 0x40, 0x78, 0x44, 0x44, 0x44, 0x44, 0x00], // h
    [0x10, 0x00, 0x30, 0x10, 0x10, 0x10, 0x38, 0x00], // i
    [0x08, 0x00, 0x18, 0x08, 0x08, 0x08, 0x48, 0x30], // j
    [0x40, 0x40, 0x48, 0x50, 0x60, 0x50, 0x48, 0x00], // k
    [0x30, 0x10, 0x10, 0x10, 0x10, 0x10, 0x38, 0x00], // l
    [0x00, 0x00, 0x68, 0x54, 0x54, 0x54, 0x54, 0x00], // m
    [0x00, 0x00, 0x78, 0x44, 0x44, 0x44, 0x44, 0x00], // n
    [0x00, 0x00, 0x38, 0x44, 0x44, 0x44, 0x38, 0x00], // o
    [0x00, 0x00, 0x78, 0x44, 0x44, 0x78, 0x40, 0x40], // p
    [0x00, 0x00, 0x3C, 0x44, 0x44, 0x3C, 0x04, 0x04], // q
    [0x00, 0x00, 0x58, 0x64, 0x40, 0x40, 0x40, 0x00], // r
    [0x00, 0x00, 0x3C, 0x40, 0x38, 0x04, 0x78, 0x00], // s
    [0x20, 0x20, 0x70, 0x20, 0x20, 0x24, 0x18, 0x00], // t
    [0x00, 0x00, 0x44, 0x44, 0x44, 0x44, 0x3C, 0x00], // u
    [0x00, 0x00, 0x44, 0x44, 0x44, 0x28, 0x10, 0x00], // v
    [0x00, 0x00, 0x44, 0x54, 0x54, 0x54, 0x28, 0x00], // w
    [0x00, 0x00, 0x44, 0x28, 0x10, 0x28, 0x44, 0x00], // x
    [0x00, 0x00, 0x44, 0x44, 0x44, 0x3C, 0x04, 0x38], // y
    [0x00, 0x00, 0x7C, 0x08, 0x10, 0x20, 0x7C, 0x00], // z
    [0x18, 0x20, 0x20, 0x40, 0x20, 0x20, 0x18, 0x00], // {
    [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x00], // |
    [0x30, 0x08, 0x08, 0x04, 0x08, 0x08, 0x30, 0x00], // }
    [0x00, 0x00, 0x24, 0x54, 0x48, 0x00, 0x00, 0x00], // ~
];

/// A bitmap font backed by a 'FONT'/'NFNT' strike.
pub struct ResFont {
    header: FontRecord,
    /// The strike: `row_words * 2` bytes per row, `f_rect_height` rows.
    image: Vec<u8>,
    /// Bit offsets into each strike row, one per glyph plus a terminator.
    locations: Vec<u16>,
    /// Packed (kern offset, advance width) per glyph; 0xFFFF for missing.
    offset_widths: Vec<u16>,
}

impl ResFont {
    pub fn parse(data: &MemoryRegion) -> Result<ResFont> {
        let mut reader = Reader::new(data.clone());
        let header = reader.next_record::<FontRecord>()?;
        if header.last_char < header.first_char {
            return Err(EmuError::malformed("font strike with inverted char range".to_string()));
        }

        let strike_bytes = header.row_words as usize * 2 * header.f_rect_height as usize;
        let image = reader.next_region("strike", strike_bytes)?.read_bytes(0, strike_bytes)?;

        // One location per glyph, plus the missing glyph and the final
        // boundary entry.
        let glyph_slots = (header.last_char - header.first_char) as usize + 3;
        let mut locations = Vec::with_capacity(glyph_slots);
        for _ in 0..glyph_slots {
            locations.push(reader.next_u16()?);
        }

        // The offset/width table sits `owt_loc` words past its own field.
        let owt_field = FontRecord::field("owt_loc");
        let owt_offset = owt_field.offset + header.owt_loc as usize * 2;
        let mut owt_reader = Reader::at(data.clone(), owt_offset);
        let mut offset_widths = Vec::with_capacity(glyph_slots);
        for _ in 0..glyph_slots - 1 {
            offset_widths.push(owt_reader.next_u16()?);
        }

        Ok(ResFont { header, image, locations, offset_widths })
    }

    fn glyph_index(&self, ch: u8) -> Option<usize> {
        let code = ch as i16;
        if code < self.header.first_char || code > self.header.last_char {
            return None;
        }
        let index = (code - self.header.first_char) as usize;
        if self.offset_widths.get(index) == Some(&0xFFFF) {
            return None;
        }
        Some(index)
    }

    fn row_bytes(&self) -> usize {
        self.header.row_words as usize * 2
    }
}

impl Font for ResFont {
    fn draw_char(&self, image: &mut BitmapImage, ch: u8, x: i16, y: i16) -> i16 {
        let index = match self.glyph_index(ch) {
            Some(index) => index,
            None => return self.char_width(ch),
        };
        let start = self.locations[index] as usize;
        let end = self.locations[index + 1] as usize;
        if end <= start {
            return self.char_width(ch);
        }

        let entry = self.offset_widths[index];
        let kern = (entry >> 8) as u8 as i16 + self.header.kern_max;

        let width = end - start;
        let height = self.header.f_rect_height as usize;
        let glyph_row_bytes = crate::graphics::pixel_width_to_bytes(width as i32) as usize;
        let mut glyph = vec![0u8; glyph_row_bytes * height];
        for row in 0..height {
            bit_copy_row(
                &self.image[self.row_bytes() * row..],
                start,
                width,
                &mut glyph[glyph_row_bytes * row..],
            );
        }
        image.copy_bits(
            &glyph,
            &new_rect(0, 0, width as i16, height as i16),
            &new_rect(0, 0, width as i16, height as i16),
            &new_rect(x + kern, y, width as i16, height as i16),
        );
        self.char_width(ch)
    }

    fn char_width(&self, ch: u8) -> i16 {
        match self.glyph_index(ch) {
            Some(index) => (self.offset_widths[index] & 0xFF) as i16,
            None => {
                warn!("glyph 0x{:02x} missing from strike", ch);
                self.header.wid_max
            }
        }
    }

    fn font_info(&self) -> FontInfo {
        FontInfo {
            ascent: self.header.ascent,
            descent: self.header.descent,
            wid_max: self.header.wid_max,
            leading: self.header.leading,
        }
    }
}

fn bit_copy_row(src: &[u8], src_bit: usize, len: usize, dst: &mut [u8]) {
    crate::graphics::copybits::bit_copy(src, src_bit, len, dst, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_font_draws_fixed_cells() {
        let mut image = BitmapImage::new(64, 8);
        let width = system_font().draw_string(&mut image, "AB", 0, 0);
        assert_eq!(width, 16);
        // 'A' row 3 is 0x7C: bits 1..6 set at y = 3.
        assert!(image.bit(1, 3));
        assert!(image.bit(5, 3));
        assert!(!image.bit(7, 3));
    }

    #[test]
    fn builtin_font_metrics() {
        assert_eq!(system_font().char_width(b'M'), 8);
        assert_eq!(system_font().string_width("Hello"), 40);
        let info = system_font().font_info();
        assert_eq!(info.ascent + info.descent, 8);
    }

    #[test]
    fn carriage_return_starts_a_new_line() {
        let mut image = BitmapImage::new(32, 32);
        system_font().draw_string(&mut image, "|\r|", 0, 0);
        // The vertical bar column appears on both lines.
        assert!(image.bit(3, 2));
        assert!(image.bit(3, 2 + system_font().line_height() as i32));
    }

    #[test]
    fn res_font_round_trip() {
        // A strike with chars 'A'..'B', 2 px wide each, 3 rows tall.
        let region = MemoryRegion::new("font", 128);
        let header = FontRecord {
            font_type: 0x9000u16 as i16,
            first_char: 65,
            last_char: 66,
            wid_max: 2,
            kern_max: 0,
            n_descent: 0,
            f_rect_width: 2,
            f_rect_height: 3,
            owt_loc: 0, // patched below
            ascent: 2,
            descent: 1,
            leading: 0,
            row_words: 1,
        };
        // Layout: header (26), strike (2 * 3 = 6), locations (4 * 2 = 8),
        // then the offset/width table.
        let strike_at = FontRecord::SIZE;
        let locations_at = strike_at + 6;
        let owt_at = locations_at + 8;
        let owt_field = FontRecord::field("owt_loc");
        let header = FontRecord {
            owt_loc: ((owt_at - owt_field.offset) / 2) as u16,
            ..header
        };
        header.write_to(&region, 0).unwrap();

        // Strike rows: 'A' = bits 0-1, 'B' = bits 2-3.
        region.write_bytes(strike_at, &[0b1100_1100, 0b1100_0000, 0b0011_0000]).unwrap();
        for (index, location) in [0u16, 2, 4, 4].iter().enumerate() {
            region.write_u16(locations_at + index * 2, *location).unwrap();
        }
        // (offset 0, width 2) for both glyphs; terminator missing-entry.
        region.write_u16(owt_at, 0x0002).unwrap();
        region.write_u16(owt_at + 2, 0x0002).unwrap();
        region.write_u16(owt_at + 4, 0xFFFF).unwrap();

        let font = ResFont::parse(&region).unwrap();
        assert_eq!(font.char_width(b'A'), 2);
        assert_eq!(font.font_info().ascent, 2);

        let mut image = BitmapImage::new(16, 4);
        font.draw_char(&mut image, b'A', 0, 0);
        assert!(image.bit(0, 0) && image.bit(1, 0));
        assert!(image.bit(0, 1));
        assert!(!image.bit(0, 2));

        font.draw_char(&mut image, b'B', 4, 0);
        assert!(!image.bit(4, 0));
        assert!(image.bit(4, 2));
    }
}
