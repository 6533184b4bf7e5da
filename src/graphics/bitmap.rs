// A 1 bit-per-pixel raster with pattern fills, a scanline-region clip, and
// bit-accurate cross-image copies. Rows are padded to whole bytes, MSB first.
// The backing store is a MemoryRegion so an image can either own its pixels
// or alias a BitMap living in emulated memory.

use std::fs;
use std::path::Path;

use log::warn;

use crate::errors::Result;
use crate::graphics::copybits::bit_copy;
use crate::graphics::region::{self, OwnedRegion, Scanline};
use crate::graphics::{new_rect, pixel_width_to_bytes, rect_height, rect_width};
use crate::memory::MemoryRegion;
use crate::records::{BitMap, Pattern, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Copy,
    XOr,
    NotXOr,
}

impl FillMode {
    /// Maps a QuickDraw pattern transfer mode to a raster fill mode.
    pub fn from_pattern_mode(mode: i16) -> FillMode {
        match mode {
            8 => FillMode::Copy,
            10 => FillMode::XOr,
            14 => FillMode::NotXOr,
            _ => {
                warn!("unsupported pattern mode {}, falling back to patCopy", mode);
                FillMode::Copy
            }
        }
    }
}

fn rotate_byte_right(byte: u8, shift: u16) -> u8 {
    if shift % 8 == 0 {
        byte
    } else {
        byte.rotate_right((shift % 8) as u32)
    }
}

pub struct BitmapImage {
    width: i32,
    height: i32,
    row_bytes: i32,
    bits: MemoryRegion,
    clip: OwnedRegion,
}

impl BitmapImage {
    /// Allocates internal storage for a raster of `width` x `height` bits.
    pub fn new(width: i32, height: i32) -> Self {
        let row_bytes = pixel_width_to_bytes(width);
        BitmapImage {
            width,
            height,
            row_bytes,
            bits: MemoryRegion::new("Bitmap", (row_bytes * height) as usize),
            clip: region::new_rect_region(0, 0, width as i16, height as i16),
        }
    }

    /// Aliases a BitMap whose pixels live in `memory` at its base address.
    pub fn from_bitmap(bitmap: &BitMap, memory: &MemoryRegion) -> Result<Self> {
        let width = rect_width(&bitmap.bounds) as i32;
        let height = rect_height(&bitmap.bounds) as i32;
        let row_bytes = bitmap.row_bytes as i32;
        let bits = memory.subregion_sized(
            "PortBits",
            bitmap.base_addr as usize,
            (row_bytes * height) as usize,
        )?;
        Ok(BitmapImage {
            width,
            height,
            row_bytes,
            bits,
            clip: region::new_rect_region(0, 0, width as i16, height as i16),
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn bits(&self) -> &MemoryRegion {
        &self.bits
    }

    pub fn bounds(&self) -> Rect {
        new_rect(0, 0, self.width as i16, self.height as i16)
    }

    pub fn clip_region(&self) -> &OwnedRegion {
        &self.clip
    }

    /// Replaces the clip, intersected with the raster bounds.
    pub fn set_clip_region(&mut self, clip: &OwnedRegion) {
        let screen = region::new_rect_region(0, 0, self.width as i16, self.height as i16);
        self.clip = region::intersect(clip, &screen);
    }

    pub fn set_clip_rect(&mut self, rect: &Rect) {
        self.set_clip_region(&region::from_rect(rect));
    }

    /// The clip's inclusion intervals on row `y`.
    fn clip_spans(&self, y: i16) -> Scanline {
        for (from, to, spans) in self.clip.bands() {
            if y >= from && y < to {
                return spans;
            }
        }
        Vec::new()
    }

    pub fn fill_rect(&mut self, rect: &Rect, pattern: &Pattern, mode: FillMode) {
        // The pattern aligns with the left edge of the rect; rotating right
        // by the sub-byte offset keeps it anchored when the edge is not
        // byte aligned.
        let pattern_offset = rect.left.max(0) as u16 % 8;
        let height = rect_height(rect);
        for row in 0..height {
            let swatch = rotate_byte_right(pattern.bytes[(row % 8) as usize], pattern_offset);
            self.fill_row(rect.top + row, rect.left, rect.right, swatch, mode);
        }
    }

    pub fn frame_rect(&mut self, rect: &Rect, pattern: &Pattern, mode: FillMode) {
        let pattern_offset = rect.left.max(0) as u16 % 8;
        let frame: i16 = 1;
        let swatch =
            |row: i16| rotate_byte_right(pattern.bytes[(row.max(0) % 8) as usize], pattern_offset);
        for row in rect.top..(rect.top + frame).min(rect.bottom) {
            self.fill_row(row, rect.left, rect.right, swatch(row - rect.top), mode);
        }
        for row in (rect.top + frame)..(rect.bottom - frame) {
            self.fill_row(row, rect.left, rect.left + frame, swatch(row - rect.top), mode);
            self.fill_row(row, rect.right - frame, rect.right, swatch(row - rect.top), mode);
        }
        for row in (rect.bottom - frame).max(rect.top)..rect.bottom {
            self.fill_row(row, rect.left, rect.right, swatch(row - rect.top), mode);
        }
    }

    /// Rasterizes the ellipse inscribed in `rect` by tracking the offset at
    /// which `offset^2 * hh + row^2 * ww` leaves the ellipse.
    pub fn fill_ellipse(&mut self, rect: &Rect, pattern: &Pattern) {
        let half_width = (rect_width(rect) / 2) as i32;
        let half_height = (rect_height(rect) / 2) as i32;
        let origin_x = rect.left as i32 + half_width;
        let origin_y = rect.top as i32 + half_height;

        let hh = half_height * half_height;
        let ww = half_width * half_width;
        let hhww = hh * ww;

        let pattern_offset = rect.left.max(0) as u16 % 8;
        let row_swatch = |row: i32| {
            rotate_byte_right(pattern.bytes[(row.rem_euclid(8)) as usize], pattern_offset)
        };

        // The center row; the rest mirrors across it.
        self.fill_row(
            origin_y as i16,
            rect.left,
            rect.right,
            row_swatch(half_height),
            FillMode::Copy,
        );

        let mut last_offset = half_width;
        let mut slope_dx = 0;
        for row in 1..=half_height {
            let mut offset = last_offset - (slope_dx - 1);
            while offset > 0 {
                if offset * offset * hh + row * row * ww <= hhww {
                    break;
                }
                offset -= 1;
            }

            self.fill_row(
                (origin_y - row) as i16,
                (origin_x - offset) as i16,
                (origin_x + offset) as i16,
                row_swatch(half_height - row),
                FillMode::Copy,
            );
            self.fill_row(
                (origin_y + row) as i16,
                (origin_x - offset) as i16,
                (origin_x + offset) as i16,
                row_swatch(half_height + row),
                FillMode::Copy,
            );

            slope_dx = last_offset - offset;
            last_offset = offset;
        }
    }

    /// Fills the region (intersected with the clip), pattern-aligned to the
    /// region's bounding box.
    pub fn fill_region(&mut self, region: &OwnedRegion, pattern: &Pattern, mode: FillMode) {
        let clipped = region::intersect(region, &self.clip);
        let pattern_offset = region.rect.left.max(0) as u16 % 8;
        for (from, to, spans) in clipped.bands() {
            for row in from..to {
                let swatch = rotate_byte_right(
                    pattern.bytes[((row - region.rect.top).rem_euclid(8)) as usize],
                    pattern_offset,
                );
                for &(start, end) in &spans {
                    self.fill_span(row, start, end, swatch, mode);
                }
            }
        }
    }

    /// Fills `[start, end)` on `row` with `pattern`, honouring the clip.
    pub fn fill_row(&mut self, row: i16, start: i16, end: i16, pattern: u8, mode: FillMode) {
        if row < self.clip.rect.top || row >= self.clip.rect.bottom {
            return;
        }
        for (span_start, span_end) in self.clip_spans(row) {
            let clipped_start = start.max(span_start);
            let clipped_end = end.min(span_end);
            if clipped_start >= clipped_end {
                continue;
            }
            self.fill_span(row, clipped_start, clipped_end, pattern, mode);
        }
    }

    /// The unclipped core: masked partial bytes at the edges, whole bytes in
    /// between.
    fn fill_span(&mut self, row: i16, start: i16, end: i16, pattern: u8, mode: FillMode) {
        const MASK: [u8; 9] = [
             0b1111_1111, 0b0111_1111, 0b0011_1111, 0b0001_1111, 0b0000_1111, 0b0000_0111,
            0b0000_0011, 0b0000_0001, 0b0000_0000,
        ];

        if row < 0 || row as i32 >= self.height {
            return;
        }
        let start = start.max(0);
        let end = end.min(self.width as i16);
        if start >= end {
            return;
        }

        let mut index = (row as i32 * self.row_bytes + start as i32 / 8) as usize;
        let mut remaining = (end - start) as i32;

        let apply = |bits: &MemoryRegion, index: usize, mask: u8| {
            let current = bits.read_u8(index).unwrap_or(0);
            let updated = match mode {
                FillMode::Copy => (current & !mask) | (mask & pattern),
                FillMode::XOr => current ^ (mask & pattern),
                FillMode::NotXOr => current ^ (mask & !pattern),
            };
            let _ = bits.write_u8(index, updated);
        };

        // A start offset inside a byte; afterwards everything is aligned.
        let start_offset = (start % 8) as usize;
        if start_offset != 0 {
            let span = start_offset as i32 + remaining;
            if span <= 8 {
                // Start and end both land inside this byte.
                let mask = MASK[start_offset] & !MASK[span as usize];
                apply(&self.bits, index, mask);
                return;
            }
            apply(&self.bits, index, MASK[start_offset]);
            remaining -= 8 - start_offset as i32;
            index += 1;
        }

        let full_bytes = (remaining / 8) as usize;
        for offset in 0..full_bytes {
            apply(&self.bits, index + offset, 0xFF);
        }

        let trailing = (remaining % 8) as usize;
        if trailing != 0 {
            apply(&self.bits, index + full_bytes, !MASK[trailing]);
        }
    }

    /// Copies `src_rect` out of a raster of `src_dims` into `dst_rect` here.
    /// No scaling: both rects must have identical dimensions. Both sides are
    /// clipped; the copy itself is bit-accurate at arbitrary offsets.
    pub fn copy_bits(&mut self, src: &[u8], src_dims: &Rect, src_rect: &Rect, dst_rect: &Rect) {
        let height = rect_height(dst_rect);
        let width = rect_width(dst_rect);
        if height != rect_height(src_rect) || width != rect_width(src_rect) {
            warn!("copy_bits requires equal source and destination dimensions");
            return;
        }

        // Pixels of the destination rect outside the clip bounds, per side.
        let clip_rect = self.clip.rect;
        let clip_top = (clip_rect.top - dst_rect.top).max(0);
        let clip_bottom = (dst_rect.bottom - clip_rect.bottom).max(0);
        let clip_left = (clip_rect.left - dst_rect.left).max(0);
        let clip_right = (dst_rect.right - clip_rect.right).max(0);

        let clipped_height = height - clip_top - clip_bottom;
        let clipped_width = width - clip_left - clip_right;
        if clipped_height <= 0 || clipped_width <= 0 {
            return;
        }

        let src_row_bytes = pixel_width_to_bytes(rect_width(src_dims) as i32) as usize;

        for row in 0..clipped_height {
            let dst_y = row + dst_rect.top + clip_top;
            let src_y = row + src_rect.top + clip_top;
            if src_y < 0 || src_row_bytes * (src_y as usize + 1) > src.len() {
                continue;
            }
            let src_row = &src[src_row_bytes * src_y as usize..][..src_row_bytes];

            let mut dst_row = match self
                .bits
                .read_bytes((dst_y as i32 * self.row_bytes) as usize, self.row_bytes as usize)
            {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };

            for (span_start, span_end) in self.clip_spans(dst_y) {
                let dst_start = span_start.max(dst_rect.left + clip_left);
                let dst_end = span_end.min(dst_rect.left + clip_left + clipped_width);
                if dst_start >= dst_end {
                    continue;
                }
                let src_start = src_rect.left + (dst_start - dst_rect.left);
                bit_copy(
                    src_row,
                    src_start as usize,
                    (dst_end - dst_start) as usize,
                    &mut dst_row,
                    dst_start as usize,
                );
            }

            let _ = self
                .bits
                .write_bytes((dst_y as i32 * self.row_bytes) as usize, &dst_row);
        }
    }

    pub fn copy_bitmap(&mut self, other: &BitmapImage, src_rect: &Rect, dst_rect: &Rect) {
        let src = match other.snapshot() {
            Ok(bytes) => bytes,
            Err(_) => return,
        };
        let dims = new_rect(0, 0, other.width as i16, other.height as i16);
        self.copy_bits(&src, &dims, src_rect, dst_rect);
    }

    pub fn snapshot(&self) -> Result<Vec<u8>> {
        self.bits.read_bytes(0, (self.row_bytes * self.height) as usize)
    }

    /// The bit at (x, y); out-of-bounds reads as 0.
    pub fn bit(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return false;
        }
        match self.bits.read_u8((y * self.row_bytes + x / 8) as usize) {
            Ok(byte) => byte & (0x80 >> (x % 8)) != 0,
            Err(_) => false,
        }
    }

    /// Writes the raster as a plain PBM file (debug screenshots).
    pub fn save_pbm(&self, path: &Path) -> Result<()> {
        let mut out = format!("P1 {} {}\n", self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(if self.bit(x, y) { '1' } else { '0' });
                out.push(' ');
            }
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }
}

/// Temporarily overrides an image's clip, restoring the old one on drop.
pub struct TempClip {
    saved: OwnedRegion,
}

impl TempClip {
    pub fn set(image: &mut BitmapImage, clip: &OwnedRegion) -> TempClip {
        let saved = image.clip_region().clone();
        image.set_clip_region(clip);
        TempClip { saved }
    }

    pub fn set_rect(image: &mut BitmapImage, rect: &Rect) -> TempClip {
        Self::set(image, &region::from_rect(rect))
    }

    pub fn restore(self, image: &mut BitmapImage) {
        image.set_clip_region(&self.saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::{BLACK_PATTERN, GRAY_PATTERN};

    #[test]
    fn fill_rect_copy_sets_exactly_the_rect() {
        let mut image = BitmapImage::new(32, 32);
        image.fill_rect(&new_rect(4, 4, 8, 8), &BLACK_PATTERN, FillMode::Copy);
        for y in 0..32 {
            for x in 0..32 {
                let inside = x >= 4 && x < 12 && y >= 4 && y < 12;
                assert_eq!(image.bit(x, y), inside, "bit at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn fill_respects_a_rect_clip() {
        let mut image = BitmapImage::new(32, 32);
        image.set_clip_rect(&new_rect(4, 4, 8, 8));
        image.fill_rect(&new_rect(0, 0, 16, 16), &BLACK_PATTERN, FillMode::Copy);
        for y in 0..32 {
            for x in 0..32 {
                let inside = x >= 4 && x < 12 && y >= 4 && y < 12;
                assert_eq!(image.bit(x, y), inside, "bit at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn xor_fill_is_an_involution() {
        let mut image = BitmapImage::new(16, 16);
        image.fill_rect(&new_rect(0, 0, 9, 9), &GRAY_PATTERN, FillMode::Copy);
        let before = image.snapshot().unwrap();
        image.fill_rect(&new_rect(3, 3, 10, 10), &BLACK_PATTERN, FillMode::XOr);
        image.fill_rect(&new_rect(3, 3, 10, 10), &BLACK_PATTERN, FillMode::XOr);
        assert_eq!(image.snapshot().unwrap(), before);
    }

    #[test]
    fn unaligned_fill_edges_are_exact() {
        let mut image = BitmapImage::new(16, 1);
        image.fill_rect(&new_rect(3, 0, 7, 1), &BLACK_PATTERN, FillMode::Copy);
        // Bits 3..10 set: 0001_1111 1100_0000.
        assert_eq!(image.snapshot().unwrap(), vec![0b0001_1111, 0b1100_0000]);
    }

    #[test]
    fn fill_within_a_single_byte() {
        let mut image = BitmapImage::new(8, 1);
        image.fill_rect(&new_rect(2, 0, 3, 1), &BLACK_PATTERN, FillMode::Copy);
        assert_eq!(image.snapshot().unwrap(), vec![0b0011_1000]);
    }

    #[test]
    fn frame_rect_draws_a_one_pixel_outline() {
        let mut image = BitmapImage::new(8, 8);
        image.frame_rect(&new_rect(1, 1, 5, 5), &BLACK_PATTERN, FillMode::Copy);
        assert!(image.bit(1, 1));
        assert!(image.bit(5, 1));
        assert!(image.bit(1, 5));
        assert!(image.bit(3, 1));
        assert!(image.bit(1, 3));
        assert!(!image.bit(2, 2));
        assert!(!image.bit(3, 3));
        assert!(!image.bit(6, 6));
    }

    #[test]
    fn region_clipped_fill_skips_holes() {
        let mut image = BitmapImage::new(16, 16);
        let clip = region::subtract(
            &region::new_rect_region(0, 0, 16, 16),
            &region::new_rect_region(4, 4, 4, 4),
        );
        image.set_clip_region(&clip);
        image.fill_rect(&new_rect(0, 0, 16, 16), &BLACK_PATTERN, FillMode::Copy);
        assert!(image.bit(0, 0));
        assert!(image.bit(2, 5));
        assert!(image.bit(8, 5));
        assert!(!image.bit(5, 5));
        assert!(!image.bit(7, 7));
    }

    #[test]
    fn copy_bits_between_images() {
        let mut source = BitmapImage::new(16, 16);
        source.fill_rect(&new_rect(0, 0, 4, 4), &BLACK_PATTERN, FillMode::Copy);

        let mut dest = BitmapImage::new(16, 16);
        dest.copy_bitmap(&source, &new_rect(0, 0, 4, 4), &new_rect(5, 6, 4, 4));
        for y in 0..16 {
            for x in 0..16 {
                let inside = x >= 5 && x < 9 && y >= 6 && y < 10;
                assert_eq!(dest.bit(x, y), inside, "bit at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn copy_bits_save_and_restore_round_trip() {
        let mut screen = BitmapImage::new(16, 16);
        screen.fill_rect(&new_rect(0, 0, 16, 16), &GRAY_PATTERN, FillMode::Copy);
        let before = screen.snapshot().unwrap();

        // Save the area under a "menu", scribble on it, then restore.
        let area = new_rect(2, 3, 9, 5);
        let mut saved = BitmapImage::new(9, 5);
        saved.copy_bitmap(&screen, &area, &new_rect(0, 0, 9, 5));
        screen.fill_rect(&area, &BLACK_PATTERN, FillMode::Copy);
        screen.copy_bitmap(&saved, &new_rect(0, 0, 9, 5), &area);

        assert_eq!(screen.snapshot().unwrap(), before);
    }

    #[test]
    fn ellipse_is_symmetric_and_bounded() {
        let mut image = BitmapImage::new(17, 17);
        image.fill_ellipse(&new_rect(0, 0, 16, 16), &BLACK_PATTERN);
        assert!(image.bit(8, 8));
        assert!(image.bit(1, 8));
        assert!(image.bit(14, 8));
        assert!(image.bit(8, 1));
        assert!(!image.bit(0, 0));
        assert!(!image.bit(15, 0));
        assert!(!image.bit(0, 15));
        // Horizontal symmetry around the center column.
        for y in 0..16 {
            for x in 0..8 {
                assert_eq!(image.bit(8 - x, y), image.bit(8 + x, y), "at ({}, {})", x, y);
            }
        }
    }
}
