// PICT version 1 decoding, enough for the opcodes classic applications put
// in their dialog resources: a clip region, the version marker, short
// comments, and (packed) CopyBits rectangles. The decoded picture is a 1-bpp
// raster matching the picture frame.

use log::{debug, warn};

use crate::errors::{EmuError, Result};
use crate::graphics::copybits::bit_copy;
use crate::graphics::{normalize_rect, pixel_width_to_bytes};
use crate::memory::{MemoryRegion, Reader};
use crate::records::{Record, Rect};

/// A decoded picture: its normalized frame and the rasterized bits.
pub struct Picture {
    pub frame: Rect,
    pub row_bytes: usize,
    pub bits: Vec<u8>,
}

/// Reads just the picture frame (normalized to a (0, 0) origin).
pub fn picture_frame(region: &MemoryRegion) -> Result<Rect> {
    let mut reader = Reader::new(region.clone());
    let _pict_size = reader.next_u16()?;
    let frame = reader.next_record::<Rect>()?;
    Ok(normalize_rect(frame))
}

fn relative_to(container: &Rect, mut target: Rect) -> Rect {
    target.left -= container.left;
    target.right -= container.left;
    target.top -= container.top;
    target.bottom -= container.top;
    target
}

/// Decodes one PackBits-compressed row of `expected` unpacked bytes. The row
/// is prefixed with its packed byte count.
fn unpack_bits(reader: &mut Reader, expected: usize) -> Result<Vec<u8>> {
    let packed_length = reader.next_u8()? as usize;
    let mut packed_used = 0usize;
    let mut out = Vec::with_capacity(expected);

    while out.len() < expected {
        let flag = reader.next_i8()?;
        packed_used += 1;
        if flag as u8 == 0x80 {
            // 0x80 is officially "skip" but appears in the wild as literal.
            out.push(flag as u8);
        } else if flag < 0 {
            let repeat = reader.next_u8()?;
            packed_used += 1;
            for _ in 0..(1 - flag as i32) {
                out.push(repeat);
            }
        } else {
            for _ in 0..=(flag as i32) {
                out.push(reader.next_u8()?);
                packed_used += 1;
            }
        }
    }

    if packed_used != packed_length {
        warn!(
            "PackBits row consumed {} packed bytes but declared {}",
            packed_used, packed_length
        );
    }
    Ok(out)
}

/// Parses a PICT v1 stream into a raster the size of its frame.
pub fn parse(region: &MemoryRegion) -> Result<Picture> {
    let mut reader = Reader::new(region.clone());
    let _pict_size = reader.next_u16()?;
    let pict_rect = reader.next_record::<Rect>()?;
    let frame = normalize_rect(pict_rect);

    let row_bytes_out = pixel_width_to_bytes(frame.right as i32) as usize;
    let mut bits = vec![0u8; row_bytes_out * frame.bottom as usize];

    while reader.has_next() {
        let opcode = reader.next_u8()?;
        match opcode {
            // clipRgn
            0x01 => {
                let region_size = reader.next_u16()? as usize;
                reader.skip(region_size.saturating_sub(2));
                debug!("PICT clip region of {} bytes", region_size);
            }

            // picVersion
            0x11 => {
                let version = reader.next_u8()?;
                debug!("PICT version {}", version);
            }

            // shortComment
            0xA0 => {
                let kind = reader.next_u16()?;
                debug!("PICT short comment kind {}", kind);
            }

            // BitsRect / PackedBitsRect
            0x90 | 0x98 => {
                let row_bytes = reader.next_u16()? as usize;
                let bounds = reader.next_record::<Rect>()?;
                let src_rect = relative_to(&bounds, reader.next_record::<Rect>()?);
                let dst_rect = relative_to(&pict_rect, reader.next_record::<Rect>()?);
                let _mode = reader.next_u16()?;

                let height = (bounds.bottom - bounds.top) as usize;
                for row in 0..height {
                    let row_data = if opcode == 0x98 {
                        unpack_bits(&mut reader, row_bytes)?
                    } else {
                        let region = reader.next_region("row", row_bytes)?;
                        region.read_bytes(0, row_bytes)?
                    };
                    let dst_row = dst_rect.top as usize + row;
                    if dst_row >= frame.bottom as usize {
                        continue;
                    }
                    bit_copy(
                        &row_data,
                        src_rect.left as usize,
                        (src_rect.right - src_rect.left) as usize,
                        &mut bits[row_bytes_out * dst_row..],
                        dst_rect.left as usize,
                    );
                }
            }

            // EndOfPicture
            0xFF => {
                return Ok(Picture { frame, row_bytes: row_bytes_out, bits });
            }

            _ => {
                return Err(EmuError::Unsupported(format!(
                    "PICT opcode 0x{:02x}",
                    opcode
                )));
            }
        }
    }
    Err(EmuError::malformed("PICT stream without EndOfPicture".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pict_bytes(ops: &[u8]) -> Vec<u8> {
        // size word + frame rect (0, 0, 8, 16) + ops.
        let mut bytes = vec![0, 0, 0, 0, 0, 0, 0, 8, 0, 16];
        bytes.extend_from_slice(ops);
        let size = bytes.len() as u16;
        bytes[0] = (size >> 8) as u8;
        bytes[1] = size as u8;
        bytes
    }

    #[test]
    fn frame_is_normalized() {
        let bytes = vec![0, 12, 0, 4, 0, 6, 0, 12, 0, 22, 0xFF, 0];
        let region = MemoryRegion::from_vec("pict", bytes);
        let frame = picture_frame(&region).unwrap();
        assert_eq!(frame, Rect { top: 0, left: 0, bottom: 8, right: 16 });
    }

    #[test]
    fn decodes_a_plain_bits_rect() {
        #[rustfmt::skip]
        let ops = [
            0x11, 0x01, // version 1
            0xA0, 0x00, 0x64, // short comment
            0x90, // BitsRect
            0x00, 0x02, // rowBytes
            0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x10, // bounds 2 rows x 16 px
            0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x10, // srcRect
            0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x10, // dstRect
            0x00, 0x00, // mode
            0xAA, 0x55, // row 0
            0xFF, 0x00, // row 1
            0xFF, // end
        ];
        let region = MemoryRegion::from_vec("pict", pict_bytes(&ops));
        let picture = parse(&region).unwrap();
        assert_eq!(picture.row_bytes, 2);
        assert_eq!(&picture.bits[0..2], &[0xAA, 0x55]);
        assert_eq!(&picture.bits[2..4], &[0xFF, 0x00]);
    }

    #[test]
    fn decodes_packed_bits() {
        #[rustfmt::skip]
        let ops = [
            0x98, // PackedBitsRect
            0x00, 0x02, // rowBytes
            0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x10, // bounds 1 row x 16 px
            0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x10, // srcRect
            0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x10, // dstRect
            0x00, 0x00, // mode
            // Packed row: 2 packed bytes, "repeat 0xCC twice" (flag -1).
            0x02, 0xFF, 0xCC,
            0xFF, // end
        ];
        let region = MemoryRegion::from_vec("pict", pict_bytes(&ops));
        let picture = parse(&region).unwrap();
        assert_eq!(&picture.bits[0..2], &[0xCC, 0xCC]);
    }

    #[test]
    fn unknown_opcodes_are_errors() {
        let region = MemoryRegion::from_vec("pict", pict_bytes(&[0x42]));
        assert!(parse(&region).is_err());
    }
}
