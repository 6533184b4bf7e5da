// Scanline-encoded regions and their boolean algebra. The encoding is a
// sequence of `(y, count, x0, x1, ...)` groups ordered by y and terminated by
// a final y whose count is zero; each group lists an even number of x
// boundaries forming half-open inclusion intervals that hold from that y
// until the next group's y.

use crate::errors::Result;
use crate::memory::MemoryRegion;
use crate::records::{Record, Rect, RegionRecord};

/// A region owning its scanline data, used by native code and tests. The
/// serialized form lives in emulated memory behind a handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnedRegion {
    pub rect: Rect,
    pub data: Vec<i16>,
}

/// One row's inclusion intervals: pairs of `[start, end)` boundaries.
pub type Scanline = Vec<(i16, i16)>;

/// Merges two sorted boundary rows into their union, coalescing overlaps.
pub fn union_row(a: &[i16], b: &[i16]) -> Vec<i16> {
    let mut ia = 0;
    let mut ib = 0;
    let mut current: Option<(i16, i16)> = None;
    let mut output = Vec::new();

    while ia < a.len() || ib < b.len() {
        let take_a = ib >= b.len() || (ia < a.len() && a[ia] < b[ib]);
        let next = if take_a {
            let range = (a[ia], a[ia + 1]);
            ia += 2;
            range
        } else {
            let range = (b[ib], b[ib + 1]);
            ib += 2;
            range
        };

        match current {
            None => current = Some(next),
            Some((start, end)) if next.0 <= end => {
                current = Some((start, end.max(next.1)));
            }
            Some((start, end)) => {
                output.push(start);
                output.push(end);
                current = Some(next);
            }
        }
    }
    if let Some((start, end)) = current {
        output.push(start);
        output.push(end);
    }
    output
}

/// Walks both rows taking `[max(start), min(end))` while both remain.
pub fn intersect_row(a: &[i16], b: &[i16]) -> Vec<i16> {
    let mut ia = 0;
    let mut ib = 0;
    let mut output = Vec::new();

    while ia + 1 < a.len() && ib + 1 < b.len() {
        let start = a[ia].max(b[ib]);
        let end = a[ia + 1].min(b[ib + 1]);
        if start < end {
            output.push(start);
            output.push(end);
        }
        if a[ia + 1] < b[ib + 1] {
            ia += 2;
        } else {
            ib += 2;
        }
    }
    output
}

/// For each interval of `a`, subtracts the overlapping parts of `b`.
pub fn subtract_row(a: &[i16], b: &[i16]) -> Vec<i16> {
    let mut ib = 0;
    let mut output = Vec::new();

    for chunk in a.chunks(2) {
        let (start, end) = (chunk[0], chunk[1]);
        let mut current = start;

        // Skip b intervals that end before this interval starts.
        while ib + 1 < b.len() && b[ib + 1] <= start {
            ib += 2;
        }

        let mut jb = ib;
        while jb + 1 < b.len() && b[jb] < end {
            if current < b[jb] {
                output.push(current);
                output.push(b[jb].min(end));
            }
            current = current.max(b[jb + 1]);
            if current >= end {
                break;
            }
            jb += 2;
        }
        if current < end {
            output.push(current);
            output.push(end);
        }
    }
    output
}

/// Walks a region's groups: yields `(y, row boundaries)` in order.
struct ScanlineIter<'a> {
    data: &'a [i16],
    index: usize,
}

impl<'a> ScanlineIter<'a> {
    fn new(data: &'a [i16]) -> Self {
        ScanlineIter { data, index: 0 }
    }

    fn peek_y(&self) -> Option<i16> {
        self.data.get(self.index).copied()
    }

    fn next_group(&mut self) -> Option<(i16, &'a [i16])> {
        let y = *self.data.get(self.index)?;
        let count = *self.data.get(self.index + 1)? as usize;
        let start = self.index + 2;
        self.index = start + count;
        Some((y, &self.data[start..start + count]))
    }

    fn has_next(&self) -> bool {
        self.index < self.data.len()
    }
}

type RowOp = fn(&[i16], &[i16]) -> Vec<i16>;

/// Merges two regions row-wise through `op`, coalescing consecutive
/// identical rows and tracking the bounding box of the result.
fn region_op(r1: &OwnedRegion, r2: &OwnedRegion, op: RowOp) -> OwnedRegion {
    let mut it1 = ScanlineIter::new(&r1.data);
    let mut it2 = ScanlineIter::new(&r2.data);

    let mut row1: &[i16] = &[];
    let mut row2: &[i16] = &[];
    let mut last_written: Option<Vec<i16>> = None;

    let mut rect =
        Rect { top: i16::MAX, left: i16::MAX, bottom: i16::MIN, right: i16::MIN };
    let mut output = Vec::new();
    let mut bottom = i16::MIN;

    while it1.has_next() || it2.has_next() {
        let y1 = it1.peek_y();
        let y2 = it2.peek_y();
        let current_y = match (y1, y2) {
            (Some(a), Some(b)) if a < b => {
                let (y, row) = it1.next_group().unwrap();
                row1 = row;
                y
            }
            (Some(a), Some(b)) if b < a => {
                let (y, row) = it2.next_group().unwrap();
                row2 = row;
                y
            }
            (Some(_), Some(_)) => {
                let (y, row) = it1.next_group().unwrap();
                row1 = row;
                let (_, other) = it2.next_group().unwrap();
                row2 = other;
                y
            }
            (Some(_), None) => {
                let (y, row) = it1.next_group().unwrap();
                row1 = row;
                y
            }
            (None, Some(_)) => {
                let (y, row) = it2.next_group().unwrap();
                row2 = row;
                y
            }
            (None, None) => break,
        };

        let merged = op(row1, row2);
        let changed = match &last_written {
            Some(last) => *last != merged,
            None => true,
        };
        if changed {
            output.push(current_y);
            output.push(merged.len() as i16);
            output.extend_from_slice(&merged);
            last_written = Some(merged.clone());
        }

        if !merged.is_empty() {
            rect.top = rect.top.min(current_y);
            rect.left = rect.left.min(merged[0]);
            rect.right = rect.right.max(*merged.last().unwrap());
        }
        bottom = current_y;
    }

    rect.bottom = bottom;
    if rect.top > rect.bottom || rect.left > rect.right {
        rect = Rect::default();
    }
    OwnedRegion { rect, data: output }
}

pub fn union(r1: &OwnedRegion, r2: &OwnedRegion) -> OwnedRegion {
    region_op(r1, r2, union_row)
}

pub fn intersect(r1: &OwnedRegion, r2: &OwnedRegion) -> OwnedRegion {
    region_op(r1, r2, intersect_row)
}

pub fn subtract(r1: &OwnedRegion, r2: &OwnedRegion) -> OwnedRegion {
    region_op(r1, r2, subtract_row)
}

pub fn new_rect_region(x: i16, y: i16, width: i16, height: i16) -> OwnedRegion {
    OwnedRegion {
        rect: crate::graphics::new_rect(x, y, width, height),
        data: vec![y, 2, x, x + width, y + height, 0],
    }
}

pub fn from_rect(rect: &Rect) -> OwnedRegion {
    OwnedRegion {
        rect: *rect,
        data: vec![rect.top, 2, rect.left, rect.right, rect.bottom, 0],
    }
}

impl OwnedRegion {
    pub fn is_empty(&self) -> bool {
        crate::graphics::is_zero_rect(&self.rect) && self.data.is_empty()
    }

    /// True when the region is exactly its bounding box (no scanline data
    /// beyond the single rectangular group).
    pub fn is_rectangular(&self) -> bool {
        self.data.len() <= 6
    }

    pub fn offset(&self, dx: i16, dy: i16) -> OwnedRegion {
        // Saturating keeps the "everything" clip (built from i16 extremes)
        // well formed when a port origin shifts it.
        let mut data = Vec::with_capacity(self.data.len());
        let mut iter = ScanlineIter::new(&self.data);
        while let Some((y, row)) = iter.next_group() {
            data.push(y.saturating_add(dy));
            data.push(row.len() as i16);
            for &x in row {
                data.push(x.saturating_add(dx));
            }
        }
        let rect = Rect {
            top: self.rect.top.saturating_add(dy),
            left: self.rect.left.saturating_add(dx),
            bottom: self.rect.bottom.saturating_add(dy),
            right: self.rect.right.saturating_add(dx),
        };
        OwnedRegion { rect, data }
    }

    pub fn contains(&self, x: i16, y: i16) -> bool {
        if !crate::graphics::point_in_rect(crate::records::Point { x, y }, &self.rect) {
            return false;
        }
        let mut iter = ScanlineIter::new(&self.data);
        let mut active: &[i16] = &[];
        let mut active_y = i16::MIN;
        while let Some((group_y, row)) = iter.next_group() {
            if group_y > y {
                break;
            }
            active = row;
            active_y = group_y;
        }
        if active_y > y {
            return false;
        }
        active.chunks(2).any(|pair| pair[0] <= x && x < pair[1])
    }

    /// The serialized byte size of this region (header plus data words).
    pub fn byte_size(&self) -> usize {
        RegionRecord::SIZE + self.data.len() * 2
    }

    /// Writes the region in its in-memory form: header then data words.
    pub fn write_to(&self, region: &MemoryRegion, offset: usize) -> Result<()> {
        let header =
            RegionRecord { region_size: self.byte_size() as u16, bounding_box: self.rect };
        header.write_to(region, offset)?;
        for (index, word) in self.data.iter().enumerate() {
            region.write_i16(offset + RegionRecord::SIZE + index * 2, *word)?;
        }
        Ok(())
    }

    /// Reads a serialized region. Rectangular regions (size 10) reconstruct
    /// their single scanline group from the bounding box.
    pub fn read_from(region: &MemoryRegion, offset: usize) -> Result<OwnedRegion> {
        let header = RegionRecord::read_from(region, offset)?;
        if header.region_size as usize <= RegionRecord::SIZE {
            return Ok(from_rect(&header.bounding_box));
        }
        let words = (header.region_size as usize - RegionRecord::SIZE) / 2;
        let mut data = Vec::with_capacity(words);
        for index in 0..words {
            data.push(region.read_i16(offset + RegionRecord::SIZE + index * 2)?);
        }
        Ok(OwnedRegion { rect: header.bounding_box, data })
    }

    /// Iterates `(y_from, y_to, row)` bands for rasterization.
    pub fn bands(&self) -> Vec<(i16, i16, Scanline)> {
        let mut bands = Vec::new();
        let mut iter = ScanlineIter::new(&self.data);
        let mut previous: Option<(i16, Scanline)> = None;
        while let Some((y, row)) = iter.next_group() {
            if let Some((from, scanline)) = previous.take() {
                if !scanline.is_empty() {
                    bands.push((from, y, scanline));
                }
            }
            let scanline: Scanline = row.chunks(2).map(|pair| (pair[0], pair[1])).collect();
            previous = Some((y, scanline));
        }
        bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_of_rows_coalesces_overlaps() {
        let a = [0, 4, 8, 12, 12, 14, 26, 42];
        let b = [3, 9, 23, 30];
        assert_eq!(union_row(&a, &b), vec![0, 14, 23, 42]);
    }

    #[test]
    fn intersection_of_rows() {
        let a = [0, 4, 8, 12, 12, 14, 26, 42];
        let b = [3, 9, 23, 30];
        assert_eq!(intersect_row(&a, &b), vec![3, 4, 8, 9, 26, 30]);
    }

    #[test]
    fn subtraction_of_rows() {
        let a = [0, 4, 8, 12, 12, 14, 26, 42];
        let b = [3, 9, 23, 30];
        assert_eq!(subtract_row(&a, &b), vec![0, 3, 9, 12, 12, 14, 30, 42]);
    }

    #[test]
    fn union_of_rect_regions() {
        let r1 = new_rect_region(1, 1, 10, 5);
        let r2 = new_rect_region(3, 6, 4, 10);
        let output = union(&r1, &r2);
        assert_eq!(
            output.data,
            vec![
                1, 2, 1, 11, // y = 1, [1, 11)
                6, 2, 3, 7, // y = 6, [3, 7)
                16, 0 // y = 16, end
            ]
        );
        assert_eq!(output.rect, crate::graphics::new_rect(1, 1, 10, 15));
    }

    #[test]
    fn intersection_of_rect_regions() {
        let r1 = new_rect_region(1, 1, 10, 5);
        let r2 = new_rect_region(3, 3, 4, 10);
        let output = intersect(&r1, &r2);
        assert_eq!(
            output.data,
            vec![
                3, 2, 3, 7, // y = 3, [3, 7)
                6, 0 // y = 6, end
            ]
        );
    }

    #[test]
    fn subtraction_of_rect_regions() {
        let r1 = new_rect_region(1, 1, 10, 10);
        let r2 = new_rect_region(3, 3, 4, 4);
        let output = subtract(&r1, &r2);
        assert_eq!(
            output.data,
            vec![
                1, 2, 1, 11, // y = 1, [1, 11)
                3, 4, 1, 3, 7, 11, // y = 3, [1, 3) and [7, 11)
                7, 2, 1, 11, // y = 7, [1, 11)
                11, 0 // y = 11, end
            ]
        );
    }

    #[test]
    fn region_laws() {
        let r = new_rect_region(2, 2, 8, 8);
        let empty = OwnedRegion::default();

        assert_eq!(union(&r, &empty).data, r.data);
        assert_eq!(intersect(&r, &r).data, r.data);
        assert!(subtract(&r, &r).bands().is_empty());

        let other = new_rect_region(4, 4, 10, 3);
        assert_eq!(union(&r, &other).data, union(&other, &r).data);

        // difference(a, b) and intersect(a, b) partition a, row by row.
        let difference = subtract(&r, &other);
        let common = intersect(&r, &other);
        let rebuilt = union(&difference, &common);
        assert_eq!(intersect(&rebuilt, &r).bands(), r.bands());
    }

    #[test]
    fn contains_honours_scanlines() {
        let r1 = new_rect_region(0, 0, 10, 10);
        let r2 = new_rect_region(4, 4, 2, 2);
        let holed = subtract(&r1, &r2);
        assert!(holed.contains(1, 5));
        assert!(!holed.contains(4, 4));
        assert!(!holed.contains(5, 5));
        assert!(holed.contains(5, 7));
        assert!(!holed.contains(10, 5));
    }

    #[test]
    fn serialization_round_trip() {
        let region = subtract(&new_rect_region(0, 0, 16, 16), &new_rect_region(4, 4, 4, 4));
        let memory = MemoryRegion::new("test", 256);
        region.write_to(&memory, 8).unwrap();
        let back = OwnedRegion::read_from(&memory, 8).unwrap();
        assert_eq!(back, region);
    }

    #[test]
    fn rect_region_serializes_as_bare_header() {
        let region = new_rect_region(1, 2, 3, 4);
        let memory = MemoryRegion::new("test", 64);
        let header = RegionRecord { region_size: 10, bounding_box: region.rect };
        header.write_to(&memory, 0).unwrap();
        let back = OwnedRegion::read_from(&memory, 0).unwrap();
        assert_eq!(back, region);
    }
}
