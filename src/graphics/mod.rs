// Geometry helpers shared by the raster, the QuickDraw traps and the window
// machinery. Rect invariants: half-open on the right/bottom, and anything
// with a non-positive width or height collapses to the zero rect.

pub mod bitmap;
pub mod copybits;
pub mod font;
pub mod pict;
pub mod region;

pub use bitmap::{BitmapImage, FillMode};

use crate::records::{Pattern, Point, Rect};

pub const BLACK_PATTERN: Pattern = Pattern::of([0xFF; 8]);
pub const WHITE_PATTERN: Pattern = Pattern::of([0x00; 8]);
pub const GRAY_PATTERN: Pattern = Pattern::of([0xAA, 0x55, 0xAA, 0x55, 0xAA, 0x55, 0xAA, 0x55]);

/// Bytes needed to represent `width_px` pixels at 1 bit per pixel.
pub fn pixel_width_to_bytes(width_px: i32) -> i32 {
    (width_px + 7) / 8
}

pub fn new_rect(x: i16, y: i16, width: i16, height: i16) -> Rect {
    Rect { top: y, left: x, bottom: y + height, right: x + width }
}

pub fn rect_width(rect: &Rect) -> i16 {
    rect.right - rect.left
}

pub fn rect_height(rect: &Rect) -> i16 {
    rect.bottom - rect.top
}

pub fn offset_rect(mut rect: Rect, dh: i16, dv: i16) -> Rect {
    rect.left += dh;
    rect.right += dh;
    rect.top += dv;
    rect.bottom += dv;
    rect
}

/// Moves `rect` so its top-left corner lands on (x, y).
pub fn move_rect(rect: Rect, x: i16, y: i16) -> Rect {
    new_rect(x, y, rect_width(&rect), rect_height(&rect))
}

/// Zeroes rects whose width or height has gone non-positive.
pub fn validate_rect(rect: &mut Rect) {
    if rect.top >= rect.bottom || rect.left >= rect.right {
        *rect = Rect::default();
    }
}

pub fn inset_rect(mut rect: Rect, dh: i16, dv: i16) -> Rect {
    rect.left += dh;
    rect.right -= dh;
    rect.top += dv;
    rect.bottom -= dv;
    validate_rect(&mut rect);
    rect
}

/// Normalizes `rect` to the same dimensions with its origin at (0, 0).
pub fn normalize_rect(rect: Rect) -> Rect {
    offset_rect(rect, -rect.left, -rect.top)
}

pub fn union_rect(r1: &Rect, r2: &Rect) -> Rect {
    Rect {
        top: r1.top.min(r2.top),
        left: r1.left.min(r2.left),
        bottom: r1.bottom.max(r2.bottom),
        right: r1.right.max(r2.right),
    }
}

pub fn intersect_rect(r1: &Rect, r2: &Rect) -> Rect {
    let mut rect = Rect {
        top: r1.top.max(r2.top),
        left: r1.left.max(r2.left),
        bottom: r1.bottom.min(r2.bottom),
        right: r1.right.min(r2.right),
    };
    validate_rect(&mut rect);
    rect
}

pub fn is_zero_rect(rect: &Rect) -> bool {
    *rect == Rect::default()
}

pub fn equal_rect(r1: &Rect, r2: &Rect) -> bool {
    r1 == r2
}

pub fn point_in_rect(pt: Point, rect: &Rect) -> bool {
    pt.x >= rect.left && pt.x < rect.right && pt.y >= rect.top && pt.y < rect.bottom
}

pub fn rect_in_rect(inner: &Rect, outer: &Rect) -> bool {
    inner.left >= outer.left
        && inner.right <= outer.right
        && inner.top >= outer.top
        && inner.bottom <= outer.bottom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inset_collapses_inverted_rects() {
        let rect = inset_rect(new_rect(0, 0, 4, 4), 3, 3);
        assert!(is_zero_rect(&rect));
    }

    #[test]
    fn union_and_intersection() {
        let a = new_rect(0, 0, 10, 10);
        let b = new_rect(5, 5, 10, 10);
        assert_eq!(union_rect(&a, &b), new_rect(0, 0, 15, 15));
        assert_eq!(intersect_rect(&a, &b), new_rect(5, 5, 5, 5));
        assert!(is_zero_rect(&intersect_rect(&a, &new_rect(20, 20, 4, 4))));
    }

    #[test]
    fn point_containment_is_half_open() {
        let rect = new_rect(0, 0, 4, 4);
        assert!(point_in_rect(Point { x: 0, y: 0 }, &rect));
        assert!(point_in_rect(Point { x: 3, y: 3 }, &rect));
        assert!(!point_in_rect(Point { x: 4, y: 3 }, &rect));
    }
}
