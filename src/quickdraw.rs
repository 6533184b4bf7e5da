// The GrafPort plumbing: "the port" is the 32-bit pointer stored at the
// address kept in A5, with the QuickDraw globals laid out immediately below
// it. Every drawing trap resolves the current port here and translates local
// coordinates to global ones through `port_bits.bounds`.

use crate::errors::Result;
use crate::graphics::region::{self, OwnedRegion};
use crate::graphics::{offset_rect, BitmapImage};
use crate::records::{
    GrafPort, Handle, Pattern, Point, Ptr, QDGlobals, Record, Rect,
};
use crate::Core;

/// patCopy, the default pattern transfer mode.
pub const PAT_COPY: i16 = 8;

pub fn local_to_global(port: &GrafPort, rect: Rect) -> Rect {
    offset_rect(rect, -port.port_bits.bounds.left, -port.port_bits.bounds.top)
}

pub fn local_to_global_point(port: &GrafPort, mut pt: Point) -> Point {
    pt.x -= port.port_bits.bounds.left;
    pt.y -= port.port_bits.bounds.top;
    pt
}

pub fn global_to_local_point(port: &GrafPort, mut pt: Point) -> Point {
    pt.x += port.port_bits.bounds.left;
    pt.y += port.port_bits.bounds.top;
    pt
}

impl Core {
    /// The pointer stored at [A5]: the address of `thePort` at the top of
    /// the QuickDraw globals.
    pub fn qd_globals_ptr(&self) -> Result<Ptr> {
        self.memory.region().read_u32(self.cpu.a[5] as usize)
    }

    pub fn qd_globals(&self) -> Result<QDGlobals> {
        // The global pointer addresses `thePort`; the rest of the record
        // extends beneath it.
        let the_port = self.qd_globals_ptr()?;
        self.read_record_at::<QDGlobals>(the_port + 4 - QDGlobals::SIZE as u32)
    }

    pub fn write_qd_globals(&self, globals: &QDGlobals) -> Result<()> {
        let the_port = self.qd_globals_ptr()?;
        self.write_record_at(the_port + 4 - QDGlobals::SIZE as u32, globals)
    }

    pub fn the_port(&self) -> Result<Ptr> {
        let the_port = self.qd_globals_ptr()?;
        self.memory.region().read_u32(the_port as usize)
    }

    pub fn set_the_port(&self, port: Ptr) -> Result<()> {
        let the_port = self.qd_globals_ptr()?;
        self.memory.region().write_u32(the_port as usize, port)
    }

    pub fn current_port(&self) -> Result<GrafPort> {
        self.read_record_at::<GrafPort>(self.the_port()?)
    }

    pub fn write_current_port(&self, port: &GrafPort) -> Result<()> {
        self.write_record_at(self.the_port()?, port)
    }

    /// A raster over the port's pixels. The caller decides the clip.
    pub fn port_image(&self, port: &GrafPort) -> Result<BitmapImage> {
        BitmapImage::from_bitmap(&port.port_bits, self.memory.region())
    }

    /// The current port's raster with the port's clip region applied,
    /// translated into the image's coordinate space.
    pub fn the_port_image(&self) -> Result<BitmapImage> {
        let port = self.current_port()?;
        let mut image = self.port_image(&port)?;
        if port.clip_region != 0 {
            let clip = self.read_region(port.clip_region)?;
            let translated =
                clip.offset(-port.port_bits.bounds.left, -port.port_bits.bounds.top);
            image.set_clip_region(&translated);
        }
        Ok(image)
    }

    /// Initializes a GrafPort to its defaults: black fill over white
    /// background, patCopy, the physical screen as its bitmap, and fresh
    /// clip/visible region handles.
    pub fn init_port(&mut self, port: &mut GrafPort) -> Result<()> {
        port.fill_pattern = Pattern::of([0xFF; 8]);
        port.back_pattern = Pattern::of([0x00; 8]);
        port.pen_pattern = port.fill_pattern;
        port.pen_mode = PAT_COPY;
        port.pen_size = Point { x: 1, y: 1 };
        port.pen_visibility = 0;
        port.text_font = 0;

        let globals = self.qd_globals()?;
        port.port_bits = globals.screen_bits;
        port.port_rect = port.port_bits.bounds;

        // The widest possible clip; the visible region matches the port.
        let everything = region::from_rect(&Rect {
            top: i16::MIN,
            left: i16::MIN,
            bottom: i16::MAX,
            right: i16::MAX,
        });
        port.clip_region = self.new_region_handle(&everything, "ClipRegion")?;
        let visible = region::from_rect(&port.port_rect);
        port.visible_region = self.new_region_handle(&visible, "VisibleRegion")?;
        Ok(())
    }

    // ---- region handles ------------------------------------------------

    pub fn new_region_handle(&mut self, region: &OwnedRegion, tag: &str) -> Result<Handle> {
        let handle = self.mem.allocate_handle(region.byte_size() as u32, tag)?;
        self.write_region(handle, region)?;
        Ok(handle)
    }

    pub fn read_region(&self, handle: Handle) -> Result<OwnedRegion> {
        let data = self.mem.region_for_handle(handle)?;
        OwnedRegion::read_from(&data, 0)
    }

    /// Rewrites a region handle, growing its block when the encoding no
    /// longer fits.
    pub fn write_region(&mut self, handle: Handle, region: &OwnedRegion) -> Result<()> {
        self.mem.resize_handle(handle, region.byte_size() as u32)?;
        let data = self.mem.region_for_handle(handle)?;
        region.write_to(&data, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::new_rect;

    #[test]
    fn local_global_translation() {
        let mut port = GrafPort::default();
        port.port_bits.bounds = new_rect(-60, -40, 512, 384);

        let global = local_to_global(&port, new_rect(0, 0, 10, 10));
        assert_eq!(global, new_rect(60, 40, 10, 10));

        let pt = global_to_local_point(&port, Point { x: 60, y: 40 });
        assert_eq!(pt, Point { x: 0, y: 0 });
        let back = local_to_global_point(&port, pt);
        assert_eq!(back, Point { x: 60, y: 40 });
    }
}
