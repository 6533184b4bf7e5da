// The Window Manager: a front-to-back list of WindowRecord pointers in the
// emulated heap, frame drawing for the classic one-pixel border and striped
// title bar, hit testing, and the drag-outline loop. Repaints follow the
// painter's algorithm: whenever stacking changes, every window is
// re-invalidated back to front.

use std::collections::VecDeque;

use log::warn;

use crate::errors::{EmuError, Result};
use crate::events::{ActivateState, MOUSE_MOVE, MOUSE_MOVE_MASK, MOUSE_UP};
use crate::graphics::bitmap::TempClip;
use crate::graphics::font::{system_font, Font};
use crate::graphics::region::{self, OwnedRegion};
use crate::graphics::{
    inset_rect, offset_rect, point_in_rect, rect_height, rect_width, FillMode, BLACK_PATTERN,
    GRAY_PATTERN, WHITE_PATTERN,
};
use crate::quickdraw::local_to_global;
use crate::records::{
    GrafPort, Handle, Pattern, Point, Ptr, Record, Rect, RegionRecord, WindowRecord,
};
use crate::Core;

pub const FRAME_TITLE_HEIGHT: i16 = 17;
pub const FRAME_WIDTH: i16 = 1;

const TITLE_BAR_PATTERN: Pattern = Pattern::of([0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00]);
const TITLE_PADDING: i16 = 4;

/// `userKind`: an application window.
pub const USER_KIND: i16 = 8;

/// Window definition variation codes ('WDEF' 0 only).
pub mod window_type {
    pub const DOCUMENT: u32 = 0;
    pub const DIALOG: u32 = 1;
    pub const PLAIN_DIALOG: u32 = 2;
    pub const ALT_DIALOG: u32 = 3;
    pub const NO_GROW_DOC: u32 = 4;
    pub const MOVABLE_DIALOG: u32 = 5;
    pub const ZOOM_DOC: u32 = 8;
    pub const ZOOM_NO_GROW: u32 = 12;
}

pub fn has_title_bar(window: &WindowRecord) -> bool {
    match window.window_definition_proc {
        window_type::DOCUMENT
        | window_type::NO_GROW_DOC
        | window_type::MOVABLE_DIALOG
        | window_type::ZOOM_DOC
        | window_type::ZOOM_NO_GROW => true,
        window_type::DIALOG | window_type::PLAIN_DIALOG | window_type::ALT_DIALOG => false,
        other => {
            warn!("unsupported window variation {}", other);
            false
        }
    }
}

/// Where FindWindow located the mouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPart {
    Desk,
    MenuBar,
    Content,
    Drag,
}

#[derive(Default)]
pub struct WindowState {
    /// Window pointers, front first.
    pub list: VecDeque<Ptr>,
}

pub enum MoveKind {
    Relative,
    Absolute,
}

impl Core {
    /// Builds a WindowRecord (and its GrafPort) for a window whose content
    /// sits at `bounds_rect` in global coordinates.
    pub fn new_window_record(
        &mut self,
        bounds_rect: &Rect,
        title: &str,
        is_visible: bool,
        has_close: bool,
        window_definition_id: i16,
        reference_constant: u32,
    ) -> Result<WindowRecord> {
        let globals = self.qd_globals()?;

        let mut port = GrafPort::default();
        self.init_port(&mut port)?;
        // `port_bits.bounds` ties local to global coordinates: a window at
        // global (60, 60) has a bounds origin of (-60, -60) so its
        // `port_rect` starts at local (0, 0).
        port.port_bits.bounds =
            offset_rect(globals.screen_bits.bounds, -bounds_rect.left, -bounds_rect.top);
        port.port_rect = crate::graphics::normalize_rect(*bounds_rect);
        port.visible_region =
            self.new_region_handle(&region::from_rect(&port.port_rect), "VisibleRegion")?;

        let title_handle = self.mem.allocate_handle(title.len() as u32 + 1, "WindowTitle")?;
        self.mem.region_for_handle(title_handle)?.write_pstr(0, title)?;

        let mut record = WindowRecord::default();
        record.port = port;
        record.window_kind = USER_KIND;
        record.visible = if is_visible { 0xFF } else { 0 };
        record.has_close = if has_close { 0xFF } else { 0 };
        record.reference_constant = reference_constant;
        record.title_handle = title_handle;
        record.title_width = system_font().string_width(title);

        record.content_region =
            self.new_region_handle(&OwnedRegion::default(), "ContentRegion")?;
        record.structure_region =
            self.new_region_handle(&OwnedRegion::default(), "StructRegion")?;
        record.update_region = self.new_region_handle(&OwnedRegion::default(), "UpdateRegion")?;

        // The 'WDEF' resource id lives in the upper 12 bits; only the
        // default definition function (id 0) is supported, so just the
        // variation code in the low 4 bits survives.
        if window_definition_id & 0xFFF0u16 as i16 != 0 {
            return Err(EmuError::Unsupported(format!(
                "window definition id 0x{:x} (only 'WDEF' 0 variations)",
                window_definition_id
            )));
        }
        record.window_definition_proc = (window_definition_id & 0x000F) as u32;

        self.update_window_regions(&mut record)?;
        Ok(record)
    }

    /// NewWindow: materializes the record at `window_storage` (allocating if
    /// null), inserts it at the front, and makes it the current port.
    #[allow(clippy::too_many_arguments)]
    pub fn new_window(
        &mut self,
        window_storage: Ptr,
        bounds_rect: &Rect,
        title: &str,
        is_visible: bool,
        has_close: bool,
        window_definition_id: i16,
        _behind_window: Ptr,
        reference_constant: u32,
    ) -> Result<Ptr> {
        let window_storage = if window_storage == 0 {
            self.mem.allocate(WindowRecord::SIZE as u32)?
        } else {
            window_storage
        };

        // Only these fields may be touched directly by emulated code; the
        // rest must go through the Toolbox.
        self.memory.restrict_fields(
            "WindowRecord",
            window_storage,
            WindowRecord::SIZE,
            vec![
                WindowRecord::field("port.port_bits"),
                WindowRecord::field("port.port_rect"),
                WindowRecord::field("port.visible_region"),
                WindowRecord::field("window_kind"),
                WindowRecord::field("structure_region"),
            ],
        );

        let record = self.new_window_record(
            bounds_rect,
            title,
            is_visible,
            has_close,
            window_definition_id,
            reference_constant,
        )?;
        self.write_record_at(window_storage, &record)?;

        self.windows.list.push_front(window_storage);

        if record.visible != 0 {
            self.show_window(window_storage)?;
        }
        // NewWindow opens the port, and OpenPort makes it current.
        self.set_the_port(window_storage + WindowRecord::field("port").offset as u32)?;
        self.select_window(window_storage)?;
        Ok(window_storage)
    }

    pub fn show_window(&mut self, window_ptr: Ptr) -> Result<()> {
        let record = self.read_record_at::<WindowRecord>(window_ptr)?;
        self.draw_window_frame(&record)?;
        self.events.queue_window_update(window_ptr);
        Ok(())
    }

    pub fn front_window(&self) -> Ptr {
        self.windows.list.front().copied().unwrap_or(0)
    }

    /// SelectWindow: hilite and raise `target`, then re-invalidate every
    /// window back to front per the painter's algorithm.
    pub fn select_window(&mut self, target: Ptr) -> Result<()> {
        let hilited_field = WindowRecord::field("hilited").offset;
        let already_active =
            self.memory.region().read_u8(target as usize + hilited_field)? == 0xFF;
        if already_active {
            return Ok(());
        }

        let all: Vec<Ptr> = self.windows.list.iter().copied().collect();
        for window_ptr in all {
            let hilited = if window_ptr == target { 0xFF } else { 0x00 };
            self.memory.region().write_u8(window_ptr as usize + hilited_field, hilited)?;
        }

        self.move_to_front(target);
        self.events.queue_window_activate(target, ActivateState::On);
        self.invalidate_windows();
        Ok(())
    }

    fn move_to_front(&mut self, window_ptr: Ptr) {
        if self.windows.list.front() == Some(&window_ptr) {
            return;
        }
        if let Some(index) = self.windows.list.iter().position(|&ptr| ptr == window_ptr) {
            self.windows.list.remove(index);
            self.windows.list.push_front(window_ptr);
        }
    }

    /// Queues update events for every window, back to front.
    pub fn invalidate_windows(&mut self) {
        let back_to_front: Vec<Ptr> = self.windows.list.iter().rev().copied().collect();
        for window_ptr in back_to_front {
            self.events.queue_window_update(window_ptr);
        }
    }

    pub fn dispose_window(&mut self, window_ptr: Ptr) -> Result<()> {
        let record = self.read_record_at::<WindowRecord>(window_ptr)?;
        self.repaint_desktop_over_window(&record)?;
        self.windows.list.retain(|&ptr| ptr != window_ptr);
        if let Some(&front) = self.windows.list.front() {
            self.events.queue_window_activate(front, ActivateState::On);
        }
        self.invalidate_windows();
        Ok(())
    }

    /// Paints the desktop pattern back over a window's structure region,
    /// keeping the pattern aligned to the screen origin.
    fn repaint_desktop_over_window(&mut self, window: &WindowRecord) -> Result<()> {
        let structure = self.read_region(window.structure_region)?;
        let clip = crate::graphics::intersect_rect(&self.desktop_rect(), &structure.rect);
        let saved = TempClip::set_rect(&mut self.screen, &clip);
        let full = self.screen.bounds();
        self.screen.fill_rect(&full, &GRAY_PATTERN, FillMode::Copy);
        saved.restore(&mut self.screen);
        Ok(())
    }

    /// MoveWindow/DragWindow tail: retarget the port's global origin, then
    /// recompute the derived regions.
    pub fn move_window(
        &mut self,
        window_ptr: Ptr,
        kind: MoveKind,
        location: Point,
        bring_to_front: bool,
    ) -> Result<()> {
        let mut record = self.read_record_at::<WindowRecord>(window_ptr)?;

        self.repaint_desktop_over_window(&record)?;

        record.port.port_bits.bounds = match kind {
            MoveKind::Absolute => {
                crate::graphics::move_rect(record.port.port_bits.bounds, -location.x, -location.y)
            }
            MoveKind::Relative => {
                offset_rect(record.port.port_bits.bounds, -location.x, -location.y)
            }
        };
        self.update_window_regions(&mut record)?;
        self.write_record_at(window_ptr, &record)?;

        if bring_to_front && record.hilited == 0 {
            self.select_window(window_ptr)?;
        } else {
            self.invalidate_windows();
        }
        Ok(())
    }

    pub fn drag_window(&mut self, window_ptr: Ptr, start: Point) -> Result<()> {
        let record = self.read_record_at::<WindowRecord>(window_ptr)?;
        let structure = self.read_region(record.structure_region)?;
        let delta = self.drag_gray_outline(&structure, start)?;
        self.move_window(window_ptr, MoveKind::Relative, delta, true)
    }

    /// DragGrayRgn: a nested pump that XOR-frames the outline as the mouse
    /// moves, returning the drag delta on mouse-up. The outline never
    /// escapes the desktop clip, and every exit path erases it.
    pub fn drag_gray_outline(&mut self, region: &OwnedRegion, start: Point) -> Result<Point> {
        let mut outline = region.rect;
        let target_offset =
            Point { x: outline.left - start.x, y: outline.top - start.y };

        let desktop = self.desktop_rect();
        let xor_outline = |core: &mut Core, rect: &Rect| {
            let saved = TempClip::set_rect(&mut core.screen, &desktop);
            core.screen.frame_rect(rect, &GRAY_PATTERN, FillMode::XOr);
            saved.restore(&mut core.screen);
        };

        let scope = self.events.enable_mouse_move();
        xor_outline(self, &outline);
        loop {
            let event = self.events.get_next_event(MOUSE_MOVE_MASK | (1 << MOUSE_UP));
            match event.what {
                what if what == MOUSE_MOVE => {
                    xor_outline(self, &outline);
                    outline = crate::graphics::move_rect(
                        outline,
                        event.location.x + target_offset.x,
                        event.location.y + target_offset.y,
                    );
                    xor_outline(self, &outline);
                }
                what if what == MOUSE_UP => {
                    xor_outline(self, &outline);
                    drop(scope);
                    return Ok(Point {
                        x: event.location.x - start.x,
                        y: event.location.y - start.y,
                    });
                }
                _ => {
                    if !self.host_yield() {
                        xor_outline(self, &outline);
                        drop(scope);
                        return Ok(Point { x: 0, y: 0 });
                    }
                }
            }
        }
    }

    /// FindWindow's window walk: checks each window front to back for a hit
    /// in the drag (title bar) area or the content.
    pub fn window_at(&self, mouse: Point) -> Result<(WindowPart, Ptr)> {
        let list: Vec<Ptr> = self.windows.list.iter().copied().collect();
        for window_ptr in list {
            let record = self.read_record_at::<WindowRecord>(window_ptr)?;

            if has_title_bar(&record) {
                let mut title_rect = self.read_region(record.structure_region)?.rect;
                title_rect.bottom = title_rect.top + FRAME_TITLE_HEIGHT;
                if point_in_rect(mouse, &title_rect) {
                    return Ok((WindowPart::Drag, window_ptr));
                }
            }

            let content = self.read_region(record.content_region)?.rect;
            if point_in_rect(mouse, &content) {
                return Ok((WindowPart::Content, window_ptr));
            }
        }
        Ok((WindowPart::Desk, 0))
    }

    pub fn set_window_title(&mut self, window_ptr: Ptr, title: &str) -> Result<()> {
        let mut record = self.read_record_at::<WindowRecord>(window_ptr)?;
        let title_handle = self.mem.allocate_handle(title.len() as u32 + 1, "WindowTitle")?;
        self.mem.region_for_handle(title_handle)?.write_pstr(0, title)?;
        record.title_handle = title_handle;
        record.title_width = system_font().string_width(title);
        self.write_record_at(window_ptr, &record)?;
        self.draw_window_frame(&record)
    }

    /// Draws the frame: white body, black border, and (when hilited) the
    /// striped title bar with the centered title.
    pub fn draw_window_frame(&mut self, window: &WindowRecord) -> Result<()> {
        let desktop = self.desktop_rect();
        let saved = TempClip::set_rect(&mut self.screen, &desktop);

        let structure = self.read_region(window.structure_region)?.rect;
        self.screen.fill_rect(&structure, &WHITE_PATTERN, FillMode::Copy);
        self.screen.frame_rect(&structure, &BLACK_PATTERN, FillMode::Copy);

        if has_title_bar(window) {
            let mut title_bar = structure;
            title_bar.bottom = title_bar.top + FRAME_TITLE_HEIGHT;
            self.screen.frame_rect(&title_bar, &BLACK_PATTERN, FillMode::Copy);
            if window.hilited != 0 {
                // Inset to match the look of System 6 title stripes.
                let stripes = inset_rect(title_bar, 2, 3);
                self.screen.fill_rect(&stripes, &TITLE_BAR_PATTERN, FillMode::Copy);
            }

            let title = self.mem.region_for_handle(window.title_handle)?.read_pstr(0)?;
            let title_rect = inset_rect(
                title_bar,
                (rect_width(&title_bar) - window.title_width) / 2 - TITLE_PADDING,
                FRAME_WIDTH,
            );
            self.screen.fill_rect(&title_rect, &WHITE_PATTERN, FillMode::Copy);
            system_font().draw_string(
                &mut self.screen,
                &title,
                title_rect.left + TITLE_PADDING,
                title_rect.top + (rect_height(&title_bar) - 8) / 2,
            );
        }

        saved.restore(&mut self.screen);
        Ok(())
    }

    pub fn draw_window_frame_at(&mut self, window_ptr: Ptr) -> Result<()> {
        let record = self.read_record_at::<WindowRecord>(window_ptr)?;
        self.draw_window_frame(&record)
    }

    /// Recomputes the content and structure regions from the port's global
    /// placement.
    pub fn update_window_regions(&mut self, window: &mut WindowRecord) -> Result<()> {
        let global_rect = local_to_global(&window.port, window.port.port_rect);

        self.write_region(window.content_region, &region::from_rect(&global_rect))?;

        let mut structure_rect = inset_rect(global_rect, -FRAME_WIDTH, -FRAME_WIDTH);
        if has_title_bar(window) {
            structure_rect.top -= FRAME_TITLE_HEIGHT;
        }
        self.write_region(window.structure_region, &region::from_rect(&structure_rect))?;
        Ok(())
    }

    /// The rectangular bounds of a region handle (content/structure).
    pub fn region_rect(&self, handle: Handle) -> Result<Rect> {
        Ok(self.read_region(handle)?.rect)
    }

    /// InvalRect: accumulates `rect` (in local coordinates) into the current
    /// window's update region.
    pub fn invalidate_rect(&mut self, rect: &Rect) -> Result<()> {
        let window_ptr = self.the_port()?;
        let record = self.read_record_at::<WindowRecord>(window_ptr)?;
        let update = self.read_region(record.update_region)?;
        let merged = region::union(&update, &region::from_rect(rect));
        self.write_region(record.update_region, &merged)?;
        self.events.queue_window_update(window_ptr);
        Ok(())
    }

    /// ValidRect: removes `rect` from the current window's update region.
    pub fn validate_rect_in_update(&mut self, rect: &Rect) -> Result<()> {
        let window_ptr = self.the_port()?;
        let record = self.read_record_at::<WindowRecord>(window_ptr)?;
        let update = self.read_region(record.update_region)?;
        let remaining = region::subtract(&update, &region::from_rect(rect));
        self.write_region(record.update_region, &remaining)?;
        Ok(())
    }

    /// BeginUpdate: clears the update region (drawing happens clipped to the
    /// visible region; this implementation redraws the whole content).
    pub fn begin_update(&mut self, window_ptr: Ptr) -> Result<()> {
        let record = self.read_record_at::<WindowRecord>(window_ptr)?;
        self.write_region(record.update_region, &OwnedRegion::default())?;
        Ok(())
    }

    pub fn end_update(&mut self, _window_ptr: Ptr) -> Result<()> {
        Ok(())
    }

    /// An empty rectangular region record, used by NewRgn.
    pub fn new_empty_region_handle(&mut self) -> Result<Handle> {
        let handle = self.mem.allocate_handle(RegionRecord::SIZE as u32, "Region")?;
        let empty = RegionRecord { region_size: RegionRecord::SIZE as u16, ..Default::default() };
        self.mem.write_record(handle, &empty)?;
        Ok(handle)
    }

}
