// Toolbox trap handlers: arguments on the user stack (popped in reverse),
// results written into the caller-reserved slot. Drawing goes through the
// current port: local coordinates, the port's clip, and its pattern mode.

use chrono::{Datelike, TimeZone, Timelike, Utc};
use log::{debug, info, warn};

use crate::errors::{EmuError, Result};
use crate::events::{ActivateState, WINDOW_UPDATE};
use crate::graphics::font::Font;
use crate::graphics::region::{self, OwnedRegion};
use crate::graphics::{
    self, inset_rect, new_rect, offset_rect, pict, point_in_rect, union_rect, FillMode,
    BLACK_PATTERN,
};
use crate::memmap::globals;
use crate::memory::Reader;
use crate::quickdraw::{global_to_local_point, local_to_global, local_to_global_point};
use crate::records::{
    DateTimeRec, GrafPort, Pattern, Point, QDGlobals, Record, Rect, WindowRecord,
};
use crate::rsrc::HFS_EPOCH_OFFSET;
use crate::windows::{MoveKind, WindowPart};
use crate::Core;

use super::names;

/// Window part codes returned by FindWindow.
const IN_DESK: i16 = 0;
const IN_MENU_BAR: i16 = 1;
const IN_CONTENT: i16 = 3;
const IN_DRAG: i16 = 4;

impl Core {
    pub(crate) fn dispatch_toolbox_trap(&mut self, trap: u16) -> Result<()> {
        match trap {
            // ==================== Initializers ====================
            names::INIT_GRAF => {
                let global_ptr = self.pop_u32()?;
                debug!("InitGraf(0x{:x})", global_ptr);

                let a5_world = self.cpu.a[5];
                self.memory.region().write_u32(a5_world as usize, global_ptr)?;

                let mut qd = QDGlobals::default();
                qd.screen_bits = self.screen_bits;
                qd.random_seed = 1;
                qd.gray = graphics::GRAY_PATTERN;
                qd.black = BLACK_PATTERN;
                qd.white = graphics::WHITE_PATTERN;
                qd.lt_gray = Pattern::of([0x88, 0x22, 0x88, 0x22, 0x88, 0x22, 0x88, 0x22]);
                qd.dk_gray = Pattern::of([0x77, 0xDD, 0x77, 0xDD, 0x77, 0xDD, 0x77, 0xDD]);
                self.write_qd_globals(&qd)?;

                let qd_base = global_ptr + 4 - QDGlobals::SIZE as u32;
                self.memory.restrict_fields(
                    "QDGlobals",
                    qd_base,
                    QDGlobals::SIZE,
                    vec![
                        QDGlobals::field("random_seed"),
                        QDGlobals::field("screen_bits"),
                        QDGlobals::field("the_port"),
                    ],
                );
                Ok(())
            }
            names::INIT_FONTS | names::INIT_MENUS | names::TE_INIT | names::INIT_CURSOR
            | names::HIDE_CURSOR => Ok(()),
            names::INIT_DIALOGS => {
                let resume_proc = self.pop_u32()?;
                if resume_proc != 0 {
                    warn!("InitDialogs with a resume procedure 0x{:x}", resume_proc);
                }
                Ok(())
            }
            names::INIT_WINDOWS => {
                // The Window Manager port covers the whole screen.
                let mut port = GrafPort::default();
                self.init_port(&mut port)?;
                let ptr = self.mem.allocate(GrafPort::SIZE as u32)?;
                self.write_record_at(ptr, &port)?;
                self.memory.restrict_fields(
                    "WMgrPort",
                    ptr,
                    GrafPort::SIZE,
                    vec![GrafPort::field("port_bits.bounds")],
                );
                self.memory.region().write_u32(globals::WMGR_PORT as usize, ptr)?;
                self.set_the_port(ptr)
            }

            // ==================== Event Manager ====================
            names::BUTTON => {
                let down = self.events.has_mouse_event(crate::events::MOUSE_DOWN);
                self.trap_return_bool(down)
            }
            names::STILL_DOWN => {
                let released = self.events.has_mouse_event(crate::events::MOUSE_UP);
                self.trap_return_bool(!released)
            }
            names::GET_MOUSE => {
                let mouse_var = self.pop_u32()?;
                let port = self.current_port()?;
                let local = global_to_local_point(&port, self.events.mouse());
                self.write_record_at(mouse_var, &local)
            }
            names::WAIT_NEXT_EVENT => {
                let _mouse_region = self.pop_u32()?;
                let sleep = self.pop_u32()?;
                let event_var = self.pop_u32()?;
                let mask = self.pop_u16()?;
                debug!("WaitNextEvent(0b{:016b}, sleep {})", mask, sleep);

                let event = self.events.wait_next_event(mask, sleep);
                self.write_record_at(event_var, &event)?;
                if event.what == WINDOW_UPDATE {
                    self.draw_window_frame_at(event.message)?;
                }
                self.trap_return_bool(event.what != 0)
            }
            names::GET_NEXT_EVENT => {
                let event_var = self.pop_u32()?;
                let mask = self.pop_u16()?;
                let event = self.events.get_next_event(mask);
                self.write_record_at(event_var, &event)?;
                if event.what == WINDOW_UPDATE {
                    self.draw_window_frame_at(event.message)?;
                }
                self.trap_return_bool(event.what != 0)
            }
            names::GET_KEYS => {
                let keys_var = self.pop_u32()?;
                debug!("GetKeys(0x{:x}) reports no keys held", keys_var);
                self.memory.region().fill(keys_var as usize, 16, 0)
            }
            names::TICK_COUNT => self.trap_return_u32(self.events.now_ticks()),
            names::SYSTEM_TASK => Ok(()),

            // ==================== Menu Manager ====================
            names::GET_NEW_MBAR => {
                let menu_bar_id = self.pop_i16()?;
                let handle =
                    self.rsrc.get_resource(&mut self.mem, crate::records::os_type(b"MBAR"), menu_bar_id)?;
                self.trap_return_u32(handle)
            }
            names::GET_RMENU | names::GET_MENU_HANDLE => {
                let menu_id = self.pop_i16()?;
                let handle =
                    self.rsrc.get_resource(&mut self.mem, crate::records::os_type(b"MENU"), menu_id)?;
                self.trap_return_u32(handle)
            }
            names::INSERT_MENU => {
                let before_id = self.pop_u16()?;
                let menu_handle = self.pop_u32()?;
                debug!("InsertMenu(0x{:x}, before {})", menu_handle, before_id);
                let data = self.mem.region_for_handle(menu_handle)?;
                let (menu, items) = crate::menus::parse_menu(&data)?;
                self.insert_menu(menu, items);
                Ok(())
            }
            names::SET_MENU_BAR => {
                let list_handle = self.pop_u32()?;
                let data = self.mem.region_for_handle(list_handle)?;
                let mut reader = Reader::new(data);
                let count = reader.next_u16()?;
                for _ in 0..count {
                    let id = reader.next_i16()?;
                    let handle =
                        self.rsrc.get_resource(&mut self.mem, crate::records::os_type(b"MENU"), id)?;
                    if handle == 0 {
                        continue;
                    }
                    let menu_data = self.mem.region_for_handle(handle)?;
                    let (menu, items) = crate::menus::parse_menu(&menu_data)?;
                    self.insert_menu(menu, items);
                }
                Ok(())
            }
            names::APPEND_RES_MENU => {
                let type_id = self.pop_u32()?;
                let menu_handle = self.pop_u32()?;
                let data = self.mem.region_for_handle(menu_handle)?;
                let menu_id = data.read_i16(0)?;
                self.append_res_menu(menu_id, type_id);
                Ok(())
            }
            names::DRAW_MENU_BAR => {
                self.draw_menu_bar();
                Ok(())
            }
            names::MENU_SELECT => {
                let start = self.pop_record::<Point>()?;
                let chosen = self.menu_select(start)?;
                debug!("MenuSelect -> 0x{:x}", chosen);
                self.trap_return_u32(chosen)
            }
            names::COUNT_M_ITEMS => {
                let menu_handle = self.pop_u32()?;
                let menu_id = self.mem.region_for_handle(menu_handle)?.read_i16(0)?;
                let count = self.count_menu_items(menu_id);
                self.trap_return_u16(count)
            }
            names::GET_MENU_ITEM_TEXT => {
                let string_var = self.pop_u32()?;
                let item = self.pop_u16()?;
                let menu_handle = self.pop_u32()?;
                let menu_id = self.mem.region_for_handle(menu_handle)?.read_i16(0)?;
                let text = self.menu_item_text(menu_id, item);
                self.memory.region().write_pstr(string_var as usize, &text)
            }
            names::HILITE_MENU => {
                let menu_id = self.pop_i16()?;
                debug!("HiliteMenu({})", menu_id);
                self.draw_menu_bar();
                Ok(())
            }
            names::ENABLE_ITEM | names::DISABLE_ITEM => {
                let item = self.pop_u16()?;
                let menu_handle = self.pop_u32()?;
                let menu_id = self.mem.region_for_handle(menu_handle)?.read_i16(0)?;
                self.set_menu_item_enabled(menu_id, item, trap == names::ENABLE_ITEM);
                Ok(())
            }
            names::CHECK_ITEM => {
                let checked = self.pop_bool()?;
                let item = self.pop_u16()?;
                let menu_handle = self.pop_u32()?;
                let menu_id = self.mem.region_for_handle(menu_handle)?.read_i16(0)?;
                self.set_menu_item_mark(menu_id, item, if checked { 0x12 } else { 0 });
                Ok(())
            }
            names::SYS_EDIT => {
                let edit_cmd = self.pop_u16()?;
                debug!("SysEdit({}) -> false", edit_cmd);
                self.trap_return_bool(false)
            }

            // ==================== Process Manager ====================
            names::EXIT_TO_SHELL => {
                info!("ExitToShell()");
                self.running = false;
                Ok(())
            }
            names::UNLOAD_SEG => {
                let address = self.pop_u32()?;
                self.unload_segment(address);
                Ok(())
            }

            // ==================== QuickDraw: ports ====================
            names::GET_PORT => {
                let port_var = self.pop_u32()?;
                let port = self.the_port()?;
                self.memory.region().write_u32(port_var as usize, port)
            }
            names::SET_PORT => {
                let port = self.pop_u32()?;
                self.set_the_port(port)
            }
            names::OPEN_PORT => {
                let port_ptr = self.pop_u32()?;
                let mut port = GrafPort::default();
                self.init_port(&mut port)?;
                self.write_record_at(port_ptr, &port)?;
                self.set_the_port(port_ptr)
            }
            names::SET_PORT_BITS => {
                let (_, bitmap) = self.pop_ref::<crate::records::BitMap>()?;
                let mut port = self.current_port()?;
                port.port_bits = bitmap;
                self.write_current_port(&port)
            }
            names::SET_ORIGIN => {
                let v = self.pop_i16()?;
                let h = self.pop_i16()?;
                let mut port = self.current_port()?;
                let dh = h - port.port_rect.left;
                let dv = v - port.port_rect.top;
                port.port_rect = offset_rect(port.port_rect, dh, dv);
                port.port_bits.bounds = offset_rect(port.port_bits.bounds, dh, dv);
                self.write_current_port(&port)
            }

            // ==================== QuickDraw: rects & points ====================
            names::SET_RECT => {
                let bottom = self.pop_i16()?;
                let right = self.pop_i16()?;
                let top = self.pop_i16()?;
                let left = self.pop_i16()?;
                let rect_var = self.pop_u32()?;
                self.write_record_at(rect_var, &Rect { top, left, bottom, right })
            }
            names::OFFSET_RECT => {
                let dv = self.pop_i16()?;
                let dh = self.pop_i16()?;
                let (ptr, rect) = self.pop_ref::<Rect>()?;
                self.write_record_at(ptr, &offset_rect(rect, dh, dv))
            }
            names::INSET_RECT => {
                let dv = self.pop_i16()?;
                let dh = self.pop_i16()?;
                let (ptr, rect) = self.pop_ref::<Rect>()?;
                self.write_record_at(ptr, &inset_rect(rect, dh, dv))
            }
            names::SECT_RECT => {
                let dst_var = self.pop_u32()?;
                let (_, second) = self.pop_ref::<Rect>()?;
                let (_, first) = self.pop_ref::<Rect>()?;
                let sect = graphics::intersect_rect(&first, &second);
                self.write_record_at(dst_var, &sect)?;
                self.trap_return_bool(!graphics::is_zero_rect(&sect))
            }
            names::UNION_RECT => {
                let dst_var = self.pop_u32()?;
                let (_, second) = self.pop_ref::<Rect>()?;
                let (_, first) = self.pop_ref::<Rect>()?;
                self.write_record_at(dst_var, &union_rect(&first, &second))
            }
            names::EQUAL_RECT => {
                let (_, second) = self.pop_ref::<Rect>()?;
                let (_, first) = self.pop_ref::<Rect>()?;
                self.trap_return_bool(first == second)
            }
            names::EMPTY_RECT => {
                let (_, rect) = self.pop_ref::<Rect>()?;
                self.trap_return_bool(rect.top >= rect.bottom || rect.left >= rect.right)
            }
            names::PT2RECT => {
                let rect_var = self.pop_u32()?;
                let second = self.pop_record::<Point>()?;
                let first = self.pop_record::<Point>()?;
                let rect = Rect {
                    top: first.y.min(second.y),
                    left: first.x.min(second.x),
                    bottom: first.y.max(second.y),
                    right: first.x.max(second.x),
                };
                self.write_record_at(rect_var, &rect)
            }
            names::PT_IN_RECT => {
                let (_, rect) = self.pop_ref::<Rect>()?;
                let pt = self.pop_record::<Point>()?;
                self.trap_return_bool(point_in_rect(pt, &rect))
            }
            names::ADD_PT => {
                let dst_var = self.pop_u32()?;
                let src = self.pop_record::<Point>()?;
                let dst = self.read_record_at::<Point>(dst_var)?;
                self.write_record_at(dst_var, &Point { x: dst.x + src.x, y: dst.y + src.y })
            }
            names::SUB_PT => {
                let dst_var = self.pop_u32()?;
                let src = self.pop_record::<Point>()?;
                let dst = self.read_record_at::<Point>(dst_var)?;
                self.write_record_at(dst_var, &Point { x: dst.x - src.x, y: dst.y - src.y })
            }
            names::SET_PT => {
                let v = self.pop_i16()?;
                let h = self.pop_i16()?;
                let pt_var = self.pop_u32()?;
                self.write_record_at(pt_var, &Point { x: h, y: v })
            }
            names::EQUAL_PT => {
                let second = self.pop_record::<Point>()?;
                let first = self.pop_record::<Point>()?;
                self.trap_return_bool(first == second)
            }
            names::GLOBAL_TO_LOCAL => {
                let pt_var = self.pop_u32()?;
                let port = self.current_port()?;
                let pt = self.read_record_at::<Point>(pt_var)?;
                self.write_record_at(pt_var, &global_to_local_point(&port, pt))
            }
            names::LOCAL_TO_GLOBAL => {
                let pt_var = self.pop_u32()?;
                let port = self.current_port()?;
                let pt = self.read_record_at::<Point>(pt_var)?;
                self.write_record_at(pt_var, &local_to_global_point(&port, pt))
            }

            // ==================== QuickDraw: pen ====================
            names::MOVE_TO => {
                let v = self.pop_i16()?;
                let h = self.pop_i16()?;
                let mut port = self.current_port()?;
                port.pen_location = Point { x: h, y: v };
                self.write_current_port(&port)
            }
            names::MOVE => {
                let dv = self.pop_i16()?;
                let dh = self.pop_i16()?;
                let mut port = self.current_port()?;
                port.pen_location.x += dh;
                port.pen_location.y += dv;
                self.write_current_port(&port)
            }
            names::LINE_TO => {
                let v = self.pop_i16()?;
                let h = self.pop_i16()?;
                self.pen_line_to(Point { x: h, y: v })
            }
            names::LINE => {
                let dv = self.pop_i16()?;
                let dh = self.pop_i16()?;
                let port = self.current_port()?;
                let target =
                    Point { x: port.pen_location.x + dh, y: port.pen_location.y + dv };
                self.pen_line_to(target)
            }
            names::PEN_MODE => {
                let mode = self.pop_i16()?;
                let mut port = self.current_port()?;
                port.pen_mode = mode;
                self.write_current_port(&port)
            }
            names::PEN_PAT => {
                let (_, pattern) = self.pop_ref::<PatternRecord>()?;
                let mut port = self.current_port()?;
                port.pen_pattern = pattern.pattern;
                self.write_current_port(&port)
            }
            names::PEN_SIZE => {
                let height = self.pop_i16()?;
                let width = self.pop_i16()?;
                let mut port = self.current_port()?;
                port.pen_size = Point { x: width, y: height };
                self.write_current_port(&port)
            }
            names::PEN_NORMAL => {
                let mut port = self.current_port()?;
                port.pen_size = Point { x: 1, y: 1 };
                port.pen_mode = crate::quickdraw::PAT_COPY;
                port.pen_pattern = BLACK_PATTERN;
                self.write_current_port(&port)
            }
            names::GET_PEN => {
                let pt_var = self.pop_u32()?;
                let port = self.current_port()?;
                self.write_record_at(pt_var, &port.pen_location)
            }

            // ==================== QuickDraw: shapes ====================
            names::FRAME_RECT => {
                let (_, rect) = self.pop_ref::<Rect>()?;
                let port = self.current_port()?;
                if let Some(recording) = self.traps.region_recording.as_mut() {
                    *recording = region::union(recording, &region::from_rect(&rect));
                    return Ok(());
                }
                let mut image = self.the_port_image()?;
                let global = local_to_global(&port, rect);
                image.frame_rect(&global, &port.pen_pattern, pen_fill_mode(&port));
                Ok(())
            }
            names::PAINT_RECT => {
                let (_, rect) = self.pop_ref::<Rect>()?;
                self.fill_local_rect(&rect, None, None)
            }
            names::FILL_RECT => {
                let (_, pattern) = self.pop_ref::<PatternRecord>()?;
                let (_, rect) = self.pop_ref::<Rect>()?;
                self.fill_local_rect(&rect, Some(pattern.pattern), Some(FillMode::Copy))
            }
            names::ERASE_RECT => {
                let (_, rect) = self.pop_ref::<Rect>()?;
                let port = self.current_port()?;
                self.fill_local_rect(&rect, Some(port.back_pattern), Some(FillMode::Copy))
            }
            names::INVERT_RECT => {
                let (_, rect) = self.pop_ref::<Rect>()?;
                self.fill_local_rect(&rect, Some(BLACK_PATTERN), Some(FillMode::XOr))
            }
            names::FRAME_ROUND_RECT => {
                // Corner rounding is approximated by the plain frame.
                let _oval_height = self.pop_i16()?;
                let _oval_width = self.pop_i16()?;
                let (_, rect) = self.pop_ref::<Rect>()?;
                let port = self.current_port()?;
                if let Some(recording) = self.traps.region_recording.as_mut() {
                    *recording = region::union(recording, &region::from_rect(&rect));
                    return Ok(());
                }
                let mut image = self.the_port_image()?;
                let global = local_to_global(&port, rect);
                image.frame_rect(&global, &port.pen_pattern, pen_fill_mode(&port));
                Ok(())
            }
            names::PAINT_ROUND_RECT | names::FILL_ROUND_RECT | names::ERASE_ROUND_RECT
            | names::INVERT_ROUND_RECT => {
                let pattern = if trap == names::FILL_ROUND_RECT {
                    let (_, pattern) = self.pop_ref::<PatternRecord>()?;
                    Some(pattern.pattern)
                } else {
                    None
                };
                let _oval_height = self.pop_i16()?;
                let _oval_width = self.pop_i16()?;
                let (_, rect) = self.pop_ref::<Rect>()?;
                match trap {
                    names::ERASE_ROUND_RECT => {
                        let port = self.current_port()?;
                        self.fill_local_rect(&rect, Some(port.back_pattern), Some(FillMode::Copy))
                    }
                    names::INVERT_ROUND_RECT => {
                        self.fill_local_rect(&rect, Some(BLACK_PATTERN), Some(FillMode::XOr))
                    }
                    names::FILL_ROUND_RECT => {
                        self.fill_local_rect(&rect, pattern, Some(FillMode::Copy))
                    }
                    _ => self.fill_local_rect(&rect, None, None),
                }
            }
            names::PAINT_OVAL | names::FILL_OVAL | names::ERASE_OVAL | names::FRAME_OVAL
            | names::INVERT_OVAL => {
                let pattern = if trap == names::FILL_OVAL {
                    let (_, pattern) = self.pop_ref::<PatternRecord>()?;
                    Some(pattern.pattern)
                } else {
                    None
                };
                let (_, rect) = self.pop_ref::<Rect>()?;
                let port = self.current_port()?;
                let global = local_to_global(&port, rect);
                let mut image = self.the_port_image()?;
                let fill = match trap {
                    names::ERASE_OVAL => port.back_pattern,
                    names::INVERT_OVAL => BLACK_PATTERN,
                    names::FILL_OVAL => pattern.unwrap_or(BLACK_PATTERN),
                    _ => port.pen_pattern,
                };
                image.fill_ellipse(&global, &fill);
                Ok(())
            }

            // ==================== QuickDraw: regions ====================
            names::NEW_RGN => {
                let handle = self.new_empty_region_handle()?;
                self.trap_return_u32(handle)
            }
            names::DISPOSE_RGN => {
                let handle = self.pop_u32()?;
                self.mem.deallocate(handle);
                Ok(())
            }
            names::OPEN_RGN => {
                self.traps.region_recording = Some(OwnedRegion::default());
                Ok(())
            }
            names::CLOSE_RGN => {
                let dst_handle = self.pop_u32()?;
                match self.traps.region_recording.take() {
                    Some(recorded) => self.write_region(dst_handle, &recorded),
                    None => {
                        warn!("CloseRgn without a matching OpenRgn");
                        Ok(())
                    }
                }
            }
            names::FILL_RGN => {
                let (_, pattern) = self.pop_ref::<PatternRecord>()?;
                let handle = self.pop_u32()?;
                let port = self.current_port()?;
                let local = self.read_region(handle)?;
                let global =
                    local.offset(-port.port_bits.bounds.left, -port.port_bits.bounds.top);
                let mut image = self.the_port_image()?;
                image.fill_region(&global, &pattern.pattern, FillMode::Copy);
                Ok(())
            }
            names::PT_IN_RGN => {
                let handle = self.pop_u32()?;
                let pt = self.pop_record::<Point>()?;
                let region = self.read_region(handle)?;
                self.trap_return_bool(region.contains(pt.x, pt.y))
            }
            names::RECT_IN_RGN => {
                let handle = self.pop_u32()?;
                let (_, rect) = self.pop_ref::<Rect>()?;
                let region = self.read_region(handle)?;
                let overlap = region::intersect(&region, &region::from_rect(&rect));
                self.trap_return_bool(!overlap.bands().is_empty())
            }
            names::GET_CLIP => {
                let handle = self.pop_u32()?;
                let port = self.current_port()?;
                let clip = self.read_region(port.clip_region)?;
                self.write_region(handle, &clip)
            }
            names::SET_CLIP => {
                let handle = self.pop_u32()?;
                let port = self.current_port()?;
                let clip = self.read_region(handle)?;
                self.write_region(port.clip_region, &clip)
            }
            names::CLIP_RECT => {
                let (_, rect) = self.pop_ref::<Rect>()?;
                let port = self.current_port()?;
                self.write_region(port.clip_region, &region::from_rect(&rect))
            }

            // ==================== QuickDraw: pictures ====================
            names::DRAW_PICTURE => {
                let (_, frame) = self.pop_ref::<Rect>()?;
                let handle = self.pop_u32()?;
                let data = self.mem.region_for_handle(handle)?;
                let picture = pict::parse(&data)?;
                let port = self.current_port()?;
                let global = local_to_global(&port, frame);
                let mut image = self.the_port_image()?;
                image.copy_bits(&picture.bits, &picture.frame, &picture.frame, &global);
                Ok(())
            }
            names::GET_PICTURE => {
                let id = self.pop_i16()?;
                let handle =
                    self.rsrc.get_resource(&mut self.mem, crate::records::os_type(b"PICT"), id)?;
                self.trap_return_u32(handle)
            }
            names::PLOT_ICON => {
                let icon_handle = self.pop_u32()?;
                let (_, rect) = self.pop_ref::<Rect>()?;
                let icon_ptr = self.memory.region().read_u32(icon_handle as usize)?;
                let bits = self.memory.region().read_bytes(icon_ptr as usize, 128)?;
                let port = self.current_port()?;
                let global = local_to_global(&port, rect);
                let icon_rect = new_rect(0, 0, 32, 32);
                let mut image = self.the_port_image()?;
                image.copy_bits(&bits, &icon_rect, &icon_rect, &global);
                Ok(())
            }
            names::GET_CURSOR => {
                let id = self.pop_i16()?;
                let handle =
                    self.rsrc.get_resource(&mut self.mem, crate::records::os_type(b"CURS"), id)?;
                self.trap_return_u32(handle)
            }
            names::SET_CURSOR => {
                let cursor_ptr = self.pop_u32()?;
                debug!("SetCursor(0x{:x}): host cursor is unchanged", cursor_ptr);
                Ok(())
            }

            // ==================== Window Manager ====================
            names::GET_NEW_WINDOW => {
                let behind = self.pop_u32()?;
                let storage = self.pop_u32()?;
                let id = self.pop_i16()?;
                let handle =
                    self.rsrc.get_resource(&mut self.mem, crate::records::os_type(b"WIND"), id)?;
                let data = self.mem.region_for_handle(handle)?;
                let mut reader = Reader::new(data);
                let bounds = reader.next_record::<Rect>()?;
                let definition_id = reader.next_i16()?;
                let visible = reader.next_u8()? != 0;
                let _filler = reader.next_u8()?;
                let has_close = reader.next_u8()? != 0;
                let _filler = reader.next_u8()?;
                let refcon = reader.next_u32()?;
                let title = reader.next_pstr(None)?;

                let window = self.new_window(
                    storage,
                    &bounds,
                    &title,
                    visible,
                    has_close,
                    definition_id,
                    behind,
                    refcon,
                )?;
                self.events.queue_window_activate(window, ActivateState::On);
                self.events.queue_window_update(window);
                self.trap_return_u32(window)
            }
            names::NEW_WINDOW | names::NEW_CWINDOW => {
                let refcon = self.pop_u32()?;
                let has_close = self.pop_bool()?;
                let behind = self.pop_u32()?;
                let definition_id = self.pop_i16()?;
                let visible = self.pop_bool()?;
                let title = self.pop_pstr_ref()?;
                let (_, bounds) = self.pop_ref::<Rect>()?;
                let storage = self.pop_u32()?;
                debug!("NewWindow('{}', {:?})", title, bounds);

                let window = self.new_window(
                    storage,
                    &bounds,
                    &title,
                    visible,
                    has_close,
                    definition_id,
                    behind,
                    refcon,
                )?;
                self.events.queue_window_activate(window, ActivateState::On);
                self.events.queue_window_update(window);
                self.trap_return_u32(window)
            }
            names::DISPOSE_WINDOW => {
                let window = self.pop_u32()?;
                self.dispose_window(window)
            }
            names::SHOW_WINDOW => {
                let window = self.pop_u32()?;
                self.show_window(window)
            }
            names::SELECT_WINDOW => {
                let window = self.pop_u32()?;
                self.select_window(window)
            }
            names::FRONT_WINDOW => {
                let front = self.front_window();
                self.trap_return_u32(front)
            }
            names::FIND_WINDOW => {
                let window_var = self.pop_u32()?;
                let point = self.pop_record::<Point>()?;

                if self.is_in_menu_bar(point) {
                    return self.trap_return_i16(IN_MENU_BAR);
                }
                match self.window_at(point)? {
                    (WindowPart::Drag, window) => {
                        self.memory.region().write_u32(window_var as usize, window)?;
                        self.trap_return_i16(IN_DRAG)
                    }
                    (WindowPart::Content, window) => {
                        self.memory.region().write_u32(window_var as usize, window)?;
                        self.trap_return_i16(IN_CONTENT)
                    }
                    _ => self.trap_return_i16(IN_DESK),
                }
            }
            names::DRAG_WINDOW => {
                let (_, _bounds) = self.pop_ref::<Rect>()?;
                let start = self.pop_record::<Point>()?;
                let window = self.pop_u32()?;
                self.drag_window(window, start)
            }
            names::MOVE_WINDOW => {
                let to_front = self.pop_bool()?;
                let v = self.pop_i16()?;
                let h = self.pop_i16()?;
                let window = self.pop_u32()?;
                self.move_window(window, MoveKind::Absolute, Point { x: h, y: v }, to_front)
            }
            names::DRAG_GRAY_RGN => {
                let _action_proc = self.pop_u32()?;
                let _axis = self.pop_i16()?;
                let (_, _slop) = self.pop_ref::<Rect>()?;
                let (_, _limit) = self.pop_ref::<Rect>()?;
                let start = self.pop_record::<Point>()?;
                let handle = self.pop_u32()?;
                let region = self.read_region(handle)?;
                let delta = self.drag_gray_outline(&region, start)?;
                self.trap_return_u32(((delta.y as u16 as u32) << 16) | delta.x as u16 as u32)
            }
            names::SET_WTITLE => {
                let title = self.pop_pstr_ref()?;
                let window = self.pop_u32()?;
                self.set_window_title(window, &title)
            }
            names::GET_WREF_CON => {
                let window = self.pop_u32()?;
                let record = self.read_record_at::<WindowRecord>(window)?;
                self.trap_return_u32(record.reference_constant)
            }
            names::SET_WREF_CON => {
                let refcon = self.pop_u32()?;
                let window = self.pop_u32()?;
                let mut record = self.read_record_at::<WindowRecord>(window)?;
                record.reference_constant = refcon;
                self.write_record_at(window, &record)
            }
            names::GET_WMGR_PORT => {
                let port_var = self.pop_u32()?;
                let wmgr = self.memory.region().read_u32(globals::WMGR_PORT as usize)?;
                self.memory.region().write_u32(port_var as usize, wmgr)
            }
            names::BEGIN_UPDATE => {
                let window = self.pop_u32()?;
                self.begin_update(window)
            }
            names::END_UPDATE => {
                let window = self.pop_u32()?;
                self.end_update(window)
            }
            names::INVAL_RECT => {
                let (_, rect) = self.pop_ref::<Rect>()?;
                self.invalidate_rect(&rect)
            }
            names::VALID_RECT => {
                let (_, rect) = self.pop_ref::<Rect>()?;
                self.validate_rect_in_update(&rect)
            }

            // ==================== Text ====================
            names::TEXT_FONT => {
                let font = self.pop_i16()?;
                let mut port = self.current_port()?;
                port.text_font = font;
                self.write_current_port(&port)
            }
            names::TEXT_FACE => {
                let face = self.pop_i16()?;
                let mut port = self.current_port()?;
                port.text_face = face;
                self.write_current_port(&port)
            }
            names::TEXT_SIZE => {
                let size = self.pop_i16()?;
                let mut port = self.current_port()?;
                port.text_size = size;
                self.write_current_port(&port)
            }
            names::DRAW_CHAR => {
                let ch = self.pop_u16()? as u8;
                self.draw_text_at_pen(&(ch as char).to_string())
            }
            names::DRAW_STRING => {
                let text = self.pop_pstr_ref()?;
                self.draw_text_at_pen(&text)
            }
            names::CHAR_WIDTH => {
                let ch = self.pop_u16()? as u8;
                let port = self.current_port()?;
                let font = self.font_for(port.text_font);
                self.trap_return_u16(font.as_font().char_width(ch) as u16)
            }
            names::STRING_WIDTH => {
                let text = self.pop_pstr_ref()?;
                let port = self.current_port()?;
                let font = self.font_for(port.text_font);
                self.trap_return_u16(font.as_font().string_width(&text) as u16)
            }
            names::GET_FONT_INFO => {
                let info_var = self.pop_u32()?;
                let port = self.current_port()?;
                let font = self.font_for(port.text_font);
                let info = font.as_font().font_info();
                let region = self.memory.region().clone();
                region.write_i16(info_var as usize, info.ascent)?;
                region.write_i16(info_var as usize + 2, info.descent)?;
                region.write_i16(info_var as usize + 4, info.wid_max)?;
                region.write_i16(info_var as usize + 6, info.leading)?;
                Ok(())
            }
            names::GET_F_NAME => {
                let name_var = self.pop_u32()?;
                let font = self.pop_i16()?;
                debug!("GetFontName({})", font);
                self.memory.region().write_pstr(name_var as usize, "")
            }
            names::GET_F_NUM => {
                let num_var = self.pop_u32()?;
                let _name = self.pop_pstr_ref()?;
                self.memory.region().write_i16(num_var as usize, 0)
            }
            names::REAL_FONT => {
                let _size = self.pop_i16()?;
                let _font = self.pop_i16()?;
                self.trap_return_bool(true)
            }
            names::GET_STRING => {
                let id = self.pop_i16()?;
                let handle =
                    self.rsrc.get_resource(&mut self.mem, crate::records::os_type(b"STR "), id)?;
                self.trap_return_u32(handle)
            }
            names::TE_TEXT_BOX => {
                let _just = self.pop_i16()?;
                let (_, rect) = self.pop_ref::<Rect>()?;
                let length = self.pop_u32()? as usize;
                let text_ptr = self.pop_u32()?;
                let bytes = self.memory.region().read_bytes(text_ptr as usize, length)?;
                let text: String = bytes.iter().map(|&b| b as char).collect();
                self.draw_text_box(&text, &rect)
            }

            // ==================== Dialog Manager ====================
            names::GET_NEW_DIALOG => {
                let behind = self.pop_u32()?;
                let storage = self.pop_u32()?;
                let id = self.pop_i16()?;
                let dialog = self.get_new_dialog(id, storage, behind)?;
                self.trap_return_u32(dialog)
            }
            names::GET_DIALOG_ITEM => {
                let box_var = self.pop_u32()?;
                let item_var = self.pop_u32()?;
                let type_var = self.pop_u32()?;
                let item_no = self.pop_u16()?;
                let dialog = self.pop_u32()?;
                if let Some((item_type, item, bounds)) = self.get_dialog_item(dialog, item_no)? {
                    let region = self.memory.region().clone();
                    region.write_u16(type_var as usize, item_type as u16)?;
                    region.write_u32(item_var as usize, item)?;
                    self.write_record_at(box_var, &bounds)?;
                }
                Ok(())
            }
            names::SET_DIALOG_ITEM => {
                let (_, bounds) = self.pop_ref::<Rect>()?;
                let item = self.pop_u32()?;
                let item_type = self.pop_u16()?;
                let item_no = self.pop_u16()?;
                let dialog = self.pop_u32()?;
                self.set_dialog_item(dialog, item_no, item_type as u8, item, bounds)
            }
            names::MODAL_DIALOG => {
                let item_hit_var = self.pop_u32()?;
                let filter_proc = self.pop_u32()?;
                self.modal_dialog(filter_proc, item_hit_var)
            }
            names::IS_DIALOG_EVENT => {
                let _event_ptr = self.pop_u32()?;
                let is_dialog = self.is_dialog_event()?;
                self.trap_return_bool(is_dialog)
            }
            names::DIALOG_SELECT => {
                let item_hit_var = self.pop_u32()?;
                let dialog_var = self.pop_u32()?;
                let event_ptr = self.pop_u32()?;
                let event = self.read_record_at::<crate::records::EventRecord>(event_ptr)?;
                if event.what == WINDOW_UPDATE {
                    self.draw_dialog_window(event.message)?;
                    self.memory.region().write_u32(dialog_var as usize, event.message)?;
                }
                self.memory.region().write_u16(item_hit_var as usize, 0)?;
                self.trap_return_bool(false)
            }
            names::DISPOSE_DIALOG => {
                let dialog = self.pop_u32()?;
                self.dispose_dialog(dialog)
            }
            names::STOP_ALERT | names::ALERT | names::NOTE_ALERT | names::CAUTION_ALERT => {
                let _filter_proc = self.pop_u32()?;
                let alert_id = self.pop_i16()?;
                let hit = self.stop_alert(alert_id)?;
                self.trap_return_i16(hit as i16)
            }
            names::PARAM_TEXT => {
                let p3 = self.pop_pstr_ref()?;
                let p2 = self.pop_pstr_ref()?;
                let p1 = self.pop_pstr_ref()?;
                let p0 = self.pop_pstr_ref()?;
                self.set_param_text([p0, p1, p2, p3]);
                Ok(())
            }

            // ==================== Resource Manager ====================
            names::GET_RESOURCE => {
                let id = self.pop_i16()?;
                let type_id = self.pop_u32()?;
                let handle = self.rsrc.get_resource(&mut self.mem, type_id, id)?;
                self.trap_return_u32(handle)
            }
            names::GET1_NAMED_RESOURCE | names::GET_NAMED_RESOURCE => {
                let name = self.pop_pstr_ref()?;
                let type_id = self.pop_u32()?;
                let handle = self.rsrc.get_resource_by_name(&mut self.mem, type_id, &name)?;
                self.trap_return_u32(handle)
            }
            names::LOAD_RESOURCE => {
                // Resources are always materialized on lookup.
                let _handle = self.pop_u32()?;
                Ok(())
            }
            names::RELEASE_RESOURCE => {
                let handle = self.pop_u32()?;
                self.mem.deallocate(handle);
                Ok(())
            }
            names::SIZE_RSRC => {
                let handle = self.pop_u32()?;
                let size = self.mem.handle_size(handle)?;
                self.trap_return_u32(size)
            }
            names::GET_RES_ATTRS => {
                let handle = self.pop_u32()?;
                let attrs = self.rsrc.attributes_for(handle);
                self.trap_return_u16(attrs as u16)
            }
            names::CHANGED_RESOURCE | names::WRITE_RESOURCE => {
                let handle = self.pop_u32()?;
                debug!("resource write-back ignored for 0x{:x}", handle);
                Ok(())
            }

            // ==================== OS utilities ====================
            names::SECONDS_TO_DATE => {
                let date_var = self.pop_u32()?;
                let seconds = self.pop_u32()?;
                let record = seconds_to_date(seconds);
                self.write_record_at(date_var, &record)
            }
            names::DATE_TO_SECONDS => {
                let seconds_var = self.pop_u32()?;
                let (_, date) = self.pop_ref::<DateTimeRec>()?;
                self.memory.region().write_u32(seconds_var as usize, date_to_seconds(&date))
            }
            names::HI_WORD => {
                let value = self.pop_u32()?;
                self.trap_return_u16((value >> 16) as u16)
            }
            names::LO_WORD => {
                let value = self.pop_u32()?;
                self.trap_return_u16(value as u16)
            }
            names::RANDOM => {
                let mut qd = self.qd_globals()?;
                qd.random_seed =
                    ((qd.random_seed as i64 * 16807) % 0x7FFF_FFFF) as i32;
                if qd.random_seed == 0 {
                    qd.random_seed = 1;
                }
                self.write_qd_globals(&qd)?;
                let value = qd.random_seed as u16;
                self.trap_return_u16(if value == 0x8000 { 0 } else { value })
            }
            names::STUFF_HEX => {
                let digits = self.pop_pstr_ref()?;
                let thing_ptr = self.pop_u32()?;
                let mut bytes = Vec::new();
                let mut nibbles = digits.chars().filter_map(|ch| ch.to_digit(16));
                while let (Some(high), Some(low)) = (nibbles.next(), nibbles.next()) {
                    bytes.push(((high << 4) | low) as u8);
                }
                self.memory.region().write_bytes(thing_ptr as usize, &bytes)
            }
            names::BIT_TST => {
                let bit = self.pop_u32()?;
                let base = self.pop_u32()?;
                let byte = self.memory.region().read_u8((base + bit / 8) as usize)?;
                self.trap_return_bool(byte & (0x80 >> (bit % 8)) != 0)
            }
            names::BIT_SET | names::BIT_CLR => {
                let bit = self.pop_u32()?;
                let base = self.pop_u32()?;
                let address = (base + bit / 8) as usize;
                let mask = 0x80u8 >> (bit % 8);
                let byte = self.memory.region().read_u8(address)?;
                let updated =
                    if trap == names::BIT_SET { byte | mask } else { byte & !mask };
                self.memory.region().write_u8(address, updated)
            }
            names::BIT_AND => {
                let second = self.pop_u32()?;
                let first = self.pop_u32()?;
                self.trap_return_u32(first & second)
            }
            names::BIT_OR => {
                let second = self.pop_u32()?;
                let first = self.pop_u32()?;
                self.trap_return_u32(first | second)
            }
            names::BIT_XOR => {
                let second = self.pop_u32()?;
                let first = self.pop_u32()?;
                self.trap_return_u32(first ^ second)
            }
            names::BIT_NOT => {
                let value = self.pop_u32()?;
                self.trap_return_u32(!value)
            }
            names::BIT_SHIFT => {
                let count = self.pop_i16()?;
                let value = self.pop_u32()?;
                let shifted = if count >= 0 {
                    value.wrapping_shl(count as u32 % 32)
                } else {
                    value.wrapping_shr((-count) as u32 % 32)
                };
                self.trap_return_u32(shifted)
            }
            names::FIX_RATIO => {
                let denom = self.pop_i16()? as i32;
                let numer = self.pop_i16()? as i32;
                let fix = if denom == 0 { 0x7FFF_FFFF } else { (numer << 16) / denom };
                self.trap_return_u32(fix as u32)
            }
            names::FIX_MUL => {
                let second = self.pop_u32()? as i32 as i64;
                let first = self.pop_u32()? as i32 as i64;
                self.trap_return_u32(((first * second) >> 16) as u32)
            }
            names::FIX_ROUND => {
                let fix = self.pop_u32()? as i32;
                let rounded = (fix + 0x8000) >> 16;
                self.trap_return_i16(rounded as i16)
            }

            // ==================== Sound (stubbed) ====================
            names::SYS_BEEP => {
                let duration = self.pop_i16()?;
                info!("SysBeep({}) (sound output is stubbed)", duration);
                Ok(())
            }
            names::SND_NEW_CHANNEL => {
                let _user_routine = self.pop_u32()?;
                let _init = self.pop_u32()?;
                let _synth = self.pop_i16()?;
                let _chan_var = self.pop_u32()?;
                self.trap_return_i16(0)
            }
            names::SND_PLAY => {
                let _async = self.pop_bool()?;
                let _snd_handle = self.pop_u32()?;
                let _chan = self.pop_u32()?;
                self.trap_return_i16(0)
            }
            names::SND_DISPOSE_CHANNEL => {
                let _quiet_now = self.pop_bool()?;
                let _chan = self.pop_u32()?;
                self.trap_return_i16(0)
            }

            // ==================== Misc ====================
            names::UNLOAD_SCRAP | names::LOAD_SCRAP => self.trap_return_u32(0),
            names::GET_NEW_CONTROL => {
                let _owner = self.pop_u32()?;
                let id = self.pop_i16()?;
                warn!("GetNewControl({}) returns a null handle", id);
                self.trap_return_u32(0)
            }
            names::RGB_FORE_COLOR | names::RGB_BACK_COLOR => {
                // Color QuickDraw is out of scope; the color is dropped.
                self.cpu.a[7] += 6;
                Ok(())
            }
            names::INVERT_COLOR => {
                let color_var = self.pop_u32()?;
                let region = self.memory.region().clone();
                for word in 0..3 {
                    region.write_u16(color_var as usize + word * 2, 0xFFFF)?;
                }
                Ok(())
            }
            names::PACK3 => self.standard_file_package(),
            names::UNIMPLEMENTED => Err(EmuError::UnimplementedTrap {
                name: "Unimplemented".to_string(),
                opcode: trap,
            }),

            _ => Err(EmuError::UnimplementedTrap {
                name: names::trap_name(trap),
                opcode: trap,
            }),
        }
    }

    /// Fills a rect through the current port. Defaults to the pen pattern
    /// and the port's transfer mode.
    fn fill_local_rect(
        &mut self,
        rect: &Rect,
        pattern: Option<Pattern>,
        mode: Option<FillMode>,
    ) -> Result<()> {
        let port = self.current_port()?;
        let global = local_to_global(&port, *rect);
        let mut image = self.the_port_image()?;
        image.fill_rect(
            &global,
            &pattern.unwrap_or(port.pen_pattern),
            mode.unwrap_or_else(|| pen_fill_mode(&port)),
        );
        Ok(())
    }

    /// LineTo/Line: steps from the pen location to `target` filling
    /// pen-sized cells, then moves the pen.
    fn pen_line_to(&mut self, target: Point) -> Result<()> {
        let mut port = self.current_port()?;
        let mut image = self.the_port_image()?;

        let pen = port.pen_size;
        let mode = pen_fill_mode(&port);
        let mut x = port.pen_location.x as i32;
        let mut y = port.pen_location.y as i32;
        let dx = (target.x as i32 - x).abs();
        let dy = -(target.y as i32 - y).abs();
        let sx = if target.x as i32 > x { 1 } else { -1 };
        let sy = if target.y as i32 > y { 1 } else { -1 };
        let mut error = dx + dy;

        loop {
            let cell = local_to_global(
                &port,
                new_rect(x as i16, y as i16, pen.x.max(1), pen.y.max(1)),
            );
            image.fill_rect(&cell, &port.pen_pattern, mode);
            if x == target.x as i32 && y == target.y as i32 {
                break;
            }
            let doubled = 2 * error;
            if doubled >= dy {
                error += dy;
                x += sx;
            }
            if doubled <= dx {
                error += dx;
                y += sy;
            }
        }

        port.pen_location = target;
        self.write_current_port(&port)
    }

    /// DrawString/DrawChar: renders at the pen location (which marks the
    /// text baseline) and advances the pen.
    fn draw_text_at_pen(&mut self, text: &str) -> Result<()> {
        let mut port = self.current_port()?;
        let font = self.font_for(port.text_font);
        let info = font.as_font().font_info();
        let origin = local_to_global_point(
            &port,
            Point { x: port.pen_location.x, y: port.pen_location.y - info.ascent },
        );
        let mut image = self.the_port_image()?;
        let advance = font.as_font().draw_string(&mut image, text, origin.x, origin.y);
        port.pen_location.x += advance;
        self.write_current_port(&port)
    }

    /// TETextBox: naive character wrapping at the box width.
    fn draw_text_box(&mut self, text: &str, rect: &Rect) -> Result<()> {
        let port = self.current_port()?;
        let font = self.font_for(port.text_font);
        let global = local_to_global(&port, *rect);
        let mut image = self.the_port_image()?;

        let per_line = (graphics::rect_width(&global).max(8) / 8) as usize;
        let line_height = font.as_font().line_height();
        let mut y = global.top;
        let mut line = String::new();
        for ch in text.chars() {
            line.push(ch);
            if line.len() >= per_line || ch == '\r' {
                font.as_font().draw_string(&mut image, line.trim_end_matches('\r'), global.left, y);
                line.clear();
                y += line_height;
            }
        }
        if !line.is_empty() {
            font.as_font().draw_string(&mut image, &line, global.left, y);
        }
        Ok(())
    }

    /// Pack3, the Standard File package: every request is answered as if
    /// the user cancelled, which keeps file-picking applications honest
    /// without a real file system.
    fn standard_file_package(&mut self) -> Result<()> {
        let selector = self.pop_u16()?;
        match selector {
            1 | 3 => {
                // SFPutFile / SFPPutFile
                let reply_ptr = self.pop_u32()?;
                let _dlg_hook = self.pop_u32()?;
                let _orig_name = self.pop_u32()?;
                let _prompt = self.pop_u32()?;
                let _where = self.pop_record::<Point>()?;
                info!("SFPutFile answered as cancelled");
                self.memory.region().write_u8(reply_ptr as usize, 0)
            }
            2 | 4 => {
                // SFGetFile / SFPGetFile
                let reply_ptr = self.pop_u32()?;
                let _dlg_hook = self.pop_u32()?;
                let _type_list = self.pop_u32()?;
                let _num_types = self.pop_i16()?;
                let _file_filter = self.pop_u32()?;
                let _prompt = self.pop_u32()?;
                let _where = self.pop_record::<Point>()?;
                info!("SFGetFile answered as cancelled");
                self.memory.region().write_u8(reply_ptr as usize, 0)
            }
            other => Err(EmuError::UnimplementedTrap {
                name: format!("Pack3 selector {}", other),
                opcode: names::PACK3,
            }),
        }
    }
}

fn pen_fill_mode(port: &GrafPort) -> FillMode {
    FillMode::from_pattern_mode(port.pen_mode)
}

/// A Pattern passed by reference on the stack.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct PatternRecord {
    pattern: Pattern,
}

impl Record for PatternRecord {
    const SIZE: usize = 8;
    const FIELDS: &'static [crate::records::FieldDef] = &[];
    fn read_from(region: &crate::memory::MemoryRegion, offset: usize) -> Result<Self> {
        Ok(PatternRecord {
            pattern: <Pattern as crate::records::FieldCodec>::get(region, offset)?,
        })
    }
    fn write_to(&self, region: &crate::memory::MemoryRegion, offset: usize) -> Result<()> {
        <Pattern as crate::records::FieldCodec>::put(&self.pattern, region, offset)
    }
}

fn seconds_to_date(seconds: u32) -> DateTimeRec {
    match Utc.timestamp_opt(seconds as i64 - HFS_EPOCH_OFFSET, 0).single() {
        Some(datetime) => DateTimeRec {
            year: datetime.year() as u16,
            month: datetime.month() as u16,
            day: datetime.day() as u16,
            hour: datetime.hour() as u16,
            minute: datetime.minute() as u16,
            second: datetime.second() as u16,
            day_of_week: datetime.weekday().number_from_sunday() as u16,
        },
        None => DateTimeRec::default(),
    }
}

fn date_to_seconds(date: &DateTimeRec) -> u32 {
    let maybe = Utc
        .with_ymd_and_hms(
            date.year as i32,
            date.month as u32,
            date.day as u32,
            date.hour as u32,
            date.minute as u32,
            date.second as u32,
        )
        .single();
    match maybe {
        Some(datetime) => (datetime.timestamp() + HFS_EPOCH_OFFSET) as u32,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hfs_epoch_round_trip() {
        let date = DateTimeRec {
            year: 1984,
            month: 1,
            day: 24,
            hour: 9,
            minute: 30,
            second: 0,
            day_of_week: 0,
        };
        let seconds = date_to_seconds(&date);
        let back = seconds_to_date(seconds);
        assert_eq!(back.year, 1984);
        assert_eq!(back.month, 1);
        assert_eq!(back.day, 24);
        assert_eq!(back.hour, 9);
        assert_eq!(back.minute, 30);
        // Jan 24 1984 was a Tuesday (3 counting from Sunday = 1).
        assert_eq!(back.day_of_week, 3);
    }

    #[test]
    fn hfs_epoch_starts_in_1904() {
        let epoch = seconds_to_date(0);
        assert_eq!(epoch.year, 1904);
        assert_eq!(epoch.month, 1);
        assert_eq!(epoch.day, 1);
    }
}
