// The Dialog Manager: DialogRecords wrap a WindowRecord plus a handle to the
// serialized 'DITL' item list. One shared iterator walks that list for
// drawing, hit testing and item queries, because the serialized items are
// variable length.

use log::{info, warn};

use crate::errors::Result;
use crate::events::{MOUSE_DOWN, NULL_EVENT, WINDOW_ACTIVATE, WINDOW_UPDATE};
use crate::graphics::font::{system_font, Font};
use crate::graphics::{new_rect, pict, point_in_rect, FillMode, BLACK_PATTERN};
use crate::memory::{MemoryRegion, Reader};
use crate::quickdraw::local_to_global;
use crate::records::{
    os_type, DialogRecord, Handle, ItemHeader, Ptr, Record, Rect, WindowRecord,
};
use crate::Core;

/// `dialogKind` in WindowRecord::window_kind.
pub const DIALOG_KIND: i16 = 2;

pub mod item_type {
    pub const USER_ITEM: u8 = 0;
    pub const HELP_ITEM: u8 = 1;
    pub const BUTTON: u8 = 4;
    pub const CHECKBOX: u8 = 5;
    pub const RADIO: u8 = 6;
    pub const RES_CONTROL: u8 = 7;
    pub const STATIC_TEXT: u8 = 8;
    pub const EDIT_TEXT: u8 = 16;
    pub const ICON: u8 = 32;
    pub const PICTURE: u8 = 64;
    pub const DISABLED: u8 = 128;
}

/// A parsed 'DLOG' resource.
pub struct DialogTemplate {
    pub initial_rect: Rect,
    pub window_definition_id: i16,
    pub is_visible: bool,
    pub has_close: bool,
    pub reference_constant: u32,
    pub item_list_id: i16,
    pub title: String,
}

pub fn parse_dialog_template(data: &MemoryRegion) -> Result<DialogTemplate> {
    let mut reader = Reader::new(data.clone());
    let initial_rect = reader.next_record::<Rect>()?;
    let window_definition_id = reader.next_i16()?;
    let is_visible = reader.next_u8()? != 0;
    let _filler = reader.next_u8()?;
    let has_close = reader.next_u8()? != 0;
    let _filler = reader.next_u8()?;
    let reference_constant = reader.next_u32()?;
    let item_list_id = reader.next_i16()?;
    let title = reader.next_pstr(None)?;
    Ok(DialogTemplate {
        initial_rect,
        window_definition_id,
        is_visible,
        has_close,
        reference_constant,
        item_list_id,
        title,
    })
}

#[derive(Default)]
pub struct DialogState {
    /// The four ParamText substitution strings (^0 through ^3).
    pub param_text: [String; 4],
}

/// Walks the count-prefixed item list, calling `visit` with each 1-based
/// item number and the byte offset of its fixed header. Returning false
/// stops the walk.
pub fn iterate_items(
    items: &MemoryRegion,
    mut visit: impl FnMut(u16, usize) -> Result<bool>,
) -> Result<()> {
    let mut reader = Reader::new(items.clone());
    // The count word stores one less than the number of items.
    let item_count = reader.next_i16()?;

    for index in 0..=item_count.max(0) as u16 {
        if !visit(index + 1, reader.offset())? {
            break;
        }

        // Reserved handle (4) plus the display rect (8).
        reader.skip(12);
        let raw_type = reader.next_u8()?;
        match raw_type & 0x7F {
            item_type::BUTTON
            | item_type::CHECKBOX
            | item_type::RADIO
            | item_type::STATIC_TEXT
            | item_type::EDIT_TEXT => {
                let length = reader.next_u8()? as usize;
                reader.skip(length + length % 2);
            }
            item_type::RES_CONTROL | item_type::ICON | item_type::PICTURE => {
                reader.skip(3);
            }
            item_type::USER_ITEM => reader.skip(1),
            item_type::HELP_ITEM => {
                let length = reader.next_u8()? as usize;
                reader.skip(length);
            }
            other => {
                warn!("unknown dialog item type {}", other);
                reader.skip(1);
            }
        }
    }
    Ok(())
}

impl Core {
    /// GetNewDialog: builds the DialogRecord from a 'DLOG' template and its
    /// 'DITL' item list, then focuses the new window.
    pub fn get_new_dialog(&mut self, dialog_id: i16, d_storage: Ptr, _behind: Ptr) -> Result<Ptr> {
        let d_storage = if d_storage == 0 {
            self.mem.allocate(DialogRecord::SIZE as u32)?
        } else {
            d_storage
        };

        let dlog_handle = self.rsrc.get_resource(&mut self.mem, os_type(b"DLOG"), dialog_id)?;
        let template = parse_dialog_template(&self.mem.region_for_handle(dlog_handle)?)?;
        info!(
            "DLOG {}: '{}' items {}",
            dialog_id, template.title, template.item_list_id
        );

        let items =
            self.rsrc.get_resource(&mut self.mem, os_type(b"DITL"), template.item_list_id)?;

        let mut record = DialogRecord::default();
        record.items = items;
        record.window_record = self.new_window_record(
            &template.initial_rect,
            &template.title,
            template.is_visible,
            template.has_close,
            template.window_definition_id,
            template.reference_constant,
        )?;
        record.window_record.window_kind = DIALOG_KIND;
        self.write_record_at(d_storage, &record)?;

        self.windows.list.push_front(d_storage);
        if record.window_record.visible != 0 {
            self.show_window(d_storage)?;
        }
        // As with NewWindow, opening the port makes it current.
        self.set_the_port(d_storage + DialogRecord::field("window_record.port").offset as u32)?;
        self.select_window(d_storage)?;
        Ok(d_storage)
    }

    /// Redraws every item of the dialog at `window_ptr`.
    pub fn draw_dialog_window(&mut self, window_ptr: Ptr) -> Result<()> {
        let dialog = self.read_record_at::<DialogRecord>(window_ptr)?;
        if dialog.window_record.window_kind != DIALOG_KIND {
            warn!(
                "update for window kind {} routed to the Dialog Manager",
                dialog.window_record.window_kind
            );
        }
        let items = self.mem.region_for_handle(dialog.items)?;
        let port = dialog.window_record.port;

        // Collect first: drawing needs &mut self and the iterator holds the
        // item region.
        let mut drawables: Vec<(u8, Rect, usize)> = Vec::new();
        iterate_items(&items, |_, offset| {
            let header = ItemHeader::read_from(&items, offset)?;
            drawables.push((header.type_and_disabled & 0x7F, header.bounds, offset));
            Ok(true)
        })?;

        for (kind, bounds, offset) in drawables {
            let global_box = local_to_global(&port, bounds);
            match kind {
                item_type::BUTTON => {
                    let text = items.read_pstr(offset + ItemHeader::SIZE)?;
                    self.screen.frame_rect(&global_box, &BLACK_PATTERN, FillMode::Copy);
                    let text = self.substitute_params(&text);
                    system_font().draw_string(
                        &mut self.screen,
                        &text,
                        global_box.left,
                        global_box.top,
                    );
                }
                item_type::STATIC_TEXT => {
                    let text = items.read_pstr(offset + ItemHeader::SIZE)?;
                    let text = self.substitute_params(&text);
                    system_font().draw_string(
                        &mut self.screen,
                        &text,
                        global_box.left,
                        global_box.top,
                    );
                }
                item_type::ICON => {
                    let resource_id = items.read_i16(offset + ItemHeader::SIZE + 1)?;
                    let handle =
                        self.rsrc.get_resource(&mut self.mem, os_type(b"ICON"), resource_id)?;
                    if handle == 0 {
                        continue;
                    }
                    let icon_ptr = self.memory.region().read_u32(handle as usize)?;
                    let bits = self.memory.region().read_bytes(icon_ptr as usize, 128)?;
                    let icon_rect = new_rect(0, 0, 32, 32);
                    self.screen.copy_bits(&bits, &icon_rect, &icon_rect, &global_box);
                }
                item_type::PICTURE => {
                    let resource_id = items.read_i16(offset + ItemHeader::SIZE + 1)?;
                    let handle =
                        self.rsrc.get_resource(&mut self.mem, os_type(b"PICT"), resource_id)?;
                    if handle == 0 {
                        continue;
                    }
                    let picture = pict::parse(&self.mem.region_for_handle(handle)?)?;
                    self.screen.copy_bits(
                        &picture.bits,
                        &picture.frame,
                        &picture.frame,
                        &global_box,
                    );
                }
                other => {
                    info!("not drawing dialog item type {}", other);
                }
            }
        }
        Ok(())
    }

    fn substitute_params(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (index, value) in self.dialogs.param_text.iter().enumerate() {
            out = out.replace(&format!("^{}", index), value);
        }
        out
    }

    /// GetDialogItem: looks up an item by number, returning its type, its
    /// serialized offset (standing in for an item handle) and its box.
    pub fn get_dialog_item(
        &mut self,
        dialog_ptr: Ptr,
        target: u16,
    ) -> Result<Option<(u8, Handle, Rect)>> {
        let dialog = self.read_record_at::<DialogRecord>(dialog_ptr)?;
        let items = self.mem.region_for_handle(dialog.items)?;
        let mut found = None;
        iterate_items(&items, |item_no, offset| {
            if item_no != target {
                return Ok(true);
            }
            let header = ItemHeader::read_from(&items, offset)?;
            found = Some((header.type_and_disabled, offset as Handle, header.bounds));
            Ok(false)
        })?;
        Ok(found)
    }

    pub fn set_dialog_item(
        &mut self,
        dialog_ptr: Ptr,
        target: u16,
        item_type: u8,
        item: Handle,
        bounds: Rect,
    ) -> Result<()> {
        let dialog = self.read_record_at::<DialogRecord>(dialog_ptr)?;
        let items = self.mem.region_for_handle(dialog.items)?;
        iterate_items(&items, |item_no, offset| {
            if item_no != target {
                return Ok(true);
            }
            let header = ItemHeader { item, bounds, type_and_disabled: item_type };
            header.write_to(&items, offset)?;
            Ok(false)
        })
    }

    /// ModalDialog: first drains pending updates (drawing dialog items),
    /// then waits for a mouse-down on an enabled button and reports its
    /// 1-based item number through `item_hit_ptr`.
    pub fn modal_dialog(&mut self, filter_proc: Ptr, item_hit_ptr: Ptr) -> Result<()> {
        if filter_proc != 0 {
            warn!("ModalDialog filterProc 0x{:x} is not supported; ignoring", filter_proc);
        }

        // Drain the lifecycle lanes only; queued input stays for the
        // hit-test loop below.
        loop {
            let event =
                self.events.get_next_event((1 << WINDOW_UPDATE) | (1 << WINDOW_ACTIVATE));
            if event.what == NULL_EVENT {
                break;
            }
            if event.what == WINDOW_UPDATE {
                self.draw_dialog_window(event.message)?;
            }
        }

        let front = self.front_window();
        let dialog = self.read_record_at::<DialogRecord>(front)?;
        if dialog.window_record.window_kind != DIALOG_KIND {
            warn!("ModalDialog with a non-dialog front window");
        }
        let items = self.mem.region_for_handle(dialog.items)?;
        let port = dialog.window_record.port;

        let scope = self.events.enable_mouse_move();
        loop {
            let event = self.events.get_next_event(1 << MOUSE_DOWN);
            if event.what != MOUSE_DOWN {
                if !self.host_yield() {
                    break;
                }
                continue;
            }

            let mut hit = None;
            iterate_items(&items, |item_no, offset| {
                let header = ItemHeader::read_from(&items, offset)?;
                let kind = header.type_and_disabled & 0x7F;
                let disabled = header.type_and_disabled & item_type::DISABLED != 0;
                if disabled || kind != item_type::BUTTON {
                    return Ok(true);
                }
                let global_box = local_to_global(&port, header.bounds);
                if point_in_rect(event.location, &global_box) {
                    hit = Some(item_no);
                    return Ok(false);
                }
                Ok(true)
            })?;

            if let Some(item_no) = hit {
                self.memory.region().write_u16(item_hit_ptr as usize, item_no)?;
                break;
            }
        }
        drop(scope);
        Ok(())
    }

    /// IsDialogEvent: whether the active window is a dialog.
    pub fn is_dialog_event(&self) -> Result<bool> {
        let front = self.front_window();
        if front == 0 {
            return Ok(false);
        }
        let window = self.read_record_at::<WindowRecord>(front)?;
        Ok(window.window_kind == DIALOG_KIND)
    }

    pub fn dispose_dialog(&mut self, dialog_ptr: Ptr) -> Result<()> {
        self.dispose_window(dialog_ptr)
    }

    /// StopAlert: builds a one-shot dialog from the 'ALRT' template, runs
    /// the modal loop, and tears it down again.
    pub fn stop_alert(&mut self, alert_id: i16) -> Result<u16> {
        let handle = self.rsrc.get_resource(&mut self.mem, os_type(b"ALRT"), alert_id)?;
        if handle == 0 {
            warn!("StopAlert {}: no 'ALRT' resource", alert_id);
            return Ok(1);
        }
        let data = self.mem.region_for_handle(handle)?;
        let mut reader = Reader::new(data);
        let bounds = reader.next_record::<Rect>()?;
        let item_list_id = reader.next_i16()?;
        let _stages = reader.next_u16()?;

        let storage = self.mem.allocate(DialogRecord::SIZE as u32)?;
        let items = self.rsrc.get_resource(&mut self.mem, os_type(b"DITL"), item_list_id)?;

        let mut record = DialogRecord::default();
        record.items = items;
        record.window_record = self.new_window_record(&bounds, "", true, false, 1, 0)?;
        record.window_record.window_kind = DIALOG_KIND;
        self.write_record_at(storage, &record)?;

        self.windows.list.push_front(storage);
        self.show_window(storage)?;
        self.set_the_port(storage + DialogRecord::field("window_record.port").offset as u32)?;
        self.select_window(storage)?;
        self.draw_dialog_window(storage)?;

        let item_hit = self.mem.allocate(2)?;
        self.modal_dialog(0, item_hit)?;
        let hit = self.memory.region().read_u16(item_hit as usize)?;
        self.dispose_window(storage)?;
        Ok(hit)
    }

    pub fn set_param_text(&mut self, texts: [String; 4]) {
        self.dialogs.param_text = texts;
    }
}
