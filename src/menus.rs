// The Menu Manager: an ordered strip of menus across the top 20 pixels of
// the screen, and the tracked pop-up that appears while the mouse is down.
// The pop-up saves the pixels it covers into an off-screen bitmap and puts
// them back when it is torn down, whatever path the tracking loop takes out.

use std::collections::BTreeMap;

use log::warn;

use crate::errors::Result;
use crate::events::{MOUSE_MOVE, MOUSE_MOVE_MASK, MOUSE_UP};
use crate::graphics::font::{system_font, Font, APPLE_GLYPH, COMMAND_GLYPH};
use crate::graphics::{
    new_rect, offset_rect, rect_height, rect_width, BitmapImage, FillMode, BLACK_PATTERN,
    WHITE_PATTERN,
};
use crate::memory::{MemoryRegion, Reader};
use crate::records::Point;
use crate::Core;

pub const MENU_BAR_HEIGHT: i16 = 20;

const BAR_PADDING: i16 = 6;
const ITEM_WIDTH_PADDING: i16 = 4;
const ITEM_HEIGHT_PADDING: i16 = 6;

const MENU_ITEM_HEIGHT: i16 = 12;
const GLYPH_WIDTH: i16 = 8;
const POPUP_WIDTH_PADDING: i16 = 6;
const POPUP_HEIGHT_PADDING: i16 = 2;

/// Minimum gap between an item title and its right-aligned shortcut.
const SHORTCUT_GAP: i16 = 12;

const APPLE_ICON_WIDTH: i16 = 16;

/// A parsed 'MENU' resource header.
#[derive(Debug, Clone)]
pub struct MenuRes {
    pub id: i16,
    pub width: i16,
    pub height: i16,
    pub definition_proc: i16,
    /// Bit 0: the menu itself; bit n+1: item n.
    pub state_bit_field: u32,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct MenuItemRes {
    pub title: String,
    pub icon: u8,
    pub keyboard_shortcut: u8,
    pub mark: u8,
    pub style: u8,
}

impl MenuRes {
    pub fn is_item_enabled(&self, item_index: usize) -> bool {
        self.state_bit_field >> (item_index + 1) & 1 != 0
    }

    fn is_apple_menu(&self) -> bool {
        self.title.len() == 1 && self.title.as_bytes()[0] == APPLE_GLYPH
    }

    fn bar_slot_width(&self) -> i16 {
        let title_width = if self.is_apple_menu() {
            APPLE_ICON_WIDTH
        } else {
            self.title.len() as i16 * GLYPH_WIDTH
        };
        title_width + ITEM_WIDTH_PADDING * 2
    }
}

/// Parses a 'MENU' resource: the fixed header, the title, then items until
/// the zero-length terminator.
pub fn parse_menu(data: &MemoryRegion) -> Result<(MenuRes, Vec<MenuItemRes>)> {
    let mut reader = Reader::new(data.clone());
    let id = reader.next_i16()?;
    let width = reader.next_i16()?;
    let height = reader.next_i16()?;
    let definition_proc = reader.next_i16()?;
    let _filler = reader.next_i16()?;
    let state_bit_field = reader.next_u32()?;
    let title = reader.next_pstr(None)?;

    let menu = MenuRes { id, width, height, definition_proc, state_bit_field, title };

    let mut items = Vec::new();
    while reader.has_next() && reader.peek_u8()? != 0 {
        let title = reader.next_pstr(None)?;
        let icon = reader.next_u8()?;
        let keyboard_shortcut = reader.next_u8()?;
        let mark = reader.next_u8()?;
        let style = reader.next_u8()?;
        items.push(MenuItemRes { title, icon, keyboard_shortcut, mark, style });
    }
    Ok((menu, items))
}

#[derive(Default)]
pub struct MenuState {
    pub menus: Vec<MenuRes>,
    pub items: BTreeMap<i16, Vec<MenuItemRes>>,
}

fn is_separator(item: &MenuItemRes) -> bool {
    item.title.starts_with('-')
}

const APPLE_ICON: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x07, 0xFE, 0x37, 0xFE, 0x3F, 0xFE, 0x37, 0x9E, 0x37, 0x6E, 0x37,
    0x7E, 0x37, 0x6E, 0x37, 0x9E, 0x3F, 0xFE, 0x37, 0xFE, 0x07, 0xFE, 0x03, 0xFC, 0x01, 0xF8,
    0x00, 0x00,
];

/// The on-screen pop-up for one menu: anchor slot inverted, covered pixels
/// saved, and the hovered row tracked so it can be restored before moving.
pub struct MenuPopup {
    pub menu_id: i16,
    anchor_rect: crate::records::Rect,
    popup_rect: crate::records::Rect,
    saved: BitmapImage,
    hovered: Option<u16>,
}

pub const NO_MENU_ITEM: u16 = 0;

impl Core {
    pub fn insert_menu(&mut self, menu: MenuRes, items: Vec<MenuItemRes>) {
        if self.menus.items.contains_key(&menu.id) {
            return;
        }
        self.menus.items.insert(menu.id, items);
        self.menus.menus.push(menu);
    }

    pub fn menu_by_id(&self, menu_id: i16) -> Option<&MenuRes> {
        self.menus.menus.iter().find(|menu| menu.id == menu_id)
    }

    pub fn draw_menu_bar(&mut self) {
        let bar = new_rect(0, 0, self.screen.width() as i16, MENU_BAR_HEIGHT);
        self.screen.fill_rect(&bar, &WHITE_PATTERN, FillMode::Copy);
        self.screen.fill_row(
            MENU_BAR_HEIGHT - 1,
            0,
            self.screen.width() as i16,
            0xFF,
            FillMode::Copy,
        );

        let mut x_offset = BAR_PADDING;
        let menus = self.menus.menus.clone();
        for menu in &menus {
            if menu.is_apple_menu() {
                let icon_rect = new_rect(0, 0, 16, 16);
                self.screen.copy_bits(
                    &APPLE_ICON,
                    &icon_rect,
                    &icon_rect,
                    &offset_rect(icon_rect, x_offset + ITEM_WIDTH_PADDING, 2),
                );
            } else {
                system_font().draw_string(
                    &mut self.screen,
                    &menu.title,
                    x_offset + ITEM_WIDTH_PADDING,
                    ITEM_HEIGHT_PADDING,
                );
            }
            x_offset += menu.bar_slot_width();
        }
    }

    pub fn is_in_menu_bar(&self, point: Point) -> bool {
        point.y < MENU_BAR_HEIGHT
    }

    /// The bar slot (index and rect) under `point`, if any.
    fn menu_bar_slot(&self, point: Point) -> Option<(usize, crate::records::Rect)> {
        if point.y >= MENU_BAR_HEIGHT {
            return None;
        }
        let mut x_offset = BAR_PADDING;
        for (index, menu) in self.menus.menus.iter().enumerate() {
            let next = x_offset + menu.bar_slot_width();
            if point.x > x_offset && point.x < next {
                return Some((index, new_rect(x_offset, 0, next - x_offset, MENU_BAR_HEIGHT)));
            }
            x_offset = next;
        }
        None
    }

    /// MenuSelect: tracks the mouse with a pop-up until mouse-up; returns
    /// `(menu_id << 16) | item` or 0 when nothing was chosen.
    pub fn menu_select(&mut self, start: Point) -> Result<u32> {
        let scope = self.events.enable_mouse_move();
        let mut popup: Option<MenuPopup> = None;

        self.track_menu_hover(&mut popup, start)?;

        let result = loop {
            let event = self.events.get_next_event(MOUSE_MOVE_MASK | (1 << MOUSE_UP));
            match event.what {
                what if what == MOUSE_MOVE => {
                    self.track_menu_hover(&mut popup, event.location)?;
                }
                what if what == MOUSE_UP => {
                    break match popup.take() {
                        Some(mut open) => {
                            let item =
                                self.popup_hover(&mut open, event.location.x, event.location.y);
                            let menu_id = open.menu_id;
                            self.popup_close(open);
                            if item == NO_MENU_ITEM {
                                0
                            } else {
                                ((menu_id as u16 as u32) << 16) | item as u32
                            }
                        }
                        None => 0,
                    };
                }
                _ => {
                    if !self.host_yield() {
                        break 0;
                    }
                }
            }
        };
        drop(scope);
        Ok(result)
    }

    /// Rebuilds the pop-up when the hovered bar slot changes, then updates
    /// the hovered row inside the open pop-up.
    fn track_menu_hover(&mut self, popup: &mut Option<MenuPopup>, point: Point) -> Result<()> {
        if let Some((index, anchor)) = self.menu_bar_slot(point) {
            let menu_id = self.menus.menus[index].id;
            let rebuild = match popup {
                Some(open) => open.menu_id != menu_id,
                None => true,
            };
            if rebuild {
                // Tear down first so the saved pixels go back before the
                // next pop-up captures its own.
                if let Some(open) = popup.take() {
                    self.popup_close(open);
                }
                *popup = Some(self.popup_open(index, anchor)?);
            }
        }
        if let Some(open) = popup.as_mut() {
            self.popup_hover(open, point.x, point.y);
        }
        Ok(())
    }

    fn popup_open(&mut self, menu_index: usize, anchor_rect: crate::records::Rect) -> Result<MenuPopup> {
        let menu = self.menus.menus[menu_index].clone();
        let items = self.menus.items.get(&menu.id).cloned().unwrap_or_default();

        // Invert the anchor slot in the bar.
        self.screen.fill_rect(&anchor_rect, &BLACK_PATTERN, FillMode::XOr);

        // Size the pop-up: widest title, with room for "(cmd)X" shortcuts.
        let mut width = 0i16;
        let mut height = 0i16;
        for item in &items {
            height += MENU_ITEM_HEIGHT;
            let mut item_width = item.title.len() as i16 * GLYPH_WIDTH;
            if item.keyboard_shortcut != 0 {
                item_width += SHORTCUT_GAP + GLYPH_WIDTH * 2;
            }
            width = width.max(item_width);
        }
        let popup_rect = new_rect(
            anchor_rect.left,
            anchor_rect.bottom,
            width + POPUP_WIDTH_PADDING * 2,
            height,
        );

        // Save the pixels underneath before drawing over them.
        let mut saved =
            BitmapImage::new(rect_width(&popup_rect) as i32, rect_height(&popup_rect) as i32);
        saved.copy_bitmap(
            &self.screen,
            &popup_rect,
            &crate::graphics::normalize_rect(popup_rect),
        );

        self.screen.fill_rect(&popup_rect, &WHITE_PATTERN, FillMode::Copy);
        self.screen.frame_rect(&popup_rect, &BLACK_PATTERN, FillMode::Copy);

        let mut y_offset = popup_rect.top;
        for item in &items {
            if is_separator(item) {
                // A grey divider, kept inside the frame.
                self.screen.fill_row(
                    y_offset + MENU_ITEM_HEIGHT / 2,
                    popup_rect.left + 1,
                    popup_rect.right - 1,
                    0xAA,
                    FillMode::Copy,
                );
            } else {
                system_font().draw_string(
                    &mut self.screen,
                    &item.title,
                    popup_rect.left + POPUP_WIDTH_PADDING,
                    y_offset + POPUP_HEIGHT_PADDING,
                );
                if item.keyboard_shortcut != 0 {
                    let shortcut =
                        format!("{}{}", COMMAND_GLYPH as char, item.keyboard_shortcut as char);
                    system_font().draw_string(
                        &mut self.screen,
                        &shortcut,
                        popup_rect.right - POPUP_WIDTH_PADDING - GLYPH_WIDTH * 2,
                        y_offset + POPUP_HEIGHT_PADDING,
                    );
                }
            }
            y_offset += MENU_ITEM_HEIGHT;
        }

        Ok(MenuPopup { menu_id: menu.id, anchor_rect, popup_rect, saved, hovered: None })
    }

    /// Updates the hovered row for the pointer at (x, y); returns the
    /// 1-based item index or NO_MENU_ITEM. Disabled items never hilite.
    pub fn popup_hover(&mut self, popup: &mut MenuPopup, x: i16, y: i16) -> u16 {
        let inside = x >= popup.popup_rect.left
            && x < popup.popup_rect.right
            && y >= popup.popup_rect.top
            && y < popup.popup_rect.bottom;

        let item_index = if inside {
            Some(((y - popup.popup_rect.top) / MENU_ITEM_HEIGHT) as u16)
        } else {
            None
        };

        let enabled = match (item_index, self.menu_by_id(popup.menu_id)) {
            (Some(index), Some(menu)) => menu.is_item_enabled(index as usize),
            _ => false,
        };

        let target = if enabled { item_index } else { None };
        if popup.hovered != target {
            if let Some(previous) = popup.hovered {
                let rect = popup_item_rect(&popup.popup_rect, previous);
                self.screen.fill_rect(&rect, &BLACK_PATTERN, FillMode::XOr);
            }
            if let Some(next) = target {
                let rect = popup_item_rect(&popup.popup_rect, next);
                self.screen.fill_rect(&rect, &BLACK_PATTERN, FillMode::XOr);
            }
            popup.hovered = target;
        }

        match target {
            Some(index) => index + 1,
            None => NO_MENU_ITEM,
        }
    }

    /// Puts back the saved pixels and un-inverts the anchor slot.
    pub fn popup_close(&mut self, popup: MenuPopup) {
        let MenuPopup { anchor_rect, popup_rect, saved, .. } = popup;
        self.screen.copy_bitmap(
            &saved,
            &crate::graphics::normalize_rect(popup_rect),
            &popup_rect,
        );
        self.screen.fill_rect(&anchor_rect, &BLACK_PATTERN, FillMode::XOr);
    }

    pub fn count_menu_items(&self, menu_id: i16) -> u16 {
        self.menus.items.get(&menu_id).map(|items| items.len() as u16).unwrap_or(0)
    }

    pub fn menu_item_text(&self, menu_id: i16, item: u16) -> String {
        self.menus
            .items
            .get(&menu_id)
            .and_then(|items| items.get(item as usize - 1))
            .map(|item| item.title.clone())
            .unwrap_or_default()
    }

    /// EnableItem/DisableItem: item 0 addresses the whole menu.
    pub fn set_menu_item_enabled(&mut self, menu_id: i16, item: u16, enabled: bool) {
        if let Some(menu) = self.menus.menus.iter_mut().find(|menu| menu.id == menu_id) {
            let bit = 1u32 << item;
            if enabled {
                menu.state_bit_field |= bit;
            } else {
                menu.state_bit_field &= !bit;
            }
        } else {
            warn!("enable/disable on unknown menu {}", menu_id);
        }
    }

    pub fn set_menu_item_mark(&mut self, menu_id: i16, item: u16, mark: u8) {
        if let Some(items) = self.menus.items.get_mut(&menu_id) {
            if let Some(entry) = items.get_mut(item as usize - 1) {
                entry.mark = mark;
            }
        }
    }

    /// AppendResMenu: appends every resource name of `type_id` as an item.
    pub fn append_res_menu(&mut self, menu_id: i16, type_id: crate::records::OSType) {
        let names = self.rsrc.ids_for_type(type_id);
        if let Some(items) = self.menus.items.get_mut(&menu_id) {
            for (_, name) in names {
                if name.is_empty() {
                    continue;
                }
                items.push(MenuItemRes {
                    title: name,
                    icon: 0,
                    keyboard_shortcut: 0,
                    mark: 0,
                    style: 0,
                });
            }
        }
    }
}

fn popup_item_rect(popup_rect: &crate::records::Rect, item_index: u16) -> crate::records::Rect {
    let top = popup_rect.top + item_index as i16 * MENU_ITEM_HEIGHT;
    crate::records::Rect {
        top,
        left: popup_rect.left,
        bottom: top + MENU_ITEM_HEIGHT,
        right: popup_rect.right,
    }
}

