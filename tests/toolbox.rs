// Manager-level scenarios: window stacking and repaint ordering, menu
// tracking, and dialog hit testing, driven through the native interfaces.

mod common;

use common::{bare_core, init_quickdraw};
use emmac::events::{ActivateState, EVERY_EVENT, NULL_EVENT, WINDOW_ACTIVATE, WINDOW_UPDATE};
use emmac::graphics::new_rect;
use emmac::menus::{MenuItemRes, MenuRes};
use emmac::records::{Point, Record, WindowRecord};
use emmac::windows::WindowPart;

fn plain_menu(id: i16, title: &str, items: &[&str]) -> (MenuRes, Vec<MenuItemRes>) {
    let menu = MenuRes {
        id,
        width: 0,
        height: 0,
        definition_proc: 0,
        state_bit_field: 0xFFFF_FFFF,
        title: title.to_string(),
    };
    let items = items
        .iter()
        .map(|title| MenuItemRes {
            title: title.to_string(),
            icon: 0,
            keyboard_shortcut: 0,
            mark: 0,
            style: 0,
        })
        .collect();
    (menu, items)
}

#[test]
fn select_window_reorders_and_invalidates_back_to_front() {
    let mut core = bare_core();
    init_quickdraw(&mut core);

    let w1 = core
        .new_window(0, &new_rect(40, 60, 120, 80), "W1", true, false, 0, 0, 0)
        .unwrap();
    let w2 = core
        .new_window(0, &new_rect(80, 100, 120, 80), "W2", true, false, 0, 0, 0)
        .unwrap();
    let w3 = core
        .new_window(0, &new_rect(120, 140, 120, 80), "W3", true, false, 0, 0, 0)
        .unwrap();
    assert_eq!(core.windows.list, [w3, w2, w1]);

    core.events.flush_events(EVERY_EVENT);
    core.select_window(w2).unwrap();

    // Stacking: the selected window comes to the front.
    assert_eq!(core.windows.list, [w2, w3, w1]);

    // One activate event for W2, then painter's-algorithm updates.
    let activate = core.events.get_next_event(EVERY_EVENT);
    assert_eq!(activate.what, WINDOW_ACTIVATE);
    assert_eq!(activate.message, w2);
    assert_eq!(activate.modifiers & 1, 1);

    for expected in [w1, w3, w2] {
        let update = core.events.get_next_event(EVERY_EVENT);
        assert_eq!(update.what, WINDOW_UPDATE);
        assert_eq!(update.message, expected);
    }
    assert_eq!(core.events.get_next_event(EVERY_EVENT).what, NULL_EVENT);

    // Only the selected window is hilited.
    for (window, hilited) in [(w1, 0u8), (w2, 0xFF), (w3, 0)] {
        let record = WindowRecord::read_from(core.memory.region(), window as usize).unwrap();
        assert_eq!(record.hilited, hilited, "window 0x{:x}", window);
    }
}

#[test]
fn selecting_the_active_window_is_a_no_op() {
    let mut core = bare_core();
    init_quickdraw(&mut core);

    let w1 = core
        .new_window(0, &new_rect(40, 60, 120, 80), "W1", true, false, 0, 0, 0)
        .unwrap();
    core.events.flush_events(EVERY_EVENT);
    core.select_window(w1).unwrap();
    assert_eq!(core.events.get_next_event(EVERY_EVENT).what, NULL_EVENT);
}

#[test]
fn find_window_distinguishes_title_bar_and_content() {
    let mut core = bare_core();
    init_quickdraw(&mut core);

    let window = core
        .new_window(0, &new_rect(100, 100, 120, 80), "Doc", true, false, 0, 0, 0)
        .unwrap();

    // The content area.
    let (part, hit) = core.window_at(Point { x: 150, y: 150 }).unwrap();
    assert_eq!(part, WindowPart::Content);
    assert_eq!(hit, window);

    // The title bar extends above the content rect.
    let (part, hit) = core.window_at(Point { x: 150, y: 95 }).unwrap();
    assert_eq!(part, WindowPart::Drag);
    assert_eq!(hit, window);

    // The desktop.
    let (part, _) = core.window_at(Point { x: 400, y: 300 }).unwrap();
    assert_eq!(part, WindowPart::Desk);

    // The menu bar is the caller's concern.
    assert!(core.is_in_menu_bar(Point { x: 10, y: 5 }));
}

#[test]
fn dispose_window_activates_the_next_front_window() {
    let mut core = bare_core();
    init_quickdraw(&mut core);

    let w1 = core
        .new_window(0, &new_rect(40, 60, 120, 80), "W1", true, false, 0, 0, 0)
        .unwrap();
    let w2 = core
        .new_window(0, &new_rect(80, 100, 120, 80), "W2", true, false, 0, 0, 0)
        .unwrap();

    core.events.flush_events(EVERY_EVENT);
    core.dispose_window(w2).unwrap();

    assert_eq!(core.windows.list, [w1]);
    let activate = core.events.get_next_event(EVERY_EVENT);
    assert_eq!(activate.what, WINDOW_ACTIVATE);
    assert_eq!(activate.message, w1);
}

#[test]
fn menu_select_tracks_to_the_second_item() {
    let mut core = bare_core();

    let (menu, items) = plain_menu(42, "File", &["Open", "Quit"]);
    core.insert_menu(menu, items);
    core.draw_menu_bar();

    // Inject the tracking gesture up front: move onto the title, move onto
    // the second item, release there.
    {
        let scope = core.events.enable_mouse_move();
        core.events.on_mouse_move(20, 10);
        core.events.on_mouse_move(20, 35);
        drop(scope);
    }
    core.events.queue_mouse_up(20, 35);

    let chosen = core.menu_select(Point { x: 20, y: 10 }).unwrap();
    assert_eq!(chosen, (42u32 << 16) | 2);
}

#[test]
fn menu_select_outside_any_item_returns_zero() {
    let mut core = bare_core();

    let (menu, items) = plain_menu(7, "Edit", &["Undo"]);
    core.insert_menu(menu, items);
    core.draw_menu_bar();

    {
        let scope = core.events.enable_mouse_move();
        core.events.on_mouse_move(20, 10);
        core.events.on_mouse_move(300, 300);
        drop(scope);
    }
    core.events.queue_mouse_up(300, 300);

    assert_eq!(core.menu_select(Point { x: 20, y: 10 }).unwrap(), 0);
}

#[test]
fn disabled_menu_items_cannot_be_chosen() {
    let mut core = bare_core();

    let (mut menu, items) = plain_menu(9, "File", &["Open", "Quit"]);
    // Menu enabled, item 1 enabled, item 2 disabled.
    menu.state_bit_field = 0b011;
    core.insert_menu(menu, items);
    core.draw_menu_bar();

    {
        let scope = core.events.enable_mouse_move();
        core.events.on_mouse_move(20, 10);
        core.events.on_mouse_move(20, 35);
        drop(scope);
    }
    core.events.queue_mouse_up(20, 35);

    assert_eq!(core.menu_select(Point { x: 20, y: 10 }).unwrap(), 0);
}

#[test]
fn menu_popup_restores_the_screen_under_it() {
    let mut core = bare_core();
    let before = core.screen.snapshot().unwrap();

    let (menu, items) = plain_menu(3, "File", &["Open", "Quit"]);
    core.insert_menu(menu, items);

    {
        let scope = core.events.enable_mouse_move();
        core.events.on_mouse_move(20, 10);
        drop(scope);
    }
    core.events.queue_mouse_up(300, 300);
    core.menu_select(Point { x: 20, y: 10 }).unwrap();

    assert_eq!(core.screen.snapshot().unwrap(), before);
}

#[test]
fn window_activation_event_carries_the_activate_flag() {
    let mut core = bare_core();
    core.events.queue_window_activate(0xBEEF, ActivateState::Off);
    let event = core.events.get_next_event(EVERY_EVENT);
    assert_eq!(event.what, WINDOW_ACTIVATE);
    assert_eq!(event.modifiers & 1, 0);
}

#[test]
fn modal_dialog_reports_the_hit_button() {
    use emmac::memory::MemoryRegion;
    use emmac::records::{ItemHeader, Rect};
    use emmac::rsrc::{Resource, ResourceFile, ResourceGroup};

    // A DITL with one enabled button at local (10, 10, 70, 30).
    let ditl = {
        let region = MemoryRegion::new("ditl", 64);
        region.write_i16(0, 0).unwrap(); // one item (count - 1)
        let header = ItemHeader {
            item: 0,
            bounds: Rect { top: 10, left: 10, bottom: 30, right: 70 },
            type_and_disabled: emmac::dialogs::item_type::BUTTON,
        };
        header.write_to(&region, 2).unwrap();
        region.write_pstr(2 + ItemHeader::SIZE, "OK").unwrap();
        region.read_bytes(0, 2 + ItemHeader::SIZE + 3).unwrap()
    };

    // A DLOG placing the dialog at global (50, 50).
    let dlog = {
        let region = MemoryRegion::new("dlog", 32);
        let bounds = Rect { top: 50, left: 50, bottom: 150, right: 250 };
        bounds.write_to(&region, 0).unwrap();
        region.write_i16(8, 1).unwrap(); // dialog definition
        region.write_u8(10, 0xFF).unwrap(); // visible
        region.write_u8(12, 0).unwrap(); // no close box
        region.write_u32(14, 0).unwrap(); // refcon
        region.write_i16(18, 300).unwrap(); // DITL id
        region.write_pstr(20, "").unwrap();
        region.read_bytes(0, 21).unwrap()
    };

    let file = ResourceFile::from_groups(vec![
        ResourceGroup::new(
            emmac::records::os_type(b"DLOG"),
            vec![Resource::new(200, 0, String::new(), MemoryRegion::from_vec("d", dlog))],
        ),
        ResourceGroup::new(
            emmac::records::os_type(b"DITL"),
            vec![Resource::new(300, 0, String::new(), MemoryRegion::from_vec("i", ditl))],
        ),
    ]);

    let mut core = emmac::Core::new(file, None).unwrap();
    init_quickdraw(&mut core);

    let dialog = core.get_new_dialog(200, 0, 0).unwrap();
    assert_ne!(dialog, 0);
    assert!(core.is_dialog_event().unwrap());

    // The button's global box is (60, 60, 120, 80); click inside it.
    core.events.queue_mouse_down(70, 70);
    let item_hit = core.mem.allocate(2).unwrap();
    core.modal_dialog(0, item_hit).unwrap();
    assert_eq!(core.memory.region().read_u16(item_hit as usize).unwrap(), 1);

    let (item_type, _, bounds) = core.get_dialog_item(dialog, 1).unwrap().unwrap();
    assert_eq!(item_type & 0x7F, emmac::dialogs::item_type::BUTTON);
    assert_eq!(bounds, Rect { top: 10, left: 10, bottom: 30, right: 70 });
}
