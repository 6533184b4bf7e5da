// The host frame loop: a minifb window paced at roughly vsync, blitting the
// 1-bpp raster and feeding keyboard and mouse state into the event queue.
// The same pump doubles as the yield point for nested event loops inside
// trap handlers, so tracking a menu never freezes the display.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use log::info;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::errors::{EmuError, Result};
use crate::events::EventManager;
use crate::graphics::BitmapImage;
use crate::{Core, HostBridge, SCREEN_HEIGHT, SCREEN_WIDTH};

const PIXEL_ON: u32 = 0x0000_0000; // set bits draw ink (black)
const PIXEL_OFF: u32 = 0x00FF_FFFF;

pub struct MinifbHost {
    window: Window,
    framebuffer: Vec<u32>,
    mouse_was_down: bool,
}

impl MinifbHost {
    pub fn new(title: &str) -> Result<Self> {
        let mut window = Window::new(
            title,
            SCREEN_WIDTH as usize,
            SCREEN_HEIGHT as usize,
            WindowOptions::default(),
        )
        .map_err(|err| EmuError::Unsupported(format!("host window: {}", err)))?;
        // Roughly 60 Hz pacing.
        window.limit_update_rate(Some(Duration::from_micros(16_600)));
        Ok(MinifbHost {
            window,
            framebuffer: vec![PIXEL_OFF; (SCREEN_WIDTH * SCREEN_HEIGHT) as usize],
            mouse_was_down: false,
        })
    }

    fn blit(&mut self, screen: &BitmapImage) -> Result<()> {
        let bits = screen.snapshot()?;
        let row_bytes = crate::graphics::pixel_width_to_bytes(SCREEN_WIDTH) as usize;
        for y in 0..SCREEN_HEIGHT as usize {
            for x in 0..SCREEN_WIDTH as usize {
                let byte = bits[y * row_bytes + x / 8];
                let on = byte & (0x80 >> (x % 8)) != 0;
                self.framebuffer[y * SCREEN_WIDTH as usize + x] =
                    if on { PIXEL_ON } else { PIXEL_OFF };
            }
        }
        self.window
            .update_with_buffer(&self.framebuffer, SCREEN_WIDTH as usize, SCREEN_HEIGHT as usize)
            .map_err(|err| EmuError::Unsupported(format!("framebuffer update: {}", err)))
    }

    fn pump_input(&mut self, events: &EventManager, screen: &BitmapImage) {
        // F2 dumps the raster for debugging, like a screenshot key.
        if self.window.is_key_pressed(Key::F2, KeyRepeat::No) {
            let path = std::env::temp_dir().join(format!("emmac-{}.pbm", events.now_ticks()));
            match screen.save_pbm(&path) {
                Ok(()) => info!("screenshot saved to {}", path.display()),
                Err(err) => info!("screenshot failed: {}", err),
            }
            return;
        }

        if let Some((x, y)) = self.window.get_mouse_pos(MouseMode::Clamp) {
            events.on_mouse_move(x as i16, y as i16);

            let down = self.window.get_mouse_down(MouseButton::Left);
            if down != self.mouse_was_down {
                if down {
                    events.queue_mouse_down(x as i16, y as i16);
                } else {
                    events.queue_mouse_up(x as i16, y as i16);
                }
                self.mouse_was_down = down;
            }
        }

        for key in self.window.get_keys_pressed(KeyRepeat::No) {
            if let Some(code) = key_to_char(key) {
                events.queue_key_down(code as u32);
            }
        }
    }
}

impl HostBridge for MinifbHost {
    fn pump(&mut self, events: &EventManager, screen: &BitmapImage) -> bool {
        if !self.window.is_open() {
            return false;
        }
        if self.blit(screen).is_err() {
            return false;
        }
        self.pump_input(events, screen);
        true
    }
}

/// Drives the emulator until the application exits or the window closes.
pub fn run_event_loop(core: &mut Core) -> Result<()> {
    let host = Rc::new(RefCell::new(MinifbHost::new("emmac")?));
    core.host = Some(host.clone());

    while core.running {
        core.run_frame()?;
        let alive = host.borrow_mut().pump(&core.events, &core.screen);
        if !alive {
            break;
        }
    }
    info!("host loop finished");
    Ok(())
}

/// Maps host keys to the classic character codes delivered in the low byte
/// of a key-down event message.
fn key_to_char(key: Key) -> Option<u8> {
    let ch = match key {
        Key::A => b'a',
        Key::B => b'b',
        Key::C => b'c',
        Key::D => b'd',
        Key::E => b'e',
        Key::F => b'f',
        Key::G => b'g',
        Key::H => b'h',
        Key::I => b'i',
        Key::J => b'j',
        Key::K => b'k',
        Key::L => b'l',
        Key::M => b'm',
        Key::N => b'n',
        Key::O => b'o',
        Key::P => b'p',
        Key::Q => b'q',
        Key::R => b'r',
        Key::S => b's',
        Key::T => b't',
        Key::U => b'u',
        Key::V => b'v',
        Key::W => b'w',
        Key::X => b'x',
        Key::Y => b'y',
        Key::Z => b'z',
        Key::Key0 => b'0',
        Key::Key1 => b'1',
        Key::Key2 => b'2',
        Key::Key3 => b'3',
        Key::Key4 => b'4',
        Key::Key5 => b'5',
        Key::Key6 => b'6',
        Key::Key7 => b'7',
        Key::Key8 => b'8',
        Key::Key9 => b'9',
        Key::Space => b' ',
        Key::Enter => b'\r',
        Key::Backspace => 0x08,
        Key::Tab => b'\t',
        Key::Period => b'.',
        Key::Comma => b',',
        Key::Minus => b'-',
        Key::Escape => 0x1B,
        _ => return None,
    };
    Some(ch)
}
