// The event queue consumed by the emulated application. Three FIFO lanes
// with the documented priority: activate events first, then input events in
// FIFO order, then update events (queued back-to-front by the window code).
// This is the only state shared with the host's input source, so the lanes
// sit behind a mutex with a condition variable for WaitNextEvent.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::records::{EventRecord, Point, Ptr};

pub const NULL_EVENT: u16 = 0;
pub const MOUSE_DOWN: u16 = 1;
pub const MOUSE_UP: u16 = 2;
pub const KEY_DOWN: u16 = 3;
pub const KEY_UP: u16 = 4;
pub const AUTO_KEY: u16 = 5;
pub const WINDOW_UPDATE: u16 = 6;
pub const DISK_INSERT: u16 = 7;
pub const WINDOW_ACTIVATE: u16 = 8;

/// Synthetic event used by native tracking loops (drag, menu selection);
/// never delivered unless a mouse-move scope is active.
pub const MOUSE_MOVE: u16 = 255;

pub const EVERY_EVENT: u16 = 0xFFFF;

/// Mask bit selecting the synthetic mouse-move events.
pub const MOUSE_MOVE_MASK: u16 = 0x8000;

const ACTIVATE_MASK: u16 = 1 << WINDOW_ACTIVATE;
const UPDATE_MASK: u16 = 1 << WINDOW_UPDATE;
const INPUT_MASK: u16 =
    (1 << MOUSE_DOWN) | (1 << MOUSE_UP) | (1 << KEY_DOWN) | (1 << KEY_UP) | (1 << AUTO_KEY);

/// For activate events bit 0 of `modifiers` is 1 to activate, 0 to
/// deactivate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivateState {
    On,
    Off,
}

fn event_selected(mask: u16, event: &EventRecord) -> bool {
    if event.what == MOUSE_MOVE {
        return mask & MOUSE_MOVE_MASK != 0;
    }
    mask & (1u16 << event.what) != 0
}

#[derive(Default)]
struct Lanes {
    activate: VecDeque<EventRecord>,
    input: VecDeque<EventRecord>,
    update: VecDeque<EventRecord>,
}

impl Lanes {
    fn has_match(&self, mask: u16) -> bool {
        if !self.activate.is_empty() && mask & ACTIVATE_MASK != 0 {
            return true;
        }
        if mask & INPUT_MASK != 0 && self.input.iter().any(|event| event_selected(mask, event)) {
            return true;
        }
        !self.update.is_empty() && mask & UPDATE_MASK != 0
    }
}

struct Shared {
    lanes: Mutex<Lanes>,
    available: Condvar,
}

/// Cheaply cloneable; all clones share the same queues.
#[derive(Clone)]
pub struct EventManager {
    shared: Arc<Shared>,
    boot_time: Instant,
    mouse_move_depth: Arc<Mutex<u32>>,
    mouse_position: Arc<Mutex<Point>>,
}

impl EventManager {
    pub fn new() -> Self {
        EventManager {
            shared: Arc::new(Shared {
                lanes: Mutex::new(Lanes::default()),
                available: Condvar::new(),
            }),
            boot_time: Instant::now(),
            mouse_move_depth: Arc::new(Mutex::new(0)),
            mouse_position: Arc::new(Mutex::new(Point::default())),
        }
    }

    /// Ticks of elapsed real time since boot, at roughly 60 Hz (16 ms per
    /// tick, matching the classic approximation).
    pub fn now_ticks(&self) -> u32 {
        (self.boot_time.elapsed().as_millis() / 16) as u32
    }

    fn push(&self, lane: impl FnOnce(&mut Lanes, EventRecord), record: EventRecord) {
        let mut lanes = self.shared.lanes.lock().unwrap();
        lane(&mut lanes, record);
        self.shared.available.notify_all();
    }

    pub fn queue_window_activate(&self, window: Ptr, state: ActivateState) {
        let record = EventRecord {
            what: WINDOW_ACTIVATE,
            message: window,
            when: self.now_ticks(),
            location: self.mouse(),
            modifiers: if state == ActivateState::On { 1 } else { 0 },
        };
        self.push(|lanes, record| lanes.activate.push_back(record), record);
    }

    pub fn queue_window_update(&self, window: Ptr) {
        let record = EventRecord {
            what: WINDOW_UPDATE,
            message: window,
            when: self.now_ticks(),
            location: self.mouse(),
            modifiers: 0,
        };
        self.push(|lanes, record| lanes.update.push_back(record), record);
    }

    pub fn queue_mouse_down(&self, x: i16, y: i16) {
        let record = EventRecord {
            what: MOUSE_DOWN,
            message: 0,
            when: self.now_ticks(),
            location: Point { x, y },
            modifiers: 0,
        };
        self.push(|lanes, record| lanes.input.push_back(record), record);
    }

    pub fn queue_mouse_up(&self, x: i16, y: i16) {
        let record = EventRecord {
            what: MOUSE_UP,
            message: 0,
            when: self.now_ticks(),
            location: Point { x, y },
            modifiers: 0,
        };
        self.push(|lanes, record| lanes.input.push_back(record), record);
    }

    pub fn queue_key_down(&self, key_code: u32) {
        let record = EventRecord {
            what: KEY_DOWN,
            message: key_code,
            when: self.now_ticks(),
            location: self.mouse(),
            modifiers: 0,
        };
        self.push(|lanes, record| lanes.input.push_back(record), record);
    }

    /// PostEvent: lets the application inject an arbitrary event. Some
    /// applications use this for private event codes, and only see them when
    /// they land in the high-priority lane.
    pub fn queue_raw_event(&self, what: u16, message: u32) {
        let record = EventRecord {
            what,
            message,
            when: self.now_ticks(),
            location: self.mouse(),
            modifiers: 0,
        };
        self.push(|lanes, record| lanes.activate.push_back(record), record);
    }

    /// Tracks the host pointer; queues a mouse-move event only while a scope
    /// created by `enable_mouse_move` is alive.
    pub fn on_mouse_move(&self, x: i16, y: i16) {
        *self.mouse_position.lock().unwrap() = Point { x, y };
        if *self.mouse_move_depth.lock().unwrap() == 0 {
            return;
        }
        let record = EventRecord {
            what: MOUSE_MOVE,
            message: 0,
            when: self.now_ticks(),
            location: Point { x, y },
            modifiers: 0,
        };
        self.push(|lanes, record| lanes.input.push_back(record), record);
    }

    pub fn mouse(&self) -> Point {
        *self.mouse_position.lock().unwrap()
    }

    pub fn enable_mouse_move(&self) -> MouseMoveScope {
        *self.mouse_move_depth.lock().unwrap() += 1;
        MouseMoveScope { depth: Arc::clone(&self.mouse_move_depth) }
    }

    /// Returns the highest-priority event selected by `mask`, consuming it.
    /// Unselected events stay queued.
    pub fn get_next_event(&self, mask: u16) -> EventRecord {
        let mut lanes = self.shared.lanes.lock().unwrap();

        if mask & ACTIVATE_MASK != 0 {
            if let Some(event) = lanes.activate.pop_front() {
                return event;
            }
        }

        if mask & (INPUT_MASK | (1 << 15)) != 0 {
            let found = lanes
                .input
                .iter()
                .position(|event| event_selected(mask, event));
            if let Some(index) = found {
                return lanes.input.remove(index).unwrap();
            }
        }

        if mask & UPDATE_MASK != 0 {
            if let Some(event) = lanes.update.pop_front() {
                return event;
            }
        }

        EventRecord { what: NULL_EVENT, when: self.now_ticks(), ..EventRecord::default() }
    }

    /// Like `get_next_event` but blocks on the condition variable for up to
    /// `timeout` ticks (16 ms each) when nothing matches.
    pub fn wait_next_event(&self, mask: u16, timeout: u32) -> EventRecord {
        let event = self.get_next_event(mask);
        if event.what != NULL_EVENT || timeout == 0 {
            return event;
        }

        {
            let lanes = self.shared.lanes.lock().unwrap();
            let deadline = Duration::from_millis(timeout as u64 * 16);
            let (_guard, result) = self
                .shared
                .available
                .wait_timeout_while(lanes, deadline, |lanes| !lanes.has_match(mask))
                .unwrap();
            if result.timed_out() {
                return EventRecord {
                    what: NULL_EVENT,
                    when: self.now_ticks(),
                    ..EventRecord::default()
                };
            }
        }
        self.get_next_event(mask)
    }

    /// Whether a mouse event of `what` is pending (Button / StillDown).
    pub fn has_mouse_event(&self, what: u16) -> bool {
        let lanes = self.shared.lanes.lock().unwrap();
        lanes.input.iter().any(|event| event.what == what)
    }

    /// Whether any window lifecycle work is pending.
    pub fn has_window_events(&self) -> bool {
        let lanes = self.shared.lanes.lock().unwrap();
        !lanes.activate.is_empty() || !lanes.update.is_empty()
    }

    /// FlushEvents: drops queued events selected by `mask`.
    pub fn flush_events(&self, mask: u16) {
        let mut lanes = self.shared.lanes.lock().unwrap();
        if mask & ACTIVATE_MASK != 0 {
            lanes.activate.clear();
        }
        if mask & UPDATE_MASK != 0 {
            lanes.update.clear();
        }
        lanes.input.retain(|event| !event_selected(mask, event));
    }
}

impl Default for EventManager {
    fn default() -> Self {
        EventManager::new()
    }
}

/// While alive, host mouse motion is delivered as mouse-move events. Used by
/// the drag and menu tracking loops to enter their modal move phase.
pub struct MouseMoveScope {
    depth: Arc<Mutex<u32>>,
}

impl Drop for MouseMoveScope {
    fn drop(&mut self) {
        *self.depth.lock().unwrap() -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_activate_then_input_then_update() {
        let events = EventManager::new();
        events.queue_window_update(0xD00D);
        events.queue_mouse_down(0, 0);
        events.queue_window_activate(0xD00D, ActivateState::On);
        events.queue_key_down(5);

        assert_eq!(events.get_next_event(EVERY_EVENT).what, WINDOW_ACTIVATE);
        assert_eq!(events.get_next_event(EVERY_EVENT).what, MOUSE_DOWN);
        assert_eq!(events.get_next_event(EVERY_EVENT).what, KEY_DOWN);
        assert_eq!(events.get_next_event(EVERY_EVENT).what, WINDOW_UPDATE);
        assert_eq!(events.get_next_event(EVERY_EVENT).what, NULL_EVENT);
    }

    #[test]
    fn input_lane_is_fifo() {
        let events = EventManager::new();
        for x in [0i16, 2, 4, 3, 5] {
            events.queue_mouse_down(x, 0);
        }
        for x in [0i16, 2, 4, 3, 5] {
            assert_eq!(events.get_next_event(EVERY_EVENT).location.x, x);
        }
    }

    #[test]
    fn masking_leaves_unselected_events_queued() {
        let events = EventManager::new();
        events.queue_key_down(1);
        events.queue_mouse_down(0, 0);
        events.queue_key_down(2);

        assert_eq!(events.get_next_event(1 << MOUSE_DOWN).what, MOUSE_DOWN);
        assert_eq!(events.get_next_event(EVERY_EVENT).what, KEY_DOWN);
        assert_eq!(events.get_next_event(EVERY_EVENT).what, KEY_DOWN);
        assert_eq!(events.get_next_event(EVERY_EVENT).what, NULL_EVENT);
    }

    #[test]
    fn mouse_moves_need_an_active_scope() {
        let events = EventManager::new();
        events.on_mouse_move(10, 10);
        assert_eq!(events.get_next_event(EVERY_EVENT).what, NULL_EVENT);

        {
            let _scope = events.enable_mouse_move();
            events.on_mouse_move(20, 20);
            let event = events.get_next_event(EVERY_EVENT);
            assert_eq!(event.what, MOUSE_MOVE);
            assert_eq!(event.location.x, 20);
        }

        events.on_mouse_move(30, 30);
        assert_eq!(events.get_next_event(EVERY_EVENT).what, NULL_EVENT);
        assert_eq!(events.mouse().x, 30);
    }

    #[test]
    fn wait_next_event_times_out_with_null() {
        let events = EventManager::new();
        let start = Instant::now();
        let event = events.wait_next_event(EVERY_EVENT, 1);
        assert_eq!(event.what, NULL_EVENT);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn wait_next_event_wakes_on_cross_thread_post() {
        let events = EventManager::new();
        let poster = events.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            poster.queue_mouse_down(7, 7);
        });
        let event = events.wait_next_event(EVERY_EVENT, 60);
        handle.join().unwrap();
        assert_eq!(event.what, MOUSE_DOWN);
        assert_eq!(event.location.x, 7);
    }

    #[test]
    fn button_and_still_down_probes() {
        let events = EventManager::new();
        events.queue_key_down(0);
        events.queue_mouse_down(0, 0);
        assert!(events.has_mouse_event(MOUSE_DOWN));
        assert!(!events.has_mouse_event(MOUSE_UP));
        events.queue_mouse_up(0, 0);
        assert!(events.has_mouse_event(MOUSE_UP));
    }

    #[test]
    fn event_timestamps_are_monotonic() {
        let events = EventManager::new();
        events.queue_mouse_down(1, 1);
        std::thread::sleep(Duration::from_millis(33));
        events.queue_mouse_down(2, 2);
        let first = events.get_next_event(EVERY_EVENT);
        let second = events.get_next_event(EVERY_EVENT);
        assert!(first.when < second.when);
    }
}
