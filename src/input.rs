//! Keyboard state and pointer dispatch.
//!
//! Browser listeners (see `browser::listen_input`) only push [`InputEvent`]s
//! into a channel. The game drains it at the start of each tick and hands
//! every event to [`InputManager::handle`], so all signals fire on the frame
//! loop and never from inside a DOM callback.
//!
//! Pointer events walk the top level objects back to front, descending into
//! groups, and fire the per object signals of whatever is under the pointer.

use crate::objects::{GameObject, ObjectRef};
use crate::signal::Signal;
use log::trace;

/// Highest key code tracked by [`InputManager::is_pressed`].
pub const MAX_KEY_CODE: u32 = 222;

/// Browser `keyCode` values.
pub mod key_code {
    pub const BACKSPACE: u32 = 8;
    pub const TAB: u32 = 9;
    pub const ENTER: u32 = 13;
    pub const SHIFT: u32 = 16;
    pub const CTRL: u32 = 17;
    pub const ALT: u32 = 18;
    pub const PAUSE: u32 = 19;
    pub const CAPS_LOCK: u32 = 20;
    pub const ESC: u32 = 27;
    pub const SPACE: u32 = 32;
    pub const PAGE_UP: u32 = 33;
    pub const PAGE_DOWN: u32 = 34;
    pub const END: u32 = 35;
    pub const HOME: u32 = 36;
    pub const LEFT: u32 = 37;
    pub const UP: u32 = 38;
    pub const RIGHT: u32 = 39;
    pub const DOWN: u32 = 40;
    pub const PRINT_SCREEN: u32 = 42;
    pub const INSERT: u32 = 45;
    pub const DELETE: u32 = 46;
    pub const ZERO: u32 = 48;
    pub const ONE: u32 = 49;
    pub const TWO: u32 = 50;
    pub const THREE: u32 = 51;
    pub const FOUR: u32 = 52;
    pub const FIVE: u32 = 53;
    pub const SIX: u32 = 54;
    pub const SEVEN: u32 = 55;
    pub const EIGHT: u32 = 56;
    pub const NINE: u32 = 57;
    pub const A: u32 = 65;
    pub const B: u32 = 66;
    pub const C: u32 = 67;
    pub const D: u32 = 68;
    pub const E: u32 = 69;
    pub const F: u32 = 70;
    pub const G: u32 = 71;
    pub const H: u32 = 72;
    pub const I: u32 = 73;
    pub const J: u32 = 74;
    pub const K: u32 = 75;
    pub const L: u32 = 76;
    pub const M: u32 = 77;
    pub const N: u32 = 78;
    pub const O: u32 = 79;
    pub const P: u32 = 80;
    pub const Q: u32 = 81;
    pub const R: u32 = 82;
    pub const S: u32 = 83;
    pub const T: u32 = 84;
    pub const U: u32 = 85;
    pub const V: u32 = 86;
    pub const W: u32 = 87;
    pub const X: u32 = 88;
    pub const Y: u32 = 89;
    pub const Z: u32 = 90;
    pub const PAD0: u32 = 96;
    pub const PAD1: u32 = 97;
    pub const PAD2: u32 = 98;
    pub const PAD3: u32 = 99;
    pub const PAD4: u32 = 100;
    pub const PAD5: u32 = 101;
    pub const PAD6: u32 = 102;
    pub const PAD7: u32 = 103;
    pub const PAD8: u32 = 104;
    pub const PAD9: u32 = 105;
    pub const F1: u32 = 112;
    pub const F2: u32 = 113;
    pub const F3: u32 = 114;
    pub const F4: u32 = 115;
    pub const F5: u32 = 116;
    pub const F6: u32 = 117;
    pub const F7: u32 = 118;
    pub const F8: u32 = 119;
    pub const F9: u32 = 120;
    pub const F10: u32 = 121;
    pub const F11: u32 = 122;
    pub const F12: u32 = 123;
    pub const SEMICOLON: u32 = 186;
    pub const PLUS: u32 = 187;
    pub const COMMA: u32 = 188;
    pub const MINUS: u32 = 189;
    pub const PERIOD: u32 = 190;
    pub const FORWARD_SLASH: u32 = 191;
    pub const BACK_SLASH: u32 = 220;
    pub const QUOTES: u32 = 222;
}

/// Pointer position in game units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerEvent {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key_code: u32,
}

/// Raw events as the browser reports them. Pointer coordinates are canvas
/// pixels, not yet divided by the render scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(u32),
    KeyUp(u32),
    KeyPressed(u32),
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    Click { x: f64, y: f64 },
    Resize,
}

pub struct InputManager {
    keys: Vec<bool>,
    pointer: PointerEvent,
    is_down: bool,
    is_mobile: bool,
    pub on_key_down: Signal<KeyEvent>,
    pub on_key_up: Signal<KeyEvent>,
    pub on_key_pressed: Signal<KeyEvent>,
    pub on_click: Signal<PointerEvent>,
    pub on_input_down: Signal<PointerEvent>,
    pub on_input_up: Signal<PointerEvent>,
    pub on_input_move: Signal<PointerEvent>,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputManager {
    pub fn new() -> Self {
        InputManager {
            keys: vec![false; MAX_KEY_CODE as usize + 1],
            pointer: PointerEvent::default(),
            is_down: false,
            is_mobile: false,
            on_key_down: Signal::new(),
            on_key_up: Signal::new(),
            on_key_pressed: Signal::new(),
            on_click: Signal::new(),
            on_input_down: Signal::new(),
            on_input_up: Signal::new(),
            on_input_move: Signal::new(),
        }
    }

    pub fn is_pressed(&self, key_code: u32) -> bool {
        self.keys.get(key_code as usize).copied().unwrap_or(false)
    }

    pub fn pointer(&self) -> PointerEvent {
        self.pointer
    }

    pub fn is_down(&self) -> bool {
        self.is_down
    }

    pub fn is_mobile(&self) -> bool {
        self.is_mobile
    }

    /// On touch devices releasing the pointer also counts as a click.
    pub fn set_mobile(&mut self, mobile: bool) {
        self.is_mobile = mobile;
    }

    /// Drops every listener of the manager's own signals and releases all keys.
    pub fn reset(&mut self) {
        self.on_key_down.clear();
        self.on_key_up.clear();
        self.on_key_pressed.clear();
        self.on_click.clear();
        self.on_input_down.clear();
        self.on_input_up.clear();
        self.on_input_move.clear();
        self.keys.iter_mut().for_each(|key| *key = false);
    }

    /// Applies one browser event.
    ///
    /// # Arguments
    /// * `objects` - top level objects, walked back to front
    /// * `render_scale` - surface pixels per game unit on each axis
    pub fn handle(&mut self, event: InputEvent, objects: &[ObjectRef], render_scale: (f64, f64)) {
        let scaled = |x: f64, y: f64| PointerEvent {
            x: x / render_scale.0,
            y: y / render_scale.1,
        };
        match event {
            InputEvent::KeyDown(key_code) => self.key(key_code, Some(true)),
            InputEvent::KeyUp(key_code) => self.key(key_code, Some(false)),
            InputEvent::KeyPressed(key_code) => self.key(key_code, None),
            InputEvent::PointerDown { x, y } => self.pointer_down(scaled(x, y), objects),
            InputEvent::PointerMove { x, y } => self.pointer_move(scaled(x, y), objects),
            InputEvent::PointerUp => self.pointer_up(objects),
            InputEvent::Click { x, y } => self.click(&scaled(x, y), objects),
            InputEvent::Resize => {}
        }
    }

    fn key(&mut self, key_code: u32, down: Option<bool>) {
        let event = KeyEvent { key_code };
        match down {
            Some(down) => {
                if let Some(key) = self.keys.get_mut(key_code as usize) {
                    *key = down;
                }
                if down {
                    self.on_key_down.dispatch(&event);
                } else {
                    self.on_key_up.dispatch(&event);
                }
            }
            None => self.on_key_pressed.dispatch(&event),
        }
    }

    // ==================== Pointer walks ====================

    fn pointer_down(&mut self, position: PointerEvent, objects: &[ObjectRef]) {
        self.is_down = true;
        self.pointer = position;
        self.on_input_down.dispatch(&position);
        self.down_walk(&position, objects);
    }

    /// Stops at the first group met, whatever its children did.
    fn down_walk(&self, event: &PointerEvent, objects: &[ObjectRef]) -> bool {
        for object in objects.iter().rev() {
            if let Some(children) = group_children(object) {
                return self.down_walk(event, &children);
            }
            let signal = {
                let object = object.borrow();
                if !object.base.input_enabled || !self.pointer_inside(&object) {
                    continue;
                }
                object.base.on_input_down()
            };
            signal.dispatch(event);
            if let Ok(mut object) = object.try_borrow_mut() {
                object.base.is_input_down = true;
            }
            return true;
        }
        false
    }

    fn pointer_move(&mut self, position: PointerEvent, objects: &[ObjectRef]) {
        self.pointer = position;
        self.on_input_move.dispatch(&position);
        self.move_walk(&position, objects);
    }

    fn move_walk(&self, event: &PointerEvent, objects: &[ObjectRef]) {
        for object in objects.iter().rev() {
            if let Some(children) = group_children(object) {
                self.move_walk(event, &children);
                continue;
            }
            let (signal, over) = {
                let object = object.borrow();
                if !object.base.input_enabled {
                    continue;
                }
                match (self.pointer_inside(&object), object.base.is_input_over()) {
                    (true, false) => (object.base.on_input_over(), true),
                    (false, true) => (object.base.on_input_left(), false),
                    _ => continue,
                }
            };
            signal.dispatch(event);
            if let Ok(mut object) = object.try_borrow_mut() {
                object.base.is_input_over = over;
            }
        }
    }

    fn pointer_up(&mut self, objects: &[ObjectRef]) {
        self.is_down = false;
        let event = self.pointer;
        if self.is_mobile {
            self.click(&event, objects);
        }
        self.on_input_up.dispatch(&event);
        self.up_walk(&event, objects);
    }

    fn up_walk(&self, event: &PointerEvent, objects: &[ObjectRef]) -> bool {
        for object in objects.iter().rev() {
            if let Some(children) = group_children(object) {
                self.up_walk(event, &children);
                continue;
            }
            let signal = {
                let object = object.borrow();
                if !object.base.input_enabled || !object.base.is_input_down() {
                    continue;
                }
                object.base.on_input_up()
            };
            signal.dispatch(event);
            if let Ok(mut object) = object.try_borrow_mut() {
                object.base.is_input_down = false;
            }
            return true;
        }
        false
    }

    fn click(&self, event: &PointerEvent, objects: &[ObjectRef]) {
        self.on_click.dispatch(event);
        self.click_walk(event, objects);
    }

    /// Clicks reach objects whether or not input is enabled on them.
    fn click_walk(&self, event: &PointerEvent, objects: &[ObjectRef]) -> bool {
        for object in objects.iter().rev() {
            if let Some(children) = group_children(object) {
                if self.click_walk(event, &children) {
                    return true;
                }
                continue;
            }
            let signal = {
                let object = object.borrow();
                if !self.pointer_inside(&object) {
                    continue;
                }
                object.base.on_click()
            };
            trace!("InputManager: click at {:?}", event);
            signal.dispatch(event);
            return true;
        }
        false
    }

    /// Hit test of the last known pointer position against the object's
    /// scaled bounds, shifted by its anchor.
    fn pointer_inside(&self, object: &GameObject) -> bool {
        let Some(bounds) = object.bounds() else {
            return false;
        };
        let world = object.base.world_position();
        let anchor = &object.base.anchor;
        let pointer = self.pointer;
        if pointer.x < world.x - bounds.width * anchor.x
            || pointer.x > world.x + bounds.width * (1.0 - anchor.x)
        {
            false
        } else {
            !(pointer.y < world.y - bounds.height * anchor.y
                || pointer.y > world.y + bounds.height * (1.0 - anchor.y))
        }
    }
}

fn group_children(object: &ObjectRef) -> Option<Vec<ObjectRef>> {
    object
        .borrow()
        .as_group()
        .map(|group| group.children().to_vec())
}
