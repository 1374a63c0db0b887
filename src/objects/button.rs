use super::ObjectRef;
use crate::assets::Texture;
use crate::cache::{Cache, Cached};
use crate::engine::Size;
use crate::input::PointerEvent;
use std::rc::Rc;

/// Size used while a sprite has no loaded texture.
const FALLBACK_SIDE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonSprite {
    Normal,
    Down,
    Over,
    Up,
}

/// Sprite button. Textures come from the cache by name.
pub struct Button {
    normal: Option<Cached<Texture>>,
    down: Option<Cached<Texture>>,
    over: Option<Cached<Texture>>,
    up: Option<Cached<Texture>>,
    current: ButtonSprite,
    width: f64,
    height: f64,
}

impl Button {
    pub fn new(
        cache: &Cache,
        sprite: &str,
        down: Option<&str>,
        over: Option<&str>,
        up: Option<&str>,
    ) -> Self {
        let lookup = |name: Option<&str>| cache.texture(name.unwrap_or(sprite));
        let mut button = Button {
            normal: cache.texture(sprite),
            down: lookup(down),
            over: lookup(over),
            up: lookup(up),
            current: ButtonSprite::Normal,
            width: FALLBACK_SIDE,
            height: FALLBACK_SIDE,
        };
        button.swap_sprite(ButtonSprite::Normal);
        button
    }

    pub fn current(&self) -> ButtonSprite {
        self.current
    }

    pub fn texture(&self) -> Option<Cached<Texture>> {
        match self.current {
            ButtonSprite::Normal => self.normal.clone(),
            ButtonSprite::Down => self.down.clone(),
            ButtonSprite::Over => self.over.clone(),
            ButtonSprite::Up => self.up.clone(),
        }
    }

    /// Switches sprite and takes the size of its texture.
    pub fn swap_sprite(&mut self, sprite: ButtonSprite) {
        self.current = sprite;
        let size = self.texture().and_then(|texture| {
            let texture = texture.borrow();
            texture
                .payload()
                .filter(|payload| payload.width > 0 && payload.height > 0)
                .map(|payload| (payload.width as f64, payload.height as f64))
        });
        (self.width, self.height) = size.unwrap_or((FALLBACK_SIDE, FALLBACK_SIDE));
    }

    /// Unscaled size.
    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

fn swap(object: &ObjectRef, sprite: impl Fn(bool, bool) -> Option<ButtonSprite>) {
    let Ok(mut object) = object.try_borrow_mut() else {
        return;
    };
    let (down, over) = (object.base.is_input_down(), object.base.is_input_over());
    if let (Some(next), Some(button)) = (sprite(down, over), object.as_button_mut()) {
        button.swap_sprite(next);
    }
}

/// Hooks the sprite swaps onto the object's own pointer signals.
pub(super) fn wire(object: &ObjectRef) {
    let (on_down, on_over, on_left, on_up) = {
        let base = &object.borrow().base;
        (
            base.on_input_down(),
            base.on_input_over(),
            base.on_input_left(),
            base.on_input_up(),
        )
    };

    let weak = Rc::downgrade(object);
    on_down.add(move |_: &PointerEvent| {
        if let Some(object) = weak.upgrade() {
            swap(&object, |_, _| Some(ButtonSprite::Down));
        }
    });

    let weak = Rc::downgrade(object);
    on_over.add(move |_: &PointerEvent| {
        if let Some(object) = weak.upgrade() {
            swap(&object, |down, _| (!down).then_some(ButtonSprite::Over));
        }
    });

    let weak = Rc::downgrade(object);
    on_left.add(move |_: &PointerEvent| {
        if let Some(object) = weak.upgrade() {
            swap(&object, |down, _| (!down).then_some(ButtonSprite::Normal));
        }
    });

    let weak = Rc::downgrade(object);
    on_up.add(move |event: &PointerEvent| {
        let Some(object) = weak.upgrade() else {
            return;
        };
        let on_click = object.borrow().base.on_click();
        on_click.dispatch(event);
        swap(&object, |_, over| {
            Some(if over {
                ButtonSprite::Over
            } else {
                ButtonSprite::Up
            })
        });
    });
}
