// TABLE:
// ┌────────────────────────── Scene graph ──────────────────────────┐
// │                                                                 │
// │  World (flat top level list)                                    │
// │   ├─ GameObject { base, kind: Text }        parent = Root       │
// │   ├─ GameObject { base, kind: Group } ───┐  parent = Root       │
// │   │                                      ├─ Button  parent = G  │
// │   │                                      └─ Custom  parent = G  │
// │   └─ GameObject { base, kind: Audio }       parent = Root       │
// │                                                                 │
// │  world position = local position + parent's world position      │
// │  (Root is the origin, the walk assumes a tree)                  │
// └─────────────────────────────────────────────────────────────────┘
mod audio;
mod button;
mod group;
mod text;

pub use audio::Audio;
pub use button::{Button, ButtonSprite};
pub use group::Group;
pub use text::{Text, TextStyle};

use crate::assets::AudioClip;
use crate::cache::Cache;
use crate::engine::Size;
use crate::input::PointerEvent;
use crate::math::Vector;
use crate::render::Surface;
use crate::signal::Signal;
use crate::tween::Tweenable;
use anyhow::{anyhow, Result};
use log::{debug, warn};
use once_cell::unsync::OnceCell;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use web_sys::AudioContext;

pub type ObjectRef = Rc<RefCell<GameObject>>;

#[derive(Debug, Clone, Default)]
pub enum Parent {
    #[default]
    Detached,
    Root,
    Group(Weak<RefCell<GameObject>>),
}

type InputSignal = OnceCell<Rc<Signal<PointerEvent>>>;

/// Per-object pointer signals, created the first time someone asks.
#[derive(Default)]
struct InputSignals {
    on_click: InputSignal,
    on_input_down: InputSignal,
    on_input_up: InputSignal,
    on_input_over: InputSignal,
    on_input_left: InputSignal,
}

fn lazy(cell: &InputSignal) -> Rc<Signal<PointerEvent>> {
    cell.get_or_init(|| Rc::new(Signal::new())).clone()
}

/// State shared by every kind of object.
pub struct BaseObject {
    pub position: Vector,
    /// Degrees.
    pub rotation: f64,
    pub scale: Vector,
    /// `(0, 0)` top left, `(1, 1)` bottom right.
    pub anchor: Vector,
    pub alpha: f64,
    /// Survives state changes.
    pub persist: bool,
    pub input_enabled: bool,
    pub visible: bool,
    pub fixed_to_camera: bool,
    alive: bool,
    pending_destroy: bool,
    pub(crate) is_input_down: bool,
    pub(crate) is_input_over: bool,
    parent: Parent,
    signals: InputSignals,
    on_destroy: Option<Box<dyn FnMut()>>,
}

impl BaseObject {
    pub fn new(x: f64, y: f64) -> Self {
        BaseObject {
            position: Vector::new(x, y),
            rotation: 0.0,
            scale: Vector::new(1.0, 1.0),
            anchor: Vector::new(0.0, 0.0),
            alpha: 1.0,
            persist: false,
            input_enabled: false,
            visible: true,
            fixed_to_camera: false,
            alive: true,
            pending_destroy: false,
            is_input_down: false,
            is_input_over: false,
            parent: Parent::Detached,
            signals: InputSignals::default(),
            on_destroy: None,
        }
    }

    pub fn alive(&self) -> bool {
        self.alive
    }

    pub fn is_pending_destroy(&self) -> bool {
        self.pending_destroy
    }

    pub fn is_input_down(&self) -> bool {
        self.is_input_down
    }

    pub fn is_input_over(&self) -> bool {
        self.is_input_over
    }

    pub fn parent(&self) -> &Parent {
        &self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Parent) {
        self.parent = parent;
    }

    /// Out of play but still owned, [`BaseObject::restore`] brings it back.
    pub fn kill(&mut self) {
        self.alive = false;
    }

    pub fn restore(&mut self, x: f64, y: f64) {
        self.position.x = x;
        self.position.y = y;
        self.alive = true;
    }

    /// Hook run once when the object is destroyed.
    pub fn set_on_destroy(&mut self, hook: impl FnMut() + 'static) {
        self.on_destroy = Some(Box::new(hook));
    }

    fn mark_destroyed(&mut self) {
        self.kill();
        self.pending_destroy = true;
        if let Some(mut hook) = self.on_destroy.take() {
            hook();
        }
    }

    /// Local position plus every ancestor's, the root is the origin.
    pub fn world_position(&self) -> Vector {
        let local = Vector::new(self.position.x, self.position.y);
        match self.parent_object() {
            Some(parent) => match parent.try_borrow() {
                Ok(parent) => local + parent.base.world_position(),
                Err(_) => {
                    warn!("BaseObject: parent busy, world position is local");
                    local
                }
            },
            None => local,
        }
    }

    /// Own rotation plus every ancestor's.
    pub fn total_rotation(&self) -> f64 {
        let parent = self
            .parent_object()
            .and_then(|parent| parent.try_borrow().ok().map(|parent| parent.base.total_rotation()))
            .unwrap_or(0.0);
        parent + self.rotation
    }

    fn parent_object(&self) -> Option<ObjectRef> {
        match &self.parent {
            Parent::Group(parent) => parent.upgrade(),
            Parent::Root | Parent::Detached => None,
        }
    }

    pub fn on_click(&self) -> Rc<Signal<PointerEvent>> {
        lazy(&self.signals.on_click)
    }

    pub fn on_input_down(&self) -> Rc<Signal<PointerEvent>> {
        lazy(&self.signals.on_input_down)
    }

    pub fn on_input_up(&self) -> Rc<Signal<PointerEvent>> {
        lazy(&self.signals.on_input_up)
    }

    pub fn on_input_over(&self) -> Rc<Signal<PointerEvent>> {
        lazy(&self.signals.on_input_over)
    }

    pub fn on_input_left(&self) -> Rc<Signal<PointerEvent>> {
        lazy(&self.signals.on_input_left)
    }
}

/// User defined object logic. Every hook is optional.
pub trait Behavior {
    fn start(&mut self, _base: &mut BaseObject) {}
    fn update(&mut self, _base: &mut BaseObject, _delta_time: f64) {}
    fn destroy(&mut self, _base: &mut BaseObject) {}

    /// Unscaled size for pointer hit tests, `None` ignores the pointer.
    fn bounds(&self, _base: &BaseObject) -> Option<Size> {
        None
    }
}

pub enum ObjectKind {
    Group(Group),
    Text(Text),
    Button(Button),
    Audio(Audio),
    Custom(Box<dyn Behavior>),
}

pub struct GameObject {
    pub base: BaseObject,
    kind: ObjectKind,
}

impl GameObject {
    pub fn new(base: BaseObject, kind: ObjectKind) -> Self {
        GameObject { base, kind }
    }

    pub fn custom(x: f64, y: f64, behavior: impl Behavior + 'static) -> Self {
        Self::new(BaseObject::new(x, y), ObjectKind::Custom(Box::new(behavior)))
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ObjectKind {
        &mut self.kind
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.kind {
            ObjectKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match &mut self.kind {
            ObjectKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match &self.kind {
            ObjectKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut Text> {
        match &mut self.kind {
            ObjectKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_button(&self) -> Option<&Button> {
        match &self.kind {
            ObjectKind::Button(button) => Some(button),
            _ => None,
        }
    }

    pub fn as_button_mut(&mut self) -> Option<&mut Button> {
        match &mut self.kind {
            ObjectKind::Button(button) => Some(button),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&Audio> {
        match &self.kind {
            ObjectKind::Audio(audio) => Some(audio),
            _ => None,
        }
    }

    pub fn as_audio_mut(&mut self) -> Option<&mut Audio> {
        match &mut self.kind {
            ObjectKind::Audio(audio) => Some(audio),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        self.as_group().is_some()
    }

    pub fn start(&mut self) {
        if let ObjectKind::Custom(behavior) = &mut self.kind {
            behavior.start(&mut self.base);
        }
    }

    pub fn update(&mut self, delta_time: f64) {
        match &mut self.kind {
            ObjectKind::Group(group) => group.update(delta_time),
            ObjectKind::Audio(audio) => audio.update(),
            ObjectKind::Custom(behavior) => behavior.update(&mut self.base, delta_time),
            ObjectKind::Text(_) | ObjectKind::Button(_) => {}
        }
    }

    pub fn kill(&mut self) {
        self.base.kill();
        if let ObjectKind::Audio(audio) = &mut self.kind {
            audio.stop(0.0);
        }
    }

    /// Kills the object and flags it for removal by its owner's next sweep.
    pub fn destroy(&mut self) {
        if self.base.pending_destroy {
            return;
        }
        match &mut self.kind {
            ObjectKind::Group(group) => group.destroy_children(),
            ObjectKind::Audio(audio) => audio.release(),
            ObjectKind::Custom(behavior) => behavior.destroy(&mut self.base),
            ObjectKind::Text(_) | ObjectKind::Button(_) => {}
        }
        self.base.mark_destroyed();
    }

    /// Scaled size used by pointer hit tests.
    pub fn bounds(&self) -> Option<Size> {
        let size = match &self.kind {
            ObjectKind::Text(text) => text.size(),
            ObjectKind::Button(button) => button.size(),
            ObjectKind::Custom(behavior) => behavior.bounds(&self.base)?,
            ObjectKind::Group(_) | ObjectKind::Audio(_) => return None,
        };
        Some(Size {
            width: size.width * self.base.scale.x,
            height: size.height * self.base.scale.y,
        })
    }
}

impl Tweenable for GameObject {
    fn property(&self, name: &str) -> Option<f64> {
        let base = &self.base;
        Some(match name {
            "x" => base.position.x,
            "y" => base.position.y,
            "z" => base.position.z,
            "rotation" => base.rotation,
            "alpha" => base.alpha,
            "scale.x" => base.scale.x,
            "scale.y" => base.scale.y,
            "anchor.x" => base.anchor.x,
            "anchor.y" => base.anchor.y,
            "volume" => self.as_audio()?.volume,
            _ => return None,
        })
    }

    fn set_property(&mut self, name: &str, value: f64) -> bool {
        let base = &mut self.base;
        let slot = match name {
            "x" => &mut base.position.x,
            "y" => &mut base.position.y,
            "z" => &mut base.position.z,
            "rotation" => &mut base.rotation,
            "alpha" => &mut base.alpha,
            "scale.x" => &mut base.scale.x,
            "scale.y" => &mut base.scale.y,
            "anchor.x" => &mut base.anchor.x,
            "anchor.y" => &mut base.anchor.y,
            "volume" => match &mut self.kind {
                ObjectKind::Audio(audio) => &mut audio.volume,
                _ => return false,
            },
            _ => return false,
        };
        *slot = value;
        true
    }
}

// ==================== World ====================

/// Top level objects of the running game, in insertion order.
#[derive(Default)]
pub struct World {
    objects: Vec<ObjectRef>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> &[ObjectRef] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Registers an already built object at the top level and starts it.
    pub fn existing(&mut self, object: GameObject) -> ObjectRef {
        let object = Rc::new(RefCell::new(object));
        self.objects.push(object.clone());
        {
            let mut object = object.borrow_mut();
            object.base.set_parent(Parent::Root);
            object.start();
        }
        object
    }

    /// Moves `child` under `group`, out of the top level or its old group.
    ///
    /// An object moved in from outside the world is started like
    /// [`World::existing`] would.
    pub fn add_to_group(&mut self, group: &ObjectRef, child: &ObjectRef) -> Result<()> {
        if Rc::ptr_eq(group, child) {
            return Err(anyhow!("A group cannot contain itself"));
        }
        if !group.borrow().is_group() {
            return Err(anyhow!("Target object is not a group"));
        }

        let was_top_level = match self.objects.iter().position(|object| Rc::ptr_eq(object, child)) {
            Some(index) => {
                self.objects.remove(index);
                true
            }
            None => false,
        };
        let previous = match child.borrow().base.parent() {
            Parent::Group(previous) => previous.upgrade(),
            Parent::Root | Parent::Detached => None,
        };
        if let Some(previous) = &previous {
            if let Some(group) = previous.borrow_mut().as_group_mut() {
                group.remove(child);
            }
        }

        if let Some(group) = group.borrow_mut().as_group_mut() {
            group.push(child.clone());
        }
        let mut object = child.borrow_mut();
        object.base.set_parent(Parent::Group(Rc::downgrade(group)));
        if !was_top_level && previous.is_none() {
            object.start();
        }
        Ok(())
    }

    /// Reverse sweep: drops destroyed objects, updates the alive ones.
    pub fn update(&mut self, delta_time: f64) {
        for index in (0..self.objects.len()).rev() {
            let object = self.objects[index].clone();
            let mut object = object.borrow_mut();
            if object.base.is_pending_destroy() {
                self.objects.remove(index);
            } else if object.base.alive() {
                object.update(delta_time);
            }
        }
    }

    /// Destroys and drops every object not flagged `persist`.
    pub(crate) fn teardown(&mut self) {
        for index in (0..self.objects.len()).rev() {
            let object = self.objects[index].clone();
            let mut object = object.borrow_mut();
            if !object.base.persist {
                object.destroy();
                self.objects.remove(index);
            }
        }
        debug!("World: {} persistent objects kept", self.objects.len());
    }
}

// ==================== ObjectFactory ====================

/// `game.add()`: builds objects and registers them through [`World::existing`].
pub struct ObjectFactory<'a> {
    world: &'a mut World,
    cache: &'a Cache,
    surface: &'a dyn Surface,
    audio_context: Option<&'a AudioContext>,
}

impl<'a> ObjectFactory<'a> {
    pub(crate) fn new(
        world: &'a mut World,
        cache: &'a Cache,
        surface: &'a dyn Surface,
        audio_context: Option<&'a AudioContext>,
    ) -> Self {
        ObjectFactory {
            world,
            cache,
            surface,
            audio_context,
        }
    }

    pub fn existing(&mut self, object: GameObject) -> ObjectRef {
        self.world.existing(object)
    }

    pub fn group(&mut self, x: f64, y: f64) -> ObjectRef {
        self.existing(GameObject::new(
            BaseObject::new(x, y),
            ObjectKind::Group(Group::new()),
        ))
    }

    pub fn text(&mut self, x: f64, y: f64, text: &str, style: TextStyle) -> ObjectRef {
        let text = Text::new(text, style, self.surface);
        self.existing(GameObject::new(BaseObject::new(x, y), ObjectKind::Text(text)))
    }

    /// Missing `down`, `over` and `up` sprites fall back to `sprite`.
    pub fn button(
        &mut self,
        x: f64,
        y: f64,
        sprite: &str,
        down: Option<&str>,
        over: Option<&str>,
        up: Option<&str>,
    ) -> ObjectRef {
        let button = Button::new(self.cache, sprite, down, over, up);
        let mut base = BaseObject::new(x, y);
        base.input_enabled = true;
        let object = self.existing(GameObject::new(base, ObjectKind::Button(button)));
        button::wire(&object);
        object
    }

    pub fn audio(&mut self, name: &str, auto_start: bool, volume: f64) -> ObjectRef {
        let clip = self.cache.get::<AudioClip>(name);
        let mut audio = Audio::new(clip, self.audio_context.cloned(), volume);
        if auto_start {
            if let Err(err) = audio.play(0.0) {
                warn!("Audio '{}' could not start : {:#}", name, err);
            }
        }
        self.existing(GameObject::new(BaseObject::new(0.0, 0.0), ObjectKind::Audio(audio)))
    }

    pub fn custom(&mut self, x: f64, y: f64, behavior: impl Behavior + 'static) -> ObjectRef {
        self.existing(GameObject::custom(x, y, behavior))
    }
}
