// TABLE:
// ┌──────────────────────── Tween Lifecycle ─────────────────────────┐
// │                                                                  │
// │  Created ──play()──► WaitingDelay ──delay elapsed──► Running     │
// │     │                     ▲                            │         │
// │     └──(delay == 0)───────┼──────────────────────► Running       │
// │                           │                            │         │
// │                           └──── loop (repeat left) ◄───┤         │
// │                                                        ▼         │
// │                                  Destroyed ◄─── progress == 1    │
// │                                                                  │
// │  TweenManager::update() sweeps Destroyed tweens on its next pass │
// └──────────────────────────────────────────────────────────────────┘
mod easing;

pub use easing::Easing;

use crate::math::mathf;
use crate::signal::Signal;
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Repeat count meaning "loop forever".
pub const REPEAT_FOREVER: i32 = -1;

/// Anything exposing named numeric properties a tween can drive.
pub trait Tweenable {
    fn property(&self, name: &str) -> Option<f64>;

    /// Returns false when the property does not exist on this target.
    fn set_property(&mut self, name: &str, value: f64) -> bool;
}

/// Free-form bag of numeric properties, handy for tweening plain values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(HashMap<String, f64>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }
}

impl Tweenable for Properties {
    fn property(&self, name: &str) -> Option<f64> {
        self.get(name)
    }

    fn set_property(&mut self, name: &str, value: f64) -> bool {
        self.set(name, value);
        true
    }
}

impl<const N: usize> From<[(&str, f64); N]> for Properties {
    fn from(values: [(&str, f64); N]) -> Self {
        values
            .into_iter()
            .fold(Properties::new(), |props, (name, value)| props.with(name, value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TweenId(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Created,
    WaitingDelay { remaining: f64 },
    Running,
    Destroyed,
}

#[derive(Debug, Clone)]
struct TweenProperty {
    name: String,
    from: Option<f64>,
    to: f64,
}

/// Time driven interpolation of named properties on a target.
///
/// The tween only holds a weak reference: dropping the target ends the tween
/// on its next update without any further writes.
pub struct Tween {
    id: TweenId,
    target: Weak<RefCell<dyn Tweenable>>,
    properties: Vec<TweenProperty>,
    duration: f64,
    easing: Easing,
    auto_start: bool,
    delay: f64,
    repeat: i32,
    yoyo: bool,
    started: bool,
    phase: Phase,
    run_count: u32,
    progress: f64,
    time: f64,
    on_complete: Signal<()>,
    on_complete_loop: Signal<()>,
}

impl Tween {
    fn new(id: TweenId, target: Weak<RefCell<dyn Tweenable>>) -> Self {
        Tween {
            id,
            target,
            properties: Vec::new(),
            duration: 0.0,
            easing: Easing::Linear,
            auto_start: true,
            delay: 0.0,
            repeat: 0,
            yoyo: false,
            started: false,
            phase: Phase::Created,
            run_count: 0,
            progress: 0.0,
            time: 0.0,
            on_complete: Signal::new(),
            on_complete_loop: Signal::new(),
        }
    }

    /// Sets the destination values and snapshots the current ones as the
    /// starting point.
    ///
    /// # Arguments
    /// * `properties` - property name -> final value
    /// * `duration` - length of one run in milliseconds
    /// * `easing` - curve applied to the normalized time
    pub fn to<'a, I>(&mut self, properties: I, duration: f64, easing: Easing) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let target = self.target.upgrade();
        let current = |name: &str| {
            target
                .as_ref()
                .and_then(|target| target.try_borrow().ok()?.property(name))
        };
        self.properties = properties
            .into_iter()
            .map(|(name, to)| TweenProperty {
                name: name.to_string(),
                from: current(name),
                to,
            })
            .collect();
        self.duration = duration;
        self.easing = easing;
        self
    }

    /// Overrides the snapshotted start values.
    pub fn from<'a, I>(&mut self, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        for (name, value) in properties {
            match self.properties.iter_mut().find(|prop| prop.name == name) {
                Some(prop) => prop.from = Some(value),
                None => warn!("Tween: from() for '{}' which is not a tweened property", name),
            }
        }
        self
    }

    pub fn auto_start(&mut self, auto_start: bool) -> &mut Self {
        self.auto_start = auto_start;
        self
    }

    /// Milliseconds between `play()` and the first interpolated frame.
    pub fn delay(&mut self, delay: f64) -> &mut Self {
        self.delay = delay.max(0.0);
        self
    }

    /// Extra runs after the first one, [`REPEAT_FOREVER`] loops forever.
    pub fn repeat(&mut self, repeat: i32) -> &mut Self {
        self.repeat = repeat;
        self
    }

    /// Go to the destination and come back within one run.
    pub fn yoyo(&mut self, yoyo: bool) -> &mut Self {
        self.yoyo = yoyo;
        self
    }

    pub fn id(&self) -> TweenId {
        self.id
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn run_count(&self) -> u32 {
        self.run_count
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_pending_destroy(&self) -> bool {
        self.phase == Phase::Destroyed
    }

    pub fn target_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    pub fn on_complete(&self) -> &Signal<()> {
        &self.on_complete
    }

    pub fn on_complete_loop(&self) -> &Signal<()> {
        &self.on_complete_loop
    }

    /// Schedules the start after the configured delay.
    pub fn play(&mut self) {
        if self.is_pending_destroy() {
            return;
        }
        self.started = true;
        if self.delay > 0.0 {
            self.phase = Phase::WaitingDelay {
                remaining: self.delay,
            };
        } else {
            self.start_tween();
        }
    }

    fn tick_delay(&mut self, delta_millis: f64) {
        if let Phase::WaitingDelay { remaining } = self.phase {
            let remaining = remaining - delta_millis;
            if remaining <= 0.0 {
                self.start_tween();
            } else {
                self.phase = Phase::WaitingDelay { remaining };
            }
        }
    }

    fn start_tween(&mut self) {
        let Some(target) = self.target.upgrade() else {
            self.destroy();
            return;
        };
        let Ok(mut target) = target.try_borrow_mut() else {
            warn!("Tween: target busy at start, retrying next frame");
            self.phase = Phase::WaitingDelay { remaining: 0.0 };
            return;
        };
        self.run_count += 1;
        self.properties.retain_mut(|prop| {
            if prop.from.is_none() {
                prop.from = target.property(&prop.name);
            }
            match prop.from {
                Some(from) => {
                    target.set_property(&prop.name, from);
                    true
                }
                None => {
                    warn!("Tween: target has no property '{}', dropping it", prop.name);
                    false
                }
            }
        });
        self.phase = Phase::Running;
    }

    /// Jumps to the end of the curve; the next update finalizes the run.
    pub fn complete(&mut self) {
        if !self.is_running() {
            return;
        }
        self.time = self.duration;
        self.progress = 1.0;
        if let Some(target) = self.target.upgrade() {
            if let Ok(mut target) = target.try_borrow_mut() {
                self.apply(&mut *target);
            };
        }
    }

    /// Advances a running tween by one frame.
    pub fn update(&mut self, delta_millis: f64) {
        let Some(target) = self.target.upgrade() else {
            debug!("Tween: target dropped, destroying tween {:?}", self.id);
            self.destroy();
            return;
        };
        if !self.is_running() {
            return;
        }

        if self.progress >= 1.0 {
            if self.repeat < 0 || self.run_count as i64 <= self.repeat as i64 {
                self.on_complete_loop.dispatch(&());
                self.time = 0.0;
                self.progress = 0.0;
                drop(target);
                self.play();
            } else {
                self.on_complete.dispatch(&());
                self.destroy();
            }
            return;
        }

        self.time += delta_millis;
        self.progress = if self.duration > 0.0 {
            mathf::clamp(self.time / self.duration, 0.0, 1.0)
        } else {
            1.0
        };
        match target.try_borrow_mut() {
            Ok(mut target) => self.apply(&mut *target),
            Err(_) => warn!("Tween: target busy, skipped a frame of tween {:?}", self.id),
        };
    }

    fn apply(&self, target: &mut dyn Tweenable) {
        let mut t = self.progress;
        if self.yoyo {
            t = if t <= 0.5 {
                t * 2.0
            } else {
                mathf::lerp(1.0, 0.0, (t - 0.5) * 2.0)
            };
        }
        let eased = self.easing.apply(t);
        for prop in &self.properties {
            if let Some(from) = prop.from {
                target.set_property(&prop.name, mathf::lerp(from, prop.to, eased));
            }
        }
    }

    /// Stops the tween and marks it for removal on the next manager pass.
    pub fn destroy(&mut self) {
        self.phase = Phase::Destroyed;
        self.on_complete.clear();
        self.on_complete_loop.clear();
        self.properties.clear();
    }
}

/// Owns every tween of the running state.
#[derive(Default)]
pub struct TweenManager {
    tweens: Vec<Tween>,
    next_id: u64,
}

impl TweenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tween driving `target`. Configure it with [`Tween::to`].
    pub fn add<T>(&mut self, target: &Rc<RefCell<T>>) -> &mut Tween
    where
        T: Tweenable + 'static,
    {
        let shared: Rc<RefCell<dyn Tweenable>> = target.clone();
        self.add_shared(&shared)
    }

    pub fn add_shared(&mut self, target: &Rc<RefCell<dyn Tweenable>>) -> &mut Tween {
        let id = TweenId(self.next_id);
        self.next_id += 1;
        self.tweens.push(Tween::new(id, Rc::downgrade(target)));
        let index = self.tweens.len() - 1;
        &mut self.tweens[index]
    }

    pub fn get(&self, id: TweenId) -> Option<&Tween> {
        self.tweens.iter().find(|tween| tween.id == id)
    }

    pub fn get_mut(&mut self, id: TweenId) -> Option<&mut Tween> {
        self.tweens.iter_mut().find(|tween| tween.id == id)
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    /// One pass per frame. Walks backwards so removals never skip a tween.
    pub fn update(&mut self, delta_millis: f64) {
        for index in (0..self.tweens.len()).rev() {
            let tween = &mut self.tweens[index];
            if tween.is_pending_destroy() || !tween.target_alive() {
                self.tweens.remove(index);
            } else if tween.is_running() {
                tween.update(delta_millis);
            } else if let Phase::WaitingDelay { .. } = tween.phase {
                tween.tick_delay(delta_millis);
            } else if tween.auto_start && !tween.started {
                tween.play();
            }
        }
    }

    /// Destroys every tween, used when the state changes.
    pub fn destroy_all(&mut self) {
        for tween in self.tweens.iter_mut().rev() {
            tween.destroy();
        }
        self.tweens.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    fn target(x: f64) -> Rc<RefCell<Properties>> {
        Rc::new(RefCell::new(Properties::new().with("x", x)))
    }

    fn x(target: &Rc<RefCell<Properties>>) -> f64 {
        target.borrow().get("x").unwrap()
    }

    #[test]
    fn linear_tween_reaches_half_way_then_the_end() {
        let mut manager = TweenManager::new();
        let target = target(0.0);
        let completed = Rc::new(Cell::new(0));
        let counter = completed.clone();
        manager
            .add(&target)
            .to([("x", 10.0)], 1000.0, Easing::Linear)
            .on_complete()
            .add(move |_| counter.set(counter.get() + 1));

        manager.update(16.0); // auto start
        assert_eq!(x(&target), 0.0);

        manager.update(500.0);
        assert_relative_eq!(x(&target), 5.0);

        manager.update(500.0);
        assert_relative_eq!(x(&target), 10.0);

        manager.update(16.0);
        assert_eq!(completed.get(), 1);
        assert_relative_eq!(x(&target), 10.0);
        assert_eq!(manager.len(), 1);

        manager.update(16.0);
        assert!(manager.is_empty());
    }

    #[test]
    fn infinite_repeat_resets_to_the_start_value() {
        let mut manager = TweenManager::new();
        let target = target(0.0);
        let loops = Rc::new(Cell::new(0));
        let counter = loops.clone();
        let id = manager
            .add(&target)
            .to([("x", 10.0)], 1000.0, Easing::Linear)
            .repeat(REPEAT_FOREVER)
            .id();
        manager
            .get(id)
            .unwrap()
            .on_complete_loop()
            .add(move |_| counter.set(counter.get() + 1));

        manager.update(0.0);
        for run in 1..=5 {
            manager.update(1000.0);
            assert_relative_eq!(x(&target), 10.0);
            manager.update(0.0);
            assert_eq!(loops.get(), run);
            assert_eq!(x(&target), 0.0);
        }
        manager.update(250.0);
        assert_relative_eq!(x(&target), 2.5);
        assert!(manager.get(id).unwrap().is_running());
    }

    #[test]
    fn finite_repeat_runs_the_extra_times_then_completes() {
        let mut manager = TweenManager::new();
        let target = target(0.0);
        let id = manager
            .add(&target)
            .to([("x", 1.0)], 100.0, Easing::Linear)
            .repeat(1)
            .id();

        manager.update(0.0);
        manager.update(100.0);
        manager.update(0.0); // loops
        assert_eq!(manager.get(id).unwrap().run_count(), 2);
        manager.update(100.0);
        manager.update(0.0); // completes
        assert!(manager.get(id).unwrap().is_pending_destroy());
    }

    #[test]
    fn yoyo_goes_out_and_comes_back_symmetrically() {
        let mut manager = TweenManager::new();
        let target = target(0.0);
        manager
            .add(&target)
            .to([("x", 10.0)], 1000.0, Easing::Linear)
            .yoyo(true);

        manager.update(0.0);
        manager.update(250.0);
        let outward = x(&target);
        assert_relative_eq!(outward, 5.0);

        manager.update(250.0);
        assert_relative_eq!(x(&target), 10.0);

        manager.update(250.0);
        assert_relative_eq!(x(&target), outward);

        manager.update(250.0);
        assert_relative_eq!(x(&target), 0.0);
    }

    #[test]
    fn dropped_target_removes_the_tween_without_writes() {
        let mut manager = TweenManager::new();
        let target = target(0.0);
        manager.add(&target).to([("x", 10.0)], 1000.0, Easing::Linear);
        manager.update(0.0);
        manager.update(100.0);

        drop(target);
        manager.update(100.0);

        assert!(manager.is_empty());
    }

    #[test]
    fn tween_update_self_destroys_when_target_is_gone() {
        let mut manager = TweenManager::new();
        let target = target(0.0);
        let tween = manager.add(&target);
        tween.to([("x", 10.0)], 1000.0, Easing::Linear).play();
        drop(target);

        tween.update(16.0);

        assert!(tween.is_pending_destroy());
    }

    #[test]
    fn delay_postpones_the_start() {
        let mut manager = TweenManager::new();
        let target = target(3.0);
        manager
            .add(&target)
            .to([("x", 13.0)], 1000.0, Easing::Linear)
            .from([("x", 0.0)])
            .delay(100.0);

        manager.update(16.0); // play -> waiting
        manager.update(50.0);
        assert_eq!(x(&target), 3.0);

        manager.update(60.0); // delay elapsed, start value applied
        assert_eq!(x(&target), 0.0);

        manager.update(500.0);
        assert_relative_eq!(x(&target), 6.5);
    }

    #[test]
    fn from_supplies_values_missing_on_the_target() {
        let mut manager = TweenManager::new();
        let target = Rc::new(RefCell::new(Properties::new()));
        manager
            .add(&target)
            .to([("y", 10.0)], 100.0, Easing::Linear)
            .from([("y", 4.0)]);

        manager.update(0.0);
        assert_eq!(target.borrow().get("y"), Some(4.0));
        manager.update(50.0);
        assert_relative_eq!(target.borrow().get("y").unwrap(), 7.0);
    }

    #[test]
    fn manual_play_when_auto_start_is_off() {
        let mut manager = TweenManager::new();
        let target = target(0.0);
        let id = manager
            .add(&target)
            .to([("x", 10.0)], 100.0, Easing::Linear)
            .auto_start(false)
            .id();

        manager.update(50.0);
        assert!(!manager.get(id).unwrap().has_started());

        manager.get_mut(id).unwrap().play();
        manager.update(50.0);
        assert_relative_eq!(x(&target), 5.0);
    }

    #[test]
    fn complete_jumps_to_the_end_value() {
        let mut manager = TweenManager::new();
        let target = target(0.0);
        let id = manager
            .add(&target)
            .to([("x", 10.0)], 1000.0, Easing::QuadIn)
            .id();
        manager.update(0.0);

        manager.get_mut(id).unwrap().complete();
        assert_eq!(x(&target), 10.0);

        manager.update(16.0);
        assert!(manager.get(id).unwrap().is_pending_destroy());
    }

    #[test]
    fn destroy_all_empties_the_manager() {
        let mut manager = TweenManager::new();
        let a = target(0.0);
        let b = target(0.0);
        manager.add(&a).to([("x", 1.0)], 10.0, Easing::Linear);
        manager.add(&b).to([("x", 1.0)], 10.0, Easing::Linear);

        manager.destroy_all();

        assert!(manager.is_empty());
    }
}
