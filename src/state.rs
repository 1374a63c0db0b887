// TABLE:
// ┌───────────────────────── start_state(name) ─────────────────────────┐
// │                                                                     │
// │  unknown name ──► error!, Err, nothing touched                      │
// │                                                                     │
// │  Running/Loading ──► TransitioningOut                               │
// │      game teardown (objects, tweens, camera), state.destroy()       │
// │  ──► NoState ──► construct, fresh Scene ──► Loading                 │
// │      state.preload()  (enqueues assets)                             │
// │      loader.start_preload()                                         │
// │        ├─ nothing queued ──► state.start() now ──► Running          │
// │        └─ otherwise, on the last completion ──► state.start()       │
// │      scale.update_scale()                                           │
// │                                                                     │
// │  Called from inside a state callback: queued, run once the          │
// │  callback returns.                                                  │
// └─────────────────────────────────────────────────────────────────────┘
use crate::engine::Game;
use crate::loader::PreloadStatus;
use crate::render::Scene;
use anyhow::{anyhow, Result};
use log::{debug, error, info};
use std::collections::HashMap;

/// A screen or level. Every hook is optional.
pub trait State {
    /// Enqueue assets through `game.load()`.
    fn preload(&mut self, _game: &mut Game) {}
    /// Runs once every preloaded asset has finished, loaded or not.
    fn start(&mut self, _game: &mut Game) {}
    fn update(&mut self, _game: &mut Game, _delta_time: f64) {}
    fn destroy(&mut self, _game: &mut Game) {}
}

type StateConstructor = Box<dyn Fn() -> Box<dyn State>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatePhase {
    NoState,
    TransitioningOut,
    Loading,
    Running,
}

struct ActiveState {
    name: String,
    scene: Scene,
    // out of its slot while one of its hooks runs
    behaviour: Option<Box<dyn State>>,
}

pub struct StateManager {
    registry: HashMap<String, StateConstructor>,
    current: Option<ActiveState>,
    phase: StatePhase,
    busy: usize,
    queued: Option<String>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        StateManager {
            registry: HashMap::new(),
            current: None,
            phase: StatePhase::NoState,
            busy: 0,
            queued: None,
        }
    }

    /// Registers a state under `name`, replacing any previous one.
    pub fn add<S, F>(&mut self, name: &str, constructor: F)
    where
        S: State + 'static,
        F: Fn() -> S + 'static,
    {
        self.registry.insert(
            name.to_string(),
            Box::new(move || Box::new(constructor()) as Box<dyn State>),
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.as_ref().map(|state| state.name.as_str())
    }

    pub fn phase(&self) -> StatePhase {
        self.phase
    }

    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.current.as_ref().map(|state| &state.scene)
    }

    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.current.as_mut().map(|state| &mut state.scene)
    }

    fn construct(&self, name: &str) -> Option<Box<dyn State>> {
        self.registry.get(name).map(|constructor| constructor())
    }
}

impl Game {
    /// Leaves the current state and starts `name`.
    ///
    /// # Returns
    /// * `Err` - no state registered under `name`, the current state keeps running
    pub fn start_state(&mut self, name: &str) -> Result<()> {
        if self.state.busy > 0 {
            debug!("StateManager: '{}' queued until the running hook returns", name);
            self.state.queued = Some(name.to_string());
            return Ok(());
        }
        let result = self.transition_to(name);
        if let Err(err) = &result {
            error!("{:#}", err);
        }
        self.run_queued_transition();
        result
    }

    /// Rebuilds the current state from its constructor.
    pub fn restart_state(&mut self) -> Result<()> {
        let name = self
            .state
            .current_name()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("No state to restart"))?;
        self.start_state(&name)
    }

    fn transition_to(&mut self, name: &str) -> Result<()> {
        if !self.state.contains(name) {
            return Err(anyhow!("No state for name '{}'", name));
        }

        if self.state.has_current() {
            self.state.phase = StatePhase::TransitioningOut;
            self.teardown();
            self.with_state(|state, game| state.destroy(game));
            self.state.current = None;
            self.state.phase = StatePhase::NoState;
        }

        let behaviour = self
            .state
            .construct(name)
            .ok_or_else(|| anyhow!("No state for name '{}'", name))?;
        info!("StateManager: starting '{}'", name);
        self.loader.reset();
        self.state.current = Some(ActiveState {
            name: name.to_string(),
            scene: Scene::new(),
            behaviour: Some(behaviour),
        });
        self.state.phase = StatePhase::Loading;

        self.with_state(|state, game| state.preload(game));
        let status = self
            .loader
            .start_preload(&self.platform.assets, &*self.platform.spawner);
        if status == PreloadStatus::Complete {
            self.call_start();
        }
        self.update_scale();
        Ok(())
    }

    fn call_start(&mut self) {
        self.loader.finish();
        self.state.phase = StatePhase::Running;
        self.with_state(|state, game| state.start(game));
    }

    /// Applies finished asset loads. Starts the current state on the
    /// completion that ends its preload.
    pub fn poll_loader(&mut self) {
        if !self.loader.is_preloading() {
            return;
        }
        if self.loader.poll() == PreloadStatus::Complete && self.state.has_current() {
            self.call_start();
            self.run_queued_transition();
        }
    }

    /// Runs `hook` on the current state with the game borrowed mutably.
    pub(crate) fn with_state(&mut self, hook: impl FnOnce(&mut dyn State, &mut Game)) {
        let Some(mut behaviour) = self
            .state
            .current
            .as_mut()
            .and_then(|state| state.behaviour.take())
        else {
            return;
        };
        self.state.busy += 1;
        hook(behaviour.as_mut(), self);
        self.state.busy -= 1;
        if let Some(state) = self.state.current.as_mut() {
            if state.behaviour.is_none() {
                state.behaviour = Some(behaviour);
            }
        }
    }

    pub(crate) fn run_queued_transition(&mut self) {
        if self.state.busy > 0 {
            return;
        }
        while let Some(name) = self.state.queued.take() {
            if let Err(err) = self.transition_to(&name) {
                error!("{:#}", err);
            }
        }
    }
}
