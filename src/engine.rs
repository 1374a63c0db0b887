use crate::assets::AssetSource;
use crate::browser;
use crate::cache::Cache;
use crate::config::GameConfig;
use crate::input::{InputEvent, InputManager};
use crate::loader::{LoadQueue, Loader};
use crate::objects::{ObjectFactory, World};
use crate::render::{Camera, Scene, Surface};
use crate::scale::ScaleManager;
use crate::state::StateManager;
use crate::tween::TweenManager;
use anyhow::{anyhow, Error, Result};
// ELI5: web assembly is a single threaded environment, so Rc RefCell > Mutex
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::channel::oneshot::channel;
use futures::task::LocalSpawn;
use log::{error, warn};
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use wasm_bindgen::{
    // unchecked_ref (unsafe) cast from Javascript type to Rust type
    // - because we control the closure creation and specify the expected type,
    // in principle this should be generally safe (unsafe) code
    JsCast,
    JsValue,
};
use web_sys::{AudioContext, HtmlImageElement};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

// ==================== Frame clock ====================

/// Frame timing. Times are host milliseconds (`performance.now()`),
/// `delta_time` is in seconds.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frame_limit: f64,
    max_delta_millis: f64,
    start_time: f64,
    elapsed_time: f64,
    frame_time: f64,
    previous_frame_time: f64,
    delta_time: f64,
    delta_millis: f64,
}

impl FrameClock {
    pub fn new(frame_limit: f64, max_delta_millis: f64) -> Self {
        FrameClock {
            frame_limit,
            max_delta_millis,
            start_time: 0.0,
            elapsed_time: 0.0,
            frame_time: 0.0,
            previous_frame_time: 0.0,
            delta_time: 0.0,
            delta_millis: 0.0,
        }
    }

    pub fn reset(&mut self, now: f64) {
        *self = FrameClock {
            start_time: now,
            ..FrameClock::new(self.frame_limit, self.max_delta_millis)
        };
    }

    /// Measures the frame at `now`.
    ///
    /// # Returns
    /// * `false` - the frame came sooner than the frame limit allows and must
    ///   be skipped, the previous frame time is kept so the time accumulates
    pub fn advance(&mut self, now: f64) -> bool {
        self.elapsed_time = now - self.start_time;
        self.frame_time = self.elapsed_time;
        self.delta_millis = (self.frame_time - self.previous_frame_time).min(self.max_delta_millis);
        self.delta_time = self.delta_millis / 1000.0;
        if 1.0 / self.frame_limit > self.delta_time {
            return false;
        }
        self.previous_frame_time = self.frame_time;
        true
    }

    pub fn frame_limit(&self) -> f64 {
        self.frame_limit
    }

    pub fn set_frame_limit(&mut self, frame_limit: f64) {
        self.frame_limit = frame_limit;
    }

    /// Milliseconds since [`FrameClock::reset`].
    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    pub fn frame_time(&self) -> f64 {
        self.frame_time
    }

    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    pub fn delta_millis(&self) -> f64 {
        self.delta_millis
    }
}

// ==================== Game ====================

/// What the engine needs from its host.
pub struct Platform {
    pub assets: Rc<dyn AssetSource>,
    pub spawner: Rc<dyn LocalSpawn>,
    pub surface: Box<dyn Surface>,
    pub audio_context: Option<AudioContext>,
}

/// The game session. Owns every manager, the objects and the camera.
///
/// TABLE:
/// ┌──────────── tick(now) ─────────────┐
/// │ 1. drain queued input events       │
/// │ 2. poll loader (may start state)   │
/// │ 3. clock: clamp delta, frame limit │
/// │ 4. paused / no state → stop        │
/// │ 5. not preloading:                 │
/// │      state.update(delta_time)      │
/// │      queued transition             │
/// │      tween.update(delta_millis)    │
/// │ 6. render(scene, camera)           │
/// └────────────────────────────────────┘
pub struct Game {
    pub config: GameConfig,
    pub state: StateManager,
    pub cache: Cache,
    pub tween: TweenManager,
    pub world: World,
    pub input: InputManager,
    pub scale: ScaleManager,
    pub clock: FrameClock,
    pub pause: bool,
    pub(crate) loader: Loader,
    camera: Rc<RefCell<Camera>>,
    pub(crate) platform: Platform,
    events_tx: UnboundedSender<InputEvent>,
    events_rx: UnboundedReceiver<InputEvent>,
}

impl Game {
    pub fn new(config: GameConfig, platform: Platform) -> Self {
        let camera = Camera::new(45.0, config.width / config.height, 0.1, 10000.0);
        let (events_tx, events_rx) = unbounded();
        Game {
            state: StateManager::new(),
            cache: Cache::new(),
            tween: TweenManager::new(),
            world: World::new(),
            input: InputManager::new(),
            scale: ScaleManager::new(config.scale_mode),
            clock: FrameClock::new(config.frame_limit, config.max_delta_millis),
            pause: false,
            loader: Loader::new(),
            camera: Rc::new(RefCell::new(camera)),
            platform,
            events_tx,
            events_rx,
            config,
        }
    }

    /// The single camera every state renders through. Shared so tweens can
    /// target it.
    pub fn camera(&self) -> Rc<RefCell<Camera>> {
        self.camera.clone()
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Asset queue of the current preload.
    pub fn load(&mut self) -> LoadQueue<'_> {
        LoadQueue::new(&mut self.loader, &mut self.cache)
    }

    pub fn add(&mut self) -> ObjectFactory<'_> {
        ObjectFactory::new(
            &mut self.world,
            &self.cache,
            &*self.platform.surface,
            self.platform.audio_context.as_ref(),
        )
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.state.scene()
    }

    /// Scene of the current state.
    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.state.scene_mut()
    }

    pub fn size(&self) -> Size {
        Size::new(self.config.width, self.config.height)
    }

    /// Stored only, the surface keeps its own clear color.
    pub fn set_background_color(&mut self, color: &str) {
        self.config.background_color = color.to_string();
    }

    /// Where browser listeners push their events.
    pub fn event_sender(&self) -> UnboundedSender<InputEvent> {
        self.events_tx.clone()
    }

    pub fn tick(&mut self, now: f64) {
        self.drain_input();
        self.poll_loader();
        if !self.clock.advance(now) {
            return;
        }
        if self.pause || !self.state.has_current() {
            return;
        }
        if !self.loader.is_preloading() {
            let delta_time = self.clock.delta_time();
            self.with_state(|state, game| state.update(game, delta_time));
            self.run_queued_transition();
            self.tween.update(self.clock.delta_millis());
        }
        self.render();
    }

    pub fn render(&mut self) {
        let Some(scene) = self.state.scene() else {
            return;
        };
        let camera: Ref<'_, Camera> = self.camera.borrow();
        if let Err(err) = self.platform.surface.render(scene, &camera) {
            warn!("Render failed : {:#}", err);
        }
    }

    pub fn update_scale(&mut self) {
        let size = self.size();
        let mut camera = self.camera.borrow_mut();
        self.scale
            .update_scale(size, &mut *self.platform.surface, &mut camera);
    }

    /// Clears what belongs to the state being left: objects without
    /// `persist`, every tween and the camera transform.
    pub(crate) fn teardown(&mut self) {
        self.world.teardown();
        self.tween.destroy_all();
        self.camera.borrow_mut().reset_transform();
    }

    fn drain_input(&mut self) {
        while let Ok(Some(event)) = self.events_rx.try_next() {
            if event == InputEvent::Resize {
                self.update_scale();
            }
            let objects = self.world.objects().to_vec();
            self.input.handle(event, &objects, self.scale.render_scale());
        }
    }
}

// ==================== Game loop ====================

type SharedLoopClosure = Rc<RefCell<Option<browser::LoopClosure>>>;

pub struct GameLoop;

impl GameLoop {
    /// Hands the game to `requestAnimationFrame`. Each frame asks for the
    /// next one before ticking, so a failing frame does not stop the loop.
    pub fn start(mut game: Game) -> Result<()> {
        game.clock.reset(browser::now()?);
        let f: SharedLoopClosure = Rc::new(RefCell::new(None));
        let g = f.clone();
        *g.borrow_mut() = Some(browser::create_raf_closure(move |perf: f64| {
            if let Some(next) = f.borrow().as_ref() {
                if let Err(err) = browser::request_animation_frame(next) {
                    error!("GameLoop: could not request the next frame : {:#}", err);
                }
            }
            game.tick(perf);
        }));

        browser::request_animation_frame(
            g.borrow()
                .as_ref()
                .ok_or_else(|| anyhow!("GameLoop: Loop is None"))?,
        )?;

        Ok(())
    }
}

/// Asynchronously load an image from a given source path
/// # Arguments
/// * `source` - string slice to path/url
/// # Returns
/// * `Ok(HtmlImageElement)` - on load success
/// * `Err` - on load fail
pub async fn load_image(source: &str) -> Result<HtmlImageElement> {
    let image = browser::new_image()?;
    // pixels are read back through a canvas, which needs CORS
    image.set_cross_origin(Some("anonymous"));
    let (tx, rx) = channel::<Result<(), Error>>();
    let success_tx = Rc::new(RefCell::new(Some(tx)));
    let error_tx = success_tx.clone();

    let success_callback = browser::closure_once(move || {
        if let Some(tx) = success_tx.borrow_mut().take() {
            let _ = tx.send(Ok(()));
        }
    });

    let url = source.to_string();
    let error_callback = browser::closure_once(move |err: JsValue| {
        if let Some(tx) = error_tx.borrow_mut().take() {
            let _ = tx.send(Err(anyhow!("Error loading image '{}' : {:#?}", url, err)));
        }
    });

    image.set_onload(Some(success_callback.as_ref().unchecked_ref()));
    image.set_onerror(Some(error_callback.as_ref().unchecked_ref()));
    image.set_src(source);

    // keep callback alive until image is loaded or errors
    success_callback.forget();
    error_callback.forget();

    // Result<Result<(), Error>, oneshot::Canceled>
    rx.await??;

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{State, StatePhase};
    use crate::testing::TestBed;
    use crate::tween::{Easing, Properties};
    use approx::assert_relative_eq;

    #[test]
    fn delta_is_clamped_after_a_long_pause() {
        let mut clock = FrameClock::new(120.0, 400.0);
        clock.reset(1_000.0);

        assert!(clock.advance(11_000.0));

        assert_relative_eq!(clock.delta_millis(), 400.0);
        assert_relative_eq!(clock.delta_time(), 0.4);
        assert_relative_eq!(clock.elapsed_time(), 10_000.0);
    }

    #[test]
    fn frames_faster_than_the_limit_are_skipped() {
        let mut clock = FrameClock::new(120.0, 400.0);
        clock.reset(0.0);
        assert!(clock.advance(100.0));

        // 4ms < 1/120s
        assert!(!clock.advance(104.0));
        // measured from the last executed frame
        assert!(clock.advance(110.0));
        assert_relative_eq!(clock.delta_millis(), 10.0);
    }

    struct Ordered {
        log: Rc<RefCell<Vec<&'static str>>>,
        target: Rc<RefCell<Properties>>,
    }

    impl State for Ordered {
        fn start(&mut self, game: &mut Game) {
            game.tween
                .add(&self.target)
                .to([("x", 100.0)], 1000.0, Easing::Linear);
        }

        fn update(&mut self, _game: &mut Game, _delta_time: f64) {
            let x = self.target.borrow().get("x").unwrap_or_default();
            // the tween has not run yet this frame
            self.log.borrow_mut().push(if x == 0.0 { "update@0" } else { "update" });
        }
    }

    fn ordered_bed() -> (TestBed, Rc<RefCell<Vec<&'static str>>>, Rc<RefCell<Properties>>) {
        let mut bed = TestBed::new(GameConfig::new(800.0, 600.0));
        let log = Rc::new(RefCell::new(Vec::new()));
        let target = Rc::new(RefCell::new(Properties::from([("x", 0.0)])));
        let (state_log, state_target) = (log.clone(), target.clone());
        bed.game.state.add("ordered", move || Ordered {
            log: state_log.clone(),
            target: state_target.clone(),
        });
        bed.game.start_state("ordered").unwrap();
        (bed, log, target)
    }

    #[test]
    fn a_frame_updates_state_then_tweens_then_renders() {
        let (mut bed, log, target) = ordered_bed();

        // the first pass only starts the tween
        bed.frame(100.0);
        bed.frame(200.0);
        assert_eq!(*log.borrow(), vec!["update@0", "update@0"]);
        assert_relative_eq!(target.borrow().get("x").unwrap(), 10.0);

        bed.frame(300.0);
        assert_eq!(log.borrow().last(), Some(&"update"));
        assert_eq!(bed.renders.get(), 3);
        assert_eq!(bed.game.state.phase(), StatePhase::Running);
    }

    #[test]
    fn paused_and_skipped_frames_do_nothing() {
        let (mut bed, log, _) = ordered_bed();

        bed.game.pause = true;
        bed.frame(100.0);
        assert!(log.borrow().is_empty());
        assert_eq!(bed.renders.get(), 0);

        bed.game.pause = false;
        bed.frame(101.0);
        assert!(log.borrow().is_empty());

        bed.frame(200.0);
        assert_eq!(log.borrow().len(), 1);
    }

    struct Loading;

    impl State for Loading {
        fn preload(&mut self, game: &mut Game) {
            game.load().texture("slow", "slow.png");
        }

        fn update(&mut self, _game: &mut Game, _delta_time: f64) {
            panic!("updated while preloading");
        }
    }

    #[test]
    fn preloading_renders_without_updating() {
        let mut bed = TestBed::new(GameConfig::new(800.0, 600.0));
        bed.game.state.add("loading", || Loading);
        bed.game.start_state("loading").unwrap();

        bed.frame(100.0);

        assert_eq!(bed.renders.get(), 1);
        assert_eq!(bed.game.state.phase(), StatePhase::Loading);
    }

    #[test]
    fn no_state_no_render() {
        let mut bed = TestBed::new(GameConfig::new(800.0, 600.0));

        bed.frame(100.0);

        assert_eq!(bed.renders.get(), 0);
    }

    #[test]
    fn queued_resize_rescales_before_input() {
        let config = GameConfig::new(800.0, 600.0).with_scale_mode(crate::scale::ScaleMode::Fit);
        let mut bed = TestBed::new(config);
        let sender = bed.game.event_sender();

        sender.unbounded_send(InputEvent::Resize).unwrap();
        sender
            .unbounded_send(InputEvent::PointerMove { x: 400.0, y: 300.0 })
            .unwrap();
        bed.frame(100.0);

        // viewport is 800x600 in the bed, a Fit keeps the scale at 1
        assert_eq!(bed.resized.borrow().len(), 1);
        assert_eq!(bed.game.input.pointer().x, 400.0);
    }

    #[test]
    fn teardown_resets_the_camera() {
        let bed = TestBed::new(GameConfig::new(800.0, 600.0));
        let mut game = bed.game;
        game.camera().borrow_mut().position.y = -250.0;

        game.teardown();

        assert_eq!(game.camera().borrow().position.y, 0.0);
    }
}
