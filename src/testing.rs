//! Native stand-ins for the browser: an asset source resolved by hand and a
//! surface that only counts what it is asked to do.

use crate::assets::{AssetSource, AudioClip, CubeMap, GeometryAsset, Texture};
use crate::config::GameConfig;
use crate::engine::{Game, Platform, Size};
use crate::render::{Camera, Scene, Surface};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::channel::oneshot::{channel, Sender};
use futures::executor::LocalPool;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

enum Pending {
    Texture(Sender<Result<Texture>>),
    CubeMap(Sender<Result<CubeMap>>),
    Geometry(Sender<Result<GeometryAsset>>),
    Audio(Sender<Result<AudioClip>>),
}

/// Every fetch parks until the test resolves or fails its url.
#[derive(Default)]
pub struct ManualAssets {
    pending: RefCell<HashMap<String, Pending>>,
    requested: RefCell<Vec<String>>,
}

impl ManualAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }

    fn park(&self, url: &str, pending: Pending) {
        self.requested.borrow_mut().push(url.to_string());
        self.pending.borrow_mut().insert(url.to_string(), pending);
    }

    fn take(&self, url: &str) -> Pending {
        self.pending
            .borrow_mut()
            .remove(url)
            .unwrap_or_else(|| panic!("no pending request for '{}'", url))
    }

    pub fn resolve_texture(&self, url: &str, texture: Texture) {
        match self.take(url) {
            Pending::Texture(tx) => {
                let _ = tx.send(Ok(texture));
            }
            _ => panic!("'{}' is not a texture request", url),
        }
    }

    pub fn resolve_cube_map(&self, path: &str, cube_map: CubeMap) {
        match self.take(path) {
            Pending::CubeMap(tx) => {
                let _ = tx.send(Ok(cube_map));
            }
            _ => panic!("'{}' is not a cube map request", path),
        }
    }

    pub fn resolve_geometry(&self, url: &str, geometry: GeometryAsset) {
        match self.take(url) {
            Pending::Geometry(tx) => {
                let _ = tx.send(Ok(geometry));
            }
            _ => panic!("'{}' is not a geometry request", url),
        }
    }

    pub fn resolve_audio(&self, url: &str, clip: AudioClip) {
        match self.take(url) {
            Pending::Audio(tx) => {
                let _ = tx.send(Ok(clip));
            }
            _ => panic!("'{}' is not an audio request", url),
        }
    }

    pub fn fail(&self, url: &str) {
        let err = anyhow!("404 for '{}'", url);
        // a dropped receiver means the fetch was abandoned, nothing to fail
        match self.take(url) {
            Pending::Texture(tx) => drop(tx.send(Err(err))),
            Pending::CubeMap(tx) => drop(tx.send(Err(err))),
            Pending::Geometry(tx) => drop(tx.send(Err(err))),
            Pending::Audio(tx) => drop(tx.send(Err(err))),
        }
    }
}

#[async_trait(?Send)]
impl AssetSource for ManualAssets {
    async fn texture(&self, url: &str) -> Result<Texture> {
        let (tx, rx) = channel();
        self.park(url, Pending::Texture(tx));
        rx.await?
    }

    async fn cube_map(&self, path: &str, _urls: &[String]) -> Result<CubeMap> {
        let (tx, rx) = channel();
        self.park(path, Pending::CubeMap(tx));
        rx.await?
    }

    async fn geometry(&self, url: &str) -> Result<GeometryAsset> {
        let (tx, rx) = channel();
        self.park(url, Pending::Geometry(tx));
        rx.await?
    }

    async fn audio(&self, url: &str) -> Result<AudioClip> {
        let (tx, rx) = channel();
        self.park(url, Pending::Audio(tx));
        rx.await?
    }
}

pub struct RecordingSurface {
    viewport: Size,
    renders: Rc<Cell<usize>>,
    resized: Rc<RefCell<Vec<(f64, f64)>>>,
}

impl RecordingSurface {
    pub fn new(viewport: Size) -> Self {
        RecordingSurface {
            viewport,
            renders: Rc::new(Cell::new(0)),
            resized: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn renders(&self) -> Rc<Cell<usize>> {
        self.renders.clone()
    }

    pub fn resized(&self) -> Vec<(f64, f64)> {
        self.resized.borrow().clone()
    }
}

impl Surface for RecordingSurface {
    fn render(&mut self, _scene: &Scene, _camera: &Camera) -> Result<()> {
        self.renders.set(self.renders.get() + 1);
        Ok(())
    }

    fn resize(&mut self, width: f64, height: f64) {
        self.resized.borrow_mut().push((width, height));
    }

    fn viewport(&self) -> Size {
        self.viewport
    }

    /// Half the font size per character.
    fn measure_text(&self, text: &str, _font: &str, size: f64) -> f64 {
        text.chars().count() as f64 * size * 0.5
    }
}

/// A game wired to [`ManualAssets`] and a [`RecordingSurface`] whose
/// viewport matches the configured size.
pub struct TestBed {
    pub game: Game,
    pub pool: LocalPool,
    pub assets: Rc<ManualAssets>,
    pub renders: Rc<Cell<usize>>,
    pub resized: Rc<RefCell<Vec<(f64, f64)>>>,
}

impl TestBed {
    pub fn new(config: GameConfig) -> Self {
        let pool = LocalPool::new();
        let assets = Rc::new(ManualAssets::new());
        let surface = RecordingSurface::new(Size::new(config.width, config.height));
        let renders = surface.renders();
        let resized = surface.resized.clone();
        let platform = Platform {
            assets: assets.clone(),
            spawner: Rc::new(pool.spawner()),
            surface: Box::new(surface),
            audio_context: None,
        };
        let mut game = Game::new(config, platform);
        game.clock.reset(0.0);
        TestBed {
            game,
            pool,
            assets,
            renders,
            resized,
        }
    }

    /// Runs the spawned fetches as far as they go, then applies completions.
    pub fn settle(&mut self) {
        self.pool.run_until_stalled();
        self.game.poll_loader();
    }

    pub fn frame(&mut self, now: f64) {
        self.pool.run_until_stalled();
        self.game.tick(now);
    }
}
