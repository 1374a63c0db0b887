// ==================== Imports ====================
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsValue;

pub mod assets;
pub mod browser;
pub mod cache;
pub mod config;
pub mod engine;
pub mod game;
pub mod input;
pub mod loader;
pub mod math;
pub mod objects;
pub mod render;
pub mod scale;
pub mod signal;
pub mod state;
pub mod tween;

#[cfg(test)]
mod testing;

pub use cache::{Cache, Cached};
pub use config::GameConfig;
pub use engine::{Game, GameLoop, Platform, Size};
pub use signal::Signal;
pub use state::State;
pub use tween::{Easing, Properties, Tween, Tweenable};

use assets::WebAssetSource;
use browser::{BrowserSpawner, ConsoleLogger};
use game::CloudPoint;
use render::CanvasSurface;
use web_sys::AudioContext;

// ==================== Main Functions ====================
/// Main entry for Webassembly module
/// - reads the game config handed over by the page
/// - wires canvas, assets and audio into a `Game`
/// - starts the point cloud state and the frame loop
#[wasm_bindgen]
pub fn main_js(config: JsValue) -> Result<(), JsValue> {
    // setup better panic messages for debugging
    console_error_panic_hook::set_once();
    ConsoleLogger::init(log::LevelFilter::Info);

    let config = GameConfig::from_js(config).map_err(to_js)?;
    let canvas = browser::canvas(&config.canvas_id).map_err(to_js)?;
    let mut surface = CanvasSurface::new(canvas.clone()).map_err(to_js)?;
    surface.set_clear_color(&config.background_color);

    // without audio support the game still runs, audio objects stay silent
    let audio_context = AudioContext::new().ok();
    let platform = Platform {
        assets: Rc::new(WebAssetSource::new(audio_context.clone())),
        spawner: Rc::new(BrowserSpawner),
        surface: Box::new(surface),
        audio_context,
    };

    let mut game = Game::new(config, platform);
    let mobile = browser::is_mobile();
    game.input.set_mobile(mobile);
    browser::listen_input(&canvas, game.event_sender(), mobile).map_err(to_js)?;

    game.state.add(CloudPoint::NAME, CloudPoint::new);
    game.start_state(CloudPoint::NAME).map_err(to_js)?;

    GameLoop::start(game).map_err(to_js)
}

fn to_js(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", err))
}
