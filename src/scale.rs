use crate::engine::Size;
use crate::render::{Camera, Surface};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScaleMode {
    /// Stretch to the whole viewport.
    Fit,
    /// Largest size inside the viewport keeping the game's aspect ratio.
    ShowAll,
    #[default]
    NoScale,
}

/// Fits the drawing surface to the viewport and remembers the ratio between
/// surface pixels and game units, used to map pointer positions back.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleManager {
    pub mode: ScaleMode,
    render_scale: (f64, f64),
    source_aspect_ratio: f64,
}

impl Default for ScaleManager {
    fn default() -> Self {
        Self::new(ScaleMode::NoScale)
    }
}

impl ScaleManager {
    pub fn new(mode: ScaleMode) -> Self {
        ScaleManager {
            mode,
            render_scale: (1.0, 1.0),
            source_aspect_ratio: 0.0,
        }
    }

    pub fn render_scale(&self) -> (f64, f64) {
        self.render_scale
    }

    /// Missing `y` repeats `x`.
    pub fn set_render_scale(&mut self, x: f64, y: Option<f64>) {
        self.render_scale = (x, y.unwrap_or(x));
    }

    /// Size the surface should take for `game` inside `viewport`, `None`
    /// when the mode leaves the surface alone.
    pub fn target_size(&mut self, game: Size, viewport: Size) -> Option<Size> {
        let (width, height) = match self.mode {
            ScaleMode::NoScale => return None,
            ScaleMode::Fit => (viewport.width, viewport.height),
            ScaleMode::ShowAll => {
                self.source_aspect_ratio = game.width / game.height;
                let mut height = viewport.height;
                let mut width = height * self.source_aspect_ratio;
                if width > viewport.width {
                    width = viewport.width;
                    height = width / self.source_aspect_ratio;
                }
                (width, height)
            }
        };
        Some(Size {
            width: width.round(),
            height: height.round(),
        })
    }

    pub fn update_scale(&mut self, game: Size, surface: &mut dyn Surface, camera: &mut Camera) {
        let Some(size) = self.target_size(game, surface.viewport()) else {
            return;
        };
        debug!("ScaleManager: resizing to {}x{}", size.width, size.height);
        camera.aspect = size.width / size.height;
        surface.resize(size.width, size.height);
        self.set_render_scale(size.width / game.width, Some(size.height / game.height));
    }
}
