use crate::assets::Texture;
use crate::engine::Game;
use crate::input::key_code;
use crate::math::Vector;
use crate::render::SceneNode;
use crate::state::State;
use crate::tween::Easing;
use log::{info, warn};
use std::f64::consts::PI;

/// TABLE
/// ┌──────────────────────── CloudPoint ─────────────────────────┐
/// │                                                             │
/// │  depth texture ──┐                                          │
/// │                  ├──► one point per pixel on a cylinder     │
/// │  color texture ──┘    around the origin                     │
/// │                                                             │
/// │   column x ──► angle  = x / width * 2π                      │
/// │   red      ──► radius = (255 - r) * 2 + 1500                │
/// │   row y    ──► height = -y                                  │
/// │                                                             │
/// │  WASD accelerates the camera, velocity decays every frame   │
/// └─────────────────────────────────────────────────────────────┘
pub struct CloudPoint {
    velocity: Vector,
}

impl CloudPoint {
    pub const NAME: &'static str = "space";
    const DEPTH_PATH: &'static str = "tex/depthTexture.png";
    const COLOR_PATH: &'static str = "tex/izquierdo.jpg";

    const DEPTH_MULTIPLIER: f64 = 2.0;
    const START_DISTANCE: f64 = 1500.0;
    const ACCELERATION: f64 = 1400.0;
    const DAMPING: f64 = 7.0;
    const POINT_SIZE: f64 = 6.0;

    pub fn new() -> Self {
        CloudPoint {
            velocity: Vector::default(),
        }
    }

    /// Positions and `[0, 1]` colors, one per depth pixel. A color pixel
    /// outside the color texture is black.
    fn build_points(depth: &Texture, color: &Texture) -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
        let count = (depth.width * depth.height) as usize;
        let mut positions = Vec::with_capacity(count);
        let mut colors = Vec::with_capacity(count);
        for y in 0..depth.height {
            for x in 0..depth.width {
                let Some([red, ..]) = depth.pixel(x, y) else {
                    continue;
                };
                let radius = (255.0 - red as f64) * Self::DEPTH_MULTIPLIER + Self::START_DISTANCE;
                let angle = x as f64 / depth.width as f64 * PI * 2.0;
                positions.push([angle.cos() * radius, -(y as f64), angle.sin() * radius]);

                let [r, g, b, _] = color.pixel(x, y).unwrap_or_default();
                colors.push([r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0]);
            }
        }
        (positions, colors)
    }
}

impl Default for CloudPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl State for CloudPoint {
    fn preload(&mut self, game: &mut Game) {
        let mut load = game.load();
        load.texture("depth", Self::DEPTH_PATH);
        load.texture("color", Self::COLOR_PATH);
        load.on_complete_file().add(|progress: &f64| {
            info!("CloudPoint: {:.0}% loaded", progress * 100.0);
        });
    }

    fn start(&mut self, game: &mut Game) {
        let camera = game.camera();
        {
            let mut camera = camera.borrow_mut();
            camera.position.y = -250.0;
            camera.far = 1_000_000.0;
        }
        game.tween
            .add(&camera)
            .to([("fov", 45.0)], 1500.0, Easing::QuadOut)
            .from([("fov", 75.0)]);

        // failed fetches leave the entries empty
        let (Some(depth), Some(color)) = (game.cache.texture("depth"), game.cache.texture("color"))
        else {
            return;
        };
        let (depth, color) = (depth.borrow(), color.borrow());
        let Some(depth) = depth.payload() else {
            warn!("CloudPoint: no depth texture, nothing to draw");
            return;
        };
        let empty = Texture::default();
        let color = color.payload().unwrap_or(&empty);

        let (positions, colors) = Self::build_points(depth, color);
        if let Some(scene) = game.scene_mut() {
            scene.add(SceneNode::Points {
                positions,
                colors,
                size: Self::POINT_SIZE,
            });
        }
    }

    fn update(&mut self, game: &mut Game, delta_time: f64) {
        self.velocity.x -= self.velocity.x * Self::DAMPING * delta_time;
        self.velocity.z -= self.velocity.z * Self::DAMPING * delta_time;

        let step = Self::ACCELERATION * delta_time;
        if game.input.is_pressed(key_code::W) {
            self.velocity.z -= step;
        }
        if game.input.is_pressed(key_code::S) {
            self.velocity.z += step;
        }
        if game.input.is_pressed(key_code::A) {
            self.velocity.x -= step;
        }
        if game.input.is_pressed(key_code::D) {
            self.velocity.x += step;
        }

        game.camera().borrow_mut().translate_local(
            self.velocity.x * delta_time,
            self.velocity.y * delta_time,
            self.velocity.z * delta_time,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::input::InputEvent;
    use crate::testing::TestBed;
    use approx::assert_relative_eq;

    fn bed() -> TestBed {
        let mut bed = TestBed::new(GameConfig::new(1280.0, 720.0));
        bed.game.state.add(CloudPoint::NAME, CloudPoint::new);
        bed.game.start_state(CloudPoint::NAME).unwrap();
        bed.settle();
        bed
    }

    fn running_bed() -> TestBed {
        let mut bed = bed();
        // red 255 sits at the start distance, red 0 is pushed 510 further
        let depth = Texture::from_pixels(2, 1, vec![255, 0, 0, 255, 0, 0, 0, 255]);
        let color = Texture::from_pixels(1, 1, vec![255, 0, 51, 255]);
        bed.assets.resolve_texture(CloudPoint::DEPTH_PATH, depth);
        bed.assets.resolve_texture(CloudPoint::COLOR_PATH, color);
        bed.settle();
        bed
    }

    fn points(bed: &TestBed) -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
        match bed.game.scene().and_then(|scene| scene.nodes().first()) {
            Some(SceneNode::Points {
                positions, colors, ..
            }) => (positions.clone(), colors.clone()),
            _ => panic!("no point cloud in the scene"),
        }
    }

    #[test]
    fn preload_requests_both_textures() {
        let bed = bed();
        let mut requested = bed.assets.requested();
        requested.sort();

        assert_eq!(requested, vec![CloudPoint::DEPTH_PATH, CloudPoint::COLOR_PATH]);
        assert!(bed.game.loader().is_preloading());
    }

    #[test]
    fn pixels_become_points_around_the_origin() {
        let bed = running_bed();
        let (positions, colors) = points(&bed);

        assert_eq!(positions.len(), 2);
        assert_relative_eq!(positions[0][0], 1500.0);
        assert_relative_eq!(positions[0][2], 0.0);
        // second column is half way round
        assert_relative_eq!(positions[1][0], -2010.0);
        assert_relative_eq!(positions[1][2], 0.0, epsilon = 1e-9);
        assert_eq!(colors[0], [1.0, 0.0, 0.2]);
        assert_eq!(colors[1], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn start_places_the_camera() {
        let bed = running_bed();
        let camera = bed.game.camera();
        let camera = camera.borrow();

        assert_eq!(camera.position.y, -250.0);
        assert_eq!(camera.far, 1_000_000.0);
        assert_eq!(bed.game.tween.len(), 1);
    }

    #[test]
    fn missing_depth_texture_starts_with_an_empty_scene() {
        let mut bed = bed();
        bed.assets.fail(CloudPoint::DEPTH_PATH);
        bed.assets.fail(CloudPoint::COLOR_PATH);
        bed.settle();

        assert!(bed.game.state.has_current());
        assert!(bed.game.scene().unwrap().is_empty());
    }

    #[test]
    fn holding_w_moves_forward_and_release_slows_down() {
        let mut bed = running_bed();
        let tx = bed.game.event_sender();
        tx.unbounded_send(InputEvent::KeyDown(key_code::W)).unwrap();

        bed.frame(100.0);
        let after_push = bed.game.camera().borrow().position.z;
        assert!(after_push < 0.0);

        tx.unbounded_send(InputEvent::KeyUp(key_code::W)).unwrap();
        bed.frame(200.0);
        let coasting = bed.game.camera().borrow().position.z - after_push;
        assert!(coasting < 0.0);
        assert!(coasting.abs() < after_push.abs());
    }
}
