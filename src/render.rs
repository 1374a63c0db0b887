use crate::assets::Texture;
use crate::browser;
use crate::cache::Cached;
use crate::engine::Size;
use crate::math::Vector;
use crate::tween::Tweenable;
use anyhow::{anyhow, Result};
use std::f64::consts::PI;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

// ==================== Scene ====================

pub enum SceneNode {
    /// Screen space image, drawn with its top left corner at `position`.
    Sprite {
        texture: Cached<Texture>,
        position: Vector,
        width: f64,
        height: f64,
    },
    /// World space point cloud, colors in `[0, 1]`.
    Points {
        positions: Vec<[f64; 3]>,
        colors: Vec<[f64; 3]>,
        size: f64,
    },
}

/// Everything a state wants drawn. Each state gets a fresh one.
#[derive(Default)]
pub struct Scene {
    nodes: Vec<SceneNode>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of the node, for later [`Scene::node_mut`] calls.
    pub fn add(&mut self, node: SceneNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut SceneNode> {
        self.nodes.get_mut(index)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

// ==================== Camera ====================

/// Perspective camera looking down `-z`. Angles in radians, `fov` in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vector,
    pub rotation: Vector,
    pub fov: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
}

impl Camera {
    pub fn new(fov: f64, aspect: f64, near: f64, far: f64) -> Self {
        Camera {
            position: Vector::default(),
            rotation: Vector::default(),
            fov,
            aspect,
            near,
            far,
        }
    }

    pub fn reset_transform(&mut self) {
        self.position.set_to(0.0, None, None);
        self.rotation.set_to(0.0, None, None);
    }

    /// Moves along the camera's own yaw: `-z` is forward.
    pub fn translate_local(&mut self, x: f64, y: f64, z: f64) {
        let (sin, cos) = self.rotation.y.sin_cos();
        self.position.x += x * cos + z * sin;
        self.position.y += y;
        self.position.z += -x * sin + z * cos;
    }

    /// World point to viewport pixels plus view depth, `None` when clipped.
    pub fn project(&self, point: [f64; 3], viewport: Size) -> Option<(f64, f64, f64)> {
        let x = point[0] - self.position.x;
        let y = point[1] - self.position.y;
        let z = point[2] - self.position.z;

        // undo yaw then pitch
        let (sin_y, cos_y) = (-self.rotation.y).sin_cos();
        let (x, z) = (x * cos_y + z * sin_y, -x * sin_y + z * cos_y);
        let (sin_x, cos_x) = (-self.rotation.x).sin_cos();
        let (y, z) = (y * cos_x - z * sin_x, y * sin_x + z * cos_x);

        let depth = -z;
        if depth < self.near || depth > self.far {
            return None;
        }
        let focal = 1.0 / (self.fov * PI / 360.0).tan();
        let ndc_x = focal / self.aspect * x / depth;
        let ndc_y = focal * y / depth;
        Some((
            (ndc_x + 1.0) * 0.5 * viewport.width,
            (1.0 - ndc_y) * 0.5 * viewport.height,
            depth,
        ))
    }
}

impl Tweenable for Camera {
    fn property(&self, name: &str) -> Option<f64> {
        Some(match name {
            "position.x" => self.position.x,
            "position.y" => self.position.y,
            "position.z" => self.position.z,
            "rotation.x" => self.rotation.x,
            "rotation.y" => self.rotation.y,
            "rotation.z" => self.rotation.z,
            "fov" => self.fov,
            "far" => self.far,
            _ => return None,
        })
    }

    fn set_property(&mut self, name: &str, value: f64) -> bool {
        let slot = match name {
            "position.x" => &mut self.position.x,
            "position.y" => &mut self.position.y,
            "position.z" => &mut self.position.z,
            "rotation.x" => &mut self.rotation.x,
            "rotation.y" => &mut self.rotation.y,
            "rotation.z" => &mut self.rotation.z,
            "fov" => &mut self.fov,
            "far" => &mut self.far,
            _ => return false,
        };
        *slot = value;
        true
    }
}

// ==================== Surface ====================

/// The drawing backend the game renders into once per executed frame.
pub trait Surface {
    fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<()>;
    fn resize(&mut self, width: f64, height: f64);
    /// Space available to the game, the browser window for the canvas.
    fn viewport(&self) -> Size;
    fn measure_text(&self, text: &str, font: &str, size: f64) -> f64;
}

pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    clear_color: String,
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self> {
        let context = browser::context_2d(&canvas)?;
        Ok(CanvasSurface {
            canvas,
            context,
            clear_color: "#000000".to_string(),
        })
    }

    pub fn set_clear_color(&mut self, color: &str) {
        self.clear_color = color.to_string();
    }

    fn size(&self) -> Size {
        Size {
            width: self.canvas.width() as f64,
            height: self.canvas.height() as f64,
        }
    }

    fn draw_sprite(&self, texture: &Cached<Texture>, position: &Vector, width: f64, height: f64) -> Result<()> {
        let texture = texture.borrow();
        // not loaded (yet, or ever): nothing to draw
        let Some(image) = texture.payload().and_then(|payload| payload.image.as_ref()) else {
            return Ok(());
        };
        self.context
            .draw_image_with_html_image_element_and_dw_and_dh(image, position.x, position.y, width, height)
            .map_err(|err| anyhow!("Could not draw '{}' : {:#?}", texture.name(), err))
    }

    fn draw_points(&self, camera: &Camera, positions: &[[f64; 3]], colors: &[[f64; 3]], size: f64) {
        let viewport = self.size();
        let focal = viewport.height * 0.5 / (camera.fov * PI / 360.0).tan();
        for (point, color) in positions.iter().zip(colors) {
            let Some((x, y, depth)) = camera.project(*point, viewport) else {
                continue;
            };
            let side = (size * focal / depth).max(1.0);
            self.context.set_fill_style_str(&format!(
                "rgb({},{},{})",
                (color[0] * 255.0).round(),
                (color[1] * 255.0).round(),
                (color[2] * 255.0).round()
            ));
            self.context.fill_rect(x - side * 0.5, y - side * 0.5, side, side);
        }
    }
}

impl Surface for CanvasSurface {
    fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<()> {
        let size = self.size();
        self.context.set_fill_style_str(&self.clear_color);
        self.context.fill_rect(0.0, 0.0, size.width, size.height);
        for node in scene.nodes() {
            match node {
                SceneNode::Sprite {
                    texture,
                    position,
                    width,
                    height,
                } => self.draw_sprite(texture, position, *width, *height)?,
                SceneNode::Points {
                    positions,
                    colors,
                    size,
                } => self.draw_points(camera, positions, colors, *size),
            }
        }
        Ok(())
    }

    fn resize(&mut self, width: f64, height: f64) {
        self.canvas.set_width(width as u32);
        self.canvas.set_height(height as u32);
    }

    fn viewport(&self) -> Size {
        browser::window_size().unwrap_or_else(|_| self.size())
    }

    fn measure_text(&self, text: &str, font: &str, size: f64) -> f64 {
        self.context.save();
        self.context.set_font(&format!("{}px {}", size, font));
        let width = self
            .context
            .measure_text(text)
            .map(|metrics| metrics.width())
            .unwrap_or(0.0);
        self.context.restore();
        width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn viewport() -> Size {
        Size {
            width: 200.0,
            height: 100.0,
        }
    }

    #[test]
    fn point_straight_ahead_lands_in_the_middle() {
        let camera = Camera::new(90.0, 2.0, 0.1, 1000.0);

        let (x, y, depth) = camera.project([0.0, 0.0, -10.0], viewport()).unwrap();

        assert_relative_eq!(x, 100.0);
        assert_relative_eq!(y, 50.0);
        assert_relative_eq!(depth, 10.0);
    }

    #[test]
    fn points_behind_or_past_far_are_clipped() {
        let camera = Camera::new(45.0, 2.0, 0.1, 100.0);

        assert!(camera.project([0.0, 0.0, 10.0], viewport()).is_none());
        assert!(camera.project([0.0, 0.0, -500.0], viewport()).is_none());
    }

    #[test]
    fn yaw_turns_the_view() {
        let mut camera = Camera::new(90.0, 2.0, 0.1, 1000.0);
        camera.rotation.y = PI / 2.0;

        // after a quarter turn left, -x is straight ahead
        let (x, _, depth) = camera.project([-10.0, 0.0, 0.0], viewport()).unwrap();
        assert_relative_eq!(x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(depth, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn translate_local_follows_yaw() {
        let mut camera = Camera::new(45.0, 1.0, 0.1, 1000.0);
        camera.translate_local(0.0, 0.0, -5.0);
        assert_relative_eq!(camera.position.z, -5.0);

        camera.reset_transform();
        camera.rotation.y = PI / 2.0;
        camera.translate_local(0.0, 0.0, -5.0);
        assert_relative_eq!(camera.position.x, -5.0, epsilon = 1e-9);
    }

    #[test]
    fn camera_properties_are_tweenable() {
        let mut camera = Camera::new(45.0, 1.0, 0.1, 1000.0);

        assert!(camera.set_property("position.y", -250.0));
        assert!(!camera.set_property("zoom", 2.0));
        assert_eq!(camera.property("position.y"), Some(-250.0));
        assert_eq!(camera.property("fov"), Some(45.0));

        camera.reset_transform();
        assert_eq!(camera.position, Vector::default());
    }
}
