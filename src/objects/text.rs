use crate::engine::Size;
use crate::render::Surface;

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: String,
    pub font_size: f64,
    pub font_color: String,
    pub stroke_width: f64,
    pub stroke_color: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        TextStyle {
            font: "Arial".to_string(),
            font_size: 12.0,
            font_color: "white".to_string(),
            stroke_width: 0.0,
            stroke_color: "black".to_string(),
        }
    }
}

/// A line of text. The width comes from the surface's font metrics.
#[derive(Debug, Clone)]
pub struct Text {
    text: String,
    pub font: String,
    pub size: f64,
    pub color: String,
    pub style: String,
    pub stroke_width: f64,
    pub stroke_color: String,
    width: f64,
    height: f64,
}

impl Text {
    pub fn new(text: &str, style: TextStyle, surface: &dyn Surface) -> Self {
        let mut text = Text {
            text: text.to_string(),
            font: style.font,
            size: style.font_size,
            color: style.font_color,
            style: String::new(),
            stroke_width: style.stroke_width,
            stroke_color: style.stroke_color,
            width: 0.0,
            height: style.font_size,
        };
        text.measure(surface);
        text
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str, surface: &dyn Surface) {
        self.text = text.to_string();
        self.measure(surface);
    }

    pub fn measure(&mut self, surface: &dyn Surface) {
        self.width = surface.measure_text(&self.text, &self.font, self.size);
        self.height = self.size;
    }

    /// Unscaled size.
    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{BaseObject, GameObject, ObjectKind};
    use crate::testing::RecordingSurface;

    #[test]
    fn measured_on_creation_and_on_change() {
        let surface = RecordingSurface::new(Size::new(800.0, 600.0));
        let style = TextStyle {
            font_size: 20.0,
            ..TextStyle::default()
        };

        let mut text = Text::new("abcd", style, &surface);
        assert_eq!(text.size(), Size::new(40.0, 20.0));

        text.set_text("ab", &surface);
        assert_eq!(text.size(), Size::new(20.0, 20.0));
    }

    #[test]
    fn bounds_follow_the_object_scale() {
        let surface = RecordingSurface::new(Size::new(800.0, 600.0));
        let text = Text::new("abcd", TextStyle::default(), &surface);
        let mut object = GameObject::new(BaseObject::new(0.0, 0.0), ObjectKind::Text(text));
        object.base.scale.x = 2.0;

        let bounds = object.bounds().unwrap();

        assert_eq!(bounds, Size::new(48.0, 12.0));
    }
}
