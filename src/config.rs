use crate::scale::ScaleMode;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;

mod defaults {
    pub const CANVAS_ID: &str = "canvas";
    pub const FRAME_LIMIT: f64 = 120.0;
    pub const MAX_DELTA_MILLIS: f64 = 400.0;
    pub const BACKGROUND_COLOR: &str = "#000000";
}

/// Startup settings of a [`crate::Game`].
///
/// Every field except the size has a default, so `{ "width": 1280, "height": 720 }`
/// is a complete config from the JS side.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub width: f64,
    pub height: f64,
    #[serde(default = "canvas_id")]
    pub canvas_id: String,
    /// Frames per second ceiling, extra host frames are skipped.
    #[serde(default = "frame_limit")]
    pub frame_limit: f64,
    #[serde(default)]
    pub scale_mode: ScaleMode,
    /// Clear color handed to the canvas surface at startup.
    #[serde(default = "background_color")]
    pub background_color: String,
    #[serde(default = "max_delta_millis")]
    pub max_delta_millis: f64,
}

fn canvas_id() -> String {
    defaults::CANVAS_ID.to_string()
}

fn frame_limit() -> f64 {
    defaults::FRAME_LIMIT
}

fn background_color() -> String {
    defaults::BACKGROUND_COLOR.to_string()
}

fn max_delta_millis() -> f64 {
    defaults::MAX_DELTA_MILLIS
}

impl GameConfig {
    pub fn new(width: f64, height: f64) -> Self {
        GameConfig {
            width,
            height,
            canvas_id: canvas_id(),
            frame_limit: frame_limit(),
            scale_mode: ScaleMode::default(),
            background_color: background_color(),
            max_delta_millis: max_delta_millis(),
        }
    }

    pub fn with_frame_limit(mut self, frame_limit: f64) -> Self {
        self.frame_limit = frame_limit;
        self
    }

    pub fn with_scale_mode(mut self, scale_mode: ScaleMode) -> Self {
        self.scale_mode = scale_mode;
        self
    }

    pub fn with_canvas_id(mut self, canvas_id: &str) -> Self {
        self.canvas_id = canvas_id.to_string();
        self
    }

    /// Reads the object handed over by the page script.
    pub fn from_js(value: JsValue) -> Result<Self> {
        let config: GameConfig = serde_wasm_bindgen::from_value(value)
            .map_err(|err| anyhow!("Invalid game config : {:#?}", err))?;
        config.validate()
    }

    pub fn validate(self) -> Result<Self> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(anyhow!(
                "Game size must be positive, got {}x{}",
                self.width,
                self.height
            ));
        }
        if self.frame_limit <= 0.0 {
            return Err(anyhow!("Frame limit must be positive, got {}", self.frame_limit));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_their_defaults() {
        let config: GameConfig = serde_json::from_str(r#"{ "width": 1280, "height": 720 }"#).unwrap();

        assert_eq!(config, GameConfig::new(1280.0, 720.0));
        assert_eq!(config.frame_limit, 120.0);
        assert_eq!(config.max_delta_millis, 400.0);
        assert_eq!(config.scale_mode, ScaleMode::NoScale);
        assert_eq!(config.canvas_id, "canvas");
    }

    #[test]
    fn camel_case_keys_and_scale_mode_names() {
        let config: GameConfig = serde_json::from_str(
            r#"{ "width": 800, "height": 600, "frameLimit": 30, "scaleMode": "SHOW_ALL", "canvasId": "stage" }"#,
        )
        .unwrap();

        assert_eq!(config.frame_limit, 30.0);
        assert_eq!(config.scale_mode, ScaleMode::ShowAll);
        assert_eq!(config.canvas_id, "stage");
    }

    #[test]
    fn validate_rejects_empty_sizes() {
        assert!(GameConfig::new(0.0, 720.0).validate().is_err());
        assert!(GameConfig::new(10.0, 10.0).with_frame_limit(0.0).validate().is_err());
        assert!(GameConfig::new(10.0, 10.0).validate().is_ok());
    }
}
