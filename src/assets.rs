use crate::browser;
use crate::engine;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use log::warn;
use serde::Deserialize;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AudioBuffer, AudioContext, HtmlImageElement};

// ==================== Payloads ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wrap {
    #[default]
    Repeat,
    Clamp,
}

/// Decoded image. `pixels` is RGBA, row major, empty when the host could
/// not read the image back.
#[derive(Debug, Clone, Default)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub wrap: Wrap,
    pub pixels: Vec<u8>,
    pub image: Option<HtmlImageElement>,
}

impl Texture {
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Texture {
            width,
            height,
            pixels,
            ..Texture::default()
        }
    }

    /// RGBA at `(x, y)`, `None` outside the image or without pixel data.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((x + self.width * y) * 4) as usize;
        let rgba = self.pixels.get(offset..offset + 4)?;
        Some([rgba[0], rgba[1], rgba[2], rgba[3]])
    }
}

/// Six faces, in the order their urls were given.
#[derive(Debug, Clone, Default)]
pub struct CubeMap {
    pub faces: Vec<Texture>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, rename = "DbgName")]
    pub name: Option<String>,
    #[serde(default)]
    pub color_diffuse: Option<[f64; 3]>,
    #[serde(default)]
    pub map_diffuse: Option<String>,
    #[serde(default)]
    pub transparent: bool,
}

/// Mesh in the JSON model format (flat vertex/normal arrays, packed faces).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeometryAsset {
    #[serde(default)]
    pub vertices: Vec<f64>,
    #[serde(default)]
    pub normals: Vec<f64>,
    #[serde(default)]
    pub uvs: Vec<Vec<f64>>,
    #[serde(default)]
    pub faces: Vec<u32>,
    #[serde(default)]
    pub materials: Vec<Material>,
}

impl GeometryAsset {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }
}

#[derive(Debug, Clone, Default)]
pub struct AudioClip {
    pub duration: f64,
    pub channels: u32,
    pub buffer: Option<AudioBuffer>,
}

impl AudioClip {
    pub fn decoded(buffer: AudioBuffer) -> Self {
        AudioClip {
            duration: buffer.duration(),
            channels: buffer.number_of_channels(),
            buffer: Some(buffer),
        }
    }
}

// ==================== Sources ====================

/// Where the loader gets its bytes from. The browser implementation is
/// [`WebAssetSource`]; anything able to resolve these futures can stand in.
#[async_trait(?Send)]
pub trait AssetSource {
    async fn texture(&self, url: &str) -> Result<Texture>;
    async fn cube_map(&self, path: &str, urls: &[String]) -> Result<CubeMap>;
    async fn geometry(&self, url: &str) -> Result<GeometryAsset>;
    async fn audio(&self, url: &str) -> Result<AudioClip>;
}

pub struct WebAssetSource {
    audio_context: Option<AudioContext>,
}

impl WebAssetSource {
    pub fn new(audio_context: Option<AudioContext>) -> Self {
        WebAssetSource { audio_context }
    }
}

#[async_trait(?Send)]
impl AssetSource for WebAssetSource {
    async fn texture(&self, url: &str) -> Result<Texture> {
        let image = engine::load_image(url).await?;
        let (width, height) = (image.natural_width(), image.natural_height());
        // a tainted canvas refuses reads, the image itself is still usable
        let pixels = browser::read_pixels(&image).unwrap_or_else(|err| {
            warn!("No pixel data for '{}' : {:#}", url, err);
            Vec::new()
        });
        Ok(Texture {
            width,
            height,
            wrap: Wrap::Repeat,
            pixels,
            image: Some(image),
        })
    }

    async fn cube_map(&self, path: &str, urls: &[String]) -> Result<CubeMap> {
        let faces = join_all(
            urls.iter()
                .map(|url| format!("{}{}", path, url))
                .map(|url| async move { self.texture(&url).await }),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
        Ok(CubeMap { faces })
    }

    async fn geometry(&self, url: &str) -> Result<GeometryAsset> {
        browser::fetch_json::<GeometryAsset>(url).await
    }

    async fn audio(&self, url: &str) -> Result<AudioClip> {
        let context = self
            .audio_context
            .as_ref()
            .ok_or_else(|| anyhow!("No AudioContext to decode '{}'", url))?;
        let bytes = browser::fetch_array_buffer(url).await?;
        let promise = context
            .decode_audio_data(&bytes)
            .map_err(|err| anyhow!("Could not start decoding '{}' : {:#?}", url, err))?;
        let buffer: AudioBuffer = JsFuture::from(promise)
            .await
            .map_err(|err| anyhow!("Could not decode '{}' : {:#?}", url, err))?
            .dyn_into()
            .map_err(|element| anyhow!("Error converting {:#?} to AudioBuffer", element))?;
        Ok(AudioClip::decoded(buffer))
    }
}
