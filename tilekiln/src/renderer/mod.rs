//! Map renderer abstraction.
//!
//! A renderer instance is expensive to create and carries mutable state (the
//! loaded style, decoded resources), so instances are pooled and each one is
//! used by a single task at a time. The pipeline only talks to renderers
//! through the traits in this module.
//!
//! # Architecture
//!
//! ```text
//! RendererFactory ──create()──► MapRenderer ──load(style)──► render(options) ──► RawImage
//!        │                          │
//!        └── ResourceRequestHandler ┘  (http(s)://, file://, mbtiles://, relative paths)
//! ```
//!
//! [`RasterRenderer`] is the bundled software implementation built on
//! `tiny-skia`.

pub mod raster;
pub mod request;

use std::future::Future;

use thiserror::Error;

use crate::coord::LngLat;
use crate::style::StyleDocument;

pub use raster::{undrawable_layers, RasterRenderer, RasterRendererFactory};
pub use request::{RequestError, ResourceRequestHandler};

/// Logical size of a rendered tile in pixels, before the pixel ratio.
pub const TILE_SIZE: u32 = 512;

// =============================================================================
// Render Options and Output
// =============================================================================

/// Camera and output parameters for a single render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Zoom level of the camera (a 512px world at zoom 0)
    pub zoom: f64,
    /// Geographic centre of the image
    pub center: LngLat,
    /// Logical output width
    pub width: u32,
    /// Logical output height
    pub height: u32,
    /// Device pixel ratio; the image is `width * pixel_ratio` pixels wide
    pub pixel_ratio: f32,
}

impl RenderOptions {
    /// Physical output width in pixels.
    pub fn physical_width(&self) -> u32 {
        scale_dimension(self.width, self.pixel_ratio)
    }

    /// Physical output height in pixels.
    pub fn physical_height(&self) -> u32 {
        scale_dimension(self.height, self.pixel_ratio)
    }
}

/// Scales a logical dimension by a pixel ratio, never below one pixel.
pub fn scale_dimension(logical: u32, pixel_ratio: f32) -> u32 {
    ((logical as f32 * pixel_ratio).round() as u32).max(1)
}

/// Raw renderer output.
///
/// `data` holds premultiplied RGBA8 pixels, row-major, `width * height * 4`
/// bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RawImage {
    /// Expected buffer length for the image dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl std::fmt::Debug for RawImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors raised by a renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer could not be created.
    #[error("Failed to create renderer: {0}")]
    Create(String),

    /// The style could not be loaded.
    #[error("Failed to load style: {0}")]
    Style(String),

    /// `render` was called before `load`.
    #[error("No style loaded")]
    NotLoaded,

    /// A resource needed by the style could not be fetched.
    #[error("Resource request failed: {0}")]
    Resource(#[from] RequestError),

    /// The engine failed while drawing.
    #[error("Render failed: {0}")]
    Engine(String),
}

// =============================================================================
// Traits
// =============================================================================

/// A stateful map renderer instance.
///
/// Instances are not shared between tasks; the pool hands out exclusive
/// leases. `render` is the only suspension point and the returned image is
/// owned by the caller once it resolves.
pub trait MapRenderer: Send + 'static {
    /// Loads a style, replacing any previously loaded one.
    fn load(&mut self, style: &StyleDocument) -> Result<(), RenderError>;

    /// Renders one image with the loaded style.
    fn render(
        &mut self,
        options: RenderOptions,
    ) -> impl Future<Output = Result<RawImage, RenderError>> + Send;

    /// Frees the engine's resources. The instance is unusable afterwards.
    fn release(self);
}

/// Creates renderer instances for a pool.
pub trait RendererFactory: Send + Sync + 'static {
    /// Renderer type produced by this factory.
    type Renderer: MapRenderer;

    /// Creates one renderer instance.
    fn create(&self) -> impl Future<Output = Result<Self::Renderer, RenderError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_dimensions() {
        let options = RenderOptions {
            zoom: 3.0,
            center: LngLat { lng: 0.0, lat: 0.0 },
            width: TILE_SIZE,
            height: TILE_SIZE,
            pixel_ratio: 2.0,
        };
        assert_eq!(options.physical_width(), 1024);
        assert_eq!(options.physical_height(), 1024);
        assert_eq!(scale_dimension(512, 0.0), 1);
        assert_eq!(scale_dimension(512, 1.5), 768);
    }

    #[test]
    fn test_raw_image_debug_omits_pixels() {
        let image = RawImage {
            width: 2,
            height: 1,
            data: vec![0; 8],
        };
        assert_eq!(image.expected_len(), 8);
        let debug = format!("{:?}", image);
        assert!(debug.contains("bytes: 8"));
    }
}
