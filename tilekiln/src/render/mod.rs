//! Single-tile rendering.
//!
//! [`TileRenderer`] drives one leased renderer through load → render →
//! encode for a tile coordinate. It never returns the renderer to the pool;
//! the caller owns the lease.

mod encode;

use std::fmt;

use thiserror::Error;
use tracing::trace;

use crate::coord::{tile_center, TileCoord};
use crate::renderer::{MapRenderer, RenderError, RenderOptions, TILE_SIZE};
use crate::style::StyleDocument;

pub use encode::{encode, unpremultiply, EncodeError, ImageFormat, UnknownFormat, JPEG_QUALITY};

/// Errors from rendering one tile.
#[derive(Debug, Error)]
pub enum TileError {
    /// The renderer failed to load the style or draw the tile.
    #[error("Tile {coord}: {source}")]
    Render {
        coord: TileCoord,
        #[source]
        source: RenderError,
    },

    /// The raw image could not be encoded.
    #[error("Tile {coord}: {source}")]
    Encode {
        coord: TileCoord,
        #[source]
        source: EncodeError,
    },
}

impl TileError {
    /// The tile this error belongs to.
    pub fn coord(&self) -> TileCoord {
        match self {
            TileError::Render { coord, .. } | TileError::Encode { coord, .. } => *coord,
        }
    }
}

/// An encoded tile ready for the archive.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedTile {
    pub coord: TileCoord,
    pub data: Vec<u8>,
}

impl RenderedTile {
    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for an empty payload.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for RenderedTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedTile")
            .field("coord", &self.coord)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Renders and encodes single tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRenderer {
    pixel_ratio: f32,
    format: ImageFormat,
}

impl TileRenderer {
    pub fn new(pixel_ratio: f32, format: ImageFormat) -> Self {
        Self {
            pixel_ratio,
            format,
        }
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Camera options for a tile: a 512x512 view centred on the tile.
    pub fn options_for(&self, coord: TileCoord) -> RenderOptions {
        RenderOptions {
            zoom: coord.zoom as f64,
            center: tile_center(&coord),
            width: TILE_SIZE,
            height: TILE_SIZE,
            pixel_ratio: self.pixel_ratio,
        }
    }

    /// Renders `coord` with `renderer` and encodes the result.
    ///
    /// The style is loaded on every call. Encoding runs on the blocking
    /// thread pool.
    pub async fn render_tile<R: MapRenderer>(
        &self,
        renderer: &mut R,
        style: &StyleDocument,
        coord: TileCoord,
    ) -> Result<RenderedTile, TileError> {
        let render_error = |source| TileError::Render { coord, source };

        renderer.load(style).map_err(render_error)?;
        let raw = renderer
            .render(self.options_for(coord))
            .await
            .map_err(render_error)?;

        trace!(
            tile = %coord,
            width = raw.width,
            height = raw.height,
            "Rendered raw image"
        );

        let format = self.format;
        let data = tokio::task::spawn_blocking(move || encode(raw, format))
            .await
            .map_err(|e| TileError::Encode {
                coord,
                source: EncodeError::Codec {
                    format,
                    message: format!("encoder task failed: {}", e),
                },
            })?
            .map_err(|source| TileError::Encode { coord, source })?;

        Ok(RenderedTile { coord, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RawImage;
    use serde_json::json;

    /// Records the options it was called with and returns a solid image.
    #[derive(Default)]
    struct RecordingRenderer {
        loads: usize,
        last: Option<RenderOptions>,
        fail_render: bool,
        short_buffer: bool,
    }

    impl MapRenderer for RecordingRenderer {
        fn load(&mut self, _style: &StyleDocument) -> Result<(), RenderError> {
            self.loads += 1;
            Ok(())
        }

        async fn render(&mut self, options: RenderOptions) -> Result<RawImage, RenderError> {
            self.last = Some(options);
            if self.fail_render {
                return Err(RenderError::Engine("boom".into()));
            }
            let width = options.physical_width();
            let height = options.physical_height();
            let mut len = (width * height * 4) as usize;
            if self.short_buffer {
                len -= 4;
            }
            Ok(RawImage {
                width,
                height,
                data: vec![255; len],
            })
        }

        fn release(self) {}
    }

    fn style() -> StyleDocument {
        StyleDocument::from_json(json!({"sources": {}, "layers": []})).unwrap()
    }

    #[tokio::test]
    async fn test_render_tile_uses_tile_center_and_ratio() {
        let tile_renderer = TileRenderer::new(2.0, ImageFormat::Png);
        let mut renderer = RecordingRenderer::default();
        let coord = TileCoord::new(0, 0, 0).unwrap();

        let tile = tile_renderer
            .render_tile(&mut renderer, &style(), coord)
            .await
            .unwrap();

        let options = renderer.last.unwrap();
        assert_eq!(options.zoom, 0.0);
        assert!(options.center.lng.abs() < 1e-9 && options.center.lat.abs() < 1e-9);
        assert_eq!((options.width, options.height), (512, 512));
        assert_eq!(renderer.loads, 1);

        assert_eq!(tile.coord, coord);
        let decoded = image::load_from_memory(&tile.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1024, 1024));
    }

    #[tokio::test]
    async fn test_style_loaded_every_call() {
        let tile_renderer = TileRenderer::new(1.0, ImageFormat::Jpg);
        let mut renderer = RecordingRenderer::default();
        for x in 0..2 {
            tile_renderer
                .render_tile(&mut renderer, &style(), TileCoord::new(1, x, 0).unwrap())
                .await
                .unwrap();
        }
        assert_eq!(renderer.loads, 2);
    }

    #[tokio::test]
    async fn test_render_failure_is_tile_error() {
        let tile_renderer = TileRenderer::new(1.0, ImageFormat::Png);
        let mut renderer = RecordingRenderer {
            fail_render: true,
            ..Default::default()
        };
        let coord = TileCoord::new(2, 1, 1).unwrap();
        let err = tile_renderer
            .render_tile(&mut renderer, &style(), coord)
            .await
            .unwrap_err();
        assert!(matches!(err, TileError::Render { .. }));
        assert_eq!(err.coord(), coord);
    }

    #[tokio::test]
    async fn test_bad_buffer_is_encode_error() {
        let tile_renderer = TileRenderer::new(1.0, ImageFormat::Webp);
        let mut renderer = RecordingRenderer {
            short_buffer: true,
            ..Default::default()
        };
        let err = tile_renderer
            .render_tile(&mut renderer, &style(), TileCoord::new(0, 0, 0).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TileError::Encode {
                source: EncodeError::BufferSize { .. },
                ..
            }
        ));
    }
}
