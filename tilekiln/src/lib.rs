//! tilekiln - raster tile set generation
//!
//! Renders a geographic bounding box across a zoom range with a pool of
//! stateful map renderers and packages the tiles into one MBTiles archive.
//!
//! # High-Level API
//!
//! ```ignore
//! use tilekiln::pipeline::{GenerationRequest, PipelineConfig, PipelineOrchestrator};
//! use tilekiln::renderer::RasterRendererFactory;
//! use tilekiln::style::{build_style, StyleOptions};
//!
//! let style = build_style(&StyleOptions::new("protomaps", &temp_dir))?;
//! let request = GenerationRequest { style, /* bounds, zooms, ... */ };
//! let result = PipelineOrchestrator::new(PipelineConfig::default())
//!     .generate(&request, RasterRendererFactory::new(style_dir, source_dir))
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`coord`] - Web Mercator tile math and tile ranges
//! - [`style`] - style documents and the optional GeoJSON overlay
//! - [`renderer`] - renderer traits, resource requests and the software renderer
//! - [`pool`] - bounded pool of renderer instances
//! - [`render`] - single-tile render and image encoding
//! - [`archive`] - MBTiles storage and metadata
//! - [`pipeline`] - the generation run
//! - [`config`] / [`logging`] - ambient setup for the CLI

pub mod archive;
pub mod config;
pub mod coord;
pub mod logging;
pub mod pipeline;
pub mod pool;
pub mod render;
pub mod renderer;
pub mod style;

/// Version of the tilekiln library and CLI.
///
/// Synchronized across the workspace from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
