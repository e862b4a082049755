//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use crate::pipeline::{PipelineConfig, TileFailurePolicy};
use crate::render::ImageFormat;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Rendering settings
    pub render: RenderSettings,
    /// Style settings
    pub style: StyleSettings,
    /// Output settings
    pub output: OutputSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Rendering configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Renderer instances rendering in parallel
    pub concurrency: usize,
    /// Device pixel ratio; 2.0 renders 1024px tiles
    pub pixel_ratio: f32,
    /// Tile image format
    pub format: ImageFormat,
    /// Logical tile size of raster sources in generated styles
    pub tile_size: u32,
    /// What to do when one tile fails
    pub failure_policy: TileFailurePolicy,
}

/// Style configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSettings {
    /// Base style: "protomaps" or a raster tile URL template
    pub name: String,
    /// Use the OpenStreetMap raster basemap instead of a named style
    pub basemap_provider: bool,
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    /// Directory receiving finished archives
    pub directory: PathBuf,
    /// Working directory for archives being written
    pub temp_dir: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl ConfigFile {
    /// Orchestrator settings derived from `[render]`.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_concurrency(self.render.concurrency)
            .with_failure_policy(self.render.failure_policy)
    }
}
