//! Default values and constants for all configuration settings.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::pipeline::TileFailurePolicy;
use crate::pool::DEFAULT_POOL_SIZE;
use crate::render::ImageFormat;
use crate::style::{DEFAULT_SOURCE_TILE_SIZE, PROTOMAPS_STYLE};

/// Default device pixel ratio.
pub const DEFAULT_PIXEL_RATIO: f32 = 1.0;

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE: &str = "tilekiln.log";

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "tiles";

/// Default working directory for archives being written.
pub fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("tilekiln")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            render: RenderSettings {
                concurrency: DEFAULT_POOL_SIZE,
                pixel_ratio: DEFAULT_PIXEL_RATIO,
                format: ImageFormat::Png,
                tile_size: DEFAULT_SOURCE_TILE_SIZE,
                failure_policy: TileFailurePolicy::Skip,
            },
            style: StyleSettings {
                name: PROTOMAPS_STYLE.to_string(),
                basemap_provider: false,
            },
            output: OutputSettings {
                directory: PathBuf::from(DEFAULT_OUTPUT_DIR),
                temp_dir: default_temp_dir(),
            },
            logging: LoggingSettings {
                file: config_directory().join(DEFAULT_LOG_FILE),
            },
        }
    }
}
