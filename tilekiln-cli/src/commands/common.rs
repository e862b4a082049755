//! Arguments and helpers shared across CLI commands.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use clap::Args;
use tilekiln::config::ConfigFile;
use tilekiln::coord::{Bounds, ZoomRange};
use tilekiln::renderer::undrawable_layers;
use tilekiln::style::{build_style, StyleDocument, StyleOptions, OVERLAY_FILENAME};
use tracing::{debug, warn};

use crate::error::CliError;

/// Bounding box and zoom range arguments.
#[derive(Debug, Clone, Args)]
pub struct RangeArgs {
    /// Bounding box as west,south,east,north in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub bounds: Bounds,

    /// Lowest zoom level to render
    #[arg(long, default_value_t = 0)]
    pub min_zoom: u8,

    /// Highest zoom level to render
    #[arg(long)]
    pub max_zoom: u8,
}

impl RangeArgs {
    pub fn zooms(&self) -> Result<ZoomRange, CliError> {
        Ok(ZoomRange::new(self.min_zoom, self.max_zoom)?)
    }
}

/// Style selection arguments. Unset values come from config.ini.
#[derive(Debug, Clone, Args)]
pub struct StyleArgs {
    /// Base style: "protomaps" or a raster tile URL template
    #[arg(long)]
    pub style: Option<String>,

    /// GeoJSON file drawn on top of the base style
    #[arg(long, value_name = "FILE")]
    pub overlay: Option<PathBuf>,

    /// Use OpenStreetMap raster tiles as the basemap
    #[arg(long)]
    pub basemap_provider: bool,

    /// Logical tile size of raster sources
    #[arg(long)]
    pub tile_size: Option<u32>,

    /// Working directory for the overlay copy and the archive being written;
    /// deleted after a successful run
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,
}

impl StyleArgs {
    /// Effective temp directory.
    pub fn temp_dir(&self, config: &ConfigFile) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| config.output.temp_dir.clone())
    }

    /// Builds the style document, copying the overlay into the temp directory.
    pub fn build(&self, config: &ConfigFile) -> Result<StyleDocument, CliError> {
        let temp_dir = self.temp_dir(config);
        if let Some(overlay) = &self.overlay {
            copy_overlay(overlay, &temp_dir)?;
        }

        let options = StyleOptions::new(
            self.style.clone().unwrap_or_else(|| config.style.name.clone()),
            &temp_dir,
        )
        .with_overlay(self.overlay.is_some())
        .with_basemap_provider(self.basemap_provider || config.style.basemap_provider)
        .with_tile_size(self.tile_size.unwrap_or(config.render.tile_size));

        Ok(build_style(&options)?)
    }
}

/// Copies `overlay` to `<temp_dir>/overlay.geojson`.
fn copy_overlay(overlay: &Path, temp_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(temp_dir).map_err(|error| CliError::File {
        path: temp_dir.to_path_buf(),
        error,
    })?;
    std::fs::copy(overlay, temp_dir.join(OVERLAY_FILENAME)).map_err(|error| CliError::File {
        path: overlay.to_path_buf(),
        error,
    })?;
    Ok(())
}

/// Removes the overlay copy and the temp directory if it is then empty.
///
/// Both are usually gone already after a successful run. Other failures are
/// logged and otherwise ignored.
pub fn remove_overlay_copy(temp_dir: &Path) {
    let overlay = temp_dir.join(OVERLAY_FILENAME);
    if let Err(e) = std::fs::remove_file(&overlay) {
        if e.kind() != ErrorKind::NotFound {
            debug!(path = %overlay.display(), error = %e, "Failed to remove overlay copy");
        }
    }
    if let Err(e) = std::fs::remove_dir(temp_dir) {
        if e.kind() != ErrorKind::NotFound {
            debug!(path = %temp_dir.display(), error = %e, "Temp directory not removed");
        }
    }
}

/// Warns when the style has layers the raster renderer will not draw.
pub fn warn_undrawable_layers(style: &StyleDocument) {
    let skipped = undrawable_layers(style);
    if skipped.is_empty() {
        return;
    }
    warn!(layers = ?skipped, "Style layers will not be drawn");
    if skipped.len() == style.layer_ids().len() {
        eprintln!("Warning: no layer of this style can be drawn; tiles will be empty");
    } else {
        eprintln!("Warning: layers not drawn: {}", skipped.join(", "));
    }
}

/// Formats a byte count for display.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}
