//! Generation request, configuration and result types.

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use super::error::PipelineError;
use super::stats::{RunStats, DEFAULT_PROGRESS_INTERVAL};
use crate::archive::MBTILES_EXTENSION;
use crate::coord::{Bounds, TileCoord, ZoomRange};
use crate::pool::DEFAULT_POOL_SIZE;
use crate::render::ImageFormat;
use crate::style::StyleDocument;

/// Largest accepted device pixel ratio.
pub const MAX_PIXEL_RATIO: f32 = 8.0;

// =============================================================================
// Configuration
// =============================================================================

/// What to do when a single tile fails to render or encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFailurePolicy {
    /// Log the failure, record it in the result and keep going.
    #[default]
    Skip,
    /// Stop dispatching, let in-flight tiles settle and fail the run.
    Abort,
}

impl TileFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileFailurePolicy::Skip => "skip",
            TileFailurePolicy::Abort => "abort",
        }
    }
}

impl std::fmt::Display for TileFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(TileFailurePolicy::Skip),
            "abort" => Ok(TileFailurePolicy::Abort),
            other => Err(format!(
                "unknown failure policy '{}' (expected skip or abort)",
                other
            )),
        }
    }
}

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Renderer instances, and so tiles rendered in parallel
    pub concurrency: usize,
    /// Tasks dispatched but not yet finished; defaults to twice `concurrency`
    pub max_in_flight: Option<usize>,
    /// Handling of single-tile failures
    pub failure_policy: TileFailurePolicy,
    /// Settled tiles between progress log lines
    pub progress_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_POOL_SIZE,
            max_in_flight: None,
            failure_policy: TileFailurePolicy::Skip,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl PipelineConfig {
    /// Sets the renderer concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Bounds tasks dispatched but not yet finished.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = Some(max_in_flight);
        self
    }

    /// Sets the failure policy.
    pub fn with_failure_policy(mut self, policy: TileFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Effective bound on dispatched tasks.
    pub fn in_flight_limit(&self) -> usize {
        self.max_in_flight
            .unwrap_or(self.concurrency.saturating_mul(2))
            .max(1)
    }

    pub(crate) fn validate(&self) -> Result<(), PipelineError> {
        if self.concurrency == 0 {
            return Err(PipelineError::Config(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.max_in_flight == Some(0) {
            return Err(PipelineError::Config(
                "max_in_flight must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Request
// =============================================================================

/// Everything needed to generate one tile set.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Style rendered for every tile
    pub style: StyleDocument,
    /// Directory searched for `metadata.json`
    pub source_dir: PathBuf,
    pub bounds: Bounds,
    pub zooms: ZoomRange,
    pub pixel_ratio: f32,
    pub format: ImageFormat,
    /// Working directory; removed after a successful run
    pub temp_dir: PathBuf,
    /// Directory receiving the finished archive
    pub output_dir: PathBuf,
    /// Archive name without extension
    pub output_name: String,
}

impl GenerationRequest {
    /// Path the archive is written to while rendering.
    pub fn temp_path(&self) -> PathBuf {
        self.temp_dir.join(self.archive_filename())
    }

    /// Final location of the archive.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(self.archive_filename())
    }

    fn archive_filename(&self) -> String {
        format!("{}.{}", self.output_name, MBTILES_EXTENSION)
    }

    /// Checks the request before any I/O.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.bounds.validate()?;
        ZoomRange::new(self.zooms.min, self.zooms.max)?;

        let name = self.output_name.trim();
        if name.is_empty() {
            return Err(PipelineError::Config("output name is empty".into()));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(PipelineError::Config(format!(
                "output name '{}' must be a plain file name",
                self.output_name
            )));
        }

        if !self.pixel_ratio.is_finite()
            || self.pixel_ratio <= 0.0
            || self.pixel_ratio > MAX_PIXEL_RATIO
        {
            return Err(PipelineError::Config(format!(
                "pixel ratio {} must be in (0, {}]",
                self.pixel_ratio, MAX_PIXEL_RATIO
            )));
        }

        if within(&self.output_dir, &self.temp_dir) {
            return Err(PipelineError::Config(
                "output directory must not be the temp directory or inside it".into(),
            ));
        }
        Ok(())
    }
}

/// Whether `path` is `dir` or lies below it once both are resolved.
fn within(path: &Path, dir: &Path) -> bool {
    resolve(path).starts_with(resolve(dir))
}

/// Absolute form of `path` with `.` and `..` folded and the longest existing
/// prefix canonicalized. Works for paths that do not exist yet.
pub(crate) fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    let mut missing = Vec::new();
    let mut existing = lexical.as_path();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return lexical,
        }
    }
}

// =============================================================================
// Result
// =============================================================================

/// A tile that failed under the skip policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedTile {
    pub tile: TileCoord,
    pub error: String,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    /// Set when the finished archive could not be moved to the output
    /// directory; it is then left at `file_location` inside the temp dir.
    pub error_message: Option<String>,
    /// Where the archive is
    pub file_location: PathBuf,
    /// Archive size in bytes
    pub file_size: u64,
    /// Tiles written to the archive
    pub number_of_tiles: u64,
    /// Tiles skipped after a render or encode failure
    pub failed_tiles: Vec<FailedTile>,
    pub stats: RunStats,
}

impl GenerationResult {
    /// True if the archive reached the output directory with every tile.
    pub fn is_complete(&self) -> bool {
        self.error_message.is_none() && self.failed_tiles.is_empty()
    }
}
