//! Error types for tile set generation.
//!
//! Each variant names the stage that failed. Single-tile failures only
//! surface here under [`TileFailurePolicy::Abort`](super::TileFailurePolicy);
//! with the default skip policy they are recorded in the result instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::coord::CoordError;
use crate::pool::PoolError;
use crate::render::TileError;

/// Fatal errors from a generation run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request is invalid; nothing was rendered.
    #[error("Invalid request: {0}")]
    Config(String),

    /// Bounds or zoom range are invalid; nothing was rendered.
    #[error("Invalid tile range: {0}")]
    Range(#[from] CoordError),

    /// A working or output directory could not be prepared.
    #[error("Failed to prepare {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The archive could not be opened, written or finished.
    #[error("Archive stage failed: {0}")]
    Archive(#[from] ArchiveError),

    /// A renderer could not be created.
    #[error("Renderer pool failed: {0}")]
    Pool(#[from] PoolError),

    /// A tile failed under the abort policy.
    #[error("Tile rendering aborted: {0}")]
    TileFailed(#[source] TileError),

    /// A render task panicked.
    #[error("Render task panicked: {0}")]
    TaskPanicked(String),

    /// The run was cancelled from outside before all tiles were rendered.
    #[error("Generation cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Short name of the failed stage, for summaries.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Config(_) | PipelineError::Range(_) => "config",
            PipelineError::Directory { .. } => "filesystem",
            PipelineError::Archive(_) => "archive",
            PipelineError::Pool(_) => "pool",
            PipelineError::TileFailed(_) | PipelineError::TaskPanicked(_) => "render",
            PipelineError::Cancelled => "cancelled",
        }
    }
}
