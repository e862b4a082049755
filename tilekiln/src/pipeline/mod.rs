//! Tile set generation pipeline.
//!
//! Turns a [`GenerationRequest`] into a finished archive in the output
//! directory.
//!
//! # Architecture
//!
//! ```text
//! validate → plan → archive.create → metadata
//!     → for each zoom, for each tile (bounded in-flight tasks):
//!           pool.acquire → load + render + encode → release → archive.put_tile
//!     → drain → pool.shutdown → archive.finish → move to output dir
//! ```
//!
//! Renderer concurrency is bounded by the [`RendererPool`](crate::pool::RendererPool),
//! task fan-out by a dispatch semaphore. A failed tile is skipped and
//! reported in [`GenerationResult::failed_tiles`] unless the
//! [`TileFailurePolicy::Abort`] policy is configured.
//!
//! # Example
//!
//! ```ignore
//! use tilekiln::pipeline::{GenerationRequest, PipelineConfig, PipelineOrchestrator};
//! use tilekiln::renderer::RasterRendererFactory;
//!
//! let orchestrator = PipelineOrchestrator::new(PipelineConfig::default());
//! let factory = RasterRendererFactory::new(style_dir, source_dir);
//! let result = orchestrator.generate(&request, factory).await?;
//! println!("{} tiles at {}", result.number_of_tiles, result.file_location.display());
//! ```

mod error;
mod orchestrator;
mod plan;
mod request;
mod stats;

pub use error::PipelineError;
pub use orchestrator::PipelineOrchestrator;
pub use plan::GenerationPlan;
pub use request::{
    FailedTile, GenerationRequest, GenerationResult, PipelineConfig, TileFailurePolicy,
    MAX_PIXEL_RATIO,
};
pub use stats::{ProgressTracker, RunStats, DEFAULT_PROGRESS_INTERVAL};
