//! Tile archive storage.
//!
//! Rendered tiles are written into a single-file archive together with a flat
//! metadata table. [`MbtilesWriter`] stores them in the MBTiles 1.3 SQLite
//! layout; [`MbtilesReader`] reads such files back, both for `mbtiles://`
//! style sources and for verification.
//!
//! # Write protocol
//!
//! ```text
//! create(path) → put_metadata → put_tile* (concurrent) → finish
//! ```
//!
//! `finish` must only be called once every `put_tile` future has resolved.

mod mbtiles;
mod metadata;

use std::future::Future;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::coord::TileCoord;

pub use mbtiles::{MbtilesReader, MbtilesWriter, MBTILES_EXTENSION};
pub use metadata::{ArchiveMetadata, MetadataError, METADATA_FILENAME};

/// Errors from archive storage.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive could not be created or opened.
    #[error("Failed to open archive {path}: {message}")]
    Open { path: PathBuf, message: String },

    /// A metadata or tile write failed.
    #[error("Failed to write {what}: {message}")]
    Write { what: String, message: String },

    /// Flushing and closing the archive failed.
    #[error("Failed to finish archive: {0}")]
    Finish(String),

    /// A read from an existing archive failed.
    #[error("Failed to read archive: {0}")]
    Read(String),

    /// The archive was used after `finish`.
    #[error("Archive is already finished")]
    Finished,
}

/// Destination for rendered tiles.
///
/// Implementations must accept concurrent `put_tile` calls through a shared
/// reference.
pub trait TileArchive: Send + Sync + 'static {
    /// Creates a new archive at `path`.
    fn create(path: &Path) -> impl Future<Output = Result<Self, ArchiveError>> + Send
    where
        Self: Sized;

    /// Writes the metadata table.
    fn put_metadata(
        &self,
        metadata: &ArchiveMetadata,
    ) -> impl Future<Output = Result<(), ArchiveError>> + Send;

    /// Stores one tile, addressed in the XYZ scheme.
    fn put_tile(
        &self,
        coord: TileCoord,
        data: Vec<u8>,
    ) -> impl Future<Output = Result<(), ArchiveError>> + Send;

    /// Flushes and closes the archive.
    fn finish(&self) -> impl Future<Output = Result<(), ArchiveError>> + Send;
}
