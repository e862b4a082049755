//! MBTiles archive backed by SQLite.
//!
//! Tiles are stored in the TMS row order MBTiles mandates
//! (`tile_row = 2^z - 1 - y`); callers always address tiles in XYZ.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

use super::{ArchiveError, ArchiveMetadata, TileArchive};
use crate::coord::{tiles_per_side, TileCoord};

/// File extension of MBTiles archives.
pub const MBTILES_EXTENSION: &str = "mbtiles";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS metadata (name TEXT NOT NULL, value TEXT)",
    "CREATE UNIQUE INDEX IF NOT EXISTS metadata_name ON metadata (name)",
    "CREATE TABLE IF NOT EXISTS tiles (
        zoom_level INTEGER NOT NULL,
        tile_column INTEGER NOT NULL,
        tile_row INTEGER NOT NULL,
        tile_data BLOB
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS tile_index ON tiles (zoom_level, tile_column, tile_row)",
];

// =============================================================================
// Writer
// =============================================================================

/// Writes tiles into a new MBTiles file.
///
/// A single SQLite connection serializes concurrent `put_tile` calls.
#[derive(Debug)]
pub struct MbtilesWriter {
    pool: SqlitePool,
    path: PathBuf,
    tiles_written: AtomicU64,
    finished: AtomicBool,
}

impl MbtilesWriter {
    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of tiles stored so far.
    pub fn tiles_written(&self) -> u64 {
        self.tiles_written.load(Ordering::Relaxed)
    }

    fn ensure_open(&self) -> Result<(), ArchiveError> {
        if self.finished.load(Ordering::Acquire) {
            return Err(ArchiveError::Finished);
        }
        Ok(())
    }
}

impl TileArchive for MbtilesWriter {
    async fn create(path: &Path) -> Result<Self, ArchiveError> {
        let open_error = |message: String| ArchiveError::Open {
            path: path.to_path_buf(),
            message,
        };

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| open_error(e.to_string()))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| open_error(e.to_string()))?;
        }

        debug!(path = %path.display(), "Created MBTiles archive");

        Ok(Self {
            pool,
            path: path.to_path_buf(),
            tiles_written: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        })
    }

    async fn put_metadata(&self, metadata: &ArchiveMetadata) -> Result<(), ArchiveError> {
        self.ensure_open()?;

        let write_error = |e: sqlx::Error| ArchiveError::Write {
            what: "metadata".to_string(),
            message: e.to_string(),
        };

        let mut tx = self.pool.begin().await.map_err(write_error)?;
        for (name, value) in metadata.iter() {
            sqlx::query("INSERT OR REPLACE INTO metadata (name, value) VALUES (?, ?)")
                .bind(name)
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(write_error)?;
        }
        tx.commit().await.map_err(write_error)?;

        debug!(entries = metadata.len(), "Wrote archive metadata");
        Ok(())
    }

    async fn put_tile(&self, coord: TileCoord, data: Vec<u8>) -> Result<(), ArchiveError> {
        self.ensure_open()?;

        sqlx::query(
            "INSERT OR REPLACE INTO tiles (zoom_level, tile_column, tile_row, tile_data) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(coord.zoom as i64)
        .bind(coord.x as i64)
        .bind(coord.tms_y() as i64)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| ArchiveError::Write {
            what: format!("tile {}", coord),
            message: e.to_string(),
        })?;

        self.tiles_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn finish(&self) -> Result<(), ArchiveError> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Err(ArchiveError::Finished);
        }

        let finish_error = |e: sqlx::Error| ArchiveError::Finish(e.to_string());

        for pragma in [
            "PRAGMA wal_checkpoint(TRUNCATE)",
            "PRAGMA journal_mode = DELETE",
            "PRAGMA optimize",
        ] {
            sqlx::query(pragma)
                .execute(&self.pool)
                .await
                .map_err(finish_error)?;
        }
        self.pool.close().await;

        info!(
            path = %self.path.display(),
            tiles = self.tiles_written(),
            "MBTiles archive finished"
        );
        Ok(())
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Read-only access to an existing MBTiles file.
#[derive(Debug, Clone)]
pub struct MbtilesReader {
    pool: SqlitePool,
}

impl MbtilesReader {
    /// Opens an archive for reading.
    pub async fn open(path: &Path) -> Result<Self, ArchiveError> {
        if !path.is_file() {
            return Err(ArchiveError::Open {
                path: path.to_path_buf(),
                message: "file not found".to_string(),
            });
        }

        let options = SqliteConnectOptions::new().filename(path).read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| ArchiveError::Open {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    /// Returns the data of an XYZ-addressed tile, if stored.
    pub async fn tile(&self, coord: TileCoord) -> Result<Option<Vec<u8>>, ArchiveError> {
        sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT tile_data FROM tiles WHERE zoom_level = ? AND tile_column = ? AND tile_row = ?",
        )
        .bind(coord.zoom as i64)
        .bind(coord.x as i64)
        .bind(coord.tms_y() as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ArchiveError::Read(e.to_string()))
    }

    /// Reads the metadata table.
    pub async fn metadata(&self) -> Result<ArchiveMetadata, ArchiveError> {
        let rows = sqlx::query_as::<_, (String, Option<String>)>("SELECT name, value FROM metadata")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ArchiveError::Read(e.to_string()))?;

        let mut metadata = ArchiveMetadata::new();
        for (name, value) in rows {
            metadata.insert(name, value.unwrap_or_default());
        }
        Ok(metadata)
    }

    /// Number of stored tiles.
    pub async fn tile_count(&self) -> Result<u64, ArchiveError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tiles")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ArchiveError::Read(e.to_string()))?;
        Ok(count.max(0) as u64)
    }

    /// Lists every stored tile in XYZ addressing.
    pub async fn tile_coords(&self) -> Result<Vec<TileCoord>, ArchiveError> {
        let rows = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT zoom_level, tile_column, tile_row FROM tiles \
             ORDER BY zoom_level, tile_column, tile_row",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ArchiveError::Read(e.to_string()))?;

        rows.into_iter()
            .map(|(zoom, x, tms_row)| {
                let zoom = u8::try_from(zoom)
                    .map_err(|_| ArchiveError::Read(format!("bad zoom level {}", zoom)))?;
                let n = tiles_per_side(zoom) as i64;
                let y = n - 1 - tms_row;
                TileCoord::new(zoom, x as u32, y as u32)
                    .map_err(|e| ArchiveError::Read(e.to_string()))
            })
            .collect()
    }

    /// Closes the underlying connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::ZoomRange;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.mbtiles");

        let writer = MbtilesWriter::create(&path).await.unwrap();
        let metadata = ArchiveMetadata::defaults("out", "png", ZoomRange::new(0, 1).unwrap());
        writer.put_metadata(&metadata).await.unwrap();

        let tile = TileCoord::new(1, 0, 0).unwrap();
        writer.put_tile(tile, vec![1, 2, 3]).await.unwrap();
        writer
            .put_tile(TileCoord::new(0, 0, 0).unwrap(), vec![9])
            .await
            .unwrap();
        assert_eq!(writer.tiles_written(), 2);
        writer.finish().await.unwrap();

        let reader = MbtilesReader::open(&path).await.unwrap();
        assert_eq!(reader.tile_count().await.unwrap(), 2);
        assert_eq!(reader.tile(tile).await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(
            reader.tile(TileCoord::new(1, 1, 1).unwrap()).await.unwrap(),
            None
        );
        assert_eq!(reader.metadata().await.unwrap(), metadata);
        reader.close().await;
    }

    #[tokio::test]
    async fn test_rows_are_stored_in_tms_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tms.mbtiles");

        let writer = MbtilesWriter::create(&path).await.unwrap();
        writer
            .put_tile(TileCoord::new(2, 1, 0).unwrap(), vec![7])
            .await
            .unwrap();
        writer.finish().await.unwrap();

        let reader = MbtilesReader::open(&path).await.unwrap();
        let row: i64 = sqlx::query_scalar("SELECT tile_row FROM tiles")
            .fetch_one(&reader.pool)
            .await
            .unwrap();
        assert_eq!(row, 3);
        assert_eq!(
            reader.tile_coords().await.unwrap(),
            vec![TileCoord::new(2, 1, 0).unwrap()]
        );
    }

    #[tokio::test]
    async fn test_finish_leaves_single_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("single.mbtiles");

        let writer = MbtilesWriter::create(&path).await.unwrap();
        writer
            .put_tile(TileCoord::new(0, 0, 0).unwrap(), vec![0; 16])
            .await
            .unwrap();
        writer.finish().await.unwrap();

        assert!(path.is_file());
        assert!(!temp.path().join("single.mbtiles-wal").exists());
    }

    #[tokio::test]
    async fn test_writes_after_finish_are_rejected() {
        let temp = TempDir::new().unwrap();
        let writer = MbtilesWriter::create(&temp.path().join("x.mbtiles"))
            .await
            .unwrap();
        writer.finish().await.unwrap();

        assert!(matches!(
            writer.put_tile(TileCoord::new(0, 0, 0).unwrap(), vec![]).await,
            Err(ArchiveError::Finished)
        ));
        assert!(matches!(writer.finish().await, Err(ArchiveError::Finished)));
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            MbtilesReader::open(&temp.path().join("nope.mbtiles")).await,
            Err(ArchiveError::Open { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_in_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("x.mbtiles");
        assert!(matches!(
            MbtilesWriter::create(&path).await,
            Err(ArchiveError::Open { .. })
        ));
    }
}
