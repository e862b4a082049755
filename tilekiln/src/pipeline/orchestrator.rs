//! The generation run: plan, render concurrently, store, finish and move.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::PipelineError;
use super::plan::GenerationPlan;
use super::request::{
    FailedTile, GenerationRequest, GenerationResult, PipelineConfig, TileFailurePolicy,
};
use super::stats::ProgressTracker;
use crate::archive::{ArchiveMetadata, MbtilesWriter, TileArchive};
use crate::coord::TileCoord;
use crate::pool::{PoolConfig, RendererPool};
use crate::render::{TileError, TileRenderer};
use crate::renderer::RendererFactory;
use crate::style::StyleDocument;

/// How a single tile task ended.
enum TileOutcome {
    Written,
    Failed(TileError),
    Fatal(PipelineError),
    Cancelled,
}

/// State shared by every tile task of one run.
struct TileTask<F: RendererFactory, A: TileArchive> {
    style: StyleDocument,
    renderer: TileRenderer,
    pool: RendererPool<F>,
    archive: Arc<A>,
    stats: Arc<ProgressTracker>,
    policy: TileFailurePolicy,
    cancel: CancellationToken,
}

impl<F: RendererFactory, A: TileArchive> TileTask<F, A> {
    async fn run(&self, coord: TileCoord) -> TileOutcome {
        let mut lease = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => return TileOutcome::Cancelled,

            lease = self.pool.acquire() => match lease {
                Ok(lease) => lease,
                Err(e) => return TileOutcome::Fatal(e.into()),
            },
        };

        let rendered = self
            .renderer
            .render_tile(&mut *lease, &self.style, coord)
            .await;
        drop(lease);

        match rendered {
            Ok(tile) => {
                let bytes = tile.len() as u64;
                match self.archive.put_tile(coord, tile.data).await {
                    Ok(()) => {
                        self.stats.record_written(bytes);
                        TileOutcome::Written
                    }
                    Err(e) => {
                        self.cancel.cancel();
                        TileOutcome::Fatal(e.into())
                    }
                }
            }
            Err(e) => {
                warn!(tile = %coord, error = %e, "Tile failed");
                self.stats.record_failed();
                if self.policy == TileFailurePolicy::Abort {
                    self.cancel.cancel();
                }
                TileOutcome::Failed(e)
            }
        }
    }
}

/// Collected outcomes of all tile tasks.
#[derive(Default)]
struct Settlement {
    failed: Vec<FailedTile>,
    fatal: Option<PipelineError>,
}

impl Settlement {
    fn settle(
        &mut self,
        joined: Result<TileOutcome, JoinError>,
        policy: TileFailurePolicy,
        cancel: &CancellationToken,
    ) {
        match joined {
            Ok(TileOutcome::Written) | Ok(TileOutcome::Cancelled) => {}
            Ok(TileOutcome::Failed(e)) => match policy {
                TileFailurePolicy::Skip => self.failed.push(FailedTile {
                    tile: e.coord(),
                    error: e.to_string(),
                }),
                TileFailurePolicy::Abort => self.fail(PipelineError::TileFailed(e), cancel),
            },
            Ok(TileOutcome::Fatal(e)) => self.fail(e, cancel),
            Err(e) => self.fail(PipelineError::TaskPanicked(e.to_string()), cancel),
        }
    }

    /// Keeps the first fatal error and stops dispatching.
    fn fail(&mut self, err: PipelineError, cancel: &CancellationToken) {
        cancel.cancel();
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
    }
}

/// Runs tile set generations.
///
/// One orchestrator can run any number of requests; each run gets its own
/// renderer pool and archive. Runs that overlap in time need distinct temp
/// directories, since a successful run deletes its temp directory.
#[derive(Debug, Clone, Default)]
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    shutdown: CancellationToken,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses `token` to cancel runs from outside, e.g. on Ctrl-C.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generates an MBTiles archive for `request`.
    pub async fn generate<F: RendererFactory>(
        &self,
        request: &GenerationRequest,
        factory: F,
    ) -> Result<GenerationResult, PipelineError> {
        self.generate_with_archive::<F, MbtilesWriter>(request, factory)
            .await
    }

    /// Generates a tile set into archive type `A`.
    ///
    /// Tiles are dispatched zoom by zoom, row-major within a zoom. At most
    /// `concurrency` tiles render at once and at most `in_flight_limit`
    /// tasks exist at once. The archive is finished only after every task
    /// has settled.
    pub async fn generate_with_archive<F, A>(
        &self,
        request: &GenerationRequest,
        factory: F,
    ) -> Result<GenerationResult, PipelineError>
    where
        F: RendererFactory,
        A: TileArchive,
    {
        self.config.validate()?;
        request.validate()?;

        let plan = GenerationPlan::new(request.bounds, request.zooms)?;
        plan.log();

        tokio::fs::create_dir_all(&request.temp_dir)
            .await
            .map_err(|source| PipelineError::Directory {
                path: request.temp_dir.clone(),
                source,
            })?;

        let temp_path = request.temp_path();
        remove_stale(&temp_path).await?;
        let archive = Arc::new(A::create(&temp_path).await?);
        debug!(path = %temp_path.display(), "Archive created");

        let mut metadata = ArchiveMetadata::defaults(
            &request.output_name,
            request.format.as_str(),
            request.zooms,
        );
        metadata.merge_file_or_warn(&request.source_dir);
        if let Err(e) = archive.put_metadata(&metadata).await {
            abandon(archive.as_ref(), &temp_path).await;
            return Err(e.into());
        }

        let pool = RendererPool::new(PoolConfig::fixed(self.config.concurrency), factory)?;
        if let Err(e) = pool.prewarm().await {
            pool.shutdown().await;
            abandon(archive.as_ref(), &temp_path).await;
            return Err(e.into());
        }

        let stats = Arc::new(ProgressTracker::new(
            plan.total_tiles(),
            self.config.progress_interval,
        ));
        let settlement = self
            .render_all(&plan, request, pool.clone(), Arc::clone(&archive), Arc::clone(&stats))
            .await;
        info!(
            peak_in_use = pool.peak_in_use(),
            created = pool.created(),
            "Rendering finished"
        );
        pool.shutdown().await;

        if let Some(err) = settlement.fatal {
            error!(stage = err.stage(), error = %err, "Generation failed");
            abandon(archive.as_ref(), &temp_path).await;
            return Err(err);
        }
        if self.shutdown.is_cancelled() {
            warn!(written = stats.written(), "Generation cancelled");
            abandon(archive.as_ref(), &temp_path).await;
            return Err(PipelineError::Cancelled);
        }

        archive.finish().await?;
        drop(archive);

        let file_size = file_size(&temp_path).await?;
        let run_stats = stats.snapshot();
        let mut result = GenerationResult {
            error_message: None,
            file_location: temp_path.clone(),
            file_size,
            number_of_tiles: run_stats.written,
            failed_tiles: settlement.failed,
            stats: run_stats,
        };

        let output_path = request.output_path();
        match move_archive(&temp_path, &request.output_dir, &output_path).await {
            Ok(()) => {
                cleanup_temp_dir(&request.temp_dir).await;
                if !tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
                    error!(path = %output_path.display(), "Archive missing after move");
                    return Err(PipelineError::Directory {
                        path: output_path,
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "archive missing after temp directory cleanup",
                        ),
                    });
                }
                result.file_location = output_path;
            }
            Err(e) => {
                let message = format!(
                    "Failed to move archive to {}: {}",
                    output_path.display(),
                    e
                );
                error!(
                    temp = %temp_path.display(),
                    error = %e,
                    "Archive left in temp directory"
                );
                result.error_message = Some(message);
            }
        }

        info!(
            path = %result.file_location.display(),
            tiles = result.number_of_tiles,
            failed = result.failed_tiles.len(),
            bytes = result.file_size,
            elapsed_ms = result.stats.elapsed.as_millis() as u64,
            "Tile set generated"
        );
        Ok(result)
    }

    async fn render_all<F, A>(
        &self,
        plan: &GenerationPlan,
        request: &GenerationRequest,
        pool: RendererPool<F>,
        archive: Arc<A>,
        stats: Arc<ProgressTracker>,
    ) -> Settlement
    where
        F: RendererFactory,
        A: TileArchive,
    {
        let policy = self.config.failure_policy;
        let cancel = self.shutdown.child_token();
        let task = Arc::new(TileTask {
            style: request.style.clone(),
            renderer: TileRenderer::new(request.pixel_ratio, request.format),
            pool,
            archive,
            stats,
            policy,
            cancel: cancel.clone(),
        });

        let dispatch = Arc::new(Semaphore::new(self.config.in_flight_limit()));
        let mut tasks = JoinSet::new();
        let mut settlement = Settlement::default();

        'dispatch: for range in &plan.ranges {
            debug!(zoom = range.zoom, tiles = range.count(), "Dispatching zoom level");
            for coord in range.tiles() {
                while let Some(joined) = tasks.try_join_next() {
                    settlement.settle(joined, policy, &cancel);
                }

                let permit = tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break 'dispatch,

                    permit = Arc::clone(&dispatch).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break 'dispatch,
                    },
                };

                let task = Arc::clone(&task);
                tasks.spawn(async move {
                    let _permit = permit;
                    task.run(coord).await
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            settlement.settle(joined, policy, &cancel);
        }
        settlement
    }
}

/// Removes an archive left by an earlier run at the same temp path.
async fn remove_stale(path: &Path) -> Result<(), PipelineError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale archive");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PipelineError::Directory {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Closes an archive after a failed run, leaving it in the temp directory.
async fn abandon<A: TileArchive>(archive: &A, path: &Path) {
    if let Err(e) = archive.finish().await {
        warn!(error = %e, "Failed to close abandoned archive");
    }
    warn!(path = %path.display(), "Partial archive left in temp directory");
}

async fn file_size(path: &Path) -> Result<u64, PipelineError> {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .map_err(|source| PipelineError::Directory {
            path: path.to_path_buf(),
            source,
        })
}

/// Moves the finished archive, copying when a rename crosses filesystems.
async fn move_archive(from: &Path, output_dir: &Path, to: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(output_dir).await?;
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(error = %e, "Rename crosses filesystems, copying archive");
            copy_then_rename(from, to).await
        }
        Err(e) => Err(e),
    }
}

/// Copies `from` next to `to`, renames the copy into place and removes
/// `from`. `to` never holds a partial file.
async fn copy_then_rename(from: &Path, to: &Path) -> std::io::Result<()> {
    let partial = partial_path(to);
    let copied = async {
        tokio::fs::copy(from, &partial).await?;
        tokio::fs::rename(&partial, to).await
    }
    .await;
    if let Err(e) = copied {
        if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial copy");
            }
        }
        return Err(e);
    }
    tokio::fs::remove_file(from).await
}

fn partial_path(to: &Path) -> PathBuf {
    let mut name = to.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    to.with_file_name(name)
}

#[cfg(unix)]
const EXDEV: i32 = 18;
#[cfg(windows)]
const EXDEV: i32 = 17; // ERROR_NOT_SAME_DEVICE

fn is_cross_device(e: &std::io::Error) -> bool {
    #[cfg(any(unix, windows))]
    {
        e.raw_os_error() == Some(EXDEV)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = e;
        false
    }
}

/// Removes the temp directory and everything left in it.
async fn cleanup_temp_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(dir = %dir.display(), "Removed temp directory"),
        Err(e) => debug!(
            dir = %dir.display(),
            error = %e,
            "Temp directory not removed"
        ),
    }
}
