//! Bounded pool of renderer instances.
//!
//! Renderers are expensive to create and not shareable, so the pool hands out
//! exclusive [`RendererLease`]s. A semaphore with `max_size` permits bounds
//! the number of live instances: every lease owns one permit, and a new
//! instance is only created by a task holding a permit while no idle
//! instance is available.
//!
//! # Lifecycle
//!
//! ```text
//! new → prewarm (min_size instances) → acquire/release … → shutdown
//! ```
//!
//! Dropping a lease returns its renderer, so early returns and panics in a
//! task never leak an instance. After [`RendererPool::shutdown`] pending and
//! future acquires fail with [`PoolError::Closed`] and returned instances are
//! destroyed.


use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use crate::renderer::{MapRenderer, RenderError, RendererFactory};

/// Default number of concurrent renderer instances.
pub const DEFAULT_POOL_SIZE: usize = 2;

// =============================================================================
// Configuration and Errors
// =============================================================================

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Instances created eagerly by [`RendererPool::prewarm`]
    pub min_size: usize,
    /// Upper bound on live instances
    pub max_size: usize,
}

impl PoolConfig {
    /// A pool of exactly `size` instances.
    pub fn fixed(size: usize) -> Self {
        Self {
            min_size: size,
            max_size: size,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_POOL_SIZE)
    }
}

/// Errors from the renderer pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The factory failed to create an instance.
    #[error("Failed to create renderer: {0}")]
    Create(#[source] RenderError),

    /// The pool has been shut down.
    #[error("Renderer pool is closed")]
    Closed,

    /// Invalid sizing.
    #[error("Invalid pool size: min {min}, max {max} (need 1 <= max and min <= max)")]
    InvalidSize { min: usize, max: usize },
}

// =============================================================================
// Pool
// =============================================================================

struct PoolInner<F: RendererFactory> {
    factory: F,
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<F::Renderer>>,
    closed: AtomicBool,
    size: AtomicUsize,
    in_use: AtomicUsize,
    peak_in_use: AtomicUsize,
    created: AtomicUsize,
    destroyed: AtomicUsize,
}

impl<F: RendererFactory> PoolInner<F> {
    fn destroy(&self, renderer: F::Renderer) {
        renderer.release();
        self.size.fetch_sub(1, Ordering::AcqRel);
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a renderer from a finished lease.
    fn give_back(&self, renderer: F::Renderer) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
        if self.closed.load(Ordering::Acquire) {
            self.destroy(renderer);
            return;
        }

        let mut idle = self.idle.lock();
        // Re-check under the lock so shutdown's drain cannot miss it.
        if self.closed.load(Ordering::Acquire) {
            drop(idle);
            self.destroy(renderer);
        } else {
            idle.push(renderer);
        }
    }

    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_in_use.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_use.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }
}

/// A bounded pool of renderer instances.
///
/// Cloning yields another handle to the same pool.
pub struct RendererPool<F: RendererFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: RendererFactory> Clone for RendererPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: RendererFactory> RendererPool<F> {
    /// Creates an empty pool.
    pub fn new(config: PoolConfig, factory: F) -> Result<Self, PoolError> {
        if config.max_size == 0 || config.min_size > config.max_size {
            return Err(PoolError::InvalidSize {
                min: config.min_size,
                max: config.max_size,
            });
        }

        Ok(Self {
            inner: Arc::new(PoolInner {
                factory,
                config,
                semaphore: Arc::new(Semaphore::new(config.max_size)),
                idle: Mutex::new(Vec::with_capacity(config.max_size)),
                closed: AtomicBool::new(false),
                size: AtomicUsize::new(0),
                in_use: AtomicUsize::new(0),
                peak_in_use: AtomicUsize::new(0),
                created: AtomicUsize::new(0),
                destroyed: AtomicUsize::new(0),
            }),
        })
    }

    /// Creates instances until `min_size` exist.
    pub async fn prewarm(&self) -> Result<(), PoolError> {
        while self.size() < self.inner.config.min_size {
            let renderer = self.create().await?;
            self.inner.idle.lock().push(renderer);
        }
        debug!(size = self.size(), "Renderer pool prewarmed");
        Ok(())
    }

    async fn create(&self) -> Result<F::Renderer, PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        let renderer = self
            .inner
            .factory
            .create()
            .await
            .map_err(PoolError::Create)?;
        self.inner.size.fetch_add(1, Ordering::AcqRel);
        self.inner.created.fetch_add(1, Ordering::Relaxed);
        Ok(renderer)
    }

    /// Acquires exclusive use of a renderer, waiting while all are busy.
    pub async fn acquire(&self) -> Result<RendererLease<F>, PoolError> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        let idle = self.inner.idle.lock().pop();
        let renderer = match idle {
            Some(renderer) => renderer,
            None => {
                let renderer = self.create().await?;
                debug!(size = self.size(), "Created renderer instance");
                renderer
            }
        };

        let current = self.inner.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.update_peak(current);

        Ok(RendererLease {
            renderer: Some(renderer),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Returns a leased renderer to the pool.
    ///
    /// Equivalent to dropping the lease.
    pub fn release(&self, lease: RendererLease<F>) {
        drop(lease);
    }

    /// Closes the pool and destroys every idle renderer.
    ///
    /// Renderers still leased are destroyed when their lease ends. Calling
    /// this more than once is harmless.
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.semaphore.close();

        let idle: Vec<F::Renderer> = std::mem::take(&mut *self.inner.idle.lock());
        let count = idle.len();
        for renderer in idle {
            self.inner.destroy(renderer);
        }

        info!(
            destroyed = count,
            in_use = self.in_use(),
            created = self.created(),
            "Renderer pool shut down"
        );
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Pool sizing.
    pub fn config(&self) -> PoolConfig {
        self.inner.config
    }

    /// Live instances (idle plus leased).
    pub fn size(&self) -> usize {
        self.inner.size.load(Ordering::Acquire)
    }

    /// Idle instances.
    pub fn idle(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Leased instances.
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    /// Highest number of simultaneously leased instances observed.
    pub fn peak_in_use(&self) -> usize {
        self.inner.peak_in_use.load(Ordering::Relaxed)
    }

    /// Instances created over the pool's lifetime.
    pub fn created(&self) -> usize {
        self.inner.created.load(Ordering::Relaxed)
    }

    /// Instances destroyed over the pool's lifetime.
    pub fn destroyed(&self) -> usize {
        self.inner.destroyed.load(Ordering::Relaxed)
    }
}

impl<F: RendererFactory> std::fmt::Debug for RendererPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererPool")
            .field("size", &self.size())
            .field("in_use", &self.in_use())
            .field("max_size", &self.inner.config.max_size)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// Lease
// =============================================================================

/// Exclusive use of one pooled renderer.
///
/// Dereferences to the renderer. The renderer goes back to the pool when the
/// lease is dropped.
pub struct RendererLease<F: RendererFactory> {
    renderer: Option<F::Renderer>,
    pool: Arc<PoolInner<F>>,
    _permit: OwnedSemaphorePermit,
}

impl<F: RendererFactory> Deref for RendererLease<F> {
    type Target = F::Renderer;

    fn deref(&self) -> &Self::Target {
        // Only `drop` takes the renderer out.
        self.renderer
            .as_ref()
            .unwrap_or_else(|| unreachable!("lease used after drop"))
    }
}

impl<F: RendererFactory> DerefMut for RendererLease<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.renderer
            .as_mut()
            .unwrap_or_else(|| unreachable!("lease used after drop"))
    }
}

impl<F: RendererFactory> Drop for RendererLease<F> {
    fn drop(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            self.pool.give_back(renderer);
        }
    }
}

impl<F: RendererFactory> std::fmt::Debug for RendererLease<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererLease").finish_non_exhaustive()
    }
}
