use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use brotview_core::ViewState;

use crate::buffer::RenderBuffer;
use crate::callback::{CallbackContext, CallbackThread};
use crate::error::RenderError;
use crate::tile::{partition, Tile, DEFAULT_TILE_SIZE};

/// How long [`FractalRenderer::shutdown`] waits for in-flight jobs before
/// giving up on them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(800);

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cancellation flag and tile progress of one render job.
///
/// Shared by every tile task of the job. Tiles poll the flag once per row.
#[derive(Debug, Default)]
pub(crate) struct CancelToken {
    cancelled: AtomicBool,
    progress_done: AtomicUsize,
    progress_total: AtomicUsize,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn reset_progress(&self, total: usize) {
        self.progress_total.store(total, Ordering::Relaxed);
        self.progress_done.store(0, Ordering::Relaxed);
    }

    fn inc_progress(&self) {
        self.progress_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Completed tiles as `(done, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.progress_done.load(Ordering::Relaxed),
            self.progress_total.load(Ordering::Relaxed),
        )
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Identifies one `render` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A fully assembled frame.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub job: JobId,
    pub buffer: RenderBuffer,
    pub elapsed: Duration,
    pub tiles_rendered: usize,
    /// Tiles whose evaluation failed; their pixels keep the placeholder color.
    pub tiles_failed: usize,
}

/// What `on_complete` receives: the image, or why there is none.
pub type RenderOutcome = Result<RenderedImage, RenderError>;

type CompleteFn = Box<dyn FnOnce(RenderOutcome) + Send + 'static>;
type CancelFn = Box<dyn FnOnce() + Send + 'static>;

struct Callbacks {
    on_complete: CompleteFn,
    on_cancel: CancelFn,
}

// ---------------------------------------------------------------------------
// Render job
// ---------------------------------------------------------------------------

/// One in-flight render.
///
/// The callbacks sit behind a lock and are taken exactly once, either by
/// cancellation or by the coordinator when the last tile is in. Whoever takes
/// them decides the outcome.
struct RenderJob {
    id: JobId,
    token: Arc<CancelToken>,
    callbacks: Mutex<Option<Callbacks>>,
}

impl RenderJob {
    fn new(id: JobId, on_complete: CompleteFn, on_cancel: CancelFn) -> Self {
        Self {
            id,
            token: Arc::new(CancelToken::new()),
            callbacks: Mutex::new(Some(Callbacks {
                on_complete,
                on_cancel,
            })),
        }
    }

    // The lock only guards taking the callbacks. Posting happens after the
    // guard is dropped: a context may run the task inline, and that task may
    // start another render which cancels this job.

    /// Raise the flag and post `on_cancel`, unless an outcome was already
    /// delivered. Returns `true` if this call delivered it.
    fn cancel(&self, ctx: &dyn CallbackContext) -> bool {
        let taken = {
            let mut slot = lock(&self.callbacks);
            self.token.cancel();
            slot.take()
        };
        match taken {
            Some(cb) => {
                ctx.post(cb.on_cancel);
                true
            }
            None => false,
        }
    }

    /// Deliver the final outcome once every tile has reported.
    fn finish(&self, ctx: &dyn CallbackContext, image: RenderedImage) {
        let outcome: Option<crate::callback::Task> = {
            let mut slot = lock(&self.callbacks);
            slot.take().map(|cb| {
                if self.token.is_cancelled() {
                    cb.on_cancel
                } else {
                    let on_complete = cb.on_complete;
                    Box::new(move || on_complete(Ok(image))) as crate::callback::Task
                }
            })
        };
        if let Some(task) = outcome {
            ctx.post(task);
        }
    }

    /// Deliver an error through `on_complete`.
    fn fail(&self, ctx: &dyn CallbackContext, err: RenderError) {
        let taken = lock(&self.callbacks).take();
        if let Some(cb) = taken {
            let on_complete = cb.on_complete;
            ctx.post(Box::new(move || on_complete(Err(err))));
        }
    }
}

// ---------------------------------------------------------------------------
// Per-tile rendering
// ---------------------------------------------------------------------------

/// What a tile task reports back to its job's coordinator.
#[derive(Debug)]
enum TileOutcome {
    Rendered { tile: Tile, pixels: Vec<u8> },
    Failed { tile: Tile },
    Skipped,
}

/// Evaluate every pixel of a tile into RGBA bytes.
///
/// Returns `None` if the job is cancelled part-way (checked once per row).
fn render_tile(
    state: &ViewState,
    tile: &Tile,
    width: u32,
    height: u32,
    token: &CancelToken,
) -> Option<Vec<u8>> {
    let max_iter = state.max_iterations();
    let mut pixels = Vec::with_capacity(tile.pixel_count() * 4);
    for py in tile.y..tile.y + tile.height {
        if token.is_cancelled() {
            return None;
        }
        for px in tile.x..tile.x + tile.width {
            let point = state
                .viewport
                .pixel_to_complex(px as f64, py as f64, width, height);
            let n = state.escape.iterate_point(point, max_iter);
            let [r, g, b] = state.color.color_for(n, max_iter);
            pixels.extend_from_slice(&[r, g, b, 255]);
        }
    }
    Some(pixels)
}

/// Run a tile evaluation, turning a panic into [`TileOutcome::Failed`].
fn guarded_tile<F>(tile: Tile, token: &CancelToken, eval: F) -> TileOutcome
where
    F: FnOnce() -> Option<Vec<u8>>,
{
    if token.is_cancelled() {
        return TileOutcome::Skipped;
    }
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(eval)) {
        Ok(Some(pixels)) => {
            token.inc_progress();
            TileOutcome::Rendered { tile, pixels }
        }
        Ok(None) => TileOutcome::Skipped,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            warn!(x = tile.x, y = tile.y, "Tile evaluation failed: {msg}");
            TileOutcome::Failed { tile }
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Construction options for [`FractalRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererConfig {
    /// Tile edge in pixels. `0` selects [`DEFAULT_TILE_SIZE`].
    pub tile_size: u32,
    /// Worker threads. `0` selects the available hardware parallelism.
    pub worker_threads: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            worker_threads: 0,
        }
    }
}

/// State shared between the renderer and its coordinator threads.
struct Shared {
    callbacks: Arc<dyn CallbackContext>,
    /// The one job whose result may still be committed.
    current: Mutex<Option<Arc<RenderJob>>>,
    accepting: AtomicBool,
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl Shared {
    /// Bookkeeping after a job's coordinator has delivered its outcome.
    fn release(&self, job: &Arc<RenderJob>) {
        {
            let mut current = lock(&self.current);
            if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, job)) {
                *current = None;
            }
        }
        let mut n = lock(&self.in_flight);
        *n = n.saturating_sub(1);
        if *n == 0 {
            self.idle.notify_all();
        }
    }
}

/// Tiled, multithreaded render engine.
///
/// Holds at most one active job. A new [`render`](Self::render) supersedes
/// the previous one: the old job is cancelled and receives `on_cancel`, and
/// its stale result is never delivered. Callbacks always run on the
/// renderer's [`CallbackContext`].
pub struct FractalRenderer {
    shared: Arc<Shared>,
    pool: Mutex<Option<Arc<rayon::ThreadPool>>>,
    tile_size: u32,
    next_id: AtomicU64,
}

impl FractalRenderer {
    pub fn new(callbacks: Arc<dyn CallbackContext>) -> crate::Result<Self> {
        Self::with_config(callbacks, RendererConfig::default())
    }

    /// A renderer that delivers callbacks on its own [`CallbackThread`].
    pub fn with_callback_thread(config: RendererConfig) -> crate::Result<Self> {
        let ctx = CallbackThread::spawn().map_err(|e| RenderError::Thread(e.to_string()))?;
        Self::with_config(Arc::new(ctx), config)
    }

    pub fn with_config(
        callbacks: Arc<dyn CallbackContext>,
        config: RendererConfig,
    ) -> crate::Result<Self> {
        let threads = match config.worker_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        };
        let tile_size = match config.tile_size {
            0 => DEFAULT_TILE_SIZE,
            n => n,
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("render-worker-{i}"))
            .build()
            .map_err(|e| RenderError::PoolBuild(e.to_string()))?;
        info!(threads, tile_size, "Render engine started");

        Ok(Self {
            shared: Arc::new(Shared {
                callbacks,
                current: Mutex::new(None),
                accepting: AtomicBool::new(true),
                in_flight: Mutex::new(0),
                idle: Condvar::new(),
            }),
            pool: Mutex::new(Some(Arc::new(pool))),
            tile_size,
            next_id: AtomicU64::new(0),
        })
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Render `state` into a `width × height` image.
    ///
    /// Exactly one of the callbacks runs for every call, on the callback
    /// context. Zero dimensions and a shut-down renderer report an error via
    /// `on_complete` without touching the worker pool or the active job.
    pub fn render<C, X>(
        &self,
        state: &ViewState,
        width: u32,
        height: u32,
        on_complete: C,
        on_cancel: X,
    ) -> JobId
    where
        C: FnOnce(RenderOutcome) + Send + 'static,
        X: FnOnce() + Send + 'static,
    {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let ctx = &*self.shared.callbacks;

        let pool = if !self.shared.accepting.load(Ordering::SeqCst) {
            Err(RenderError::ShutDown)
        } else if width == 0 || height == 0 {
            Err(RenderError::InvalidDimensions { width, height })
        } else {
            lock(&self.pool).clone().ok_or(RenderError::ShutDown)
        };
        let pool = match pool {
            Ok(pool) => pool,
            Err(err) => {
                debug!(job = %id, "Render rejected: {err}");
                ctx.post(Box::new(move || on_complete(Err(err))));
                return id;
            }
        };

        let tiles = partition(width, height, self.tile_size);
        let job = Arc::new(RenderJob::new(id, Box::new(on_complete), Box::new(on_cancel)));
        job.token.reset_progress(tiles.len());
        *lock(&self.shared.in_flight) += 1;

        // Swap in the new job and cancel the displaced one before any tile of
        // the new job exists, so its on_cancel is queued first.
        let displaced = lock(&self.shared.current).replace(Arc::clone(&job));
        if let Some(old) = displaced {
            if old.cancel(ctx) {
                debug!(old = %old.id, new = %id, "Superseded render job");
            }
        }
        // Lost a race with shutdown.
        if !self.shared.accepting.load(Ordering::SeqCst) {
            job.cancel(ctx);
        }

        let (tx, rx) = mpsc::channel::<TileOutcome>();
        let coordinator = {
            let shared = Arc::clone(&self.shared);
            let job = Arc::clone(&job);
            let tile_count = tiles.len();
            std::thread::Builder::new()
                .name(format!("render-job-{}", id.0))
                .spawn(move || coordinate(&shared, &job, rx, width, height, tile_count))
        };
        if let Err(e) = coordinator {
            error!(job = %id, "Failed to spawn render coordinator: {e}");
            job.fail(ctx, RenderError::Thread(e.to_string()));
            self.shared.release(&job);
            return id;
        }

        debug!(
            job = %id,
            tile_count = tiles.len(),
            width,
            height,
            max_iterations = state.max_iterations(),
            "Starting tiled render"
        );

        let snapshot = Arc::new(state.clone());
        for tile in tiles {
            let tx = tx.clone();
            let token = Arc::clone(&job.token);
            let snapshot = Arc::clone(&snapshot);
            pool.spawn(move || {
                let outcome = guarded_tile(tile, &token, || {
                    render_tile(&snapshot, &tile, width, height, &token)
                });
                let _ = tx.send(outcome);
            });
        }
        id
    }

    /// Render and block until the outcome arrives.
    ///
    /// Must not be called from the callback context itself, which would wait
    /// on its own queue.
    pub fn render_and_wait(&self, state: &ViewState, width: u32, height: u32) -> RenderOutcome {
        let (tx, rx) = mpsc::channel::<RenderOutcome>();
        let cancel_tx = tx.clone();
        self.render(
            state,
            width,
            height,
            move |outcome| {
                let _ = tx.send(outcome);
            },
            move || {
                let _ = cancel_tx.send(Err(RenderError::Cancelled));
            },
        );
        rx.recv().unwrap_or(Err(RenderError::Cancelled))
    }

    /// Cancel the active job, if any, without starting another.
    pub fn cancel(&self) {
        let job = lock(&self.shared.current).take();
        if let Some(job) = job {
            if job.cancel(&*self.shared.callbacks) {
                info!(job = %job.id, "Render cancelled");
            }
        }
    }

    /// `true` while a job may still deliver `on_complete`.
    pub fn is_rendering(&self) -> bool {
        lock(&self.shared.current).is_some()
    }

    /// Tile progress of the active job as `(done, total)`.
    pub fn progress(&self) -> (usize, usize) {
        lock(&self.shared.current)
            .as_ref()
            .map(|job| job.token.progress())
            .unwrap_or((0, 0))
    }

    /// Stop accepting work and wind down.
    ///
    /// Cancels the active job, waits up to [`SHUTDOWN_GRACE`] for in-flight
    /// jobs to report, then releases the worker pool regardless. Tasks still
    /// running stop at their next row check. Calling it again is a no-op.
    pub fn shutdown(&self) {
        if !self.shared.accepting.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down render engine");
        self.cancel();

        let in_flight = lock(&self.shared.in_flight);
        let (remaining, wait) = self
            .shared
            .idle
            .wait_timeout_while(in_flight, SHUTDOWN_GRACE, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
        if wait.timed_out() {
            warn!(
                jobs = *remaining,
                grace_ms = SHUTDOWN_GRACE.as_millis(),
                "Render jobs still running after grace period, forcing shutdown"
            );
        }
        drop(remaining);

        lock(&self.pool).take();
        debug!("Worker pool released");
    }
}

impl Drop for FractalRenderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Collect every tile of a job, assemble the frame, and deliver the outcome.
///
/// The channel closes once every tile task has reported or been dropped, so
/// this never waits on a task that no longer exists.
fn coordinate(
    shared: &Shared,
    job: &Arc<RenderJob>,
    rx: mpsc::Receiver<TileOutcome>,
    width: u32,
    height: u32,
    tile_count: usize,
) {
    let start = Instant::now();
    let mut buffer = RenderBuffer::new(width, height);
    let (mut rendered, mut failed, mut skipped) = (0usize, 0usize, 0usize);

    for outcome in rx {
        match outcome {
            TileOutcome::Rendered { tile, pixels } => {
                buffer.blit_tile(&tile, &pixels);
                rendered += 1;
            }
            TileOutcome::Failed { .. } => failed += 1,
            TileOutcome::Skipped => skipped += 1,
        }
    }

    let elapsed = start.elapsed();
    let cancelled = job.token.is_cancelled();
    info!(
        job = %job.id,
        elapsed_ms = elapsed.as_millis(),
        tile_count,
        tiles_rendered = rendered,
        tiles_failed = failed,
        tiles_skipped = skipped,
        cancelled,
        "Render finished"
    );

    job.finish(
        &*shared.callbacks,
        RenderedImage {
            job: job.id,
            buffer,
            elapsed,
            tiles_rendered: rendered,
            tiles_failed: failed,
        },
    );
    shared.release(job);
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brotview_core::{ColorMapper, EscapeFunction, Viewport};

    /// Runs every task immediately on the posting thread.
    struct Inline;

    impl CallbackContext for Inline {
        fn post(&self, task: crate::callback::Task) {
            task();
        }
    }

    fn grayscale_state() -> ViewState {
        ViewState::new(
            Viewport::default_mandelbrot(),
            64,
            EscapeFunction::Mandelbrot,
            ColorMapper::Grayscale,
        )
        .unwrap()
    }

    #[test]
    fn tile_pixels_match_direct_evaluation() {
        let state = grayscale_state();
        let tile = Tile {
            x: 8,
            y: 4,
            width: 5,
            height: 3,
        };
        let token = CancelToken::new();
        let pixels = render_tile(&state, &tile, 40, 30, &token).unwrap();
        assert_eq!(pixels.len(), tile.pixel_count() * 4);

        // Second row, third column of the tile.
        let (px, py) = (tile.x + 2, tile.y + 1);
        let point = state.viewport.pixel_to_complex(px as f64, py as f64, 40, 30);
        let n = state.escape.iterate_point(point, 64);
        let [r, g, b] = state.color.color_for(n, 64);
        let i = (tile.width as usize + 2) * 4;
        assert_eq!(&pixels[i..i + 4], &[r, g, b, 255]);
    }

    #[test]
    fn cancelled_token_stops_tile() {
        let token = CancelToken::new();
        token.cancel();
        let tile = Tile {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
        };
        assert!(render_tile(&grayscale_state(), &tile, 4, 4, &token).is_none());
        assert!(matches!(
            guarded_tile(tile, &token, || unreachable!()),
            TileOutcome::Skipped
        ));
    }

    #[test]
    fn panicking_tile_is_reported_as_failed() {
        let token = CancelToken::new();
        let tile = Tile {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        };
        let outcome = guarded_tile(tile, &token, || panic!("bad pixel"));
        assert!(matches!(outcome, TileOutcome::Failed { tile: t } if t == tile));
        assert_eq!(token.progress().0, 0);
    }

    #[test]
    fn successful_tile_counts_progress() {
        let token = CancelToken::new();
        token.reset_progress(3);
        let tile = Tile {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        };
        let outcome = guarded_tile(tile, &token, || Some(vec![1, 2, 3, 255]));
        assert!(matches!(outcome, TileOutcome::Rendered { .. }));
        assert_eq!(token.progress(), (1, 3));
    }

    #[test]
    fn failed_tile_keeps_placeholder_pixels() {
        let shared = Shared {
            callbacks: Arc::new(Inline),
            current: Mutex::new(None),
            accepting: AtomicBool::new(true),
            in_flight: Mutex::new(1),
            idle: Condvar::new(),
        };
        let (out_tx, out_rx) = mpsc::channel();
        let job = Arc::new(RenderJob::new(
            JobId(7),
            Box::new(move |outcome: RenderOutcome| {
                let _ = out_tx.send(outcome);
            }),
            Box::new(|| {}),
        ));

        let tiles = partition(4, 2, 2);
        let token = CancelToken::new();
        let (tx, rx) = mpsc::channel();
        tx.send(TileOutcome::Rendered {
            tile: tiles[0],
            pixels: [9, 9, 9, 255].repeat(4),
        })
        .unwrap();
        tx.send(guarded_tile(tiles[1], &token, || panic!("boom")))
            .unwrap();
        drop(tx);

        coordinate(&shared, &job, rx, 4, 2, tiles.len());
        let image = out_rx.recv().unwrap().unwrap();
        assert_eq!((image.tiles_rendered, image.tiles_failed), (1, 1));
        assert_eq!(image.buffer.pixel(1, 1), [9, 9, 9, 255]);
        assert_eq!(image.buffer.pixel(2, 0), crate::buffer::PLACEHOLDER_COLOR);
        assert_eq!(image.buffer.pixel(3, 1), crate::buffer::PLACEHOLDER_COLOR);
        assert_eq!(*lock(&shared.in_flight), 0);
    }

    #[test]
    fn job_callbacks_fire_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (h1, h2) = (Arc::clone(&hits), Arc::clone(&hits));
        let job = RenderJob::new(
            JobId(1),
            Box::new(move |_: RenderOutcome| {
                h1.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(move || {
                h2.fetch_add(100, Ordering::SeqCst);
            }),
        );
        assert!(job.cancel(&Inline));
        assert!(!job.cancel(&Inline));
        job.finish(
            &Inline,
            RenderedImage {
                job: JobId(1),
                buffer: RenderBuffer::new(1, 1),
                elapsed: Duration::ZERO,
                tiles_rendered: 1,
                tiles_failed: 0,
            },
        );
        assert_eq!(hits.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn inline_callback_may_cancel_its_own_job() {
        let job = Arc::new(RenderJob::new(JobId(3), Box::new(|_: RenderOutcome| {}), Box::new(|| {})));
        let cancelled_again = Arc::new(AtomicBool::new(true));
        let (inner, flag) = (Arc::clone(&job), Arc::clone(&cancelled_again));
        // Replace the completion with one that re-enters the job, as a
        // superseding render from inside on_complete would.
        lock(&job.callbacks).as_mut().unwrap().on_complete =
            Box::new(move |_: RenderOutcome| {
                flag.store(inner.cancel(&Inline), Ordering::SeqCst);
            });

        job.finish(
            &Inline,
            RenderedImage {
                job: JobId(3),
                buffer: RenderBuffer::new(1, 1),
                elapsed: Duration::ZERO,
                tiles_rendered: 1,
                tiles_failed: 0,
            },
        );
        assert!(!cancelled_again.load(Ordering::SeqCst));
        assert!(job.token.is_cancelled());
    }
}
