use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use brotview_core::{ColorMapper, EscapeFunction, ScreenRect, ViewState, Viewport};
use brotview_render::{
    CallbackContext, FractalRenderer, RenderError, RenderOutcome, RendererConfig, Task,
    SHUTDOWN_GRACE,
};

const WAIT: Duration = Duration::from_secs(30);

fn renderer(tile_size: u32, worker_threads: usize) -> FractalRenderer {
    FractalRenderer::with_callback_thread(RendererConfig {
        tile_size,
        worker_threads,
    })
    .expect("renderer should start")
}

/// A view deep inside the main cardioid with a huge budget: every pixel runs
/// the full iteration count, so the job stays busy for a long time.
fn slow_state() -> ViewState {
    ViewState::new(
        Viewport::new(-0.3, -0.1, -0.1, 0.1).unwrap(),
        200_000,
        EscapeFunction::Mandelbrot,
        ColorMapper::Grayscale,
    )
    .unwrap()
}

#[derive(Debug, PartialEq)]
enum Event {
    Complete(u64),
    Error(String),
    Cancel(u64),
}

/// Issue a render whose callbacks append to a shared log and ping `tx`.
fn tracked(
    r: &FractalRenderer,
    state: &ViewState,
    width: u32,
    height: u32,
    tag: u64,
    log: &Arc<Mutex<Vec<Event>>>,
    tx: &mpsc::Sender<()>,
) {
    let (log_c, tx_c) = (Arc::clone(log), tx.clone());
    let (log_x, tx_x) = (Arc::clone(log), tx.clone());
    r.render(
        state,
        width,
        height,
        move |outcome| {
            let ev = match outcome {
                Ok(_) => Event::Complete(tag),
                Err(e) => Event::Error(e.to_string()),
            };
            log_c.lock().unwrap().push(ev);
            let _ = tx_c.send(());
        },
        move || {
            log_x.lock().unwrap().push(Event::Cancel(tag));
            let _ = tx_x.send(());
        },
    );
}

#[test]
fn completed_frame_matches_direct_evaluation() {
    let r = renderer(16, 0);
    let state = ViewState::default();
    let image = r.render_and_wait(&state, 96, 64).expect("render should complete");

    assert_eq!((image.buffer.width, image.buffer.height), (96, 64));
    assert_eq!(image.tiles_rendered, 6 * 4);
    assert_eq!(image.tiles_failed, 0);

    let max = state.max_iterations();
    for y in 0..64 {
        for x in 0..96 {
            let p = state.viewport.pixel_to_complex(x as f64, y as f64, 96, 64);
            let [r, g, b] = state.color.color_for(state.escape.iterate_point(p, max), max);
            assert_eq!(image.buffer.pixel(x, y), [r, g, b, 255], "pixel ({x}, {y})");
        }
    }
}

#[test]
fn output_is_independent_of_tiling_and_thread_count() {
    let state = ViewState::new(
        Viewport::default_julia(),
        150,
        EscapeFunction::default_julia(),
        ColorMapper::nonlinear(),
    )
    .unwrap();
    let a = renderer(7, 1).render_and_wait(&state, 73, 41).unwrap();
    let b = renderer(64, 4).render_and_wait(&state, 73, 41).unwrap();
    assert_eq!(a.buffer, b.buffer);
}

#[test]
fn second_render_supersedes_first() {
    let r = renderer(32, 0);
    let log = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();

    tracked(&r, &slow_state(), 512, 512, 1, &log, &tx);
    tracked(&r, &ViewState::default(), 40, 30, 2, &log, &tx);

    rx.recv_timeout(WAIT).unwrap();
    rx.recv_timeout(WAIT).unwrap();
    // Nothing else may arrive for either job.
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());

    assert_eq!(
        *log.lock().unwrap(),
        vec![Event::Cancel(1), Event::Complete(2)]
    );
}

#[test]
fn rapid_requests_deliver_one_callback_each() {
    let r = renderer(16, 0);
    let log = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();

    let mut state = ViewState::default();
    for tag in 1..=10 {
        state = state.with_viewport(state.viewport.zoomed_to(
            ScreenRect::new(10.0, 10.0, 60.0, 40.0),
            80,
            60,
        ));
        tracked(&r, &state, 80, 60, tag, &log, &tx);
    }
    for _ in 0..10 {
        rx.recv_timeout(WAIT).unwrap();
    }
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 10);
    assert_eq!(log.last(), Some(&Event::Complete(10)));
    for tag in 1..=10 {
        let hits = log
            .iter()
            .filter(|e| matches!(e, Event::Complete(t) | Event::Cancel(t) if *t == tag))
            .count();
        assert_eq!(hits, 1, "job {tag}");
    }
}

#[test]
fn zero_dimensions_report_error_and_leave_active_job_alone() {
    let r = renderer(32, 0);
    let log = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();

    tracked(&r, &slow_state(), 256, 256, 1, &log, &tx);
    tracked(&r, &ViewState::default(), 0, 10, 2, &log, &tx);
    rx.recv_timeout(WAIT).unwrap();
    assert!(r.is_rendering(), "active job must survive an invalid request");

    r.cancel();
    rx.recv_timeout(WAIT).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert!(matches!(&log[0], Event::Error(msg) if msg.contains("0×10")));
    assert_eq!(log[1], Event::Cancel(1));
}

#[test]
fn zero_dimension_outcome_is_invalid_dimensions() {
    let r = renderer(32, 0);
    let err = r.render_and_wait(&ViewState::default(), 10, 0).unwrap_err();
    assert!(matches!(
        err,
        RenderError::InvalidDimensions {
            width: 10,
            height: 0
        }
    ));
}

#[test]
fn shutdown_cancels_in_flight_work_and_rejects_new_renders() {
    let r = renderer(32, 0);
    let log = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();

    tracked(&r, &slow_state(), 512, 512, 1, &log, &tx);
    let start = Instant::now();
    r.shutdown();
    assert!(start.elapsed() < Duration::from_secs(5));
    rx.recv_timeout(WAIT).unwrap();
    assert_eq!(*log.lock().unwrap(), vec![Event::Cancel(1)]);
    assert!(!r.is_rendering());

    r.shutdown();
    let err = r.render_and_wait(&ViewState::default(), 8, 8).unwrap_err();
    assert!(matches!(err, RenderError::ShutDown));
}

#[test]
fn shutdown_gives_up_after_grace_period() {
    // One worker, one-pixel tiles, and a budget no pixel inside the set can
    // exhaust: the running tile only reaches its next row check long after
    // the grace period has expired.
    let r = renderer(1, 1);
    let endless = ViewState::new(
        Viewport::new(-0.3, -0.1, -0.1, 0.1).unwrap(),
        u32::MAX,
        EscapeFunction::Mandelbrot,
        ColorMapper::Grayscale,
    )
    .unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();

    tracked(&r, &endless, 4, 4, 1, &log, &tx);
    std::thread::sleep(Duration::from_millis(100));

    let start = Instant::now();
    r.shutdown();
    let elapsed = start.elapsed();
    assert!(elapsed >= SHUTDOWN_GRACE, "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "returned after {elapsed:?}");

    rx.recv_timeout(WAIT).unwrap();
    assert_eq!(*log.lock().unwrap(), vec![Event::Cancel(1)]);
    let err = r.render_and_wait(&ViewState::default(), 8, 8).unwrap_err();
    assert!(matches!(err, RenderError::ShutDown));
}

/// Runs every task immediately on the posting thread.
struct Inline;

impl CallbackContext for Inline {
    fn post(&self, task: Task) {
        task();
    }
}

#[test]
fn render_requested_from_completion_callback_finishes() {
    let r = Arc::new(
        FractalRenderer::with_config(Arc::new(Inline), RendererConfig::default()).unwrap(),
    );
    let (tx, rx) = mpsc::channel();
    let again = Arc::clone(&r);
    r.render(
        &ViewState::default(),
        32,
        32,
        move |first: RenderOutcome| {
            let _ = tx.send(("first", first.is_ok()));
            let tx = tx.clone();
            again.render(
                &ViewState::default(),
                16,
                16,
                move |second: RenderOutcome| {
                    let _ = tx.send(("second", second.is_ok()));
                },
                || {},
            );
        },
        || {},
    );

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), ("first", true));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), ("second", true));
}

#[test]
fn progress_tracks_active_job() {
    let r = renderer(32, 0);
    assert_eq!(r.progress(), (0, 0));

    let (tx, rx) = mpsc::channel();
    let tx_c = tx.clone();
    r.render(
        &slow_state(),
        256,
        128,
        move |_| {
            let _ = tx_c.send(());
        },
        move || {
            let _ = tx.send(());
        },
    );
    let (done, total) = r.progress();
    assert_eq!(total, 8 * 4);
    assert!(done <= total);

    r.cancel();
    rx.recv_timeout(WAIT).unwrap();
    assert_eq!(r.progress(), (0, 0));
}

#[test]
fn callbacks_run_on_callback_thread() {
    let r = renderer(32, 0);
    let (tx, rx) = mpsc::channel();
    let tx_c = tx.clone();
    r.render(
        &ViewState::default(),
        16,
        16,
        move |_| {
            let _ = tx_c.send(std::thread::current().name().map(String::from));
        },
        move || {
            let _ = tx.send(None);
        },
    );
    let name = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(name.as_deref(), Some("render-callbacks"));
}

#[test]
fn cancel_without_job_is_noop() {
    let r = renderer(32, 0);
    r.cancel();
    assert!(!r.is_rendering());
    assert!(r.render_and_wait(&ViewState::default(), 8, 8).is_ok());
}
