//! The single context on which render callbacks run.
//!
//! Render outcomes are produced on background threads but delivered through
//! one serial context, so callers never see two callbacks at once. A GUI
//! integration implements [`CallbackContext`] by posting onto its event loop;
//! [`CallbackThread`] is the stand-alone default.

use std::sync::mpsc;
use std::thread::JoinHandle;

use tracing::{debug, error};

/// A unit of work posted to a callback context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A serial executor for render callbacks.
///
/// Tasks must run one at a time, in the order they were posted.
pub trait CallbackContext: Send + Sync {
    fn post(&self, task: Task);
}

/// A dedicated thread draining a FIFO of callback tasks.
///
/// The thread runs until the context is dropped; tasks already queued at that
/// point still run.
pub struct CallbackThread {
    tx: Option<mpsc::Sender<Task>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackThread {
    pub fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Task>();
        let handle = std::thread::Builder::new()
            .name("render-callbacks".into())
            .spawn(move || {
                debug!("Callback thread started");
                while let Ok(task) = rx.recv() {
                    // A panicking callback must not take the context down with it.
                    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)).is_err() {
                        error!("Render callback panicked");
                    }
                }
                debug!("Callback thread exiting");
            })?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }
}

impl CallbackContext for CallbackThread {
    fn post(&self, task: Task) {
        match self.tx.as_ref() {
            Some(tx) => {
                if tx.send(task).is_err() {
                    error!("Callback thread is gone, dropping callback");
                }
            }
            None => error!("Callback context closed, dropping callback"),
        }
    }
}

impl Drop for CallbackThread {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain the queue and exit.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
