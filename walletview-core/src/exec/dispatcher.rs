//! Delivery Thread
//!
//! The dispatcher owns the single thread on which all observer callbacks
//! run. Serializing delivery on one thread is what lets the rest of the
//! crate get away with almost no locking: subscriber lists, state machine
//! transitions, and listener attach/detach are only ever touched here.
//!
//! # How It Works
//!
//! 1. `Dispatcher::start` spawns a named thread that drains a job queue.
//!
//! 2. `post` enqueues a job from any thread. Jobs run in the order they
//!    were posted and never overlap.
//!
//! 3. `call` enqueues a job and blocks until it has run, returning its
//!    result. When invoked from the delivery thread itself it runs the job
//!    inline instead, so re-entrant calls cannot deadlock.
//!
//! 4. `shutdown` drains everything already queued, then stops the thread.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;

type Job = Box<dyn FnOnce() + Send>;

enum Msg {
    Run(Job),
    Shutdown,
}

/// Handle to the delivery thread.
///
/// Cheap to clone; all clones refer to the same thread. Dropping the last
/// handle does not stop the thread, call [`Dispatcher::shutdown`] for that.
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    sender: mpsc::Sender<Msg>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn the delivery thread and return a handle to it.
    pub fn start() -> Self {
        let (sender, receiver) = mpsc::channel::<Msg>();
        let handle = thread::Builder::new()
            .name("walletview-delivery".into())
            .spawn(move || {
                while let Ok(msg) = receiver.recv() {
                    match msg {
                        Msg::Run(job) => job(),
                        Msg::Shutdown => break,
                    }
                }
            })
            .expect("failed to spawn delivery thread");

        let thread_id = handle.thread().id();
        Self {
            inner: Arc::new(Inner {
                sender,
                thread_id,
                handle: Mutex::new(Some(handle)),
            }),
        }
    }

    /// Whether the calling thread is the delivery thread.
    pub fn on_delivery_thread(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// Enqueue a job on the delivery thread.
    ///
    /// Jobs posted after shutdown are silently dropped; by then there is
    /// nobody left to observe their effects.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.inner.sender.send(Msg::Run(Box::new(job))).is_err() {
            tracing::debug!("delivery thread stopped; dropping posted job");
        }
    }

    /// Run a job on the delivery thread and wait for its result.
    ///
    /// Runs inline when already on the delivery thread. Because the queue
    /// is FIFO, returning from `call` also guarantees every job posted
    /// before it has completed, which makes it a convenient barrier.
    pub fn call<F, R>(&self, job: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.on_delivery_thread() {
            return job();
        }
        let (tx, rx) = mpsc::channel();
        self.post(move || {
            let _ = tx.send(job());
        });
        rx.recv().expect("delivery thread terminated while waiting")
    }

    /// Drain the queue and stop the delivery thread.
    pub fn shutdown(&self) {
        let _ = self.inner.sender.send(Msg::Shutdown);
        if let Some(handle) = self.inner.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Clone for Dispatcher {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("thread_id", &self.inner.thread_id)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
