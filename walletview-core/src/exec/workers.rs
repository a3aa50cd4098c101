//! Background Worker Pool
//!
//! Wallet reads can block for a long time (scanning key chains, summing
//! unspent outputs), so they must never run on the delivery thread. The
//! pool here is deliberately minimal: a fixed set of threads pulling jobs
//! off a shared queue.
//!
//! Submission is fallible. After [`Workers::shutdown`] every `execute`
//! returns [`Rejected`], which callers treat as "the screen is going away,
//! nobody wants this result" and log at debug level.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use thiserror::Error;

type Job = Box<dyn FnOnce() + Send>;

/// Submission failed because the pool is shut down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("worker pool is shut down")]
pub struct Rejected;

/// Fixed-size pool of background threads.
///
/// Cheap to clone; all clones share the same threads.
pub struct Workers {
    inner: Arc<Inner>,
}

struct Inner {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Workers {
    /// Start a pool with the given number of threads (at least one).
    pub fn start(threads: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..threads.max(1))
            .map(|i| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("walletview-worker-{i}"))
                    .spawn(move || loop {
                        let job = {
                            let guard = receiver.lock();
                            guard.recv()
                        };
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(sender)),
                handles: Mutex::new(handles),
            }),
        }
    }

    /// Submit a job to the pool.
    pub fn execute<F>(&self, job: F) -> Result<(), Rejected>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.inner.sender.lock();
        match guard.as_ref() {
            Some(sender) => sender.send(Box::new(job)).map_err(|_| Rejected),
            None => Err(Rejected),
        }
    }

    /// Stop accepting jobs, finish the ones already queued, join the threads.
    pub fn shutdown(&self) {
        drop(self.inner.sender.lock().take());
        for handle in self.inner.handles.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

impl Clone for Workers {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Workers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workers")
            .field("shut_down", &self.inner.sender.lock().is_none())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
