//! Background Loading
//!
//! Reading the wallet blocks, so reads run on the worker pool and publish
//! their result back through a [`Publisher`]. The loader is fire-and-forget
//! by design; everything that can go wrong degrades to "no update":
//!
//! - The pool rejects the job (screen tearing down): logged at debug,
//!   nothing published. The next resource change or resubscription starts
//!   a fresh load.
//!
//! - The read fails: logged at warn, nothing published, the previously
//!   cached value stays in place. No automatic retry.
//!
//! - The result is stale (the source was deactivated and reactivated while
//!   the read ran): recognized by its activation epoch and dropped on the
//!   delivery thread.
//!
//! Loads are not mutually exclusive. Rapid change notifications may enqueue
//! several reads of the same state; every read sees the current resource,
//! so last-write-wins delivery is correct without any ordering token.

use thiserror::Error;

use super::source::Publisher;
use crate::exec::Workers;

/// A background read failed. Logged and dropped, never published.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("load failed: {message}")]
pub struct LoadError {
    message: String,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Runs blocking reads on the worker pool and publishes results.
///
/// Cheap to clone; clones share the same pool.
#[derive(Clone, Debug)]
pub struct Loader {
    workers: Workers,
}

impl Loader {
    pub fn new(workers: &Workers) -> Self {
        Self {
            workers: workers.clone(),
        }
    }

    /// Run `read` on the worker pool and publish its result.
    ///
    /// The publisher's current epoch is captured before the read starts;
    /// a result arriving after a deactivation/reactivation cycle is
    /// recognized as stale and discarded.
    pub fn trigger<T, F>(&self, publisher: &Publisher<T>, read: F)
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, LoadError> + Send + 'static,
    {
        let epoch = match publisher.epoch() {
            Some(epoch) => epoch,
            // Source already dropped; nobody wants this read.
            None => return,
        };

        let publisher = publisher.clone();
        let submitted = self.workers.execute(move || match read() {
            Ok(value) => publisher.publish_for_epoch(epoch, value),
            Err(err) => {
                tracing::warn!(%err, "background load failed; keeping previous value");
            }
        });

        if submitted.is_err() {
            tracing::debug!("background load rejected; worker pool is shutting down");
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Dispatcher;
    use crate::reactive::Source;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met in time");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn publishes_successful_read() {
        let dispatcher = Dispatcher::start();
        let workers = Workers::start(2);
        let loader = Loader::new(&workers);
        let source: Source<i32> = Source::new(&dispatcher);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s2 = source.clone();
        let seen2 = Arc::clone(&seen);
        dispatcher.call(move || {
            s2.subscribe(move |v| seen2.lock().push(*v));
        });

        loader.trigger(&source.publisher(), || Ok(123));
        wait_until(|| !seen.lock().is_empty());

        assert_eq!(*seen.lock(), vec![123]);
        workers.shutdown();
        dispatcher.shutdown();
    }

    #[test]
    fn failed_read_keeps_previous_value() {
        let dispatcher = Dispatcher::start();
        let workers = Workers::start(1);
        let loader = Loader::new(&workers);
        let source: Source<i32> = Source::new(&dispatcher);

        let s2 = source.clone();
        dispatcher.call(move || {
            s2.subscribe(|_| {});
        });

        loader.trigger(&source.publisher(), || Ok(1));
        wait_until(|| source.snapshot() == Some(1));

        loader.trigger(&source.publisher(), || {
            Err(LoadError::new("wallet unavailable"))
        });
        // Drain the worker and the delivery queue.
        workers.shutdown();
        dispatcher.call(|| {});

        assert_eq!(source.snapshot(), Some(1));
        dispatcher.shutdown();
    }

    #[test]
    fn rejected_load_is_dropped_silently() {
        let dispatcher = Dispatcher::start();
        let workers = Workers::start(1);
        let loader = Loader::new(&workers);
        let source: Source<i32> = Source::new(&dispatcher);

        workers.shutdown();
        // Must neither panic nor publish.
        loader.trigger(&source.publisher(), || Ok(5));
        dispatcher.call(|| {});

        assert_eq!(source.snapshot(), None);
        dispatcher.shutdown();
    }

    #[test]
    fn stale_result_from_previous_activation_is_dropped() {
        let dispatcher = Dispatcher::start();
        let workers = Workers::start(1);
        let loader = Loader::new(&workers);
        let source: Source<i32> = Source::new(&dispatcher);

        let seen = Arc::new(Mutex::new(Vec::new()));

        // First activation; capture its epoch in a slow load.
        let s2 = source.clone();
        let first = dispatcher.call(move || s2.subscribe(|_| {}));

        let (block_tx, block_rx) = std::sync::mpsc::channel::<()>();
        loader.trigger(&source.publisher(), move || {
            // Hold the read until the activation it belongs to is gone.
            let _ = block_rx.recv();
            Ok(111)
        });

        // Deactivate and reactivate: a new epoch begins.
        let s3 = source.clone();
        let seen2 = Arc::clone(&seen);
        dispatcher.call(move || {
            s3.unsubscribe(first);
            s3.subscribe(move |v| seen2.lock().push(*v));
        });

        // Release the stale read, then run a fresh one.
        block_tx.send(()).unwrap();
        loader.trigger(&source.publisher(), || Ok(222));

        workers.shutdown();
        dispatcher.call(|| {});

        assert_eq!(*seen.lock(), vec![222]);
        assert_eq!(source.snapshot(), Some(222));
        dispatcher.shutdown();
    }
}
