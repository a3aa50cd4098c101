//! Mediators (Derived Sources)
//!
//! A [`Mediator`] composes several upstream sources into one derived value:
//! "is the wallet ready" from balance and address, "can the user send" from
//! balance and sync state, and so on.
//!
//! # How Mediators Work
//!
//! 1. Upstreams are registered with [`Mediator::track`] while the mediator
//!    is inactive.
//!
//! 2. When the mediator gains its first subscriber, it subscribes to every
//!    tracked upstream. Upstreams replay their cached values on subscribe,
//!    so a reactivated mediator recomputes immediately instead of serving a
//!    stale result.
//!
//! 3. Every upstream notification triggers exactly one run of the recompute
//!    function. The function sees the latest snapshot of all upstream
//!    values and returns:
//!    - `Ok(Some(value))` — publish [`Computed::Ready`]
//!    - `Ok(None)` — inputs incomplete, publish nothing yet
//!    - `Err(e)` — publish [`Computed::Failed`] on the same channel
//!
//! 4. When the last subscriber leaves, the mediator unsubscribes from all
//!    upstreams. It never recomputes while inactive.
//!
//! # Error Handling
//!
//! A failing recompute must not take down the observation graph, so errors
//! travel as a tagged [`Computed::Failed`] value through the ordinary
//! subscriber channel. Subscribers see "this derivation is broken" the same
//! way they see any other state, and unrelated sources are untouched.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use thiserror::Error;

use super::source::{Publisher, Source, SubscriberId};
use crate::exec::Dispatcher;

/// A derived computation failed. Carried inside [`Computed::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("derived computation failed: {message}")]
pub struct ComputeError {
    message: String,
}

impl ComputeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of a derived computation, delivered through the mediator's own
/// source channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Computed<T> {
    Ready(T),
    Failed(ComputeError),
}

impl<T> Computed<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Computed::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Computed::Ready(value) => Some(value),
            Computed::Failed(_) => None,
        }
    }
}

type Recompute<T> = Arc<dyn Fn() -> Result<Option<T>, ComputeError> + Send + Sync>;

struct Upstream {
    subscribe: Box<dyn Fn() -> SubscriberId + Send + Sync>,
    unsubscribe: Box<dyn Fn(SubscriberId) + Send + Sync>,
    subscription: Option<SubscriberId>,
}

struct Shared<T>
where
    T: Send + Sync + 'static,
{
    recompute: Recompute<T>,
    upstreams: Mutex<SmallVec<[Upstream; 4]>>,
}

impl<T> Shared<T>
where
    T: Send + Sync + 'static,
{
    fn activate(&self) {
        let mut upstreams = self.upstreams.lock();
        for upstream in upstreams.iter_mut() {
            // Replay from the upstream runs the first recompute right here.
            upstream.subscription = Some((upstream.subscribe)());
        }
    }

    fn deactivate(&self) {
        let mut upstreams = self.upstreams.lock();
        for upstream in upstreams.iter_mut() {
            if let Some(id) = upstream.subscription.take() {
                (upstream.unsubscribe)(id);
            }
        }
    }

    fn run(&self, publisher: &Publisher<Computed<T>>) {
        match (self.recompute)() {
            Ok(Some(value)) => publisher.publish(Computed::Ready(value)),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%err, "derived computation failed");
                publisher.publish(Computed::Failed(err));
            }
        }
    }
}

/// A derived source computed from one or more upstream sources.
pub struct Mediator<T>
where
    T: Send + Sync + 'static,
{
    out: Source<Computed<T>>,
    shared: Arc<Shared<T>>,
}

impl<T> Mediator<T>
where
    T: Send + Sync + 'static,
{
    /// Create a mediator with the given recompute function.
    ///
    /// The function typically reads `Source::snapshot` on the sources
    /// passed to [`Mediator::track`] and tolerates values that have not
    /// arrived yet by returning `Ok(None)`.
    pub fn new<F>(dispatcher: &Dispatcher, recompute: F) -> Self
    where
        F: Fn() -> Result<Option<T>, ComputeError> + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            recompute: Arc::new(recompute),
            upstreams: Mutex::new(SmallVec::new()),
        });
        let on_activate = Arc::clone(&shared);
        let on_deactivate = Arc::clone(&shared);
        let out = Source::with_lifecycle(
            dispatcher,
            move |_publisher| on_activate.activate(),
            move |_publisher| on_deactivate.deactivate(),
        );
        Self { out, shared }
    }

    /// Register an upstream source.
    ///
    /// # Panics
    ///
    /// Panics when the mediator is active: the upstream set is fixed for
    /// the duration of an activation.
    pub fn track<U>(&self, upstream: &Source<U>)
    where
        U: Send + Sync + 'static,
    {
        assert!(
            !self.out.is_active(),
            "Mediator::track must not be called while the mediator is active"
        );

        let shared = Arc::clone(&self.shared);
        let publisher = self.out.publisher();
        let subscribe_to = upstream.clone();
        let unsubscribe_from = upstream.clone();

        self.shared.upstreams.lock().push(Upstream {
            subscribe: Box::new(move || {
                let shared = Arc::clone(&shared);
                let publisher = publisher.clone();
                subscribe_to.subscribe(move |_| shared.run(&publisher))
            }),
            unsubscribe: Box::new(move |id| unsubscribe_from.unsubscribe(id)),
            subscription: None,
        });
    }

    /// The mediator's output channel; subscribe here for derived values.
    pub fn output(&self) -> &Source<Computed<T>> {
        &self.out
    }

    /// Convenience passthrough to [`Source::subscribe`] on the output.
    pub fn subscribe<F>(&self, observer: F) -> SubscriberId
    where
        F: FnMut(&Computed<T>) + Send + 'static,
    {
        self.out.subscribe(observer)
    }

    /// Convenience passthrough to [`Source::unsubscribe`] on the output.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.out.unsubscribe(id);
    }
}

impl<T> std::fmt::Debug for Mediator<T>
where
    T: Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("output", &self.out)
            .field("upstream_count", &self.shared.upstreams.lock().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
