//! Observable Sources
//!
//! A [`Source`] is the fundamental primitive of the layer: a value holder
//! with an activation lifecycle. It is active while it has at least one
//! subscriber and inactive otherwise, and its lifecycle hooks are where a
//! change listener on the external wallet or config resource is attached
//! and detached.
//!
//! # How Sources Work
//!
//! 1. `subscribe` adds an observer. On the 0→1 transition the source bumps
//!    its activation epoch, runs the `on_activate` hook (attach listener,
//!    kick off the initial load), then replays the cached value to the new
//!    observer so late subscribers are never stuck without data.
//!
//! 2. `publish` can be called from any thread. It always enqueues onto the
//!    delivery thread, which updates the cached value and then notifies
//!    observers in subscription order. Notifications for one source never
//!    overlap and never nest.
//!
//! 3. `unsubscribe` removes an observer. On the 1→0 transition the
//!    `on_deactivate` hook runs and detaches the listener. Attach and
//!    detach are strictly paired over the source's lifetime.
//!
//! # Epochs
//!
//! Every activation increments an epoch counter. Background loads capture
//! the epoch they were triggered under and publish through
//! [`Publisher::publish_for_epoch`]; a result from a previous activation is
//! recognized as stale and dropped instead of clobbering fresh state.
//!
//! # Thread Safety
//!
//! All observer state is owned by the delivery thread. `subscribe` and
//! `unsubscribe` panic when called from any other thread; this is what
//! serializes listener attach/detach on the external resource without a
//! per-resource lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::exec::Dispatcher;

/// Activation generation counter. See the module docs on epochs.
pub type Epoch = u64;

/// Unique identifier for one subscription to a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type ObserverFn<T> = Box<dyn FnMut(&T) + Send>;
type Hook<T> = Box<dyn Fn(&Publisher<T>) + Send + Sync>;

/// One registered observer. The box is behind its own mutex so observers
/// can be invoked after the source's state lock has been released.
struct Slot<T> {
    callback: Mutex<ObserverFn<T>>,
}

struct State<T> {
    /// Latest published value. Kept behind `Arc` so a replayed one-shot
    /// event is the same instance that earlier observers consumed.
    value: Option<Arc<T>>,
    /// Insertion order is subscription order is notification order.
    observers: IndexMap<SubscriberId, Arc<Slot<T>>>,
    epoch: Epoch,
    active: bool,
}

struct Inner<T>
where
    T: Send + Sync + 'static,
{
    dispatcher: Dispatcher,
    state: Mutex<State<T>>,
    on_activate: Option<Hook<T>>,
    on_deactivate: Option<Hook<T>>,
}

/// A lifecycle-bound value holder.
///
/// Cheap to clone; clones share the same state and subscribers.
pub struct Source<T>
where
    T: Send + Sync + 'static,
{
    inner: Arc<Inner<T>>,
}

impl<T> Source<T>
where
    T: Send + Sync + 'static,
{
    /// Create a source with no lifecycle hooks.
    pub fn new(dispatcher: &Dispatcher) -> Self {
        Self::build(dispatcher, None, None)
    }

    /// Create a source with activation hooks.
    ///
    /// `on_activate` runs on the 0→1 subscriber transition and is where a
    /// listener on the external resource is attached and an initial load is
    /// started. `on_deactivate` runs on 1→0 and must detach whatever
    /// `on_activate` attached. Both run on the delivery thread and receive
    /// a [`Publisher`] handle rather than the source itself, so hooks never
    /// keep their own source alive.
    pub fn with_lifecycle<A, D>(dispatcher: &Dispatcher, on_activate: A, on_deactivate: D) -> Self
    where
        A: Fn(&Publisher<T>) + Send + Sync + 'static,
        D: Fn(&Publisher<T>) + Send + Sync + 'static,
    {
        Self::build(
            dispatcher,
            Some(Box::new(on_activate)),
            Some(Box::new(on_deactivate)),
        )
    }

    fn build(dispatcher: &Dispatcher, on_activate: Option<Hook<T>>, on_deactivate: Option<Hook<T>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                dispatcher: dispatcher.clone(),
                state: Mutex::new(State {
                    value: None,
                    observers: IndexMap::new(),
                    epoch: 0,
                    active: false,
                }),
                on_activate,
                on_deactivate,
            }),
        }
    }

    /// Add an observer; returns the id needed to unsubscribe.
    ///
    /// If a value is cached, the new observer receives it before
    /// `subscribe` returns.
    ///
    /// # Panics
    ///
    /// Panics when called from any thread but the delivery thread.
    pub fn subscribe<F>(&self, observer: F) -> SubscriberId
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.assert_delivery_thread("Source::subscribe");

        let id = SubscriberId::next();
        let slot = Arc::new(Slot {
            callback: Mutex::new(Box::new(observer) as ObserverFn<T>),
        });

        let activated = {
            let mut state = self.inner.state.lock();
            state.observers.insert(id, Arc::clone(&slot));
            if state.observers.len() == 1 {
                state.active = true;
                state.epoch += 1;
                true
            } else {
                false
            }
        };

        if activated {
            tracing::trace!(epoch = self.epoch(), "source activated");
            if let Some(hook) = &self.inner.on_activate {
                hook(&self.publisher());
            }
        }

        // Replay the cached value after the activation hook has run.
        let current = self.inner.state.lock().value.clone();
        if let Some(value) = current {
            (slot.callback.lock())(&value);
        }

        id
    }

    /// Remove an observer.
    ///
    /// # Panics
    ///
    /// Panics off the delivery thread, and on an id that was never
    /// subscribed (or already unsubscribed): a detach without a matching
    /// attach is a contract violation.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.assert_delivery_thread("Source::unsubscribe");

        let deactivated = {
            let mut state = self.inner.state.lock();
            if state.observers.shift_remove(&id).is_none() {
                panic!("unsubscribe without a matching subscribe: {id:?}");
            }
            if state.observers.is_empty() && state.active {
                state.active = false;
                true
            } else {
                false
            }
        };

        if deactivated {
            tracing::trace!("source deactivated");
            if let Some(hook) = &self.inner.on_deactivate {
                hook(&self.publisher());
            }
        }
    }

    /// Publish a new value. Callable from any thread.
    ///
    /// Delivery always goes through the dispatcher queue, even when already
    /// on the delivery thread, so notifications for this source are strictly
    /// serialized. Publishing while inactive caches the value without
    /// notifying anyone.
    pub fn publish(&self, value: T) {
        self.publisher().publish(value);
    }

    /// Latest published value, if any.
    pub fn current(&self) -> Option<Arc<T>> {
        self.inner.state.lock().value.clone()
    }

    /// Clone of the latest published value, if any.
    pub fn snapshot(&self) -> Option<T>
    where
        T: Clone,
    {
        self.current().map(|value| (*value).clone())
    }

    pub fn has_value(&self) -> bool {
        self.inner.state.lock().value.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().observers.len()
    }

    /// Current activation epoch.
    pub fn epoch(&self) -> Epoch {
        self.inner.state.lock().epoch
    }

    /// Weak publishing handle for loaders and lifecycle hooks.
    pub fn publisher(&self) -> Publisher<T> {
        Publisher {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    fn assert_delivery_thread(&self, what: &str) {
        assert!(
            self.inner.dispatcher.on_delivery_thread(),
            "{what} must be called on the delivery thread"
        );
    }
}

impl<T> Clone for Source<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Source<T>
where
    T: Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Source")
            .field("value", &state.value)
            .field("subscriber_count", &state.observers.len())
            .field("active", &state.active)
            .field("epoch", &state.epoch)
            .finish()
    }
}

/// Weak handle for publishing into a [`Source`].
///
/// Holding a publisher does not keep the source alive; publishing into a
/// dropped source is a no-op. This is what background loads and external
/// listeners hold, so a torn-down screen cannot be resurrected by a late
/// result.
pub struct Publisher<T>
where
    T: Send + Sync + 'static,
{
    inner: Weak<Inner<T>>,
}

impl<T> Publisher<T>
where
    T: Send + Sync + 'static,
{
    /// Publish a new value. Callable from any thread.
    pub fn publish(&self, value: T) {
        if let Some(inner) = self.inner.upgrade() {
            let dispatcher = inner.dispatcher.clone();
            dispatcher.post(move || deliver(&inner, value));
        }
    }

    /// Publish a value produced under a particular activation epoch.
    ///
    /// The value is dropped when the epoch no longer matches (the source
    /// was deactivated and reactivated since the load started) or when the
    /// source is no longer active. Used by [`super::Loader`].
    pub fn publish_for_epoch(&self, epoch: Epoch, value: T) {
        if let Some(inner) = self.inner.upgrade() {
            let dispatcher = inner.dispatcher.clone();
            dispatcher.post(move || {
                {
                    let state = inner.state.lock();
                    if state.epoch != epoch || !state.active {
                        tracing::debug!(
                            stale_epoch = epoch,
                            current_epoch = state.epoch,
                            active = state.active,
                            "discarding stale background result"
                        );
                        return;
                    }
                }
                deliver(&inner, value);
            });
        }
    }

    /// Current activation epoch, or `None` when the source is gone.
    pub fn epoch(&self) -> Option<Epoch> {
        self.inner.upgrade().map(|inner| inner.state.lock().epoch)
    }
}

impl<T> Clone for Publisher<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

/// Runs on the delivery thread: update the cache, then notify observers in
/// subscription order. The state lock is released before callbacks run, so
/// observers may freely subscribe, unsubscribe, or read other sources.
fn deliver<T>(inner: &Arc<Inner<T>>, value: T)
where
    T: Send + Sync + 'static,
{
    let value = Arc::new(value);
    let slots: Vec<Arc<Slot<T>>> = {
        let mut state = inner.state.lock();
        state.value = Some(Arc::clone(&value));
        if !state.active {
            return;
        }
        state.observers.values().cloned().collect()
    };
    for slot in slots {
        (slot.callback.lock())(&value);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
