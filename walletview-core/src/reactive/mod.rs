//! Reactive Primitives
//!
//! This module implements the state-composition layer the wallet screens are
//! built on: lifecycle-bound observable sources, one-shot events, derived
//! values, and the readiness machine that gates the entrance animation.
//!
//! # Concepts
//!
//! ## Sources
//!
//! A [`Source`] holds the latest value of some piece of screen state. It is
//! *lifecycle-bound*: while it has at least one subscriber it is "active"
//! and keeps a change listener attached to the external resource it mirrors;
//! when the last subscriber leaves, the listener is detached. A late
//! subscriber immediately receives the cached value, so a screen recreated
//! after rotation is never stuck without data.
//!
//! ## One-shot events
//!
//! A [`OneShot`] wraps a value that must be handed to exactly one observer
//! exactly once. Dialogs and navigation are driven through
//! `Source<OneShot<T>>`: the replay-on-subscribe semantics of the source
//! would otherwise reopen a dialog every time the screen resubscribes.
//!
//! ## Mediators
//!
//! A [`Mediator`] is a derived source computed from several upstream
//! sources. It recomputes on every upstream publish while it is active and
//! republishes the result (or a tagged error) to its own subscribers.
//!
//! ## Readiness
//!
//! [`EnterAnimation`] collects independently-completing readiness signals
//! and advances through a strictly forward-only state machine, so the
//! one-time entrance transition fires exactly once no matter in which order
//! the loads finish.
//!
//! # Threading
//!
//! All subscriber callbacks run on the delivery thread owned by
//! [`crate::exec::Dispatcher`]. `publish` is the only cross-thread entry
//! point; it marshals onto the delivery thread before touching any state.
//! Blocking reads go through [`Loader`] onto the worker pool.

mod event;
mod loader;
mod mediator;
mod readiness;
mod source;

pub use event::OneShot;
pub use loader::{LoadError, Loader};
pub use mediator::{ComputeError, Computed, Mediator};
pub use readiness::{EnterAnimation, EnterPhase};
pub use source::{Epoch, Publisher, Source, SubscriberId};
