//! One-Shot Events
//!
//! A one-shot event carries a value to exactly one observer exactly once.
//! Screens use them for side effects that must not repeat: opening a
//! dialog, navigating away, showing a toast. A plain cached value would
//! re-fire on every resubscription (for example after a device rotation
//! recreates the screen), which is exactly the bug this type exists to
//! prevent.
//!
//! # Contract
//!
//! - [`OneShot::consume`] returns the value and marks the event consumed.
//!   Consuming twice is a contract violation and panics: a second
//!   consumption means a dialog would have reopened, and that is a logic
//!   bug to surface loudly, not to paper over.
//!
//! - [`OneShot::peek_if_unconsumed`] inspects without consuming, for the
//!   rare non-destructive use case.
//!
//! - [`OneShot::handler`] adapts a plain callback into a source observer
//!   that consumes at most once and silently ignores already-consumed
//!   replays. This is the default way to observe a `Source<OneShot<T>>`.

use parking_lot::Mutex;

/// A value delivered to exactly one observer exactly once.
///
/// Events are created and consumed only within the delivery thread's
/// serialized callback sequence; the mutex exists to satisfy `Sync` for
/// storage inside a [`super::Source`] and is never contended.
pub struct OneShot<T> {
    content: Mutex<Option<T>>,
}

impl<T> OneShot<T> {
    /// Wrap a value in a fresh, unconsumed event.
    pub fn new(value: T) -> Self {
        Self {
            content: Mutex::new(Some(value)),
        }
    }

    /// Take the value and mark the event consumed.
    ///
    /// # Panics
    ///
    /// Panics if the event has already been consumed.
    pub fn consume(&self) -> T {
        self.content
            .lock()
            .take()
            .unwrap_or_else(|| panic!("one-shot event consumed more than once"))
    }

    /// Whether the event has been consumed.
    pub fn is_consumed(&self) -> bool {
        self.content.lock().is_none()
    }

    /// Inspect the value without consuming it.
    ///
    /// Returns `None` once the event has been consumed. Side-effecting
    /// observers should go through [`OneShot::consume`] or
    /// [`OneShot::handler`] instead.
    pub fn peek_if_unconsumed(&self) -> Option<T>
    where
        T: Clone,
    {
        self.content.lock().clone()
    }

    /// Adapt a callback into an observer for `Source<OneShot<T>>`.
    ///
    /// The returned closure consumes the event and invokes `f` the first
    /// time it sees it, and does nothing for already-consumed replays, so a
    /// resubscribing screen does not re-trigger the side effect.
    pub fn handler<F>(f: F) -> impl FnMut(&OneShot<T>)
    where
        F: FnMut(T),
    {
        let mut f = f;
        move |event| {
            if !event.is_consumed() {
                f(event.consume());
            }
        }
    }
}

impl OneShot<()> {
    /// An event with no payload, for "something happened" signals.
    pub fn unit() -> Self {
        Self::new(())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for OneShot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneShot")
            .field("content", &*self.content.lock())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
