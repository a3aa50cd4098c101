//! Execution Substrate
//!
//! This module provides the two thread contexts everything else runs on:
//!
//! - [`Dispatcher`]: a single dedicated delivery thread. All subscriber
//!   callbacks, state machine transitions, and one-shot event consumption
//!   happen here, in order, one at a time.
//!
//! - [`Workers`]: a small pool of background threads for blocking wallet
//!   reads. Results are handed back to the delivery thread via
//!   `Source::publish`, which is the only cross-thread entry point.
//!
//! # Design Decisions
//!
//! 1. Threading is explicit rather than implicit: instead of platform
//!    handlers or ambient executors, components receive a `Dispatcher`
//!    handle at construction time.
//!
//! 2. The delivery queue is unbounded. Publishes are tiny and producers are
//!    either the delivery thread itself or short-lived loader results, so
//!    backpressure is not a concern at this layer.
//!
//! 3. Worker submission is fallible: once the pool is shut down, `execute`
//!    returns [`Rejected`] and the caller decides whether that matters. For
//!    background loads it never does.

mod dispatcher;
mod workers;

pub use dispatcher::Dispatcher;
pub use workers::{Rejected, Workers};
