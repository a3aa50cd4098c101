//! # walletview-core
//!
//! The reactive substrate behind a mobile wallet's screens: observable
//! sources with an activation lifecycle, derived values, one-shot events,
//! background loading of blocking wallet reads, and the state machine that
//! gates the screen's one-time entrance animation.
//!
//! # How It Fits Together
//!
//! All observation runs on a single **delivery thread** owned by a
//! [`exec::Dispatcher`]. Subscribing, unsubscribing, and every notification
//! callback happen there, strictly serialized, so observers never need
//! their own locking. Blocking wallet reads run on a [`exec::Workers`] pool
//! and publish their results back onto the delivery thread; results that
//! outlive the activation they were started for are recognized by epoch and
//! dropped.
//!
//! On top of that sit:
//!
//! - [`reactive::Source`] — a cached observable value with activation
//!   hooks. Gains a subscriber: activates, binds to its resource. Loses the
//!   last one: deactivates, releases it.
//! - [`reactive::Mediator`] — a derived source recomputed from upstream
//!   snapshots.
//! - [`reactive::OneShot`] — a consume-exactly-once event for dialogs and
//!   navigation.
//! - [`reactive::EnterAnimation`] — the forward-only readiness machine.
//! - [`wallet`] — the collaborator traits ([`wallet::WalletResource`],
//!   [`wallet::ConfigStore`]), the lifecycle-bound sources over them, and
//!   [`wallet::WalletScreenModel`], the state holder for the main screen.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use walletview_core::exec::{Dispatcher, Workers};
//! use walletview_core::wallet::{SharedWallet, WalletResource, WalletScreenModel};
//!
//! fn show(engine: Arc<dyn WalletResource>) {
//!     let dispatcher = Dispatcher::start();
//!     let workers = Workers::start(4);
//!     let wallet = SharedWallet::new(&dispatcher, engine);
//!     let model = WalletScreenModel::new(&dispatcher, &workers, &wallet);
//!
//!     let balance = model.balance().source().clone();
//!     dispatcher.call(move || {
//!         balance.subscribe(|amount| println!("balance: {} units", amount.units()));
//!     });
//! }
//! ```

pub mod exec;
pub mod reactive;
pub mod wallet;

pub use exec::{Dispatcher, Workers};
pub use reactive::{
    Computed, ComputeError, EnterAnimation, EnterPhase, LoadError, Loader, Mediator, OneShot,
    Publisher, Source, SubscriberId,
};
pub use wallet::{
    ConfigSource, ConfigStore, SharedWallet, WalletResource, WalletScreenModel, WalletSource,
};
