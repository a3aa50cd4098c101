//! Collaborator Interfaces
//!
//! The wallet engine and the configuration store are opaque collaborators.
//! This module defines the narrow interfaces the reactive layer consumes,
//! the opaque value types that cross them, and [`SharedWallet`], the
//! runtime-replaceable handle everything wallet-bound observes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::exec::Dispatcher;
use crate::reactive::{LoadError, Source};

/// A monetary amount in the smallest coin unit. Display formatting and
/// denomination handling belong to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_units(units: u64) -> Self {
        Self(units)
    }

    pub fn units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// An opaque receive address. Encoding and validation are the engine's
/// concern; the UI layer only displays and compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque handle for a registered change listener.
///
/// Handles are issued by resource implementations and must be released
/// with the same resource they came from, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    /// Mint a process-unique handle; a convenience for implementations.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Invoked by the wallet engine whenever wallet state changes: coins
/// received or sent, a chain reorganization, a key-chain change. May fire
/// on any thread.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Invoked by the config store with the key that changed. May fire on any
/// thread.
pub type ConfigChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// The wallet engine, as seen from the screen layer.
///
/// Reads may block (they scan wallet data) and are therefore only called
/// from the worker pool. Fallible reads surface as [`LoadError`], which the
/// loader logs and drops.
pub trait WalletResource: Send + Sync {
    fn balance(&self) -> Result<Amount, LoadError>;
    fn receive_address(&self) -> Result<Address, LoadError>;
    fn transaction_count(&self) -> Result<usize, LoadError>;
    fn is_encrypted(&self) -> Result<bool, LoadError>;

    fn add_change_listener(&self, callback: ChangeCallback) -> ListenerHandle;
    fn remove_change_listener(&self, handle: ListenerHandle);
}

/// The user preference store, as seen from the screen layer.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn on_change(&self, callback: ConfigChangeCallback) -> ListenerHandle;
    fn off_change(&self, handle: ListenerHandle);
}

/// A wallet handle that can be replaced at runtime.
///
/// The engine may reload or restore the wallet while screens are showing.
/// Sources bound to the wallet subscribe to [`SharedWallet::replaced`]
/// while active and rebind their change listeners to the new instance; a
/// listener must never remain attached to a wallet nothing references.
pub struct SharedWallet {
    inner: Arc<SharedInner>,
}

struct SharedInner {
    wallet: RwLock<Arc<dyn WalletResource>>,
    replaced: Source<()>,
}

impl SharedWallet {
    pub fn new(dispatcher: &Dispatcher, wallet: Arc<dyn WalletResource>) -> Self {
        Self {
            inner: Arc::new(SharedInner {
                wallet: RwLock::new(wallet),
                replaced: Source::new(dispatcher),
            }),
        }
    }

    /// The current wallet instance.
    pub fn current(&self) -> Arc<dyn WalletResource> {
        Arc::clone(&self.inner.wallet.read())
    }

    /// Swap in a new wallet instance and notify bound sources.
    pub fn replace(&self, wallet: Arc<dyn WalletResource>) {
        *self.inner.wallet.write() = wallet;
        self.inner.replaced.publish(());
    }

    /// Notification channel for wallet replacement.
    pub fn replaced(&self) -> &Source<()> {
        &self.inner.replaced
    }
}

impl Clone for SharedWallet {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for SharedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedWallet").finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_units_round_trip() {
        let amount = Amount::from_units(5_000_000);
        assert_eq!(amount.units(), 5_000_000);
        assert!(!amount.is_zero());
        assert!(Amount::ZERO.is_zero());
        assert!(Amount::ZERO < amount);
    }

    #[test]
    fn address_is_opaque_text() {
        let address = Address::new("LX1abc");
        assert_eq!(address.as_str(), "LX1abc");
        assert_eq!(address, Address::new("LX1abc"));
    }

    #[test]
    fn listener_handles_are_unique() {
        let a = ListenerHandle::next();
        let b = ListenerHandle::next();
        let c = ListenerHandle::next();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }
}
