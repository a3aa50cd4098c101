//! Wallet Screen State
//!
//! This module binds the reactive substrate to the two external resources
//! a wallet screen observes: the wallet engine and the configuration
//! store. Both are consumed as trait objects; key management, transaction
//! construction, and preference persistence live elsewhere.
//!
//! - [`WalletResource`] / [`ConfigStore`]: the collaborator interfaces.
//! - [`SharedWallet`]: a runtime-replaceable wallet handle. The engine may
//!   reload the wallet at any time; sources bound to it rebind their
//!   listeners instead of holding a stale reference.
//! - [`WalletSource`] / [`ConfigSource`]: lifecycle-bound sources that
//!   mirror one derived piece of resource state.
//! - [`WalletScreenModel`]: the state holder for the main wallet screen:
//!   balance, address, transaction and encryption sources, the "wallet
//!   ready" derivation, the entrance animation gate, and the one-shot
//!   dialog channels.

mod resource;
mod screen;
mod sources;

pub use resource::{
    Address, Amount, ChangeCallback, ConfigChangeCallback, ConfigStore, ListenerHandle,
    SharedWallet, WalletResource,
};
pub use screen::{HelpTopic, WalletScreenModel};
pub use sources::{ConfigSource, WalletSource};
