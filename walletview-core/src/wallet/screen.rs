//! Wallet Screen Model
//!
//! [`WalletScreenModel`] is the state holder behind the main wallet
//! screen. It owns one lifecycle-bound source per piece of displayed
//! wallet state, derives "is the wallet ready" from balance and address,
//! gates the one-time entrance animation, and exposes a one-shot channel
//! per dialog the screen can open.
//!
//! The model survives screen re-creation (the mobile shells recreate the
//! view on rotation); everything the recreated screen resubscribes to
//! replays its cached state, while the one-shot dialog channels replay
//! only unconsumed events.

use crate::exec::{Dispatcher, Workers};
use crate::reactive::{Computed, EnterAnimation, Mediator, OneShot, Source};
use crate::wallet::resource::{Address, Amount, SharedWallet};
use crate::wallet::sources::WalletSource;

/// Which help text a requested help dialog should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Wallet,
    Safety,
    TechnicalNotes,
}

/// State holder for the main wallet screen.
pub struct WalletScreenModel {
    balance: WalletSource<Amount>,
    receive_address: WalletSource<Address>,
    transaction_count: WalletSource<usize>,
    encrypted: WalletSource<bool>,
    wallet_ready: Mediator<bool>,
    enter_animation: EnterAnimation,
    show_help_dialog: Source<OneShot<HelpTopic>>,
    show_backup_dialog: Source<OneShot<()>>,
    show_restore_dialog: Source<OneShot<()>>,
    show_encrypt_keys_dialog: Source<OneShot<()>>,
    show_report_issue_dialog: Source<OneShot<()>>,
}

impl WalletScreenModel {
    pub fn new(dispatcher: &Dispatcher, workers: &Workers, wallet: &SharedWallet) -> Self {
        let balance = WalletSource::new(dispatcher, wallet, workers, |w| w.balance());
        let receive_address =
            WalletSource::new(dispatcher, wallet, workers, |w| w.receive_address());
        let transaction_count =
            WalletSource::new(dispatcher, wallet, workers, |w| w.transaction_count());
        let encrypted = WalletSource::new(dispatcher, wallet, workers, |w| w.is_encrypted());

        // Ready means "there is something to show": both headline values
        // have loaded. Until either arrives there is nothing to derive.
        let balance_in = balance.source().clone();
        let address_in = receive_address.source().clone();
        let wallet_ready = Mediator::new(dispatcher, move || {
            Ok(match (balance_in.has_value(), address_in.has_value()) {
                (false, false) => None,
                (balance_loaded, address_loaded) => Some(balance_loaded && address_loaded),
            })
        });
        wallet_ready.track(balance.source());
        wallet_ready.track(receive_address.source());

        Self {
            balance,
            receive_address,
            transaction_count,
            encrypted,
            wallet_ready,
            enter_animation: EnterAnimation::new(dispatcher),
            show_help_dialog: Source::new(dispatcher),
            show_backup_dialog: Source::new(dispatcher),
            show_restore_dialog: Source::new(dispatcher),
            show_encrypt_keys_dialog: Source::new(dispatcher),
            show_report_issue_dialog: Source::new(dispatcher),
        }
    }

    // ---- Displayed state ----

    pub fn balance(&self) -> &WalletSource<Amount> {
        &self.balance
    }

    pub fn receive_address(&self) -> &WalletSource<Address> {
        &self.receive_address
    }

    pub fn transaction_count(&self) -> &WalletSource<usize> {
        &self.transaction_count
    }

    pub fn encrypted(&self) -> &WalletSource<bool> {
        &self.encrypted
    }

    /// Derived from balance and address: `false` while only one of them has
    /// loaded, `true` once both have. Nothing until either arrives.
    pub fn wallet_ready(&self) -> &Source<Computed<bool>> {
        self.wallet_ready.output()
    }

    // ---- Entrance animation ----

    pub fn enter_phase(&self) -> &Source<crate::reactive::EnterPhase> {
        self.enter_animation.phase()
    }

    /// The screen wants the entrance animation once loading completes.
    pub fn animate_when_loading_finished(&self) {
        self.enter_animation.request_animation();
    }

    pub fn layout_finished(&self) {
        self.enter_animation.layout_ready();
    }

    pub fn balance_loading_finished(&self) {
        self.enter_animation.balance_ready();
    }

    pub fn address_loading_finished(&self) {
        self.enter_animation.address_ready();
    }

    pub fn transactions_loading_finished(&self) {
        self.enter_animation.transactions_ready();
    }

    pub fn animation_finished(&self) {
        self.enter_animation.animation_finished();
    }

    // ---- Dialog requests ----
    //
    // Each request publishes a fresh one-shot event. The screen observes
    // these with [`OneShot::handler`], so a dialog opens exactly once no
    // matter how many times the screen resubscribes afterwards.

    pub fn show_help_dialog(&self) -> &Source<OneShot<HelpTopic>> {
        &self.show_help_dialog
    }

    pub fn show_backup_dialog(&self) -> &Source<OneShot<()>> {
        &self.show_backup_dialog
    }

    pub fn show_restore_dialog(&self) -> &Source<OneShot<()>> {
        &self.show_restore_dialog
    }

    pub fn show_encrypt_keys_dialog(&self) -> &Source<OneShot<()>> {
        &self.show_encrypt_keys_dialog
    }

    pub fn show_report_issue_dialog(&self) -> &Source<OneShot<()>> {
        &self.show_report_issue_dialog
    }

    pub fn help_requested(&self, topic: HelpTopic) {
        self.show_help_dialog.publish(OneShot::new(topic));
    }

    pub fn backup_requested(&self) {
        self.show_backup_dialog.publish(OneShot::unit());
    }

    pub fn restore_requested(&self) {
        self.show_restore_dialog.publish(OneShot::unit());
    }

    pub fn encrypt_keys_requested(&self) {
        self.show_encrypt_keys_dialog.publish(OneShot::unit());
    }

    pub fn report_issue_requested(&self) {
        self.show_report_issue_dialog.publish(OneShot::unit());
    }
}

impl std::fmt::Debug for WalletScreenModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletScreenModel")
            .field("enter_animation", &self.enter_animation)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
