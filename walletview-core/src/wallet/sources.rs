//! Resource-Bound Sources
//!
//! [`WalletSource`] and [`ConfigSource`] bind a [`Source`] to an external
//! resource. The binding follows the source's lifecycle exactly:
//!
//! - activation attaches a change listener and starts an initial load,
//! - every change notification triggers a reload,
//! - deactivation detaches the listener.
//!
//! Wallet-bound sources additionally watch [`SharedWallet::replaced`] and
//! rebind to the new wallet instance when the engine reloads the wallet,
//! so no source ever holds a listener on a wallet nothing else references.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::exec::{Dispatcher, Workers};
use crate::reactive::{LoadError, Loader, Publisher, Source, SubscriberId};
use crate::wallet::resource::{
    ConfigStore, ListenerHandle, SharedWallet, WalletResource,
};

type WalletRead<T> = Arc<dyn Fn(&dyn WalletResource) -> Result<T, LoadError> + Send + Sync>;

/// A source mirroring one derived piece of wallet state.
///
/// The read runs on the worker pool; see [`Loader`] for the failure and
/// staleness rules.
pub struct WalletSource<T>
where
    T: Send + Sync + 'static,
{
    source: Source<T>,
}

struct WalletBinding<T>
where
    T: Send + Sync + 'static,
{
    wallet: SharedWallet,
    loader: Loader,
    read: WalletRead<T>,
    /// The wallet instance the listener is attached to, paired with its
    /// handle. A handle must be released against the instance it came from.
    listener: Mutex<Option<(Arc<dyn WalletResource>, ListenerHandle)>>,
    replaced_sub: Mutex<Option<SubscriberId>>,
}

impl<T> WalletSource<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<F>(
        dispatcher: &Dispatcher,
        wallet: &SharedWallet,
        workers: &Workers,
        read: F,
    ) -> Self
    where
        F: Fn(&dyn WalletResource) -> Result<T, LoadError> + Send + Sync + 'static,
    {
        let binding = Arc::new(WalletBinding {
            wallet: wallet.clone(),
            loader: Loader::new(workers),
            read: Arc::new(read) as WalletRead<T>,
            listener: Mutex::new(None),
            replaced_sub: Mutex::new(None),
        });

        let on_activate = Arc::clone(&binding);
        let on_deactivate = Arc::clone(&binding);
        let source = Source::with_lifecycle(
            dispatcher,
            move |publisher| on_activate.activate(publisher),
            move |_publisher| on_deactivate.deactivate(),
        );
        Self { source }
    }

    pub fn source(&self) -> &Source<T> {
        &self.source
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriberId
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.source.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.source.unsubscribe(id);
    }

    pub fn snapshot(&self) -> Option<T>
    where
        T: Clone,
    {
        self.source.snapshot()
    }
}

impl<T> WalletBinding<T>
where
    T: Send + Sync + 'static,
{
    fn activate(self: &Arc<Self>, publisher: &Publisher<T>) {
        self.attach_listener(publisher);

        let me = Arc::clone(self);
        let p = publisher.clone();
        let sub = self.wallet.replaced().subscribe(move |_| me.rebind(&p));
        *self.replaced_sub.lock() = Some(sub);

        self.trigger_load(publisher);
    }

    fn deactivate(&self) {
        if let Some(sub) = self.replaced_sub.lock().take() {
            self.wallet.replaced().unsubscribe(sub);
        }
        self.detach_listener();
    }

    /// The wallet instance was replaced: move the listener over and reload.
    ///
    /// The replacement channel replays its last notification on subscribe,
    /// so a rebind request for the wallet already being tracked is ignored.
    fn rebind(self: &Arc<Self>, publisher: &Publisher<T>) {
        let current = self.wallet.current();
        if let Some((attached, _)) = self.listener.lock().as_ref() {
            if Arc::ptr_eq(attached, &current) {
                return;
            }
        }
        tracing::trace!("wallet replaced; rebinding change listener");
        self.detach_listener();
        self.attach_listener(publisher);
        self.trigger_load(publisher);
    }

    fn attach_listener(self: &Arc<Self>, publisher: &Publisher<T>) {
        let wallet = self.wallet.current();
        let me = Arc::clone(self);
        let p = publisher.clone();
        // May fire on any thread; the loader and publisher marshal.
        let handle = wallet.add_change_listener(Arc::new(move || me.trigger_load(&p)));

        let previous = self.listener.lock().replace((wallet, handle));
        assert!(
            previous.is_none(),
            "wallet change listener attached while already attached"
        );
    }

    fn detach_listener(&self) {
        let (wallet, handle) = self
            .listener
            .lock()
            .take()
            .unwrap_or_else(|| panic!("wallet change listener detached without a matching attach"));
        wallet.remove_change_listener(handle);
    }

    fn trigger_load(&self, publisher: &Publisher<T>) {
        let wallet = self.wallet.current();
        let read = Arc::clone(&self.read);
        self.loader.trigger(publisher, move || read(&*wallet));
    }
}

/// A source mirroring one configuration value.
///
/// Config reads are cheap, so they run inline: on activation and on every
/// matching change notification, the value is read, parsed, and published.
pub struct ConfigSource<T>
where
    T: Send + Sync + 'static,
{
    source: Source<T>,
}

struct ConfigBinding<T> {
    config: Arc<dyn ConfigStore>,
    key: String,
    parse: Arc<dyn Fn(Option<String>) -> T + Send + Sync>,
    listener: Mutex<Option<ListenerHandle>>,
}

impl<T> ConfigSource<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<F>(
        dispatcher: &Dispatcher,
        config: Arc<dyn ConfigStore>,
        key: impl Into<String>,
        parse: F,
    ) -> Self
    where
        F: Fn(Option<String>) -> T + Send + Sync + 'static,
    {
        let binding = Arc::new(ConfigBinding {
            config,
            key: key.into(),
            parse: Arc::new(parse),
            listener: Mutex::new(None),
        });

        let on_activate = Arc::clone(&binding);
        let on_deactivate = Arc::clone(&binding);
        let source = Source::with_lifecycle(
            dispatcher,
            move |publisher| on_activate.activate(publisher),
            move |_publisher| on_deactivate.deactivate(),
        );
        Self { source }
    }

    pub fn source(&self) -> &Source<T> {
        &self.source
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriberId
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.source.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.source.unsubscribe(id);
    }
}

impl<T> ConfigBinding<T>
where
    T: Send + Sync + 'static,
{
    fn activate(self: &Arc<Self>, publisher: &Publisher<T>) {
        let me = Arc::clone(self);
        let p = publisher.clone();
        let handle = self.config.on_change(Arc::new(move |key| {
            if key == me.key {
                me.load(&p);
            }
        }));

        let previous = self.listener.lock().replace(handle);
        assert!(
            previous.is_none(),
            "config change listener attached while already attached"
        );

        self.load(publisher);
    }

    fn deactivate(&self) {
        let handle = self
            .listener
            .lock()
            .take()
            .unwrap_or_else(|| panic!("config change listener detached without a matching attach"));
        self.config.off_change(handle);
    }

    fn load(&self, publisher: &Publisher<T>) {
        publisher.publish((self.parse)(self.config.get(&self.key)));
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::resource::{Address, Amount, ChangeCallback, ConfigChangeCallback};
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met in time");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[derive(Default)]
    struct MockWallet {
        balance: Mutex<Amount>,
        listeners: Mutex<HashMap<ListenerHandle, ChangeCallback>>,
    }

    impl MockWallet {
        fn set_balance(&self, amount: Amount) {
            *self.balance.lock() = amount;
        }

        fn fire_change(&self) {
            let callbacks: Vec<ChangeCallback> = self.listeners.lock().values().cloned().collect();
            for callback in callbacks {
                callback();
            }
        }

        fn listener_count(&self) -> usize {
            self.listeners.lock().len()
        }
    }

    impl WalletResource for MockWallet {
        fn balance(&self) -> Result<Amount, LoadError> {
            Ok(*self.balance.lock())
        }

        fn receive_address(&self) -> Result<Address, LoadError> {
            Ok(Address::new("LX1mockaddress"))
        }

        fn transaction_count(&self) -> Result<usize, LoadError> {
            Ok(0)
        }

        fn is_encrypted(&self) -> Result<bool, LoadError> {
            Ok(false)
        }

        fn add_change_listener(&self, callback: ChangeCallback) -> ListenerHandle {
            let handle = ListenerHandle::next();
            self.listeners.lock().insert(handle, callback);
            handle
        }

        fn remove_change_listener(&self, handle: ListenerHandle) {
            self.listeners.lock().remove(&handle);
        }
    }

    struct Fixture {
        dispatcher: Dispatcher,
        workers: Workers,
        mock: Arc<MockWallet>,
        wallet: SharedWallet,
    }

    fn fixture() -> Fixture {
        let dispatcher = Dispatcher::start();
        let workers = Workers::start(2);
        let mock = Arc::new(MockWallet::default());
        let wallet = SharedWallet::new(&dispatcher, Arc::clone(&mock) as Arc<dyn WalletResource>);
        Fixture {
            dispatcher,
            workers,
            mock,
            wallet,
        }
    }

    impl Fixture {
        fn balance_source(&self) -> WalletSource<Amount> {
            WalletSource::new(&self.dispatcher, &self.wallet, &self.workers, |w| {
                w.balance()
            })
        }

        fn teardown(self) {
            self.workers.shutdown();
            self.dispatcher.shutdown();
        }
    }

    #[test]
    fn activation_attaches_listener_and_loads() {
        let fx = fixture();
        fx.mock.set_balance(Amount::from_units(500));
        let source = fx.balance_source();

        let s2 = source.source().clone();
        fx.dispatcher.call(move || {
            s2.subscribe(|_| {});
        });

        assert_eq!(fx.mock.listener_count(), 1);
        wait_until(|| source.snapshot() == Some(Amount::from_units(500)));
        fx.teardown();
    }

    #[test]
    fn deactivation_detaches_listener() {
        let fx = fixture();
        let source = fx.balance_source();

        let s2 = source.source().clone();
        fx.dispatcher.call(move || {
            let id = s2.subscribe(|_| {});
            s2.unsubscribe(id);
        });

        assert_eq!(fx.mock.listener_count(), 0);
        fx.teardown();
    }

    #[test]
    fn change_notification_triggers_reload() {
        let fx = fixture();
        fx.mock.set_balance(Amount::from_units(1));
        let source = fx.balance_source();

        let s2 = source.source().clone();
        fx.dispatcher.call(move || {
            s2.subscribe(|_| {});
        });
        wait_until(|| source.snapshot() == Some(Amount::from_units(1)));

        fx.mock.set_balance(Amount::from_units(2));
        fx.mock.fire_change();
        wait_until(|| source.snapshot() == Some(Amount::from_units(2)));
        fx.teardown();
    }

    #[test]
    fn wallet_replacement_rebinds_and_reloads() {
        let fx = fixture();
        fx.mock.set_balance(Amount::from_units(10));
        let source = fx.balance_source();

        let s2 = source.source().clone();
        fx.dispatcher.call(move || {
            s2.subscribe(|_| {});
        });
        wait_until(|| source.snapshot() == Some(Amount::from_units(10)));

        let restored = Arc::new(MockWallet::default());
        restored.set_balance(Amount::from_units(99));
        fx.wallet
            .replace(Arc::clone(&restored) as Arc<dyn WalletResource>);

        wait_until(|| source.snapshot() == Some(Amount::from_units(99)));
        assert_eq!(fx.mock.listener_count(), 0);
        assert_eq!(restored.listener_count(), 1);
        fx.teardown();
    }

    #[test]
    fn reactivation_after_replacement_attaches_once() {
        let fx = fixture();
        let source = fx.balance_source();

        // Replace while nothing is subscribed; the replacement notification
        // is cached and replayed on the next activation.
        let restored = Arc::new(MockWallet::default());
        fx.wallet
            .replace(Arc::clone(&restored) as Arc<dyn WalletResource>);
        fx.dispatcher.call(|| {});

        let s2 = source.source().clone();
        fx.dispatcher.call(move || {
            s2.subscribe(|_| {});
        });
        fx.dispatcher.call(|| {});

        assert_eq!(fx.mock.listener_count(), 0);
        assert_eq!(restored.listener_count(), 1);
        fx.teardown();
    }

    #[derive(Default)]
    struct MockConfig {
        values: Mutex<HashMap<String, String>>,
        listeners: Mutex<HashMap<ListenerHandle, ConfigChangeCallback>>,
    }

    impl MockConfig {
        fn set(&self, key: &str, value: &str) {
            self.values.lock().insert(key.into(), value.into());
            let callbacks: Vec<ConfigChangeCallback> =
                self.listeners.lock().values().cloned().collect();
            for callback in callbacks {
                callback(key);
            }
        }
    }

    impl ConfigStore for MockConfig {
        fn get(&self, key: &str) -> Option<String> {
            self.values.lock().get(key).cloned()
        }

        fn on_change(&self, callback: ConfigChangeCallback) -> ListenerHandle {
            let handle = ListenerHandle::next();
            self.listeners.lock().insert(handle, callback);
            handle
        }

        fn off_change(&self, handle: ListenerHandle) {
            self.listeners.lock().remove(&handle);
        }
    }

    #[test]
    fn config_source_loads_and_follows_changes() {
        let dispatcher = Dispatcher::start();
        let config = Arc::new(MockConfig::default());
        config.values.lock().insert("own_name".into(), "Satoshi".into());

        let source = ConfigSource::new(
            &dispatcher,
            Arc::clone(&config) as Arc<dyn ConfigStore>,
            "own_name",
            |value| value.unwrap_or_default(),
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s2 = source.source().clone();
        let seen2 = Arc::clone(&seen);
        dispatcher.call(move || {
            s2.subscribe(move |v: &String| seen2.lock().push(v.clone()));
        });
        dispatcher.call(|| {});
        assert_eq!(*seen.lock(), vec!["Satoshi".to_string()]);

        config.set("own_name", "Finney");
        // A change to an unrelated key is ignored.
        config.set("currency", "EUR");
        dispatcher.call(|| {});

        assert_eq!(
            *seen.lock(),
            vec!["Satoshi".to_string(), "Finney".to_string()]
        );
        assert_eq!(config.listeners.lock().len(), 1);
        dispatcher.shutdown();
    }
}
