//! Bridge: the page-side owner of the wallet connection
//!
//! # Lifecycle
//!
//! ```text
//! run()
//!   │
//!   ├── discover()      probe slot, then retry every 500ms, 3 times
//!   │     └── not found → InstallState::NotInstalled (terminal)
//!   │
//!   ├── subscribe()     provider events → handle_event() reducer
//!   │
//!   └── auto_connect()  after 800ms, connect({onlyIfTrusted}) unless the
//!                       user explicitly disconnected this session
//! ```
//!
//! # Actions
//!
//! Every action clears the previous error, checks its preconditions, delegates to
//! the provider and returns `None` (or an empty value) on failure after recording
//! a classified [`BridgeError`]. Nothing is thrown at the caller.
//!
//! Execution is single-threaded (`Rc`/`RefCell`); no borrow is ever held across
//! an `.await`.

mod cache;
mod config;
mod errors;
mod state;
mod timer;

pub use cache::CacheEntry;
pub use config::{BridgeConfig, ConnectCallback, DisconnectCallback, ErrorCallback};
pub use errors::{classify, BridgeError, ErrorKind};
pub use state::{ActiveAccount, Affordance, BridgeSnapshot, ConnectionState, InstallState};
pub use timer::Timer;
#[cfg(feature = "native")]
pub use timer::TokioTimer;

use futures::channel::{mpsc, oneshot};
use futures::{FutureExt, Stream, StreamExt};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::address;
use crate::core::block::Block;
use crate::provider::{
    AccountInfo, Balance, ConnectOptions, ConnectResponse, Encoding, Provider, ProviderEvent, ProviderSlot,
    SignedMessage,
};
use cache::{AccountCache, SharedFetch};
use errors::classify_resolution;
use state::Session;

struct Inner {
    config: BridgeConfig,
    slot: Box<dyn ProviderSlot>,
    timer: Rc<dyn Timer>,
    provider: RefCell<Option<Rc<dyn Provider>>>,
    session: RefCell<Session>,
    cache: RefCell<AccountCache>,
    watchers: RefCell<Vec<mpsc::UnboundedSender<BridgeSnapshot>>>,
    stop: RefCell<Option<oneshot::Sender<()>>>,
    detached: Cell<bool>,
}

/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct Bridge {
    inner: Rc<Inner>,
}

impl Bridge {
    pub fn new(config: BridgeConfig, slot: impl ProviderSlot + 'static, timer: Rc<dyn Timer>) -> Self {
        Self {
            inner: Rc::new(Inner {
                config,
                slot: Box::new(slot),
                timer,
                provider: RefCell::new(None),
                session: RefCell::new(Session::default()),
                cache: RefCell::new(AccountCache::default()),
                watchers: RefCell::new(Vec::new()),
                stop: RefCell::new(None),
                detached: Cell::new(false),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig { &self.inner.config }

    // =========================================================================
    // STATE (read-only for consumers)
    // =========================================================================

    pub fn snapshot(&self) -> BridgeSnapshot {
        self.inner.session.borrow().snapshot()
    }

    /// Stream of snapshots, one per state change.
    pub fn watch(&self) -> mpsc::UnboundedReceiver<BridgeSnapshot> {
        let (tx, rx) = mpsc::unbounded();
        self.inner.watchers.borrow_mut().push(tx);
        rx
    }

    pub fn is_installed(&self) -> bool { self.inner.session.borrow().install == InstallState::Installed }
    pub fn connection_state(&self) -> ConnectionState { self.inner.session.borrow().connection }
    pub fn error(&self) -> Option<BridgeError> { self.inner.session.borrow().error.clone() }
    pub fn user_disconnected(&self) -> bool { self.inner.session.borrow().user_disconnected }

    pub fn public_key(&self) -> Option<String> {
        self.inner.session.borrow().account.as_ref().map(|a| a.public_key.clone())
    }

    pub fn accounts(&self) -> Vec<String> {
        self.inner.session.borrow().account.as_ref().map(|a| a.accounts.clone()).unwrap_or_default()
    }

    /// Number of settled account-info entries currently cached.
    pub fn cached_accounts(&self) -> usize { self.inner.cache.borrow().len() }

    /// Account-info requests currently awaiting the provider.
    pub fn pending_fetches(&self) -> usize { self.inner.cache.borrow().pending() }

    pub fn clear_error(&self) {
        let had_error = self.inner.session.borrow_mut().error.take().is_some();
        if had_error {
            self.notify();
        }
    }

    fn provider(&self) -> Option<Rc<dyn Provider>> {
        self.inner.provider.borrow().clone()
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        self.inner
            .watchers
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(snapshot.clone()).is_ok());
    }

    // =========================================================================
    // DISCOVERY + SUBSCRIPTION
    // =========================================================================

    /// Use an already-known provider (skips polling).
    pub fn attach(&self, provider: Rc<dyn Provider>) {
        *self.inner.provider.borrow_mut() = Some(provider);
        self.inner.session.borrow_mut().install = InstallState::Installed;
        tracing::info!("wallet provider attached");
        self.notify();
    }

    /// Probe the slot once, then retry at the configured interval. Bounded: a
    /// missing extension is reported once and never polled for again.
    pub async fn discover(&self) -> bool {
        if self.provider().is_some() {
            return true;
        }
        if self.inner.session.borrow().install == InstallState::NotInstalled {
            return false;
        }
        let attempts = self.inner.config.discovery_attempts;
        for attempt in 0..=attempts {
            if let Some(provider) = self.inner.slot.lookup() {
                tracing::debug!(attempt, "wallet provider found");
                self.attach(provider);
                return true;
            }
            if attempt < attempts {
                self.inner.timer.sleep(self.inner.config.discovery_interval_ms).await;
            }
        }
        tracing::info!(attempts, "wallet provider not found, giving up");
        self.inner.session.borrow_mut().install = InstallState::NotInstalled;
        self.notify();
        false
    }

    /// Discover, subscribe to lifecycle events and attempt a silent reconnect.
    /// Resolves once the provider's event stream ends or [`Bridge::detach`] is called.
    pub async fn run(&self) {
        if !self.discover().await {
            return;
        }
        let Some(provider) = self.provider() else { return };
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        *self.inner.stop.borrow_mut() = Some(stop_tx);
        self.inner.detached.set(false);
        let events = provider.subscribe().take_until(stop_rx);
        futures::join!(self.pump(events), self.auto_connect());
        tracing::debug!("bridge event loop finished");
    }

    /// Unsubscribe from provider events and cancel any pending auto-connect.
    pub fn detach(&self) {
        self.inner.detached.set(true);
        self.inner.stop.borrow_mut().take();
    }

    async fn pump<S>(&self, mut events: S)
    where
        S: Stream<Item = ProviderEvent> + Unpin,
    {
        while let Some(event) = events.next().await {
            self.handle_event(event);
        }
    }

    async fn auto_connect(&self) {
        if !self.inner.config.auto_connect || self.user_disconnected() {
            return;
        }
        self.inner.timer.sleep(self.inner.config.reconnect_delay_ms).await;
        if self.inner.detached.get() || self.user_disconnected() || self.connection_state() == ConnectionState::Connected {
            return;
        }
        let Some(provider) = self.provider() else { return };
        match provider.connect(ConnectOptions::silent()).await {
            // The user may have disconnected while the request was pending.
            Ok(response) if !self.user_disconnected() => {
                tracing::info!(public_key = %response.public_key, "silently reconnected");
                self.apply_response(response);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "silent reconnect skipped"),
        }
    }

    // =========================================================================
    // EVENT REDUCER
    // =========================================================================

    /// Apply one lifecycle event. Synchronous: state is fully updated on return.
    pub fn handle_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::Connect { public_key, accounts } => {
                let accounts = accounts.filter(|a| !a.is_empty()).unwrap_or_else(|| vec![public_key.clone()]);
                self.apply_connect(public_key, accounts);
            }
            ProviderEvent::AccountChanged { public_key } => {
                let accounts = vec![public_key.clone()];
                self.apply_connect(public_key, accounts);
            }
            ProviderEvent::Disconnect => self.apply_disconnect(),
        }
    }

    fn apply_response(&self, response: ConnectResponse) {
        let accounts = (!response.accounts.is_empty()).then_some(response.accounts);
        self.handle_event(ProviderEvent::Connect { public_key: response.public_key, accounts });
    }

    fn apply_connect(&self, public_key: String, accounts: Vec<String>) {
        let changed = {
            let mut session = self.inner.session.borrow_mut();
            let changed = session.connection != ConnectionState::Connected
                || session.account.as_ref().map(|a| a.public_key.as_str()) != Some(public_key.as_str());
            session.connection = ConnectionState::Connected;
            session.account = Some(ActiveAccount { public_key: public_key.clone(), accounts });
            session.error = None;
            session.user_disconnected = false;
            changed
        };
        self.inner.cache.borrow_mut().invalidate_all();
        self.notify();
        if changed {
            tracing::info!(%public_key, "wallet connected");
            if let Some(cb) = &self.inner.config.on_connect {
                cb(&public_key);
            }
        }
    }

    fn apply_disconnect(&self) {
        let changed = {
            let mut session = self.inner.session.borrow_mut();
            let changed = session.connection != ConnectionState::Disconnected || session.account.is_some();
            session.connection = ConnectionState::Disconnected;
            session.account = None;
            changed
        };
        self.inner.cache.borrow_mut().invalidate_all();
        self.notify();
        if changed {
            tracing::info!("wallet disconnected");
            if let Some(cb) = &self.inner.config.on_disconnect {
                cb();
            }
        }
    }

    // =========================================================================
    // ERROR STATE
    // =========================================================================

    fn record(&self, err: BridgeError) {
        {
            let mut session = self.inner.session.borrow_mut();
            if err.is_fatal() {
                session.connection = ConnectionState::Disconnected;
                session.account = None;
            }
            session.error = Some(err.clone());
        }
        if err.is_fatal() {
            self.inner.cache.borrow_mut().invalidate_all();
        }
        if err.is_benign() {
            tracing::debug!(kind = ?err.kind, "{}", err.message);
        } else {
            tracing::warn!(kind = ?err.kind, "{}", err.message);
        }
        self.notify();
        if let Some(cb) = &self.inner.config.on_error {
            cb(&err.message);
        }
    }

    fn fail<T>(&self, err: BridgeError) -> Option<T> {
        self.record(err);
        None
    }

    /// Clear the previous error and require a provider.
    fn begin(&self) -> Result<Rc<dyn Provider>, BridgeError> {
        self.clear_error();
        self.provider().ok_or_else(BridgeError::not_installed)
    }

    fn require_account(&self) -> Result<String, BridgeError> {
        self.public_key().ok_or_else(BridgeError::not_connected)
    }

    fn begin_with_account(&self) -> Result<(Rc<dyn Provider>, String), BridgeError> {
        let provider = self.begin()?;
        Ok((provider, self.require_account()?))
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Interactive connect. Always allowed, even after a user disconnect.
    pub async fn connect(&self) -> Option<String> {
        let provider = match self.begin() {
            Ok(p) => p,
            Err(e) => return self.fail(e),
        };
        self.inner.session.borrow_mut().connection = ConnectionState::Connecting;
        self.notify();
        match provider.connect(ConnectOptions::interactive()).await {
            Ok(response) => {
                let public_key = response.public_key.clone();
                self.apply_response(response);
                Some(public_key)
            }
            Err(e) => {
                {
                    let mut session = self.inner.session.borrow_mut();
                    if session.connection == ConnectionState::Connecting {
                        session.connection = if session.account.is_some() {
                            ConnectionState::Connected
                        } else {
                            ConnectionState::Disconnected
                        };
                    }
                }
                self.fail(classify(&e))
            }
        }
    }

    /// Explicit disconnect; also suppresses silent reconnection for this session.
    pub async fn disconnect(&self) -> bool {
        let provider = match self.begin() {
            Ok(p) => p,
            Err(e) => {
                self.record(e);
                return false;
            }
        };
        self.inner.session.borrow_mut().user_disconnected = true;
        match provider.disconnect().await {
            Ok(()) => {
                self.apply_disconnect();
                true
            }
            Err(e) => {
                self.record(classify(&e));
                false
            }
        }
    }

    pub async fn get_accounts(&self) -> Vec<String> {
        let (provider, _) = match self.begin_with_account() {
            Ok(v) => v,
            Err(e) => return self.fail(e).unwrap_or_default(),
        };
        match provider.get_accounts().await {
            Ok(accounts) => {
                let updated = {
                    let mut session = self.inner.session.borrow_mut();
                    match session.account.as_mut() {
                        Some(active) if !accounts.is_empty() && active.accounts != accounts => {
                            active.accounts = accounts.clone();
                            true
                        }
                        _ => false,
                    }
                };
                if updated {
                    self.notify();
                }
                accounts
            }
            Err(e) => self.fail(classify(&e)).unwrap_or_default(),
        }
    }

    /// Balance through the account-info cache; never a separate provider call.
    pub async fn get_balance(&self, address: Option<&str>) -> Option<Balance> {
        self.get_account_info(address).await.map(|info| info.balance)
    }

    /// Cached for the TTL; concurrent calls for one address share one provider call
    /// and one recorded error. Returns `None` silently when there is no address to query.
    pub async fn get_account_info(&self, address: Option<&str>) -> Option<AccountInfo> {
        let provider = match self.begin() {
            Ok(p) => p,
            Err(e) => return self.fail(e),
        };
        let target = address.map(str::to_string).or_else(|| self.public_key())?;

        let now = self.inner.timer.now_ms();
        let ttl = self.inner.config.account_info_ttl_ms;
        if let Some(info) = self.inner.cache.borrow().fresh(&target, now, ttl) {
            return Some(info);
        }

        let existing = self.inner.cache.borrow().in_flight(&target);
        let fetch = match existing {
            Some(fetch) => fetch,
            None => self.start_fetch(provider, target),
        };
        // A failure was recorded by the fetch itself.
        fetch.await.ok()
    }

    fn start_fetch(&self, provider: Rc<dyn Provider>, address: String) -> SharedFetch {
        let token = self.inner.cache.borrow().token(&address);
        let weak = Rc::downgrade(&self.inner);
        let key = address.clone();
        let fetch = async move {
            let result = provider.get_account_info(Some(&address)).await.map(|mut info| {
                if info.address.is_empty() {
                    info.address = address.clone();
                }
                info
            });
            if let Some(inner) = weak.upgrade() {
                let now = inner.timer.now_ms();
                inner.cache.borrow_mut().settle(&address, token, &result, now);
                if let Err(e) = &result {
                    Bridge { inner }.record(classify(e));
                }
            }
            result
        }
        .boxed_local()
        .shared();
        self.inner.cache.borrow_mut().begin(&key, token, fetch.clone());
        fetch
    }

    /// Send from the active account. Human-readable names are resolved first;
    /// an unresolvable name aborts the send.
    pub async fn send_transaction(&self, to: &str, amount: &str) -> Option<String> {
        let (provider, from) = match self.begin_with_account() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        let to = to.trim();
        if to.is_empty() {
            return self.fail(BridgeError::invalid_input("Destination is required."));
        }
        if amount.trim().is_empty() {
            return self.fail(BridgeError::invalid_input("Amount is required."));
        }

        let destination = if address::is_name(to) {
            match provider.resolve_bns(to).await {
                Ok(Some(resolved)) if !resolved.is_empty() => {
                    tracing::debug!(name = to, %resolved, "resolved name");
                    resolved
                }
                Ok(_) => return self.fail(BridgeError::unresolved_name(to)),
                Err(e) => return self.fail(classify_resolution(to, &e)),
            }
        } else {
            to.to_string()
        };

        match provider.send_transaction(&from, &destination, amount.trim()).await {
            Ok(hash) => {
                let mut cache = self.inner.cache.borrow_mut();
                cache.invalidate(&from);
                cache.invalidate(&destination);
                Some(hash)
            }
            Err(e) => self.fail(classify(&e)),
        }
    }

    pub async fn sign_message(&self, message: &str, encoding: Encoding) -> Option<SignedMessage> {
        let (provider, _) = match self.begin_with_account() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        match provider.sign_message(message, encoding).await {
            Ok(signed) => Some(signed),
            Err(e) => self.fail(classify(&e)),
        }
    }

    pub async fn verify_signed_message(&self, message: &str, signature: &str, public_key: &str, encoding: Encoding) -> Option<bool> {
        let provider = match self.begin() {
            Ok(p) => p,
            Err(e) => return self.fail(e),
        };
        match provider.verify_signed_message(message, signature, public_key, encoding).await {
            Ok(valid) => Some(valid),
            Err(e) => self.fail(classify(&e)),
        }
    }

    pub async fn sign_block(&self, block: &Block) -> Option<Block> {
        let (provider, _) = match self.begin_with_account() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        match provider.sign_block(block).await {
            Ok(signed) => Some(signed),
            Err(e) => self.fail(classify(&e)),
        }
    }

    pub async fn send_block(&self, block: &Block) -> Option<String> {
        let (provider, _) = match self.begin_with_account() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        match provider.send_block(block).await {
            Ok(hash) => {
                self.inner.cache.borrow_mut().invalidate(&block.account);
                Some(hash)
            }
            Err(e) => self.fail(classify(&e)),
        }
    }

    pub async fn resolve_name(&self, name: &str) -> Option<String> {
        let provider = match self.begin() {
            Ok(p) => p,
            Err(e) => return self.fail(e),
        };
        match provider.resolve_bns(name.trim()).await {
            Ok(Some(address)) if !address.is_empty() => Some(address),
            Ok(_) => self.fail(BridgeError::unresolved_name(name.trim())),
            Err(e) => self.fail(classify_resolution(name.trim(), &e)),
        }
    }
}
