//! Bridge Tests: discovery, session state, account-info cache, actions
//!
//! These tests verify:
//! 1. Bounded discovery and the terminal not-installed state
//! 2. Event-driven state sync and callback firing
//! 3. Single-flight, TTL and invalidation of the account-info cache
//! 4. Silent reconnect and its suppression after a user disconnect
//! 5. Action preconditions, name resolution and error classification
//!
//! All tests run on a paused tokio clock inside a LocalSet, so timer waits are
//! virtual and deterministic.

#![cfg(feature = "native")]

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use monkeymask_bridge::provider::{
    AccountInfo, Balance, ConnectOptions, ConnectResponse, Encoding, EventStream, Provider, ProviderError,
    ProviderEvent, ProviderResult, SignedMessage,
};
use monkeymask_bridge::{
    Affordance, Block, Bridge, BridgeConfig, ConnectionState, ErrorKind, InstallState, MemoryWallet, TokioTimer,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;

const ALICE: &str = "ban_1alice";
const BOB: &str = "ban_1bob";

// =============================================================================
// Scripted provider
// =============================================================================

#[derive(Default)]
struct MockProvider {
    interactive_connects: Cell<usize>,
    silent_connects: Cell<usize>,
    connect_error: RefCell<Option<String>>,
    info_calls: Cell<usize>,
    info_delay_ms: Cell<u64>,
    info_error: RefCell<Option<String>>,
    action_error: RefCell<Option<String>>,
    names: RefCell<HashMap<String, String>>,
    resolve_error: RefCell<Option<String>>,
    sends: RefCell<Vec<(String, String, String)>>,
    subscribers: RefCell<Vec<mpsc::UnboundedSender<ProviderEvent>>>,
}

impl MockProvider {
    fn emit(&self, event: ProviderEvent) {
        self.subscribers.borrow_mut().retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    fn fail_actions(&self, message: &str) {
        *self.action_error.borrow_mut() = Some(message.to_string());
    }

    fn action(&self) -> ProviderResult<()> {
        match self.action_error.borrow().clone() {
            Some(message) => Err(ProviderError::new(message)),
            None => Ok(()),
        }
    }
}

#[async_trait(?Send)]
impl Provider for MockProvider {
    async fn connect(&self, options: ConnectOptions) -> ProviderResult<ConnectResponse> {
        if options.only_if_trusted {
            self.silent_connects.set(self.silent_connects.get() + 1);
        } else {
            self.interactive_connects.set(self.interactive_connects.get() + 1);
        }
        if let Some(message) = self.connect_error.borrow().clone() {
            return Err(ProviderError::new(message));
        }
        // The extension announces the connection as well as answering the call.
        self.emit(ProviderEvent::Connect { public_key: ALICE.into(), accounts: Some(vec![ALICE.into(), BOB.into()]) });
        Ok(ConnectResponse { public_key: ALICE.into(), accounts: vec![ALICE.into(), BOB.into()] })
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.action()?;
        self.emit(ProviderEvent::Disconnect);
        Ok(())
    }

    async fn get_accounts(&self) -> ProviderResult<Vec<String>> {
        self.action()?;
        Ok(vec![ALICE.into(), BOB.into()])
    }

    async fn get_balance(&self, _address: Option<&str>) -> ProviderResult<Balance> {
        unreachable!("balances are served from account info")
    }

    async fn get_account_info(&self, address: Option<&str>) -> ProviderResult<AccountInfo> {
        self.info_calls.set(self.info_calls.get() + 1);
        let delay = self.info_delay_ms.get();
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if let Some(message) = self.info_error.borrow().clone() {
            return Err(ProviderError::new(message));
        }
        let calls = self.info_calls.get().to_string();
        Ok(AccountInfo {
            address: address.unwrap_or(ALICE).to_string(),
            balance: Balance { balance: calls.clone(), balance_raw: calls, ..Default::default() },
            ..Default::default()
        })
    }

    async fn sign_message(&self, message: &str, _encoding: Encoding) -> ProviderResult<SignedMessage> {
        self.action()?;
        Ok(SignedMessage { signature: format!("sig:{message}"), public_key: ALICE.into() })
    }

    async fn verify_signed_message(&self, _message: &str, signature: &str, _public_key: &str, _encoding: Encoding) -> ProviderResult<bool> {
        self.action()?;
        Ok(signature.starts_with("sig:"))
    }

    async fn sign_block(&self, block: &Block) -> ProviderResult<Block> {
        self.action()?;
        let mut signed = block.clone();
        signed.signature = Some("00".repeat(64));
        Ok(signed)
    }

    async fn send_transaction(&self, from: &str, to: &str, amount: &str) -> ProviderResult<String> {
        self.action()?;
        self.sends.borrow_mut().push((from.into(), to.into(), amount.into()));
        Ok("HASH".into())
    }

    async fn send_block(&self, _block: &Block) -> ProviderResult<String> {
        self.action()?;
        Ok("BLOCKHASH".into())
    }

    async fn resolve_bns(&self, name: &str) -> ProviderResult<Option<String>> {
        if let Some(message) = self.resolve_error.borrow().clone() {
            return Err(ProviderError::new(message));
        }
        Ok(self.names.borrow().get(name).cloned())
    }

    fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.borrow_mut().push(tx);
        rx.boxed_local()
    }
}

// =============================================================================
// Harness
// =============================================================================

async fn local<F: Future>(f: F) -> F::Output {
    LocalSet::new().run_until(f).await
}

fn bridge_with(config: BridgeConfig, mock: &Rc<MockProvider>) -> Bridge {
    let provider = mock.clone();
    let slot = move || Some(provider.clone() as Rc<dyn Provider>);
    Bridge::new(config, slot, Rc::new(TokioTimer::new()))
}

/// Attached and connected as ALICE without going through discovery.
fn connected(mock: &Rc<MockProvider>) -> Bridge {
    let bridge = bridge_with(BridgeConfig::default().with_auto_connect(false), mock);
    bridge.attach(mock.clone());
    bridge.handle_event(ProviderEvent::Connect { public_key: ALICE.into(), accounts: None });
    bridge
}

fn block(account: &str) -> Block {
    Block {
        type_: "state".into(),
        account: account.into(),
        previous: "0".repeat(64),
        representative: account.into(),
        balance: "0".into(),
        link: "0".repeat(64),
        signature: None,
        work: None,
    }
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// =============================================================================
// Discovery
// =============================================================================

/// Test: an absent extension is probed four times over 1.5s, then reported once
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn discovery_gives_up_after_bounded_retries() {
    local(async {
        let lookups = Rc::new(Cell::new(0usize));
        let slot = {
            let lookups = lookups.clone();
            move || -> Option<Rc<dyn Provider>> {
                lookups.set(lookups.get() + 1);
                None
            }
        };
        let bridge = Bridge::new(BridgeConfig::default(), slot, Rc::new(TokioTimer::new()));
        assert_eq!(bridge.snapshot().affordance(), Affordance::Detecting);

        let started = tokio::time::Instant::now();
        bridge.run().await;

        assert_eq!(lookups.get(), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500) && elapsed < Duration::from_millis(1600), "{elapsed:?}");
        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.install, InstallState::NotInstalled);
        assert_eq!(snapshot.affordance(), Affordance::Install);

        // Terminal: no further polling, and actions report the missing extension.
        assert!(!bridge.discover().await);
        assert_eq!(lookups.get(), 4);
        assert_eq!(bridge.connect().await, None);
        assert_eq!(bridge.error().map(|e| e.kind), Some(ErrorKind::NotInstalled));
    })
    .await;
}

/// Test: a provider injected late is picked up by a retry
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn discovery_finds_late_injection() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        let lookups = Rc::new(Cell::new(0usize));
        let slot = {
            let lookups = lookups.clone();
            let mock = mock.clone();
            move || {
                lookups.set(lookups.get() + 1);
                (lookups.get() >= 3).then(|| mock.clone() as Rc<dyn Provider>)
            }
        };
        let bridge = Bridge::new(BridgeConfig::default().with_auto_connect(false), slot, Rc::new(TokioTimer::new()));

        assert!(bridge.discover().await);
        assert_eq!(lookups.get(), 3);
        assert!(bridge.is_installed());
        assert_eq!(bridge.snapshot().affordance(), Affordance::Connect);
    })
    .await;
}

// =============================================================================
// Silent reconnect
// =============================================================================

/// Test: a trusted origin reconnects silently after the delay, firing on_connect once
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn auto_connect_restores_trusted_session() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        let connects = Rc::new(Cell::new(0usize));
        let config = {
            let connects = connects.clone();
            BridgeConfig::default().on_connect(move |_| connects.set(connects.get() + 1))
        };
        let bridge = bridge_with(config, &mock);
        let runner = tokio::task::spawn_local({
            let bridge = bridge.clone();
            async move { bridge.run().await }
        });

        sleep_ms(700).await;
        assert_eq!(mock.silent_connects.get(), 0);

        sleep_ms(200).await;
        assert_eq!(mock.silent_connects.get(), 1);
        assert_eq!(mock.interactive_connects.get(), 0);
        assert_eq!(bridge.connection_state(), ConnectionState::Connected);
        assert_eq!(bridge.accounts(), vec![ALICE.to_string(), BOB.to_string()]);
        // Event and response describe the same transition.
        assert_eq!(connects.get(), 1);

        bridge.detach();
        runner.await.unwrap();
    })
    .await;
}

/// Test: a user disconnect suppresses silent reconnect but never blocks an explicit connect
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn user_disconnect_suppresses_only_silent_reconnect() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        let bridge = bridge_with(BridgeConfig::default(), &mock);
        let runner = tokio::task::spawn_local({
            let bridge = bridge.clone();
            async move { bridge.run().await }
        });

        sleep_ms(100).await;
        assert!(bridge.disconnect().await);
        assert!(bridge.user_disconnected());

        sleep_ms(2_000).await;
        assert_eq!(mock.silent_connects.get(), 0);
        assert_eq!(bridge.connection_state(), ConnectionState::Disconnected);

        assert_eq!(bridge.connect().await.as_deref(), Some(ALICE));
        assert_eq!(mock.interactive_connects.get(), 1);
        assert!(!bridge.user_disconnected());
        assert_eq!(bridge.connection_state(), ConnectionState::Connected);

        bridge.detach();
        runner.await.unwrap();
    })
    .await;
}

/// Test: an untrusted origin stays disconnected without surfacing an error
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failed_silent_reconnect_is_quiet() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        *mock.connect_error.borrow_mut() = Some("Origin is not trusted".into());
        let bridge = bridge_with(BridgeConfig::default(), &mock);
        let runner = tokio::task::spawn_local({
            let bridge = bridge.clone();
            async move { bridge.run().await }
        });

        sleep_ms(1_000).await;
        assert_eq!(mock.silent_connects.get(), 1);
        assert_eq!(bridge.connection_state(), ConnectionState::Disconnected);
        assert!(bridge.error().is_none());

        bridge.detach();
        runner.await.unwrap();
    })
    .await;
}

/// Test: detach before the delay cancels the pending reconnect
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn detach_cancels_pending_reconnect() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        let bridge = bridge_with(BridgeConfig::default(), &mock);
        let runner = tokio::task::spawn_local({
            let bridge = bridge.clone();
            async move { bridge.run().await }
        });

        sleep_ms(100).await;
        bridge.detach();
        sleep_ms(1_000).await;
        assert_eq!(mock.silent_connects.get(), 0);
        runner.await.unwrap();

        // Unsubscribed: later events no longer reach the bridge.
        mock.emit(ProviderEvent::Connect { public_key: ALICE.into(), accounts: None });
        assert_eq!(bridge.connection_state(), ConnectionState::Disconnected);
    })
    .await;
}

// =============================================================================
// Event-driven state
// =============================================================================

/// Test: provider events drive state and callbacks, once per real transition
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn provider_events_drive_state() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        let log = Rc::new(RefCell::new(Vec::<String>::new()));
        let config = {
            let (on_connect, on_disconnect) = (log.clone(), log.clone());
            BridgeConfig::default()
                .with_auto_connect(false)
                .on_connect(move |pk| on_connect.borrow_mut().push(format!("connect:{pk}")))
                .on_disconnect(move || on_disconnect.borrow_mut().push("disconnect".into()))
        };
        let bridge = bridge_with(config, &mock);
        let mut snapshots = bridge.watch();
        let runner = tokio::task::spawn_local({
            let bridge = bridge.clone();
            async move { bridge.run().await }
        });
        sleep_ms(10).await;

        mock.emit(ProviderEvent::Connect { public_key: ALICE.into(), accounts: None });
        mock.emit(ProviderEvent::Connect { public_key: ALICE.into(), accounts: None });
        sleep_ms(10).await;
        assert_eq!(bridge.public_key().as_deref(), Some(ALICE));
        assert_eq!(bridge.accounts(), vec![ALICE.to_string()]);

        mock.emit(ProviderEvent::AccountChanged { public_key: BOB.into() });
        sleep_ms(10).await;
        assert_eq!(bridge.public_key().as_deref(), Some(BOB));
        assert_eq!(bridge.accounts(), vec![BOB.to_string()]);

        mock.emit(ProviderEvent::Disconnect);
        mock.emit(ProviderEvent::Disconnect);
        sleep_ms(10).await;
        assert_eq!(bridge.connection_state(), ConnectionState::Disconnected);
        assert_eq!(bridge.public_key(), None);
        // A provider-side disconnect is not a user disconnect.
        assert!(!bridge.user_disconnected());

        assert_eq!(*log.borrow(), vec![format!("connect:{ALICE}"), format!("connect:{BOB}"), "disconnect".to_string()]);

        let first = snapshots.try_next().unwrap().unwrap();
        assert_eq!(first.install, InstallState::Installed);

        bridge.detach();
        runner.await.unwrap();
    })
    .await;
}

// =============================================================================
// Account-info cache
// =============================================================================

/// Test: concurrent reads share one provider call; fresh reads hit the cache
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn concurrent_account_info_is_single_flight() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        mock.info_delay_ms.set(100);
        let bridge = connected(&mock);

        let (a, b, c) = futures::join!(
            bridge.get_account_info(None),
            bridge.get_account_info(Some(ALICE)),
            bridge.get_balance(None),
        );
        assert_eq!(mock.info_calls.get(), 1);
        assert_eq!(a, b);
        assert_eq!(c, a.map(|info| info.balance));

        assert!(bridge.get_account_info(None).await.is_some());
        assert_eq!(mock.info_calls.get(), 1);

        // Distinct addresses are fetched independently.
        bridge.get_account_info(Some(BOB)).await;
        assert_eq!(mock.info_calls.get(), 2);
        assert_eq!(bridge.cached_accounts(), 2);
    })
    .await;
}

/// Test: entries are refetched once the TTL has elapsed
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn account_info_expires_after_ttl() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        let bridge = connected(&mock);

        let first = bridge.get_account_info(None).await.unwrap();
        sleep_ms(4_999).await;
        assert_eq!(bridge.get_account_info(None).await.unwrap(), first);
        assert_eq!(mock.info_calls.get(), 1);

        sleep_ms(1).await;
        let second = bridge.get_account_info(None).await.unwrap();
        assert_eq!(mock.info_calls.get(), 2);
        assert_ne!(second.balance.balance_raw, first.balance.balance_raw);
    })
    .await;
}

/// Test: a reply that lands after a disconnect is never cached
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn in_flight_fetch_does_not_survive_disconnect() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        mock.info_delay_ms.set(100);
        let bridge = connected(&mock);

        let pending = tokio::task::spawn_local({
            let bridge = bridge.clone();
            async move { bridge.get_account_info(None).await }
        });
        sleep_ms(10).await;
        assert_eq!(bridge.pending_fetches(), 1);
        bridge.handle_event(ProviderEvent::Disconnect);
        assert_eq!(bridge.pending_fetches(), 0);

        assert!(pending.await.unwrap().is_some());
        assert_eq!(bridge.cached_accounts(), 0);

        bridge.handle_event(ProviderEvent::Connect { public_key: ALICE.into(), accounts: None });
        bridge.get_account_info(None).await;
        assert_eq!(mock.info_calls.get(), 2);
    })
    .await;
}

/// Test: an account switch drops cached data for the old session
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn account_switch_invalidates_cache() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        let bridge = connected(&mock);

        bridge.get_account_info(None).await;
        assert_eq!(bridge.cached_accounts(), 1);
        bridge.handle_event(ProviderEvent::AccountChanged { public_key: BOB.into() });
        assert_eq!(bridge.cached_accounts(), 0);

        let info = bridge.get_account_info(None).await.unwrap();
        assert_eq!(info.address, BOB);
    })
    .await;
}

/// Test: failed fetches leave nothing behind and report the error
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failed_fetch_is_not_cached() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        *mock.info_error.borrow_mut() = Some("node unreachable".into());
        let bridge = connected(&mock);

        assert_eq!(bridge.get_account_info(None).await, None);
        assert_eq!(bridge.error().map(|e| e.kind), Some(ErrorKind::Provider));
        assert_eq!(bridge.cached_accounts(), 0);

        *mock.info_error.borrow_mut() = None;
        assert!(bridge.get_account_info(None).await.is_some());
        assert!(bridge.error().is_none());
        assert_eq!(mock.info_calls.get(), 2);
    })
    .await;
}

/// Test: concurrent readers share one failure, recorded and reported once
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn concurrent_failures_are_reported_once() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        mock.info_delay_ms.set(100);
        *mock.info_error.borrow_mut() = Some("node unreachable".into());
        let errors = Rc::new(Cell::new(0usize));
        let config = BridgeConfig::default().with_auto_connect(false).on_error({
            let errors = errors.clone();
            move |_| errors.set(errors.get() + 1)
        });
        let bridge = bridge_with(config, &mock);
        bridge.attach(mock.clone());
        bridge.handle_event(ProviderEvent::Connect { public_key: ALICE.into(), accounts: None });

        let (a, b) = futures::join!(bridge.get_account_info(None), bridge.get_account_info(None));
        assert_eq!((a, b), (None, None));
        assert_eq!(mock.info_calls.get(), 1);
        assert_eq!(errors.get(), 1);
        assert_eq!(bridge.error().map(|e| e.kind), Some(ErrorKind::Provider));
        assert_eq!(bridge.pending_fetches(), 0);
    })
    .await;
}

/// Test: without an account or explicit address, reads return nothing silently
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn account_info_without_target_is_silent() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        let bridge = bridge_with(BridgeConfig::default().with_auto_connect(false), &mock);
        bridge.attach(mock.clone());

        assert_eq!(bridge.get_account_info(None).await, None);
        assert!(bridge.error().is_none());
        assert_eq!(mock.info_calls.get(), 0);
    })
    .await;
}

// =============================================================================
// Actions
// =============================================================================

/// Test: names are resolved before sending; unresolvable names abort the send
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn send_resolves_names_first() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        mock.names.borrow_mut().insert("bob.ban".into(), BOB.into());
        let bridge = connected(&mock);

        assert_eq!(bridge.send_transaction("bob.ban", "1.5").await.as_deref(), Some("HASH"));
        assert_eq!(mock.sends.borrow()[0], (ALICE.to_string(), BOB.to_string(), "1.5".to_string()));

        assert_eq!(bridge.send_transaction("ghost.ban", "1").await, None);
        let err = bridge.error().unwrap();
        assert_eq!(err.kind, ErrorKind::NameResolution);
        assert!(err.message.contains("ghost.ban"));

        *mock.resolve_error.borrow_mut() = Some("lookup timed out".into());
        assert_eq!(bridge.send_transaction("bob.ban", "1").await, None);
        assert_eq!(bridge.error().map(|e| e.kind), Some(ErrorKind::NameResolution));
        assert_eq!(mock.sends.borrow().len(), 1);
    })
    .await;
}

/// Test: a successful send refreshes the sender's cached balance
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn send_invalidates_sender_cache() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        let bridge = connected(&mock);

        bridge.get_account_info(None).await;
        bridge.send_transaction(BOB, "1").await;
        assert_eq!(bridge.cached_accounts(), 0);
        bridge.get_account_info(None).await;
        assert_eq!(mock.info_calls.get(), 2);
    })
    .await;
}

/// Test: a fetch that started before a send cannot repopulate the sender's entry
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn send_discards_fetch_started_before_it() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        mock.info_delay_ms.set(100);
        let bridge = connected(&mock);

        let pending = tokio::task::spawn_local({
            let bridge = bridge.clone();
            async move { bridge.get_account_info(None).await }
        });
        sleep_ms(10).await;
        assert_eq!(bridge.pending_fetches(), 1);

        assert_eq!(bridge.send_transaction(BOB, "1").await.as_deref(), Some("HASH"));
        assert_eq!(bridge.pending_fetches(), 0);

        // The early reader still gets its answer; it is just not kept.
        assert!(pending.await.unwrap().is_some());
        assert_eq!(bridge.cached_accounts(), 0);

        let fresh = bridge.get_account_info(None).await.unwrap();
        assert_eq!(mock.info_calls.get(), 2);
        assert_eq!(fresh.balance.balance_raw, "2");
    })
    .await;
}

/// Test: account-bound actions require a connection and never reach the provider
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn actions_require_connection() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        let bridge = bridge_with(BridgeConfig::default().with_auto_connect(false), &mock);
        bridge.attach(mock.clone());

        assert_eq!(bridge.sign_message("hi", Encoding::Utf8).await, None);
        assert_eq!(bridge.error().map(|e| e.kind), Some(ErrorKind::NotConnected));
        assert_eq!(bridge.send_transaction(BOB, "1").await, None);
        assert!(mock.sends.borrow().is_empty());
        assert!(bridge.get_accounts().await.is_empty());

        // Verification needs no account.
        assert_eq!(bridge.verify_signed_message("hi", "sig:hi", ALICE, Encoding::Utf8).await, Some(true));
        assert!(bridge.error().is_none());
    })
    .await;
}

/// Test: lost capability forces a disconnect; benign errors leave the session alone
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn errors_are_classified() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        let bridge = connected(&mock);

        mock.fail_actions("Wallet is locked");
        assert_eq!(bridge.sign_message("hi", Encoding::Utf8).await, None);
        let err = bridge.error().unwrap();
        assert_eq!(err.kind, ErrorKind::WalletLocked);
        assert!(err.is_benign());
        assert_eq!(bridge.connection_state(), ConnectionState::Connected);

        mock.fail_actions("User rejected the request");
        assert_eq!(bridge.send_transaction(BOB, "1").await, None);
        assert_eq!(bridge.error().map(|e| e.kind), Some(ErrorKind::UserRejected));

        bridge.get_account_info(None).await;
        mock.fail_actions("Extension context invalidated.");
        let block = block(ALICE);
        assert_eq!(bridge.sign_block(&block).await, None);
        assert_eq!(bridge.error().map(|e| e.kind), Some(ErrorKind::CapabilityLost));
        assert_eq!(bridge.connection_state(), ConnectionState::Disconnected);
        assert_eq!(bridge.public_key(), None);
        assert_eq!(bridge.cached_accounts(), 0);
    })
    .await;
}

/// Test: a rejected connect restores the previous state and reports the refusal
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn rejected_connect_restores_state() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        *mock.connect_error.borrow_mut() = Some("User rejected the request".into());
        let errors = Rc::new(Cell::new(0usize));
        let config = {
            let errors = errors.clone();
            BridgeConfig::default().with_auto_connect(false).on_error(move |_| errors.set(errors.get() + 1))
        };
        let bridge = bridge_with(config, &mock);
        bridge.attach(mock.clone());

        assert_eq!(bridge.connect().await, None);
        assert_eq!(bridge.connection_state(), ConnectionState::Disconnected);
        assert_eq!(bridge.error().map(|e| e.kind), Some(ErrorKind::UserRejected));
        assert_eq!(errors.get(), 1);

        bridge.clear_error();
        assert!(bridge.error().is_none());
    })
    .await;
}

/// Test: signing, block and name actions pass results through
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn actions_pass_results_through() {
    local(async {
        let mock = Rc::new(MockProvider::default());
        mock.names.borrow_mut().insert("bob.ban".into(), BOB.into());
        let bridge = connected(&mock);

        let signed = bridge.sign_message("hi", Encoding::Utf8).await.unwrap();
        assert_eq!(signed.signature, "sig:hi");

        let block = block(ALICE);
        let signed_block = bridge.sign_block(&block).await.unwrap();
        assert!(signed_block.signature.is_some());
        assert_eq!(bridge.send_block(&signed_block).await.as_deref(), Some("BLOCKHASH"));

        assert_eq!(bridge.resolve_name("bob.ban").await.as_deref(), Some(BOB));
        assert_eq!(bridge.resolve_name("nobody.ban").await, None);
        assert_eq!(bridge.error().map(|e| e.kind), Some(ErrorKind::NameResolution));

        assert_eq!(bridge.get_accounts().await, vec![ALICE.to_string(), BOB.to_string()]);
    })
    .await;
}

// =============================================================================
// End to end with the reference wallet
// =============================================================================

/// Test: full session against MemoryWallet with real signatures and balances
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn memory_wallet_session() {
    local(async {
        let origin = "https://shop.example";
        let seed = [5u8; 32];
        let [alice, bob]: [String; 2] = MemoryWallet::from_seed(&seed, 2, origin).accounts().try_into().unwrap();
        let wallet = Rc::new(
            MemoryWallet::from_seed(&seed, 2, origin)
                .with_balance(alice.clone(), 10u128.pow(30))
                .with_name("bob.ban", bob.clone()),
        );
        let slot = {
            let wallet = wallet.clone();
            move || Some(wallet.clone() as Rc<dyn Provider>)
        };
        let bridge = Bridge::new(BridgeConfig::default(), slot, Rc::new(TokioTimer::new()));
        let runner = tokio::task::spawn_local({
            let bridge = bridge.clone();
            async move { bridge.run().await }
        });

        // Untrusted origin: silent reconnect fails quietly, explicit connect prompts.
        sleep_ms(1_000).await;
        assert_eq!(bridge.connection_state(), ConnectionState::Disconnected);
        assert_eq!(bridge.connect().await.as_deref(), Some(alice.as_str()));

        let info = bridge.get_account_info(None).await.unwrap();
        assert_eq!(info.balance.balance, "10");

        let hash = bridge.send_transaction("bob.ban", "2.5").await.unwrap();
        let info = bridge.get_account_info(None).await.unwrap();
        assert_eq!(info.balance.balance, "7.5");
        assert_eq!(info.frontier.as_deref(), Some(hash.as_str()));
        assert_eq!(bridge.get_balance(Some(&bob)).await.unwrap().pending, "2.5");

        let signed = bridge.sign_message("hello", Encoding::Utf8).await.unwrap();
        assert_eq!(bridge.verify_signed_message("hello", &signed.signature, &signed.public_key, Encoding::Utf8).await, Some(true));
        assert_eq!(bridge.verify_signed_message("hellO", &signed.signature, &signed.public_key, Encoding::Utf8).await, Some(false));

        wallet.switch_account(1).unwrap();
        sleep_ms(10).await;
        assert_eq!(bridge.public_key(), Some(bob.clone()));

        wallet.revoke();
        sleep_ms(10).await;
        assert_eq!(bridge.snapshot().affordance(), Affordance::Connect);

        bridge.detach();
        runner.await.unwrap();
    })
    .await;
}
