//! MemoryWallet - in-process reference wallet
//!
//! Behaves like the extension from the page's point of view: origin trust,
//! lock state, user prompts, lifecycle events, real ed25519-blake2b signatures.
//! Used by the CLI demo and tests.

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use std::cell::RefCell;
use std::collections::HashMap;

use super::{
    AccountInfo, Balance, ConnectOptions, ConnectResponse, Encoding, EventStream, Provider,
    ProviderError, ProviderEvent, ProviderResult, SignedMessage,
};
use crate::core::address;
use crate::core::amount::{self, raw_to_ban};
use crate::core::block::Block;
use crate::core::message::canonical_message;
use crate::core::signature::{self, Keypair};

const EMPTY_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Default)]
struct WalletState {
    trusted: bool,
    connected: bool,
    locked: bool,
    reject_prompts: bool,
    active: usize,
    balances: HashMap<String, u128>,
    pending: HashMap<String, u128>,
    frontiers: HashMap<String, String>,
    block_counts: HashMap<String, u64>,
    names: HashMap<String, String>,
}

pub struct MemoryWallet {
    origin: String,
    keys: Vec<Keypair>,
    state: RefCell<WalletState>,
    subscribers: RefCell<Vec<mpsc::UnboundedSender<ProviderEvent>>>,
}

impl MemoryWallet {
    /// Derive `count` accounts from `seed`; signatures are bound to `origin`.
    pub fn from_seed(seed: &[u8; 32], count: u32, origin: impl Into<String>) -> Self {
        let keys = (0..count.max(1)).map(|i| Keypair::from_seed(seed, i)).collect();
        Self {
            origin: origin.into(),
            keys,
            state: RefCell::new(WalletState::default()),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub fn with_balance(self, address: impl Into<String>, raw: u128) -> Self {
        self.state.borrow_mut().balances.insert(address.into(), raw);
        self
    }

    pub fn with_pending(self, address: impl Into<String>, raw: u128) -> Self {
        self.state.borrow_mut().pending.insert(address.into(), raw);
        self
    }

    pub fn with_name(self, name: &str, address: impl Into<String>) -> Self {
        self.state.borrow_mut().names.insert(name.to_ascii_lowercase(), address.into());
        self
    }

    /// Pretend the user approved this origin in an earlier session.
    pub fn trusted(self) -> Self {
        self.state.borrow_mut().trusted = true;
        self
    }

    pub fn origin(&self) -> &str { &self.origin }

    pub fn accounts(&self) -> Vec<String> {
        self.keys.iter().map(|k| k.address()).collect()
    }

    pub fn active_account(&self) -> String {
        self.keys[self.state.borrow().active].address()
    }

    pub fn is_connected(&self) -> bool { self.state.borrow().connected }

    pub fn set_locked(&self, locked: bool) { self.state.borrow_mut().locked = locked; }

    /// Answer every future prompt with "reject".
    pub fn set_reject_prompts(&self, reject: bool) { self.state.borrow_mut().reject_prompts = reject; }

    pub fn balance_raw(&self, address: &str) -> u128 {
        self.state.borrow().balances.get(address).copied().unwrap_or(0)
    }

    /// Select another account and notify subscribers (legacy `accountChanged`).
    pub fn switch_account(&self, index: usize) -> ProviderResult<String> {
        let key = self.keys.get(index).ok_or_else(|| ProviderError::new("no such account"))?;
        let address = key.address();
        self.state.borrow_mut().active = index;
        self.emit(ProviderEvent::AccountChanged { public_key: address.clone() });
        Ok(address)
    }

    /// Simulate the extension revoking the session from its own UI.
    pub fn revoke(&self) {
        self.state.borrow_mut().connected = false;
        self.emit(ProviderEvent::Disconnect);
    }

    pub fn emit(&self, event: ProviderEvent) {
        self.subscribers
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    fn key_for(&self, address: &str) -> ProviderResult<&Keypair> {
        self.keys
            .iter()
            .find(|k| k.address() == address)
            .ok_or_else(|| ProviderError::new(format!("account {address} is not in this wallet")))
    }

    fn ensure_connected(&self) -> ProviderResult<()> {
        let state = self.state.borrow();
        if state.locked {
            return Err(ProviderError::new("Wallet is locked"));
        }
        if !state.connected {
            return Err(ProviderError::new("Not connected. Call connect() first"));
        }
        Ok(())
    }

    fn prompt(&self) -> ProviderResult<()> {
        if self.state.borrow().reject_prompts {
            return Err(ProviderError::new("User rejected the request"));
        }
        Ok(())
    }

    fn target(&self, address: Option<&str>) -> String {
        address.map(str::to_string).unwrap_or_else(|| self.active_account())
    }

    fn balance_of(&self, address: &str) -> Balance {
        let state = self.state.borrow();
        let raw = state.balances.get(address).copied().unwrap_or(0);
        let pending = state.pending.get(address).copied().unwrap_or(0);
        Balance {
            balance: raw_to_ban(raw),
            balance_raw: raw.to_string(),
            pending: raw_to_ban(pending),
            pending_raw: pending.to_string(),
        }
    }

    fn apply_block(&self, block: &Block, hash: &str) -> ProviderResult<()> {
        let new_balance = amount::parse_raw(&block.balance).map_err(|e| ProviderError::new(e.to_string()))?;
        let mut state = self.state.borrow_mut();
        let old_balance = state.balances.get(&block.account).copied().unwrap_or(0);
        if new_balance < old_balance && address::is_address(&block.link) {
            *state.pending.entry(block.link.clone()).or_default() += old_balance - new_balance;
        }
        state.balances.insert(block.account.clone(), new_balance);
        state.frontiers.insert(block.account.clone(), hash.to_string());
        *state.block_counts.entry(block.account.clone()).or_default() += 1;
        Ok(())
    }
}

#[async_trait(?Send)]
impl Provider for MemoryWallet {
    async fn connect(&self, options: ConnectOptions) -> ProviderResult<ConnectResponse> {
        {
            let state = self.state.borrow();
            if options.only_if_trusted && !state.trusted {
                return Err(ProviderError::new("Origin is not trusted"));
            }
            if state.locked {
                return Err(ProviderError::new("Wallet is locked"));
            }
        }
        if !options.only_if_trusted {
            self.prompt()?;
        }
        {
            let mut state = self.state.borrow_mut();
            state.trusted = true;
            state.connected = true;
        }
        let response = ConnectResponse { public_key: self.active_account(), accounts: self.accounts() };
        self.emit(ProviderEvent::Connect {
            public_key: response.public_key.clone(),
            accounts: Some(response.accounts.clone()),
        });
        Ok(response)
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.state.borrow_mut().connected = false;
        self.emit(ProviderEvent::Disconnect);
        Ok(())
    }

    async fn get_accounts(&self) -> ProviderResult<Vec<String>> {
        self.ensure_connected()?;
        Ok(self.accounts())
    }

    async fn get_balance(&self, address: Option<&str>) -> ProviderResult<Balance> {
        Ok(self.balance_of(&self.target(address)))
    }

    async fn get_account_info(&self, address: Option<&str>) -> ProviderResult<AccountInfo> {
        let address = self.target(address);
        address::address_to_public_key(&address).map_err(|e| ProviderError::new(format!("Invalid address: {e}")))?;
        let state = self.state.borrow();
        Ok(AccountInfo {
            balance: self.balance_of(&address),
            representative: Some(self.keys[0].address()),
            frontier: state.frontiers.get(&address).cloned(),
            block_count: Some(state.block_counts.get(&address).copied().unwrap_or(0)),
            address,
        })
    }

    async fn sign_message(&self, message: &str, encoding: Encoding) -> ProviderResult<SignedMessage> {
        self.ensure_connected()?;
        self.prompt()?;
        let text = encoding.decode(message)?;
        let key = self.key_for(&self.active_account())?;
        Ok(SignedMessage {
            signature: key.sign_message(&canonical_message(&self.origin, &text)),
            public_key: key.address(),
        })
    }

    async fn verify_signed_message(&self, message: &str, signature_hex: &str, public_key: &str, encoding: Encoding) -> ProviderResult<bool> {
        let text = encoding.decode(message)?;
        let key = address::parse_public_key(public_key).map_err(|e| ProviderError::new(e.to_string()))?;
        signature::verify_message(&canonical_message(&self.origin, &text), signature_hex, &key)
            .map_err(|e| ProviderError::new(e.to_string()))
    }

    async fn sign_block(&self, block: &Block) -> ProviderResult<Block> {
        self.ensure_connected()?;
        self.prompt()?;
        let key = self.key_for(&block.account)?;
        let hash = block.hash().map_err(|e| ProviderError::new(e.to_string()))?;
        let mut signed = block.clone();
        signed.signature = Some(key.sign(&hash));
        Ok(signed)
    }

    async fn send_transaction(&self, from: &str, to: &str, amount: &str) -> ProviderResult<String> {
        self.ensure_connected()?;
        address::address_to_public_key(to).map_err(|e| ProviderError::new(format!("Invalid destination: {e}")))?;
        let raw = amount::ban_to_raw(amount).map_err(|e| ProviderError::new(e.to_string()))?;
        let key = self.key_for(from)?;
        let current = self.balance_raw(from);
        let remaining = current
            .checked_sub(raw)
            .ok_or_else(|| ProviderError::new("Insufficient balance"))?;
        self.prompt()?;

        let previous = self.state.borrow().frontiers.get(from).cloned().unwrap_or_else(|| EMPTY_HASH.into());
        let mut block = Block {
            type_: "state".into(),
            account: from.to_string(),
            previous,
            representative: self.keys[0].address(),
            balance: remaining.to_string(),
            link: to.to_string(),
            signature: None,
            work: None,
        };
        let hash = block.hash().map_err(|e| ProviderError::new(e.to_string()))?;
        block.signature = Some(key.sign(&hash));
        let hash_hex = hex::encode_upper(hash);
        self.apply_block(&block, &hash_hex)?;
        Ok(hash_hex)
    }

    async fn send_block(&self, block: &Block) -> ProviderResult<String> {
        self.ensure_connected()?;
        let hash = block.hash().map_err(|e| ProviderError::new(e.to_string()))?;
        let signature_hex = block.signature.as_deref().ok_or_else(|| ProviderError::new("Block is not signed"))?;
        let key = address::address_to_public_key(&block.account).map_err(|e| ProviderError::new(e.to_string()))?;
        let valid = signature::verify(&hash, signature_hex, &key).map_err(|e| ProviderError::new(e.to_string()))?;
        if !valid {
            return Err(ProviderError::new("Bad block signature"));
        }
        let hash_hex = hex::encode_upper(hash);
        self.apply_block(block, &hash_hex)?;
        Ok(hash_hex)
    }

    async fn resolve_bns(&self, name: &str) -> ProviderResult<Option<String>> {
        Ok(self.state.borrow().names.get(&name.trim().to_ascii_lowercase()).cloned())
    }

    fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.borrow_mut().push(tx);
        rx.boxed_local()
    }
}
