//! Provider: the wallet capability surface injected by the browser extension.
//!
//! The bridge never constructs a provider. It finds one through a [`ProviderSlot`]
//! (the page's global binding), then talks to it only through this trait.
//!
//! ```text
//! ProviderSlot::lookup() ──► Rc<dyn Provider>
//!                              │
//!                              ├── async calls: connect, getAccountInfo, signMessage, ...
//!                              │
//!                              └── subscribe() ──► stream of ProviderEvent
//!                                                   connect / disconnect / accountChanged
//! ```
//!
//! Execution is single-threaded: implementations are `!Send` (a JS object in the
//! browser, an `Rc` in tests) and futures are polled on one local executor.

#[cfg(feature = "native")]
mod memory;

#[cfg(feature = "native")]
pub use memory::MemoryWallet;

use async_trait::async_trait;
use futures::stream::LocalBoxStream;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::core::block::Block;

/// Failure reported by the extension. Only the message text is contractual.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Lifecycle notifications, delivered in causal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Connect { public_key: String, accounts: Option<Vec<String>> },
    Disconnect,
    /// Legacy single-account notification.
    AccountChanged { public_key: String },
}

/// Event subscription. Dropping it releases whatever the provider registered for it.
pub type EventStream = LocalBoxStream<'static, ProviderEvent>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    /// Never prompt; fail unless the origin was already approved.
    pub only_if_trusted: bool,
}

impl ConnectOptions {
    pub fn interactive() -> Self { Self { only_if_trusted: false } }
    pub fn silent() -> Self { Self { only_if_trusted: true } }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub public_key: String,
    #[serde(default)]
    pub accounts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    /// Display units (BAN).
    pub balance: String,
    pub balance_raw: String,
    pub pending: String,
    pub pending_raw: String,
}

/// Account metadata snapshot; the balance fields are flattened in from [`Balance`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub address: String,
    #[serde(flatten)]
    pub balance: Balance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Hex,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Hex => "hex",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" | "text" => Some(Encoding::Utf8),
            "hex" => Some(Encoding::Hex),
            _ => None,
        }
    }

    /// Message text as the wallet displays and signs it.
    pub fn decode(&self, message: &str) -> ProviderResult<String> {
        match self {
            Encoding::Utf8 => Ok(message.to_string()),
            Encoding::Hex => {
                let bytes = hex::decode(message).map_err(|e| ProviderError::new(format!("invalid hex message: {e}")))?;
                String::from_utf8(bytes).map_err(|e| ProviderError::new(format!("message is not utf8: {e}")))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    pub signature: String,
    pub public_key: String,
}

/// Wallet capability surface.
#[async_trait(?Send)]
pub trait Provider {
    async fn connect(&self, options: ConnectOptions) -> ProviderResult<ConnectResponse>;
    async fn disconnect(&self) -> ProviderResult<()>;
    async fn get_accounts(&self) -> ProviderResult<Vec<String>>;
    async fn get_balance(&self, address: Option<&str>) -> ProviderResult<Balance>;
    async fn get_account_info(&self, address: Option<&str>) -> ProviderResult<AccountInfo>;
    async fn sign_message(&self, message: &str, encoding: Encoding) -> ProviderResult<SignedMessage>;
    async fn verify_signed_message(&self, message: &str, signature: &str, public_key: &str, encoding: Encoding) -> ProviderResult<bool>;
    async fn sign_block(&self, block: &Block) -> ProviderResult<Block>;
    async fn send_transaction(&self, from: &str, to: &str, amount: &str) -> ProviderResult<String>;
    async fn send_block(&self, block: &Block) -> ProviderResult<String>;
    /// `Ok(None)` when the name is not registered.
    async fn resolve_bns(&self, name: &str) -> ProviderResult<Option<String>>;

    /// Subscribe to lifecycle events. Dropping the stream unsubscribes.
    fn subscribe(&self) -> EventStream;
}

/// The well-known global binding the extension injects into.
pub trait ProviderSlot {
    fn lookup(&self) -> Option<Rc<dyn Provider>>;
}

impl<F> ProviderSlot for F
where
    F: Fn() -> Option<Rc<dyn Provider>>,
{
    fn lookup(&self) -> Option<Rc<dyn Provider>> {
        self()
    }
}
