//! Error classification
//!
//! The extension only reports free-form text, so the taxonomy is recovered by
//! substring matching. Matching is case-insensitive.
//!
//! | Kind | Matched on | Effect |
//! |------|------------|--------|
//! | CapabilityLost | context invalidated, channel/port closed | session forced to disconnected |
//! | WalletLocked | "locked" | advisory, nothing reset |
//! | UserRejected | rejected, denied, cancelled | benign outcome |
//! | Provider | anything else | message surfaced verbatim |

use serde::Serialize;

use crate::provider::ProviderError;

const CAPABILITY_LOST: &[&str] = &[
    "extension context invalidated",
    "session invalidated",
    "message channel closed",
    "message port closed",
    "receiving end does not exist",
];
const LOCKED: &[&str] = &["locked"];
const REJECTED: &[&str] = &["rejected", "denied", "cancelled", "canceled"];

pub const CAPABILITY_LOST_MESSAGE: &str = "Connection to MonkeyMask was lost. Please reload the page.";
pub const LOCKED_MESSAGE: &str = "MonkeyMask is locked. It will prompt you to unlock.";
pub const REJECTED_MESSAGE: &str = "Request was cancelled in MonkeyMask.";
pub const NOT_INSTALLED_MESSAGE: &str = "MonkeyMask is not installed.";
pub const NOT_CONNECTED_MESSAGE: &str = "Wallet is not connected.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    NotInstalled,
    NotConnected,
    CapabilityLost,
    WalletLocked,
    UserRejected,
    NameResolution,
    InvalidInput,
    Provider,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct BridgeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BridgeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn not_installed() -> Self { Self::new(ErrorKind::NotInstalled, NOT_INSTALLED_MESSAGE) }
    pub fn not_connected() -> Self { Self::new(ErrorKind::NotConnected, NOT_CONNECTED_MESSAGE) }
    pub fn invalid_input(message: impl Into<String>) -> Self { Self::new(ErrorKind::InvalidInput, message) }

    pub fn unresolved_name(name: &str) -> Self {
        Self::new(ErrorKind::NameResolution, format!("Could not resolve '{name}' to an address."))
    }

    /// Expected outcomes the UI may show without an error style.
    pub fn is_benign(&self) -> bool {
        matches!(self.kind, ErrorKind::UserRejected | ErrorKind::WalletLocked)
    }

    /// The current session is unusable and must be rebuilt.
    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::CapabilityLost
    }
}

pub fn classify(err: &ProviderError) -> BridgeError {
    let lower = err.message.to_ascii_lowercase();
    let matches = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if matches(CAPABILITY_LOST) {
        BridgeError::new(ErrorKind::CapabilityLost, CAPABILITY_LOST_MESSAGE)
    } else if matches(LOCKED) {
        BridgeError::new(ErrorKind::WalletLocked, LOCKED_MESSAGE)
    } else if matches(REJECTED) {
        BridgeError::new(ErrorKind::UserRejected, REJECTED_MESSAGE)
    } else {
        BridgeError::new(ErrorKind::Provider, err.message.clone())
    }
}

/// Name lookups keep fatal/benign kinds but report everything else as a resolution failure.
pub fn classify_resolution(name: &str, err: &ProviderError) -> BridgeError {
    let classified = classify(err);
    if classified.kind == ErrorKind::Provider {
        BridgeError::new(ErrorKind::NameResolution, format!("Could not resolve '{name}': {}", err.message))
    } else {
        classified
    }
}
