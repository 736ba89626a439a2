//! Reactive session state owned by the bridge. UI code reads snapshots only.

use serde::Serialize;

use super::errors::BridgeError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Whether the extension was found in the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallState {
    #[default]
    Detecting,
    Installed,
    /// Discovery exhausted; terminal until the page reloads.
    NotInstalled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAccount {
    pub public_key: String,
    /// Authorized accounts; never empty, contains `public_key` by default.
    pub accounts: Vec<String>,
}

/// What the UI should offer the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Affordance {
    Detecting,
    Install,
    Connect,
    Connected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeSnapshot {
    pub install: InstallState,
    pub connection: ConnectionState,
    pub account: Option<ActiveAccount>,
    pub error: Option<BridgeError>,
}

impl BridgeSnapshot {
    pub fn is_installed(&self) -> bool { self.install == InstallState::Installed }
    pub fn is_connected(&self) -> bool { self.connection == ConnectionState::Connected }
    pub fn public_key(&self) -> Option<&str> { self.account.as_ref().map(|a| a.public_key.as_str()) }

    pub fn affordance(&self) -> Affordance {
        match (self.install, self.connection) {
            (InstallState::Detecting, _) => Affordance::Detecting,
            (InstallState::NotInstalled, _) => Affordance::Install,
            (InstallState::Installed, ConnectionState::Connected) => Affordance::Connected,
            (InstallState::Installed, _) => Affordance::Connect,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Session {
    pub install: InstallState,
    pub connection: ConnectionState,
    pub account: Option<ActiveAccount>,
    pub error: Option<BridgeError>,
    /// Suppresses silent reconnection only; explicit connects ignore it.
    pub user_disconnected: bool,
}

impl Session {
    pub fn snapshot(&self) -> BridgeSnapshot {
        BridgeSnapshot {
            install: self.install,
            connection: self.connection,
            account: self.account.clone(),
            error: self.error.clone(),
        }
    }
}
