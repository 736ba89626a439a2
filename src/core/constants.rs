//! Timing, naming and message constants
//!
//! Centralized registry for the values the bridge and verifier agree on.

/// Provider discovery (extension content-script injection race)
pub mod discovery {
    /// Delay between probes of the global slot.
    pub const INTERVAL_MS: u64 = 500;
    /// Retries after the initial probe before giving up for the session.
    pub const ATTEMPTS: u32 = 3;
    /// Default `window` property the extension injects.
    pub const GLOBAL_NAME: &str = "banano";
}

/// Silent reconnection
pub mod reconnect {
    /// Runs after the extension's own best-effort reconnect.
    pub const DELAY_MS: u64 = 800;
}

/// Account-info cache
pub mod cache {
    pub const ACCOUNT_INFO_TTL_MS: u64 = 5_000;
}

/// Banano accounts and names
pub mod account {
    pub const PREFIX: &str = "ban_";
    /// Reserved suffixes marking a human-readable (BNS) name.
    pub const NAME_SUFFIXES: &[&str] = &[".ban"];
    /// 10^29 raw per BAN.
    pub const RAW_DECIMALS: u32 = 29;
}

/// Signed-message domain separation
pub mod message {
    pub const PREAMBLE: &str = "MonkeyMask Signed Message:";
    pub const ORIGIN_LABEL: &str = "Origin: ";
    pub const MESSAGE_LABEL: &str = "Message: ";
}

/// Provider lifecycle event names
pub mod events {
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const ACCOUNT_CHANGED: &str = "accountChanged";
}
