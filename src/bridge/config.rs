//! Bridge configuration - passed from the hosting application

use std::fmt;
use std::rc::Rc;

use crate::core::constants::{cache, discovery, reconnect};

pub type ConnectCallback = Rc<dyn Fn(&str)>;
pub type DisconnectCallback = Rc<dyn Fn()>;
pub type ErrorCallback = Rc<dyn Fn(&str)>;

/// Bridge configuration. Callbacks are fire-and-forget; their results are ignored.
#[derive(Clone)]
pub struct BridgeConfig {
    pub auto_connect: bool,
    pub discovery_interval_ms: u64,
    pub discovery_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub account_info_ttl_ms: u64,
    pub on_connect: Option<ConnectCallback>,
    pub on_disconnect: Option<DisconnectCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            auto_connect: true,
            discovery_interval_ms: discovery::INTERVAL_MS,
            discovery_attempts: discovery::ATTEMPTS,
            reconnect_delay_ms: reconnect::DELAY_MS,
            account_info_ttl_ms: cache::ACCOUNT_INFO_TTL_MS,
            on_connect: None,
            on_disconnect: None,
            on_error: None,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_auto_connect(mut self, enabled: bool) -> Self { self.auto_connect = enabled; self }
    pub fn with_discovery(mut self, interval_ms: u64, attempts: u32) -> Self {
        self.discovery_interval_ms = interval_ms;
        self.discovery_attempts = attempts;
        self
    }
    pub fn with_reconnect_delay(mut self, ms: u64) -> Self { self.reconnect_delay_ms = ms; self }
    pub fn with_account_info_ttl(mut self, ms: u64) -> Self { self.account_info_ttl_ms = ms; self }
    pub fn on_connect(mut self, f: impl Fn(&str) + 'static) -> Self { self.on_connect = Some(Rc::new(f)); self }
    pub fn on_disconnect(mut self, f: impl Fn() + 'static) -> Self { self.on_disconnect = Some(Rc::new(f)); self }
    pub fn on_error(mut self, f: impl Fn(&str) + 'static) -> Self { self.on_error = Some(Rc::new(f)); self }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("auto_connect", &self.auto_connect)
            .field("discovery_interval_ms", &self.discovery_interval_ms)
            .field("discovery_attempts", &self.discovery_attempts)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("account_info_ttl_ms", &self.account_info_ttl_ms)
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
