//! Account-info cache with single-flight de-duplication
//!
//! Two maps keyed by address:
//! - `entries`: settled snapshots with their capture time (TTL checked on read)
//! - `in_flight`: the shared pending fetch, so concurrent readers await one call
//!
//! Every session-wide invalidation bumps `epoch`; invalidating one address bumps
//! that address's generation. A fetch records both when it starts and only writes
//! back if neither moved, so a reply that raced a disconnect, an account switch or
//! a send can never masquerade as current data.

use futures::future::{LocalBoxFuture, Shared};
use std::collections::HashMap;

use crate::provider::{AccountInfo, ProviderResult};

pub(crate) type SharedFetch = Shared<LocalBoxFuture<'static, ProviderResult<AccountInfo>>>;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub info: AccountInfo,
    pub captured_at_ms: u64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.captured_at_ms) < ttl_ms
    }
}

/// Identifies the cache state a fetch started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FetchToken {
    epoch: u64,
    generation: u64,
}

struct InFlight {
    token: FetchToken,
    fetch: SharedFetch,
}

#[derive(Default)]
pub(crate) struct AccountCache {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, InFlight>,
    generations: HashMap<String, u64>,
    epoch: u64,
}

impl AccountCache {
    pub fn token(&self, address: &str) -> FetchToken {
        FetchToken { epoch: self.epoch, generation: self.generations.get(address).copied().unwrap_or(0) }
    }

    pub fn fresh(&self, address: &str, now_ms: u64, ttl_ms: u64) -> Option<AccountInfo> {
        self.entries
            .get(address)
            .filter(|e| e.is_fresh(now_ms, ttl_ms))
            .map(|e| e.info.clone())
    }

    pub fn in_flight(&self, address: &str) -> Option<SharedFetch> {
        self.in_flight.get(address).map(|f| f.fetch.clone())
    }

    pub fn begin(&mut self, address: &str, token: FetchToken, fetch: SharedFetch) {
        self.in_flight.insert(address.to_string(), InFlight { token, fetch });
    }

    /// Drop this fetch's registry slot; keep a success only if nothing was invalidated meanwhile.
    pub fn settle(&mut self, address: &str, token: FetchToken, result: &ProviderResult<AccountInfo>, now_ms: u64) {
        if self.in_flight.get(address).is_some_and(|f| f.token == token) {
            self.in_flight.remove(address);
        }
        if token != self.token(address) {
            tracing::debug!(address, "discarding account info fetched before an invalidation");
            return;
        }
        if let Ok(info) = result {
            self.entries.insert(address.to_string(), CacheEntry { info: info.clone(), captured_at_ms: now_ms });
        }
    }

    /// Forget one address, including a fetch that is still running for it.
    pub fn invalidate(&mut self, address: &str) {
        self.entries.remove(address);
        self.in_flight.remove(address);
        *self.generations.entry(address.to_string()).or_default() += 1;
    }

    pub fn invalidate_all(&mut self) {
        self.epoch += 1;
        self.entries.clear();
        self.in_flight.clear();
        self.generations.clear();
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn pending(&self) -> usize { self.in_flight.len() }
}
