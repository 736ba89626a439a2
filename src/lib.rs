//! MonkeyMask bridge: page-side connection management for the Banano wallet extension.
//!
//! # Architecture
//!
//! ```text
//! Bridge (entry point)
//!   │
//!   ├── ProviderSlot ──► Provider (injected by the extension, or MemoryWallet)
//!   │                      └── EventStream: connect / disconnect / accountChanged
//!   │
//!   ├── Session (install + connection + active account + last error)
//!   │     └── watch() → stream of BridgeSnapshot
//!   │
//!   └── AccountCache (5s TTL, single-flight per address)
//!
//! server (native)  POST /verify-signature over core::{message, signature, address}
//! wasm             WalletBridge: the same Bridge bound to window.banano
//! ```
//!
//! # Features
//!
//! - `native` - tokio timer, in-memory reference wallet, HTTP verifier, CLI
//! - `wasm` - browser bindings (wasm-bindgen, `window.banano`)
//!
//! # Usage
//!
//! ```ignore
//! use monkeymask_bridge::{Bridge, BridgeConfig, MemoryWallet, TokioTimer};
//!
//! let wallet = Rc::new(MemoryWallet::from_seed(&seed, 2, "https://app.example").trusted());
//! let slot = { let w = wallet.clone(); move || Some(w.clone() as Rc<dyn Provider>) };
//! let bridge = Bridge::new(BridgeConfig::default(), slot, Rc::new(TokioTimer::new()));
//!
//! tokio::task::spawn_local({ let b = bridge.clone(); async move { b.run().await } });
//! let info = bridge.get_account_info(None).await;
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod bridge;
pub mod core;
pub mod provider;

// =============================================================================
// Native-only modules (server, CLI, tokio)
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;
#[cfg(feature = "native")]
pub mod runtime;
#[cfg(feature = "native")]
pub mod server;

// =============================================================================
// WASM-only modules (browser, wasm-bindgen)
// =============================================================================
#[cfg(feature = "wasm")]
pub mod wasm;

// =============================================================================
// Re-exports: Shared
// =============================================================================
pub use bridge::{
    ActiveAccount, Affordance, Bridge, BridgeConfig, BridgeError, BridgeSnapshot, ConnectionState, ErrorKind,
    InstallState, Timer,
};
pub use core::block::Block;
pub use core::message::canonical_message;
pub use provider::{
    AccountInfo, Balance, ConnectOptions, ConnectResponse, Encoding, Provider, ProviderError, ProviderEvent,
    ProviderSlot, SignedMessage,
};

// =============================================================================
// Re-exports: Native
// =============================================================================
#[cfg(feature = "native")]
pub use bridge::TokioTimer;
#[cfg(feature = "native")]
pub use core::signature::Keypair;
#[cfg(feature = "native")]
pub use provider::MemoryWallet;
#[cfg(feature = "native")]
pub use server::{create_router, serve, ServerConfig};

// =============================================================================
// Re-exports: WASM
// =============================================================================
#[cfg(feature = "wasm")]
pub use wasm::WalletBridge;
