//! WASM module: the bridge bound to the browser
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        WalletBridge (JS API)            │
//! │  start, watch, snapshot, connect, ...   │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │        Bridge (shared core)             │
//! │  discovery, events, cache, actions      │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │   JsProvider (window.banano) + JsTimer  │
//! └─────────────────────────────────────────┘
//! ```

mod bridge;
mod provider;
mod timer;

pub use bridge::WalletBridge;
pub use provider::JsProvider;
pub use timer::JsTimer;

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::core::message::canonical_message as canonical;
use crate::core::{address, signature};

/// Initialize WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

macro_rules! log {
    ($($t:tt)*) => {
        crate::wasm::console_log(&format!($($t)*))
    }
}

pub(crate) use log;

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> JsValue {
    let serializer = serde_wasm_bindgen::Serializer::new().serialize_maps_as_objects(true);
    value.serialize(&serializer).unwrap_or(JsValue::NULL)
}

pub(crate) fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, serde_wasm_bindgen::Error> {
    serde_wasm_bindgen::from_value(value)
}

/// The exact text a wallet signs for `message` on `origin`.
#[wasm_bindgen(js_name = "canonicalMessage")]
pub fn canonical_message(origin: &str, message: &str) -> String {
    canonical(origin, message)
}

/// Check a signature locally, without the extension. Accepts a `ban_` address or hex key.
#[wasm_bindgen(js_name = "verifyMessageSignature")]
pub fn verify_message_signature(origin: &str, message: &str, signature_hex: &str, public_key: &str) -> Result<bool, JsValue> {
    let key = address::parse_public_key(public_key).map_err(|e| JsValue::from_str(&e.to_string()))?;
    signature::verify_message(&canonical(origin, message), signature_hex, &key)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
