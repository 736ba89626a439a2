//! WalletBridge: the [`Bridge`] exposed to JavaScript
//!
//! ```javascript
//! const wallet = new WalletBridge({ autoConnect: true, onError: (m) => toast(m) });
//! wallet.watch((snapshot) => render(snapshot));
//! wallet.start();
//!
//! const info = await wallet.getAccountInfo(); // null on failure; see snapshot().error
//! ```

use futures::StreamExt;
use js_sys::{Function, Reflect};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;

use super::provider::JsProvider;
use super::timer::JsTimer;
use super::{from_js, log, to_js};
use crate::bridge::{Bridge, BridgeConfig};
use crate::core::block::Block;
use crate::core::constants::discovery::GLOBAL_NAME;
use crate::provider::{Encoding, Provider};

fn option_bool(options: &JsValue, key: &str) -> Option<bool> {
    Reflect::get(options, &JsValue::from_str(key)).ok()?.as_bool()
}

fn option_string(options: &JsValue, key: &str) -> Option<String> {
    Reflect::get(options, &JsValue::from_str(key)).ok()?.as_string()
}

fn option_fn(options: &JsValue, key: &str) -> Option<Function> {
    Reflect::get(options, &JsValue::from_str(key)).ok()?.dyn_into::<Function>().ok()
}

fn config_from_js(options: &JsValue) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    if options.is_undefined() || options.is_null() {
        return config;
    }
    if let Some(auto_connect) = option_bool(options, "autoConnect") {
        config = config.with_auto_connect(auto_connect);
    }
    if let Some(f) = option_fn(options, "onConnect") {
        config = config.on_connect(move |public_key| {
            let _ = f.call1(&JsValue::NULL, &JsValue::from_str(public_key));
        });
    }
    if let Some(f) = option_fn(options, "onDisconnect") {
        config = config.on_disconnect(move || {
            let _ = f.call0(&JsValue::NULL);
        });
    }
    if let Some(f) = option_fn(options, "onError") {
        config = config.on_error(move |message| {
            let _ = f.call1(&JsValue::NULL, &JsValue::from_str(message));
        });
    }
    config
}

/// Reads `window[global]` on every probe; `None` until the extension has injected.
fn window_slot(global: String) -> impl Fn() -> Option<Rc<dyn Provider>> {
    move || {
        let window = web_sys::window()?;
        let value = Reflect::get(&window, &JsValue::from_str(&global)).ok()?;
        if value.is_undefined() || value.is_null() {
            return None;
        }
        Some(Rc::new(JsProvider::new(value)) as Rc<dyn Provider>)
    }
}

fn option_to_js<T: serde::Serialize>(value: Option<T>) -> JsValue {
    value.map(|v| to_js(&v)).unwrap_or(JsValue::NULL)
}

fn encoding(value: Option<String>) -> Encoding {
    value.as_deref().and_then(Encoding::from_str).unwrap_or_default()
}

#[wasm_bindgen]
pub struct WalletBridge {
    bridge: Bridge,
}

#[wasm_bindgen]
impl WalletBridge {
    /// Options: `{ autoConnect?, globalName?, onConnect?, onDisconnect?, onError? }`.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> WalletBridge {
        let global = option_string(&options, "globalName").unwrap_or_else(|| GLOBAL_NAME.to_string());
        log!("[WalletBridge] Looking for window.{}", global);
        let bridge = Bridge::new(config_from_js(&options), window_slot(global), Rc::new(JsTimer));
        Self { bridge }
    }

    /// Begin discovery, event subscription and silent reconnect in the background.
    #[wasm_bindgen]
    pub fn start(&self) {
        let bridge = self.bridge.clone();
        spawn_local(async move {
            bridge.run().await;
            log!("[WalletBridge] Event loop stopped");
        });
    }

    #[wasm_bindgen]
    pub fn detach(&self) {
        self.bridge.detach();
    }

    #[wasm_bindgen]
    pub fn snapshot(&self) -> JsValue {
        to_js(&self.bridge.snapshot())
    }

    /// Call `callback(snapshot)` after every state change.
    #[wasm_bindgen]
    pub fn watch(&self, callback: Function) {
        let mut rx = self.bridge.watch();
        spawn_local(async move {
            while let Some(snapshot) = rx.next().await {
                if let Err(e) = callback.call1(&JsValue::NULL, &to_js(&snapshot)) {
                    log!("[WalletBridge] Watch callback error: {:?}", e);
                }
            }
        });
    }

    #[wasm_bindgen(js_name = "clearError")]
    pub fn clear_error(&self) {
        self.bridge.clear_error();
    }

    #[wasm_bindgen]
    pub async fn connect(&self) -> Result<JsValue, JsValue> {
        Ok(option_to_js(self.bridge.clone().connect().await))
    }

    #[wasm_bindgen]
    pub async fn disconnect(&self) -> Result<JsValue, JsValue> {
        Ok(JsValue::from_bool(self.bridge.clone().disconnect().await))
    }

    #[wasm_bindgen(js_name = "getAccounts")]
    pub async fn get_accounts(&self) -> Result<JsValue, JsValue> {
        Ok(to_js(&self.bridge.clone().get_accounts().await))
    }

    #[wasm_bindgen(js_name = "getBalance")]
    pub async fn get_balance(&self, address: Option<String>) -> Result<JsValue, JsValue> {
        Ok(option_to_js(self.bridge.clone().get_balance(address.as_deref()).await))
    }

    #[wasm_bindgen(js_name = "getAccountInfo")]
    pub async fn get_account_info(&self, address: Option<String>) -> Result<JsValue, JsValue> {
        Ok(option_to_js(self.bridge.clone().get_account_info(address.as_deref()).await))
    }

    #[wasm_bindgen(js_name = "sendTransaction")]
    pub async fn send_transaction(&self, to: String, amount: String) -> Result<JsValue, JsValue> {
        Ok(option_to_js(self.bridge.clone().send_transaction(&to, &amount).await))
    }

    #[wasm_bindgen(js_name = "signMessage")]
    pub async fn sign_message(&self, message: String, encoding_name: Option<String>) -> Result<JsValue, JsValue> {
        Ok(option_to_js(self.bridge.clone().sign_message(&message, encoding(encoding_name)).await))
    }

    #[wasm_bindgen(js_name = "verifySignedMessage")]
    pub async fn verify_signed_message(&self, message: String, signature: String, public_key: String, encoding_name: Option<String>) -> Result<JsValue, JsValue> {
        let bridge = self.bridge.clone();
        Ok(option_to_js(bridge.verify_signed_message(&message, &signature, &public_key, encoding(encoding_name)).await))
    }

    #[wasm_bindgen(js_name = "signBlock")]
    pub async fn sign_block(&self, block: JsValue) -> Result<JsValue, JsValue> {
        let block: Block = from_js(block).map_err(|e| JsValue::from_str(&format!("invalid block: {e}")))?;
        Ok(option_to_js(self.bridge.clone().sign_block(&block).await))
    }

    #[wasm_bindgen(js_name = "sendBlock")]
    pub async fn send_block(&self, block: JsValue) -> Result<JsValue, JsValue> {
        let block: Block = from_js(block).map_err(|e| JsValue::from_str(&format!("invalid block: {e}")))?;
        Ok(option_to_js(self.bridge.clone().send_block(&block).await))
    }

    #[wasm_bindgen(js_name = "resolveName")]
    pub async fn resolve_name(&self, name: String) -> Result<JsValue, JsValue> {
        Ok(option_to_js(self.bridge.clone().resolve_name(&name).await))
    }
}
