//! JsProvider: the injected `window.banano` object behind the [`Provider`] trait.

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use js_sys::{Array, Function, Promise, Reflect};
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::task::{Context, Poll};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use super::{from_js, to_js};
use crate::core::block::Block;
use crate::core::constants::events;
use crate::provider::{
    AccountInfo, Balance, ConnectOptions, ConnectResponse, Encoding, EventStream, Provider, ProviderError,
    ProviderEvent, ProviderResult, SignedMessage,
};

type Listener = Closure<dyn FnMut(JsValue)>;

pub struct JsProvider {
    target: JsValue,
}

impl JsProvider {
    pub fn new(target: JsValue) -> Self {
        Self { target }
    }

    fn method(&self, name: &str) -> ProviderResult<Function> {
        method(&self.target, name)
    }

    /// Invoke `target[name](...args)` and await the result if it is a promise.
    async fn call(&self, name: &str, args: &[JsValue]) -> ProviderResult<JsValue> {
        let func = self.method(name)?;
        let argv: Array = args.iter().collect();
        let result = func.apply(&self.target, &argv).map_err(js_error)?;
        JsFuture::from(Promise::resolve(&result)).await.map_err(js_error)
    }

    async fn call_as<T: DeserializeOwned>(&self, name: &str, args: &[JsValue]) -> ProviderResult<T> {
        let value = self.call(name, args).await?;
        from_js(value).map_err(|e| ProviderError::new(format!("unexpected {name}() result: {e}")))
    }

    fn listen(&self, event: &'static str, tx: mpsc::UnboundedSender<ProviderEvent>) -> Option<Listener> {
        let Ok(on) = self.method("on") else {
            tracing::warn!(event, "provider has no on(); lifecycle events unavailable");
            return None;
        };
        let listener = Closure::wrap(Box::new(move |payload: JsValue| {
            if let Some(parsed) = parse_event(event, &payload) {
                let _ = tx.unbounded_send(parsed);
            }
        }) as Box<dyn FnMut(JsValue)>);
        if let Err(e) = on.call2(&self.target, &JsValue::from_str(event), listener.as_ref().unchecked_ref()) {
            tracing::warn!(event, error = %js_error(e), "failed to register provider listener");
            return None;
        }
        Some(listener)
    }
}

fn method(target: &JsValue, name: &str) -> ProviderResult<Function> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
        .ok_or_else(|| ProviderError::new(format!("provider does not support {name}()")))
}

/// One `subscribe()` call: its receiver plus the listeners it registered.
/// Dropping it removes exactly those listeners from the provider.
struct Subscription {
    target: JsValue,
    listeners: Vec<(&'static str, Listener)>,
    events: mpsc::UnboundedReceiver<ProviderEvent>,
}

impl Stream for Subscription {
    type Item = ProviderEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ProviderEvent>> {
        self.events.poll_next_unpin(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Ok(off) = method(&self.target, "removeListener").or_else(|_| method(&self.target, "off")) else {
            tracing::debug!("provider has no removeListener(); listeners left registered");
            return;
        };
        for (event, listener) in self.listeners.drain(..) {
            let _ = off.call2(&self.target, &JsValue::from_str(event), listener.as_ref().unchecked_ref());
        }
    }
}

fn optional(address: Option<&str>) -> JsValue {
    address.map(JsValue::from_str).unwrap_or(JsValue::UNDEFINED)
}

/// Best-effort text of a thrown value: `Error.message`, a bare string, or its debug form.
pub(crate) fn js_error(value: JsValue) -> ProviderError {
    let message = Reflect::get(&value, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"));
    ProviderError::new(message)
}

fn string_field(value: &JsValue, field: &str) -> Option<String> {
    value.as_string().or_else(|| Reflect::get(value, &JsValue::from_str(field)).ok()?.as_string())
}

fn parse_event(event: &str, payload: &JsValue) -> Option<ProviderEvent> {
    match event {
        events::CONNECT => {
            let public_key = string_field(payload, "publicKey")?;
            let accounts = Reflect::get(payload, &JsValue::from_str("accounts"))
                .ok()
                .filter(Array::is_array)
                .map(|a| Array::from(&a).iter().filter_map(|v| v.as_string()).collect());
            Some(ProviderEvent::Connect { public_key, accounts })
        }
        events::ACCOUNT_CHANGED => string_field(payload, "publicKey").map(|public_key| ProviderEvent::AccountChanged { public_key }),
        events::DISCONNECT => Some(ProviderEvent::Disconnect),
        _ => None,
    }
}

#[async_trait(?Send)]
impl Provider for JsProvider {
    async fn connect(&self, options: ConnectOptions) -> ProviderResult<ConnectResponse> {
        let value = self.call("connect", &[to_js(&options)]).await?;
        let public_key = string_field(&value, "publicKey")
            .ok_or_else(|| ProviderError::new("connect() returned no public key"))?;
        let accounts = from_js::<ConnectResponse>(value).map(|r| r.accounts).unwrap_or_default();
        Ok(ConnectResponse { public_key, accounts })
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.call("disconnect", &[]).await.map(|_| ())
    }

    async fn get_accounts(&self) -> ProviderResult<Vec<String>> {
        self.call_as("getAccounts", &[]).await
    }

    async fn get_balance(&self, address: Option<&str>) -> ProviderResult<Balance> {
        self.call_as("getBalance", &[optional(address)]).await
    }

    async fn get_account_info(&self, address: Option<&str>) -> ProviderResult<AccountInfo> {
        self.call_as("getAccountInfo", &[optional(address)]).await
    }

    async fn sign_message(&self, message: &str, encoding: Encoding) -> ProviderResult<SignedMessage> {
        let value = self.call("signMessage", &[JsValue::from_str(message), JsValue::from_str(encoding.as_str())]).await?;
        match value.as_string() {
            Some(signature) => Ok(SignedMessage { signature, public_key: String::new() }),
            None => from_js(value).map_err(|e| ProviderError::new(format!("unexpected signMessage() result: {e}"))),
        }
    }

    async fn verify_signed_message(&self, message: &str, signature: &str, public_key: &str, encoding: Encoding) -> ProviderResult<bool> {
        let args = [message, signature, public_key, encoding.as_str()].map(JsValue::from_str);
        Ok(self.call("verifySignedMessage", &args).await?.is_truthy())
    }

    async fn sign_block(&self, block: &Block) -> ProviderResult<Block> {
        self.call_as("signBlock", &[to_js(block)]).await
    }

    async fn send_transaction(&self, from: &str, to: &str, amount: &str) -> ProviderResult<String> {
        let args = [from, to, amount].map(JsValue::from_str);
        let value = self.call("sendTransaction", &args).await?;
        string_field(&value, "hash").ok_or_else(|| ProviderError::new("sendTransaction() returned no hash"))
    }

    async fn send_block(&self, block: &Block) -> ProviderResult<String> {
        let value = self.call("sendBlock", &[to_js(block)]).await?;
        string_field(&value, "hash").ok_or_else(|| ProviderError::new("sendBlock() returned no hash"))
    }

    async fn resolve_bns(&self, name: &str) -> ProviderResult<Option<String>> {
        let value = self.call("resolveBNS", &[JsValue::from_str(name)]).await?;
        Ok(string_field(&value, "address").filter(|a| !a.is_empty()))
    }

    fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded();
        let listeners = [events::CONNECT, events::DISCONNECT, events::ACCOUNT_CHANGED]
            .into_iter()
            .filter_map(|event| self.listen(event, tx.clone()).map(|l| (event, l)))
            .collect();
        Subscription { target: self.target.clone(), listeners, events: rx }.boxed_local()
    }
}
