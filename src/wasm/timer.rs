//! Browser clock: `Date.now()` and `setTimeout`.

use async_trait::async_trait;
use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::bridge::Timer;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsTimer;

/// Arrange for `resolve` to run after `timeout` ms using `scope.setTimeout`.
/// Returns false when the scope has no usable `setTimeout`.
fn schedule(scope: &JsValue, resolve: &Function, timeout: i32) -> bool {
    Reflect::get(scope, &JsValue::from_str("setTimeout"))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
        .is_some_and(|set_timeout| set_timeout.call2(scope, resolve, &JsValue::from(timeout)).is_ok())
}

#[async_trait(?Send)]
impl Timer for JsTimer {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    /// Works in windows and workers alike; without any timer it resumes at once.
    async fn sleep(&self, ms: u64) {
        let promise = Promise::new(&mut |resolve, _reject| {
            let timeout = i32::try_from(ms).unwrap_or(i32::MAX);
            if !schedule(&js_sys::global(), &resolve, timeout) {
                tracing::debug!("no setTimeout in this scope; not waiting");
                let _ = resolve.call0(&JsValue::UNDEFINED);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}
