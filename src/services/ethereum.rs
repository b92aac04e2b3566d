//! EIP-1193 provider interop via wasm-bindgen.
//!
//! The browser-injected `window.ethereum` object is wrapped behind the
//! [`EthereumProvider`] trait so the connection controller can be exercised
//! against a fake without a real extension. [`InjectedProvider`] is the real
//! implementation; detection mirrors `@metamask/detect-provider` by waiting
//! for late injection (`ethereum#initialized`) with a timeout.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Deserialize;
use thiserror::Error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::utils::constants::DETECT_TIMEOUT_MS;

/// Failure reported by a provider `request` call, carrying the numeric
/// EIP-1193 / JSON-RPC error code for user-facing mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider request failed ({code}): {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

/// Outcome of provider detection.
///
/// `multiple` is true when the provider selected by detection is not identical
/// to `window.ethereum`, which signals several extensions fighting over the
/// injection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProviderDetection {
    pub installed: bool,
    pub multiple: bool,
}

impl ProviderDetection {
    pub const ABSENT: ProviderDetection = ProviderDetection {
        installed: false,
        multiple: false,
    };
}

/// Typed translation of the three provider-emitted events.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    ChainChanged(String),
    AccountsChanged(Vec<String>),
    Disconnected(Option<ProviderError>),
}

/// Minimal adapter over the injected wallet object: request plus
/// subscribe/unsubscribe, nothing else.
#[allow(async_fn_in_trait)]
pub trait EthereumProvider {
    /// Query the environment for an injected wallet. Never fails; an absent
    /// provider is a normal outcome, not an error.
    async fn detect(&self) -> ProviderDetection;

    /// Issue a read or permission-gated RPC (`eth_chainId`, `eth_accounts`,
    /// `eth_requestAccounts`).
    async fn request(&self, method: &str) -> Result<serde_json::Value, ProviderError>;

    /// Register the single event handler for `chainChanged`,
    /// `accountsChanged` and `disconnect`. Replaces any prior registration.
    fn subscribe(&self, handler: Rc<dyn Fn(ProviderEvent)>);

    /// Release all event listeners so a re-mount never double-registers.
    fn unsubscribe(&self);
}

#[wasm_bindgen(inline_js = "
export function detectProvider(timeoutMs) {
    return new Promise((resolve) => {
        let settled = false;
        const finish = () => {
            if (settled) return;
            settled = true;
            window.removeEventListener('ethereum#initialized', finish);
            let provider = window.ethereum || null;
            if (provider && Array.isArray(provider.providers)) {
                provider = provider.providers.find((p) => p.isMetaMask) || provider.providers[0];
            }
            resolve({
                installed: provider !== null && provider !== undefined,
                multiple: provider !== null && provider !== window.ethereum,
            });
        };
        if (window.ethereum) {
            finish();
        } else {
            window.addEventListener('ethereum#initialized', finish);
            setTimeout(finish, timeoutMs);
        }
    });
}

export function providerRequest(method) {
    return window.ethereum.request({ method: method });
}

export function providerOn(event, handler) {
    if (window.ethereum && window.ethereum.on) {
        window.ethereum.on(event, handler);
    }
}

export function providerRemoveListener(event, handler) {
    if (window.ethereum && window.ethereum.removeListener) {
        window.ethereum.removeListener(event, handler);
    }
}
")]
extern "C" {
    async fn detectProvider(timeout_ms: u32) -> JsValue;

    #[wasm_bindgen(catch)]
    async fn providerRequest(method: &str) -> Result<JsValue, JsValue>;

    fn providerOn(event: &str, handler: &js_sys::Function);

    fn providerRemoveListener(event: &str, handler: &js_sys::Function);
}

/// Pull `{ code, message }` out of a rejected provider promise. Codes outside
/// the mapped table end up as 0 and map to no user-facing message.
fn provider_error_from_js(value: JsValue) -> ProviderError {
    let code = js_sys::Reflect::get(&value, &JsValue::from_str("code"))
        .ok()
        .and_then(|v| v.as_f64())
        .map(|v| v as i64)
        .unwrap_or(0);
    let message = js_sys::Reflect::get(&value, &JsValue::from_str("message"))
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_else(|| format!("{value:?}"));
    ProviderError { code, message }
}

/// The real `window.ethereum` adapter. Retains its event closures so they
/// stay alive for the extension to call and can be released on unsubscribe.
#[derive(Default)]
pub struct InjectedProvider {
    listeners: RefCell<Vec<(&'static str, Closure<dyn FnMut(JsValue)>)>>,
}

impl InjectedProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EthereumProvider for InjectedProvider {
    async fn detect(&self) -> ProviderDetection {
        let raw = detectProvider(DETECT_TIMEOUT_MS).await;
        serde_wasm_bindgen::from_value(raw).unwrap_or(ProviderDetection::ABSENT)
    }

    async fn request(&self, method: &str) -> Result<serde_json::Value, ProviderError> {
        let raw = providerRequest(method)
            .await
            .map_err(provider_error_from_js)?;
        serde_wasm_bindgen::from_value(raw).map_err(|e| ProviderError {
            code: 0,
            message: format!("unexpected {method} response: {e}"),
        })
    }

    fn subscribe(&self, handler: Rc<dyn Fn(ProviderEvent)>) {
        self.unsubscribe();
        let mut listeners = self.listeners.borrow_mut();

        let h = handler.clone();
        let chain = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            // chainChanged delivers the hex chain id as a plain string
            let chain_id = value.as_string().unwrap_or_default();
            h(ProviderEvent::ChainChanged(chain_id));
        });
        providerOn("chainChanged", chain.as_ref().unchecked_ref());
        listeners.push(("chainChanged", chain));

        let h = handler.clone();
        let accounts = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            let accounts: Vec<String> = serde_wasm_bindgen::from_value(value).unwrap_or_default();
            h(ProviderEvent::AccountsChanged(accounts));
        });
        providerOn("accountsChanged", accounts.as_ref().unchecked_ref());
        listeners.push(("accountsChanged", accounts));

        let h = handler;
        let disconnect = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            let error = if value.is_null() || value.is_undefined() {
                None
            } else {
                Some(provider_error_from_js(value))
            };
            h(ProviderEvent::Disconnected(error));
        });
        providerOn("disconnect", disconnect.as_ref().unchecked_ref());
        listeners.push(("disconnect", disconnect));
    }

    fn unsubscribe(&self) {
        for (event, closure) in self.listeners.borrow_mut().drain(..) {
            providerRemoveListener(event, closure.as_ref().unchecked_ref());
        }
    }
}
