//! Single-page MetaMask connection front end.
//!
//! Detects the browser-injected EIP-1193 provider, keeps a small reactive
//! record of connection, chain and account state in sync with it, and renders
//! a connect flow around that state. All chain interaction is delegated to
//! the injected provider; nothing is persisted across reloads.

use leptos::prelude::*;
use wasm_bindgen::prelude::*;

pub mod app;
pub mod components;
pub mod pages;
pub mod services;
pub mod state;
pub mod utils;

use app::App;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("metamask-connect starting");

    leptos::mount::mount_to_body(|| view! { <App/> });
}
