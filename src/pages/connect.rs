//! Connect Wallet Page
//!
//! Drives the connection controller through its lifecycle: detect the
//! injected provider on mount, wire up provider events and the initial sync
//! once a single provider is confirmed, tear everything down on unmount.

use leptos::prelude::*;
use leptos::task::spawn_local;
use web_sys::MouseEvent;

use crate::components::Button;
use crate::services::{ConnectionController, InjectedProvider};
use crate::state::use_connection_context;
use crate::utils::constants::{EXPECTED_CHAIN_ID, METAMASK_INSTALL_URL};
use crate::utils::format::shorten_address;

#[component]
pub fn ConnectPage() -> impl IntoView {
    let ctx = use_connection_context();
    let controller = ConnectionController::new(InjectedProvider::new(), ctx, EXPECTED_CHAIN_ID);

    let startup = controller.clone();
    spawn_local(async move {
        let detection = startup.detect().await;
        if detection.installed && !detection.multiple {
            startup.subscribe();
            startup.start_app().await;
        }
    });

    let controller = StoredValue::new_local(controller);
    on_cleanup(move || controller.with_value(|c| c.teardown()));

    let on_connect = move |_: MouseEvent| {
        let controller = controller.with_value(|c| c.clone());
        spawn_local(async move { controller.connect_wallet().await });
    };

    let on_install = move |_: MouseEvent| {
        if let Some(window) = web_sys::window() {
            let _ = window.open_with_url_and_target(METAMASK_INSTALL_URL, "_blank");
        }
    };

    let installed = move || ctx.with(|state| state.is_metamask_installed);
    let connected = move || ctx.is_fully_connected();

    view! {
        <div class="connect-section">
            <h1 class="headline">
                {move || {
                    if !installed() {
                        "Please install Metamask Wallet"
                    } else if !connected() {
                        "Connect your Metamask crypto wallet"
                    } else {
                        "You are connected!"
                    }
                }}
            </h1>

            <Show when=move || ctx.with(|state| state.loading)>
                <p class="loading">"Checking your wallet..."</p>
            </Show>

            <Show when=move || ctx.with(|state| state.is_wallet_multiple)>
                <p class="notice">
                    "Multiple wallet extensions detected. Please disable all but MetaMask and reload."
                </p>
            </Show>

            <Show when=move || {
                ctx.with(|state| {
                    state.is_metamask_installed
                        && !state.current_chain.is_empty()
                        && !state.is_correct_chain
                })
            }>
                <p class="notice">"Wrong network. Please switch chains in MetaMask."</p>
            </Show>

            <Show when=move || ctx.with(|state| !state.error_message.is_empty())>
                <p class="error">{move || ctx.with(|state| state.error_message.clone())}</p>
            </Show>

            <div class="actions">
                <Show when=move || !installed()>
                    <Button label="Install Metamask" on_click=on_install/>
                </Show>
                <Show when=move || installed() && !connected()>
                    <Button label="Connect Wallet" on_click=on_connect/>
                </Show>
                <Show when=connected>
                    <div class="wallet-panel">
                        <p class="wallet-caption">"Here's your wallet:"</p>
                        <p class="wallet-address">{move || ctx.address()}</p>
                        <p class="wallet-short">{move || shorten_address(&ctx.address())}</p>
                    </div>
                </Show>
            </div>
        </div>
    }
}
