//! Reusable action button

use leptos::prelude::*;
use web_sys::MouseEvent;

#[component]
pub fn Button(
    #[prop(into)] label: String,
    #[prop(into)] on_click: Callback<MouseEvent>,
) -> impl IntoView {
    view! {
        <button class="action-button" on:click=move |ev| on_click.run(ev)>
            {label}
        </button>
    }
}
