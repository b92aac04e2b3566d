//! Application root

use leptos::prelude::*;

use crate::pages::ConnectPage;
use crate::state::provide_connection_context;

#[component]
pub fn App() -> impl IntoView {
    provide_connection_context();

    view! {
        <main class="app-shell">
            <ConnectPage/>
        </main>
    }
}
