//! Connection controller: drives the state store from provider detection,
//! provider events and user actions.
//!
//! Event handling is split into pure patch builders (unit-testable without a
//! browser) and a thin [`ConnectionController`] that owns the provider
//! adapter, wires the handlers and guards against updates landing after
//! teardown.

use std::cell::Cell;
use std::rc::Rc;

use crate::services::ethereum::{EthereumProvider, ProviderDetection, ProviderError, ProviderEvent};
use crate::state::{ConnectionContext, ConnectionPatch};

/// Map a numeric provider error code to its fixed user-facing message.
/// Unrecognized codes map to the empty string.
pub fn map_error_code(code: i64) -> &'static str {
    match code {
        4001 => "Rejected request. Please connect to MetaMask.",
        -32002 => "Please check your Metamask for pending request.",
        -32602 => "Invalid request parameters",
        -32603 => "Internal error. Please refresh your browser",
        _ => "",
    }
}

/// Patch for a reported chain id. A wrong chain also drops the loading flag
/// so the page is not stuck on a spinner while on the wrong network.
pub fn chain_changed_patch(expected_chain: &str, chain_id: &str) -> ConnectionPatch {
    let is_correct = chain_id == expected_chain;
    ConnectionPatch {
        is_correct_chain: Some(is_correct),
        current_chain: Some(chain_id.to_string()),
        error_message: Some(String::new()),
        loading: if is_correct { None } else { Some(false) },
        ..Default::default()
    }
}

/// Patch for a reported account list.
///
/// An empty list means MetaMask is locked or the user disconnected every
/// account; that is a deliberate state, not an error. A first account equal
/// to `previous_address` is a no-op to avoid redundant store churn.
pub fn accounts_changed_patch(accounts: &[String], previous_address: &str) -> Option<ConnectionPatch> {
    match accounts.first() {
        None => Some(ConnectionPatch {
            is_connected: Some(false),
            error_message: Some(String::new()),
            ..Default::default()
        }),
        Some(account) if account == previous_address => None,
        Some(account) => Some(ConnectionPatch {
            is_connected: Some(true),
            address: Some(account.clone()),
            error_message: Some(String::new()),
            ..Default::default()
        }),
    }
}

/// The disconnected baseline. `error_message` is left untouched so a
/// disconnect that carries an error keeps its mapped message.
pub fn disconnect_patch() -> ConnectionPatch {
    ConnectionPatch {
        is_connected: Some(false),
        is_correct_chain: Some(false),
        is_metamask_installed: Some(false),
        is_wallet_multiple: Some(false),
        current_chain: Some(String::new()),
        address: Some(String::new()),
        loading: Some(false),
        ..Default::default()
    }
}

/// Surface a failed provider call as a transient user-facing message.
pub fn error_patch(error: &ProviderError) -> ConnectionPatch {
    ConnectionPatch {
        error_message: Some(map_error_code(error.code).to_string()),
        ..Default::default()
    }
}

/// Owns the provider adapter and the store handle; all provider-originated
/// failures are converted into state updates here, nothing escapes.
pub struct ConnectionController<P> {
    provider: Rc<P>,
    ctx: ConnectionContext,
    expected_chain: String,
    alive: Rc<Cell<bool>>,
}

impl<P> Clone for ConnectionController<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            ctx: self.ctx,
            expected_chain: self.expected_chain.clone(),
            alive: self.alive.clone(),
        }
    }
}

impl<P: EthereumProvider> ConnectionController<P> {
    pub fn new(provider: P, ctx: ConnectionContext, expected_chain: impl Into<String>) -> Self {
        Self {
            provider: Rc::new(provider),
            ctx,
            expected_chain: expected_chain.into(),
            alive: Rc::new(Cell::new(true)),
        }
    }

    /// Detect the injected provider. Absence is a terminal state, not an
    /// error: the loading flag is dropped so the UI settles on the install
    /// prompt instead of a spinner.
    pub async fn detect(&self) -> ProviderDetection {
        self.ctx.apply(ConnectionPatch {
            loading: Some(true),
            ..Default::default()
        });
        let detection = self.provider.detect().await;
        if self.alive.get() {
            log::info!(
                "provider detection: installed={} multiple={}",
                detection.installed,
                detection.multiple
            );
            self.ctx.apply(ConnectionPatch {
                is_metamask_installed: Some(detection.installed),
                is_wallet_multiple: Some(detection.multiple),
                error_message: Some(String::new()),
                loading: if detection.installed { None } else { Some(false) },
                ..Default::default()
            });
        }
        detection
    }

    /// Register for the three provider events. Chain changes are handled
    /// in place rather than by reloading the page; the handler recomputes
    /// chain correctness directly.
    pub fn subscribe(&self) {
        let ctx = self.ctx;
        let expected_chain = self.expected_chain.clone();
        let alive = self.alive.clone();
        self.provider.subscribe(Rc::new(move |event| {
            if !alive.get() {
                return;
            }
            match event {
                ProviderEvent::ChainChanged(chain_id) => {
                    ctx.apply(chain_changed_patch(&expected_chain, &chain_id));
                }
                ProviderEvent::AccountsChanged(accounts) => {
                    let previous = ctx.with_untracked(|state| state.address.clone());
                    if let Some(patch) = accounts_changed_patch(&accounts, &previous) {
                        ctx.apply(patch);
                    }
                }
                ProviderEvent::Disconnected(error) => {
                    log::warn!("provider disconnected: {error:?}");
                    let mut patch = disconnect_patch();
                    patch.error_message =
                        error.as_ref().map(|e| map_error_code(e.code).to_string());
                    ctx.apply(patch);
                }
            }
        }));
    }

    /// Fetch the current chain id and accounts and apply them as if they were
    /// events. State is fresh (loading cleared) only once both calls settled.
    pub async fn start_app(&self) {
        let chain = self.provider.request("eth_chainId").await;
        let accounts = self.provider.request("eth_accounts").await;
        if !self.alive.get() {
            return;
        }
        match chain {
            Ok(value) => {
                let chain_id = value.as_str().unwrap_or_default().to_string();
                self.ctx
                    .apply(chain_changed_patch(&self.expected_chain, &chain_id));
            }
            Err(error) => self.ctx.apply(error_patch(&error)),
        }
        match accounts {
            Ok(value) => {
                let accounts: Vec<String> = serde_json::from_value(value).unwrap_or_default();
                if let Some(patch) = accounts_changed_patch(&accounts, "") {
                    self.ctx.apply(patch);
                }
            }
            Err(error) => self.ctx.apply(error_patch(&error)),
        }
        self.ctx.apply(ConnectionPatch {
            loading: Some(false),
            ..Default::default()
        });
    }

    /// User-initiated account request. Overlapping invocations race benignly:
    /// each resolution is applied as an atomic merge and the last one wins.
    pub async fn connect_wallet(&self) {
        let result = self.provider.request("eth_requestAccounts").await;
        if !self.alive.get() {
            return;
        }
        match result {
            Ok(value) => {
                let accounts: Vec<String> = serde_json::from_value(value).unwrap_or_default();
                // empty previous address forces the update through
                if let Some(patch) = accounts_changed_patch(&accounts, "") {
                    self.ctx.apply(patch);
                }
            }
            Err(error) => {
                log::warn!("connect request failed: {error}");
                self.ctx.apply(error_patch(&error));
            }
        }
    }

    /// Release event listeners and drop any in-flight response on the floor.
    pub fn teardown(&self) {
        self.alive.set(false);
        self.provider.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConnectionState;
    use futures::executor::block_on;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockProvider {
        detection: Option<ProviderDetection>,
        responses: RefCell<HashMap<&'static str, Result<Value, ProviderError>>>,
        handler: RefCell<Option<Rc<dyn Fn(ProviderEvent)>>>,
        subscribed: Cell<bool>,
    }

    impl MockProvider {
        fn with_detection(installed: bool, multiple: bool) -> Self {
            Self {
                detection: Some(ProviderDetection { installed, multiple }),
                ..Default::default()
            }
        }

        fn respond(self, method: &'static str, response: Result<Value, ProviderError>) -> Self {
            self.responses.borrow_mut().insert(method, response);
            self
        }

        fn emit(&self, event: ProviderEvent) {
            let handler = self.handler.borrow().clone().expect("no handler registered");
            handler(event);
        }
    }

    impl EthereumProvider for MockProvider {
        async fn detect(&self) -> ProviderDetection {
            self.detection.unwrap_or(ProviderDetection::ABSENT)
        }

        async fn request(&self, method: &str) -> Result<Value, ProviderError> {
            self.responses
                .borrow_mut()
                .remove(method)
                .unwrap_or(Ok(Value::Null))
        }

        fn subscribe(&self, handler: Rc<dyn Fn(ProviderEvent)>) {
            self.subscribed.set(true);
            *self.handler.borrow_mut() = Some(handler);
        }

        fn unsubscribe(&self) {
            self.subscribed.set(false);
            self.handler.borrow_mut().take();
        }
    }

    fn controller(provider: MockProvider) -> (ConnectionController<MockProvider>, ConnectionContext)
    {
        let ctx = ConnectionContext::new();
        (ConnectionController::new(provider, ctx, "0x1"), ctx)
    }

    fn snapshot(ctx: &ConnectionContext) -> ConnectionState {
        ctx.with_untracked(|state| state.clone())
    }

    #[test]
    fn error_code_table() {
        assert_eq!(
            map_error_code(4001),
            "Rejected request. Please connect to MetaMask."
        );
        assert_eq!(
            map_error_code(-32002),
            "Please check your Metamask for pending request."
        );
        assert_eq!(map_error_code(-32602), "Invalid request parameters");
        assert_eq!(
            map_error_code(-32603),
            "Internal error. Please refresh your browser"
        );
        assert_eq!(map_error_code(9999), "");
    }

    #[test]
    fn chain_changed_to_expected_chain() {
        let state = ConnectionState {
            loading: true,
            ..Default::default()
        };
        let merged = state.merged(&chain_changed_patch("0x1", "0x1"));
        assert!(merged.is_correct_chain);
        assert_eq!(merged.current_chain, "0x1");
        assert_eq!(merged.error_message, "");
        // loading untouched on the right chain
        assert!(merged.loading);
    }

    #[test]
    fn chain_changed_to_wrong_chain_clears_loading() {
        let state = ConnectionState {
            loading: true,
            ..Default::default()
        };
        let merged = state.merged(&chain_changed_patch("0x1", "0x89"));
        assert!(!merged.is_correct_chain);
        assert_eq!(merged.current_chain, "0x89");
        assert!(!merged.loading);
    }

    #[test]
    fn empty_accounts_mean_disconnected_without_error() {
        let patch = accounts_changed_patch(&[], "0xA").unwrap();
        assert_eq!(patch.is_connected, Some(false));
        assert_eq!(patch.error_message, Some(String::new()));
        assert_eq!(patch.address, None);
    }

    #[test]
    fn unchanged_account_is_a_noop() {
        assert_eq!(accounts_changed_patch(&["0xA".to_string()], "0xA"), None);
    }

    #[test]
    fn new_account_connects_and_updates_address() {
        let patch = accounts_changed_patch(&["0xA".to_string()], "0xB").unwrap();
        assert_eq!(patch.is_connected, Some(true));
        assert_eq!(patch.address, Some("0xA".to_string()));
        assert_eq!(patch.error_message, Some(String::new()));
    }

    #[test]
    fn detect_without_provider_settles_out_of_loading() {
        let (controller, ctx) = controller(MockProvider::with_detection(false, false));
        block_on(controller.detect());
        let state = snapshot(&ctx);
        assert!(!state.is_metamask_installed);
        assert!(!state.is_wallet_multiple);
        assert!(!state.loading);
        assert_eq!(state.error_message, "");
    }

    #[test]
    fn detect_with_conflicting_providers() {
        let (controller, ctx) = controller(MockProvider::with_detection(true, true));
        block_on(controller.detect());
        let state = snapshot(&ctx);
        assert!(state.is_metamask_installed);
        assert!(state.is_wallet_multiple);
        assert!(!state.is_fully_connected());
    }

    #[test]
    fn start_app_syncs_chain_and_accounts() {
        let provider = MockProvider::with_detection(true, false)
            .respond("eth_chainId", Ok(json!("0x1")))
            .respond("eth_accounts", Ok(json!(["0xABCD1234"])));
        let (controller, ctx) = controller(provider);
        block_on(async {
            controller.detect().await;
            controller.start_app().await;
        });
        let state = snapshot(&ctx);
        assert!(state.is_correct_chain);
        assert!(state.is_connected);
        assert_eq!(state.address, "0xABCD1234");
        assert!(!state.loading);
        assert!(state.is_fully_connected());
    }

    #[test]
    fn connect_wallet_applies_returned_accounts() {
        let provider = MockProvider::with_detection(true, false)
            .respond("eth_requestAccounts", Ok(json!(["0xABCD1234"])));
        let (controller, ctx) = controller(provider);
        block_on(controller.connect_wallet());
        let state = snapshot(&ctx);
        assert!(state.is_connected);
        assert_eq!(state.address, "0xABCD1234");
        assert_eq!(state.error_message, "");
    }

    #[test]
    fn rejected_connect_surfaces_mapped_message_only() {
        let provider = MockProvider::with_detection(true, false).respond(
            "eth_requestAccounts",
            Err(ProviderError {
                code: 4001,
                message: "User rejected the request.".to_string(),
            }),
        );
        let (controller, ctx) = controller(provider);
        block_on(controller.connect_wallet());
        let state = snapshot(&ctx);
        assert!(!state.is_connected);
        assert_eq!(
            state.error_message,
            "Rejected request. Please connect to MetaMask."
        );
    }

    #[test]
    fn disconnect_event_with_error_resets_to_baseline_with_message() {
        let provider = MockProvider::with_detection(true, false);
        let (controller, ctx) = controller(provider);
        ctx.apply(ConnectionPatch {
            is_connected: Some(true),
            is_correct_chain: Some(true),
            is_metamask_installed: Some(true),
            current_chain: Some("0x1".to_string()),
            address: Some("0xABCD1234".to_string()),
            ..Default::default()
        });
        controller.subscribe();
        controller.provider.emit(ProviderEvent::Disconnected(Some(ProviderError {
            code: -32002,
            message: "pending".to_string(),
        })));
        let state = snapshot(&ctx);
        assert!(!state.is_connected);
        assert!(!state.is_correct_chain);
        assert!(!state.is_metamask_installed);
        assert_eq!(state.current_chain, "");
        assert_eq!(state.address, "");
        assert!(!state.loading);
        assert_eq!(
            state.error_message,
            "Please check your Metamask for pending request."
        );
    }

    #[test]
    fn chain_event_resyncs_in_place() {
        let provider = MockProvider::with_detection(true, false);
        let (controller, ctx) = controller(provider);
        controller.subscribe();
        controller
            .provider
            .emit(ProviderEvent::ChainChanged("0x89".to_string()));
        assert!(!snapshot(&ctx).is_correct_chain);
        controller
            .provider
            .emit(ProviderEvent::ChainChanged("0x1".to_string()));
        assert!(snapshot(&ctx).is_correct_chain);
    }

    #[test]
    fn account_event_uses_current_address_for_idempotence() {
        let provider = MockProvider::with_detection(true, false);
        let (controller, ctx) = controller(provider);
        controller.subscribe();
        controller
            .provider
            .emit(ProviderEvent::AccountsChanged(vec!["0xA".to_string()]));
        assert!(snapshot(&ctx).is_connected);
        // locking the wallet empties the account list
        controller.provider.emit(ProviderEvent::AccountsChanged(vec![]));
        let state = snapshot(&ctx);
        assert!(!state.is_connected);
        // address deliberately retained, only the connection flag drops
        assert_eq!(state.address, "0xA");
    }

    #[test]
    fn teardown_drops_stale_responses_and_listeners() {
        let provider = MockProvider::with_detection(true, false)
            .respond("eth_requestAccounts", Ok(json!(["0xABCD1234"])));
        let (controller, ctx) = controller(provider);
        controller.subscribe();
        assert!(controller.provider.subscribed.get());
        controller.teardown();
        assert!(!controller.provider.subscribed.get());
        // a response resolving after teardown must be ignored
        block_on(controller.connect_wallet());
        assert!(!snapshot(&ctx).is_connected);
    }
}
