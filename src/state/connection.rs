//! Wallet connection state and its merge-style update path.
//!
//! The whole app shares one [`ConnectionState`] record held in a Leptos signal.
//! Mutation goes exclusively through [`ConnectionContext::apply`], which merges
//! a [`ConnectionPatch`] into the current state. Untyped input (anything that
//! arrives as JSON rather than a struct literal) is validated first by
//! [`ConnectionPatch::from_value`], which rejects unknown field names instead
//! of silently accepting schema drift.

use leptos::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the state layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A patch carried a field outside the canonical set. This is a
    /// programming error in the caller, not a runtime condition to recover
    /// from.
    #[error("unwanted state field in patch: {0}")]
    SchemaViolation(String),
}

/// Current belief about the injected wallet, the network and the account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    /// An account has been received and is non-empty.
    pub is_connected: bool,
    /// The provider's reported chain id equals the configured expected chain.
    pub is_correct_chain: bool,
    /// Provider detection succeeded.
    pub is_metamask_installed: bool,
    /// More than one wallet extension injected a provider.
    pub is_wallet_multiple: bool,
    /// Last observed chain id, empty if unknown.
    pub current_chain: String,
    /// Last known account address, empty if none.
    pub address: String,
    /// Last user-facing error, empty if none.
    pub error_message: String,
    /// Initial detection/handshake still in progress.
    pub loading: bool,
}

impl ConnectionState {
    /// Derived connection status, recomputed on every read and never stored.
    pub fn is_fully_connected(&self) -> bool {
        self.is_connected
            && self.is_correct_chain
            && !self.address.is_empty()
            && self.is_metamask_installed
            && !self.is_wallet_multiple
    }

    /// Returns a new state equal to `self` with the patch's supplied fields
    /// overwritten; omitted fields are unchanged.
    pub fn merged(&self, patch: &ConnectionPatch) -> ConnectionState {
        ConnectionState {
            is_connected: patch.is_connected.unwrap_or(self.is_connected),
            is_correct_chain: patch.is_correct_chain.unwrap_or(self.is_correct_chain),
            is_metamask_installed: patch
                .is_metamask_installed
                .unwrap_or(self.is_metamask_installed),
            is_wallet_multiple: patch.is_wallet_multiple.unwrap_or(self.is_wallet_multiple),
            current_chain: patch
                .current_chain
                .clone()
                .unwrap_or_else(|| self.current_chain.clone()),
            address: patch.address.clone().unwrap_or_else(|| self.address.clone()),
            error_message: patch
                .error_message
                .clone()
                .unwrap_or_else(|| self.error_message.clone()),
            loading: patch.loading.unwrap_or(self.loading),
        }
    }
}

/// Partial update over [`ConnectionState`]. `None` fields are left untouched
/// by the merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionPatch {
    pub is_connected: Option<bool>,
    pub is_correct_chain: Option<bool>,
    pub is_metamask_installed: Option<bool>,
    pub is_wallet_multiple: Option<bool>,
    pub current_chain: Option<String>,
    pub address: Option<String>,
    pub error_message: Option<String>,
    pub loading: Option<bool>,
}

impl ConnectionPatch {
    /// Validate-then-merge entry point for untyped input. Any key outside the
    /// canonical field set fails with [`StateError::SchemaViolation`] before
    /// the store is touched.
    pub fn from_value(value: serde_json::Value) -> Result<Self, StateError> {
        serde_json::from_value(value).map_err(|e| StateError::SchemaViolation(e.to_string()))
    }
}

/// Shared handle to the connection state signal.
#[derive(Clone, Copy)]
pub struct ConnectionContext {
    state: RwSignal<ConnectionState>,
}

impl ConnectionContext {
    pub fn new() -> Self {
        Self {
            state: RwSignal::new(ConnectionState::default()),
        }
    }

    /// Merge a patch into the current state. Observers re-render through the
    /// signal subscription.
    pub fn apply(&self, patch: ConnectionPatch) {
        self.state.update(|state| *state = state.merged(&patch));
    }

    /// Reactive read, tracks the signal when called inside a view.
    pub fn with<T>(&self, f: impl FnOnce(&ConnectionState) -> T) -> T {
        self.state.with(f)
    }

    /// Non-reactive read for event handlers and async tasks.
    pub fn with_untracked<T>(&self, f: impl FnOnce(&ConnectionState) -> T) -> T {
        self.state.with_untracked(f)
    }

    pub fn is_fully_connected(&self) -> bool {
        self.state.with(|state| state.is_fully_connected())
    }

    pub fn address(&self) -> String {
        self.state.with(|state| state.address.clone())
    }
}

impl Default for ConnectionContext {
    fn default() -> Self {
        Self::new()
    }
}

pub fn provide_connection_context() -> ConnectionContext {
    let context = ConnectionContext::new();
    provide_context(context);
    context
}

pub fn use_connection_context() -> ConnectionContext {
    expect_context::<ConnectionContext>()
}
