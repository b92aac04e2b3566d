//! Wallet services: provider interop and the connection controller

pub mod connect;
pub mod ethereum;

pub use connect::ConnectionController;
pub use ethereum::{
    EthereumProvider, InjectedProvider, ProviderDetection, ProviderError, ProviderEvent,
};
