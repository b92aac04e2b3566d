//! Reactive application state

pub mod connection;

pub use connection::{
    provide_connection_context, use_connection_context, ConnectionContext, ConnectionPatch,
    ConnectionState, StateError,
};
