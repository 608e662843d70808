// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Kurir device gateway.
//!
//! Defines the error type, the domain records (devices, threads, messages),
//! the protocol engine event model, and the adapter traits that the storage
//! backend and protocol engines implement.

pub mod chat;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use error::KurirError;
pub use event::{EngineEvent, MessageEvent, MessagePayload, PairingEvent, ReceiptEvent, ReceiptKind};
pub use types::HealthStatus;

pub use traits::{EngineFactory, EventSink, PluginAdapter, ProtocolEngine, StorageAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_engine<T: ProtocolEngine>() {}
        fn _assert_factory<T: EngineFactory>() {}
    }

    #[test]
    fn event_names_are_snake_case() {
        assert_eq!(EngineEvent::Connected.to_string(), "connected");
        assert_eq!(
            EngineEvent::AppStateSyncComplete {
                name: "critical_block".into()
            }
            .to_string(),
            "app_state_sync_complete"
        );
    }
}
