// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits implemented by storage backends and protocol engines.

pub mod adapter;
pub mod engine;
pub mod storage;

pub use adapter::PluginAdapter;
pub use engine::{EngineFactory, EventSink, ProtocolEngine};
pub use storage::StorageAdapter;
