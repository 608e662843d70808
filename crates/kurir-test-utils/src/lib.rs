// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Kurir integration testing.
//!
//! Provides a scriptable mock protocol engine, a factory that records every
//! engine it builds, and helpers for throwaway SQLite storage.

pub mod harness;
pub mod mock_engine;

pub use harness::{seed_device, temp_storage, wait_until};
pub use mock_engine::{MockEngine, MockEngineFactory, SentRecord};
