// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Kurir device gateway.
//!
//! WAL-mode SQLite with embedded refinery migrations and a single writer
//! thread via `tokio-rusqlite`. Devices, threads, the message log, groups
//! and contacts each get a typed query module.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
