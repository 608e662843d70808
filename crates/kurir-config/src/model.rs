// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! reported at startup instead of silently ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Kurir configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KurirConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session lifecycle tuning.
    #[serde(default)]
    pub session: SessionConfig,

    /// Protocol engine selection.
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Instance name, shown in logs.
    #[serde(default = "default_gateway_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: default_gateway_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_gateway_name() -> String {
    "kurir".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("kurir").join("kurir.db"))
        .unwrap_or_else(|| "kurir.db".into())
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Session lifecycle tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Capacity of each session's persistence queue. Effects beyond it are dropped.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    /// How long an on-demand start waits for pairing to settle.
    #[serde(default = "default_connect_wait_secs")]
    pub connect_wait_secs: u64,

    /// Upper bound on the whole shutdown sequence.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Advertise "available" presence once a session connects.
    #[serde(default = "default_presence_on_connect")]
    pub presence_on_connect: bool,
}

impl SessionConfig {
    pub fn connect_wait(&self) -> Duration {
        Duration::from_secs(self.connect_wait_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: default_event_queue_capacity(),
            connect_wait_secs: default_connect_wait_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            presence_on_connect: default_presence_on_connect(),
        }
    }
}

fn default_event_queue_capacity() -> usize {
    256
}

fn default_connect_wait_secs() -> u64 {
    5
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_presence_on_connect() -> bool {
    true
}

/// Protocol engine selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Engine implementation. Only `loopback` ships with the binary.
    #[serde(default = "default_engine_kind")]
    pub kind: String,

    /// Delay before the loopback engine reports a successful scan.
    #[serde(default = "default_pairing_delay_ms")]
    pub pairing_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: default_engine_kind(),
            pairing_delay_ms: default_pairing_delay_ms(),
        }
    }
}

fn default_engine_kind() -> String {
    "loopback".to_string()
}

fn default_pairing_delay_ms() -> u64 {
    1500
}

/// Engine kinds the binary knows how to construct.
pub const KNOWN_ENGINE_KINDS: &[&str] = &["loopback"];
