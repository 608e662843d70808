// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session tuning resolved once from configuration.

use std::time::Duration;

use kurir_config::model::SessionConfig;

/// Values every session is constructed with. Built once at startup and
/// shared, never re-read per call.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Capacity of each session's persistence queue.
    pub event_queue_capacity: usize,
    /// How long an on-demand start waits for pairing to settle.
    pub connect_wait: Duration,
    /// Upper bound on supervisor shutdown.
    pub shutdown_timeout: Duration,
    /// Send "available" presence once connected.
    pub presence_on_connect: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            event_queue_capacity: config.event_queue_capacity.max(1),
            connect_wait: config.connect_wait(),
            shutdown_timeout: config.shutdown_timeout(),
            presence_on_connect: config.presence_on_connect,
        }
    }
}
