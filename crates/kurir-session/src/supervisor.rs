// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection supervisor: boot-time reconnection, on-demand connect, and
//! bounded shutdown of every session.

use std::sync::Arc;
use std::time::Duration;

use kurir_core::{KurirError, PluginAdapter, StorageAdapter};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::pairing::PairingState;
use crate::registry::SessionManager;
use crate::session::SessionHandle;

/// Poll interval while an on-demand connect waits for pairing to settle.
const SETTLE_POLL: Duration = Duration::from_millis(100);

/// Result of booting every persisted device.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootReport {
    pub started: Vec<String>,
    /// Device id and the reason its start failed.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub stopped: usize,
    /// Sessions still stopping when the shutdown window elapsed.
    pub abandoned: usize,
}

/// What an on-demand connect observed before replying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// Waiting for the user to scan this pairing payload.
    AwaitingScan { pairing_code: String },
}

/// Starts and stops sessions in bulk on behalf of the process.
#[derive(Clone)]
pub struct Supervisor {
    manager: SessionManager,
    storage: Arc<dyn StorageAdapter>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("manager", &self.manager)
            .field("storage", &self.storage.name())
            .finish()
    }
}

impl Supervisor {
    pub fn new(manager: SessionManager, storage: Arc<dyn StorageAdapter>) -> Self {
        Self { manager, storage }
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Start a session for every persisted device, paired or not.
    ///
    /// Starts run concurrently; one device failing never blocks the rest.
    pub async fn boot(&self) -> Result<BootReport, KurirError> {
        let devices = self.storage.list_devices().await?;
        info!(count = devices.len(), "booting device sessions");

        let mut tasks = JoinSet::new();
        for device in devices {
            let manager = self.manager.clone();
            tasks.spawn(async move {
                let result = manager.start(&device.id).await;
                (device.id, result)
            });
        }

        let mut report = BootReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((device_id, Ok(_))) => report.started.push(device_id),
                Ok((device_id, Err(e))) => {
                    warn!(device_id = %device_id, error = %e, "device failed to start at boot");
                    report.failed.push((device_id, e.to_string()));
                }
                Err(e) => error!(error = %e, "boot task panicked"),
            }
        }
        report.started.sort();
        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            "boot complete"
        );
        Ok(report)
    }

    /// Stop every session, giving up after the configured window.
    pub async fn shutdown(&self) -> ShutdownReport {
        let timeout = self.manager.settings().shutdown_timeout;
        let device_ids = self.manager.device_ids();
        info!(count = device_ids.len(), ?timeout, "stopping all sessions");

        let mut tasks = JoinSet::new();
        for device_id in device_ids {
            let manager = self.manager.clone();
            tasks.spawn(async move { manager.stop(&device_id).await });
        }

        let mut report = ShutdownReport::default();
        let drained = tokio::time::timeout(timeout, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(_)) | Ok(Err(KurirError::SessionNotRunning { .. })) => {
                        report.stopped += 1;
                    }
                    Ok(Err(e)) => warn!(error = %e, "session stop failed"),
                    Err(e) => error!(error = %e, "stop task panicked"),
                }
            }
        })
        .await;

        if drained.is_err() {
            report.abandoned = tasks.len();
            warn!(
                abandoned = report.abandoned,
                ?timeout,
                "shutdown window elapsed, abandoning remaining sessions"
            );
            tasks.abort_all();
        }
        info!(stopped = report.stopped, "shutdown complete");
        report
    }

    /// Start a device and wait briefly for it to connect or show a
    /// pairing code.
    ///
    /// On [`KurirError::NotPaired`] the session stays up in the background.
    pub async fn connect_device(&self, device_id: &str) -> Result<ConnectOutcome, KurirError> {
        if self.storage.get_device(device_id).await?.is_none() {
            return Err(KurirError::DeviceNotFound {
                device_id: device_id.to_string(),
            });
        }
        let handle = self.manager.start(device_id).await?;
        let wait = self.manager.settings().connect_wait;

        match tokio::time::timeout(wait, settle(&handle)).await {
            Ok(Some(outcome)) => Ok(outcome),
            Ok(None) | Err(_) => {
                info!(device_id, ?wait, "device did not settle in time");
                Err(KurirError::NotPaired {
                    device_id: device_id.to_string(),
                })
            }
        }
    }

    /// Boot, run until cancelled, then shut everything down.
    pub async fn run(&self, cancel: CancellationToken) -> Result<ShutdownReport, KurirError> {
        self.boot().await?;
        cancel.cancelled().await;
        Ok(self.shutdown().await)
    }
}

/// Wait until the session is connected or holds a pairing code. `None`
/// when the session ended first.
async fn settle(handle: &SessionHandle) -> Option<ConnectOutcome> {
    let mut updates = handle.pairing_updates();
    loop {
        if handle.is_connected() {
            return Some(ConnectOutcome::Connected);
        }
        let status = handle.pairing_status();
        if let Some(code) = status.code {
            return Some(ConnectOutcome::AwaitingScan { pairing_code: code });
        }
        if handle.is_shutting_down() || status.state == PairingState::LoggedOut {
            return None;
        }
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return None;
                }
            }
            _ = tokio::time::sleep(SETTLE_POLL) => {}
        }
    }
}
