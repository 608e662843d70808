// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device session registry.
//!
//! The only place sessions are created or destroyed. Every mutation of a
//! device's entry runs under that device's gate, so the registry never holds
//! two handles for one device and concurrent starts collapse onto one engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use kurir_core::{EngineFactory, KurirError, StorageAdapter};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::ingest::{EventPipeline, PersistQueue, ReceiptBacklog, run_writer};
use crate::metrics;
use crate::pairing::{PairingStatus, PairingTracker};
use crate::session::{DriverExit, SessionHandle, drive_pairing};
use crate::settings::SessionSettings;

/// Concurrency-safe map of device id to live session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    sessions: DashMap<String, SessionHandle>,
    gates: DashMap<String, Arc<Mutex<()>>>,
    storage: Arc<dyn StorageAdapter>,
    factory: Arc<dyn EngineFactory>,
    settings: SessionSettings,
    next_generation: AtomicU64,
}

impl SessionManager {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        factory: Arc<dyn EngineFactory>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                sessions: DashMap::new(),
                gates: DashMap::new(),
                storage,
                factory,
                settings,
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// Start a session for `device_id`, or return the live one.
    ///
    /// A registered session that is connected or still waiting for a scan
    /// is returned as-is. Anything else registered under the id is shut
    /// down and replaced by a session on a fresh engine.
    pub async fn start(&self, device_id: &str) -> Result<SessionHandle, KurirError> {
        let gate = self.gate(device_id);
        let _guard = gate.lock().await;

        if let Some(existing) = self.get(device_id) {
            if existing.is_live() {
                debug!(device_id, generation = existing.generation(), "session already live");
                return Ok(existing);
            }
            info!(device_id, generation = existing.generation(), "replacing stale session");
            self.inner.sessions.remove(device_id);
            metrics::set_active_sessions(self.inner.sessions.len());
            self.shutdown_session(&existing).await;
        }

        let device = self
            .inner
            .storage
            .get_device(device_id)
            .await?
            .ok_or_else(|| KurirError::DeviceNotFound {
                device_id: device_id.to_string(),
            })?;

        let engine = self.inner.factory.create(&device).await?;
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let paired = device.is_paired();

        let tracker = Arc::new(PairingTracker::new(PairingStatus::initial(paired)));
        let (queue, ops) =
            PersistQueue::bounded(device_id, self.inner.settings.event_queue_capacity);
        let receipts = Arc::new(ReceiptBacklog::default());
        let writer = tokio::spawn(run_writer(
            device_id.to_string(),
            Arc::clone(&self.inner.storage),
            Arc::clone(&receipts),
            ops,
        ));

        let (sink, events) = mpsc::unbounded_channel();
        engine.subscribe(sink);

        let handle = SessionHandle::new(
            device_id.to_string(),
            generation,
            Arc::clone(&engine),
            Arc::clone(&tracker),
            receipts,
            writer,
        );
        self.inner
            .sessions
            .insert(device_id.to_string(), handle.clone());
        metrics::set_active_sessions(self.inner.sessions.len());

        let pipeline = EventPipeline {
            device_id: device_id.to_string(),
            engine: Arc::clone(&engine),
            queue: queue.clone(),
            pairing: Arc::clone(&tracker),
            presence_on_connect: self.inner.settings.presence_on_connect,
            teardown: self.teardown_for(&handle),
        };
        tokio::spawn(pipeline.run(events, handle.cancel_token()));

        if paired {
            drop(queue);
        } else {
            tracker.update(|status| status.begin_scan());
            match engine.pairing_channel().await {
                Ok(pairing_events) => {
                    let manager = Arc::downgrade(&self.inner);
                    let session = handle.clone();
                    let cancel = handle.cancel_token();
                    tokio::spawn(async move {
                        let exit = drive_pairing(
                            session.device_id().to_string(),
                            Arc::clone(session.pairing()),
                            pairing_events,
                            queue,
                            cancel,
                        )
                        .await;
                        let reason = match exit {
                            DriverExit::Expired => "pairing expired",
                            DriverExit::Abandoned => "pairing channel closed",
                            DriverExit::Paired
                            | DriverExit::Cancelled
                            | DriverExit::ChannelClosed => return,
                        };
                        if let Some(inner) = manager.upgrade() {
                            SessionManager { inner }.retire(&session, reason).await;
                        }
                    });
                }
                Err(e) => {
                    drop(queue);
                    self.abort_start(&handle).await;
                    return Err(connect_failed(device_id, e));
                }
            }
        }

        if let Err(e) = engine.connect().await {
            self.abort_start(&handle).await;
            return Err(connect_failed(device_id, e));
        }

        info!(device_id, generation, paired, "session started");
        Ok(handle)
    }

    /// Disconnect and unregister the device's session.
    ///
    /// Returns whether the session was connected at the time of the stop;
    /// [`KurirError::SessionNotRunning`] when nothing was registered.
    pub async fn stop(&self, device_id: &str) -> Result<bool, KurirError> {
        let stopped = self.stop_gated(device_id).await;
        self.release_gate(device_id);
        stopped
    }

    async fn stop_gated(&self, device_id: &str) -> Result<bool, KurirError> {
        let gate = self.gate(device_id);
        let _guard = gate.lock().await;

        let Some((_, handle)) = self.inner.sessions.remove(device_id) else {
            return Err(KurirError::SessionNotRunning {
                device_id: device_id.to_string(),
            });
        };
        metrics::set_active_sessions(self.inner.sessions.len());
        let was_connected = handle.is_connected();
        self.shutdown_session(&handle).await;
        info!(device_id, generation = handle.generation(), "session stopped");
        Ok(was_connected)
    }

    pub fn get(&self, device_id: &str) -> Option<SessionHandle> {
        self.inner
            .sessions
            .get(device_id)
            .map(|entry| entry.value().clone())
    }

    pub fn is_connected(&self, device_id: &str) -> bool {
        self.get(device_id).is_some_and(|h| h.is_connected())
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.inner
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    /// Tear down `handle` if it is still the registered session for its
    /// device. A handle already replaced by a newer start is left alone.
    pub(crate) async fn retire(&self, handle: &SessionHandle, reason: &str) {
        let device_id = handle.device_id();
        let gate = self.gate(device_id);
        let _guard = gate.lock().await;

        let removed = self
            .inner
            .sessions
            .remove_if(device_id, |_, current| current.same_session(handle));
        if removed.is_none() {
            debug!(
                device_id,
                generation = handle.generation(),
                reason,
                "stale teardown ignored"
            );
            return;
        }
        metrics::set_active_sessions(self.inner.sessions.len());
        info!(device_id, generation = handle.generation(), reason, "session retired");
        self.shutdown_session(handle).await;
    }

    /// Undo a start that registered a handle but failed to connect.
    /// Called with the device gate held.
    async fn abort_start(&self, handle: &SessionHandle) {
        self.inner
            .sessions
            .remove_if(handle.device_id(), |_, current| current.same_session(handle));
        metrics::set_active_sessions(self.inner.sessions.len());
        self.shutdown_session(handle).await;
    }

    /// Stop event processing, disconnect, let queued writes finish, then
    /// record the device as disconnected.
    async fn shutdown_session(&self, handle: &SessionHandle) {
        let device_id = handle.device_id();
        handle.cancel_token().cancel();
        handle.engine().disconnect().await;

        if let Some(writer) = handle.take_writer() {
            if let Err(e) = writer.await {
                warn!(device_id, error = %e, "persistence writer task failed");
            }
        }

        let storage = &self.inner.storage;
        if let Err(e) = storage.set_connection_status(device_id, false).await {
            warn!(device_id, error = %e, "failed to record disconnect");
        }

        let had_code = handle.pairing().current().code.is_some();
        handle.pairing().update(|status| status.abandon());
        if had_code {
            if let Err(e) = storage.set_pairing_code(device_id, None).await {
                warn!(device_id, error = %e, "failed to clear pairing code");
            }
        }
    }

    /// Callback the event pipeline uses to retire its own session.
    fn teardown_for(&self, handle: &SessionHandle) -> crate::ingest::Teardown {
        let manager: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        let handle = handle.clone();
        Box::new(move |reason: &'static str| {
            let Some(inner) = manager.upgrade() else {
                return;
            };
            let handle = handle.clone();
            tokio::spawn(async move {
                SessionManager { inner }.retire(&handle, reason).await;
            });
        })
    }

    /// Drop the device's gate once no session and no caller uses it.
    fn release_gate(&self, device_id: &str) {
        self.inner.gates.remove_if(device_id, |_, gate| {
            Arc::strong_count(gate) == 1 && !self.inner.sessions.contains_key(device_id)
        });
    }

    fn gate(&self, device_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.inner
                .gates
                .entry(device_id.to_string())
                .or_default()
                .value(),
        )
    }
}

fn connect_failed(device_id: &str, error: KurirError) -> KurirError {
    match error {
        KurirError::ConnectFailed { .. } => error,
        other => KurirError::ConnectFailed {
            device_id: device_id.to_string(),
            message: other.to_string(),
        },
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.inner.sessions.len())
            .field("settings", &self.inner.settings)
            .finish()
    }
}
