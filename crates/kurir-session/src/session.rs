// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live session handles and the per-session pairing driver.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use kurir_core::{PairingEvent, ProtocolEngine};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ingest::{PersistOp, PersistQueue, ReceiptBacklog};
use crate::pairing::{PairingEffect, PairingState, PairingStatus, PairingTracker};

/// The live handle to one device's protocol engine.
///
/// Cheap to clone. Handles are never reused: every successful start that
/// constructs an engine gets a new generation number.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    device_id: String,
    generation: u64,
    engine: Arc<dyn ProtocolEngine>,
    cancel: CancellationToken,
    pairing: Arc<PairingTracker>,
    receipts: Arc<ReceiptBacklog>,
    writer: Mutex<Option<JoinHandle<()>>>,
    started_at: DateTime<Utc>,
}

impl SessionHandle {
    pub(crate) fn new(
        device_id: String,
        generation: u64,
        engine: Arc<dyn ProtocolEngine>,
        pairing: Arc<PairingTracker>,
        receipts: Arc<ReceiptBacklog>,
        writer: JoinHandle<()>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                device_id,
                generation,
                engine,
                cancel: CancellationToken::new(),
                pairing,
                receipts,
                writer: Mutex::new(Some(writer)),
                started_at: Utc::now(),
            }),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    pub fn engine(&self) -> &Arc<dyn ProtocolEngine> {
        &self.inner.engine
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Transport up and account logged in.
    pub fn is_connected(&self) -> bool {
        self.inner.engine.is_connected() && self.inner.engine.is_logged_in()
    }

    pub fn pairing_status(&self) -> PairingStatus {
        self.inner.pairing.current()
    }

    /// Watch pairing transitions of this session.
    pub fn pairing_updates(&self) -> watch::Receiver<PairingStatus> {
        self.inner.pairing.subscribe()
    }

    /// Whether the session is still worth keeping on a repeated start.
    pub(crate) fn is_live(&self) -> bool {
        !self.inner.cancel.is_cancelled()
            && (self.is_connected()
                || self.inner.pairing.current().state == PairingState::AwaitingScan)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Both handles refer to the same engine instance.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub(crate) fn pairing(&self) -> &Arc<PairingTracker> {
        &self.inner.pairing
    }

    pub(crate) fn receipts(&self) -> &ReceiptBacklog {
        &self.inner.receipts
    }

    /// Take the writer task so exactly one shutdown awaits it.
    pub(crate) fn take_writer(&self) -> Option<JoinHandle<()>> {
        match self.inner.writer.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("device_id", &self.inner.device_id)
            .field("generation", &self.inner.generation)
            .field("connected", &self.is_connected())
            .field("pairing", &self.inner.pairing.current().state)
            .field("started_at", &self.inner.started_at)
            .finish()
    }
}

/// How the pairing driver ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DriverExit {
    Paired,
    Expired,
    /// The engine closed the pairing channel while a scan was pending.
    Abandoned,
    Cancelled,
    ChannelClosed,
}

/// Drive a session through pairing from its engine's pairing channel.
///
/// Persistence goes through the session queue so it is ordered with the
/// event pipeline's writes; these effects wait for capacity instead of
/// being dropped. The queue is dropped before returning so the writer can
/// drain and finish.
pub(crate) async fn drive_pairing(
    device_id: String,
    tracker: Arc<PairingTracker>,
    mut events: mpsc::Receiver<PairingEvent>,
    queue: PersistQueue,
    cancel: CancellationToken,
) -> DriverExit {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return DriverExit::Cancelled,
            event = events.recv() => event,
        };
        let Some(event) = event else {
            let abandoned = tracker.update(|status| {
                let waiting = status.state == PairingState::AwaitingScan;
                if waiting {
                    status.abandon();
                }
                waiting
            });
            if !abandoned {
                debug!(device_id = %device_id, "pairing channel closed");
                return DriverExit::ChannelClosed;
            }
            warn!(device_id = %device_id, "pairing channel closed before a scan");
            queue.push(PersistOp::PairingCode(None)).await;
            return DriverExit::Abandoned;
        };

        match tracker.apply(&event) {
            PairingEffect::StoreCode(code) => {
                info!(device_id = %device_id, "pairing code issued");
                queue.push(PersistOp::PairingCode(Some(code))).await;
            }
            PairingEffect::Complete { protocol_id } => {
                info!(device_id = %device_id, protocol_id = %protocol_id, "device paired");
                queue.push(PersistOp::PairingCode(None)).await;
                queue.push(PersistOp::ProtocolId(Some(protocol_id))).await;
                queue.push(PersistOp::Connected(true)).await;
                return DriverExit::Paired;
            }
            PairingEffect::Expire => {
                warn!(device_id = %device_id, "pairing window expired without a scan");
                queue.push(PersistOp::PairingCode(None)).await;
                return DriverExit::Expired;
            }
            PairingEffect::Ignore => {
                debug!(device_id = %device_id, ?event, "pairing event ignored");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> Arc<PairingTracker> {
        let mut status = PairingStatus::initial(false);
        status.begin_scan();
        Arc::new(PairingTracker::new(status))
    }

    #[tokio::test]
    async fn driver_persists_code_then_completion_in_order() {
        let (queue, mut ops) = PersistQueue::bounded("d1", 8);
        let (tx, rx) = mpsc::channel(4);
        let tracker = tracker();
        tx.send(PairingEvent::Code("ABC123".into())).await.unwrap();
        tx.send(PairingEvent::Success("6281@s.whatsapp.net".into()))
            .await
            .unwrap();

        let exit = drive_pairing(
            "d1".into(),
            Arc::clone(&tracker),
            rx,
            queue,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(exit, DriverExit::Paired);
        assert_eq!(tracker.current().state, PairingState::Paired);
        let mut seen = Vec::new();
        while let Some(op) = ops.recv().await {
            seen.push(op);
        }
        assert_eq!(
            seen,
            vec![
                PersistOp::PairingCode(Some("ABC123".into())),
                PersistOp::PairingCode(None),
                PersistOp::ProtocolId(Some("6281@s.whatsapp.net".into())),
                PersistOp::Connected(true),
            ]
        );
    }

    #[tokio::test]
    async fn driver_expires_on_timeout() {
        let (queue, mut ops) = PersistQueue::bounded("d1", 8);
        let (tx, rx) = mpsc::channel(4);
        tx.send(PairingEvent::Timeout).await.unwrap();
        let exit = drive_pairing("d1".into(), tracker(), rx, queue, CancellationToken::new()).await;
        assert_eq!(exit, DriverExit::Expired);
        assert_eq!(ops.recv().await, Some(PersistOp::PairingCode(None)));
        assert_eq!(ops.recv().await, None);
    }

    #[tokio::test]
    async fn closed_channel_while_waiting_clears_code() {
        let (queue, mut ops) = PersistQueue::bounded("d1", 8);
        let (tx, rx) = mpsc::channel(4);
        let tracker = tracker();
        tx.send(PairingEvent::Code("QR-1".into())).await.unwrap();
        drop(tx);

        let exit = drive_pairing(
            "d1".into(),
            Arc::clone(&tracker),
            rx,
            queue,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(exit, DriverExit::Abandoned);
        let status = tracker.current();
        assert_eq!(status.state, PairingState::Unpaired);
        assert!(status.code.is_none());
        assert_eq!(ops.recv().await, Some(PersistOp::PairingCode(Some("QR-1".into()))));
        assert_eq!(ops.recv().await, Some(PersistOp::PairingCode(None)));
        assert_eq!(ops.recv().await, None);
    }

    #[tokio::test]
    async fn closed_channel_after_pairing_is_quiet() {
        let (queue, mut ops) = PersistQueue::bounded("d1", 8);
        let (tx, rx) = mpsc::channel(4);
        let tracker = tracker();
        tracker.update(|status| status.mark_paired());
        drop(tx);

        let exit = drive_pairing("d1".into(), tracker, rx, queue, CancellationToken::new()).await;
        assert_eq!(exit, DriverExit::ChannelClosed);
        assert_eq!(ops.recv().await, None);
    }

    #[tokio::test]
    async fn driver_stops_on_cancel() {
        let (queue, _ops) = PersistQueue::bounded("d1", 8);
        let (_tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let exit = drive_pairing("d1".into(), tracker(), rx, queue, cancel).await;
        assert_eq!(exit, DriverExit::Cancelled);
    }
}
