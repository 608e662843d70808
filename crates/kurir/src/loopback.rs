// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loopback protocol engine for local development.
//!
//! Talks to no network. An unpaired device is shown a generated pairing code
//! and is linked automatically after the configured delay. Sends succeed with
//! fresh message ids and are acknowledged by a delivered receipt.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kurir_config::model::{EngineConfig, KNOWN_ENGINE_KINDS};
use kurir_core::chat::USER_SERVER;
use kurir_core::types::{ContactInfo, Device, GroupInfo, OutboundMedia, SentMedia};
use kurir_core::{
    EngineEvent, EngineFactory, EventSink, KurirError, PairingEvent, ProtocolEngine,
    ReceiptEvent, ReceiptKind,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Delay before a send is acknowledged as delivered.
const RECEIPT_DELAY: Duration = Duration::from_millis(200);

/// Build the engine factory named in configuration.
pub fn engine_factory(config: &EngineConfig) -> Result<Arc<dyn EngineFactory>, KurirError> {
    match config.kind.as_str() {
        "loopback" => Ok(Arc::new(LoopbackFactory {
            pairing_delay: Duration::from_millis(config.pairing_delay_ms),
        })),
        other => Err(KurirError::Config(format!(
            "unknown engine kind `{other}`, expected one of: {}",
            KNOWN_ENGINE_KINDS.join(", ")
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct LoopbackFactory {
    pairing_delay: Duration,
}

#[async_trait]
impl EngineFactory for LoopbackFactory {
    async fn create(&self, device: &Device) -> Result<Arc<dyn ProtocolEngine>, KurirError> {
        Ok(Arc::new(LoopbackEngine::new(device, self.pairing_delay)))
    }
}

struct State {
    device_id: String,
    display_name: String,
    protocol_id: String,
    pairing_delay: Duration,
    paired: AtomicBool,
    connected: AtomicBool,
    logged_in: AtomicBool,
    sink: Mutex<Option<EventSink>>,
    pairing: Mutex<Option<mpsc::Sender<PairingEvent>>>,
    next_id: AtomicU64,
    closed: CancellationToken,
}

impl State {
    fn new(device: &Device, pairing_delay: Duration) -> Self {
        let protocol_id = device.protocol_id.clone().unwrap_or_else(|| {
            let digits: String = device
                .mobile_number
                .chars()
                .filter(char::is_ascii_digit)
                .collect();
            format!("{digits}{USER_SERVER}")
        });
        Self {
            device_id: device.id.clone(),
            display_name: device.display_name.clone(),
            protocol_id,
            pairing_delay,
            paired: AtomicBool::new(device.is_paired()),
            connected: AtomicBool::new(false),
            logged_in: AtomicBool::new(false),
            sink: Mutex::new(None),
            pairing: Mutex::new(None),
            next_id: AtomicU64::new(1),
            closed: CancellationToken::new(),
        }
    }

    fn sink(&self) -> Option<EventSink> {
        self.sink
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = self.sink() {
            let _ = sink.send(event);
        }
    }

    fn message_id(&self) -> String {
        format!("LB{:012X}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn ensure_logged_in(&self) -> Result<(), KurirError> {
        if self.logged_in.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(KurirError::send_failed(format!(
                "device {} is not logged in",
                self.device_id
            )))
        }
    }

    fn acknowledge(&self, chat_id: &str, message_id: &str) {
        let Some(sink) = self.sink() else {
            return;
        };
        let receipt = EngineEvent::Receipt(ReceiptEvent {
            chat: chat_id.to_string(),
            kind: ReceiptKind::Delivered,
            message_ids: vec![message_id.to_string()],
        });
        let closed = self.closed.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = closed.cancelled() => {}
                _ = tokio::time::sleep(RECEIPT_DELAY) => {
                    let _ = sink.send(receipt);
                }
            }
        });
    }

    /// Issue a code, wait, then link the account.
    fn simulate_scan(self: &Arc<Self>, tx: mpsc::Sender<PairingEvent>) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let code = format!("2@{},{}", uuid::Uuid::new_v4().simple(), engine.device_id);
            if tx.send(PairingEvent::Code(code)).await.is_err() {
                return;
            }
            tokio::select! {
                _ = engine.closed.cancelled() => return,
                _ = tokio::time::sleep(engine.pairing_delay) => {}
            }
            engine.paired.store(true, Ordering::SeqCst);
            engine.logged_in.store(true, Ordering::SeqCst);
            let _ = tx
                .send(PairingEvent::Success(engine.protocol_id.clone()))
                .await;
            engine.emit(EngineEvent::PairSuccess {
                protocol_id: engine.protocol_id.clone(),
            });
            engine.emit(EngineEvent::Connected);
            debug!(device_id = %engine.device_id, "loopback pairing completed");
        });
    }
}

/// A loopback session for one device.
pub struct LoopbackEngine {
    state: Arc<State>,
}

impl LoopbackEngine {
    pub fn new(device: &Device, pairing_delay: Duration) -> Self {
        Self {
            state: Arc::new(State::new(device, pairing_delay)),
        }
    }
}

#[async_trait]
impl ProtocolEngine for LoopbackEngine {
    async fn connect(&self) -> Result<(), KurirError> {
        let engine = &self.state;
        engine.connected.store(true, Ordering::SeqCst);
        if engine.paired.load(Ordering::SeqCst) {
            engine.logged_in.store(true, Ordering::SeqCst);
            engine.emit(EngineEvent::Connected);
            engine.emit(EngineEvent::AppStateSyncComplete {
                name: "critical_block".into(),
            });
            return Ok(());
        }
        let pending = engine
            .pairing
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
        match pending {
            Some(tx) => {
                engine.simulate_scan(tx);
                Ok(())
            }
            None => Err(KurirError::ConnectFailed {
                device_id: engine.device_id.clone(),
                message: "pairing channel must be opened before connecting".into(),
            }),
        }
    }

    async fn disconnect(&self) {
        self.state.closed.cancel();
        self.state.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    fn is_logged_in(&self) -> bool {
        self.state.logged_in.load(Ordering::SeqCst)
    }

    fn push_name(&self) -> Option<String> {
        Some(self.state.display_name.clone())
    }

    async fn pairing_channel(&self) -> Result<mpsc::Receiver<PairingEvent>, KurirError> {
        let (tx, rx) = mpsc::channel(4);
        match self.state.pairing.lock() {
            Ok(mut guard) => *guard = Some(tx),
            Err(poisoned) => *poisoned.into_inner() = Some(tx),
        }
        Ok(rx)
    }

    fn subscribe(&self, sink: EventSink) {
        match self.state.sink.lock() {
            Ok(mut guard) => *guard = Some(sink),
            Err(poisoned) => *poisoned.into_inner() = Some(sink),
        }
    }

    async fn send_text(&self, chat_id: &str, _text: &str) -> Result<String, KurirError> {
        self.state.ensure_logged_in()?;
        let id = self.state.message_id();
        self.state.acknowledge(chat_id, &id);
        Ok(id)
    }

    async fn send_media(
        &self,
        chat_id: &str,
        media: OutboundMedia,
    ) -> Result<SentMedia, KurirError> {
        self.state.ensure_logged_in()?;
        let id = self.state.message_id();
        self.state.acknowledge(chat_id, &id);
        Ok(SentMedia {
            url: Some(format!("loopback://media/{id}/{}", media.filename)),
            message_id: id,
        })
    }

    async fn send_presence_available(&self) -> Result<(), KurirError> {
        debug!(device_id = %self.state.device_id, "loopback presence available");
        Ok(())
    }

    async fn joined_groups(&self) -> Result<Vec<GroupInfo>, KurirError> {
        Ok(Vec::new())
    }

    async fn contacts(&self) -> Result<Vec<ContactInfo>, KurirError> {
        Ok(Vec::new())
    }
}
