// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock protocol engine for deterministic testing.
//!
//! `MockEngine` implements `ProtocolEngine` with a scriptable pairing channel,
//! injectable events and captured sends. `MockEngineFactory` hands out a new
//! engine per session start and keeps every one for later assertions.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use kurir_core::types::{ContactInfo, Device, GroupInfo, OutboundMedia, SentMedia};
use kurir_core::{
    EngineEvent, EngineFactory, EventSink, KurirError, PairingEvent, ProtocolEngine,
    ReceiptEvent, ReceiptKind,
};
use tokio::sync::mpsc;
use tracing::debug;

/// One send captured by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub chat_id: String,
    /// Text body, or the filename for media.
    pub body: String,
    pub message_id: String,
    pub is_media: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A scriptable protocol engine bound to one device.
pub struct MockEngine {
    device_id: String,
    instance: u64,
    paired: bool,
    connected: AtomicBool,
    logged_in: AtomicBool,
    fail_connect: bool,
    fail_send: AtomicBool,
    ack_early: AtomicBool,
    push_name: Mutex<Option<String>>,
    sink: Mutex<Option<EventSink>>,
    pairing: Mutex<Option<mpsc::Sender<PairingEvent>>>,
    sent: Mutex<Vec<SentRecord>>,
    groups: Vec<GroupInfo>,
    contacts: Vec<ContactInfo>,
    presence_sent: AtomicUsize,
    disconnects: AtomicUsize,
    next_id: AtomicU64,
}

impl MockEngine {
    /// Engine for `device`; paired iff the device has a protocol identifier.
    pub fn new(device: &Device, instance: u64) -> Self {
        Self {
            device_id: device.id.clone(),
            instance,
            paired: device.is_paired(),
            connected: AtomicBool::new(false),
            logged_in: AtomicBool::new(false),
            fail_connect: false,
            fail_send: AtomicBool::new(false),
            ack_early: AtomicBool::new(false),
            push_name: Mutex::new(None),
            sink: Mutex::new(None),
            pairing: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            groups: Vec::new(),
            contacts: Vec::new(),
            presence_sent: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Sequence number assigned by the factory; distinct per engine.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Push an event to the subscribed session. False if nobody listens.
    pub fn emit(&self, event: EngineEvent) -> bool {
        match lock(&self.sink).as_ref() {
            Some(sink) => sink.send(event).is_ok(),
            None => {
                debug!(device_id = %self.device_id, ?event, "mock event has no subscriber");
                false
            }
        }
    }

    /// Issue a pairing code on the pairing channel.
    pub async fn issue_code(&self, code: &str) -> bool {
        self.send_pairing(PairingEvent::Code(code.to_string())).await
    }

    /// Complete pairing: the account logs in and the engine reports it on
    /// both the pairing channel and the event stream.
    pub async fn complete_pairing(&self, protocol_id: &str) -> bool {
        self.logged_in.store(true, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        let delivered = self
            .send_pairing(PairingEvent::Success(protocol_id.to_string()))
            .await;
        self.emit(EngineEvent::PairSuccess {
            protocol_id: protocol_id.to_string(),
        });
        delivered
    }

    /// Let the pairing window lapse.
    pub async fn expire_pairing(&self) -> bool {
        self.send_pairing(PairingEvent::Timeout).await
    }

    /// End the pairing stream without a result. False if none was open.
    pub fn close_pairing(&self) -> bool {
        let closed = lock(&self.pairing).take().is_some();
        debug!(device_id = %self.device_id, closed, "mock pairing channel closed");
        closed
    }

    /// The primary device revoked this session.
    pub fn log_out(&self, reason: &str) -> bool {
        self.logged_in.store(false, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.emit(EngineEvent::LoggedOut {
            reason: reason.to_string(),
        })
    }

    pub fn set_push_name(&self, name: &str) {
        *lock(&self.push_name) = Some(name.to_string());
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Emit a delivered receipt for each text send before the send returns.
    pub fn ack_before_return(&self, enabled: bool) {
        self.ack_early.store(enabled, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        lock(&self.sent).clone()
    }

    pub fn presence_count(&self) -> usize {
        self.presence_sent.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn has_pairing_channel(&self) -> bool {
        lock(&self.pairing).is_some()
    }

    async fn send_pairing(&self, event: PairingEvent) -> bool {
        let tx = lock(&self.pairing).clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    fn next_message_id(&self) -> String {
        format!(
            "MOCK{}-{}",
            self.instance,
            self.next_id.fetch_add(1, Ordering::SeqCst)
        )
    }
}

impl std::fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEngine")
            .field("device_id", &self.device_id)
            .field("instance", &self.instance)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl ProtocolEngine for MockEngine {
    async fn connect(&self) -> Result<(), KurirError> {
        if self.fail_connect {
            return Err(KurirError::ConnectFailed {
                device_id: self.device_id.clone(),
                message: "mock connect failure".into(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        if self.paired {
            self.logged_in.store(true, Ordering::SeqCst);
            self.emit(EngineEvent::Connected);
        }
        Ok(())
    }

    async fn disconnect(&self) {
        debug!(device_id = %self.device_id, instance = self.instance, "mock engine disconnected");
        self.connected.store(false, Ordering::SeqCst);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    fn push_name(&self) -> Option<String> {
        lock(&self.push_name).clone()
    }

    async fn pairing_channel(&self) -> Result<mpsc::Receiver<PairingEvent>, KurirError> {
        let (tx, rx) = mpsc::channel(16);
        *lock(&self.pairing) = Some(tx);
        Ok(rx)
    }

    fn subscribe(&self, sink: EventSink) {
        *lock(&self.sink) = Some(sink);
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<String, KurirError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(KurirError::send_failed("mock send failure"));
        }
        let message_id = self.next_message_id();
        lock(&self.sent).push(SentRecord {
            chat_id: chat_id.to_string(),
            body: text.to_string(),
            message_id: message_id.clone(),
            is_media: false,
        });
        if self.ack_early.load(Ordering::SeqCst) {
            self.emit(EngineEvent::Receipt(ReceiptEvent {
                chat: chat_id.to_string(),
                kind: ReceiptKind::Delivered,
                message_ids: vec![message_id.clone()],
            }));
            // Let the session apply the receipt before the caller logs the send.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        Ok(message_id)
    }

    async fn send_media(
        &self,
        chat_id: &str,
        media: OutboundMedia,
    ) -> Result<SentMedia, KurirError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(KurirError::send_failed("mock upload failure"));
        }
        let message_id = self.next_message_id();
        lock(&self.sent).push(SentRecord {
            chat_id: chat_id.to_string(),
            body: media.filename.clone(),
            message_id: message_id.clone(),
            is_media: true,
        });
        Ok(SentMedia {
            message_id,
            url: Some(format!("https://media.invalid/{}", media.filename)),
        })
    }

    async fn send_presence_available(&self) -> Result<(), KurirError> {
        self.presence_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn joined_groups(&self) -> Result<Vec<GroupInfo>, KurirError> {
        Ok(self.groups.clone())
    }

    async fn contacts(&self) -> Result<Vec<ContactInfo>, KurirError> {
        Ok(self.contacts.clone())
    }
}

/// Builds a fresh [`MockEngine`] per session start and records it.
#[derive(Default)]
pub struct MockEngineFactory {
    created: Mutex<Vec<Arc<MockEngine>>>,
    failing_connect: Mutex<HashSet<String>>,
    failing_create: Mutex<HashSet<String>>,
    push_name: Mutex<Option<String>>,
    groups: Mutex<Vec<GroupInfo>>,
    contacts: Mutex<Vec<ContactInfo>>,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push name every new engine reports.
    pub fn with_push_name(self, name: &str) -> Self {
        *lock(&self.push_name) = Some(name.to_string());
        self
    }

    pub fn with_groups(self, groups: Vec<GroupInfo>) -> Self {
        *lock(&self.groups) = groups;
        self
    }

    pub fn with_contacts(self, contacts: Vec<ContactInfo>) -> Self {
        *lock(&self.contacts) = contacts;
        self
    }

    /// Engines built for `device_id` refuse to connect.
    pub fn fail_connect_for(&self, device_id: &str) {
        lock(&self.failing_connect).insert(device_id.to_string());
    }

    /// Building an engine for `device_id` fails outright.
    pub fn fail_create_for(&self, device_id: &str) {
        lock(&self.failing_create).insert(device_id.to_string());
    }

    /// Every engine built so far, oldest first.
    pub fn instances(&self) -> Vec<Arc<MockEngine>> {
        lock(&self.created).clone()
    }

    /// Most recent engine built for `device_id`.
    pub fn latest(&self, device_id: &str) -> Option<Arc<MockEngine>> {
        lock(&self.created)
            .iter()
            .rev()
            .find(|e| e.device_id == device_id)
            .cloned()
    }

    pub fn created_for(&self, device_id: &str) -> usize {
        lock(&self.created)
            .iter()
            .filter(|e| e.device_id == device_id)
            .count()
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn create(&self, device: &Device) -> Result<Arc<dyn ProtocolEngine>, KurirError> {
        if lock(&self.failing_create).contains(&device.id) {
            return Err(KurirError::Internal(format!(
                "mock engine unavailable for {}",
                device.id
            )));
        }
        let mut created = lock(&self.created);
        let mut engine = MockEngine::new(device, created.len() as u64 + 1);
        engine.fail_connect = lock(&self.failing_connect).contains(&device.id);
        engine.groups = lock(&self.groups).clone();
        engine.contacts = lock(&self.contacts).clone();
        if let Some(name) = lock(&self.push_name).clone() {
            engine.set_push_name(&name);
        }
        let engine = Arc::new(engine);
        created.push(Arc::clone(&engine));
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(protocol_id: Option<&str>) -> Device {
        Device {
            id: "d1".into(),
            display_name: "Sales".into(),
            mobile_number: "6281".into(),
            protocol_id: protocol_id.map(str::to_string),
            pairing_code: None,
            is_connected: false,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[tokio::test]
    async fn paired_engine_logs_in_on_connect() {
        let engine = MockEngine::new(&device(Some("6281@s.whatsapp.net")), 1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.subscribe(tx);
        engine.connect().await.unwrap();
        assert!(engine.is_connected() && engine.is_logged_in());
        assert_eq!(rx.recv().await, Some(EngineEvent::Connected));
    }

    #[tokio::test]
    async fn unpaired_engine_waits_for_pairing() {
        let engine = MockEngine::new(&device(None), 1);
        let mut pairing = engine.pairing_channel().await.unwrap();
        engine.connect().await.unwrap();
        assert!(!engine.is_logged_in());
        assert!(engine.issue_code("ABC").await);
        assert_eq!(pairing.recv().await, Some(PairingEvent::Code("ABC".into())));
    }

    #[tokio::test]
    async fn closing_pairing_ends_the_stream() {
        let engine = MockEngine::new(&device(None), 1);
        let mut pairing = engine.pairing_channel().await.unwrap();
        assert!(engine.close_pairing());
        assert!(!engine.has_pairing_channel());
        assert_eq!(pairing.recv().await, None);
        assert!(!engine.issue_code("late").await);
    }

    #[tokio::test]
    async fn early_ack_precedes_send_result() {
        let engine = MockEngine::new(&device(Some("6281@s.whatsapp.net")), 1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.subscribe(tx);
        engine.ack_before_return(true);
        let id = engine.send_text("628@s.whatsapp.net", "hi").await.unwrap();
        match rx.try_recv().unwrap() {
            EngineEvent::Receipt(receipt) => assert_eq!(receipt.message_ids, vec![id]),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn factory_builds_distinct_instances() {
        let factory = MockEngineFactory::new();
        factory.create(&device(None)).await.unwrap();
        factory.create(&device(None)).await.unwrap();
        let all = factory.instances();
        assert_eq!(all.len(), 2);
        assert_ne!(all[0].instance(), all[1].instance());
        assert_eq!(factory.latest("d1").unwrap().instance(), 2);
    }
}
