// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event ingestion pipeline.
//!
//! Each session runs two tasks. The event loop drains the engine's events in
//! order, classifies each one with [`classify`] and enqueues the resulting
//! [`PersistOp`]s on a bounded per-session queue without waiting. The writer
//! drains that queue and applies the writes. A full queue or a failed write
//! drops the effect with a warning; event delivery never stalls on storage.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use kurir_core::types::{
    ChatType, Direction, MediaRef, MessageStatus, MessageType, NewMessage,
};
use kurir_core::{
    EngineEvent, KurirError, MessageEvent, MessagePayload, ProtocolEngine, ReceiptKind,
    StorageAdapter,
};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::metrics;
use crate::pairing::PairingTracker;

/// App-state collection whose completion means the account is fully usable.
const CRITICAL_BLOCK: &str = "critical_block";

/// Receipts held per session while their message is not logged yet.
const RECEIPT_BACKLOG_CAPACITY: usize = 256;

/// One persistence side effect for a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOp {
    PairingCode(Option<String>),
    ProtocolId(Option<String>),
    Connected(bool),
    /// Thread upsert followed by the message append.
    Message(NewMessage),
    Receipt {
        message_ids: Vec<String>,
        status: MessageStatus,
    },
}

/// Pairing transition implied by an engine event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingSignal {
    Paired,
    LoggedOut,
}

/// Everything the pipeline does in response to one event.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reaction {
    pub ops: Vec<PersistOp>,
    pub send_presence: bool,
    pub pairing: Option<PairingSignal>,
    pub teardown: bool,
}

fn has_push_name(push_name: Option<&str>) -> bool {
    push_name.is_some_and(|name| !name.trim().is_empty())
}

/// Decide the reaction to one engine event. Pure.
pub fn classify(device_id: &str, event: EngineEvent, push_name: Option<&str>) -> Reaction {
    match event {
        EngineEvent::Connected => Reaction {
            ops: vec![PersistOp::Connected(true)],
            send_presence: has_push_name(push_name),
            ..Reaction::default()
        },
        EngineEvent::AppStateSyncComplete { name } => Reaction {
            ops: vec![PersistOp::Connected(true)],
            send_presence: name == CRITICAL_BLOCK && has_push_name(push_name),
            ..Reaction::default()
        },
        EngineEvent::PairSuccess { protocol_id } => Reaction {
            ops: vec![
                PersistOp::PairingCode(None),
                PersistOp::ProtocolId(Some(protocol_id)),
                PersistOp::Connected(true),
            ],
            pairing: Some(PairingSignal::Paired),
            ..Reaction::default()
        },
        EngineEvent::LoggedOut { .. } => Reaction {
            ops: vec![
                PersistOp::Connected(false),
                PersistOp::PairingCode(None),
                PersistOp::ProtocolId(None),
            ],
            pairing: Some(PairingSignal::LoggedOut),
            teardown: true,
            ..Reaction::default()
        },
        EngineEvent::Disconnected => Reaction {
            ops: vec![PersistOp::Connected(false)],
            ..Reaction::default()
        },
        EngineEvent::Message(message) => Reaction {
            ops: message_to_record(device_id, message)
                .map(PersistOp::Message)
                .into_iter()
                .collect(),
            ..Reaction::default()
        },
        EngineEvent::Receipt(receipt) => {
            let status = match receipt.kind {
                ReceiptKind::Delivered => Some(MessageStatus::Delivered),
                ReceiptKind::Read => Some(MessageStatus::Read),
                ReceiptKind::Other(_) => None,
            };
            Reaction {
                ops: status
                    .filter(|_| !receipt.message_ids.is_empty())
                    .map(|status| PersistOp::Receipt {
                        message_ids: receipt.message_ids,
                        status,
                    })
                    .into_iter()
                    .collect(),
                ..Reaction::default()
            }
        }
        EngineEvent::StreamReplaced | EngineEvent::Other(_) => Reaction::default(),
    }
}

/// Loggable content of a message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub content: String,
    pub message_type: MessageType,
    pub media: Option<MediaRef>,
}

/// Pull text, type and media reference out of a payload. `None` for
/// payloads that are not logged.
pub fn extract_content(payload: MessagePayload) -> Option<Extracted> {
    let media = |url: String, filename: &str| {
        Some(MediaRef {
            url,
            filename: filename.to_string(),
        })
    };
    let extracted = match payload {
        MessagePayload::Conversation(text) | MessagePayload::ExtendedText(text) => Extracted {
            content: text,
            message_type: MessageType::Text,
            media: None,
        },
        MessagePayload::Image { caption, url } => Extracted {
            content: caption,
            message_type: MessageType::Image,
            media: media(url, "image"),
        },
        MessagePayload::Video { caption, url } => Extracted {
            content: caption,
            message_type: MessageType::Video,
            media: media(url, "video"),
        },
        MessagePayload::Document {
            title,
            url,
            file_name,
        } => Extracted {
            content: title,
            message_type: MessageType::Document,
            media: media(url, &file_name),
        },
        MessagePayload::Audio { url } => Extracted {
            content: String::new(),
            message_type: MessageType::Audio,
            media: media(url, "audio"),
        },
        MessagePayload::Unsupported(_) => return None,
    };
    Some(extracted)
}

/// Build the log record for a message event.
pub fn message_to_record(device_id: &str, event: MessageEvent) -> Option<NewMessage> {
    let extracted = extract_content(event.payload)?;
    let direction = if event.is_from_me {
        Direction::Outgoing
    } else {
        Direction::Incoming
    };
    Some(NewMessage {
        device_id: device_id.to_string(),
        chat_type: ChatType::of(&event.chat),
        chat_id: event.chat,
        direction,
        message_type: extracted.message_type,
        content: extracted.content,
        media: extracted.media,
        sender_id: match direction {
            Direction::Incoming => Some(event.sender),
            Direction::Outgoing => None,
        },
        protocol_message_id: event.id,
        status: MessageStatus::Sent,
    })
}

/// Producer side of a session's bounded persistence queue.
#[derive(Debug, Clone)]
pub struct PersistQueue {
    device_id: Arc<str>,
    tx: mpsc::Sender<PersistOp>,
}

impl PersistQueue {
    pub fn bounded(device_id: &str, capacity: usize) -> (Self, mpsc::Receiver<PersistOp>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                device_id: Arc::from(device_id),
                tx,
            },
            rx,
        )
    }

    /// Enqueue without waiting. A full or closed queue drops the op.
    pub fn offer(&self, op: PersistOp) -> bool {
        match self.tx.try_send(op) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(op)) => {
                warn!(
                    device_id = %self.device_id,
                    ?op,
                    "persistence queue full, dropping effect"
                );
                metrics::record_drop("queue_full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(op)) => {
                debug!(
                    device_id = %self.device_id,
                    ?op,
                    "persistence queue closed, dropping effect"
                );
                metrics::record_drop("queue_closed");
                false
            }
        }
    }

    /// Enqueue, waiting for capacity. For effects that must not be lost.
    pub async fn push(&self, op: PersistOp) -> bool {
        if let Err(mpsc::error::SendError(op)) = self.tx.send(op).await {
            debug!(
                device_id = %self.device_id,
                ?op,
                "persistence queue closed, dropping effect"
            );
            metrics::record_drop("queue_closed");
            return false;
        }
        true
    }
}

/// Receipts that arrived ahead of the message they acknowledge.
///
/// An outgoing message is logged by the sender after the engine accepts it,
/// while its receipts come through the session queue. Both paths hold the
/// backlog lock across their storage writes, so a receipt either finds the
/// logged row or is held until the row is logged. Oldest entries are evicted
/// past [`RECEIPT_BACKLOG_CAPACITY`].
#[derive(Debug, Default)]
pub struct ReceiptBacklog {
    pending: Mutex<PendingReceipts>,
}

#[derive(Debug, Default)]
struct PendingReceipts {
    order: VecDeque<String>,
    status: HashMap<String, MessageStatus>,
}

impl PendingReceipts {
    fn hold(&mut self, protocol_message_id: &str, status: MessageStatus) {
        if let Some(held) = self.status.get_mut(protocol_message_id) {
            *held = (*held).max(status);
            return;
        }
        if self.order.len() >= RECEIPT_BACKLOG_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.status.remove(&oldest);
                metrics::record_drop("receipt_backlog_full");
            }
        }
        self.order.push_back(protocol_message_id.to_string());
        self.status.insert(protocol_message_id.to_string(), status);
    }

    fn take(&mut self, protocol_message_id: &str) -> Option<MessageStatus> {
        let status = self.status.remove(protocol_message_id)?;
        self.order.retain(|held| held != protocol_message_id);
        Some(status)
    }
}

impl ReceiptBacklog {
    pub async fn len(&self) -> usize {
        self.pending.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Upsert the thread, append the message, then apply any receipt held
    /// for it. Returns whether the message was new.
    pub async fn log_message(
        &self,
        storage: &dyn StorageAdapter,
        message: &NewMessage,
    ) -> Result<bool, KurirError> {
        let mut pending = self.pending.lock().await;
        storage.upsert_thread(&message.thread_update()).await?;
        let inserted = storage.log_message(message).await?;
        if inserted {
            if let Some(status) = pending.take(&message.protocol_message_id) {
                debug!(
                    device_id = %message.device_id,
                    protocol_message_id = %message.protocol_message_id,
                    %status,
                    "applying receipt that arrived before its message"
                );
                storage
                    .update_message_status(
                        &message.device_id,
                        &message.protocol_message_id,
                        status,
                    )
                    .await?;
            }
        }
        Ok(inserted)
    }

    /// Advance each message's status, holding receipts for messages that
    /// are not logged yet.
    pub async fn apply_receipt(
        &self,
        storage: &dyn StorageAdapter,
        device_id: &str,
        message_ids: &[String],
        status: MessageStatus,
    ) -> Result<(), KurirError> {
        let mut pending = self.pending.lock().await;
        for id in message_ids {
            let changed = storage.update_message_status(device_id, id, status).await?;
            if changed > 0 {
                continue;
            }
            if storage.find_message(device_id, id).await?.is_none() {
                trace!(device_id, protocol_message_id = %id, %status, "receipt held");
                pending.hold(id, status);
            } else {
                trace!(device_id, protocol_message_id = %id, %status, "receipt did not advance");
            }
        }
        Ok(())
    }
}

/// Drain a session's queue until every producer is gone.
pub async fn run_writer(
    device_id: String,
    storage: Arc<dyn StorageAdapter>,
    receipts: Arc<ReceiptBacklog>,
    mut rx: mpsc::Receiver<PersistOp>,
) {
    while let Some(op) = rx.recv().await {
        if let Err(e) = apply(&device_id, storage.as_ref(), &receipts, op).await {
            warn!(device_id = %device_id, error = %e, "persistence failed, event dropped");
            metrics::record_drop("persistence_failed");
        }
    }
    debug!(device_id = %device_id, "persistence writer finished");
}

/// Apply one op to storage.
pub async fn apply(
    device_id: &str,
    storage: &dyn StorageAdapter,
    receipts: &ReceiptBacklog,
    op: PersistOp,
) -> Result<(), KurirError> {
    match op {
        PersistOp::PairingCode(code) => {
            storage
                .set_pairing_code(device_id, code.as_deref())
                .await
        }
        PersistOp::ProtocolId(protocol_id) => {
            storage
                .set_protocol_id(device_id, protocol_id.as_deref())
                .await
        }
        PersistOp::Connected(connected) => {
            storage.set_connection_status(device_id, connected).await
        }
        PersistOp::Message(message) => {
            if storage
                .find_message(device_id, &message.protocol_message_id)
                .await?
                .is_some()
            {
                debug!(
                    device_id,
                    protocol_message_id = %message.protocol_message_id,
                    "duplicate message event skipped"
                );
                return Ok(());
            }
            if receipts.log_message(storage, &message).await? {
                metrics::record_message(&message.direction.to_string());
            }
            Ok(())
        }
        PersistOp::Receipt {
            message_ids,
            status,
        } => {
            receipts
                .apply_receipt(storage, device_id, &message_ids, status)
                .await
        }
    }
}

/// Callback used to retire a session from inside its own tasks.
pub(crate) type Teardown = Box<dyn Fn(&'static str) + Send + Sync>;

/// The per-session event loop.
pub(crate) struct EventPipeline {
    pub(crate) device_id: String,
    pub(crate) engine: Arc<dyn ProtocolEngine>,
    pub(crate) queue: PersistQueue,
    pub(crate) pairing: Arc<PairingTracker>,
    pub(crate) presence_on_connect: bool,
    pub(crate) teardown: Teardown,
}

impl EventPipeline {
    /// Consume events in emission order until cancelled or the engine
    /// drops its sink.
    pub(crate) async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            let Some(event) = event else {
                debug!(device_id = %self.device_id, "engine event stream ended");
                break;
            };
            self.handle(event);
        }
        debug!(device_id = %self.device_id, "event loop stopped");
    }

    fn handle(&self, event: EngineEvent) {
        let kind = event.to_string();
        metrics::record_event(&kind);
        match &event {
            EngineEvent::StreamReplaced => {
                info!(device_id = %self.device_id, "stream replaced by another client");
            }
            EngineEvent::LoggedOut { reason } => {
                info!(device_id = %self.device_id, reason = %reason, "device logged out");
            }
            EngineEvent::Other(name) => {
                trace!(device_id = %self.device_id, event = %name, "unhandled engine event");
            }
            _ => debug!(device_id = %self.device_id, event = %kind, "engine event"),
        }

        let push_name = self.engine.push_name();
        let reaction = classify(&self.device_id, event, push_name.as_deref());

        match reaction.pairing {
            Some(PairingSignal::Paired) => self.pairing.update(|s| s.mark_paired()),
            Some(PairingSignal::LoggedOut) => self.pairing.update(|s| s.log_out()),
            None => {}
        }

        for op in reaction.ops {
            self.queue.offer(op);
        }

        if reaction.send_presence && self.presence_on_connect {
            let engine = Arc::clone(&self.engine);
            let device_id = self.device_id.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.send_presence_available().await {
                    warn!(device_id = %device_id, error = %e, "failed to send presence");
                }
            });
        }

        if reaction.teardown {
            (self.teardown)("logged out");
        }
    }
}

#[cfg(test)]
mod tests {
    use kurir_core::ReceiptEvent;
    use kurir_test_utils::{seed_device, temp_storage};
    use proptest::prelude::*;
    use tracing_test::traced_test;

    use super::*;

    fn incoming(payload: MessagePayload) -> EngineEvent {
        EngineEvent::Message(MessageEvent {
            id: "3EB0".into(),
            chat: "628@s.whatsapp.net".into(),
            sender: "628@s.whatsapp.net".into(),
            is_from_me: false,
            payload,
        })
    }

    #[test]
    fn incoming_text_becomes_message_op() {
        let reaction = classify("d1", incoming(MessagePayload::Conversation("hi".into())), None);
        let [PersistOp::Message(msg)] = reaction.ops.as_slice() else {
            panic!("expected a single message op, got {:?}", reaction.ops);
        };
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.direction, Direction::Incoming);
        assert_eq!(msg.sender_id.as_deref(), Some("628@s.whatsapp.net"));
        assert_eq!(msg.chat_type, ChatType::Individual);
        assert_eq!(msg.protocol_message_id, "3EB0");
    }

    #[test]
    fn self_authored_group_message_is_outgoing() {
        let event = EngineEvent::Message(MessageEvent {
            id: "X1".into(),
            chat: "1203@g.us".into(),
            sender: "6281@s.whatsapp.net".into(),
            is_from_me: true,
            payload: MessagePayload::ExtendedText("from phone".into()),
        });
        let reaction = classify("d1", event, None);
        let [PersistOp::Message(msg)] = reaction.ops.as_slice() else {
            panic!("expected a message op");
        };
        assert_eq!(msg.direction, Direction::Outgoing);
        assert_eq!(msg.chat_type, ChatType::Group);
        assert_eq!(msg.sender_id, None);
    }

    #[test]
    fn media_payloads_carry_reference() {
        let doc = extract_content(MessagePayload::Document {
            title: "Invoice".into(),
            url: "https://cdn/doc".into(),
            file_name: "invoice.pdf".into(),
        })
        .unwrap();
        assert_eq!(doc.message_type, MessageType::Document);
        assert_eq!(doc.content, "Invoice");
        assert_eq!(doc.media.unwrap().filename, "invoice.pdf");

        let audio = extract_content(MessagePayload::Audio {
            url: "https://cdn/a".into(),
        })
        .unwrap();
        assert_eq!(audio.content, "");
        assert_eq!(audio.media.unwrap().filename, "audio");
    }

    #[test]
    fn unsupported_payload_is_skipped() {
        let event = incoming(MessagePayload::Unsupported("sticker".into()));
        let reaction = classify("d1", event, None);
        assert!(reaction.ops.is_empty());
    }

    #[test]
    fn receipts_map_known_kinds_only() {
        let receipt = |kind| {
            EngineEvent::Receipt(ReceiptEvent {
                chat: "628@s.whatsapp.net".into(),
                kind,
                message_ids: vec!["a".into(), "b".into()],
            })
        };
        assert_eq!(
            classify("d1", receipt(ReceiptKind::Read), None).ops,
            vec![PersistOp::Receipt {
                message_ids: vec!["a".into(), "b".into()],
                status: MessageStatus::Read,
            }]
        );
        let played = receipt(ReceiptKind::Other("played".into()));
        assert!(classify("d1", played, None).ops.is_empty());
    }

    #[test]
    fn presence_requires_push_name() {
        assert!(!classify("d1", EngineEvent::Connected, None).send_presence);
        assert!(!classify("d1", EngineEvent::Connected, Some("  ")).send_presence);
        assert!(classify("d1", EngineEvent::Connected, Some("Sales")).send_presence);

        let synced = |name: &str| EngineEvent::AppStateSyncComplete { name: name.into() };
        assert!(classify("d1", synced("critical_block"), Some("Sales")).send_presence);
        assert!(!classify("d1", synced("regular"), Some("Sales")).send_presence);
    }

    #[test]
    fn logout_clears_identity_and_tears_down() {
        let reaction = classify(
            "d1",
            EngineEvent::LoggedOut {
                reason: "revoked".into(),
            },
            Some("Sales"),
        );
        assert!(reaction.teardown);
        assert_eq!(reaction.pairing, Some(PairingSignal::LoggedOut));
        assert!(reaction.ops.contains(&PersistOp::Connected(false)));
        assert!(reaction.ops.contains(&PersistOp::ProtocolId(None)));
        assert!(!reaction.send_presence);
    }

    #[test]
    fn passive_events_do_nothing() {
        assert_eq!(classify("d1", EngineEvent::StreamReplaced, None), Reaction::default());
        assert_eq!(
            classify("d1", EngineEvent::Other("history_sync".into()), None),
            Reaction::default()
        );
        assert_eq!(
            classify("d1", EngineEvent::Disconnected, None).ops,
            vec![PersistOp::Connected(false)]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn offer_drops_when_full() {
        let (queue, mut rx) = PersistQueue::bounded("d1", 1);
        assert!(queue.offer(PersistOp::Connected(true)));
        assert!(!queue.offer(PersistOp::Connected(false)));
        assert_eq!(rx.recv().await, Some(PersistOp::Connected(true)));
        assert!(logs_contain("persistence queue full"));
    }

    fn text_message(device_id: &str, id: &str) -> NewMessage {
        NewMessage {
            device_id: device_id.into(),
            chat_id: "628@s.whatsapp.net".into(),
            chat_type: ChatType::Individual,
            direction: Direction::Incoming,
            message_type: MessageType::Text,
            content: "hi".into(),
            media: None,
            sender_id: Some("628@s.whatsapp.net".into()),
            protocol_message_id: id.into(),
            status: MessageStatus::Sent,
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn writer_logs_and_continues_after_failed_write() {
        let (storage, _dir) = temp_storage().await.unwrap();
        seed_device(storage.as_ref(), "d1", "Sales", None).await.unwrap();
        let storage: Arc<dyn StorageAdapter> = storage;

        let (queue, rx) = PersistQueue::bounded("d1", 8);
        // No such device: the thread upsert violates the foreign key.
        queue.offer(PersistOp::Message(text_message("ghost", "M0")));
        queue.offer(PersistOp::Message(text_message("d1", "M1")));
        drop(queue);
        run_writer("d1".into(), Arc::clone(&storage), Arc::default(), rx).await;

        assert!(logs_contain("persistence failed"));
        assert!(storage.find_message("d1", "M1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_message_does_not_double_count_unread() {
        let (storage, _dir) = temp_storage().await.unwrap();
        seed_device(storage.as_ref(), "d1", "Sales", None).await.unwrap();

        let receipts = ReceiptBacklog::default();
        for _ in 0..2 {
            let op = PersistOp::Message(text_message("d1", "M1"));
            apply("d1", storage.as_ref(), &receipts, op).await.unwrap();
        }
        let threads = storage.list_threads("d1", 10, 0).await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].unread_count, 1);
        let messages = storage
            .list_messages("d1", "628@s.whatsapp.net", 10, 0)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn receipt_ahead_of_its_message_is_applied_on_log() {
        let (storage, _dir) = temp_storage().await.unwrap();
        seed_device(storage.as_ref(), "d1", "Sales", None).await.unwrap();
        let receipts = ReceiptBacklog::default();

        let early = PersistOp::Receipt {
            message_ids: vec!["OUT1".into()],
            status: MessageStatus::Delivered,
        };
        apply("d1", storage.as_ref(), &receipts, early).await.unwrap();
        assert_eq!(receipts.len().await, 1);

        let mut sent = text_message("d1", "OUT1");
        sent.direction = Direction::Outgoing;
        sent.sender_id = None;
        assert!(receipts.log_message(storage.as_ref(), &sent).await.unwrap());

        let stored = storage.find_message("d1", "OUT1").await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Delivered);
        assert!(receipts.is_empty().await);
    }

    #[tokio::test]
    async fn receipt_for_logged_message_is_not_held() {
        let (storage, _dir) = temp_storage().await.unwrap();
        seed_device(storage.as_ref(), "d1", "Sales", None).await.unwrap();
        let receipts = ReceiptBacklog::default();
        receipts
            .log_message(storage.as_ref(), &text_message("d1", "M1"))
            .await
            .unwrap();

        let ids = vec!["M1".to_string()];
        for status in [MessageStatus::Read, MessageStatus::Delivered] {
            receipts
                .apply_receipt(storage.as_ref(), "d1", &ids, status)
                .await
                .unwrap();
        }
        assert!(receipts.is_empty().await);
        let stored = storage.find_message("d1", "M1").await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Read);
    }

    #[test]
    fn backlog_keeps_highest_status_and_evicts_oldest() {
        let mut pending = PendingReceipts::default();
        pending.hold("a", MessageStatus::Read);
        pending.hold("a", MessageStatus::Delivered);
        assert_eq!(pending.take("a"), Some(MessageStatus::Read));

        for i in 0..=RECEIPT_BACKLOG_CAPACITY {
            pending.hold(&format!("m{i}"), MessageStatus::Delivered);
        }
        assert_eq!(pending.order.len(), RECEIPT_BACKLOG_CAPACITY);
        assert_eq!(pending.take("m0"), None);
        assert!(pending.take(&format!("m{RECEIPT_BACKLOG_CAPACITY}")).is_some());
    }

    fn any_payload() -> impl Strategy<Value = MessagePayload> {
        let url = "https://[a-z]{1,8}";
        prop_oneof![
            ".*".prop_map(MessagePayload::Conversation),
            (".*", url).prop_map(|(caption, url)| MessagePayload::Image { caption, url }),
            (".*", url).prop_map(|(caption, url)| MessagePayload::Video { caption, url }),
            (".*", url, "[a-z]{1,8}\\.pdf").prop_map(|(title, url, file_name)| {
                MessagePayload::Document {
                    title,
                    url,
                    file_name,
                }
            }),
            url.prop_map(|url| MessagePayload::Audio { url }),
        ]
    }

    proptest! {
        #[test]
        fn non_text_always_has_media(payload in any_payload()) {
            let extracted = extract_content(payload).unwrap();
            let is_text = extracted.message_type == MessageType::Text;
            prop_assert_eq!(extracted.media.is_some(), !is_text);
        }
    }
}
