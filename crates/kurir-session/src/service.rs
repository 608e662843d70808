// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device operations exposed to an API layer.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use kurir_core::chat::normalize_recipient;
use kurir_core::types::{
    ChatType, ContactInfo, Device, Direction, GroupInfo, MediaRef, Message, MessageStatus,
    MessageType, NewMessage, OutboundMedia, Thread,
};
use kurir_core::{KurirError, StorageAdapter};
use tracing::{info, warn};

use crate::metrics;
use crate::qr::render_pairing_code;
use crate::registry::SessionManager;
use crate::session::SessionHandle;
use crate::supervisor::{ConnectOutcome, Supervisor};

/// Facade over storage, the session registry and the supervisor.
#[derive(Clone)]
pub struct DeviceService {
    storage: Arc<dyn StorageAdapter>,
    supervisor: Supervisor,
}

impl DeviceService {
    pub fn new(storage: Arc<dyn StorageAdapter>, supervisor: Supervisor) -> Self {
        Self {
            storage,
            supervisor,
        }
    }

    fn sessions(&self) -> &SessionManager {
        self.supervisor.manager()
    }

    /// Create a device record with a fresh identifier. The device is not
    /// started.
    pub async fn register_device(
        &self,
        display_name: &str,
        mobile_number: &str,
    ) -> Result<Device, KurirError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let device = Device {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
            mobile_number: mobile_number.to_string(),
            protocol_id: None,
            pairing_code: None,
            is_connected: false,
            created_at: now.clone(),
            updated_at: now,
        };
        self.storage.create_device(&device).await?;
        info!(device_id = %device.id, display_name, "device registered");
        Ok(device)
    }

    pub async fn start_device(&self, device_id: &str) -> Result<ConnectOutcome, KurirError> {
        self.supervisor.connect_device(device_id).await
    }

    /// Returns whether the session was connected when stopped.
    pub async fn stop_device(&self, device_id: &str) -> Result<bool, KurirError> {
        self.require_device(device_id).await?;
        self.sessions().stop(device_id).await
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Device, KurirError> {
        self.require_device(device_id).await
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>, KurirError> {
        self.storage.list_devices().await
    }

    /// Live connection state from the registry, not the stored flag.
    pub fn is_connected(&self, device_id: &str) -> bool {
        self.sessions().is_connected(device_id)
    }

    /// Send a text message; returns the protocol message id.
    pub async fn send_text(
        &self,
        device_id: &str,
        recipient: &str,
        text: &str,
    ) -> Result<String, KurirError> {
        let session = self.running_session(device_id).await?;
        let chat_id = normalize_recipient(recipient);
        let message_id = session
            .engine()
            .send_text(&chat_id, text)
            .await
            .map_err(into_send_failed)?;

        let outgoing = NewMessage {
            device_id: device_id.to_string(),
            chat_type: ChatType::of(&chat_id),
            chat_id,
            direction: Direction::Outgoing,
            message_type: MessageType::Text,
            content: text.to_string(),
            media: None,
            sender_id: None,
            protocol_message_id: message_id.clone(),
            status: MessageStatus::Sent,
        };
        self.log_outgoing(&session, outgoing).await;
        Ok(message_id)
    }

    /// Upload and send a media message; returns the protocol message id.
    pub async fn send_media(
        &self,
        device_id: &str,
        recipient: &str,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, KurirError> {
        let session = self.running_session(device_id).await?;
        let chat_id = normalize_recipient(recipient);
        let media = OutboundMedia {
            bytes,
            filename: filename.to_string(),
            content_type: content_type.to_string(),
        };
        let sent = session
            .engine()
            .send_media(&chat_id, media)
            .await
            .map_err(into_send_failed)?;

        let outgoing = NewMessage {
            device_id: device_id.to_string(),
            chat_type: ChatType::of(&chat_id),
            chat_id,
            direction: Direction::Outgoing,
            message_type: MessageType::from_content_type(content_type),
            content: String::new(),
            media: Some(MediaRef {
                url: sent.url.unwrap_or_else(|| filename.to_string()),
                filename: filename.to_string(),
            }),
            sender_id: None,
            protocol_message_id: sent.message_id.clone(),
            status: MessageStatus::Sent,
        };
        self.log_outgoing(&session, outgoing).await;
        Ok(sent.message_id)
    }

    /// Stop the device's session if one runs, then delete its record and
    /// everything logged under it.
    pub async fn delete_device(&self, device_id: &str) -> Result<(), KurirError> {
        self.require_device(device_id).await?;
        match self.sessions().stop(device_id).await {
            Ok(_) | Err(KurirError::SessionNotRunning { .. }) => {}
            Err(e) => return Err(e),
        }
        self.storage.delete_device(device_id).await?;
        info!(device_id, "device deleted");
        Ok(())
    }

    pub async fn list_threads(
        &self,
        device_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Thread>, KurirError> {
        self.require_device(device_id).await?;
        self.storage.list_threads(device_id, limit, offset).await
    }

    pub async fn list_messages(
        &self,
        device_id: &str,
        chat_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, KurirError> {
        self.require_device(device_id).await?;
        self.storage
            .list_messages(device_id, chat_id, limit, offset)
            .await
    }

    /// Zero the thread's unread counter and mark its incoming messages read.
    /// Returns the number of messages updated.
    pub async fn mark_read(&self, device_id: &str, chat_id: &str) -> Result<usize, KurirError> {
        self.require_device(device_id).await?;
        self.storage.reset_unread(device_id, chat_id).await?;
        self.storage.mark_chat_read(device_id, chat_id).await
    }

    /// Stored pairing code rendered as a terminal QR, if a scan is pending.
    pub async fn pairing_qr(&self, device_id: &str) -> Result<Option<String>, KurirError> {
        let device = self.require_device(device_id).await?;
        match device.pairing_code.as_deref() {
            Some(code) if !code.is_empty() => render_pairing_code(code).map(Some),
            _ => Ok(None),
        }
    }

    /// Fetch the joined groups from the engine and store them.
    pub async fn sync_groups(&self, device_id: &str) -> Result<usize, KurirError> {
        let session = self.running_session(device_id).await?;
        let groups = session.engine().joined_groups().await?;
        self.storage.upsert_groups(device_id, &groups).await?;
        info!(device_id, count = groups.len(), "groups synced");
        Ok(groups.len())
    }

    /// Fetch the address book from the engine and store it.
    pub async fn sync_contacts(&self, device_id: &str) -> Result<usize, KurirError> {
        let session = self.running_session(device_id).await?;
        let contacts = session.engine().contacts().await?;
        self.storage.upsert_contacts(device_id, &contacts).await?;
        info!(device_id, count = contacts.len(), "contacts synced");
        Ok(contacts.len())
    }

    pub async fn list_groups(&self, device_id: &str) -> Result<Vec<GroupInfo>, KurirError> {
        self.require_device(device_id).await?;
        self.storage.list_groups(device_id).await
    }

    pub async fn list_contacts(&self, device_id: &str) -> Result<Vec<ContactInfo>, KurirError> {
        self.require_device(device_id).await?;
        self.storage.list_contacts(device_id).await
    }

    async fn require_device(&self, device_id: &str) -> Result<Device, KurirError> {
        self.storage
            .get_device(device_id)
            .await?
            .ok_or_else(|| KurirError::DeviceNotFound {
                device_id: device_id.to_string(),
            })
    }

    async fn running_session(&self, device_id: &str) -> Result<SessionHandle, KurirError> {
        self.require_device(device_id).await?;
        self.sessions()
            .get(device_id)
            .ok_or_else(|| KurirError::SessionNotRunning {
                device_id: device_id.to_string(),
            })
    }

    /// Record an accepted send. The send already happened, so a storage
    /// failure here is only logged. Goes through the session's receipt
    /// backlog so an acknowledgement that beat this write still applies.
    async fn log_outgoing(&self, session: &SessionHandle, message: NewMessage) {
        let device_id = message.device_id.clone();
        let result = session
            .receipts()
            .log_message(self.storage.as_ref(), &message)
            .await;
        match result {
            Ok(true) => metrics::record_message(&Direction::Outgoing.to_string()),
            Ok(false) => {}
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "failed to log outgoing message");
                metrics::record_drop("persistence_failed");
            }
        }
    }
}

fn into_send_failed(error: KurirError) -> KurirError {
    match error {
        KurirError::SendFailed { .. } => error,
        other => KurirError::SendFailed {
            message: other.to_string(),
            source: Some(Box::new(other)),
        },
    }
}
