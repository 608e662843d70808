// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends.

use async_trait::async_trait;

use crate::error::KurirError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ContactInfo, Device, GroupInfo, Message, MessageStatus, NewMessage, Thread, ThreadUpdate,
};

/// Durable storage for devices, threads, the message log, groups and contacts.
///
/// Each method is a single-record (or single-statement) operation; callers
/// never hold a transaction open across calls.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), KurirError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), KurirError>;

    // --- Devices ---

    async fn create_device(&self, device: &Device) -> Result<(), KurirError>;

    async fn get_device(&self, id: &str) -> Result<Option<Device>, KurirError>;

    async fn list_devices(&self) -> Result<Vec<Device>, KurirError>;

    /// Deletes a device and everything scoped to it. Returns false when absent.
    async fn delete_device(&self, id: &str) -> Result<bool, KurirError>;

    /// Stores or clears (`None`) the transient pairing code.
    async fn set_pairing_code(&self, id: &str, code: Option<&str>) -> Result<(), KurirError>;

    /// Stores or clears (`None`) the protocol identifier.
    async fn set_protocol_id(&self, id: &str, protocol_id: Option<&str>)
    -> Result<(), KurirError>;

    async fn set_connection_status(&self, id: &str, connected: bool) -> Result<(), KurirError>;

    /// Clears every connection flag. Returns the number of devices touched.
    async fn reset_connection_flags(&self) -> Result<usize, KurirError>;

    // --- Threads ---

    /// Creates or overwrites the summary for (device, chat). Incoming updates
    /// bump the unread counter.
    async fn upsert_thread(&self, update: &ThreadUpdate) -> Result<(), KurirError>;

    async fn reset_unread(&self, device_id: &str, chat_id: &str) -> Result<(), KurirError>;

    async fn list_threads(
        &self,
        device_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Thread>, KurirError>;

    // --- Messages ---

    /// Appends a message. Returns false when the protocol message ID is
    /// already logged for the device.
    async fn log_message(&self, message: &NewMessage) -> Result<bool, KurirError>;

    async fn find_message(
        &self,
        device_id: &str,
        protocol_message_id: &str,
    ) -> Result<Option<Message>, KurirError>;

    /// Messages of one chat, newest first.
    async fn list_messages(
        &self,
        device_id: &str,
        chat_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, KurirError>;

    /// Advances a message's status. Never moves it backwards. Returns the
    /// number of rows changed.
    async fn update_message_status(
        &self,
        device_id: &str,
        protocol_message_id: &str,
        status: MessageStatus,
    ) -> Result<usize, KurirError>;

    /// Marks every incoming message of a chat as read.
    async fn mark_chat_read(&self, device_id: &str, chat_id: &str) -> Result<usize, KurirError>;

    // --- Groups and contacts ---

    async fn upsert_groups(&self, device_id: &str, groups: &[GroupInfo])
    -> Result<(), KurirError>;

    async fn list_groups(&self, device_id: &str) -> Result<Vec<GroupInfo>, KurirError>;

    async fn upsert_contacts(
        &self,
        device_id: &str,
        contacts: &[ContactInfo],
    ) -> Result<(), KurirError>;

    async fn list_contacts(&self, device_id: &str) -> Result<Vec<ContactInfo>, KurirError>;
}
