// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain records shared across the engine and storage boundaries.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::chat;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// One tenant-owned messaging account managed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub display_name: String,
    pub mobile_number: String,
    /// Stable address assigned once paired. `None` until pairing succeeds.
    pub protocol_id: Option<String>,
    /// Transient pairing payload. Only set while a scan is awaited.
    pub pairing_code: Option<String>,
    /// Last persisted connection flag. May lag the live engine state.
    pub is_connected: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Device {
    /// Whether the device has a protocol identifier and can connect without pairing.
    pub fn is_paired(&self) -> bool {
        self.protocol_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Whether a conversation is with a single peer or a group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Individual,
    Group,
}

impl ChatType {
    /// Derive the chat type from the shape of a chat identifier.
    pub fn of(chat_id: &str) -> Self {
        if chat::is_group(chat_id) {
            Self::Group
        } else {
            Self::Individual
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    Document,
}

impl MessageType {
    /// Pick the media message type for an outbound upload from its MIME type.
    pub fn from_content_type(content_type: &str) -> Self {
        let ct = content_type.trim().to_ascii_lowercase();
        if ct.starts_with("image/") {
            Self::Image
        } else if ct.starts_with("video/") {
            Self::Video
        } else if ct.starts_with("audio/") {
            Self::Audio
        } else {
            Self::Document
        }
    }

    pub fn is_media(self) -> bool {
        self != Self::Text
    }
}

/// Delivery status of a logged message.
///
/// Ordered: a status only ever moves forward (`Sent < Delivered < Read`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    /// Numeric rank persisted next to the status so storage can compare in SQL.
    pub fn rank(self) -> i64 {
        match self {
            Self::Sent => 0,
            Self::Delivered => 1,
            Self::Read => 2,
        }
    }
}

/// Reference to media content attached to a non-text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub filename: String,
}

/// Latest activity for one chat, used to upsert a [`Thread`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadUpdate {
    pub device_id: String,
    pub chat_id: String,
    pub chat_type: ChatType,
    pub content: String,
    pub message_type: MessageType,
    pub direction: Direction,
}

/// Running summary of one conversation scoped to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub device_id: String,
    pub chat_id: String,
    pub chat_type: ChatType,
    pub last_content: String,
    pub last_message_type: MessageType,
    pub last_direction: Direction,
    pub unread_count: i64,
    pub last_message_at: String,
    pub created_at: String,
}

/// A message about to be appended to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub device_id: String,
    pub chat_id: String,
    pub chat_type: ChatType,
    pub direction: Direction,
    pub message_type: MessageType,
    pub content: String,
    pub media: Option<MediaRef>,
    /// Author of an incoming message. `None` for outgoing messages.
    pub sender_id: Option<String>,
    pub protocol_message_id: String,
    pub status: MessageStatus,
}

impl NewMessage {
    /// The thread summary this message produces.
    pub fn thread_update(&self) -> ThreadUpdate {
        let content = if self.content.is_empty() && self.message_type != MessageType::Text {
            self.message_type.to_string()
        } else {
            self.content.clone()
        };
        ThreadUpdate {
            device_id: self.device_id.clone(),
            chat_id: self.chat_id.clone(),
            chat_type: self.chat_type,
            content,
            message_type: self.message_type,
            direction: self.direction,
        }
    }
}

/// An immutable log record of one sent or received message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub device_id: String,
    pub chat_id: String,
    pub chat_type: ChatType,
    pub direction: Direction,
    pub message_type: MessageType,
    pub content: String,
    pub media: Option<MediaRef>,
    pub sender_id: Option<String>,
    pub protocol_message_id: String,
    pub status: MessageStatus,
    pub created_at: String,
}

/// A group the device has joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: String,
    pub name: String,
    pub description: Option<String>,
    pub participant_count: u32,
}

/// An address-book entry known to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub contact_id: String,
    pub push_name: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub business_name: Option<String>,
}

/// Raw media handed to the engine for upload and delivery.
#[derive(Debug, Clone)]
pub struct OutboundMedia {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// What the engine reports back after delivering media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMedia {
    pub message_id: String,
    /// Location the engine uploaded the media to, if it exposes one.
    pub url: Option<String>,
}
