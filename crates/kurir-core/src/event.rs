// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events emitted by a protocol engine.
//!
//! The engine's lifecycle, message, and receipt notifications are modelled as
//! a closed enum so consumers dispatch with an exhaustive `match`.

use strum::Display;

/// Events delivered on the pairing channel while a scan is awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// A fresh pairing payload to show as a QR code.
    Code(String),
    /// The account was linked; carries the new protocol identifier.
    Success(String),
    /// The pairing window elapsed without a scan.
    Timeout,
}

/// Lifecycle, message, and receipt notifications from a protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EngineEvent {
    /// Transport established and authenticated.
    Connected,
    /// The account was linked; carries the new protocol identifier.
    PairSuccess { protocol_id: String },
    /// The primary device revoked this session.
    LoggedOut { reason: String },
    /// Transport dropped.
    Disconnected,
    /// A message arrived or was synced from another of the account's devices.
    Message(MessageEvent),
    Receipt(ReceiptEvent),
    /// An app-state collection finished syncing.
    AppStateSyncComplete { name: String },
    /// Another client took over this session's stream.
    StreamReplaced,
    /// Anything the gateway does not act on.
    Other(String),
}

/// A message notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub id: String,
    pub chat: String,
    pub sender: String,
    /// Authored by the account itself (sent from the phone or another linked device).
    pub is_from_me: bool,
    pub payload: MessagePayload,
}

/// The decoded body of a message notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    Conversation(String),
    ExtendedText(String),
    Image { caption: String, url: String },
    Video { caption: String, url: String },
    Document { title: String, url: String, file_name: String },
    Audio { url: String },
    /// Stickers, reactions, polls and other payloads the gateway does not log.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptEvent {
    pub chat: String,
    pub kind: ReceiptKind,
    pub message_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptKind {
    Delivered,
    Read,
    Other(String),
}
