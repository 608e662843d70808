// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol engine abstraction.
//!
//! The wire protocol lives outside this workspace. A session only needs the
//! capabilities below: transport control, a pairing channel, outbound sends,
//! and an event subscription.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::KurirError;
use crate::event::{EngineEvent, PairingEvent};
use crate::types::{ContactInfo, Device, GroupInfo, OutboundMedia, SentMedia};

/// Receiving end the engine pushes its events into.
///
/// Unbounded so that event delivery never blocks inside the engine.
pub type EventSink = mpsc::UnboundedSender<EngineEvent>;

/// One live protocol client bound to a single device.
#[async_trait]
pub trait ProtocolEngine: Send + Sync + 'static {
    /// Opens the transport. For unpaired devices the pairing channel must be
    /// obtained first.
    async fn connect(&self) -> Result<(), KurirError>;

    /// Closes the transport. Never fails; errors are the engine's to log.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    fn is_logged_in(&self) -> bool;

    /// Display name the account advertises, once known.
    fn push_name(&self) -> Option<String>;

    /// Stream of pairing codes followed by a terminal success or timeout.
    async fn pairing_channel(&self) -> Result<mpsc::Receiver<PairingEvent>, KurirError>;

    /// Registers the sink that receives every lifecycle, message and receipt event.
    fn subscribe(&self, sink: EventSink);

    /// Sends a text message and returns its protocol message ID.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<String, KurirError>;

    /// Uploads and sends media.
    async fn send_media(&self, chat_id: &str, media: OutboundMedia)
    -> Result<SentMedia, KurirError>;

    /// Advertises the account as available.
    async fn send_presence_available(&self) -> Result<(), KurirError>;

    async fn joined_groups(&self) -> Result<Vec<GroupInfo>, KurirError>;

    async fn contacts(&self) -> Result<Vec<ContactInfo>, KurirError>;
}

/// Builds a fresh engine instance for a device on every session start.
#[async_trait]
pub trait EngineFactory: Send + Sync + 'static {
    async fn create(&self, device: &Device) -> Result<Arc<dyn ProtocolEngine>, KurirError>;
}
