// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log operations.

use kurir_core::KurirError;
use kurir_core::types::{MediaRef, Message, MessageStatus, NewMessage};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::{NOW, parse_column};

const MESSAGE_COLUMNS: &str = "id, device_id, chat_id, chat_type, direction, message_type, \
                               content, media_url, media_filename, sender_id, \
                               protocol_message_id, status, created_at";

/// SQL rank of the stored status, aligned with [`MessageStatus::rank`].
const STATUS_RANK: &str =
    "CASE status WHEN 'sent' THEN 0 WHEN 'delivered' THEN 1 WHEN 'read' THEN 2 ELSE -1 END";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let media_url: Option<String> = row.get(7)?;
    let media_filename: Option<String> = row.get(8)?;
    let media = media_url.map(|url| MediaRef {
        url,
        filename: media_filename.unwrap_or_default(),
    });
    Ok(Message {
        id: row.get(0)?,
        device_id: row.get(1)?,
        chat_id: row.get(2)?,
        chat_type: parse_column(row, 3)?,
        direction: parse_column(row, 4)?,
        message_type: parse_column(row, 5)?,
        content: row.get(6)?,
        media,
        sender_id: row.get(9)?,
        protocol_message_id: row.get(10)?,
        status: parse_column(row, 11)?,
        created_at: row.get(12)?,
    })
}

/// Append a message. Returns `false` if (device, protocol message ID) is
/// already present, leaving the existing row untouched.
pub async fn log_message(db: &Database, message: &NewMessage) -> Result<bool, KurirError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            let (media_url, media_filename) = match message.media {
                Some(media) => (Some(media.url), Some(media.filename)),
                None => (None, None),
            };
            let inserted = conn.execute(
                "INSERT INTO messages (device_id, chat_id, chat_type, direction, message_type,
                                       content, media_url, media_filename, sender_id,
                                       protocol_message_id, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(device_id, protocol_message_id) DO NOTHING",
                params![
                    message.device_id,
                    message.chat_id,
                    message.chat_type.to_string(),
                    message.direction.to_string(),
                    message.message_type.to_string(),
                    message.content,
                    media_url,
                    media_filename,
                    message.sender_id,
                    message.protocol_message_id,
                    message.status.to_string(),
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_message(
    db: &Database,
    device_id: &str,
    protocol_message_id: &str,
) -> Result<Option<Message>, KurirError> {
    let device_id = device_id.to_string();
    let protocol_message_id = protocol_message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE device_id = ?1 AND protocol_message_id = ?2"
                ),
                params![device_id, protocol_message_id],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Messages in one chat, newest first.
pub async fn list_messages(
    db: &Database,
    device_id: &str,
    chat_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<Message>, KurirError> {
    let device_id = device_id.to_string();
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE device_id = ?1 AND chat_id = ?2
                 ORDER BY id DESC LIMIT ?3 OFFSET ?4"
            ))?;
            let rows =
                stmt.query_map(params![device_id, chat_id, limit, offset], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Move a message's status forward. Lower or equal statuses are ignored, so
/// replaying a receipt is harmless.
pub async fn update_message_status(
    db: &Database,
    device_id: &str,
    protocol_message_id: &str,
    status: MessageStatus,
) -> Result<usize, KurirError> {
    let device_id = device_id.to_string();
    let protocol_message_id = protocol_message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "UPDATE messages SET status = ?1, updated_at = {NOW}
                     WHERE device_id = ?2 AND protocol_message_id = ?3
                       AND ({STATUS_RANK}) < ?4"
                ),
                params![status.to_string(), device_id, protocol_message_id, status.rank()],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Mark every incoming message of a chat as read.
pub async fn mark_chat_read(
    db: &Database,
    device_id: &str,
    chat_id: &str,
) -> Result<usize, KurirError> {
    let device_id = device_id.to_string();
    let chat_id = chat_id.to_string();
    let read = MessageStatus::Read;
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "UPDATE messages SET status = ?1, updated_at = {NOW}
                     WHERE device_id = ?2 AND chat_id = ?3 AND direction = 'incoming'
                       AND ({STATUS_RANK}) < ?4"
                ),
                params![read.to_string(), device_id, chat_id, read.rank()],
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use kurir_core::types::{ChatType, Device, Direction, MessageType};

    use super::*;
    use crate::queries::devices::create_device;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        create_device(
            &db,
            &Device {
                id: "d1".into(),
                display_name: "Sales".into(),
                mobile_number: "6281".into(),
                protocol_id: Some("6281@s.whatsapp.net".into()),
                pairing_code: None,
                is_connected: true,
                created_at: "2026-01-01T00:00:00.000Z".into(),
                updated_at: "2026-01-01T00:00:00.000Z".into(),
            },
        )
        .await
        .unwrap();
        (db, dir)
    }

    fn text(id: &str, direction: Direction) -> NewMessage {
        NewMessage {
            device_id: "d1".into(),
            chat_id: "628@s.whatsapp.net".into(),
            chat_type: ChatType::Individual,
            direction,
            message_type: MessageType::Text,
            content: "hi".into(),
            media: None,
            sender_id: match direction {
                Direction::Incoming => Some("628@s.whatsapp.net".into()),
                Direction::Outgoing => None,
            },
            protocol_message_id: id.into(),
            status: MessageStatus::Sent,
        }
    }

    #[tokio::test]
    async fn duplicate_protocol_id_is_ignored() {
        let (db, _dir) = setup_db().await;
        assert!(log_message(&db, &text("m1", Direction::Incoming)).await.unwrap());
        assert!(!log_message(&db, &text("m1", Direction::Incoming)).await.unwrap());

        let messages = list_messages(&db, "d1", "628@s.whatsapp.net", 10, 0).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender_id.as_deref(), Some("628@s.whatsapp.net"));
    }

    #[tokio::test]
    async fn media_reference_roundtrips() {
        let (db, _dir) = setup_db().await;
        let mut msg = text("m2", Direction::Outgoing);
        msg.message_type = MessageType::Document;
        msg.content = "invoice.pdf".into();
        msg.media = Some(MediaRef {
            url: "https://cdn/invoice".into(),
            filename: "invoice.pdf".into(),
        });
        log_message(&db, &msg).await.unwrap();

        let stored = find_message(&db, "d1", "m2").await.unwrap().unwrap();
        assert_eq!(stored.message_type, MessageType::Document);
        assert_eq!(stored.media, msg.media);
    }

    #[tokio::test]
    async fn status_only_moves_forward() {
        let (db, _dir) = setup_db().await;
        log_message(&db, &text("m1", Direction::Outgoing)).await.unwrap();

        let steps = [
            (MessageStatus::Delivered, 1),
            (MessageStatus::Delivered, 0),
            (MessageStatus::Read, 1),
            (MessageStatus::Delivered, 0),
        ];
        for (status, changed) in steps {
            let rows = update_message_status(&db, "d1", "m1", status).await.unwrap();
            assert_eq!(rows, changed, "{status}");
        }

        let stored = find_message(&db, "d1", "m1").await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn unknown_message_status_update_is_noop() {
        let (db, _dir) = setup_db().await;
        let changed = update_message_status(&db, "d1", "nope", MessageStatus::Read).await.unwrap();
        assert_eq!(changed, 0);
    }

    #[tokio::test]
    async fn mark_read_touches_incoming_only() {
        let (db, _dir) = setup_db().await;
        log_message(&db, &text("in-1", Direction::Incoming)).await.unwrap();
        log_message(&db, &text("in-2", Direction::Incoming)).await.unwrap();
        log_message(&db, &text("out-1", Direction::Outgoing)).await.unwrap();

        assert_eq!(mark_chat_read(&db, "d1", "628@s.whatsapp.net").await.unwrap(), 2);
        let out = find_message(&db, "d1", "out-1").await.unwrap().unwrap();
        assert_eq!(out.status, MessageStatus::Sent);
    }
}
