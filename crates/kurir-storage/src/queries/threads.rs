// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread summaries, one row per (device, chat).

use kurir_core::KurirError;
use kurir_core::types::{Direction, Thread, ThreadUpdate};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::{NOW, parse_column};

/// Insert or overwrite the thread summary for (device, chat).
///
/// The last-message columns always take the new values. The unread counter
/// only grows for incoming updates.
pub async fn upsert_thread(db: &Database, update: &ThreadUpdate) -> Result<(), KurirError> {
    let update = update.clone();
    let unread_delta: i64 = match update.direction {
        Direction::Incoming => 1,
        Direction::Outgoing => 0,
    };
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO threads (device_id, chat_id, chat_type, last_content,
                                          last_message_type, last_direction, unread_count,
                                          last_message_at, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, {NOW}, {NOW})
                     ON CONFLICT(device_id, chat_id) DO UPDATE SET
                         chat_type = excluded.chat_type,
                         last_content = excluded.last_content,
                         last_message_type = excluded.last_message_type,
                         last_direction = excluded.last_direction,
                         unread_count = threads.unread_count + excluded.unread_count,
                         last_message_at = excluded.last_message_at"
                ),
                params![
                    update.device_id,
                    update.chat_id,
                    update.chat_type.to_string(),
                    update.content,
                    update.message_type.to_string(),
                    update.direction.to_string(),
                    unread_delta,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn reset_unread(db: &Database, device_id: &str, chat_id: &str) -> Result<(), KurirError> {
    let device_id = device_id.to_string();
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE threads SET unread_count = 0 WHERE device_id = ?1 AND chat_id = ?2",
                params![device_id, chat_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Threads of one device, most recent activity first.
pub async fn list_threads(
    db: &Database,
    device_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<Thread>, KurirError> {
    let device_id = device_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT device_id, chat_id, chat_type, last_content, last_message_type,
                        last_direction, unread_count, last_message_at, created_at
                 FROM threads WHERE device_id = ?1
                 ORDER BY last_message_at DESC, chat_id ASC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(params![device_id, limit, offset], |row| {
                Ok(Thread {
                    device_id: row.get(0)?,
                    chat_id: row.get(1)?,
                    chat_type: parse_column(row, 2)?,
                    last_content: row.get(3)?,
                    last_message_type: parse_column(row, 4)?,
                    last_direction: parse_column(row, 5)?,
                    unread_count: row.get(6)?,
                    last_message_at: row.get(7)?,
                    created_at: row.get(8)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use kurir_core::types::{ChatType, Device, MessageType};

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
                protocol_id: None,
                pairing_code: None,
                is_connected: false,
                created_at: "2026-01-01T00:00:00.000Z".into(),
                updated_at: "2026-01-01T00:00:00.000Z".into(),
            },
        )
        .await
        .unwrap();
        (db, dir)
    }

    fn update(content: &str, message_type: MessageType, direction: Direction) -> ThreadUpdate {
        ThreadUpdate {
            device_id: "d1".into(),
            chat_id: "628@s.whatsapp.net".into(),
            chat_type: ChatType::Individual,
            content: content.into(),
            message_type,
            direction,
        }
    }

    #[tokio::test]
    async fn latest_message_wins() {
        let (db, _dir) = setup_db().await;
        upsert_thread(&db, &update("hi", MessageType::Text, Direction::Incoming))
            .await
            .unwrap();
        upsert_thread(&db, &update("photo", MessageType::Image, Direction::Outgoing))
            .await
            .unwrap();

        let threads = list_threads(&db, "d1", 10, 0).await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].last_content, "photo");
        assert_eq!(threads[0].last_message_type, MessageType::Image);
        assert_eq!(threads[0].last_direction, Direction::Outgoing);
        assert_eq!(threads[0].unread_count, 1);
    }

    #[tokio::test]
    async fn unread_counts_incoming_only_and_resets() {
        let (db, _dir) = setup_db().await;
        for _ in 0..3 {
            upsert_thread(&db, &update("hi", MessageType::Text, Direction::Incoming))
                .await
                .unwrap();
        }
        upsert_thread(&db, &update("ok", MessageType::Text, Direction::Outgoing))
            .await
            .unwrap();
        assert_eq!(list_threads(&db, "d1", 10, 0).await.unwrap()[0].unread_count, 3);

        reset_unread(&db, "d1", "628@s.whatsapp.net").await.unwrap();
        assert_eq!(list_threads(&db, "d1", 10, 0).await.unwrap()[0].unread_count, 0);
    }

    #[tokio::test]
    async fn listing_is_paginated() {
        let (db, _dir) = setup_db().await;
        for chat in ["a@s.whatsapp.net", "b@s.whatsapp.net", "c@g.us"] {
            let mut u = update("x", MessageType::Text, Direction::Incoming);
            u.chat_id = chat.into();
            upsert_thread(&db, &u).await.unwrap();
        }
        assert_eq!(list_threads(&db, "d1", 2, 0).await.unwrap().len(), 2);
        assert_eq!(list_threads(&db, "d1", 2, 2).await.unwrap().len(), 1);
        assert!(list_threads(&db, "other", 10, 0).await.unwrap().is_empty());
    }
}
