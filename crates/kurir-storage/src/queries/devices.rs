// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device CRUD operations.

use kurir_core::KurirError;
use kurir_core::types::Device;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::NOW;

const DEVICE_COLUMNS: &str = "id, display_name, mobile_number, protocol_id, pairing_code, \
                              is_connected, created_at, updated_at";

fn device_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get(0)?,
        display_name: row.get(1)?,
        mobile_number: row.get(2)?,
        protocol_id: row.get(3)?,
        pairing_code: row.get(4)?,
        is_connected: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Insert a new device.
pub async fn create_device(db: &Database, device: &Device) -> Result<(), KurirError> {
    let device = device.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO devices (id, display_name, mobile_number, protocol_id, pairing_code,
                                      is_connected, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    device.id,
                    device.display_name,
                    device.mobile_number,
                    device.protocol_id,
                    device.pairing_code,
                    device.is_connected,
                    device.created_at,
                    device.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_device(db: &Database, id: &str) -> Result<Option<Device>, KurirError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1"),
                params![id],
                device_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All devices, oldest registration first.
pub async fn list_devices(db: &Database) -> Result<Vec<Device>, KurirError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM devices ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map([], device_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_device(db: &Database, id: &str) -> Result<bool, KurirError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute("DELETE FROM devices WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_pairing_code(
    db: &Database,
    id: &str,
    code: Option<&str>,
) -> Result<(), KurirError> {
    let id = id.to_string();
    let code = code.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!("UPDATE devices SET pairing_code = ?1, updated_at = {NOW} WHERE id = ?2"),
                params![code, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_protocol_id(
    db: &Database,
    id: &str,
    protocol_id: Option<&str>,
) -> Result<(), KurirError> {
    let id = id.to_string();
    let protocol_id = protocol_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!("UPDATE devices SET protocol_id = ?1, updated_at = {NOW} WHERE id = ?2"),
                params![protocol_id, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_connection_status(
    db: &Database,
    id: &str,
    connected: bool,
) -> Result<(), KurirError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!("UPDATE devices SET is_connected = ?1, updated_at = {NOW} WHERE id = ?2"),
                params![connected, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Clear every connection flag left over from a previous process.
pub async fn reset_connection_flags(db: &Database) -> Result<usize, KurirError> {
    db.connection()
        .call(|conn| {
            conn.execute(
                &format!(
                    "UPDATE devices SET is_connected = 0, updated_at = {NOW} WHERE is_connected = 1"
                ),
                [],
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_device(id: &str) -> Device {
        Device {
            id: id.to_string(),
            display_name: "Sales".to_string(),
            mobile_number: "6281".to_string(),
            protocol_id: None,
            pairing_code: None,
            is_connected: false,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get_roundtrips() {
        let (db, _dir) = setup_db().await;
        create_device(&db, &make_device("d1")).await.unwrap();

        let device = get_device(&db, "d1").await.unwrap().unwrap();
        assert_eq!(device.display_name, "Sales");
        assert_eq!(device.protocol_id, None);
        assert!(!device.is_connected);
        assert!(get_device(&db, "missing").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn pairing_fields_set_and_clear() {
        let (db, _dir) = setup_db().await;
        create_device(&db, &make_device("d1")).await.unwrap();

        set_pairing_code(&db, "d1", Some("ABC123")).await.unwrap();
        assert_eq!(
            get_device(&db, "d1").await.unwrap().unwrap().pairing_code.as_deref(),
            Some("ABC123")
        );

        set_pairing_code(&db, "d1", None).await.unwrap();
        set_protocol_id(&db, "d1", Some("6281@s.whatsapp.net")).await.unwrap();
        set_connection_status(&db, "d1", true).await.unwrap();

        let device = get_device(&db, "d1").await.unwrap().unwrap();
        assert_eq!(device.pairing_code, None);
        assert_eq!(device.protocol_id.as_deref(), Some("6281@s.whatsapp.net"));
        assert!(device.is_connected);
    }

    #[tokio::test]
    async fn reset_flags_counts_connected_devices() {
        let (db, _dir) = setup_db().await;
        for id in ["a", "b", "c"] {
            create_device(&db, &make_device(id)).await.unwrap();
        }
        set_connection_status(&db, "a", true).await.unwrap();
        set_connection_status(&db, "c", true).await.unwrap();

        assert_eq!(reset_connection_flags(&db).await.unwrap(), 2);
        assert!(list_devices(&db).await.unwrap().iter().all(|d| !d.is_connected));
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let (db, _dir) = setup_db().await;
        create_device(&db, &make_device("d1")).await.unwrap();
        assert!(delete_device(&db, "d1").await.unwrap());
        assert!(!delete_device(&db, "d1").await.unwrap());
        assert!(list_devices(&db).await.unwrap().is_empty());
    }
}
