// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Joined groups and contacts synced from the engine.

use kurir_core::KurirError;
use kurir_core::types::{ContactInfo, GroupInfo};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::NOW;

/// Upsert a batch of groups in one transaction.
pub async fn upsert_groups(
    db: &Database,
    device_id: &str,
    groups: &[GroupInfo],
) -> Result<(), KurirError> {
    let device_id = device_id.to_string();
    let groups = groups.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO chat_groups (device_id, group_id, name, description,
                                              participant_count, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, {NOW})
                     ON CONFLICT(device_id, group_id) DO UPDATE SET
                         name = excluded.name,
                         description = excluded.description,
                         participant_count = excluded.participant_count,
                         updated_at = excluded.updated_at"
                ))?;
                for group in &groups {
                    stmt.execute(params![
                        device_id,
                        group.group_id,
                        group.name,
                        group.description,
                        group.participant_count,
                    ])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_groups(db: &Database, device_id: &str) -> Result<Vec<GroupInfo>, KurirError> {
    let device_id = device_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT group_id, name, description, participant_count
                 FROM chat_groups WHERE device_id = ?1 ORDER BY name ASC",
            )?;
            let rows = stmt.query_map(params![device_id], |row| {
                Ok(GroupInfo {
                    group_id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    participant_count: row.get(3)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert a batch of contacts in one transaction.
pub async fn upsert_contacts(
    db: &Database,
    device_id: &str,
    contacts: &[ContactInfo],
) -> Result<(), KurirError> {
    let device_id = device_id.to_string();
    let contacts = contacts.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO contacts (device_id, contact_id, push_name, full_name,
                                           first_name, business_name, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, {NOW})
                     ON CONFLICT(device_id, contact_id) DO UPDATE SET
                         push_name = excluded.push_name,
                         full_name = excluded.full_name,
                         first_name = excluded.first_name,
                         business_name = excluded.business_name,
                         updated_at = excluded.updated_at"
                ))?;
                for contact in &contacts {
                    stmt.execute(params![
                        device_id,
                        contact.contact_id,
                        contact.push_name,
                        contact.full_name,
                        contact.first_name,
                        contact.business_name,
                    ])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_contacts(db: &Database, device_id: &str) -> Result<Vec<ContactInfo>, KurirError> {
    let device_id = device_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT contact_id, push_name, full_name, first_name, business_name
                 FROM contacts WHERE device_id = ?1 ORDER BY contact_id ASC",
            )?;
            let rows = stmt.query_map(params![device_id], |row| {
                Ok(ContactInfo {
                    contact_id: row.get(0)?,
                    push_name: row.get(1)?,
                    full_name: row.get(2)?,
                    first_name: row.get(3)?,
                    business_name: row.get(4)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
