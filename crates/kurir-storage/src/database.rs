// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management.
//!
//! All statements run on tokio-rusqlite's single background thread, so the
//! [`Database`] handle is the only writer. Do not open extra connections for
//! writes.

use kurir_core::KurirError;
use tracing::debug;

use crate::migrations;

/// Handle to the gateway's SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path`, apply pragmas and
    /// run migrations.
    pub async fn open(path: &str) -> Result<Self, KurirError> {
        Self::open_with(path, true).await
    }

    /// Like [`Database::open`], choosing the journal mode explicitly.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, KurirError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(KurirError::persistence)?;
        }

        // Migrations need `&mut Connection`, so they run on a short-lived
        // blocking connection before the shared one is opened.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), KurirError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(KurirError::persistence)?;
            let journal = if wal_mode { "WAL" } else { "DELETE" };
            conn.pragma_update_and_check(None, "journal_mode", journal, |row| {
                row.get::<_, String>(0)
            })
            .map_err(KurirError::persistence)?;
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| KurirError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(KurirError::persistence)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The shared single-writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the main file is self-contained.
    pub async fn close(&self) -> Result<(), KurirError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

/// Map a tokio-rusqlite error into [`KurirError::PersistenceFailed`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> KurirError {
    KurirError::persistence(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/kurir.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();

        for expected in ["chat_groups", "contacts", "devices", "messages", "threads"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kurir.db");
        let path = path.to_str().unwrap();
        Database::open(path).await.unwrap().close().await.unwrap();
        let again = Database::open_with(path, false).await;
        assert!(again.is_ok());
    }
}
