// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use kurir_config::model::StorageConfig;
use kurir_core::types::{
    ContactInfo, Device, GroupInfo, Message, MessageStatus, NewMessage, Thread, ThreadUpdate,
};
use kurir_core::{HealthStatus, KurirError, PluginAdapter, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// call fails with [`KurirError::PersistenceFailed`] until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage. No connection is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, KurirError> {
        self.db
            .get()
            .ok_or_else(|| {
                KurirError::persistence("storage not initialized, call initialize() first")
            })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, KurirError> {
        let db = match self.db() {
            Ok(db) => db,
            Err(e) => return Ok(HealthStatus::Unhealthy(e.to_string())),
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), KurirError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), KurirError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| KurirError::persistence("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), KurirError> {
        self.db()?.close().await
    }

    // --- Devices ---

    async fn create_device(&self, device: &Device) -> Result<(), KurirError> {
        queries::devices::create_device(self.db()?, device).await
    }

    async fn get_device(&self, id: &str) -> Result<Option<Device>, KurirError> {
        queries::devices::get_device(self.db()?, id).await
    }

    async fn list_devices(&self) -> Result<Vec<Device>, KurirError> {
        queries::devices::list_devices(self.db()?).await
    }

    async fn delete_device(&self, id: &str) -> Result<bool, KurirError> {
        queries::devices::delete_device(self.db()?, id).await
    }

    async fn set_pairing_code(&self, id: &str, code: Option<&str>) -> Result<(), KurirError> {
        queries::devices::set_pairing_code(self.db()?, id, code).await
    }

    async fn set_protocol_id(
        &self,
        id: &str,
        protocol_id: Option<&str>,
    ) -> Result<(), KurirError> {
        queries::devices::set_protocol_id(self.db()?, id, protocol_id).await
    }

    async fn set_connection_status(&self, id: &str, connected: bool) -> Result<(), KurirError> {
        queries::devices::set_connection_status(self.db()?, id, connected).await
    }

    async fn reset_connection_flags(&self) -> Result<usize, KurirError> {
        queries::devices::reset_connection_flags(self.db()?).await
    }

    // --- Threads ---

    async fn upsert_thread(&self, update: &ThreadUpdate) -> Result<(), KurirError> {
        queries::threads::upsert_thread(self.db()?, update).await
    }

    async fn reset_unread(&self, device_id: &str, chat_id: &str) -> Result<(), KurirError> {
        queries::threads::reset_unread(self.db()?, device_id, chat_id).await
    }

    async fn list_threads(
        &self,
        device_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Thread>, KurirError> {
        queries::threads::list_threads(self.db()?, device_id, limit, offset).await
    }

    // --- Messages ---

    async fn log_message(&self, message: &NewMessage) -> Result<bool, KurirError> {
        queries::messages::log_message(self.db()?, message).await
    }

    async fn find_message(
        &self,
        device_id: &str,
        protocol_message_id: &str,
    ) -> Result<Option<Message>, KurirError> {
        queries::messages::find_message(self.db()?, device_id, protocol_message_id).await
    }

    async fn list_messages(
        &self,
        device_id: &str,
        chat_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, KurirError> {
        queries::messages::list_messages(self.db()?, device_id, chat_id, limit, offset).await
    }

    async fn update_message_status(
        &self,
        device_id: &str,
        protocol_message_id: &str,
        status: MessageStatus,
    ) -> Result<usize, KurirError> {
        queries::messages::update_message_status(self.db()?, device_id, protocol_message_id, status)
            .await
    }

    async fn mark_chat_read(&self, device_id: &str, chat_id: &str) -> Result<usize, KurirError> {
        queries::messages::mark_chat_read(self.db()?, device_id, chat_id).await
    }

    // --- Groups and contacts ---

    async fn upsert_groups(
        &self,
        device_id: &str,
        groups: &[GroupInfo],
    ) -> Result<(), KurirError> {
        queries::directory::upsert_groups(self.db()?, device_id, groups).await
    }

    async fn list_groups(&self, device_id: &str) -> Result<Vec<GroupInfo>, KurirError> {
        queries::directory::list_groups(self.db()?, device_id).await
    }

    async fn upsert_contacts(
        &self,
        device_id: &str,
        contacts: &[ContactInfo],
    ) -> Result<(), KurirError> {
        queries::directory::upsert_contacts(self.db()?, device_id, contacts).await
    }

    async fn list_contacts(&self, device_id: &str) -> Result<Vec<ContactInfo>, KurirError> {
        queries::directory::list_contacts(self.db()?, device_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> StorageConfig {
        StorageConfig {
            database_path: dir.path().join("kurir.db").display().to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn calls_before_initialize_fail() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(config_in(&dir));
        let err = storage.list_devices().await.unwrap_err();
        assert!(matches!(err, KurirError::PersistenceFailed { .. }));
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn initialize_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(config_in(&dir));
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        assert!(storage.initialize().await.is_err());
        storage.close().await.unwrap();
    }
}
