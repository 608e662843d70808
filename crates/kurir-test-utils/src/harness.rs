// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Throwaway storage and polling helpers for integration tests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use kurir_config::model::StorageConfig;
use kurir_core::types::Device;
use kurir_core::{KurirError, StorageAdapter};
use kurir_storage::SqliteStorage;
use tempfile::TempDir;

/// Initialized SQLite storage in a temp directory. Keep the `TempDir`
/// alive for as long as the storage is used.
pub async fn temp_storage() -> Result<(Arc<SqliteStorage>, TempDir), KurirError> {
    let dir = tempfile::tempdir().map_err(KurirError::persistence)?;
    let config = StorageConfig {
        database_path: dir.path().join("kurir.db").to_string_lossy().into_owned(),
        wal_mode: true,
    };
    let storage = SqliteStorage::new(config);
    storage.initialize().await?;
    Ok((Arc::new(storage), dir))
}

/// Insert a device record directly, bypassing any service.
pub async fn seed_device(
    storage: &dyn StorageAdapter,
    id: &str,
    display_name: &str,
    protocol_id: Option<&str>,
) -> Result<Device, KurirError> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let device = Device {
        id: id.to_string(),
        display_name: display_name.to_string(),
        mobile_number: "628000000000".to_string(),
        protocol_id: protocol_id.map(str::to_string),
        pairing_code: None,
        is_connected: false,
        created_at: now.clone(),
        updated_at: now,
    };
    storage.create_device(&device).await?;
    Ok(device)
}

/// Poll `check` every 10ms until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_device_round_trips() {
        let (storage, _dir) = temp_storage().await.unwrap();
        seed_device(storage.as_ref(), "d1", "Sales", Some("6281@s.whatsapp.net"))
            .await
            .unwrap();
        let device = storage.get_device("d1").await.unwrap().unwrap();
        assert!(device.is_paired());
        assert_eq!(device.display_name, "Sales");
    }

    #[tokio::test]
    async fn wait_until_gives_up() {
        assert!(!wait_until(Duration::from_millis(30), || async { false }).await);
        assert!(wait_until(Duration::from_millis(30), || async { true }).await);
    }
}
