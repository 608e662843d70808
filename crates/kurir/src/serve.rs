// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kurir serve` command implementation.
//!
//! Opens storage, reconnects every known device, and runs until SIGINT or
//! SIGTERM, then stops all sessions within the configured window.

use std::sync::Arc;

use kurir_config::KurirConfig;
use kurir_core::{HealthStatus, KurirError, PluginAdapter, StorageAdapter};
use kurir_session::{DeviceService, SessionManager, SessionSettings, Supervisor, shutdown};
use kurir_storage::SqliteStorage;
use tracing::{info, warn};

use crate::loopback::engine_factory;

/// Storage plus the session stack on top of it, none of it started.
pub struct Stack {
    pub storage: Arc<SqliteStorage>,
    pub supervisor: Supervisor,
    pub service: DeviceService,
}

/// Open storage and wire up the session stack from configuration.
pub async fn build_stack(config: &KurirConfig) -> Result<Stack, KurirError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage = Arc::new(storage);

    let factory = engine_factory(&config.engine)?;
    let settings = SessionSettings::from(&config.session);
    let manager = SessionManager::new(storage.clone(), factory, settings);
    let supervisor = Supervisor::new(manager, storage.clone());
    let service = DeviceService::new(storage.clone(), supervisor.clone());
    Ok(Stack {
        storage,
        supervisor,
        service,
    })
}

/// Runs the `kurir serve` command.
pub async fn run_serve(config: KurirConfig) -> Result<(), KurirError> {
    info!(name = %config.gateway.name, engine = %config.engine.kind, "starting kurir serve");

    let stack = build_stack(&config).await?;
    match stack.storage.health_check().await? {
        HealthStatus::Healthy => {}
        HealthStatus::Degraded(reason) => warn!(reason = %reason, "storage degraded"),
        HealthStatus::Unhealthy(reason) => {
            return Err(KurirError::persistence(format!("storage unhealthy: {reason}")));
        }
    }

    let reset = stack.storage.reset_connection_flags().await?;
    if reset > 0 {
        info!(count = reset, "cleared stale connection flags");
    }
    kurir_session::metrics::register_metrics();

    let cancel = shutdown::install_signal_handler();
    let report = stack.supervisor.run(cancel).await?;
    if report.abandoned > 0 {
        warn!(abandoned = report.abandoned, "some sessions did not stop in time");
    }

    stack.storage.close().await?;
    info!("kurir serve stopped");
    Ok(())
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kurir={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kurir_config::model::StorageConfig;
    use kurir_session::ConnectOutcome;
    use tempfile::TempDir;

    use super::*;

    fn config(dir: &TempDir) -> KurirConfig {
        let mut config = KurirConfig::default();
        config.storage = StorageConfig {
            database_path: dir.path().join("kurir.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        config.engine.pairing_delay_ms = 50;
        config.session.connect_wait_secs = 2;
        config
    }

    #[tokio::test]
    async fn loopback_stack_pairs_and_sends() {
        let dir = tempfile::tempdir().unwrap();
        let stack = build_stack(&config(&dir)).await.unwrap();
        let device = stack
            .service
            .register_device("Sales", "6281")
            .await
            .unwrap();

        let outcome = stack.service.start_device(&device.id).await.unwrap();
        assert!(matches!(outcome, ConnectOutcome::AwaitingScan { .. }));

        let mut paired = false;
        for _ in 0..100 {
            let stored = stack.service.get_device(&device.id).await.unwrap();
            if stored.protocol_id.as_deref() == Some("6281@s.whatsapp.net")
                && stack.service.is_connected(&device.id)
            {
                paired = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(paired, "loopback pairing did not complete");

        let id = stack
            .service
            .send_text(&device.id, "628@s.whatsapp.net", "hello")
            .await
            .unwrap();
        assert!(id.starts_with("LB"));

        let report = stack.supervisor.shutdown().await;
        assert_eq!(report.stopped, 1);
        stack.storage.close().await.unwrap();
    }
}
