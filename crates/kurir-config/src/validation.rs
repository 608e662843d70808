// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::{KNOWN_ENGINE_KINDS, KurirConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration, collecting every problem found.
pub fn validate_config(config: &KurirConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.gateway.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "gateway.log_level `{}` must be one of {}",
            config.gateway.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation("storage.database_path must not be empty"));
    }

    if config.session.event_queue_capacity == 0 {
        errors.push(ConfigError::validation(
            "session.event_queue_capacity must be at least 1",
        ));
    }

    if config.session.connect_wait_secs == 0 {
        errors.push(ConfigError::validation(
            "session.connect_wait_secs must be at least 1",
        ));
    }

    if config.session.shutdown_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "session.shutdown_timeout_secs must be at least 1",
        ));
    }

    if !KNOWN_ENGINE_KINDS.contains(&config.engine.kind.as_str()) {
        errors.push(ConfigError::validation(format!(
            "engine.kind `{}` is not supported (known: {})",
            config.engine.kind,
            KNOWN_ENGINE_KINDS.join(", ")
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&KurirConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = KurirConfig::default();
        config.gateway.log_level = "loud".into();
        config.session.event_queue_capacity = 0;
        config.session.shutdown_timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
