// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Kurir device gateway.

use thiserror::Error;

/// The primary error type shared by every Kurir crate.
#[derive(Debug, Error)]
pub enum KurirError {
    /// No device record exists for the identifier.
    #[error("device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    /// The device exists but has no live session (stop/send against an idle device).
    #[error("no running session for device {device_id}")]
    SessionNotRunning { device_id: String },

    /// The device never completed pairing within the allotted window.
    #[error("device {device_id} is not paired, scan the pairing code first")]
    NotPaired { device_id: String },

    /// Protocol engine rejected or failed an outbound send.
    #[error("send failed: {message}")]
    SendFailed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Protocol engine could not establish a transport for the device.
    #[error("connect failed for device {device_id}: {message}")]
    ConnectFailed { device_id: String, message: String },

    /// Storage backend errors (database connection, query failure, migration).
    #[error("persistence failed: {source}")]
    PersistenceFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KurirError {
    /// Shorthand for a [`KurirError::SendFailed`] without an underlying source.
    pub fn send_failed(message: impl Into<String>) -> Self {
        Self::SendFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any storage-level error into [`KurirError::PersistenceFailed`].
    pub fn persistence(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::PersistenceFailed {
            source: source.into(),
        }
    }

    /// HTTP-equivalent status code an API layer should surface for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::DeviceNotFound { .. } | Self::SessionNotRunning { .. } => 404,
            Self::NotPaired { .. } => 409,
            Self::Config(_) => 400,
            Self::Timeout { .. } => 504,
            Self::SendFailed { .. }
            | Self::ConnectFailed { .. }
            | Self::PersistenceFailed { .. }
            | Self::Internal(_) => 500,
        }
    }

    /// True for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. } | Self::SessionNotRunning { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_kinds_map_to_404() {
        let missing = KurirError::DeviceNotFound {
            device_id: "d1".into(),
        };
        let idle = KurirError::SessionNotRunning {
            device_id: "d1".into(),
        };
        assert_eq!(missing.status_code(), 404);
        assert_eq!(idle.status_code(), 404);
        assert!(missing.is_not_found());
    }

    #[test]
    fn not_paired_has_distinct_message() {
        let err = KurirError::NotPaired {
            device_id: "d1".into(),
        };
        assert_eq!(err.status_code(), 409);
        assert!(err.to_string().contains("not paired"));
    }

    #[test]
    fn send_failure_carries_message() {
        let err = KurirError::send_failed("socket closed");
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "send failed: socket closed");
    }

    #[test]
    fn persistence_wraps_source() {
        let err = KurirError::persistence(std::io::Error::other("disk full"));
        assert!(err.to_string().contains("disk full"));
        assert!(!err.is_not_found());
    }
}
