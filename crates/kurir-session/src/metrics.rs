// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric recording helpers.
//!
//! Uses the metrics-rs facade; nothing is exported unless the binary
//! installs a recorder.

use metrics::{describe_counter, describe_gauge};

/// Register metric descriptions. Call once after a recorder is installed.
pub fn register_metrics() {
    describe_counter!("kurir_events_total", "Engine events classified, by kind");
    describe_counter!(
        "kurir_events_dropped_total",
        "Persistence effects dropped, by reason"
    );
    describe_counter!("kurir_messages_total", "Messages logged, by direction");
    describe_gauge!("kurir_active_sessions", "Sessions currently registered");
}

pub fn record_event(kind: &str) {
    metrics::counter!("kurir_events_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_drop(reason: &'static str) {
    metrics::counter!("kurir_events_dropped_total", "reason" => reason).increment(1);
}

pub fn record_message(direction: &str) {
    metrics::counter!("kurir_messages_total", "direction" => direction.to_string()).increment(1);
}

pub fn set_active_sessions(count: usize) {
    metrics::gauge!("kurir_active_sessions").set(count as f64);
}
