// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device sessions for the Kurir gateway.
//!
//! [`SessionManager`] owns the one-session-per-device registry. Each session
//! runs an event pipeline that turns engine events into persisted state and,
//! for unpaired devices, a pairing driver. [`Supervisor`] boots and stops
//! sessions in bulk and [`DeviceService`] is the surface an API layer calls.

pub mod ingest;
pub mod metrics;
pub mod pairing;
pub mod qr;
pub mod registry;
pub mod service;
pub mod session;
pub mod settings;
pub mod shutdown;
pub mod supervisor;

pub use pairing::{PairingState, PairingStatus};
pub use registry::SessionManager;
pub use service::DeviceService;
pub use session::SessionHandle;
pub use settings::SessionSettings;
pub use shutdown::install_signal_handler;
pub use supervisor::{BootReport, ConnectOutcome, ShutdownReport, Supervisor};
