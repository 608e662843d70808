// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pairing state machine.
//!
//! ```text
//! Unpaired --scan--> AwaitingScan --success--> Paired
//!                    AwaitingScan --timeout--> Unpaired
//! any ------------------logout--------------> LoggedOut
//! ```
//!
//! The stored pairing code is only ever non-empty in `AwaitingScan`.

use kurir_core::PairingEvent;
use strum::Display;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PairingState {
    Unpaired,
    AwaitingScan,
    Paired,
    LoggedOut,
}

/// Observable pairing progress of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingStatus {
    pub state: PairingState,
    /// Latest code while awaiting a scan.
    pub code: Option<String>,
}

/// Side effect the driver must apply after a pairing transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PairingEffect {
    /// Persist a freshly issued code.
    StoreCode(String),
    /// Clear the code, persist the identifier, mark connected.
    Complete { protocol_id: String },
    /// Clear the code and tear the session down.
    Expire,
    /// Event arrived outside `AwaitingScan`; nothing to do.
    #[default]
    Ignore,
}

impl PairingStatus {
    /// Initial status for a device with or without a protocol identifier.
    pub fn initial(paired: bool) -> Self {
        Self {
            state: if paired {
                PairingState::Paired
            } else {
                PairingState::Unpaired
            },
            code: None,
        }
    }

    /// Session started without an identifier: wait for a scan.
    pub fn begin_scan(&mut self) {
        if self.state == PairingState::Unpaired {
            self.state = PairingState::AwaitingScan;
        }
    }

    /// Apply one event from the pairing channel.
    pub fn apply(&mut self, event: &PairingEvent) -> PairingEffect {
        if self.state != PairingState::AwaitingScan {
            return PairingEffect::Ignore;
        }
        match event {
            PairingEvent::Code(code) => {
                self.code = Some(code.clone());
                PairingEffect::StoreCode(code.clone())
            }
            PairingEvent::Success(protocol_id) => {
                self.state = PairingState::Paired;
                self.code = None;
                PairingEffect::Complete {
                    protocol_id: protocol_id.clone(),
                }
            }
            PairingEvent::Timeout => {
                self.state = PairingState::Unpaired;
                self.code = None;
                PairingEffect::Expire
            }
        }
    }

    /// The engine confirmed a link outside the pairing channel.
    pub fn mark_paired(&mut self) {
        if self.state != PairingState::LoggedOut {
            self.state = PairingState::Paired;
            self.code = None;
        }
    }

    pub fn log_out(&mut self) {
        self.state = PairingState::LoggedOut;
        self.code = None;
    }

    /// Session torn down while a scan was pending.
    pub fn abandon(&mut self) {
        if self.state == PairingState::AwaitingScan {
            self.state = PairingState::Unpaired;
        }
        self.code = None;
    }
}

/// Shared, observable pairing status for one session.
///
/// Both the pairing driver and the event pipeline transition it; observers
/// (on-demand start) subscribe to changes.
#[derive(Debug)]
pub struct PairingTracker {
    tx: watch::Sender<PairingStatus>,
}

impl PairingTracker {
    pub fn new(initial: PairingStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> PairingStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PairingStatus> {
        self.tx.subscribe()
    }

    /// Run a transition atomically and notify observers.
    pub fn update<R: Default>(&self, f: impl FnOnce(&mut PairingStatus) -> R) -> R {
        let mut out = None;
        self.tx.send_modify(|status| out = Some(f(status)));
        out.unwrap_or_default()
    }

    pub fn apply(&self, event: &PairingEvent) -> PairingEffect {
        self.update(|status| status.apply(event))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn awaiting() -> PairingStatus {
        let mut status = PairingStatus::initial(false);
        status.begin_scan();
        status
    }

    #[test]
    fn code_then_success() {
        let mut status = awaiting();
        assert_eq!(
            status.apply(&PairingEvent::Code("ABC123".into())),
            PairingEffect::StoreCode("ABC123".into())
        );
        assert_eq!(status.code.as_deref(), Some("ABC123"));
        assert_eq!(status.state, PairingState::AwaitingScan);

        let effect = status.apply(&PairingEvent::Success("6281@s.whatsapp.net".into()));
        assert_eq!(
            effect,
            PairingEffect::Complete {
                protocol_id: "6281@s.whatsapp.net".into()
            }
        );
        assert_eq!(status.state, PairingState::Paired);
        assert_eq!(status.code, None);
    }

    #[test]
    fn timeout_returns_to_unpaired() {
        let mut status = awaiting();
        status.apply(&PairingEvent::Code("A".into()));
        assert_eq!(status.apply(&PairingEvent::Timeout), PairingEffect::Expire);
        assert_eq!(status.state, PairingState::Unpaired);
        assert_eq!(status.code, None);
    }

    #[test]
    fn events_after_pairing_are_ignored() {
        let mut status = PairingStatus::initial(true);
        assert_eq!(
            status.apply(&PairingEvent::Code("late".into())),
            PairingEffect::Ignore
        );
        assert_eq!(status.code, None);
        status.begin_scan();
        assert_eq!(status.state, PairingState::Paired);
    }

    #[test]
    fn logout_is_sticky() {
        let mut status = awaiting();
        status.apply(&PairingEvent::Code("A".into()));
        status.log_out();
        status.mark_paired();
        assert_eq!(status.state, PairingState::LoggedOut);
        assert_eq!(status.code, None);
    }

    #[tokio::test]
    async fn tracker_notifies_subscribers() {
        let tracker = PairingTracker::new(awaiting());
        let mut rx = tracker.subscribe();
        tracker.apply(&PairingEvent::Code("XYZ".into()));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().code.as_deref(), Some("XYZ"));
        assert_eq!(tracker.current().state, PairingState::AwaitingScan);
    }

    fn any_event() -> impl Strategy<Value = PairingEvent> {
        prop_oneof![
            "[A-Z0-9]{1,8}".prop_map(PairingEvent::Code),
            "[0-9]{4,12}".prop_map(|n| PairingEvent::Success(format!("{n}@s.whatsapp.net"))),
            Just(PairingEvent::Timeout),
        ]
    }

    proptest! {
        #[test]
        fn code_only_held_while_awaiting_scan(
            events in proptest::collection::vec(any_event(), 0..20)
        ) {
            let mut status = awaiting();
            for event in &events {
                status.apply(event);
                if status.state != PairingState::AwaitingScan {
                    prop_assert!(status.code.is_none());
                }
                if matches!(event, PairingEvent::Success(_) | PairingEvent::Timeout) {
                    prop_assert!(status.code.is_none());
                }
            }
        }
    }
}
