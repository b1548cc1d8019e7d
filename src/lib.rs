//! Command protocol and sync state machine for MouseCap stimulation caps.
//!
//! A cap exposes a single short characteristic. Settings travel over it as
//! text frames such as `_A40,F130,P90,G0,N7`; battery telemetry comes back
//! as `_V2100`. This crate encodes and decodes those frames, tracks whether
//! local edits still need to be pushed, and drives the read and push
//! workflows against any [`Transport`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mousecap_core::{
//!     MemoryLog, MockTransport, SyncConfig, SyncOrchestrator, SyncStatus, inbound_channel,
//! };
//!
//! fn main() -> Result<(), mousecap_core::SyncError> {
//!     let (tx, rx) = inbound_channel();
//!     let link = MockTransport::new(tx).with_battery_percent(80);
//!     let config = SyncConfig::default().with_settle_delay(Duration::ZERO);
//!     let mut session = SyncOrchestrator::new(link, rx, MemoryLog::new(), config);
//!
//!     // Connect and read the device's values
//!     session.connect()?;
//!     assert_eq!(session.state().battery_percent(), Some(80));
//!
//!     // Edit locally, then push
//!     session.set_frequency(100);
//!     assert_eq!(session.status(), SyncStatus::Dirty);
//!     session.sync()?;
//!
//!     session.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Protocol revisions
//!
//! Older firmware speaks [`ProtocolRevision::Legacy`]: no cap ID or battery
//! tags, amplitude in microamps, and no explicit read requests. Amplitude
//! is always held as percent of scale locally and converted at the codec.

#![warn(missing_docs)]

mod battery;
mod codec;
mod config;
mod error;
mod mock;
mod orchestrator;
mod revision;
mod state;
mod tracker;
mod transport;

// Re-export public API
pub use battery::BatteryMapper;
pub use codec::{COMMAND_PREFIX, CommandCodec, Field, TOGGLE_LED};
pub use config::SyncConfig;
pub use error::{FormatError, SyncError, TransportError};
pub use mock::{DEFAULT_MAX_PAYLOAD, MemoryLog, MockTransport};
pub use orchestrator::SyncOrchestrator;
pub use revision::{Limits, ProtocolRevision};
pub use state::ControlState;
pub use tracker::{SyncStatus, SyncTracker};
pub use transport::{
    EventLog, Inbound, InboundReceiver, InboundSender, LogFacade, Transport, inbound_channel,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type Session = SyncOrchestrator<MockTransport, MemoryLog>;

    fn session_with(revision: ProtocolRevision, settle: Duration, device: ControlState) -> Session {
        let (tx, rx) = inbound_channel();
        let link = MockTransport::with_revision(tx, revision)
            .with_device(device)
            .with_battery_percent(50);
        let config = SyncConfig::new(revision)
            .with_settle_delay(settle)
            .with_read_timeout(Duration::from_millis(50));
        SyncOrchestrator::new(link, rx, MemoryLog::new(), config)
    }

    fn session() -> Session {
        session_with(ProtocolRevision::Current, Duration::ZERO, device_settings())
    }

    fn device_settings() -> ControlState {
        let mut device = ControlState::default();
        device.amplitude = 25;
        device.frequency_hz = 145;
        device.pulse_duration_us = 210;
        device.activate_on_disconnect = true;
        device.cap_id = 7;
        device
    }

    #[test]
    fn test_connect_reads_settings_and_battery() {
        let mut s = session();
        s.connect().unwrap();

        assert_eq!(s.transport().writes(), ["_1", "_2"]);
        assert_eq!(s.state().amplitude, 25);
        assert_eq!(s.state().frequency_hz, 145);
        assert_eq!(s.state().pulse_duration_us, 210);
        assert!(s.state().activate_on_disconnect);
        assert_eq!(s.state().cap_id_label(), "07");
        assert_eq!(s.state().battery_percent(), Some(50));
        assert!(!s.needs_sync());
        assert!(s.event_log().contains("Received: _A25,F145,P210,G1,N7"));
    }

    #[test]
    fn test_legacy_connect_uses_plain_read() {
        let mut s = session_with(ProtocolRevision::Legacy, Duration::ZERO, device_settings());
        s.connect().unwrap();

        assert!(s.transport().writes().is_empty());
        assert_eq!(s.state().amplitude, 25);
        assert_eq!(s.state().battery_percent(), None);
        // Legacy firmware has no cap ID; the local default stands.
        assert_eq!(s.state().cap_id, 0);
    }

    #[test]
    fn test_edit_then_sync_pushes_and_cleans() {
        let mut s = session();
        s.connect().unwrap();

        s.set_amplitude(60);
        s.set_cap_id(12);
        assert_eq!(s.status(), SyncStatus::Dirty);

        let command = s.sync().unwrap();
        assert_eq!(command, "_A60,F145,P210,G1,N12");
        assert_eq!(s.status(), SyncStatus::Clean);
        assert_eq!(s.transport().device().amplitude, 60);
        assert_eq!(s.transport().device().cap_id, 12);
        assert!(s.event_log().contains("Synced: _A60,F145,P210,G1,N12"));
    }

    #[test]
    fn test_unchanged_edit_does_not_mark_dirty() {
        let mut s = session();
        s.connect().unwrap();
        s.set_frequency(145);
        assert!(!s.needs_sync());
    }

    #[test]
    fn test_edits_are_clamped() {
        let mut s = session();
        s.connect().unwrap();
        s.set_amplitude(400);
        s.set_frequency(10);
        s.set_pulse_duration(5000);
        s.set_cap_id(200);
        assert_eq!(s.state().amplitude, 100);
        assert_eq!(s.state().frequency_hz, 80);
        assert_eq!(s.state().pulse_duration_us, 600);
        assert_eq!(s.state().cap_id, 99);
    }

    #[test]
    fn test_payload_too_large_keeps_dirty_and_skips_write() {
        let (tx, rx) = inbound_channel();
        let link = MockTransport::new(tx).with_max_payload(20);
        let config = SyncConfig::default().with_settle_delay(Duration::ZERO);
        let mut s = SyncOrchestrator::new(link, rx, MemoryLog::new(), config);
        s.connect().unwrap();

        s.set_amplitude(100);
        s.set_pulse_duration(600);
        s.set_activate_on_disconnect(true);
        s.set_cap_id(42);
        // "_A100,F130,P600,G1,N42" is 22 bytes.
        let writes_before = s.transport().writes().len();

        match s.sync() {
            Err(SyncError::PayloadTooLarge { len, max }) => {
                assert_eq!(len, 22);
                assert_eq!(max, 20);
            }
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
        assert_eq!(s.transport().writes().len(), writes_before);
        assert!(s.needs_sync());
        assert!(s.event_log().contains("at most 20"));
    }

    #[test]
    fn test_write_failure_keeps_dirty() {
        let mut s = session();
        s.connect().unwrap();
        s.set_amplitude(70);
        s.transport_mut().fail_writes(true);

        assert!(matches!(s.sync(), Err(SyncError::Transport(TransportError::WriteFailed(_)))));
        assert!(s.needs_sync());
        assert!(s.event_log().contains("Write failed"));

        s.transport_mut().fail_writes(false);
        s.sync().unwrap();
        assert!(!s.needs_sync());
    }

    #[test]
    fn test_read_timeout_leaves_prior_state() {
        let mut s = session();
        s.connect().unwrap();
        s.set_amplitude(90);
        s.transport_mut().go_silent(true);

        assert!(matches!(s.refresh(), Err(SyncError::ReadTimeout(_))));
        assert_eq!(s.state().amplitude, 90);
        assert!(s.needs_sync());
    }

    #[test]
    fn test_sync_requires_connection() {
        let mut s = session();
        assert!(matches!(s.sync(), Err(SyncError::NotConnected)));
        assert!(matches!(s.toggle_led(), Err(SyncError::NotConnected)));
        assert!(s.transport().writes().is_empty());
    }

    #[test]
    fn test_connect_failure_is_reported() {
        let mut s = session();
        s.transport_mut().fail_connect(true);
        assert!(matches!(s.connect(), Err(SyncError::Transport(TransportError::ConnectFailed(_)))));
        assert!(!s.is_connected());
        assert!(s.event_log().contains("Connect failed"));
    }

    #[test]
    fn test_settling_window_suppresses_edits_after_connect() {
        let mut s = session_with(ProtocolRevision::Current, Duration::from_secs(60), device_settings());
        s.connect().unwrap();

        s.set_amplitude(80);
        assert_eq!(s.state().amplitude, 80);
        assert!(!s.needs_sync());
        assert_eq!(s.status(), SyncStatus::Settling);
    }

    #[test]
    fn test_notification_is_applied_without_marking_dirty() {
        let mut s = session();
        s.connect().unwrap();

        s.transport().notify("_A33,V1400");
        assert_eq!(s.poll().unwrap(), 1);
        assert_eq!(s.state().amplitude, 33);
        assert_eq!(s.state().battery_percent(), Some(0));
        assert!(!s.needs_sync());
    }

    #[test]
    fn test_battery_notification_keeps_pending_edit() {
        let mut s = session();
        s.connect().unwrap();
        s.set_amplitude(60);
        assert!(s.needs_sync());

        s.transport().notify("_V2100");
        assert_eq!(s.poll().unwrap(), 1);
        assert_eq!(s.state().battery_percent(), Some(50));
        assert!(s.needs_sync());
        assert_eq!(s.status(), SyncStatus::Dirty);

        s.sync().unwrap();
        assert_eq!(s.transport().device().amplitude, 60);
    }

    #[test]
    fn test_same_frame_twice_is_idempotent() {
        let mut s = session();
        s.connect().unwrap();

        s.transport().notify("_A44,F90,P300,G0,N3");
        s.poll().unwrap();
        let first = s.state().clone();

        s.transport().notify("_A44,F90,P300,G0,N3");
        s.poll().unwrap();
        assert_eq!(s.state(), &first);
        assert_eq!(s.status(), SyncStatus::Clean);
    }

    #[test]
    fn test_unprefixed_frame_is_discarded_and_logged() {
        let mut s = session();
        s.connect().unwrap();
        let before = s.state().clone();

        s.transport().notify("A100,F130");
        assert_eq!(s.poll().unwrap(), 0);
        assert_eq!(s.state(), &before);
        assert!(s.event_log().contains("Malformed frame"));
    }

    #[test]
    fn test_disconnect_resets_session() {
        let mut s = session();
        s.connect().unwrap();
        s.set_amplitude(10);
        assert!(s.state().activate_on_disconnect);
        assert!(s.needs_sync());

        s.disconnect();
        assert!(!s.is_connected());
        assert!(!s.state().activate_on_disconnect);
        assert_eq!(s.state().battery_percent(), None);
        assert_eq!(s.status(), SyncStatus::Clean);
        // Non-session fields keep their last values.
        assert_eq!(s.state().amplitude, 10);
    }

    #[test]
    fn test_disconnect_twice_reports_once() {
        let mut s = session();
        s.connect().unwrap();
        s.disconnect();
        s.disconnect();

        let count = s
            .event_log()
            .messages()
            .iter()
            .filter(|m| m.as_str() == "Disconnected")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_remote_link_drop_resets_session() {
        let mut s = session();
        s.connect().unwrap();
        s.set_amplitude(10);

        s.transport_mut().drop_link();
        s.poll().unwrap();
        assert!(!s.state().activate_on_disconnect);
        assert_eq!(s.status(), SyncStatus::Clean);
        assert!(s.event_log().contains("Disconnected"));
    }

    #[test]
    fn test_link_drop_during_read() {
        let mut s = session();
        s.connect().unwrap();
        s.transport_mut().go_silent(true);
        s.transport_mut().drop_link();

        assert!(matches!(s.refresh(), Err(SyncError::NotConnected)));
        assert!(!s.state().activate_on_disconnect);
    }

    /// Link that accepts the read request, then drops before answering.
    struct DropsOnRequest {
        inbound: InboundSender,
        connected: bool,
    }

    impl Transport for DropsOnRequest {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn is_connecting(&self) -> bool {
            false
        }

        fn connect(&mut self) -> Result<(), TransportError> {
            self.connected = true;
            Ok(())
        }

        fn disconnect(&mut self) {
            self.connected = false;
        }

        fn write(&mut self, _payload: &str) -> Result<(), TransportError> {
            self.connected = false;
            self.inbound.disconnected();
            Ok(())
        }

        fn read(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        fn max_payload_length(&self) -> usize {
            DEFAULT_MAX_PAYLOAD
        }
    }

    #[test]
    fn test_disconnect_while_awaiting_frame() {
        let (tx, rx) = inbound_channel();
        let link = DropsOnRequest {
            inbound: tx,
            connected: false,
        };
        let mut s = SyncOrchestrator::new(link, rx, MemoryLog::new(), SyncConfig::default());

        assert!(matches!(s.connect(), Err(SyncError::Disconnected)));
        assert!(!s.is_connected());
        assert_eq!(s.status(), SyncStatus::Clean);
        assert_eq!(s.state(), &ControlState::default());
    }

    #[test]
    fn test_toggle_led() {
        let mut s = session();
        s.connect().unwrap();
        s.toggle_led().unwrap();
        assert!(s.transport().led_on());
        assert_eq!(s.transport().writes().last().map(String::as_str), Some(TOGGLE_LED));
        assert!(s.event_log().contains("Toggled LED"));
    }

    #[test]
    fn test_legacy_push_scales_amplitude() {
        let mut s = session_with(ProtocolRevision::Legacy, Duration::ZERO, device_settings());
        s.connect().unwrap();
        s.set_amplitude(50);
        assert_eq!(s.sync().unwrap(), "_A1500,F145,P210,G1");
        assert_eq!(s.transport().device().amplitude, 50);
    }
}
