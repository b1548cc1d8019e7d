//! Read and push workflows for one connected cap.

use std::time::Instant;

use log::{debug, info, warn};

use crate::codec::{CommandCodec, Field, TOGGLE_LED};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::state::{ControlState, within};
use crate::tracker::{SyncStatus, SyncTracker};
use crate::transport::{EventLog, Inbound, InboundReceiver, Recv, Transport};

/// Drives a single session with one cap.
///
/// Owns the session's [`ControlState`] and [`SyncTracker`] exclusively.
/// Every operation that touches the link takes `&mut self` and completes
/// before returning, so at most one command is ever outstanding.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use mousecap_core::{
///     MemoryLog, MockTransport, SyncConfig, SyncOrchestrator, inbound_channel,
/// };
///
/// let (tx, rx) = inbound_channel();
/// let config = SyncConfig::default().with_settle_delay(Duration::ZERO);
/// let mut session = SyncOrchestrator::new(MockTransport::new(tx), rx, MemoryLog::new(), config);
///
/// session.connect()?;
/// session.set_amplitude(35);
/// assert!(session.needs_sync());
///
/// session.sync()?;
/// assert!(!session.needs_sync());
/// assert_eq!(session.transport().device().amplitude, 35);
/// # Ok::<(), mousecap_core::SyncError>(())
/// ```
pub struct SyncOrchestrator<T: Transport, L: EventLog> {
    transport: T,
    inbound: InboundReceiver,
    log: L,
    codec: CommandCodec,
    config: SyncConfig,
    state: ControlState,
    tracker: SyncTracker,
}

impl<T: Transport, L: EventLog> SyncOrchestrator<T, L> {
    /// Create an idle session. `inbound` must be the receiver paired with
    /// the sender given to `transport`.
    pub fn new(transport: T, inbound: InboundReceiver, log: L, config: SyncConfig) -> Self {
        Self {
            transport,
            inbound,
            log,
            codec: config.codec(),
            tracker: SyncTracker::new(config.settle_delay),
            state: ControlState::default(),
            config,
        }
    }

    /// Current local settings.
    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Session configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The underlying link.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying link.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The operator event log.
    pub fn event_log(&self) -> &L {
        &self.log
    }

    /// Whether the link is up.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Current sync status.
    pub fn status(&mut self) -> SyncStatus {
        self.tracker.status(Instant::now())
    }

    /// Whether local edits are waiting to be pushed.
    pub fn needs_sync(&self) -> bool {
        self.tracker.is_dirty()
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Connect and pull the device's current values.
    ///
    /// Does nothing if a link is already up or being established. If the
    /// initial read fails the link stays up and the error is returned.
    pub fn connect(&mut self) -> Result<(), SyncError> {
        if self.transport.is_connected() || self.transport.is_connecting() {
            debug!("connect ignored: link already active");
            return Ok(());
        }
        if let Err(e) = self.transport.connect() {
            return Err(self.fail(e.into()));
        }
        self.tracker.on_connected(Instant::now());
        self.report("Connected");
        self.refresh()
    }

    /// Drop the link and reset session state.
    ///
    /// Does nothing beyond asking the transport to close if no link was
    /// up or being established.
    pub fn disconnect(&mut self) {
        let was_active = self.transport.is_connected() || self.transport.is_connecting();
        self.transport.disconnect();
        if was_active {
            self.end_session();
        } else {
            debug!("disconnect ignored: link already down");
        }
    }

    fn end_session(&mut self) {
        // Frames still queued belong to the old session.
        while let Recv::Message(msg) = self.inbound.try_next() {
            debug!("discarding {:?} after disconnect", msg);
        }
        self.state.reset_session();
        self.tracker.reset();
        self.report("Disconnected");
    }

    // =========================================================================
    // Read path
    // =========================================================================

    /// Request the device's configuration and telemetry and apply them.
    ///
    /// Each expected frame is awaited for at most the configured read
    /// timeout. Frames already applied stay applied if a later one fails.
    pub fn refresh(&mut self) -> Result<(), SyncError> {
        self.poll()?;
        self.ensure_connected()?;

        let requests = self.config.revision.read_requests();
        if requests.is_empty() {
            if let Err(e) = self.transport.read() {
                return Err(self.fail(e.into()));
            }
            self.await_frame()?;
        } else {
            for request in requests {
                if let Err(e) = self.transport.write(request) {
                    return Err(self.fail(e.into()));
                }
                self.await_frame()?;
            }
        }
        info!("refreshed from device: {:?}", self.state);
        Ok(())
    }

    /// Apply every notification already queued, without blocking.
    ///
    /// Returns how many frames were applied. Malformed frames are reported
    /// to the event log and skipped.
    pub fn poll(&mut self) -> Result<usize, SyncError> {
        let mut applied = 0;
        loop {
            match self.inbound.try_next() {
                Recv::Message(Inbound::Frame(frame)) => {
                    if self.ingest(&frame).is_ok() {
                        applied += 1;
                    }
                }
                Recv::Message(Inbound::Disconnected) => self.end_session(),
                Recv::Empty => return Ok(applied),
                Recv::Closed => return Err(self.fail(SyncError::ChannelClosed)),
            }
        }
    }

    fn await_frame(&mut self) -> Result<(), SyncError> {
        let timeout = self.config.read_timeout;
        match self.inbound.next_within(timeout) {
            Recv::Message(Inbound::Frame(frame)) => self.ingest(&frame),
            Recv::Message(Inbound::Disconnected) => {
                self.end_session();
                Err(self.fail(SyncError::Disconnected))
            }
            Recv::Empty => Err(self.fail(SyncError::ReadTimeout(timeout))),
            Recv::Closed => Err(self.fail(SyncError::ChannelClosed)),
        }
    }

    fn ingest(&mut self, frame: &str) -> Result<(), SyncError> {
        self.report(&format!("Received: {}", frame.trim_end_matches(['\0', '\r', '\n'])));
        let fields = match self.codec.decode(frame) {
            Ok(fields) => fields,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.tracker.begin_ingest();
        let changed = self.state.apply(&fields, &self.config.battery);
        let carried_settings = fields.iter().any(Field::is_setting);
        self.tracker.finish_ingest(Instant::now(), carried_settings);

        debug!("applied {} field(s), changed={}", fields.len(), changed);
        Ok(())
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Set amplitude (percent of scale), clamped to the configured range.
    pub fn set_amplitude(&mut self, percent: u16) {
        let value = within(percent, &self.config.limits.amplitude);
        self.edit(|s| &mut s.amplitude, value);
    }

    /// Set frequency in hertz, clamped to the configured range.
    pub fn set_frequency(&mut self, hz: u16) {
        let value = within(hz, &self.config.limits.frequency_hz);
        self.edit(|s| &mut s.frequency_hz, value);
    }

    /// Set pulse duration in microseconds, clamped to the configured range.
    pub fn set_pulse_duration(&mut self, us: u16) {
        let value = within(us, &self.config.limits.pulse_duration_us);
        self.edit(|s| &mut s.pulse_duration_us, value);
    }

    /// Set whether stimulation continues after the link drops.
    pub fn set_activate_on_disconnect(&mut self, active: bool) {
        self.edit(|s| &mut s.activate_on_disconnect, active);
    }

    /// Set the cap identifier, clamped to 0-99.
    pub fn set_cap_id(&mut self, id: u8) {
        let value = within(id, &self.config.limits.cap_id);
        self.edit(|s| &mut s.cap_id, value);
    }

    fn edit<V: PartialEq>(&mut self, field: impl FnOnce(&mut ControlState) -> &mut V, value: V) {
        let slot = field(&mut self.state);
        if *slot != value {
            *slot = value;
            self.tracker.note_edit(Instant::now());
        }
    }

    // =========================================================================
    // Push path
    // =========================================================================

    /// Push the current settings to the device.
    ///
    /// Returns the command that was written. On any failure the session
    /// stays dirty and nothing is retried.
    pub fn sync(&mut self) -> Result<String, SyncError> {
        self.ensure_connected()?;

        let command = self.codec.encode(&self.state);
        let max = self.transport.max_payload_length();
        if command.len() > max {
            return Err(self.fail(SyncError::PayloadTooLarge {
                len: command.len(),
                max,
            }));
        }

        if let Err(e) = self.transport.write(&command) {
            return Err(self.fail(e.into()));
        }
        self.tracker.mark_pushed();
        self.report(&format!("Synced: {}", command));
        Ok(command)
    }

    /// Toggle the cap's indicator LED.
    pub fn toggle_led(&mut self) -> Result<(), SyncError> {
        self.ensure_connected()?;
        if let Err(e) = self.transport.write(TOGGLE_LED) {
            return Err(self.fail(e.into()));
        }
        self.report("Toggled LED");
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ensure_connected(&mut self) -> Result<(), SyncError> {
        if self.transport.is_connected() {
            Ok(())
        } else {
            Err(self.fail(SyncError::NotConnected))
        }
    }

    fn report(&mut self, message: &str) {
        info!("{}", message);
        self.log.append(message);
    }

    fn fail(&mut self, err: SyncError) -> SyncError {
        let message = err.to_string();
        warn!("{}", message);
        self.log.append(&message);
        err
    }
}
