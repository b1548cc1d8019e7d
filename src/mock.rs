//! In-memory collaborators for testing.

use log::trace;

use crate::battery::BatteryMapper;
use crate::codec::{CommandCodec, TOGGLE_LED};
use crate::error::TransportError;
use crate::revision::ProtocolRevision;
use crate::state::ControlState;
use crate::transport::{EventLog, InboundSender, Transport};

/// Characteristic length of the current cap firmware.
pub const DEFAULT_MAX_PAYLOAD: usize = 26;

/// A simulated cap behind a [`Transport`].
///
/// The device keeps its own [`ControlState`], answers read requests with
/// frames produced by [`CommandCodec`], and applies pushed commands to
/// itself.
///
/// # Example
///
/// ```
/// use mousecap_core::{MockTransport, Transport, inbound_channel};
///
/// let (tx, _rx) = inbound_channel();
/// let mut link = MockTransport::new(tx);
/// link.connect().unwrap();
/// link.write("_A20,F100,P120,G0,N3").unwrap();
/// assert_eq!(link.device().amplitude, 20);
/// ```
#[derive(Debug)]
pub struct MockTransport {
    inbound: InboundSender,
    codec: CommandCodec,
    battery: BatteryMapper,
    device: ControlState,
    battery_mv: u32,
    connected: bool,
    max_payload: usize,
    fail_connect: bool,
    fail_writes: bool,
    silent: bool,
    led_on: bool,
    writes: Vec<String>,
}

impl MockTransport {
    /// A current-revision device with default settings and a full battery.
    pub fn new(inbound: InboundSender) -> Self {
        Self::with_revision(inbound, ProtocolRevision::Current)
    }

    /// A device speaking `revision`.
    pub fn with_revision(inbound: InboundSender, revision: ProtocolRevision) -> Self {
        Self {
            inbound,
            codec: CommandCodec::new(revision),
            battery: BatteryMapper::default(),
            device: ControlState::default(),
            battery_mv: BatteryMapper::DEFAULT_FULL_MV,
            connected: false,
            max_payload: DEFAULT_MAX_PAYLOAD,
            fail_connect: false,
            fail_writes: false,
            silent: false,
            led_on: false,
            writes: Vec::new(),
        }
    }

    /// Replace the device-side settings.
    pub fn with_device(mut self, device: ControlState) -> Self {
        self.device = device;
        self
    }

    /// Set the reported battery level.
    pub fn with_battery_percent(mut self, percent: u8) -> Self {
        self.battery_mv = self.battery.percent_to_millivolts(percent);
        self
    }

    /// Advertise a different maximum payload length.
    pub fn with_max_payload(mut self, max: usize) -> Self {
        self.max_payload = max;
        self
    }

    /// Make every connect attempt fail.
    pub fn fail_connect(&mut self, fail: bool) {
        self.fail_connect = fail;
    }

    /// Make every write fail.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Stop answering read requests.
    pub fn go_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// Simulate the device dropping the link.
    pub fn drop_link(&mut self) {
        self.connected = false;
        self.inbound.disconnected();
    }

    /// Push an unsolicited frame, as a notification would.
    pub fn notify(&self, frame: &str) {
        self.inbound.frame(frame);
    }

    /// Device-side settings.
    pub fn device(&self) -> &ControlState {
        &self.device
    }

    /// Whether the device's LED is lit.
    pub fn led_on(&self) -> bool {
        self.led_on
    }

    /// Every frame written so far, oldest first.
    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    fn settings_frame(&self) -> String {
        self.codec.encode(&self.device)
    }

    fn battery_frame(&self) -> String {
        format!("_V{}", self.battery_mv)
    }

    fn reply(&self, frame: String) {
        if self.silent {
            trace!("mock device: withholding {}", frame);
        } else {
            self.inbound.frame(frame);
        }
    }
}

impl Transport for MockTransport {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_connecting(&self) -> bool {
        false
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        if self.fail_connect {
            return Err(TransportError::ConnectFailed("device not found".into()));
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn write(&mut self, payload: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.fail_writes {
            return Err(TransportError::WriteFailed("no ack".into()));
        }
        if payload.len() > self.max_payload {
            return Err(TransportError::WriteFailed("payload truncated".into()));
        }
        self.writes.push(payload.to_owned());

        match payload {
            "_1" => self.reply(self.settings_frame()),
            "_2" => self.reply(self.battery_frame()),
            TOGGLE_LED => self.led_on = !self.led_on,
            _ => {
                if let Ok(fields) = self.codec.decode(payload) {
                    self.device.apply(&fields, &self.battery);
                }
            }
        }
        Ok(())
    }

    fn read(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.reply(self.settings_frame());
        Ok(())
    }

    fn max_payload_length(&self) -> usize {
        self.max_payload
    }
}

/// [`EventLog`] that keeps every message in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    messages: Vec<String>,
}

impl MemoryLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}

impl EventLog for MemoryLog {
    fn append(&mut self, message: &str) {
        self.messages.push(message.to_owned());
    }
}
