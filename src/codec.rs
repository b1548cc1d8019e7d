//! Text command encoding and decoding.
//!
//! Frames look like `_A40,F130,P90,G0,N7`: a leading `_`, then
//! comma-separated fields made of a one-letter tag and a decimal value.

use std::fmt::Write;

use log::trace;

use crate::error::FormatError;
use crate::revision::{Limits, ProtocolRevision};
use crate::state::ControlState;

/// Prefix carried by every command and response frame.
pub const COMMAND_PREFIX: char = '_';

/// Out-of-band command that toggles the cap's indicator LED.
pub const TOGGLE_LED: &str = "_L1";

/// One decoded field of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// `A`: amplitude, already converted to percent of scale.
    Amplitude(u16),
    /// `F`: frequency in hertz.
    Frequency(u16),
    /// `P`: pulse duration in microseconds.
    PulseDuration(u16),
    /// `G`: keep stimulating after disconnect.
    ActivateOnDisconnect(bool),
    /// `N`: cap identifier.
    CapId(u8),
    /// `V`: raw battery voltage in millivolts.
    BatteryMillivolts(u32),
    /// `L`: LED toggle marker.
    Led,
}

impl Field {
    /// Whether this field is a user-editable setting rather than telemetry.
    pub fn is_setting(&self) -> bool {
        !matches!(self, Field::BatteryMillivolts(_) | Field::Led)
    }
}

/// Encoder and decoder for one protocol revision.
///
/// Stateless: both directions are pure functions of their input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCodec {
    revision: ProtocolRevision,
    limits: Limits,
}

impl CommandCodec {
    /// Codec using the revision's default limits.
    pub fn new(revision: ProtocolRevision) -> Self {
        Self {
            revision,
            limits: revision.limits(),
        }
    }

    /// Codec with explicit field limits.
    pub fn with_limits(revision: ProtocolRevision, limits: Limits) -> Self {
        Self { revision, limits }
    }

    /// The revision this codec speaks.
    pub fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    /// The limits applied when decoding.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Encode `state` as a push command.
    ///
    /// Fields are written in the revision's fixed tag order. Values are
    /// written as-is; keep `state` inside the limits before encoding.
    ///
    /// ```
    /// use mousecap_core::{CommandCodec, ControlState, ProtocolRevision};
    ///
    /// let mut state = ControlState::default();
    /// state.amplitude = 40;
    /// state.cap_id = 7;
    ///
    /// let codec = CommandCodec::new(ProtocolRevision::Current);
    /// assert_eq!(codec.encode(&state), "_A40,F130,P90,G0,N7");
    /// ```
    pub fn encode(&self, state: &ControlState) -> String {
        let mut out = String::with_capacity(32);
        out.push(COMMAND_PREFIX);
        for &tag in self.revision.encoded_tags() {
            let value = match tag {
                'A' => self.revision.amplitude_to_wire(state.amplitude),
                'F' => u32::from(state.frequency_hz),
                'P' => u32::from(state.pulse_duration_us),
                'G' => u32::from(state.activate_on_disconnect),
                'N' => u32::from(state.cap_id),
                _ => continue,
            };
            if out.len() > 1 {
                out.push(',');
            }
            // Writing into a String cannot fail.
            let _ = write!(out, "{tag}{value}");
        }
        out
    }

    /// Decode one complete frame into its recognised fields.
    ///
    /// Short, non-numeric, out-of-range and unknown segments are skipped.
    /// Only a missing `_` prefix rejects the frame.
    pub fn decode(&self, raw: &str) -> Result<Vec<Field>, FormatError> {
        let frame = raw.trim_end_matches(['\0', '\r', '\n']);
        let body = frame
            .strip_prefix(COMMAND_PREFIX)
            .ok_or_else(|| FormatError::new(raw))?;

        let mut fields = Vec::new();
        for segment in body.split(',') {
            let mut chars = segment.chars();
            let (Some(tag), digits) = (chars.next(), chars.as_str()) else {
                continue;
            };
            let Some(value) = parse_digits(digits) else {
                trace!("skipping malformed segment {:?}", segment);
                continue;
            };
            if !self.revision.understands(tag) {
                trace!("skipping unknown tag {:?}", tag);
                continue;
            }
            match self.field(tag, value) {
                Some(field) => fields.push(field),
                None => trace!("skipping out-of-range segment {:?}", segment),
            }
        }
        Ok(fields)
    }

    fn field(&self, tag: char, value: u32) -> Option<Field> {
        let limits = &self.limits;
        match tag {
            'A' => self
                .revision
                .amplitude_from_wire(value)
                .filter(|v| limits.amplitude.contains(v))
                .map(Field::Amplitude),
            'F' => in_range(value, &limits.frequency_hz).map(Field::Frequency),
            'P' => in_range(value, &limits.pulse_duration_us).map(Field::PulseDuration),
            'G' => match value {
                0 => Some(Field::ActivateOnDisconnect(false)),
                1 => Some(Field::ActivateOnDisconnect(true)),
                _ => None,
            },
            'N' => in_range(value, &limits.cap_id).map(Field::CapId),
            'V' => Some(Field::BatteryMillivolts(value)),
            'L' => Some(Field::Led),
            _ => None,
        }
    }
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self::new(ProtocolRevision::default())
    }
}

/// Parse a run of ASCII digits. Signs, spaces and overflow are rejected.
fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn in_range<T>(value: u32, range: &std::ops::RangeInclusive<T>) -> Option<T>
where
    T: TryFrom<u32> + PartialOrd,
{
    T::try_from(value).ok().filter(|v| range.contains(v))
}
