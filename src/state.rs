//! Stimulation settings held for the connected cap.

use std::ops::RangeInclusive;

use crate::battery::BatteryMapper;
use crate::codec::Field;
use crate::revision::{CURRENT_FULL_SCALE_UA, Limits};

/// In-memory copy of the cap's stimulation configuration.
///
/// Editable fields are public; callers that bypass the orchestrator's
/// setters are responsible for keeping them inside [`Limits`] (see
/// [`clamped`](Self::clamped)). `battery_percent` is only ever derived from
/// a battery frame through [`BatteryMapper`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    /// Amplitude in percent of scale.
    pub amplitude: u16,
    /// Stimulation frequency in hertz.
    pub frequency_hz: u16,
    /// Pulse duration in microseconds.
    pub pulse_duration_us: u16,
    /// Whether the cap keeps stimulating after the link drops.
    pub activate_on_disconnect: bool,
    /// Cap identifier (0-99).
    pub cap_id: u8,
    battery_percent: Option<u8>,
}

impl ControlState {
    /// Last derived battery estimate, if a battery frame has been seen.
    pub fn battery_percent(&self) -> Option<u8> {
        self.battery_percent
    }

    /// Two-digit form of the cap identifier, e.g. `"07"`.
    pub fn cap_id_label(&self) -> String {
        format!("{:02}", self.cap_id)
    }

    /// Nominal output current of the current firmware at this amplitude (into 1 kΩ).
    pub fn amplitude_microamps(&self) -> u32 {
        u32::from(self.amplitude) * CURRENT_FULL_SCALE_UA / 100
    }

    /// Copy of this state with every editable field pulled into `limits`.
    pub fn clamped(&self, limits: &Limits) -> Self {
        Self {
            amplitude: within(self.amplitude, &limits.amplitude),
            frequency_hz: within(self.frequency_hz, &limits.frequency_hz),
            pulse_duration_us: within(self.pulse_duration_us, &limits.pulse_duration_us),
            activate_on_disconnect: self.activate_on_disconnect,
            cap_id: within(self.cap_id, &limits.cap_id),
            battery_percent: self.battery_percent,
        }
    }

    /// Apply decoded fields in order. Returns `true` if anything changed.
    pub fn apply(&mut self, fields: &[Field], battery: &BatteryMapper) -> bool {
        let before = self.clone();
        for field in fields {
            match *field {
                Field::Amplitude(v) => self.amplitude = v,
                Field::Frequency(v) => self.frequency_hz = v,
                Field::PulseDuration(v) => self.pulse_duration_us = v,
                Field::ActivateOnDisconnect(v) => self.activate_on_disconnect = v,
                Field::CapId(v) => self.cap_id = v,
                Field::BatteryMillivolts(mv) => {
                    self.battery_percent = Some(battery.millivolts_to_percent(mv));
                }
                Field::Led => {}
            }
        }
        *self != before
    }

    /// Forget session-scoped values after the link drops.
    pub(crate) fn reset_session(&mut self) {
        self.activate_on_disconnect = false;
        self.battery_percent = None;
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            amplitude: 0,
            frequency_hz: 130,
            pulse_duration_us: 90,
            activate_on_disconnect: false,
            cap_id: 0,
            battery_percent: None,
        }
    }
}

pub(crate) fn within<T: Ord + Copy>(value: T, range: &RangeInclusive<T>) -> T {
    value.clamp(*range.start(), *range.end())
}
