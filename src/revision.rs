//! Protocol revisions spoken by cap firmware generations.

use std::ops::RangeInclusive;

/// Amplitude full scale of the legacy firmware, in microamps.
const LEGACY_FULL_SCALE_UA: u32 = 3000;

/// Nominal amplitude full scale of the current firmware (into 1 kΩ), in microamps.
pub(crate) const CURRENT_FULL_SCALE_UA: u32 = 600;

/// A firmware generation's tag set, units and ranges.
///
/// The canonical internal amplitude unit is percent of scale. Legacy
/// firmware expects microamps on the wire; the conversion happens in
/// [`amplitude_to_wire`](Self::amplitude_to_wire) and
/// [`amplitude_from_wire`](Self::amplitude_from_wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolRevision {
    /// First firmware: `A,F,P,G` only, microamp amplitude, streams on connect.
    Legacy,
    /// Cap-ID and battery aware firmware with explicit read requests.
    #[default]
    Current,
}

impl ProtocolRevision {
    /// Tags emitted by the encoder, in wire order.
    pub fn encoded_tags(self) -> &'static [char] {
        match self {
            Self::Legacy => &['A', 'F', 'P', 'G'],
            Self::Current => &['A', 'F', 'P', 'G', 'N'],
        }
    }

    /// Whether the decoder understands `tag` for this revision.
    pub fn understands(self, tag: char) -> bool {
        match tag {
            'A' | 'F' | 'P' | 'G' | 'L' => true,
            'N' | 'V' => self == Self::Current,
            _ => false,
        }
    }

    /// Commands that make the device emit its configuration and telemetry
    /// frames. Empty when a plain transport read is enough.
    pub fn read_requests(self) -> &'static [&'static str] {
        match self {
            Self::Legacy => &[],
            Self::Current => &["_1", "_2"],
        }
    }

    /// Default field limits for this revision.
    pub fn limits(self) -> Limits {
        match self {
            Self::Legacy => Limits {
                amplitude: 0..=100,
                frequency_hz: 80..=160,
                pulse_duration_us: 10..=600,
                cap_id: 0..=99,
            },
            Self::Current => Limits {
                amplitude: 0..=100,
                frequency_hz: 80..=160,
                pulse_duration_us: 90..=600,
                cap_id: 0..=99,
            },
        }
    }

    /// Convert a percent-of-scale amplitude into the wire value.
    pub fn amplitude_to_wire(self, percent: u16) -> u32 {
        match self {
            Self::Legacy => u32::from(percent) * LEGACY_FULL_SCALE_UA / 100,
            Self::Current => u32::from(percent),
        }
    }

    /// Convert a wire amplitude into percent of scale.
    ///
    /// Returns `None` when the value is outside what the revision can emit.
    pub fn amplitude_from_wire(self, value: u32) -> Option<u16> {
        match self {
            Self::Legacy if value <= LEGACY_FULL_SCALE_UA => {
                let percent = (value * 100 + LEGACY_FULL_SCALE_UA / 2) / LEGACY_FULL_SCALE_UA;
                Some(percent as u16)
            }
            Self::Current if value <= 100 => Some(value as u16),
            _ => None,
        }
    }
}

/// Inclusive ranges for every user-editable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Amplitude in percent of scale.
    pub amplitude: RangeInclusive<u16>,
    /// Stimulation frequency in hertz.
    pub frequency_hz: RangeInclusive<u16>,
    /// Pulse duration in microseconds.
    pub pulse_duration_us: RangeInclusive<u16>,
    /// Cap identifier.
    pub cap_id: RangeInclusive<u8>,
}

impl Limits {
    /// Lower the amplitude ceiling. It is never raised above the revision default.
    pub fn with_max_amplitude(mut self, max: u16) -> Self {
        let max = max.min(*self.amplitude.end()).max(*self.amplitude.start());
        self.amplitude = *self.amplitude.start()..=max;
        self
    }
}

impl Default for Limits {
    fn default() -> Self {
        ProtocolRevision::default().limits()
    }
}
