//! Battery telemetry conversion.

/// Maps a raw cell voltage onto a 0-100 charge estimate.
///
/// The estimate is a straight line between `empty_mv` and `full_mv`,
/// clamped at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryMapper {
    empty_mv: u32,
    full_mv: u32,
}

impl BatteryMapper {
    /// Voltage reported by an empty cap battery.
    pub const DEFAULT_EMPTY_MV: u32 = 1400;
    /// Voltage reported by a full cap battery.
    pub const DEFAULT_FULL_MV: u32 = 2800;

    /// Create a mapper for a custom discharge window.
    ///
    /// If `full_mv` is not above `empty_mv` the window collapses to a step at `empty_mv`.
    pub fn new(empty_mv: u32, full_mv: u32) -> Self {
        Self {
            empty_mv,
            full_mv: full_mv.max(empty_mv),
        }
    }

    /// Convert millivolts to percent (0-100).
    pub fn millivolts_to_percent(&self, mv: u32) -> u8 {
        if self.full_mv == self.empty_mv {
            return if mv >= self.full_mv { 100 } else { 0 };
        }
        let clamped = mv.clamp(self.empty_mv, self.full_mv);
        let span = (self.full_mv - self.empty_mv) as f32;
        ((clamped - self.empty_mv) as f32 / span * 100.0).round() as u8
    }

    /// Convert percent (0-100) back to the nominal voltage.
    pub fn percent_to_millivolts(&self, percent: u8) -> u32 {
        let span = (self.full_mv - self.empty_mv) as f32;
        self.empty_mv + (f32::from(percent.min(100)) / 100.0 * span).round() as u32
    }
}

impl Default for BatteryMapper {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EMPTY_MV, Self::DEFAULT_FULL_MV)
    }
}
