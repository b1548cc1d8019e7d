//! Session configuration.

use std::time::Duration;

use crate::battery::BatteryMapper;
use crate::codec::CommandCodec;
use crate::revision::{Limits, ProtocolRevision};

/// Settings for one [`SyncOrchestrator`](crate::SyncOrchestrator).
///
/// ```
/// use std::time::Duration;
/// use mousecap_core::{ProtocolRevision, SyncConfig};
///
/// let config = SyncConfig::new(ProtocolRevision::Legacy)
///     .with_max_amplitude(60)
///     .with_settle_delay(Duration::from_millis(250));
/// assert_eq!(config.limits.amplitude, 0..=60);
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Protocol revision of the connected firmware.
    pub revision: ProtocolRevision,
    /// Field ranges enforced on edits and decodes.
    pub limits: Limits,
    /// Battery voltage window.
    pub battery: BatteryMapper,
    /// How long edits are ignored after connecting or ingesting a frame.
    pub settle_delay: Duration,
    /// How long the read path waits for each expected frame.
    pub read_timeout: Duration,
}

impl SyncConfig {
    /// Defaults for the given revision.
    pub fn new(revision: ProtocolRevision) -> Self {
        Self {
            revision,
            limits: revision.limits(),
            battery: BatteryMapper::default(),
            settle_delay: Duration::from_secs(1),
            read_timeout: Duration::from_secs(2),
        }
    }

    /// Lower the amplitude ceiling.
    pub fn with_max_amplitude(mut self, max: u16) -> Self {
        self.limits = self.limits.with_max_amplitude(max);
        self
    }

    /// Use a different battery voltage window.
    pub fn with_battery(mut self, battery: BatteryMapper) -> Self {
        self.battery = battery;
        self
    }

    /// Change the settling window.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Change the per-frame read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Codec matching this configuration.
    pub fn codec(&self) -> CommandCodec {
        CommandCodec::with_limits(self.revision, self.limits.clone())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(ProtocolRevision::default())
    }
}
