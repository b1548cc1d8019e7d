//! Local/remote consistency tracking.

use std::time::{Duration, Instant};

use log::debug;

/// What the session currently knows about local vs. device values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Local values match what the device last reported or accepted.
    Clean,
    /// Local edits have not been pushed yet.
    Dirty,
    /// Remote values are being applied or have just been applied; edits
    /// in this window are treated as programmatic and do not mark dirty.
    Settling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Clean,
    Dirty,
    /// `until: None` while an ingest is in progress.
    Suppressed { until: Option<Instant> },
}

/// Decides when local edits must be pushed to the device.
///
/// Time is passed in explicitly so the settling window can be driven
/// deterministically.
#[derive(Debug, Clone)]
pub struct SyncTracker {
    phase: Phase,
    /// Phase to fall back to when an ingest carried no settings.
    resume: Option<Phase>,
    settle_delay: Duration,
}

impl SyncTracker {
    /// Create a clean tracker with the given settling window.
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            phase: Phase::Clean,
            resume: None,
            settle_delay,
        }
    }

    /// Current status as of `now`.
    pub fn status(&mut self, now: Instant) -> SyncStatus {
        self.expire(now);
        match self.phase {
            Phase::Clean => SyncStatus::Clean,
            Phase::Dirty => SyncStatus::Dirty,
            Phase::Suppressed { .. } => SyncStatus::Settling,
        }
    }

    /// Whether local edits still need to be pushed.
    pub fn is_dirty(&self) -> bool {
        self.phase == Phase::Dirty
    }

    /// Whether edits at `now` would be ignored.
    pub fn is_suppressed(&mut self, now: Instant) -> bool {
        self.expire(now);
        matches!(self.phase, Phase::Suppressed { .. })
    }

    /// A link was just established; hold off dirty-marking while the
    /// device's initial values arrive.
    pub fn on_connected(&mut self, now: Instant) {
        self.transition(Phase::Suppressed {
            until: Some(now + self.settle_delay),
        });
    }

    /// Remote values are about to be applied.
    pub fn begin_ingest(&mut self) {
        if self.resume.is_none() {
            self.resume = Some(self.phase);
        }
        self.transition(Phase::Suppressed { until: None });
    }

    /// An inbound frame has been applied.
    ///
    /// With `carried_settings` local now mirrors the device and the
    /// settling window restarts. Telemetry-only frames leave the phase as
    /// it was before the ingest, so pending edits stay dirty.
    pub fn finish_ingest(&mut self, now: Instant, carried_settings: bool) {
        match self.resume.take() {
            Some(before) if !carried_settings => self.transition(before),
            _ => self.transition(Phase::Suppressed {
                until: Some(now + self.settle_delay),
            }),
        }
    }

    /// A field was changed by the operator.
    pub fn note_edit(&mut self, now: Instant) {
        self.expire(now);
        match self.phase {
            Phase::Clean => self.transition(Phase::Dirty),
            Phase::Dirty => {}
            Phase::Suppressed { .. } => debug!("edit ignored during settling window"),
        }
    }

    /// The current values were written to the device.
    pub fn mark_pushed(&mut self) {
        self.transition(Phase::Clean);
    }

    /// The link dropped; forget everything about this session.
    pub fn reset(&mut self) {
        self.resume = None;
        self.transition(Phase::Clean);
    }

    fn expire(&mut self, now: Instant) {
        if let Phase::Suppressed { until: Some(until) } = self.phase
            && now >= until
        {
            self.transition(Phase::Clean);
        }
    }

    fn transition(&mut self, next: Phase) {
        if self.phase != next {
            debug!("sync tracker: {:?} -> {:?}", self.phase, next);
            self.phase = next;
        }
    }
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
