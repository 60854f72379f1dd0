// Slow-path seek: a replacement resource races several readiness signals
// against a fallback deadline, and whichever lands first wins

use super::media::{MediaEvent, ResourceId};
use std::time::Duration;
use tokio::time::Instant;

/// What ended the race
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Metadata,
    CanPlay,
    CanPlayThrough,
    Deadline,
}

impl Readiness {
    /// Signals that count as "ready enough to seek"
    pub fn from_event(event: &MediaEvent) -> Option<Self> {
        match event {
            MediaEvent::LoadedMetadata { .. } => Some(Readiness::Metadata),
            MediaEvent::CanPlay => Some(Readiness::CanPlay),
            MediaEvent::CanPlayThrough => Some(Readiness::CanPlayThrough),
            _ => None,
        }
    }
}

/// A replacement resource waiting to be swapped in at `target`.
///
/// The race is resolved at most once: the coordinator takes the value out of
/// its slot when `poll` reports a winner, so late signals from the same
/// resource find nothing to act on.
pub struct SeekRace<R> {
    pub id: ResourceId,
    pub resource: R,
    pub target: f64,
    pub resume: bool,
    deadline: Instant,
}

impl<R> SeekRace<R> {
    pub fn new(id: ResourceId, resource: R, target: f64, resume: bool, fallback: Duration) -> Self {
        Self {
            id,
            resource,
            target,
            resume,
            deadline: Instant::now() + fallback,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// First of {metadata, can-play, can-play-through, deadline}.
    /// A readiness signal wins over an expired deadline when both are present.
    pub fn poll(&self, signal: Option<&MediaEvent>, now: Instant) -> Option<Readiness> {
        signal
            .and_then(Readiness::from_event)
            .or_else(|| (now >= self.deadline).then_some(Readiness::Deadline))
    }
}
