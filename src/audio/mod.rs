pub mod coordinator;
pub mod media;
pub mod seek;
pub mod service;
pub mod session;
pub mod track;

#[cfg(feature = "audio")]
pub mod rodio_backend;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{FailureKind, PlaybackCoordinator, PlayerEvent};
pub use media::{EventSink, MediaBackend, MediaError, MediaEvent, MediaResource, ReadyState, ResourceEvent, ResourceId};
pub use service::{PlayerCommand, PlayerError, PlayerHandle, PlayerService};
pub use session::{NowPlaying, PlaybackSession, PlaybackState};
pub use track::{format_time, CatalogBeat, TrackId, TrackRequest};

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub volume: f32,                 // 0.0 to 1.0, applied to the first resource
    pub seek_fallback: Duration,     // how long a slow-path seek waits for readiness
    pub skip_step: f64,              // seconds moved by the skip buttons
    pub progress_interval: Duration, // how often backends report position
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            seek_fallback: Duration::from_millis(1000),
            skip_step: 10.0,
            progress_interval: Duration::from_millis(250),
        }
    }
}

impl From<&crate::config::Config> for PlayerSettings {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            volume: config.player.default_volume.clamp(0.0, 1.0),
            seek_fallback: Duration::from_millis(config.player.seek_fallback_ms),
            skip_step: config.player.skip_step_seconds,
            progress_interval: Duration::from_millis(config.player.progress_interval_ms.max(10)),
        }
    }
}
