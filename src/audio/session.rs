use super::track::{TrackId, TrackRequest};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Identity of the loaded track. Kept as one value so id, url and title
/// are always set or cleared together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlaying {
    pub id: TrackId,
    pub url: String,
    pub title: String,
}

impl From<TrackRequest> for NowPlaying {
    fn from(request: TrackRequest) -> Self {
        Self {
            id: request.id,
            url: request.url,
            title: request.title,
        }
    }
}

/// What every UI surface reads: the card, the beat page, the mini-player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSession {
    pub now_playing: Option<NowPlaying>,
    pub state: PlaybackState,
    pub current_time: f64,          // seconds
    pub duration: Option<f64>,      // seconds, None until metadata loads
    pub volume: f32,                // 0.0 to 1.0
    pub is_muted: bool,
    #[serde(skip)]
    pub(crate) restore_volume: f32, // last non-zero volume, brought back on unmute
}

impl PlaybackSession {
    pub fn new(volume: f32) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        Self {
            now_playing: None,
            state: PlaybackState::Idle,
            current_time: 0.0,
            duration: None,
            volume,
            is_muted: volume == 0.0,
            restore_volume: if volume > 0.0 { volume } else { 1.0 },
        }
    }

    pub fn track_id(&self) -> Option<&TrackId> {
        self.now_playing.as_ref().map(|n| &n.id)
    }

    pub fn track_url(&self) -> Option<&str> {
        self.now_playing.as_ref().map(|n| n.url.as_str())
    }

    pub fn track_title(&self) -> Option<&str> {
        self.now_playing.as_ref().map(|n| n.title.as_str())
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_current_track(&self, id: &TrackId) -> bool {
        self.track_id() == Some(id)
    }

    pub fn is_current_track_playing(&self, id: &TrackId) -> bool {
        self.is_current_track(id) && self.is_playing()
    }

    /// The mini-player only shows up while something is loaded
    pub fn has_session(&self) -> bool {
        self.now_playing.is_some()
    }

    /// Volume the resource should actually output
    pub fn effective_volume(&self) -> f32 {
        if self.is_muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Fraction for a progress bar, 0 while the duration is unknown
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(duration) if duration > 0.0 => (self.current_time / duration).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// Clamp a seek target into `[0, duration]`; only the floor applies
    /// while the duration is still unknown.
    pub fn clamp_position(&self, seconds: f64) -> f64 {
        let floor = seconds.max(0.0);
        match self.duration {
            Some(duration) => floor.min(duration.max(0.0)),
            None => floor,
        }
    }

    /// Back to Idle. Volume and mute survive - they belong to the listener,
    /// not the track.
    pub(crate) fn reset(&mut self) {
        self.now_playing = None;
        self.state = PlaybackState::Idle;
        self.current_time = 0.0;
        self.duration = None;
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new(1.0)
    }
}
