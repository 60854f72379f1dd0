// Beat preview player - one global playback coordinator for the storefront
// Cards, the track page and the mini-player all drive the same session

pub mod audio;     // coordinator, seek protocol, media backends
pub mod config;    // settings and preferences
#[cfg(feature = "tui")]
pub mod ui;        // terminal mini-player

// Export the stuff other modules actually use
pub use audio::{PlaybackCoordinator, PlaybackSession, PlaybackState, PlayerHandle, PlayerService, TrackId, TrackRequest};
pub use config::Config;
