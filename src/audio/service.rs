// Player service - runs the coordinator on one task and hands out cheap,
// cloneable handles to every UI surface that wants to drive or watch it

use super::coordinator::{PlaybackCoordinator, PlayerEvent};
use super::media::{MediaBackend, ResourceEvent};
use super::session::PlaybackSession;
use super::track::{TrackId, TrackRequest};
use super::PlayerSettings;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Play(TrackRequest),
    Pause,
    Resume,
    TogglePlayPause,
    Seek(f64),
    SeekBy(f64),
    SkipForward,
    SkipBackward,
    SetVolume(f32),
    ToggleMute,
    Stop,
    Shutdown,
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("player service has shut down")]
    ServiceClosed,
}

/// Owns the coordinator. `run` is the event loop; everything that touches the
/// session happens on it, one step at a time.
pub struct PlayerService<B: MediaBackend> {
    coordinator: PlaybackCoordinator<B>,
    commands: mpsc::UnboundedReceiver<PlayerCommand>,
    resource_events: mpsc::UnboundedReceiver<ResourceEvent>,
    state: watch::Sender<PlaybackSession>,
}

impl<B: MediaBackend> PlayerService<B> {
    pub fn new(backend: B, settings: PlayerSettings) -> (Self, PlayerHandle) {
        let (coordinator, resource_events) = PlaybackCoordinator::new(backend, settings);
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(coordinator.snapshot());

        let service = Self {
            coordinator,
            commands,
            resource_events,
            state,
        };
        let handle = PlayerHandle {
            commands: command_tx,
            state: state_rx,
        };

        (service, handle)
    }

    pub fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<PlayerEvent>) {
        self.coordinator.set_event_sender(sender);
    }

    /// Runs until `Shutdown` arrives or every handle is dropped. Playback is
    /// stopped on the way out.
    pub async fn run(mut self) {
        info!("Player service started");

        loop {
            let deadline = self.coordinator.seek_deadline();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(PlayerCommand::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
                Some(event) = self.resource_events.recv() => {
                    self.coordinator.handle_event(event);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    debug!("Seek fallback timer fired");
                    self.coordinator.expire_seek(Instant::now());
                }
            }

            self.publish();
        }

        self.coordinator.stop_track();
        self.publish();
        info!("Player service stopped");
    }

    fn apply(&mut self, command: PlayerCommand) {
        debug!("Command: {:?}", command);
        match command {
            PlayerCommand::Play(request) => self.coordinator.play(request),
            PlayerCommand::Pause => self.coordinator.pause_track(),
            PlayerCommand::Resume => self.coordinator.resume_track(),
            PlayerCommand::TogglePlayPause => self.coordinator.toggle_play_pause(),
            PlayerCommand::Seek(seconds) => self.coordinator.seek_to(seconds),
            PlayerCommand::SeekBy(delta) => self.coordinator.seek_by(delta),
            PlayerCommand::SkipForward => self.coordinator.skip_forward(),
            PlayerCommand::SkipBackward => self.coordinator.skip_backward(),
            PlayerCommand::SetVolume(volume) => self.coordinator.set_volume(volume),
            PlayerCommand::ToggleMute => self.coordinator.toggle_mute(),
            PlayerCommand::Stop => self.coordinator.stop_track(),
            PlayerCommand::Shutdown => {}
        }
    }

    fn publish(&self) {
        let snapshot = self.coordinator.snapshot();
        self.state.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

/// What a UI surface holds: controls in, session snapshots out
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<PlayerCommand>,
    state: watch::Receiver<PlaybackSession>,
}

impl PlayerHandle {
    pub fn send(&self, command: PlayerCommand) -> Result<(), PlayerError> {
        self.commands.send(command).map_err(|_| PlayerError::ServiceClosed)
    }

    pub fn play_track(&self, id: impl Into<TrackId>, url: impl Into<String>, title: impl Into<String>) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Play(TrackRequest::new(id, url, title)))
    }

    pub fn play(&self, request: TrackRequest) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Play(request))
    }

    pub fn pause_track(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Pause)
    }

    pub fn resume_track(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Resume)
    }

    pub fn toggle_play_pause(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::TogglePlayPause)
    }

    pub fn seek_to(&self, seconds: f64) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Seek(seconds))
    }

    pub fn seek_by(&self, delta: f64) -> Result<(), PlayerError> {
        self.send(PlayerCommand::SeekBy(delta))
    }

    pub fn skip_forward(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::SkipForward)
    }

    pub fn skip_backward(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::SkipBackward)
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), PlayerError> {
        self.send(PlayerCommand::SetVolume(volume))
    }

    pub fn toggle_mute(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::ToggleMute)
    }

    pub fn stop_track(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Stop)
    }

    pub fn shutdown(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Shutdown)
    }

    /// A receiver that wakes whenever the session changes
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSession> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> PlaybackSession {
        self.state.borrow().clone()
    }

    pub fn is_current_track(&self, id: &TrackId) -> bool {
        self.state.borrow().is_current_track(id)
    }

    pub fn is_current_track_playing(&self, id: &TrackId) -> bool {
        self.state.borrow().is_current_track_playing(id)
    }
}
