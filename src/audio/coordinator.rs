use super::media::{EventSink, MediaBackend, MediaError, MediaEvent, MediaResource, ResourceEvent, ResourceId};
use super::seek::{Readiness, SeekRace};
use super::session::{NowPlaying, PlaybackSession, PlaybackState};
use super::track::{TrackId, TrackRequest};
use super::PlayerSettings;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Which end of the track's life went wrong. Both reset the session the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Start,
    Runtime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackLoading(TrackId),
    TrackStarted(TrackId),
    TrackPaused(TrackId),
    TrackResumed(TrackId),
    TrackStopped(TrackId),
    TrackFinished(TrackId),
    TrackFailed {
        track: TrackId,
        kind: FailureKind,
        error: MediaError,
    },
    DurationKnown(f64),
    PositionChanged(f64),
    Seeked(f64),
    VolumeChanged(f32),
    MuteChanged(bool),
}

struct ActiveResource<R> {
    id: ResourceId,
    resource: R,
    has_started: bool, // the track confirmed playback at least once
}

/// Owns the one playback resource and the session every UI surface reads.
///
/// Resource notifications come back through the receiver returned by `new`;
/// whoever drives the event loop feeds them to `handle_event`. Each one is
/// checked against the active (or pending seek) resource id before it can
/// touch the session.
pub struct PlaybackCoordinator<B: MediaBackend> {
    backend: B,
    settings: PlayerSettings,
    session: PlaybackSession,
    active: Option<ActiveResource<B::Resource>>,
    pending_seek: Option<SeekRace<B::Resource>>,
    next_resource: u64,
    resource_sender: mpsc::UnboundedSender<ResourceEvent>,
    event_sender: Option<mpsc::UnboundedSender<PlayerEvent>>,
}

impl<B: MediaBackend> PlaybackCoordinator<B> {
    pub fn new(backend: B, settings: PlayerSettings) -> (Self, mpsc::UnboundedReceiver<ResourceEvent>) {
        let (resource_sender, resource_receiver) = mpsc::unbounded_channel();
        let session = PlaybackSession::new(settings.volume);

        let coordinator = Self {
            backend,
            settings,
            session,
            active: None,
            pending_seek: None,
            next_resource: 0,
            resource_sender,
            event_sender: None,
        };

        (coordinator, resource_receiver)
    }

    pub fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<PlayerEvent>) {
        self.event_sender = Some(sender);
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn snapshot(&self) -> PlaybackSession {
        self.session.clone()
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn is_current_track(&self, id: &TrackId) -> bool {
        self.session.is_current_track(id)
    }

    pub fn is_current_track_playing(&self, id: &TrackId) -> bool {
        self.session.is_current_track_playing(id)
    }

    pub fn play_track(&mut self, id: impl Into<TrackId>, url: impl Into<String>, title: impl Into<String>) {
        self.play(TrackRequest::new(id, url, title));
    }

    /// Same track toggles pause/resume; anything else replaces the session.
    pub fn play(&mut self, request: TrackRequest) {
        if self.session.is_current_track(&request.id) {
            match self.session.state {
                PlaybackState::Playing => self.pause_track(),
                PlaybackState::Paused => self.resume_track(),
                // start already requested
                PlaybackState::Loading | PlaybackState::Idle => {}
            }
            return;
        }

        self.release_resources();

        let id = self.allocate_id();
        let track = request.id.clone();
        let url = request.url.clone();

        self.session.now_playing = Some(NowPlaying::from(request));
        self.session.state = PlaybackState::Loading;
        self.session.current_time = 0.0;
        self.session.duration = None;
        info!("Loading track {} from {}", track, url);
        self.emit(PlayerEvent::TrackLoading(track));

        match self.open_resource(id, &url) {
            Ok(mut resource) => {
                resource.start();
                self.active = Some(ActiveResource {
                    id,
                    resource,
                    has_started: false,
                });
            }
            Err(e) => self.fail(FailureKind::Start, e),
        }
    }

    pub fn pause_track(&mut self) {
        let Some(track) = self.session.track_id().cloned() else {
            debug!("pause ignored - nothing loaded");
            return;
        };
        if self.session.state == PlaybackState::Paused {
            return;
        }

        if let Some(race) = self.pending_seek.as_mut() {
            race.resume = false;
        }
        if let Some(active) = self.active.as_mut() {
            active.resource.halt();
        }

        self.session.state = PlaybackState::Paused;
        debug!("Paused {} at {:.2}s", track, self.session.current_time);
        self.emit(PlayerEvent::TrackPaused(track));
    }

    /// Asks the resource to continue; the session reads `Loading` until the
    /// resource confirms with `Started`.
    pub fn resume_track(&mut self) {
        if self.session.track_id().is_none() {
            debug!("resume ignored - nothing loaded");
            return;
        }
        if self.session.state != PlaybackState::Paused {
            return;
        }

        if let Some(race) = self.pending_seek.as_mut() {
            // the swap will start the replacement
            race.resume = true;
        } else if let Some(active) = self.active.as_mut() {
            active.resource.start();
        }

        self.session.state = PlaybackState::Loading;
    }

    /// Mini-player play button
    pub fn toggle_play_pause(&mut self) {
        match self.session.state {
            PlaybackState::Playing | PlaybackState::Loading => self.pause_track(),
            PlaybackState::Paused => self.resume_track(),
            PlaybackState::Idle => {}
        }
    }

    pub fn seek_to(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            debug!("seek ignored - non-finite target {}", seconds);
            return;
        }
        if self.session.track_id().is_none() {
            debug!("seek ignored - nothing loaded");
            return;
        }
        let target = self.session.clamp_position(seconds);

        // already waiting on a replacement for this source: just retarget it
        if let Some(race) = self.pending_seek.as_mut() {
            race.target = target;
            debug!("Retargeted pending seek on {} to {:.2}s", race.id, target);
            return;
        }

        let Some(active) = self.active.as_mut() else {
            return;
        };

        if active.resource.ready_state().can_seek() {
            active.resource.set_position(target);
            self.session.current_time = target;
            self.emit(PlayerEvent::Seeked(target));
            return;
        }

        self.begin_slow_seek(target);
    }

    /// The ±10s buttons
    pub fn seek_by(&mut self, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        self.seek_to(self.session.current_time + delta);
    }

    pub fn skip_forward(&mut self) {
        self.seek_by(self.settings.skip_step);
    }

    pub fn skip_backward(&mut self) {
        self.seek_by(-self.settings.skip_step);
    }

    pub fn stop_track(&mut self) {
        self.release_resources();
        let track = self.session.track_id().cloned();
        self.session.reset();

        if let Some(track) = track {
            info!("Stopped {}", track);
            self.emit(PlayerEvent::TrackStopped(track));
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        if self.active.is_none() {
            debug!("volume change ignored - no resource");
            return;
        }

        let volume = volume.clamp(0.0, 1.0);
        self.session.volume = volume;
        self.session.is_muted = volume == 0.0;
        if volume > 0.0 {
            self.session.restore_volume = volume;
        }

        self.apply_output();
        self.emit(PlayerEvent::VolumeChanged(volume));
    }

    pub fn toggle_mute(&mut self) {
        if self.active.is_none() {
            debug!("mute toggle ignored - no resource");
            return;
        }

        if self.session.is_muted {
            self.session.is_muted = false;
            if self.session.volume == 0.0 {
                self.session.volume = self.session.restore_volume;
            }
        } else {
            if self.session.volume > 0.0 {
                self.session.restore_volume = self.session.volume;
            }
            self.session.is_muted = true;
        }

        self.apply_output();
        self.emit(PlayerEvent::MuteChanged(self.session.is_muted));
    }

    /// When the slow-path fallback timer should fire, if a seek is pending
    pub fn seek_deadline(&self) -> Option<Instant> {
        self.pending_seek.as_ref().map(|race| race.deadline())
    }

    /// Force the pending swap once its fallback deadline has passed
    pub fn expire_seek(&mut self, now: Instant) {
        let winner = self.pending_seek.as_ref().and_then(|race| race.poll(None, now));
        if let Some(winner) = winner {
            self.complete_seek(winner);
        }
    }

    pub fn handle_event(&mut self, event: ResourceEvent) {
        let ResourceEvent { resource, event } = event;

        if self.active.as_ref().is_some_and(|a| a.id == resource) {
            self.apply_active_event(event);
        } else if self.pending_seek.as_ref().is_some_and(|race| race.id == resource) {
            self.apply_pending_event(event);
        } else {
            debug!("Discarding stale {:?} from {}", event, resource);
        }
    }

    fn apply_active_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::LoadedMetadata { duration } => self.learn_duration(duration),
            MediaEvent::CanPlay | MediaEvent::CanPlayThrough => {}
            MediaEvent::Started => self.confirm_started(),
            MediaEvent::TimeUpdate { position } => {
                // the old resource is halted while a replacement loads
                if self.pending_seek.is_some() || !position.is_finite() {
                    return;
                }
                self.session.current_time = self.session.clamp_position(position);
                self.emit(PlayerEvent::PositionChanged(self.session.current_time));
            }
            MediaEvent::Ended => self.finish(),
            MediaEvent::Failed(error) => {
                let kind = match self.active.as_ref() {
                    Some(active) if active.has_started => FailureKind::Runtime,
                    _ => FailureKind::Start,
                };
                self.fail(kind, error);
            }
        }
    }

    fn apply_pending_event(&mut self, event: MediaEvent) {
        if let MediaEvent::Failed(error) = event {
            self.fail(FailureKind::Runtime, error);
            return;
        }
        if let MediaEvent::LoadedMetadata { duration } = event {
            self.learn_duration(duration);
        }

        let winner = self
            .pending_seek
            .as_ref()
            .and_then(|race| race.poll(Some(&event), Instant::now()));
        if let Some(winner) = winner {
            self.complete_seek(winner);
        }
    }

    fn confirm_started(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        // the old source was halted for a seek; only the replacement's start counts
        if self.pending_seek.is_some() {
            active.has_started = true;
            active.resource.halt();
            return;
        }

        match self.session.state {
            PlaybackState::Loading => {
                let first_start = !active.has_started;
                active.has_started = true;
                self.session.state = PlaybackState::Playing;

                if let Some(track) = self.session.track_id().cloned() {
                    if first_start {
                        info!("Now playing {}", track);
                        self.emit(PlayerEvent::TrackStarted(track));
                    } else {
                        self.emit(PlayerEvent::TrackResumed(track));
                    }
                }
            }
            PlaybackState::Paused => {
                // paused while the start was in flight
                active.has_started = true;
                active.resource.halt();
            }
            PlaybackState::Playing | PlaybackState::Idle => {}
        }
    }

    fn learn_duration(&mut self, duration: f64) {
        if !duration.is_finite() || duration < 0.0 {
            return;
        }
        self.session.duration = Some(duration);
        self.session.current_time = self.session.clamp_position(self.session.current_time);
        self.emit(PlayerEvent::DurationKnown(duration));
    }

    fn begin_slow_seek(&mut self, target: f64) {
        let Some(url) = self.session.track_url().map(str::to_string) else {
            return;
        };
        let resume = matches!(self.session.state, PlaybackState::Playing | PlaybackState::Loading);

        if resume {
            if let Some(active) = self.active.as_mut() {
                active.resource.halt();
            }
            // keep `is_playing` honest while nothing is audible
            self.session.state = PlaybackState::Loading;
        }

        let id = self.allocate_id();
        match self.open_resource(id, &url) {
            Ok(resource) => {
                debug!("Seek to {:.2}s needs a fresh resource {}", target, id);
                self.pending_seek = Some(SeekRace::new(id, resource, target, resume, self.settings.seek_fallback));
            }
            Err(e) => self.fail(FailureKind::Runtime, e),
        }
    }

    fn complete_seek(&mut self, winner: Readiness) {
        let Some(race) = self.pending_seek.take() else {
            return;
        };
        let SeekRace { id, mut resource, target, resume, .. } = race;

        if let Some(duration) = resource.duration().filter(|d| d.is_finite() && *d >= 0.0) {
            self.session.duration = Some(duration);
        }
        let target = self.session.clamp_position(target);
        resource.set_position(target);

        let has_started = match self.active.take() {
            Some(mut old) => {
                old.resource.halt();
                old.has_started
            }
            None => false,
        };

        debug!("Swapped in {} at {:.2}s ({:?})", id, target, winner);
        self.session.current_time = target;

        if resume {
            resource.start();
            self.session.state = PlaybackState::Loading;
        } else {
            self.session.state = PlaybackState::Paused;
        }

        self.active = Some(ActiveResource {
            id,
            resource,
            has_started,
        });
        self.emit(PlayerEvent::Seeked(target));
    }

    fn finish(&mut self) {
        self.release_resources();
        let track = self.session.track_id().cloned();
        self.session.reset();

        if let Some(track) = track {
            info!("Finished {}", track);
            self.emit(PlayerEvent::TrackFinished(track));
        }
    }

    fn fail(&mut self, kind: FailureKind, error: MediaError) {
        self.release_resources();
        let track = self.session.track_id().cloned();
        self.session.reset();

        if let Some(track) = track {
            warn!("Playback of {} failed ({:?}): {}", track, kind, error);
            self.emit(PlayerEvent::TrackFailed { track, kind, error });
        }
    }

    /// Halt and drop everything we own. Any event still in flight for these
    /// ids becomes stale.
    fn release_resources(&mut self) {
        if let Some(mut race) = self.pending_seek.take() {
            race.resource.halt();
        }
        if let Some(mut active) = self.active.take() {
            active.resource.halt();
        }
    }

    fn open_resource(&mut self, id: ResourceId, url: &str) -> Result<B::Resource, MediaError> {
        let sink = EventSink::new(id, self.resource_sender.clone());
        let mut resource = self.backend.open(url, sink)?;
        resource.set_volume(self.session.effective_volume());
        resource.set_muted(self.session.is_muted);
        Ok(resource)
    }

    fn apply_output(&mut self) {
        let volume = self.session.effective_volume();
        let muted = self.session.is_muted;

        if let Some(active) = self.active.as_mut() {
            active.resource.set_volume(volume);
            active.resource.set_muted(muted);
        }
        if let Some(race) = self.pending_seek.as_mut() {
            race.resource.set_volume(volume);
            race.resource.set_muted(muted);
        }
    }

    fn allocate_id(&mut self) -> ResourceId {
        self.next_resource += 1;
        ResourceId(self.next_resource)
    }

    fn emit(&self, event: PlayerEvent) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(event);
        }
    }
}
