// Media playback primitive - the one external collaborator of the coordinator
// Anything that can buffer a URL, play it and report back fits behind these traits

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// How much of the source a resource has buffered.
///
/// Ordered, so `ready_state() >= ReadyState::CurrentData` reads the way the
/// seek fast path needs it to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ReadyState {
    Nothing,
    Metadata,
    CurrentData,
    FutureData,
    EnoughData,
}

impl ReadyState {
    pub fn can_seek(self) -> bool {
        self >= ReadyState::CurrentData
    }
}

/// Generation token handed to every resource the coordinator creates.
/// Events carrying an id that is no longer active get dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediaError {
    #[error("network error loading media: {0}")]
    Network(String),

    #[error("could not decode media: {0}")]
    Decode(String),

    #[error("unsupported source: {0}")]
    Unsupported(String),

    #[error("audio output unavailable: {0}")]
    Output(String),
}

/// Notifications a resource delivers back into the coordinator's event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadedMetadata { duration: f64 },
    CanPlay,
    CanPlayThrough,
    Started,
    TimeUpdate { position: f64 },
    Ended,
    Failed(MediaError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent {
    pub resource: ResourceId,
    pub event: MediaEvent,
}

/// Where a resource sends its notifications. Every event is stamped with the
/// id the coordinator assigned when it opened the resource.
#[derive(Debug, Clone)]
pub struct EventSink {
    id: ResourceId,
    sender: mpsc::UnboundedSender<ResourceEvent>,
}

impl EventSink {
    pub fn new(id: ResourceId, sender: mpsc::UnboundedSender<ResourceEvent>) -> Self {
        Self { id, sender }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Returns false once the coordinator side is gone.
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.sender
            .send(ResourceEvent {
                resource: self.id,
                event,
            })
            .is_ok()
    }
}

/// One playback object. Dropping it must release it and silence it.
pub trait MediaResource: Send {
    fn ready_state(&self) -> ReadyState;

    /// Request playback. Success or failure arrives later as
    /// `MediaEvent::Started` / `MediaEvent::Failed`.
    fn start(&mut self);

    fn halt(&mut self);
    fn set_position(&mut self, seconds: f64);
    fn set_volume(&mut self, volume: f32);
    fn set_muted(&mut self, muted: bool);
    fn position(&self) -> f64;
    fn duration(&self) -> Option<f64>;
}

/// Factory for resources. `open` starts buffering right away.
pub trait MediaBackend: Send {
    type Resource: MediaResource;

    fn open(&mut self, url: &str, events: EventSink) -> Result<Self::Resource, MediaError>;
}
