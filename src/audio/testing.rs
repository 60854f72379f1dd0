// In-memory media backend for tests - records what the coordinator asked of
// each resource and lets a test inject notifications on any of them

use super::media::{EventSink, MediaBackend, MediaError, MediaEvent, MediaResource, ReadyState};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct ResourceLog {
    pub url: String,
    pub ready: ReadyState,
    pub playing: bool,
    pub dropped: bool,
    pub position: f64,
    pub duration: Option<f64>,
    pub volume: f32,
    pub muted: bool,
    pub start_calls: usize,
}

struct Inner {
    resources: Vec<ResourceLog>,
    sinks: Vec<EventSink>,
    ready_on_open: ReadyState,
    auto_start: bool,
    fail_start: bool,
    fail_open: bool,
}

#[derive(Clone)]
pub struct ScriptedBackend {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                resources: Vec::new(),
                sinks: Vec::new(),
                ready_on_open: ReadyState::EnoughData,
                auto_start: true,
                fail_start: false,
                fail_open: false,
            })),
        }
    }

    pub fn with_ready(self, ready: ReadyState) -> Self {
        self.inner.lock().unwrap().ready_on_open = ready;
        self
    }

    /// `start()` stays silent; the test emits `Started` itself
    pub fn without_auto_start(self) -> Self {
        self.inner.lock().unwrap().auto_start = false;
        self
    }

    pub fn failing_start(self) -> Self {
        self.inner.lock().unwrap().fail_start = true;
        self
    }

    pub fn failing_open(self) -> Self {
        self.inner.lock().unwrap().fail_open = true;
        self
    }

    pub fn resources(&self) -> Vec<ResourceLog> {
        self.inner.lock().unwrap().resources.clone()
    }

    pub fn audible_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .resources
            .iter()
            .filter(|r| r.playing && !r.dropped)
            .count()
    }

    /// Deliver a notification as if resource `index` (open order) raised it
    pub fn emit(&self, index: usize, event: MediaEvent) {
        let mut inner = self.inner.lock().unwrap();
        if let MediaEvent::LoadedMetadata { duration } = event {
            inner.resources[index].duration = Some(duration);
        }
        inner.sinks[index].emit(event);
    }
}

pub struct ScriptedResource {
    index: usize,
    sink: EventSink,
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedResource {
    fn with_log<T>(&self, f: impl FnOnce(&mut ResourceLog) -> T) -> T {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner.resources[self.index])
    }
}

impl MediaBackend for ScriptedBackend {
    type Resource = ScriptedResource;

    fn open(&mut self, url: &str, events: EventSink) -> Result<ScriptedResource, MediaError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_open {
            return Err(MediaError::Unsupported(url.to_string()));
        }

        let index = inner.resources.len();
        let ready = inner.ready_on_open;
        inner.resources.push(ResourceLog {
            url: url.to_string(),
            ready,
            playing: false,
            dropped: false,
            position: 0.0,
            duration: None,
            volume: 1.0,
            muted: false,
            start_calls: 0,
        });
        inner.sinks.push(events.clone());

        Ok(ScriptedResource {
            index,
            sink: events,
            inner: Arc::clone(&self.inner),
        })
    }
}

impl MediaResource for ScriptedResource {
    fn ready_state(&self) -> ReadyState {
        self.with_log(|log| log.ready)
    }

    fn start(&mut self) {
        let (auto_start, fail_start) = {
            let inner = self.inner.lock().unwrap();
            (inner.auto_start, inner.fail_start)
        };
        self.with_log(|log| {
            log.start_calls += 1;
            log.playing = !fail_start;
        });

        if fail_start {
            self.sink.emit(MediaEvent::Failed(MediaError::Decode("bad header".into())));
        } else if auto_start {
            self.sink.emit(MediaEvent::Started);
        }
    }

    fn halt(&mut self) {
        self.with_log(|log| log.playing = false);
    }

    fn set_position(&mut self, seconds: f64) {
        self.with_log(|log| log.position = seconds);
    }

    fn set_volume(&mut self, volume: f32) {
        self.with_log(|log| log.volume = volume);
    }

    fn set_muted(&mut self, muted: bool) {
        self.with_log(|log| log.muted = muted);
    }

    fn position(&self) -> f64 {
        self.with_log(|log| log.position)
    }

    fn duration(&self) -> Option<f64> {
        self.with_log(|log| log.duration)
    }
}

impl Drop for ScriptedResource {
    fn drop(&mut self) {
        self.with_log(|log| {
            log.playing = false;
            log.dropped = true;
        });
    }
}
