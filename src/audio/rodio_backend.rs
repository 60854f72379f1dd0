// Real audio output through rodio. Each resource owns its own paused Sink,
// loads the source in the background and reports progress on a ticker.

use super::media::{EventSink, MediaBackend, MediaError, MediaEvent, MediaResource, ReadyState};
use rodio::{Decoder, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

pub struct RodioBackend {
    stream_handle: OutputStreamHandle,
    runtime: Handle,
    progress_interval: Duration,
}

impl RodioBackend {
    /// Must be called from inside a tokio runtime; loaders are spawned on it.
    pub fn new(stream_handle: OutputStreamHandle, progress_interval: Duration) -> Result<Self, MediaError> {
        let runtime = Handle::try_current().map_err(|e| MediaError::Output(e.to_string()))?;

        Ok(Self {
            stream_handle,
            runtime,
            progress_interval,
        })
    }
}

impl MediaBackend for RodioBackend {
    type Resource = RodioResource;

    fn open(&mut self, url: &str, events: EventSink) -> Result<RodioResource, MediaError> {
        let sink = Sink::try_new(&self.stream_handle).map_err(|e| MediaError::Output(e.to_string()))?;
        sink.pause();

        let shared = Arc::new(Shared {
            sink,
            state: Mutex::new(LoadState::default()),
        });

        debug!("Opening {} as {}", url, events.id());
        self.runtime.spawn(load_and_watch(
            url.to_string(),
            Arc::clone(&shared),
            events.clone(),
            self.progress_interval,
        ));

        Ok(RodioResource {
            shared,
            events,
            runtime: self.runtime.clone(),
        })
    }
}

struct Shared {
    sink: Sink,
    state: Mutex<LoadState>,
}

#[derive(Debug)]
struct LoadState {
    ready: ReadyState,
    duration: Option<f64>,
    play_requested: bool,
    pending_position: Option<f64>,
    volume: f32,
    muted: bool,
    released: bool,
}

impl Default for LoadState {
    fn default() -> Self {
        Self {
            ready: ReadyState::Nothing,
            duration: None,
            play_requested: false,
            pending_position: None,
            volume: 1.0,
            muted: false,
            released: false,
        }
    }
}

impl LoadState {
    fn output_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

// a poisoned lock only means a panicking loader; the data is still usable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RodioResource {
    shared: Arc<Shared>,
    events: EventSink,
    runtime: Handle,
}

impl MediaResource for RodioResource {
    fn ready_state(&self) -> ReadyState {
        lock(&self.shared.state).ready
    }

    fn start(&mut self) {
        let mut state = lock(&self.shared.state);
        if state.ready.can_seek() {
            self.shared.sink.play();
            drop(state);
            self.events.emit(MediaEvent::Started);
        } else {
            // the loader starts it once the data is in
            state.play_requested = true;
        }
    }

    fn halt(&mut self) {
        lock(&self.shared.state).play_requested = false;
        self.shared.sink.pause();
    }

    fn set_position(&mut self, seconds: f64) {
        let seconds = seconds.max(0.0);
        let mut state = lock(&self.shared.state);
        if !state.ready.can_seek() {
            state.pending_position = Some(seconds);
            return;
        }
        drop(state);

        self.runtime.spawn(seek_off_runtime(Arc::clone(&self.shared), seconds));
    }

    fn set_volume(&mut self, volume: f32) {
        let mut state = lock(&self.shared.state);
        state.volume = volume.clamp(0.0, 1.0);
        self.shared.sink.set_volume(state.output_volume());
    }

    fn set_muted(&mut self, muted: bool) {
        let mut state = lock(&self.shared.state);
        state.muted = muted;
        self.shared.sink.set_volume(state.output_volume());
    }

    fn position(&self) -> f64 {
        self.shared.sink.get_pos().as_secs_f64()
    }

    fn duration(&self) -> Option<f64> {
        lock(&self.shared.state).duration
    }
}

impl Drop for RodioResource {
    fn drop(&mut self) {
        lock(&self.shared.state).released = true;
        self.shared.sink.stop();
    }
}

async fn load_and_watch(url: String, shared: Arc<Shared>, events: EventSink, progress_interval: Duration) {
    let bytes = match fetch(&url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            events.emit(MediaEvent::Failed(e));
            return;
        }
    };

    let (source, duration) = match decode(bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            events.emit(MediaEvent::Failed(e));
            return;
        }
    };

    let deferred = {
        let mut state = lock(&shared.state);
        if state.released {
            return;
        }

        shared.sink.append(source);
        shared.sink.set_volume(state.output_volume());
        state.duration = duration;
        state.pending_position.take()
    };
    if let Some(position) = deferred {
        seek_off_runtime(Arc::clone(&shared), position).await;
    }

    let (start_now, late_seek) = {
        let mut state = lock(&shared.state);
        if state.released {
            return;
        }

        state.ready = ReadyState::EnoughData;
        if state.play_requested {
            shared.sink.play();
        }
        // a seek that arrived while the deferred one was running
        (state.play_requested, state.pending_position.take())
    };
    if let Some(position) = late_seek {
        seek_off_runtime(Arc::clone(&shared), position).await;
    }

    if let Some(duration) = duration {
        events.emit(MediaEvent::LoadedMetadata { duration });
    }
    events.emit(MediaEvent::CanPlay);
    events.emit(MediaEvent::CanPlayThrough);
    if start_now {
        events.emit(MediaEvent::Started);
    }

    let mut ticker = tokio::time::interval(progress_interval);
    loop {
        ticker.tick().await;

        let update = {
            if lock(&shared.state).released {
                break;
            }
            let sink = &shared.sink;
            if sink.empty() {
                MediaEvent::Ended
            } else if sink.is_paused() {
                continue;
            } else {
                MediaEvent::TimeUpdate {
                    position: sink.get_pos().as_secs_f64(),
                }
            }
        };

        let ended = update == MediaEvent::Ended;
        if !events.emit(update) || ended {
            break;
        }
    }

    debug!("Progress ticker for {} finished", events.id());
}

/// `Sink::try_seek` waits for the mixer to pick the order up, so it never runs
/// on a runtime worker.
async fn seek_off_runtime(shared: Arc<Shared>, seconds: f64) {
    let result = tokio::task::spawn_blocking(move || {
        shared
            .sink
            .try_seek(Duration::from_secs_f64(seconds))
            .map_err(|e| e.to_string())
    })
    .await;

    match result {
        Ok(Ok(())) => debug!("Seeked to {:.2}s", seconds),
        Ok(Err(e)) => warn!("Seek to {:.2}s failed: {}", seconds, e),
        Err(e) => warn!("Seek task to {:.2}s did not finish: {}", seconds, e),
    }
}

async fn fetch(url: &str) -> Result<Vec<u8>, MediaError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return fetch_http(url).await;
    }

    let path = url.strip_prefix("file://").unwrap_or(url).to_string();
    tokio::task::spawn_blocking(move || std::fs::read(&path).map_err(|e| MediaError::Network(format!("{}: {}", path, e))))
        .await
        .map_err(|e| MediaError::Network(e.to_string()))?
}

#[cfg(feature = "http")]
async fn fetch_http(url: &str) -> Result<Vec<u8>, MediaError> {
    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| MediaError::Network(e.to_string()))?;
    let body = response.bytes().await.map_err(|e| MediaError::Network(e.to_string()))?;
    Ok(body.to_vec())
}

#[cfg(not(feature = "http"))]
async fn fetch_http(url: &str) -> Result<Vec<u8>, MediaError> {
    Err(MediaError::Unsupported(format!("{} (built without the `http` feature)", url)))
}

fn decode(bytes: Vec<u8>) -> Result<(Decoder<Cursor<Vec<u8>>>, Option<f64>), MediaError> {
    let source = Decoder::new(Cursor::new(bytes)).map_err(|e| MediaError::Decode(e.to_string()))?;
    let duration = source.total_duration().map(|d| d.as_secs_f64());
    Ok((source, duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::media::ResourceId;
    use std::io::Write;
    use tokio::sync::mpsc;

    fn idle_shared() -> (Arc<Shared>, rodio::queue::SourcesQueueOutput<f32>) {
        let (sink, queue) = Sink::new_idle();
        let shared = Arc::new(Shared {
            sink,
            state: Mutex::new(LoadState::default()),
        });
        (shared, queue)
    }

    #[tokio::test]
    async fn test_seek_runs_without_the_state_lock() {
        let (shared, _queue) = idle_shared();

        // the loader may still be holding state when a seek goes out
        let _state = lock(&shared.state);
        seek_off_runtime(Arc::clone(&shared), 5.0).await;
    }

    #[tokio::test]
    async fn test_position_before_load_is_deferred() {
        let (shared, _queue) = idle_shared();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut resource = RodioResource {
            shared: Arc::clone(&shared),
            events: EventSink::new(ResourceId(1), tx),
            runtime: Handle::current(),
        };

        resource.set_position(12.0);
        assert_eq!(lock(&shared.state).pending_position, Some(12.0));

        drop(resource);
        assert!(lock(&shared.state).released);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode(b"definitely not an mp3".to_vec());
        assert!(matches!(result, Err(MediaError::Decode(_))));
    }

    #[tokio::test]
    async fn test_fetch_reads_local_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ID3 fake").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        assert_eq!(fetch(&path).await.unwrap(), b"ID3 fake".to_vec());
        assert_eq!(fetch(&format!("file://{}", path)).await.unwrap(), b"ID3 fake".to_vec());
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_network_error() {
        let result = fetch("/definitely/not/here.mp3").await;
        assert!(matches!(result, Err(MediaError::Network(_))));
    }

    #[cfg(not(feature = "http"))]
    #[tokio::test]
    async fn test_http_needs_feature() {
        let result = fetch("http://localhost:8000/static/demos/a.mp3").await;
        assert!(matches!(result, Err(MediaError::Unsupported(_))));
    }
}
