use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    // UI Events
    Quit,
    Tick,
    Render,

    // Playback Events
    Play,
    Stop,
    TogglePlayPause,
    SkipForward,
    SkipBackward,

    // Volume Events
    VolumeUp,
    VolumeDown,
    ToggleMute,
}

pub struct EventHandler {
    event_sender: mpsc::UnboundedSender<AppEvent>,
    event_receiver: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        Self {
            event_sender,
            event_receiver,
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.event_sender.clone()
    }

    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.event_receiver.recv().await
    }

    /// crossterm's poll blocks, so the reader lives on the blocking pool.
    /// It winds down once the receiving side is dropped.
    pub fn spawn_input(&self) -> JoinHandle<Result<()>> {
        let sender = self.sender();
        tokio::task::spawn_blocking(move || read_terminal_events(sender))
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn read_terminal_events(sender: mpsc::UnboundedSender<AppEvent>) -> Result<()> {
    loop {
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(app_event) = key_to_app_event(key) {
                        if sender.send(app_event).is_err() {
                            return Ok(());
                        }
                    }
                }
                Event::Resize(_, _) => {
                    let _ = sender.send(AppEvent::Render);
                }
                _ => {}
            }
        }

        // periodic tick keeps the clock moving between state changes
        if sender.send(AppEvent::Tick).is_err() {
            return Ok(());
        }
    }
}

pub fn key_to_app_event(key: KeyEvent) -> Option<AppEvent> {
    match key.code {
        // Quit
        KeyCode::Char('q') | KeyCode::Esc => Some(AppEvent::Quit),

        // Playback controls
        KeyCode::Char(' ') => Some(AppEvent::TogglePlayPause),
        KeyCode::Char('p') | KeyCode::Enter => Some(AppEvent::Play),
        KeyCode::Char('s') => Some(AppEvent::Stop),
        KeyCode::Right | KeyCode::Char('l') => Some(AppEvent::SkipForward),
        KeyCode::Left | KeyCode::Char('h') => Some(AppEvent::SkipBackward),

        // Volume
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => Some(AppEvent::VolumeUp),
        KeyCode::Char('-') | KeyCode::Down => Some(AppEvent::VolumeDown),
        KeyCode::Char('m') => Some(AppEvent::ToggleMute),

        _ => None,
    }
}
