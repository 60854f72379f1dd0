use super::{AppEvent, EventHandler, TerminalManager};
use crate::audio::{format_time, PlaybackSession, PlaybackState, PlayerHandle, TrackRequest};
use anyhow::Result;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};
use tokio::sync::watch;
use tracing::debug;

const VOLUME_STEP: f32 = 0.1;

/// Bottom-of-the-page player: one track, transport keys, progress and volume
pub struct MiniPlayer {
    terminal: TerminalManager,
    events: EventHandler,
    player: PlayerHandle,
    state: watch::Receiver<PlaybackSession>,
    track: TrackRequest,
    should_quit: bool,
}

impl MiniPlayer {
    pub fn new(player: PlayerHandle, track: TrackRequest) -> Result<Self> {
        let terminal = TerminalManager::new()?;
        let state = player.subscribe();

        Ok(Self {
            terminal,
            events: EventHandler::new(),
            player,
            state,
            track,
            should_quit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.player.play(self.track.clone())?;
        let _input = self.events.spawn_input();

        while !self.should_quit {
            let session = self.state.borrow().clone();
            let track = &self.track;
            self.terminal.draw(|f| render(f, track, &session))?;

            tokio::select! {
                event = self.events.next_event() => match event {
                    Some(event) => self.handle_event(event, &session)?,
                    None => break,
                },
                changed = self.state.changed() => {
                    if changed.is_err() {
                        debug!("Player service went away");
                        break;
                    }
                }
            }
        }

        self.player.stop_track()?;
        Ok(())
    }

    fn handle_event(&mut self, event: AppEvent, session: &PlaybackSession) -> Result<()> {
        match event {
            AppEvent::Quit => self.should_quit = true,
            AppEvent::Tick | AppEvent::Render => {}
            AppEvent::Play => self.player.play(self.track.clone())?,
            AppEvent::Stop => self.player.stop_track()?,
            AppEvent::TogglePlayPause => {
                if session.has_session() {
                    self.player.toggle_play_pause()?;
                } else {
                    self.player.play(self.track.clone())?;
                }
            }
            AppEvent::SkipForward => self.player.skip_forward()?,
            AppEvent::SkipBackward => self.player.skip_backward()?,
            AppEvent::VolumeUp => self.player.set_volume(session.volume + VOLUME_STEP)?,
            AppEvent::VolumeDown => self.player.set_volume(session.volume - VOLUME_STEP)?,
            AppEvent::ToggleMute => self.player.toggle_mute()?,
        }

        Ok(())
    }
}

/// Draw the mini-player for `session`. `track` is what `p` will (re)start.
pub fn render(frame: &mut Frame, track: &TrackRequest, session: &PlaybackSession) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // now playing
            Constraint::Length(3), // progress
            Constraint::Length(3), // volume
            Constraint::Min(1),    // help
        ])
        .split(frame.area());

    let (status, title) = match session.track_title() {
        Some(title) => (status_symbol(session.state), title.to_string()),
        None => ("■", format!("Nothing playing - press p for {}", track.display_title())),
    };
    let now_playing = Paragraph::new(Line::from(vec![
        Span::styled(format!("{} ", status), Style::default().fg(Color::Cyan)),
        Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Preview"));
    frame.render_widget(now_playing, chunks[0]);

    let label = format!(
        "{} / {}",
        format_time(session.current_time),
        session.duration.map(format_time).unwrap_or_else(|| "--:--".to_string())
    );
    let progress = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::White).bg(Color::DarkGray))
        .ratio(session.progress())
        .label(label);
    frame.render_widget(progress, chunks[1]);

    let volume_text = if session.is_muted {
        "Muted".to_string()
    } else {
        format!("Volume {:>3}%", (session.volume * 100.0).round() as u32)
    };
    let volume = Paragraph::new(volume_text).block(Block::default().borders(Borders::ALL));
    frame.render_widget(volume, chunks[2]);

    let help = Paragraph::new("space play/pause  ←/→ 10s  +/- volume  m mute  s stop  q quit")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[3]);
}

fn status_symbol(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Idle => "■",
        PlaybackState::Loading => "…",
        PlaybackState::Playing => "▶",
        PlaybackState::Paused => "⏸",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NowPlaying;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen(track: &TrackRequest, session: &PlaybackSession) -> String {
        let mut terminal = Terminal::new(TestBackend::new(70, 12)).unwrap();
        terminal.draw(|f| render(f, track, session)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn track() -> TrackRequest {
        TrackRequest::new("9", "http://localhost:8000/static/demos/9.mp3", "Night Drive")
    }

    #[test]
    fn test_idle_screen_offers_the_track() {
        let text = screen(&track(), &PlaybackSession::new(0.7));
        assert!(text.contains("Nothing playing"));
        assert!(text.contains("Night Drive"));
        assert!(text.contains("Volume  70%"));
    }

    #[test]
    fn test_playing_screen_shows_progress_and_mute() {
        let mut session = PlaybackSession::new(0.7);
        session.now_playing = Some(NowPlaying::from(track()));
        session.state = PlaybackState::Playing;
        session.current_time = 65.0;
        session.duration = Some(120.0);
        session.is_muted = true;

        let text = screen(&track(), &session);
        assert!(text.contains("Night Drive"));
        assert!(text.contains("1:05 / 2:00"));
        assert!(text.contains("Muted"));
    }
}
