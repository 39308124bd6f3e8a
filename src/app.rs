use crossterm::{
  event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
  execute,
  terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use rodio::{OutputStream, OutputStreamHandle};

use crate::player::{PlaybackState, Player, SpectrumSource};
use crate::render::BarRenderer;
use crate::songs::{get_search_dir, load_song_list, to_song_entries, ScanLimits};
use crate::ui::{add_songs_popup, get_ui_color, main_ui, NowPlaying};
use crate::visualizer::{FrameTicker, Visualizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{error::Error, io};
use tui::{
  backend::{Backend, CrosstermBackend},
  Terminal,
};

/// Options the UI loop runs with.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
  pub color_by_song: bool,
  pub limits: ScanLimits,
  pub fps: u32,
}

/// Sets up the terminal, and runs the UI over `songs` (popped from the back).
pub fn run(songs: Vec<PathBuf>, settings: Settings) -> Result<(), Box<dyn Error>> {
  let (_stream, stream_handle) = OutputStream::try_default()?;

  // setup terminal
  enable_raw_mode()?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend)?;

  // run application
  let res = run_app(&mut terminal, stream_handle, songs, settings);

  // restore terminal
  disable_raw_mode()?;
  execute!(
    terminal.backend_mut(),
    LeaveAlternateScreen,
    DisableMouseCapture
  )?;
  terminal.show_cursor()?;

  res
}

/// Opens `song` and binds the visualizer to it.
fn start_song(
  song: &Path,
  stream_handle: &OutputStreamHandle,
  visualizer: &mut Visualizer,
) -> Result<Arc<Player>, Box<dyn Error>> {
  let player = Arc::new(Player::open(song, stream_handle)?);
  let source: Arc<dyn SpectrumSource> = player.clone();
  visualizer.attach(Some(&source));
  Ok(player)
}

/// Runs the UI loop, assuming the terminal has been prepared.
fn run_app<B: Backend>(
  terminal: &mut Terminal<B>,
  stream_handle: OutputStreamHandle,
  mut songs: Vec<PathBuf>,
  settings: Settings,
) -> Result<(), Box<dyn std::error::Error>> {
  let mut visualizer = Visualizer::with_parts(
    BarRenderer::new(crate::CANVAS_WIDTH, crate::CANVAS_HEIGHT, crate::BAND_COUNT),
    Box::new(FrameTicker::new(settings.fps)),
  );
  let mut history: Vec<PathBuf> = vec![];

  while let Some(song) = songs.pop() {
    let mut player = match start_song(&song, &stream_handle, &mut visualizer) {
      Ok(player) => player,
      Err(e) => {
        warn!("could not load song, skipping...: {}", e);
        continue; // skip to next song
      }
    };

    let song_name = song
      .file_name()
      .and_then(|n| n.to_str())
      .unwrap_or("<unnamed>")
      .to_string();
    let ui_color = get_ui_color(&song_name, settings.color_by_song);
    let up_next = to_song_entries(&songs, true);
    let played = to_song_entries(&history, false);
    'song: loop {
      let now = NowPlaying {
        song_name: &song_name,
        state: player.state(),
        position: player.position(),
        total: player.total_duration(),
        progress: player.progress(),
      };
      terminal.draw(|f| {
        main_ui(
          f,
          &mut visualizer,
          &now,
          &up_next,
          &played,
          ui_color,
        )
      })?;

      let timeout = visualizer.until_next_frame();

      if crossterm::event::poll(timeout)? {
        if let Event::Key(key) = event::read()? {
          match key.code {
            KeyCode::Char('q') => {
              visualizer.dispose();
              return Ok(());
            }
            KeyCode::Char('n') => {
              history.push(song);
              break 'song;
            }
            KeyCode::Char('b') => {
              songs.push(song);
              if let Some(s) = history.pop() {
                songs.push(s);
              }
              break 'song;
            }
            KeyCode::Char('p') => match player.state() {
              PlaybackState::Playing => visualizer.on_playback_state(player.pause()),
              PlaybackState::Paused => visualizer.on_playback_state(player.play()),
              PlaybackState::Stopped => {
                player = start_song(&song, &stream_handle, &mut visualizer)?;
              }
            },
            KeyCode::Char('x') => {
              visualizer.on_playback_state(player.stop());
              info!("stopped {}", song_name);
            }
            KeyCode::Char('r') => {
              player.stop();
              player = start_song(&song, &stream_handle, &mut visualizer)?;
            }
            KeyCode::Char('a') => {
              visualizer.on_playback_state(player.pause());
              let mut buf = get_search_dir();
              'add_songs: loop {
                terminal.draw(|f| add_songs_popup(f, &buf, ui_color))?;
                if let Event::Key(k) = event::read()? {
                  match k.code {
                    KeyCode::Esc => {
                      visualizer.on_playback_state(player.play());
                      break 'add_songs;
                    }
                    KeyCode::Enter => {
                      let mut new_song_list = load_song_list(PathBuf::from(&buf), settings.limits)?;
                      new_song_list.append(&mut songs);
                      songs = new_song_list;
                      songs.push(song);
                      break 'song;
                    }
                    KeyCode::Backspace => {
                      buf.pop();
                    }
                    KeyCode::Char(c) => {
                      buf.push(c);
                    }
                    _ => (),
                  }
                }
              }
            }
            KeyCode::Char('s') => {
              songs.push(song);
              fastrand::shuffle(&mut songs);
              break 'song;
            }
            _ => (),
          }
        }
      }
      if player.state() == PlaybackState::Playing && player.is_finished() {
        history.push(song);
        break 'song;
      }
    }
    visualizer.on_playback_state(PlaybackState::Stopped);
  }
  visualizer.dispose();
  Ok(())
}
