use std::{collections::hash_map::DefaultHasher, hash::Hasher, time::Duration};

use tui::{
  backend::Backend,
  buffer::Buffer,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  widgets::{self, Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Widget},
  Frame,
};

use crate::player::PlaybackState;
use crate::render::{RectF, Rgb, Surface};
use crate::songs::format_duration;
use crate::visualizer::Visualizer;

/// What the now-playing panel shows about the current song.
pub struct NowPlaying<'a> {
  pub song_name: &'a str,
  pub state: PlaybackState,
  pub position: Duration,
  pub total: Option<Duration>,
  pub progress: Option<f64>,
}

/// Paints canvas coordinates onto terminal cells, one cell per canvas-space
/// rectangle of `canvas / area` size. Colours go into cell backgrounds.
pub struct TerminalSurface<'a> {
  buf: &'a mut Buffer,
  area: Rect,
  scale_x: f64,
  scale_y: f64,
}

impl<'a> TerminalSurface<'a> {
  pub fn new(buf: &'a mut Buffer, area: Rect, canvas_width: f64, canvas_height: f64) -> TerminalSurface<'a> {
    TerminalSurface {
      buf,
      area,
      scale_x: area.width as f64 / canvas_width.max(1.0),
      scale_y: area.height as f64 / canvas_height.max(1.0),
    }
  }

  /// Cells whose centre lies in `[start, start + len)` along one axis, in area-relative indices.
  fn covered(start: f64, len: f64, scale: f64, cells: u16) -> std::ops::Range<u16> {
    let first = (start * scale - 0.5).ceil().max(0.0);
    let last = ((start + len) * scale - 0.5).ceil().max(0.0);
    (first.min(cells as f64) as u16)..(last.min(cells as f64) as u16)
  }
}

fn blend(under: Color, over: Rgb, alpha: f32) -> Color {
  let (r, g, b) = match under {
    Color::Rgb(r, g, b) => (r, g, b),
    _ => (0, 0, 0),
  };
  let under = Rgb(r, g, b);
  let Rgb(r, g, b) = under.interpolate(over, alpha as f64);
  Color::Rgb(r, g, b)
}

impl<'a> Surface for TerminalSurface<'a> {
  fn fill_rect(&mut self, rect: RectF, color: Rgb, alpha: f32) {
    let xs = Self::covered(rect.x, rect.width, self.scale_x, self.area.width);
    let ys = Self::covered(rect.y, rect.height, self.scale_y, self.area.height);
    for y in ys {
      for x in xs.clone() {
        let cell = self.buf.get_mut(self.area.x + x, self.area.y + y);
        let bg = if alpha >= 1.0 {
          Color::Rgb(color.0, color.1, color.2)
        } else {
          blend(cell.bg, color, alpha)
        };
        cell.set_symbol(" ").set_bg(bg);
      }
    }
  }
}

/// The bar display, painted on the visualizer's own frame cadence.
pub struct SpectrumWidget<'a> {
  visualizer: &'a mut Visualizer,
}

impl<'a> SpectrumWidget<'a> {
  pub fn new(visualizer: &'a mut Visualizer) -> SpectrumWidget<'a> {
    SpectrumWidget { visualizer }
  }
}

impl<'a> Widget for SpectrumWidget<'a> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    let (width, height) = (self.visualizer.frame().width, self.visualizer.frame().height);
    let mut surface = TerminalSurface::new(buf, area, width, height);
    self.visualizer.on_frame(&mut surface);
  }
}

/// The main UI that the user sees.
pub fn main_ui<B: Backend>(
  f: &mut Frame<B>,
  visualizer: &mut Visualizer,
  now: &NowPlaying,
  up_next: &[String],
  history: &[String],
  ui_color: Color,
) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .margin(0)
    .constraints([Constraint::Min(10), Constraint::Percentage(70)].as_ref())
    .split(f.size());

  let visualizer_chunk = Layout::default()
    .direction(Direction::Horizontal)
    .margin(1)
    .constraints(
      [
        Constraint::Min((crate::BAND_COUNT * 2) as u16),
        Constraint::Percentage(60),
      ]
      .as_ref(),
    )
    .split(chunks[0]);

  let now_playing_chunk = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Min(3), Constraint::Length(3)].as_ref())
    .split(visualizer_chunk[1]);

  let lists_chunks = Layout::default()
    .direction(Direction::Horizontal)
    .margin(1)
    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
    .split(chunks[1]);

  let spectrum_block = Block::default()
    .title("visutunes")
    .borders(Borders::ALL)
    .style(Style::default().fg(ui_color));
  let spectrum_area = spectrum_block.inner(visualizer_chunk[0]);
  f.render_widget(spectrum_block, visualizer_chunk[0]);
  f.render_widget(SpectrumWidget::new(visualizer), spectrum_area);

  f.render_widget(now_playing(now, ui_color), now_playing_chunk[0]);
  f.render_widget(progress(now, ui_color), now_playing_chunk[1]);
  f.render_widget(up_next_list(up_next, ui_color), lists_chunks[0]);
  f.render_widget(history_list(history, ui_color), lists_chunks[1]);
}

fn state_marker(state: PlaybackState) -> &'static str {
  match state {
    PlaybackState::Playing => "▶",
    PlaybackState::Paused => "⏸",
    PlaybackState::Stopped => "■",
  }
}

/// Displays info for the currently playing song, as well as controls.
fn now_playing<'a>(now: &NowPlaying, ui_color: Color) -> Paragraph<'a> {
  Paragraph::new(format!(
    "{} {}\n\nq: quit\nn: next\nb: back\np: play/pause\nx: stop\nr: restart song\na: add songs\ns: shuffle",
    state_marker(now.state),
    now.song_name
  ))
  .block(Block::default().title("now-playing").borders(Borders::ALL))
  .style(Style::default().fg(ui_color))
}

/// Elapsed / total time of the current song.
pub fn time_label(position: Duration, total: Option<Duration>) -> String {
  format!(
    "{} / {}",
    format_duration(position),
    total.map(format_duration).unwrap_or_else(|| "--:--".to_string())
  )
}

fn progress<'a>(now: &NowPlaying, ui_color: Color) -> Gauge<'a> {
  Gauge::default()
    .block(Block::default().borders(Borders::ALL))
    .gauge_style(Style::default().fg(ui_color))
    .ratio(now.progress.unwrap_or(0.0).clamp(0.0, 1.0))
    .label(time_label(now.position, now.total))
}

/// Displays the list of upcoming songs with their size and folder.
fn up_next_list<'a>(up_next: &'a [String], ui_color: Color) -> List<'a> {
  List::new(
    up_next
      .iter()
      .map(|s| ListItem::new(s.as_str()))
      .collect::<Vec<ListItem>>(),
  )
  .block(Block::default().title("up-next").borders(Borders::ALL))
  .style(Style::default().fg(ui_color))
  .highlight_style(Style::default().add_modifier(Modifier::ITALIC))
}

/// Displays the list of songs which have already played.
fn history_list<'a>(history: &'a [String], ui_color: Color) -> List<'a> {
  List::new(
    history
      .iter()
      .map(|s| ListItem::new(s.as_str()))
      .collect::<Vec<ListItem>>(),
  )
  .block(Block::default().title("history").borders(Borders::ALL))
  .style(Style::default().fg(ui_color))
  .highlight_style(Style::default().add_modifier(Modifier::ITALIC))
}

/// Creates a rectangle centered in the middle of the terminal.
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
  let popup_layout = Layout::default()
    .direction(Direction::Vertical)
    .constraints(
      [
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
      ]
      .as_ref(),
    )
    .split(r);

  Layout::default()
    .direction(Direction::Horizontal)
    .constraints(
      [
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
      ]
      .as_ref(),
    )
    .split(popup_layout[1])[1]
}

/// Displays the popup which lets users add more songs.
pub fn add_songs_popup<B: Backend>(f: &mut Frame<B>, text: &str, ui_color: Color) {
  let search_input = widgets::Paragraph::new(text)
    .block(
      Block::default()
        .title("enter-path-to-songs")
        .borders(Borders::ALL),
    )
    .style(Style::default().fg(ui_color));
  let area = centered_rect(60, 20, f.size());

  f.render_widget(Clear, area);
  f.render_widget(search_input, area);
}

/// Gets the color of the UI.
/// If by_song is set it chooses a color by computing the hash of the song's name.
/// Otherwise, it just uses yellow.
pub fn get_ui_color(song_name: &str, by_song: bool) -> Color {
  if by_song {
    let mut s = DefaultHasher::new();
    s.write(song_name.as_bytes());
    Color::Indexed((s.finish() % 15) as u8 + 1)
  } else {
    Color::Yellow
  }
}
