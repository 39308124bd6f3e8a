use std::{
  sync::{Arc, Weak},
  time::{Duration, Instant},
};

use log::debug;

use crate::buffer::SpectrumBuffer;
use crate::player::{PlaybackState, SpectrumSource};
use crate::render::{BarRenderer, Frame, Surface};

/// Host-supplied per-frame cadence the visualizer paints on.
pub trait FrameScheduler {
  fn start(&mut self);
  fn stop(&mut self);
  fn is_running(&self) -> bool;
  /// True at most once per frame interval while running.
  fn frame_due(&mut self) -> bool;
  /// How long the host may block before the next frame is due.
  fn until_next_frame(&self) -> Duration;
}

/// Wall-clock [`FrameScheduler`] at a fixed frame rate.
pub struct FrameTicker {
  interval: Duration,
  last_frame: Option<Instant>,
  running: bool,
}

impl FrameTicker {
  pub fn new(fps: u32) -> FrameTicker {
    FrameTicker {
      interval: Duration::from_secs(1) / fps.max(1),
      last_frame: None,
      running: false,
    }
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }
}

impl FrameScheduler for FrameTicker {
  fn start(&mut self) {
    self.running = true;
    self.last_frame = None;
  }

  fn stop(&mut self) {
    self.running = false;
  }

  fn is_running(&self) -> bool {
    self.running
  }

  fn frame_due(&mut self) -> bool {
    if !self.running {
      return false;
    }
    match self.last_frame {
      Some(last) if last.elapsed() < self.interval => false,
      _ => {
        self.last_frame = Some(Instant::now());
        true
      }
    }
  }

  fn until_next_frame(&self) -> Duration {
    match self.last_frame {
      Some(last) if self.running => self.interval.saturating_sub(last.elapsed()),
      Some(_) => self.interval,
      None => Duration::ZERO,
    }
  }
}

/// Association with the source currently feeding the buffer.
struct Binding {
  source: Weak<dyn SpectrumSource>,
  generation: u64,
}

/// Spectrum bar visualizer: a [`SpectrumBuffer`] fed by at most one
/// [`SpectrumSource`], drawn by a [`BarRenderer`] on the host's frame cadence.
pub struct Visualizer {
  buffer: Arc<SpectrumBuffer>,
  renderer: BarRenderer,
  scheduler: Box<dyn FrameScheduler>,
  binding: Option<Binding>,
  frame: Frame,
}

impl Visualizer {
  /// A visualizer with [`BAND_COUNT`](crate::BAND_COUNT) bands on a `width` x `height` canvas.
  pub fn create(width: f64, height: f64) -> Visualizer {
    Visualizer::with_bands(width, height, crate::BAND_COUNT)
  }

  pub fn with_bands(width: f64, height: f64, bands: usize) -> Visualizer {
    Visualizer::with_parts(
      BarRenderer::new(width, height, bands),
      Box::new(FrameTicker::new(crate::DEFAULT_FPS)),
    )
  }

  /// Builds from a ready renderer and scheduler. The scheduler is started.
  pub fn with_parts(renderer: BarRenderer, mut scheduler: Box<dyn FrameScheduler>) -> Visualizer {
    let (width, height) = renderer.size();
    let bands = renderer.decayed().len();
    scheduler.start();
    Visualizer {
      buffer: Arc::new(SpectrumBuffer::new(bands)),
      renderer,
      scheduler,
      binding: None,
      frame: Frame::empty(width, height),
    }
  }

  pub fn buffer(&self) -> &Arc<SpectrumBuffer> {
    &self.buffer
  }

  pub fn is_playing(&self) -> bool {
    self.buffer.is_playing()
  }

  pub fn is_attached(&self) -> bool {
    self.binding.is_some()
  }

  /// The most recently computed frame.
  pub fn frame(&self) -> &Frame {
    &self.frame
  }

  pub fn until_next_frame(&self) -> Duration {
    self.scheduler.until_next_frame()
  }

  /// Binds to `source`, releasing any previous binding first. `None` only releases.
  pub fn attach(&mut self, source: Option<&Arc<dyn SpectrumSource>>) {
    self.release();
    let source = match source {
      Some(source) => source,
      None => return,
    };

    let generation = self.buffer.rebind();
    source.set_spectrum_bands(self.buffer.bands());
    source.set_spectrum_interval(Duration::from_millis(crate::SPECTRUM_INTERVAL_MS));
    let buffer = Arc::clone(&self.buffer);
    source.set_spectrum_listener(Some(Box::new(
      move |_timestamp: f64, _duration: f64, magnitudes: &[f32], phases: &[f32]| {
        buffer.update_bound(generation, magnitudes, phases);
      },
    )));
    self.binding = Some(Binding { source: Arc::downgrade(source), generation });
    debug!("visualizer attached, generation {}", generation);
  }

  /// Unbinds from the current source, if any, and silences every band.
  pub fn detach(&mut self) {
    self.release();
    self.buffer.reset();
  }

  pub fn set_playing(&mut self, playing: bool) {
    self.buffer.set_playing(playing);
  }

  /// Applies a playback-state notification from the attached source.
  pub fn on_playback_state(&mut self, state: PlaybackState) {
    match state {
      PlaybackState::Playing => (),
      PlaybackState::Paused => self.set_playing(false),
      PlaybackState::Stopped => self.detach(),
    }
  }

  /// Stops the frame cadence and detaches. Later renders only paint the background.
  pub fn dispose(&mut self) {
    self.scheduler.stop();
    self.detach();
    self.frame = Frame::empty(self.frame.width, self.frame.height);
  }

  /// Advances one frame and paints it.
  pub fn render<S: Surface>(&mut self, surface: &mut S) -> &Frame {
    if self.scheduler.is_running() {
      self.frame = self.renderer.next_frame(&self.buffer);
    }
    self.renderer.paint(&self.frame, surface);
    &self.frame
  }

  /// Paints on the scheduler's cadence: a new frame when one is due, the last one otherwise.
  pub fn on_frame<S: Surface>(&mut self, surface: &mut S) {
    if self.scheduler.frame_due() {
      self.frame = self.renderer.next_frame(&self.buffer);
    }
    self.renderer.paint(&self.frame, surface);
  }

  fn release(&mut self) {
    if let Some(binding) = self.binding.take() {
      if let Some(source) = binding.source.upgrade() {
        source.set_spectrum_listener(None);
      }
      self.buffer.rebind();
      debug!("visualizer released generation {}", binding.generation);
    }
  }
}

impl Drop for Visualizer {
  fn drop(&mut self) {
    self.release();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ticker_is_due_once_per_interval() {
    let mut ticker = FrameTicker::new(10);
    assert!(!ticker.frame_due());
    ticker.start();
    assert_eq!(ticker.until_next_frame(), Duration::ZERO);
    assert!(ticker.frame_due());
    assert!(!ticker.frame_due());
    assert!(ticker.until_next_frame() <= ticker.interval());
    std::thread::sleep(ticker.interval());
    assert!(ticker.frame_due());
    ticker.stop();
    assert!(!ticker.frame_due());
    assert!(!ticker.is_running());
  }

  #[test]
  fn zero_fps_is_clamped() {
    assert_eq!(FrameTicker::new(0).interval(), Duration::from_secs(1));
  }
}
