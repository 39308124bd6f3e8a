use std::{
  fs::File,
  io::BufReader,
  path::{Path, PathBuf},
  sync::{
    atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering},
    Arc, Mutex,
  },
  thread::{self, JoinHandle},
  time::{Duration, Instant},
};

use log::{debug, info, warn};
use rodio::{OutputStreamHandle, Sink, Source};

use crate::songs::has_supported_extension;
use crate::spectrum::Analyzer;
use crate::PlayerError;

/// Receives `(timestamp, duration, magnitudes, phases)` once per spectrum interval.
/// Times are in seconds, magnitudes in dB, phases in radians.
pub type SpectrumListener = Box<dyn FnMut(f64, f64, &[f32], &[f32]) + Send + 'static>;

/// Coarse state of a playback engine, as forwarded to the visualizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
  Playing,
  Paused,
  Stopped,
}

impl PlaybackState {
  fn from_u8(v: u8) -> PlaybackState {
    match v {
      0 => PlaybackState::Playing,
      1 => PlaybackState::Paused,
      _ => PlaybackState::Stopped,
    }
  }

  fn as_u8(self) -> u8 {
    match self {
      PlaybackState::Playing => 0,
      PlaybackState::Paused => 1,
      PlaybackState::Stopped => 2,
    }
  }
}

/// A playback engine that publishes spectrum samples.
pub trait SpectrumSource {
  fn set_spectrum_bands(&self, bands: usize);
  fn set_spectrum_interval(&self, interval: Duration);
  /// Replaces the listener. Once this returns, the previous listener is never called again.
  fn set_spectrum_listener(&self, listener: Option<SpectrumListener>);
}

/// State shared between a [`Player`] and its analysis thread.
struct Shared {
  bands: AtomicUsize,
  interval_ms: AtomicU64,
  state: AtomicU8,
  position_ms: AtomicU64,
  shutdown: AtomicBool,
  listener: Mutex<Option<SpectrumListener>>,
}

impl Shared {
  fn new(bands: usize, interval_ms: u64, state: PlaybackState) -> Shared {
    Shared {
      bands: AtomicUsize::new(bands),
      interval_ms: AtomicU64::new(interval_ms),
      state: AtomicU8::new(state.as_u8()),
      position_ms: AtomicU64::new(0),
      shutdown: AtomicBool::new(false),
      listener: Mutex::new(None),
    }
  }

  fn state(&self) -> PlaybackState {
    PlaybackState::from_u8(self.state.load(Ordering::SeqCst))
  }

  fn set_state(&self, state: PlaybackState) {
    self.state.store(state.as_u8(), Ordering::SeqCst)
  }

  fn interval(&self) -> Duration {
    Duration::from_millis(self.interval_ms.load(Ordering::Relaxed).max(1))
  }

  fn notify(&self, timestamp: f64, duration: f64, magnitudes: &[f32], phases: &[f32]) {
    // a poisoned lock only means an earlier listener panicked; keep publishing
    let mut listener = self.listener.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(listener) = listener.as_mut() {
      listener(timestamp, duration, magnitudes, phases);
    }
  }
}

/// Plays one song through rodio and analyses it on a worker thread.
pub struct Player {
  path: PathBuf,
  sink: Sink,
  total_duration: Option<Duration>,
  shared: Arc<Shared>,
  worker: Option<JoinHandle<()>>,
}

impl Player {
  /// Starts playing `song` on `stream_handle`.
  pub fn open(song: &Path, stream_handle: &OutputStreamHandle) -> Result<Player, PlayerError> {
    if !has_supported_extension(song) {
      return Err(PlayerError::UnsupportedFormat(song.to_path_buf()));
    }
    let sink = stream_handle.play_once(BufReader::new(File::open(song)?))?;
    let source = crate::get_source::<f32, _>(song)?;
    let total_duration = source.total_duration();
    let analyzer = Analyzer::new(source);

    let shared = Arc::new(Shared::new(
      crate::BAND_COUNT,
      crate::SPECTRUM_INTERVAL_MS,
      PlaybackState::Playing,
    ));
    let worker = {
      let shared = Arc::clone(&shared);
      thread::Builder::new()
        .name("spectrum".into())
        .spawn(move || analyze(analyzer, shared))?
    };
    info!("playing {}", song.display());

    Ok(Player {
      path: song.to_path_buf(),
      sink,
      total_duration,
      shared,
      worker: Some(worker),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn state(&self) -> PlaybackState {
    self.shared.state()
  }

  pub fn play(&self) -> PlaybackState {
    if self.state() != PlaybackState::Stopped {
      self.sink.play();
      self.shared.set_state(PlaybackState::Playing);
    }
    self.state()
  }

  pub fn pause(&self) -> PlaybackState {
    if self.state() == PlaybackState::Playing {
      self.sink.pause();
      self.shared.set_state(PlaybackState::Paused);
    }
    self.state()
  }

  /// Stops for good; a stopped player cannot be resumed.
  pub fn stop(&self) -> PlaybackState {
    self.sink.stop();
    self.shared.set_state(PlaybackState::Stopped);
    self.state()
  }

  /// True once the song has played to the end (or was stopped).
  pub fn is_finished(&self) -> bool {
    self.sink.empty()
  }

  /// Elapsed playback time, as tracked by the analysis thread.
  pub fn position(&self) -> Duration {
    Duration::from_millis(self.shared.position_ms.load(Ordering::Relaxed))
  }

  pub fn total_duration(&self) -> Option<Duration> {
    self.total_duration
  }

  /// Fraction of the song played so far, if its length is known.
  pub fn progress(&self) -> Option<f64> {
    self
      .total_duration
      .filter(|t| !t.is_zero())
      .map(|t| (self.position().as_secs_f64() / t.as_secs_f64()).clamp(0.0, 1.0))
  }
}

impl SpectrumSource for Player {
  fn set_spectrum_bands(&self, bands: usize) {
    self.shared.bands.store(bands, Ordering::Relaxed);
  }

  fn set_spectrum_interval(&self, interval: Duration) {
    self.shared.interval_ms.store(interval.as_millis() as u64, Ordering::Relaxed);
  }

  fn set_spectrum_listener(&self, listener: Option<SpectrumListener>) {
    let mut slot = self.shared.listener.lock().unwrap_or_else(|e| e.into_inner());
    *slot = listener;
  }
}

impl Drop for Player {
  fn drop(&mut self) {
    self.shared.shutdown.store(true, Ordering::SeqCst);
    self.set_spectrum_listener(None);
    self.sink.stop();
    if let Some(worker) = self.worker.take() {
      if worker.join().is_err() {
        warn!("spectrum thread for {} panicked", self.path.display());
      }
    }
    debug!("released {}", self.path.display());
  }
}

/// Analysis loop: one spectrum sample per interval while playing.
fn analyze(mut analyzer: Analyzer, shared: Arc<Shared>) {
  let mut last_tick = Instant::now();
  while !shared.shutdown.load(Ordering::SeqCst) {
    let interval = shared.interval();
    thread::sleep(interval.saturating_sub(last_tick.elapsed()));
    let elapsed = last_tick.elapsed();
    last_tick = Instant::now();

    if shared.state() != PlaybackState::Playing {
      continue;
    }
    match analyzer.sample_audio(elapsed, shared.bands.load(Ordering::Relaxed)) {
      Ok(magnitudes) => {
        let position = shared.position_ms.fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
        let phases = vec![0.0; magnitudes.len()];
        shared.notify(
          position as f64 / 1000.0,
          interval.as_secs_f64(),
          &magnitudes,
          &phases,
        );
      }
      Err(e) => warn!("skipping spectrum sample: {}", e),
    }
  }
}
