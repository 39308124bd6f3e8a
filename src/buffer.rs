use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Lowest magnitude the visualizer distinguishes; anything at or below it draws as an empty bar.
pub const SILENCE_DB: f32 = -60.0;
/// One-shot damping applied to every band when playback pauses.
pub const PAUSE_DAMPING: f32 = 0.9;

/// Scales how far `db` sits above the silence floor by `factor`.
///
/// Magnitudes are negative decibels, so a plain multiplication would move them
/// towards 0 dB and make bars grow. Damping is applied to the distance above the
/// floor instead, which is what the normalized bar height is proportional to.
pub fn damp_toward_floor(db: f32, factor: f32) -> f32 {
  SILENCE_DB + (db - SILENCE_DB) * factor
}

/// Fixed-size slot of `f32`s that can be overwritten from one thread while read from another.
struct Slots(Box<[AtomicU32]>);

impl Slots {
  fn filled(len: usize, value: f32) -> Slots {
    Slots((0..len).map(|_| AtomicU32::new(value.to_bits())).collect())
  }

  fn get(&self, i: usize) -> f32 {
    f32::from_bits(self.0[i].load(Ordering::Relaxed))
  }

  fn set(&self, i: usize, value: f32) {
    self.0[i].store(value.to_bits(), Ordering::Relaxed)
  }

  /// Copies the overlapping prefix of `src`; slots past it keep their value.
  fn copy_from(&self, src: &[f32]) {
    for (slot, value) in self.0.iter().zip(src) {
      slot.store(value.to_bits(), Ordering::Relaxed);
    }
  }

  fn to_vec(&self) -> Vec<f32> {
    (0..self.0.len()).map(|i| self.get(i)).collect()
  }
}

/// The latest spectrum sample, shared between the player's analysis thread and
/// the render tick.
///
/// Every band is an independent last-write-wins slot: a reader racing a writer
/// sees either the old or the new value of each band, but there is no snapshot
/// across bands.
pub struct SpectrumBuffer {
  magnitudes: Slots,
  phases: Slots,
  playing: AtomicBool,
  generation: AtomicU64,
  samples: AtomicU64,
}

impl SpectrumBuffer {
  pub fn new(bands: usize) -> SpectrumBuffer {
    SpectrumBuffer {
      magnitudes: Slots::filled(bands, SILENCE_DB),
      phases: Slots::filled(bands, 0.0),
      playing: AtomicBool::new(false),
      generation: AtomicU64::new(0),
      samples: AtomicU64::new(0),
    }
  }

  pub fn bands(&self) -> usize {
    self.magnitudes.0.len()
  }

  /// Overwrites the held sample with as much of the new one as fits, and marks the buffer playing.
  pub fn update(&self, magnitudes: &[f32], phases: &[f32]) {
    self.magnitudes.copy_from(magnitudes);
    self.phases.copy_from(phases);
    self.samples.fetch_add(1, Ordering::SeqCst);
    self.playing.store(true, Ordering::SeqCst);
  }

  /// Like [`update`](Self::update), but dropped unless `generation` is still the
  /// current binding. Returns whether the sample was written.
  pub fn update_bound(&self, generation: u64, magnitudes: &[f32], phases: &[f32]) -> bool {
    if self.generation.load(Ordering::SeqCst) != generation {
      return false;
    }
    self.update(magnitudes, phases);
    true
  }

  /// Silences every band and leaves the playing state.
  pub fn reset(&self) {
    for i in 0..self.bands() {
      self.magnitudes.set(i, SILENCE_DB);
    }
    self.playing.store(false, Ordering::SeqCst);
  }

  /// Sets the playing flag. Pausing damps every band once so the fade starts
  /// immediately; phases are left alone.
  pub fn set_playing(&self, playing: bool) {
    self.playing.store(playing, Ordering::SeqCst);
    if !playing {
      for i in 0..self.bands() {
        let damped = damp_toward_floor(self.magnitudes.get(i), PAUSE_DAMPING);
        self.magnitudes.set(i, damped);
      }
    }
  }

  pub fn is_playing(&self) -> bool {
    self.playing.load(Ordering::SeqCst)
  }

  pub fn magnitude(&self, band: usize) -> f32 {
    self.magnitudes.get(band)
  }

  pub fn magnitudes(&self) -> Vec<f32> {
    self.magnitudes.to_vec()
  }

  pub fn phases(&self) -> Vec<f32> {
    self.phases.to_vec()
  }

  /// Number of samples written so far. Pausing and resetting do not count.
  pub fn sample_count(&self) -> u64 {
    self.samples.load(Ordering::SeqCst)
  }

  pub fn generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }

  /// Starts a new binding generation, invalidating writers holding the old one.
  pub(crate) fn rebind(&self) -> u64 {
    self.generation.fetch_add(1, Ordering::SeqCst) + 1
  }
}
