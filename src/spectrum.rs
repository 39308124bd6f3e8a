use std::time::Duration;

use spectrum_analyzer::scaling::divide_by_N;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{samples_fft_to_spectrum, FrequencyLimit};

use crate::buffer::SILENCE_DB;
use crate::PlayerError;

const MIN_FREQUENCY: f32 = 40.0;
const MAX_FREQUENCY: f32 = 5000.0;

/// Converts a linear magnitude to decibels, bottoming out at the silence floor.
pub fn to_decibels(magnitude: f32) -> f32 {
  if magnitude <= 0.0 {
    return SILENCE_DB;
  }
  (20.0 * magnitude.log10()).max(SILENCE_DB)
}

/// Index of the band `frequency` falls into when `[low, high]` is cut into `bands` equal slices.
pub fn band_of(frequency: f32, low: f32, high: f32, bands: usize) -> usize {
  let bar = (frequency - low) * bands as f32 / (high - low);
  (bar.max(0.0) as usize).min(bands.saturating_sub(1))
}

/// Reads decoded audio alongside playback and turns each chunk into per-band magnitudes.
pub struct Analyzer {
  sample_rate: u32,
  channels: u16,
  buf: Vec<f32>,
  source: Box<dyn rodio::Source<Item = f32> + Send + 'static>,
}

impl Analyzer {
  pub fn new<S>(source: S) -> Analyzer
  where
    S: rodio::Source<Item = f32> + Send + 'static,
  {
    Analyzer {
      channels: source.channels(),
      sample_rate: source.sample_rate(),
      buf: vec![0.0; crate::HANN_WINDOW_SIZE],
      source: Box::new(source),
    }
  }

  pub fn sample_rate(&self) -> u32 {
    self.sample_rate
  }

  /// Consumes `elapsed` worth of audio and returns `bands` magnitudes in dB.
  ///
  /// Only the first channel of the first window's worth of frames is analysed;
  /// the rest of the chunk is skipped to keep pace with playback.
  pub fn sample_audio(&mut self, elapsed: Duration, bands: usize) -> Result<Vec<f32>, PlayerError> {
    let num_frames = (self.sample_rate as u128 * elapsed.as_millis() / 1000) as usize;
    self.buf.iter_mut().for_each(|s| *s = 0.0);
    for i in 0..num_frames {
      let data = self.source.next().unwrap_or_default();
      if i < crate::HANN_WINDOW_SIZE {
        self.buf[i] = data
      }
      for _ in 1..self.channels {
        self.source.next();
      }
    }
    if bands == 0 {
      return Ok(vec![]);
    }

    let hann_window = hann_window(&self.buf);
    let high = MAX_FREQUENCY.min(self.sample_rate as f32 / 2.0);
    let spectrum = samples_fft_to_spectrum(
      &hann_window,
      self.sample_rate,
      FrequencyLimit::Range(MIN_FREQUENCY, high),
      Some(&divide_by_N),
    )
    .map_err(|e| PlayerError::Analysis(format!("{:?}", e)))?;

    let mut linear = vec![0.0f32; bands];
    for (fr, fr_val) in spectrum.data().iter() {
      linear[band_of(fr.val(), MIN_FREQUENCY, high, bands)] += fr_val.val();
    }
    Ok(linear.into_iter().map(to_decibels).collect())
  }
}
