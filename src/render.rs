use crate::buffer::{damp_toward_floor, SpectrumBuffer, SILENCE_DB};

/// Share of each band slot occupied by its bar; the rest is spacing.
pub const BAR_WIDTH_RATIO: f64 = 0.8;
/// Tallest bar relative to the canvas height.
pub const BAR_HEIGHT_RATIO: f64 = 0.9;
/// Display-only attenuation while not playing.
pub const DISPLAY_DECAY: f64 = 0.95;
/// Compounding per-frame decay of the stored magnitude while not playing.
pub const FRAME_DECAY: f32 = 0.9;
/// Bars shorter than this while playing are replaced with jitter.
pub const JITTER_FLOOR: f64 = 2.0;
pub const JITTER_RANGE: f64 = 5.0;
pub const REFLECTION_RATIO: f64 = 0.3;
pub const REFLECTION_ALPHA: f32 = 0.2;

pub const BACKGROUND: Rgb = Rgb(20, 20, 30);
pub const BAR_BRIGHT: Rgb = Rgb(0, 200, 255);
pub const BAR_DIM: Rgb = Rgb(0, 100, 200);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
  /// Linear interpolation towards `other`; `ratio` 0 is `self`, 1 is `other`.
  pub fn interpolate(self, other: Rgb, ratio: f64) -> Rgb {
    let ratio = ratio.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * ratio).round() as u8;
    Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectF {
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
}

/// Anything the bars can be painted on.
pub trait Surface {
  fn fill_rect(&mut self, rect: RectF, color: Rgb, alpha: f32);
}

/// Maps a decibel magnitude onto `[0, 1]`, with -60 dB as empty and 0 dB as full.
pub fn normalize(db: f32) -> f64 {
  if db.is_nan() {
    return 0.0;
  }
  ((db as f64 - SILENCE_DB as f64) / -SILENCE_DB as f64).clamp(0.0, 1.0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bar {
  pub x: f64,
  pub width: f64,
  pub height: f64,
}

/// Bar geometry and heights for one animation frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
  pub width: f64,
  pub height: f64,
  pub bars: Vec<Bar>,
}

impl Frame {
  pub fn empty(width: f64, height: f64) -> Frame {
    Frame { width, height, bars: vec![] }
  }

  pub fn heights(&self) -> Vec<f64> {
    self.bars.iter().map(|b| b.height).collect()
  }

  /// Line the bars stand on; the strip below it holds the reflections.
  pub fn baseline(&self) -> f64 {
    self.height * BAR_HEIGHT_RATIO
  }
}

/// Horizontal layout of band `index` out of `bands` on a canvas `width` wide: `(x, bar_width)`.
pub fn bar_slot(index: usize, bands: usize, width: f64) -> (f64, f64) {
  let slot = width / bands as f64;
  let bar_width = slot * BAR_WIDTH_RATIO;
  let spacing = slot - bar_width;
  (index as f64 * slot + spacing / 2.0, bar_width)
}

/// Turns buffer contents into bar heights and paints them.
///
/// The renderer keeps its own copy of every band's magnitude so it can keep
/// decaying bars while the producer has gone quiet. The copy follows the buffer
/// whenever a new sample was written since the last frame, including one that
/// was damped by a pause before this frame saw it. Without a new sample the
/// faded copy is kept, so resuming continues from where the fade got to.
pub struct BarRenderer {
  width: f64,
  height: f64,
  seen: Vec<f32>,
  decayed: Vec<f32>,
  last_sample: u64,
  rng: fastrand::Rng,
}

impl BarRenderer {
  pub fn new(width: f64, height: f64, bands: usize) -> BarRenderer {
    BarRenderer::with_rng(width, height, bands, fastrand::Rng::new())
  }

  pub fn with_rng(width: f64, height: f64, bands: usize, rng: fastrand::Rng) -> BarRenderer {
    BarRenderer {
      width,
      height,
      seen: vec![SILENCE_DB; bands],
      decayed: vec![SILENCE_DB; bands],
      last_sample: 0,
      rng,
    }
  }

  pub fn size(&self) -> (f64, f64) {
    (self.width, self.height)
  }

  /// Magnitudes the renderer currently draws from, after decay.
  pub fn decayed(&self) -> &[f32] {
    &self.decayed
  }

  /// Computes the next frame from `buffer`, advancing the decay of every band.
  pub fn next_frame(&mut self, buffer: &SpectrumBuffer) -> Frame {
    let playing = buffer.is_playing();
    let sample = buffer.sample_count();
    let fresh = sample != self.last_sample;
    self.last_sample = sample;
    let bands = self.decayed.len().min(buffer.bands());
    let mut bars = Vec::with_capacity(bands);

    for i in 0..bands {
      let raw = buffer.magnitude(i);
      if fresh {
        self.decayed[i] = raw;
      } else if raw.to_bits() != self.seen[i].to_bits() {
        // damped or reset with no new sample; never jump upwards mid-fade
        self.decayed[i] = self.decayed[i].min(raw);
      }
      self.seen[i] = raw;

      let mut normalized = normalize(self.decayed[i]);
      if !playing {
        normalized *= DISPLAY_DECAY;
        self.decayed[i] = damp_toward_floor(self.decayed[i], FRAME_DECAY);
      }

      let mut height = normalized * self.height * BAR_HEIGHT_RATIO;
      if playing && height < JITTER_FLOOR {
        height = JITTER_FLOOR + self.rng.f64() * JITTER_RANGE;
      }

      let (x, width) = bar_slot(i, bands, self.width);
      bars.push(Bar { x, width, height });
    }

    Frame { width: self.width, height: self.height, bars }
  }

  /// Clears `surface` and paints every bar of `frame` with its reflection.
  pub fn paint<S: Surface>(&self, frame: &Frame, surface: &mut S) {
    surface.fill_rect(
      RectF { x: 0.0, y: 0.0, width: frame.width, height: frame.height },
      BACKGROUND,
      1.0,
    );

    let baseline = frame.baseline();
    for bar in frame.bars.iter().filter(|b| b.height > 0.0) {
      let top = (baseline - bar.height).max(0.0);
      let height = baseline - top;

      let steps = (height / 2.0).max(1.0) as usize;
      let segment = height / steps as f64;
      for s in 0..steps {
        let y = top + s as f64 * segment;
        // overlap by a pixel so rounding never leaves seams, but stay inside the bar
        let h = (segment + 1.0).min(baseline - y);
        let color = BAR_BRIGHT.interpolate(BAR_DIM, s as f64 / steps as f64);
        surface.fill_rect(RectF { x: bar.x, y, width: bar.width, height: h }, color, 1.0);
      }

      let reflection = (height * REFLECTION_RATIO).min(frame.height - baseline);
      if reflection > 0.0 {
        surface.fill_rect(
          RectF { x: bar.x, y: baseline, width: bar.width, height: reflection },
          BAR_DIM,
          REFLECTION_ALPHA,
        );
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  #[derive(Default)]
  struct Recorder(Vec<(RectF, Rgb, f32)>);

  impl Surface for Recorder {
    fn fill_rect(&mut self, rect: RectF, color: Rgb, alpha: f32) {
      self.0.push((rect, color, alpha));
    }
  }

  fn renderer(bands: usize) -> BarRenderer {
    BarRenderer::with_rng(320.0, 100.0, bands, fastrand::Rng::with_seed(7))
  }

  #[test]
  fn normalize_maps_the_nominal_range() {
    assert_eq!(normalize(-60.0), 0.0);
    assert_eq!(normalize(-90.0), 0.0);
    assert_eq!(normalize(0.0), 1.0);
    assert_eq!(normalize(12.0), 1.0);
    assert_relative_eq!(normalize(-30.0), 0.5);
    assert_eq!(normalize(f32::NAN), 0.0);
  }

  #[test]
  fn normalize_is_monotonic() {
    let mut last = normalize(-80.0);
    let mut db = -80.0f32;
    while db <= 10.0 {
      let n = normalize(db);
      assert!(n >= last, "normalize({}) = {} < {}", db, n, last);
      last = n;
      db += 0.25;
    }
  }

  #[test]
  fn slots_split_width_evenly() {
    let (x0, w) = bar_slot(0, 32, 320.0);
    let (x1, _) = bar_slot(1, 32, 320.0);
    assert_relative_eq!(w, 8.0);
    assert_relative_eq!(x0, 1.0);
    assert_relative_eq!(x1 - x0, 10.0);
    assert_relative_eq!(x1 - (x0 + w), 2.0);

    let (x, w) = bar_slot(3, 4, 320.0);
    assert_relative_eq!(w, 64.0);
    assert_relative_eq!(x, 248.0);
  }

  #[test]
  fn full_scale_fills_ninety_percent() {
    let buffer = SpectrumBuffer::new(4);
    buffer.update(&[0.0; 4], &[0.0; 4]);
    let frame = renderer(4).next_frame(&buffer);
    for h in frame.heights() {
      assert_relative_eq!(h, 90.0);
    }
  }

  #[test]
  fn silent_bands_jitter_while_playing() {
    let buffer = SpectrumBuffer::new(32);
    buffer.update(&[-60.0; 32], &[0.0; 32]);
    let mut r = renderer(32);
    for _ in 0..20 {
      for h in r.next_frame(&buffer).heights() {
        assert!((2.0..7.0).contains(&h), "height {} outside jitter floor", h);
      }
    }
  }

  #[test]
  fn no_jitter_when_stopped() {
    let buffer = SpectrumBuffer::new(8);
    let frame = renderer(8).next_frame(&buffer);
    assert_eq!(frame.heights(), vec![0.0; 8]);
  }

  #[test]
  fn stopped_frames_decay_compounding() {
    let buffer = SpectrumBuffer::new(1);
    buffer.update(&[0.0], &[0.0]);
    let mut r = renderer(1);
    r.next_frame(&buffer);
    buffer.set_playing(false);

    // one-shot damping: 0 dB -> -6 dB, then the display factor
    let first = r.next_frame(&buffer).heights()[0];
    assert_relative_eq!(first, 0.9 * 0.95 * 90.0, epsilon = 1e-3);
    // per-frame decay compounds on the renderer's copy
    let second = r.next_frame(&buffer).heights()[0];
    assert_relative_eq!(second, 0.81 * 0.95 * 90.0, epsilon = 1e-3);
    let third = r.next_frame(&buffer).heights()[0];
    assert_relative_eq!(third, 0.729 * 0.95 * 90.0, epsilon = 1e-3);
    // the producer's slot only saw the one-shot damping
    assert_relative_eq!(buffer.magnitude(0), -6.0, epsilon = 1e-4);
  }

  #[test]
  fn repeated_pause_never_raises_a_fading_bar() {
    let buffer = SpectrumBuffer::new(1);
    buffer.update(&[-10.0], &[0.0]);
    let mut r = renderer(1);
    r.next_frame(&buffer);
    buffer.set_playing(false);
    let mut last = f64::MAX;
    for _ in 0..5 {
      let h = r.next_frame(&buffer).heights()[0];
      assert!(h <= last);
      last = h;
    }
    buffer.set_playing(false);
    assert!(r.next_frame(&buffer).heights()[0] <= last);
  }

  #[test]
  fn pause_before_the_first_frame_still_fades() {
    let buffer = SpectrumBuffer::new(1);
    let mut r = renderer(1);
    assert_eq!(r.next_frame(&buffer).heights()[0], 0.0);

    buffer.update(&[-6.0], &[0.0]);
    buffer.set_playing(false);
    // -6 dB damped once sits 0.81 above the floor
    let first = r.next_frame(&buffer).heights()[0];
    assert_relative_eq!(first, 0.81 * 0.95 * 90.0, epsilon = 1e-3);
    let second = r.next_frame(&buffer).heights()[0];
    assert_relative_eq!(second, 0.729 * 0.95 * 90.0, epsilon = 1e-3);
  }

  #[test]
  fn pause_fades_from_a_sample_written_between_frames() {
    let buffer = SpectrumBuffer::new(1);
    let mut r = renderer(1);
    buffer.update(&[-30.0], &[0.0]);
    r.next_frame(&buffer);

    buffer.update(&[0.0], &[0.0]);
    buffer.set_playing(false);
    let h = r.next_frame(&buffer).heights()[0];
    assert_relative_eq!(h, 0.9 * 0.95 * 90.0, epsilon = 1e-3);
  }

  #[test]
  fn resuming_without_a_sample_keeps_the_fade() {
    let buffer = SpectrumBuffer::new(1);
    let mut r = renderer(1);
    buffer.update(&[0.0], &[0.0]);
    r.next_frame(&buffer);
    buffer.set_playing(false);

    let mut paused = 0.0;
    for _ in 0..20 {
      paused = r.next_frame(&buffer).heights()[0];
    }
    assert_relative_eq!(paused, 0.9f64.powi(20) * 0.95 * 90.0, epsilon = 1e-3);

    buffer.set_playing(true);
    let resumed = r.next_frame(&buffer).heights()[0];
    assert!(resumed <= paused, "resumed at {} after fading to {}", resumed, paused);
    assert_relative_eq!(resumed, 0.9f64.powi(21) * 90.0, epsilon = 1e-3);
    // holds until the producer speaks again
    assert_relative_eq!(r.next_frame(&buffer).heights()[0], resumed);

    buffer.update(&[0.0], &[0.0]);
    assert_relative_eq!(r.next_frame(&buffer).heights()[0], 90.0);
  }

  #[test]
  fn paint_clears_then_draws_gradient_segments() {
    let buffer = SpectrumBuffer::new(1);
    buffer.update(&[0.0], &[0.0]);
    let mut r = BarRenderer::with_rng(10.0, 20.0, 1, fastrand::Rng::with_seed(1));
    let frame = r.next_frame(&buffer);
    // 0 dB -> 18 px -> 9 segments of 2 px
    let mut surface = Recorder::default();
    r.paint(&frame, &mut surface);

    let (bg, color, alpha) = surface.0[0];
    assert_eq!(bg, RectF { x: 0.0, y: 0.0, width: 10.0, height: 20.0 });
    assert_eq!(color, BACKGROUND);
    assert_eq!(alpha, 1.0);

    let segments = &surface.0[1..10];
    assert_eq!(segments[0].1, BAR_BRIGHT);
    assert_relative_eq!(segments[0].0.y, 0.0);
    assert_relative_eq!(segments[0].0.x, 1.0);
    assert_relative_eq!(segments[0].0.width, 8.0);
    assert_relative_eq!(segments[8].0.y, 16.0);
    assert_relative_eq!(segments[8].0.height, 2.0);
    assert_eq!(segments[8].1, BAR_BRIGHT.interpolate(BAR_DIM, 8.0 / 9.0));
    for pair in segments.windows(2) {
      assert!(pair[1].1 .1 <= pair[0].1 .1, "gradient should dim downwards");
    }

    let (reflection, color, alpha) = surface.0[10];
    assert_eq!(color, BAR_DIM);
    assert_eq!(alpha, REFLECTION_ALPHA);
    assert_relative_eq!(reflection.y, 18.0);
    assert_relative_eq!(reflection.height, 2.0);
    assert_eq!(surface.0.len(), 11);
  }

  #[test]
  fn short_bars_get_a_single_segment() {
    let frame = Frame {
      width: 10.0,
      height: 100.0,
      bars: vec![Bar { x: 1.0, width: 8.0, height: 3.0 }],
    };
    let mut surface = Recorder::default();
    renderer(1).paint(&frame, &mut surface);
    assert_relative_eq!(surface.0[1].0.height, 3.0);
    assert_eq!(surface.0[1].1, BAR_BRIGHT);
    assert_relative_eq!(surface.0[2].0.height, 0.9, epsilon = 1e-9);
  }

  #[test]
  fn empty_bars_paint_nothing() {
    let frame = Frame {
      width: 10.0,
      height: 10.0,
      bars: vec![Bar { x: 1.0, width: 8.0, height: 0.0 }],
    };
    let mut surface = Recorder::default();
    renderer(1).paint(&frame, &mut surface);
    assert_eq!(surface.0.len(), 1);
  }

  #[test]
  fn interpolate_endpoints() {
    assert_eq!(BAR_BRIGHT.interpolate(BAR_DIM, 0.0), BAR_BRIGHT);
    assert_eq!(BAR_BRIGHT.interpolate(BAR_DIM, 1.0), BAR_DIM);
    assert_eq!(BAR_BRIGHT.interpolate(BAR_DIM, 0.5), Rgb(0, 150, 228));
  }
}
