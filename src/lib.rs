use std::{fs::File, io::BufReader, path::Path};

use rodio::{source::SamplesConverter, Decoder, Source};

pub mod app;
pub mod buffer;
pub mod error;
pub mod player;
pub mod render;
pub mod songs;
pub mod spectrum;
pub mod ui;
pub mod visualizer;

pub use error::PlayerError;

/// Number of frequency bands the visualizer renders.
pub const BAND_COUNT: usize = 32;
/// How often the player pushes a new spectrum sample, in milliseconds.
pub const SPECTRUM_INTERVAL_MS: u64 = 50;
/// Default display refresh of the visualizer, in frames per second.
pub const DEFAULT_FPS: u32 = 60;
pub const HANN_WINDOW_SIZE: usize = 2048;

/// Logical canvas the bars are laid out on; the terminal surface scales it to its area.
pub const CANVAS_WIDTH: f64 = 320.0;
pub const CANVAS_HEIGHT: f64 = 160.0;

pub const SUPPORTED_FORMATS: [&str; 6] = ["mp3", "flac", "ogg", "wav", "aac", "m4a"];

pub fn get_source<D: rodio::Sample, P: AsRef<Path>>(
  song_path: P,
) -> Result<SamplesConverter<Decoder<BufReader<File>>, D>, PlayerError> {
  let file = BufReader::new(File::open(song_path)?);
  Ok(Decoder::new(file)?.convert_samples::<D>())
}
