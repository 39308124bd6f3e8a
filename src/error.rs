use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, playing or analysing a song.
#[derive(Debug, Error)]
pub enum PlayerError {
  #[error("file {} is not a supported format", .0.display())]
  UnsupportedFormat(PathBuf),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error("could not decode song: {0}")]
  Decode(#[from] rodio::decoder::DecoderError),

  #[error("could not play song: {0}")]
  Play(#[from] rodio::PlayError),

  #[error("spectrum analysis failed: {0}")]
  Analysis(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unsupported_format_names_the_file() {
    let err = PlayerError::UnsupportedFormat(PathBuf::from("/music/notes.txt"));
    assert_eq!(err.to_string(), "file /music/notes.txt is not a supported format");
  }

  #[test]
  fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: PlayerError = io.into();
    assert!(matches!(err, PlayerError::Io(_)));
    assert_eq!(err.to_string(), "gone");
  }
}
