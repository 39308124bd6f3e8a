use anyhow::anyhow;
use clap::Parser;
use env_logger::{Env, Target};
use log::info;
use std::{error::Error, fs::File, path::PathBuf};
use visutunes::{
  app::Settings,
  songs::{self, ScanLimits},
};

#[derive(Debug, Parser)]
struct Args {
  /// Path of the song or a folder of songs, either local or a url.
  /// Scans the usual music folders when left out.
  #[clap(short, long)]
  path: Option<String>,
  /// Change color based on the song
  #[clap(short, long)]
  color: bool,
  /// How many folders deep to look for songs
  #[clap(long, default_value_t = 10)]
  max_depth: usize,
  /// Stop looking after this many songs
  #[clap(long, default_value_t = 1000)]
  max_files: usize,
  /// Frames per second of the visualizer
  #[clap(long, default_value_t = visutunes::DEFAULT_FPS)]
  fps: u32,
  /// Log at debug level
  #[clap(short, long)]
  debug: bool,
  /// Write logs to this file instead of stderr
  #[clap(long)]
  log_file: Option<PathBuf>,
}

fn init_logging(args: &Args) -> Result<(), Box<dyn Error>> {
  let mut builder =
    env_logger::Builder::from_env(Env::default().default_filter_or(if args.debug { "debug" } else { "warn" }));
  builder.format_timestamp_secs();
  if let Some(path) = &args.log_file {
    builder.target(Target::Pipe(Box::new(File::create(path)?)));
  }
  builder.init();
  Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
  let args = Args::parse();
  init_logging(&args)?;

  let limits = ScanLimits {
    max_depth: args.max_depth,
    max_files: args.max_files,
  };

  let songs = match &args.path {
    Some(path) if songs::is_url(path) => {
      println!("Looks like you passed in a HTTP URL, downloading...");
      let path = songs::save_song_locally(path)?;
      println!("Saved the file to disk, playing...");
      vec![path]
    }
    Some(path) => {
      println!("Looks like you passed in a local path, playing...");
      songs::load_song_list(PathBuf::from(path), limits)?
    }
    None => {
      println!("Looking for music in the usual places...");
      let mut found = songs::find_music_in_common_dirs(limits);
      found.sort();
      found.reverse();
      found
    }
  };
  if songs.is_empty() {
    return Err(anyhow!("no playable songs found").into());
  }
  info!("{} songs queued", songs.len());

  let settings = Settings {
    color_by_song: args.color,
    limits,
    fps: args.fps,
  };
  let res = visutunes::app::run(songs, settings);
  if let Err(e) = res {
    println!("{:?}", e);
  }

  Ok(())
}
