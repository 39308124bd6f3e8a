use std::{
  env::temp_dir,
  error::Error,
  fs::{self, File},
  io::Cursor,
  path::{Path, PathBuf},
  time::Duration,
};

use log::{debug, warn};

/// How far and how much a music scan may collect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanLimits {
  pub max_depth: usize,
  pub max_files: usize,
}

impl ScanLimits {
  pub const UNLIMITED: ScanLimits = ScanLimits {
    max_depth: usize::MAX,
    max_files: usize::MAX,
  };
}

impl Default for ScanLimits {
  fn default() -> Self {
    ScanLimits {
      max_depth: 10,
      max_files: 1000,
    }
  }
}

pub fn has_supported_extension(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| crate::SUPPORTED_FORMATS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
    .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .map(|n| n.starts_with('.'))
    .unwrap_or(false)
}

/// Collects playable files under `start`, depth first.
///
/// Hidden directories are skipped, unreadable entries are ignored, and the scan
/// stops once `limits.max_files` songs were found. Files directly inside `start`
/// are at depth 1.
pub fn find_music(start: &Path, limits: ScanLimits) -> std::io::Result<Vec<PathBuf>> {
  let mut found = vec![];
  if !start.exists() || limits.max_files == 0 {
    return Ok(found);
  }
  if start.is_file() {
    if has_supported_extension(start) {
      found.push(start.to_path_buf());
    }
    return Ok(found);
  }
  visit(start, 1, limits, &mut found)?;
  Ok(found)
}

fn visit(dir: &Path, depth: usize, limits: ScanLimits, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
  if depth > limits.max_depth {
    return Ok(());
  }
  let mut entries = fs::read_dir(dir)?
    .filter_map(|e| e.ok())
    .map(|e| e.path())
    .collect::<Vec<PathBuf>>();
  entries.sort();

  for path in entries {
    if found.len() >= limits.max_files {
      break;
    }
    if path.is_dir() {
      if is_hidden(&path) {
        continue;
      }
      if let Err(e) = visit(&path, depth + 1, limits, found) {
        debug!("skipping {}: {}", path.display(), e);
      }
    } else if path.is_file() && has_supported_extension(&path) {
      found.push(path);
    }
  }
  Ok(())
}

/// The user's music, downloads, desktop and documents folders that exist.
pub fn common_music_dirs() -> Vec<PathBuf> {
  let mut dirs = vec![
    dirs_next::audio_dir(),
    dirs_next::download_dir(),
    dirs_next::desktop_dir(),
    dirs_next::document_dir(),
  ]
  .into_iter()
  .flatten()
  .filter(|d| d.is_dir())
  .collect::<Vec<PathBuf>>();
  dirs.dedup();
  dirs
}

/// Scans every [`common_music_dirs`] entry, sharing one file budget between them.
pub fn find_music_in_common_dirs(limits: ScanLimits) -> Vec<PathBuf> {
  let mut found: Vec<PathBuf> = vec![];
  for dir in common_music_dirs() {
    let remaining = limits.max_files.saturating_sub(found.len());
    if remaining == 0 {
      break;
    }
    let limits = ScanLimits {
      max_files: remaining,
      ..limits
    };
    match find_music(&dir, limits) {
      Ok(mut songs) => found.append(&mut songs),
      Err(e) => warn!("error scanning {}: {}", dir.display(), e),
    }
  }
  found
}

/// Songs to play, in reverse order so that the next song can be `pop`ped.
pub fn load_song_list(song_path: PathBuf, limits: ScanLimits) -> std::io::Result<Vec<PathBuf>> {
  let mut s = if song_path.is_dir() {
    find_music(&song_path, limits)?
  } else {
    vec![song_path]
  };
  s.sort();
  s.reverse();
  Ok(s)
}

/// Human readable file size, e.g. `3.2 MB`.
pub fn format_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", size, UNITS[unit])
}

/// A track list line: file name, size on disk and the folder it lives in.
pub fn describe_song(path: &Path) -> String {
  let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("<unnamed>");
  let size = fs::metadata(path)
    .map(|m| format_size(m.len()))
    .unwrap_or_else(|_| "?".to_string());
  let folder = path.parent().map(|p| p.display().to_string()).unwrap_or_default();
  format!("{}  [{}]  {}", name, size, folder)
}

pub fn to_song_entries(paths: &[PathBuf], rev: bool) -> Vec<String> {
  let mut entries = paths.iter().map(|p| describe_song(p)).collect::<Vec<String>>();
  if rev {
    entries.reverse();
  }
  entries
}

/// Directory pre-filled in the add-songs prompt.
pub fn get_search_dir() -> String {
  dirs_next::audio_dir()
    .or_else(|| std::env::current_dir().ok())
    .map(|d| d.display().to_string())
    .unwrap_or_default()
}

/// `mm:ss`, minutes growing past 59 for long tracks.
pub fn format_duration(duration: Duration) -> String {
  let seconds = duration.as_secs();
  format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn is_url(path: &str) -> bool {
  path.starts_with("https://") || path.starts_with("http://")
}

pub fn save_song_locally(path: &str) -> Result<PathBuf, Box<dyn Error>> {
  let resp = reqwest::blocking::get(path)?.error_for_status()?;
  let ext = resp
    .headers()
    .get("Content-Type")
    .map(|c| c.to_str())
    .unwrap_or(Ok("audio/mp3"))?
    .trim_start_matches("audio/")
    .to_string();

  let path = {
    let mut d = temp_dir();
    d.push(format!("downloaded_song.{}", ext));
    d
  };

  let mut f = File::create(&path)?;
  let content = resp.bytes()?;
  std::io::copy(&mut Cursor::new(content), &mut f)?;
  Ok(path)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Fresh directory under the system temp dir, removed on drop.
  struct ScratchDir(PathBuf);

  impl ScratchDir {
    fn new() -> ScratchDir {
      static NEXT: AtomicUsize = AtomicUsize::new(0);
      let dir = temp_dir().join(format!(
        "visutunes-songs-{}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::SeqCst)
      ));
      fs::create_dir_all(&dir).unwrap();
      ScratchDir(dir)
    }

    fn touch(&self, rel: &str) -> PathBuf {
      let path = self.0.join(rel);
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      File::create(&path).unwrap();
      path
    }
  }

  impl Drop for ScratchDir {
    fn drop(&mut self) {
      let _ = fs::remove_dir_all(&self.0);
    }
  }

  #[test]
  fn extensions_are_case_insensitive() {
    assert!(has_supported_extension(Path::new("a/b/song.mp3")));
    assert!(has_supported_extension(Path::new("SONG.FLAC")));
    assert!(has_supported_extension(Path::new("track.M4a")));
    assert!(!has_supported_extension(Path::new("notes.txt")));
    assert!(!has_supported_extension(Path::new("mp3")));
    assert!(!has_supported_extension(Path::new("trailing.")));
  }

  #[test]
  fn finds_nested_songs_and_skips_hidden_dirs() {
    let dir = ScratchDir::new();
    let a = dir.touch("a.mp3");
    let b = dir.touch("albums/one/b.ogg");
    dir.touch("albums/cover.jpg");
    dir.touch(".cache/c.mp3");

    let found = find_music(&dir.0, ScanLimits::UNLIMITED).unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.contains(&a));
    assert!(found.contains(&b));
  }

  #[test]
  fn depth_limit_stops_descent() {
    let dir = ScratchDir::new();
    let top = dir.touch("top.wav");
    dir.touch("deep/er/song.wav");

    let limits = ScanLimits { max_depth: 1, max_files: 10 };
    assert_eq!(find_music(&dir.0, limits).unwrap(), vec![top]);
  }

  #[test]
  fn file_limit_stops_the_scan() {
    let dir = ScratchDir::new();
    for i in 0..5 {
      dir.touch(&format!("song{}.mp3", i));
    }
    let limits = ScanLimits { max_depth: 3, max_files: 3 };
    assert_eq!(find_music(&dir.0, limits).unwrap().len(), 3);
  }

  #[test]
  fn missing_start_is_empty() {
    let found = find_music(Path::new("/definitely/not/here"), ScanLimits::default()).unwrap();
    assert!(found.is_empty());
  }

  #[test]
  fn song_list_pops_in_name_order() {
    let dir = ScratchDir::new();
    dir.touch("b.mp3");
    dir.touch("a.mp3");
    dir.touch("c.flac");

    let mut songs = load_song_list(dir.0.clone(), ScanLimits::default()).unwrap();
    let first = songs.pop().unwrap();
    assert_eq!(first.file_name().unwrap(), "a.mp3");
    let up_next = to_song_entries(&songs, true);
    assert!(up_next[0].starts_with("b.mp3"));
    assert!(up_next[1].starts_with("c.flac"));
    assert!(to_song_entries(&songs, false)[0].starts_with("c.flac"));
  }

  #[test]
  fn entries_show_size_and_folder() {
    let dir = ScratchDir::new();
    let song = dir.touch("album/track.ogg");
    fs::write(&song, vec![0u8; 2048]).unwrap();

    let entry = describe_song(&song);
    assert_eq!(entry, format!("track.ogg  [2.0 KB]  {}", dir.0.join("album").display()));
    assert!(describe_song(Path::new("/gone/missing.mp3")).starts_with("missing.mp3  [?]"));
  }

  #[test]
  fn sizes_scale_through_units() {
    assert_eq!(format_size(0), "0 B");
    assert_eq!(format_size(1023), "1023 B");
    assert_eq!(format_size(1536), "1.5 KB");
    assert_eq!(format_size(5 * 1024 * 1024 + 300 * 1024), "5.3 MB");
    assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
  }

  #[test]
  fn single_file_is_its_own_list() {
    let list = load_song_list(PathBuf::from("/music/x.mp3"), ScanLimits::default()).unwrap();
    assert_eq!(list, vec![PathBuf::from("/music/x.mp3")]);
  }

  #[test]
  fn durations_format_as_minutes_and_seconds() {
    assert_eq!(format_duration(Duration::ZERO), "00:00");
    assert_eq!(format_duration(Duration::from_millis(61_900)), "01:01");
    assert_eq!(format_duration(Duration::from_secs(3725)), "62:05");
  }

  #[test]
  fn urls_are_recognised() {
    assert!(is_url("https://example.com/a.mp3"));
    assert!(is_url("http://example.com/a.mp3"));
    assert!(!is_url("/home/me/a.mp3"));
  }
}
