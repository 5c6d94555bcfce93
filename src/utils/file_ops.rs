use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{debug, warn};

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac"];

pub fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expands inputs into a sorted, de-duplicated list of audio files.
///
/// Files named directly are kept whatever their extension; directories are
/// walked (following links) for files with an audio extension.
pub fn discover_audio_files(inputs: &[impl AsRef<Path>]) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    for input in inputs {
        let input = input.as_ref();
        if !input.is_dir() {
            found.insert(input.to_path_buf());
            continue;
        }

        debug!("Scanning directory structure: {}", input.display());
        let entries = walkdir::WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Error accessing entry: {}", err);
                    None
                }
            });
        for entry in entries {
            if !entry.file_type().is_file() {
                continue;
            }
            if has_audio_extension(entry.path()) {
                found.insert(entry.into_path());
            } else {
                debug!("Skipping non-audio file: {}", entry.path().display());
            }
        }
    }
    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn walks_directories_for_audio_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("album");
        fs::create_dir_all(&nested).unwrap();
        for name in ["b.FLAC", "cover.jpg", "a.wav"] {
            fs::write(nested.join(name), b"").unwrap();
        }
        fs::write(dir.path().join("c.mp3"), b"").unwrap();

        let files = discover_audio_files(&[dir.path()]);
        assert_eq!(
            files,
            vec![
                nested.join("a.wav"),
                nested.join("b.FLAC"),
                dir.path().join("c.mp3"),
            ]
        );
    }

    #[test]
    fn explicit_files_are_kept_once() {
        let files = discover_audio_files(&["notes.txt", "x.wav", "notes.txt"]);
        assert_eq!(files, vec![PathBuf::from("notes.txt"), PathBuf::from("x.wav")]);
    }
}
