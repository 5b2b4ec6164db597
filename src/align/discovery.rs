//! Find (audio, transcript) pairs in an input directory.

use crate::align::types::InputPair;
use crate::defaults::{AUDIO_EXTENSIONS, TRANSCRIPT_EXTENSION};
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Looks for the audio file belonging to a transcript stem.
///
/// Once an extension matches, it moves to the front of the probe order, so a
/// directory of all-flac recordings costs one `stat` per transcript.
#[derive(Debug, Clone)]
pub struct ExtensionProbe {
    seen: Vec<&'static str>,
    unseen: Vec<&'static str>,
    probes: usize,
}

impl Default for ExtensionProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionProbe {
    pub fn new() -> Self {
        Self {
            seen: Vec::new(),
            unseen: AUDIO_EXTENSIONS.to_vec(),
            probes: 0,
        }
    }

    /// Audio path for `stem` (a path without extension), if one exists.
    pub fn find(&mut self, stem: &Path) -> Option<PathBuf> {
        for ext in &self.seen {
            let candidate = with_extension(stem, ext);
            self.probes += 1;
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        let hit = self.unseen.iter().position(|ext| {
            self.probes += 1;
            with_extension(stem, ext).is_file()
        })?;
        let ext = self.unseen.remove(hit);
        self.seen.push(ext);
        Some(with_extension(stem, ext))
    }

    /// Filesystem probes issued so far.
    pub fn probes(&self) -> usize {
        self.probes
    }
}

fn with_extension(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Scan `input_dir` (non-recursively) for transcripts with a matching audio file.
///
/// Transcripts without audio are skipped. The result is in transcript name
/// order; scheduling order is decided later.
pub fn discover(input_dir: &Path) -> Result<Vec<InputPair>> {
    let mut transcripts: Vec<PathBuf> = fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == TRANSCRIPT_EXTENSION)
        })
        .collect();
    transcripts.sort();

    let mut probe = ExtensionProbe::new();
    let mut pairs = Vec::with_capacity(transcripts.len());
    for transcript_path in transcripts {
        let stem = transcript_path.with_extension("");
        let Some(audio_path) = probe.find(&stem) else {
            tracing::debug!(transcript = %transcript_path.display(), "no audio for transcript");
            continue;
        };
        let size_hint = match fs::metadata(&audio_path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!(audio = %audio_path.display(), error = %e, "cannot stat audio, skipping");
                continue;
            }
        };
        pairs.push(InputPair {
            audio_path,
            transcript_path,
            size_hint,
        });
    }

    tracing::debug!(pairs = pairs.len(), probes = probe.probes(), "discovery finished");
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, bytes: usize) {
        fs::write(dir.join(name), vec![0u8; bytes]).unwrap();
    }

    #[test]
    fn pairs_transcripts_with_audio_of_any_known_extension() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.txt", 1);
        touch(dir.path(), "a.flac", 10);
        touch(dir.path(), "b.txt", 1);
        touch(dir.path(), "b.mp3", 20);
        touch(dir.path(), "orphan.txt", 1);
        touch(dir.path(), "unrelated.wav", 5);

        let pairs = discover(dir.path()).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].audio_path, dir.path().join("a.flac"));
        assert_eq!(pairs[0].transcript_path, dir.path().join("a.txt"));
        assert_eq!(pairs[0].size_hint, 10);
        assert_eq!(pairs[1].audio_path, dir.path().join("b.mp3"));
        assert_eq!(pairs[1].size_hint, 20);
    }

    #[test]
    fn priority_order_wins_when_several_extensions_exist() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.txt", 1);
        touch(dir.path(), "a.wav", 1);
        touch(dir.path(), "a.flac", 1);

        let pairs = discover(dir.path()).unwrap();
        assert_eq!(pairs[0].audio_path, dir.path().join("a.flac"));
    }

    #[test]
    fn matched_extension_is_tried_first_afterwards() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.ogg", 1);
        touch(dir.path(), "b.ogg", 1);

        let mut probe = ExtensionProbe::new();
        let first = probe.find(&dir.path().join("a")).unwrap();
        assert_eq!(first, dir.path().join("a.ogg"));
        // flac, wav, mp3, ogg
        assert_eq!(probe.probes(), 4);

        let second = probe.find(&dir.path().join("b")).unwrap();
        assert_eq!(second, dir.path().join("b.ogg"));
        assert_eq!(probe.probes(), 5);
    }

    #[test]
    fn missing_audio_returns_none() {
        let dir = TempDir::new().unwrap();
        let mut probe = ExtensionProbe::new();
        assert!(probe.find(&dir.path().join("nothing")).is_none());
        assert_eq!(probe.probes(), AUDIO_EXTENSIONS.len());
    }

    #[test]
    fn stem_with_dots_keeps_them() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "vol.1.txt", 1);
        touch(dir.path(), "vol.1.wav", 3);

        let pairs = discover(dir.path()).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].audio_path, dir.path().join("vol.1.wav"));
    }
}
