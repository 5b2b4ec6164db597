//! Individual filter stages over lazy manifest line streams.

use crate::audio::AudioTool;
use crate::defaults::{DURATION_TOLERANCE_MS, MIN_VALID_DURATION_MS};
use crate::filter::range::Range;
use crate::filter::stats::LineIter;
use crate::manifest::ManifestLine;
use crate::pipeline::WorkerPool;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The user-orderable stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Audio,
    Chars,
    Regex,
    Valid,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Audio => "audio",
            StageKind::Chars => "chars",
            StageKind::Regex => "regex",
            StageKind::Valid => "valid",
        }
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "audio" => Ok(StageKind::Audio),
            "chars" => Ok(StageKind::Chars),
            "regex" => Ok(StageKind::Regex),
            "valid" => Ok(StageKind::Valid),
            other => Err(format!(
                "unknown filter stage '{other}' (expected audio, chars, regex or valid)"
            )),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a comma-separated stage order such as `valid,audio`.
///
/// Each stage may appear once; stages left out keep their default position
/// after the listed ones.
pub fn parse_order(s: &str) -> Result<Vec<StageKind>, String> {
    let mut order: Vec<StageKind> = Vec::new();
    for part in s.split(',').filter(|p| !p.trim().is_empty()) {
        let kind: StageKind = part.parse()?;
        if order.contains(&kind) {
            return Err(format!("filter stage '{kind}' listed twice"));
        }
        order.push(kind);
    }
    for kind in [
        StageKind::Audio,
        StageKind::Chars,
        StageKind::Regex,
        StageKind::Valid,
    ] {
        if !order.contains(&kind) {
            order.push(kind);
        }
    }
    Ok(order)
}

/// Keep lines whose truncated duration lies in `range`.
pub fn audio_length(lines: LineIter, range: Range) -> LineIter {
    Box::new(lines.filter(move |line| range.contains(line.duration_ms_truncated())))
}

/// Keep lines whose text length in characters lies in `range`.
pub fn char_length(lines: LineIter, range: Range) -> LineIter {
    Box::new(lines.filter(move |line| range.contains(line.char_count() as u64)))
}

/// Compile a user pattern so it must match at the start of the text.
pub fn anchored_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})"))
}

/// Keep lines whose text matches `regex` (see [`anchored_regex`]).
pub fn text_regex(lines: LineIter, regex: Regex) -> LineIter {
    Box::new(lines.filter(move |line| regex.is_match(&line.text)))
}

/// Whether the clip decodes as mono audio of the claimed length.
pub fn is_valid_clip(audio: &dyn AudioTool, line: &ManifestLine) -> bool {
    let decoded = match audio.duration_ms(&line.clip_path) {
        Ok(ms) => ms,
        Err(e) => {
            tracing::debug!(clip = %line.clip_path.display(), "invalid clip: {e}");
            return false;
        }
    };
    let ok = decoded > MIN_VALID_DURATION_MS
        && (decoded - line.duration_ms).abs() < DURATION_TOLERANCE_MS;
    if !ok {
        tracing::debug!(
            clip = %line.clip_path.display(),
            decoded,
            claimed = line.duration_ms,
            "invalid clip: duration mismatch"
        );
    }
    ok
}

/// Keep lines whose clip passes [`is_valid_clip`], decoding on `pool`.
///
/// Output order is completion order.
pub fn valid_audio(lines: LineIter, audio: Arc<dyn AudioTool>, pool: WorkerPool) -> LineIter {
    let checked = pool.map_unordered(lines, move |line| {
        is_valid_clip(audio.as_ref(), &line).then_some(line)
    });
    Box::new(checked.flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioTool;
    use crate::audio::AudioInfo;
    use crate::error::{PrepError, Result};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn line(id: &str, ms: f64, text: &str) -> ManifestLine {
        ManifestLine::new(id, format!("/c/{id}.flac"), ms, text).unwrap()
    }

    fn iter(lines: Vec<ManifestLine>) -> LineIter {
        Box::new(lines.into_iter())
    }

    fn ids(lines: LineIter) -> Vec<String> {
        lines.map(|l| l.id).collect()
    }

    #[test]
    fn audio_range_keeps_lines_inside() {
        let lines = iter(vec![line("keep", 2500.0, "x"), line("drop", 500.0, "y")]);
        let out = ids(audio_length(lines, "1000-5000".parse().unwrap()));
        assert_eq!(out, vec!["keep"]);
    }

    #[test]
    fn audio_range_uses_truncated_duration() {
        let lines = iter(vec![line("edge", 5000.9, "x"), line("low", 999.99, "y")]);
        let out = ids(audio_length(lines, "1000-5000".parse().unwrap()));
        assert_eq!(out, vec!["edge"]);
    }

    #[test]
    fn char_range_counts_characters_not_bytes() {
        let lines = iter(vec![line("a", 1.0, "ééé"), line("b", 1.0, "abcd")]);
        let out = ids(char_length(lines, "1-3".parse().unwrap()));
        assert_eq!(out, vec!["a"]);
    }

    #[test]
    fn regex_is_anchored_at_start_only() {
        let re = anchored_regex("[a-z' ]+").unwrap();
        let lines = iter(vec![
            line("a", 1.0, "hello there"),
            line("b", 1.0, "hello 42"),
            line("c", 1.0, "42 hello"),
        ]);
        // "hello 42" still matches because only the start is anchored
        assert_eq!(ids(text_regex(lines, re)), vec!["a", "b"]);

        let full = anchored_regex("[a-z' ]+$").unwrap();
        let lines = iter(vec![line("a", 1.0, "hello there"), line("b", 1.0, "hello 42")]);
        assert_eq!(ids(text_regex(lines, full)), vec!["a"]);
    }

    #[test]
    fn alternation_stays_anchored() {
        let re = anchored_regex("foo|bar").unwrap();
        assert!(re.is_match("bar baz"));
        assert!(!re.is_match("baz bar"));
    }

    #[test]
    fn filters_commute() {
        let make = || {
            iter(vec![
                line("a", 2000.0, "short"),
                line("b", 2000.0, "a much longer transcript"),
                line("c", 100.0, "short"),
                line("d", 100.0, "a much longer transcript"),
            ])
        };
        let audio: Range = "1000-5000".parse().unwrap();
        let chars: Range = "1-10".parse().unwrap();

        let first = ids(char_length(audio_length(make(), audio), chars));
        let second = ids(audio_length(char_length(make(), chars), audio));
        assert_eq!(first, second);
        assert_eq!(first, vec!["a"]);
    }

    #[test]
    fn stage_order_parsing() {
        assert_eq!(
            parse_order("audio,chars,regex,valid").unwrap(),
            vec![
                StageKind::Audio,
                StageKind::Chars,
                StageKind::Regex,
                StageKind::Valid
            ]
        );
        assert_eq!(
            parse_order("valid,chars").unwrap(),
            vec![
                StageKind::Valid,
                StageKind::Chars,
                StageKind::Audio,
                StageKind::Regex
            ]
        );
        assert!(parse_order("audio,audio").is_err());
        assert!(parse_order("audio,w2l").is_err());
    }

    struct StereoTool;

    impl AudioTool for StereoTool {
        fn probe(&self, _path: &Path) -> Result<AudioInfo> {
            Ok(AudioInfo {
                duration_ms: 1000.0,
                channels: 2,
                sample_rate: 16000,
                frames: 16000,
            })
        }

        fn trim(&self, src: &Path, _: f64, _: f64, _: &Path) -> Result<PathBuf> {
            Err(PrepError::AudioTool {
                path: src.to_path_buf(),
                message: "unsupported".to_string(),
            })
        }
    }

    #[test]
    fn validity_checks_duration_and_decode() {
        let dir = TempDir::new().unwrap();
        let clip = dir.path().join("a.flac");
        std::fs::write(&clip, b"x").unwrap();
        let tool = MockAudioTool::new().with_duration(1000.0);

        let exact = line("a", 1000.0, "x").with_clip_path(&clip);
        let close = line("a", 1000.5, "x").with_clip_path(&clip);
        let far = line("a", 1001.0, "x").with_clip_path(&clip);
        let missing = line("m", 1000.0, "x").with_clip_path(dir.path().join("m.flac"));

        assert!(is_valid_clip(&tool, &exact));
        assert!(is_valid_clip(&tool, &close));
        assert!(!is_valid_clip(&tool, &far));
        assert!(!is_valid_clip(&tool, &missing));
    }

    #[test]
    fn validity_rejects_near_empty_clips() {
        let dir = TempDir::new().unwrap();
        let clip = dir.path().join("a.flac");
        std::fs::write(&clip, b"x").unwrap();
        let tool = MockAudioTool::new().with_duration(0.5);
        assert!(!is_valid_clip(&tool, &line("a", 0.5, "x").with_clip_path(&clip)));
    }

    #[test]
    fn validity_rejects_multichannel() {
        assert!(!is_valid_clip(&StereoTool, &line("a", 1000.0, "x")));
    }

    #[test]
    fn valid_stage_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut lines = Vec::new();
        for (i, ms) in [1000.0, 1000.2, 1500.0, 999.5].iter().enumerate() {
            let clip = dir.path().join(format!("{i}.flac"));
            if i != 2 {
                std::fs::write(&clip, b"x").unwrap();
            }
            lines.push(line(&format!("l{i}"), *ms, "x").with_clip_path(clip));
        }
        let tool: Arc<dyn AudioTool> = Arc::new(MockAudioTool::new().with_duration(1000.0));

        let mut once: Vec<ManifestLine> =
            valid_audio(iter(lines), Arc::clone(&tool), WorkerPool::new(3)).collect();
        once.sort_by(|a, b| a.id.cmp(&b.id));
        let mut twice: Vec<ManifestLine> =
            valid_audio(iter(once.clone()), tool, WorkerPool::new(2)).collect();
        twice.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(once, twice);
        let kept: Vec<&str> = once.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(kept, vec!["l0", "l1", "l3"]);
    }
}
