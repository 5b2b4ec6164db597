//! Turn one alignment result into manifest lines and audio clips.
//!
//! Two quality gates decide whether a segment becomes a training clip:
//!
//! 1. The literal transcript span, reduced to lower-case letter/apostrophe
//!    words, must equal the aligner's own spelling. This drops segments where
//!    the aligner expanded numerals or abbreviations.
//! 2. The span must start and end on a word boundary in the transcript.

use crate::align::types::{AlignedRecording, AlignedSegment};
use crate::audio::AudioTool;
use crate::error::Result;
use crate::manifest::{ManifestLine, round_ms};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Why a segment did not become a clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// Aligned spelling differs from the literal transcript span.
    TextMismatch { aligned: String, raw: String },
    /// The span starts inside a word.
    BadStartBoundary,
    /// The span ends inside a word.
    BadEndBoundary,
    /// A required field is missing or out of range.
    Malformed(String),
    /// The audio tool could not cut the clip.
    TrimFailed(String),
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::TextMismatch { aligned, raw } => {
                write!(f, "text mismatch: aligned '{aligned}' vs raw '{raw}'")
            }
            DiscardReason::BadStartBoundary => write!(f, "start not on a word boundary"),
            DiscardReason::BadEndBoundary => write!(f, "end not on a word boundary"),
            DiscardReason::Malformed(msg) => write!(f, "malformed segment: {msg}"),
            DiscardReason::TrimFailed(msg) => write!(f, "trim failed: {msg}"),
        }
    }
}

/// Lower-case the raw span and keep only letter/apostrophe words.
pub fn reconstruct_text(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| !(c.is_ascii_alphabetic() || c == '\''))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Characters that make a span edge land inside a word.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\''
}

/// Apply both quality gates; on success return the clip text.
pub fn check_segment(
    segment: &AlignedSegment,
    transcript: &[char],
) -> std::result::Result<String, DiscardReason> {
    let text = reconstruct_text(&segment.aligned_raw);
    let aligned = segment.aligned.trim().to_lowercase();
    if aligned != text {
        return Err(DiscardReason::TextMismatch { aligned, raw: text });
    }

    let (start, end) = (segment.text_start, segment.text_end);
    if start > end {
        return Err(DiscardReason::Malformed(format!(
            "text span {start}..{end} is reversed"
        )));
    }
    if start > 0 {
        match transcript.get(start - 1) {
            Some(&c) if is_word_char(c) => return Err(DiscardReason::BadStartBoundary),
            Some(_) => {}
            None => {
                return Err(DiscardReason::Malformed(format!(
                    "text-start {start} beyond transcript length {}",
                    transcript.len()
                )));
            }
        }
    }
    if let Some(&c) = transcript.get(end)
        && is_word_char(c)
    {
        return Err(DiscardReason::BadEndBoundary);
    }

    if segment.end.is_nan() || segment.start.is_nan() || segment.end <= segment.start {
        return Err(DiscardReason::Malformed(format!(
            "time range {}..{} ms is empty",
            segment.start, segment.end
        )));
    }
    Ok(text)
}

/// Cuts clips for aligned recordings.
pub struct SegmentExtractor {
    audio: Arc<dyn AudioTool>,
    clips_dir: PathBuf,
    clip_extension: String,
}

impl SegmentExtractor {
    pub fn new(audio: Arc<dyn AudioTool>, clips_dir: impl Into<PathBuf>) -> Self {
        Self {
            audio,
            clips_dir: clips_dir.into(),
            clip_extension: crate::defaults::CLIP_EXTENSION.to_string(),
        }
    }

    pub fn with_clip_extension(mut self, extension: impl Into<String>) -> Self {
        self.clip_extension = extension.into();
        self
    }

    pub fn clips_dir(&self) -> &Path {
        &self.clips_dir
    }

    /// Deterministic clip path for segment `index` of `recording_name`.
    pub fn clip_path(&self, recording_name: &str, index: usize) -> PathBuf {
        self.clips_dir
            .join(format!("{recording_name}-{index}.{}", self.clip_extension))
    }

    /// Load the alignment and transcript, returning a lazy sequence of clips.
    ///
    /// Fails only if the alignment or transcript cannot be read at all;
    /// problems with individual segments are counted in `Segments::skipped`.
    pub fn extract(&self, recording: &AlignedRecording) -> Result<Segments<'_>> {
        let raw = fs::read_to_string(&recording.aligned_path)?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
        let transcript = fs::read_to_string(&recording.transcript_path)?;

        Ok(Segments {
            extractor: self,
            name: recording.name(),
            audio_path: recording.audio_path.clone(),
            transcript: transcript.chars().collect(),
            total: values.len(),
            values: values.into_iter().enumerate(),
            skipped: 0,
        })
    }

    fn build_line(
        &self,
        name: &str,
        audio_path: &Path,
        index: usize,
        value: serde_json::Value,
        transcript: &[char],
    ) -> std::result::Result<ManifestLine, DiscardReason> {
        let segment: AlignedSegment = serde_json::from_value(value)
            .map_err(|e| DiscardReason::Malformed(e.to_string()))?;
        let text = check_segment(&segment, transcript)?;

        let clip_name = format!("{name}-{index}");
        let clip_path = self.clip_path(name, index);
        if !clip_path.exists() {
            self.audio
                .trim(audio_path, segment.start, segment.end, &clip_path)
                .map_err(|e| DiscardReason::TrimFailed(e.to_string()))?;
        }

        let duration_ms = round_ms(segment.end - segment.start);
        ManifestLine::new(clip_name, clip_path, duration_ms, text)
            .map_err(|e| DiscardReason::Malformed(e.to_string()))
    }
}

/// Clips of one recording, produced on demand. Single pass.
pub struct Segments<'a> {
    extractor: &'a SegmentExtractor,
    name: String,
    audio_path: PathBuf,
    transcript: Vec<char>,
    values: std::iter::Enumerate<std::vec::IntoIter<serde_json::Value>>,
    total: usize,
    skipped: usize,
}

impl Segments<'_> {
    /// Segments discarded so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Segments in the alignment.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn recording_name(&self) -> &str {
        &self.name
    }
}

impl Iterator for Segments<'_> {
    type Item = ManifestLine;

    fn next(&mut self) -> Option<ManifestLine> {
        for (index, value) in self.values.by_ref() {
            match self.extractor.build_line(
                &self.name,
                &self.audio_path,
                index,
                value,
                &self.transcript,
            ) {
                Ok(line) => return Some(line),
                Err(reason) => {
                    self.skipped += 1;
                    tracing::debug!(recording = %self.name, segment = index, "[-] discarding: {reason}");
                }
            }
        }
        None
    }
}

/// All clips of one recording plus its discard count.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingClips {
    pub recording: String,
    pub lines: Vec<ManifestLine>,
    pub skipped: usize,
    pub total: usize,
}

impl SegmentExtractor {
    /// Drain `extract` for one recording.
    pub fn extract_all(&self, recording: &AlignedRecording) -> Result<RecordingClips> {
        let mut segments = self.extract(recording)?;
        let lines: Vec<ManifestLine> = segments.by_ref().collect();
        if segments.skipped() > 0 {
            tracing::debug!(
                "[-] Clip {}: skipped {}/{} segments due to bad alignment",
                segments.recording_name(),
                segments.skipped(),
                segments.total()
            );
        }
        Ok(RecordingClips {
            recording: segments.recording_name().to_string(),
            skipped: segments.skipped(),
            total: segments.total(),
            lines,
        })
    }
}
