//! Data passed between discovery, alignment and segmentation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A recording and its transcript, found side by side in the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPair {
    pub audio_path: PathBuf,
    pub transcript_path: PathBuf,
    /// Audio size in bytes, used to schedule the longest jobs first.
    pub size_hint: u64,
}

impl InputPair {
    /// Recording name used for alignment outputs and clip ids.
    pub fn name(&self) -> String {
        recording_name(&self.audio_path)
    }
}

/// Name of a recording: its file stem with whitespace replaced, since clip
/// ids end up in a space-separated manifest.
pub fn recording_name(audio_path: &Path) -> String {
    audio_path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Where the aligner left its result for one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRecording {
    pub audio_path: PathBuf,
    /// JSON array of `AlignedSegment`s.
    pub aligned_path: PathBuf,
    /// Normalized transcript the aligner read; character offsets index into it.
    pub transcript_path: PathBuf,
    /// True when an earlier run's output was reused.
    pub reused: bool,
}

impl AlignedRecording {
    pub fn name(&self) -> String {
        recording_name(&self.audio_path)
    }
}

/// One element of the aligner's JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSegment {
    /// Start time in milliseconds.
    pub start: f64,
    /// End time in milliseconds.
    pub end: f64,
    /// The aligner's own spelling of the segment.
    pub aligned: String,
    /// The literal transcript span.
    #[serde(rename = "aligned-raw")]
    pub aligned_raw: String,
    /// Character offset of the span start in the transcript.
    #[serde(rename = "text-start")]
    pub text_start: usize,
    /// Character offset one past the span end.
    #[serde(rename = "text-end")]
    pub text_end: usize,
}
