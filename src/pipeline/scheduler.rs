//! Two-phase corpus preparation: align every recording, then cut clips.
//!
//! The align phase runs `jobs` aligner processes at once; the segment phase
//! runs on every CPU and consumes alignments as they finish. Results are
//! folded into a [`ManifestAccumulator`], so `clips.lst` comes out identical
//! no matter which worker finished first.

use crate::align::{
    AlignedRecording, Aligner, InputPair, RecordingClips, SegmentExtractor, discover,
};
use crate::error::{PrepError, Result};
use crate::manifest::{ManifestLine, ManifestWriter};
use crate::pipeline::pool::{Accumulator, WorkerPool};
use crate::progress::{attach, phase_bar};
use indicatif::MultiProgress;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Name of the aggregate manifest in the output directory.
pub const CLIPS_MANIFEST: &str = "clips.lst";
/// Subdirectory for aligner outputs.
pub const ALIGN_DIR: &str = "align";
/// Subdirectory for cut clips.
pub const CLIPS_DIR: &str = "clips";

/// Order in which recordings are handed to the align pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    /// Largest audio file first, so the longest jobs start early.
    #[default]
    Size,
    /// Recording name, for reproducible logs.
    Name,
}

impl FromStr for OrderBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "size" => Ok(OrderBy::Size),
            "name" => Ok(OrderBy::Name),
            other => Err(format!("unknown order '{other}', expected 'size' or 'name'")),
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBy::Size => write!(f, "size"),
            OrderBy::Name => write!(f, "name"),
        }
    }
}

/// Sort discovered pairs for dispatch.
pub fn order_pairs(pairs: &mut [InputPair], order: OrderBy) {
    match order {
        OrderBy::Size => pairs.sort_by(|a, b| {
            b.size_hint
                .cmp(&a.size_hint)
                .then_with(|| a.audio_path.cmp(&b.audio_path))
        }),
        OrderBy::Name => pairs.sort_by(|a, b| a.audio_path.cmp(&b.audio_path)),
    }
}

/// Transcription threads per aligner process.
///
/// Splits the CPUs evenly across concurrent aligner jobs unless overridden.
pub fn stt_parallelism(cpus: usize, jobs: usize, explicit: Option<usize>) -> usize {
    explicit.unwrap_or(cpus / jobs.max(1)).max(1)
}

/// Knobs for one scheduler run.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Concurrent aligner processes.
    pub jobs: usize,
    /// Segment-phase workers.
    pub segment_workers: usize,
    pub order_by: OrderBy,
    pub show_progress: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            segment_workers: crate::defaults::cpu_count(),
            order_by: OrderBy::Size,
            show_progress: false,
        }
    }
}

/// Result of processing one recording through both phases.
#[derive(Debug)]
pub enum RecordingOutcome {
    Clips { reused: bool, clips: RecordingClips },
    AlignFailed { audio: PathBuf, message: String },
    SegmentFailed { audio: PathBuf, message: String },
}

/// Commutative fold of recording outcomes, keyed by recording name.
#[derive(Debug, Default)]
pub struct ManifestAccumulator {
    clips: BTreeMap<String, Vec<ManifestLine>>,
    failures: BTreeMap<PathBuf, String>,
    reused: usize,
    skipped_segments: usize,
    total_segments: usize,
}

impl Accumulator<RecordingOutcome> for ManifestAccumulator {
    fn accumulate(&mut self, outcome: RecordingOutcome) {
        match outcome {
            RecordingOutcome::Clips { reused, clips } => {
                if reused {
                    self.reused += 1;
                }
                self.skipped_segments += clips.skipped;
                self.total_segments += clips.total;
                self.clips.insert(clips.recording, clips.lines);
            }
            RecordingOutcome::AlignFailed { audio, message }
            | RecordingOutcome::SegmentFailed { audio, message } => {
                self.failures.insert(audio, message);
            }
        }
    }
}

impl ManifestAccumulator {
    /// All clips, by recording name then segment index.
    pub fn lines(&self) -> impl Iterator<Item = &ManifestLine> {
        self.clips.values().flatten()
    }

    pub fn recordings(&self) -> usize {
        self.clips.len()
    }

    pub fn failures(&self) -> &BTreeMap<PathBuf, String> {
        &self.failures
    }
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub discovered: usize,
    pub aligned: usize,
    pub reused: usize,
    pub failures: Vec<(PathBuf, String)>,
    pub clips: usize,
    pub skipped_segments: usize,
    pub total_segments: usize,
    pub manifest: PathBuf,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} recordings, {} aligned ({} reused), {} failed; {} clips, {}/{} segments skipped",
            self.discovered,
            self.aligned,
            self.reused,
            self.failures.len(),
            self.clips,
            self.skipped_segments,
            self.total_segments
        )
    }
}

/// Runs alignment and segmentation over a directory of recordings.
pub struct PipelineScheduler {
    aligner: Arc<dyn Aligner>,
    extractor: Arc<SegmentExtractor>,
    options: SchedulerOptions,
}

impl PipelineScheduler {
    pub fn new(
        aligner: Arc<dyn Aligner>,
        extractor: Arc<SegmentExtractor>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            aligner,
            extractor,
            options,
        }
    }

    /// Create `align/` and `clips/` under `output_dir`.
    pub fn prepare_output(output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
        let align_dir = output_dir.join(ALIGN_DIR);
        let clips_dir = output_dir.join(CLIPS_DIR);
        for dir in [&align_dir, &clips_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                PrepError::Other(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        Ok((align_dir, clips_dir))
    }

    /// Align and segment every recording in `input_dir`, writing
    /// `output_dir/clips.lst`.
    ///
    /// Per-recording failures are logged and reported in the summary; only
    /// setup failures (output directories, manifest file) are errors.
    pub fn run(&self, input_dir: &Path, output_dir: &Path) -> Result<RunSummary> {
        let (align_dir, _) = Self::prepare_output(output_dir)?;

        let mut pairs = discover(input_dir)?;
        order_pairs(&mut pairs, self.options.order_by);
        let discovered = pairs.len();
        tracing::info!(
            recordings = discovered,
            jobs = self.options.jobs,
            workers = self.options.segment_workers,
            "starting corpus preparation"
        );

        let bars = MultiProgress::new();
        let show = self.options.show_progress;
        let align_bar = attach(&bars, phase_bar(discovered as u64, "align", show));
        let segment_bar = attach(&bars, phase_bar(discovered as u64, "segment", show));

        let aligner = Arc::clone(&self.aligner);
        let bar = align_bar.clone();
        let alignments = WorkerPool::new(self.options.jobs).map_unordered(pairs, move |pair| {
            let result = aligner.align(&pair, &align_dir);
            bar.inc(1);
            (pair, result)
        });

        let extractor = Arc::clone(&self.extractor);
        let outcomes = WorkerPool::new(self.options.segment_workers).map_unordered(
            alignments,
            move |(pair, result): (InputPair, Result<AlignedRecording>)| match result {
                Ok(recording) => match extractor.extract_all(&recording) {
                    Ok(clips) => RecordingOutcome::Clips {
                        reused: recording.reused,
                        clips,
                    },
                    Err(e) => RecordingOutcome::SegmentFailed {
                        audio: pair.audio_path,
                        message: e.to_string(),
                    },
                },
                Err(e) => RecordingOutcome::AlignFailed {
                    audio: pair.audio_path,
                    message: e.to_string(),
                },
            },
        );

        let mut acc = ManifestAccumulator::default();
        for outcome in outcomes {
            match &outcome {
                RecordingOutcome::Clips { clips, .. } => {
                    tracing::debug!(
                        recording = %clips.recording,
                        clips = clips.lines.len(),
                        skipped = clips.skipped,
                        "recording segmented"
                    );
                }
                RecordingOutcome::AlignFailed { audio, message } => {
                    tracing::warn!(audio = %audio.display(), "alignment failed: {message}");
                }
                RecordingOutcome::SegmentFailed { audio, message } => {
                    tracing::warn!(audio = %audio.display(), "segmentation failed: {message}");
                }
            }
            acc.accumulate(outcome);
            segment_bar.inc(1);
        }
        align_bar.finish_and_clear();
        segment_bar.finish_and_clear();

        let manifest = output_dir.join(CLIPS_MANIFEST);
        let mut writer = ManifestWriter::create(&manifest)?;
        for line in acc.lines() {
            writer.write_line(line)?;
        }
        let clips = writer.finish()?;

        let summary = RunSummary {
            discovered,
            aligned: acc.recordings(),
            reused: acc.reused,
            failures: acc
                .failures
                .iter()
                .map(|(path, message)| (path.clone(), message.clone()))
                .collect(),
            clips,
            skipped_segments: acc.skipped_segments,
            total_segments: acc.total_segments,
            manifest,
        };
        tracing::info!("{summary}");
        Ok(summary)
    }
}
