//! Forced alignment through an external aligner process.

use crate::align::types::{AlignedRecording, InputPair};
use crate::config::AlignerConfig;
use crate::defaults::{ALIGNER_BANNER_FRAGMENTS, ALIGNER_BANNER_PREFIXES};
use crate::error::{PrepError, Result};
use crate::process::{CommandSpec, ProcessRunner};
use crate::text::normalize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Trait for producing an alignment of one recording.
pub trait Aligner: Send + Sync {
    /// Align `pair`, writing outputs under `work_dir`.
    ///
    /// Errors are per recording; the caller records them and moves on.
    fn align(&self, pair: &InputPair, work_dir: &Path) -> Result<AlignedRecording>;
}

/// Output locations for one recording inside the alignment work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignPaths {
    pub tlog: PathBuf,
    pub aligned: PathBuf,
    pub transcript: PathBuf,
}

impl AlignPaths {
    pub fn new(pair: &InputPair, work_dir: &Path) -> Self {
        let name = pair.name();
        let transcript_name = pair
            .transcript_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| format!("{name}.txt").into());
        Self {
            tlog: work_dir.join(format!("{name}.tlog")),
            aligned: work_dir.join(format!("{name}-aligned.json")),
            transcript: work_dir.join(transcript_name),
        }
    }
}

/// Aligner that shells out to a DSAlign-style `align.py`.
pub struct DsAligner {
    runner: Arc<dyn ProcessRunner>,
    config: AlignerConfig,
    stt_workers: usize,
    model_dir: Option<PathBuf>,
    verbose: bool,
}

impl DsAligner {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: AlignerConfig) -> Self {
        Self {
            runner,
            config,
            stt_workers: 1,
            model_dir: None,
            verbose: false,
        }
    }

    /// Transcription threads each aligner process may use.
    pub fn with_stt_workers(mut self, workers: usize) -> Self {
        self.stt_workers = workers.max(1);
        self
    }

    /// Acoustic model directory override.
    pub fn with_model_dir(mut self, model_dir: Option<PathBuf>) -> Self {
        self.model_dir = model_dir;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn command(&self, pair: &InputPair, paths: &AlignPaths) -> CommandSpec {
        let mut command = CommandSpec::new(&self.config.program);
        if !self.config.script.is_empty() {
            command = command.arg(&self.config.script);
        }
        command = command
            .args([
                "--audio-vad-aggressiveness".to_string(),
                self.config.vad_aggressiveness.to_string(),
                "--stt-workers".to_string(),
                self.stt_workers.to_string(),
                "--output-max-cer".to_string(),
                self.config.max_cer.to_string(),
                "--audio".to_string(),
            ])
            .path_arg(&pair.audio_path)
            .arg("--script")
            .path_arg(&paths.transcript)
            .arg("--aligned")
            .path_arg(&paths.aligned)
            .arg("--tlog")
            .path_arg(&paths.tlog)
            .arg("--force");
        if let Some(model_dir) = &self.model_dir {
            command = command.arg("--stt-model-dir").path_arg(model_dir);
        }
        if !self.verbose {
            command = command.arg("--no-progress");
        }
        if let Some(dir) = &self.config.working_dir {
            command = command.current_dir(dir);
        }
        command
    }

    fn write_transcript(pair: &InputPair, paths: &AlignPaths) -> Result<()> {
        let text = fs::read_to_string(&pair.transcript_path)?;
        fs::write(&paths.transcript, normalize(&text))?;
        Ok(())
    }

    fn align_error(pair: &InputPair, message: impl Into<String>) -> PrepError {
        PrepError::Align {
            audio: pair.audio_path.clone(),
            message: message.into(),
        }
    }
}

impl Aligner for DsAligner {
    fn align(&self, pair: &InputPair, work_dir: &Path) -> Result<AlignedRecording> {
        let paths = AlignPaths::new(pair, work_dir);
        let recording = AlignedRecording {
            audio_path: pair.audio_path.clone(),
            aligned_path: paths.aligned.clone(),
            transcript_path: paths.transcript.clone(),
            reused: false,
        };

        if paths.aligned.exists() {
            if !paths.transcript.exists() {
                Self::write_transcript(pair, &paths)?;
            }
            return Ok(AlignedRecording {
                reused: true,
                ..recording
            });
        }

        Self::write_transcript(pair, &paths)?;

        let command = self.command(pair, &paths);
        if self.verbose {
            tracing::info!(%command, "running aligner");
        } else {
            tracing::debug!(%command, "running aligner");
        }

        let output = self.runner.run(&command)?;
        let noteworthy = surfaced_stderr(&output.stderr);
        for line in &noteworthy {
            tracing::debug!(audio = %pair.audio_path.display(), "aligner: {line}");
        }

        if !output.success {
            let tail = noteworthy.last().copied().unwrap_or("no diagnostic output");
            return Err(Self::align_error(
                pair,
                format!("aligner {}: {tail}", output.status),
            ));
        }
        if !paths.aligned.exists() {
            return Err(Self::align_error(pair, "aligner produced no output"));
        }
        Ok(recording)
    }
}

/// Stderr lines worth surfacing, with known startup banners removed.
pub fn surfaced_stderr(stderr: &str) -> Vec<&str> {
    stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .filter(|line| {
            !ALIGNER_BANNER_PREFIXES
                .iter()
                .any(|prefix| line.starts_with(prefix))
        })
        .filter(|line| {
            !ALIGNER_BANNER_FRAGMENTS
                .iter()
                .any(|fragment| line.contains(fragment))
        })
        .collect()
}

/// Mock aligner for testing: writes a fixed segment list for every recording.
#[derive(Debug, Clone)]
pub struct MockAligner {
    segments_json: String,
    fail_on: Vec<PathBuf>,
}

impl MockAligner {
    pub fn new(segments_json: impl Into<String>) -> Self {
        Self {
            segments_json: segments_json.into(),
            fail_on: Vec::new(),
        }
    }

    /// Make alignment of `audio_path` fail.
    pub fn with_failure_for(mut self, audio_path: impl Into<PathBuf>) -> Self {
        self.fail_on.push(audio_path.into());
        self
    }
}

impl Aligner for MockAligner {
    fn align(&self, pair: &InputPair, work_dir: &Path) -> Result<AlignedRecording> {
        if self.fail_on.contains(&pair.audio_path) {
            return Err(PrepError::Align {
                audio: pair.audio_path.clone(),
                message: "mock alignment failure".to_string(),
            });
        }
        let paths = AlignPaths::new(pair, work_dir);
        DsAligner::write_transcript(pair, &paths)?;
        fs::write(&paths.aligned, &self.segments_json)?;
        Ok(AlignedRecording {
            audio_path: pair.audio_path.clone(),
            aligned_path: paths.aligned,
            transcript_path: paths.transcript,
            reused: false,
        })
    }
}
