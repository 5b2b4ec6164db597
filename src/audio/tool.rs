//! Audio transform capability used by the segment extractor and the
//! validity filter.

use crate::audio::probe::{AudioInfo, probe};
use crate::config::AudioConfig;
use crate::error::{PrepError, Result};
use crate::process::{CommandSpec, ProcessRunner};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Trait for the audio primitives the pipeline needs.
///
/// This trait allows swapping implementations (sox-backed vs mock).
pub trait AudioTool: Send + Sync {
    /// Decode `path` fully and report its properties.
    fn probe(&self, path: &Path) -> Result<AudioInfo>;

    /// Cut `[start_ms, end_ms]` out of `src` into `dst` as a mono clip.
    ///
    /// Returns the path of the written clip.
    fn trim(&self, src: &Path, start_ms: f64, end_ms: f64, dst: &Path) -> Result<PathBuf>;

    /// Decoded duration of the mono clip at `path` in milliseconds.
    ///
    /// Multi-channel audio is an error: clips are always cut as mono.
    fn duration_ms(&self, path: &Path) -> Result<f64> {
        let info = self.probe(path)?;
        if info.channels != 1 {
            return Err(PrepError::AudioDecode {
                path: path.to_path_buf(),
                message: format!("expected mono audio, got {} channels", info.channels),
            });
        }
        Ok(info.duration_ms)
    }
}

/// `AudioTool` that trims with sox and decodes in-process.
pub struct SoxAudioTool {
    runner: Arc<dyn ProcessRunner>,
    config: AudioConfig,
}

impl SoxAudioTool {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: AudioConfig) -> Self {
        Self { runner, config }
    }

    /// Temporary name sox writes to before the clip is moved into place.
    ///
    /// Keeps the real extension last so sox still picks the right encoder.
    fn partial_path(dst: &Path) -> PathBuf {
        let stem = dst
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = dst
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        dst.with_file_name(format!("{stem}.part.{ext}"))
    }

    fn trim_command(&self, src: &Path, start_ms: f64, end_ms: f64, dst: &Path) -> CommandSpec {
        CommandSpec::new(&self.config.sox)
            .arg("-V1")
            .path_arg(src)
            .args([
                "-r".to_string(),
                self.config.sample_rate.to_string(),
                "-c".to_string(),
                "1".to_string(),
                "-b".to_string(),
                self.config.bits.to_string(),
            ])
            .path_arg(dst)
            .args([
                "trim".to_string(),
                format!("{:.6}", start_ms / 1000.0),
                format!("={:.6}", end_ms / 1000.0),
            ])
    }
}

impl AudioTool for SoxAudioTool {
    fn probe(&self, path: &Path) -> Result<AudioInfo> {
        probe(path)
    }

    fn trim(&self, src: &Path, start_ms: f64, end_ms: f64, dst: &Path) -> Result<PathBuf> {
        if end_ms <= start_ms {
            return Err(PrepError::AudioTool {
                path: src.to_path_buf(),
                message: format!("empty range {start_ms}..{end_ms} ms"),
            });
        }

        let partial = Self::partial_path(dst);
        if partial.exists() {
            fs::remove_file(&partial)?;
        }

        let command = self.trim_command(src, start_ms, end_ms, &partial);
        tracing::trace!(%command, "trimming clip");
        let output = self.runner.run(&command)?;
        if !output.success {
            if let Err(e) = fs::remove_file(&partial)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %partial.display(), error = %e, "failed to remove partial clip");
            }
            return Err(PrepError::AudioTool {
                path: src.to_path_buf(),
                message: format!("{}: {}", output.status, output.stderr.trim()),
            });
        }

        fs::rename(&partial, dst)?;
        Ok(dst.to_path_buf())
    }
}

/// Mock audio tool for testing: "trims" by writing a marker file and reports
/// a fixed duration when probed.
#[derive(Debug, Clone)]
pub struct MockAudioTool {
    duration_ms: Option<f64>,
    fail_trim: bool,
}

impl MockAudioTool {
    pub fn new() -> Self {
        Self {
            duration_ms: None,
            fail_trim: false,
        }
    }

    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_trim_failure(mut self) -> Self {
        self.fail_trim = true;
        self
    }
}

impl Default for MockAudioTool {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioTool for MockAudioTool {
    fn probe(&self, path: &Path) -> Result<AudioInfo> {
        match self.duration_ms {
            Some(duration_ms) if path.exists() => Ok(AudioInfo {
                duration_ms,
                channels: 1,
                sample_rate: crate::defaults::CLIP_SAMPLE_RATE,
                frames: (duration_ms * 16.0) as u64,
            }),
            _ => Err(PrepError::AudioDecode {
                path: path.to_path_buf(),
                message: "mock decode failure".to_string(),
            }),
        }
    }

    fn trim(&self, src: &Path, start_ms: f64, end_ms: f64, dst: &Path) -> Result<PathBuf> {
        if self.fail_trim {
            return Err(PrepError::AudioTool {
                path: src.to_path_buf(),
                message: "mock trim failure".to_string(),
            });
        }
        fs::write(dst, format!("{}:{start_ms}-{end_ms}", src.display()))?;
        Ok(dst.to_path_buf())
    }
}
