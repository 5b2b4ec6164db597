//! Optional ASR-quality stage backed by an external scorer.
//!
//! The scorer is run once over the whole survivor set. Its stdout carries one
//! progress record per utterance:
//!
//! ```text
//! [sample: <id>, WER: <wer>%, TER: <ter>%, ...
//! ```
//!
//! Only lines starting with `[sample:` are records. A record that does not
//! fit the grammar is logged and skipped.

use crate::error::{PrepError, Result};
use crate::manifest::{ManifestLine, ManifestWriter};
use crate::process::{CommandSpec, ProcessRunner};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::Builder;

const SAMPLE_PREFIX: &str = "[sample:";

/// Error-rate thresholds, as fractions (0.25 = 25%).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Thresholds {
    pub ler: Option<f64>,
    pub wer: Option<f64>,
}

impl Thresholds {
    pub fn is_empty(&self) -> bool {
        self.ler.is_none() && self.wer.is_none()
    }

    /// A score passes when it is within every supplied threshold.
    pub fn admits(&self, score: &SampleScore) -> bool {
        self.ler.is_none_or(|max| score.ter <= max) && self.wer.is_none_or(|max| score.wer <= max)
    }
}

/// Error rates the scorer reported for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleScore {
    pub id: String,
    /// Word error rate as a fraction.
    pub wer: f64,
    /// Token (letter) error rate as a fraction.
    pub ter: f64,
}

fn parse_rate(field: &str) -> std::result::Result<f64, String> {
    let number = field.trim_matches(|c| c == ',' || c == '%' || c == ']');
    number
        .parse::<f64>()
        .map(|percent| percent / 100.0)
        .map_err(|_| format!("'{field}' is not a percentage"))
}

/// Parse one stdout line from the scorer.
///
/// Returns `None` for lines that are not sample records.
pub fn parse_sample_line(line: &str) -> Option<std::result::Result<SampleScore, String>> {
    let line = line.trim();
    if !line.starts_with(SAMPLE_PREFIX) {
        return None;
    }
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() < 6 {
        return Some(Err(format!("expected 6 fields, found {}", parts.len())));
    }
    let id = parts[1].trim_end_matches(',');
    if id.is_empty() {
        return Some(Err("empty sample id".to_string()));
    }
    Some(parse_rate(parts[3]).and_then(|wer| {
        Ok(SampleScore {
            id: id.to_string(),
            wer,
            ter: parse_rate(parts[5])?,
        })
    }))
}

/// Extract every well-formed record from scorer output.
pub fn parse_scores(stdout: &str) -> Vec<SampleScore> {
    stdout
        .lines()
        .filter_map(|line| match parse_sample_line(line)? {
            Ok(score) => Some(score),
            Err(reason) => {
                tracing::warn!("skipping unparseable scorer line ({reason}): {line}");
                None
            }
        })
        .collect()
}

/// Trait for the external ASR scorer.
pub trait Scorer: Send + Sync {
    /// Score every line, returning records in the scorer's output order.
    fn score(&self, lines: &[ManifestLine]) -> Result<Vec<SampleScore>>;
}

/// Scorer that runs a wav2letter `Test` binary.
pub struct W2lScorer {
    runner: Arc<dyn ProcessRunner>,
    binary: PathBuf,
    am: PathBuf,
    tokens: Option<PathBuf>,
}

impl W2lScorer {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        binary: impl Into<PathBuf>,
        am: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            binary: binary.into(),
            am: am.into(),
            tokens: None,
        }
    }

    pub fn with_tokens(mut self, tokens: Option<PathBuf>) -> Self {
        self.tokens = tokens;
        self
    }

    fn command(&self, lexicon: &std::path::Path, list: &std::path::Path) -> CommandSpec {
        let mut command = CommandSpec::new(self.binary.to_string_lossy())
            .arg("--am")
            .path_arg(&self.am);
        if let Some(tokens) = &self.tokens {
            command = command.arg("--tokens").path_arg(tokens);
        }
        command
            .arg("--lexicon")
            .path_arg(lexicon)
            .arg("--test")
            .path_arg(list)
            .args([
                "--maxload",
                "-1",
                "--show",
                "--uselexicon=false",
                "--minisz=25",
                "--maxisz=900000000",
                "--mintsz=1",
                "--maxtsz=900000000",
                "--datadir=",
                "--tokensdir=",
                "--rundir=",
                "--archdir=",
                "--emission_dir=",
            ])
    }
}

impl Scorer for W2lScorer {
    fn score(&self, lines: &[ManifestLine]) -> Result<Vec<SampleScore>> {
        let lexicon = Builder::new().suffix(".txt").tempfile()?;
        let list = Builder::new().suffix(".lst").tempfile()?;
        let mut writer = ManifestWriter::new(list.as_file());
        for line in lines {
            writer.write_line(line)?;
        }
        writer.finish()?;

        let command = self.command(lexicon.path(), list.path());
        tracing::debug!(%command, "running scorer");
        let output = self
            .runner
            .run(&command)?
            .check(&self.binary.to_string_lossy())?;
        Ok(parse_scores(&output.stdout))
    }
}

/// Keep the lines whose scores pass `thresholds`, in scorer order.
///
/// Lines the scorer never reports are dropped.
pub fn filter_by_score(
    lines: Vec<ManifestLine>,
    scores: Vec<SampleScore>,
    thresholds: Thresholds,
) -> Vec<ManifestLine> {
    let mut lookup: HashMap<String, ManifestLine> =
        lines.into_iter().map(|l| (l.id.clone(), l)).collect();
    scores
        .into_iter()
        .filter(|score| thresholds.admits(score))
        .filter_map(|score| lookup.remove(&score.id))
        .collect()
}

/// Run `scorer` over `lines` and keep the passing ones.
pub fn asr_quality(
    lines: Vec<ManifestLine>,
    scorer: &dyn Scorer,
    thresholds: Thresholds,
) -> Result<Vec<ManifestLine>> {
    if thresholds.is_empty() {
        return Err(PrepError::ConfigInvalidValue {
            key: "asr".to_string(),
            message: "at least one of --ler or --wer is required".to_string(),
        });
    }
    if lines.is_empty() {
        return Ok(lines);
    }
    let scores = scorer.score(&lines)?;
    Ok(filter_by_score(lines, scores, thresholds))
}

/// Scorer returning fixed records, for testing.
#[derive(Debug, Clone, Default)]
pub struct MockScorer {
    scores: Vec<SampleScore>,
}

impl MockScorer {
    pub fn new(scores: Vec<SampleScore>) -> Self {
        Self { scores }
    }
}

impl Scorer for MockScorer {
    fn score(&self, _lines: &[ManifestLine]) -> Result<Vec<SampleScore>> {
        Ok(self.scores.clone())
    }
}
