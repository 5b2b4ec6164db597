//! Composable filter chain over a manifest.

use crate::audio::AudioTool;
use crate::error::{PrepError, Result};
use crate::filter::asr::{Scorer, Thresholds, W2lScorer, asr_quality};
use crate::filter::range::Range;
use crate::filter::stages::{
    StageKind, anchored_regex, audio_length, char_length, parse_order, text_regex, valid_audio,
};
use crate::filter::stats::{LineIter, Stats};
use crate::manifest::{ManifestLine, parse_lines};
use crate::pipeline::WorkerPool;
use crate::process::ProcessRunner;
use crate::progress::phase_bar;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;

/// Name the ASR stage is reported under.
pub const ASR_STAGE: &str = "w2l_test";

/// What to filter on. Every field is optional; an empty set of options
/// passes everything through.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub audio: Option<Range>,
    pub chars: Option<Range>,
    pub regex: Option<String>,
    pub valid: bool,
    pub order: Vec<StageKind>,
    pub w2l_test: Option<PathBuf>,
    pub am: Option<PathBuf>,
    pub tokens: Option<PathBuf>,
    pub ler: Option<f64>,
    pub wer: Option<f64>,
    /// Label for progress output.
    pub desc: Option<String>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            audio: None,
            chars: None,
            regex: None,
            valid: false,
            order: parse_order("").unwrap_or_default(),
            w2l_test: None,
            am: None,
            tokens: None,
            ler: None,
            wer: None,
            desc: None,
        }
    }
}

impl FilterOptions {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            ler: self.ler,
            wer: self.wer,
        }
    }

    /// Whether the ASR-quality stage runs.
    pub fn asr_enabled(&self) -> bool {
        self.w2l_test.is_some() && self.am.is_some()
    }

    /// Reject half-specified ASR options and out-of-range thresholds.
    pub fn validate(&self) -> Result<()> {
        let any_tool = self.w2l_test.is_some() || self.am.is_some();
        let any_threshold = !self.thresholds().is_empty();
        if (any_tool || any_threshold) && !(self.asr_enabled() && any_threshold) {
            return Err(PrepError::ConfigInvalidValue {
                key: "asr".to_string(),
                message: "must provide both --w2l-test and --am and at least one of --ler or --wer"
                    .to_string(),
            });
        }
        for (key, value) in [("ler", self.ler), ("wer", self.wer)] {
            if let Some(value) = value
                && (value < 0.0 || !value.is_finite())
            {
                return Err(PrepError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: format!("must be a non-negative rate, got {value}"),
                });
            }
        }
        if let Some(pattern) = &self.regex {
            anchored_regex(pattern)?;
        }
        Ok(())
    }

    /// Fill scorer paths the command line left out from configured defaults.
    pub fn with_scorer_defaults(mut self, scorer: &crate::config::ScorerConfig) -> Self {
        if self.ler.is_some() || self.wer.is_some() || self.w2l_test.is_some() {
            self.w2l_test = self.w2l_test.or_else(|| scorer.binary.clone());
            self.am = self.am.or_else(|| scorer.am.clone());
            self.tokens = self.tokens.or_else(|| scorer.tokens.clone());
        }
        self
    }
}

/// Survivors and statistics of one chain run.
#[derive(Debug)]
pub struct FilterOutcome {
    pub lines: Vec<ManifestLine>,
    pub stats: Stats,
}

/// A configured sequence of filter stages.
pub struct FilterChain {
    options: FilterOptions,
    regex: Option<Regex>,
    audio: Arc<dyn AudioTool>,
    scorer: Option<Arc<dyn Scorer>>,
    workers: usize,
    show_progress: bool,
}

impl FilterChain {
    /// Validate `options` and build the chain.
    ///
    /// When the ASR stage is enabled, a wav2letter scorer is run through
    /// `runner`; use [`FilterChain::with_scorer`] to substitute another.
    pub fn new(
        options: FilterOptions,
        audio: Arc<dyn AudioTool>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self> {
        options.validate()?;
        let regex = options.regex.as_deref().map(anchored_regex).transpose()?;
        let scorer: Option<Arc<dyn Scorer>> = match (&options.w2l_test, &options.am) {
            (Some(binary), Some(am)) => Some(Arc::new(
                W2lScorer::new(runner, binary.clone(), am.clone())
                    .with_tokens(options.tokens.clone()),
            )),
            _ => None,
        };
        Ok(Self {
            options,
            regex,
            audio,
            scorer,
            workers: crate::defaults::cpu_count(),
            show_progress: false,
        })
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Threads used by the validity stage.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Stack the configured stages onto `lines`, counting each in `stats`.
    fn build(&self, lines: LineIter, stats: &mut Stats) -> LineIter {
        let mut lines = lines;
        for kind in &self.options.order {
            lines = match kind {
                StageKind::Audio => match self.options.audio {
                    Some(range) => stats.wrap(kind.name(), audio_length(lines, range)),
                    None => lines,
                },
                StageKind::Chars => match self.options.chars {
                    Some(range) => stats.wrap(kind.name(), char_length(lines, range)),
                    None => lines,
                },
                StageKind::Regex => match &self.regex {
                    Some(regex) => stats.wrap(kind.name(), text_regex(lines, regex.clone())),
                    None => lines,
                },
                StageKind::Valid if self.options.valid => {
                    let pool = WorkerPool::new(self.workers);
                    let checked = valid_audio(lines, Arc::clone(&self.audio), pool);
                    stats.wrap(kind.name(), checked)
                }
                StageKind::Valid => lines,
            };
        }
        lines
    }

    /// Filter raw manifest lines.
    ///
    /// `raw.len()` is the reported input count; lines that do not parse as
    /// manifest records are dropped before the first stage.
    pub fn run(&self, raw: Vec<String>) -> Result<FilterOutcome> {
        let label = self.options.desc.as_deref().unwrap_or("filter");
        self.run_as(raw, label)
    }

    /// [`FilterChain::run`] with an explicit progress label.
    pub fn run_as(&self, raw: Vec<String>, label: &str) -> Result<FilterOutcome> {
        let mut stats = Stats::new(raw.len());
        let parsed: LineIter = Box::new(parse_lines(raw));
        let staged = self.build(parsed, &mut stats);

        let bar = phase_bar(stats.total() as u64, label, self.show_progress);
        let mut lines: Vec<ManifestLine> = bar.wrap_iter(staged).collect();
        bar.finish_and_clear();

        if self.options.asr_enabled() {
            let scorer = self.scorer.as_ref().ok_or_else(|| {
                PrepError::Other("ASR stage enabled without a scorer".to_string())
            })?;
            let scored = asr_quality(lines, scorer.as_ref(), self.options.thresholds())?;
            let counted: LineIter = Box::new(scored.into_iter());
            lines = stats.wrap(ASR_STAGE, counted).collect();
        }

        for line in &lines {
            stats.observe(line);
        }
        Ok(FilterOutcome { lines, stats })
    }

    /// Filter already-parsed lines.
    pub fn run_lines(&self, lines: Vec<ManifestLine>) -> Result<FilterOutcome> {
        self.run(lines.iter().map(ToString::to_string).collect())
    }
}
