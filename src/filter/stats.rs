//! Survivor counts and size extremes for one filter run.
//!
//! Counters are atomics because a stage may be pulled from a pool's feeder
//! thread rather than the thread that built the chain. Every update is a
//! count or a min/max, so the result does not depend on arrival order.

use crate::manifest::ManifestLine;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lazily filtered manifest lines.
pub type LineIter = Box<dyn Iterator<Item = ManifestLine> + Send>;

/// Minimum and maximum of the values seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Extremes<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: PartialOrd + Copy> Extremes<T> {
    pub fn observe(&mut self, value: T) {
        if self.min.is_none_or(|m| value < m) {
            self.min = Some(value);
        }
        if self.max.is_none_or(|m| value > m) {
            self.max = Some(value);
        }
    }
}

fn show<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Signed count with thousands separators, e.g. `-12,345`.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if value < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

#[derive(Debug)]
struct StageCount {
    name: String,
    survivors: Arc<AtomicUsize>,
}

/// Statistics of one filter chain run.
#[derive(Debug)]
pub struct Stats {
    total: usize,
    stages: Vec<StageCount>,
    pub audio_ms: Extremes<f64>,
    pub chars: Extremes<usize>,
    pub words: Extremes<usize>,
}

impl Stats {
    /// Start a run over `total` input lines.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            stages: Vec::new(),
            audio_ms: Extremes::default(),
            chars: Extremes::default(),
            words: Extremes::default(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Count the survivors of a stage as they pass through.
    pub fn wrap(&mut self, name: &str, lines: LineIter) -> LineIter {
        let survivors = Arc::new(AtomicUsize::new(0));
        self.stages.push(StageCount {
            name: name.to_string(),
            survivors: Arc::clone(&survivors),
        });
        Box::new(lines.inspect(move |_| {
            survivors.fetch_add(1, Ordering::Relaxed);
        }))
    }

    /// Record a final survivor.
    pub fn observe(&mut self, line: &ManifestLine) {
        self.audio_ms.observe(line.duration_ms);
        self.chars.observe(line.char_count());
        self.words.observe(line.word_count());
    }

    /// Survivors of each stage in chain order.
    pub fn stage_counts(&self) -> Vec<(String, usize)> {
        self.stages
            .iter()
            .map(|s| (s.name.clone(), s.survivors.load(Ordering::Relaxed)))
            .collect()
    }

    /// Lines left after the last stage (the input count if no stage ran).
    pub fn survivors(&self) -> usize {
        self.stages
            .last()
            .map_or(self.total, |s| s.survivors.load(Ordering::Relaxed))
    }

    /// `input=N > stage (delta) > ...`
    pub fn pipeline_summary(&self) -> String {
        let mut out = format!("input={}", self.total);
        let mut last = self.total as i64;
        for (name, count) in self.stage_counts() {
            let count = count as i64;
            out.push_str(&format!(" > {name} ({})", group_thousands(count - last)));
            last = count;
        }
        out
    }

    /// `audio (min=..ms max=..ms) chars (..) words (..)`
    pub fn size_summary(&self) -> String {
        format!(
            "audio (min={}ms max={}ms) chars (min={} max={}) words (min={} max={})",
            show(self.audio_ms.min.map(|v| v.trunc() as u64)),
            show(self.audio_ms.max.map(|v| v.trunc() as u64)),
            show(self.chars.min),
            show(self.chars.max),
            show(self.words.min),
            show(self.words.max),
        )
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "| pipeline: {}", self.pipeline_summary())?;
        write!(f, "| stats:    {}", self.size_summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, ms: f64, text: &str) -> ManifestLine {
        ManifestLine::new(id, format!("/c/{id}.flac"), ms, text).unwrap()
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(-1234567), "-1,234,567");
        assert_eq!(group_thousands(-12), "-12");
    }

    #[test]
    fn wrapped_stage_counts_survivors() {
        let mut stats = Stats::new(3);
        let lines: LineIter = Box::new(vec![line("a", 1.0, "x"), line("b", 2.0, "y")].into_iter());
        let lines = stats.wrap("audio", lines);
        let lines: LineIter = Box::new(lines.filter(|l| l.id == "a"));
        let out: Vec<_> = stats.wrap("chars", lines).collect();

        assert_eq!(out.len(), 1);
        assert_eq!(
            stats.stage_counts(),
            vec![("audio".to_string(), 2), ("chars".to_string(), 1)]
        );
        assert_eq!(stats.survivors(), 1);
        assert_eq!(
            stats.pipeline_summary(),
            "input=3 > audio (-1) > chars (-1)"
        );
    }

    #[test]
    fn no_stages_means_everything_survives() {
        let stats = Stats::new(5);
        assert_eq!(stats.survivors(), 5);
        assert_eq!(stats.pipeline_summary(), "input=5");
    }

    #[test]
    fn extremes_track_final_survivors() {
        let mut stats = Stats::new(2);
        stats.observe(&line("a", 1500.9, "hello world"));
        stats.observe(&line("b", 300.2, "hi"));
        assert_eq!(
            stats.size_summary(),
            "audio (min=300ms max=1500ms) chars (min=2 max=11) words (min=1 max=2)"
        );
    }

    #[test]
    fn empty_run_prints_placeholders() {
        let stats = Stats::new(0);
        assert_eq!(
            stats.to_string(),
            "| pipeline: input=0\n| stats:    audio (min=-ms max=-ms) chars (min=- max=-) words (min=- max=-)"
        );
    }

    #[test]
    fn extremes_are_order_independent() {
        let values = [4.0, -1.0, 9.5, 3.0];
        let mut forward = Extremes::default();
        let mut backward = Extremes::default();
        values.iter().for_each(|v| forward.observe(*v));
        values.iter().rev().for_each(|v| backward.observe(*v));
        assert_eq!(forward, backward);
        assert_eq!(forward.min, Some(-1.0));
        assert_eq!(forward.max, Some(9.5));
    }
}
